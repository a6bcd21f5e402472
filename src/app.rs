use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::convert::{ConvertSummary, Converter};
use crate::create::{CreateSummary, Resolver};
use crate::error::DumpError;
use crate::fs_util;
use crate::parser::NameParser;
use crate::store::StagingStore;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub convert: ConvertSummary,
    pub create: CreateSummary,
}

pub struct App<P: NameParser> {
    config: ResolvedConfig,
    parser: Option<P>,
}

impl<P: NameParser> App<P> {
    pub fn new(config: ResolvedConfig, parser: P) -> Self {
        Self {
            config,
            parser: Some(parser),
        }
    }

    /// An app that can only run `create`, which never calls the parser.
    pub fn without_parser(config: ResolvedConfig) -> Self {
        Self {
            config,
            parser: None,
        }
    }

    pub fn convert(&self, sink: &dyn ProgressSink) -> Result<ConvertSummary, DumpError> {
        let parser = self.parser.as_ref().ok_or(DumpError::MissingParserUrl)?;
        let paths = &self.config.paths;
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Convert; source {}", paths.source_dir),
            elapsed: None,
        });

        fs_util::ensure_dirs(&[paths.staging_dir.as_path()])?;
        let store = StagingStore::reset(&paths.staging_dir)?;
        let summary = Converter::new(self.config.pipeline, parser)
            .run(&store, &paths.name_strings())?;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Convert; staged {} names from {} rows",
                summary.parsed_records, summary.source_rows
            ),
            elapsed: Some(started.elapsed()),
        });
        Ok(summary)
    }

    pub fn create(&self, sink: &dyn ProgressSink) -> Result<CreateSummary, DumpError> {
        let paths = &self.config.paths;
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Create; output {}", paths.output_dir),
            elapsed: None,
        });

        let store = StagingStore::open(&paths.staging_dir)?;
        let summary = Resolver::new(self.config.pipeline, &store).run(paths)?;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Create; wrote {} index rows, {} broken",
                summary.index_rows, summary.broken_rows
            ),
            elapsed: Some(started.elapsed()),
        });
        Ok(summary)
    }

    pub fn run(&self, sink: &dyn ProgressSink) -> Result<RunSummary, DumpError> {
        let convert = self.convert(sink)?;
        let create = self.create(sink)?;
        Ok(RunSummary { convert, create })
    }
}
