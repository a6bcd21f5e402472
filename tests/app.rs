mod common;

use std::sync::Mutex;

use assert_matches::assert_matches;

use gnidump::app::{App, ProgressEvent, ProgressSink};
use gnidump::config::{DumpPaths, ParserConfig, ResolvedConfig};
use gnidump::error::DumpError;
use gnidump::output::JsonOutput;
use gnidump::sink::Category;

use common::{MockParser, pipeline, read_rows, utf8_dir, write_dump};

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event.message);
    }
}

fn resolved(paths: DumpPaths) -> ResolvedConfig {
    ResolvedConfig {
        pipeline: pipeline(2, 2),
        paths,
        parser: ParserConfig {
            url: None,
            timeout: std::time::Duration::from_secs(1),
        },
    }
}

#[test]
fn run_converts_then_creates() {
    let temp = tempfile::tempdir().unwrap();
    let paths = DumpPaths::under(&utf8_dir(&temp));
    write_dump(&paths);

    let app = App::new(resolved(paths.clone()), MockParser::default());
    let sink = RecordingSink::default();
    let summary = app.run(&sink).unwrap();

    assert_eq!(summary.convert.unique_names, 4);
    assert_eq!(summary.create.index_rows, 4);
    assert!(paths.staging_dir.as_std_path().is_dir());
    let index = read_rows(&paths.output_dir.join(Category::Index.file_name()));
    assert_eq!(index.len(), 4);

    let events = sink.events.lock().unwrap();
    assert!(events[0].starts_with("phase=Convert"));
    assert!(events.iter().any(|event| event.starts_with("phase=Create")));
}

#[test]
fn create_reuses_staging_from_earlier_convert() {
    let temp = tempfile::tempdir().unwrap();
    let paths = DumpPaths::under(&utf8_dir(&temp));
    write_dump(&paths);

    App::new(resolved(paths.clone()), MockParser::default())
        .convert(&JsonOutput)
        .unwrap();
    let summary = App::<MockParser>::without_parser(resolved(paths))
        .create(&JsonOutput)
        .unwrap();
    assert_eq!(summary.name_strings, 4);
    assert_eq!(summary.broken_rows, 1);
}

#[test]
fn convert_without_parser_fails() {
    let temp = tempfile::tempdir().unwrap();
    let paths = DumpPaths::under(&utf8_dir(&temp));
    write_dump(&paths);
    let result = App::<MockParser>::without_parser(resolved(paths)).convert(&JsonOutput);
    assert_matches!(result, Err(DumpError::MissingParserUrl));
}

#[test]
fn convert_rerun_replaces_staging() {
    let temp = tempfile::tempdir().unwrap();
    let paths = DumpPaths::under(&utf8_dir(&temp));
    write_dump(&paths);
    let app = App::new(resolved(paths.clone()), MockParser::default());
    app.convert(&JsonOutput).unwrap();

    common::write_csv(
        &paths.name_strings(),
        common::NAME_STRINGS_HEADER,
        &[vec!["1", "Aus"]],
    );
    app.convert(&JsonOutput).unwrap();
    let summary = app.create(&JsonOutput).unwrap();
    assert_eq!(summary.name_strings, 1);
    assert_eq!(summary.broken_rows, 4);
}
