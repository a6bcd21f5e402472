use std::collections::{BTreeMap, BTreeSet};
use std::thread::{self, JoinHandle};

use camino::Utf8Path;
use crossbeam_channel::{Sender, bounded};
use tracing::info;

use crate::error::DumpError;
use crate::fs_util;

pub const CANONICAL_FILE: &str = "canonical.txt";
pub const CANONICAL_SOURCES_FILE: &str = "canonical_data_sources.txt";

type Canonicals = BTreeMap<String, BTreeSet<String>>;

pub struct CanonicalCollector {
    sender: Sender<(String, String)>,
    handle: JoinHandle<Canonicals>,
}

#[derive(Clone)]
pub struct CanonicalReporter {
    sender: Sender<(String, String)>,
}

impl CanonicalReporter {
    pub fn report(&self, canonical: &str, data_source_id: &str) -> Result<(), DumpError> {
        if canonical.is_empty() {
            return Ok(());
        }
        self.sender
            .send((canonical.to_string(), data_source_id.to_string()))
            .map_err(|_| DumpError::SinkClosed)
    }
}

impl CanonicalCollector {
    pub fn spawn(capacity: usize) -> Self {
        let (sender, receiver) = bounded::<(String, String)>(capacity.max(1));
        let handle = thread::spawn(move || {
            let mut canonicals = Canonicals::new();
            for (canonical, data_source_id) in receiver {
                canonicals.entry(canonical).or_default().insert(data_source_id);
            }
            canonicals
        });
        Self { sender, handle }
    }

    pub fn reporter(&self) -> CanonicalReporter {
        CanonicalReporter {
            sender: self.sender.clone(),
        }
    }

    pub fn finish(self, dir: &Utf8Path) -> Result<usize, DumpError> {
        drop(self.sender);
        let canonicals = self
            .handle
            .join()
            .map_err(|_| DumpError::WorkerPanicked("canonical collector".to_string()))?;
        info!(canonicals = canonicals.len(), "writing canonicals to files");

        let mut names = String::new();
        let mut sources = String::new();
        for (canonical, data_source_ids) in &canonicals {
            names.push_str(canonical);
            names.push('\n');
            for id in data_source_ids {
                sources.push_str(canonical);
                sources.push('\t');
                sources.push_str(id);
                sources.push('\n');
            }
        }
        fs_util::write_atomic(&dir.join(CANONICAL_FILE), names.as_bytes())?;
        fs_util::write_atomic(&dir.join(CANONICAL_SOURCES_FILE), sources.as_bytes())?;
        Ok(canonicals.len())
    }
}
