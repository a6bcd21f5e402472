use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::thread::{self, JoinHandle};

use camino::Utf8Path;
use crossbeam_channel::{Receiver, Sender, bounded};
use serde::Serialize;
use tracing::{error, info};

use crate::error::DumpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NameStrings,
    AuthorWord,
    Genus,
    Species,
    Subspecies,
    Uninomial,
    Year,
    Index,
    Vernacular,
    VernacularIndex,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::NameStrings,
        Category::AuthorWord,
        Category::Genus,
        Category::Species,
        Category::Subspecies,
        Category::Uninomial,
        Category::Year,
        Category::Index,
        Category::Vernacular,
        Category::VernacularIndex,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Category::NameStrings => "name_strings.csv",
            Category::AuthorWord => "name_strings__author_words.csv",
            Category::Genus => "name_strings__genus.csv",
            Category::Species => "name_strings__species.csv",
            Category::Subspecies => "name_strings__subspecies.csv",
            Category::Uninomial => "name_strings__uninomial.csv",
            Category::Year => "name_strings__year.csv",
            Category::Index => "name_string_indices.csv",
            Category::Vernacular => "vernacular_strings.csv",
            Category::VernacularIndex => "vernacular_string_indices.csv",
        }
    }

    pub fn header(&self) -> &'static [&'static str] {
        match self {
            Category::NameStrings => &["id", "name", "canonical_uuid", "canonical", "surrogate"],
            Category::AuthorWord => &["author_word", "name_uuid"],
            Category::Genus => &["genus", "name_uuid"],
            Category::Species => &["species", "name_uuid"],
            Category::Subspecies => &["subspecies", "name_uuid"],
            Category::Uninomial => &["uninomial", "name_uuid"],
            Category::Year => &["year", "name_uuid"],
            Category::Index => &[
                "data_source_id",
                "name_string_id",
                "url",
                "taxon_id",
                "global_id",
                "local_id",
                "nomenclatural_code_id",
                "rank",
                "accepted_taxon_id",
                "classification_path",
                "classification_path_ids",
                "classification_path_ranks",
                "accepted_name_uuid",
                "accepted_name",
            ],
            Category::Vernacular => &["id", "name"],
            Category::VernacularIndex => &[
                "data_source_id",
                "taxon_id",
                "vernacular_string_id",
                "language",
                "locality",
                "country_code",
            ],
        }
    }
}

struct OutputJob {
    category: Category,
    row: Vec<String>,
}

#[derive(Clone)]
pub struct RowEmitter {
    sender: Sender<OutputJob>,
}

impl RowEmitter {
    pub fn emit(&self, category: Category, row: Vec<String>) -> Result<(), DumpError> {
        self.sender
            .send(OutputJob { category, row })
            .map_err(|_| DumpError::SinkClosed)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SinkReport {
    pub rows: BTreeMap<Category, usize>,
}

impl SinkReport {
    pub fn rows_in(&self, category: Category) -> usize {
        self.rows.get(&category).copied().unwrap_or(0)
    }
}

pub struct OutputSink {
    emitter: RowEmitter,
    handle: JoinHandle<Result<SinkReport, DumpError>>,
}

type CsvFile = csv::Writer<BufWriter<File>>;

impl OutputSink {
    pub fn open(dir: &Utf8Path, capacity: usize) -> Result<Self, DumpError> {
        let mut writers = BTreeMap::new();
        for category in Category::ALL {
            let path = dir.join(category.file_name());
            let file = File::create(path.as_std_path())
                .map_err(|err| DumpError::Filesystem(format!("create {path}: {err}")))?;
            let mut writer = csv::Writer::from_writer(BufWriter::new(file));
            writer
                .write_record(category.header())
                .map_err(|err| DumpError::csv(category.file_name(), err))?;
            writers.insert(category, writer);
        }

        let (sender, receiver) = bounded(capacity.max(1));
        let handle = thread::spawn(move || write_rows(writers, receiver));
        Ok(Self {
            emitter: RowEmitter { sender },
            handle,
        })
    }

    pub fn emitter(&self) -> RowEmitter {
        self.emitter.clone()
    }

    /// Closes the queue, waits for the writer to drain it and flushes every file.
    /// Emitters cloned from this sink must be dropped first.
    pub fn finish(self) -> Result<SinkReport, DumpError> {
        drop(self.emitter);
        self.handle
            .join()
            .unwrap_or_else(|_| Err(DumpError::WorkerPanicked("output writer".to_string())))
    }
}

fn write_rows(
    mut writers: BTreeMap<Category, CsvFile>,
    receiver: Receiver<OutputJob>,
) -> Result<SinkReport, DumpError> {
    info!("output writer started");
    let mut report = SinkReport::default();
    for job in receiver {
        let Some(writer) = writers.get_mut(&job.category) else {
            continue;
        };
        if let Err(err) = writer.write_record(&job.row) {
            error!(file = job.category.file_name(), "writing row failed: {err}");
            return Err(DumpError::csv(job.category.file_name(), err));
        }
        *report.rows.entry(job.category).or_insert(0) += 1;
    }

    for (category, writer) in writers {
        info!(file = category.file_name(), rows = report.rows_in(category), "closing output file");
        let buffered = writer
            .into_inner()
            .map_err(|err| DumpError::Filesystem(format!("{}: {err}", category.file_name())))?;
        let file = buffered
            .into_inner()
            .map_err(|err| DumpError::Filesystem(format!("{}: {err}", category.file_name())))?;
        file.sync_all()
            .map_err(|err| DumpError::Filesystem(format!("{}: {err}", category.file_name())))?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn rows_from_many_threads_are_all_written() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let sink = OutputSink::open(&dir, 4).unwrap();

        thread::scope(|scope| {
            for worker in 0..4 {
                let emitter = sink.emitter();
                scope.spawn(move || {
                    for n in 0..50 {
                        emitter
                            .emit(Category::Genus, vec![format!("W{worker}-{n}"), "id".to_string()])
                            .unwrap();
                    }
                });
            }
        });
        let report = sink.finish().unwrap();
        assert_eq!(report.rows_in(Category::Genus), 200);

        let mut reader = csv::Reader::from_path(dir.join("name_strings__genus.csv")).unwrap();
        assert_eq!(reader.records().count(), 200);
        assert_eq!(reader.headers().unwrap(), vec!["genus", "name_uuid"]);
    }
}
