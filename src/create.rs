use std::collections::{BTreeMap, HashMap, HashSet};
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::canonicals::{CanonicalCollector, CanonicalReporter};
use crate::config::{DumpPaths, PipelineConfig};
use crate::convert::{NameJob, read_name_strings, unique_names};
use crate::domain::{IndexRow, ParsedName, VernacularIndexRow, VernacularStringRow, name_uuid};
use crate::error::DumpError;
use crate::fs_util;
use crate::pool::WorkerPool;
use crate::sink::{Category, OutputSink, RowEmitter};
use crate::store::{StagingBatch, StagingStore};
use crate::words::{self, word_rows};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateSummary {
    pub name_strings: usize,
    pub missing_names: usize,
    pub taxon_keys: usize,
    pub index_rows: usize,
    pub broken_rows: usize,
    pub unresolved_accepted: usize,
    pub vernacular_strings: usize,
    pub vernacular_index_rows: usize,
    pub broken_vernacular_rows: usize,
    pub canonicals: usize,
    pub files: BTreeMap<Category, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedName {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIndexRow {
    pub source: IndexRow,
    pub subject: ParsedName,
    pub accepted: Option<AcceptedName>,
    pub accepted_missing: bool,
}

impl ResolvedIndexRow {
    pub fn to_record(&self) -> Vec<String> {
        let row = &self.source;
        let (accepted_taxon_id, accepted_id, accepted_name) = match &self.accepted {
            Some(accepted) => (
                row.accepted_taxon_id.clone(),
                accepted.id.clone(),
                accepted.name.clone(),
            ),
            None => (String::new(), String::new(), String::new()),
        };
        vec![
            row.data_source_id.clone(),
            self.subject.id.clone(),
            row.url.clone(),
            row.taxon_id.clone(),
            row.global_id.clone(),
            row.local_id.clone(),
            row.nomenclatural_code_id.clone(),
            row.rank.clone(),
            accepted_taxon_id,
            row.classification_path.clone(),
            row.classification_path_ids.clone(),
            row.classification_path_ranks.clone(),
            accepted_id,
            accepted_name,
        ]
    }
}

/// `Ok(None)` is a broken reference: the subject name was never staged.
pub fn resolve_index_row(
    store: &StagingStore,
    row: &IndexRow,
) -> Result<Option<ResolvedIndexRow>, DumpError> {
    let Some(subject) = store.get_parsed(&row.name_string_id)? else {
        return Ok(None);
    };
    if row.is_self_accepted() || row.accepted_taxon_id.is_empty() {
        return Ok(Some(ResolvedIndexRow {
            source: row.clone(),
            subject,
            accepted: None,
            accepted_missing: false,
        }));
    }

    let accepted = match store.get_taxon_subject(&row.accepted_key())? {
        Some(name_string_id) => store.get_parsed(&name_string_id)?.map(|parsed| AcceptedName {
            id: parsed.id,
            name: parsed.name,
        }),
        None => None,
    };
    Ok(Some(ResolvedIndexRow {
        source: row.clone(),
        subject,
        accepted_missing: accepted.is_none(),
        accepted,
    }))
}

#[derive(Default)]
struct Counters {
    name_strings: AtomicUsize,
    missing_names: AtomicUsize,
    index_rows: AtomicUsize,
    broken_rows: AtomicUsize,
    unresolved_accepted: AtomicUsize,
}

pub struct Resolver<'a> {
    config: PipelineConfig,
    store: &'a StagingStore,
    current_year: i32,
}

impl<'a> Resolver<'a> {
    pub fn new(config: PipelineConfig, store: &'a StagingStore) -> Self {
        Self {
            config,
            store,
            current_year: words::current_year(),
        }
    }

    pub fn with_current_year(self, current_year: i32) -> Self {
        Self {
            current_year,
            ..self
        }
    }

    fn pool(&self) -> WorkerPool {
        WorkerPool::new(self.config.workers, self.config.queue_capacity)
    }

    pub fn run(&self, paths: &DumpPaths) -> Result<CreateSummary, DumpError> {
        let output_dir = paths.output_dir.as_path();
        fs_util::ensure_dirs(&[output_dir])?;
        self.store.clear_taxa()?;

        let sink = OutputSink::open(output_dir, self.config.queue_capacity * 64)?;
        let collector = CanonicalCollector::spawn(self.config.queue_capacity * 64);
        let counters = Counters::default();
        let mut summary = CreateSummary::default();

        let outcome = self.export(
            paths,
            &sink.emitter(),
            &collector.reporter(),
            &counters,
            &mut summary,
        );

        let report = match (outcome, sink.finish()) {
            (Ok(()), Ok(report)) => report,
            (Err(DumpError::SinkClosed) | Ok(()), Err(err)) => return Err(err),
            (Err(err), _) => return Err(err),
        };
        summary.canonicals = collector.finish(output_dir)?;
        summary.name_strings = counters.name_strings.into_inner();
        summary.missing_names = counters.missing_names.into_inner();
        summary.index_rows = counters.index_rows.into_inner();
        summary.broken_rows = counters.broken_rows.into_inner();
        summary.unresolved_accepted = counters.unresolved_accepted.into_inner();
        summary.files = report.rows;
        Ok(summary)
    }

    fn export(
        &self,
        paths: &DumpPaths,
        emitter: &RowEmitter,
        reporter: &CanonicalReporter,
        counters: &Counters,
        summary: &mut CreateSummary,
    ) -> Result<(), DumpError> {
        self.export_name_strings(&paths.name_strings(), emitter, counters)?;
        summary.taxon_keys = self.stage_taxon_keys(&paths.name_string_indices())?;
        self.export_index(&paths.name_string_indices(), emitter, reporter, counters)?;
        self.export_vernaculars(
            &paths.vernacular_strings(),
            &paths.vernacular_string_indices(),
            emitter,
            summary,
        )
    }

    fn export_name_strings(
        &self,
        path: &Utf8Path,
        emitter: &RowEmitter,
        counters: &Counters,
    ) -> Result<(), DumpError> {
        let jobs = unique_names(read_name_strings(path, self.config.has_headers)?);
        info!(names = jobs.len(), "exporting name strings");
        let batch_size = self.config.batch_size.max(1);

        self.pool().run(
            "name_strings",
            |queue| {
                let mut jobs = jobs.into_iter().peekable();
                while jobs.peek().is_some() {
                    queue.push(jobs.by_ref().take(batch_size).collect::<Vec<NameJob>>())?;
                }
                Ok(())
            },
            |worker, chunk| {
                for job in &chunk {
                    let Some(source_id) = job.source_ids.first() else {
                        continue;
                    };
                    let Some(parsed) = self.store.get_parsed(source_id)? else {
                        warn!(worker, id = %source_id, name = %job.name, "name string missing from staging store");
                        counters.missing_names.fetch_add(1, Ordering::Relaxed);
                        continue;
                    };
                    for word in word_rows(&parsed, self.current_year) {
                        let (category, record) = word.into_record();
                        emitter.emit(category, record)?;
                    }
                    emitter.emit(
                        Category::NameStrings,
                        vec![
                            parsed.id,
                            parsed.name,
                            parsed.id_canonical,
                            parsed.canonical,
                            parsed.surrogate.to_string(),
                        ],
                    )?;
                    counters.name_strings.fetch_add(1, Ordering::Relaxed);
                }
                debug!(worker, names = chunk.len(), "name strings batch exported");
                Ok(())
            },
        )
    }

    // Must finish before any index worker starts: an accepted taxon may sit
    // anywhere in the file. On a repeated key the last row wins.
    fn stage_taxon_keys(&self, path: &Utf8Path) -> Result<usize, DumpError> {
        info!(path = %path, "staging taxon keys");
        let file = path.file_name().unwrap_or(path.as_str());
        let batch_size = self.config.batch_size.max(1);
        let mut reader = fs_util::csv_reader(path, self.config.has_headers)?;
        let mut batch = StagingBatch::new();
        let mut staged = 0usize;

        for record in reader.byte_records() {
            let record = record.map_err(|err| DumpError::csv(file, err))?;
            let record = fs_util::decode_record(record, file);
            let row = IndexRow::from_record(&record, file)?;
            batch.put_taxon_subject(&row.taxon_key(), &row.name_string_id);
            if batch.len() >= batch_size {
                staged += batch.len();
                self.store.apply(mem::take(&mut batch))?;
                debug!(staged, "saved taxon keys");
            }
        }
        staged += batch.len();
        self.store.apply(batch)?;
        self.store.flush()?;
        info!(staged, "taxon keys staged");
        Ok(staged)
    }

    fn export_index(
        &self,
        path: &Utf8Path,
        emitter: &RowEmitter,
        reporter: &CanonicalReporter,
        counters: &Counters,
    ) -> Result<(), DumpError> {
        info!(path = %path, "exporting name string indices");
        let file = path.file_name().unwrap_or(path.as_str());
        let batch_size = self.config.batch_size.max(1);

        self.pool().run(
            "index",
            |queue| {
                let mut reader = fs_util::csv_reader(path, self.config.has_headers)?;
                let mut rows = Vec::with_capacity(batch_size);
                for record in reader.byte_records() {
                    let record = record.map_err(|err| DumpError::csv(file, err))?;
                    let record = fs_util::decode_record(record, file);
                    rows.push(IndexRow::from_record(&record, file)?);
                    if rows.len() == batch_size {
                        queue.push(mem::replace(&mut rows, Vec::with_capacity(batch_size)))?;
                    }
                }
                if !rows.is_empty() {
                    queue.push(rows)?;
                }
                Ok(())
            },
            |worker, rows| {
                if let Some(first) = rows.first() {
                    debug!(worker, data_source_id = %first.data_source_id, rows = rows.len(), "index batch");
                }
                for row in &rows {
                    let Some(resolved) = resolve_index_row(self.store, row)? else {
                        warn!(
                            data_source_id = %row.data_source_id,
                            name_string_id = %row.name_string_id,
                            taxon_id = %row.taxon_id,
                            "broken record: subject name not staged"
                        );
                        counters.broken_rows.fetch_add(1, Ordering::Relaxed);
                        continue;
                    };
                    if resolved.accepted_missing {
                        debug!(
                            data_source_id = %row.data_source_id,
                            accepted_taxon_id = %row.accepted_taxon_id,
                            "accepted name not resolved"
                        );
                        counters.unresolved_accepted.fetch_add(1, Ordering::Relaxed);
                    }
                    reporter.report(&resolved.subject.canonical, &row.data_source_id)?;
                    emitter.emit(Category::Index, resolved.to_record())?;
                    counters.index_rows.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            },
        )
    }

    fn export_vernaculars(
        &self,
        strings_path: &Utf8Path,
        indices_path: &Utf8Path,
        emitter: &RowEmitter,
        summary: &mut CreateSummary,
    ) -> Result<(), DumpError> {
        info!(path = %strings_path, "exporting vernacular strings");
        let file = strings_path.file_name().unwrap_or(strings_path.as_str());
        let mut uuids: HashMap<String, String> = HashMap::new();
        let mut emitted: HashSet<String> = HashSet::new();
        let mut reader = fs_util::csv_reader(strings_path, self.config.has_headers)?;
        for record in reader.byte_records() {
            let record = record.map_err(|err| DumpError::csv(file, err))?;
            let record = fs_util::decode_record(record, file);
            let row = VernacularStringRow::from_record(&record, file)?;
            let uuid = name_uuid(&row.name);
            if emitted.insert(uuid.clone()) {
                emitter.emit(Category::Vernacular, vec![uuid.clone(), row.name])?;
                summary.vernacular_strings += 1;
            }
            uuids.insert(row.id, uuid);
        }

        info!(path = %indices_path, "exporting vernacular string indices");
        let file = indices_path.file_name().unwrap_or(indices_path.as_str());
        let mut reader = fs_util::csv_reader(indices_path, self.config.has_headers)?;
        for record in reader.byte_records() {
            let record = record.map_err(|err| DumpError::csv(file, err))?;
            let record = fs_util::decode_record(record, file);
            let row = VernacularIndexRow::from_record(&record, file)?;
            let Some(uuid) = uuids.get(&row.vernacular_string_id) else {
                warn!(
                    data_source_id = %row.data_source_id,
                    vernacular_string_id = %row.vernacular_string_id,
                    "broken vernacular record"
                );
                summary.broken_vernacular_rows += 1;
                continue;
            };
            emitter.emit(
                Category::VernacularIndex,
                vec![
                    row.data_source_id,
                    row.taxon_id,
                    uuid.clone(),
                    row.language,
                    row.locality,
                    row.country_code,
                ],
            )?;
            summary.vernacular_index_rows += 1;
        }
        Ok(())
    }
}
