use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::Utf8Path;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::domain::NameStringRow;
use crate::error::DumpError;
use crate::fs_util;
use crate::parser::NameParser;
use crate::pool::WorkerPool;
use crate::store::{StagingBatch, StagingStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameJob {
    pub name: String,
    pub source_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConvertSummary {
    pub source_rows: usize,
    pub unique_names: usize,
    pub batches: usize,
    pub parsed_records: usize,
    pub alias_keys: usize,
    pub unparsed_names: usize,
}

pub fn read_name_strings(
    path: &Utf8Path,
    has_headers: bool,
) -> Result<Vec<NameStringRow>, DumpError> {
    info!(path = %path, "reading name strings");
    let file = path.file_name().unwrap_or(path.as_str());
    let mut reader = fs_util::csv_reader(path, has_headers)?;
    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|err| DumpError::csv(file, err))?;
        let record = fs_util::decode_record(record, file);
        rows.push(NameStringRow::from_record(&record, file)?);
    }
    Ok(rows)
}

pub fn unique_names(rows: Vec<NameStringRow>) -> Vec<NameJob> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut jobs: Vec<NameJob> = Vec::new();
    for row in rows {
        match index.get(&row.name) {
            Some(&at) => jobs[at].source_ids.push(row.id),
            None => {
                index.insert(row.name.clone(), jobs.len());
                jobs.push(NameJob {
                    name: row.name,
                    source_ids: vec![row.id],
                });
            }
        }
    }
    jobs
}

#[derive(Default)]
struct Counters {
    batches: AtomicUsize,
    parsed_records: AtomicUsize,
    alias_keys: AtomicUsize,
    unparsed_names: AtomicUsize,
}

pub struct Converter<'a, P: NameParser> {
    config: PipelineConfig,
    parser: &'a P,
}

impl<'a, P: NameParser> Converter<'a, P> {
    pub fn new(config: PipelineConfig, parser: &'a P) -> Self {
        Self { config, parser }
    }

    pub fn run(
        &self,
        store: &StagingStore,
        name_strings: &Utf8Path,
    ) -> Result<ConvertSummary, DumpError> {
        let rows = read_name_strings(name_strings, self.config.has_headers)?;
        let source_rows = rows.len();
        let jobs = unique_names(rows);
        info!(source_rows, unique_names = jobs.len(), "getting names parsed");
        self.stage(store, jobs)
    }

    pub fn stage(
        &self,
        store: &StagingStore,
        jobs: Vec<NameJob>,
    ) -> Result<ConvertSummary, DumpError> {
        let unique_names = jobs.len();
        let source_rows = jobs.iter().map(|job| job.source_ids.len()).sum();
        let counters = Counters::default();
        let pool = WorkerPool::new(self.config.workers, self.config.queue_capacity);
        let batch_size = self.config.batch_size.max(1);

        pool.run(
            "convert",
            |queue| {
                let mut jobs = jobs.into_iter().peekable();
                let mut batch_no = 0usize;
                while jobs.peek().is_some() {
                    batch_no += 1;
                    let chunk: Vec<NameJob> = jobs.by_ref().take(batch_size).collect();
                    queue.push((batch_no, chunk))?;
                }
                Ok(())
            },
            |worker, (batch_no, chunk)| {
                self.stage_chunk(store, &counters, worker, batch_no, chunk)
            },
        )?;
        store.flush()?;

        Ok(ConvertSummary {
            source_rows,
            unique_names,
            batches: counters.batches.into_inner(),
            parsed_records: counters.parsed_records.into_inner(),
            alias_keys: counters.alias_keys.into_inner(),
            unparsed_names: counters.unparsed_names.into_inner(),
        })
    }

    fn stage_chunk(
        &self,
        store: &StagingStore,
        counters: &Counters,
        worker: usize,
        batch_no: usize,
        chunk: Vec<NameJob>,
    ) -> Result<(), DumpError> {
        let names: Vec<String> = chunk.iter().map(|job| job.name.clone()).collect();
        let records = self.parser.parse_batch(&names)?;

        let sources: HashMap<&str, &[String]> = chunk
            .iter()
            .map(|job| (job.name.as_str(), job.source_ids.as_slice()))
            .collect();
        let mut seen: HashSet<&str> = HashSet::with_capacity(chunk.len());
        let mut batch = StagingBatch::new();
        let mut parsed_records = 0usize;
        let mut alias_keys = 0usize;
        let mut first_canonical = None;

        for record in records {
            let Some((&name, &source_ids)) = sources.get_key_value(record.name.as_str()) else {
                warn!(worker, batch = batch_no, name = %record.name, "parser returned a name that was not requested");
                continue;
            };
            let Some((first_id, other_ids)) = source_ids.split_first() else {
                continue;
            };
            seen.insert(name);
            let parsed = record.with_original(first_id.as_str());
            if first_canonical.is_none() && !parsed.canonical.is_empty() {
                first_canonical = Some(parsed.canonical.clone());
            }
            batch.put_by_own_id(&parsed)?;
            let staged = batch.len();
            batch.put_by_alias_id(&parsed)?;
            let mut aliased = parsed;
            for id in other_ids {
                aliased.id_original = id.clone();
                batch.put_by_alias_id(&aliased)?;
            }
            alias_keys += batch.len() - staged;
            parsed_records += 1;
        }

        let unparsed = chunk.len() - seen.len();
        if unparsed > 0 {
            for job in chunk.iter().filter(|job| !seen.contains(job.name.as_str())) {
                warn!(worker, batch = batch_no, name = %job.name, "no parse result for name");
            }
        }

        store.apply(batch)?;
        counters.batches.fetch_add(1, Ordering::Relaxed);
        counters.parsed_records.fetch_add(parsed_records, Ordering::Relaxed);
        counters.alias_keys.fetch_add(alias_keys, Ordering::Relaxed);
        counters.unparsed_names.fetch_add(unparsed, Ordering::Relaxed);
        info!(
            worker,
            batch = batch_no,
            names = chunk.len(),
            "parsed '{}'",
            first_canonical.as_deref().unwrap_or("")
        );
        Ok(())
    }
}
