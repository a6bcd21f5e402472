use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunSummary};
use crate::convert::ConvertSummary;
use crate::create::CreateSummary;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_convert(summary: &ConvertSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_create(summary: &CreateSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_run(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => tracing::info!("{}", event.message),
        }
    }
}

pub fn print_convert_summary(summary: &ConvertSummary) {
    println!("convert summary");
    println!("  source rows:    {}", summary.source_rows);
    println!("  unique names:   {}", summary.unique_names);
    println!("  batches:        {}", summary.batches);
    println!("  parsed records: {}", summary.parsed_records);
    println!("  alias keys:     {}", summary.alias_keys);
    if summary.unparsed_names > 0 {
        println!("  unparsed names: {}", summary.unparsed_names);
    }
}

pub fn print_create_summary(summary: &CreateSummary) {
    println!("create summary");
    println!("  name strings:        {}", summary.name_strings);
    println!("  taxon keys:          {}", summary.taxon_keys);
    println!("  index rows:          {}", summary.index_rows);
    println!("  broken rows:         {}", summary.broken_rows);
    println!("  unresolved accepted: {}", summary.unresolved_accepted);
    println!("  vernacular strings:  {}", summary.vernacular_strings);
    println!("  vernacular indices:  {}", summary.vernacular_index_rows);
    println!("  canonicals:          {}", summary.canonicals);
    if summary.missing_names > 0 {
        println!("  missing names:       {}", summary.missing_names);
    }
    if summary.broken_vernacular_rows > 0 {
        println!("  broken vernaculars:  {}", summary.broken_vernacular_rows);
    }
    for (category, rows) in &summary.files {
        println!("  {:<32} {rows}", category.file_name());
    }
}
