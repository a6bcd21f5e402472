#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};

use gnidump::config::{DumpPaths, PipelineConfig};
use gnidump::domain::{ParsedRecord, Position};
use gnidump::error::DumpError;
use gnidump::parser::NameParser;

/// Whitespace parser: first word is the genus (or a uninomial when alone),
/// second the specific epithet, four digits a year, anything else an author.
/// Names starting with `!` come back unparsed.
#[derive(Default)]
pub struct MockParser {
    pub calls: Mutex<usize>,
    pub names: Mutex<Vec<String>>,
    pub fail_on: Option<String>,
    pub reverse: bool,
}

impl MockParser {
    pub fn failing_on(name: &str) -> Self {
        Self {
            fail_on: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn reversed() -> Self {
        Self {
            reverse: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    pub fn parsed_names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }
}

impl NameParser for MockParser {
    fn parse_batch(&self, names: &[String]) -> Result<Vec<ParsedRecord>, DumpError> {
        *self.calls.lock().unwrap() += 1;
        self.names.lock().unwrap().extend(names.iter().cloned());
        if let Some(fail_on) = &self.fail_on {
            if names.contains(fail_on) {
                return Err(DumpError::ParserHttp(format!("cannot parse {fail_on}")));
            }
        }
        let mut records: Vec<ParsedRecord> = names.iter().map(|name| mock_parse(name)).collect();
        if self.reverse {
            records.reverse();
        }
        Ok(records)
    }
}

pub fn mock_parse(name: &str) -> ParsedRecord {
    if name.starts_with('!') {
        return ParsedRecord::unparsed(name);
    }
    let mut positions = Vec::new();
    let mut words = Vec::new();
    let mut start = None;
    for (idx, ch) in name.chars().chain(std::iter::once(' ')).enumerate() {
        match (ch == ' ', start) {
            (false, None) => start = Some(idx),
            (true, Some(from)) => {
                words.push((from, idx));
                start = None;
            }
            _ => {}
        }
    }
    let chars: Vec<char> = name.chars().collect();
    for (n, &(from, to)) in words.iter().enumerate() {
        let word: String = chars[from..to].iter().collect();
        let meaning = match n {
            0 if words.len() == 1 => "uninomial",
            0 => "genus",
            1 => "specific_epithet",
            _ if word.len() == 4 && word.chars().all(|c| c.is_ascii_digit()) => "year",
            _ => "author_word",
        };
        positions.push(Position::new(meaning, from, to));
    }
    let canonical: Vec<String> = words
        .iter()
        .take(2)
        .map(|&(from, to)| chars[from..to].iter().collect())
        .collect();
    let canonical = canonical.join(" ");
    ParsedRecord::parsed(name, &canonical, &canonical, false, positions)
}

pub fn utf8_dir(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
}

pub fn pipeline(workers: usize, batch_size: usize) -> PipelineConfig {
    PipelineConfig {
        workers,
        batch_size,
        queue_capacity: 2,
        has_headers: true,
    }
}

pub fn write_csv(path: &Utf8Path, header: &[&str], rows: &[Vec<&str>]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .unwrap();
    writer.write_record(header).unwrap();
    for row in rows {
        writer.write_record(row).unwrap();
    }
    writer.flush().unwrap();
}

pub const NAME_STRINGS_HEADER: &[&str] = &["id", "name"];
pub const INDEX_HEADER: &[&str] = &[
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
];
pub const VERNACULAR_HEADER: &[&str] = &["id", "name"];
pub const VERNACULAR_INDEX_HEADER: &[&str] = &[
    "data_source_id",
    "taxon_id",
    "vernacular_string_id",
    "language",
    "locality",
    "country_code",
];

/// Index row with only the columns the pipeline interprets filled in.
pub fn index_row<'a>(ds: &'a str, name_id: &'a str, taxon: &'a str, accepted: &'a str) -> Vec<&'a str> {
    vec![ds, name_id, "", taxon, "", "", "", "species", accepted, "", "", ""]
}

/// Small dump: a synonym pointing at its accepted name, a self-accepted
/// row, a row whose name is missing and a dangling accepted reference.
pub fn write_dump(paths: &DumpPaths) {
    write_csv(
        &paths.name_strings(),
        NAME_STRINGS_HEADER,
        &[
            vec!["1", "Homo sapiens Linnaeus 1758"],
            vec!["2", "Homo sapiens Linnaeus 1758"],
            vec!["3", "Pan troglodytes"],
            vec!["4", "Aus"],
            vec!["5", "!!!"],
        ],
    );
    write_csv(
        &paths.name_string_indices(),
        INDEX_HEADER,
        &[
            index_row("1", "1", "t1", "t1"),
            index_row("1", "3", "t3", "t1"),
            index_row("1", "99", "t9", "t9"),
            index_row("2", "4", "t4", "gone"),
            index_row("2", "2", "t2", ""),
        ],
    );
    write_csv(
        &paths.vernacular_strings(),
        VERNACULAR_HEADER,
        &[vec!["10", "human"], vec!["11", "chimpanzee"], vec!["12", "human"]],
    );
    write_csv(
        &paths.vernacular_string_indices(),
        VERNACULAR_INDEX_HEADER,
        &[
            vec!["1", "t1", "10", "en", "", "GB"],
            vec!["1", "t3", "11", "en", "", ""],
            vec!["1", "t3", "77", "en", "", ""],
        ],
    );
}

pub fn read_rows(path: &Utf8Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect()
}

pub fn row_set(path: &Utf8Path) -> BTreeSet<Vec<String>> {
    read_rows(path).into_iter().collect()
}
