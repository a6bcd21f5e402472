use std::fmt;
use std::sync::LazyLock;

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DumpError;

/// Namespace for name-based ids, itself derived from the DNS name `globalnames.org`.
pub static GN_NAMESPACE: LazyLock<Uuid> =
    LazyLock::new(|| Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"globalnames.org"));

pub fn name_uuid(text: &str) -> String {
    Uuid::new_v5(&GN_NAMESPACE, text.as_bytes()).to_string()
}

/// Semantic word span inside a name. Offsets count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub meaning: String,
    pub start: usize,
    pub end: usize,
}

impl Position {
    pub fn new(meaning: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            meaning: meaning.into(),
            start,
            end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedRecord {
    pub id: String,
    pub id_canonical: String,
    pub name: String,
    pub canonical: String,
    pub canonical_with_rank: String,
    pub surrogate: bool,
    pub positions: Vec<Position>,
}

impl ParsedRecord {
    pub fn unparsed(name: &str) -> Self {
        Self {
            id: name_uuid(name),
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn parsed(
        name: &str,
        canonical: &str,
        canonical_with_rank: &str,
        surrogate: bool,
        positions: Vec<Position>,
    ) -> Self {
        let id_canonical = if canonical.is_empty() {
            String::new()
        } else {
            name_uuid(canonical)
        };
        let canonical_with_rank = if canonical_with_rank == canonical {
            String::new()
        } else {
            canonical_with_rank.to_string()
        };
        Self {
            id: name_uuid(name),
            id_canonical,
            name: name.to_string(),
            canonical: canonical.to_string(),
            canonical_with_rank,
            surrogate,
            positions,
        }
    }

    pub fn with_original(self, id_original: impl Into<String>) -> ParsedName {
        ParsedName {
            id: self.id,
            id_canonical: self.id_canonical,
            id_original: id_original.into(),
            name: self.name,
            canonical: self.canonical,
            canonical_with_rank: self.canonical_with_rank,
            surrogate: self.surrogate,
            positions: self.positions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedName {
    pub id: String,
    pub id_canonical: String,
    pub id_original: String,
    pub name: String,
    pub canonical: String,
    pub canonical_with_rank: String,
    pub surrogate: bool,
    pub positions: Vec<Position>,
}

/// Composite `data_source_id|taxon_id` key used to resolve accepted names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaxonKey(String);

impl TaxonKey {
    pub fn new(data_source_id: &str, taxon_id: &str) -> Self {
        Self(format!("{data_source_id}|{taxon_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TaxonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameStringRow {
    pub id: String,
    pub name: String,
}

impl NameStringRow {
    pub fn from_record(record: &StringRecord, file: &str) -> Result<Self, DumpError> {
        let [id, name] = columns::<2>(record, file)?;
        Ok(Self { id, name })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub data_source_id: String,
    pub name_string_id: String,
    pub url: String,
    pub taxon_id: String,
    pub global_id: String,
    pub local_id: String,
    pub nomenclatural_code_id: String,
    pub rank: String,
    pub accepted_taxon_id: String,
    pub classification_path: String,
    pub classification_path_ids: String,
    pub classification_path_ranks: String,
}

impl IndexRow {
    pub fn from_record(record: &StringRecord, file: &str) -> Result<Self, DumpError> {
        let [
            data_source_id,
            name_string_id,
            url,
            taxon_id,
            global_id,
            local_id,
            nomenclatural_code_id,
            rank,
            accepted_taxon_id,
            classification_path,
            classification_path_ids,
            classification_path_ranks,
        ] = columns::<12>(record, file)?;
        Ok(Self {
            data_source_id,
            name_string_id,
            url,
            taxon_id,
            global_id,
            local_id,
            nomenclatural_code_id,
            rank,
            accepted_taxon_id,
            classification_path,
            classification_path_ids,
            classification_path_ranks,
        })
    }

    pub fn taxon_key(&self) -> TaxonKey {
        TaxonKey::new(&self.data_source_id, &self.taxon_id)
    }

    pub fn accepted_key(&self) -> TaxonKey {
        TaxonKey::new(&self.data_source_id, &self.accepted_taxon_id)
    }

    pub fn is_self_accepted(&self) -> bool {
        self.taxon_id == self.accepted_taxon_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VernacularStringRow {
    pub id: String,
    pub name: String,
}

impl VernacularStringRow {
    pub fn from_record(record: &StringRecord, file: &str) -> Result<Self, DumpError> {
        let [id, name] = columns::<2>(record, file)?;
        Ok(Self { id, name })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VernacularIndexRow {
    pub data_source_id: String,
    pub taxon_id: String,
    pub vernacular_string_id: String,
    pub language: String,
    pub locality: String,
    pub country_code: String,
}

impl VernacularIndexRow {
    pub fn from_record(record: &StringRecord, file: &str) -> Result<Self, DumpError> {
        let [
            data_source_id,
            taxon_id,
            vernacular_string_id,
            language,
            locality,
            country_code,
        ] = columns::<6>(record, file)?;
        Ok(Self {
            data_source_id,
            taxon_id,
            vernacular_string_id,
            language,
            locality,
            country_code,
        })
    }
}

fn columns<const N: usize>(record: &StringRecord, file: &str) -> Result<[String; N], DumpError> {
    if record.len() != N {
        return Err(DumpError::MalformedRow {
            file: file.to_string(),
            line: record.position().map(|pos| pos.line()).unwrap_or(0),
            expected: N,
            found: record.len(),
        });
    }
    Ok(std::array::from_fn(|i| record[i].to_string()))
}
