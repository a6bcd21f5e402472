use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::domain::{ParsedName, TaxonKey};
use crate::error::DumpError;
use crate::fs_util;

const TAXA_TREE: &str = "taxa";

/// One parsed name is reachable by its own id and by every source row id
/// that referenced it. The `taxa` tree maps `data_source_id|taxon_id` to the
/// subject name-string id.
#[derive(Clone)]
pub struct StagingStore {
    db: sled::Db,
    taxa: sled::Tree,
    path: Option<Utf8PathBuf>,
}

impl StagingStore {
    pub fn open(path: &Utf8Path) -> Result<Self, DumpError> {
        info!(path = %path, "opening staging store");
        let db = sled::open(path.as_std_path())
            .map_err(|err| DumpError::Staging(format!("open {path}: {err}")))?;
        let taxa = db.open_tree(TAXA_TREE)?;
        Ok(Self {
            db,
            taxa,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn reset(path: &Utf8Path) -> Result<Self, DumpError> {
        info!(path = %path, "cleaning up staging store");
        fs_util::clean_dir(path)?;
        Self::open(path)
    }

    pub fn temporary() -> Result<Self, DumpError> {
        let db = sled::Config::new().temporary(true).open()?;
        let taxa = db.open_tree(TAXA_TREE)?;
        Ok(Self {
            db,
            taxa,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    pub fn apply(&self, batch: StagingBatch) -> Result<(), DumpError> {
        if batch.names_len > 0 {
            self.db.apply_batch(batch.names)?;
        }
        if batch.taxa_len > 0 {
            self.taxa.apply_batch(batch.taxa)?;
        }
        Ok(())
    }

    pub fn get_parsed(&self, id: &str) -> Result<Option<ParsedName>, DumpError> {
        match self.db.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_taxon_subject(&self, key: &TaxonKey) -> Result<Option<String>, DumpError> {
        match self.taxa.get(key.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|err| DumpError::Codec(format!("taxon key {key}: {err}"))),
            None => Ok(None),
        }
    }

    pub fn clear_taxa(&self) -> Result<(), DumpError> {
        self.taxa.clear()?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), DumpError> {
        self.db.flush()?;
        self.taxa.flush()?;
        Ok(())
    }
}

#[derive(Default)]
pub struct StagingBatch {
    names: sled::Batch,
    taxa: sled::Batch,
    names_len: usize,
    taxa_len: usize,
}

impl StagingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_by_own_id(&mut self, name: &ParsedName) -> Result<(), DumpError> {
        let value = bincode::serialize(name)?;
        self.names.insert(name.id.as_bytes(), value);
        self.names_len += 1;
        Ok(())
    }

    pub fn put_by_alias_id(&mut self, name: &ParsedName) -> Result<(), DumpError> {
        if name.id_original.is_empty() {
            return Ok(());
        }
        let value = bincode::serialize(name)?;
        self.names.insert(name.id_original.as_bytes(), value);
        self.names_len += 1;
        Ok(())
    }

    pub fn put_taxon_subject(&mut self, key: &TaxonKey, name_string_id: &str) {
        self.taxa.insert(key.as_bytes(), name_string_id.as_bytes());
        self.taxa_len += 1;
    }

    pub fn len(&self) -> usize {
        self.names_len + self.taxa_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParsedRecord, Position};

    #[test]
    fn alias_and_own_id_resolve_to_same_record() {
        let store = StagingStore::temporary().unwrap();
        let name = ParsedRecord::parsed(
            "Homo sapiens",
            "Homo sapiens",
            "Homo sapiens",
            false,
            vec![Position::new("genus", 0, 4)],
        )
        .with_original("42");

        let mut batch = StagingBatch::new();
        batch.put_by_own_id(&name).unwrap();
        batch.put_by_alias_id(&name).unwrap();
        assert_eq!(batch.len(), 2);
        store.apply(batch).unwrap();

        assert_eq!(store.get_parsed(&name.id).unwrap(), Some(name.clone()));
        assert_eq!(store.get_parsed("42").unwrap(), Some(name));
        assert_eq!(store.get_parsed("43").unwrap(), None);
    }

    #[test]
    fn taxa_keys_are_separate_from_names() {
        let store = StagingStore::temporary().unwrap();
        let key = TaxonKey::new("1", "t-7");
        let mut batch = StagingBatch::new();
        batch.put_taxon_subject(&key, "42");
        store.apply(batch).unwrap();

        assert_eq!(store.get_taxon_subject(&key).unwrap().as_deref(), Some("42"));
        assert_eq!(store.get_parsed(key.as_str()).unwrap(), None);

        store.clear_taxa().unwrap();
        assert_eq!(store.get_taxon_subject(&key).unwrap(), None);
    }
}
