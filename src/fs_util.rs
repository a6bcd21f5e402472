use std::fs::{self, File};
use std::io::Write;

use camino::Utf8Path;
use csv::{ByteRecord, StringRecord};
use tracing::warn;

use crate::error::DumpError;

pub fn ensure_dirs(dirs: &[&Utf8Path]) -> Result<(), DumpError> {
    for dir in dirs {
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| DumpError::Filesystem(format!("create {dir}: {err}")))?;
    }
    Ok(())
}

pub fn csv_reader(path: &Utf8Path, has_headers: bool) -> Result<csv::Reader<File>, DumpError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| DumpError::Filesystem(format!("open {path}: {err}")))?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(file))
}

/// Invalid UTF-8 is replaced field by field; the row is kept.
pub fn decode_record(record: ByteRecord, file: &str) -> StringRecord {
    match StringRecord::from_byte_record(record) {
        Ok(record) => record,
        Err(err) => {
            let raw = err.into_byte_record();
            let line = raw.position().map(|pos| pos.line()).unwrap_or(0);
            warn!(file, line, "invalid UTF-8 in row, replaced with U+FFFD");
            let mut decoded: StringRecord = raw
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect();
            decoded.set_position(raw.position().cloned());
            decoded
        }
    }
}

/// Removes everything inside `dir` but keeps the directory itself.
/// A missing directory is created, so the call is idempotent.
pub fn clean_dir(dir: &Utf8Path) -> Result<(), DumpError> {
    if !dir.as_std_path().exists() {
        return ensure_dirs(&[dir]);
    }
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| DumpError::Filesystem(format!("read {dir}: {err}")))?;
    for entry in entries {
        let path = entry
            .map_err(|err| DumpError::Filesystem(err.to_string()))?
            .path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|err| DumpError::Filesystem(format!("remove {}: {err}", path.display())))?;
    }
    Ok(())
}

pub fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), DumpError> {
    let parent = path
        .parent()
        .ok_or_else(|| DumpError::Filesystem(format!("invalid destination path {path}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| DumpError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("gnidump-out")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| DumpError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| DumpError::Filesystem(err.to_string()))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| DumpError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| DumpError::Filesystem(err.to_string()))?;
    Ok(())
}
