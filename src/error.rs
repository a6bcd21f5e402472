use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DumpError {
    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    #[diagnostic(help("check gnidump.json and the WORKERS_NUMBER / GNIDUMP_* environment"))]
    InvalidConfig(String),

    #[error("parser url is not configured")]
    #[diagnostic(help("set PARSER_URL or `parser_url` in gnidump.json"))]
    MissingParserUrl,

    #[error("staging store error: {0}")]
    Staging(String),

    #[error("failed to encode or decode staged record: {0}")]
    Codec(String),

    #[error("name parser request failed: {0}")]
    ParserHttp(String),

    #[error("name parser returned status {status}: {message}")]
    ParserStatus { status: u16, message: String },

    #[error("malformed name parser response: {0}")]
    MalformedParse(String),

    #[error("csv error in {file}: {message}")]
    Csv { file: String, message: String },

    #[error("{file} line {line}: expected {expected} columns, found {found}")]
    MalformedRow {
        file: String,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("output writer stopped before all rows were written")]
    SinkClosed,

    #[error("worker in phase {0} panicked")]
    WorkerPanicked(String),

    #[error("pipeline stopped after an earlier failure")]
    PipelineStopped,
}

impl DumpError {
    pub fn csv(file: impl Into<String>, err: csv::Error) -> Self {
        DumpError::Csv {
            file: file.into(),
            message: err.to_string(),
        }
    }
}

impl From<sled::Error> for DumpError {
    fn from(err: sled::Error) -> Self {
        DumpError::Staging(err.to_string())
    }
}

impl From<bincode::Error> for DumpError {
    fn from(err: bincode::Error) -> Self {
        DumpError::Codec(err.to_string())
    }
}
