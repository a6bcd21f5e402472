use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::DumpError;

pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_PARSER_TIMEOUT_SECS: u64 = 60;
const CONFIG_FILE: &str = "gnidump.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    #[serde(default)]
    pub root_dir: Option<String>,
    #[serde(default)]
    pub staging_dir: Option<String>,
    #[serde(default)]
    pub source_dir: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub parser_url: Option<String>,
    #[serde(default)]
    pub parser_timeout_secs: Option<u64>,
    #[serde(default)]
    pub has_headers: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub workers: usize,
    pub batch_size: usize,
    pub queue_capacity: usize,
    pub has_headers: bool,
}

impl PipelineConfig {
    pub fn with_workers(self, workers: usize) -> Self {
        Self {
            workers,
            queue_capacity: default_queue_capacity(workers),
            ..self
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let workers = default_workers();
        Self {
            workers,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: default_queue_capacity(workers),
            has_headers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpPaths {
    pub staging_dir: Utf8PathBuf,
    pub source_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
}

impl DumpPaths {
    pub fn under(root: &Utf8Path) -> Self {
        Self {
            staging_dir: root.join("staging"),
            source_dir: root.join("gni_mysql"),
            output_dir: root.join("gnindex_pg"),
        }
    }

    pub fn name_strings(&self) -> Utf8PathBuf {
        self.source_dir.join("name_strings.csv")
    }

    pub fn name_string_indices(&self) -> Utf8PathBuf {
        self.source_dir.join("name_string_indices.csv")
    }

    pub fn vernacular_strings(&self) -> Utf8PathBuf {
        self.source_dir.join("vernacular_strings.csv")
    }

    pub fn vernacular_string_indices(&self) -> Utf8PathBuf {
        self.source_dir.join("vernacular_string_indices.csv")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    pub url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub pipeline: PipelineConfig,
    pub paths: DumpPaths,
    pub parser: ParserConfig,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// File (explicit path, else `gnidump.json` when present), then environment.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DumpError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        let config = if path.is_some() || config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| DumpError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| DumpError::ConfigParse(err.to_string()))?
        } else {
            Config::default()
        };

        let config = Self::apply_env(config, |key| std::env::var(key).ok())?;
        Self::resolve_config(config)
    }

    pub fn apply_env<F>(mut config: Config, lookup: F) -> Result<Config, DumpError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(value) = var("WORKERS_NUMBER") {
            config.workers = Some(parse_number("WORKERS_NUMBER", &value)?);
        }
        if let Some(value) = var("GNIDUMP_BATCH_SIZE") {
            config.batch_size = Some(parse_number("GNIDUMP_BATCH_SIZE", &value)?);
        }
        if let Some(value) = var("PARSER_URL") {
            config.parser_url = Some(value.trim().to_string());
        }
        if let Some(value) = var("GNIDUMP_STAGING_DIR") {
            config.staging_dir = Some(value);
        }
        if let Some(value) = var("GNIDUMP_SOURCE_DIR") {
            config.source_dir = Some(value);
        }
        if let Some(value) = var("GNIDUMP_OUTPUT_DIR") {
            config.output_dir = Some(value);
        }
        Ok(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, DumpError> {
        let workers = config.workers.unwrap_or_else(default_workers);
        if workers == 0 {
            return Err(DumpError::InvalidConfig("workers must be at least 1".to_string()));
        }
        let batch_size = config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(DumpError::InvalidConfig("batch_size must be at least 1".to_string()));
        }
        let queue_capacity = config
            .queue_capacity
            .unwrap_or_else(|| default_queue_capacity(workers));
        if queue_capacity == 0 {
            return Err(DumpError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }

        let root = match config.root_dir {
            Some(root) => Utf8PathBuf::from(root),
            None => default_root()?,
        };
        let defaults = DumpPaths::under(&root);
        let paths = DumpPaths {
            staging_dir: config
                .staging_dir
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            source_dir: config
                .source_dir
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.source_dir),
            output_dir: config
                .output_dir
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.output_dir),
        };

        Ok(ResolvedConfig {
            pipeline: PipelineConfig {
                workers,
                batch_size,
                queue_capacity,
                has_headers: config.has_headers.unwrap_or(true),
            },
            paths,
            parser: ParserConfig {
                url: config.parser_url,
                timeout: Duration::from_secs(
                    config
                        .parser_timeout_secs
                        .unwrap_or(DEFAULT_PARSER_TIMEOUT_SECS),
                ),
            },
        })
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

pub fn default_queue_capacity(workers: usize) -> usize {
    (workers * 2).max(4)
}

fn default_root() -> Result<Utf8PathBuf, DumpError> {
    BaseDirs::new()
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.data_local_dir().join("gnidump")).ok())
        .ok_or_else(|| DumpError::InvalidConfig("unable to resolve data directory".to_string()))
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, DumpError> {
    value
        .trim()
        .parse()
        .map_err(|_| DumpError::InvalidConfig(format!("{key} must be a number, got '{value}'")))
}
