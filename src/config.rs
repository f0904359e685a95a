//! Configuration management.
//!
//! Settings load from an optional TOML file, then environment variables
//! override individual fields. `dotenvy` is loaded by `main` before any of
//! this runs, so a local `.env` participates in the override pass.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::repository::AsyncSqlitePool;

/// Default ceiling on rows a single bulk delete may remove.
pub const DEFAULT_BULK_DELETE_LIMIT: i64 = 500_000;
/// Default attempts for downloading an uploaded document.
pub const DEFAULT_DOWNLOAD_RETRIES: u32 = 3;
/// Default fixed delay between download attempts, in seconds.
pub const DEFAULT_DOWNLOAD_RETRY_DELAY_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("failed to create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory holding the database and any working files.
    pub data_dir: PathBuf,
    /// SQLite database path or `sqlite:` URL. Defaults to
    /// `<data_dir>/cranewatch.db` when empty.
    pub database_url: String,
    /// User ids allowed to upload exports and delete data.
    pub admin_ids: Vec<i64>,
    /// Refuse bulk deletes that would remove more rows than this.
    pub bulk_delete_limit: i64,
    /// Attempts when downloading an uploaded document.
    pub download_retries: u32,
    /// Fixed delay between download attempts, in seconds.
    pub download_retry_delay_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            database_url: String::new(),
            admin_ids: Vec::new(),
            bulk_delete_limit: DEFAULT_BULK_DELETE_LIMIT,
            download_retries: DEFAULT_DOWNLOAD_RETRIES,
            download_retry_delay_secs: DEFAULT_DOWNLOAD_RETRY_DELAY_SECS,
        }
    }
}

impl Settings {
    /// Load settings: file (if present), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) if path.exists() => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            _ => Self::default(),
        };
        settings.apply_env()?;
        debug!(data_dir = %settings.data_dir.display(), "settings loaded");
        Ok(settings)
    }

    /// Apply `CRANEWATCH_*` environment variable overrides.
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = env::var("CRANEWATCH_DATA_DIR") {
            self.data_dir = PathBuf::from(value);
        }
        if let Ok(value) = env::var("CRANEWATCH_DATABASE_URL") {
            self.database_url = value;
        }
        if let Ok(value) = env::var("CRANEWATCH_ADMIN_IDS") {
            self.admin_ids = parse_id_list(&value)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "CRANEWATCH_ADMIN_IDS",
                    value: value.clone(),
                })?;
        }
        if let Ok(value) = env::var("CRANEWATCH_BULK_DELETE_LIMIT") {
            self.bulk_delete_limit = value.parse().map_err(|_| ConfigError::Invalid {
                key: "CRANEWATCH_BULK_DELETE_LIMIT",
                value: value.clone(),
            })?;
        }
        Ok(())
    }

    /// Create the data directory if missing.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| ConfigError::DataDir {
            path: self.data_dir.clone(),
            source,
        })
    }

    /// Effective database URL, defaulting into the data directory.
    pub fn effective_database_url(&self) -> String {
        if self.database_url.is_empty() {
            self.data_dir.join("cranewatch.db").display().to_string()
        } else {
            self.database_url.clone()
        }
    }

    pub fn pool(&self) -> AsyncSqlitePool {
        AsyncSqlitePool::new(&self.effective_database_url())
    }
}

/// Comma-separated id list, e.g. `"11,22,33"`.
fn parse_id_list(value: &str) -> Option<Vec<i64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_when_no_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.bulk_delete_limit, DEFAULT_BULK_DELETE_LIMIT);
        assert_eq!(settings.download_retries, DEFAULT_DOWNLOAD_RETRIES);
        assert!(settings.admin_ids.is_empty());
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cranewatch.toml");
        fs::write(
            &path,
            "data_dir = \"/tmp/cw\"\nadmin_ids = [11, 22]\nbulk_delete_limit = 1000\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/cw"));
        assert_eq!(settings.admin_ids, vec![11, 22]);
        assert_eq!(settings.bulk_delete_limit, 1000);
    }

    #[test]
    fn id_list_parsing() {
        assert_eq!(parse_id_list("11, 22,33"), Some(vec![11, 22, 33]));
        assert_eq!(parse_id_list(""), Some(vec![]));
        assert_eq!(parse_id_list("11,abc"), None);
    }

    #[test]
    fn database_url_defaults_into_data_dir() {
        let settings = Settings {
            data_dir: PathBuf::from("/var/lib/cw"),
            ..Settings::default()
        };
        assert_eq!(settings.effective_database_url(), "/var/lib/cw/cranewatch.db");
    }
}
