//! Board configuration loaded from TOML.
//!
//! # Responsibility
//! - Describe every tunable of a board process in one serde model.
//! - Reject configurations that would make core operations misbehave.
//!
//! # Invariants
//! - Every section has defaults; an empty file is a valid config.
//! - `validate()` runs on every load path.

use crate::blob::UploadPolicy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_DB_FILE_NAME: &str = "stickyboard.sqlite3";
const DEFAULT_URL_TTL_SECS: u64 = 60 * 60;
const DEFAULT_UPLOAD_TTL_SECS: u64 = 15 * 60;
const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config syntax: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Top-level board configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    pub logging: LoggingConfig,
    pub blob: BlobConfig,
    pub upload: UploadPolicy,
    pub live: LiveConfig,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            logging: LoggingConfig::default(),
            blob: BlobConfig::default(),
            upload: UploadPolicy::default(),
            live: LiveConfig::default(),
        }
    }
}

/// Logging section. File logging stays off while `dir` is unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Filesystem blob store section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    pub root: PathBuf,
    /// Prefix of issued upload and read URLs.
    pub base_url: String,
    /// Secret the read-URL MAC key is derived from.
    pub signing_key: String,
    pub url_ttl_secs: u64,
    pub upload_ttl_secs: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("blobs"),
            base_url: "http://localhost:8080/blobs".to_string(),
            signing_key: "stickyboard-dev-signing-key".to_string(),
            url_ttl_secs: DEFAULT_URL_TTL_SECS,
            upload_ttl_secs: DEFAULT_UPLOAD_TTL_SECS,
        }
    }
}

/// Live query propagation section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Queued change notifications per subscriber before it is dropped.
    pub subscriber_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl BoardConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("db_path must not be empty".to_string()));
        }
        if self.blob.signing_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "blob.signing_key must not be blank".to_string(),
            ));
        }
        if self.blob.url_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "blob.url_ttl_secs must be > 0".to_string(),
            ));
        }
        if self.upload.max_bytes == 0 {
            return Err(ConfigError::Invalid(
                "upload.max_bytes must be > 0".to_string(),
            ));
        }
        if self.upload.allowed_content_types.is_empty() {
            return Err(ConfigError::Invalid(
                "upload.allowed_content_types must list at least one type".to_string(),
            ));
        }
        if self.live.subscriber_capacity == 0 {
            return Err(ConfigError::Invalid(
                "live.subscriber_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BoardConfig, ConfigError};
    use crate::blob::DEFAULT_MAX_UPLOAD_BYTES;
    use std::path::PathBuf;

    #[test]
    fn empty_document_yields_defaults() {
        let config = BoardConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(config, BoardConfig::default());
        assert_eq!(config.upload.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(
            config.upload.allowed_content_types,
            vec!["image/jpeg".to_string(), "image/png".to_string()]
        );
    }

    #[test]
    fn sections_override_defaults() {
        let config = BoardConfig::from_toml_str(
            r#"
db_path = "/var/lib/stickyboard/board.sqlite3"

[blob]
root = "/var/lib/stickyboard/blobs"
url_ttl_secs = 30

[live]
subscriber_capacity = 8
"#,
        )
        .expect("config should parse");
        assert_eq!(
            config.db_path,
            PathBuf::from("/var/lib/stickyboard/board.sqlite3")
        );
        assert_eq!(config.blob.url_ttl_secs, 30);
        assert_eq!(config.blob.upload_ttl_secs, 15 * 60);
        assert_eq!(config.live.subscriber_capacity, 8);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = BoardConfig::from_toml_str("[live]\nsubscriber_capacity = 0\n")
            .expect_err("zero capacity must fail");
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("subscriber_capacity")));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = BoardConfig::from_toml_str("db_path = [").expect_err("syntax error");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
