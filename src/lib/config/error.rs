use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{path:?} contains invalid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed server configuration in {path:?}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl ConfigError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ConfigError::NotFound { path } => {
                format!("{} not found", path.display())
            }
            ConfigError::Io { path, source } => {
                format!("could not read {}: {source}", path.display())
            }
            ConfigError::Parse { path, .. } => {
                format!("{} is not valid TOML", path.display())
            }
            ConfigError::InvalidJson { path, .. } => {
                format!("{} contains invalid JSON", path.display())
            }
            ConfigError::Malformed { path, reason } => {
                format!("{} is malformed: {reason}", path.display())
            }
        }
    }
}
