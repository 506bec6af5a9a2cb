use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unsupported statement: {0}")]
    Unsupported(String),

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Statement expects {expected} parameter(s), got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    #[error("Invalid value for column '{column}': {message}")]
    InvalidValue {
        column: &'static str,
        message: String,
    },

    #[error("{operation} cannot run a {statement} statement")]
    Mode {
        operation: &'static str,
        statement: &'static str,
    },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize store document: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        StoreError::Unsupported(message.into())
    }

    pub fn invalid_value<S: Into<String>>(column: &'static str, message: S) -> Self {
        StoreError::InvalidValue {
            column,
            message: message.into(),
        }
    }

    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}
