//! Error types for run-level failures.
//!
//! Stage failures inside a program are recorded as data on the program's
//! result (see [`crate::model::StageFailure`]); only problems that make the
//! whole run meaningless end up here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metadata in {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid config in {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write results to {path}: {source}")]
    WriteResults {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("pipeline worker failed: {0}")]
    Worker(String),
}

/// Result type for run-level operations.
pub type Result<T> = std::result::Result<T, BenchError>;
