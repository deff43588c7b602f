//! Error taxonomy for the import engine
//!
//! Record-level errors never abort a file, file-level errors never abort a
//! run, and storage errors abort the run with enough context to retry.

use std::path::PathBuf;
use thiserror::Error;

/// One malformed record. The record is dropped and counted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("missing timestamp")]
    MissingTimestamp,

    #[error("unparsable timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("missing ms_played")]
    MissingMsPlayed,

    #[error("unparsable ms_played: {0}")]
    InvalidMsPlayed(String),

    #[error("negative ms_played: {0}")]
    NegativeMsPlayed(i64),
}

/// A whole file could not be read or has an unrecognized shape.
/// The file is not recorded in the ledger and stays retryable.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a top-level array in {path:?}")]
    NotAnArray { path: PathBuf },

    #[error("unrecognized record shape in {path:?}")]
    UnrecognizedShape { path: PathBuf },
}

/// Underlying persistence failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database location {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt stored value in column {column}: {value:?}")]
    Corrupt { column: &'static str, value: String },
}

/// Run-level failure, fatal to an import run.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to enumerate {root:?}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("storage failure while importing {path:?} (fingerprint {fingerprint}): {source}")]
    Storage {
        path: PathBuf,
        fingerprint: String,
        #[source]
        source: StorageError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown timezone {name:?}: {reason}")]
    UnknownTimezone { name: String, reason: String },
}
