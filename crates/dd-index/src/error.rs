//! Error types for discovery, metadata extraction and index queries.

use std::fmt;
use std::path::PathBuf;

use dd_core::SimulationId;
use dd_store::StoreError;

use crate::index::Lookup;

pub type IndexResult<T> = Result<T, IndexError>;

/// Why metadata could not be produced for one backing file.
///
/// `NotFound` and `Malformed` are content problems of that one file; callers
/// typically skip-and-log them. `Store` covers files the store cannot open.
#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("attribute '{attribute}' not found")]
    NotFound { attribute: &'static str },

    #[error("attribute '{attribute}' is malformed: {reason}")]
    Malformed {
        attribute: &'static str,
        reason: String,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl MetadataError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MetadataError::NotFound { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, MetadataError::Malformed { .. })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    #[error("Root not found or not a directory: {path}")]
    RootNotFound { path: PathBuf },

    #[error("No valid simulation files under {path}")]
    NoValidEntries { path: PathBuf },

    #[error("Identifier collision for {id}: {first} and {second}")]
    IdentifierCollision {
        id: SimulationId,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Out of range: {key} (len={len})")]
    OutOfRange { key: Lookup, len: usize },

    #[error("Metadata for simulation {id} ({path}): {source}")]
    Metadata {
        id: SimulationId,
        path: PathBuf,
        #[source]
        source: MetadataError,
    },

    #[error("Invalid sidecar table {path}: {message}")]
    Sidecar { path: PathBuf, message: String },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of per-entry failures, for reports and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryErrorKind {
    NotFound,
    Malformed,
    Store,
    OutOfRange,
    Other,
}

impl fmt::Display for EntryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryErrorKind::NotFound => "not found",
            EntryErrorKind::Malformed => "malformed",
            EntryErrorKind::Store => "store",
            EntryErrorKind::OutOfRange => "out of range",
            EntryErrorKind::Other => "other",
        };
        f.write_str(label)
    }
}

impl IndexError {
    pub fn entry_kind(&self) -> EntryErrorKind {
        match self {
            IndexError::Metadata { source, .. } => match source {
                MetadataError::NotFound { .. } => EntryErrorKind::NotFound,
                MetadataError::Malformed { .. } => EntryErrorKind::Malformed,
                MetadataError::Store(_) => EntryErrorKind::Store,
            },
            IndexError::OutOfRange { .. } => EntryErrorKind::OutOfRange,
            _ => EntryErrorKind::Other,
        }
    }

    /// The metadata failure behind this error, if any.
    pub fn metadata_error(&self) -> Option<&MetadataError> {
        match self {
            IndexError::Metadata { source, .. } => Some(source),
            _ => None,
        }
    }
}
