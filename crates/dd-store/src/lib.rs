//! dd-store: access to the per-simulation backing files.
//!
//! The container format belongs to whoever produced the dataset; this crate
//! defines the seam the index reads through ([`AttributeStore`]) and ships:
//! - [`HeaderStore`] for bundled header-line containers
//! - `Hdf5Store` for HDF5 files (`hdf5` feature)
//! - [`AutoStore`], which sniffs each file and routes to one of the above
//! - [`MemoryStore`] for tests and tooling

pub mod auto;
pub mod floats;
#[cfg(feature = "hdf5")]
pub mod h5file;
pub mod memory;
pub mod store;
pub mod types;

pub use auto::AutoStore;
#[cfg(feature = "hdf5")]
pub use h5file::Hdf5Store;
pub use memory::MemoryStore;
pub use store::{
    AttributeReader, AttributeStore, ContainerKind, HDF5_SIGNATURE, HeaderStore, sniff,
    write_container,
};
pub use types::*;

use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid container header in {path}: {message}")]
    Header { path: PathBuf, message: String },

    #[error("Attribute '{attribute}' could not be decoded: {message}")]
    Decode { attribute: String, message: String },

    #[error("No such container: {path}")]
    Missing { path: PathBuf },

    #[error("{path} is an {format} file: {hint}")]
    UnsupportedFormat {
        path: PathBuf,
        format: &'static str,
        hint: &'static str,
    },

    #[error("Container backend failed on {path}: {message}")]
    Backend { path: PathBuf, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
