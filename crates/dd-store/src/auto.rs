//! Store that picks a backend per file.

use std::path::Path;

use crate::StoreResult;
use crate::store::{AttributeReader, AttributeStore, HeaderStore};

/// Routes each `open` by the file's leading bytes.
///
/// HDF5 files go to `Hdf5Store` when the `hdf5` feature is enabled. Without
/// it they fail with [`crate::StoreError::UnsupportedFormat`]. Everything
/// else is read as a header-line container.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoStore {
    header: HeaderStore,
    #[cfg(feature = "hdf5")]
    hdf5: crate::h5file::Hdf5Store,
}

impl AutoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttributeStore for AutoStore {
    #[cfg(feature = "hdf5")]
    fn open(&self, path: &Path) -> StoreResult<Box<dyn AttributeReader>> {
        use crate::store::{ContainerKind, sniff};

        match sniff(path)? {
            ContainerKind::Hdf5 => self.hdf5.open(path),
            ContainerKind::HeaderLine => self.header.open(path),
        }
    }

    // HeaderStore already names HDF5 files in its error, so no extra sniff.
    #[cfg(not(feature = "hdf5"))]
    fn open(&self, path: &Path) -> StoreResult<Box<dyn AttributeReader>> {
        self.header.open(path)
    }
}
