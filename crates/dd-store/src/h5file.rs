//! HDF5 backing files, read through the `hdf5` crate.
//!
//! Only root-group attributes are touched. Field datasets in nested groups
//! are never opened.

use hdf5::types::{FloatSize, TypeDescriptor};
use std::path::{Path, PathBuf};

use crate::store::{AttributeReader, AttributeStore};
use crate::types::AttributeValue;
use crate::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct Hdf5Store;

impl Hdf5Store {
    pub fn new() -> Self {
        Self
    }
}

impl AttributeStore for Hdf5Store {
    fn open(&self, path: &Path) -> StoreResult<Box<dyn AttributeReader>> {
        if !path.exists() {
            return Err(StoreError::Missing {
                path: path.to_path_buf(),
            });
        }
        let file = hdf5::File::open(path).map_err(|err| backend(path, err))?;
        Ok(Box::new(Hdf5Reader {
            path: path.to_path_buf(),
            file,
        }))
    }
}

/// Holds the file open until dropped.
struct Hdf5Reader {
    path: PathBuf,
    file: hdf5::File,
}

fn backend(path: &Path, err: hdf5::Error) -> StoreError {
    StoreError::Backend {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

impl AttributeReader for Hdf5Reader {
    fn attribute(&self, name: &str) -> StoreResult<Option<AttributeValue>> {
        let names = self
            .file
            .attr_names()
            .map_err(|err| backend(&self.path, err))?;
        if !names.iter().any(|n| n == name) {
            return Ok(None);
        }

        let decode = |err: hdf5::Error| StoreError::Decode {
            attribute: name.to_string(),
            message: err.to_string(),
        };
        let attr = self.file.attr(name).map_err(|err| backend(&self.path, err))?;
        let shape = attr.shape();
        let descriptor = attr.dtype().and_then(|d| d.to_descriptor()).map_err(decode)?;

        let value = match descriptor {
            TypeDescriptor::Float(FloatSize::U8) => AttributeValue::F64 {
                shape,
                data: attr.read_raw::<f64>().map_err(decode)?,
            },
            TypeDescriptor::Float(FloatSize::U4) => AttributeValue::F32 {
                shape,
                data: attr.read_raw::<f32>().map_err(decode)?,
            },
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => AttributeValue::I64 {
                shape,
                data: attr.read_raw::<i64>().map_err(decode)?,
            },
            _ => AttributeValue::Unsupported,
        };
        Ok(Some(value))
    }

    fn attribute_names(&self) -> Vec<String> {
        let mut names = self.file.attr_names().unwrap_or_default();
        names.sort();
        names
    }
}
