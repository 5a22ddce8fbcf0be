//! Store API.

use crate::types::{AttributeValue, CONTAINER_FORMAT, CONTAINER_VERSION, ContainerHeader};
use crate::{StoreError, StoreResult};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// Upper bound on the header line. Payload follows the header, so a missing
/// newline within this window means the file is not a container.
pub const MAX_HEADER_BYTES: u64 = 1 << 20;

/// First eight bytes of every HDF5 file without a user block.
pub const HDF5_SIGNATURE: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

#[cfg(feature = "hdf5")]
const HDF5_HINT: &str = "read it through AutoStore or Hdf5Store";
#[cfg(not(feature = "hdf5"))]
const HDF5_HINT: &str = "rebuild with the `hdf5` feature to read its attributes";

/// On-disk layout of a backing file, decided from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Hdf5,
    /// Anything else; parsed as a header-line container.
    HeaderLine,
}

impl ContainerKind {
    pub fn of_prefix(prefix: &[u8]) -> Self {
        if prefix.starts_with(HDF5_SIGNATURE) {
            ContainerKind::Hdf5
        } else {
            ContainerKind::HeaderLine
        }
    }
}

/// Read the first bytes of `path` and classify it.
pub fn sniff(path: &Path) -> StoreResult<ContainerKind> {
    let file = open_file(path)?;
    let mut prefix = Vec::with_capacity(HDF5_SIGNATURE.len());
    file.take(HDF5_SIGNATURE.len() as u64)
        .read_to_end(&mut prefix)
        .map_err(|source| io_error(path, source))?;
    Ok(ContainerKind::of_prefix(&prefix))
}

pub(crate) fn unsupported_hdf5(path: &Path) -> StoreError {
    StoreError::UnsupportedFormat {
        path: path.to_path_buf(),
        format: "HDF5",
        hint: HDF5_HINT,
    }
}

fn open_file(path: &Path) -> StoreResult<File> {
    File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => StoreError::Missing {
            path: path.to_path_buf(),
        },
        _ => io_error(path, source),
    })
}

/// Opens backing files for attribute reads.
///
/// Implementations must not keep handles open across calls; every `open`
/// is an independent read-only acquisition so concurrent readers are safe.
pub trait AttributeStore: Send + Sync {
    fn open(&self, path: &Path) -> StoreResult<Box<dyn AttributeReader>>;
}

/// Top-level attributes of one opened container.
pub trait AttributeReader {
    /// `Ok(None)` when the attribute is absent.
    fn attribute(&self, name: &str) -> StoreResult<Option<AttributeValue>>;

    fn attribute_names(&self) -> Vec<String>;
}

/// Header-line containers: one JSON header line, then opaque payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderStore;

impl HeaderStore {
    pub fn new() -> Self {
        Self
    }

    /// Read and parse the header line only.
    pub fn read_header(path: &Path) -> StoreResult<ContainerHeader> {
        let mut reader = BufReader::new(open_file(path)?);
        let prefix = reader.fill_buf().map_err(|source| io_error(path, source))?;
        if prefix.is_empty() {
            return Err(StoreError::Header {
                path: path.to_path_buf(),
                message: "file is empty".to_string(),
            });
        }
        if ContainerKind::of_prefix(prefix) == ContainerKind::Hdf5 {
            return Err(unsupported_hdf5(path));
        }

        let mut line = Vec::new();
        let read = reader
            .take(MAX_HEADER_BYTES)
            .read_until(b'\n', &mut line)
            .map_err(|source| io_error(path, source))?;
        if line.last() != Some(&b'\n') && read as u64 == MAX_HEADER_BYTES {
            return Err(StoreError::Header {
                path: path.to_path_buf(),
                message: format!("no header line within {} bytes", MAX_HEADER_BYTES),
            });
        }
        let line = String::from_utf8(line).map_err(|_| StoreError::Header {
            path: path.to_path_buf(),
            message: "first line is not UTF-8 text, so this is not a header-line container"
                .to_string(),
        })?;

        let header: ContainerHeader =
            serde_json::from_str(line.trim_end()).map_err(|err| StoreError::Header {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;

        if header.format != CONTAINER_FORMAT {
            return Err(StoreError::Header {
                path: path.to_path_buf(),
                message: format!("unexpected format '{}'", header.format),
            });
        }
        if header.version > CONTAINER_VERSION {
            return Err(StoreError::Header {
                path: path.to_path_buf(),
                message: format!("unsupported version {}", header.version),
            });
        }

        Ok(header)
    }
}

impl AttributeStore for HeaderStore {
    fn open(&self, path: &Path) -> StoreResult<Box<dyn AttributeReader>> {
        // The file handle is dropped inside read_header; only the parsed
        // header outlives this call.
        let header = Self::read_header(path)?;
        Ok(Box::new(HeaderReader {
            attributes: header.attributes,
        }))
    }
}

struct HeaderReader {
    attributes: BTreeMap<String, serde_json::Value>,
}

impl AttributeReader for HeaderReader {
    fn attribute(&self, name: &str) -> StoreResult<Option<AttributeValue>> {
        let Some(raw) = self.attributes.get(name) else {
            return Ok(None);
        };
        serde_json::from_value(raw.clone())
            .map(Some)
            .map_err(|err| StoreError::Decode {
                attribute: name.to_string(),
                message: err.to_string(),
            })
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }
}

/// Write a header-line container: header, newline, then `payload` verbatim.
pub fn write_container(path: &Path, header: &ContainerHeader, payload: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut content = serde_json::to_vec(header)?;
    content.push(b'\n');
    content.extend_from_slice(payload);

    let mut file = File::create(path).map_err(|source| io_error(path, source))?;
    file.write_all(&content)
        .map_err(|source| io_error(path, source))?;
    Ok(())
}

fn io_error(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        path: PathBuf::from(path),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn header_is_read_without_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1.h5");
        let header = ContainerHeader::new()
            .with_attribute("geometry_parameters", AttributeValue::f64_vector(vec![1.0, 40.0, 5.0]))
            .unwrap();
        // Payload is not JSON at all; it must never be parsed.
        write_container(&path, &header, &[0xff, 0x00, 0x13, 0x37]).unwrap();

        let reader = HeaderStore.open(&path).unwrap();
        assert_eq!(reader.attribute_names(), vec!["geometry_parameters"]);
        assert_eq!(
            reader.attribute("geometry_parameters").unwrap(),
            Some(AttributeValue::f64_vector(vec![1.0, 40.0, 5.0]))
        );
        assert_eq!(reader.attribute("material_parameters").unwrap(), None);
    }

    #[test]
    fn empty_file_is_a_header_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("2.h5");
        fs::write(&path, b"").unwrap();
        let err = HeaderStore.open(&path).err().unwrap();
        assert!(matches!(err, StoreError::Header { .. }));
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let dir = TempDir::new().unwrap();
        let err = HeaderStore.open(&dir.path().join("nope.h5")).err().unwrap();
        assert!(matches!(err, StoreError::Missing { .. }));
    }

    #[test]
    fn hdf5_signature_is_named_in_the_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("5.h5");
        let mut bytes = HDF5_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        fs::write(&path, &bytes).unwrap();

        assert_eq!(sniff(&path).unwrap(), ContainerKind::Hdf5);
        let err = HeaderStore.open(&path).err().unwrap();
        assert!(matches!(err, StoreError::UnsupportedFormat { format: "HDF5", .. }));
        assert!(format!("{err}").contains("HDF5"));
    }

    #[test]
    fn binary_first_line_is_a_header_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("6.h5");
        fs::write(&path, [0xc3, 0x28, 0xff, b'\n', 0x00]).unwrap();

        assert_eq!(sniff(&path).unwrap(), ContainerKind::HeaderLine);
        let err = HeaderStore.open(&path).err().unwrap();
        assert!(matches!(err, StoreError::Header { .. }));
        assert!(format!("{err}").contains("not UTF-8"));
    }

    #[test]
    fn foreign_format_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("3.h5");
        fs::write(&path, b"{\"format\":\"other\",\"version\":1}\n").unwrap();
        let err = HeaderStore.open(&path).err().unwrap();
        assert!(format!("{err}").contains("unexpected format"));
    }

    #[test]
    fn undecodable_attribute_is_a_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("4.h5");
        let header = ContainerHeader::new().with_raw_attribute(
            "material_parameters",
            serde_json::json!({"dtype": "f64", "shape": [4], "data": "oops"}),
        );
        write_container(&path, &header, b"").unwrap();

        let reader = HeaderStore.open(&path).unwrap();
        let err = reader.attribute("material_parameters").unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }
}
