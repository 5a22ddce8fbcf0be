//! In-memory attribute store.

use crate::store::{AttributeReader, AttributeStore};
use crate::types::AttributeValue;
use crate::{StoreError, StoreResult};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Attribute store backed by a map from path to attributes.
///
/// Counts every `open` so callers can check how often a store was hit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    containers: HashMap<PathBuf, BTreeMap<String, AttributeValue>>,
    opens: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, attributes: BTreeMap<String, AttributeValue>) {
        self.containers.insert(path.into(), attributes);
    }

    pub fn with_container(
        mut self,
        path: impl Into<PathBuf>,
        attributes: impl IntoIterator<Item = (&'static str, AttributeValue)>,
    ) -> Self {
        let attributes = attributes
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        self.insert(path, attributes);
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }
}

impl AttributeStore for MemoryStore {
    fn open(&self, path: &Path) -> StoreResult<Box<dyn AttributeReader>> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        let attributes = self
            .containers
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::Missing {
                path: path.to_path_buf(),
            })?;
        Ok(Box::new(MemoryReader { attributes }))
    }
}

struct MemoryReader {
    attributes: BTreeMap<String, AttributeValue>,
}

impl AttributeReader for MemoryReader {
    fn attribute(&self, name: &str) -> StoreResult<Option<AttributeValue>> {
        Ok(self.attributes.get(name).cloned())
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_opens_and_reports_missing() {
        let store = MemoryStore::new().with_container(
            "/data/1.h5",
            [("geometry_parameters", AttributeValue::f64_vector(vec![1.0, 2.0, 3.0]))],
        );

        let reader = store.open(Path::new("/data/1.h5")).unwrap();
        assert!(reader.attribute("geometry_parameters").unwrap().is_some());
        assert!(store.open(Path::new("/data/2.h5")).is_err());
        assert_eq!(store.open_count(), 2);
    }
}
