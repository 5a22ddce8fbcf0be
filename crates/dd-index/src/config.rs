//! Index configuration.
//!
//! Every option that shapes discovery or access is explicit here; nothing is
//! read from globals. Configs can be built in code or loaded from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{IndexError, IndexResult};
use crate::sidecar::DEFAULT_SIDECAR;

pub const DEFAULT_EXTENSION: &str = "h5";

/// What sequential passes do when one entry fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryErrorPolicy {
    /// Log, record the entry as skipped and continue.
    #[default]
    Skip,
    /// Yield the error and end the pass.
    Abort,
}

/// What discovery does when two files map to the same identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Keep the first file in sorted traversal order, report the rest.
    #[default]
    FirstSeenWins,
    /// Fail construction.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory under the root holding the backing files (`h5` in the
    /// published dataset layout). `None` scans the root itself.
    pub subdir: Option<String>,
    /// Backing file extension, without the leading dot.
    pub extension: String,
    /// Walk nested directories below the target directory.
    pub recursive: bool,
    /// Keep decoded metadata for the lifetime of the index.
    pub cache_metadata: bool,
    pub on_entry_error: EntryErrorPolicy,
    pub on_collision: CollisionPolicy,
    /// CSV table relative to the root, cross-checked against discovered
    /// files when present. `None` skips it.
    pub sidecar: Option<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            subdir: None,
            extension: DEFAULT_EXTENSION.to_string(),
            recursive: false,
            cache_metadata: false,
            on_entry_error: EntryErrorPolicy::Skip,
            on_collision: CollisionPolicy::FirstSeenWins,
            sidecar: Some(DEFAULT_SIDECAR.to_string()),
        }
    }
}

impl IndexConfig {
    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = Some(subdir.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn cache_metadata(mut self, cache: bool) -> Self {
        self.cache_metadata = cache;
        self
    }

    pub fn on_entry_error(mut self, policy: EntryErrorPolicy) -> Self {
        self.on_entry_error = policy;
        self
    }

    pub fn on_collision(mut self, policy: CollisionPolicy) -> Self {
        self.on_collision = policy;
        self
    }

    pub fn with_sidecar(mut self, name: impl Into<String>) -> Self {
        self.sidecar = Some(name.into());
        self
    }

    pub fn without_sidecar(mut self) -> Self {
        self.sidecar = None;
        self
    }

    /// Extension with any leading dot removed.
    pub fn normalized_extension(&self) -> &str {
        self.extension.trim_start_matches('.')
    }

    pub fn validate(&self) -> IndexResult<()> {
        let ext = self.normalized_extension();
        if ext.is_empty() {
            return Err(IndexError::InvalidConfig(
                "extension must not be empty".to_string(),
            ));
        }
        if ext.contains(['/', '\\']) {
            return Err(IndexError::InvalidConfig(format!(
                "extension '{}' must not contain path separators",
                self.extension
            )));
        }
        if let Some(subdir) = &self.subdir
            && (subdir.is_empty() || Path::new(subdir).is_absolute())
        {
            return Err(IndexError::InvalidConfig(format!(
                "subdir '{}' must be a non-empty relative path",
                subdir
            )));
        }
        if let Some(sidecar) = &self.sidecar
            && (sidecar.is_empty() || Path::new(sidecar).is_absolute())
        {
            return Err(IndexError::InvalidConfig(format!(
                "sidecar '{}' must be a non-empty relative path",
                sidecar
            )));
        }
        Ok(())
    }

    /// Load from a `.yaml`/`.yml` or `.json` file; missing keys take defaults.
    pub fn load(path: &Path) -> IndexResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: IndexConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => {
                return Err(IndexError::InvalidConfig(format!(
                    "unsupported config file type: {}",
                    path.display()
                )));
            }
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_fills_missing_keys_with_defaults() {
        let config: IndexConfig =
            serde_yaml::from_str("subdir: h5\ncache_metadata: true\non_entry_error: abort\n")
                .unwrap();
        assert_eq!(config.subdir.as_deref(), Some("h5"));
        assert!(config.cache_metadata);
        assert_eq!(config.on_entry_error, EntryErrorPolicy::Abort);
        assert_eq!(config.extension, "h5");
        assert_eq!(config.on_collision, CollisionPolicy::FirstSeenWins);
        assert_eq!(config.sidecar.as_deref(), Some("metadata.csv"));
    }

    #[test]
    fn null_sidecar_disables_it() {
        let config: IndexConfig = serde_yaml::from_str("sidecar: null\n").unwrap();
        assert_eq!(config.sidecar, None);
        let config: IndexConfig = serde_yaml::from_str("sidecar: tables/runs.csv\n").unwrap();
        assert_eq!(config.sidecar.as_deref(), Some("tables/runs.csv"));
        assert!(IndexConfig::default().with_sidecar("/abs.csv").validate().is_err());
    }

    #[test]
    fn leading_dot_is_accepted() {
        let config = IndexConfig::default().with_extension(".h5");
        assert_eq!(config.normalized_extension(), "h5");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(IndexConfig::default().with_extension("").validate().is_err());
        assert!(IndexConfig::default().with_extension("a/b").validate().is_err());
        assert!(IndexConfig::default().with_subdir("").validate().is_err());
        assert!(IndexConfig::default().with_subdir("/abs").validate().is_err());
    }

    #[test]
    fn load_rejects_unknown_file_types() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.toml");
        std::fs::write(&path, "subdir = 'h5'").unwrap();
        assert!(matches!(
            IndexConfig::load(&path),
            Err(IndexError::InvalidConfig(_))
        ));

        let path = dir.path().join("index.json");
        std::fs::write(&path, r#"{"recursive": true}"#).unwrap();
        assert!(IndexConfig::load(&path).unwrap().recursive);
    }
}
