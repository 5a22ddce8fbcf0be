//! Discovery of backing files under a dataset root.
//!
//! Only directory listings and `stat` calls happen here; file contents are
//! never opened.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use dd_core::SimulationId;
use dd_core::timing::{Timer, header_timing};

use crate::config::{CollisionPolicy, IndexConfig};
use crate::error::{IndexError, IndexResult};
use crate::sidecar::{self, Sidecar, SidecarReport};

/// One accepted backing file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedFile {
    pub id: SimulationId,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// A file dropped because its identifier was already taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub id: SimulationId,
    pub kept: PathBuf,
    pub dropped: PathBuf,
}

/// Counters for one discovery pass.
///
/// `accepted` always equals the number of entries handed to the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Regular files seen in the walk.
    pub scanned_files: usize,
    /// Files with a different extension (sidecars such as `metadata.csv`).
    pub extension_mismatch: usize,
    pub accepted: usize,
    pub empty: usize,
    /// Entries that could not be listed or stat-ed.
    pub unreadable: usize,
    pub invalid_identifier: usize,
    /// Accepted files whose identifier is not numeric.
    pub non_numeric: usize,
    pub collisions: Vec<Collision>,
    /// Present when a sidecar table was found and read.
    pub sidecar: Option<SidecarReport>,
}

impl DiscoveryReport {
    /// Candidate files rejected for any reason.
    pub fn rejected(&self) -> usize {
        self.empty + self.unreadable + self.invalid_identifier + self.collisions.len()
    }
}

/// Result of [`discover`]: entries in ascending identifier order.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub target_dir: PathBuf,
    pub entries: Vec<LocatedFile>,
    pub report: DiscoveryReport,
    pub sidecar: Option<Sidecar>,
}

/// Resolve `<root>[/<subdir>]` and require it to be a directory.
pub fn target_dir(root: &Path, config: &IndexConfig) -> IndexResult<PathBuf> {
    let target = match &config.subdir {
        Some(subdir) => root.join(subdir),
        None => root.to_path_buf(),
    };
    if !root.is_dir() {
        return Err(IndexError::RootNotFound {
            path: root.to_path_buf(),
        });
    }
    if !target.is_dir() {
        return Err(IndexError::RootNotFound { path: target });
    }
    Ok(target)
}

fn walker(target: &Path, recursive: bool) -> WalkDir {
    let walker = WalkDir::new(target)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name();
    if recursive {
        walker
    } else {
        walker.max_depth(1)
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(extension)
}

/// Walk the target directory and collect validated backing files.
///
/// Traversal is sorted by file name, so "first seen" in collision handling
/// is the same on every platform. The returned entries are sorted by
/// identifier regardless of traversal order.
pub fn discover(root: &Path, config: &IndexConfig) -> IndexResult<Discovery> {
    config.validate()?;
    let target = target_dir(root, config)?;
    let extension = config.normalized_extension();
    let timer = Timer::start("discover");

    // Surface an unlistable target as a hard error rather than an empty index.
    std::fs::read_dir(&target).map_err(|source| IndexError::Io {
        path: target.clone(),
        source,
    })?;

    let mut report = DiscoveryReport::default();
    let mut entries: Vec<LocatedFile> = Vec::new();
    let mut seen: HashMap<SimulationId, usize> = HashMap::new();

    for entry in walker(&target, config.recursive) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                report.unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        report.scanned_files += 1;

        let path = entry.path();
        if !has_extension(path, extension) {
            debug!(path = %path.display(), "ignoring file with other extension");
            report.extension_mismatch += 1;
            continue;
        }

        let size_bytes = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping file that cannot be stat-ed");
                report.unreadable += 1;
                continue;
            }
        };
        if size_bytes == 0 {
            warn!(path = %path.display(), "skipping empty file");
            report.empty += 1;
            continue;
        }

        let id = match path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(SimulationId::from_stem)
        {
            Some(Ok(id)) => id,
            Some(Err(err)) => {
                warn!(path = %path.display(), error = %err, "skipping file with invalid identifier");
                report.invalid_identifier += 1;
                continue;
            }
            None => {
                warn!(path = %path.display(), "skipping file with non UTF-8 name");
                report.invalid_identifier += 1;
                continue;
            }
        };

        if let Some(&existing) = seen.get(&id) {
            let kept = entries[existing].path.clone();
            match config.on_collision {
                CollisionPolicy::Reject => {
                    return Err(IndexError::IdentifierCollision {
                        id,
                        first: kept,
                        second: path.to_path_buf(),
                    });
                }
                CollisionPolicy::FirstSeenWins => {
                    warn!(
                        id = %id,
                        kept = %kept.display(),
                        dropped = %path.display(),
                        "identifier collision, keeping first file"
                    );
                    report.collisions.push(Collision {
                        id,
                        kept,
                        dropped: path.to_path_buf(),
                    });
                    continue;
                }
            }
        }

        if !id.is_numeric() {
            warn!(id = %id, path = %path.display(), "non-numeric simulation identifier");
            report.non_numeric += 1;
        }

        seen.insert(id.clone(), entries.len());
        entries.push(LocatedFile {
            id,
            path: path.to_path_buf(),
            size_bytes,
        });
    }

    entries.sort_by(|a, b| a.id.cmp(&b.id));
    report.accepted = entries.len();

    let sidecar = sidecar::load(root, config, &entries)?;
    report.sidecar = sidecar.as_ref().map(|s| s.report().clone());
    timer.stop_into(&header_timing::DISCOVERY);

    debug!(
        target_dir = %target.display(),
        accepted = report.accepted,
        rejected = report.rejected(),
        "discovery finished"
    );

    Ok(Discovery {
        target_dir: target,
        entries,
        report,
        sidecar,
    })
}

/// Paths of every file with the configured extension, in traversal order.
///
/// No identifier validation or size checks; this is the raw listing.
pub fn scan_paths(root: &Path, config: &IndexConfig) -> IndexResult<Vec<PathBuf>> {
    config.validate()?;
    let target = target_dir(root, config)?;
    let extension = config.normalized_extension();

    Ok(walker(&target, config.recursive)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), extension))
        .map(|e| e.into_path())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, body: &[u8]) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    #[test]
    fn missing_root_and_subdir_fail() {
        let dir = TempDir::new().unwrap();
        let err = discover(&dir.path().join("absent"), &IndexConfig::default()).unwrap_err();
        assert!(matches!(err, IndexError::RootNotFound { .. }));

        let config = IndexConfig::default().with_subdir("h5");
        let err = discover(dir.path(), &config).unwrap_err();
        match err {
            IndexError::RootNotFound { path } => assert!(path.ends_with("h5")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn root_that_is_a_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "1.h5", b"x");
        let err = discover(&dir.path().join("1.h5"), &IndexConfig::default()).unwrap_err();
        assert!(matches!(err, IndexError::RootNotFound { .. }));
    }

    #[test]
    fn counts_every_rejection_reason() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "10.h5", b"x");
        touch(dir.path(), "2.h5", b"x");
        touch(dir.path(), "empty.h5", b"");
        touch(dir.path(), "113525.0.h5", b"x");
        touch(dir.path(), "metadata.csv", b"ID\n");
        touch(dir.path(), "blank_a.h5", b"x");

        let discovery = discover(dir.path(), &IndexConfig::default()).unwrap();
        let ids: Vec<String> = discovery.entries.iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, vec!["2", "10", "blank_a"]);

        let report = &discovery.report;
        assert_eq!(report.scanned_files, 6);
        assert_eq!(report.extension_mismatch, 1);
        assert_eq!(report.empty, 1);
        assert_eq!(report.invalid_identifier, 1);
        assert_eq!(report.non_numeric, 1);
        assert_eq!(report.accepted, 3);
        assert_eq!(report.rejected(), 2);

        let sidecar = report.sidecar.as_ref().unwrap();
        assert_eq!(sidecar.rows, 0);
        assert_eq!(sidecar.unlisted_files.len(), 3);
    }

    #[test]
    fn sidecar_is_read_from_the_root_not_the_subdir() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "h5/1.h5", b"x");
        touch(dir.path(), "h5/metadata.csv", b"ID\n99\n");
        touch(dir.path(), "metadata.csv", b"ID,shape\n1,R\n");

        let config = IndexConfig::default().with_subdir("h5");
        let discovery = discover(dir.path(), &config).unwrap();
        let report = discovery.report.sidecar.unwrap();
        assert_eq!(report.path, dir.path().join("metadata.csv"));
        assert!(report.is_consistent());
        assert_eq!(discovery.sidecar.unwrap().len(), 1);
    }

    #[test]
    fn non_recursive_ignores_nested_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "1.h5", b"x");
        touch(dir.path(), "nested/2.h5", b"x");

        let flat = discover(dir.path(), &IndexConfig::default()).unwrap();
        assert_eq!(flat.entries.len(), 1);

        let deep = discover(dir.path(), &IndexConfig::default().recursive(true)).unwrap();
        assert_eq!(deep.entries.len(), 2);
    }

    #[test]
    fn leading_zero_collision_keeps_first_in_name_order() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "007.h5", b"x");
        touch(dir.path(), "7.h5", b"x");

        let discovery = discover(dir.path(), &IndexConfig::default()).unwrap();
        assert_eq!(discovery.entries.len(), 1);
        assert!(discovery.entries[0].path.ends_with("007.h5"));
        assert_eq!(discovery.report.collisions.len(), 1);
        assert!(discovery.report.collisions[0].dropped.ends_with("7.h5"));
    }

    #[test]
    fn reject_policy_fails_on_collision() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "007.h5", b"x");
        touch(dir.path(), "7.h5", b"x");

        let config = IndexConfig::default().on_collision(CollisionPolicy::Reject);
        let err = discover(dir.path(), &config).unwrap_err();
        assert!(matches!(err, IndexError::IdentifierCollision { .. }));
    }

    #[test]
    fn scan_paths_lists_raw_matches() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "h5/1.h5", b"x");
        touch(dir.path(), "h5/bad name.h5", b"x");
        touch(dir.path(), "h5/notes.txt", b"x");

        let config = IndexConfig::default().with_subdir("h5");
        let paths = scan_paths(dir.path(), &config).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.extension().unwrap() == "h5"));
    }
}
