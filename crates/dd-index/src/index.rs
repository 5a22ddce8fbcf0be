//! The simulation index: discovered entries plus on-demand metadata.
//!
//! Built once from a root directory; every later call is a query over the
//! immutable entry list. Metadata is resolved per access through the
//! [`MetadataExtractor`], optionally memoized per entry.

use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use dd_core::SimulationId;
use dd_store::AttributeStore;

use crate::batch::{BatchOrder, BatchPlan, Batches};
use crate::config::{EntryErrorPolicy, IndexConfig};
use crate::error::{IndexError, IndexResult};
use crate::extractor::{MetadataExtractor, SimulationMetadata};
use crate::iter::Entries;
use crate::locator::{self, DiscoveryReport, LocatedFile};
use crate::sidecar::Sidecar;
use crate::split::{self, SplitRatios, Splits};

/// Key for random access: a sequence position or an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Position(usize),
    Id(SimulationId),
}

impl From<usize> for Lookup {
    fn from(position: usize) -> Self {
        Lookup::Position(position)
    }
}

impl From<SimulationId> for Lookup {
    fn from(id: SimulationId) -> Self {
        Lookup::Id(id)
    }
}

impl From<&SimulationId> for Lookup {
    fn from(id: &SimulationId) -> Self {
        Lookup::Id(id.clone())
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Position(p) => write!(f, "position {}", p),
            Lookup::Id(id) => write!(f, "id {}", id),
        }
    }
}

/// One resolved simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRecord {
    pub position: usize,
    pub id: SimulationId,
    pub metadata: SimulationMetadata,
    pub path: PathBuf,
}

/// Snapshot of an index for display and reporting.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub root: PathBuf,
    pub target_dir: PathBuf,
    pub count: usize,
    pub cache_metadata: bool,
    pub cached_entries: usize,
    pub on_entry_error: EntryErrorPolicy,
    pub report: DiscoveryReport,
    pub digest: String,
}

pub struct SimulationIndex {
    root: PathBuf,
    target_dir: PathBuf,
    config: IndexConfig,
    entries: Vec<LocatedFile>,
    report: DiscoveryReport,
    extractor: MetadataExtractor,
    sidecar: Option<Sidecar>,
    /// One slot per entry when caching is enabled. A slot is written at most
    /// once; racing writers compute the same value and the first `set` wins.
    cache: Option<Vec<OnceLock<SimulationMetadata>>>,
}

impl SimulationIndex {
    /// Discover backing files under `root` and build the index, reading
    /// metadata through [`dd_store::AutoStore`].
    pub fn build(root: impl AsRef<Path>, config: IndexConfig) -> IndexResult<Self> {
        Self::build_with_extractor(root, config, MetadataExtractor::default())
    }

    /// Same as [`SimulationIndex::build`] with a caller-supplied store.
    pub fn build_with_store(
        root: impl AsRef<Path>,
        config: IndexConfig,
        store: Arc<dyn AttributeStore>,
    ) -> IndexResult<Self> {
        Self::build_with_extractor(root, config, MetadataExtractor::new(store))
    }

    pub fn build_with_extractor(
        root: impl AsRef<Path>,
        config: IndexConfig,
        extractor: MetadataExtractor,
    ) -> IndexResult<Self> {
        let root = root.as_ref().to_path_buf();
        let discovery = locator::discover(&root, &config)?;

        if discovery.entries.is_empty() {
            warn!(target_dir = %discovery.target_dir.display(), "index built with no valid entries");
        }

        let cache = config
            .cache_metadata
            .then(|| (0..discovery.entries.len()).map(|_| OnceLock::new()).collect());

        Ok(Self {
            root,
            target_dir: discovery.target_dir,
            config,
            entries: discovery.entries,
            report: discovery.report,
            extractor,
            sidecar: discovery.sidecar,
            cache,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory the backing files were discovered in.
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn report(&self) -> &DiscoveryReport {
        &self.report
    }

    /// The sidecar table, restricted to rows with a discovered file.
    pub fn sidecar(&self) -> Option<&Sidecar> {
        self.sidecar.as_ref()
    }

    /// Sidecar values for the entry at `position`, aligned with
    /// [`Sidecar::columns`].
    pub fn sidecar_row(&self, position: usize) -> Option<&[String]> {
        self.sidecar.as_ref()?.row(self.id_at(position)?)
    }

    /// Number of valid entries. O(1).
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail with [`IndexError::NoValidEntries`] if discovery accepted nothing.
    pub fn ensure_non_empty(&self) -> IndexResult<&Self> {
        if self.is_empty() {
            return Err(IndexError::NoValidEntries {
                path: self.target_dir.clone(),
            });
        }
        Ok(self)
    }

    /// Discovered entries in index order.
    pub fn entries(&self) -> &[LocatedFile] {
        &self.entries
    }

    /// Identifiers in index order.
    pub fn ids(&self) -> impl ExactSizeIterator<Item = &SimulationId> + '_ {
        self.entries.iter().map(|e| &e.id)
    }

    pub fn id_at(&self, position: usize) -> Option<&SimulationId> {
        self.entries.get(position).map(|e| &e.id)
    }

    pub fn path_at(&self, position: usize) -> Option<&Path> {
        self.entries.get(position).map(|e| e.path.as_path())
    }

    /// Position of `id`. Entries are sorted by identifier, so this is a
    /// binary search.
    pub fn position_of(&self, id: &SimulationId) -> Option<usize> {
        self.entries.binary_search_by(|e| e.id.cmp(id)).ok()
    }

    pub fn contains(&self, id: &SimulationId) -> bool {
        self.position_of(id).is_some()
    }

    fn resolve_position(&self, key: &Lookup) -> IndexResult<usize> {
        let position = match key {
            Lookup::Position(p) => Some(*p).filter(|&p| p < self.entries.len()),
            Lookup::Id(id) => self.position_of(id),
        };
        position.ok_or_else(|| IndexError::OutOfRange {
            key: key.clone(),
            len: self.entries.len(),
        })
    }

    /// Random access by position or identifier.
    pub fn get(&self, key: impl Into<Lookup>) -> IndexResult<SimulationRecord> {
        let key = key.into();
        let position = self.resolve_position(&key)?;
        self.record_at(position)
    }

    /// Random access by position.
    pub fn at(&self, position: usize) -> IndexResult<SimulationRecord> {
        self.get(Lookup::Position(position))
    }

    fn record_at(&self, position: usize) -> IndexResult<SimulationRecord> {
        let entry = &self.entries[position];
        let metadata = self.metadata_at(position)?;
        Ok(SimulationRecord {
            position,
            id: entry.id.clone(),
            metadata,
            path: entry.path.clone(),
        })
    }

    /// Metadata for one entry. Failures are returned, never cached.
    pub fn metadata_at(&self, position: usize) -> IndexResult<SimulationMetadata> {
        let entry = self
            .entries
            .get(position)
            .ok_or_else(|| IndexError::OutOfRange {
                key: Lookup::Position(position),
                len: self.entries.len(),
            })?;

        let slot = self.cache.as_ref().map(|slots| &slots[position]);
        if let Some(cached) = slot.and_then(|s| s.get()) {
            debug!(id = %entry.id, "metadata cache hit");
            return Ok(*cached);
        }

        let metadata =
            self.extractor
                .extract(&entry.path)
                .map_err(|source| IndexError::Metadata {
                    id: entry.id.clone(),
                    path: entry.path.clone(),
                    source,
                })?;

        match slot {
            // Losing the race leaves the earlier, identical value in place.
            Some(slot) => Ok(*slot.get_or_init(|| metadata)),
            None => Ok(metadata),
        }
    }

    /// Number of entries whose metadata is currently cached.
    pub fn cached_count(&self) -> usize {
        self.cache
            .as_ref()
            .map(|slots| slots.iter().filter(|s| s.get().is_some()).count())
            .unwrap_or(0)
    }

    /// Sequential pass in index order using the configured error policy.
    pub fn iter(&self) -> Entries<'_> {
        Entries::all(self, self.config.on_entry_error)
    }

    /// Sequential pass in index order with an explicit error policy.
    pub fn iter_with(&self, policy: EntryErrorPolicy) -> Entries<'_> {
        Entries::all(self, policy)
    }

    /// Pass over caller-chosen positions, in the given order.
    pub fn iter_positions(&self, positions: Vec<usize>, policy: EntryErrorPolicy) -> Entries<'_> {
        Entries::positions(self, positions, policy)
    }

    /// Batches of `size` positions in `order`, resolved lazily through `get`.
    pub fn batches(&self, size: usize, order: &BatchOrder) -> IndexResult<Batches<'_>> {
        let plan = BatchPlan::new(self.count(), size, order)?;
        Ok(self.batches_for(plan))
    }

    /// Resolve a precomputed plan (e.g. one worker's shard).
    pub fn batches_for(&self, plan: BatchPlan) -> Batches<'_> {
        Batches::new(self, plan, self.config.on_entry_error)
    }

    /// Resolve one batch on the rayon pool. Results keep the input order.
    pub fn resolve_batch_parallel(&self, positions: &[usize]) -> Vec<IndexResult<SimulationRecord>> {
        positions.par_iter().map(|&p| self.at(p)).collect()
    }

    /// `min(n, count)` distinct positions drawn with a seeded shuffle.
    pub fn sample(&self, n: usize, seed: u64) -> Vec<usize> {
        split::sample_positions(self.count(), n, seed)
    }

    /// Deterministic train/validation/test partition of positions.
    pub fn split(&self, ratios: SplitRatios, seed: u64) -> IndexResult<Splits> {
        split::split_positions(self.count(), ratios, seed)
    }

    /// SHA-256 over the ordered identifier sequence.
    ///
    /// Two indexes with equal digests assign the same identifier to every
    /// position, so position-based splits transfer between them.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update(entry.id.to_string().as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            root: self.root.clone(),
            target_dir: self.target_dir.clone(),
            count: self.count(),
            cache_metadata: self.cache.is_some(),
            cached_entries: self.cached_count(),
            on_entry_error: self.config.on_entry_error,
            report: self.report.clone(),
            digest: self.digest(),
        }
    }
}

impl fmt::Debug for SimulationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationIndex")
            .field("root", &self.root)
            .field("target_dir", &self.target_dir)
            .field("count", &self.entries.len())
            .field("cache_metadata", &self.cache.is_some())
            .finish()
    }
}

impl fmt::Display for SimulationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulation index")?;
        writeln!(f, "  Root: {}", self.root.display())?;
        writeln!(f, "  Files: {}", self.target_dir.display())?;
        writeln!(f, "  Available simulations: {}", self.count())?;
        if self.report.rejected() > 0 {
            writeln!(f, "  Rejected files: {}", self.report.rejected())?;
        }
        if let Some(sidecar) = &self.sidecar {
            let report = sidecar.report();
            writeln!(f, "  Metadata columns: {}", sidecar.columns().join(", "))?;
            writeln!(
                f,
                "  Sidecar rows with files: {}/{}",
                report.matched, report.rows
            )?;
        }
        write!(
            f,
            "  Metadata cache: {}",
            if self.cache.is_some() { "on" } else { "off" }
        )
    }
}
