//! dd-index: a lazily-loaded index over per-simulation backing files.
//!
//! Construction scans one directory, keeps every file whose stem parses as a
//! simulation identifier, and orders the entries by identifier. Metadata is
//! read from each file's top-level attributes only when an entry is accessed.
//! An optional `metadata.csv` at the root is cross-checked against the files.
//!
//! ```no_run
//! use dd_index::{IndexConfig, SimulationIndex};
//!
//! let index = SimulationIndex::build("/data/deep_drawing", IndexConfig::default())?;
//! for record in index.iter() {
//!     let record = record?;
//!     println!("{} -> {:?}", record.id, record.metadata.shape_class());
//! }
//! # Ok::<(), dd_index::IndexError>(())
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod extractor;
pub mod index;
pub mod iter;
pub mod locator;
pub mod sidecar;
pub mod split;

pub use batch::{Batch, BatchOrder, BatchPlan, Batches, permutation};
pub use config::{CollisionPolicy, DEFAULT_EXTENSION, EntryErrorPolicy, IndexConfig};
pub use error::{EntryErrorKind, IndexError, IndexResult, MetadataError};
pub use extractor::{
    GEOMETRY_ATTRIBUTE, GEOMETRY_LEN, MATERIAL_ATTRIBUTE, MATERIAL_LEN, MetadataExtractor,
    ShapeClass, SimulationMetadata,
};
pub use index::{IndexSummary, Lookup, SimulationIndex, SimulationRecord};
pub use iter::{Entries, SkipReport, SkippedEntry, collect_pass};
pub use locator::{Collision, Discovery, DiscoveryReport, LocatedFile, discover};
pub use sidecar::{DEFAULT_SIDECAR, ID_COLUMN, Sidecar, SidecarReport, parse_sidecar_id};
pub use split::{DEFAULT_SPLIT_SEED, SplitLabel, SplitRatios, Splits};

pub use dd_core::SimulationId;
