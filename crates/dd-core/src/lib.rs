//! dd-core: shared foundation for the simulation index.
//!
//! Contains:
//! - ids (stable simulation identifiers derived from file names)
//! - units (uom SI types + millimetre/kilonewton constructors)
//! - timing (opt-in accumulating timers for header I/O)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod timing;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::SimulationId;
pub use units::*;
