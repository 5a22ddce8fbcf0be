//! Lazy sequential passes over an index.

use serde::Serialize;
use std::iter::FusedIterator;
use std::ops::Range;
use std::path::PathBuf;
use tracing::warn;

use dd_core::SimulationId;

use crate::config::EntryErrorPolicy;
use crate::error::{EntryErrorKind, IndexError, IndexResult};
use crate::index::{SimulationIndex, SimulationRecord};

/// An entry a pass stepped over under [`EntryErrorPolicy::Skip`].
#[derive(Debug)]
pub struct SkippedEntry {
    pub position: usize,
    /// `None` when the position itself was out of range.
    pub id: Option<SimulationId>,
    pub path: Option<PathBuf>,
    pub error: IndexError,
}

impl SkippedEntry {
    pub(crate) fn new(index: &SimulationIndex, position: usize, error: IndexError) -> Self {
        Self {
            position,
            id: index.id_at(position).cloned(),
            path: index.path_at(position).map(|p| p.to_path_buf()),
            error,
        }
    }

    pub fn kind(&self) -> EntryErrorKind {
        self.error.entry_kind()
    }

    pub fn report(&self) -> SkipReport {
        SkipReport {
            position: self.position,
            id: self.id.clone(),
            path: self.path.clone(),
            kind: self.kind(),
            message: self.error.to_string(),
        }
    }
}

/// Serializable view of a [`SkippedEntry`].
#[derive(Debug, Clone, Serialize)]
pub struct SkipReport {
    pub position: usize,
    pub id: Option<SimulationId>,
    pub path: Option<PathBuf>,
    pub kind: EntryErrorKind,
    pub message: String,
}

fn log_skip(entry: &SkippedEntry) {
    warn!(
        position = entry.position,
        id = ?entry.id,
        kind = %entry.kind(),
        error = %entry.error,
        "skipping entry"
    );
}

enum Order {
    Range(Range<usize>),
    Explicit { positions: Vec<usize>, cursor: usize },
}

impl Order {
    fn next_position(&mut self) -> Option<usize> {
        match self {
            Order::Range(range) => range.next(),
            Order::Explicit { positions, cursor } => {
                let position = positions.get(*cursor).copied();
                *cursor += 1;
                position
            }
        }
    }

    fn remaining(&self) -> usize {
        match self {
            Order::Range(range) => range.len(),
            Order::Explicit { positions, cursor } => positions.len().saturating_sub(*cursor),
        }
    }
}

/// Iterator of `(id, metadata, path)` records.
///
/// Each step performs at most one header read. Under `Skip` failed entries
/// are logged, collected in [`Entries::skipped`] and never yielded; under
/// `Abort` the first failure is yielded and the pass ends. Dropping the
/// iterator is the only cancellation needed.
pub struct Entries<'a> {
    index: &'a SimulationIndex,
    order: Order,
    policy: EntryErrorPolicy,
    skipped: Vec<SkippedEntry>,
    yielded: usize,
    done: bool,
}

impl<'a> Entries<'a> {
    pub(crate) fn all(index: &'a SimulationIndex, policy: EntryErrorPolicy) -> Self {
        Self::with_order(index, Order::Range(0..index.count()), policy)
    }

    pub(crate) fn positions(
        index: &'a SimulationIndex,
        positions: Vec<usize>,
        policy: EntryErrorPolicy,
    ) -> Self {
        Self::with_order(
            index,
            Order::Explicit {
                positions,
                cursor: 0,
            },
            policy,
        )
    }

    fn with_order(index: &'a SimulationIndex, order: Order, policy: EntryErrorPolicy) -> Self {
        Self {
            index,
            order,
            policy,
            skipped: Vec::new(),
            yielded: 0,
            done: false,
        }
    }

    pub fn policy(&self) -> EntryErrorPolicy {
        self.policy
    }

    /// Entries skipped so far.
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    pub fn into_skipped(self) -> Vec<SkippedEntry> {
        self.skipped
    }

    /// Records yielded so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }
}

impl Iterator for Entries<'_> {
    type Item = IndexResult<SimulationRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let Some(position) = self.order.next_position() else {
                self.done = true;
                return None;
            };

            match self.index.at(position) {
                Ok(record) => {
                    self.yielded += 1;
                    return Some(Ok(record));
                }
                Err(err) => match self.policy {
                    EntryErrorPolicy::Abort => {
                        self.done = true;
                        return Some(Err(err));
                    }
                    EntryErrorPolicy::Skip => {
                        let entry = SkippedEntry::new(self.index, position, err);
                        log_skip(&entry);
                        self.skipped.push(entry);
                    }
                },
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        (0, Some(self.order.remaining()))
    }
}

impl FusedIterator for Entries<'_> {}

/// Run a full pass and collect records plus skips in one go.
pub fn collect_pass(mut entries: Entries<'_>) -> IndexResult<(Vec<SimulationRecord>, Vec<SkippedEntry>)> {
    let mut records = Vec::new();
    for item in entries.by_ref() {
        records.push(item?);
    }
    Ok((records, entries.into_skipped()))
}
