//! Batched access for pull-based consumers such as training loops.
//!
//! A [`BatchPlan`] is a plain list of position groups. Order is decided
//! before batching (identity, seeded shuffle or caller-supplied), and each
//! batch is resolved as a pass over its positions. Plans carry no mutable
//! state, so parallel workers each take their own shard.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;

use crate::config::EntryErrorPolicy;
use crate::error::{IndexError, IndexResult};
use crate::index::{SimulationIndex, SimulationRecord};
use crate::iter::{Entries, SkippedEntry, collect_pass};

/// How positions are ordered before they are cut into batches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOrder {
    /// `0..count`.
    #[default]
    Sequential,
    /// A ChaCha8 permutation of `0..count`; the same seed gives the same order.
    Shuffled { seed: u64 },
    /// Exactly these positions, in this order.
    Explicit(Vec<usize>),
}

/// Seeded permutation of `0..count`.
pub fn permutation(count: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut positions: Vec<usize> = (0..count).collect();
    positions.shuffle(&mut rng);
    positions
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchPlan {
    batches: Vec<Vec<usize>>,
}

impl BatchPlan {
    pub fn new(count: usize, size: usize, order: &BatchOrder) -> IndexResult<Self> {
        let positions = match order {
            BatchOrder::Sequential => (0..count).collect(),
            BatchOrder::Shuffled { seed } => permutation(count, *seed),
            BatchOrder::Explicit(positions) => positions.clone(),
        };
        Self::from_positions(positions, size)
    }

    /// Cut `positions` into consecutive groups of `size`; the last group
    /// holds the remainder.
    pub fn from_positions(positions: Vec<usize>, size: usize) -> IndexResult<Self> {
        if size == 0 {
            return Err(IndexError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            batches: positions.chunks(size).map(|c| c.to_vec()).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn batches(&self) -> &[Vec<usize>] {
        &self.batches
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.batches.iter().map(Vec::len).collect()
    }

    /// Total positions across all batches.
    pub fn position_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Batches `worker`, `worker + workers`, `worker + 2 * workers`, ...
    ///
    /// The shards of `0..workers` partition the plan.
    pub fn shard(&self, worker: usize, workers: usize) -> IndexResult<BatchPlan> {
        if workers == 0 || worker >= workers {
            return Err(IndexError::InvalidConfig(format!(
                "worker {} is not in 0..{}",
                worker, workers
            )));
        }
        Ok(Self {
            batches: self
                .batches
                .iter()
                .skip(worker)
                .step_by(workers)
                .cloned()
                .collect(),
        })
    }
}

/// One resolved batch.
#[derive(Debug)]
pub struct Batch {
    /// Batch number within its plan.
    pub number: usize,
    pub positions: Vec<usize>,
    pub records: Vec<SimulationRecord>,
    /// Entries dropped from this batch under [`EntryErrorPolicy::Skip`].
    pub skipped: Vec<SkippedEntry>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Lazily resolves a [`BatchPlan`], one batch per step.
pub struct Batches<'a> {
    index: &'a SimulationIndex,
    plan: BatchPlan,
    cursor: usize,
    policy: EntryErrorPolicy,
    done: bool,
}

impl<'a> Batches<'a> {
    pub(crate) fn new(index: &'a SimulationIndex, plan: BatchPlan, policy: EntryErrorPolicy) -> Self {
        Self {
            index,
            plan,
            cursor: 0,
            policy,
            done: false,
        }
    }

    pub fn with_policy(mut self, policy: EntryErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }
}

impl Iterator for Batches<'_> {
    type Item = IndexResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(positions) = self.plan.batches.get(self.cursor).cloned() else {
            self.done = true;
            return None;
        };
        let number = self.cursor;
        self.cursor += 1;

        let entries = Entries::positions(self.index, positions.clone(), self.policy);
        let (records, skipped) = match collect_pass(entries) {
            Ok(pass) => pass,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        Some(Ok(Batch {
            number,
            positions,
            records,
            skipped,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let remaining = self.plan.len().saturating_sub(self.cursor);
        (0, Some(remaining))
    }
}

impl FusedIterator for Batches<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_plan_keeps_remainder_last() {
        let plan = BatchPlan::new(5, 2, &BatchOrder::Sequential).unwrap();
        assert_eq!(plan.sizes(), vec![2, 2, 1]);
        assert_eq!(plan.batches(), &[vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(BatchPlan::new(5, 0, &BatchOrder::Sequential).is_err());
    }

    #[test]
    fn shuffled_plan_is_seeded() {
        let a = BatchPlan::new(50, 8, &BatchOrder::Shuffled { seed: 7 }).unwrap();
        let b = BatchPlan::new(50, 8, &BatchOrder::Shuffled { seed: 7 }).unwrap();
        let c = BatchPlan::new(50, 8, &BatchOrder::Shuffled { seed: 8 }).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.position_count(), 50);
    }

    #[test]
    fn explicit_order_is_kept() {
        let plan = BatchPlan::new(0, 2, &BatchOrder::Explicit(vec![4, 0, 3])).unwrap();
        assert_eq!(plan.batches(), &[vec![4, 0], vec![3]]);
    }

    #[test]
    fn shards_partition_the_plan() {
        let plan = BatchPlan::new(10, 3, &BatchOrder::Sequential).unwrap();
        let s0 = plan.shard(0, 2).unwrap();
        let s1 = plan.shard(1, 2).unwrap();
        assert_eq!(s0.batches(), &[vec![0, 1, 2], vec![6, 7, 8]]);
        assert_eq!(s1.batches(), &[vec![3, 4, 5], vec![9]]);
        assert!(plan.shard(2, 2).is_err());
        assert!(plan.shard(0, 0).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn every_position_appears_exactly_once(count in 0usize..200, size in 1usize..17, seed in any::<u64>()) {
            let plan = BatchPlan::new(count, size, &BatchOrder::Shuffled { seed }).unwrap();
            let mut seen: Vec<usize> = plan.batches().iter().flatten().copied().collect();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..count).collect::<Vec<_>>());
            prop_assert_eq!(plan.len(), count.div_ceil(size));
            prop_assert!(plan.sizes().iter().rev().skip(1).all(|&s| s == size));
        }
    }
}
