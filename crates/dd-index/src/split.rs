//! Reproducible position splits and samples.
//!
//! Everything here is a pure function of `(count, seed)`. Indexes with equal
//! digests therefore produce identical splits.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::batch::permutation;
use crate::error::{IndexError, IndexResult};

pub const DEFAULT_SPLIT_SEED: u64 = 42;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitLabel {
    Train,
    Validation,
    Test,
}

impl fmt::Display for SplitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SplitLabel::Train => "train",
            SplitLabel::Validation => "validation",
            SplitLabel::Test => "test",
        };
        f.pad(label)
    }
}

/// Fractions assigned to each split.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub validation: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.75,
            validation: 0.10,
            test: 0.15,
        }
    }
}

impl SplitRatios {
    /// Validate that every ratio is in `[0, 1]` and they sum to `1.0`.
    pub fn normalized(self) -> IndexResult<Self> {
        for (name, value) in [
            ("train", self.train),
            ("validation", self.validation),
            ("test", self.test),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(IndexError::InvalidConfig(format!(
                    "{} ratio {} is outside [0, 1]",
                    name, value
                )));
            }
        }
        let sum = self.train + self.validation + self.test;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(IndexError::InvalidConfig(format!(
                "split ratios must sum to 1.0 (got {})",
                sum
            )));
        }
        Ok(self)
    }
}

/// Positions per split. Disjoint, and together they cover `0..count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Splits {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

impl Splits {
    pub fn get(&self, label: SplitLabel) -> &[usize] {
        match label {
            SplitLabel::Train => &self.train,
            SplitLabel::Validation => &self.validation,
            SplitLabel::Test => &self.test,
        }
    }

    pub fn label_of(&self, position: usize) -> Option<SplitLabel> {
        [SplitLabel::Train, SplitLabel::Validation, SplitLabel::Test]
            .into_iter()
            .find(|&label| self.get(label).contains(&position))
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

/// Shuffle `0..count` with `seed`, then cut train and validation by
/// flooring `count * ratio`; test takes the remainder.
pub fn split_positions(count: usize, ratios: SplitRatios, seed: u64) -> IndexResult<Splits> {
    let ratios = ratios.normalized()?;
    let shuffled = permutation(count, seed);

    let train_len = ((count as f64) * ratios.train).floor() as usize;
    let validation_len = (((count as f64) * ratios.validation).floor() as usize)
        .min(count - train_len);

    let (train, rest) = shuffled.split_at(train_len);
    let (validation, test) = rest.split_at(validation_len);

    Ok(Splits {
        train: train.to_vec(),
        validation: validation.to_vec(),
        test: test.to_vec(),
    })
}

/// `min(n, count)` distinct positions in shuffled order.
pub fn sample_positions(count: usize, n: usize, seed: u64) -> Vec<usize> {
    let mut positions = permutation(count, seed);
    positions.truncate(n.min(count));
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_split_sizes() {
        let splits = split_positions(100, SplitRatios::default(), DEFAULT_SPLIT_SEED).unwrap();
        assert_eq!(splits.train.len(), 75);
        assert_eq!(splits.validation.len(), 10);
        assert_eq!(splits.test.len(), 15);
        assert_eq!(splits.total(), 100);
    }

    #[test]
    fn splits_are_disjoint_and_complete() {
        let splits = split_positions(37, SplitRatios::default(), 3).unwrap();
        let mut all: Vec<usize> = splits
            .train
            .iter()
            .chain(&splits.validation)
            .chain(&splits.test)
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..37).collect::<Vec<_>>());
        assert_eq!(splits.label_of(splits.test[0]), Some(SplitLabel::Test));
        assert_eq!(splits.label_of(999), None);
    }

    #[test]
    fn same_seed_same_split() {
        let a = split_positions(20, SplitRatios::default(), 9).unwrap();
        let b = split_positions(20, SplitRatios::default(), 9).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bad_ratios_are_rejected() {
        let ratios = SplitRatios {
            train: 0.8,
            validation: 0.3,
            test: 0.1,
        };
        assert!(split_positions(10, ratios, 1).is_err());

        let negative = SplitRatios {
            train: 1.2,
            validation: -0.2,
            test: 0.0,
        };
        assert!(negative.normalized().is_err());
    }

    #[test]
    fn sample_is_capped_and_distinct() {
        let sample = sample_positions(5, 10, 1);
        assert_eq!(sample.len(), 5);
        let mut sorted = sample.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 5);
        assert_eq!(sample_positions(5, 2, 1).len(), 2);
        assert!(sample_positions(0, 3, 1).is_empty());
    }
}
