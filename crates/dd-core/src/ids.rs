use core::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// Stable key for one simulation, derived from its backing file's name.
///
/// - numeric stems (`113525`) become `Numeric`
/// - other well-formed stems (`punch_a-7`) become `Named`
///
/// Ordering puts every numeric id before every named id, numeric ids ascend
/// by value and named ids ascend lexicographically. Index positions rely on
/// this ordering being total and platform independent.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum SimulationId {
    Numeric(u64),
    Named(String),
}

impl SimulationId {
    /// Derive an id from a file stem (the file name without extension).
    ///
    /// Accepts ASCII alphanumerics, `-` and `_`. Anything else (dots,
    /// whitespace, an empty stem) is rejected so that `113525.0.h5` never
    /// silently aliases `113525.h5`.
    pub fn from_stem(stem: &str) -> CoreResult<Self> {
        if stem.is_empty() {
            return Err(CoreError::InvalidIdentifier {
                stem: stem.to_string(),
                reason: "empty file stem",
            });
        }
        if !stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidIdentifier {
                stem: stem.to_string(),
                reason: "stem may only contain ASCII alphanumerics, '-' and '_'",
            });
        }

        if stem.bytes().all(|b| b.is_ascii_digit()) {
            return stem
                .parse::<u64>()
                .map(SimulationId::Numeric)
                .map_err(|_| CoreError::InvalidIdentifier {
                    stem: stem.to_string(),
                    reason: "numeric stem does not fit in 64 bits",
                });
        }

        Ok(SimulationId::Named(stem.to_string()))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SimulationId::Numeric(_))
    }

    pub fn as_numeric(&self) -> Option<u64> {
        match self {
            SimulationId::Numeric(n) => Some(*n),
            SimulationId::Named(_) => None,
        }
    }
}

impl From<u64> for SimulationId {
    fn from(value: u64) -> Self {
        SimulationId::Numeric(value)
    }
}

impl FromStr for SimulationId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_stem(s)
    }
}

/// Integers map to `Numeric`; strings go through [`SimulationId::from_stem`],
/// so `"7"` and `7` decode to the same id.
#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for SimulationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct IdVisitor;

        impl serde::de::Visitor<'_> for IdVisitor {
            type Value = SimulationId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or a simulation file stem")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<SimulationId, E> {
                Ok(SimulationId::Numeric(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<SimulationId, E> {
                u64::try_from(v)
                    .map(SimulationId::Numeric)
                    .map_err(|_| E::invalid_value(serde::de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<SimulationId, E> {
                SimulationId::from_stem(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

impl fmt::Debug for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationId::Numeric(n) => write!(f, "SimulationId({})", n),
            SimulationId::Named(s) => write!(f, "SimulationId({:?})", s),
        }
    }
}

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationId::Numeric(n) => write!(f, "{}", n),
            SimulationId::Named(s) => f.write_str(s),
        }
    }
}


#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn numeric_strings_decode_as_numbers() {
        let quoted: SimulationId = serde_json::from_str("\"7\"").unwrap();
        let bare: SimulationId = serde_json::from_str("7").unwrap();
        assert_eq!(quoted, SimulationId::Numeric(7));
        assert_eq!(quoted, bare);

        let named: SimulationId = serde_json::from_str("\"blank_a\"").unwrap();
        assert_eq!(named, SimulationId::Named("blank_a".to_string()));
    }

    #[test]
    fn serialized_ids_read_back_unchanged() {
        for id in [SimulationId::from(113525), SimulationId::from_stem("punch-2").unwrap()] {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(serde_json::from_str::<SimulationId>(&json).unwrap(), id);
        }
        assert_eq!(serde_json::to_string(&SimulationId::from(7)).unwrap(), "7");
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        for json in ["\"6.0\"", "\"\"", "-3", "1.5", "null"] {
            assert!(serde_json::from_str::<SimulationId>(json).is_err(), "{json}");
        }
    }
}
