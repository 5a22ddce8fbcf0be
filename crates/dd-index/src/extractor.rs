//! Metadata extraction from a backing file's top-level attributes.
//!
//! Each call opens the file through the configured [`AttributeStore`], reads
//! the two parameter vectors and drops the reader before returning. Nested
//! groups holding field data are never touched.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use dd_core::timing::{Timer, header_timing};
use dd_core::{Force, Length, kn, mm};
use dd_store::{AttributeReader, AttributeStore, AutoStore, StoreError};

use crate::error::MetadataError;

pub const GEOMETRY_ATTRIBUTE: &str = "geometry_parameters";
pub const MATERIAL_ATTRIBUTE: &str = "material_parameters";
pub const GEOMETRY_LEN: usize = 3;
pub const MATERIAL_LEN: usize = 4;

/// Tool geometry family encoded in `geometry[0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ShapeClass {
    /// `R`
    Rectangular,
    /// `V`
    Concave,
    /// `X`
    Convex,
}

impl ShapeClass {
    pub fn from_code(code: f64) -> Option<Self> {
        match code {
            c if c == 1.0 => Some(ShapeClass::Rectangular),
            c if c == 2.0 => Some(ShapeClass::Concave),
            c if c == 3.0 => Some(ShapeClass::Convex),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            ShapeClass::Rectangular => 'R',
            ShapeClass::Concave => 'V',
            ShapeClass::Convex => 'X',
        }
    }
}

impl fmt::Display for ShapeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShapeClass::Rectangular => "rectangular",
            ShapeClass::Concave => "concave",
            ShapeClass::Convex => "convex",
        };
        write!(f, "{} ({})", name, self.letter())
    }
}

/// Decoded parameter vectors of one simulation.
///
/// The arrays hold the attribute values exactly as decoded, so two
/// extractions of an unchanged file compare bit-identical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationMetadata {
    /// `[shape class code, primary radius, secondary radius]`
    pub geometry: [f64; GEOMETRY_LEN],
    /// `[sheet thickness, scale factor, friction coefficient, holder force]`
    pub material: [f64; MATERIAL_LEN],
}

impl SimulationMetadata {
    pub fn shape_code(&self) -> f64 {
        self.geometry[0]
    }

    /// `None` when the producer used a code outside 1..=3.
    pub fn shape_class(&self) -> Option<ShapeClass> {
        ShapeClass::from_code(self.geometry[0])
    }

    pub fn primary_radius(&self) -> Length {
        mm(self.geometry[1])
    }

    pub fn secondary_radius(&self) -> Length {
        mm(self.geometry[2])
    }

    pub fn thickness(&self) -> Length {
        mm(self.material[0])
    }

    pub fn scale_factor(&self) -> f64 {
        self.material[1]
    }

    pub fn friction(&self) -> f64 {
        self.material[2]
    }

    pub fn holder_force(&self) -> Force {
        kn(self.material[3])
    }

    /// Raw bit patterns, for exact comparisons that also distinguish `-0.0`.
    pub fn to_bits(&self) -> ([u64; GEOMETRY_LEN], [u64; MATERIAL_LEN]) {
        (
            self.geometry.map(f64::to_bits),
            self.material.map(f64::to_bits),
        )
    }
}

/// Stateless reader of [`SimulationMetadata`]; cheap to clone and share.
#[derive(Clone)]
pub struct MetadataExtractor {
    store: Arc<dyn AttributeStore>,
}

/// Sniffs each file and picks the matching store, see [`AutoStore`].
impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(Arc::new(AutoStore::new()))
    }
}

impl fmt::Debug for MetadataExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataExtractor").finish_non_exhaustive()
    }
}

impl MetadataExtractor {
    pub fn new(store: Arc<dyn AttributeStore>) -> Self {
        Self { store }
    }

    pub fn extract(&self, path: &Path) -> Result<SimulationMetadata, MetadataError> {
        let timer = Timer::start("extract");
        let result = {
            let reader = self.store.open(path)?;
            decode(reader.as_ref())
        };
        timer.stop_into(&header_timing::EXTRACT_CALLS);
        result
    }
}

fn decode(reader: &dyn AttributeReader) -> Result<SimulationMetadata, MetadataError> {
    let geometry = read_vector::<GEOMETRY_LEN>(reader, GEOMETRY_ATTRIBUTE)?;
    let material = read_vector::<MATERIAL_LEN>(reader, MATERIAL_ATTRIBUTE)?;
    Ok(SimulationMetadata { geometry, material })
}

fn read_vector<const N: usize>(
    reader: &dyn AttributeReader,
    attribute: &'static str,
) -> Result<[f64; N], MetadataError> {
    let value = match reader.attribute(attribute) {
        Ok(Some(value)) => value,
        Ok(None) => return Err(MetadataError::NotFound { attribute }),
        Err(StoreError::Decode { message, .. }) => {
            return Err(MetadataError::Malformed {
                attribute,
                reason: message,
            });
        }
        Err(err) => return Err(err.into()),
    };

    let malformed = |reason: String| MetadataError::Malformed { attribute, reason };

    let Some(data) = value.as_f64_vec() else {
        return Err(malformed(format!(
            "expected a float vector, found dtype {}",
            value.dtype()
        )));
    };
    if value.shape() != [N] {
        return Err(malformed(format!(
            "expected shape [{}], found {:?}",
            N,
            value.shape()
        )));
    }
    data.try_into()
        .map_err(|data: Vec<f64>| malformed(format!("expected {} values, found {}", N, data.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dd_store::{AttributeValue, MemoryStore};

    fn extractor_for(
        attributes: impl IntoIterator<Item = (&'static str, AttributeValue)>,
    ) -> MetadataExtractor {
        let store = MemoryStore::new().with_container("/sim/1.h5", attributes);
        MetadataExtractor::new(Arc::new(store))
    }

    fn valid() -> Vec<(&'static str, AttributeValue)> {
        vec![
            (
                GEOMETRY_ATTRIBUTE,
                AttributeValue::f64_vector(vec![1.0, 40.0, 5.0]),
            ),
            (
                MATERIAL_ATTRIBUTE,
                AttributeValue::f64_vector(vec![1.2, 1.0, 0.08, 250.0]),
            ),
        ]
    }

    #[test]
    fn decodes_both_vectors() {
        let meta = extractor_for(valid()).extract(Path::new("/sim/1.h5")).unwrap();
        assert_eq!(meta.geometry, [1.0, 40.0, 5.0]);
        assert_eq!(meta.material, [1.2, 1.0, 0.08, 250.0]);
        assert_eq!(meta.shape_class(), Some(ShapeClass::Rectangular));
        assert_eq!(meta.friction(), 0.08);
        assert_eq!(meta.scale_factor(), 1.0);
    }

    #[test]
    fn typed_accessors_carry_units() {
        use uom::si::force::newton;
        use uom::si::length::millimeter;

        let meta = extractor_for(valid()).extract(Path::new("/sim/1.h5")).unwrap();
        assert!((meta.primary_radius().get::<millimeter>() - 40.0).abs() < 1e-9);
        assert!((meta.thickness().get::<millimeter>() - 1.2).abs() < 1e-9);
        assert!((meta.holder_force().get::<newton>() - 250_000.0).abs() < 1e-6);
    }

    #[test]
    fn missing_attribute_is_not_found() {
        let mut attrs = valid();
        attrs.pop();
        let err = extractor_for(attrs)
            .extract(Path::new("/sim/1.h5"))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(format!("{err}").contains(MATERIAL_ATTRIBUTE));
    }

    #[test]
    fn wrong_length_is_malformed() {
        let mut attrs = valid();
        attrs[0].1 = AttributeValue::f64_vector(vec![1.0, 40.0]);
        let err = extractor_for(attrs)
            .extract(Path::new("/sim/1.h5"))
            .unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn shape_and_data_must_agree() {
        let mut attrs = valid();
        attrs[0].1 = AttributeValue::F64 {
            shape: vec![3],
            data: vec![1.0, 2.0],
        };
        let err = extractor_for(attrs)
            .extract(Path::new("/sim/1.h5"))
            .unwrap_err();
        assert!(err.is_malformed());
        assert!(format!("{err}").contains("expected 3 values"));
    }

    #[test]
    fn integer_dtype_is_malformed() {
        let mut attrs = valid();
        attrs[1].1 = AttributeValue::i64_vector(vec![1, 1, 0, 250]);
        let err = extractor_for(attrs)
            .extract(Path::new("/sim/1.h5"))
            .unwrap_err();
        assert!(err.is_malformed());
        assert!(format!("{err}").contains("dtype i64"));
    }

    #[test]
    fn non_finite_values_are_kept() {
        let mut attrs = valid();
        attrs[1].1 = AttributeValue::f64_vector(vec![1.2, f64::NAN, f64::INFINITY, 250.0]);
        attrs[0].1 = AttributeValue::f32_vector(vec![1.0, f32::NEG_INFINITY, 5.0]);
        let meta = extractor_for(attrs).extract(Path::new("/sim/1.h5")).unwrap();
        assert!(meta.material[1].is_nan());
        assert_eq!(meta.material[2], f64::INFINITY);
        assert_eq!(meta.geometry[1], f64::NEG_INFINITY);
        assert_eq!(meta.shape_class(), Some(ShapeClass::Rectangular));
    }

    #[test]
    fn f32_vectors_are_widened() {
        let mut attrs = valid();
        attrs[0].1 = AttributeValue::f32_vector(vec![2.0, 40.0, 5.5]);
        let meta = extractor_for(attrs).extract(Path::new("/sim/1.h5")).unwrap();
        assert_eq!(meta.geometry, [2.0, 40.0, 5.5]);
        assert_eq!(meta.shape_class(), Some(ShapeClass::Concave));
    }

    #[test]
    fn unopenable_file_is_a_store_error() {
        let err = extractor_for(valid())
            .extract(Path::new("/sim/2.h5"))
            .unwrap_err();
        assert!(matches!(err, MetadataError::Store(_)));
    }

    #[test]
    fn extraction_is_idempotent() {
        let extractor = extractor_for(valid());
        let a = extractor.extract(Path::new("/sim/1.h5")).unwrap();
        let b = extractor.extract(Path::new("/sim/1.h5")).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn unknown_shape_code_has_no_class() {
        let mut attrs = valid();
        attrs[0].1 = AttributeValue::f64_vector(vec![9.0, 40.0, 5.0]);
        let meta = extractor_for(attrs).extract(Path::new("/sim/1.h5")).unwrap();
        assert_eq!(meta.shape_class(), None);
        assert_eq!(meta.shape_code(), 9.0);
    }
}
