//! Attribute value types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::StoreResult;

/// Format tag written into every header-line container.
pub const CONTAINER_FORMAT: &str = "dd-sim";
pub const CONTAINER_VERSION: u32 = 1;

/// A top-level attribute as stored in the container, tagged by dtype.
///
/// Float data keeps NaN and the infinities, see [`crate::floats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", rename_all = "lowercase")]
pub enum AttributeValue {
    F64 {
        shape: Vec<usize>,
        #[serde(with = "crate::floats")]
        data: Vec<f64>,
    },
    F32 {
        shape: Vec<usize>,
        #[serde(with = "crate::floats")]
        data: Vec<f32>,
    },
    I64 { shape: Vec<usize>, data: Vec<i64> },
    Text { value: String },
    /// Any dtype this crate does not model (`u8`, `bool`, compound, ...).
    #[serde(other)]
    Unsupported,
}

impl AttributeValue {
    /// One-dimensional f64 vector.
    pub fn f64_vector(data: Vec<f64>) -> Self {
        AttributeValue::F64 {
            shape: vec![data.len()],
            data,
        }
    }

    /// One-dimensional f32 vector.
    pub fn f32_vector(data: Vec<f32>) -> Self {
        AttributeValue::F32 {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn i64_vector(data: Vec<i64>) -> Self {
        AttributeValue::I64 {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            AttributeValue::F64 { .. } => "f64",
            AttributeValue::F32 { .. } => "f32",
            AttributeValue::I64 { .. } => "i64",
            AttributeValue::Text { .. } => "text",
            AttributeValue::Unsupported => "unsupported",
        }
    }

    /// Declared shape; scalars and text report an empty shape.
    pub fn shape(&self) -> &[usize] {
        match self {
            AttributeValue::F64 { shape, .. }
            | AttributeValue::F32 { shape, .. }
            | AttributeValue::I64 { shape, .. } => shape,
            AttributeValue::Text { .. } | AttributeValue::Unsupported => &[],
        }
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        match self {
            AttributeValue::F64 { data, .. } => data.len(),
            AttributeValue::F32 { data, .. } => data.len(),
            AttributeValue::I64 { data, .. } => data.len(),
            AttributeValue::Text { .. } | AttributeValue::Unsupported => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Floating point payload widened to f64. `None` for non-float dtypes.
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            AttributeValue::F64 { data, .. } => Some(data.clone()),
            AttributeValue::F32 { data, .. } => Some(data.iter().map(|&v| f64::from(v)).collect()),
            _ => None,
        }
    }
}

/// First line of a header-line container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerHeader {
    pub format: String,
    pub version: u32,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Default for ContainerHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerHeader {
    pub fn new() -> Self {
        Self {
            format: CONTAINER_FORMAT.to_string(),
            version: CONTAINER_VERSION,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: AttributeValue) -> StoreResult<Self> {
        self.set_attribute(name, value)?;
        Ok(self)
    }

    pub fn set_attribute(&mut self, name: &str, value: AttributeValue) -> StoreResult<()> {
        let json = serde_json::to_value(value)?;
        self.attributes.insert(name.to_string(), json);
        Ok(())
    }

    /// Insert a raw JSON attribute, bypassing [`AttributeValue`].
    pub fn with_raw_attribute(mut self, name: &str, raw: serde_json::Value) -> Self {
        self.attributes.insert(name.to_string(), raw);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_tag_is_serialized() {
        let value = AttributeValue::f64_vector(vec![1.0, 40.0, 5.0]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["dtype"], "f64");
        assert_eq!(json["shape"], serde_json::json!([3]));
    }

    #[test]
    fn unknown_dtype_decodes_as_unsupported() {
        let raw = serde_json::json!({"dtype": "u8", "shape": [3], "data": [1, 2, 3]});
        let value: AttributeValue = serde_json::from_value(raw).unwrap();
        assert_eq!(value, AttributeValue::Unsupported);
        assert_eq!(value.dtype(), "unsupported");
        assert!(value.as_f64_vec().is_none());
    }

    #[test]
    fn set_attribute_keeps_non_finite_data() {
        let mut header = ContainerHeader::new();
        header
            .set_attribute("material_parameters", AttributeValue::f64_vector(vec![f64::INFINITY, 1.0]))
            .unwrap();
        let raw = &header.attributes["material_parameters"];
        assert_eq!(raw["data"], serde_json::json!(["Infinity", 1.0]));
        assert!(!raw["data"][0].is_null());
    }

    #[test]
    fn f32_widens_losslessly() {
        let value = AttributeValue::f32_vector(vec![0.5, 1.25]);
        assert_eq!(value.as_f64_vec().unwrap(), vec![0.5, 1.25]);
        assert_eq!(value.shape(), &[2]);
        assert!(AttributeValue::i64_vector(vec![1]).as_f64_vec().is_none());
    }
}
