//! Float vectors that keep IEEE special values through JSON.
//!
//! JSON has no literal for NaN or the infinities and serde_json writes them
//! as `null`. Finite values stay plain numbers; specials are written as
//! string tokens and read back from them. NaN payload bits are not kept.

use serde::de::{DeserializeOwned, Error as _};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const NAN_TOKEN: &str = "NaN";
pub const INFINITY_TOKEN: &str = "Infinity";
pub const NEG_INFINITY_TOKEN: &str = "-Infinity";

pub trait Float: Copy + Serialize + DeserializeOwned {
    const NAN: Self;
    const INFINITY: Self;
    const NEG_INFINITY: Self;

    fn is_finite(self) -> bool;
    fn is_nan(self) -> bool;
    fn is_sign_negative(self) -> bool;
}

macro_rules! impl_float {
    ($($t:ty),*) => {
        $(
            impl Float for $t {
                const NAN: Self = <$t>::NAN;
                const INFINITY: Self = <$t>::INFINITY;
                const NEG_INFINITY: Self = <$t>::NEG_INFINITY;

                fn is_finite(self) -> bool {
                    <$t>::is_finite(self)
                }

                fn is_nan(self) -> bool {
                    <$t>::is_nan(self)
                }

                fn is_sign_negative(self) -> bool {
                    <$t>::is_sign_negative(self)
                }
            }
        )*
    };
}

impl_float!(f32, f64);

fn token<T: Float>(v: T) -> &'static str {
    if v.is_nan() {
        NAN_TOKEN
    } else if v.is_sign_negative() {
        NEG_INFINITY_TOKEN
    } else {
        INFINITY_TOKEN
    }
}

fn from_token<T: Float>(token: &str) -> Option<T> {
    match token {
        NAN_TOKEN => Some(T::NAN),
        INFINITY_TOKEN => Some(T::INFINITY),
        NEG_INFINITY_TOKEN => Some(T::NEG_INFINITY),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Element<T> {
    Number(T),
    Token(String),
}

#[allow(clippy::ptr_arg)]
pub fn serialize<T, S>(data: &Vec<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Float,
    S: Serializer,
{
    let mut seq = serializer.serialize_seq(Some(data.len()))?;
    for &v in data {
        if v.is_finite() {
            seq.serialize_element(&v)?;
        } else {
            seq.serialize_element(token(v))?;
        }
    }
    seq.end()
}

pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    T: Float,
    D: Deserializer<'de>,
{
    Vec::<Element<T>>::deserialize(deserializer)?
        .into_iter()
        .map(|element| match element {
            Element::Number(v) => Ok(v),
            Element::Token(t) => from_token(&t)
                .ok_or_else(|| D::Error::custom(format!("unknown float token '{t}'"))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::AttributeValue;

    #[test]
    fn specials_are_written_as_tokens() {
        let value = AttributeValue::f64_vector(vec![1.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["data"], serde_json::json!([1.5, "NaN", "Infinity", "-Infinity"]));
    }

    #[test]
    fn tokens_read_back_as_specials() {
        let raw = serde_json::json!({"dtype": "f32", "shape": [3], "data": [0.1, "-Infinity", "NaN"]});
        let value: AttributeValue = serde_json::from_value(raw).unwrap();
        let AttributeValue::F32 { data, .. } = &value else {
            panic!("expected f32, got {value:?}");
        };
        assert_eq!(data[0], 0.1f32);
        assert_eq!(data[1], f32::NEG_INFINITY);
        assert!(data[2].is_nan());
    }

    #[test]
    fn null_and_unknown_tokens_are_rejected() {
        for data in [serde_json::json!([1.0, null]), serde_json::json!(["inf"])] {
            let raw = serde_json::json!({"dtype": "f64", "shape": [2], "data": data});
            assert!(serde_json::from_value::<AttributeValue>(raw).is_err());
        }
    }
}
