//! Lenient field decoders for third-party JSON, where numbers often arrive as
//! strings, flags as "0"/"1" and objects as null.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Number or numeric string; anything else is 0.
pub fn f64_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(opt_f64(d)?.unwrap_or(0.0))
}

/// Number or numeric string; anything else is None.
pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(number))
}

/// Non-negative integer, possibly string-encoded; anything else is 0.
pub fn u64_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Ok(opt_u64(d)?.unwrap_or(0))
}

pub fn opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(opt_f64(d)?.filter(|v| *v >= 0.0).map(|v| v as u64))
}

/// "1" / 1 / true → Some(true), "0" / 0 / false → Some(false), else None.
pub fn opt_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(opt_f64(d)?.map(|v| v != 0.0))
}

/// Treat an explicit null like a missing field.
pub fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct Sample {
        #[serde(deserialize_with = "f64_or_zero")]
        price: f64,
        #[serde(deserialize_with = "opt_flag")]
        flag: Option<bool>,
        #[serde(deserialize_with = "u64_or_zero")]
        count: u64,
        #[serde(deserialize_with = "null_default")]
        tags: Vec<String>,
    }

    #[test]
    fn test_lenient_decoding() {
        let s: Sample = serde_json::from_value(json!({
            "price": "0.0123", "flag": "1", "count": "42", "tags": null
        }))
        .unwrap();
        assert_eq!(s.price, 0.0123);
        assert_eq!(s.flag, Some(true));
        assert_eq!(s.count, 42);
        assert!(s.tags.is_empty());

        let s: Sample = serde_json::from_value(json!({ "price": null, "flag": "", "count": -3 })).unwrap();
        assert_eq!(s.price, 0.0);
        assert_eq!(s.flag, None);
        assert_eq!(s.count, 0);
    }
}
