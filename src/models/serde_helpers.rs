//! Serde serialization helpers for ensuring consistent JSON output
//!
//! Host configuration objects use `false` to switch optional features off
//! (`debounceChanges: false`, `sessionKey: false`), so those fields accept
//! either a value or a boolean.

use serde::de::{self, Deserializer, Visitor};
use serde::{Serialize, Serializer};
use std::fmt;

/// Serialize Option<T> as null when None (don't skip the field)
pub fn serialize_option_as_null<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(v) => serializer.serialize_some(v),
        None => serializer.serialize_none(),
    }
}

struct NumberOrFalse;

impl<'de> Visitor<'de> for NumberOrFalse {
    type Value = Option<u64>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative number of milliseconds, false or null")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        if v {
            Err(E::invalid_value(de::Unexpected::Bool(true), &self))
        } else {
            Ok(None)
        }
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(Some)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if v >= 0.0 && v.is_finite() {
            Ok(Some(v.round() as u64))
        } else {
            Err(E::invalid_value(de::Unexpected::Float(v), &self))
        }
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(NumberOrFalse)
    }
}

/// Deserialize `number | false | null` into `Option<u64>`
pub fn number_or_false<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(NumberOrFalse)
}

struct StringOrFalse;

impl<'de> Visitor<'de> for StringOrFalse {
    type Value = Option<String>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, false or null")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        if v {
            Err(E::invalid_value(de::Unexpected::Bool(true), &self))
        } else {
            Ok(None)
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(StringOrFalse)
    }
}

/// Deserialize `string | false | null` into `Option<String>`
pub fn string_or_false<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(StringOrFalse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Deserialize, Serialize)]
    struct Probe {
        #[serde(default, deserialize_with = "number_or_false", serialize_with = "serialize_option_as_null")]
        debounce: Option<u64>,
        #[serde(default, deserialize_with = "string_or_false")]
        key: Option<String>,
    }

    #[test]
    fn test_number_or_false() {
        let p: Probe = serde_json::from_str(r#"{"debounce": 250}"#).unwrap();
        assert_eq!(p.debounce, Some(250));
        let p: Probe = serde_json::from_str(r#"{"debounce": false}"#).unwrap();
        assert_eq!(p.debounce, None);
        let p: Probe = serde_json::from_str(r#"{"debounce": null}"#).unwrap();
        assert_eq!(p.debounce, None);
        assert!(serde_json::from_str::<Probe>(r#"{"debounce": true}"#).is_err());
    }

    #[test]
    fn test_string_or_false() {
        let p: Probe = serde_json::from_str(r#"{"key": "abc"}"#).unwrap();
        assert_eq!(p.key.as_deref(), Some("abc"));
        let p: Probe = serde_json::from_str(r#"{"key": false}"#).unwrap();
        assert_eq!(p.key, None);
    }

    #[test]
    fn test_none_serializes_as_null() {
        let p = Probe { debounce: None, key: None };
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains(r#""debounce":null"#));
    }
}
