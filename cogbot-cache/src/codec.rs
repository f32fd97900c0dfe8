//! Textual representation of values inside the remote store.
//!
//! Integers are stored as plain decimal literals so that the store's own
//! `INCRBY` operates on them. Every other kind is prefixed with a two-byte
//! tag. Records that neither carry a tag nor are a canonical integer are
//! considered foreign and fail any typed read.

use serde_json::Value as JsonValue;

use crate::{
    error::{KindMismatch, Result},
    value::{Value, ValueKind},
};

pub(crate) const STR_TAG: &str = "s|";
pub(crate) const FLOAT_TAG: &str = "f|";
pub(crate) const BOOL_TAG: &str = "b|";

pub fn encode(value: &Value) -> String {
    match value {
        Value::Str(s) => {
            let mut encoded = String::with_capacity(STR_TAG.len() + s.len());
            encoded.push_str(STR_TAG);
            encoded.push_str(s);

            encoded
        }
        Value::Int(n) => itoa::Buffer::new().format(*n).to_owned(),
        // `Display` for floats emits the shortest representation that
        // parses back into the identical value
        Value::Float(n) => format!("{FLOAT_TAG}{n}"),
        Value::Bool(true) => format!("{BOOL_TAG}true"),
        Value::Bool(false) => format!("{BOOL_TAG}false"),
    }
}

/// Encode a dynamically typed value, rejecting anything but the four
/// supported primitives.
pub fn encode_json(value: JsonValue) -> Result<String> {
    Value::try_from(value).map(|value| encode(&value))
}

pub fn decode(repr: &str, expected: ValueKind) -> Result<Value, KindMismatch> {
    match decode_any(repr) {
        Some(value) if value.kind() == expected => Ok(value),
        Some(value) => Err(KindMismatch {
            expected,
            found: Some(value.kind()),
        }),
        None => Err(KindMismatch {
            expected,
            found: None,
        }),
    }
}

/// Decode a record without knowing which kind to expect.
pub fn decode_any(repr: &str) -> Option<Value> {
    if let Some(s) = repr.strip_prefix(STR_TAG) {
        Some(Value::Str(s.to_owned()))
    } else if let Some(n) = repr.strip_prefix(FLOAT_TAG) {
        n.parse().ok().map(Value::Float)
    } else if let Some(b) = repr.strip_prefix(BOOL_TAG) {
        match b {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        }
    } else {
        decode_int(repr).map(Value::Int)
    }
}

/// Only canonical literals count as integers, e.g. `"+5"` or `"007"` do not.
fn decode_int(repr: &str) -> Option<i64> {
    let n = repr.parse().ok()?;

    (itoa::Buffer::new().format(n) == repr).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: Value) {
        let kind = value.kind();
        let encoded = encode(&value);

        assert_eq!(decode(&encoded, kind), Ok(value), "encoded as `{encoded}`");
    }

    #[test]
    fn strings_round_trip() {
        for s in ["", "alice", "true", "false", "42", "-1.5", "s|nested", "f|1", "ünï ✓"] {
            round_trip(Value::Str(s.to_owned()));
        }
    }

    #[test]
    fn integers_round_trip() {
        for n in [0, 1, -1, 42, i64::MAX, i64::MIN] {
            round_trip(Value::Int(n));
        }
    }

    #[test]
    fn floats_round_trip() {
        let values = [
            0.0,
            -0.0,
            1.0,
            -2.5,
            0.1 + 0.2,
            f64::MAX,
            f64::MIN_POSITIVE,
            f64::EPSILON,
            -1e-300,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ];

        for n in values {
            let encoded = encode(&Value::Float(n));

            match decode(&encoded, ValueKind::Float) {
                Ok(Value::Float(decoded)) => {
                    assert_eq!(decoded.to_bits(), n.to_bits(), "encoded as `{encoded}`")
                }
                other => panic!("unexpected decoding of `{encoded}`: {other:?}"),
            }
        }
    }

    #[test]
    fn nan_round_trips() {
        let encoded = encode(&Value::Float(f64::NAN));

        assert!(matches!(decode(&encoded, ValueKind::Float), Ok(Value::Float(n)) if n.is_nan()));
    }

    #[test]
    fn booleans_round_trip() {
        round_trip(Value::Bool(true));
        round_trip(Value::Bool(false));
    }

    #[test]
    fn float_is_not_integer() {
        let encoded = encode(&Value::Float(3.0));

        assert_eq!(
            decode(&encoded, ValueKind::Int),
            Err(KindMismatch {
                expected: ValueKind::Int,
                found: Some(ValueKind::Float),
            })
        );
    }

    #[test]
    fn boolean_is_not_integer() {
        let encoded = encode(&Value::Bool(true));

        assert_eq!(
            decode(&encoded, ValueKind::Int),
            Err(KindMismatch {
                expected: ValueKind::Int,
                found: Some(ValueKind::Bool),
            })
        );
    }

    #[test]
    fn foreign_records_are_unrecognized() {
        for repr in ["hello", "+5", "007", "b|yes", "f|abc", " 1"] {
            assert_eq!(decode_any(repr), None, "`{repr}` was recognized");
        }
    }

    #[test]
    fn json_containers_fail_to_encode() {
        assert!(encode_json(serde_json::json!([1])).is_err());
        assert_eq!(encode_json(serde_json::json!(7)).unwrap(), "7");
    }
}
