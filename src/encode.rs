//! Typed value to JSON encoding.
//!
//! Encoding runs right before an API request body is built. It fails on any
//! unknown value, since an unknown reaching the encoder means the operation
//! started before the configuration settled.
//!
//! `Number` values are converted to `f64` on a best-effort basis. Decimals
//! with more significant digits than a double holds lose precision silently.

use crate::error::{join_path, ConversionError};
use crate::value::Value;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Number, Value as Json};

/// Encode a typed value as JSON.
///
/// # Example
///
/// ```
/// use monad_provider::{encode, AttributeType, Value};
/// use serde_json::json;
///
/// let value = Value::object([
///     ("endpoint", Value::from("https://x")),
///     ("rate_limit", Value::from(10i64)),
///     ("headers", Value::list(AttributeType::String, vec![])),
/// ]);
/// assert_eq!(
///     encode(&value).unwrap(),
///     json!({"endpoint": "https://x", "rate_limit": 10, "headers": []})
/// );
/// ```
pub fn encode(value: &Value) -> Result<Json, ConversionError> {
    encode_at(value, "")
}

fn encode_at(value: &Value, path: &str) -> Result<Json, ConversionError> {
    match value {
        Value::Null(_) => Ok(Json::Null),
        Value::Unknown(_) => Err(ConversionError::UnresolvedValue {
            path: path.to_string(),
        }),
        Value::String(s) => Ok(Json::String(s.clone())),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Int64(n) => Ok(Json::Number((*n).into())),
        Value::Float64(f) => encode_float(*f, path),
        Value::Number(d) => {
            let f = d.to_f64().ok_or_else(|| ConversionError::UnsupportedShape {
                path: path.to_string(),
                detail: format!("number {} has no float representation", d),
            })?;
            encode_float(f, path)
        },
        Value::List { elements, .. } | Value::Set { elements, .. } | Value::Tuple(elements) => {
            elements
                .iter()
                .enumerate()
                .map(|(i, e)| encode_at(e, &join_path(path, &i.to_string())))
                .collect::<Result<Vec<_>, _>>()
                .map(Json::Array)
        },
        Value::Map { elements, .. } | Value::Object(elements) => elements
            .iter()
            .map(|(k, e)| Ok((k.clone(), encode_at(e, &join_path(path, k))?)))
            .collect::<Result<Map<_, _>, ConversionError>>()
            .map(Json::Object),
        Value::Dynamic(inner) => encode_at(inner, path),
    }
}

fn encode_float(f: f64, path: &str) -> Result<Json, ConversionError> {
    Number::from_f64(f)
        .map(Json::Number)
        .ok_or_else(|| ConversionError::UnsupportedShape {
            path: path.to_string(),
            detail: format!("non-finite float {}", f),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeType;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encode(&Value::from("x")).unwrap(), json!("x"));
        assert_eq!(encode(&Value::from(false)).unwrap(), json!(false));
        assert_eq!(encode(&Value::from(-7i64)).unwrap(), json!(-7));
        assert_eq!(encode(&Value::from(1.5f64)).unwrap(), json!(1.5));
    }

    #[test]
    fn test_encode_null_of_every_type() {
        for ty in [
            AttributeType::String,
            AttributeType::Number,
            AttributeType::list(AttributeType::Int64),
            AttributeType::object([("a", AttributeType::Bool)]),
            AttributeType::Dynamic,
        ] {
            assert_eq!(encode(&Value::Null(ty)).unwrap(), Json::Null);
        }
    }

    #[test]
    fn test_encode_number_is_best_effort_float() {
        let d = Decimal::from_str("12.25").unwrap();
        assert_eq!(encode(&Value::Number(d)).unwrap(), json!(12.25));
    }

    #[test]
    fn test_unknown_is_rejected_with_path() {
        let value = Value::object([(
            "settings",
            Value::list(
                AttributeType::String,
                vec![Value::from("a"), Value::Unknown(AttributeType::String)],
            ),
        )]);
        assert_eq!(
            encode(&value),
            Err(ConversionError::UnresolvedValue {
                path: "settings.1".to_string()
            })
        );
        assert!(matches!(
            encode(&Value::Unknown(AttributeType::Dynamic)),
            Err(ConversionError::UnresolvedValue { .. })
        ));
    }

    #[test]
    fn test_non_finite_float_is_unsupported() {
        assert!(matches!(
            encode(&Value::from(f64::NAN)),
            Err(ConversionError::UnsupportedShape { .. })
        ));
    }

    #[test]
    fn test_encode_containers() {
        let value = Value::object([
            ("empty", Value::list(AttributeType::String, vec![])),
            (
                "set",
                Value::set(AttributeType::Bool, vec![true.into(), false.into()]),
            ),
            (
                "tuple",
                Value::Tuple(vec!["a".into(), 1i64.into(), true.into()]),
            ),
            (
                "map",
                Value::map(AttributeType::Int64, [("x", Value::from(1i64))]),
            ),
            ("dynamic", Value::dynamic(Value::from("wrapped"))),
        ]);
        assert_eq!(
            encode(&value).unwrap(),
            json!({
                "empty": [],
                "set": [true, false],
                "tuple": ["a", 1, true],
                "map": {"x": 1},
                "dynamic": "wrapped",
            })
        );
    }
}
