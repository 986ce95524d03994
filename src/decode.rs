//! JSON to typed value decoding.
//!
//! With a type hint the decoder follows the declared shape and rejects JSON
//! that does not fit it. Without one, or below a `Dynamic` hint, it infers
//! the narrowest type bottom-up:
//!
//! - integers become `int64`, floats `float64`
//! - an array whose elements share a type becomes a list, otherwise a tuple
//! - an object whose values share a type becomes a map, otherwise an object
//! - an empty array becomes a list of the decoder's default type (`string`)
//!
//! A bare `null` without a hint decodes to the type-less `Null(Dynamic)`.

use crate::error::{join_path, ConversionError};
use crate::infer::{common_type, conform, json_kind, scalar_fits, settle};
use crate::schema::AttributeType;
use crate::value::Value;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value as Json};
use std::collections::BTreeMap;

/// Decode a JSON value with the default [`Decoder`].
///
/// # Example
///
/// ```
/// use monad_provider::{decode, AttributeType, Value};
/// use serde_json::json;
///
/// let value = decode(&json!([1, 2, 3]), None).unwrap();
/// assert_eq!(value.attribute_type(), AttributeType::list(AttributeType::Int64));
///
/// let value = decode(&json!(null), Some(&AttributeType::Bool)).unwrap();
/// assert_eq!(value, Value::Null(AttributeType::Bool));
/// ```
pub fn decode(json: &Json, hint: Option<&AttributeType>) -> Result<Value, ConversionError> {
    Decoder::new().decode(json, hint)
}

/// Decodes JSON into typed values.
#[derive(Debug, Clone)]
pub struct Decoder {
    default_type: AttributeType,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            default_type: AttributeType::String,
        }
    }
}

impl Decoder {
    /// Create a decoder whose default element type is `string`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the element type used for empty arrays and all-null containers.
    pub fn with_default_type(mut self, ty: AttributeType) -> Self {
        self.default_type = ty;
        self
    }

    /// The element type used when inference has nothing to go on.
    pub fn default_type(&self) -> &AttributeType {
        &self.default_type
    }

    /// Decode `json`, following `hint` where one is given.
    pub fn decode(&self, json: &Json, hint: Option<&AttributeType>) -> Result<Value, ConversionError> {
        match hint {
            Some(ty) => self.decode_hinted(json, ty, ""),
            None => self.decode_inferred(json, ""),
        }
    }

    fn decode_inferred(&self, json: &Json, path: &str) -> Result<Value, ConversionError> {
        match json {
            Json::Null => Ok(Value::Null(AttributeType::Dynamic)),
            _ => Ok(settle(self.infer(json, path)?, &self.default_type)),
        }
    }

    /// Infer a value, leaving `Dynamic` placeholders for untyped nulls and
    /// empty arrays so that siblings can still unify around them.
    fn infer(&self, json: &Json, path: &str) -> Result<Value, ConversionError> {
        match json {
            Json::Null => Ok(Value::Null(AttributeType::Dynamic)),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int64(i))
                } else if n.is_u64() {
                    Err(ConversionError::UnsupportedShape {
                        path: path.to_string(),
                        detail: format!("integer {} exceeds the int64 range", n),
                    })
                } else {
                    n.as_f64()
                        .map(Value::Float64)
                        .ok_or_else(|| ConversionError::UnsupportedShape {
                            path: path.to_string(),
                            detail: format!("number {} is not representable", n),
                        })
                }
            },
            Json::Array(items) => {
                let elements = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.infer(item, &join_path(path, &i.to_string())))
                    .collect::<Result<Vec<_>, _>>()?;
                if elements.is_empty() {
                    return Ok(Value::list(AttributeType::Dynamic, elements));
                }
                let types: Vec<AttributeType> = elements.iter().map(Value::attribute_type).collect();
                Ok(match common_type(&types) {
                    Some(ty) => Value::List {
                        elements: elements.into_iter().map(|e| conform(e, &ty)).collect(),
                        element_type: ty,
                    },
                    None => Value::Tuple(elements),
                })
            },
            Json::Object(entries) => {
                let fields = entries
                    .iter()
                    .map(|(k, item)| Ok((k.clone(), self.infer(item, &join_path(path, k))?)))
                    .collect::<Result<BTreeMap<_, _>, ConversionError>>()?;
                let types: Vec<AttributeType> = fields.values().map(Value::attribute_type).collect();
                Ok(match common_type(&types) {
                    Some(ty) => Value::Map {
                        elements: fields.into_iter().map(|(k, e)| (k, conform(e, &ty))).collect(),
                        element_type: ty,
                    },
                    None => Value::Object(fields),
                })
            },
        }
    }

    fn decode_hinted(&self, json: &Json, ty: &AttributeType, path: &str) -> Result<Value, ConversionError> {
        if json.is_null() {
            return Ok(Value::Null(ty.clone()));
        }
        match (ty, json) {
            (AttributeType::Dynamic, _) => Ok(Value::dynamic(self.decode_inferred(json, path)?)),
            (ty, _) if ty.is_scalar() => self.decode_scalar(json, ty, path),
            (AttributeType::List(inner), Json::Array(items)) => Ok(Value::List {
                element_type: (**inner).clone(),
                elements: self.decode_items(items, inner, path)?,
            }),
            (AttributeType::Set(inner), Json::Array(items)) => {
                Ok(Value::set((**inner).clone(), self.decode_items(items, inner, path)?))
            },
            (AttributeType::Tuple(slots), Json::Array(items)) => {
                if slots.len() != items.len() {
                    return Err(ConversionError::TypeConflict {
                        path: path.to_string(),
                        expected: ty.clone(),
                        found: format!("array of {} elements", items.len()),
                    });
                }
                items
                    .iter()
                    .zip(slots)
                    .enumerate()
                    .map(|(i, (item, slot))| self.decode_hinted(item, slot, &join_path(path, &i.to_string())))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Tuple)
            },
            (AttributeType::Map(inner), Json::Object(entries)) => {
                let elements = entries
                    .iter()
                    .map(|(k, item)| Ok((k.clone(), self.decode_hinted(item, inner, &join_path(path, k))?)))
                    .collect::<Result<BTreeMap<_, _>, ConversionError>>()?;
                Ok(Value::Map {
                    element_type: (**inner).clone(),
                    elements,
                })
            },
            (AttributeType::Object(fields), Json::Object(entries)) => {
                if let Some(extra) = entries.keys().find(|k| !fields.contains_key(*k)) {
                    return Err(ConversionError::TypeConflict {
                        path: path.to_string(),
                        expected: ty.clone(),
                        found: format!("object with undeclared attribute \"{}\"", extra),
                    });
                }
                fields
                    .iter()
                    .map(|(name, field_type)| {
                        let value = match entries.get(name) {
                            Some(item) => self.decode_hinted(item, field_type, &join_path(path, name))?,
                            None => Value::Null(field_type.clone()),
                        };
                        Ok((name.clone(), value))
                    })
                    .collect::<Result<BTreeMap<_, _>, ConversionError>>()
                    .map(Value::Object)
            },
            _ => Err(type_conflict(json, ty, path)),
        }
    }

    fn decode_items(&self, items: &[Json], ty: &AttributeType, path: &str) -> Result<Vec<Value>, ConversionError> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.decode_hinted(item, ty, &join_path(path, &i.to_string())))
            .collect()
    }

    fn decode_scalar(&self, json: &Json, ty: &AttributeType, path: &str) -> Result<Value, ConversionError> {
        if let (AttributeType::Number, Json::Number(n)) = (ty, json) {
            return to_decimal(n)
                .map(Value::Number)
                .ok_or_else(|| ConversionError::UnsupportedShape {
                    path: path.to_string(),
                    detail: format!("{} is beyond decimal range", n),
                });
        }

        let converted = if scalar_fits(json, ty) {
            match (ty, json) {
                (AttributeType::String, Json::String(s)) => Some(Value::String(s.clone())),
                (AttributeType::Bool, Json::Bool(b)) => Some(Value::Bool(*b)),
                (AttributeType::Int64, Json::Number(n)) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .map(Value::Int64),
                (AttributeType::Float64, Json::Number(n)) => n.as_f64().map(Value::Float64),
                _ => None,
            }
        } else {
            None
        };
        converted.ok_or_else(|| type_conflict(json, ty, path))
    }
}

fn to_decimal(n: &Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        Some(Decimal::from(i))
    } else if let Some(u) = n.as_u64() {
        Some(Decimal::from(u))
    } else {
        n.as_f64().and_then(Decimal::from_f64)
    }
}

fn type_conflict(json: &Json, expected: &AttributeType, path: &str) -> ConversionError {
    ConversionError::TypeConflict {
        path: path.to_string(),
        expected: expected.clone(),
        found: json_kind(json).to_string(),
    }
}
