//! Type matching helpers shared by the encoder and decoder.
//!
//! During inference the type-less null (`Null(Dynamic)`) and empty containers
//! carry `Dynamic` placeholders. [`unify`] treats those placeholders as
//! wildcards so that `["a", null]` still infers as `list(string)`; [`settle`]
//! replaces whatever placeholders survive once a subtree is complete.

use crate::schema::AttributeType;
use crate::value::Value;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// 2^53, the largest integer magnitude an f64 represents exactly.
const MAX_SAFE_INTEGER: u64 = 1 << 53;

/// -2^63 and 2^63 as floats; the i64 range is `[MIN, MAX)`.
const I64_MIN_F: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_F: f64 = 9_223_372_036_854_775_808.0;

/// A human-readable name for the kind of a JSON value.
pub fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::String(_) => "string",
        Json::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Json::Number(_) => "float",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Whether a JSON scalar converts to the scalar type without loss.
///
/// Non-scalar types never fit.
pub fn scalar_fits(json: &Json, ty: &AttributeType) -> bool {
    match (ty, json) {
        (AttributeType::String, Json::String(_)) => true,
        (AttributeType::Bool, Json::Bool(_)) => true,
        (AttributeType::Number, Json::Number(n)) => {
            n.is_i64() || n.is_u64() || n.as_f64().and_then(Decimal::from_f64).is_some()
        },
        (AttributeType::Int64, Json::Number(n)) => {
            n.is_i64()
                || (!n.is_u64()
                    && n.as_f64()
                        .is_some_and(|f| f.fract() == 0.0 && (I64_MIN_F..I64_MAX_F).contains(&f)))
        },
        (AttributeType::Float64, Json::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.unsigned_abs() <= MAX_SAFE_INTEGER
            } else {
                n.is_f64()
            }
        },
        _ => false,
    }
}

/// The most specific type compatible with both `a` and `b`.
///
/// `Dynamic` matches anything, an empty object matches any map, and
/// containers unify element-wise. Returns `None` when the shapes differ.
pub fn unify(a: &AttributeType, b: &AttributeType) -> Option<AttributeType> {
    use AttributeType as T;

    if a == b {
        return Some(a.clone());
    }
    match (a, b) {
        (T::Dynamic, other) | (other, T::Dynamic) => Some(other.clone()),
        (T::List(x), T::List(y)) => unify(x, y).map(T::list),
        (T::Set(x), T::Set(y)) => unify(x, y).map(T::set),
        (T::Map(x), T::Map(y)) => unify(x, y).map(T::map),
        (T::Object(fields), T::Map(inner)) | (T::Map(inner), T::Object(fields))
            if fields.is_empty() =>
        {
            Some(T::map((**inner).clone()))
        },
        (T::Tuple(xs), T::Tuple(ys)) if xs.len() == ys.len() => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| unify(x, y))
            .collect::<Option<Vec<_>>>()
            .map(T::Tuple),
        (T::Object(xs), T::Object(ys)) if xs.len() == ys.len() => xs
            .iter()
            .map(|(name, x)| ys.get(name).and_then(|y| unify(x, y)).map(|t| (name.clone(), t)))
            .collect::<Option<BTreeMap<_, _>>>()
            .map(T::Object),
        _ => None,
    }
}

/// The common type of a group of sibling types.
///
/// Returns `None` when the group is empty or heterogeneous.
pub fn common_type<'a, I>(types: I) -> Option<AttributeType>
where
    I: IntoIterator<Item = &'a AttributeType>,
{
    let mut iter = types.into_iter();
    let first = iter.next()?.clone();
    iter.try_fold(first, |acc, ty| unify(&acc, ty))
}

/// Retag an inferred value with a type that [`unify`] produced for it.
///
/// Placeholder nulls and empty containers take on the concrete type; values
/// that already carry `ty` are returned unchanged.
pub fn conform(value: Value, ty: &AttributeType) -> Value {
    use AttributeType as T;

    if value.attribute_type() == *ty {
        return value;
    }
    match (value, ty) {
        (Value::Null(_), ty) => Value::Null(ty.clone()),
        (Value::Unknown(_), ty) => Value::Unknown(ty.clone()),
        (Value::List { elements, .. }, T::List(inner)) => Value::List {
            element_type: (**inner).clone(),
            elements: elements.into_iter().map(|e| conform(e, inner)).collect(),
        },
        (Value::Set { elements, .. }, T::Set(inner)) => Value::Set {
            element_type: (**inner).clone(),
            elements: elements.into_iter().map(|e| conform(e, inner)).collect(),
        },
        (Value::Map { elements, .. }, T::Map(inner)) => Value::Map {
            element_type: (**inner).clone(),
            elements: elements
                .into_iter()
                .map(|(k, e)| (k, conform(e, inner)))
                .collect(),
        },
        (Value::Object(fields), T::Map(inner)) if fields.is_empty() => Value::Map {
            element_type: (**inner).clone(),
            elements: fields,
        },
        (Value::Tuple(elements), T::Tuple(slots)) => Value::Tuple(
            elements
                .into_iter()
                .zip(slots)
                .map(|(e, t)| conform(e, t))
                .collect(),
        ),
        (Value::Object(fields), T::Object(types)) => Value::Object(
            fields
                .into_iter()
                .map(|(k, e)| {
                    let conformed = match types.get(&k) {
                        Some(t) => conform(e, t),
                        None => e,
                    };
                    (k, conformed)
                })
                .collect(),
        ),
        (value, _) => value,
    }
}

/// Replace the `Dynamic` placeholders left in an inferred value with
/// `default`.
///
/// Explicit `Value::Dynamic` wrappers are left alone.
pub fn settle(value: Value, default: &AttributeType) -> Value {
    match value {
        Value::Null(ty) => Value::Null(ty.settle(default)),
        Value::Unknown(ty) => Value::Unknown(ty.settle(default)),
        Value::List {
            element_type,
            elements,
        } => Value::List {
            element_type: element_type.settle(default),
            elements: elements.into_iter().map(|e| settle(e, default)).collect(),
        },
        Value::Set {
            element_type,
            elements,
        } => Value::Set {
            element_type: element_type.settle(default),
            elements: elements.into_iter().map(|e| settle(e, default)).collect(),
        },
        Value::Map {
            element_type,
            elements,
        } => Value::Map {
            element_type: element_type.settle(default),
            elements: elements
                .into_iter()
                .map(|(k, e)| (k, settle(e, default)))
                .collect(),
        },
        Value::Tuple(elements) => {
            Value::Tuple(elements.into_iter().map(|e| settle(e, default)).collect())
        },
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(k, e)| (k, settle(e, default)))
                .collect(),
        ),
        other => other,
    }
}
