//! Typed attribute values.
//!
//! A [`Value`] is always tagged with a concrete [`AttributeType`]. Containers
//! are either null, unknown, or fully populated with elements that agree with
//! their declared element type. Constructors check that contract in debug
//! builds; it is a caller obligation, not something validated at runtime.

use crate::schema::AttributeType;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// A typed value as stored in resource configuration, plan or state.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A null value of the given type. `Null(Dynamic)` carries no type.
    Null(AttributeType),
    /// A value that is not known until apply.
    Unknown(AttributeType),
    /// A string.
    String(String),
    /// A boolean.
    Bool(bool),
    /// A 64-bit integer.
    Int64(i64),
    /// A 64-bit float.
    Float64(f64),
    /// A decimal with 28 significant digits and a magnitude below about
    /// 7.9e28. Larger JSON numbers do not decode to it.
    Number(Decimal),
    /// An ordered sequence of one element type.
    List {
        /// Declared element type.
        element_type: AttributeType,
        /// The elements.
        elements: Vec<Value>,
    },
    /// A deduplicated collection of one element type.
    Set {
        /// Declared element type.
        element_type: AttributeType,
        /// The elements, without duplicates.
        elements: Vec<Value>,
    },
    /// A fixed-arity sequence with one type per slot.
    Tuple(Vec<Value>),
    /// A string-keyed collection of one element type.
    Map {
        /// Declared element type.
        element_type: AttributeType,
        /// The entries.
        elements: BTreeMap<String, Value>,
    },
    /// A string-keyed collection with one type per field.
    Object(BTreeMap<String, Value>),
    /// A value whose type is only known at runtime.
    Dynamic(Box<Value>),
}

impl Value {
    /// Create a string value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Create a list, checking element types in debug builds.
    pub fn list(element_type: AttributeType, elements: Vec<Value>) -> Self {
        debug_assert!(
            elements.iter().all(|e| e.attribute_type() == element_type),
            "list element does not match declared type {}",
            element_type
        );
        Self::List {
            element_type,
            elements,
        }
    }

    /// Create a set. Duplicate elements are dropped, keeping the first.
    pub fn set(element_type: AttributeType, elements: Vec<Value>) -> Self {
        debug_assert!(
            elements.iter().all(|e| e.attribute_type() == element_type),
            "set element does not match declared type {}",
            element_type
        );
        let mut unique: Vec<Value> = Vec::with_capacity(elements.len());
        for element in elements {
            if !unique.contains(&element) {
                unique.push(element);
            }
        }
        Self::Set {
            element_type,
            elements: unique,
        }
    }

    /// Create a map, checking element types in debug builds.
    pub fn map<K, I>(element_type: AttributeType, entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let elements: BTreeMap<String, Value> =
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        debug_assert!(
            elements.values().all(|e| e.attribute_type() == element_type),
            "map element does not match declared type {}",
            element_type
        );
        Self::Map {
            element_type,
            elements,
        }
    }

    /// Create an object from `(name, value)` pairs.
    pub fn object<K, I>(attributes: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Object(attributes.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Wrap a value as dynamic. Already-dynamic values are not nested.
    pub fn dynamic(value: Value) -> Self {
        match value {
            Self::Dynamic(_) => value,
            other => Self::Dynamic(Box::new(other)),
        }
    }

    /// An object of typed nulls, one per field of an object type.
    ///
    /// Non-object types yield a plain typed null.
    pub fn null_of(ty: &AttributeType) -> Self {
        match ty {
            AttributeType::Object(fields) => Self::Object(
                fields
                    .iter()
                    .map(|(name, ft)| (name.clone(), Self::Null(ft.clone())))
                    .collect(),
            ),
            other => Self::Null(other.clone()),
        }
    }

    /// The declared type of this value.
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Null(ty) | Self::Unknown(ty) => ty.clone(),
            Self::String(_) => AttributeType::String,
            Self::Bool(_) => AttributeType::Bool,
            Self::Int64(_) => AttributeType::Int64,
            Self::Float64(_) => AttributeType::Float64,
            Self::Number(_) => AttributeType::Number,
            Self::List { element_type, .. } => AttributeType::list(element_type.clone()),
            Self::Set { element_type, .. } => AttributeType::set(element_type.clone()),
            Self::Map { element_type, .. } => AttributeType::map(element_type.clone()),
            Self::Tuple(elements) => {
                AttributeType::Tuple(elements.iter().map(Value::attribute_type).collect())
            },
            Self::Object(fields) => AttributeType::Object(
                fields
                    .iter()
                    .map(|(name, v)| (name.clone(), v.attribute_type()))
                    .collect(),
            ),
            Self::Dynamic(_) => AttributeType::Dynamic,
        }
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null(_) => true,
            Self::Dynamic(inner) => inner.is_null(),
            _ => false,
        }
    }

    /// Whether the value, or anything inside it, is unknown.
    pub fn is_unknown(&self) -> bool {
        match self {
            Self::Unknown(_) => true,
            Self::List { elements, .. } | Self::Set { elements, .. } | Self::Tuple(elements) => {
                elements.iter().any(Value::is_unknown)
            },
            Self::Map { elements, .. } | Self::Object(elements) => {
                elements.values().any(Value::is_unknown)
            },
            Self::Dynamic(inner) => inner.is_unknown(),
            _ => false,
        }
    }

    /// Strip any dynamic wrapping.
    pub fn unwrap_dynamic(&self) -> &Value {
        match self {
            Self::Dynamic(inner) => inner.unwrap_dynamic(),
            other => other,
        }
    }

    /// Look up a field of an object or an entry of a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.unwrap_dynamic() {
            Self::Object(fields) | Self::Map { elements: fields, .. } => fields.get(key),
            _ => None,
        }
    }

    /// The string content, if this is a known string.
    pub fn as_str(&self) -> Option<&str> {
        match self.unwrap_dynamic() {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean content, if this is a known bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self.unwrap_dynamic() {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer content, if this is a known int64.
    pub fn as_i64(&self) -> Option<i64> {
        match self.unwrap_dynamic() {
            Self::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// The elements of a list, set or tuple.
    pub fn elements(&self) -> Option<&[Value]> {
        match self.unwrap_dynamic() {
            Self::List { elements, .. } | Self::Set { elements, .. } | Self::Tuple(elements) => {
                Some(elements)
            },
            _ => None,
        }
    }

    /// The fields of an object or entries of a map.
    pub fn entries(&self) -> Option<&BTreeMap<String, Value>> {
        match self.unwrap_dynamic() {
            Self::Object(fields) | Self::Map { elements: fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Consume an object or map and return its fields.
    pub fn into_entries(self) -> Option<BTreeMap<String, Value>> {
        match self {
            Self::Object(fields) | Self::Map { elements: fields, .. } => Some(fields),
            Self::Dynamic(inner) => inner.into_entries(),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_type_of_containers() {
        let value = Value::object([
            ("name", Value::from("x")),
            (
                "tags",
                Value::list(AttributeType::String, vec!["a".into(), "b".into()]),
            ),
            ("extra", Value::Null(AttributeType::Int64)),
        ]);
        assert_eq!(
            value.attribute_type(),
            AttributeType::object([
                ("name", AttributeType::String),
                ("tags", AttributeType::list(AttributeType::String)),
                ("extra", AttributeType::Int64),
            ])
        );
        assert_eq!(
            Value::dynamic(Value::from(1i64)).attribute_type(),
            AttributeType::Dynamic
        );
    }

    #[test]
    fn test_set_dedupes() {
        let set = Value::set(
            AttributeType::Int64,
            vec![1i64.into(), 2i64.into(), 1i64.into(), 3i64.into()],
        );
        assert_eq!(set.elements().map(<[Value]>::len), Some(3));
    }

    #[test]
    fn test_dynamic_does_not_nest() {
        let once = Value::dynamic(Value::from(true));
        let twice = Value::dynamic(once.clone());
        assert_eq!(once, twice);
        assert_eq!(twice.as_bool(), Some(true));
    }

    #[test]
    fn test_is_unknown_looks_inside_containers() {
        let value = Value::object([(
            "settings",
            Value::map(
                AttributeType::String,
                [("a", Value::Unknown(AttributeType::String))],
            ),
        )]);
        assert!(value.is_unknown());
        assert!(!Value::from("known").is_unknown());
    }

    #[test]
    fn test_accessors() {
        let value = Value::dynamic(Value::object([
            ("id", Value::from("abc")),
            ("rate", Value::from(10i64)),
        ]));
        assert_eq!(value.get("id").and_then(Value::as_str), Some("abc"));
        assert_eq!(value.get("rate").and_then(Value::as_i64), Some(10));
        assert!(value.get("missing").is_none());
        assert_eq!(value.into_entries().map(|e| e.len()), Some(2));
    }

    #[test]
    fn test_null_of_object() {
        let ty = AttributeType::object([
            ("id", AttributeType::String),
            ("config", AttributeType::Dynamic),
        ]);
        let value = Value::null_of(&ty);
        assert_eq!(value.attribute_type(), ty);
        assert!(value.get("id").is_some_and(Value::is_null));
        assert!(Value::null_of(&AttributeType::Bool).is_null());
    }
}
