//! Plan, import and metadata types exchanged with the host.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Name prefix of every resource type, and the provider's own type name.
pub const PROVIDER_TYPE_NAME: &str = "monad";

/// A change to a single top-level attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The attribute name.
    pub path: String,
    /// The value before the change (`None` when creating).
    pub before: Option<Json>,
    /// The value after the change (`None` when deleting).
    pub after: Option<Json>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Json>, after: Option<Json>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// A change that sets a previously absent attribute.
    pub fn added(path: impl Into<String>, value: Json) -> Self {
        Self::new(path, None, Some(value))
    }

    /// A change that clears an attribute.
    pub fn removed(path: impl Into<String>, value: Json) -> Self {
        Self::new(path, Some(value), None)
    }

    /// A change between two non-null values.
    pub fn modified(path: impl Into<String>, before: Json, after: Json) -> Self {
        Self::new(path, Some(before), Some(after))
    }

    /// Diff the top-level attributes of two state objects.
    ///
    /// A null attribute counts as absent. Changes come back sorted by
    /// attribute name.
    pub fn diff(before: &Json, after: &Json) -> Vec<AttributeChange> {
        let empty = serde_json::Map::new();
        let before = before.as_object().unwrap_or(&empty);
        let after = after.as_object().unwrap_or(&empty);

        let mut names: Vec<&String> = before.keys().chain(after.keys()).collect();
        names.sort();
        names.dedup();

        names
            .into_iter()
            .filter_map(|name| {
                let old = before.get(name).filter(|v| !v.is_null());
                let new = after.get(name).filter(|v| !v.is_null());
                match (old, new) {
                    (None, Some(new)) => Some(Self::added(name.as_str(), new.clone())),
                    (Some(old), None) => Some(Self::removed(name.as_str(), old.clone())),
                    (Some(old), Some(new)) if old != new => {
                        Some(Self::modified(name.as_str(), old.clone(), new.clone()))
                    },
                    _ => None,
                }
            })
            .collect()
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation (null for a delete).
    pub planned_state: Json,
    /// The attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource must be destroyed and created again.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan with no changes.
    pub fn no_change(state: Json) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// A plan with changes.
    pub fn with_changes(
        planned_state: Json,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether applying the plan changes anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A resource brought under management by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Json,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Json) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// The provider type name.
    pub type_name: String,
    /// The provider version.
    pub version: String,
    /// Resource type names.
    pub resources: Vec<String>,
}
