//! Schema validation for host configuration.
//!
//! Checks a raw JSON configuration against a [`Schema`] before any typed
//! conversion happens, so that users get one diagnostic per problem with an
//! attribute path attached instead of the first conversion error.
//!
//! # Example
//!
//! ```
//! use monad_provider::schema::{Attribute, Schema};
//! use monad_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("rate", Attribute::optional_int64());
//!
//! assert!(validate(&schema, &json!({"name": "demo", "rate": 5})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"rate": "fast"}));
//! assert_eq!(diagnostics.len(), 2);
//! ```

use crate::decode::decode;
use crate::error::join_path;
use crate::infer::json_kind;
use crate::schema::{Attribute, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema};
use serde_json::Value as Json;

/// Validate a JSON value against a schema.
///
/// An empty result means the value is valid.
///
/// - required attributes must be present and non-null
/// - computed-only attributes are skipped
/// - values must decode under the attribute's declared type; unknown
///   attributes inside objects are rejected
/// - nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Json) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Like [`validate`], returning `Err` with the diagnostics when any were found.
pub fn validate_result(schema: &Schema, value: &Json) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Json) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Json, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Json::Object(map) => map,
        Json::Null => return,
        other => {
            let diagnostic =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", json_kind(other)));
            diagnostics.push(if path.is_empty() {
                diagnostic
            } else {
                diagnostic.with_attribute(path)
            });
            return;
        },
    };

    for key in obj.keys() {
        if !block.attributes.contains_key(key) && !block.blocks.contains_key(key) {
            let key_path = join_path(path, key);
            diagnostics.push(
                Diagnostic::error(format!("Unsupported attribute '{}'", key_path))
                    .with_detail("This attribute is not declared in the schema")
                    .with_attribute(key_path),
            );
        }
    }

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Json>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Json::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            if let Err(err) = decode(v, Some(&attr.attr_type)) {
                let at = join_path(path, err.path());
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for '{}'", at))
                        .with_detail(err.to_string())
                        .with_attribute(at),
                );
            }
        },
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Json>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let value = match value {
        None | Some(Json::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
            return;
        },
        Some(v) => v,
    };

    let items: Vec<(String, &Json)> = match (nested.nesting_mode, value) {
        (BlockNestingMode::Single, v) => {
            validate_block(&nested.block, v, path, diagnostics);
            return;
        },
        (BlockNestingMode::List | BlockNestingMode::Set, Json::Array(arr)) => arr
            .iter()
            .enumerate()
            .map(|(i, item)| (join_path(path, &i.to_string()), item))
            .collect(),
        (BlockNestingMode::Map, Json::Object(obj)) => obj
            .iter()
            .map(|(key, item)| (join_path(path, key), item))
            .collect(),
        (mode, v) => {
            let expected = if mode == BlockNestingMode::Map {
                "map"
            } else {
                "list"
            };
            diagnostics.push(
                Diagnostic::error(format!("Expected {} for block '{}'", expected, path))
                    .with_detail(format!("Got {}", json_kind(v)))
                    .with_attribute(path),
            );
            return;
        },
    };

    let len = items.len() as u32;
    if len < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, len
            ))
            .with_attribute(path),
        );
    }
    // max_items of 0 means unlimited
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
    }

    for (item_path, item) in items {
        validate_block(&nested.block, item, &item_path, diagnostics);
    }
}
