//! `monad_transform`: an ordered list of record operations.

use super::{
    put_attr, required_str, resource_type_name, response_id, string_attr, with_attrs, Resource,
};
use crate::client::{ApiClient, Component};
use crate::decode::decode;
use crate::encode::encode;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::value::Value;
use async_trait::async_trait;
use serde_json::{json, Map, Value as Json};
use tracing::debug;

/// Transforms keep their configuration in one dynamic attribute holding an
/// `operations` list.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformResource;

fn is_object_like(value: &Value) -> bool {
    matches!(value.unwrap_dynamic(), Value::Object(_) | Value::Map { .. })
}

fn invalid_operation(index: usize, detail: impl std::fmt::Display) -> ProviderError {
    ProviderError::Validation(format!("operation at index {} {}", index, detail))
}

/// Check one operation and encode it as `{operation, arguments}`.
fn operation_json(index: usize, operation: &Value) -> Result<Json, ProviderError> {
    if !is_object_like(operation) {
        return Err(invalid_operation(
            index,
            format!("must be an object, got {}", operation.unwrap_dynamic().attribute_type()),
        ));
    }

    let name = match operation.get("operation") {
        None => return Err(invalid_operation(index, "missing 'operation' field")),
        Some(value) => value.as_str().ok_or_else(|| {
            invalid_operation(
                index,
                format!("'operation' field must be string, got {}", value.attribute_type()),
            )
        })?,
    };

    let arguments = match operation.get("arguments") {
        None => return Err(invalid_operation(index, "missing 'arguments' field")),
        Some(value) if value.is_null() => json!({}),
        Some(value) if is_object_like(value) => {
            let path = format!("config.operations.{}.arguments", index);
            encode(value).map_err(|err| err.within(&path))?
        },
        Some(value) => {
            return Err(invalid_operation(
                index,
                format!(
                    "'arguments' field must be dynamic or object, got {}",
                    value.attribute_type()
                ),
            ))
        },
    };

    Ok(json!({"operation": name, "arguments": arguments}))
}

/// Build the API configuration from the `config` attribute.
///
/// A config without `operations` sends an empty configuration.
pub(crate) fn transform_config(state: &Value) -> Result<Json, ProviderError> {
    let config = match state.get("config") {
        Some(config) if !config.is_null() => config,
        _ => return Ok(json!({})),
    };
    if !is_object_like(config) {
        return Err(ProviderError::Validation(format!(
            "config must be an object, got {}",
            config.unwrap_dynamic().attribute_type()
        )));
    }

    let operations = match config.get("operations") {
        Some(operations) if !operations.is_null() => operations,
        _ => return Ok(json!({})),
    };
    let elements = operations.elements().ok_or_else(|| {
        ProviderError::Validation(format!(
            "operations must be a list or tuple, got {}",
            operations.unwrap_dynamic().attribute_type()
        ))
    })?;

    let operations = elements
        .iter()
        .enumerate()
        .map(|(index, operation)| operation_json(index, operation))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({"operations": operations}))
}

/// Decode the configuration of a response. Null and empty configurations
/// read as null.
pub(crate) fn config_from_response(response: &Json) -> Result<Value, ProviderError> {
    match response.get("config") {
        None | Some(Json::Null) => Ok(Value::Null(AttributeType::Dynamic)),
        Some(Json::Object(entries)) if entries.is_empty() => {
            Ok(Value::Null(AttributeType::Dynamic))
        },
        Some(config) => Ok(decode(config, Some(&AttributeType::Dynamic))
            .map_err(|err| err.within("config"))?),
    }
}

fn transform_body(state: &Value) -> Result<Json, ProviderError> {
    let mut body = Map::new();
    put_attr(&mut body, state, "name")?;
    put_attr(&mut body, state, "description")?;
    body.insert("config".to_string(), transform_config(state)?);
    Ok(Json::Object(body))
}

#[async_trait]
impl Resource for TransformResource {
    fn type_name(&self) -> String {
        resource_type_name("transform", None)
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a transform.")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Transform identifier"),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the transform"),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("Description of the transform"),
            )
            .with_attribute(
                "config",
                Attribute::required_dynamic()
                    .with_description("Transform configuration holding a list of operations"),
            )
    }

    fn validate(&self, config: &Value) -> Result<(), ProviderError> {
        transform_config(config).map(|_| ())
    }

    async fn create(&self, client: &ApiClient, planned: Value) -> Result<Value, ProviderError> {
        let response = client
            .create(Component::Transform, &transform_body(&planned)?)
            .await?;
        let id = response_id(&response)?;
        debug!(%id, "created transform");
        with_attrs(planned, [("id", Value::string(id))])
    }

    async fn read(&self, client: &ApiClient, current: Value) -> Result<Value, ProviderError> {
        let id = required_str(&current, "id")?.to_string();
        let response = client.get(Component::Transform, &id).await?;
        let config = config_from_response(&response)?;
        with_attrs(
            current,
            [
                ("name", string_attr(&response, "name")),
                ("description", string_attr(&response, "description")),
                ("config", config),
            ],
        )
    }

    async fn update(
        &self,
        client: &ApiClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let id = required_str(&prior, "id")?.to_string();
        client
            .update(Component::Transform, &id, &transform_body(&planned)?)
            .await?;
        with_attrs(planned, [("id", Value::string(id))])
    }

    async fn delete(&self, client: &ApiClient, current: Value) -> Result<(), ProviderError> {
        let id = required_str(&current, "id")?;
        client.delete(Component::Transform, id).await
    }
}
