//! Managed resource types.
//!
//! Each resource maps a typed state object onto one API collection. Handlers
//! receive the state already decoded against their schema, so every declared
//! attribute is present (possibly as a typed null), and return the new state
//! in the same shape.

mod connector;
mod pipeline;
mod secret;
mod transform;
mod typed;

pub use connector::{ConnectorKind, ConnectorResource};
pub use pipeline::PipelineResource;
pub use secret::SecretResource;
pub use transform::TransformResource;
pub use typed::TypedConnectorResource;

use crate::client::ApiClient;
use crate::encode::encode;
use crate::error::ProviderError;
use crate::schema::{AttributeType, Schema};
use crate::types::PROVIDER_TYPE_NAME;
use crate::value::Value;
use async_trait::async_trait;
use serde_json::{Map, Value as Json};

/// A resource type served by the provider.
#[async_trait]
pub trait Resource: Send + Sync {
    /// The resource type name, e.g. `monad_secret`.
    fn type_name(&self) -> String;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Check constraints the schema cannot express.
    fn validate(&self, config: &Value) -> Result<(), ProviderError> {
        let _ = config;
        Ok(())
    }

    /// Create the remote object and return the new state.
    async fn create(&self, client: &ApiClient, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state from the remote object.
    async fn read(&self, client: &ApiClient, current: Value) -> Result<Value, ProviderError>;

    /// Apply a planned change and return the new state.
    async fn update(
        &self,
        client: &ApiClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, client: &ApiClient, current: Value) -> Result<(), ProviderError>;
}

/// Every resource type the provider serves.
pub fn registry() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(SecretResource),
        Box::new(ConnectorResource::new(ConnectorKind::Input)),
        Box::new(ConnectorResource::new(ConnectorKind::Output)),
        Box::new(ConnectorResource::new(ConnectorKind::Enrichment)),
        Box::new(TransformResource),
        Box::new(PipelineResource),
        Box::new(typed::input_demo()),
        Box::new(typed::input_okta_systemlog()),
        Box::new(typed::output_http()),
    ]
}

/// Build a resource type name from a connector kind and optional subtype.
///
/// Hyphens in the subtype become underscores.
pub fn resource_type_name(kind: &str, subtype: Option<&str>) -> String {
    match subtype {
        Some(subtype) => format!(
            "{}_{}_{}",
            PROVIDER_TYPE_NAME,
            kind,
            subtype.replace('-', "_")
        ),
        None => format!("{}_{}", PROVIDER_TYPE_NAME, kind),
    }
}

/// Encode one attribute of a state object, or `None` when it is null.
pub(crate) fn encode_attr(state: &Value, name: &str) -> Result<Option<Json>, ProviderError> {
    match state.get(name) {
        Some(value) if !value.is_null() => {
            Ok(Some(encode(value).map_err(|err| err.within(name))?))
        },
        _ => Ok(None),
    }
}

/// Copy a non-null attribute into a request body.
pub(crate) fn put_attr(
    body: &mut Map<String, Json>,
    state: &Value,
    name: &str,
) -> Result<(), ProviderError> {
    if let Some(json) = encode_attr(state, name)? {
        body.insert(name.to_string(), json);
    }
    Ok(())
}

/// A string attribute that must be set.
pub(crate) fn required_str<'a>(state: &'a Value, name: &str) -> Result<&'a str, ProviderError> {
    state
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Validation(format!("attribute '{}' must be set", name)))
}

/// The `id` the API assigned to a created object.
pub(crate) fn response_id(response: &Json) -> Result<String, ProviderError> {
    response
        .get("id")
        .and_then(Json::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::MalformedResponse(format!("no id in response: {}", response)))
}

/// A string field of a response as a state value. Absent and empty strings
/// read as null.
pub(crate) fn string_attr(response: &Json, key: &str) -> Value {
    match response.get(key).and_then(Json::as_str) {
        Some(s) if !s.is_empty() => Value::string(s),
        _ => Value::Null(AttributeType::String),
    }
}

/// Overwrite fields of a state object.
pub(crate) fn with_attrs<I>(state: Value, updates: I) -> Result<Value, ProviderError>
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    let mut fields = state.into_entries().ok_or_else(|| {
        ProviderError::Validation("resource state must be an object".to_string())
    })?;
    for (name, value) in updates {
        fields.insert(name.to_string(), value);
    }
    Ok(Value::Object(fields))
}

/// Drop null members of a JSON object.
pub(crate) fn strip_nulls(json: Json) -> Json {
    match json {
        Json::Object(entries) => Json::Object(
            entries
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::client::ApiClient;
    use crate::config::ProviderConfig;
    use wiremock::MockServer;

    pub(crate) fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&ProviderConfig {
            base_url: server.uri(),
            api_token: Some("tok".to_string()),
            organization_id: Some("org-1".to_string()),
        })
        .unwrap()
    }
}
