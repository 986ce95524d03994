//! Generic connectors: `monad_input`, `monad_output` and `monad_enrichment`.
//!
//! The connector's settings and secrets travel as one dynamic `config`
//! attribute shaped `{settings = {...}, secrets = {...}}`, so any connector
//! type the API knows can be managed without a dedicated schema.

use super::{
    encode_attr, put_attr, required_str, resource_type_name, response_id, string_attr,
    with_attrs, Resource,
};
use crate::client::{ApiClient, Component};
use crate::decode::decode;
use crate::encode::encode;
use crate::error::ProviderError;
use crate::infer::json_kind;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::value::Value;
use async_trait::async_trait;
use serde_json::{json, Map, Value as Json};
use tracing::debug;

/// The three connector collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    /// Sources that pull data into a pipeline.
    Input,
    /// Destinations that receive data from a pipeline.
    Output,
    /// Lookups applied to records in flight.
    Enrichment,
}

impl ConnectorKind {
    /// The kind as it appears in resource type names.
    pub fn name(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Enrichment => "enrichment",
        }
    }

    /// The API collection serving this kind.
    pub fn component(self) -> Component {
        match self {
            Self::Input => Component::Input,
            Self::Output => Component::Output,
            Self::Enrichment => Component::Enrichment,
        }
    }

    /// The request body field naming the connector type.
    ///
    /// Outputs name it `output_type`; the other kinds use `type`.
    pub fn type_field(self) -> &'static str {
        match self {
            Self::Output => "output_type",
            _ => "type",
        }
    }
}

/// A connector of any type, configured through a dynamic `config`.
#[derive(Debug, Clone, Copy)]
pub struct ConnectorResource {
    kind: ConnectorKind,
}

impl ConnectorResource {
    /// A generic resource for one connector kind.
    pub fn new(kind: ConnectorKind) -> Self {
        Self { kind }
    }

    /// The connector kind.
    pub fn kind(&self) -> ConnectorKind {
        self.kind
    }

    fn body(&self, state: &Value) -> Result<Json, ProviderError> {
        let mut body = Map::new();
        put_attr(&mut body, state, "name")?;
        put_attr(&mut body, state, "description")?;
        body.insert(
            self.kind.type_field().to_string(),
            Json::String(required_str(state, "component_type")?.to_string()),
        );
        body.insert("config".to_string(), connector_config(state)?);
        Ok(Json::Object(body))
    }
}

/// Split the dynamic `config` attribute into the `{settings, secrets}` the
/// API expects. A null config sends both halves empty.
pub(crate) fn connector_config(state: &Value) -> Result<Json, ProviderError> {
    let config = match encode_attr(state, "config")? {
        None => return Ok(json!({"settings": {}, "secrets": {}})),
        Some(Json::Object(config)) => config,
        Some(other) => {
            return Err(ProviderError::Validation(format!(
                "config must be an object or map, got {}",
                json_kind(&other)
            )))
        },
    };

    let half = |name: &str| -> Result<Json, ProviderError> {
        match config.get(name) {
            None | Some(Json::Null) => Ok(json!({})),
            Some(Json::Object(entries)) => Ok(Json::Object(entries.clone())),
            Some(other) => Err(ProviderError::Validation(format!(
                "config.{} must be an object or map, got {}",
                name,
                json_kind(other)
            ))),
        }
    };
    Ok(json!({"settings": half("settings")?, "secrets": half("secrets")?}))
}

/// Rebuild the dynamic `config` attribute from a response.
///
/// The API does not echo secret values, so secrets come from the prior
/// configuration when the response has none. Each half is only included
/// when it has content or the prior configuration declared it.
pub(crate) fn config_from_response(response: &Json, prior: &Value) -> Result<Value, ProviderError> {
    let prior = match prior.get("config") {
        Some(config) if !config.is_null() => encode(config).map_err(|err| err.within("config"))?,
        _ => Json::Null,
    };
    let remote = response.get("config").unwrap_or(&Json::Null);

    let mut config = Map::new();
    for half in ["settings", "secrets"] {
        let value = match remote.get(half) {
            Some(Json::Object(entries)) if !entries.is_empty() => Some(Json::Object(entries.clone())),
            _ if half == "secrets" => prior.get(half).filter(|v| !v.is_null()).cloned(),
            _ => None,
        };
        match value {
            Some(value) => {
                config.insert(half.to_string(), value);
            },
            None if prior.get(half).is_some() => {
                config.insert(half.to_string(), json!({}));
            },
            None => {},
        }
    }

    if config.is_empty() {
        return Ok(Value::Null(AttributeType::Dynamic));
    }
    Ok(decode(&Json::Object(config), Some(&AttributeType::Dynamic))
        .map_err(|err| err.within("config"))?)
}

#[async_trait]
impl Resource for ConnectorResource {
    fn type_name(&self) -> String {
        resource_type_name(self.kind.name(), None)
    }

    fn schema(&self) -> Schema {
        let kind = self.kind.name();
        Schema::v0()
            .with_description(format!("Manages a {} of any type.", kind))
            .with_attribute(
                "id",
                Attribute::computed_string().with_description(format!("{} identifier", kind)),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description(format!("Name of the {}", kind)),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_description(format!("Description of the {}", kind)),
            )
            .with_attribute(
                "component_type",
                Attribute::required_string()
                    .with_force_new()
                    .with_description(format!("The type of {} connector", kind)),
            )
            .with_attribute(
                "config",
                Attribute::optional_dynamic().with_description(format!(
                    "Configuration of the {}, as an object with settings and secrets",
                    kind
                )),
            )
    }

    fn validate(&self, config: &Value) -> Result<(), ProviderError> {
        connector_config(config).map(|_| ())
    }

    async fn create(&self, client: &ApiClient, planned: Value) -> Result<Value, ProviderError> {
        let response = client.create(self.kind.component(), &self.body(&planned)?).await?;
        let id = response_id(&response)?;
        debug!(%id, kind = self.kind.name(), "created connector");
        with_attrs(planned, [("id", Value::string(id))])
    }

    async fn read(&self, client: &ApiClient, current: Value) -> Result<Value, ProviderError> {
        let id = required_str(&current, "id")?.to_string();
        let response = client.get(self.kind.component(), &id).await?;

        let component_type = match string_attr(&response, self.kind.type_field()) {
            value if value.is_null() => string_attr(&response, "type"),
            value => value,
        };
        let component_type = match component_type {
            value if value.is_null() => current
                .get("component_type")
                .cloned()
                .unwrap_or(value),
            value => value,
        };
        let config = config_from_response(&response, &current)?;

        with_attrs(
            current,
            [
                ("name", string_attr(&response, "name")),
                ("description", string_attr(&response, "description")),
                ("component_type", component_type),
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
            .update(self.kind.component(), &id, &self.body(&planned)?)
            .await?;
        with_attrs(planned, [("id", Value::string(id))])
    }

    async fn delete(&self, client: &ApiClient, current: Value) -> Result<(), ProviderError> {
        let id = required_str(&current, "id")?;
        client.delete(self.kind.component(), id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::client_for;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(resource: &ConnectorResource, json: Json) -> Value {
        decode(&json, Some(&resource.schema().state_type())).unwrap()
    }

    #[test]
    fn test_type_field_per_kind() {
        assert_eq!(ConnectorKind::Input.type_field(), "type");
        assert_eq!(ConnectorKind::Output.type_field(), "output_type");
        assert_eq!(ConnectorKind::Enrichment.type_field(), "type");
    }

    #[test]
    fn test_connector_config_splits_halves() {
        let resource = ConnectorResource::new(ConnectorKind::Input);
        let planned = state(
            &resource,
            json!({
                "name": "n",
                "component_type": "demo",
                "config": {"settings": {"rate": 5, "tags": ["a", "b"]}},
            }),
        );
        assert_eq!(
            connector_config(&planned).unwrap(),
            json!({"settings": {"rate": 5, "tags": ["a", "b"]}, "secrets": {}})
        );

        let planned = state(&resource, json!({"name": "n", "component_type": "demo"}));
        assert_eq!(
            connector_config(&planned).unwrap(),
            json!({"settings": {}, "secrets": {}})
        );
    }

    #[test]
    fn test_connector_config_rejects_non_objects() {
        let resource = ConnectorResource::new(ConnectorKind::Output);
        let planned = state(
            &resource,
            json!({"name": "n", "component_type": "http", "config": ["a"]}),
        );
        let err = connector_config(&planned).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.message().contains("array"));

        let planned = state(
            &resource,
            json!({"name": "n", "component_type": "http", "config": {"settings": "x"}}),
        );
        assert!(connector_config(&planned).is_err());
    }

    #[test]
    fn test_config_from_response_keeps_prior_secrets() {
        let resource = ConnectorResource::new(ConnectorKind::Output);
        let prior = state(
            &resource,
            json!({
                "name": "n",
                "component_type": "http",
                "config": {"settings": {"endpoint": "a"}, "secrets": {"token": "t"}},
            }),
        );
        let response = json!({"config": {"settings": {"endpoint": "b"}, "secrets": {}}});
        let config = config_from_response(&response, &prior).unwrap();
        assert_eq!(
            encode(&config).unwrap(),
            json!({"settings": {"endpoint": "b"}, "secrets": {"token": "t"}})
        );
    }

    #[test]
    fn test_config_from_response_empty_is_null() {
        let resource = ConnectorResource::new(ConnectorKind::Input);
        let prior = state(&resource, json!({"name": "n", "component_type": "demo"}));
        let config = config_from_response(&json!({"config": null}), &prior).unwrap();
        assert_eq!(config, Value::Null(AttributeType::Dynamic));

        let config =
            config_from_response(&json!({"config": {"settings": {}, "secrets": {}}}), &prior)
                .unwrap();
        assert!(config.is_null());
    }

    #[tokio::test]
    async fn test_output_create_uses_output_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/org-1/outputs"))
            .and(body_json(json!({
                "name": "sink",
                "output_type": "http",
                "config": {"settings": {"endpoint": "https://sink"}, "secrets": {}},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "out-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let resource = ConnectorResource::new(ConnectorKind::Output);
        let planned = state(
            &resource,
            json!({
                "name": "sink",
                "component_type": "http",
                "config": {"settings": {"endpoint": "https://sink"}},
            }),
        );
        let created = assert_ok!(resource.create(&client_for(&server), planned).await);
        assert_eq!(created.get("id").and_then(Value::as_str), Some("out-1"));
    }

    #[tokio::test]
    async fn test_input_read_refreshes_from_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/org-1/inputs/in-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "in-1",
                "name": "demo input",
                "type": "demo",
                "config": {"settings": {"rate": 10, "record_type": "logs"}},
            })))
            .mount(&server)
            .await;

        let resource = ConnectorResource::new(ConnectorKind::Input);
        let current = state(
            &resource,
            json!({
                "id": "in-1",
                "name": "old",
                "component_type": "demo",
                "config": {"settings": {"rate": 5, "record_type": "logs"}},
            }),
        );
        let refreshed = assert_ok!(resource.read(&client_for(&server), current).await);
        assert_eq!(refreshed.get("name").and_then(Value::as_str), Some("demo input"));
        assert_eq!(
            refreshed.get("component_type").and_then(Value::as_str),
            Some("demo")
        );
        assert_eq!(
            refreshed
                .get("config")
                .and_then(|c| c.get("settings"))
                .and_then(|s| s.get("rate")),
            Some(&Value::Int64(10))
        );
    }

    #[tokio::test]
    async fn test_enrichment_update_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v3/org-1/enrichments/en-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "en-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v3/org-1/enrichments/en-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let resource = ConnectorResource::new(ConnectorKind::Enrichment);
        let client = client_for(&server);
        let prior = state(
            &resource,
            json!({"id": "en-1", "name": "geo", "component_type": "geoip"}),
        );
        let planned = state(&resource, json!({"name": "geo2", "component_type": "geoip"}));
        let updated = assert_ok!(resource.update(&client, prior, planned).await);
        assert_eq!(updated.get("id").and_then(Value::as_str), Some("en-1"));
        assert_ok!(resource.delete(&client, updated).await);
    }

    #[tokio::test]
    async fn test_create_rejects_scalar_config_before_sending() {
        let server = MockServer::start().await;
        let resource = ConnectorResource::new(ConnectorKind::Input);
        let planned = state(
            &resource,
            json!({"name": "n", "component_type": "demo", "config": "oops"}),
        );
        let err = assert_err!(resource.create(&client_for(&server), planned).await);
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_component_type_forces_replacement() {
        let schema = ConnectorResource::new(ConnectorKind::Input).schema();
        assert!(schema.block.attributes["component_type"].force_new);
        assert_eq!(
            schema.block.attributes["config"].attr_type,
            AttributeType::Dynamic
        );
    }
}
