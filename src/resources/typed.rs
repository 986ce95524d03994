//! Typed connectors with a fixed `config` schema.
//!
//! Unlike the generic connectors, the `config` block declares every setting
//! and secret with a concrete type. Responses are projected onto the declared
//! settings before decoding so undeclared server-side fields are ignored.

use super::{
    put_attr, required_str, resource_type_name, response_id, string_attr, strip_nulls,
    with_attrs, ConnectorKind, Resource,
};
use crate::client::ApiClient;
use crate::decode::decode;
use crate::encode::encode;
use crate::error::ProviderError;
use crate::infer::json_kind;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::value::Value;
use async_trait::async_trait;
use serde_json::{Map, Value as Json};
use tracing::debug;

/// Rewrites settings between their attribute names and their API names.
pub type WireHook = fn(&mut Map<String, Json>);

/// A connector of one fixed type.
#[derive(Debug, Clone)]
pub struct TypedConnectorResource {
    kind: ConnectorKind,
    subtype: &'static str,
    description: &'static str,
    settings: Block,
    secrets: Option<Block>,
    to_wire: Option<WireHook>,
    from_wire: Option<WireHook>,
}

impl TypedConnectorResource {
    /// A typed connector sending `subtype` as its connector type.
    pub fn new(
        kind: ConnectorKind,
        subtype: &'static str,
        description: &'static str,
        settings: Block,
    ) -> Self {
        Self {
            kind,
            subtype,
            description,
            settings,
            secrets: None,
            to_wire: None,
            from_wire: None,
        }
    }

    /// Declare the secrets block.
    pub fn with_secrets(mut self, secrets: Block) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Rename settings on their way to and from the API.
    pub fn with_wire_hooks(mut self, to_wire: WireHook, from_wire: WireHook) -> Self {
        self.to_wire = Some(to_wire);
        self.from_wire = Some(from_wire);
        self
    }

    /// The connector type sent to the API.
    pub fn subtype(&self) -> &str {
        self.subtype
    }

    fn config_block(&self) -> Block {
        let mut block = Block::new()
            .with_description(format!("{} configuration", self.description))
            .with_block(
                "settings",
                NestedBlock::single(
                    self.settings
                        .clone()
                        .with_description(format!("{} settings configuration", self.description)),
                )
                .with_min_items(1),
            );
        if let Some(secrets) = &self.secrets {
            block = block.with_block(
                "secrets",
                NestedBlock::single(
                    secrets
                        .clone()
                        .with_description(format!("{} secrets configuration", self.description)),
                ),
            );
        }
        block
    }

    fn body(&self, state: &Value) -> Result<Json, ProviderError> {
        let config = state.get("config").filter(|c| !c.is_null()).ok_or_else(|| {
            ProviderError::Validation(format!(
                "the config block is required for {}",
                self.type_name()
            ))
        })?;

        let mut settings = encode_half(config, "settings")?;
        if let Some(hook) = self.to_wire {
            hook(&mut settings);
        }
        let secrets = encode_half(config, "secrets")?;

        let mut body = Map::new();
        put_attr(&mut body, state, "name")?;
        put_attr(&mut body, state, "description")?;
        body.insert(
            self.kind.type_field().to_string(),
            Json::String(self.subtype.to_string()),
        );
        body.insert(
            "config".to_string(),
            serde_json::json!({"settings": settings, "secrets": secrets}),
        );
        Ok(Json::Object(body))
    }

    /// Decode the settings of a response, keeping only declared attributes.
    fn settings_from_response(&self, response: &Json) -> Result<Option<Value>, ProviderError> {
        let mut remote = match response.get("config").and_then(|c| c.get("settings")) {
            Some(Json::Object(entries)) => entries.clone(),
            _ => return Ok(None),
        };
        if let Some(hook) = self.from_wire {
            hook(&mut remote);
        }
        let projected: Map<String, Json> = remote
            .into_iter()
            .filter(|(k, _)| self.settings.attributes.contains_key(k))
            .collect();
        let settings = decode(&Json::Object(projected), Some(&self.settings.object_type()))
            .map_err(|err| err.within("config.settings"))?;
        Ok(Some(settings))
    }
}

/// Encode one half of the config block, dropping null settings and null
/// fields of object-valued settings.
fn encode_half(config: &Value, name: &str) -> Result<Map<String, Json>, ProviderError> {
    let value = match config.get(name) {
        Some(value) if !value.is_null() => value,
        _ => return Ok(Map::new()),
    };
    let encoded = encode(value).map_err(|err| err.within(&format!("config.{}", name)))?;
    match strip_nulls(encoded) {
        Json::Object(entries) => Ok(entries
            .into_iter()
            .map(|(key, value)| (key, strip_nulls(value)))
            .collect()),
        other => Err(ProviderError::Validation(format!(
            "config.{} must be an object, got {}",
            name,
            json_kind(&other)
        ))),
    }
}

#[async_trait]
impl Resource for TypedConnectorResource {
    fn type_name(&self) -> String {
        resource_type_name(self.kind.name(), Some(self.subtype))
    }

    fn schema(&self) -> Schema {
        let kind = self.kind.name();
        Schema::v0()
            .with_description(format!("{} resource", self.description))
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
            .with_block(
                "config",
                NestedBlock::single(self.config_block()).with_min_items(1),
            )
    }

    async fn create(&self, client: &ApiClient, planned: Value) -> Result<Value, ProviderError> {
        let response = client.create(self.kind.component(), &self.body(&planned)?).await?;
        let id = response_id(&response)?;
        debug!(%id, subtype = self.subtype, "created typed connector");
        with_attrs(planned, [("id", Value::string(id))])
    }

    async fn read(&self, client: &ApiClient, current: Value) -> Result<Value, ProviderError> {
        let id = required_str(&current, "id")?.to_string();
        let response = client.get(self.kind.component(), &id).await?;

        let prior = current
            .get("config")
            .cloned()
            .unwrap_or_else(|| Value::Null(self.config_block().object_type()));
        let config = match self.settings_from_response(&response)? {
            Some(settings) => {
                let mut fields = match prior.into_entries() {
                    Some(fields) => fields,
                    None => Value::null_of(&self.config_block().object_type())
                        .into_entries()
                        .unwrap_or_default(),
                };
                fields.insert("settings".to_string(), settings);
                Value::Object(fields)
            },
            None => prior,
        };

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
            .update(self.kind.component(), &id, &self.body(&planned)?)
            .await?;
        with_attrs(planned, [("id", Value::string(id))])
    }

    async fn delete(&self, client: &ApiClient, current: Value) -> Result<(), ProviderError> {
        let id = required_str(&current, "id")?;
        client.delete(self.kind.component(), id).await
    }
}

/// Rename the fields of every object in the `headers` setting.
fn rename_header_fields(settings: &mut Map<String, Json>, from: [&str; 2], to: [&str; 2]) {
    if let Some(Json::Array(headers)) = settings.get_mut("headers") {
        for header in headers.iter_mut() {
            if let Json::Object(fields) = header {
                let renamed: Map<String, Json> = from
                    .iter()
                    .zip(to)
                    .filter_map(|(old, new)| fields.remove(*old).map(|v| (new.to_string(), v)))
                    .collect();
                *fields = renamed;
            }
        }
    }
}

fn http_headers_to_wire(settings: &mut Map<String, Json>) {
    rename_header_fields(settings, ["key", "value"], ["header_key", "header_value"]);
}

fn http_headers_from_wire(settings: &mut Map<String, Json>) {
    rename_header_fields(settings, ["header_key", "header_value"], ["key", "value"]);
}

/// `monad_output_http`: sends records to an HTTP endpoint.
pub fn output_http() -> TypedConnectorResource {
    let header = AttributeType::object([
        ("key", AttributeType::String),
        ("value", AttributeType::String),
    ]);
    let settings = Block::new()
        .with_attribute(
            "endpoint",
            Attribute::required_string()
                .with_description("The full URL of the HTTP endpoint to send data to"),
        )
        .with_attribute(
            "method",
            Attribute::optional_string().with_description(
                "The HTTP method to use for requests (GET, POST, PUT, PATCH, or DELETE)",
            ),
        )
        .with_attribute(
            "headers",
            Attribute::new(
                AttributeType::list(header),
                AttributeFlags::optional(),
            )
            .with_description("Non-secret headers"),
        )
        .with_attribute(
            "max_batch_data_size",
            Attribute::optional_float64()
                .with_description("The maximum size in KB for a single batch of data"),
        )
        .with_attribute(
            "max_batch_record_count",
            Attribute::optional_int64()
                .with_description("The maximum number of records to include in a single batch"),
        )
        .with_attribute(
            "payload_structure",
            Attribute::optional_string().with_description("The payload structure type"),
        )
        .with_attribute(
            "rate_limit",
            Attribute::optional_int64().with_description(
                "Maximum number of requests per second to send to the endpoint",
            ),
        )
        .with_attribute(
            "tls_skip_verify",
            Attribute::optional_bool().with_description("Skip TLS verification"),
        )
        .with_attribute(
            "wrapper_key",
            Attribute::optional_string().with_description(
                "The key to use for wrapping the payload when payload_structure is 'wrapped'",
            ),
        );
    let secrets = Block::new().with_attribute(
        "auth_headers",
        Attribute::new(
            AttributeType::map(AttributeType::String),
            AttributeFlags::optional(),
        )
        .sensitive()
        .with_description("Authentication headers"),
    );

    TypedConnectorResource::new(ConnectorKind::Output, "http", "HTTP output", settings)
        .with_secrets(secrets)
        .with_wire_hooks(http_headers_to_wire, http_headers_from_wire)
}

/// `monad_input_demo`: an event generator for trying out pipelines.
pub fn input_demo() -> TypedConnectorResource {
    let settings = Block::new()
        .with_attribute(
            "record_type",
            Attribute::required_string().with_description("The type of record to generate"),
        )
        .with_attribute(
            "rate",
            Attribute::required_int64().with_description(
                "The rate at which to generate records (between 1 and 1000) per second",
            ),
        );
    TypedConnectorResource::new(ConnectorKind::Input, "demo", "Event Generator", settings)
}

/// The connector secret reference shape: an existing secret by `id` or
/// `name`, or an inline `value`.
fn connector_secret(description: &str) -> Attribute {
    Attribute::new(
        AttributeType::object([
            ("id", AttributeType::String),
            ("name", AttributeType::String),
            ("description", AttributeType::String),
            ("value", AttributeType::String),
        ]),
        AttributeFlags::required(),
    )
    .sensitive()
    .with_description(description)
}

/// `monad_input_okta_systemlog`: pulls Okta system audit logs.
pub fn input_okta_systemlog() -> TypedConnectorResource {
    let settings = Block::new().with_attribute(
        "org_url",
        Attribute::required_string().with_description("The Okta organization URL"),
    );
    let secrets = Block::new().with_attribute(
        "api_key",
        connector_secret("API Key for Okta System Audit Logs"),
    );
    TypedConnectorResource::new(
        ConnectorKind::Input,
        "okta-systemlog",
        "Okta System Audit Logs",
        settings,
    )
    .with_secrets(secrets)
}
