//! `monad_secret`: a stored credential referenced by connector secrets.

use super::{
    put_attr, required_str, resource_type_name, response_id, string_attr, with_attrs, Resource,
};
use crate::client::{ApiClient, Component};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::value::Value;
use async_trait::async_trait;
use serde_json::{Map, Value as Json};
use tracing::debug;

/// Secrets are write-only: the API never returns the value, so it is kept
/// from state on read.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretResource;

fn secret_body(state: &Value) -> Result<Json, ProviderError> {
    let mut body = Map::new();
    for name in ["name", "description", "value"] {
        put_attr(&mut body, state, name)?;
    }
    Ok(Json::Object(body))
}

#[async_trait]
impl Resource for SecretResource {
    fn type_name(&self) -> String {
        resource_type_name("secret", None)
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a secret.")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Secret identifier"),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the secret"),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("Description of the secret"),
            )
            .with_attribute(
                "value",
                Attribute::required_string()
                    .sensitive()
                    .with_description("Value of the secret"),
            )
    }

    async fn create(&self, client: &ApiClient, planned: Value) -> Result<Value, ProviderError> {
        let response = client.create(Component::Secret, &secret_body(&planned)?).await?;
        let id = response_id(&response)?;
        debug!(%id, "created secret");
        with_attrs(planned, [("id", Value::string(id))])
    }

    async fn read(&self, client: &ApiClient, current: Value) -> Result<Value, ProviderError> {
        let id = required_str(&current, "id")?.to_string();
        let response = client.get(Component::Secret, &id).await?;
        with_attrs(
            current,
            [
                ("name", string_attr(&response, "name")),
                ("description", string_attr(&response, "description")),
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
            .update(Component::Secret, &id, &secret_body(&planned)?)
            .await?;
        with_attrs(planned, [("id", Value::string(id))])
    }

    async fn delete(&self, client: &ApiClient, current: Value) -> Result<(), ProviderError> {
        let id = required_str(&current, "id")?;
        client.delete(Component::Secret, id).await
    }
}
