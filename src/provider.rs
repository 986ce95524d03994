//! The provider service.
//!
//! [`ProviderService`] is the host-facing API: every operation takes and
//! returns plain JSON. [`MonadProvider`] implements it over the resource
//! registry. It decodes incoming state against the resource schema, hands the
//! typed value to the resource, and encodes the result back to JSON.

use crate::client::ApiClient;
use crate::config::ProviderConfig;
use crate::decode::decode;
use crate::encode::encode;
use crate::error::ProviderError;
use crate::resources::{registry, with_attrs, Resource};
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, PROVIDER_TYPE_NAME,
};
use crate::validation::validate;
use crate::value::Value;
use serde_json::Value as Json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Operations a provider serves to its host.
///
/// # Example
///
/// ```
/// use monad_provider::{MonadProvider, ProviderService};
///
/// let provider = MonadProvider::new();
/// let metadata = provider.metadata();
/// assert!(metadata.resources.contains(&"monad_secret".to_string()));
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Return the schema of the provider configuration and every resource.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let mut resources: Vec<String> = self.schema().resources.keys().cloned().collect();
        resources.sort();
        ProviderMetadata {
            type_name: PROVIDER_TYPE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            resources,
        }
    }

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Json) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Json) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Json,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan changes for a resource. A null proposed state plans a delete.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Json>,
        proposed_state: Json,
        config: Json,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Json) -> Result<Json, ProviderError>;

    /// Read the current state of a resource. Null means it no longer exists.
    async fn read(&self, resource_type: &str, current_state: Json) -> Result<Json, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Json,
        planned_state: Json,
    ) -> Result<Json, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Json) -> Result<(), ProviderError>;

    /// Bring an existing remote object under management.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::FailedPrecondition(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }
}

/// The Monad provider.
pub struct MonadProvider {
    resources: Vec<Box<dyn Resource>>,
    client: RwLock<Option<Arc<ApiClient>>>,
}

impl Default for MonadProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MonadProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonadProvider")
            .field(
                "resources",
                &self.resources.iter().map(|r| r.type_name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl MonadProvider {
    /// A provider serving every registered resource type.
    pub fn new() -> Self {
        Self::with_resources(registry())
    }

    /// A provider serving the given resources.
    pub fn with_resources(resources: Vec<Box<dyn Resource>>) -> Self {
        Self {
            resources,
            client: RwLock::new(None),
        }
    }

    /// Whether [`ProviderService::configure`] has installed a client.
    pub async fn is_configured(&self) -> bool {
        self.client.read().await.is_some()
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .iter()
            .find(|r| r.type_name() == resource_type)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    async fn client(&self) -> Result<Arc<ApiClient>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::FailedPrecondition("provider is not configured".to_string())
        })
    }
}

/// Decode host state against a resource schema.
fn decode_state(schema: &Schema, state: &Json) -> Result<Value, ProviderError> {
    Ok(decode(state, Some(&schema.state_type()))?)
}

fn error_summaries(diagnostics: &[Diagnostic]) -> Option<String> {
    let errors: Vec<String> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| match &d.detail {
            Some(detail) => format!("{}: {}", d.summary, detail),
            None => d.summary.clone(),
        })
        .collect();
    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}

#[async_trait::async_trait]
impl ProviderService for MonadProvider {
    fn schema(&self) -> ProviderSchema {
        self.resources.iter().fold(
            ProviderSchema::new().with_provider_config(ProviderConfig::schema()),
            |schema, resource| schema.with_resource(resource.type_name(), resource.schema()),
        )
    }

    async fn validate_provider_config(&self, config: Json) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&ProviderConfig::schema(), &config))
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Json) -> Result<Vec<Diagnostic>, ProviderError> {
        let resolved = ProviderConfig::resolve(&config)?;
        let diagnostics = resolved.check();
        if diagnostics.iter().any(Diagnostic::is_error) {
            warn!(diagnostics = diagnostics.len(), "provider configuration is incomplete");
            return Ok(diagnostics);
        }

        let client = ApiClient::new(&resolved)?;
        info!(
            base_url = %resolved.base_url,
            organization_id = client.organization_id(),
            "configured Monad client"
        );
        *self.client.write().await = Some(Arc::new(client));
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.client.write().await.take();
        info!("provider stopped");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Json,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let schema = resource.schema();
        let mut diagnostics = validate(&schema, &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }

        let value = decode_state(&schema, &config)?;
        if let Err(err) = resource.validate(&value) {
            diagnostics.push(err.to_diagnostic("Invalid resource configuration"));
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state, config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Json>,
        proposed_state: Json,
        config: Json,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let schema = resource.schema();
        let prior = prior_state.unwrap_or(Json::Null);

        if proposed_state.is_null() {
            let changes = AttributeChange::diff(&prior, &Json::Null);
            debug!(changes = changes.len(), "planned delete");
            return Ok(PlanResult::with_changes(Json::Null, changes, false));
        }

        if let Some(errors) = error_summaries(&validate(&schema, &config)) {
            return Err(ProviderError::Validation(errors));
        }

        let proposed = decode_state(&schema, &proposed_state)?;
        resource.validate(&proposed)?;

        let mut planned = encode(&proposed)?;
        if let (Json::Object(planned), Json::Object(prior)) = (&mut planned, &prior) {
            for (name, attr) in &schema.block.attributes {
                if !attr.flags.computed {
                    continue;
                }
                let unset = planned.get(name).map_or(true, Json::is_null);
                if let (true, Some(previous)) = (unset, prior.get(name)) {
                    planned.insert(name.clone(), previous.clone());
                }
            }
        }

        let changes = AttributeChange::diff(&prior, &planned);
        if changes.is_empty() {
            return Ok(PlanResult::no_change(planned));
        }
        let requires_replace = !prior.is_null()
            && changes.iter().any(|change| {
                schema
                    .block
                    .attributes
                    .get(&change.path)
                    .is_some_and(|attr| attr.force_new)
            });
        debug!(changes = changes.len(), requires_replace, "planned changes");
        Ok(PlanResult::with_changes(planned, changes, requires_replace))
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Json) -> Result<Json, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let planned = decode_state(&resource.schema(), &planned_state)?;
        let created = resource.create(&client, planned).await.map_err(|err| {
            error!(error = %err, "create failed");
            err
        })?;
        info!("created resource");
        Ok(encode(&created)?)
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Json) -> Result<Json, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let current = decode_state(&resource.schema(), &current_state)?;
        match resource.read(&client, current).await {
            Ok(refreshed) => Ok(encode(&refreshed)?),
            Err(err) if err.is_not_found() => {
                warn!(error = %err, "resource no longer exists, removing from state");
                Ok(Json::Null)
            },
            Err(err) => {
                error!(error = %err, "read failed");
                Err(err)
            },
        }
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Json,
        planned_state: Json,
    ) -> Result<Json, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let schema = resource.schema();
        let prior = decode_state(&schema, &prior_state)?;
        let planned = decode_state(&schema, &planned_state)?;
        let updated = resource.update(&client, prior, planned).await.map_err(|err| {
            error!(error = %err, "update failed");
            err
        })?;
        info!("updated resource");
        Ok(encode(&updated)?)
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Json) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let current = decode_state(&resource.schema(), &current_state)?;
        match resource.delete(&client, current).await {
            Ok(()) => {
                info!("deleted resource");
                Ok(())
            },
            Err(err) if err.is_not_found() => {
                warn!(error = %err, "resource was already deleted");
                Ok(())
            },
            Err(err) => {
                error!(error = %err, "delete failed");
                Err(err)
            },
        }
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let skeleton = with_attrs(
            Value::null_of(&resource.schema().state_type()),
            [("id", Value::string(id))],
        )?;
        let state = resource.read(&client, skeleton).await?;
        info!("imported resource");
        Ok(vec![ImportedResource::new(resource_type, encode(&state)?)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_plan_creates, assert_plan_replaces, assert_plan_updates_in_place};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn configured(server: &MockServer) -> MonadProvider {
        let provider = MonadProvider::new();
        let diagnostics = provider
            .configure(json!({
                "base_url": server.uri(),
                "api_token": "tok",
                "organization_id": "org-1",
            }))
            .await
            .unwrap();
        assert!(diagnostics.is_empty());
        provider
    }

    #[test]
    fn test_schema_lists_every_resource() {
        let provider = MonadProvider::new();
        let schema = provider.schema();
        assert_eq!(schema.resources.len(), 9);
        assert!(schema.provider.block.attributes.contains_key("api_token"));

        let metadata = provider.metadata();
        assert_eq!(metadata.type_name, "monad");
        let mut sorted = metadata.resources.clone();
        sorted.sort();
        assert_eq!(metadata.resources, sorted);
    }

    #[test]
    fn test_configure_reports_missing_credentials() {
        figment::Jail::expect_with(|_jail| {
            let provider = MonadProvider::new();
            let diagnostics = tokio_test::block_on(provider.configure(json!({}))).unwrap();
            assert_eq!(diagnostics.len(), 2);
            assert!(!tokio_test::block_on(provider.is_configured()));
            Ok(())
        });
    }

    #[tokio::test]
    async fn test_operations_require_configuration() {
        let provider = MonadProvider::new();
        let err = assert_err!(provider.read("monad_secret", json!({"id": "sec-1"})).await);
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let provider = MonadProvider::new();
        let err = assert_err!(provider.plan("monad_nope", None, json!({}), json!({})).await);
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let provider = MonadProvider::new();
        let diagnostics = provider
            .validate_resource_config("monad_secret", json!({"name": "db"}))
            .await
            .unwrap();
        assert!(diagnostics
            .iter()
            .any(|d| d.summary == "Missing required attribute 'value'"));

        let diagnostics = provider
            .validate_resource_config(
                "monad_transform",
                json!({"name": "t", "config": {"operations": [{"operation": "add"}]}}),
            )
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("Validation error: operation at index 0 missing 'arguments' field")
        );
    }

    #[tokio::test]
    async fn test_plan_create_update_replace() {
        let provider = MonadProvider::new();
        let proposed = json!({"name": "in", "component_type": "demo"});
        let plan = assert_ok!(
            provider
                .plan("monad_input", None, proposed.clone(), proposed.clone())
                .await
        );
        assert_plan_creates(&plan);
        assert_eq!(plan.planned_state["id"], Json::Null);

        let prior = json!({"id": "in-1", "name": "in", "component_type": "demo"});
        let proposed = json!({"name": "renamed", "component_type": "demo"});
        let plan = assert_ok!(
            provider
                .plan("monad_input", Some(prior.clone()), proposed.clone(), proposed)
                .await
        );
        assert_plan_updates_in_place(&plan);
        assert_eq!(plan.planned_state["id"], "in-1");

        let proposed = json!({"name": "in", "component_type": "http"});
        let plan = assert_ok!(
            provider
                .plan("monad_input", Some(prior), proposed.clone(), proposed)
                .await
        );
        assert_plan_replaces(&plan);
    }

    #[tokio::test]
    async fn test_plan_rejects_invalid_config() {
        let provider = MonadProvider::new();
        let proposed = json!({"name": "db"});
        let err = assert_err!(
            provider
                .plan("monad_secret", None, proposed.clone(), proposed)
                .await
        );
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_plan_runs_resource_checks() {
        let provider = MonadProvider::new();
        let proposed = json!({
            "name": "rename",
            "config": {"operations": [{"operation": "rename_key"}]},
        });
        let err = assert_err!(
            provider
                .plan("monad_transform", None, proposed.clone(), proposed)
                .await
        );
        assert!(err.to_string().contains("missing 'arguments' field"), "{err}");
    }

    /// A resource whose own check always fails with a conversion error.
    struct Unconvertible;

    #[async_trait::async_trait]
    impl Resource for Unconvertible {
        fn type_name(&self) -> String {
            "monad_unconvertible".to_string()
        }

        fn schema(&self) -> Schema {
            Schema::v0().with_attribute("name", crate::schema::Attribute::required_string())
        }

        fn validate(&self, _config: &Value) -> Result<(), ProviderError> {
            Err(crate::error::ConversionError::UnresolvedValue {
                path: "name".to_string(),
            }
            .into())
        }

        async fn create(&self, _client: &ApiClient, planned: Value) -> Result<Value, ProviderError> {
            Ok(planned)
        }

        async fn read(&self, _client: &ApiClient, current: Value) -> Result<Value, ProviderError> {
            Ok(current)
        }

        async fn update(
            &self,
            _client: &ApiClient,
            _prior: Value,
            planned: Value,
        ) -> Result<Value, ProviderError> {
            Ok(planned)
        }

        async fn delete(&self, _client: &ApiClient, _current: Value) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_plan_propagates_conversion_errors_from_checks() {
        let provider = MonadProvider::with_resources(vec![Box::new(Unconvertible)]);
        let proposed = json!({"name": "x"});
        let err = assert_err!(
            provider
                .plan("monad_unconvertible", None, proposed.clone(), proposed)
                .await
        );
        assert!(matches!(err, ProviderError::Conversion(_)), "{err}");
    }

    #[tokio::test]
    async fn test_plan_delete() {
        let provider = MonadProvider::new();
        let prior = json!({"id": "sec-1", "name": "db", "value": "x"});
        let plan = assert_ok!(
            provider
                .plan("monad_secret", Some(prior), Json::Null, Json::Null)
                .await
        );
        assert!(plan.planned_state.is_null());
        assert_eq!(plan.changes.len(), 3);
    }

    #[tokio::test]
    async fn test_read_of_deleted_resource_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/org-1/secrets/sec-1"))
            .respond_with(ResponseTemplate::new(404).set_body_string("secret not found"))
            .mount(&server)
            .await;

        let provider = configured(&server).await;
        let state = assert_ok!(
            provider
                .read("monad_secret", json!({"id": "sec-1", "name": "db", "value": "x"}))
                .await
        );
        assert!(state.is_null());
    }

    #[tokio::test]
    async fn test_create_encodes_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/org-1/secrets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "sec-1"})))
            .mount(&server)
            .await;

        let provider = configured(&server).await;
        let state = assert_ok!(
            provider
                .create("monad_secret", json!({"name": "db", "value": "x"}))
                .await
        );
        assert_eq!(
            state,
            json!({"id": "sec-1", "name": "db", "description": null, "value": "x"})
        );
    }

    #[tokio::test]
    async fn test_delete_of_missing_resource_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/org-1/transforms/tr-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = configured(&server).await;
        assert_ok!(
            provider
                .delete("monad_transform", json!({"id": "tr-1", "name": "t", "config": {}}))
                .await
        );
    }

    #[tokio::test]
    async fn test_import_reads_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/org-1/pipelines/p-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p-1",
                "name": "logs",
            })))
            .mount(&server)
            .await;

        let provider = configured(&server).await;
        let imported = assert_ok!(provider.import_resource("monad_pipeline", "p-1").await);
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, "monad_pipeline");
        assert_eq!(imported[0].state["id"], "p-1");
        assert_eq!(imported[0].state["name"], "logs");
        assert_eq!(imported[0].state["nodes"], Json::Null);
    }

    #[tokio::test]
    async fn test_stop_clears_client() {
        let server = MockServer::start().await;
        let provider = configured(&server).await;
        assert!(provider.is_configured().await);
        assert_ok!(provider.stop().await);
        assert!(!provider.is_configured().await);
    }
}
