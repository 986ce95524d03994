//! Testing utilities for provider implementations.
//!
//! [`ProviderTester`] drives a [`ProviderService`] through the same sequences
//! a host would, and the `assert_*` helpers check plans, diagnostics and
//! value conversions.
//!
//! # Example
//!
//! ```no_run
//! use monad_provider::testing::ProviderTester;
//! use monad_provider::MonadProvider;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let tester = ProviderTester::new(MonadProvider::new());
//! tester
//!     .configure(json!({"api_token": "tok", "organization_id": "org-1"}))
//!     .await?;
//!
//! let state = tester
//!     .lifecycle_create("monad_secret", json!({"name": "db", "value": "hunter2"}))
//!     .await?;
//! assert_eq!(state["name"], "db");
//! # Ok(())
//! # }
//! ```

use crate::decode::decode;
use crate::encode::encode;
use crate::error::ProviderError;
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{ImportedResource, PlanResult};
use crate::value::Value;
use serde_json::Value as Json;

/// A test harness for provider implementations.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the error diagnostics if there are any.
    pub async fn validate_provider_config(&self, config: Json) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    ///
    /// Returns `Err` with the error diagnostics if there are any.
    pub async fn configure(&self, config: Json) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Json,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Json,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Json,
        proposed_state: Json,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Json,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Json::Null, Json::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(&self, resource_type: &str, planned_state: Json) -> Result<Json, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(&self, resource_type: &str, current_state: Json) -> Result<Json, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Json,
        planned_state: Json,
    ) -> Result<Json, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Json) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Run plan, create and read. Returns the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Json,
    ) -> Result<Json, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Run plan, update and read. Returns the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Json,
        proposed_state: Json,
    ) -> Result<Json, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Run plan and delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Json,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone()).await?;
        self.delete(resource_type, current_state).await
    }

    /// Create, update and delete a resource.
    ///
    /// Returns the state after the update (before delete).
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Json,
        updated_config: Json,
    ) -> Result<Json, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert that a plan creates the resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan changes nothing.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan changes the resource in place.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to update in place, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error whose summary contains
/// `substring`.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| d.is_error() && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

/// Assert that a typed value survives encoding and decoding against its
/// own type.
///
/// # Panics
///
/// Panics if either direction fails or the decoded value differs.
pub fn assert_round_trip(value: &Value) {
    let json = encode(value).unwrap_or_else(|err| panic!("encoding {:?} failed: {}", value, err));
    let decoded = decode(&json, Some(&value.attribute_type()))
        .unwrap_or_else(|err| panic!("decoding {} failed: {}", json, err));
    assert_eq!(&decoded, value, "round trip through {} changed the value", json);
}

/// Assert that a JSON value survives inference and encoding unchanged.
///
/// # Panics
///
/// Panics if either direction fails or the encoded JSON differs.
pub fn assert_generic_round_trip(json: &Json) {
    let decoded =
        decode(json, None).unwrap_or_else(|err| panic!("decoding {} failed: {}", json, err));
    let encoded = encode(&decoded)
        .unwrap_or_else(|err| panic!("encoding {:?} failed: {}", decoded, err));
    assert_eq!(&encoded, json, "inferred as {}", decoded.attribute_type());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MonadProvider;
    use crate::schema::AttributeType;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn tester_for(server: &MockServer) -> ProviderTester<MonadProvider> {
        let tester = ProviderTester::new(MonadProvider::new());
        tester
            .configure(json!({
                "base_url": server.uri(),
                "api_token": "tok",
                "organization_id": "org-1",
            }))
            .await
            .unwrap();
        tester
    }

    #[tokio::test]
    async fn test_tester_resource_types() {
        let tester = ProviderTester::new(MonadProvider::new());
        let types = tester.resource_types();
        assert!(types.contains(&"monad_pipeline".to_string()));
        assert_eq!(types.len(), tester.schema().resources.len());
    }

    #[tokio::test]
    async fn test_tester_validation() {
        let tester = ProviderTester::new(MonadProvider::new());
        assert!(tester
            .validate_provider_config(json!({"api_token": "tok"}))
            .await
            .is_ok());

        let err = tester
            .validate_resource_config("monad_secret", json!({"name": "db", "colour": "red"}))
            .await
            .unwrap_err();
        match err {
            TestError::Diagnostics(diags) => {
                assert_error_contains(&diags, "Unsupported attribute 'colour'");
                assert_error_contains(&diags, "Missing required attribute 'value'");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_tester_plan_update_no_changes() {
        let tester = ProviderTester::new(MonadProvider::new());
        let prior = json!({"id": "sec-1", "name": "db", "description": null, "value": "x"});
        let plan = tester
            .plan_update("monad_secret", prior, json!({"name": "db", "value": "x"}))
            .await
            .unwrap();
        assert_plan_no_changes(&plan);
        assert_eq!(plan.planned_state["id"], "sec-1");
    }

    #[tokio::test]
    async fn test_tester_lifecycle_crud() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/org-1/secrets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "sec-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/v2/org-1/secrets/sec-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "sec-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/org-1/secrets/sec-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sec-1",
                "name": "db",
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/org-1/secrets/sec-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let tester = tester_for(&server).await;
        let state = tester
            .lifecycle_crud(
                "monad_secret",
                json!({"name": "db", "value": "v1"}),
                json!({"name": "db", "value": "v2"}),
            )
            .await
            .unwrap();
        assert_eq!(state["id"], "sec-1");
        assert_eq!(state["value"], "v2");

        let imported = tester.import_resource("monad_secret", "sec-1").await.unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].state["name"], "db");
        assert!(imported[0].state["value"].is_null());

        tester.stop().await.unwrap();
        assert!(!tester.provider().is_configured().await);
    }

    #[test]
    fn test_assert_no_errors() {
        assert_no_errors(&[Diagnostic::warning("just a warning")]);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("boom")]);
    }

    #[test]
    fn test_assert_round_trip() {
        assert_round_trip(&Value::list(
            AttributeType::map(AttributeType::Int64),
            vec![Value::map(
                AttributeType::Int64,
                BTreeMap::from([("a".to_string(), Value::Int64(1))]),
            )],
        ));
        assert_round_trip(&Value::Tuple(vec![Value::string("a"), Value::Bool(true)]));
        assert_generic_round_trip(&json!({"name": "x", "tags": ["a"], "n": 1.5}));
    }

    #[test]
    fn test_round_trip_of_every_kind() {
        assert_round_trip(&Value::set(
            AttributeType::String,
            vec![Value::string("b"), Value::string("a")],
        ));
        assert_round_trip(&Value::Float64(2.5));
        assert_round_trip(&Value::Number(rust_decimal::Decimal::new(125, 1)));
        assert_round_trip(&Value::dynamic(Value::list(
            AttributeType::String,
            vec![Value::string("x"), Value::string("y")],
        )));
        assert_round_trip(&Value::object([
            ("name", Value::string("sink")),
            ("port", Value::Null(AttributeType::Int64)),
            ("tags", Value::Null(AttributeType::list(AttributeType::String))),
            ("limits", Value::Null(AttributeType::map(AttributeType::Float64))),
        ]));
    }

    #[test]
    fn test_four_level_nesting_round_trips() {
        let node = |slug: &str, weight: i64| {
            Value::object([("slug", Value::string(slug)), ("weight", Value::Int64(weight))])
        };
        let node_type = AttributeType::object([
            ("slug", AttributeType::String),
            ("weight", AttributeType::Int64),
        ]);
        let pipeline = Value::object([
            ("name", Value::string("flow")),
            (
                "nodes",
                Value::list(node_type, vec![node("read", 1), node("write", 2)]),
            ),
        ]);
        let value = Value::object([(
            "pipelines",
            Value::list(pipeline.attribute_type(), vec![pipeline]),
        )]);
        assert_round_trip(&value);

        let json = encode(&value).unwrap();
        assert_eq!(
            json,
            json!({"pipelines": [{
                "name": "flow",
                "nodes": [{"slug": "read", "weight": 1}, {"slug": "write", "weight": 2}],
            }]})
        );
        assert_generic_round_trip(&json);
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![Diagnostic::error("Bad value")
            .with_detail("must be set")
            .with_attribute("name")]);
        let rendered = err.to_string();
        assert!(rendered.contains("1 diagnostic(s)"));
        assert!(rendered.contains("Bad value: must be set (at name)"));
    }
}
