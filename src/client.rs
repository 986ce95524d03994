//! HTTP client for the Monad API.
//!
//! Every call sends and receives plain JSON. Request bodies are built by the
//! resource handlers from encoded values; responses are handed back as
//! parsed JSON for the decoder.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde_json::Value as Json;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Request timeout for every API call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A CRUD operation against one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `POST` a new object.
    Create,
    /// `GET` one object.
    Read,
    /// Replace or patch one object.
    Update,
    /// `DELETE` one object.
    Delete,
}

/// The API collections the provider manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Stored credentials.
    Secret,
    /// Data sources.
    Input,
    /// Data destinations.
    Output,
    /// Record enrichments.
    Enrichment,
    /// Record transforms.
    Transform,
    /// Graphs connecting the other components.
    Pipeline,
}

impl Component {
    /// The collection segment of the endpoint path.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Secret => "secrets",
            Self::Input => "inputs",
            Self::Output => "outputs",
            Self::Enrichment => "enrichments",
            Self::Transform => "transforms",
            Self::Pipeline => "pipelines",
        }
    }

    /// The API version serving an operation on this collection.
    pub fn version(self, operation: Operation) -> &'static str {
        match (self, operation) {
            (Self::Input | Self::Output, Operation::Read | Operation::Delete) => "v1",
            (Self::Input | Self::Output, _) => "v2",
            (Self::Secret | Self::Pipeline, _) => "v2",
            (Self::Enrichment, _) => "v3",
            (Self::Transform, _) => "v1",
        }
    }

    /// The HTTP method of an operation on this collection.
    pub fn method(self, operation: Operation) -> Method {
        match operation {
            Operation::Create => Method::POST,
            Operation::Read => Method::GET,
            Operation::Delete => Method::DELETE,
            Operation::Update => match self {
                Self::Input | Self::Output => Method::PUT,
                _ => Method::PATCH,
            },
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Authenticated client bound to one organization.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    organization_id: String,
}

impl ApiClient {
    /// Build a client from resolved settings.
    ///
    /// Fails when the token or organization is missing.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let token = config
            .api_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::Configuration("missing API token".to_string()))?;
        let organization_id = config
            .organization_id
            .as_deref()
            .filter(|o| !o.is_empty())
            .ok_or_else(|| ProviderError::Configuration("missing organization ID".to_string()))?;

        let mut auth = HeaderValue::from_str(&format!("ApiKey {}", token)).map_err(|_| {
            ProviderError::Configuration("API token contains invalid header characters".to_string())
        })?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let base = Url::parse(&format!("{}/api", config.base_url.trim_end_matches('/')))
            .map_err(|err| {
                ProviderError::Configuration(format!("invalid base URL {}: {}", config.base_url, err))
            })?;

        Ok(Self {
            http,
            base,
            organization_id: organization_id.to_string(),
        })
    }

    /// The organization every request is scoped to.
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    /// The URL of an operation, optionally for one object.
    pub fn endpoint(
        &self,
        component: Component,
        operation: Operation,
        id: Option<&str>,
    ) -> Result<Url, ProviderError> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ProviderError::Configuration(format!("base URL {} cannot carry a path", self.base))
            })?;
            segments
                .pop_if_empty()
                .push(component.version(operation))
                .push(&self.organization_id)
                .push(component.collection());
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// Create an object and return the response body.
    pub async fn create(&self, component: Component, body: &Json) -> Result<Json, ProviderError> {
        let url = self.endpoint(component, Operation::Create, None)?;
        self.send(component.method(Operation::Create), url, Some(body)).await
    }

    /// Fetch one object.
    pub async fn get(&self, component: Component, id: &str) -> Result<Json, ProviderError> {
        let url = self.endpoint(component, Operation::Read, Some(id))?;
        self.send(component.method(Operation::Read), url, None).await
    }

    /// Update one object and return the response body.
    pub async fn update(
        &self,
        component: Component,
        id: &str,
        body: &Json,
    ) -> Result<Json, ProviderError> {
        let url = self.endpoint(component, Operation::Update, Some(id))?;
        self.send(component.method(Operation::Update), url, Some(body)).await
    }

    /// Delete one object.
    pub async fn delete(&self, component: Component, id: &str) -> Result<(), ProviderError> {
        let url = self.endpoint(component, Operation::Delete, Some(id))?;
        self.send(component.method(Operation::Delete), url, None).await?;
        Ok(())
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Json>) -> Result<Json, ProviderError> {
        debug!(%method, %url, "sending API request");

        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), "received API response");

        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), text));
        }
        if text.trim().is_empty() {
            return Ok(Json::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&ProviderConfig {
            base_url: server.uri(),
            api_token: Some("tok".to_string()),
            organization_id: Some("org-1".to_string()),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_table() {
        use Component::*;
        use Operation::*;

        let cases = [
            (Secret, Read, "v2", Method::GET),
            (Secret, Update, "v2", Method::PATCH),
            (Input, Create, "v2", Method::POST),
            (Input, Read, "v1", Method::GET),
            (Input, Update, "v2", Method::PUT),
            (Output, Delete, "v1", Method::DELETE),
            (Enrichment, Update, "v3", Method::PATCH),
            (Transform, Create, "v1", Method::POST),
            (Pipeline, Update, "v2", Method::PATCH),
        ];
        for (component, operation, version, http_method) in cases {
            assert_eq!(component.version(operation), version, "{component} {operation:?}");
            assert_eq!(component.method(operation), http_method, "{component} {operation:?}");
        }
    }

    #[test]
    fn test_endpoint_paths() {
        let client = ApiClient::new(&ProviderConfig {
            base_url: "https://beta.monad.com/".to_string(),
            api_token: Some("tok".to_string()),
            organization_id: Some("org-1".to_string()),
        })
        .unwrap();

        let url = client
            .endpoint(Component::Output, Operation::Read, Some("out-1"))
            .unwrap();
        assert_eq!(url.as_str(), "https://beta.monad.com/api/v1/org-1/outputs/out-1");

        let url = client.endpoint(Component::Secret, Operation::Create, None).unwrap();
        assert_eq!(url.as_str(), "https://beta.monad.com/api/v2/org-1/secrets");
    }

    #[test]
    fn test_missing_credentials() {
        let err = ApiClient::new(&ProviderConfig::default()).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));

        let err = ApiClient::new(&ProviderConfig {
            api_token: Some("tok".to_string()),
            organization_id: Some(String::new()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_create_sends_authenticated_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/org-1/secrets"))
            .and(header("Authorization", "ApiKey tok"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(json!({"name": "db", "value": "hunter2"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "sec-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = assert_ok!(
            client
                .create(Component::Secret, &json!({"name": "db", "value": "hunter2"}))
                .await
        );
        assert_eq!(response["id"], "sec-1");
    }

    #[tokio::test]
    async fn test_update_uses_component_method() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v2/org-1/inputs/in-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "in-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_ok!(client.update(Component::Input, "in-1", &json!({"name": "x"})).await);
    }

    #[tokio::test]
    async fn test_delete_with_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/org-1/outputs/out-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_ok!(client.delete(Component::Output, "out-1").await);
    }

    #[tokio::test]
    async fn test_error_status_maps_to_variant() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/org-1/enrichments/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/org-1/pipelines/p-1"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = assert_err!(client.get(Component::Enrichment, "gone").await);
        assert!(err.is_not_found());
        assert_eq!(err.message(), "not found");

        let err = assert_err!(client.get(Component::Pipeline, "p-1").await);
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_serialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/org-1/transforms/t-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = assert_err!(client.get(Component::Transform, "t-1").await);
        assert!(matches!(err, ProviderError::Serialization(_)));
    }
}
