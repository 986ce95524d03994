//! Provider configuration.
//!
//! Settings resolve in three layers, later layers winning:
//!
//! 1. built-in defaults (`base_url` = `https://beta.monad.com`)
//! 2. `MONAD_BASE_URL`, `MONAD_API_TOKEN`, `MONAD_ORGANIZATION_ID`
//! 3. non-null attributes of the provider configuration block

use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://beta.monad.com";

/// Prefix of the environment variables read during configuration.
pub const ENV_PREFIX: &str = "MONAD_";

/// Resolved provider settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API host, without the `/api` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Organization that owns every managed resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            organization_id: None,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

/// `MONAD_*` variables as raw strings, keyed by lowercased setting name.
///
/// Figment's `Env` provider would parse `123456` or `true` into scalars that
/// no longer extract into the string settings.
fn environment() -> BTreeMap<String, String> {
    Env::prefixed(ENV_PREFIX)
        .iter()
        .map(|(key, value)| (key.as_str().to_string(), value))
        .collect()
}

impl ProviderConfig {
    /// Schema of the provider configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "base_url",
                Attribute::optional_string().with_description(
                    "Base URL for the Monad API. Can also be set with the MONAD_BASE_URL environment variable.",
                ),
            )
            .with_attribute(
                "api_token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(
                        "API token for authentication. Can also be set with the MONAD_API_TOKEN environment variable.",
                    ),
            )
            .with_attribute(
                "organization_id",
                Attribute::optional_string().with_description(
                    "Organization ID for all resources. Can also be set with the MONAD_ORGANIZATION_ID environment variable.",
                ),
            )
    }

    /// The layered figment for an explicit configuration block.
    pub fn figment(explicit: &Json) -> Figment {
        let explicit: serde_json::Map<String, Json> = explicit
            .as_object()
            .map(|block| {
                block
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Figment::new()
            .merge(Serialized::defaults(ProviderConfig::default()))
            .merge(Serialized::defaults(environment()))
            .merge(Serialized::defaults(explicit))
    }

    /// Resolve settings from the environment and an explicit block.
    pub fn resolve(explicit: &Json) -> Result<Self, ProviderError> {
        let mut config: ProviderConfig = Self::figment(explicit)
            .extract()
            .map_err(|err| ProviderError::Configuration(err.to_string()))?;
        if config.base_url.is_empty() {
            config.base_url = default_base_url();
        }
        Ok(config)
    }

    /// Error diagnostics for settings that are missing or empty.
    pub fn check(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if self.api_token.as_deref().unwrap_or_default().is_empty() {
            diagnostics.push(
                Diagnostic::error("Unable to find API token")
                    .with_detail(
                        "API token cannot be an empty string. Set the api_token attribute in the provider configuration or the MONAD_API_TOKEN environment variable.",
                    )
                    .with_attribute("api_token"),
            );
        }
        if self.organization_id.as_deref().unwrap_or_default().is_empty() {
            diagnostics.push(
                Diagnostic::error("Unable to find organization ID")
                    .with_detail(
                        "Organization ID cannot be an empty string. Set the organization_id attribute in the provider configuration or the MONAD_ORGANIZATION_ID environment variable.",
                    )
                    .with_attribute("organization_id"),
            );
        }
        diagnostics
    }
}
