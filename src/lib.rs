//! Monad Provider
//!
//! An infrastructure provider for the Monad data pipeline API. It manages
//! secrets, connectors (inputs, outputs and enrichments), transforms and
//! pipelines as declarative resources.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Dynamic values**: [`Value`], a typed value model with nulls and
//!   unknowns, and [`encode`]/[`decode`] to move between it and JSON
//! - **Type inference**: decoding without a type hint infers the narrowest
//!   type that fits the JSON, unifying list elements where possible
//! - **Schema types**: [`schema`] describes provider and resource schemas
//! - **ProviderService trait**: the host-facing operations, implemented by
//!   [`MonadProvider`]
//! - **API client**: [`ApiClient`] speaks the Monad REST API
//! - **Configuration**: [`ProviderConfig`] layers explicit settings over
//!   `MONAD_*` environment variables
//! - **Logging**: integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```
//! use monad_provider::{decode, encode, AttributeType, Value};
//! use serde_json::json;
//!
//! let json = json!({"name": "flow", "tags": ["a", "b"], "rate": 5});
//! let value = decode(&json, None).unwrap();
//!
//! assert_eq!(value.get("rate"), Some(&Value::Int64(5)));
//! assert_eq!(
//!     value.get("tags").map(Value::attribute_type),
//!     Some(AttributeType::list(AttributeType::String))
//! );
//! assert_eq!(encode(&value).unwrap(), json);
//! ```
//!
//! # Driving the provider
//!
//! ```no_run
//! use monad_provider::{MonadProvider, ProviderService};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), monad_provider::ProviderError> {
//! let provider = MonadProvider::new();
//! provider
//!     .configure(json!({"api_token": "tok", "organization_id": "org-1"}))
//!     .await?;
//!
//! let plan = provider
//!     .plan(
//!         "monad_secret",
//!         None,
//!         json!({"name": "db", "value": "hunter2"}),
//!         json!({"name": "db", "value": "hunter2"}),
//!     )
//!     .await?;
//! let state = provider.create("monad_secret", plan.planned_state).await?;
//! println!("created secret {}", state["id"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Resources
//!
//! - `monad_secret`
//! - `monad_input`, `monad_output`, `monad_enrichment` with a dynamic
//!   `config` holding `settings` and `secrets`
//! - `monad_transform` with a dynamic `config` holding `operations`
//! - `monad_pipeline` with `nodes` and `edges` blocks
//! - typed connectors such as `monad_output_http`, whose `config` block
//!   declares each setting

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod infer;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;
pub mod value;

// Re-export main types at crate root
pub use client::{ApiClient, Component, Operation};
pub use config::ProviderConfig;
pub use decode::{decode, Decoder};
pub use encode::encode;
pub use error::{ConversionError, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{MonadProvider, ProviderService};
pub use resources::Resource;
pub use schema::{AttributeType, ProviderSchema};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, PROVIDER_TYPE_NAME,
};
pub use validation::{is_valid, validate, validate_result};
pub use value::Value;

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
