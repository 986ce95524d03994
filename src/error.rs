//! Error types for the Monad provider.

use crate::schema::{AttributeType, Diagnostic};
use thiserror::Error;

/// Errors raised while converting between typed values and JSON.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// An unknown value reached the encoder before it was resolved.
    #[error("unresolved value at {}", display_path(.path))]
    UnresolvedValue {
        /// Dotted path of the offending value.
        path: String,
    },

    /// A value has no representation on the other side.
    #[error("unsupported value at {}: {detail}", display_path(.path))]
    UnsupportedShape {
        /// Dotted path of the offending value.
        path: String,
        /// What was found.
        detail: String,
    },

    /// A declared type disagrees with the shape of the JSON value.
    #[error("type conflict at {}: expected {expected}, found {found}", display_path(.path))]
    TypeConflict {
        /// Dotted path of the offending value.
        path: String,
        /// The declared type.
        expected: AttributeType,
        /// The kind of JSON value that was found.
        found: String,
    },
}

impl ConversionError {
    /// Re-root the error under a parent attribute.
    pub fn within(self, parent: &str) -> Self {
        match self {
            Self::UnresolvedValue { path } => Self::UnresolvedValue {
                path: join_path(parent, &path),
            },
            Self::UnsupportedShape { path, detail } => Self::UnsupportedShape {
                path: join_path(parent, &path),
                detail,
            },
            Self::TypeConflict {
                path,
                expected,
                found,
            } => Self::TypeConflict {
                path: join_path(parent, &path),
                expected,
                found,
            },
        }
    }

    /// The attribute path the error refers to. Empty for the root value.
    pub fn path(&self) -> &str {
        match self {
            Self::UnresolvedValue { path }
            | Self::UnsupportedShape { path, .. }
            | Self::TypeConflict { path, .. } => path,
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "root"
    } else {
        path
    }
}

/// Join a parent path and a child segment with a dot.
pub(crate) fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else if child.is_empty() {
        parent.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

/// Errors that can occur while serving provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A typed value could not be converted to or from JSON.
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The API answered successfully with a body the provider cannot use.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The API answered with a status the provider does not handle.
    #[error("Unexpected response (status {status}): {body}")]
    UnexpectedResponse {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

impl ProviderError {
    /// Map a non-success HTTP status and its body onto an error variant.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            400 => Self::InvalidRequest(body),
            401 | 403 => Self::PermissionDenied(body),
            404 => Self::NotFound(body),
            409 => Self::AlreadyExists(body),
            429 => Self::ResourceExhausted(body),
            500..=599 => Self::Unavailable(body),
            _ => Self::UnexpectedResponse { status, body },
        }
    }

    /// Whether the error means the remote object no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::FailedPrecondition(msg)
            | Self::InvalidRequest(msg)
            | Self::MalformedResponse(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Conversion(err) => err.to_string(),
            Self::Transport(err) => err.to_string(),
            Self::UnexpectedResponse { body, .. } => body.clone(),
        }
    }

    /// Render the error as a host-facing error diagnostic.
    pub fn to_diagnostic(&self, summary: impl Into<String>) -> Diagnostic {
        let diagnostic = Diagnostic::error(summary).with_detail(self.to_string());
        match self {
            Self::Conversion(err) if !err.path().is_empty() => {
                diagnostic.with_attribute(err.path())
            },
            _ => diagnostic,
        }
    }
}
