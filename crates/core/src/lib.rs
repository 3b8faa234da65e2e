//! Shared primitives for all Rust crates in Skyward.

#![forbid(unsafe_code)]

/// Provider-level identity and region settings.
pub mod provider;

use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use provider::ProviderIdentity;

/// Result type used across Skyward crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Borrow<str> for NonEmptyString {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Backend resource kinds named in lookup and reference errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Top-level tenant identity.
    Domain,
    /// Sub-scope of a domain.
    Project,
    /// Named permission bundle.
    Role,
    /// Cross-tenant trust relationship.
    Agency,
    /// Container orchestration cluster.
    Cluster,
}

impl ResourceKind {
    /// Returns a stable lower-case name for messages and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Project => "project",
            Self::Role => "role",
            Self::Agency => "agency",
            Self::Cluster => "cluster",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Failure category of a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendFailure {
    /// The request never produced an HTTP response.
    Transport,
    /// The backend answered with an unexpected status code.
    Status(u16),
    /// The response body could not be decoded.
    MalformedResponse,
}

/// Error raised by a backend adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    failure: BackendFailure,
    message: String,
}

impl BackendError {
    /// Creates an error for a request that did not reach the backend.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            failure: BackendFailure::Transport,
            message: message.into(),
        }
    }

    /// Creates an error for an unexpected response status.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            failure: BackendFailure::Status(status),
            message: message.into(),
        }
    }

    /// Creates an error for an undecodable response body.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            failure: BackendFailure::MalformedResponse,
            message: message.into(),
        }
    }

    /// Returns the failure category.
    #[must_use]
    pub fn failure(&self) -> BackendFailure {
        self.failure
    }

    /// Returns the HTTP status, when the backend answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self.failure {
            BackendFailure::Status(status) => Some(status),
            BackendFailure::Transport | BackendFailure::MalformedResponse => None,
        }
    }

    /// Returns whether the backend reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid declared input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Required provider configuration is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A uniqueness-expected lookup matched nothing.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of the looked up resource.
        kind: ResourceKind,
        /// Name or identifier used for the lookup.
        name: String,
    },

    /// A uniqueness-expected lookup matched more than one resource.
    #[error("found {count} {kind} resources named '{name}', expected exactly one")]
    AmbiguousResult {
        /// Kind of the looked up resource.
        kind: ResourceKind,
        /// Name used for the lookup.
        name: String,
        /// Number of matches returned by the backend.
        count: usize,
    },

    /// A declared name does not resolve to any known identifier.
    #[error("the {kind} '{name}' does not exist")]
    Reference {
        /// Kind of the referenced resource.
        kind: ResourceKind,
        /// Declared name.
        name: String,
    },

    /// Transport, status or decoding failure from a backend.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A bounded retry loop ran out of time.
    #[error(
        "timeout: {operation} did not complete within {timeout:?}{}",
        describe_last_error(.last_error)
    )]
    Timeout {
        /// Operation name.
        operation: String,
        /// Wall-clock budget that was exhausted.
        timeout: Duration,
        /// Last retryable failure observed before expiry.
        last_error: Option<String>,
    },

    /// Annotated failure keeping the underlying cause inspectable.
    #[error("{context}: {source}")]
    Context {
        /// What was being done when the failure happened.
        context: String,
        /// Underlying failure.
        source: Box<AppError>,
    },

    /// The resource record exists but configuring it afterwards failed.
    #[error("{kind} '{id}' was created but is incomplete: {source}")]
    PartiallyCreated {
        /// Kind of the created resource.
        kind: ResourceKind,
        /// Backend identifier of the created record.
        id: String,
        /// Failure that interrupted the configuration.
        source: Box<AppError>,
    },

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wraps this error with a description of the failed step.
    #[must_use]
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error below any context annotations.
    #[must_use]
    pub fn root(&self) -> &AppError {
        match self {
            Self::Context { source, .. } | Self::PartiallyCreated { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the identifier of a record created before the failure, if any.
    #[must_use]
    pub fn created_id(&self) -> Option<&str> {
        match self {
            Self::PartiallyCreated { id, .. } => Some(id.as_str()),
            Self::Context { source, .. } => source.created_id(),
            _ => None,
        }
    }

    /// Returns the backend failure below any context annotations.
    #[must_use]
    pub fn backend(&self) -> Option<&BackendError> {
        match self.root() {
            Self::Backend(error) => Some(error),
            _ => None,
        }
    }

    /// Returns whether the backend reported the primary resource as missing.
    #[must_use]
    pub fn is_backend_not_found(&self) -> bool {
        self.backend().is_some_and(BackendError::is_not_found)
    }
}

fn describe_last_error(last_error: &Option<String>) -> String {
    last_error
        .as_deref()
        .map(|error| format!(" (last error: {error})"))
        .unwrap_or_default()
}
