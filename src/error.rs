//! Error types for Inbox Assist.

use std::time::Duration;

use serde::Serialize;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("{entity} not found with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DatabaseError {
    pub fn not_found(entity: &str, id: i64) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

/// Coarse classification of an LLM failure, reported to callers so they can
/// decide whether a retry makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmErrorKind {
    /// Network failure, DNS, TLS or timeout before a response arrived.
    ServiceUnreachable,
    /// Rate limit or quota exhausted (HTTP 429 / RESOURCE_EXHAUSTED).
    QuotaExceeded,
    /// Any other provider-side failure.
    ServiceError,
}

impl LlmErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceUnreachable => "service_unreachable",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ServiceError => "service_error",
        }
    }

    /// Only quota and connectivity failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnreachable | Self::QuotaExceeded)
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} unreachable: {reason}")]
    Unreachable { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Provider {provider} quota exceeded: {reason}")]
    QuotaExceeded { provider: String, reason: String },

    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Classify this error for reporting.
    pub fn kind(&self) -> LlmErrorKind {
        match self {
            Self::Unreachable { .. } => LlmErrorKind::ServiceUnreachable,
            Self::RateLimited { .. } | Self::QuotaExceeded { .. } => LlmErrorKind::QuotaExceeded,
            Self::RequestFailed { .. }
            | Self::InvalidResponse { .. }
            | Self::AuthFailed { .. }
            | Self::Json(_) => LlmErrorKind::ServiceError,
        }
    }
}

/// Template substitution errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Template references unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("Unclosed '{{' at byte {0}")]
    UnclosedBrace(usize),

    #[error("Single '}}' encountered at byte {0}")]
    StrayClosingBrace(usize),
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Email {0} not found")]
    EmailNotFound(i64),

    #[error("Persisting results failed: {0}")]
    Persist(#[from] DatabaseError),
}
