//! Error handling for arec.
//!
//! This module provides:
//! - [`ArError`]: The main error enum for all arec operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Rich error type with suggestions and context

mod codes;
mod suggestions;

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;
pub use suggestions::suggest_for_error;

/// Main error type for arec operations.
#[derive(Error, Debug)]
pub enum ArError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index build failed for record '{record}': {reason}")]
    IndexBuild { record: String, reason: String },

    #[error("Index not loaded: {0}")]
    IndexNotLoaded(String),

    #[error("Index version mismatch: expected {expected}, found {found}")]
    IndexVersionMismatch { expected: String, found: String },

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("Rerank output malformed: {0}")]
    RerankFormat(String),

    #[error("Rerank timed out after {after_secs}s")]
    RerankTimeout { after_secs: u64 },

    #[error("Rerank service unavailable at {endpoint}: {reason}")]
    RerankUnavailable { endpoint: String, reason: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Query fetch failed for {url}: {reason}")]
    QueryFetch { url: String, reason: String },

    #[error("Invalid catalog: {0}")]
    Catalog(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request body of {size} bytes exceeds the {limit}-byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ArError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Embedding(_) => ErrorCode::EmbeddingFailed,
            Self::IndexBuild { .. } => ErrorCode::IndexBuildFailed,
            Self::IndexNotLoaded(_) => ErrorCode::IndexNotLoaded,
            Self::IndexVersionMismatch { .. } => ErrorCode::IndexVersionMismatch,
            Self::IndexCorrupted(_) => ErrorCode::IndexCorrupted,
            Self::RerankFormat(_) => ErrorCode::RerankFormat,
            Self::RerankTimeout { .. } => ErrorCode::RerankTimeout,
            Self::RerankUnavailable { .. } => ErrorCode::RerankUnavailable,
            Self::InvalidQuery(_) => ErrorCode::QueryInvalid,
            Self::QueryFetch { .. } => ErrorCode::QueryFetchFailed,
            Self::Catalog(_) => ErrorCode::CatalogUnreadable,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::MissingConfig(_) => ErrorCode::ConfigMissingRequired,
            Self::Http(_) => ErrorCode::HttpProtocol,
            Self::PayloadTooLarge { .. } => ErrorCode::HttpPayloadTooLarge,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) | Self::Csv(_) => ErrorCode::SerializationError,
            Self::NotFound(_) => ErrorCode::NotFound,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::IndexBuild { record, reason } => {
                Some(serde_json::json!({ "record": record, "reason": reason }))
            }
            Self::IndexVersionMismatch { expected, found } => {
                Some(serde_json::json!({ "expected": expected, "found": found }))
            }
            Self::RerankTimeout { after_secs } => {
                Some(serde_json::json!({ "timeout_secs": after_secs }))
            }
            Self::RerankUnavailable { endpoint, .. } => {
                Some(serde_json::json!({ "endpoint": endpoint }))
            }
            Self::QueryFetch { url, .. } => Some(serde_json::json!({ "url": url })),
            Self::MissingConfig(key) => Some(serde_json::json!({ "config_key": key })),
            Self::PayloadTooLarge { size, limit } => {
                Some(serde_json::json!({ "size": size, "limit": limit }))
            }
            _ => None,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
///
/// Emitted in robot mode and as the body of HTTP error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "INDEX_NOT_LOADED")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 104)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error is potentially recoverable by the user
    pub recoverable: bool,

    /// Error category (e.g., "index", "rerank")
    pub category: String,
}

impl StructuredError {
    /// Create a new structured error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    /// Create a structured error from an [`ArError`].
    #[must_use]
    pub fn from_error(err: &ArError) -> Self {
        let code = err.code();
        let context = err.context();
        let suggestion = suggest_for_error(code, context.as_ref());

        Self {
            code,
            numeric_code: code.numeric(),
            message: err.to_string(),
            suggestion,
            context,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
        }
    }

    /// Add context to this error, regenerating the suggestion.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self.suggestion = suggest_for_error(self.code, self.context.as_ref());
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&ArError> for StructuredError {
    fn from(err: &ArError) -> Self {
        Self::from_error(err)
    }
}

/// Result type alias using ArError.
pub type Result<T> = std::result::Result<T, ArError>;
