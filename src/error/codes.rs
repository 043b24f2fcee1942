//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Catalog and index errors
//! - 2xx: Query and embedding errors
//! - 3xx: Config errors
//! - 4xx: Rerank errors
//! - 5xx: Network errors
//! - 6xx: Storage errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode and HTTP error bodies.
///
/// Each variant maps to a numeric code (e.g., `IndexNotLoaded` -> E104).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Catalog and index errors (1xx)
    // ========================================
    /// E101: Catalog input has invalid records
    CatalogInvalid,
    /// E102: Catalog file could not be read or decoded
    CatalogUnreadable,
    /// E103: A record could not be canonicalized or embedded during build
    IndexBuildFailed,
    /// E104: Serving was attempted before an index was loaded
    IndexNotLoaded,
    /// E105: Persisted index was built with a different rendering or embedder
    IndexVersionMismatch,
    /// E106: Persisted index is incomplete or inconsistent
    IndexCorrupted,

    // ========================================
    // Query and embedding errors (2xx)
    // ========================================
    /// E201: Text could not be embedded
    EmbeddingFailed,
    /// E202: Query is empty or otherwise unusable
    QueryInvalid,
    /// E203: URL query could not be fetched
    QueryFetchFailed,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E301: Config file not found
    ConfigNotFound,
    /// E302: Config file has invalid syntax or values
    ConfigInvalid,
    /// E303: Required config value is missing
    ConfigMissingRequired,

    // ========================================
    // Rerank errors (4xx)
    // ========================================
    /// E401: Generation output stayed malformed after the retry
    RerankFormat,
    /// E402: Generation call exceeded its deadline
    RerankTimeout,
    /// E403: Generation service could not be reached
    RerankUnavailable,

    // ========================================
    // Network errors (5xx)
    // ========================================
    /// E501: Malformed HTTP request received by the server
    HttpProtocol,
    /// E502: Server socket could not be bound or accepted
    NetworkUnreachable,
    /// E503: Request body exceeds the server's size limit
    HttpPayloadTooLarge,

    // ========================================
    // Storage errors (6xx)
    // ========================================
    /// E601: Database operation failed
    DatabaseError,
    /// E602: Serialization/deserialization failed
    SerializationError,
    /// E603: File operation failed
    IoError,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: Unexpected internal error
    InternalError,
    /// E902: Generic not found (catch-all)
    NotFound,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `IndexNotLoaded` -> 104).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::CatalogInvalid => 101,
            Self::CatalogUnreadable => 102,
            Self::IndexBuildFailed => 103,
            Self::IndexNotLoaded => 104,
            Self::IndexVersionMismatch => 105,
            Self::IndexCorrupted => 106,

            Self::EmbeddingFailed => 201,
            Self::QueryInvalid => 202,
            Self::QueryFetchFailed => 203,

            Self::ConfigNotFound => 301,
            Self::ConfigInvalid => 302,
            Self::ConfigMissingRequired => 303,

            Self::RerankFormat => 401,
            Self::RerankTimeout => 402,
            Self::RerankUnavailable => 403,

            Self::HttpProtocol => 501,
            Self::NetworkUnreachable => 502,
            Self::HttpPayloadTooLarge => 503,

            Self::DatabaseError => 601,
            Self::SerializationError => 602,
            Self::IoError => 603,

            Self::InternalError => 901,
            Self::NotFound => 902,
        }
    }

    /// Get the error code as a formatted string (e.g., "E104").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::CatalogInvalid => "Every catalog record needs a non-empty name and a unique id. Fix the record and rebuild",
            Self::CatalogUnreadable => "Check the catalog path and format (.json array, .jsonl, or .csv)",
            Self::IndexBuildFailed => "Fix the offending catalog record, then run `arec build` again",
            Self::IndexNotLoaded => "Run `arec build --catalog <file>` to create the index before serving",
            Self::IndexVersionMismatch => "The index was built with a different rendering or embedder. Rebuild it with `arec build`",
            Self::IndexCorrupted => "Delete the index file and rebuild it with `arec build`",

            Self::EmbeddingFailed => "Provide non-empty query text within the embedder token limit",
            Self::QueryInvalid => "Provide a non-empty query describing the role, skills, or time budget",
            Self::QueryFetchFailed => "Check the URL is reachable, or paste the job description text instead",

            Self::ConfigNotFound => "Create config.toml or pass --config <path>",
            Self::ConfigInvalid => "Run `arec config` to see current values. Check TOML syntax in config file",
            Self::ConfigMissingRequired => "Set the required value in config.toml or through its AREC_* environment variable",

            Self::RerankFormat => "The generation backend returned unusable output twice. Retry, or switch to generation.backend = \"heuristic\"",
            Self::RerankTimeout => "The generation service is slow. Retry later or raise generation.timeout_secs",
            Self::RerankUnavailable => "Check generation.endpoint and the API key environment variable",

            Self::HttpProtocol => "Send a well-formed HTTP/1.1 request with Content-Length and a JSON body",
            Self::NetworkUnreachable => "Check the bind address is free and allowed on this host",
            Self::HttpPayloadTooLarge => "Send a smaller request body; queries should be job descriptions, not documents",

            Self::DatabaseError => "The index database may be damaged. Rebuild it with `arec build`",
            Self::SerializationError => "The data format may be corrupted. Check input data for validity",
            Self::IoError => "File operation failed. Check path exists and permissions are correct",

            Self::InternalError => "An unexpected error occurred. Please report this issue with full error output",
            Self::NotFound => "The requested resource was not found. Check the path or identifier",
        }
    }

    /// Check if this error is potentially recoverable by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::CatalogInvalid
            | Self::CatalogUnreadable
            | Self::IndexBuildFailed
            | Self::IndexNotLoaded
            | Self::IndexVersionMismatch
            | Self::IndexCorrupted
            | Self::EmbeddingFailed
            | Self::QueryInvalid
            | Self::QueryFetchFailed
            | Self::ConfigNotFound
            | Self::ConfigInvalid
            | Self::ConfigMissingRequired
            | Self::RerankFormat
            | Self::RerankTimeout
            | Self::RerankUnavailable
            | Self::HttpProtocol
            | Self::NetworkUnreachable
            | Self::HttpPayloadTooLarge
            | Self::IoError
            | Self::NotFound => true,

            Self::DatabaseError | Self::SerializationError | Self::InternalError => false,
        }
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "index",
            2 => "query",
            3 => "config",
            4 => "rerank",
            5 => "network",
            6 => "storage",
            9 => "internal",
            _ => "unknown",
        }
    }

    /// HTTP status the serving layer reports for this code.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::EmbeddingFailed | Self::QueryInvalid | Self::HttpProtocol => 400,
            Self::QueryFetchFailed => 422,
            Self::HttpPayloadTooLarge => 413,
            Self::NotFound => 404,
            Self::IndexNotLoaded => 503,
            Self::RerankFormat | Self::RerankUnavailable => 502,
            Self::RerankTimeout => 504,
            _ => 500,
        }
    }

    /// Iterate over all error codes.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::CatalogInvalid,
            Self::CatalogUnreadable,
            Self::IndexBuildFailed,
            Self::IndexNotLoaded,
            Self::IndexVersionMismatch,
            Self::IndexCorrupted,
            Self::EmbeddingFailed,
            Self::QueryInvalid,
            Self::QueryFetchFailed,
            Self::ConfigNotFound,
            Self::ConfigInvalid,
            Self::ConfigMissingRequired,
            Self::RerankFormat,
            Self::RerankTimeout,
            Self::RerankUnavailable,
            Self::HttpProtocol,
            Self::NetworkUnreachable,
            Self::HttpPayloadTooLarge,
            Self::DatabaseError,
            Self::SerializationError,
            Self::IoError,
            Self::InternalError,
            Self::NotFound,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
