//! Error types for invoice-dl
//!
//! This module provides comprehensive error handling for the library, including:
//! - Domain-specific error types (Credential, Provider, Export, etc.)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//! - Context information (account id, invoice id, upstream status, etc.)

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{AccountId, InvoiceId};

/// Result type alias for invoice-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for invoice-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "export.fetch_concurrency")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Caller credential rejected before any remote call
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Payment-provider call failed
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Export pipeline error
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Export denied by the per-account quota
    ///
    /// Not an exceptional failure: carries the account identifier so callers
    /// can route the user to an upgrade flow instead of a generic error page.
    #[error("export quota exhausted for account {account_id}")]
    QuotaExceeded {
        /// Account whose free allotment is used up
        account_id: AccountId,
        /// Export count at denial time
        export_count: i64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new exports
    #[error("shutdown in progress: not accepting new exports")]
    ShuttingDown,
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Caller-credential errors, decided before any remote call
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No credential header supplied
    #[error("no provider credential supplied")]
    Missing,

    /// Credential present but not shaped like a provider secret key
    #[error("malformed provider credential: {reason}")]
    Malformed {
        /// Why the credential was rejected
        reason: String,
    },

    /// Credential looked valid locally but the provider refused it
    #[error("provider rejected the supplied credential")]
    Rejected,
}

/// Errors from the credential-scoped provider API (listing, identity)
///
/// These are fatal to an export and are not retried.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure reaching the provider
    #[error("request to {endpoint} failed: {message}")]
    RequestFailed {
        /// Provider endpoint path (e.g., "/v1/invoices")
        endpoint: String,
        /// Underlying transport error message
        message: String,
    },

    /// Provider answered with a non-success status
    #[error("{endpoint} returned status {status}")]
    UnexpectedStatus {
        /// Provider endpoint path
        endpoint: String,
        /// HTTP status code the provider returned
        status: u16,
    },

    /// Provider response body could not be decoded
    #[error("invalid provider response: {message}")]
    InvalidResponse {
        /// What failed to decode
        message: String,
    },
}

/// Errors inside the export pipeline, after admission
#[derive(Debug, Error)]
pub enum ExportError {
    /// A single document fetch failed; the entry is skipped, the export continues
    #[error("document for invoice {invoice_id} unavailable: {reason}")]
    DocumentUnavailable {
        /// Invoice whose document could not be fetched
        invoice_id: InvoiceId,
        /// Transport or status failure description
        reason: String,
    },

    /// The caller's transmission channel closed mid-stream
    ///
    /// Headers are already sent by this point, so the only caller-visible
    /// signal is a truncated download. No quota credit is recorded.
    #[error("archive stream aborted by the receiving side")]
    StreamAborted,

    /// The archive writer itself failed
    #[error("archive assembly failed: {reason}")]
    ArchiveFailure {
        /// What broke inside the writer
        reason: String,
    },
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
/// It follows a standard format with machine-readable error codes,
/// human-readable messages, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "quota_exceeded",
///     "message": "export quota exhausted for account acct_1",
///     "details": {
///       "account_id": "acct_1",
///       "export_count": 1
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "quota_exceeded", "missing_credential")
    ///
    /// Clients can use this for programmatic error handling.
    pub code: String,

    /// Human-readable error message
    ///
    /// This is suitable for displaying to end users.
    pub message: String,

    /// Optional additional context about the error
    ///
    /// This can include fields like account_id, invoice_id, upstream status, etc.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,

            // 401 Unauthorized - Credential rejected before any remote call
            Error::Credential(_) => 401,

            // 403 Forbidden - Quota denial; distinguishable from every
            // other failure so clients can present an upgrade path
            Error::QuotaExceeded { .. } => 403,

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Export(ExportError::StreamAborted) => 500,
            Error::Export(ExportError::ArchiveFailure { .. }) => 500,

            // 502 Bad Gateway - Upstream provider errors
            Error::Provider(_) => 502,
            Error::Network(_) => 502,
            Error::Export(ExportError::DocumentUnavailable { .. }) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Credential(e) => match e {
                CredentialError::Missing => "missing_credential",
                CredentialError::Malformed { .. } => "malformed_credential",
                CredentialError::Rejected => "credential_rejected",
            },
            Error::Provider(e) => match e {
                ProviderError::RequestFailed { .. } => "provider_unreachable",
                ProviderError::UnexpectedStatus { .. } => "provider_status",
                ProviderError::InvalidResponse { .. } => "provider_response",
            },
            Error::Export(e) => match e {
                ExportError::DocumentUnavailable { .. } => "document_unavailable",
                ExportError::StreamAborted => "stream_aborted",
                ExportError::ArchiveFailure { .. } => "archive_failure",
            },
            Error::QuotaExceeded { .. } => "quota_exceeded",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::QuotaExceeded {
                account_id,
                export_count,
            } => Some(serde_json::json!({
                "account_id": account_id,
                "export_count": export_count,
            })),
            Error::Provider(ProviderError::UnexpectedStatus { endpoint, status }) => {
                Some(serde_json::json!({
                    "endpoint": endpoint,
                    "status": status,
                }))
            }
            Error::Provider(ProviderError::RequestFailed { endpoint, .. }) => {
                Some(serde_json::json!({
                    "endpoint": endpoint,
                }))
            }
            Error::Export(ExportError::DocumentUnavailable { invoice_id, .. }) => {
                Some(serde_json::json!({
                    "invoice_id": invoice_id,
                }))
            }
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
