//! Error types for FleetCore services
//!
//! Provides the error taxonomy shared by the data-access core and the
//! HTTP surface:
//! - Entity-specific not-found signals kept apart from driver "no rows"
//! - Constraint violations surfaced as invalid input
//! - Tenant binding, pool exhaustion and cancellation failures
//! - HTTP status code mapping and structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidInput,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidToken,
    ExpiredToken,

    // Resource errors (4xxx)
    NotFound,

    // Conflict errors (5xxx)
    AlreadyUsed,
    Expired,

    // Rate limiting (6xxx)
    RateLimited,
    ResourceExhausted,

    // Database errors (7xxx)
    DatabaseError,
    ConnectFailed,
    TenantBindFailed,

    // Request lifecycle (8xxx)
    Cancelled,
    DeadlineExceeded,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidInput => 1002,

            ErrorCode::Unauthorized => 2001,
            ErrorCode::InvalidToken => 2002,
            ErrorCode::ExpiredToken => 2003,

            ErrorCode::NotFound => 4001,

            ErrorCode::AlreadyUsed => 5001,
            ErrorCode::Expired => 5002,

            ErrorCode::RateLimited => 6001,
            ErrorCode::ResourceExhausted => 6002,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectFailed => 7002,
            ErrorCode::TenantBindFailed => 7003,

            ErrorCode::Cancelled => 8001,
            ErrorCode::DeadlineExceeded => 8002,
            ErrorCode::UpstreamError => 8003,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        constraint: Option<String>,
    },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    // Resource errors
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Driver-level "no rows" before a repository names the entity
    #[error("No rows in result set")]
    NoRows,

    // Invitation lifecycle
    #[error("Invitation already used")]
    AlreadyUsed,

    #[error("Invitation expired")]
    Expired,

    // Rate limiting
    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Resource exhausted: {message}")]
    ResourceExhausted { message: String },

    // Database errors
    #[error("Failed to bind tenant {organization_id}: {source}")]
    TenantBindFailed {
        organization_id: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Database connection failed: {message}")]
    ConnectFailed { message: String },

    // Request lifecycle
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    // External service errors
    #[error("Upstream error: {message}")]
    Upstream { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Build an entity-specific not-found error
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidInput { .. } => ErrorCode::InvalidInput,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidToken => ErrorCode::InvalidToken,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::NotFound { .. } | AppError::NoRows => ErrorCode::NotFound,
            AppError::AlreadyUsed => ErrorCode::AlreadyUsed,
            AppError::Expired => ErrorCode::Expired,
            AppError::RateLimited => ErrorCode::RateLimited,
            AppError::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
            AppError::TenantBindFailed { .. } => ErrorCode::TenantBindFailed,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::ConnectFailed { .. } => ErrorCode::ConnectFailed,
            AppError::Cancelled => ErrorCode::Cancelled,
            AppError::DeadlineExceeded => ErrorCode::DeadlineExceeded,
            AppError::Upstream { .. } | AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } | AppError::Other(_) => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::InvalidInput { .. } => {
                StatusCode::BAD_REQUEST
            }

            // 401 Unauthorized
            AppError::Unauthorized { .. } | AppError::InvalidToken | AppError::ExpiredToken => {
                StatusCode::UNAUTHORIZED
            }

            // 404 Not Found
            AppError::NotFound { .. } | AppError::NoRows => StatusCode::NOT_FOUND,

            // 409 / 410 invitation lifecycle
            AppError::AlreadyUsed => StatusCode::CONFLICT,
            AppError::Expired => StatusCode::GONE,

            // 429 Too Many Requests
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            // 499 Client Closed Request
            AppError::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT)
            }

            // 502 Bad Gateway
            AppError::Upstream { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::ResourceExhausted { .. } | AppError::ConnectFailed { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            // 504 Gateway Timeout
            AppError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error
            AppError::TenantBindFailed { .. }
            | AppError::Database(_)
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Authentication failures get a generic body; the cause stays in the log.
    fn public_message(&self) -> String {
        match self {
            AppError::Unauthorized { .. } | AppError::InvalidToken | AppError::ExpiredToken => {
                "authentication failed".to_string()
            }
            AppError::TenantBindFailed { .. } | AppError::Database(_) | AppError::Other(_) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match err {
            sqlx::Error::RowNotFound => AppError::NoRows,
            sqlx::Error::PoolTimedOut => AppError::ResourceExhausted {
                message: "timed out acquiring a database connection".to_string(),
            },
            sqlx::Error::PoolClosed => AppError::ConnectFailed {
                message: "connection pool is closed".to_string(),
            },
            sqlx::Error::Io(e) => AppError::ConnectFailed {
                message: e.to_string(),
            },
            sqlx::Error::Tls(e) => AppError::ConnectFailed {
                message: e.to_string(),
            },
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => AppError::InvalidInput {
                    message: db_err.message().to_string(),
                    constraint: db_err.constraint().map(str::to_string),
                },
                _ => AppError::Database(sqlx::Error::Database(db_err)),
            },
            other => AppError::Database(other),
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message: self.public_message(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mapping() {
        let err = AppError::not_found("organization", "abc");
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "organization not found: abc");
    }

    #[test]
    fn test_row_not_found_becomes_no_rows() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::NoRows));
    }

    #[test]
    fn test_pool_timeout_is_resource_exhausted() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, AppError::ResourceExhausted { .. }));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_cancelled_uses_client_closed_status() {
        assert_eq!(AppError::Cancelled.status_code().as_u16(), 499);
        assert_eq!(AppError::DeadlineExceeded.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_invitation_errors() {
        assert_eq!(AppError::AlreadyUsed.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::Expired.status_code(), StatusCode::GONE);
        assert!(AppError::Expired.is_client_error());
    }

    #[test]
    fn test_auth_failures_hide_cause() {
        let err = AppError::Unauthorized {
            message: "signature mismatch".into(),
        };
        assert_eq!(err.public_message(), "authentication failed");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_tenant_bind_is_server_error() {
        let err = AppError::TenantBindFailed {
            organization_id: "org".into(),
            source: sqlx::Error::PoolClosed,
        };
        assert!(err.is_server_error());
        assert_eq!(err.code(), ErrorCode::TenantBindFailed);
    }
}
