use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::file_search::FileSearchError;
use crate::i18n::I18n;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("{0}")]
    FileSearch(#[from] FileSearchError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),

    #[error("Database lock poisoned")]
    Poisoned,
}

/// API error response (matches Axum's built-in JsonRejection format)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidRequest {
            message: message.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::FileSearch(e) => file_search_status(e),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized { .. } => "unauthorized",
            ServiceError::FileSearch(FileSearchError::MissingApiKey) => "api_key_missing",
            ServiceError::FileSearch(FileSearchError::Connection { .. }) => "upstream_connection",
            ServiceError::FileSearch(FileSearchError::Api { status: 404, .. }) => {
                "upstream_not_found"
            }
            ServiceError::FileSearch(FileSearchError::Api { .. }) => "upstream_error",
            ServiceError::FileSearch(FileSearchError::InvalidResponse { .. }) => {
                "upstream_invalid_response"
            }
            ServiceError::FileSearch(FileSearchError::OperationFailed { .. }) => {
                "operation_failed"
            }
            ServiceError::FileSearch(FileSearchError::OperationTimedOut { .. }) => {
                "operation_timed_out"
            }
            ServiceError::Database(_) => "database_error",
            ServiceError::FileTooLarge { .. } => "file_too_large",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }

    /// Get a user-friendly translated message
    pub fn user_message(&self, i18n: &I18n, locale: &str) -> String {
        match self {
            ServiceError::Unauthorized { .. } => i18n.get(locale, "error-unauthorized", None),
            ServiceError::FileSearch(FileSearchError::MissingApiKey) => {
                i18n.get(locale, "error-api-key-missing", None)
            }
            ServiceError::FileSearch(FileSearchError::OperationTimedOut { .. }) => {
                i18n.get(locale, "error-operation-timeout", None)
            }
            ServiceError::FileTooLarge { max, .. } => i18n.format(
                locale,
                "error-file-too-large",
                &[("max", &crate::file_search::format_bytes(*max))],
            ),
            ServiceError::Internal { .. } => i18n.get(locale, "error-internal", None),
            // Upstream messages are already human readable; pass them through
            _ => self.to_string(),
        }
    }

    /// Convert to an error response with i18n support
    pub fn into_response_with_i18n(self, i18n: &I18n, locale: &str) -> Response {
        let status = self.status_code();
        let response = ErrorResponse {
            message: self.user_message(i18n, locale),
            code: Some(self.error_code().to_string()),
        };

        (status, Json(response)).into_response()
    }
}

/// Upstream failures are reported as gateway errors unless the upstream
/// status is meaningful to the caller.
fn file_search_status(error: &FileSearchError) -> StatusCode {
    match error {
        FileSearchError::MissingApiKey => StatusCode::SERVICE_UNAVAILABLE,
        FileSearchError::Api { status, .. } => match *status {
            400 => StatusCode::BAD_REQUEST,
            404 => StatusCode::NOT_FOUND,
            409 => StatusCode::CONFLICT,
            429 => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_GATEWAY,
        },
        FileSearchError::OperationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FileSearchError::OperationTimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
        FileSearchError::Connection { .. } | FileSearchError::InvalidResponse { .. } => {
            StatusCode::BAD_GATEWAY
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Render an error and its `source()` chain on one line for logging
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Error wrapper with i18n support for API responses
pub struct I18nError {
    pub error: ServiceError,
    pub i18n: std::sync::Arc<I18n>,
    pub locale: String,
}

impl I18nError {
    pub fn new(error: ServiceError, i18n: std::sync::Arc<I18n>, locale: impl Into<String>) -> Self {
        Self {
            error,
            i18n,
            locale: locale.into(),
        }
    }
}

impl IntoResponse for I18nError {
    fn into_response(self) -> Response {
        self.error.into_response_with_i18n(&self.i18n, &self.locale)
    }
}
