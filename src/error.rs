//! # HTTP Error Handling
//!
//! Custom error types for the HTTP surface and their conversion to JSON
//! error responses. Pipeline-internal failures never reach this module;
//! they are logged and absorbed per the gateway's defaulting rules.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Errors a request handler can surface to a client.
#[derive(Debug)]
pub enum AppError {
    /// The client sent invalid or malformed data.
    BadRequest(String),

    /// The persistence layer failed.
    Database(String),

    /// A backing analysis service failed or was unreachable.
    Upstream(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Upstream(msg) => write!(f, "Upstream service error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::Database(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                msg.clone(),
            ),
            // Enrollment failures are server-side faults from the client's
            // point of view: the user row exists, the clip never reached
            // the recognition model.
            AppError::Upstream(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "upstream_error",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

/// Shorthand for handler results.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_kinds() {
        assert_eq!(AppError::BadRequest("x".into()).error_response().status(), 400);
        assert_eq!(AppError::Database("x".into()).error_response().status(), 500);
        assert_eq!(AppError::Upstream("x".into()).error_response().status(), 500);
    }

    #[test]
    fn database_errors_convert() {
        let err: AppError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, AppError::Database(_)));
    }
}
