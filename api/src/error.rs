//! Error type bridging pipeline failures to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use encore_core::events::TicketResultEvent;
use encore_core::store::StoreError;
use serde::Serialize;
use std::fmt;

/// Application error type for the HTTP handlers.
///
/// Wraps pipeline failures into HTTP-friendly responses via Axum's
/// `IntoResponse`: a status, a stable machine-readable code and a
/// user-facing message.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach a source error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 404 Not Found error with a verbatim message.
    #[must_use]
    pub fn not_found_message(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            message.into(),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 408 Request Timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::REQUEST_TIMEOUT,
            message.into(),
            "TIMEOUT".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Map a worker-produced `failed` result onto an HTTP error.
    ///
    /// The mapping keys off stable substrings of the `error` field:
    /// capacity exhaustion and ownership mismatches are client errors, a
    /// missing entity is 404, anything else is a worker runtime failure.
    #[must_use]
    pub fn from_failed_result(result: &TicketResultEvent) -> Self {
        let error = result.error.as_deref().unwrap_or("unknown worker error");

        if error.contains("No available seats") || error.contains("does not belong") {
            Self::bad_request(error)
        } else if error.contains("not found") {
            Self::not_found_message(error)
        } else {
            Self::internal(error)
        }
    }

    /// The HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::internal("Storage error").with_source(anyhow::Error::new(err))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_core::events::{TicketOrderEvent, SOLD_OUT_ERROR};
    use encore_core::types::{ConcertId, TicketId, ZoneId};

    fn failed_result(error: &str) -> TicketResultEvent {
        let order = TicketOrderEvent::new(
            TicketId::new(),
            ZoneId::new("zon_1"),
            ConcertId::new("con_1"),
        );
        TicketResultEvent::failed(&order, error)
    }

    #[test]
    fn capacity_failures_map_to_400() {
        let err = AppError::from_failed_result(&failed_result(SOLD_OUT_ERROR));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("No available seats"));
    }

    #[test]
    fn ownership_mismatch_maps_to_400() {
        let err = AppError::from_failed_result(&failed_result(
            "Zone zon_1 does not belong to concert con_2",
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_entities_map_to_404() {
        let err = AppError::from_failed_result(&failed_result("Zone zon_9 not found"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn runtime_failures_map_to_500() {
        let err = AppError::from_failed_result(&failed_result("storage failure: timeout"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn timeout_is_408() {
        let err = AppError::timeout("Timed out waiting for the reservation result");
        assert_eq!(err.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
