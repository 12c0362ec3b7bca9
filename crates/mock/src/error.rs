//! Mock backend errors and their JSON rendering

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MockError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Expired or consumed one-time tokens
    #[error("{0}")]
    Gone(String),

    #[error("Simulated API failure - please try again")]
    SimulatedFailure,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: bool,
    pub error: String,
    pub message: String,
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            MockError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            MockError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            MockError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            MockError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            MockError::Gone(_) => (StatusCode::GONE, "gone"),
            MockError::SimulatedFailure => {
                (StatusCode::INTERNAL_SERVER_ERROR, "simulated_failure")
            }
        };

        let body = ErrorResponse {
            status: false,
            error: error_type.to_string(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type MockResult<T> = std::result::Result<T, MockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (MockError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (MockError::Gone("x".into()), StatusCode::GONE),
            (MockError::Conflict("x".into()), StatusCode::CONFLICT),
            (MockError::SimulatedFailure, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_message_is_bare() {
        let err = MockError::Unauthorized("Invalid username or password".into());
        assert_eq!(err.to_string(), "Invalid username or password");
    }
}
