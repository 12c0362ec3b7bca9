//! Client error types

use otherlink_core::ValidationErrors;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// The per-call deadline elapsed and the request was dropped
    #[error("Request timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned a non-2xx status
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        /// Parsed JSON error body, `Value::Null` when the body was not JSON
        body: Value,
    },

    /// 2xx envelope with `status: false`
    #[error("{}", .message.as_deref().unwrap_or("Request was rejected"))]
    Rejected { message: Option<String> },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from an HTTP status and the (possibly empty) error body
    pub fn from_status(status: reqwest::StatusCode, body: Value) -> Self {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .unwrap_or_else(|| {
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown Status")
                )
            });

        Self::Http {
            status: status.as_u16(),
            message,
            body,
        }
    }

    /// HTTP status, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// 400 or 410, the backend's answer to a stale reset or verification token
    pub fn is_expired_link(&self) -> bool {
        matches!(self.status(), Some(400) | Some(410))
    }

    /// Message the server put in the error body, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Http { body, .. } => body.get("message").and_then(Value::as_str),
            Self::Rejected { message } => message.as_deref(),
            _ => None,
        }
    }

    /// Field errors from the body's `errors` object
    pub fn field_errors(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let Self::Http { body, .. } = self
            && let Some(fields) = body.get("errors")
        {
            errors.merge_server(fields);
        }
        errors
    }
}
