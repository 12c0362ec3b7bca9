//! Session error types

use otherlink_core::CoreError;
use otherlink_http::ClientError;
use thiserror::Error;

/// Errors surfaced by the explicit session operations
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend call failed (transport, timeout or non-2xx status)
    #[error(transparent)]
    Api(#[from] ClientError),

    /// The backend answered 2xx but the body lacked what the flow needs
    #[error("Invalid response: {0}")]
    MalformedResponse(String),

    /// Durable token storage could not be written
    #[error("Storage error: {0}")]
    Storage(#[from] CoreError),

    #[error("Please enter a 6-digit verification code")]
    InvalidCode,

    #[error("Verification code has expired. Please sign in again.")]
    TwoFactorExpired,

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    pub fn malformed(what: impl Into<String>) -> Self {
        Self::MalformedResponse(what.into())
    }

    /// HTTP status of the underlying API failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(err) => err.status(),
            _ => None,
        }
    }

    /// Message the server put in the error body, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api(err) => err.server_message(),
            _ => None,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
