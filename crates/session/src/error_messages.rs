//! User-friendly error message mappings

use crate::error::AuthError;
use crate::guards::Route;
use otherlink_http::ClientError;

pub const INCORRECT_CREDENTIALS: &str = "Username or password is incorrect";
pub const INCORRECT_LINK_PASSWORD: &str = "Incorrect password. Please try again.";
pub const INVALID_TWO_FACTOR_CODE: &str = "Invalid verification code. Please try again.";

fn message_or(err: &AuthError, fallback: &str) -> String {
    match err {
        AuthError::Api(ClientError::Http { .. } | ClientError::Rejected { .. }) => err
            .server_message()
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback)
            .to_string(),
        other => other.to_string(),
    }
}

pub fn login_error(err: &AuthError) -> String {
    if err.status() == Some(401) {
        INCORRECT_CREDENTIALS.to_string()
    } else {
        message_or(err, "Login failed. Please try again.")
    }
}

pub fn two_factor_error(err: &AuthError) -> String {
    if err.status() == Some(400) {
        INVALID_TWO_FACTOR_CODE.to_string()
    } else {
        message_or(err, "Verification failed. Please try again.")
    }
}

pub fn account_linking_error(err: &AuthError) -> String {
    if err.status() == Some(401) {
        INCORRECT_LINK_PASSWORD.to_string()
    } else {
        message_or(err, "Failed to link account. Please try again.")
    }
}

/// Expired or already-used reset and verification links go to the expired-link page
pub fn reset_failure_route(err: &ClientError) -> Option<Route> {
    err.is_expired_link().then_some(Route::ResetExpired)
}

/// Generic mapping: server message, else `fallback`
pub fn user_message(err: &AuthError, fallback: &str) -> String {
    message_or(err, fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use otherlink_http::StatusCode;
    use serde_json::{Value, json};

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    fn http(code: u16, body: Value) -> AuthError {
        AuthError::Api(ClientError::from_status(status(code), body))
    }

    #[test]
    fn test_login_401() {
        let err = http(401, json!({"message": "Invalid username or password"}));
        assert_eq!(login_error(&err), INCORRECT_CREDENTIALS);
    }

    #[test]
    fn test_login_other_status_uses_server_message() {
        let err = http(423, json!({"message": "Account locked"}));
        assert_eq!(login_error(&err), "Account locked");
    }

    #[test]
    fn test_rejected_envelope_uses_server_message() {
        let err = AuthError::Api(ClientError::Rejected {
            message: Some("Display name is taken".into()),
        });
        assert_eq!(user_message(&err, "fallback"), "Display name is taken");

        let bare = AuthError::Api(ClientError::Rejected { message: None });
        assert_eq!(user_message(&bare, "fallback"), "fallback");
    }

    #[test]
    fn test_two_factor_400() {
        assert_eq!(two_factor_error(&http(400, Value::Null)), INVALID_TWO_FACTOR_CODE);
        assert_eq!(
            two_factor_error(&AuthError::InvalidCode),
            "Please enter a 6-digit verification code"
        );
    }

    #[test]
    fn test_linking_401() {
        assert_eq!(
            account_linking_error(&http(401, Value::Null)),
            INCORRECT_LINK_PASSWORD
        );
    }

    #[test]
    fn test_reset_routes() {
        let gone = ClientError::from_status(status(410), Value::Null);
        let bad = ClientError::from_status(status(400), Value::Null);
        let server = ClientError::from_status(status(500), Value::Null);
        assert_eq!(reset_failure_route(&gone), Some(Route::ResetExpired));
        assert_eq!(reset_failure_route(&bad), Some(Route::ResetExpired));
        assert_eq!(reset_failure_route(&server), None);
    }
}
