//! Response-shape matching for the authentication endpoints
//!
//! The backend has answered login, refresh and 2FA verification in three
//! different layouts over time. Each layout is a pure matcher; the matchers
//! are tried in order and the first one that yields an access token wins.

use otherlink_core::{OAuthProvider, TwoFactorChallenge, User};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Tokens (and possibly the user) extracted from an auth response
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

pub type ShapeMatcher = fn(&Value) -> Option<TokenGrant>;

/// Accepted layouts, in priority order
pub const GRANT_SHAPES: &[ShapeMatcher] = &[nested_data_tokens, tokens_object, flat_camel_case];

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn parse_user(value: Option<&Value>) -> Option<User> {
    value
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// `{ data: { tokens: { access_token, refresh_token }, user } }`
pub fn nested_data_tokens(body: &Value) -> Option<TokenGrant> {
    let data = body.get("data")?;
    let tokens = data.get("tokens")?;
    Some(TokenGrant {
        access_token: non_empty_str(tokens, "access_token")?.to_string(),
        refresh_token: non_empty_str(tokens, "refresh_token").map(String::from),
        user: parse_user(data.get("user")),
    })
}

/// `{ tokens: { access_token | access, refresh_token | refresh }, user }`
pub fn tokens_object(body: &Value) -> Option<TokenGrant> {
    let tokens = body.get("tokens")?;
    let access = non_empty_str(tokens, "access_token").or_else(|| non_empty_str(tokens, "access"))?;
    let refresh =
        non_empty_str(tokens, "refresh_token").or_else(|| non_empty_str(tokens, "refresh"));
    Some(TokenGrant {
        access_token: access.to_string(),
        refresh_token: refresh.map(String::from),
        user: parse_user(body.get("user")),
    })
}

/// `{ accessToken, refreshToken, user }`
pub fn flat_camel_case(body: &Value) -> Option<TokenGrant> {
    Some(TokenGrant {
        access_token: non_empty_str(body, "accessToken")?.to_string(),
        refresh_token: non_empty_str(body, "refreshToken").map(String::from),
        user: parse_user(body.get("user")),
    })
}

/// First grant carrying an access token (refresh responses)
pub fn extract_grant(body: &Value) -> Option<TokenGrant> {
    GRANT_SHAPES.iter().find_map(|matcher| matcher(body))
}

/// First grant carrying both tokens (login, 2FA verification, OAuth)
pub fn extract_token_pair(body: &Value) -> Option<TokenGrant> {
    GRANT_SHAPES
        .iter()
        .filter_map(|matcher| matcher(body))
        .find(|grant| grant.refresh_token.is_some())
}

/// User record from a validation response: `data.user`, `user`, or the body itself
pub fn extract_user(body: &Value) -> Option<User> {
    parse_user(body.get("data").and_then(|d| d.get("user")))
        .or_else(|| parse_user(body.get("user")))
        .or_else(|| parse_user(Some(body)))
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty() && s != "false",
        _ => false,
    }
}

/// Two-factor challenge, looked up under `data` first and then at the top level
pub fn two_factor_challenge(body: &Value) -> Option<TwoFactorChallenge> {
    [body.get("data"), Some(body)]
        .into_iter()
        .flatten()
        .find(|scope| truthy(scope.get("two_factor_required")))
        .and_then(|scope| serde_json::from_value(scope.clone()).ok())
}

/// Signal that an OAuth sign-in collides with an existing password account
#[derive(Debug, Clone, PartialEq)]
pub struct LinkingSignal {
    pub existing_email: Option<String>,
}

pub fn account_linking(body: &Value) -> Option<LinkingSignal> {
    [Some(body), body.get("data")]
        .into_iter()
        .flatten()
        .find(|scope| {
            truthy(scope.get("requires_linking")) || truthy(scope.get("requiresLinking"))
        })
        .map(|scope| LinkingSignal {
            existing_email: non_empty_str(scope, "existing_email")
                .or_else(|| non_empty_str(scope, "existingEmail"))
                .map(String::from),
        })
}

/// Provider named in a linking signal, when the backend echoes it
pub fn linking_provider(body: &Value) -> Option<OAuthProvider> {
    [Some(body), body.get("data")]
        .into_iter()
        .flatten()
        .find_map(|scope| non_empty_str(scope, "provider"))
        .and_then(|p| p.parse().ok())
}

/// `expires_in` of a resend response, top level or under `data`
pub fn expires_in(body: &Value) -> Option<u64> {
    body.get("expires_in")
        .or_else(|| body.get("data").and_then(|d| d.get("expires_in")))
        .and_then(Value::as_u64)
}

/// `status` as sent by list/detail endpoints: a boolean or a word like "success"
fn status_ok<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "success" | "ok" | "true"),
        other => truthy(other.as_ref()),
    })
}

/// `{ status, data, message }` wrapper of the resource endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
pub struct Envelope<T> {
    #[serde(default = "default_true", deserialize_with = "status_ok")]
    pub status: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_true() -> bool {
    true
}

impl<T> Envelope<T> {
    /// Data of a successful envelope
    pub fn into_data(self) -> Option<T> {
        if self.status { self.data } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_json() -> Value {
        json!({"id": 1, "username": "testuser", "roles": [{"name": "admin", "permissions": []}]})
    }

    #[test]
    fn test_nested_shape() {
        let body = json!({"data": {"tokens": {"access_token": "a", "refresh_token": "r"}, "user": user_json()}});
        let grant = extract_token_pair(&body).unwrap();
        assert_eq!(grant.access_token, "a");
        assert_eq!(grant.refresh_token.as_deref(), Some("r"));
        assert_eq!(grant.user.unwrap().username.as_deref(), Some("testuser"));
    }

    #[test]
    fn test_tokens_object_short_names() {
        let body = json!({"tokens": {"access": "a", "refresh": "r"}, "user": user_json()});
        let grant = extract_token_pair(&body).unwrap();
        assert_eq!(grant.access_token, "a");
        assert_eq!(grant.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn test_flat_shape() {
        let body = json!({"accessToken": "a", "refreshToken": "r", "user": user_json()});
        let grant = extract_token_pair(&body).unwrap();
        assert_eq!(grant.access_token, "a");
        assert!(grant.user.is_some());
    }

    #[test]
    fn test_earlier_shape_wins() {
        let body = json!({
            "data": {"tokens": {"access_token": "nested", "refresh_token": "r1"}},
            "accessToken": "flat",
            "refreshToken": "r2"
        });
        assert_eq!(extract_grant(&body).unwrap().access_token, "nested");
    }

    #[test]
    fn test_pair_requires_refresh_token() {
        let body = json!({"accessToken": "a", "user": user_json()});
        assert!(extract_token_pair(&body).is_none());
        let grant = extract_grant(&body).unwrap();
        assert_eq!(grant.access_token, "a");
        assert!(grant.refresh_token.is_none());
    }

    #[test]
    fn test_no_tokens() {
        assert!(extract_grant(&json!({"message": "ok"})).is_none());
        assert!(extract_grant(&Value::Null).is_none());
        assert!(extract_grant(&json!({"tokens": {"access_token": ""}})).is_none());
    }

    #[test]
    fn test_extract_user_locations() {
        assert!(extract_user(&json!({"data": {"user": user_json()}})).is_some());
        assert!(extract_user(&json!({"user": user_json()})).is_some());
        assert!(extract_user(&user_json()).is_some());
        assert!(extract_user(&json!({"valid": true})).is_none());
        assert!(extract_user(&Value::Null).is_none());
    }

    #[test]
    fn test_two_factor_under_data_or_top_level() {
        let nested = json!({"data": {"two_factor_required": true, "session_id": "s1", "expires_in": 300}});
        let challenge = two_factor_challenge(&nested).unwrap();
        assert_eq!(challenge.session_id, "s1");
        assert_eq!(challenge.expires_in, 300);

        let top = json!({"two_factor_required": true, "session_id": "s2"});
        assert_eq!(two_factor_challenge(&top).unwrap().expires_in, 600);

        let off = json!({"two_factor_required": false, "session_id": "s3"});
        assert!(two_factor_challenge(&off).is_none());
    }

    #[test]
    fn test_account_linking_signal() {
        let body = json!({"requiresLinking": true, "existingEmail": "a@b.c"});
        assert_eq!(
            account_linking(&body).unwrap().existing_email.as_deref(),
            Some("a@b.c")
        );
        let nested = json!({"data": {"requires_linking": true, "existing_email": "x@y.z", "provider": "google"}});
        assert!(account_linking(&nested).is_some());
        assert_eq!(linking_provider(&nested), Some(OAuthProvider::Google));
        assert!(account_linking(&json!({"status": true})).is_none());
    }

    #[test]
    fn test_envelope_status_forms() {
        let ok: Envelope<Value> = serde_json::from_value(json!({"status": "success", "data": {"a": 1}})).unwrap();
        assert!(ok.status);
        assert_eq!(ok.into_data().unwrap()["a"], 1);

        let failed: Envelope<Value> =
            serde_json::from_value(json!({"status": false, "data": {"a": 1}, "message": "nope"})).unwrap();
        assert!(failed.into_data().is_none());

        let bare: Envelope<Value> = serde_json::from_value(json!({"data": []})).unwrap();
        assert!(bare.status);
    }
}
