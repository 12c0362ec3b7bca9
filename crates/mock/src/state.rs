//! In-memory data behind the mock backend
//!
//! Seeded with two accounts (`testuser`/`password123` and `admin`/`admin123`).
//! Passwords are kept in plain text; nothing here is meant to be secure.

use crate::error::{MockError, MockResult};
use chrono::{DateTime, Duration, Utc};
use otherlink_core::{EntityId, Link, MockConfig, Otherlink, Permission, Role};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
pub const RESET_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockUser {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub roles: Vec<Role>,
    pub preferences: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl MockUser {
    /// Public JSON form, password omitted
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone)]
struct TokenRecord {
    user_id: u64,
    kind: TokenKind,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ResetRecord {
    user_id: u64,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OwnedOtherlink {
    pub owner_id: u64,
    pub record: Otherlink,
}

#[derive(Debug, Default)]
pub(crate) struct Store {
    /// Keyed by username
    pub(crate) users: BTreeMap<String, MockUser>,
    tokens: HashMap<String, TokenRecord>,
    reset_tokens: HashMap<String, ResetRecord>,
    pub(crate) otherlinks: Vec<OwnedOtherlink>,
    pub(crate) links: Vec<Link>,
}

impl Store {
    pub(crate) fn user_by_id(&self, id: u64) -> Option<&MockUser> {
        self.users.values().find(|u| u.id == id)
    }

    pub(crate) fn user_by_id_mut(&mut self, id: u64) -> Option<&mut MockUser> {
        self.users.values_mut().find(|u| u.id == id)
    }

    fn user_by_login(&self, login: &str) -> Option<&MockUser> {
        self.users
            .get(login)
            .or_else(|| self.users.values().find(|u| u.email == login))
    }
}

fn permission(id: u64, name: &str) -> Permission {
    Permission {
        id: Some(EntityId::from(id)),
        name: name.to_string(),
    }
}

fn role(id: u64, name: &str, permissions: Vec<Permission>) -> Role {
    Role {
        id: Some(EntityId::from(id)),
        name: name.to_string(),
        permissions,
    }
}

fn user_role() -> Role {
    role(
        1,
        "user",
        vec![permission(1, "profile.read"), permission(2, "profile.update")],
    )
}

fn preferences(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn seed_users(now: DateTime<Utc>) -> BTreeMap<String, MockUser> {
    let testuser = MockUser {
        id: 1,
        username: "testuser".into(),
        email: "test@example.com".into(),
        first_name: "John".into(),
        last_name: "Doe".into(),
        password: "password123".into(),
        avatar_url: None,
        roles: vec![
            user_role(),
            role(
                2,
                "admin",
                vec![permission(3, "user.manage"), permission(4, "admin.access")],
            ),
        ],
        preferences: preferences(json!({
            "darkMode": false,
            "emailNotifications": true,
            "showActivityFeed": true,
        })),
        created_at: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(now),
        last_login: Some(now),
    };

    let admin = MockUser {
        id: 2,
        username: "admin".into(),
        email: "admin@example.com".into(),
        first_name: "Jane".into(),
        last_name: "Admin".into(),
        password: "admin123".into(),
        avatar_url: None,
        roles: vec![role(
            2,
            "admin",
            vec![
                permission(3, "user.manage"),
                permission(4, "admin.access"),
                permission(5, "system.config"),
            ],
        )],
        preferences: preferences(json!({
            "darkMode": true,
            "emailNotifications": true,
            "showActivityFeed": false,
        })),
        created_at: DateTime::parse_from_rfc3339("2023-12-01T00:00:00Z")
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(now),
        last_login: Some(now - Duration::days(1)),
    };

    [testuser, admin]
        .into_iter()
        .map(|u| (u.username.clone(), u))
        .collect()
}

/// New-account fields accepted by `POST /register`
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub username: Option<String>,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

struct Inner {
    config: MockConfig,
    store: RwLock<Store>,
    next_id: AtomicU64,
    token_seq: AtomicU64,
}

/// Shared handle to the mock backend's data
#[derive(Clone)]
pub struct MockState {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockState")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl MockState {
    /// State with the two seeded accounts and no pages
    pub fn seeded(config: MockConfig) -> Self {
        let store = Store {
            users: seed_users(Utc::now()),
            ..Store::default()
        };
        Self {
            inner: Arc::new(Inner {
                config,
                store: RwLock::new(store),
                next_id: AtomicU64::new(100),
                token_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &MockConfig {
        &self.inner.config
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, Store> {
        self.inner.store.read().await
    }

    pub(crate) async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, Store> {
        self.inner.store.write().await
    }

    fn token(&self, kind: &str, user_id: u64, now: DateTime<Utc>) -> String {
        let seq = self.inner.token_seq.fetch_add(1, Ordering::SeqCst);
        format!("mock-{kind}-token-{user_id}-{}-{seq}", now.timestamp_millis())
    }

    fn insert_token(store: &mut Store, token: &str, user_id: u64, kind: TokenKind, ttl: i64) {
        store.tokens.insert(
            token.to_string(),
            TokenRecord {
                user_id,
                kind,
                expires_at: Utc::now() + Duration::seconds(ttl),
            },
        );
    }

    fn issue_access(&self, store: &mut Store, user_id: u64) -> String {
        let access = self.token("access", user_id, Utc::now());
        Self::insert_token(store, &access, user_id, TokenKind::Access, ACCESS_TOKEN_TTL_SECS);
        access
    }

    fn issue_pair(&self, store: &mut Store, user_id: u64) -> (String, String) {
        let access = self.issue_access(store, user_id);
        let refresh = self.token("refresh", user_id, Utc::now());
        Self::insert_token(store, &refresh, user_id, TokenKind::Refresh, REFRESH_TOKEN_TTL_SECS);
        (access, refresh)
    }

    fn lookup(store: &Store, token: &str, kind: TokenKind) -> Option<u64> {
        store
            .tokens
            .get(token)
            .filter(|r| r.kind == kind && r.expires_at > Utc::now())
            .map(|r| r.user_id)
    }

    /// `{accessToken, refreshToken, user}` for valid credentials
    pub async fn login(&self, username: &str, password: &str) -> MockResult<Value> {
        let mut store = self.write().await;
        let user_id = store
            .users
            .get(username)
            .filter(|u| u.password == password)
            .map(|u| u.id)
            .ok_or_else(|| MockError::Unauthorized("Invalid username or password".into()))?;

        let (access, refresh) = self.issue_pair(&mut store, user_id);
        let user = store
            .user_by_id_mut(user_id)
            .ok_or_else(|| MockError::NotFound("User not found".into()))?;
        user.last_login = Some(Utc::now());

        Ok(json!({
            "accessToken": access,
            "refreshToken": refresh,
            "user": user.to_json(),
        }))
    }

    pub async fn register(&self, account: NewAccount) -> MockResult<Value> {
        let mut store = self.write().await;
        let username = account
            .username
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| account.email.clone());

        if store.users.contains_key(&username) {
            return Err(MockError::Conflict(
                "User already exists with this username".into(),
            ));
        }
        if store.users.values().any(|u| u.email == account.email) {
            return Err(MockError::Conflict(
                "User already exists with this email".into(),
            ));
        }

        let id = self.next_id();
        let user = MockUser {
            id,
            username: username.clone(),
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            password: account.password,
            avatar_url: None,
            roles: vec![user_role()],
            preferences: preferences(json!({
                "darkMode": false,
                "emailNotifications": true,
                "showActivityFeed": true,
            })),
            created_at: Utc::now(),
            last_login: None,
        };
        store.users.insert(username, user);

        Ok(json!({ "message": "User registered successfully", "userId": id }))
    }

    /// Resolve a bearer access token to its user
    pub async fn authenticate(&self, access_token: &str) -> MockResult<MockUser> {
        let store = self.read().await;
        Self::lookup(&store, access_token, TokenKind::Access)
            .and_then(|id| store.user_by_id(id).cloned())
            .ok_or_else(|| MockError::Unauthorized("Token is invalid or expired".into()))
    }

    /// New access token for a live refresh token; the refresh token is not rotated
    pub async fn refresh(&self, refresh_token: &str) -> MockResult<Value> {
        let mut store = self.write().await;
        let user_id = Self::lookup(&store, refresh_token, TokenKind::Refresh).ok_or_else(|| {
            MockError::Unauthorized("Refresh token is invalid or expired".into())
        })?;
        let user = store
            .user_by_id(user_id)
            .map(MockUser::to_json)
            .ok_or_else(|| MockError::NotFound("User not found".into()))?;
        let access = self.issue_access(&mut store, user_id);

        Ok(json!({ "accessToken": access, "user": user }))
    }

    pub async fn logout(&self, refresh_token: &str) {
        self.write().await.tokens.remove(refresh_token);
    }

    /// Reset token for a known username or e-mail; unknown logins get the same message
    pub async fn forgot_password(&self, login: &str) -> Value {
        let mut store = self.write().await;
        let Some(user_id) = store.user_by_login(login).map(|u| u.id) else {
            return json!({
                "message": "If an account exists with this email, you will receive reset instructions."
            });
        };

        let token = format!("reset-{}", uuid::Uuid::new_v4().simple());
        store.reset_tokens.insert(
            token.clone(),
            ResetRecord {
                user_id,
                expires_at: Utc::now() + Duration::seconds(RESET_TOKEN_TTL_SECS),
            },
        );
        json!({
            "message": "Password reset instructions sent to your email",
            "resetToken": token,
        })
    }

    fn live_reset(store: &Store, token: &str) -> MockResult<u64> {
        store
            .reset_tokens
            .get(token)
            .filter(|r| r.expires_at > Utc::now())
            .map(|r| r.user_id)
            .ok_or_else(|| MockError::Gone("Reset token is invalid or expired".into()))
    }

    pub async fn validate_reset_token(&self, token: &str) -> MockResult<Value> {
        let store = self.read().await;
        Self::live_reset(&store, token)?;
        Ok(json!({ "valid": true }))
    }

    /// Consume a reset token and set the new password
    pub async fn reset_password(&self, token: &str, password: &str) -> MockResult<Value> {
        let mut store = self.write().await;
        let user_id = Self::live_reset(&store, token)?;
        let user = store
            .user_by_id_mut(user_id)
            .ok_or_else(|| MockError::NotFound("User not found".into()))?;
        user.password = password.to_string();
        store.reset_tokens.remove(token);

        Ok(json!({ "message": "Password reset successfully" }))
    }

    /// Insert a reset token for `username` with an explicit expiry
    pub async fn insert_reset_token(
        &self,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Option<String> {
        let mut store = self.write().await;
        let user_id = store.users.get(username)?.id;
        let token = format!("reset-{}", uuid::Uuid::new_v4().simple());
        store
            .reset_tokens
            .insert(token.clone(), ResetRecord { user_id, expires_at });
        Some(token)
    }

    /// Make every issued access token stale; refresh tokens stay valid
    pub async fn expire_access_tokens(&self) {
        let past = Utc::now() - Duration::seconds(1);
        let mut store = self.write().await;
        for record in store.tokens.values_mut() {
            if record.kind == TokenKind::Access {
                record.expires_at = past;
            }
        }
    }

    /// Make every issued token stale
    pub async fn expire_all_tokens(&self) {
        let past = Utc::now() - Duration::seconds(1);
        for record in self.write().await.tokens.values_mut() {
            record.expires_at = past;
        }
    }

    pub async fn user(&self, username: &str) -> Option<MockUser> {
        self.read().await.users.get(username).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> MockState {
        MockState::seeded(MockConfig::deterministic())
    }

    #[tokio::test]
    async fn test_login_issues_distinct_tokens() {
        let state = state();
        let first = state.login("testuser", "password123").await.unwrap();
        let second = state.login("testuser", "password123").await.unwrap();

        assert_ne!(first["accessToken"], second["accessToken"]);
        assert!(
            first["accessToken"]
                .as_str()
                .unwrap()
                .starts_with("mock-access-token-1-")
        );
        assert_eq!(first["user"]["firstName"], "John");
        assert!(first["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn test_refresh_token_cannot_authenticate() {
        let state = state();
        let body = state.login("admin", "admin123").await.unwrap();
        let refresh = body["refreshToken"].as_str().unwrap();

        assert!(state.authenticate(refresh).await.is_err());
        assert!(state.refresh(refresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_register_conflicts() {
        let state = state();
        let taken_email = NewAccount {
            email: "test@example.com".into(),
            password: "password123".into(),
            ..NewAccount::default()
        };
        let err = state.register(taken_email).await.unwrap_err();
        assert_eq!(err.to_string(), "User already exists with this email");

        let taken_name = NewAccount {
            username: Some("admin".into()),
            email: "new@example.com".into(),
            ..NewAccount::default()
        };
        let err = state.register(taken_name).await.unwrap_err();
        assert_eq!(err.to_string(), "User already exists with this username");
    }

    #[tokio::test]
    async fn test_reset_token_single_use() {
        let state = state();
        let body = state.forgot_password("test@example.com").await;
        let token = body["resetToken"].as_str().unwrap().to_string();

        state.reset_password(&token, "newpassword1").await.unwrap();
        assert!(matches!(
            state.reset_password(&token, "again12345").await,
            Err(MockError::Gone(_))
        ));
        assert!(state.login("testuser", "newpassword1").await.is_ok());
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_login() {
        let body = state().forgot_password("nobody").await;
        assert!(body.get("resetToken").is_none());
    }
}
