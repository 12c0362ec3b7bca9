use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Identifier issued by the backend.
///
/// The real backend uses UUID strings while the mock backend hands out
/// integers, so both forms deserialize into the same string-backed id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Signed(n) => Self(n.to_string()),
            Raw::Unsigned(n) => Self(n.to_string()),
        })
    }
}

/// Accepts RFC 3339 and `YYYY-MM-DD HH:MM:SS` timestamps; anything else is dropped.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(default)]
    pub id: Option<EntityId>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default)]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub permissions: Vec<Permission>,
}

/// Authenticated user record as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName")]
    pub last_name: Option<String>,
    #[serde(default, alias = "avatarUrl", alias = "avatar")]
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: Vec<Role>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preferences: Map<String, JsonValue>,
    #[serde(default, alias = "createdAt", deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "lastLogin", deserialize_with = "lenient_timestamp")]
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Check whether any of the user's roles is named `role`
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.name == role)
    }

    /// Check whether any of the user's roles grants `permission`
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions().any(|p| p.name == permission)
    }

    /// All permissions across roles, in role order (duplicates kept)
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.roles.iter().flat_map(|r| r.permissions.iter())
    }

    /// Name to greet the user with: full name, then username, then email
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        self.username
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Partial user record attached to a two-factor challenge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "firstName")]
    pub first_name: Option<String>,
}

fn default_two_factor_expiry() -> u64 {
    600
}

/// Server-issued challenge returned when a login needs an e-mailed code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoFactorChallenge {
    pub session_id: String,
    #[serde(default = "default_two_factor_expiry")]
    pub expires_in: u64,
    #[serde(default)]
    pub user: Option<UserSummary>,
}

/// OAuth identity providers the backend accepts ID tokens from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Apple,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Apple => "apple",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "apple" => Ok(Self::Apple),
            other => Err(format!("unknown OAuth provider: {other}")),
        }
    }
}

/// An OAuth sign-in whose e-mail already belongs to a password account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountLinking {
    pub provider: OAuthProvider,
    pub id_token: String,
    pub existing_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Account registration form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing)]
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Password reset form completed from an e-mailed token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PasswordReset {
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    #[serde(default, skip_serializing)]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// A "link in bio" page owned by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Otherlink {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub links_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

/// Create/update payload for an OtherLink page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OtherlinkDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    #[default]
    Url,
    Email,
    Phone,
    SocialMedia,
    Custom,
    #[serde(other)]
    Other,
}

impl LinkType {
    pub const ALL: [LinkType; 5] = [
        LinkType::Url,
        LinkType::Email,
        LinkType::Phone,
        LinkType::SocialMedia,
        LinkType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::SocialMedia => "social_media",
            Self::Custom => "custom",
            Self::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Url => "URL",
            Self::Email => "Email",
            Self::Phone => "Phone",
            Self::SocialMedia => "Social Media",
            Self::Custom => "Custom",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LinkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown link type: {s}"))
    }
}

/// A shortcode-backed link on an OtherLink page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: EntityId,
    #[serde(default)]
    pub otherlink_id: Option<EntityId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub shortcode: String,
    pub url: String,
    #[serde(default)]
    pub link_type: LinkType,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub clicks: Option<u64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create/update payload for a link
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub shortcode: String,
    pub url: String,
    pub link_type: LinkType,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default, alias = "totalPages")]
    pub total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mock_user() -> User {
        serde_json::from_value(json!({
            "id": 1,
            "username": "testuser",
            "email": "test@example.com",
            "firstName": "John",
            "lastName": "Doe",
            "roles": [
                {"id": 1, "name": "user", "permissions": [{"id": 1, "name": "profile.read"}]},
                {"id": 2, "name": "admin", "permissions": [{"id": 4, "name": "admin.access"}]}
            ],
            "preferences": {"darkMode": false},
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_user_accepts_numeric_id_and_camel_case() {
        let user = mock_user();
        assert_eq!(user.id.as_str(), "1");
        assert_eq!(user.first_name.as_deref(), Some("John"));
        assert_eq!(user.display_name(), "John Doe");
        assert!(user.created_at.is_some());
    }

    #[test]
    fn test_user_accepts_server_shape() {
        let user: User = serde_json::from_value(json!({
            "id": "7f1c1d9e-0000-4000-8000-000000000000",
            "email": "jane@example.com",
            "first_name": "Jane",
            "roles": null,
            "created_at": "2024-03-05 10:11:12"
        }))
        .unwrap();
        assert!(user.roles.is_empty());
        assert!(user.created_at.is_some());
        assert!(!user.has_role("admin"));
    }

    #[test]
    fn test_role_and_permission_queries() {
        let user = mock_user();
        assert!(user.has_role("admin"));
        assert!(!user.has_role("owner"));
        assert!(user.has_permission("admin.access"));
        assert!(!user.has_permission("system.config"));
    }

    #[test]
    fn test_unknown_link_type_is_other() {
        let t: LinkType = serde_json::from_value(json!("telegram")).unwrap();
        assert_eq!(t, LinkType::Other);
        assert_eq!("social_media".parse::<LinkType>().unwrap(), LinkType::SocialMedia);
    }

    #[test]
    fn test_challenge_defaults_expiry() {
        let c: TwoFactorChallenge =
            serde_json::from_value(json!({"session_id": "abc"})).unwrap();
        assert_eq!(c.expires_in, 600);
        assert!(c.user.is_none());
    }

    #[test]
    fn test_registration_serializes_camel_case_without_confirmation() {
        let reg = Registration {
            email: "a@b.c".into(),
            password: "secret123".into(),
            confirm_password: "secret123".into(),
            first_name: "A".into(),
            last_name: "B".into(),
        };
        let value = serde_json::to_value(&reg).unwrap();
        assert_eq!(value["firstName"], "A");
        assert!(value.get("confirmPassword").is_none());
    }
}
