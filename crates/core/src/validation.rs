//! Form and configuration validation
//!
//! Form checks mirror what the backend enforces so obvious mistakes are
//! reported before a request is made. Server-side field errors from a 4xx
//! body can be merged into the same [`ValidationErrors`] map.

use crate::types::{LinkDraft, OtherlinkDraft, PasswordChange, PasswordReset, Registration};
use config::ConfigError;
use rand::Rng;
use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

pub const MIN_NAME_LEN: usize = 3;
pub const MIN_SHORTCODE_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const TWO_FACTOR_CODE_LEN: usize = 6;
pub const GENERATED_SHORTCODE_LEN: usize = 8;

static SHORTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z0-9_-]+$").expect("valid shortcode regex"));
static DISPLAY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]+$").expect("valid display name regex"));
static HTTP_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://.+").expect("valid url regex"));

/// Field name → message, ordered by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for `field`; the first message for a field wins
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge a server `errors` object.
    ///
    /// Values may be plain strings or arrays of strings (the first one is
    /// kept). Server messages replace local ones for the same field.
    pub fn merge_server(&mut self, errors: &JsonValue) {
        let Some(map) = errors.as_object() else {
            return;
        };
        for (field, value) in map {
            let message = match value {
                JsonValue::String(s) => Some(s.clone()),
                JsonValue::Array(items) => items.iter().find_map(|v| v.as_str().map(String::from)),
                _ => None,
            };
            if let Some(message) = message {
                self.0.insert(field.clone(), message);
            }
        }
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Client-side form validation
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

impl Validate for LinkDraft {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.add("name", "Link name is required");
        } else if name.chars().count() < MIN_NAME_LEN {
            errors.add("name", "Link name must be at least 3 characters");
        }

        let shortcode = self.shortcode.trim();
        if shortcode.is_empty() {
            errors.add("shortcode", "Shortcode is required");
        } else if shortcode.chars().count() < MIN_SHORTCODE_LEN {
            errors.add("shortcode", "Shortcode must be at least 3 characters");
        } else if !SHORTCODE_RE.is_match(shortcode) {
            errors.add(
                "shortcode",
                "Shortcode can only contain letters, numbers, hyphens, and underscores",
            );
        }

        let url = self.url.trim();
        if url.is_empty() {
            errors.add("url", "URL is required");
        } else if !HTTP_URL_RE.is_match(url) {
            errors.add("url", "URL must start with http:// or https://");
        }

        errors.into_result()
    }
}

impl Validate for OtherlinkDraft {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.add("name", "Name is required");
        } else if name.chars().count() < MIN_NAME_LEN {
            errors.add("name", "Name must be at least 3 characters");
        }

        match self.display_name.as_deref().map(str::trim) {
            None | Some("") => errors.add("display_name", "Display name is required"),
            Some(display) if display.chars().count() < MIN_NAME_LEN => {
                errors.add("display_name", "Display name must be at least 3 characters")
            }
            Some(display) if !DISPLAY_NAME_RE.is_match(display) => errors.add(
                "display_name",
                "Display name can only contain lowercase letters, numbers, hyphens, and underscores",
            ),
            Some(_) => {}
        }

        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.add("description", "Description must be less than 1000 characters");
        }

        errors.into_result()
    }
}

fn check_password(errors: &mut ValidationErrors, field: &str, password: &str) {
    if password.is_empty() {
        errors.add(field, "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(field, "Password must be at least 8 characters long");
    }
}

fn check_confirmation(errors: &mut ValidationErrors, field: &str, password: &str, confirm: &str) {
    if confirm.is_empty() {
        errors.add(field, "Please confirm your password");
    } else if password != confirm {
        errors.add(field, "Passwords do not match");
    }
}

impl Validate for Registration {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.first_name.trim().is_empty() {
            errors.add("first_name", "First name is required");
        }
        if self.last_name.trim().is_empty() {
            errors.add("last_name", "Last name is required");
        }
        if self.email.trim().is_empty() {
            errors.add("email", "Email is required");
        } else if validators::validate_email(self.email.trim(), "email").is_err() {
            errors.add("email", "Please enter a valid email address");
        }
        check_password(&mut errors, "password", &self.password);
        check_confirmation(&mut errors, "confirm_password", &self.password, &self.confirm_password);

        errors.into_result()
    }
}

impl Validate for PasswordReset {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.token.trim().is_empty() {
            errors.add("token", "Reset token is missing");
        }
        check_password(&mut errors, "password", &self.password);
        check_confirmation(&mut errors, "password_confirm", &self.password, &self.password_confirm);
        errors.into_result()
    }
}

impl Validate for PasswordChange {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.current_password.is_empty() {
            errors.add("current_password", "Current password is required");
        }
        check_password(&mut errors, "new_password", &self.new_password);
        check_confirmation(
            &mut errors,
            "confirm_password",
            &self.new_password,
            &self.confirm_password,
        );
        errors.into_result()
    }
}

/// True for exactly six ASCII digits
pub fn is_valid_two_factor_code(code: &str) -> bool {
    code.len() == TWO_FACTOR_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

/// Random 8-character `[a-z0-9]` shortcode for offline suggestions
pub fn generate_shortcode() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..GENERATED_SHORTCODE_LEN)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Trait for validating configuration values
pub trait ValidateConfig {
    /// Returns Ok(()) if valid, or an error describing what's wrong
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Common validation helpers
pub mod validators {
    use config::ConfigError;

    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::Message(format!("{field}: cannot be empty")));
        }
        Ok(())
    }

    /// Validate an absolute http(s) URL
    pub fn validate_url(url: &str, field: &str) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| ConfigError::Message(format!("{field}: invalid URL - {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Message(format!(
                "{field}: URL must use http or https"
            )));
        }
        Ok(())
    }

    /// Validate email format (basic check)
    pub fn validate_email(email: &str, field: &str) -> Result<(), ConfigError> {
        let mut parts = email.split('@');
        let valid = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(local), Some(domain), None) if !local.is_empty() && domain.contains('.')
        );
        if !valid {
            return Err(ConfigError::Message(format!(
                "{field}: invalid email format"
            )));
        }
        Ok(())
    }

    /// Validate that a value is within range
    pub fn validate_range<T: PartialOrd + std::fmt::Display>(
        value: T,
        min: T,
        max: T,
        field: &str,
    ) -> Result<(), ConfigError> {
        if value < min || value > max {
            return Err(ConfigError::Message(format!(
                "{field}: must be between {min} and {max}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LinkType;
    use serde_json::json;

    fn link(name: &str, shortcode: &str, url: &str) -> LinkDraft {
        LinkDraft {
            name: name.into(),
            shortcode: shortcode.into(),
            url: url.into(),
            link_type: LinkType::Url,
            active: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_link_passes() {
        assert!(link("My site", "My-Site_1", "https://example.com").validate().is_ok());
    }

    #[test]
    fn test_link_field_errors() {
        let errors = link("ab", "a b c", "ftp://example.com").validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.get("name").unwrap().contains("3 characters"));
        assert!(errors.get("shortcode").unwrap().contains("letters, numbers"));
        assert!(errors.get("url").unwrap().contains("http://"));
    }

    #[test]
    fn test_otherlink_display_name_is_lowercase_only() {
        let draft = OtherlinkDraft {
            name: "My page".into(),
            display_name: Some("MyPage".into()),
            description: String::new(),
            active: true,
        };
        let errors = draft.validate().unwrap_err();
        assert!(errors.get("display_name").is_some());

        let draft = OtherlinkDraft {
            display_name: Some("my-page".into()),
            ..draft
        };
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_otherlink_description_limit() {
        let draft = OtherlinkDraft {
            name: "Page".into(),
            display_name: Some("page".into()),
            description: "x".repeat(MAX_DESCRIPTION_LEN + 1),
            active: true,
        };
        assert!(draft.validate().unwrap_err().get("description").is_some());
    }

    #[test]
    fn test_password_confirmation_must_match() {
        let reset = PasswordReset {
            token: "tok".into(),
            password: "password123".into(),
            password_confirm: "password124".into(),
        };
        let errors = reset.validate().unwrap_err();
        assert_eq!(errors.get("password_confirm"), Some("Passwords do not match"));
        assert!(errors.get("password").is_none());
    }

    #[test]
    fn test_registration_short_password() {
        let reg = Registration {
            email: "jane@example.com".into(),
            password: "short".into(),
            confirm_password: "short".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
        };
        let errors = reg.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.get("password").is_some());
    }

    #[test]
    fn test_two_factor_code() {
        assert!(is_valid_two_factor_code("012345"));
        assert!(!is_valid_two_factor_code("12345"));
        assert!(!is_valid_two_factor_code("12345a"));
        assert!(!is_valid_two_factor_code("١٢٣٤٥٦"));
    }

    #[test]
    fn test_generated_shortcode_shape() {
        let code = generate_shortcode();
        assert_eq!(code.len(), GENERATED_SHORTCODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_merge_server_errors() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "local");
        errors.merge_server(&json!({
            "name": ["Name already taken"],
            "shortcode": "Shortcode already exists",
            "ignored": 5
        }));
        assert_eq!(errors.get("name"), Some("Name already taken"));
        assert_eq!(errors.get("shortcode"), Some("Shortcode already exists"));
        assert!(errors.get("ignored").is_none());
        assert_eq!(
            errors.to_string(),
            "name: Name already taken; shortcode: Shortcode already exists"
        );
    }

    #[test]
    fn test_validators() {
        assert!(validators::validate_url("http://localhost:8000/api", "api.base_url").is_ok());
        assert!(validators::validate_url("ftp://host", "api.base_url").is_err());
        assert!(validators::validate_email("a@b.co", "email").is_ok());
        assert!(validators::validate_email("a@@b", "email").is_err());
        assert!(validators::validate_range(0.5, 0.0, 1.0, "rate").is_ok());
        assert!(validators::validate_range(2, 0, 1, "rate").is_err());
    }
}
