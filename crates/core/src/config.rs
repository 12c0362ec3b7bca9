//! Client configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML/YAML file, then `OTHERLINK__SECTION__KEY` environment variables.

use crate::error::CoreResult;
use crate::types::OAuthProvider;
use crate::validation::{ValidateConfig, validators};
use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const ENV_PREFIX: &str = "OTHERLINK";

/// Which backend the client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    #[default]
    Real,
    Mock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub mode: ApiMode,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            mode: ApiMode::Real,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ApiConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub hosted_domain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppleConfig {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub team_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub google: GoogleConfig,
    pub apple: AppleConfig,
}

/// Deployment templates leave unset ids as an empty string or `"null"`
fn is_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        let v = v.trim();
        !v.is_empty() && v != "null"
    })
}

impl OAuthConfig {
    pub fn is_configured(&self, provider: OAuthProvider) -> bool {
        match provider {
            OAuthProvider::Google => is_set(self.google.client_id.as_deref()),
            OAuthProvider::Apple => is_set(self.apple.client_id.as_deref()),
        }
    }

    pub fn configured_providers(&self) -> Vec<OAuthProvider> {
        [OAuthProvider::Google, OAuthProvider::Apple]
            .into_iter()
            .filter(|p| self.is_configured(*p))
            .collect()
    }
}

/// Behaviour of the in-process mock backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    pub simulate_delay: bool,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Probability in `[0, 1]` that a request fails with a 500
    pub failure_rate: f64,
    pub bind: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            simulate_delay: true,
            min_delay_ms: 500,
            max_delay_ms: 1500,
            failure_rate: 0.1,
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

impl MockConfig {
    /// Deterministic settings: no delay and no injected failures
    pub fn deterministic() -> Self {
        Self {
            simulate_delay: false,
            failure_rate: 0.0,
            bind: "127.0.0.1:0".to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub oauth: OAuthConfig,
    pub mock: MockConfig,
}

impl ClientConfig {
    /// Load configuration with defaults, an optional file and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed, a value has the wrong
    /// type, or the merged configuration fails validation
    pub fn load(file: Option<&std::path::Path>) -> CoreResult<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("api.mode", "real")?
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("api.timeout_ms", defaults.api.timeout_ms)?
            .set_default("mock.simulate_delay", defaults.mock.simulate_delay)?
            .set_default("mock.min_delay_ms", defaults.mock.min_delay_ms)?
            .set_default("mock.max_delay_ms", defaults.mock.max_delay_ms)?
            .set_default("mock.failure_rate", defaults.mock.failure_rate)?
            .set_default("mock.bind", defaults.mock.bind)?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

impl ValidateConfig for ClientConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validators::validate_url(&self.api.base_url, "api.base_url")?;
        validators::validate_range(self.api.timeout_ms, 1, 600_000, "api.timeout_ms")?;
        validators::validate_range(self.mock.failure_rate, 0.0, 1.0, "mock.failure_rate")?;
        validators::validate_not_empty(&self.mock.bind, "mock.bind")?;
        if self.mock.min_delay_ms > self.mock.max_delay_ms {
            return Err(ConfigError::Message(
                "mock.min_delay_ms: must not exceed mock.max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use state_dir::StateDir;

#[cfg(not(target_arch = "wasm32"))]
mod state_dir {
    use directories::ProjectDirs;
    use std::path::PathBuf;
    use tracing::warn;

    /// Platform-specific configuration and state directories
    #[derive(Debug, Clone)]
    pub struct StateDir {
        project_dirs: Option<ProjectDirs>,
        override_dir: Option<PathBuf>,
    }

    impl Default for StateDir {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StateDir {
        pub fn new() -> Self {
            let project_dirs = ProjectDirs::from("app", "OtherLink", "otherlink");
            if project_dirs.is_none() {
                warn!("Failed to determine platform-specific directories, will use fallback");
            }
            Self {
                project_dirs,
                override_dir: None,
            }
        }

        /// Use `path` for both configuration and state (tests, portable installs)
        pub fn with_override(path: impl Into<PathBuf>) -> Self {
            Self {
                project_dirs: None,
                override_dir: Some(path.into()),
            }
        }

        pub fn config_dir(&self) -> PathBuf {
            if let Some(dir) = &self.override_dir {
                return dir.join("config");
            }
            match &self.project_dirs {
                Some(dirs) => dirs.config_dir().to_path_buf(),
                None => PathBuf::from("./config"),
            }
        }

        pub fn data_dir(&self) -> PathBuf {
            if let Some(dir) = &self.override_dir {
                return dir.join("data");
            }
            match &self.project_dirs {
                Some(dirs) => dirs.data_dir().to_path_buf(),
                None => PathBuf::from("./data"),
            }
        }

        /// Default location of the client configuration file
        pub fn config_file(&self) -> PathBuf {
            self.config_dir().join("client.toml")
        }

        /// File backing the durable session keys
        pub fn session_file(&self) -> PathBuf {
            self.data_dir().join("session.json")
        }

        pub fn log_file(&self) -> PathBuf {
            self.data_dir().join("cli.log")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_backend_conventions() {
        let config = ClientConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(config.api.mode, ApiMode::Real);
        assert_eq!(config.mock.min_delay_ms, 500);
        assert_eq!(config.mock.max_delay_ms, 1500);
        assert!((config.mock.failure_rate - 0.1).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            r#"
[api]
mode = "mock"
base_url = "https://api.example.com/api"
timeout_ms = 2500

[oauth.google]
client_id = "123.apps.googleusercontent.com"

[oauth.apple]
client_id = "null"
"#,
        )
        .unwrap();

        let config = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(config.api.mode, ApiMode::Mock);
        assert_eq!(config.api.base_url, "https://api.example.com/api");
        assert_eq!(config.api.timeout_ms, 2500);
        assert_eq!(config.oauth.configured_providers(), vec![OAuthProvider::Google]);
        // untouched sections keep their defaults
        assert_eq!(config.mock.max_delay_ms, 1500);
    }

    #[test]
    fn test_load_rejects_invalid_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "[api]\nbase_url = \"not a url\"\n").unwrap();

        assert!(ClientConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_provider_configuration() {
        let mut oauth = OAuthConfig::default();
        assert!(oauth.configured_providers().is_empty());

        oauth.apple.client_id = Some("   ".into());
        assert!(!oauth.is_configured(OAuthProvider::Apple));

        oauth.apple.client_id = Some("app.otherlink.signin".into());
        assert!(oauth.is_configured(OAuthProvider::Apple));
    }

    #[test]
    fn test_state_dir_override() {
        let dirs = StateDir::with_override("/tmp/otherlink-test");
        assert_eq!(
            dirs.session_file(),
            std::path::PathBuf::from("/tmp/otherlink-test/data/session.json")
        );
        assert_eq!(
            dirs.config_file(),
            std::path::PathBuf::from("/tmp/otherlink-test/config/client.toml")
        );
    }
}
