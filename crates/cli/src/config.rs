//! CLI configuration and the per-invocation client context

use anyhow::{Context as _, Result, bail};
use otherlink_core::{ApiMode, ClientConfig, FileStore, StateDir, TokenStore};
use otherlink_http::ApiClient;
use otherlink_mock::MockServer;
use otherlink_session::{OtherlinkWorkspace, SessionManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Load client configuration from `file`, or from the state directory's `client.toml`
pub fn load_client_config(state_dir: &StateDir, file: Option<&Path>) -> Result<ClientConfig> {
    let path = match file {
        Some(path) => {
            if !path.exists() {
                bail!("Configuration file {} does not exist", path.display());
            }
            path.to_path_buf()
        }
        None => state_dir.config_file(),
    };
    debug!(path = %path.display(), "Loading client configuration");
    ClientConfig::load(Some(&path))
        .with_context(|| format!("Invalid configuration in {}", path.display()))
}

/// Render `config` as a commented TOML file
pub fn render_config(config: &ClientConfig) -> String {
    let mode = match config.api.mode {
        ApiMode::Real => "real",
        ApiMode::Mock => "mock",
    };
    format!(
        r#"# OtherLink client configuration
# Every key can be overridden with OTHERLINK__SECTION__KEY, e.g. OTHERLINK__API__BASE_URL

[api]
# "real" talks to base_url, "mock" starts the built-in mock backend
mode = "{mode}"
base_url = "{base_url}"
timeout_ms = {timeout_ms}

[oauth.google]
# client_id = ""
# hosted_domain = ""

[oauth.apple]
# client_id = ""
# redirect_uri = ""
# team_id = ""

[mock]
simulate_delay = {simulate_delay}
min_delay_ms = {min_delay_ms}
max_delay_ms = {max_delay_ms}
failure_rate = {failure_rate:?}
bind = "{bind}"
"#,
        base_url = config.api.base_url,
        timeout_ms = config.api.timeout_ms,
        simulate_delay = config.mock.simulate_delay,
        min_delay_ms = config.mock.min_delay_ms,
        max_delay_ms = config.mock.max_delay_ms,
        failure_rate = config.mock.failure_rate,
        bind = config.mock.bind,
    )
}

/// Generate a default configuration file
pub fn generate_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_config(&ClientConfig::default()))?;
    Ok(())
}

/// Everything a command needs to talk to the backend
pub struct AppContext {
    pub config: ClientConfig,
    pub session: Arc<SessionManager>,
    pub workspace: Arc<OtherlinkWorkspace>,
    // Keeps the in-process backend alive in mock mode
    _mock: Option<MockServer>,
}

impl AppContext {
    pub async fn build(state_dir: &StateDir, config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = load_client_config(state_dir, config_file.as_deref())?;

        let mock = match config.api.mode {
            ApiMode::Real => None,
            ApiMode::Mock => {
                let server = MockServer::spawn(config.mock.clone())
                    .await
                    .with_context(|| format!("Failed to start mock backend on {}", config.mock.bind))?;
                info!(addr = %server.addr(), "Using in-process mock backend");
                config.api.base_url = server.base_url();
                Some(server)
            }
        };

        let store: Arc<dyn TokenStore> = Arc::new(
            FileStore::open(state_dir.session_file()).context("Failed to open session file")?,
        );
        let client = ApiClient::from_config(&config.api)?;
        let session = Arc::new(SessionManager::new(client.clone(), store.clone()));
        let workspace = Arc::new(OtherlinkWorkspace::new(client, store));

        Ok(Self {
            config,
            session,
            workspace,
            _mock: mock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("client.toml");

        generate_default_config(&path, false).unwrap();
        let loaded = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, ClientConfig::default());

        assert!(generate_default_config(&path, false).is_err());
        assert!(generate_default_config(&path, true).is_ok());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = StateDir::with_override(dir.path());
        let missing = dir.path().join("nope.toml");

        assert!(load_client_config(&state_dir, Some(&missing)).is_err());
        assert!(load_client_config(&state_dir, None).is_ok());
    }
}
