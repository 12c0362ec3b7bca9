//! CLI commands
//!
//! Each subcommand stands in for one screen of the web client and is gated
//! the same way: guest-only forms refuse to run while signed in, account
//! screens require a valid session, and the page/link screens additionally
//! require at least one OtherLink.

mod account;
mod auth;
mod pages;

use anyhow::{Result, anyhow, bail};
use clap::Subcommand;
use otherlink_core::{MockConfig, StateDir, ValidationErrors};
use otherlink_http::ClientError;
use otherlink_mock::MockServer;
use otherlink_session::{Guard, GuardDecision, Route, RouteGuard, WorkspaceGuard};
use std::path::PathBuf;
use tracing::info;

use crate::config::{self, AppContext};

pub use account::{ProfileCommands, SettingsCommands};
pub use auth::OauthCommands;
pub use pages::{LinkCommands, OtherlinkCommands};

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with username and password
    Login {
        username: String,

        #[arg(long, env = "OTHERLINK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Six-digit code, to finish a two-factor sign-in in one step
        #[arg(long)]
        code: Option<String>,
    },

    /// Finish a two-factor sign-in started by `login`
    #[command(name = "verify-2fa")]
    VerifyTwoFactor {
        #[arg(long)]
        session_id: String,

        /// Six-digit code from the e-mail
        #[arg(long, required_unless_present = "resend")]
        code: Option<String>,

        /// Ask for a new code instead
        #[arg(long)]
        resend: bool,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Create an account
    Register {
        #[arg(long)]
        email: String,

        #[arg(long, env = "OTHERLINK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Defaults to --password
        #[arg(long)]
        confirm_password: Option<String>,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,
    },

    /// Request a password reset e-mail
    ForgotPassword { username: String },

    /// Set a new password with the token from a reset e-mail
    ResetPassword {
        token: String,

        #[arg(long, env = "OTHERLINK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Defaults to --password
        #[arg(long)]
        confirm_password: Option<String>,
    },

    /// Confirm an e-mail address with the token from the verification e-mail
    VerifyEmail { token: String },

    /// Sign in with an identity provider token
    Oauth {
        #[command(subcommand)]
        command: OauthCommands,
    },

    /// Account overview with the selected OtherLink
    Dashboard,

    /// Show or edit the profile
    Profile {
        #[command(subcommand)]
        command: Option<ProfileCommands>,
    },

    /// Password, preferences, sessions and account management
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Manage OtherLink pages
    Otherlinks {
        #[command(subcommand)]
        command: OtherlinkCommands,
    },

    /// Manage the links of the selected OtherLink
    Links {
        #[command(subcommand)]
        command: LinkCommands,
    },

    /// Show a public landing page
    Page { display_name: String },

    /// Check whether the signed-in user has a role or permission
    Access {
        /// Allowed if the user has any of these roles
        #[arg(long = "role", conflicts_with = "permissions")]
        roles: Vec<String>,

        /// Allowed if the user has any of these permissions
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },

    /// Run the mock backend until interrupted
    MockServer {
        /// Address to listen on (defaults to mock.bind)
        #[arg(long)]
        bind: Option<String>,

        /// Disable injected latency and failures
        #[arg(long)]
        deterministic: bool,
    },

    /// Client configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a default client.toml
    Init {
        /// Output file path (defaults to client.toml in the config directory)
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Commands {
    /// Commands that run until interrupted
    pub fn is_long_running(&self) -> bool {
        matches!(self, Commands::MockServer { .. })
    }

    pub async fn execute(self, state_dir: StateDir, config_file: Option<PathBuf>) -> Result<()> {
        match self {
            Commands::MockServer {
                bind,
                deterministic,
            } => return run_mock_server(&state_dir, config_file, bind, deterministic).await,
            Commands::Config { command } => return command.execute(&state_dir, config_file),
            _ => {}
        }

        let ctx = AppContext::build(&state_dir, config_file).await?;
        match self {
            Commands::Login {
                username,
                password,
                code,
            } => auth::login(&ctx, username, password, code).await,
            Commands::VerifyTwoFactor {
                session_id,
                code,
                resend,
            } => auth::verify_two_factor(&ctx, session_id, code, resend).await,
            Commands::Logout => auth::logout(&ctx).await,
            Commands::Register {
                email,
                password,
                confirm_password,
                first_name,
                last_name,
            } => {
                auth::register(&ctx, email, password, confirm_password, first_name, last_name)
                    .await
            }
            Commands::ForgotPassword { username } => auth::forgot_password(&ctx, &username).await,
            Commands::ResetPassword {
                token,
                password,
                confirm_password,
            } => auth::reset_password(&ctx, token, password, confirm_password).await,
            Commands::VerifyEmail { token } => auth::verify_email(&ctx, &token).await,
            Commands::Oauth { command } => command.execute(&ctx).await,
            Commands::Dashboard => account::dashboard(&ctx).await,
            Commands::Profile { command } => {
                command.unwrap_or(ProfileCommands::Show).execute(&ctx).await
            }
            Commands::Settings { command } => command.execute(&ctx).await,
            Commands::Otherlinks { command } => command.execute(&ctx).await,
            Commands::Links { command } => command.execute(&ctx).await,
            Commands::Page { display_name } => pages::landing_page(&ctx, &display_name).await,
            Commands::Access { roles, permissions } => {
                account::access(&ctx, roles, permissions).await
            }
            Commands::MockServer { .. } | Commands::Config { .. } => Ok(()),
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, state_dir: &StateDir, config_file: Option<PathBuf>) -> Result<()> {
        match self {
            ConfigCommands::Init { output, force } => {
                let path = output.unwrap_or_else(|| state_dir.config_file());
                config::generate_default_config(&path, force)?;
                println!("Wrote default configuration to {}", path.display());
                Ok(())
            }
            ConfigCommands::Show => {
                let config = config::load_client_config(state_dir, config_file.as_deref())?;
                print!("{}", config::render_config(&config));
                Ok(())
            }
        }
    }
}

async fn run_mock_server(
    state_dir: &StateDir,
    config_file: Option<PathBuf>,
    bind: Option<String>,
    deterministic: bool,
) -> Result<()> {
    let loaded = config::load_client_config(state_dir, config_file.as_deref())?.mock;
    let mut mock = if deterministic {
        MockConfig {
            bind: loaded.bind,
            ..MockConfig::deterministic()
        }
    } else {
        loaded
    };
    if let Some(bind) = bind {
        mock.bind = bind;
    }

    let server = MockServer::spawn(mock).await?;
    info!(addr = %server.addr(), "Mock backend started");
    println!("Mock backend listening at {}", server.base_url());
    println!("Seeded accounts: testuser / password123, admin / admin123");
    println!("Press Ctrl-C to stop");
    server.run_until_ctrl_c().await?;
    Ok(())
}

/// What to tell the user instead of navigating to `route`
fn redirect_hint(route: &Route) -> String {
    match route {
        Route::Login => "You are not signed in. Run `otherlink login` first.".to_string(),
        Route::Dashboard => {
            "You are already signed in. Run `otherlink logout` to switch accounts.".to_string()
        }
        Route::CreateOtherlink => {
            "You don't have an OtherLink yet. Create one with `otherlink otherlinks create`."
                .to_string()
        }
        other => format!("Continue at {other}"),
    }
}

/// Run a route guard and turn anything but `Allow` into an error
async fn require(ctx: &AppContext, guard: Guard) -> Result<()> {
    match RouteGuard::new(ctx.session.clone(), guard).decide().await {
        GuardDecision::Allow => Ok(()),
        GuardDecision::Redirect(route) => Err(anyhow!(redirect_hint(&route))),
        GuardDecision::Denied => {
            bail!("Access denied: your account lacks the required role or permission")
        }
    }
}

/// Signed-in user with at least one OtherLink (unless `current` is the create page)
async fn require_workspace(ctx: &AppContext, current: Route) -> Result<()> {
    require(ctx, Guard::Authenticated).await?;
    match WorkspaceGuard::new(ctx.workspace.clone())
        .check(&current)
        .await
        .map_err(|e| api_error(e, "Failed to load your OtherLinks"))?
    {
        GuardDecision::Allow => Ok(()),
        GuardDecision::Redirect(route) => Err(anyhow!(redirect_hint(&route))),
        GuardDecision::Denied => bail!("Access denied"),
    }
}

/// Field errors from a 4xx body, else the server message, else `fallback`
fn api_error(err: ClientError, fallback: &str) -> anyhow::Error {
    let fields = err.field_errors();
    if !fields.is_empty() {
        return anyhow!(fields);
    }
    form_message(&err, fallback)
}

fn form_message(err: &ClientError, fallback: &str) -> anyhow::Error {
    match err {
        ClientError::Http { .. } | ClientError::Rejected { .. } => anyhow!(
            err.server_message()
                .filter(|m| !m.is_empty())
                .unwrap_or(fallback)
                .to_string()
        ),
        other => anyhow!("{fallback}: {other}"),
    }
}

fn invalid_form(errors: ValidationErrors) -> anyhow::Error {
    anyhow!("Please fix the following: {errors}")
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
