//! Dashboard, profile and settings commands

use anyhow::{Result, anyhow, bail};
use clap::{Subcommand, ValueEnum};
use otherlink_core::{PasswordChange, ProfileUpdate, User, Validate};
use otherlink_http::LinkService;
use otherlink_session::error_messages::user_message;
use otherlink_session::{Guard, Route};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use super::{api_error, form_message, invalid_form, print_json, require, require_workspace};
use crate::config::AppContext;

const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;
const RECENT_LINKS: u32 = 5;

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show the profile
    Show,

    /// Change name fields
    Update {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,
    },

    /// Upload a JPEG, PNG or WebP avatar (5 MB max)
    Avatar { file: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum TwoFactorAction {
    Status,
    Enable,
    Disable,
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Change the account password
    ChangePassword {
        #[arg(long, env = "OTHERLINK_PASSWORD", hide_env_values = true)]
        current_password: String,

        #[arg(long)]
        new_password: String,

        /// Defaults to --new-password
        #[arg(long)]
        confirm_password: Option<String>,
    },

    /// Show preferences, or set them with key=value pairs
    Preferences {
        /// Values are parsed as JSON when possible (`darkMode=true`)
        set: Vec<String>,
    },

    /// E-mail two-factor authentication
    TwoFactor {
        #[arg(value_enum, default_value = "status")]
        action: TwoFactorAction,
    },

    /// List active sessions
    Sessions,

    /// Revoke one session, or every other session when no id is given
    RevokeSessions { session_id: Option<String> },

    /// Roles and permissions of the account
    Roles,

    /// Audit log of account activity
    Activity {
        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Permanently delete the account
    DeleteAccount {
        #[arg(long, env = "OTHERLINK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

fn print_user(user: &User) {
    println!("{}", user.display_name());
    if let Some(username) = &user.username {
        println!("  username: {username}");
    }
    if let Some(email) = &user.email {
        println!("  email:    {email}");
    }
    if !user.roles.is_empty() {
        let roles = user
            .roles
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!("  roles:    {roles}");
    }
    if let Some(avatar) = &user.avatar_url {
        println!("  avatar:   {avatar}");
    }
    if let Some(last_login) = user.last_login {
        println!("  last login: {}", last_login.format("%Y-%m-%d %H:%M UTC"));
    }
}

pub async fn dashboard(ctx: &AppContext) -> Result<()> {
    require_workspace(ctx, Route::Dashboard).await?;

    if let Some(user) = ctx.session.user() {
        println!("Welcome back, {}!", user.display_name());
    }
    let otherlinks = ctx.workspace.otherlinks();
    println!("OtherLinks: {}", otherlinks.len());

    let Some(selected) = ctx.workspace.selected() else {
        return Ok(());
    };
    println!(
        "Selected: {} ({})",
        selected.name,
        selected.display_name.as_deref().unwrap_or("no display name")
    );

    let recent = LinkService::new(ctx.session.client().clone())
        .recent(&selected.id, RECENT_LINKS)
        .await
        .map_err(|e| api_error(e, "Failed to load recent links"))?;
    if recent.links.is_empty() {
        println!("No links yet. Add one with `otherlink links create`.");
    } else {
        println!("Recent links:");
        for link in &recent.links {
            println!("  {:<12} {} -> {}", link.shortcode, link.name, link.url);
        }
    }
    Ok(())
}

impl ProfileCommands {
    pub async fn execute(self, ctx: &AppContext) -> Result<()> {
        require(ctx, Guard::Authenticated).await?;
        match self {
            ProfileCommands::Show => {
                let user = ctx
                    .session
                    .refresh_profile()
                    .await
                    .map_err(|e| anyhow!(user_message(&e, "Failed to load profile")))?;
                print_user(&user);
            }
            ProfileCommands::Update {
                first_name,
                last_name,
            } => {
                if first_name.is_none() && last_name.is_none() {
                    bail!("Nothing to update: pass --first-name and/or --last-name");
                }
                let user = ctx
                    .session
                    .update_profile(&ProfileUpdate {
                        first_name,
                        last_name,
                    })
                    .await
                    .map_err(|e| anyhow!(user_message(&e, "Failed to update profile")))?;
                println!("Profile updated.");
                print_user(&user);
            }
            ProfileCommands::Avatar { file } => {
                let mime = avatar_mime(&file)?;
                let bytes = std::fs::read(&file)?;
                if bytes.len() > MAX_AVATAR_BYTES {
                    bail!("File size must be less than 5 MB");
                }
                let file_name = file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("avatar")
                    .to_string();
                let user = ctx
                    .session
                    .upload_avatar(&file_name, mime, bytes)
                    .await
                    .map_err(|e| anyhow!(user_message(&e, "Failed to upload avatar")))?;
                println!("Avatar updated.");
                print_user(&user);
            }
        }
        Ok(())
    }
}

/// MIME type for an avatar file, by extension
fn avatar_mime(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => Ok("image/jpeg"),
        Some("png") => Ok("image/png"),
        Some("webp") => Ok("image/webp"),
        _ => bail!("Please select a valid image file (JPEG, PNG, or WebP)"),
    }
}

/// `key=value` pairs to a preferences object; values are JSON when they parse
fn parse_preferences(pairs: &[String]) -> Result<Map<String, Value>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, raw) = pair
                .split_once('=')
                .filter(|(k, _)| !k.trim().is_empty())
                .ok_or_else(|| anyhow!("Expected key=value, got `{pair}`"))?;
            let value =
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            Ok((key.trim().to_string(), value))
        })
        .collect()
}

impl SettingsCommands {
    pub async fn execute(self, ctx: &AppContext) -> Result<()> {
        require(ctx, Guard::Authenticated).await?;
        let users = ctx.session.users();
        match self {
            SettingsCommands::ChangePassword {
                current_password,
                new_password,
                confirm_password,
            } => {
                let change = PasswordChange {
                    confirm_password: confirm_password.unwrap_or_else(|| new_password.clone()),
                    current_password,
                    new_password,
                };
                change.validate().map_err(invalid_form)?;
                users
                    .change_password(&change)
                    .await
                    .map_err(|e| api_error(e, "Failed to change password"))?;
                println!("Password changed.");
            }
            SettingsCommands::Preferences { set } => {
                let body = if set.is_empty() {
                    users.preferences().await
                } else {
                    users.update_preferences(&parse_preferences(&set)?).await
                }
                .map_err(|e| form_message(&e, "Failed to load preferences"))?;
                print_json(&body)?;
            }
            SettingsCommands::TwoFactor { action } => {
                let body = match action {
                    TwoFactorAction::Status => users.two_factor_status().await,
                    TwoFactorAction::Enable => users.enable_two_factor().await,
                    TwoFactorAction::Disable => users.disable_two_factor().await,
                }
                .map_err(|e| form_message(&e, "Two-factor request failed"))?;
                print_json(&body)?;
            }
            SettingsCommands::Sessions => {
                let body = users
                    .sessions()
                    .await
                    .map_err(|e| form_message(&e, "Failed to load sessions"))?;
                print_json(&body)?;
            }
            SettingsCommands::RevokeSessions { session_id } => {
                match session_id {
                    Some(id) => {
                        let refresh = ctx.session.snapshot().refresh_token.unwrap_or_default();
                        users.revoke_session(&id, &refresh).await
                    }
                    None => users.revoke_all_sessions().await,
                }
                .map_err(|e| form_message(&e, "Failed to revoke sessions"))?;
                println!("Sessions revoked.");
            }
            SettingsCommands::Roles => {
                let body = users
                    .roles_and_permissions()
                    .await
                    .map_err(|e| form_message(&e, "Failed to load roles"))?;
                print_json(&body)?;
            }
            SettingsCommands::Activity { page, limit } => {
                let (page, limit) = (page.to_string(), limit.to_string());
                let body = users
                    .activity_log(&[("page", page.as_str()), ("limit", limit.as_str())])
                    .await
                    .map_err(|e| form_message(&e, "Failed to load activity"))?;
                print_json(&body)?;
            }
            SettingsCommands::DeleteAccount { password, yes } => {
                if !yes {
                    bail!("This permanently deletes your account. Re-run with --yes to confirm.");
                }
                users
                    .delete_account(&password)
                    .await
                    .map_err(|e| form_message(&e, "Failed to delete account"))?;
                ctx.session.logout().await;
                ctx.workspace.clear();
                println!("Account deleted.");
            }
        }
        Ok(())
    }
}

pub async fn access(ctx: &AppContext, roles: Vec<String>, permissions: Vec<String>) -> Result<()> {
    let guard = match (roles.is_empty(), permissions.is_empty()) {
        (false, _) => Guard::Role(roles),
        (true, false) => Guard::Permission(permissions),
        (true, true) => bail!("Pass at least one --role or --permission"),
    };
    require(ctx, guard).await?;
    println!("Allowed.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_avatar_mime_by_extension() {
        assert_eq!(avatar_mime(Path::new("me.JPG")).unwrap(), "image/jpeg");
        assert_eq!(avatar_mime(Path::new("me.webp")).unwrap(), "image/webp");
        assert!(avatar_mime(Path::new("me.gif")).is_err());
        assert!(avatar_mime(Path::new("me")).is_err());
    }

    #[test]
    fn test_parse_preferences() {
        let prefs = parse_preferences(&[
            "darkMode=true".to_string(),
            "language=en".to_string(),
            "pageSize=25".to_string(),
        ])
        .unwrap();
        assert_eq!(prefs["darkMode"], json!(true));
        assert_eq!(prefs["language"], json!("en"));
        assert_eq!(prefs["pageSize"], json!(25));

        assert!(parse_preferences(&["novalue".to_string()]).is_err());
        assert!(parse_preferences(&["=x".to_string()]).is_err());
    }
}
