//! Sign-in, sign-out and account recovery commands

use anyhow::{Result, anyhow, bail};
use clap::Subcommand;
use otherlink_core::{
    AccountLinking, Credentials, OAuthProvider, PasswordReset, Registration, TwoFactorChallenge,
    User, Validate,
};
use otherlink_session::error_messages::{
    account_linking_error, login_error, reset_failure_route, two_factor_error, user_message,
};
use otherlink_session::two_factor::DEFAULT_EXPIRES_IN_SECS;
use otherlink_session::{Guard, LoginOutcome, Route, TwoFactorSession, format_countdown};
use tracing::info;

use super::{form_message, invalid_form, redirect_hint, require};
use crate::config::AppContext;

#[derive(Subcommand)]
pub enum OauthCommands {
    /// Sign in with a Google ID token
    Google {
        #[arg(long)]
        id_token: String,
    },

    /// Sign in with an Apple ID token
    Apple {
        #[arg(long)]
        id_token: String,

        /// Name/e-mail JSON object Apple sends on first sign-in
        #[arg(long)]
        user: Option<String>,
    },

    /// Attach a provider identity to an existing password account
    Link {
        #[arg(long)]
        provider: OAuthProvider,

        #[arg(long)]
        id_token: String,

        /// Password of the existing account
        #[arg(long, env = "OTHERLINK_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

impl OauthCommands {
    pub async fn execute(self, ctx: &AppContext) -> Result<()> {
        require(ctx, Guard::Guest).await?;
        match self {
            OauthCommands::Google { id_token } => {
                ensure_provider(ctx, OAuthProvider::Google)?;
                let outcome = ctx
                    .session
                    .google_login(&id_token)
                    .await
                    .map_err(|e| anyhow!(user_message(&e, "Google sign-in failed")))?;
                report_outcome(ctx, outcome, None).await
            }
            OauthCommands::Apple { id_token, user } => {
                ensure_provider(ctx, OAuthProvider::Apple)?;
                let user = user
                    .map(|raw| serde_json::from_str::<serde_json::Value>(&raw))
                    .transpose()
                    .map_err(|e| anyhow!("--user must be a JSON object: {e}"))?;
                let outcome = ctx
                    .session
                    .apple_login(&id_token, user.as_ref())
                    .await
                    .map_err(|e| anyhow!(user_message(&e, "Apple sign-in failed")))?;
                report_outcome(ctx, outcome, None).await
            }
            OauthCommands::Link {
                provider,
                id_token,
                password,
            } => {
                let linking = AccountLinking {
                    provider,
                    id_token,
                    existing_email: None,
                };
                let outcome = ctx
                    .session
                    .link_oauth_account(&linking, &password)
                    .await
                    .map_err(|e| anyhow!(account_linking_error(&e)))?;
                report_outcome(ctx, outcome, None).await
            }
        }
    }
}

fn ensure_provider(ctx: &AppContext, provider: OAuthProvider) -> Result<()> {
    if ctx.config.oauth.is_configured(provider) {
        Ok(())
    } else {
        bail!("{provider} sign-in is not configured (set oauth.{provider}.client_id)")
    }
}

pub async fn login(
    ctx: &AppContext,
    username: String,
    password: String,
    code: Option<String>,
) -> Result<()> {
    require(ctx, Guard::Guest).await?;

    let outcome = ctx
        .session
        .login(&Credentials::new(username, password))
        .await
        .map_err(|e| anyhow!(login_error(&e)))?;
    report_outcome(ctx, outcome, code).await
}

/// Print what a sign-in produced; a two-factor challenge is finished on the
/// spot when `code` was given
async fn report_outcome(
    ctx: &AppContext,
    outcome: LoginOutcome,
    code: Option<String>,
) -> Result<()> {
    match outcome {
        LoginOutcome::Authenticated(user) => welcome(ctx, &user).await,
        LoginOutcome::TwoFactorRequired(challenge) => {
            let pending = TwoFactorSession::new(challenge);
            match code {
                Some(code) => finish_two_factor(ctx, &pending, &code).await,
                None => {
                    println!("A verification code was sent to your e-mail.");
                    println!(
                        "Run `otherlink verify-2fa --session-id {} --code <CODE>` within {}.",
                        pending.session_id(),
                        format_countdown(pending.remaining())
                    );
                    Ok(())
                }
            }
        }
        LoginOutcome::LinkingRequired(linking) => {
            let email = linking.existing_email.as_deref().unwrap_or("your e-mail");
            println!(
                "An account already exists for {email}. Link your {} sign-in to it with:",
                linking.provider
            );
            println!(
                "  otherlink oauth link --provider {} --id-token <TOKEN> --password <PASSWORD>",
                linking.provider
            );
            Ok(())
        }
    }
}

async fn welcome(ctx: &AppContext, user: &User) -> Result<()> {
    info!(user_id = %user.id, "Signed in");
    println!("Signed in as {}", user.display_name());

    // Land on the dashboard, or the create page when there are no OtherLinks
    if let Err(e) = ctx.workspace.load().await {
        println!("Could not load your OtherLinks: {e}");
    } else if !ctx.workspace.has_otherlinks() {
        println!("{}", redirect_hint(&Route::CreateOtherlink));
    }
    Ok(())
}

async fn finish_two_factor(ctx: &AppContext, pending: &TwoFactorSession, code: &str) -> Result<()> {
    let user = ctx
        .session
        .verify_two_factor(pending, code)
        .await
        .map_err(|e| anyhow!(two_factor_error(&e)))?;
    welcome(ctx, &user).await
}

pub async fn verify_two_factor(
    ctx: &AppContext,
    session_id: String,
    code: Option<String>,
    resend: bool,
) -> Result<()> {
    // The countdown is local to this process; the backend enforces the real expiry
    let mut pending = TwoFactorSession::new(TwoFactorChallenge {
        session_id,
        expires_in: DEFAULT_EXPIRES_IN_SECS,
        user: None,
    });

    if resend {
        ctx.session
            .resend_two_factor(&mut pending)
            .await
            .map_err(|e| anyhow!(user_message(&e, "Failed to resend code. Please try again.")))?;
        println!(
            "A new verification code was sent. It expires in {}.",
            format_countdown(pending.remaining())
        );
    }

    match code {
        Some(code) => finish_two_factor(ctx, &pending, &code).await,
        None => Ok(()),
    }
}

pub async fn logout(ctx: &AppContext) -> Result<()> {
    let session = ctx.session.snapshot();
    if session.access_token.is_none() && session.refresh_token.is_none() {
        println!("Not signed in.");
        return Ok(());
    }
    ctx.session.logout().await;
    ctx.workspace.clear();
    println!("Signed out.");
    Ok(())
}

pub async fn register(
    ctx: &AppContext,
    email: String,
    password: String,
    confirm_password: Option<String>,
    first_name: String,
    last_name: String,
) -> Result<()> {
    require(ctx, Guard::Guest).await?;

    let registration = Registration {
        confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
        email,
        password,
        first_name,
        last_name,
    };
    registration.validate().map_err(invalid_form)?;

    ctx.session
        .users()
        .register(&registration)
        .await
        .map_err(|e| super::api_error(e, "Registration failed. Please try again."))?;

    println!(
        "Account created. We sent a verification link to {}.",
        registration.email
    );
    println!("Open it, or run `otherlink verify-email <TOKEN>`.");
    Ok(())
}

pub async fn forgot_password(ctx: &AppContext, username: &str) -> Result<()> {
    require(ctx, Guard::Guest).await?;
    if username.trim().is_empty() {
        bail!("Please enter your username or e-mail");
    }

    ctx.session
        .users()
        .forgot_password(username.trim())
        .await
        .map_err(|e| form_message(&e, "Failed to send reset e-mail. Please try again."))?;
    println!("If an account exists for {username}, a password reset link is on its way.");
    Ok(())
}

pub async fn reset_password(
    ctx: &AppContext,
    token: String,
    password: String,
    confirm_password: Option<String>,
) -> Result<()> {
    require(ctx, Guard::Guest).await?;

    let reset = PasswordReset {
        password_confirm: confirm_password.unwrap_or_else(|| password.clone()),
        token,
        password,
    };
    reset.validate().map_err(invalid_form)?;

    match ctx
        .session
        .users()
        .reset_password(&reset.token, &reset.password)
        .await
    {
        Ok(_) => {
            println!("Your password has been reset. You can now sign in.");
            Ok(())
        }
        Err(e) => match reset_failure_route(&e) {
            Some(_) => bail!(
                "This reset link has expired or was already used. Run `otherlink forgot-password` to get a new one."
            ),
            None => Err(form_message(&e, "Failed to reset password. Please try again.")),
        },
    }
}

pub async fn verify_email(ctx: &AppContext, token: &str) -> Result<()> {
    if token.trim().is_empty() {
        bail!("No verification token provided.");
    }

    match ctx.session.users().verify_email(token.trim()).await {
        Ok(_) => {
            println!("Your e-mail address is verified. You can now sign in.");
            Ok(())
        }
        Err(e) => match reset_failure_route(&e) {
            Some(_) => bail!("This verification link has expired or is invalid."),
            None => Err(form_message(
                &e,
                "Email verification failed. The link may be expired or invalid.",
            )),
        },
    }
}
