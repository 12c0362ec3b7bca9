//! Route guards
//!
//! A guard validates the session at most once per instance, then derives a
//! [`GuardDecision`] from that cached result and the live session.

use crate::manager::{Session, SessionManager};
use crate::workspace::OtherlinkWorkspace;
use otherlink_http::ClientError;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Screens of the client, addressed by their URL path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Register,
    ForgotPassword,
    ResetPassword,
    ResetComplete,
    ResetExpired,
    VerificationSent,
    VerifyEmail,
    TwoFactorVerify,
    Dashboard,
    Profile,
    Settings,
    Otherlinks,
    Links,
    CreateOtherlink,
    /// Public landing page of an OtherLink, by display name
    Landing(String),
}

impl Route {
    pub fn path(&self) -> String {
        let fixed = match self {
            Self::Home => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::ForgotPassword => "/forgot-password",
            Self::ResetPassword => "/reset-password",
            Self::ResetComplete => "/reset-complete",
            Self::ResetExpired => "/reset-expired",
            Self::VerificationSent => "/verification-sent",
            Self::VerifyEmail => "/verify-email",
            Self::TwoFactorVerify => "/2fa-verify",
            Self::Dashboard => "/dashboard",
            Self::Profile => "/profile",
            Self::Settings => "/settings",
            Self::Otherlinks => "/admin/otherlinks",
            Self::Links => "/admin/links",
            Self::CreateOtherlink => "/admin/create-otherlink",
            Self::Landing(name) => return format!("/{name}"),
        };
        fixed.to_string()
    }

    /// Resolve a path; any other single segment is a landing page
    pub fn from_path(path: &str) -> Option<Self> {
        let route = match path {
            "/" | "" => Self::Home,
            "/login" => Self::Login,
            "/register" => Self::Register,
            "/forgot-password" => Self::ForgotPassword,
            "/reset-password" => Self::ResetPassword,
            "/reset-complete" => Self::ResetComplete,
            "/reset-expired" => Self::ResetExpired,
            "/verification-sent" => Self::VerificationSent,
            "/verify-email" => Self::VerifyEmail,
            "/2fa-verify" => Self::TwoFactorVerify,
            "/dashboard" | "/admin/dashboard" => Self::Dashboard,
            "/profile" => Self::Profile,
            "/settings" => Self::Settings,
            "/admin/otherlinks" => Self::Otherlinks,
            "/admin/links" => Self::Links,
            "/admin/create-otherlink" => Self::CreateOtherlink,
            other => {
                let name = other.strip_prefix('/')?;
                if name.is_empty() || name.contains('/') {
                    return None;
                }
                Self::Landing(name.to_string())
            }
        };
        Some(route)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// Signed-in users only
    Authenticated,
    /// Anonymous users only (login, register, password reset)
    Guest,
    /// Signed in with at least one of the named roles
    Role(Vec<String>),
    /// Signed in with at least one of the named permissions
    Permission(Vec<String>),
}

impl Guard {
    pub fn roles<S: Into<String>>(roles: impl IntoIterator<Item = S>) -> Self {
        Self::Role(roles.into_iter().map(Into::into).collect())
    }

    pub fn permissions<S: Into<String>>(permissions: impl IntoIterator<Item = S>) -> Self {
        Self::Permission(permissions.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Route),
    /// Signed in but lacking the required role or permission
    Denied,
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decide from a validation result and the current session
pub fn evaluate(guard: &Guard, valid: bool, session: &Session) -> GuardDecision {
    let signed_in = valid && session.is_authenticated();
    match guard {
        Guard::Guest if signed_in => GuardDecision::Redirect(Route::Dashboard),
        Guard::Guest => GuardDecision::Allow,
        _ if !signed_in => GuardDecision::Redirect(Route::Login),
        Guard::Authenticated => GuardDecision::Allow,
        Guard::Role(roles) if session.has_any_role(roles) => GuardDecision::Allow,
        Guard::Permission(permissions) if session.has_any_permission(permissions) => {
            GuardDecision::Allow
        }
        Guard::Role(_) | Guard::Permission(_) => GuardDecision::Denied,
    }
}

/// One guard instance per visited screen
pub struct RouteGuard {
    session: Arc<SessionManager>,
    guard: Guard,
    valid: OnceCell<bool>,
}

impl RouteGuard {
    pub fn new(session: Arc<SessionManager>, guard: Guard) -> Self {
        Self {
            session,
            guard,
            valid: OnceCell::new(),
        }
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    async fn validated(&self) -> bool {
        *self
            .valid
            .get_or_init(|| async {
                if self.guard == Guard::Authenticated && self.session.is_authenticated() {
                    debug!("Session already authenticated; skipping validation");
                    return true;
                }
                self.session.validate_and_refresh().await
            })
            .await
    }

    pub async fn decide(&self) -> GuardDecision {
        let valid = self.validated().await;
        let decision = evaluate(&self.guard, valid, &self.session.snapshot());
        debug!(guard = ?self.guard, ?decision, "Guard evaluated");
        decision
    }
}

/// Sends users without any OtherLink to the create page
pub struct WorkspaceGuard {
    workspace: Arc<OtherlinkWorkspace>,
}

impl WorkspaceGuard {
    pub fn new(workspace: Arc<OtherlinkWorkspace>) -> Self {
        Self { workspace }
    }

    /// Reloads the workspace unless `current` already is the create page
    pub async fn check(&self, current: &Route) -> Result<GuardDecision, ClientError> {
        if *current == Route::CreateOtherlink {
            return Ok(GuardDecision::Allow);
        }

        self.workspace.load().await?;
        if self.workspace.has_otherlinks() {
            Ok(GuardDecision::Allow)
        } else {
            debug!("No OtherLinks yet; redirecting to the create page");
            Ok(GuardDecision::Redirect(Route::CreateOtherlink))
        }
    }
}
