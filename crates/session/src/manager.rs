//! Session lifecycle: token pair plus user, login/logout, validate-then-refresh
//!
//! The manager is the single owner of session state. Durable storage holds a
//! mirror of the two tokens so a restarted client can pick the session up
//! again through [`SessionManager::initialize`].

use crate::error::{AuthError, AuthResult};
use crate::two_factor::{DEFAULT_EXPIRES_IN_SECS, TwoFactorSession};
use otherlink_core::validation::is_valid_two_factor_code;
use otherlink_core::{
    AccountLinking, Credentials, OAuthProvider, ProfileUpdate, StorageKey, TokenStore,
    TwoFactorChallenge, User,
};
use otherlink_http::envelope::{
    self, TokenGrant, account_linking, extract_grant, extract_token_pair, extract_user,
    two_factor_challenge,
};
use otherlink_http::{ApiClient, UserService};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

/// In-memory session state
#[derive(Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user.as_ref().map(|u| u.id.as_str()))
            .finish()
    }
}

impl Session {
    /// Access token present and user known
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.user.is_some()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_role(role))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_permission(permission))
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|r| self.has_role(r.as_ref()))
    }

    pub fn has_any_permission<S: AsRef<str>>(&self, permissions: &[S]) -> bool {
        permissions.iter().any(|p| self.has_permission(p.as_ref()))
    }
}

/// Result of a sign-in attempt
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Authenticated(User),
    /// An e-mailed code must be verified before tokens are issued
    TwoFactorRequired(TwoFactorChallenge),
    /// The OAuth e-mail belongs to a password account; confirm with its password
    LinkingRequired(AccountLinking),
}

impl LoginOutcome {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Decrements the in-flight counter when dropped
pub(crate) struct Loading<'a>(&'a AtomicUsize);

impl<'a> Loading<'a> {
    pub(crate) fn begin(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SessionManager {
    users: UserService,
    store: Arc<dyn TokenStore>,
    state: watch::Sender<Session>,
    /// Serializes every operation that mutates the session
    gate: Mutex<()>,
    /// Bumped after each completed transition
    generation: AtomicU64,
    /// Outcome of the most recent transition
    last_valid: AtomicBool,
    in_flight: AtomicUsize,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("session", &*self.state.borrow())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}

impl SessionManager {
    /// Create a manager over `store`; the client is rebound to read its
    /// bearer token from the same store.
    ///
    /// Tokens already in storage are loaded but not trusted: the session is
    /// not authenticated until [`initialize`](Self::initialize) validates them.
    pub fn new(client: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        let users = UserService::new(client.with_token_store(store.clone()));
        let initial = Session {
            access_token: store.get(StorageKey::AccessToken),
            refresh_token: store.get(StorageKey::RefreshToken),
            user: None,
        };

        Self {
            users,
            store,
            state: watch::Sender::new(initial),
            gate: Mutex::new(()),
            generation: AtomicU64::new(0),
            last_valid: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Client bound to this session's token store
    pub fn client(&self) -> &ApiClient {
        self.users.client()
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Observe session changes
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// True while a session-mutating call is in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.state.borrow().has_role(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.state.borrow().has_permission(permission)
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.state.borrow().has_any_role(roles)
    }

    pub fn has_any_permission<S: AsRef<str>>(&self, permissions: &[S]) -> bool {
        self.state.borrow().has_any_permission(permissions)
    }

    fn mark(&self, valid: bool) {
        self.last_valid.store(valid, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Drop the in-memory session and both durable tokens
    fn clear_local(&self) {
        self.state.send_replace(Session::default());
        for key in [StorageKey::AccessToken, StorageKey::RefreshToken] {
            if let Err(e) = self.store.remove(key) {
                warn!(key = key.as_str(), "Failed to remove stored token: {e}");
            }
        }
        self.mark(false);
    }

    fn establish(&self, access: String, refresh: String, user: User) -> AuthResult<()> {
        self.store.set(StorageKey::AccessToken, &access)?;
        self.store.set(StorageKey::RefreshToken, &refresh)?;
        info!(user_id = %user.id, "Session established");
        self.state.send_replace(Session {
            access_token: Some(access),
            refresh_token: Some(refresh),
            user: Some(user),
        });
        self.mark(true);
        Ok(())
    }

    fn replace_user(&self, user: User) {
        self.state.send_modify(|session| session.user = Some(user));
    }

    /// User record for a fresh grant: the one it carries, else one validate call
    async fn grant_user(&self, grant: &TokenGrant) -> Option<User> {
        if let Some(user) = &grant.user {
            return Some(user.clone());
        }
        debug!("Grant carried no user; loading it with the new access token");
        match self.users.validate_token(&grant.access_token).await {
            Ok(body) => extract_user(&body),
            Err(e) => {
                debug!("Follow-up validation failed: {e}");
                None
            }
        }
    }

    /// Turn a token-bearing response into an established session
    async fn establish_from_body(&self, body: &Value) -> AuthResult<User> {
        let grant = extract_token_pair(body).ok_or_else(|| AuthError::malformed("missing tokens"))?;
        let user = self
            .grant_user(&grant)
            .await
            .ok_or_else(|| AuthError::malformed("missing user"))?;
        let refresh = grant
            .refresh_token
            .ok_or_else(|| AuthError::malformed("missing tokens"))?;
        self.establish(grant.access_token, refresh, user.clone())?;
        Ok(user)
    }

    /// Shared tail of password and OAuth sign-in
    async fn complete_sign_in(
        &self,
        body: Value,
        oauth: Option<(OAuthProvider, &str)>,
    ) -> AuthResult<LoginOutcome> {
        if let Some(challenge) = two_factor_challenge(&body) {
            info!(expires_in = challenge.expires_in, "Two-factor verification required");
            return Ok(LoginOutcome::TwoFactorRequired(challenge));
        }

        if let Some((provider, id_token)) = oauth
            && let Some(signal) = account_linking(&body)
        {
            info!(%provider, "OAuth account linking required");
            return Ok(LoginOutcome::LinkingRequired(AccountLinking {
                provider: envelope::linking_provider(&body).unwrap_or(provider),
                id_token: id_token.to_string(),
                existing_email: signal.existing_email,
            }));
        }

        let user = self.establish_from_body(&body).await?;
        Ok(LoginOutcome::Authenticated(user))
    }

    /// Sign in with username and password
    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &Credentials) -> AuthResult<LoginOutcome> {
        let _loading = Loading::begin(&self.in_flight);
        let _gate = self.gate.lock().await;

        let body = self.users.login(credentials).await.inspect_err(|e| {
            debug!("Login rejected: {e}");
        })?;
        self.complete_sign_in(body, None).await
    }

    /// Best-effort server logout, then unconditional local clear
    #[instrument(skip_all)]
    pub async fn logout(&self) {
        let _loading = Loading::begin(&self.in_flight);
        let _gate = self.gate.lock().await;

        let refresh = self.state.borrow().refresh_token.clone();
        if let Some(refresh) = refresh
            && let Err(e) = self.users.logout(&refresh).await
        {
            warn!("Logout API call failed: {e}");
        }

        self.clear_local();
        info!("Signed out");
    }

    /// Validate the access token, falling back to one refresh
    ///
    /// Never fails: any error ends in an anonymous session and `false`.
    /// Callers that queued behind another transition get that transition's
    /// result instead of repeating the network calls.
    #[instrument(skip_all)]
    pub async fn validate_and_refresh(&self) -> bool {
        let observed = self.generation.load(Ordering::SeqCst);
        let _gate = self.gate.lock().await;

        if self.generation.load(Ordering::SeqCst) != observed {
            let valid = self.last_valid.load(Ordering::SeqCst);
            debug!(valid, "Reusing result of concurrent session transition");
            return valid;
        }

        let _loading = Loading::begin(&self.in_flight);
        let valid = self.validate_locked().await;
        self.mark(valid);
        valid
    }

    async fn validate_locked(&self) -> bool {
        let (access, refresh) = {
            let session = self.state.borrow();
            (session.access_token.clone(), session.refresh_token.clone())
        };
        let (Some(access), Some(refresh)) = (access, refresh) else {
            debug!("No token pair held; clearing session");
            self.clear_local();
            return false;
        };

        match self.users.validate_token(&access).await {
            Ok(body) => match extract_user(&body) {
                Some(user) => {
                    debug!(user_id = %user.id, "Access token valid");
                    self.replace_user(user);
                    return true;
                }
                None => debug!("Validation response carried no user; refreshing"),
            },
            Err(e) => debug!("Access token rejected ({e}); refreshing"),
        }

        match self.refresh_locked(&refresh).await {
            Ok(()) => {
                info!("Access token refreshed");
                true
            }
            Err(e) => {
                warn!("Token refresh failed: {e}");
                self.clear_local();
                false
            }
        }
    }

    async fn refresh_locked(&self, refresh: &str) -> AuthResult<()> {
        let body = self.users.refresh_token(refresh).await?;
        let grant = extract_grant(&body)
            .ok_or_else(|| AuthError::malformed("no access token in refresh response"))?;

        let user = match self.grant_user(&grant).await {
            Some(user) => user,
            None => self
                .state
                .borrow()
                .user
                .clone()
                .ok_or_else(|| AuthError::malformed("missing user"))?,
        };

        self.store.set(StorageKey::AccessToken, &grant.access_token)?;
        if let Some(rotated) = &grant.refresh_token {
            self.store.set(StorageKey::RefreshToken, rotated)?;
        }

        self.state.send_modify(|session| {
            session.access_token = Some(grant.access_token);
            if let Some(rotated) = grant.refresh_token {
                session.refresh_token = Some(rotated);
            }
            session.user = Some(user);
        });
        Ok(())
    }

    /// Restore a session from durable storage on start-up
    #[instrument(skip_all)]
    pub async fn initialize(&self) -> bool {
        let access = self.store.get(StorageKey::AccessToken);
        let refresh = self.store.get(StorageKey::RefreshToken);

        match (access, refresh) {
            (Some(access), Some(refresh)) => {
                self.state.send_modify(|session| {
                    session.access_token = Some(access);
                    session.refresh_token = Some(refresh);
                });
                self.validate_and_refresh().await
            }
            _ => {
                debug!("No stored session");
                let _gate = self.gate.lock().await;
                self.clear_local();
                false
            }
        }
    }

    /// Finish a two-factor login with the e-mailed code
    #[instrument(skip_all, fields(session_id = %pending.session_id()))]
    pub async fn verify_two_factor(
        &self,
        pending: &TwoFactorSession,
        code: &str,
    ) -> AuthResult<User> {
        let code = code.trim();
        if !is_valid_two_factor_code(code) {
            return Err(AuthError::InvalidCode);
        }
        if pending.is_expired() {
            return Err(AuthError::TwoFactorExpired);
        }

        let _loading = Loading::begin(&self.in_flight);
        let _gate = self.gate.lock().await;

        let body = self
            .users
            .verify_two_factor(pending.session_id(), code)
            .await?;
        self.establish_from_body(&body).await
    }

    /// Ask for a new code and restart the local countdown
    #[instrument(skip_all, fields(session_id = %pending.session_id()))]
    pub async fn resend_two_factor(&self, pending: &mut TwoFactorSession) -> AuthResult<()> {
        let body = self.users.resend_two_factor(pending.session_id()).await?;
        let expires_in = envelope::expires_in(&body).unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        pending.restart(expires_in);
        debug!(expires_in, "Verification code re-sent");
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn google_login(&self, id_token: &str) -> AuthResult<LoginOutcome> {
        let _loading = Loading::begin(&self.in_flight);
        let _gate = self.gate.lock().await;

        let body = self.users.google_login(id_token).await?;
        self.complete_sign_in(body, Some((OAuthProvider::Google, id_token)))
            .await
    }

    /// `user` is the name/e-mail object Apple only sends on first sign-in
    #[instrument(skip_all)]
    pub async fn apple_login(
        &self,
        id_token: &str,
        user: Option<&Value>,
    ) -> AuthResult<LoginOutcome> {
        let _loading = Loading::begin(&self.in_flight);
        let _gate = self.gate.lock().await;

        let body = self.users.apple_login(id_token, user).await?;
        self.complete_sign_in(body, Some((OAuthProvider::Apple, id_token)))
            .await
    }

    /// Attach an OAuth identity to the password account it collided with
    #[instrument(skip_all, fields(provider = %linking.provider))]
    pub async fn link_oauth_account(
        &self,
        linking: &AccountLinking,
        existing_password: &str,
    ) -> AuthResult<LoginOutcome> {
        let _loading = Loading::begin(&self.in_flight);
        let _gate = self.gate.lock().await;

        let body = self
            .users
            .link_oauth_account(linking.provider, &linking.id_token, existing_password)
            .await?;
        self.complete_sign_in(body, None).await
    }

    fn require_authenticated(&self) -> AuthResult<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(AuthError::NotAuthenticated)
        }
    }

    #[instrument(skip_all)]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> AuthResult<User> {
        self.require_authenticated()?;
        let _loading = Loading::begin(&self.in_flight);
        let _gate = self.gate.lock().await;

        let body = self.users.update_profile(update).await?;
        let user = extract_user(&body).ok_or_else(|| AuthError::malformed("missing user"))?;
        self.replace_user(user.clone());
        Ok(user)
    }

    /// Upload a new avatar; when the response omits the user the profile is reloaded
    #[instrument(skip_all, fields(file_name = %file_name, size = bytes.len()))]
    pub async fn upload_avatar(
        &self,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> AuthResult<User> {
        self.require_authenticated()?;
        let _loading = Loading::begin(&self.in_flight);
        let _gate = self.gate.lock().await;

        let body = self.users.upload_avatar(file_name, mime, bytes).await?;
        let user = match extract_user(&body) {
            Some(user) => user,
            None => {
                let profile = self.users.profile().await?;
                extract_user(&profile).ok_or_else(|| AuthError::malformed("missing user"))?
            }
        };
        self.replace_user(user.clone());
        Ok(user)
    }

    /// Reload the user record from `GET /user/profile`
    #[instrument(skip_all)]
    pub async fn refresh_profile(&self) -> AuthResult<User> {
        self.require_authenticated()?;
        let _loading = Loading::begin(&self.in_flight);
        let _gate = self.gate.lock().await;

        let body = self.users.profile().await?;
        let user = extract_user(&body).ok_or_else(|| AuthError::malformed("missing user"))?;
        self.replace_user(user.clone());
        Ok(user)
    }
}
