//! Account, authentication and settings endpoints

use crate::client::{ApiClient, error::ClientError};
use otherlink_core::{
    Credentials, OAuthProvider, PasswordChange, PasswordReset, ProfileUpdate, Registration,
};
use reqwest::Method;
use serde_json::{Map, Value, json};

#[derive(Debug, Clone)]
pub struct UserService {
    client: ApiClient,
}

impl UserService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Value, ClientError> {
        self.client.post("/login", credentials).await
    }

    pub async fn register(&self, registration: &Registration) -> Result<Value, ClientError> {
        self.client.post("/register", registration).await
    }

    /// Validate `token` explicitly, whatever the bound store holds
    pub async fn validate_token(&self, token: &str) -> Result<Value, ClientError> {
        let request = self
            .client
            .request_with_token(Method::POST, "/token/validate", token)
            .json(&json!({}));
        self.client.execute_json(request).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Value, ClientError> {
        self.client
            .post("/token/refresh", &json!({ "refreshToken": refresh_token }))
            .await
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<Value, ClientError> {
        self.client
            .post("/logout", &json!({ "refreshToken": refresh_token }))
            .await
    }

    pub async fn forgot_password(&self, username: &str) -> Result<Value, ClientError> {
        self.client
            .post("/password/forgot", &json!({ "username": username }))
            .await
    }

    pub async fn validate_reset_token(&self, token: &str) -> Result<Value, ClientError> {
        self.client
            .post("/password/reset/validate", &json!({ "token": token }))
            .await
    }

    pub async fn complete_password_reset(
        &self,
        reset: &PasswordReset,
    ) -> Result<Value, ClientError> {
        self.client.post("/password/reset/complete", reset).await
    }

    /// Older single-step reset (`{token, password}`)
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<Value, ClientError> {
        self.client
            .post(
                "/password/reset",
                &json!({ "token": token, "password": password }),
            )
            .await
    }

    pub async fn verify_email(&self, token: &str) -> Result<Value, ClientError> {
        self.client
            .post("/email/verify", &json!({ "token": token }))
            .await
    }

    pub async fn verify_two_factor(
        &self,
        session_id: &str,
        code: &str,
    ) -> Result<Value, ClientError> {
        self.client
            .post(
                "/2fa/verify",
                &json!({ "session_id": session_id, "code": code }),
            )
            .await
    }

    pub async fn resend_two_factor(&self, session_id: &str) -> Result<Value, ClientError> {
        self.client
            .post("/2fa/resend", &json!({ "session_id": session_id }))
            .await
    }

    pub async fn two_factor_status(&self) -> Result<Value, ClientError> {
        self.client.get("/2fa/status").await
    }

    pub async fn enable_two_factor(&self) -> Result<Value, ClientError> {
        self.client.post("/2fa/enable", &json!({})).await
    }

    pub async fn disable_two_factor(&self) -> Result<Value, ClientError> {
        self.client.post("/2fa/disable", &json!({})).await
    }

    pub async fn profile(&self) -> Result<Value, ClientError> {
        self.client.get("/user/profile").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Value, ClientError> {
        self.client.post("/user/profile", update).await
    }

    /// Upload an avatar image as the `avatar` multipart field
    pub async fn upload_avatar(
        &self,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, ClientError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part("avatar", part);
        self.client.upload("/user/avatar", form).await
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<Value, ClientError> {
        self.client.post("/password/change", change).await
    }

    pub async fn roles_and_permissions(&self) -> Result<Value, ClientError> {
        self.client.get("/user/roles-permissions").await
    }

    pub async fn delete_account(&self, password: &str) -> Result<Value, ClientError> {
        let request = self
            .client
            .request(Method::DELETE, "/user/account")
            .json(&json!({ "password": password }));
        self.client.execute_json(request).await
    }

    /// Audit log; `params` become query pairs (`page`, `limit`, `dateFrom`, `dateTo`)
    pub async fn activity_log(&self, params: &[(&str, &str)]) -> Result<Value, ClientError> {
        let request = self
            .client
            .request(Method::GET, "/user/activity")
            .query(params);
        self.client.execute_json(request).await
    }

    pub async fn preferences(&self) -> Result<Value, ClientError> {
        self.client.get("/user/preferences").await
    }

    pub async fn update_preferences(
        &self,
        preferences: &Map<String, Value>,
    ) -> Result<Value, ClientError> {
        self.client.put("/user/preferences", preferences).await
    }

    pub async fn sessions(&self) -> Result<Value, ClientError> {
        self.client.get("/user/sessions").await
    }

    /// Revoke every session except the current one
    pub async fn revoke_all_sessions(&self) -> Result<Value, ClientError> {
        self.client
            .post("/user/sessions/revoke-all", &json!({}))
            .await
    }

    pub async fn revoke_session(
        &self,
        session_id: &str,
        current_refresh_token: &str,
    ) -> Result<Value, ClientError> {
        self.client
            .post(
                "/token/revoke",
                &json!({ "session_id": session_id, "refresh_token": current_refresh_token }),
            )
            .await
    }

    pub async fn google_login(&self, id_token: &str) -> Result<Value, ClientError> {
        self.client
            .post("/oauth/google", &json!({ "id_token": id_token }))
            .await
    }

    /// `user` is the name/e-mail object Apple only sends on first sign-in
    pub async fn apple_login(
        &self,
        id_token: &str,
        user: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let mut body = json!({ "id_token": id_token });
        if let Some(user) = user {
            body["user"] = user.clone();
        }
        self.client.post("/oauth/apple", &body).await
    }

    pub async fn link_oauth_account(
        &self,
        provider: OAuthProvider,
        id_token: &str,
        existing_password: &str,
    ) -> Result<Value, ClientError> {
        self.client
            .post(
                "/oauth/link",
                &json!({
                    "provider": provider,
                    "id_token": id_token,
                    "existing_password": existing_password,
                }),
            )
            .await
    }
}
