//! Sign-in, token and password-reset handlers

use super::bearer;
use crate::error::{MockError, MockResult};
use crate::state::{MockState, NewAccount};
use axum::{Json, extract::State, http::HeaderMap};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<MockState>,
    Json(request): Json<LoginRequest>,
) -> MockResult<Json<Value>> {
    debug!(username = %request.username, "Mock login");
    state
        .login(&request.username, &request.password)
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

pub async fn register(
    State(state): State<MockState>,
    Json(request): Json<RegisterRequest>,
) -> MockResult<Json<Value>> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(MockError::BadRequest("Email and password are required".into()));
    }
    let account = NewAccount {
        username: request.username,
        email: request.email,
        password: request.password,
        first_name: request.first_name,
        last_name: request.last_name,
    };
    state.register(account).await.map(Json)
}

pub async fn validate_token(
    State(state): State<MockState>,
    headers: HeaderMap,
) -> MockResult<Json<Value>> {
    let user = state.authenticate(bearer(&headers)?).await?;
    Ok(Json(json!({ "user": user.to_json() })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<MockState>,
    Json(request): Json<RefreshRequest>,
) -> MockResult<Json<Value>> {
    state.refresh(&request.refresh_token).await.map(Json)
}

pub async fn logout(
    State(state): State<MockState>,
    Json(request): Json<RefreshRequest>,
) -> Json<Value> {
    state.logout(&request.refresh_token).await;
    Json(json!({ "message": "Logged out successfully" }))
}

#[derive(Debug, Deserialize)]
pub struct ForgotRequest {
    #[serde(alias = "email")]
    pub username: String,
}

pub async fn forgot_password(
    State(state): State<MockState>,
    Json(request): Json<ForgotRequest>,
) -> Json<Value> {
    Json(state.forgot_password(&request.username).await)
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

pub async fn validate_reset_token(
    State(state): State<MockState>,
    Json(request): Json<TokenRequest>,
) -> MockResult<Json<Value>> {
    state.validate_reset_token(&request.token).await.map(Json)
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub token: String,
    pub password: String,
    #[serde(default)]
    pub password_confirm: Option<String>,
}

pub async fn reset_password(
    State(state): State<MockState>,
    Json(request): Json<ResetRequest>,
) -> MockResult<Json<Value>> {
    if request
        .password_confirm
        .as_deref()
        .is_some_and(|confirm| confirm != request.password)
    {
        return Err(MockError::BadRequest("Passwords do not match".into()));
    }
    state
        .reset_password(&request.token, &request.password)
        .await
        .map(Json)
}
