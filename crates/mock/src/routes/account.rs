//! Profile, password, preference and activity handlers for the bearer's account

use super::bearer;
use crate::error::{MockError, MockResult};
use crate::state::{MockState, MockUser};
use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};

async fn current_user(state: &MockState, headers: &HeaderMap) -> MockResult<MockUser> {
    state.authenticate(bearer(headers)?).await
}

fn not_found() -> MockError {
    MockError::NotFound("User not found".into())
}

pub async fn profile(
    State(state): State<MockState>,
    headers: HeaderMap,
) -> MockResult<Json<Value>> {
    Ok(Json(current_user(&state, &headers).await?.to_json()))
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    #[serde(default, alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName")]
    pub last_name: Option<String>,
}

pub async fn update_profile(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(request): Json<ProfileRequest>,
) -> MockResult<Json<Value>> {
    let id = current_user(&state, &headers).await?.id;
    let mut store = state.write().await;
    let user = store.user_by_id_mut(id).ok_or_else(not_found)?;
    if let Some(first) = request.first_name {
        user.first_name = first;
    }
    if let Some(last) = request.last_name {
        user.last_name = last;
    }
    Ok(Json(user.to_json()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(request): Json<ChangePasswordRequest>,
) -> MockResult<Json<Value>> {
    let id = current_user(&state, &headers).await?.id;
    let mut store = state.write().await;
    let user = store.user_by_id_mut(id).ok_or_else(not_found)?;
    if user.password != request.current_password {
        return Err(MockError::BadRequest("Current password is incorrect".into()));
    }
    user.password = request.new_password;
    Ok(Json(json!({ "message": "Password changed successfully" })))
}

pub async fn roles_and_permissions(
    State(state): State<MockState>,
    headers: HeaderMap,
) -> MockResult<Json<Value>> {
    let user = current_user(&state, &headers).await?;
    let permissions: Vec<_> = user.roles.iter().flat_map(|r| r.permissions.clone()).collect();
    Ok(Json(json!({ "roles": user.roles, "permissions": permissions })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

pub async fn delete_account(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(request): Json<DeleteAccountRequest>,
) -> MockResult<Json<Value>> {
    let user = current_user(&state, &headers).await?;
    if user.password != request.password {
        return Err(MockError::BadRequest("Password confirmation failed".into()));
    }
    let mut store = state.write().await;
    store.users.remove(&user.username);
    store.otherlinks.retain(|o| o.owner_id != user.id);
    Ok(Json(json!({ "message": "Account deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn activity_log(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<ActivityQuery>,
) -> MockResult<Json<Value>> {
    current_user(&state, &headers).await?;
    let now = Utc::now();
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let activities = json!([
        {
            "id": 1,
            "action": "login",
            "timestamp": now.to_rfc3339(),
            "ipAddress": "127.0.0.1",
            "userAgent": user_agent,
        },
        {
            "id": 2,
            "action": "profile_update",
            "timestamp": (now - Duration::days(1)).to_rfc3339(),
            "ipAddress": "127.0.0.1",
            "userAgent": user_agent,
        },
    ]);
    Ok(Json(json!({
        "activities": activities,
        "pagination": {
            "page": query.page.unwrap_or(1),
            "limit": query.limit.unwrap_or(10),
            "total": 2,
            "totalPages": 1,
        },
    })))
}

pub async fn preferences(
    State(state): State<MockState>,
    headers: HeaderMap,
) -> MockResult<Json<Value>> {
    let user = current_user(&state, &headers).await?;
    Ok(Json(Value::Object(user.preferences)))
}

/// Merges the given keys into the stored preferences
pub async fn update_preferences(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(update): Json<Map<String, Value>>,
) -> MockResult<Json<Value>> {
    let id = current_user(&state, &headers).await?.id;
    let mut store = state.write().await;
    let user = store.user_by_id_mut(id).ok_or_else(not_found)?;
    user.preferences.extend(update);
    Ok(Json(Value::Object(user.preferences.clone())))
}
