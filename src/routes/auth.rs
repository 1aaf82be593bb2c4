use axum::extract::State;
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::error::AppError;
use crate::models::UserProfile;
use crate::routes::response::{success, success_with, ApiResponse, JsonBody};
use crate::routes::session::{clear_session_cookie, session_token, set_session_cookie};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Register a new user
///
/// Validates the username and password policy, stores an Argon2id hash of
/// the password and creates the user's file root.
///
/// Returns 409 Conflict if the username is taken.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> ApiResponse<UserProfile> {
    if payload.name.is_empty() || payload.username.is_empty() || payload.password.is_empty() {
        return Err(AppError::invalid(
            "fields 'name', 'username', and 'password' are required",
        ));
    }

    let accounts = state.accounts.clone();
    let profile = tokio::task::spawn_blocking(move || {
        accounts.register(&payload.name, &payload.username, &payload.password)
    })
    .await??;

    Ok(success_with(profile))
}

/// Exchange credentials for a session cookie
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> ApiResponse<()> {
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(AppError::invalid(
            "fields 'username' and 'password' are required",
        ));
    }

    let accounts = state.accounts.clone();
    let issued = tokio::task::spawn_blocking(move || {
        accounts.login(&payload.username, &payload.password)
    })
    .await??;

    set_session_cookie(&cookies, issued.token, state.config.cookie_secure);
    Ok(success())
}

/// Revoke the current session, if any, and clear the cookie
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> ApiResponse<()> {
    if let Some(token) = session_token(&cookies) {
        let accounts = state.accounts.clone();
        tokio::task::spawn_blocking(move || accounts.logout(&token)).await??;
    }

    clear_session_cookie(&cookies);
    Ok(success())
}
