use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::error::AppError;
use crate::models::UserProfile;
use crate::routes::response::{success, success_with, ApiResponse, JsonBody};
use crate::routes::session::{clear_session_cookie, CurrentUser};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Profile of the logged-in user
pub async fn read_self(Extension(current): Extension<CurrentUser>) -> ApiResponse<UserProfile> {
    Ok(success_with(UserProfile::from(&current.user)))
}

/// Public profile of any user
pub async fn read_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResponse<UserProfile> {
    let accounts = state.accounts.clone();
    let profile = tokio::task::spawn_blocking(move || accounts.profile(&username)).await??;
    Ok(success_with(profile))
}

/// Change the logged-in user's name and/or password
pub async fn update_self(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> ApiResponse<UserProfile> {
    if payload.name.is_none() && payload.password.is_none() {
        return Err(AppError::invalid(
            "at least one of fields 'name' and 'password' is required",
        ));
    }

    let accounts = state.accounts.clone();
    let profile = tokio::task::spawn_blocking(move || {
        accounts.update_profile(
            current.username(),
            payload.name.as_deref(),
            payload.password.as_deref(),
        )
    })
    .await??;

    Ok(success_with(profile))
}

/// Delete the logged-in user's account and everything attached to it
///
/// # Note
/// This action is irreversible. Chats, shares and stored files are removed.
pub async fn delete_self(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    cookies: Cookies,
) -> ApiResponse<()> {
    let accounts = state.accounts.clone();
    tokio::task::spawn_blocking(move || accounts.delete_account(current.username())).await??;

    clear_session_cookie(&cookies);
    Ok(success())
}
