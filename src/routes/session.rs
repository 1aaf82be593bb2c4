use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_cookies::{cookie::SameSite, Cookie, Cookies};

use crate::constants::{SESSION_COOKIE, SESSION_TTL_HOURS};
use crate::error::{AppError, Result};
use crate::models::User;
use crate::AppState;

/// The authenticated user, inserted into request extensions by [`require_session`]
#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
}

impl CurrentUser {
    pub fn username(&self) -> &str {
        &self.user.username
    }
}

/// Reject requests without a live session and attach the session's user
pub async fn require_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = session_token(&cookies).ok_or(AppError::Unauthorized)?;

    let accounts = state.accounts.clone();
    let user = tokio::task::spawn_blocking(move || accounts.authenticate(&token)).await??;

    request.extensions_mut().insert(CurrentUser { user });
    Ok(next.run(request).await)
}

pub fn session_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

pub fn set_session_cookie(cookies: &Cookies, token: String, secure: bool) {
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(SESSION_TTL_HOURS))
        .build();
    cookies.add(cookie);
}

/// Overwrite the session cookie with an expired, empty one
pub fn clear_session_cookie(cookies: &Cookies) {
    cookies.remove(Cookie::build(SESSION_COOKIE).path("/").build());
}
