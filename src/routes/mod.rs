pub mod auth;
pub mod chats;
pub mod files;
pub mod health;
pub mod response;
pub mod session;
pub mod shares;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::AppState;

pub use health::health_check;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", get(auth::logout).post(auth::logout));

    let protected = Router::new()
        .route(
            "/api/user",
            get(users::read_self)
                .put(users::update_self)
                .delete(users::delete_self),
        )
        .route("/api/user/:username", get(users::read_user))
        .route("/api/chats", get(chats::list_chats).post(chats::create_chat))
        .route(
            "/api/chats/:chat",
            get(chats::describe_chat).delete(chats::delete_chat),
        )
        .route(
            "/api/chats/:chat/messages",
            get(chats::list_messages).post(chats::send_message),
        )
        .route(
            "/api/chats/:chat/messages/:index",
            delete(chats::delete_message),
        )
        .route("/api/files", file_routes())
        .route("/api/files/", file_routes())
        .route("/api/files/*path", file_routes())
        .route(
            "/api/shares",
            get(shares::list_shares).post(shares::create_share),
        )
        .route(
            "/api/shares/:user/*path",
            get(shares::read_share).delete(shares::delete_share),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(public)
        .merge(protected)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(CookieManagerLayer::new())
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn file_routes() -> axum::routing::MethodRouter<AppState> {
    get(files::read_entry)
        .post(files::create_entry)
        .put(files::update_entry)
        .delete(files::delete_entry)
}

async fn route_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": "error",
            "reason": "route not found",
        })),
    )
}

/// Configure CORS from the allowed origins
///
/// `*` allows any origin without credentials; an explicit list also allows
/// the session cookie to be sent cross-origin.
fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid origin in ALLOWED_ORIGINS: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
