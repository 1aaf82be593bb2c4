//! Integration tests for the BookPi Server API
//!
//! These tests drive the full router: session cookies, JSON envelopes,
//! multipart uploads and downloads, backed by a real redb file.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use bookpi_server::security::HashParams;
use bookpi_server::{open_database, router, AppState, Config};

const PASSWORD: &str = "Secur3!ty";
const BOUNDARY: &str = "bookpi-test-boundary";

// =============================================================================
// Test Helpers
// =============================================================================

/// Create a test configuration rooted in a temporary directory
fn test_config(temp_dir: &TempDir) -> Config {
    Config {
        server_port: 0,
        database_path: temp_dir.path().join("test.db"),
        files_directory: temp_dir.path().join("files"),
        environment: "test".to_string(),
        // Cheap parameters keep registration and login fast
        hash_params: HashParams {
            memory_cost: 64,
            iterations: 1,
            parallelism: 1,
            ..HashParams::default()
        },
        ..Config::default()
    }
}

/// Create a test app router over a fresh database
fn create_test_app(temp_dir: &TempDir) -> Router {
    let config = test_config(temp_dir);
    std::fs::create_dir_all(&config.files_directory).unwrap();
    let store = open_database(&config.database_path).expect("Failed to create test database");
    router(AppState::new(store, config))
}

/// Send a request, returning status, session cookie (if set) and raw body
async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("bp-id="))
        .map(|v| v.split(';').next().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, cookie, bytes.to_vec())
}

/// Send a request and parse the response envelope
async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn upload_request(uri: &str, cookie: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .unwrap()
}

async fn register(app: &Router, name: &str, username: &str) {
    let (status, body) = send_json(
        app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "name": name, "username": username, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register {}: {}", username, body);
}

/// Log in and return the `bp-id=...` cookie pair
async fn login(app: &Router, username: &str) -> String {
    let (status, cookie, _) = send(
        app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": username, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    cookie.expect("login must set the session cookie")
}

async fn register_and_login(app: &Router, name: &str, username: &str) -> String {
    register(app, name, username).await;
    login(app, username).await
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check_returns_healthy() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);

    let (status, body) = send_json(&app, empty_request("GET", "/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_unknown_route_uses_error_envelope() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);

    let (status, body) = send_json(&app, empty_request("GET", "/api/nothing-here", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert_eq!(body["reason"], "route not found");
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[tokio::test]
async fn test_register_login_logout_flow() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);

    register(&app, "Alice", "alice").await;
    let cookie = login(&app, "alice").await;

    let (status, body) = send_json(&app, empty_request("GET", "/api/user", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"], json!({ "name": "Alice", "username": "alice" }));

    let (status, _, _) = send(&app, empty_request("POST", "/api/auth/logout", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(&app, empty_request("GET", "/api/user", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "invalid session");
}

#[tokio::test]
async fn test_login_wrong_password_issues_no_session() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);
    register(&app, "Alice", "alice").await;

    for username in ["alice", "nobody"] {
        let (status, cookie, bytes) = send(
            &app,
            json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "username": username, "password": "Wr0ng!password" }),
            ),
        )
        .await;
        let body: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["reason"], "invalid username or password");
        assert!(cookie.is_none());
    }
}

#[tokio::test]
async fn test_register_validation_and_conflict() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);

    let cases = [
        json!({ "name": "Alice", "username": "alice" }),
        json!({ "name": "Alice", "username": "a!", "password": PASSWORD }),
        json!({ "name": "Alice", "username": "alice", "password": "short1!" }),
        json!({ "name": "Alice", "username": "alice", "password": "NoDigits!!" }),
    ];
    for case in cases {
        let (status, body) =
            send_json(&app, json_request("POST", "/api/auth/register", None, case)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(body["status"], "error");
    }

    register(&app, "Alice", "alice").await;
    let (status, body) = send_json(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "name": "Other", "username": "alice", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "specified username is already in use");
}

#[tokio::test]
async fn test_invalid_json_body() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid json format for request body");
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);

    let (status, body) = send_json(&app, empty_request("GET", "/api/files", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "no session present");

    let (status, body) =
        send_json(&app, empty_request("GET", "/api/chats", Some("bp-id=garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "invalid session");
}

#[tokio::test]
async fn test_profile_update() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);
    let cookie = register_and_login(&app, "Alice", "alice").await;

    let (status, body) = send_json(
        &app,
        json_request("PUT", "/api/user", Some(&cookie), json!({ "name": "Alice L" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Alice L");

    // The session sees the change without logging in again
    let (_, body) = send_json(&app, empty_request("GET", "/api/user/alice", Some(&cookie))).await;
    assert_eq!(body["data"]["name"], "Alice L");

    let (status, _) = send_json(
        &app,
        empty_request("GET", "/api/user/nobody", Some(&cookie)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// File Tests
// =============================================================================

#[tokio::test]
async fn test_upload_list_download() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);
    let cookie = register_and_login(&app, "Alice", "alice").await;

    let (status, body) = send_json(
        &app,
        upload_request("/api/files", &cookie, "notes.txt", b"remember the milk"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], "notes.txt");
    assert_eq!(body["data"]["size"], 17);

    let (status, body) = send_json(&app, empty_request("GET", "/api/files/", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["root"], true);
    let children = body["data"]["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["name"], "notes.txt");
    assert_eq!(children[0]["directory"], false);

    let (status, _, bytes) = send(
        &app,
        empty_request("GET", "/api/files/notes.txt?download", Some(&cookie)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"remember the milk");

    // Uploading the same name again never overwrites
    let (status, _) = send_json(
        &app,
        upload_request("/api/files", &cookie, "notes.txt", b"other"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_directories_rename_move_delete() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);
    let cookie = register_and_login(&app, "Alice", "alice").await;

    let (status, _) = send_json(
        &app,
        empty_request("POST", "/api/files/docs?directory", Some(&cookie)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    send_json(&app, upload_request("/api/files", &cookie, "a.txt", b"a")).await;

    let (status, body) = send_json(
        &app,
        json_request(
            "PUT",
            "/api/files/a.txt",
            Some(&cookie),
            json!({ "filename": "b.txt", "path": "docs" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "cannot change path and filename at the same time");

    let (status, _) = send_json(
        &app,
        json_request("PUT", "/api/files/a.txt", Some(&cookie), json!({ "filename": "b.txt" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(
        &app,
        json_request("PUT", "/api/files/b.txt", Some(&cookie), json!({ "path": "docs" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["path"], "/docs/b.txt");

    let (_, body) = send_json(&app, empty_request("GET", "/api/files/docs", Some(&cookie))).await;
    assert_eq!(body["data"]["root"], false);
    assert_eq!(body["data"]["children"][0]["name"], "b.txt");

    let (status, body) =
        send_json(&app, empty_request("DELETE", "/api/files/", Some(&cookie))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "error");

    let (status, _) =
        send_json(&app, empty_request("DELETE", "/api/files/docs", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) =
        send_json(&app, empty_request("GET", "/api/files/docs", Some(&cookie))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_traversal_stays_inside_user_root() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);
    let alice = register_and_login(&app, "Alice", "alice").await;
    let bob = register_and_login(&app, "Bob", "bob").await;

    send_json(&app, upload_request("/api/files", &bob, "secret.txt", b"bob only")).await;

    // Percent-encoded `../bob/secret.txt` resolves inside alice's root
    let (status, _) = send_json(
        &app,
        empty_request("GET", "/api/files/..%2Fbob%2Fsecret.txt", Some(&alice)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(
        &app,
        empty_request(
            "GET",
            "/api/files/..%2F..%2Ffiles%2Fbob%2Fsecret.txt?download",
            Some(&alice),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Share Tests
// =============================================================================

#[tokio::test]
async fn test_share_flow() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);
    let alice = register_and_login(&app, "Alice", "alice").await;
    let bob = register_and_login(&app, "Bob", "bob").await;
    let carol = register_and_login(&app, "Carol", "carol").await;

    send_json(&app, upload_request("/api/files", &alice, "notes.txt", b"shared")).await;

    let (status, body) = send_json(
        &app,
        json_request(
            "POST",
            "/api/shares",
            Some(&alice),
            json!({ "file": "notes.txt", "to": "bob" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"], "alice/notes.txt");

    let (status, _) = send_json(
        &app,
        json_request(
            "POST",
            "/api/shares",
            Some(&alice),
            json!({ "file": "notes.txt", "to": "bob" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send_json(&app, empty_request("GET", "/api/shares", Some(&bob))).await;
    assert_eq!(body["data"], json!(["alice/notes.txt"]));

    let (status, _, bytes) = send(
        &app,
        empty_request("GET", "/api/shares/alice/notes.txt", Some(&bob)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"shared");

    let (status, body) = send_json(
        &app,
        empty_request("GET", "/api/shares/alice/notes.txt", Some(&carol)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "file not shared with requesting user");

    let (_, body) = send_json(
        &app,
        empty_request("GET", "/api/shares/alice/notes.txt?describe", Some(&alice)),
    )
    .await;
    assert_eq!(body["data"], json!(["bob"]));

    let (status, _) = send_json(
        &app,
        empty_request("GET", "/api/shares/alice/notes.txt?describe", Some(&bob)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Deleting the file drops the share
    let (status, _) =
        send_json(&app, empty_request("DELETE", "/api/files/notes.txt", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_json(&app, empty_request("GET", "/api/shares", Some(&bob))).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_remove_viewer() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);
    let alice = register_and_login(&app, "Alice", "alice").await;
    let bob = register_and_login(&app, "Bob", "bob").await;

    send_json(&app, upload_request("/api/files", &alice, "notes.txt", b"x")).await;
    send_json(
        &app,
        json_request(
            "POST",
            "/api/shares",
            Some(&alice),
            json!({ "file": "notes.txt", "to": "bob" }),
        ),
    )
    .await;

    let (status, _) = send_json(
        &app,
        empty_request("DELETE", "/api/shares/alice/notes.txt?user=bob", Some(&bob)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send_json(
        &app,
        empty_request("DELETE", "/api/shares/alice/notes.txt?user=bob", Some(&alice)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &app,
        empty_request("GET", "/api/shares/alice/notes.txt", Some(&bob)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The share went away with its last viewer
    let (status, _) = send_json(
        &app,
        empty_request("GET", "/api/shares/alice/notes.txt?describe", Some(&alice)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Chat Tests
// =============================================================================

#[tokio::test]
async fn test_chat_flow() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);
    let alice = register_and_login(&app, "Alice", "alice").await;
    let bob = register_and_login(&app, "Bob", "bob").await;
    let carol = register_and_login(&app, "Carol", "carol").await;

    let (status, body) = send_json(
        &app,
        json_request(
            "POST",
            "/api/chats",
            Some(&alice),
            json!({ "to": "bob", "message": "hi bob" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let chat_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = send_json(&app, empty_request("GET", "/api/chats", Some(&bob))).await;
    assert_eq!(body["data"], json!([chat_id]));

    let (status, _) = send_json(
        &app,
        json_request(
            "POST",
            &format!("/api/chats/{}/messages", chat_id),
            Some(&bob),
            json!({ "message": "hello alice" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_json(
        &app,
        empty_request("GET", &format!("/api/chats/{}/messages", chat_id), Some(&alice)),
    )
    .await;
    let messages = body["data"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["sender"], "bob");

    let (status, body) = send_json(
        &app,
        empty_request("GET", &format!("/api/chats/{}", chat_id), Some(&carol)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "user not in specified chat");

    let (status, body) =
        send_json(&app, empty_request("GET", "/api/chats/not-a-uuid", Some(&alice))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid chat id format");

    let (status, _) = send_json(
        &app,
        json_request(
            "POST",
            "/api/chats",
            Some(&alice),
            json!({ "to": "alice", "message": "me" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &app,
        empty_request("DELETE", &format!("/api/chats/{}", chat_id), Some(&bob)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_json(&app, empty_request("GET", "/api/chats", Some(&alice))).await;
    assert_eq!(body["data"], json!([]));
}

// =============================================================================
// Account Deletion Tests
// =============================================================================

#[tokio::test]
async fn test_delete_account_cascades() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_test_app(&temp_dir);
    let alice = register_and_login(&app, "Alice", "alice").await;
    let bob = register_and_login(&app, "Bob", "bob").await;

    send_json(&app, upload_request("/api/files", &alice, "notes.txt", b"x")).await;
    send_json(
        &app,
        json_request(
            "POST",
            "/api/shares",
            Some(&alice),
            json!({ "file": "notes.txt", "to": "bob" }),
        ),
    )
    .await;
    send_json(
        &app,
        json_request(
            "POST",
            "/api/chats",
            Some(&bob),
            json!({ "to": "alice", "message": "hey" }),
        ),
    )
    .await;

    let (status, _, _) = send(&app, empty_request("DELETE", "/api/user", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(&app, empty_request("GET", "/api/user", Some(&alice))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) =
        send_json(&app, empty_request("GET", "/api/user/alice", Some(&bob))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send_json(&app, empty_request("GET", "/api/chats", Some(&bob))).await;
    assert_eq!(body["data"], json!([]));
    let (_, body) = send_json(&app, empty_request("GET", "/api/shares", Some(&bob))).await;
    assert_eq!(body["data"], json!([]));

    assert!(!temp_dir.path().join("files").join("alice").exists());

    // The name is free again and starts with an empty root
    let alice = register_and_login(&app, "Alice", "alice").await;
    let (_, body) = send_json(&app, empty_request("GET", "/api/files", Some(&alice))).await;
    assert_eq!(body["data"]["children"], json!([]));
}
