use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::Arc;

use warden::{
    auth::password::{HashConfig, PasswordHasher},
    db::{
        CredentialStore, CredentialTx, MemoryStore, RefreshRecord, StoreError, StoreResult,
        User,
    },
    types::UserId,
    AppState, TokenConfig, WardenConfig,
};

const SECRET: &str = "api-tests-signing-secret-0123456789abcdef";

// ============= Test Setup =============

fn cheap_hasher() -> PasswordHasher {
    PasswordHasher::new(HashConfig {
        min_length: 8,
        iterations: 1,
        memory_kib: 64,
        parallelism: 1,
    })
    .unwrap()
}

fn create_test_app(store: Arc<dyn CredentialStore>) -> axum::Router {
    let state = AppState::new(
        WardenConfig::default(),
        store,
        TokenConfig::new(SECRET),
        cheap_hasher(),
    );
    warden::api::routes::app(state)
}

/// Create a test server backed by a fresh in-memory store
fn create_test_server() -> (TestServer, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let server =
        TestServer::new(create_test_app(store.clone())).expect("Failed to create test server");
    (server, store)
}

async fn register(server: &TestServer, email: &str) -> Value {
    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "email": email,
            "password": "password123",
            "full_name": "Test User"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

async fn login(server: &TestServer, email: &str) -> Value {
    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": email, "password": "password123" }))
        .await;
    response.assert_status_ok();
    response.json()
}

fn bearer(token: &Value) -> String {
    format!("Bearer {}", token.as_str().unwrap())
}

// ============= Health Check Tests =============

#[tokio::test]
async fn test_health_check() {
    let (server, _) = create_test_server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({
        "status": "healthy",
        "environment": "development"
    }));
}

#[tokio::test]
async fn test_ready_check() {
    let (server, _) = create_test_server();
    server.get("/ready").await.assert_status_ok();
}

#[tokio::test]
async fn test_ready_reports_database_down() {
    let server = TestServer::new(create_test_app(Arc::new(UnreachableStore))).unwrap();

    let response = server.get("/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    response.assert_json(&json!({ "error": "database unavailable" }));
}

#[tokio::test]
async fn test_unknown_route() {
    let (server, _) = create_test_server();

    let response = server.get("/api/v1/nothing-here").await;
    response.assert_status_not_found();
    response.assert_json(&json!({ "error": "route not found" }));
}

#[tokio::test]
async fn test_openapi_document() {
    let (server, _) = create_test_server();

    let response = server.get("/api-docs/openapi.json").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["paths"]["/api/v1/auth/login"].is_object());
    assert!(body["paths"]["/api/v1/users/me"].is_object());
}

// ============= Registration Tests =============

#[tokio::test]
async fn test_register_user() {
    let (server, _) = create_test_server();

    let body = register(&server, "test@example.com").await;

    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 900);
    assert_eq!(body["user"]["email"], "test@example.com");
    assert_eq!(body["user"]["is_admin"], false);
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_accepts_name_alias() {
    let (server, _) = create_test_server();

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "email": "alias@example.com",
            "password": "password123",
            "name": "Alias User"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["user"]["full_name"], "Alias User");
}

#[tokio::test]
async fn test_register_normalizes_email() {
    let (server, _) = create_test_server();

    let body = register(&server, "  Mixed.Case@Example.COM ").await;
    assert_eq!(body["user"]["email"], "mixed.case@example.com");

    login(&server, "mixed.case@example.com").await;
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let (server, _) = create_test_server();
    register(&server, "dup@example.com").await;

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "email": "dup@example.com",
            "password": "password456",
            "full_name": "Someone Else"
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    response.assert_json(&json!({ "error": "email already registered" }));
}

#[tokio::test]
async fn test_register_weak_password() {
    let (server, store) = create_test_server();

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "email": "weak@example.com",
            "password": "short",
            "full_name": "Weak"
        }))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains('8'));
    assert!(store.find_user_by_email("weak@example.com").await.is_err());
}

#[tokio::test]
async fn test_register_invalid_input() {
    let (server, _) = create_test_server();

    for payload in [
        json!({ "email": "not-an-email", "password": "password123", "full_name": "X" }),
        json!({ "email": "", "password": "password123", "full_name": "X" }),
        json!({ "email": "x@example.com", "password": "password123", "full_name": "  " }),
    ] {
        server
            .post("/api/v1/auth/register")
            .json(&payload)
            .await
            .assert_status_bad_request();
    }
}

// ============= Login Tests =============

#[tokio::test]
async fn test_register_and_login() {
    let (server, _) = create_test_server();
    let registered = register(&server, "login_test@example.com").await;

    let body = login(&server, "login_test@example.com").await;

    assert!(body["access_token"].is_string());
    assert_eq!(body["user"]["id"], registered["user"]["id"]);
    assert_ne!(body["refresh_token"], registered["refresh_token"]);
}

#[tokio::test]
async fn test_login_failures_look_the_same() {
    let (server, _) = create_test_server();
    register(&server, "known@example.com").await;

    let wrong_password = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "known@example.com", "password": "wrongpassword" }))
        .await;
    let unknown_email = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "unknown@example.com", "password": "password123" }))
        .await;

    wrong_password.assert_status_unauthorized();
    unknown_email.assert_status_unauthorized();
    assert_eq!(wrong_password.text(), unknown_email.text());
    wrong_password.assert_json(&json!({ "error": "unauthorized" }));
}

#[tokio::test]
async fn test_login_requires_password() {
    let (server, _) = create_test_server();

    server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "a@example.com", "password": "" }))
        .await
        .assert_status_bad_request();
}

// ============= Refresh & Logout Tests =============

#[tokio::test]
async fn test_refresh_rotates_token() {
    let (server, _) = create_test_server();
    let registered = register(&server, "refresh@example.com").await;

    let response = server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": registered["refresh_token"] }))
        .await;
    response.assert_status_ok();
    let rotated: Value = response.json();
    assert_ne!(rotated["refresh_token"], registered["refresh_token"]);

    // The consumed token cannot be replayed
    let replay = server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": registered["refresh_token"] }))
        .await;
    replay.assert_status_unauthorized();
    replay.assert_json(&json!({ "error": "unauthorized" }));
}

#[tokio::test]
async fn test_refresh_requires_token() {
    let (server, _) = create_test_server();

    server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": "" }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_refresh_with_access_token_fails() {
    let (server, _) = create_test_server();
    let registered = register(&server, "mixup@example.com").await;

    server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": registered["access_token"] }))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_logout() {
    let (server, _) = create_test_server();
    let registered = register(&server, "logout@example.com").await;

    let response = server
        .post("/api/v1/auth/logout")
        .json(&json!({ "refresh_token": registered["refresh_token"] }))
        .await;
    response.assert_status_ok();
    response.assert_json(&json!({ "message": "logged out successfully" }));

    server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": registered["refresh_token"] }))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_logout_unknown_token_still_succeeds() {
    let (server, _) = create_test_server();

    let response = server
        .post("/api/v1/auth/logout")
        .json(&json!({ "refresh_token": "never-issued" }))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({ "message": "logged out successfully" }));
}

// ============= Protected Route Tests =============

#[tokio::test]
async fn test_me_requires_auth() {
    let (server, _) = create_test_server();

    let response = server.get("/api/v1/users/me").await;
    response.assert_status_unauthorized();
    response.assert_json(&json!({ "error": "unauthorized" }));

    server
        .get("/api/v1/users/me")
        .add_header("Authorization", "Bearer not-a-jwt")
        .await
        .assert_status_unauthorized();

    server
        .get("/api/v1/users/me")
        .add_header("Authorization", "Basic dXNlcjpwYXNz")
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_me_returns_profile() {
    let (server, _) = create_test_server();
    let registered = register(&server, "me@example.com").await;

    let response = server
        .get("/api/v1/users/me")
        .add_header("Authorization", bearer(&registered["access_token"]))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["email"], "me@example.com");
    assert_eq!(body["full_name"], "Test User");
    assert!(body["created_at"].is_string());
}

#[tokio::test]
async fn test_me_rejects_refresh_token() {
    let (server, _) = create_test_server();
    let registered = register(&server, "me2@example.com").await;

    server
        .get("/api/v1/users/me")
        .add_header("Authorization", bearer(&registered["refresh_token"]))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_bearer_scheme_is_case_insensitive() {
    let (server, _) = create_test_server();
    let registered = register(&server, "case@example.com").await;
    let token = registered["access_token"].as_str().unwrap();

    server
        .get("/api/v1/users/me")
        .add_header("Authorization", format!("bearer {}", token))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_admin_lookup() {
    let (server, store) = create_test_server();
    let user = register(&server, "user@example.com").await;
    let admin = register(&server, "admin@example.com").await;
    let admin_id = admin["user"]["id"].as_i64().unwrap();
    let user_id = user["user"]["id"].as_i64().unwrap();

    // Admin rights are read from the token, so log in again after granting them
    store.set_admin(admin_id, true).await.unwrap();
    let admin = login(&server, "admin@example.com").await;
    assert_eq!(admin["user"]["is_admin"], true);

    let path = format!("/api/v1/users/{}", user_id);

    server.get(&path).await.assert_status_unauthorized();

    let forbidden = server
        .get(&path)
        .add_header("Authorization", bearer(&user["access_token"]))
        .await;
    forbidden.assert_status(StatusCode::FORBIDDEN);
    forbidden.assert_json(&json!({ "error": "forbidden" }));

    let found = server
        .get(&path)
        .add_header("Authorization", bearer(&admin["access_token"]))
        .await;
    found.assert_status_ok();
    assert_eq!(found.json::<Value>()["email"], "user@example.com");

    server
        .get("/api/v1/users/9999")
        .add_header("Authorization", bearer(&admin["access_token"]))
        .await
        .assert_status_not_found();
}

// ============= Store Doubles =============

/// A store whose backend is gone.
struct UnreachableStore;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::Storage("connection refused".to_string()))
}

#[async_trait]
impl CredentialStore for UnreachableStore {
    async fn begin(&self) -> StoreResult<Box<dyn CredentialTx>> {
        down()
    }

    async fn find_user_by_email(&self, _email: &str) -> StoreResult<User> {
        down()
    }

    async fn find_user_by_id(&self, _id: UserId) -> StoreResult<User> {
        down()
    }

    async fn update_password_hash(&self, _id: UserId, _password_hash: &str) -> StoreResult<()> {
        down()
    }

    async fn find_refresh_record(&self, _token: &str) -> StoreResult<RefreshRecord> {
        down()
    }

    async fn delete_refresh_record(&self, _token: &str) -> StoreResult<()> {
        down()
    }

    async fn purge_expired_refresh_records(&self) -> StoreResult<u64> {
        down()
    }

    async fn ping(&self) -> StoreResult<()> {
        down()
    }
}

#[tokio::test]
async fn test_storage_failure_is_opaque() {
    let server = TestServer::new(create_test_app(Arc::new(UnreachableStore))).unwrap();

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "a@example.com", "password": "password123" }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({ "error": "internal server error" }));
}
