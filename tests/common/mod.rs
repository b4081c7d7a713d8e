//! Test utilities and fixtures for Bookperks integration tests

#![allow(dead_code)]

use axum::routing::{get, post};
use axum::Router;
use rusqlite::Connection;
use uuid::Uuid;

pub use bookperks::crypto::generate_admin_key;
pub use bookperks::db::{create_pool, init_audit_db, init_db, queries, AppState};
pub use bookperks::handlers;
pub use bookperks::handlers::public::{
    download_asset, get_claim, get_entitlements, redeem_code, submit_claim,
};
pub use bookperks::models::*;

pub const TEST_TOKEN_SECRET: &str = "test-download-secret";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create an AppState backed by temp-file databases.
///
/// File-backed rather than in-memory so every pooled connection sees the
/// same data - required for the concurrency tests, harmless elsewhere.
pub fn create_test_app_state() -> AppState {
    let db_path = std::env::temp_dir().join(format!("bookperks-test-{}.db", Uuid::new_v4()));
    let audit_path =
        std::env::temp_dir().join(format!("bookperks-test-audit-{}.db", Uuid::new_v4()));

    let pool = create_pool(db_path.to_str().expect("utf8 temp path")).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    let audit_pool = create_pool(audit_path.to_str().expect("utf8 temp path")).unwrap();
    {
        let conn = audit_pool.get().unwrap();
        init_audit_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        audit: audit_pool,
        base_url: "http://localhost:3000".to_string(),
        audit_log_enabled: true,
        download_token_secret: Some(TEST_TOKEN_SECRET.to_string()),
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn future_timestamp(days: i64) -> i64 {
    now() + days * 86400
}

pub fn past_timestamp(days: i64) -> i64 {
    now() - days * 86400
}

/// Create a test user mirror row
pub fn create_test_user(conn: &Connection, subject: &str) -> User {
    queries::upsert_user(conn, subject, &format!("{}@example.com", subject))
        .expect("Failed to create test user")
}

/// Create a test admin; returns the admin and its raw API key
pub fn create_test_admin(conn: &Connection, email: &str, role: AdminRole) -> (Admin, String) {
    let key = generate_admin_key();
    let admin = queries::create_admin(
        conn,
        &CreateAdmin {
            email: email.to_string(),
            name: format!("Test Admin {}", email),
            role,
        },
        &key,
    )
    .expect("Failed to create test admin");
    (admin, key)
}

/// Generate a batch of test codes
pub fn create_test_codes(
    conn: &mut Connection,
    code_type: CodeType,
    count: i64,
    max_redemptions: Option<i64>,
    valid_until: Option<i64>,
) -> Vec<VipCode> {
    queries::generate_codes(
        conn,
        &CreateCodeBatch {
            count,
            code_type,
            max_redemptions,
            valid_until,
            description: None,
        },
    )
    .expect("Failed to generate test codes")
}

/// Submit a test claim (pending, with its pending receipt)
pub fn create_test_claim(conn: &mut Connection, user_id: &str) -> (BonusClaim, Receipt) {
    queries::create_claim(
        conn,
        user_id,
        "delivery@example.com",
        "uploads/test-receipt.pdf",
    )
    .expect("Failed to create test claim")
}

/// Public API router without rate limiting (governor needs peer IPs that
/// oneshot requests don't carry)
pub fn public_app(state: AppState) -> Router {
    Router::new()
        .route("/redeem", post(redeem_code))
        .route("/entitlements", get(get_entitlements))
        .route("/claims", post(submit_claim))
        .route("/claims/{claim_id}", get(get_claim))
        .route("/assets/{asset_id}", get(download_asset))
        .with_state(state)
}

/// Admin API router with its real auth middleware
pub fn admin_app(state: AppState) -> Router {
    handlers::admin::router(state.clone()).with_state(state)
}

/// Read a JSON response body
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("Response should be valid JSON")
}

/// Read a response body as text
pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).expect("Response should be UTF-8")
}
