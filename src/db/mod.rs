mod from_row;
pub mod queries;
mod schema;

pub use schema::{init_audit_db, init_db};

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding database pools and configuration
#[derive(Clone)]
pub struct AppState {
    /// Main database pool (users, codes, entitlements, claims)
    pub db: DbPool,
    /// Audit log database pool (separate file to isolate growth)
    pub audit: DbPool,
    /// Base URL for building download links (e.g., https://api.example.com)
    pub base_url: String,
    pub audit_log_enabled: bool,
    /// Asset token signing secret. None = downloads fail closed.
    pub download_token_secret: Option<String>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        // Writers block instead of failing under concurrent redemptions
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")
    });
    Pool::builder().max_size(10).build(manager)
}
