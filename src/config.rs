use std::env;

/// Per-tier rate limits (requests per minute), applied per client IP.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub strict_rpm: u32,
    pub standard_rpm: u32,
    pub relaxed_rpm: u32,
}

impl RateLimitConfig {
    fn from_env() -> Self {
        fn rpm(var: &str, default: u32) -> u32 {
            env::var(var)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        Self {
            strict_rpm: rpm("RATE_LIMIT_STRICT_RPM", 10),
            standard_rpm: rpm("RATE_LIMIT_STANDARD_RPM", 30),
            relaxed_rpm: rpm("RATE_LIMIT_RELAXED_RPM", 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub audit_database_path: String,
    pub base_url: String,
    /// Secret for signing asset download tokens. Absent = downloads fail closed.
    pub download_token_secret: Option<String>,
    pub bootstrap_admin_email: Option<String>,
    pub audit_log_enabled: bool,
    pub audit_log_retention_days: i64,
    pub rate_limit: RateLimitConfig,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("BOOKPERKS_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "bookperks.db".to_string()),
            audit_database_path: env::var("AUDIT_DATABASE_PATH")
                .unwrap_or_else(|_| "bookperks_audit.db".to_string()),
            base_url,
            download_token_secret: env::var("BOOKPERKS_DOWNLOAD_TOKEN_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            bootstrap_admin_email: env::var("BOOKPERKS_BOOTSTRAP_ADMIN_EMAIL").ok(),
            audit_log_enabled: env::var("AUDIT_LOG_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            audit_log_retention_days: env::var("AUDIT_LOG_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            rate_limit: RateLimitConfig::from_env(),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
