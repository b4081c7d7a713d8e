use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::time::Duration;

use bookperks::config::Config;
use bookperks::crypto::generate_admin_key;
use bookperks::db::{create_pool, init_audit_db, init_db, queries, AppState};
use bookperks::handlers;
use bookperks::models::{ActorType, AdminRole, CodeType, CreateAdmin, CreateCodeBatch};

#[derive(Parser, Debug)]
#[command(name = "bookperks")]
#[command(about = "VIP code redemption and bonus entitlement service for the book launch")]
struct Cli {
    /// Seed the database with dev data (admin, sample code batches)
    #[arg(long)]
    seed: bool,

    /// Delete databases on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,

    /// Generate a batch of VIP codes and exit without starting the server
    #[arg(long, value_name = "COUNT")]
    generate_codes: Option<i64>,

    /// Code type for --generate-codes
    #[arg(long, default_value = "bonus", requires = "generate_codes")]
    code_type: String,

    /// Redemption ceiling per code for --generate-codes (omit for unlimited)
    #[arg(long, requires = "generate_codes")]
    max_redemptions: Option<i64>,

    /// Expiry for --generate-codes, RFC 3339 (omit for no expiry)
    #[arg(long, requires = "generate_codes")]
    valid_until: Option<String>,

    /// Free-form note stored on each code in the batch
    #[arg(long, requires = "generate_codes")]
    description: Option<String>,

    /// Write generated codes to this file instead of stdout
    #[arg(long, requires = "generate_codes")]
    export: Option<String>,
}

/// One-shot batch generation from the command line; prints one code per
/// line so the output pipes straight into mailing tools.
fn run_generate_codes(cli: &Cli, count: i64) {
    let config = Config::from_env();

    let code_type: CodeType = cli.code_type.parse().unwrap_or_else(|_| {
        eprintln!("Unknown code type: {}", cli.code_type);
        std::process::exit(1);
    });

    let valid_until = cli.valid_until.as_deref().map(|s| {
        chrono::DateTime::parse_from_rfc3339(s)
            .unwrap_or_else(|e| {
                eprintln!("Invalid --valid-until (expected RFC 3339): {}", e);
                std::process::exit(1);
            })
            .timestamp()
    });

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let input = CreateCodeBatch {
        count,
        code_type,
        max_redemptions: cli.max_redemptions,
        valid_until,
        description: cli.description.clone(),
    };

    let mut conn = db_pool.get().expect("Failed to get connection");
    let codes = queries::generate_codes(&mut conn, &input).unwrap_or_else(|e| {
        eprintln!("Code generation failed: {}", e);
        std::process::exit(1);
    });

    let lines: String = codes
        .iter()
        .map(|c| c.code.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        + "\n";

    match &cli.export {
        Some(path) => {
            std::fs::write(path, &lines).unwrap_or_else(|e| {
                eprintln!("Failed to write {}: {}", path, e);
                std::process::exit(1);
            });
            eprintln!(
                "Generated {} {} codes (batch {}) -> {}",
                codes.len(),
                code_type.as_str(),
                codes[0].batch_id,
                path
            );
        }
        None => {
            eprintln!(
                "Generated {} {} codes (batch {}):",
                codes.len(),
                code_type.as_str(),
                codes[0].batch_id
            );
            print!("{}", lines);
        }
    }
}

fn bootstrap_admin(state: &AppState, email: &str) {
    let conn = state.db.get().expect("Failed to get db connection for bootstrap");
    let audit_conn = state.audit.get().expect("Failed to get audit db connection");

    let count = queries::count_admins(&conn).expect("Failed to count admins");
    if count > 0 {
        tracing::info!("Admins already exist, skipping bootstrap");
        return;
    }

    let api_key = generate_admin_key();
    let input = CreateAdmin {
        email: email.to_string(),
        name: "Bootstrap Admin".to_string(),
        role: AdminRole::Owner,
    };
    let admin =
        queries::create_admin(&conn, &input, &api_key).expect("Failed to create bootstrap admin");

    queries::create_audit_log(
        &audit_conn,
        state.audit_log_enabled,
        ActorType::System,
        None,
        "admin.bootstrap",
        "admin",
        &admin.id,
        Some(&serde_json::json!({ "email": email, "role": "owner" })),
        None,
        None,
    )
    .expect("Failed to create audit log for bootstrap");

    tracing::info!("============================================");
    tracing::info!("BOOTSTRAP ADMIN CREATED");
    tracing::info!("Email: {}", email);
    tracing::info!("API Key: {}", api_key);
    tracing::info!("============================================");
    tracing::info!("SAVE THIS API KEY - IT WILL NOT BE SHOWN AGAIN");
    tracing::info!("============================================");
}

/// Seeds the database with dev data for local testing.
/// Creates an owner admin plus small preview and bonus code batches.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let count = queries::count_admins(&conn).expect("Failed to count admins");
    if count > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let admin_key = generate_admin_key();
    let admin = queries::create_admin(
        &conn,
        &CreateAdmin {
            email: "dev@bookperks.local".to_string(),
            name: "Dev Admin".to_string(),
            role: AdminRole::Owner,
        },
        &admin_key,
    )
    .expect("Failed to create dev admin");

    tracing::info!("Admin: {} ({})", admin.email, admin.name);
    tracing::info!("Admin API Key: {}", admin_key);
    tracing::info!("");

    drop(conn);
    let mut conn = state.db.get().expect("Failed to get db connection for seeding");

    for (code_type, count) in [(CodeType::Preview, 3), (CodeType::Bonus, 3)] {
        let codes = queries::generate_codes(
            &mut conn,
            &CreateCodeBatch {
                count,
                code_type,
                max_redemptions: Some(1),
                valid_until: None,
                description: Some("dev seed".to_string()),
            },
        )
        .expect("Failed to seed codes");

        tracing::info!("{} codes ({}):", code_type.as_str(), codes[0].batch_id);
        for code in &codes {
            tracing::info!("  {}", code.code);
        }
        tracing::info!("");
    }
}

/// Flips codes and entitlements whose windows have closed. The redemption
/// and resolver guards check the clock themselves; this keeps persisted
/// statuses honest for the admin console.
fn spawn_expiry_sweep(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(5 * 60);

        loop {
            tokio::time::sleep(interval).await;

            match state.db.get() {
                Ok(conn) => {
                    match queries::expire_due_codes(&conn) {
                        Ok(count) if count > 0 => {
                            tracing::debug!("Expired {} codes past their validity window", count);
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!("Code expiry sweep failed: {}", e),
                    }
                    match queries::expire_due_entitlements(&conn) {
                        Ok(count) if count > 0 => {
                            tracing::debug!("Expired {} entitlements", count);
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!("Entitlement expiry sweep failed: {}", e),
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to get db connection for expiry sweep: {}", e);
                }
            }
        }
    });

    tracing::info!("Background expiry sweep started (runs every 5 minutes)");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(count) = cli.generate_codes {
        dotenvy::dotenv().ok();
        run_generate_codes(&cli, count);
        return;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookperks=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.download_token_secret.is_none() {
        tracing::warn!(
            "BOOKPERKS_DOWNLOAD_TOKEN_SECRET is not set; asset downloads will fail closed"
        );
    }

    // Create database connection pools
    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    let audit_pool =
        create_pool(&config.audit_database_path).expect("Failed to create audit database pool");

    // Initialize database schemas
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }
    {
        let conn = audit_pool.get().expect("Failed to get audit connection");
        init_audit_db(&conn).expect("Failed to initialize audit database");
    }

    let state = AppState {
        db: db_pool,
        audit: audit_pool,
        base_url: config.base_url.clone(),
        audit_log_enabled: config.audit_log_enabled,
        download_token_secret: config.download_token_secret.clone(),
    };

    // Purge old audit logs on startup (0 = never purge)
    if config.audit_log_retention_days > 0 {
        let conn = state.audit.get().expect("Failed to get audit connection for purge");
        match queries::purge_old_audit_logs(&conn, config.audit_log_retention_days) {
            Ok(count) if count > 0 => {
                tracing::info!(
                    "Purged {} audit log entries older than {} days",
                    count,
                    config.audit_log_retention_days
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to purge old audit logs: {}", e);
            }
        }
    }

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set BOOKPERKS_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    // Bootstrap first admin if configured (fallback for non-seed usage)
    if let Some(ref email) = config.bootstrap_admin_email {
        bootstrap_admin(&state, email);
    }

    spawn_expiry_sweep(state.clone());

    // Build the application router
    let app = Router::new()
        // Public endpoints (IdP identity headers, rate limited)
        .merge(handlers::public::router(config.rate_limit))
        // Admin console (API key auth)
        .merge(handlers::admin::router(state.clone()));

    let app = app.layer(TraceLayer::new_for_http()).with_state(state);

    // Start the server
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();
    let audit_path = config.audit_database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: databases will be deleted on exit");
    }

    tracing::info!("Bookperks server listening on {}", addr);

    // Use into_make_service_with_connect_info to enable IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral databases...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        }
        if let Err(e) = std::fs::remove_file(&audit_path) {
            tracing::warn!("Failed to remove {}: {}", audit_path, e);
        }
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
