use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snapmenu_billing::config::Config;
use snapmenu_billing::db::{create_pool, init_db, queries, AppState};
use snapmenu_billing::handlers;
use snapmenu_billing::models::CreateUser;

#[derive(Parser, Debug)]
#[command(name = "snapmenu-billing")]
#[command(about = "Billing reconciliation service for the Snapmenu platform")]
struct Cli {
    /// Seed the database with a dev user (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with a dev user for local checkout/webhook testing.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    if queries::get_user_by_email(&conn, "dev@snapmenu.local")
        .expect("Failed to query dev user")
        .is_some()
    {
        tracing::info!("Database already has dev data, skipping seed");
        return;
    }

    let (user, token) = queries::create_user(
        &conn,
        &CreateUser {
            email: "dev@snapmenu.local".to_string(),
            name: "Dev User".to_string(),
            country: Some("NG".to_string()),
        },
    )
    .expect("Failed to create dev user");

    tracing::info!("============================================");
    tracing::info!("DEV USER SEEDED");
    tracing::info!("Email: {}", user.email);
    tracing::info!("User ID: {}", user.id);
    tracing::info!("Session token: {}", token);
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snapmenu_billing=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");

    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        secrets: config.secrets.clone(),
        http: reqwest::Client::new(),
        paid_trial_days: config.paid_trial_days,
        rate_limit: config.rate_limit,
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set SNAPMENU_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::billing_router(config.rate_limit))
        .merge(handlers::webhook_router(config.rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Snapmenu billing listening on {}", addr);

    // into_make_service_with_connect_info enables IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
