use bell_backend::{
    AppState, TokenService,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{UploadManager, UploadState, run_sweep_loop},
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::{fmt::Display, process, str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, connects the store, provisions
/// the upload directory, starts the orphan sweep and serves HTTP.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // Logging is not up yet.
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise debug for this crate and info for the HTTP layer.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bell_backend=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Store Initialization (Postgres)
    let options = match PgConnectOptions::from_str(&config.db_url) {
        Ok(options) => options.database(&config.db_name),
        Err(e) => fatal("DATABASE_URL is not a valid connection string", e),
    };
    let pool = match PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(config.store_timeout)
        .connect_with(options)
        .await
    {
        Ok(pool) => pool,
        Err(e) => fatal("Failed to connect to the store. Check DATABASE_URL", e),
    };

    let store = PostgresRepository::new(pool, config.store_timeout);
    if let Err(e) = store.ensure_schema().await {
        fatal("Failed to provision the schema", e);
    }
    let repo = Arc::new(store) as RepositoryState;

    // 5. Upload Directory
    let uploads: UploadState =
        match UploadManager::new(config.upload_dir.clone(), config.upload_grace).await {
            Ok(manager) => Arc::new(manager),
            Err(e) => fatal("Failed to prepare the upload directory", e),
        };

    // 6. Background Orphan Sweep
    tokio::spawn(run_sweep_loop(
        uploads.clone(),
        repo.clone(),
        config.cleanup_interval.max(Duration::from_secs(1)),
    ));

    // 7. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        uploads,
        tokens: TokenService::new(&config.jwt_secret),
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);

    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => fatal("Failed to bind the HTTP listener", e),
    };

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        fatal("HTTP server stopped", e);
    }
}

/// Logs an unrecoverable startup failure and terminates the process.
fn fatal(context: &str, err: impl Display) -> ! {
    tracing::error!(error = %err, "FATAL: {}", context);
    process::exit(1);
}
