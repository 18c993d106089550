//! rollcall-server - Face-recognition attendance service
//!
//! **Module Identity:**
//! - Name: rollcall-server
//! - Default port: 5730
//!
//! Serves the session, capture, statistics and roster APIs over HTTP and
//! delegates face matching to an external matcher service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rollcall_common::auth::{set_password, Role, SqliteCredentialVerifier};
use rollcall_common::config::{load_config, resolve_root_folder};
use rollcall_common::db::init_database;
use rollcall_common::SystemClock;
use rollcall_server::services::HttpFaceMatcher;
use rollcall_server::{build_router, AppState, ServiceSettings};

/// Command-line arguments for rollcall-server
#[derive(Parser, Debug)]
#[command(name = "rollcall-server")]
#[command(about = "Face-recognition attendance service")]
#[command(version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "ROLLCALL_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database
    #[arg(short, long, env = "ROLLCALL_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "ROLLCALL_PORT")]
    port: Option<u16>,

    /// Face matcher base URL (overrides config)
    #[arg(long, env = "ROLLCALL_MATCHER_URL")]
    matcher_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before logging so its level can seed the filter
    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    let default_filter = format!(
        "rollcall_server={level},rollcall_common={level},tower_http=info",
        level = config.logging.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    info!("Starting rollcall-server");
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(url) = args.matcher_url {
        config.matcher.url = url;
    }
    config.validate().context("Invalid configuration")?;

    // Root folder and database (CLI flag and ROLLCALL_ROOT_FOLDER arrive through clap)
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), "ROLLCALL_ROOT_FOLDER", &config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    let db_path = config.database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let db_pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    match &config.bootstrap_admin {
        Some(admin) => {
            set_password(&db_pool, Role::Admin, &admin.id, &admin.password)
                .await
                .context("Failed to bootstrap admin credential")?;
            info!(admin = %admin.id, "Admin credential bootstrapped");
        }
        None => warn!("No bootstrap_admin configured; admin endpoints need an existing credential"),
    }

    let settings = ServiceSettings::from_config(&config);
    let matcher = HttpFaceMatcher::new(&config.matcher.url, settings.matcher_timeout)
        .map_err(|e| anyhow::anyhow!("Failed to create face matcher client: {}", e))?;
    info!(
        url = %config.matcher.url,
        timeout_ms = config.matcher.timeout_ms,
        threshold = config.match_threshold,
        "Face matcher configured"
    );

    let state = AppState::new(
        db_pool.clone(),
        Arc::new(SystemClock),
        Arc::new(matcher),
        Arc::new(SqliteCredentialVerifier::new(db_pool.clone())),
        settings,
    );

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db_pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
