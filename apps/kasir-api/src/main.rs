//! # Kasir API Server
//!
//! ```text
//! ┌──────────────┐   HTTP/JSON    ┌──────────────┐    ┌──────────────┐
//! │  Till / BO   │ ─────────────► │  kasir-api   │ ─► │ kasir-engine │ ─► SQLite
//! │  X-User-Id   │ ◄───────────── │  (axum)      │    │              │
//! └──────────────┘                └──────────────┘    └──────────────┘
//! ```
//!
//! `RUST_LOG` controls verbosity (default `info,kasir=debug`).

use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use kasir_api::{router, ApiConfig, AppState};
use kasir_db::Database;
use kasir_engine::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,kasir=debug")))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    info!("Starting Kasir API server...");

    let config = ApiConfig::load().context("loading configuration")?;
    info!(
        port = config.http_port,
        database = %config.database_path.display(),
        tax_rate_bps = config.tax_rate_bps,
        utc_offset_minutes = config.utc_offset_minutes,
        "Configuration loaded"
    );

    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;
    let engine = Engine::new(db.clone(), config.engine_config());
    let app = router(AppState::new(engine));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
