//! # Bazaar API
//!
//! HTTP server for the storefront and back office.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Bazaar API Server                               │
//! │                                                                         │
//! │  Browser ───► HTTP (8080) ───► Services ───► SQLite                    │
//! │                                    │                                    │
//! │                                    ▼                                    │
//! │                             Payment gateway                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bazaar_api::{router, AppState, BazaarConfig};
use bazaar_db::Database;
use bazaar_orders::{
    LogNotifier, Notifier, PaymentGateway, RazorpayGateway, Services, SignatureVerifier, StubGateway,
};

/// Signing secret for the stub gateway used in development.
const STUB_GATEWAY_SECRET: &str = "bazaar-dev-gateway-secret";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,bazaar=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting Bazaar API server...");

    let config = BazaarConfig::load()?;
    let addr = config.bind_addr()?;
    info!(%addr, gateway = %config.gateway.base_url, "Configuration loaded");

    let db = Database::new(config.db_config()).await?;
    info!("Database ready");

    let (gateway, verifier): (Arc<dyn PaymentGateway>, SignatureVerifier) = match config.gateway.credentials() {
        Some((key_id, key_secret)) => (
            Arc::new(RazorpayGateway::new(&config.gateway.base_url, key_id, key_secret)),
            SignatureVerifier::new(key_secret)?,
        ),
        None => {
            warn!("No gateway credentials configured, online payments use the stub gateway");
            (Arc::new(StubGateway::new()), SignatureVerifier::new(STUB_GATEWAY_SECRET)?)
        }
    };
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let services = Services::new(db, config.service_config(), gateway, verifier, notifier);
    let app = router(AppState::new(services));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(?e, "Failed to listen for Ctrl+C");
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
                warn!(?e, "Failed to install SIGTERM handler");
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
