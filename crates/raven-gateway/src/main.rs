//! Raven realtime gateway.
//!
//! - WebSocket endpoint: /v1/ws?ticket=...
//! - Typing presence rooms, document audiences, per-user delivery
//! - Backend publish endpoint: POST /v1/publish
//! - Heartbeat ping + idle timeout

use std::net::SocketAddr;
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use raven_core::error::{RavenError, Result};
use raven_gateway::{app_state, config, router};

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "raven-gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let path = config::config_path();
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| RavenError::BadRequest(format!("gateway.listen must be a valid SocketAddr: {e}")))?;

    let state = app_state::AppState::new(cfg)?;
    let app = router::build_router(state);

    tracing::info!(%listen, config = %path, "raven-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| RavenError::Internal(format!("failed to bind: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| RavenError::Internal(format!("server failed: {e}")))
}
