//! Axum router wiring.
//!
//! - `GET /v1/ws`       : WebSocket upgrade
//! - `POST /v1/publish` : backend notifications
//! - `/healthz`, `/metrics`

use axum::{
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/ws", get(transport::ws::ws_upgrade))
        .route("/v1/publish", post(transport::publish::publish))
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
