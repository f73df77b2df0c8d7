//! Operational HTTP endpoints.
//!
//! - `/healthz` : liveness
//! - `/metrics` : Prometheus text format

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;
use crate::realtime::core::{egress_drop_count, egress_send_fail_count};

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let core = state.realtime();
    let extra = [
        ("raven_sessions", core.sessions.len() as u64),
        ("raven_rooms", core.rooms.room_count() as u64),
        ("raven_egress_dropped_total", egress_drop_count()),
        ("raven_egress_send_failed_total", egress_send_fail_count()),
    ];
    let body = state.metrics().render(&extra);

    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}
