//! Backend -> gateway publish endpoint.
//!
//! The document service posts change notifications here (`list_update`,
//! `raven:unread_channel_count_updated`, ...) and the gateway fans them out to
//! the sessions of the addressed room with reliable QoS.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use raven_core::error::RavenError;
use raven_core::protocol::PublishRequest;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::realtime::Outgoing;

pub async fn publish(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PublishRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    authorize(&app, &headers)?;

    let timeout_ms = app.cfg().realtime.reliable_timeout_ms;
    let delivered = app
        .realtime()
        .publish_room(&req.room, Outgoing::reliable(req.event, timeout_ms))
        .await?;

    app.metrics().published.inc(&[("kind", req.room.kind.as_str())]);
    tracing::debug!(room = %req.room, delivered, "published");
    Ok((StatusCode::ACCEPTED, Json(json!({ "delivered": delivered }))))
}

fn authorize(app: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let auth = &app.cfg().auth;
    let Some(expected) = auth.publish_token.as_deref() else {
        if auth.publish_unauthenticated {
            return Ok(());
        }
        return Err(ApiError(RavenError::NotAllowed("publish endpoint has no token configured".into())));
    };
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(ApiError(RavenError::AuthFailed)),
    }
}
