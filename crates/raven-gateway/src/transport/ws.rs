//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS
//! - Resolve the ticket to a user and register an explicit Session
//! - Lifecycle: ping/pong + idle timeout
//! - Policy (frame size) before decode, allowlist/rate limit after decode
//! - Dispatch events to services; errors go back to the session as `error` events
//! - Disconnect cleanup (rooms + typing snapshots)

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, Query, State},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::Instrument;

use raven_core::error::{ClientCode, Result};
use raven_core::protocol::ServerEvent;
use raven_core::{SessionId, UserId};

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::policy::PolicyDecision;
use crate::realtime::core::Connection;
use crate::realtime::{Outgoing, PreparedMsg, RealtimeCtx};
use crate::services::TypingService;
use crate::transport::codec::{decode, frame_len, Inbound};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub ticket: String,
}

pub async fn ws_upgrade(
    State(app): State<AppState>,
    ws: WebSocketUpgrade,
    Query(q): Query<WsQuery>,
) -> Response {
    // auth before upgrade so a bad ticket gets a plain 401
    let user = match app.resolve_ticket(&q.ticket) {
        Ok(user) => user,
        Err(e) => return ApiError(e).into_response(),
    };
    app.metrics().ws_upgrades.inc(&[]);

    let session_id = SessionId::new(uuid::Uuid::new_v4().to_string());
    let span = tracing::info_span!("session", session = %session_id, user = %user);
    ws.on_upgrade(move |socket| {
        async move {
            if let Err(e) = run_session(app, session_id, user, socket).await {
                tracing::debug!(error = %e, "session ended with error");
            }
        }
        .instrument(span)
    })
}

/// Queue a message produced by the session task itself. The task is the only
/// reader of its queue, so awaiting capacity here could never complete; a full
/// queue drops the message instead.
fn enqueue_control(tx: &mpsc::Sender<Message>, msg: Message) -> bool {
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "control frame dropped");
            false
        }
    }
}

fn encode_sys(event: &ServerEvent) -> Option<Message> {
    PreparedMsg::prepare(&Outgoing::lossy(event.clone()))
        .ok()
        .map(|p| p.to_ws_message())
}

async fn run_session(app: AppState, session_id: SessionId, user: UserId, socket: WebSocket) -> Result<()> {
    let core = app.realtime();
    let dispatcher = app.dispatcher();
    let policy = app.policy();
    let mut limiter = policy.new_connection_limiter();

    let (out_tx, mut out_rx) = mpsc::channel::<Message>(app.cfg().realtime.outbound_queue);
    let (mut ws_tx, mut ws_rx) = socket.split();

    core.connect(session_id.clone(), user.clone(), Connection { tx: out_tx.clone() });
    app.metrics().ws_active_sessions.inc(&[]);
    tracing::info!("session started");

    let ctx = RealtimeCtx::new(session_id.clone(), user.clone(), core.clone());
    if let Some(m) = encode_sys(&ServerEvent::Authed { user, session: session_id.clone() }) {
        enqueue_control(&out_tx, m);
    }

    let gw = &app.cfg().gateway;
    let ping_every = Duration::from_millis(gw.ping_interval_ms);
    let idle_timeout = Duration::from_millis(gw.idle_timeout_ms);

    let mut ping_tick = tokio::time::interval(ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            // outbound writer
            maybe_out = out_rx.recv() => {
                match maybe_out {
                    Some(m) => {
                        if ws_tx.send(m).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(incoming) = incoming else { break; };
                let Ok(msg) = incoming else { break; };

                last_activity = Instant::now();

                if let PolicyDecision::Close { code, msg } = policy.check_len(frame_len(&msg)) {
                    app.metrics().policy_decisions.inc(&[("decision", "close")]);
                    if let Some(m) = encode_sys(&ServerEvent::error(code, msg)) {
                        let _ = ws_tx.send(m).await;
                    }
                    break;
                }

                let inbound = match decode(msg) {
                    Ok(inbound) => inbound,
                    Err(e) => {
                        app.metrics().decode_errors.inc(&[]);
                        let _ = ctx.reply(Outgoing::lossy(ServerEvent::error(e.client_code(), e.to_string())));
                        continue;
                    }
                };

                match inbound {
                    Inbound::Event(event) => {
                        match policy.check_event(&mut limiter, event.name()) {
                            PolicyDecision::Pass => {}
                            PolicyDecision::Drop => {
                                app.metrics().policy_decisions.inc(&[("decision", "drop")]);
                                continue;
                            }
                            PolicyDecision::Reject { code, msg } => {
                                app.metrics().policy_decisions.inc(&[("decision", "reject")]);
                                let _ = ctx.reply(Outgoing::lossy(ServerEvent::error(code, msg)));
                                continue;
                            }
                            PolicyDecision::Close { code, msg } => {
                                app.metrics().policy_decisions.inc(&[("decision", "close")]);
                                let _ = ctx.reply(Outgoing::lossy(ServerEvent::error(code, msg)));
                                break;
                            }
                        }

                        let name = event.name();
                        if let Err(e) = dispatcher.dispatch(ctx.clone(), event).await {
                            app.metrics().service_errors.inc(&[("event", name)]);
                            tracing::debug!(event = name, error = %e, "event failed");
                            let _ = ctx.reply(Outgoing::lossy(ServerEvent::error(e.client_code(), e.to_string())));
                        }
                    }
                    Inbound::Ping(payload) => {
                        enqueue_control(&out_tx, Message::Pong(payload));
                    }
                    Inbound::Pong(_) => {}
                    Inbound::Close => break,
                }
            }

            // ping
            _ = ping_tick.tick() => {
                enqueue_control(&out_tx, Message::Ping(Vec::new()));
            }

            // idle timeout
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if last_activity.elapsed() >= idle_timeout {
                    if let Some(m) = encode_sys(&ServerEvent::error(ClientCode::BadRequest, "idle timeout")) {
                        let _ = ws_tx.send(m).await;
                    }
                    break;
                }
            }
        }
    }

    TypingService::on_disconnect(&core, &session_id);
    app.metrics().ws_active_sessions.dec(&[]);
    tracing::info!("session closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_frames_never_wait_on_a_full_queue() {
        let (tx, mut rx) = mpsc::channel::<Message>(1);
        assert!(enqueue_control(&tx, Message::Text("queued".into())));
        assert!(!enqueue_control(&tx, Message::Ping(Vec::new())));

        assert!(matches!(rx.try_recv(), Ok(Message::Text(_))));
        assert!(enqueue_control(&tx, Message::Pong(Vec::new())));
    }
}
