use axum::extract::ws::Message;

use raven_core::error::Result;
use raven_core::protocol::ServerEvent;

/// Quality-of-Service strategy for outgoing delivery.
#[derive(Debug, Clone, Copy, Default)]
pub enum QoS {
    /// Latency-critical: do not await; if the session's queue is full, drop.
    #[default]
    Lossy,
    /// Reliability-critical: await queue capacity, optionally with a timeout.
    Reliable { timeout_ms: u64 },
}

/// Application-level outgoing message.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub qos: QoS,
    pub event: ServerEvent,
}

impl Outgoing {
    pub fn lossy(event: ServerEvent) -> Self {
        Self { qos: QoS::Lossy, event }
    }

    pub fn reliable(event: ServerEvent, timeout_ms: u64) -> Self {
        Self {
            qos: QoS::Reliable { timeout_ms },
            event,
        }
    }
}

/// Prepared message cached for broadcasting (serialize once, send N times).
#[derive(Debug, Clone)]
pub struct PreparedMsg(String);

impl PreparedMsg {
    pub fn prepare(out: &Outgoing) -> Result<Self> {
        Ok(PreparedMsg(out.event.encode()?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to axum::ws::Message for transport.
    pub fn to_ws_message(&self) -> Message {
        Message::Text(self.0.clone())
    }
}
