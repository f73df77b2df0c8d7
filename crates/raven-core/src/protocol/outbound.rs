//! Server -> client events.

use serde::{Deserialize, Serialize};

use crate::error::{ClientCode, RavenError, Result};
use crate::ids::{ChannelId, SessionId, UserId};
use crate::model::TypingEvent;
use crate::protocol::inbound::DocRef;
use crate::protocol::room::RoomKey;

/// Payload of `raven:unread_channel_count_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCountUpdate {
    pub channel_id: ChannelId,
    /// The user whose message caused the update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_by: Option<UserId>,
}

/// Event delivered to a client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "authed")]
    Authed { user: UserId, session: SessionId },
    #[serde(rename = "error")]
    Error { code: String, msg: String },
    #[serde(rename = "raven_channel_typers")]
    Typers(TypingEvent),
    #[serde(rename = "raven:unread_channel_count_updated")]
    UnreadCountUpdated(UnreadCountUpdate),
    /// A document of `doctype` changed; list views of it are stale.
    #[serde(rename = "list_update")]
    ListUpdate(DocRef),
}

impl ServerEvent {
    pub fn error(code: ClientCode, msg: impl Into<String>) -> Self {
        ServerEvent::Error {
            code: code.as_str().to_string(),
            msg: msg.into(),
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RavenError::Internal(format!("json encode failed: {e}")))
    }

    pub fn decode(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| RavenError::BadRequest(format!("invalid event frame: {e}")))
    }
}

/// Body of the backend publish endpoint: deliver `event` to every session in `room`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishRequest {
    pub room: RoomKey,
    pub event: ServerEvent,
}
