//! Client -> server events.

use serde::{Deserialize, Serialize};

use crate::error::{RavenError, Result};
use crate::ids::ChannelId;

pub const GET_TYPERS: &str = "raven_channel_get_typers";
pub const TYPING: &str = "raven_channel_typing";
pub const TYPING_STOPPED: &str = "raven_channel_typing_stopped";
pub const DOC_SUBSCRIBE: &str = "doc_subscribe";
pub const DOC_UNSUBSCRIBE: &str = "doc_unsubscribe";

/// Reference to a single document (`doctype` + `name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocRef {
    pub doctype: String,
    pub name: String,
}

impl DocRef {
    pub fn new(doctype: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            doctype: doctype.into(),
            name: name.into(),
        }
    }
}

/// Event sent by a client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// "Who is typing right now?" Answered to the asking session only.
    #[serde(rename = "raven_channel_get_typers")]
    GetTypers(ChannelId),
    #[serde(rename = "raven_channel_typing")]
    Typing(ChannelId),
    #[serde(rename = "raven_channel_typing_stopped")]
    TypingStopped(ChannelId),
    /// Join the audience of a document (e.g. the channel being viewed).
    #[serde(rename = "doc_subscribe")]
    DocSubscribe(DocRef),
    #[serde(rename = "doc_unsubscribe")]
    DocUnsubscribe(DocRef),
}

impl ClientEvent {
    /// Wire name of the event; used for routing and allowlisting.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::GetTypers(_) => GET_TYPERS,
            ClientEvent::Typing(_) => TYPING,
            ClientEvent::TypingStopped(_) => TYPING_STOPPED,
            ClientEvent::DocSubscribe(_) => DOC_SUBSCRIBE,
            ClientEvent::DocUnsubscribe(_) => DOC_UNSUBSCRIBE,
        }
    }

    /// Decode one text frame.
    pub fn decode(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| RavenError::BadRequest(format!("invalid event frame: {e}")))
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RavenError::Internal(format!("json encode failed: {e}")))
    }
}
