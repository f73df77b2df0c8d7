//! Room addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, UserId};
use crate::model::CHANNEL_DOCTYPE;
use crate::protocol::inbound::DocRef;

/// Topic kind of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    /// Sessions currently typing in a channel.
    Typing,
    /// Sessions viewing a document.
    Doc,
    /// All sessions of one user.
    User,
}

impl RoomKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomKind::Typing => "typing",
            RoomKind::Doc => "doc",
            RoomKind::User => "user",
        }
    }
}

/// `(kind, id)` key of a room, rendered as `kind:id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoomKey {
    pub kind: RoomKind,
    pub id: String,
}

impl RoomKey {
    pub fn typing(channel: &ChannelId) -> Self {
        Self {
            kind: RoomKind::Typing,
            id: channel.as_str().to_string(),
        }
    }

    pub fn doc(doc: &DocRef) -> Self {
        Self {
            kind: RoomKind::Doc,
            id: format!("{}/{}", doc.doctype, doc.name),
        }
    }

    /// Everyone viewing the channel; distinct from the channel's typing room.
    pub fn channel_audience(channel: &ChannelId) -> Self {
        Self::doc(&DocRef::new(CHANNEL_DOCTYPE, channel.as_str()))
    }

    pub fn user(user: &UserId) -> Self {
        Self {
            kind: RoomKind::User,
            id: user.as_str().to_string(),
        }
    }

    /// Channel id of a typing room.
    pub fn typing_channel(&self) -> Option<ChannelId> {
        match self.kind {
            RoomKind::Typing => Some(ChannelId::new(self.id.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}
