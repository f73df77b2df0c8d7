//! Decode-once codec for the transport layer.
//!
//! - Text frames => `ClientEvent` (closed tagged union)
//! - Binary frames are not part of the protocol and are rejected
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message;
use raven_core::{
    error::{RavenError, Result},
    protocol::ClientEvent,
};

#[derive(Debug)]
pub enum Inbound {
    Event(ClientEvent),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

pub fn decode(msg: Message) -> Result<Inbound> {
    match msg {
        Message::Text(s) => Ok(Inbound::Event(ClientEvent::decode(&s)?)),
        Message::Binary(_) => Err(RavenError::BadRequest("binary frames are not supported".into())),
        Message::Ping(v) => Ok(Inbound::Ping(v)),
        Message::Pong(v) => Ok(Inbound::Pong(v)),
        Message::Close(_) => Ok(Inbound::Close),
    }
}

/// Cheap frame length (policy runs before decode).
pub fn frame_len(msg: &Message) -> usize {
    match msg {
        Message::Text(s) => s.len(),
        Message::Binary(b) => b.len(),
        Message::Ping(v) => v.len(),
        Message::Pong(v) => v.len(),
        Message::Close(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_core::ChannelId;

    #[test]
    fn text_frames_decode_to_events() {
        let msg = Message::Text(r#"{"event":"raven_channel_typing","data":"general"}"#.into());
        assert_eq!(frame_len(&msg), 49);
        match decode(msg) {
            Ok(Inbound::Event(event)) => {
                assert_eq!(event, ClientEvent::Typing(ChannelId::from("general")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn binary_frames_are_rejected() {
        let err = decode(Message::Binary(vec![1, 2, 3]));
        assert!(matches!(err, Err(RavenError::BadRequest(_))));
    }
}
