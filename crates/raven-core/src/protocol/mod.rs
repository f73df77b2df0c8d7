//! Wire protocol for the realtime channel.
//!
//! Every text frame is one JSON object `{"event": <name>, "data": <payload>}`.
//! Inbound and outbound events are closed tagged unions so a malformed or unknown
//! event is rejected at decode time instead of deep inside a service.
//!
//! All parsers are panic-free: malformed input is reported as `RavenError`.

pub mod inbound;
pub mod outbound;
pub mod room;

pub use inbound::{ClientEvent, DocRef};
pub use outbound::{PublishRequest, ServerEvent, UnreadCountUpdate};
pub use room::{RoomKey, RoomKind};
