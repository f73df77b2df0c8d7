//! Realtime runtime (egress engine) for the Raven gateway.
//!
//! RoomRegistry + SessionRegistry + QoS-based publish helpers.

pub mod core;
pub mod types;

pub use core::{RealtimeCore, RealtimeCtx, RoomRegistry, Session, SessionRegistry};
pub use types::{Outgoing, PreparedMsg, QoS};
