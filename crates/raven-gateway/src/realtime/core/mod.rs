//! Realtime core components for the gateway runtime.
//!
//! Room registry, session registry (connection manager), and the egress
//! runtime/context shared across services.

mod realtime;
mod rooms;
mod session_registry;

pub use realtime::{egress_drop_count, egress_send_fail_count, RealtimeCore, RealtimeCtx};
pub use rooms::RoomRegistry;
pub use session_registry::{Connection, Session, SessionRegistry};
