//! Top-level facade crate for Raven realtime.
//!
//! Re-exports the core model, the gateway library and the client sync library so
//! users can depend on a single crate.

pub mod core {
    pub use raven_core::*;
}

pub mod gateway {
    pub use raven_gateway::*;
}

pub mod client {
    pub use raven_client::*;
}
