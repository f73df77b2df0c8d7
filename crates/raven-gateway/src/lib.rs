//! Raven realtime gateway library entry.
//!
//! Wires the transport, policy, dispatcher, realtime core, and the typing and
//! document-subscription services into a gateway stack. Consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod realtime;
pub mod router;
pub mod services;
pub mod transport;
