//! Raven core: transport-agnostic identifiers, data model, wire protocol and
//! error types.
//!
//! This crate defines the contracts shared by the realtime gateway and the
//! client sync layer. It carries no transport or runtime dependencies so it can
//! be reused on both sides of the socket.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `RavenError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod ids;
pub mod model;
pub mod protocol;

/// Shared result type.
pub use error::{ClientCode, RavenError, Result};
pub use ids::{ChannelId, SessionId, UserId};
