//! Policy layer (frame limits, event allowlist, per-connection rate limiting).
//!
//! Compiles policy configuration into fast lookup structures for the transport
//! layer to consume at runtime.

pub mod allowlist;
pub mod engine;

pub use engine::{ConnRateLimiter, PolicyDecision, PolicyRuntime};
