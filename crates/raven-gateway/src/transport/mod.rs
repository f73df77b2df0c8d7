//! Transport layer (WebSocket + backend publish endpoint).
//!
//! Exposes the WS upgrade handler, the codec that decodes frames once before
//! they reach policy/dispatcher layers, and the HTTP publish handler.

pub mod codec;
pub mod publish;
pub mod ws;
