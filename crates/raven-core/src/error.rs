//! Shared error type across Raven crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed message.
    BadRequest,
    /// Auth failed.
    AuthFailed,
    /// Payload too large.
    PayloadTooLarge,
    /// Not allowed by policy.
    NotAllowed,
    /// Unsupported config or protocol version.
    UnsupportedVersion,
    /// A remote document service call was rejected.
    RpcFailed,
    /// Local durable cache could not be read or written.
    Storage,
    /// Internal error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::AuthFailed => "AUTH_FAILED",
            ClientCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ClientCode::NotAllowed => "NOT_ALLOWED",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::RpcFailed => "RPC_FAILED",
            ClientCode::Storage => "STORAGE",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RavenError>;

/// Unified error type used by core, gateway and client.
#[derive(Debug, Error)]
pub enum RavenError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("auth failed")]
    AuthFailed,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("not allowed: {0}")]
    NotAllowed(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("rpc failed: {0}")]
    Rpc(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RavenError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            RavenError::BadRequest(_) => ClientCode::BadRequest,
            RavenError::AuthFailed => ClientCode::AuthFailed,
            RavenError::PayloadTooLarge => ClientCode::PayloadTooLarge,
            RavenError::NotAllowed(_) => ClientCode::NotAllowed,
            RavenError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            RavenError::Rpc(_) => ClientCode::RpcFailed,
            RavenError::Storage(_) => ClientCode::Storage,
            RavenError::Internal(_) => ClientCode::Internal,
        }
    }
}

impl From<serde_json::Error> for RavenError {
    fn from(e: serde_json::Error) -> Self {
        RavenError::BadRequest(format!("json: {e}"))
    }
}
