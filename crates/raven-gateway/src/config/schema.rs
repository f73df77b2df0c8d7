use std::collections::HashMap;

use serde::Deserialize;
use raven_core::error::{RavenError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub realtime: RealtimeSection,

    #[serde(default)]
    pub limits: Limits,

    #[serde(default)]
    pub policy: EventPolicy,

    #[serde(default)]
    pub auth: AuthSection,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RavenError::UnsupportedVersion);
        }

        self.gateway.validate()?;
        self.realtime.validate()?;
        self.limits.validate()?;
        self.policy.validate()?;
        self.auth.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(5000..=120000).contains(&self.ping_interval_ms) {
            return Err(RavenError::BadRequest(
                "gateway.ping_interval_ms must be between 5000 and 120000".into(),
            ));
        }
        if !(10000..=600000).contains(&self.idle_timeout_ms) {
            return Err(RavenError::BadRequest(
                "gateway.idle_timeout_ms must be between 10000 and 600000".into(),
            ));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(RavenError::BadRequest(
                "gateway.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:9000".into()
}
fn default_ping_interval_ms() -> u64 {
    20000
}
fn default_idle_timeout_ms() -> u64 {
    60000
}

/// Egress tuning.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeSection {
    /// Bounded per-session outbound queue; lossy sends drop when it is full.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    /// Per-recipient timeout for reliable (published) notifications.
    #[serde(default = "default_reliable_timeout_ms")]
    pub reliable_timeout_ms: u64,
}

impl Default for RealtimeSection {
    fn default() -> Self {
        Self {
            outbound_queue: default_outbound_queue(),
            reliable_timeout_ms: default_reliable_timeout_ms(),
        }
    }
}

impl RealtimeSection {
    pub fn validate(&self) -> Result<()> {
        if !(16..=65536).contains(&self.outbound_queue) {
            return Err(RavenError::BadRequest(
                "realtime.outbound_queue must be between 16 and 65536".into(),
            ));
        }
        if self.reliable_timeout_ms > 30000 {
            return Err(RavenError::BadRequest(
                "realtime.reliable_timeout_ms must be at most 30000".into(),
            ));
        }
        Ok(())
    }
}

fn default_outbound_queue() -> usize {
    1024
}
fn default_reliable_timeout_ms() -> u64 {
    1500
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Limits {
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Limits {
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_bytes < 64 {
            return Err(RavenError::BadRequest(
                "limits.max_frame_bytes must be at least 64".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_frame_bytes() -> usize {
    4096
}

/// Which inbound events a session may send, and how fast.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventPolicy {
    /// Event names, or `prefix*` wildcards.
    #[serde(default = "default_event_allowlist")]
    pub event_allowlist: Vec<String>,

    #[serde(default = "default_rate_limit_rps")]
    pub rate_limit_rps: u32,

    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,
}

impl Default for EventPolicy {
    fn default() -> Self {
        Self {
            event_allowlist: default_event_allowlist(),
            rate_limit_rps: default_rate_limit_rps(),
            rate_limit_burst: default_rate_limit_burst(),
        }
    }
}

impl EventPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.event_allowlist.is_empty() {
            return Err(RavenError::BadRequest(
                "policy.event_allowlist must not be empty".into(),
            ));
        }
        if self.rate_limit_rps == 0 || self.rate_limit_burst == 0 {
            return Err(RavenError::BadRequest(
                "policy.rate_limit_rps and rate_limit_burst must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_event_allowlist() -> Vec<String> {
    vec!["raven_channel_*".into(), "doc_subscribe".into(), "doc_unsubscribe".into()]
}
fn default_rate_limit_rps() -> u32 {
    20
}
fn default_rate_limit_burst() -> u32 {
    40
}

/// Static ticket table. Token exchange lives in the document service; the
/// gateway only maps an already-issued ticket to a user id.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    #[serde(default)]
    pub tickets: HashMap<String, String>,

    /// Shared secret the backend presents on `POST /v1/publish`. Without one the
    /// endpoint refuses every request unless `publish_unauthenticated` is set.
    #[serde(default)]
    pub publish_token: Option<String>,

    /// Accept publishes without a token (local development only).
    #[serde(default)]
    pub publish_unauthenticated: bool,
}

impl AuthSection {
    pub fn validate(&self) -> Result<()> {
        if self.publish_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(RavenError::BadRequest("auth.publish_token must not be empty".into()));
        }
        if self.publish_token.is_some() && self.publish_unauthenticated {
            return Err(RavenError::BadRequest(
                "auth.publish_unauthenticated contradicts auth.publish_token".into(),
            ));
        }
        Ok(())
    }
}
