use std::time::{Duration, Instant};

use raven_core::error::ClientCode;
use raven_core::protocol::inbound::{DOC_UNSUBSCRIBE, TYPING_STOPPED};

use crate::config::schema::EventPolicy;

use super::allowlist::{compile_event_rules, is_event_allowed, EventRule};

/// Decision from policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Pass,
    Drop,
    Reject { code: ClientCode, msg: &'static str },
    Close { code: ClientCode, msg: &'static str },
}

/// Gateway-wide inbound policy.
/// Construct once at startup, then share via Arc.
pub struct PolicyRuntime {
    max_frame_bytes: usize,
    rules: Vec<EventRule>,
    conn_rps: u32,
    conn_burst: u32,
}

impl PolicyRuntime {
    pub fn new(max_frame_bytes: usize, policy: &EventPolicy) -> raven_core::Result<Self> {
        Ok(Self {
            max_frame_bytes,
            rules: compile_event_rules(&policy.event_allowlist)?,
            conn_rps: policy.rate_limit_rps,
            conn_burst: policy.rate_limit_burst,
        })
    }

    pub fn new_connection_limiter(&self) -> ConnRateLimiter {
        ConnRateLimiter::new(self.conn_rps, self.conn_burst)
    }

    /// Cheap check before any decoding.
    pub fn check_len(&self, bytes_len: usize) -> PolicyDecision {
        if bytes_len > self.max_frame_bytes {
            return PolicyDecision::Close {
                code: ClientCode::PayloadTooLarge,
                msg: "frame too large",
            };
        }
        PolicyDecision::Pass
    }

    /// Allowlist + per-connection rate limit for a decoded event.
    pub fn check_event(&self, limiter: &mut ConnRateLimiter, event: &str) -> PolicyDecision {
        if !is_event_allowed(&self.rules, event) {
            return PolicyDecision::Reject {
                code: ClientCode::NotAllowed,
                msg: "event not allowed",
            };
        }
        if is_release(event) {
            return PolicyDecision::Pass;
        }
        if !limiter.allow() {
            return PolicyDecision::Drop;
        }
        PolicyDecision::Pass
    }
}

/// Events that leave a room. Dropping one would strand the session in it until
/// disconnect, so they bypass the rate limit and consume no tokens.
fn is_release(event: &str) -> bool {
    event == TYPING_STOPPED || event == DOC_UNSUBSCRIBE
}

/// Per-connection token bucket (owned by the session task, no mutex).
#[derive(Debug)]
pub struct ConnRateLimiter {
    bucket: TokenBucket,
}

impl ConnRateLimiter {
    pub fn new(rps: u32, burst: u32) -> Self {
        Self {
            bucket: TokenBucket::new(rps, burst),
        }
    }

    pub fn allow(&mut self) -> bool {
        self.bucket.allow()
    }
}

#[derive(Debug)]
struct TokenBucket {
    rps: u32,
    capacity: u32,
    tokens: u32,
    last: Instant,
}

impl TokenBucket {
    fn new(rps: u32, burst: u32) -> Self {
        let rps = rps.max(1);
        let capacity = burst.max(1);
        Self {
            rps,
            capacity,
            tokens: capacity,
            last: Instant::now(),
        }
    }

    fn allow(&mut self) -> bool {
        self.refill();

        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        if elapsed < Duration::from_millis(50) {
            return;
        }

        let add = (elapsed.as_millis() as u64 * self.rps as u64 / 1000) as u32;
        if add > 0 {
            self.tokens = (self.tokens + add).min(self.capacity);
            self.last = now;
        }
    }
}
