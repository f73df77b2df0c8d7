//! Shared application state for the Raven gateway.
//!
//! Wires RealtimeCore + Dispatcher, registers the built-in services and compiles
//! the inbound policy. Startup errors are returned, not panicked.

use std::sync::Arc;

use raven_core::error::{RavenError, Result};
use raven_core::UserId;

use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::obs::GatewayMetrics;
use crate::policy::PolicyRuntime;
use crate::realtime::RealtimeCore;
use crate::services::{SubscriptionService, TypingService};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    realtime: Arc<RealtimeCore>,
    dispatcher: Arc<Dispatcher>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    policy: Arc<PolicyRuntime>,
    metrics: GatewayMetrics,
}

impl AppState {
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        let policy = PolicyRuntime::new(cfg.limits.max_frame_bytes, &cfg.policy)
            .map_err(|e| RavenError::BadRequest(format!("policy compile failed: {e}")))?;

        let realtime = Arc::new(RealtimeCore::new());
        let dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(TypingService::new()));
        dispatcher.register(Arc::new(SubscriptionService::new()));

        // every allowlisted exact name should have a route
        let routed = dispatcher.registered_events();
        for rule in &cfg.policy.event_allowlist {
            if !rule.ends_with('*') && !routed.iter().any(|ev| *ev == rule.as_str()) {
                tracing::warn!(rule = %rule, "event_allowlist refers to an event no service handles");
            }
        }

        match (&cfg.auth.publish_token, cfg.auth.publish_unauthenticated) {
            (None, false) => tracing::warn!("auth.publish_token is not set; POST /v1/publish will refuse every request"),
            (None, true) => tracing::warn!("auth.publish_unauthenticated is set; anyone reaching the gateway can publish to any room"),
            (Some(_), _) => {}
        }

        if cfg.auth.tickets.is_empty() {
            tracing::warn!("auth.tickets is empty; every websocket upgrade will be rejected");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                policy: Arc::new(policy),
                metrics: GatewayMetrics::default(),
            }),
            realtime,
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn policy(&self) -> Arc<PolicyRuntime> {
        Arc::clone(&self.inner.policy)
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.inner.metrics
    }

    /// Map an issued ticket to its user.
    pub fn resolve_ticket(&self, ticket: &str) -> Result<UserId> {
        self.inner
            .cfg
            .auth
            .tickets
            .get(ticket)
            .map(|u| UserId::new(u.as_str()))
            .ok_or(RavenError::AuthFailed)
    }

    pub fn realtime(&self) -> Arc<RealtimeCore> {
        Arc::clone(&self.realtime)
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }
}
