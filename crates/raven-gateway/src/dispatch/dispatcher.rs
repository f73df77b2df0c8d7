use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use raven_core::error::{RavenError, Result};
use raven_core::protocol::ClientEvent;

use crate::realtime::RealtimeCtx;

/// A realtime service handles a fixed set of inbound client events.
#[async_trait]
pub trait EventService: Send + Sync {
    fn name(&self) -> &'static str;
    /// Wire names of the events this service owns.
    fn events(&self) -> &'static [&'static str];
    async fn handle(&self, ctx: RealtimeCtx, event: ClientEvent) -> Result<()>;
}

/// Registry and dispatcher routing client events to services by event name.
#[derive(Default)]
pub struct Dispatcher {
    routes: DashMap<&'static str, Arc<dyn EventService>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            routes: DashMap::new(),
        }
    }

    pub fn register(&self, svc: Arc<dyn EventService>) {
        for ev in svc.events().iter().copied() {
            if let Some(prev) = self.routes.insert(ev, Arc::clone(&svc)) {
                tracing::warn!(event = %ev, replaced = prev.name(), by = svc.name(), "event route replaced");
            }
        }
    }

    pub fn registered_events(&self) -> Vec<&'static str> {
        self.routes.iter().map(|e| *e.key()).collect()
    }

    pub async fn dispatch(&self, ctx: RealtimeCtx, event: ClientEvent) -> Result<()> {
        let name = event.name();
        let handler = self
            .routes
            .get(name)
            .ok_or_else(|| RavenError::BadRequest(format!("unhandled event: {name}")))?
            .value()
            .clone();
        handler.handle(ctx, event).await
    }
}
