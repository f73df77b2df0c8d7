//! Document audiences: a session viewing a document joins `doc:<doctype>/<name>`
//! and receives what is published there (typing snapshots, list updates).

use async_trait::async_trait;

use raven_core::error::{RavenError, Result};
use raven_core::protocol::inbound::{DOC_SUBSCRIBE, DOC_UNSUBSCRIBE};
use raven_core::protocol::{ClientEvent, RoomKey};

use crate::dispatch::EventService;
use crate::realtime::RealtimeCtx;

#[derive(Default)]
pub struct SubscriptionService;

impl SubscriptionService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventService for SubscriptionService {
    fn name(&self) -> &'static str {
        "subscription"
    }

    fn events(&self) -> &'static [&'static str] {
        &[DOC_SUBSCRIBE, DOC_UNSUBSCRIBE]
    }

    async fn handle(&self, ctx: RealtimeCtx, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::DocSubscribe(doc) => {
                if doc.doctype.is_empty() || doc.name.is_empty() {
                    return Err(RavenError::BadRequest("doc_subscribe requires doctype and name".into()));
                }
                ctx.join_room(&RoomKey::doc(&doc));
                Ok(())
            }
            ClientEvent::DocUnsubscribe(doc) => {
                ctx.leave_room(&RoomKey::doc(&doc));
                Ok(())
            }
            other => Err(RavenError::BadRequest(format!(
                "subscription service cannot handle {}",
                other.name()
            ))),
        }
    }
}
