//! Typing presence through the dispatcher, with in-memory session queues.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use raven_core::model::{TypingEvent, CHANNEL_DOCTYPE};
use raven_core::protocol::{ClientEvent, DocRef, RoomKey, ServerEvent};
use raven_core::{ChannelId, SessionId, UserId};
use raven_gateway::dispatch::Dispatcher;
use raven_gateway::realtime::core::Connection;
use raven_gateway::realtime::{RealtimeCore, RealtimeCtx};
use raven_gateway::services::{SubscriptionService, TypingService};

struct Harness {
    core: Arc<RealtimeCore>,
    dispatcher: Dispatcher,
}

struct Client {
    ctx: RealtimeCtx,
    rx: mpsc::Receiver<Message>,
}

impl Harness {
    fn new() -> Self {
        let dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(TypingService::new()));
        dispatcher.register(Arc::new(SubscriptionService::new()));
        Self {
            core: Arc::new(RealtimeCore::new()),
            dispatcher,
        }
    }

    fn connect(&self, session: &str, user: &str) -> Client {
        let (tx, rx) = mpsc::channel(64);
        let s = self
            .core
            .connect(SessionId::from(session), UserId::from(user), Connection { tx });
        Client {
            ctx: RealtimeCtx::new(s.id, s.user, self.core.clone()),
            rx,
        }
    }

    async fn send(&self, c: &Client, ev: ClientEvent) {
        self.dispatcher.dispatch(c.ctx.clone(), ev).await.unwrap();
    }
}

impl Client {
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut out = Vec::new();
        while let Ok(Message::Text(s)) = self.rx.try_recv() {
            out.push(ServerEvent::decode(&s).unwrap());
        }
        out
    }

    fn last_typers(&mut self) -> Option<TypingEvent> {
        self.drain().into_iter().rev().find_map(|ev| match ev {
            ServerEvent::Typers(t) => Some(t),
            _ => None,
        })
    }
}

fn general() -> ChannelId {
    ChannelId::from("general")
}

fn watch_general() -> ClientEvent {
    ClientEvent::DocSubscribe(DocRef::new(CHANNEL_DOCTYPE, "general"))
}

#[tokio::test]
async fn start_typing_reaches_channel_audience_not_typing_room() {
    let h = Harness::new();
    let mut viewer = h.connect("s-viewer", "carol");
    let mut typer = h.connect("s-typer", "alice");
    h.send(&viewer, watch_general()).await;

    h.send(&typer, ClientEvent::Typing(general())).await;

    let snap = viewer.last_typers().expect("viewer gets snapshot");
    assert_eq!(snap.channel, general());
    assert_eq!(snap.users, vec![UserId::from("alice")]);
    // the typer is not watching the channel document
    assert!(typer.last_typers().is_none());
}

#[tokio::test]
async fn same_user_on_two_sessions_is_listed_once() {
    let h = Harness::new();
    let mut viewer = h.connect("s-viewer", "carol");
    h.send(&viewer, watch_general()).await;

    let phone = h.connect("s-phone", "alice");
    let laptop = h.connect("s-laptop", "alice");
    let bob = h.connect("s-bob", "bob");
    h.send(&phone, ClientEvent::Typing(general())).await;
    h.send(&laptop, ClientEvent::Typing(general())).await;
    h.send(&bob, ClientEvent::Typing(general())).await;

    let snap = viewer.last_typers().unwrap();
    assert_eq!(snap.users, vec![UserId::from("alice"), UserId::from("bob")]);
    assert_eq!(h.core.rooms.members_of(&RoomKey::typing(&general())).len(), 3);
}

#[tokio::test]
async fn get_typers_answers_only_the_asker() {
    let h = Harness::new();
    let mut watcher = h.connect("s-watch", "carol");
    h.send(&watcher, watch_general()).await;
    let typer = h.connect("s-typer", "alice");
    h.send(&typer, ClientEvent::Typing(general())).await;
    watcher.drain();

    let mut asker = h.connect("s-ask", "dave");
    h.send(&asker, ClientEvent::GetTypers(general())).await;

    assert_eq!(asker.last_typers().unwrap().users, vec![UserId::from("alice")]);
    assert!(watcher.drain().is_empty());
    // a query never changes membership
    assert!(!h.core.rooms.is_member(asker.ctx.session(), &RoomKey::typing(&general())));
}

#[tokio::test]
async fn stop_typing_broadcasts_updated_snapshot() {
    let h = Harness::new();
    let mut viewer = h.connect("s-viewer", "carol");
    h.send(&viewer, watch_general()).await;
    let typer = h.connect("s-typer", "alice");

    h.send(&typer, ClientEvent::Typing(general())).await;
    h.send(&typer, ClientEvent::TypingStopped(general())).await;
    assert!(viewer.last_typers().unwrap().users.is_empty());

    // stopping twice is harmless
    h.send(&typer, ClientEvent::TypingStopped(general())).await;
    assert!(viewer.last_typers().unwrap().users.is_empty());
}

#[tokio::test]
async fn disconnect_clears_typing_and_notifies_audience() {
    let h = Harness::new();
    let mut viewer = h.connect("s-viewer", "carol");
    h.send(&viewer, watch_general()).await;
    let typer = h.connect("s-typer", "alice");
    h.send(&typer, ClientEvent::Typing(general())).await;
    h.send(&typer, ClientEvent::Typing(ChannelId::from("random"))).await;
    viewer.drain();

    TypingService::on_disconnect(&h.core, typer.ctx.session());

    assert!(viewer.last_typers().unwrap().users.is_empty());
    assert!(h.core.rooms.rooms_of(typer.ctx.session()).is_empty());
    assert!(h.core.sessions.get(typer.ctx.session()).is_none());
    assert_eq!(
        TypingService::snapshot(&h.core, &ChannelId::from("random")).users,
        Vec::<UserId>::new()
    );
}

#[tokio::test]
async fn unsubscribed_viewer_stops_receiving() {
    let h = Harness::new();
    let mut viewer = h.connect("s-viewer", "carol");
    h.send(&viewer, watch_general()).await;
    h.send(&viewer, ClientEvent::DocUnsubscribe(DocRef::new(CHANNEL_DOCTYPE, "general"))).await;

    let typer = h.connect("s-typer", "alice");
    h.send(&typer, ClientEvent::Typing(general())).await;
    assert!(viewer.drain().is_empty());
}

#[tokio::test]
async fn empty_doc_subscribe_is_rejected() {
    let h = Harness::new();
    let c = h.connect("s1", "alice");
    let err = h
        .dispatcher
        .dispatch(c.ctx.clone(), ClientEvent::DocSubscribe(DocRef::new("", "")))
        .await
        .expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}
