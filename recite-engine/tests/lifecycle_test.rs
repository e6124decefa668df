//! Lifecycle tests: rendered/variant/removed/reset event resolution.

mod common;

use common::{FakeLookup, FakeTtsService};
use recite_core::{
    split_units, ChatEvent, MessageId, NarrationEvent, OrderKey, SwipeDirection,
};
use recite_engine::{
    CancellationCoordinator, GenerationSession, LifecycleCoordinator, MessageRegistry,
    PlaybackQueue,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const POLL: Duration = Duration::from_millis(20);

struct Fixture {
    registry: Arc<MessageRegistry>,
    service: Arc<FakeTtsService>,
    lifecycle: LifecycleCoordinator,
    events: broadcast::Receiver<NarrationEvent>,
}

fn fixture(lookup: Arc<FakeLookup>) -> Fixture {
    let (events, rx) = broadcast::channel(64);
    let queue = Arc::new(PlaybackQueue::new(POLL));
    let service = FakeTtsService::new();
    let registry = Arc::new(MessageRegistry::new());
    let canceller = Arc::new(CancellationCoordinator::new(
        queue,
        service.clone(),
        events,
    ));
    let lifecycle = LifecycleCoordinator::new(
        Arc::clone(&registry),
        canceller,
        lookup,
        Duration::from_millis(200),
        POLL,
    );
    Fixture {
        registry,
        service,
        lifecycle,
        events: rx,
    }
}

fn live_session(registry: &MessageRegistry, message: &str, key: i64) -> GenerationSession {
    let session = GenerationSession::new(
        MessageId::new(message),
        OrderKey::new(key),
        split_units("Old variant text."),
    );
    registry.insert(session.clone());
    session
}

fn cancelled_count(rx: &mut broadcast::Receiver<NarrationEvent>) -> usize {
    let mut count = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, NarrationEvent::SessionCancelled { .. }) {
            count += 1;
        }
    }
    count
}

#[tokio::test]
async fn rendered_message_produces_request() {
    let f = fixture(FakeLookup::empty());
    let request = f
        .lifecycle
        .resolve(ChatEvent::MessageRendered {
            message: MessageId::new("m1"),
            order_key: OrderKey::new(5),
            text: "Hello world.".to_string(),
        })
        .await
        .expect("should narrate a fresh message");

    assert_eq!(request.message, MessageId::new("m1"));
    assert_eq!(request.order_key, OrderKey::new(5));
    assert_eq!(request.text, "Hello world.");
}

#[tokio::test]
async fn rendered_message_with_live_session_is_ignored() {
    let f = fixture(FakeLookup::empty());
    live_session(&f.registry, "m1", 5);

    let request = f
        .lifecycle
        .resolve(ChatEvent::MessageRendered {
            message: MessageId::new("m1"),
            order_key: OrderKey::new(5),
            text: "Hello again.".to_string(),
        })
        .await;

    assert!(request.is_none());
    assert_eq!(f.registry.len(), 1);
}

#[tokio::test]
async fn variant_switch_cancels_old_session_exactly_once() {
    let mut f = fixture(FakeLookup::empty());
    let old = live_session(&f.registry, "m1", 5);
    old.record_task(recite_core::TaskId::new("t-old"));

    let request = f
        .lifecycle
        .resolve(ChatEvent::VariantSwitched {
            message: MessageId::new("m1"),
            order_key: OrderKey::new(5),
            direction: SwipeDirection::Next,
            text: Some("New variant text.".to_string()),
        })
        .await
        .expect("switch with text should renarrate");

    assert_eq!(request.text, "New variant text.");
    assert!(old.is_cancelled());
    assert!(f.registry.get(&MessageId::new("m1")).is_none());

    // The old session's remote task got exactly one cancel
    assert_eq!(f.service.cancelled().len(), 1);
    assert_eq!(cancelled_count(&mut f.events), 1);
}

#[tokio::test]
async fn variant_switch_without_session_just_narrates() {
    let mut f = fixture(FakeLookup::empty());

    let request = f
        .lifecycle
        .resolve(ChatEvent::VariantSwitched {
            message: MessageId::new("m1"),
            order_key: OrderKey::new(5),
            direction: SwipeDirection::Previous,
            text: Some("Other variant.".to_string()),
        })
        .await;

    assert!(request.is_some());
    assert_eq!(cancelled_count(&mut f.events), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn variant_switch_polls_for_streaming_text() {
    // The first two looks find nothing; the third finds the new variant
    let f = fixture(FakeLookup::scripted(vec![
        None,
        None,
        Some("Streamed-in variant."),
    ]));

    let request = f
        .lifecycle
        .resolve(ChatEvent::VariantSwitched {
            message: MessageId::new("m1"),
            order_key: OrderKey::new(5),
            direction: SwipeDirection::Next,
            text: None,
        })
        .await
        .expect("text should arrive within the wait bound");

    assert_eq!(request.text, "Streamed-in variant.");
}

#[tokio::test(flavor = "multi_thread")]
async fn variant_that_never_gets_text_is_not_narrated() {
    let f = fixture(FakeLookup::empty());

    let request = f
        .lifecycle
        .resolve(ChatEvent::VariantSwitched {
            message: MessageId::new("m1"),
            order_key: OrderKey::new(5),
            direction: SwipeDirection::Next,
            text: None,
        })
        .await;

    assert!(request.is_none());
}

#[tokio::test]
async fn removed_message_cancels_its_session() {
    let mut f = fixture(FakeLookup::empty());
    let session = live_session(&f.registry, "m1", 5);

    let request = f
        .lifecycle
        .resolve(ChatEvent::MessageRemoved {
            message: MessageId::new("m1"),
        })
        .await;

    assert!(request.is_none());
    assert!(session.is_cancelled());
    assert!(f.registry.is_empty());
    assert_eq!(cancelled_count(&mut f.events), 1);
}

#[tokio::test]
async fn chat_reset_cancels_every_session() {
    let mut f = fixture(FakeLookup::empty());
    let s1 = live_session(&f.registry, "m1", 1);
    let s2 = live_session(&f.registry, "m2", 2);

    let request = f.lifecycle.resolve(ChatEvent::ChatReset).await;

    assert!(request.is_none());
    assert!(s1.is_cancelled());
    assert!(s2.is_cancelled());
    assert!(f.registry.is_empty());
    assert_eq!(cancelled_count(&mut f.events), 2);
}
