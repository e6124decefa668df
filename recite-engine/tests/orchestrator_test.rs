//! Narrator facade tests: wiring, events, control surface.

mod common;

use common::{FakeLookup, FakeTtsService, RecordingSink, Script};
use recite_core::{
    ChatEvent, MessageId, NarrationConfig, NarrationError, NarrationEvent, OrderKey,
    QueueState,
};
use recite_engine::{Narrator, NullSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn config() -> NarrationConfig {
    NarrationConfig {
        enabled: true,
        poll_interval_ms: 20,
        ..NarrationConfig::default()
    }
}

fn narrator_with(service: Arc<FakeTtsService>) -> Narrator {
    Narrator::with_service(config(), service, Arc::new(NullSink), FakeLookup::empty())
        .expect("narrator should build")
}

async fn wait_for<F>(rx: &mut broadcast::Receiver<NarrationEvent>, mut pred: F) -> NarrationEvent
where
    F: FnMut(&NarrationEvent) -> bool,
{
    loop {
        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("expected event before timeout")
            .expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

#[test]
fn disabled_narration_is_rejected() {
    let config = NarrationConfig::default();
    assert!(!config.enabled);

    let result = Narrator::with_service(
        config,
        FakeTtsService::new(),
        Arc::new(NullSink),
        FakeLookup::empty(),
    );
    assert!(matches!(result, Err(NarrationError::Config(_))));
}

#[test]
fn invalid_endpoint_is_rejected() {
    let config = NarrationConfig {
        enabled: true,
        endpoint: "ftp://example.com".to_string(),
        ..NarrationConfig::default()
    };
    let result = Narrator::new(config, Arc::new(NullSink), FakeLookup::empty());
    assert!(matches!(result, Err(NarrationError::Config(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_text_is_not_narrated() {
    let narrator = narrator_with(FakeTtsService::new());
    assert!(narrator.narrate(MessageId::new("m1"), OrderKey::new(1), "   ").is_none());
    assert_eq!(narrator.queue_state(), QueueState::Idle);
}

#[tokio::test(flavor = "multi_thread")]
async fn narrate_generates_and_plays_to_completion() {
    let service = FakeTtsService::scripted(vec![
        Script::Success { audio: "a0", delay_ms: 0 },
        Script::Success { audio: "a1", delay_ms: 0 },
    ]);
    let narrator = narrator_with(service.clone());
    let mut rx = narrator.subscribe_events();

    let id = narrator
        .narrate(MessageId::new("m1"), OrderKey::new(1), "One. Two.")
        .expect("text should narrate");

    let queued = wait_for(&mut rx, |e| {
        matches!(e, NarrationEvent::SessionQueued { .. })
    })
    .await;
    match queued {
        NarrationEvent::SessionQueued { session, units, .. } => {
            assert_eq!(session, id);
            assert_eq!(units, 2);
        }
        _ => unreachable!(),
    }

    wait_for(&mut rx, |e| {
        matches!(e, NarrationEvent::PlaybackStarted { session, .. } if *session == id)
    })
    .await;

    let finished = wait_for(&mut rx, |e| {
        matches!(e, NarrationEvent::SessionFinished { .. })
    })
    .await;
    match finished {
        NarrationEvent::SessionFinished { report, .. } => {
            assert_eq!(report.completed, 2);
            assert!(report.is_complete());
        }
        _ => unreachable!(),
    }

    assert_eq!(service.begun().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn rendered_event_flows_into_narration() {
    let narrator = narrator_with(FakeTtsService::new());
    let mut rx = narrator.subscribe_events();

    let id = narrator
        .handle_event(ChatEvent::MessageRendered {
            message: MessageId::new("m1"),
            order_key: OrderKey::new(1),
            text: "Hello there.".to_string(),
        })
        .await
        .expect("rendered message should narrate");

    wait_for(&mut rx, |e| {
        matches!(e, NarrationEvent::SessionFinished { session, .. } if *session == id)
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_message_emits_session_cancelled() {
    // A slow unit keeps the session alive long enough to cancel it
    let service = FakeTtsService::scripted(vec![Script::Success {
        audio: "a0",
        delay_ms: 2_000,
    }]);
    let narrator = narrator_with(service.clone());
    let mut rx = narrator.subscribe_events();

    let id = narrator
        .narrate(MessageId::new("m1"), OrderKey::new(1), "Slow sentence.")
        .expect("text should narrate");

    tokio::time::sleep(Duration::from_millis(100)).await;
    narrator.cancel_message(&MessageId::new("m1")).await;

    wait_for(&mut rx, |e| {
        matches!(e, NarrationEvent::SessionCancelled { session, .. } if *session == id)
    })
    .await;
    assert_eq!(service.cancelled().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn pause_and_resume_toggle_state() {
    let service = FakeTtsService::new();
    let sink = RecordingSink::new(Duration::from_millis(200));
    let narrator = Narrator::with_service(config(), service, sink, FakeLookup::empty())
        .expect("narrator should build");
    let mut rx = narrator.subscribe_events();

    narrator
        .narrate(MessageId::new("m1"), OrderKey::new(1), "One long sentence.")
        .expect("text should narrate");

    tokio::time::sleep(Duration::from_millis(50)).await;
    narrator.pause();
    assert_eq!(narrator.queue_state(), QueueState::Paused);

    wait_for(&mut rx, |e| {
        matches!(
            e,
            NarrationEvent::StateChanged { state: QueueState::Paused }
        )
    })
    .await;

    narrator.resume();
    wait_for(&mut rx, |e| {
        matches!(
            e,
            NarrationEvent::StateChanged { state: QueueState::Playing }
        )
    })
    .await;

    wait_for(&mut rx, |e| {
        matches!(e, NarrationEvent::SessionFinished { .. })
    })
    .await;
    assert_eq!(narrator.queue_state(), QueueState::Idle);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_all_cancels_every_live_session() {
    let service = FakeTtsService::scripted(vec![
        Script::Success { audio: "a0", delay_ms: 2_000 },
        Script::Success { audio: "b0", delay_ms: 2_000 },
    ]);
    let narrator = narrator_with(service.clone());

    narrator
        .narrate(MessageId::new("m1"), OrderKey::new(1), "First one.")
        .expect("text should narrate");
    narrator
        .narrate(MessageId::new("m2"), OrderKey::new(2), "Second one.")
        .expect("text should narrate");

    tokio::time::sleep(Duration::from_millis(100)).await;
    narrator.stop_all().await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(narrator.queue_state(), QueueState::Idle);
}
