//! Orchestrator
//!
//! [`Narrator`] is the single entry point the host embeds: it owns the
//! service client, the playback queue, the player, and the lifecycle
//! bookkeeping, and wires chat events through to sessions. Generation for a
//! new session starts immediately on its own task; playback order is
//! enforced by the queue, never by generation timing.

use crate::cancel::CancellationCoordinator;
use crate::dispatcher::RequestDispatcher;
use crate::lifecycle::{LifecycleCoordinator, MessageLookup, MessageRegistry, NarrationRequest};
use crate::player::StreamingPlayer;
use crate::queue::{AdmitOutcome, PlaybackQueue};
use crate::session::GenerationSession;
use crate::sink::AudioSink;
use recite_core::{
    split_units, ChatEvent, MessageId, NarrationConfig, NarrationError, NarrationEvent, OrderKey,
    QueueState, SessionId,
};
use recite_tts::{HttpTtsService, TtsService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Capacity of the outbound event channel; slow subscribers lag rather
/// than block the engine
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Top-level narration orchestrator
pub struct Narrator {
    config: NarrationConfig,
    dispatcher: RequestDispatcher,
    queue: Arc<PlaybackQueue>,
    player: Arc<StreamingPlayer>,
    canceller: Arc<CancellationCoordinator>,
    lifecycle: LifecycleCoordinator,
    registry: Arc<MessageRegistry>,
    events: broadcast::Sender<NarrationEvent>,
}

impl Narrator {
    /// Build a narrator speaking to the HTTP service named in the config.
    pub fn new(
        config: NarrationConfig,
        sink: Arc<dyn AudioSink>,
        lookup: Arc<dyn MessageLookup>,
    ) -> Result<Self, NarrationError> {
        config.validate().map_err(NarrationError::Config)?;
        let service: Arc<dyn TtsService> = Arc::new(HttpTtsService::new(
            config.endpoint.clone(),
            config.timeout_secs,
        )?);
        Self::with_service(config, service, sink, lookup)
    }

    /// Build a narrator over an arbitrary service implementation.
    pub fn with_service(
        config: NarrationConfig,
        service: Arc<dyn TtsService>,
        sink: Arc<dyn AudioSink>,
        lookup: Arc<dyn MessageLookup>,
    ) -> Result<Self, NarrationError> {
        config.validate().map_err(NarrationError::Config)?;
        if !config.enabled {
            return Err(NarrationError::Config(
                "Narration is disabled in the configuration".to_string(),
            ));
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        let queue = Arc::new(PlaybackQueue::new(poll_interval));
        let player = Arc::new(StreamingPlayer::new(
            sink,
            events.clone(),
            Duration::from_secs(config.artifact_wait_secs),
            poll_interval,
            config.max_player_passes,
        ));
        let canceller = Arc::new(CancellationCoordinator::new(
            Arc::clone(&queue),
            Arc::clone(&service),
            events.clone(),
        ));
        let registry = Arc::new(MessageRegistry::new());
        let lifecycle = LifecycleCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&canceller),
            lookup,
            Duration::from_secs(config.content_wait_secs),
            poll_interval,
        );

        info!("Narrator initialized against {}", config.endpoint);
        Ok(Self {
            config,
            dispatcher: RequestDispatcher::new(service),
            queue,
            player,
            canceller,
            lifecycle,
            registry,
            events,
        })
    }

    /// Start narrating one message: segment its text, queue a session, and
    /// begin generating on a background task. Returns `None` when the text
    /// segments to nothing narratable.
    pub fn narrate(
        &self,
        message: MessageId,
        order_key: OrderKey,
        text: &str,
    ) -> Option<SessionId> {
        let units = split_units(text);
        if units.is_empty() {
            debug!("Message {} has no narratable text, skipping", message);
            return None;
        }

        let session = GenerationSession::new(message, order_key, units);
        let id = session.id();
        self.registry.insert(session.clone());

        let _ = self.events.send(NarrationEvent::SessionQueued {
            session: id,
            message: session.message().clone(),
            units: session.unit_count(),
        });

        let outcome = self.queue.admit(session.clone());
        if outcome == AdmitOutcome::InsertedDriverNeeded {
            tokio::spawn(PlaybackQueue::run_driver(
                Arc::clone(&self.queue),
                Arc::clone(&self.player),
                self.events.clone(),
            ));
        }

        // Generation runs concurrently with everything else; a finished
        // report pokes the queue so blocked admission re-evaluates.
        let dispatcher = self.dispatcher.clone();
        let voice = self.config.voice.clone();
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            dispatcher.dispatch(&session, &voice).await;
            queue.poke();
        });

        Some(id)
    }

    /// Feed one chat event through the lifecycle rules.
    pub async fn handle_event(&self, event: ChatEvent) -> Option<SessionId> {
        let NarrationRequest {
            message,
            order_key,
            text,
        } = self.lifecycle.resolve(event).await?;
        self.narrate(message, order_key, &text)
    }

    /// Cancel one message's session, if it has one.
    pub async fn cancel_message(&self, message: &MessageId) {
        if let Some(session) = self.registry.remove(message) {
            self.canceller.cancel(&session).await;
        }
    }

    /// Cancel everything (shutdown, chat teardown).
    pub async fn stop_all(&self) {
        let sessions = self.registry.drain();
        self.canceller.cancel_all(&sessions).await;
    }

    /// Suspend playback, keeping the exact position for resume.
    pub fn pause(&self) {
        self.player.pause();
        let _ = self.events.send(NarrationEvent::StateChanged {
            state: QueueState::Paused,
        });
    }

    /// Resume playback from the saved position.
    pub fn resume(&self) {
        self.player.resume();
        let _ = self.events.send(NarrationEvent::StateChanged {
            state: QueueState::Playing,
        });
    }

    /// Current global state as mirrored by a single play/pause control.
    pub fn queue_state(&self) -> QueueState {
        if self.player.is_paused() {
            QueueState::Paused
        } else if self.queue.is_empty() {
            QueueState::Idle
        } else {
            QueueState::Playing
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<NarrationEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &NarrationConfig {
        &self.config
    }
}
