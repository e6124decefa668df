//! Message lifecycle
//!
//! Maps chat events onto session actions. Every message has at most one
//! live session; a variant switch cancels the old session exactly once and
//! starts a fresh one for the new text, polling the host when the new
//! variant's text is not available yet.

use crate::cancel::CancellationCoordinator;
use crate::session::GenerationSession;
use async_trait::async_trait;
use parking_lot::Mutex;
use recite_core::{ChatEvent, MessageId, OrderKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Host callback for reading a message's current visible text, used when a
/// variant switch arrives before the new variant has any content.
#[async_trait]
pub trait MessageLookup: Send + Sync {
    /// The message's current text, or `None` while it is still streaming in
    /// upstream or the message no longer exists.
    async fn message_text(&self, message: &MessageId) -> Option<String>;
}

/// Live sessions keyed by message. A message maps to at most one session;
/// replacing the mapping requires cancelling the old session first.
#[derive(Default)]
pub struct MessageRegistry {
    sessions: Mutex<HashMap<MessageId, GenerationSession>>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: GenerationSession) {
        self.sessions
            .lock()
            .insert(session.message().clone(), session);
    }

    pub fn get(&self, message: &MessageId) -> Option<GenerationSession> {
        self.sessions.lock().get(message).cloned()
    }

    pub fn remove(&self, message: &MessageId) -> Option<GenerationSession> {
        self.sessions.lock().remove(message)
    }

    /// Remove and return every live session (chat reset).
    pub fn drain(&self) -> Vec<GenerationSession> {
        self.sessions.lock().drain().map(|(_, s)| s).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

/// A resolved instruction to narrate one message's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationRequest {
    pub message: MessageId,
    pub order_key: OrderKey,
    pub text: String,
}

/// Turns chat events into narration requests and cancellations
pub struct LifecycleCoordinator {
    registry: Arc<MessageRegistry>,
    canceller: Arc<CancellationCoordinator>,
    lookup: Arc<dyn MessageLookup>,
    /// Bounded wait for a swiped-to variant's text to arrive
    content_wait: Duration,
    poll_interval: Duration,
}

impl LifecycleCoordinator {
    pub fn new(
        registry: Arc<MessageRegistry>,
        canceller: Arc<CancellationCoordinator>,
        lookup: Arc<dyn MessageLookup>,
        content_wait: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            registry,
            canceller,
            lookup,
            content_wait,
            poll_interval,
        }
    }

    /// Resolve one chat event. Returns a narration request when the event
    /// calls for a new session; cancellations happen inline.
    pub async fn resolve(&self, event: ChatEvent) -> Option<NarrationRequest> {
        match event {
            ChatEvent::MessageRendered {
                message,
                order_key,
                text,
            } => {
                if let Some(existing) = self.registry.get(&message) {
                    if !existing.is_cancelled() {
                        debug!("Message {} already has a live session, ignoring", message);
                        return None;
                    }
                    self.registry.remove(&message);
                }
                Some(NarrationRequest {
                    message,
                    order_key,
                    text,
                })
            }

            ChatEvent::VariantSwitched {
                message,
                order_key,
                direction: _,
                text,
            } => {
                // Exactly one cancellation for the superseded variant
                if let Some(old) = self.registry.remove(&message) {
                    info!("Variant switched on message {}, cancelling old session", message);
                    self.canceller.cancel(&old).await;
                }

                let text = match text {
                    Some(text) => Some(text),
                    None => self.await_text(&message).await,
                };
                text.map(|text| NarrationRequest {
                    message,
                    order_key,
                    text,
                })
            }

            ChatEvent::MessageRemoved { message } => {
                if let Some(session) = self.registry.remove(&message) {
                    info!("Message {} removed, cancelling its session", message);
                    self.canceller.cancel(&session).await;
                }
                None
            }

            ChatEvent::ChatReset => {
                let sessions = self.registry.drain();
                if !sessions.is_empty() {
                    info!("Chat reset, cancelling {} session(s)", sessions.len());
                    self.canceller.cancel_all(&sessions).await;
                }
                None
            }
        }
    }

    /// Poll the host for the new variant's text, up to the content wait
    /// bound. A variant that never produces text is not narrated.
    async fn await_text(&self, message: &MessageId) -> Option<String> {
        let deadline = Instant::now() + self.content_wait;
        loop {
            if let Some(text) = self.lookup.message_text(message).await {
                if !text.trim().is_empty() {
                    return Some(text);
                }
            }
            if Instant::now() >= deadline {
                debug!(
                    "No text for message {} after {:?}, skipping narration",
                    message, self.content_wait
                );
                return None;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
