//! Cancellation
//!
//! Cancelling a session is idempotent and settles three places: the local
//! cancelled flag (stops new units and admission), the cancellation token
//! (aborts in-flight awaits), and the remote service (one cancel call per
//! recorded task id). Remote cancels are best effort; a failed cancel is
//! logged and never blocks local teardown.

use crate::queue::PlaybackQueue;
use crate::session::GenerationSession;
use futures_util::future::join_all;
use recite_core::NarrationEvent;
use recite_tts::TtsService;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Cancels sessions locally and against the remote service
pub struct CancellationCoordinator {
    queue: Arc<PlaybackQueue>,
    service: Arc<dyn TtsService>,
    events: broadcast::Sender<NarrationEvent>,
}

impl CancellationCoordinator {
    pub fn new(
        queue: Arc<PlaybackQueue>,
        service: Arc<dyn TtsService>,
        events: broadcast::Sender<NarrationEvent>,
    ) -> Self {
        Self {
            queue,
            service,
            events,
        }
    }

    /// Cancel one session. Safe to call any number of times; only the
    /// first call does work.
    pub async fn cancel(&self, session: &GenerationSession) {
        if !session.mark_cancelled() {
            debug!("Session {} already cancelled", session.id());
            return;
        }

        info!("Cancelling session {}", session.id());

        // One cancel per recorded remote task, concurrently. Each failure
        // is logged on its own; the others still go out.
        let tasks = session.tasks();
        let cancels = tasks.iter().map(|task| {
            let service = Arc::clone(&self.service);
            async move {
                if let Err(e) = service.cancel_task(task).await {
                    warn!("Failed to cancel remote task {}: {}", task, e);
                }
            }
        });
        join_all(cancels).await;

        self.queue.evict(session.id());

        let _ = self.events.send(NarrationEvent::SessionCancelled {
            session: session.id(),
            message: session.message().clone(),
        });
    }

    /// Cancel a batch of sessions (chat reset, shutdown).
    pub async fn cancel_all(&self, sessions: &[GenerationSession]) {
        for session in sessions {
            self.cancel(session).await;
        }
    }
}
