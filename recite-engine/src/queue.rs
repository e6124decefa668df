//! Playback queue
//!
//! Globally ordered collection of sessions, sorted by order key. The queue
//! performs admission control: a session may not start playing until every
//! session with a strictly smaller order key has finished generating or
//! been cancelled. At most one driver loop runs at a time; admission while
//! a driver is active only appends to the queue.

use crate::player::StreamingPlayer;
use crate::session::GenerationSession;
use parking_lot::Mutex;
use recite_core::{NarrationEvent, OrderKey, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::Notify;
use tracing::{debug, info};

/// One queued session with its playback bookkeeping
struct QueueEntry {
    session: GenerationSession,
    /// Playback has started (and, once the driver moves on, finished)
    processed: bool,
    /// Highest unit index played or conclusively skipped
    last_played: Option<usize>,
}

struct QueueInner {
    entries: Vec<QueueEntry>,
    /// The at-most-one session currently admitted for playback
    current: Option<SessionId>,
    driver_active: bool,
}

/// Result of admitting a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// Inserted; the caller must spawn a driver loop
    InsertedDriverNeeded,
    /// Inserted; a driver loop is already running
    Inserted,
    /// The session was already queued; nothing was reset
    AlreadyQueued,
}

/// Globally ordered playback queue
pub struct PlaybackQueue {
    inner: Mutex<QueueInner>,
    /// Signalled on admission, eviction, and generation-finished pokes
    changed: Notify,
    poll_interval: Duration,
}

impl PlaybackQueue {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                entries: Vec::new(),
                current: None,
                driver_active: false,
            }),
            changed: Notify::new(),
            poll_interval,
        }
    }

    /// Insert a session sorted by order key. Re-admission of a queued
    /// session never resets its playback progress: artifacts live on the
    /// shared session, so there is nothing to refresh destructively.
    pub fn admit(&self, session: GenerationSession) -> AdmitOutcome {
        let outcome = {
            let mut inner = self.inner.lock();

            if inner.entries.iter().any(|e| e.session.id() == session.id()) {
                AdmitOutcome::AlreadyQueued
            } else {
                // Stable insert: equal keys keep admission order
                let key = session.order_key();
                let position = inner
                    .entries
                    .iter()
                    .position(|e| e.session.order_key() > key)
                    .unwrap_or(inner.entries.len());
                inner.entries.insert(
                    position,
                    QueueEntry {
                        session,
                        processed: false,
                        last_played: None,
                    },
                );

                if inner.driver_active {
                    AdmitOutcome::Inserted
                } else {
                    inner.driver_active = true;
                    AdmitOutcome::InsertedDriverNeeded
                }
            }
        };

        self.changed.notify_waiters();
        outcome
    }

    /// Remove a session from the queue. The driver notices eviction of the
    /// current entry through the session's cancelled flag.
    pub fn evict(&self, session: SessionId) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            let before = inner.entries.len();
            inner.entries.retain(|e| e.session.id() != session);
            inner.entries.len() != before
        };
        if removed {
            debug!("Session {} evicted from queue", session);
            self.changed.notify_waiters();
        }
        removed
    }

    /// Wake the driver so it re-evaluates admission (e.g. after a session
    /// finished generating).
    pub fn poke(&self) {
        self.changed.notify_waiters();
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.inner
            .lock()
            .entries
            .iter()
            .any(|e| e.session.id() == session)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// The currently admitted session, if any
    pub fn current(&self) -> Option<SessionId> {
        self.inner.lock().current
    }

    /// Order keys of queued sessions, in queue order
    pub fn order_keys(&self) -> Vec<OrderKey> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|e| e.session.order_key())
            .collect()
    }

    async fn wait_changed(&self) {
        let _ = tokio::time::timeout(self.poll_interval, self.changed.notified()).await;
    }

    /// The driver loop. Exactly one runs at a time: `admit` hands out
    /// `InsertedDriverNeeded` only while no driver is active, and the loop
    /// clears the flag under the same lock it uses to find the queue empty.
    pub async fn run_driver(
        queue: Arc<PlaybackQueue>,
        player: Arc<StreamingPlayer>,
        events: broadcast::Sender<NarrationEvent>,
    ) {
        debug!("Playback driver started");

        loop {
            // (a) smallest-key unprocessed entry
            let candidate = {
                let mut inner = queue.inner.lock();
                let next = inner
                    .entries
                    .iter()
                    .filter(|e| !e.processed)
                    .min_by_key(|e| e.session.order_key())
                    .map(|e| e.session.clone());
                match next {
                    Some(session) => session,
                    None => {
                        // Idle: clear the flag under the lock so a racing
                        // admit either sees it cleared and spawns a new
                        // driver, or inserted before we looked here
                        inner.driver_active = false;
                        debug!("Playback driver idle, exiting");
                        return;
                    }
                }
            };

            // (b) admission gate: every strictly earlier session must have
            // finished generating or been cancelled. On block, wait one
            // round and re-pick from (a) rather than holding on to this
            // candidate: a smaller-key session admitted in the meantime
            // must become the candidate and keep its streaming start.
            let blocked = {
                let inner = queue.inner.lock();
                inner.entries.iter().any(|e| {
                    e.session.order_key() < candidate.order_key()
                        && e.session.is_generating()
                        && !e.session.is_cancelled()
                })
            };
            if blocked {
                queue.wait_changed().await;
                continue;
            }

            // (c) re-validate after the suspension points above, then admit
            let start_after = {
                let mut inner = queue.inner.lock();
                let Some(position) = inner
                    .entries
                    .iter()
                    .position(|e| e.session.id() == candidate.id())
                else {
                    continue; // evicted
                };

                if candidate.is_cancelled() {
                    // Skipped without playback
                    inner.entries.remove(position);
                    drop(inner);
                    queue.changed.notify_waiters();
                    continue;
                }

                // A smaller-key session may have been admitted to the queue
                // while we waited; it goes first
                let superseded = inner.entries.iter().any(|e| {
                    !e.processed && e.session.order_key() < candidate.order_key()
                });
                if superseded {
                    continue;
                }

                let entry = &mut inner.entries[position];
                entry.processed = true;
                inner.current = Some(candidate.id());
                inner.entries[position].last_played
            };

            let _ = events.send(NarrationEvent::PlaybackStarted {
                session: candidate.id(),
                message: candidate.message().clone(),
            });
            info!(
                "Playing session {} (order key {})",
                candidate.id(),
                candidate.order_key()
            );

            let last_played = player.play_entry(&candidate, start_after).await;

            {
                let mut inner = queue.inner.lock();
                if let Some(entry) = inner
                    .entries
                    .iter_mut()
                    .find(|e| e.session.id() == candidate.id())
                {
                    entry.last_played = last_played;
                }
                inner.entries.retain(|e| e.session.id() != candidate.id());
                inner.current = None;
            }
            queue.changed.notify_waiters();

            if !candidate.is_cancelled() {
                let _ = events.send(NarrationEvent::SessionFinished {
                    session: candidate.id(),
                    message: candidate.message().clone(),
                    report: candidate.report(),
                });
            }
        }
    }
}
