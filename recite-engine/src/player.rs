//! Streaming player
//!
//! Plays the artifacts of the currently admitted session one at a time,
//! starting after the entry's last played index. Artifacts that have not
//! arrived yet are waited for (bounded per index) while the session is
//! still generating; once generation has finished, an empty slot is either
//! a permanent gap to skip over or, with nothing after it, the end of the
//! entry. Missing audio degrades playback, it never fails it.

use crate::session::GenerationSession;
use crate::sink::{AudioSink, PlaybackEnd};
use parking_lot::Mutex;
use recite_core::{NarrationEvent, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Position of the single process-wide playback cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorSnapshot {
    pub current_session: Option<SessionId>,
    pub current_unit: Option<usize>,
    pub paused: bool,
    /// Saved position inside the in-progress artifact, for resume
    pub position: Duration,
}

#[derive(Debug)]
struct PlaybackCursor {
    current_session: Option<SessionId>,
    current_unit: Option<usize>,
    paused: bool,
    position: Duration,
}

enum ArtifactWait {
    Ready,
    TimedOut,
    GenerationEnded,
    Cancelled,
}

/// Streaming player driving the audio sink
pub struct StreamingPlayer {
    sink: Arc<dyn AudioSink>,
    cursor: Mutex<PlaybackCursor>,
    resumed: Notify,
    events: broadcast::Sender<NarrationEvent>,
    /// Bounded wait for a missing artifact while its session generates
    artifact_wait: Duration,
    poll_interval: Duration,
    /// Hard bound on indices processed per entry, in case bookkeeping
    /// goes inconsistent. Wait iterations do not count against it.
    max_passes: usize,
}

impl StreamingPlayer {
    pub fn new(
        sink: Arc<dyn AudioSink>,
        events: broadcast::Sender<NarrationEvent>,
        artifact_wait: Duration,
        poll_interval: Duration,
        max_passes: usize,
    ) -> Self {
        Self {
            sink,
            cursor: Mutex::new(PlaybackCursor {
                current_session: None,
                current_unit: None,
                paused: false,
                position: Duration::ZERO,
            }),
            resumed: Notify::new(),
            events,
            artifact_wait,
            poll_interval,
            max_passes,
        }
    }

    /// Suspend the play/wait loop without discarding position
    pub fn pause(&self) {
        let mut cursor = self.cursor.lock();
        if !cursor.paused {
            cursor.paused = true;
            drop(cursor);
            self.sink.pause();
            debug!("Playback paused");
        }
    }

    /// Resume from the exact saved position
    pub fn resume(&self) {
        let mut cursor = self.cursor.lock();
        if cursor.paused {
            cursor.paused = false;
            drop(cursor);
            self.sink.resume();
            self.resumed.notify_waiters();
            debug!("Playback resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.cursor.lock().paused
    }

    pub fn cursor(&self) -> CursorSnapshot {
        let cursor = self.cursor.lock();
        CursorSnapshot {
            current_session: cursor.current_session,
            current_unit: cursor.current_unit,
            paused: cursor.paused,
            position: cursor.position,
        }
    }

    /// Play a session's artifacts starting after `start_after`. Returns the
    /// new last played index. Ends when no further artifact can appear,
    /// when the session is cancelled, or at the safety bound.
    pub async fn play_entry(
        &self,
        session: &GenerationSession,
        start_after: Option<usize>,
    ) -> Option<usize> {
        let total = session.unit_count();
        let mut last_played = start_after;
        let mut index = start_after.map_or(0, |i| i + 1);
        let mut passes = 0usize;

        {
            let mut cursor = self.cursor.lock();
            cursor.current_session = Some(session.id());
            cursor.current_unit = None;
        }

        while index < total {
            if passes >= self.max_passes {
                warn!(
                    "Playback of session {} processed {} indices, bailing out",
                    session.id(),
                    passes
                );
                break;
            }

            if session.is_cancelled() {
                break;
            }
            if !self.wait_until_resumed(session).await {
                break;
            }

            match session.artifact(index) {
                Some(artifact) => {
                    if !self.play_artifact(session, index, total, artifact).await {
                        break;
                    }
                    last_played = Some(index);
                    index += 1;
                    passes += 1;
                }
                None => {
                    if !session.is_generating() {
                        // Generation over: this slot stays empty forever. A
                        // later artifact means this is a gap to skip; none
                        // means the entry is done.
                        if !session.has_artifact_after(index) {
                            break;
                        }
                        self.emit_skip(session, index);
                        last_played = Some(index);
                        index += 1;
                        passes += 1;
                        continue;
                    }
                    match self.wait_for_artifact(session, index).await {
                        ArtifactWait::Ready => {
                            // Re-enter the loop; the artifact is there now
                        }
                        ArtifactWait::TimedOut => {
                            warn!(
                                "Artifact {} of session {} not ready after {:?}, skipping",
                                index,
                                session.id(),
                                self.artifact_wait
                            );
                            self.emit_skip(session, index);
                            last_played = Some(index);
                            index += 1;
                            passes += 1;
                        }
                        ArtifactWait::GenerationEnded => {
                            // Re-enter the loop; the branch above decides
                            // between gap-skip and end of entry
                        }
                        ArtifactWait::Cancelled => break,
                    }
                }
            }
        }

        {
            let mut cursor = self.cursor.lock();
            cursor.current_session = None;
            cursor.current_unit = None;
            cursor.position = Duration::ZERO;
        }

        last_played
    }

    /// Play one artifact to its terminal state. Returns false when the
    /// session was cancelled mid-play.
    async fn play_artifact(
        &self,
        session: &GenerationSession,
        index: usize,
        total: usize,
        artifact: bytes::Bytes,
    ) -> bool {
        let mut start_at = {
            let mut cursor = self.cursor.lock();
            let resuming = cursor.current_unit == Some(index);
            cursor.current_unit = Some(index);
            if resuming {
                cursor.position
            } else {
                cursor.position = Duration::ZERO;
                Duration::ZERO
            }
        };

        self.emit(NarrationEvent::UnitPlaying {
            session: session.id(),
            message: session.message().clone(),
            index,
            total,
        });

        loop {
            let token = session.cancel_token();
            let end = tokio::select! {
                _ = token.cancelled() => {
                    self.sink.stop();
                    return false;
                }
                end = self.sink.play(artifact.clone(), start_at) => end,
            };

            match end {
                PlaybackEnd::Completed => {
                    self.cursor.lock().position = Duration::ZERO;
                    return true;
                }
                PlaybackEnd::Failed(e) => {
                    // Unplayable audio counts as finished; the queue must
                    // keep advancing
                    warn!(
                        "Playback of artifact {} in session {} failed: {}",
                        index,
                        session.id(),
                        e
                    );
                    self.emit_skip(session, index);
                    self.cursor.lock().position = Duration::ZERO;
                    return true;
                }
                PlaybackEnd::Paused(position) => {
                    self.cursor.lock().position = position;
                    if !self.wait_until_resumed(session).await {
                        return false;
                    }
                    start_at = position;
                }
            }
        }
    }

    /// Bounded wait for an artifact while the session is still generating.
    /// The clock freezes while playback is paused: however long the pause
    /// lasts, it never burns the wait budget of the pending index.
    async fn wait_for_artifact(
        &self,
        session: &GenerationSession,
        index: usize,
    ) -> ArtifactWait {
        let mut remaining = self.artifact_wait;

        loop {
            if session.is_cancelled() {
                return ArtifactWait::Cancelled;
            }
            if session.artifact(index).is_some() {
                return ArtifactWait::Ready;
            }
            if !session.is_generating() {
                return ArtifactWait::GenerationEnded;
            }
            if self.is_paused() {
                if !self.wait_until_resumed(session).await {
                    return ArtifactWait::Cancelled;
                }
                continue;
            }
            if remaining.is_zero() {
                return ArtifactWait::TimedOut;
            }
            let waited = Instant::now();
            session.wait_changed(self.poll_interval.min(remaining)).await;
            remaining = remaining.saturating_sub(waited.elapsed());
        }
    }

    /// Block while paused. Returns false when the session was cancelled
    /// while waiting.
    async fn wait_until_resumed(&self, session: &GenerationSession) -> bool {
        loop {
            if session.is_cancelled() {
                return false;
            }
            if !self.is_paused() {
                return true;
            }
            let _ = tokio::time::timeout(self.poll_interval, self.resumed.notified()).await;
        }
    }

    fn emit(&self, event: NarrationEvent) {
        // Send fails only when nobody subscribed
        let _ = self.events.send(event);
    }

    fn emit_skip(&self, session: &GenerationSession, index: usize) {
        self.emit(NarrationEvent::UnitSkipped {
            session: session.id(),
            message: session.message().clone(),
            index,
        });
    }
}
