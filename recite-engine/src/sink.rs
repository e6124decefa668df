//! Audio sink seam
//!
//! The engine does not decode or render audio itself; playback goes through
//! an [`AudioSink`] the host supplies. The sink owns pause state for the
//! artifact currently playing, because only the backend knows the exact
//! position at which audio stopped.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// How one artifact's playback ended
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEnd {
    /// The audio played to its natural end
    Completed,
    /// Playback was paused at the given position; resuming replays the
    /// same artifact from there
    Paused(Duration),
    /// The backend reported an error. Treated as finished by the player so
    /// the queue never stalls on unplayable audio.
    Failed(String),
}

/// Trait for audio backends
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play one artifact starting at `start_at`, resolving when it ends,
    /// pauses, or fails.
    async fn play(&self, artifact: Bytes, start_at: Duration) -> PlaybackEnd;

    /// Ask the artifact currently playing to pause; its pending `play`
    /// resolves with `Paused(position)`.
    fn pause(&self);

    /// Clear a pause request ahead of the next `play`.
    fn resume(&self);

    /// Abort the artifact currently playing, discarding its position.
    fn stop(&self);
}

/// Sink that discards audio immediately. Used when narration runs headless
/// (generation and ordering still exercised, nothing audible).
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&self, _artifact: Bytes, _start_at: Duration) -> PlaybackEnd {
        PlaybackEnd::Completed
    }

    fn pause(&self) {}

    fn resume(&self) {}

    fn stop(&self) {}
}
