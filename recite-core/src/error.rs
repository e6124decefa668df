//! Error types for recite

use thiserror::Error;

/// Narration errors
///
/// Failures are contained to the unit or session that produced them; nothing
/// in this taxonomy is allowed to stall the playback queue.
#[derive(Error, Debug)]
pub enum NarrationError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure: the request never completed.
    #[error("Request error: {0}")]
    Request(String),

    /// Server-reported failure: a non-2xx, non-499 response.
    #[error("TTS service error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Explicit cancellation, local or server-side (499).
    #[error("Cancelled")]
    Cancelled,

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NarrationError {
    /// True when the error represents cancellation rather than failure.
    /// Cancellation is reported distinctly from failure everywhere.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NarrationError::Cancelled)
    }
}
