//! Trait for TTS services

use async_trait::async_trait;
use bytes::Bytes;
use recite_core::{NarrationError, TaskId, VoiceProfile};

/// One unit's generation request
#[derive(Debug, Clone)]
pub struct UnitRequest {
    /// Sentence text, already padded for the pipeline
    pub text: String,
    /// Language code for this unit ("en", "pl")
    pub lang: String,
    /// Voice settings
    pub voice: VoiceProfile,
}

impl UnitRequest {
    /// Text as sent over the wire. The service switches language through
    /// inline tags, so non-default languages are re-tagged here.
    pub fn wire_text(&self) -> String {
        if self.lang == "en" {
            self.text.clone()
        } else {
            format!("<{}>{}", self.lang, self.text)
        }
    }
}

/// A generation request whose response headers have arrived.
///
/// The server task id (if any) is already known; the audio body may still be
/// in flight until [`PendingUnit::finish`] resolves.
#[async_trait]
pub trait PendingUnit: Send {
    /// Server-assigned task id, from the response headers.
    fn task_id(&self) -> Option<TaskId>;

    /// Await the audio body.
    async fn finish(self: Box<Self>) -> Result<Bytes, NarrationError>;
}

impl std::fmt::Debug for dyn PendingUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingUnit")
            .field("task_id", &self.task_id())
            .finish()
    }
}

/// Trait for TTS services
#[async_trait]
pub trait TtsService: Send + Sync {
    /// Issue a generation request; resolves at response-header time.
    async fn begin(&self, request: &UnitRequest)
        -> Result<Box<dyn PendingUnit>, NarrationError>;

    /// Ask the service to cancel server-side work for a task. Best-effort:
    /// callers log failures and move on, they never propagate them as
    /// session failures.
    async fn cancel_task(&self, task: &TaskId) -> Result<(), NarrationError>;

    /// Service name for logs
    fn name(&self) -> &str;
}
