//! recite-tts: the remote TTS service boundary
//!
//! Defines the [`TtsService`] trait the orchestration engine dispatches
//! through, and the HTTP implementation speaking the WhisperSpeech web UI
//! protocol (`POST /generate`, `POST /cancel/{task_id}`, `X-Task-ID`
//! response header, `499` for server-side cancellation).
//!
//! Generation is deliberately two-phase: [`TtsService::begin`] resolves as
//! soon as response headers arrive, so the caller can record the server task
//! id before the audio body has streamed in. Cancellation issued in that
//! window can therefore always reach the task currently in flight.

pub mod http;
pub mod service;

pub use http::HttpTtsService;
pub use service::{PendingUnit, TtsService, UnitRequest};
