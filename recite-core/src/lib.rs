//! recite-core: shared types for the recite narration orchestrator
//!
//! Provides the vocabulary the other crates speak:
//! - Identifiers and ordering keys (sessions, messages, remote tasks)
//! - Configuration with validation
//! - The error taxonomy
//! - Inbound chat events and outbound narration events
//! - Sentence segmentation with language tags
//! - Per-session generation reporting

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod report;
pub mod segment;

pub use config::{AudioFormat, NarrationConfig, SpeechModel, VoiceProfile};
pub use error::NarrationError;
pub use events::{ChatEvent, NarrationEvent, QueueState, SwipeDirection};
pub use ids::{MessageId, OrderKey, SessionId, TaskId};
pub use report::{GenerationReport, UnitFailure, UnitOutcome};
pub use segment::{split_units, Unit};
