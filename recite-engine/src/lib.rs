//! recite-engine: generation/playback orchestration
//!
//! The core of recite: sessions are generated concurrently against the
//! remote TTS service, but their audio is always played back in strict
//! message order. A session may not start playing until every session that
//! logically precedes it has finished generating or been cancelled; within a
//! session, artifacts are played one at a time, tolerating artifacts that
//! are not ready yet.
//!
//! Scheduling is cooperative: all coordination happens between await points,
//! cancellation propagates by flag (plus request abort), and every wait is
//! bounded or cancellable so no failure can stall the queue.

pub mod cancel;
pub mod dispatcher;
pub mod lifecycle;
pub mod orchestrator;
pub mod player;
pub mod queue;
pub mod session;
pub mod sink;

pub use cancel::CancellationCoordinator;
pub use dispatcher::RequestDispatcher;
pub use lifecycle::{LifecycleCoordinator, MessageLookup, MessageRegistry, NarrationRequest};
pub use orchestrator::Narrator;
pub use player::{CursorSnapshot, StreamingPlayer};
pub use queue::{AdmitOutcome, PlaybackQueue};
pub use session::GenerationSession;
pub use sink::{AudioSink, NullSink, PlaybackEnd};
