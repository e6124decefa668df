//! Request dispatch
//!
//! Units are dispatched strictly sequentially, never in parallel: each
//! request's server task id must be recorded before the next request
//! begins, so a cancellation issued mid-generation can reach every remote
//! task that has already started, including the one currently in flight.

use crate::session::GenerationSession;
use recite_core::{GenerationReport, NarrationError, UnitFailure, UnitOutcome, VoiceProfile};
use recite_tts::{TtsService, UnitRequest};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Dispatches one session's unit requests against the TTS service
#[derive(Clone)]
pub struct RequestDispatcher {
    service: Arc<dyn TtsService>,
}

impl RequestDispatcher {
    pub fn new(service: Arc<dyn TtsService>) -> Self {
        Self { service }
    }

    /// Run the session's units to completion. A failed unit never stops
    /// later units; cancellation stops new units from starting. Marks the
    /// session's generation finished and returns the final report.
    pub async fn dispatch(
        &self,
        session: &GenerationSession,
        voice: &VoiceProfile,
    ) -> GenerationReport {
        for index in 0..session.unit_count() {
            // Cooperative cancellation check before any new request starts
            if session.is_cancelled() {
                session.complete_unit(index, UnitOutcome::Cancelled);
                continue;
            }

            let outcome = self.dispatch_unit(session, index, voice).await;
            if let UnitOutcome::Failed(ref failure) = outcome {
                warn!(
                    "Unit {} of session {} failed: {}",
                    index,
                    session.id(),
                    failure
                );
            }
            session.complete_unit(index, outcome);
        }

        let report = session.finish_generation();
        info!("Session {} generation finished: {}", session.id(), report.summary());
        report
    }

    async fn dispatch_unit(
        &self,
        session: &GenerationSession,
        index: usize,
        voice: &VoiceProfile,
    ) -> UnitOutcome {
        let unit = match session.unit(index) {
            Some(unit) => unit,
            None => {
                warn!("Unit index {} out of range for session {}", index, session.id());
                return UnitOutcome::Failed(UnitFailure::Transport(
                    "unit index out of range".to_string(),
                ));
            }
        };

        let request = UnitRequest {
            text: unit.padded_text(),
            lang: unit.lang.clone(),
            voice: voice.clone(),
        };
        let token = session.cancel_token();

        // Race the request against cancellation; dropping the future aborts
        // the connection.
        let pending = tokio::select! {
            _ = token.cancelled() => return UnitOutcome::Cancelled,
            result = self.service.begin(&request) => match result {
                Ok(pending) => pending,
                Err(NarrationError::Cancelled) => return UnitOutcome::Cancelled,
                Err(e) => return failure_outcome(e),
            },
        };

        // Headers have arrived: record the task id before awaiting the body.
        match pending.task_id() {
            Some(task) => {
                session.record_task(task.clone());
                if session.is_cancelled() {
                    // Cancelled after headers; the task id is known now, so
                    // reach the in-flight task before discarding the result.
                    debug!("Session {} cancelled mid-unit, cancelling task {}", session.id(), task);
                    if let Err(e) = self.service.cancel_task(&task).await {
                        warn!("Failed to cancel remote task {}: {}", task, e);
                    }
                    return UnitOutcome::Cancelled;
                }
            }
            None => {
                if session.is_cancelled() {
                    return UnitOutcome::Cancelled;
                }
            }
        }

        let artifact = tokio::select! {
            _ = token.cancelled() => return UnitOutcome::Cancelled,
            result = pending.finish() => match result {
                Ok(bytes) => bytes,
                Err(NarrationError::Cancelled) => return UnitOutcome::Cancelled,
                Err(e) => return failure_outcome(e),
            },
        };

        debug!(
            "Unit {} of session {} generated ({} bytes)",
            index,
            session.id(),
            artifact.len()
        );
        UnitOutcome::Success(artifact)
    }
}

fn failure_outcome(error: NarrationError) -> UnitOutcome {
    match error {
        NarrationError::Api { status, message } => {
            UnitOutcome::Failed(UnitFailure::Service { status, message })
        }
        other => UnitOutcome::Failed(UnitFailure::Transport(other.to_string())),
    }
}
