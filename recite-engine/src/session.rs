//! Generation sessions
//!
//! One session owns the ordered units of one chat message, the sparse set of
//! audio artifacts produced so far, and the remote task ids recorded for
//! out-of-band cancellation. Sessions are shared: the dispatcher appends
//! artifacts while the queue and player read them.

use bytes::Bytes;
use parking_lot::Mutex;
use recite_core::{
    GenerationReport, MessageId, OrderKey, SessionId, TaskId, Unit, UnitOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shared handle to one generation session
#[derive(Clone)]
pub struct GenerationSession {
    inner: Arc<SessionShared>,
}

struct SessionShared {
    id: SessionId,
    message: MessageId,
    order_key: OrderKey,
    units: Vec<Unit>,
    state: Mutex<SessionState>,
    /// Signalled on artifact arrival, cancellation, and generation finish
    changed: Notify,
    /// Aborts in-flight requests immediately on cancellation
    cancel: CancellationToken,
}

struct SessionState {
    /// Sparse artifacts, indexed by unit position. A slot is written at
    /// most once.
    artifacts: Vec<Option<Bytes>>,
    /// Remote task ids in the order their requests were started
    remote_tasks: Vec<TaskId>,
    /// Monotonic: once true, never reset
    cancelled: bool,
    /// True from creation until all units reached a terminal state
    generating: bool,
    report: GenerationReport,
}

impl GenerationSession {
    /// Create a new session for a message's units. The session starts in
    /// the generating state.
    pub fn new(message: MessageId, order_key: OrderKey, units: Vec<Unit>) -> Self {
        let count = units.len();
        GenerationSession {
            inner: Arc::new(SessionShared {
                id: SessionId::new(),
                message,
                order_key,
                units,
                state: Mutex::new(SessionState {
                    artifacts: vec![None; count],
                    remote_tasks: Vec::new(),
                    cancelled: false,
                    generating: true,
                    report: GenerationReport::new(count),
                }),
                changed: Notify::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn message(&self) -> &MessageId {
        &self.inner.message
    }

    pub fn order_key(&self) -> OrderKey {
        self.inner.order_key
    }

    pub fn unit_count(&self) -> usize {
        self.inner.units.len()
    }

    pub fn unit(&self, index: usize) -> Option<&Unit> {
        self.inner.units.get(index)
    }

    /// Artifact at `index`, if it has arrived. `Bytes` clones are cheap.
    pub fn artifact(&self, index: usize) -> Option<Bytes> {
        self.inner.state.lock().artifacts.get(index).cloned().flatten()
    }

    /// Whether any artifact exists at an index greater than `index`. After
    /// generation has finished this decides whether an empty slot is a gap
    /// to skip over or the end of the entry.
    pub fn has_artifact_after(&self, index: usize) -> bool {
        self.inner
            .state
            .lock()
            .artifacts
            .iter()
            .skip(index + 1)
            .any(|slot| slot.is_some())
    }

    /// Record the terminal outcome of one unit. A successful outcome
    /// appends its artifact; slots are never overwritten, and a cancelled
    /// session never gains artifacts.
    pub fn complete_unit(&self, index: usize, outcome: UnitOutcome) {
        let mut state = self.inner.state.lock();

        let outcome = if state.cancelled {
            // The body may have raced in after cancellation; discard it
            UnitOutcome::Cancelled
        } else {
            outcome
        };

        if let UnitOutcome::Success(ref artifact) = outcome {
            match state.artifacts.get_mut(index) {
                Some(slot @ None) => *slot = Some(artifact.clone()),
                Some(_) => {
                    warn!("Artifact {} for session {} already set, keeping first", index, self.inner.id);
                }
                None => {
                    warn!("Artifact index {} out of range for session {}", index, self.inner.id);
                }
            }
        }

        state.report.record(&outcome);
        drop(state);
        self.inner.changed.notify_waiters();
    }

    /// Record a server task id as soon as it is known (at response-header
    /// time), so cancellation can reach the in-flight task.
    pub fn record_task(&self, task: TaskId) {
        let mut state = self.inner.state.lock();
        if !state.remote_tasks.contains(&task) {
            state.remote_tasks.push(task);
        }
    }

    /// All remote task ids recorded so far
    pub fn tasks(&self) -> Vec<TaskId> {
        self.inner.state.lock().remote_tasks.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled
    }

    pub fn is_generating(&self) -> bool {
        self.inner.state.lock().generating
    }

    pub fn report(&self) -> GenerationReport {
        self.inner.state.lock().report
    }

    /// Token raced against network awaits for immediate abort
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Flip the cancelled flag. Returns false when the session was already
    /// cancelled; only the cancellation coordinator calls this.
    pub(crate) fn mark_cancelled(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.cancelled {
                return false;
            }
            state.cancelled = true;
        }
        // Flag is set before the token fires: no new unit can start, and
        // in-flight requests abort.
        self.inner.cancel.cancel();
        self.inner.changed.notify_waiters();
        debug!("Session {} marked cancelled", self.inner.id);
        true
    }

    /// Mark generation finished (terminal for dispatch, distinct from
    /// cancellation) and return the final report.
    pub(crate) fn finish_generation(&self) -> GenerationReport {
        let report = {
            let mut state = self.inner.state.lock();
            state.generating = false;
            state.report
        };
        self.inner.changed.notify_waiters();
        report
    }

    /// Wait for any state change, up to `timeout`. Waiters re-check their
    /// condition afterwards; the timeout doubles as a poll fallback so a
    /// missed wakeup can never wedge a waiter.
    pub async fn wait_changed(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.inner.changed.notified()).await;
    }
}
