//! Inbound chat events and outbound narration events

use crate::ids::{MessageId, OrderKey, SessionId};
use crate::report::GenerationReport;
use serde::{Deserialize, Serialize};

/// Direction of a variant swipe in the host chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwipeDirection {
    Previous,
    Next,
}

/// Notifications consumed from the host chat UI.
///
/// Each carries enough context to resolve the message-to-session mapping;
/// the host is responsible for supplying `order_key` as document order.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A new message finished rendering and should be narrated.
    MessageRendered {
        message: MessageId,
        order_key: OrderKey,
        text: String,
    },
    /// The visible variant of a message changed (swipe). `text` is `None`
    /// when the new variant is itself still being generated upstream.
    VariantSwitched {
        message: MessageId,
        order_key: OrderKey,
        direction: SwipeDirection,
        text: Option<String>,
    },
    /// A message was deleted from the chat.
    MessageRemoved { message: MessageId },
    /// The whole chat was cleared or replaced.
    ChatReset,
}

/// Global queue state, mirrored by the host's single play/pause control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueState {
    Idle,
    Playing,
    Paused,
}

/// Events emitted toward the host UI.
#[derive(Debug, Clone)]
pub enum NarrationEvent {
    /// A session was created and admitted to the queue.
    SessionQueued {
        session: SessionId,
        message: MessageId,
        units: usize,
    },
    /// Playback of a session began.
    PlaybackStarted {
        session: SessionId,
        message: MessageId,
    },
    /// One unit started playing (per-message progress indicator).
    UnitPlaying {
        session: SessionId,
        message: MessageId,
        index: usize,
        total: usize,
    },
    /// A unit was skipped (missing artifact or playback failure).
    UnitSkipped {
        session: SessionId,
        message: MessageId,
        index: usize,
    },
    /// Playback of a session finished, with the generation report.
    SessionFinished {
        session: SessionId,
        message: MessageId,
        report: GenerationReport,
    },
    /// A session was cancelled.
    SessionCancelled {
        session: SessionId,
        message: MessageId,
    },
    /// The global control state changed.
    StateChanged { state: QueueState },
}
