//! Shared test doubles: a scripted TTS service and recording audio sinks.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use recite_core::{MessageId, NarrationError, TaskId};
use recite_engine::{AudioSink, MessageLookup, PlaybackEnd};
use recite_tts::{PendingUnit, TtsService, UnitRequest};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted outcome for one generation request, consumed in order.
#[derive(Debug, Clone)]
pub enum Script {
    /// Succeed with the given audio after the delay
    Success { audio: &'static str, delay_ms: u64 },
    /// Fail with an API error
    Failure { status: u16, message: &'static str },
    /// Fail with a transport error
    Transport(&'static str),
}

/// TTS service double. Requests succeed instantly with synthetic audio
/// unless scripts say otherwise.
pub struct FakeTtsService {
    scripts: Mutex<VecDeque<Script>>,
    begun: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<TaskId>>,
    counter: AtomicU64,
}

impl FakeTtsService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(VecDeque::new()),
            begun: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            counter: AtomicU64::new(0),
        })
    }

    pub fn scripted(scripts: Vec<Script>) -> Arc<Self> {
        let service = Self::new();
        *service.scripts.lock() = scripts.into();
        service
    }

    /// Wire texts of every request begun, in dispatch order
    pub fn begun(&self) -> Vec<String> {
        self.begun.lock().clone()
    }

    /// Task ids cancelled against the service
    pub fn cancelled(&self) -> Vec<TaskId> {
        self.cancelled.lock().clone()
    }
}

struct FakePending {
    task: TaskId,
    script: Script,
}

#[async_trait]
impl PendingUnit for FakePending {
    fn task_id(&self) -> Option<TaskId> {
        Some(self.task.clone())
    }

    async fn finish(self: Box<Self>) -> Result<Bytes, NarrationError> {
        match self.script {
            Script::Success { audio, delay_ms } => {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Ok(Bytes::from(audio))
            }
            Script::Failure { status, message } => Err(NarrationError::Api {
                status,
                message: message.to_string(),
            }),
            Script::Transport(message) => Err(NarrationError::Request(message.to_string())),
        }
    }
}

#[async_trait]
impl TtsService for FakeTtsService {
    async fn begin(
        &self,
        request: &UnitRequest,
    ) -> Result<Box<dyn PendingUnit>, NarrationError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.begun.lock().push(request.wire_text());
        let script = self.scripts.lock().pop_front().unwrap_or(Script::Success {
            audio: "audio",
            delay_ms: 0,
        });
        Ok(Box::new(FakePending {
            task: TaskId::new(format!("task-{}", n)),
            script,
        }))
    }

    async fn cancel_task(&self, task: &TaskId) -> Result<(), NarrationError> {
        self.cancelled.lock().push(task.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Sink that records every play call and completes after a fixed duration,
/// honoring pause and stop requests between 5ms ticks.
pub struct RecordingSink {
    plays: Mutex<Vec<(Bytes, Duration)>>,
    play_time: Duration,
    pause_requested: AtomicBool,
    stop_requested: AtomicBool,
}

impl RecordingSink {
    pub fn new(play_time: Duration) -> Arc<Self> {
        Arc::new(Self {
            plays: Mutex::new(Vec::new()),
            play_time,
            pause_requested: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        })
    }

    pub fn instant() -> Arc<Self> {
        Self::new(Duration::ZERO)
    }

    /// Every (artifact, start position) pair played so far
    pub fn plays(&self) -> Vec<(Bytes, Duration)> {
        self.plays.lock().clone()
    }

    pub fn played_texts(&self) -> Vec<String> {
        self.plays
            .lock()
            .iter()
            .map(|(b, _)| String::from_utf8_lossy(b).to_string())
            .collect()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, artifact: Bytes, start_at: Duration) -> PlaybackEnd {
        // A stop aimed at an already-abandoned play must not hit this one
        self.stop_requested.store(false, Ordering::SeqCst);
        self.plays.lock().push((artifact, start_at));

        let tick = Duration::from_millis(5);
        let mut elapsed = start_at;
        let end = self.play_time;
        while elapsed < end {
            tokio::time::sleep(tick).await;
            elapsed += tick;
            if self.stop_requested.swap(false, Ordering::SeqCst) {
                return PlaybackEnd::Failed("stopped".to_string());
            }
            if self.pause_requested.swap(false, Ordering::SeqCst) {
                return PlaybackEnd::Paused(elapsed);
            }
        }
        PlaybackEnd::Completed
    }

    fn pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.pause_requested.store(false, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }
}

/// Sink whose play never resolves, for cancel-mid-play tests.
pub struct StuckSink;

#[async_trait]
impl AudioSink for StuckSink {
    async fn play(&self, _artifact: Bytes, _start_at: Duration) -> PlaybackEnd {
        std::future::pending().await
    }

    fn pause(&self) {}
    fn resume(&self) {}
    fn stop(&self) {}
}

/// Message lookup backed by a queue of scripted answers; `None` answers
/// simulate a variant still streaming in upstream.
pub struct FakeLookup {
    answers: Mutex<VecDeque<Option<String>>>,
}

impl FakeLookup {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(VecDeque::new()),
        })
    }

    pub fn scripted(answers: Vec<Option<&str>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(
                answers
                    .into_iter()
                    .map(|a| a.map(|s| s.to_string()))
                    .collect(),
            ),
        })
    }
}

#[async_trait]
impl MessageLookup for FakeLookup {
    async fn message_text(&self, _message: &MessageId) -> Option<String> {
        self.answers.lock().pop_front().flatten()
    }
}
