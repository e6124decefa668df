//! HTTP TTS service implementation
//!
//! Speaks the WhisperSpeech web UI API: JSON `POST /generate` (or multipart
//! form data when a voice-clone sample is configured) returning raw audio
//! bytes, with the server task id in the `X-Task-ID` response header and
//! status `499` signalling a task cancelled server-side.

use crate::service::{PendingUnit, TtsService, UnitRequest};
use async_trait::async_trait;
use bytes::Bytes;
use recite_core::{NarrationError, TaskId};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Response header carrying the server-assigned task identifier
pub const TASK_ID_HEADER: &str = "X-Task-ID";

/// Status the service uses for tasks cancelled server-side
const STATUS_CANCELLED: u16 = 499;

/// HTTP TTS service
pub struct HttpTtsService {
    client: Client,
    endpoint: String,
}

impl HttpTtsService {
    /// Create a new HTTP TTS service
    pub fn new(endpoint: String, timeout_secs: u64) -> Result<Self, NarrationError> {
        if endpoint.is_empty() {
            return Err(NarrationError::Config(
                "TTS endpoint cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                NarrationError::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// The configured endpoint, without trailing slash
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_generate(&self, request: &UnitRequest) -> Result<Response, NarrationError> {
        let url = format!("{}/generate", self.endpoint);
        let text = request.wire_text();
        let speed = request.voice.speed;
        let format = request.voice.format.as_str();
        let model = request.voice.model.model_ref();

        let builder = if let Some(ref sample) = request.voice.voice_sample {
            // Voice cloning: multipart form carrying the sample file
            let data = tokio::fs::read(sample).await?;
            let file_name = sample
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "voice".to_string());

            let form = Form::new()
                .text("text", text)
                .text("speed", speed.to_string())
                .text("format", format.to_string())
                .text("model", model.to_string())
                .part("voice", Part::bytes(data).file_name(file_name));

            self.client.post(&url).multipart(form)
        } else {
            self.client.post(&url).json(&json!({
                "text": text,
                "speed": speed,
                "format": format,
                "model": model,
            }))
        };

        builder
            .send()
            .await
            .map_err(|e| NarrationError::Request(format!("Generate request failed: {}", e)))
    }
}

#[async_trait]
impl TtsService for HttpTtsService {
    async fn begin(
        &self,
        request: &UnitRequest,
    ) -> Result<Box<dyn PendingUnit>, NarrationError> {
        if request.text.trim().is_empty() {
            return Err(NarrationError::Request(
                "Unit text cannot be empty".to_string(),
            ));
        }

        let response = self.send_generate(request).await?;
        let status = response.status();

        if status.as_u16() == STATUS_CANCELLED {
            // Cancelled server-side; the JSON error body is informational
            let body = response.text().await.unwrap_or_default();
            debug!("Generate request reported cancelled by server: {}", body);
            return Err(NarrationError::Cancelled);
        }

        if !status.is_success() {
            let message = read_error_text(response).await;
            return Err(NarrationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        // Headers are in; capture the task id before awaiting the body so a
        // cancellation issued from here on can reach the in-flight task.
        let task_id = response
            .headers()
            .get(TASK_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(TaskId::new);

        if task_id.is_none() {
            warn!("Generate response carried no {} header", TASK_ID_HEADER);
        }

        Ok(Box::new(HttpPendingUnit { task_id, response }))
    }

    async fn cancel_task(&self, task: &TaskId) -> Result<(), NarrationError> {
        let url = format!("{}/cancel/{}", self.endpoint, task);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| NarrationError::Request(format!("Cancel request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = read_error_text(response).await;
            return Err(NarrationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Remote cancel acknowledged for task {}", task);
        Ok(())
    }

    fn name(&self) -> &str {
        "whisperspeech-http"
    }
}

struct HttpPendingUnit {
    task_id: Option<TaskId>,
    response: Response,
}

#[async_trait]
impl PendingUnit for HttpPendingUnit {
    fn task_id(&self) -> Option<TaskId> {
        self.task_id.clone()
    }

    async fn finish(self: Box<Self>) -> Result<Bytes, NarrationError> {
        self.response
            .bytes()
            .await
            .map_err(|e| NarrationError::Request(format!("Failed to read audio body: {}", e)))
    }
}

/// Read an error body, truncated so a misbehaving server cannot flood logs.
async fn read_error_text(response: Response) -> String {
    response
        .text()
        .await
        .map(|s| {
            if s.len() > 1000 {
                let truncated: String = s.chars().take(1000).collect();
                format!("{}...", truncated)
            } else {
                s
            }
        })
        .unwrap_or_else(|_| "Unknown error".to_string())
}
