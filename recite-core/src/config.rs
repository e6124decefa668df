//! Configuration for narration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Narration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Enable narration (off by default)
    pub enabled: bool,

    /// TTS service endpoint (e.g. "http://127.0.0.1:5050")
    pub endpoint: String,

    /// Voice settings sent with every generation request
    pub voice: VoiceProfile,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// How long the player waits for a missing artifact while its session
    /// is still generating, per unit index (seconds)
    pub artifact_wait_secs: u64,

    /// Hard bound on consecutive unit indices processed in one playback
    /// pass, in case bookkeeping goes inconsistent
    pub max_player_passes: usize,

    /// Polling interval for bounded waits (milliseconds)
    pub poll_interval_ms: u64,

    /// How long the lifecycle coordinator waits for a swiped-in variant's
    /// content to become available before giving up (seconds)
    pub content_wait_secs: u64,
}

/// Voice settings for the remote service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceProfile {
    /// Speech speed in characters per second (10.0-15.0)
    pub speed: f32,

    /// Output audio format
    pub format: AudioFormat,

    /// Speech model
    pub model: SpeechModel,

    /// Optional voice sample for cloning; when set, generation requests are
    /// sent as multipart form data carrying the sample file
    pub voice_sample: Option<PathBuf>,
}

/// Audio formats the service can produce
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    Ogg,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Ogg => "ogg",
        }
    }
}

/// Speech model selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpeechModel {
    Small,
    Tiny,
    Base,
}

impl SpeechModel {
    /// Model reference string understood by the service
    pub fn model_ref(&self) -> &'static str {
        match self {
            SpeechModel::Small => "collabora/whisperspeech:s2a-q4-small-en+pl.model",
            SpeechModel::Tiny => "collabora/whisperspeech:s2a-q4-tiny-en+pl.model",
            SpeechModel::Base => "collabora/whisperspeech:s2a-q4-base-en+pl.model",
        }
    }
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            enabled: false, // Off by default
            endpoint: "http://127.0.0.1:5050".to_string(),
            voice: VoiceProfile::default(),
            timeout_secs: 60,
            artifact_wait_secs: 15,
            max_player_passes: 50,
            poll_interval_ms: 250,
            content_wait_secs: 10,
        }
    }
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            speed: 13.5,
            format: AudioFormat::Wav,
            model: SpeechModel::Small,
            voice_sample: None,
        }
    }
}

impl VoiceProfile {
    /// Validate voice settings
    pub fn validate(&self) -> Result<(), String> {
        if !(10.0..=15.0).contains(&self.speed) {
            return Err("Speed must be between 10.0 and 15.0 characters per second".to_string());
        }

        if let Some(ref sample) = self.voice_sample {
            let path = sample.to_string_lossy();
            if path.is_empty() {
                return Err("Voice sample path cannot be empty if provided".to_string());
            }
            // Prevent path traversal
            if path.contains("..") {
                return Err("Voice sample path cannot contain '..'".to_string());
            }
            if path.len() > 4096 {
                return Err("Voice sample path too long (max 4096 chars)".to_string());
            }
        }

        Ok(())
    }
}

impl NarrationConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("Endpoint cannot be empty".to_string());
        }

        if self.endpoint.len() > 2048 {
            return Err("Endpoint URL too long (max 2048 chars)".to_string());
        }

        if self.endpoint.chars().any(|c| c == '\0' || c.is_control()) {
            return Err("Endpoint contains invalid characters".to_string());
        }

        let url = url::Url::parse(&self.endpoint)
            .map_err(|e| format!("Invalid endpoint URL: {}", e))?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(format!(
                    "Unsupported URL scheme: {}. Only http:// and https:// are allowed.",
                    scheme
                ));
            }
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.timeout_secs > 300 {
            return Err("Timeout too large (max 300 seconds)".to_string());
        }

        if self.artifact_wait_secs == 0 {
            return Err("Artifact wait must be greater than 0".to_string());
        }

        if self.artifact_wait_secs > 120 {
            return Err("Artifact wait too large (max 120 seconds)".to_string());
        }

        if self.max_player_passes == 0 {
            return Err("Player pass bound must be greater than 0".to_string());
        }

        if self.max_player_passes > 10_000 {
            return Err("Player pass bound too large (max 10000)".to_string());
        }

        if self.poll_interval_ms == 0 {
            return Err("Poll interval must be greater than 0".to_string());
        }

        if self.poll_interval_ms > 5_000 {
            return Err("Poll interval too large (max 5000 ms)".to_string());
        }

        if self.content_wait_secs > 120 {
            return Err("Content wait too large (max 120 seconds)".to_string());
        }

        self.voice.validate()?;

        Ok(())
    }
}
