// Transcription collaborator: the STT seam and its HTTP implementation

use crate::audio::wav::encode_wav_bytes;
use crate::debug;
use serde::Deserialize;
use std::time::Duration;

/// How long to wait for the transcription service before treating the
/// utterance as missed (seconds)
const TRANSCRIBE_TIMEOUT_SECS: u64 = 15;

/// A transcription result from the external STT service
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    pub confidence: f64,
}

/// Errors from the transcription collaborator
///
/// All of these are non-fatal to the engine: a failed transcription is a
/// missed trigger, recoverable on the next utterance.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranscriptionError {
    /// The request could not be built or sent
    #[error("transcription request failed: {0}")]
    Request(String),
    /// The service answered with an error
    #[error("transcription service error: {0}")]
    Service(String),
}

/// The external speech-to-text collaborator
pub trait Transcriber: Send + Sync {
    fn transcribe(
        &self,
        samples: &[i16],
        sample_rate: u32,
    ) -> Result<Transcription, TranscriptionError>;
}

/// Whether a transcript contains anything actionable
///
/// Whisper-style services return punctuation-only artifacts ("...", "!")
/// for non-speech audio; those count as no trigger.
pub fn is_usable_transcript(text: &str) -> bool {
    text.chars().any(|c| c.is_alphanumeric())
}

/// Response shape of a Whisper-compatible transcription endpoint
#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Blocking HTTP client for a Whisper-compatible transcription service
///
/// Audio is WAV-encoded in memory and posted as a multipart upload. Runs
/// on the dispatcher's thread, which tolerates the round-trip; the
/// capture thread never waits on it directly.
pub struct WhisperHttpClient {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl WhisperHttpClient {
    pub fn new(endpoint: String) -> Result<Self, TranscriptionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(TRANSCRIBE_TIMEOUT_SECS))
            .build()
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;
        Ok(Self { endpoint, client })
    }
}

impl Transcriber for WhisperHttpClient {
    fn transcribe(
        &self,
        samples: &[i16],
        sample_rate: u32,
    ) -> Result<Transcription, TranscriptionError> {
        let wav_bytes = encode_wav_bytes(samples, sample_rate)
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;
        debug!(
            "[transcription] Posting {} samples ({} bytes) to {}",
            samples.len(),
            wav_bytes.len(),
            self.endpoint
        );

        let part = reqwest::blocking::multipart::Part::bytes(wav_bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TranscriptionError::Service(format!(
                "status {}",
                response.status()
            )));
        }

        let parsed: WhisperResponse = response
            .json()
            .map_err(|e| TranscriptionError::Service(e.to_string()))?;
        Ok(Transcription {
            text: parsed.text,
            confidence: parsed.confidence.unwrap_or(0.0),
        })
    }
}
