// Bounded recording session: one capture-to-file operation
// Runs on its own ephemeral thread, mutually exclusive with the
// continuous capture loop via the shared recording flag

use super::state::{SessionToken, SharedRecordingState};
use super::vad::{classify, has_utterance_ended, FrameClass, VadError};
use super::RecordingMode;
use crate::audio::{wav, CaptureBackend, FrameSource, RecordingWriter};
use crate::audio_constants::{
    FIRST_FRAME_TIMEOUT_MS, FRAME_READ_TIMEOUT_MS, FRAME_SIZE, MIN_WAV_FILE_BYTES, SAMPLE_RATE,
};
use crate::config::ModeTuning;
use crate::dispatch_queue::{AudioDispatchQueue, QueueItem};
use crate::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet started
    Idle,
    /// Claim on the recording flag acquired, stream not yet open
    Arming,
    /// Reading frames from the device
    Capturing,
    /// Stream closed, writing the output file
    Finalizing,
    /// Result enqueued, claim released
    Completed,
    /// Failed; claim released, no result enqueued
    Aborted,
}

/// Why the capture loop stopped (diagnostics only; does not change the
/// session's outward contract)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// Hit the mode's maximum duration
    MaxDuration,
    /// The claim on the recording flag was cleared externally
    ClaimLost,
    /// Silence after speech ended the utterance
    UtteranceEnded,
    /// The stream failed mid-capture; partial audio is finalized
    StreamError,
}

/// Produced exactly once per completed session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    pub file_path: String,
    pub mode: RecordingMode,
    pub duration_frames: usize,
}

/// Errors a session can end with
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// Another session holds the recording flag (expected contention,
    /// returned to the caller, not logged as an error)
    #[error("a recording session is already active")]
    AlreadyRecording,
    /// The input device could not deliver audio
    #[error("audio input device unavailable: {0}")]
    DeviceUnavailable(String),
    /// The stream opened but zero frames were captured — a hardware
    /// fault, distinct from a silent-but-working microphone
    #[error("no audio captured from input device")]
    NoAudioCaptured,
    /// Frame size mismatch between producer and consumer
    #[error(transparent)]
    Vad(#[from] VadError),
    /// The output file could not be written
    #[error("failed to write recording: {0}")]
    Write(String),
}

/// One bounded capture-to-file operation
pub struct RecordingSession {
    mode: RecordingMode,
    tuning: ModeTuning,
    shared: Arc<SharedRecordingState>,
    state: SessionState,
    stop_cause: Option<StopCause>,
}

impl RecordingSession {
    pub fn new(mode: RecordingMode, tuning: ModeTuning, shared: Arc<SharedRecordingState>) -> Self {
        Self {
            mode,
            tuning,
            shared,
            state: SessionState::Idle,
            stop_cause: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Why the capture loop stopped, once it has
    pub fn stop_cause(&self) -> Option<StopCause> {
        self.stop_cause
    }

    /// Claim the recording flag and arm the session
    ///
    /// With `force` the current holder (if any) is preempted; its token
    /// goes stale and its loop finalizes on the next frame.
    pub fn start(&mut self, force: bool) -> Result<SessionToken, SessionError> {
        debug_assert_eq!(self.state, SessionState::Idle);
        let token = if force {
            self.shared.force_begin_recording()
        } else {
            self.shared
                .try_begin_recording()
                .ok_or(SessionError::AlreadyRecording)?
        };
        self.state = SessionState::Arming;
        debug!("[session] Armed ({} mode, force={})", self.mode.label(), force);
        Ok(token)
    }

    /// Run a session end to end: claim, capture, finalize
    pub fn run(
        &mut self,
        force: bool,
        is_trigger: bool,
        backend: &dyn CaptureBackend,
        writer: &RecordingWriter,
        queue: &AudioDispatchQueue,
    ) -> Result<SessionResult, SessionError> {
        let token = self.start(force)?;
        self.run_claimed(token, is_trigger, backend, writer, queue)
    }

    /// Run an already-armed session to completion
    ///
    /// On any failure the claim is released and the session ends
    /// `Aborted`; the failure never escapes to the spawning thread's
    /// caller except through this result.
    pub fn run_claimed(
        &mut self,
        token: SessionToken,
        is_trigger: bool,
        backend: &dyn CaptureBackend,
        writer: &RecordingWriter,
        queue: &AudioDispatchQueue,
    ) -> Result<SessionResult, SessionError> {
        let result = self.execute(token, is_trigger, backend, writer, queue);
        if result.is_err() {
            // Stale-token release is a no-op, so this is safe even when
            // the claim was already lost or preempted.
            self.shared.end_recording(token);
            self.state = SessionState::Aborted;
        }
        result
    }

    fn execute(
        &mut self,
        token: SessionToken,
        is_trigger: bool,
        backend: &dyn CaptureBackend,
        writer: &RecordingWriter,
        queue: &AudioDispatchQueue,
    ) -> Result<SessionResult, SessionError> {
        let mut source = backend
            .open()
            .map_err(|e| SessionError::DeviceUnavailable(e.to_string()))?;

        let samples = self.capture(token, source.as_mut())?;
        // Close the stream before touching the filesystem
        drop(source);

        self.finalize(token, samples, is_trigger, writer, queue)
    }

    /// The frame-read loop
    ///
    /// Returns the captured samples; a cancelled session still returns
    /// whatever it has so partial audio can be finalized.
    pub fn capture(
        &mut self,
        token: SessionToken,
        source: &mut dyn FrameSource,
    ) -> Result<Vec<i16>, SessionError> {
        self.state = SessionState::Capturing;

        let max_frames = self.tuning.max_duration_frames();
        let mut samples: Vec<i16> = Vec::new();
        let mut frames_recorded = 0usize;
        let mut silence_run = 0usize;
        let mut has_speech = false;
        let mut first_read = true;

        loop {
            if !self.shared.is_current(token) {
                self.stop_cause = Some(StopCause::ClaimLost);
                break;
            }

            let timeout = Duration::from_millis(if first_read {
                FIRST_FRAME_TIMEOUT_MS
            } else {
                FRAME_READ_TIMEOUT_MS
            });

            match source.read_frame(timeout) {
                Ok(Some(frame)) => {
                    first_read = false;
                    match classify(&frame, self.tuning.energy_threshold)? {
                        FrameClass::Speech => {
                            has_speech = true;
                            silence_run = 0;
                        }
                        FrameClass::Silence => silence_run += 1,
                    }
                    frames_recorded += 1;
                    samples.extend_from_slice(frame.samples());

                    if frames_recorded >= max_frames {
                        self.stop_cause = Some(StopCause::MaxDuration);
                        break;
                    }
                    if has_utterance_ended(
                        self.mode,
                        &self.tuning,
                        silence_run,
                        frames_recorded,
                        has_speech,
                    ) {
                        self.stop_cause = Some(StopCause::UtteranceEnded);
                        break;
                    }
                }
                Ok(None) => {
                    if first_read {
                        // The device never produced audio
                        return Err(SessionError::DeviceUnavailable(
                            "no audio within startup window".to_string(),
                        ));
                    }
                    // Stalled read; re-check the claim and keep waiting
                }
                Err(e) => {
                    if samples.is_empty() {
                        return Err(SessionError::DeviceUnavailable(e.to_string()));
                    }
                    warn!("[session] Stream error mid-capture, finalizing partial audio: {}", e);
                    self.stop_cause = Some(StopCause::StreamError);
                    break;
                }
            }
        }

        debug!(
            "[session] Capture stopped: {:?}, {} frames, speech={}",
            self.stop_cause, frames_recorded, has_speech
        );
        self.state = SessionState::Finalizing;
        Ok(samples)
    }

    /// Write the output file, enqueue the result, then release the claim
    ///
    /// The claim is released only after the result is observably
    /// enqueued, so no other session can start in between.
    pub fn finalize(
        &mut self,
        token: SessionToken,
        samples: Vec<i16>,
        is_trigger: bool,
        writer: &RecordingWriter,
        queue: &AudioDispatchQueue,
    ) -> Result<SessionResult, SessionError> {
        if samples.is_empty() {
            return Err(SessionError::NoAudioCaptured);
        }

        let path = writer
            .next_path(self.mode.label())
            .map_err(|e| SessionError::Write(e.to_string()))?;
        wav::write_wav(&path, &samples, SAMPLE_RATE)
            .map_err(|e| SessionError::Write(e.to_string()))?;

        let file_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if file_bytes < MIN_WAV_FILE_BYTES {
            warn!(
                "[session] Recording file is only {} bytes: {}",
                file_bytes,
                path.display()
            );
        }

        let duration_frames = samples.len() / FRAME_SIZE;
        let result = SessionResult {
            file_path: path.to_string_lossy().to_string(),
            mode: self.mode,
            duration_frames,
        };

        queue.enqueue(QueueItem::Recording {
            file_path: result.file_path.clone(),
            mode: self.mode,
            is_trigger,
        });
        self.shared.end_recording(token);
        self.state = SessionState::Completed;

        info!(
            "[session] Completed {} recording: {} frames -> {}",
            self.mode.label(),
            duration_frames,
            result.file_path
        );
        Ok(result)
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
