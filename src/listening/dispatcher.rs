// Trigger dispatch: turns end-of-utterance events in the rolling buffer
// into recording sessions

use crate::audio::{CaptureBackend, RecordingWriter};
use crate::audio_constants::SAMPLE_RATE;
use crate::config::EngineConfig;
use crate::dispatch_queue::AudioDispatchQueue;
use crate::playback::{CueKind, CuePlayer};
use crate::recording::{RecordingMode, RecordingSession, SessionError, SharedRecordingState};
use crate::transcription::{is_usable_transcript, Transcriber};
use crate::{debug, error, info};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Result of classifying a transcript against the trigger phrase lists
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerDetection {
    /// Whether the transcript contained anything actionable
    pub detected: bool,
    /// The selected mode (dictation is the default, not an error case)
    pub trigger: RecordingMode,
    /// The transcript with the matched trigger phrase stripped
    pub transcript: String,
}

/// What a dispatch attempt did, for the listener's log line and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A recording session was started for the matched mode
    Dispatched(RecordingMode),
    /// Refused: the cooldown window since the last dispatch has not elapsed
    CooledDown,
    /// The utterance snapshot was empty
    NoSpeech,
    /// Transcription failed or produced nothing usable
    NoUsableTranscript,
    /// A recording session was already active
    Busy,
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Collapse whitespace left behind by stripping a phrase
fn strip_phrase(text: &str, phrase: &str) -> String {
    text.replacen(phrase, "", 1)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classify a transcript against the configured trigger phrases
///
/// Match strategies are tried in order — exact, word-boundary (padded
/// with spaces), plain substring — across the command phrases first,
/// then the dictation phrases; the first match wins. A transcript that
/// matches nothing is dictation by default.
pub fn detect_triggers(
    transcript: &str,
    command_triggers: &[String],
    dictation_triggers: &[String],
) -> TriggerDetection {
    let text = normalize(transcript);
    if !is_usable_transcript(&text) {
        return TriggerDetection {
            detected: false,
            trigger: RecordingMode::Dictation,
            transcript: String::new(),
        };
    }

    let candidates: Vec<(String, RecordingMode)> = command_triggers
        .iter()
        .map(|p| (normalize(p), RecordingMode::Command))
        .chain(
            dictation_triggers
                .iter()
                .map(|p| (normalize(p), RecordingMode::Dictation)),
        )
        .filter(|(p, _)| !p.is_empty())
        .collect();

    // Exact match: the whole utterance is the trigger phrase
    for (phrase, mode) in &candidates {
        if &text == phrase {
            return TriggerDetection {
                detected: true,
                trigger: *mode,
                transcript: String::new(),
            };
        }
    }

    // Word-boundary match: the phrase appears as whole words
    let padded = format!(" {} ", text);
    for (phrase, mode) in &candidates {
        if padded.contains(&format!(" {} ", phrase)) {
            return TriggerDetection {
                detected: true,
                trigger: *mode,
                transcript: strip_phrase(&text, phrase),
            };
        }
    }

    // Substring match: catches run-together transcriptions
    for (phrase, mode) in &candidates {
        if text.contains(phrase.as_str()) {
            return TriggerDetection {
                detected: true,
                trigger: *mode,
                transcript: strip_phrase(&text, phrase),
            };
        }
    }

    TriggerDetection {
        detected: true,
        trigger: RecordingMode::Dictation,
        transcript: text,
    }
}

/// Turns end-of-utterance events into recording sessions
///
/// Invoked from the capture thread when the rolling-buffer VAD pass
/// detects silence after speech. Never runs two dispatch cycles
/// concurrently: the cooldown gate is claimed before anything else, and
/// refusals are cheap no-ops.
pub struct TriggerDispatcher {
    shared: Arc<SharedRecordingState>,
    config: Arc<EngineConfig>,
    transcriber: Arc<dyn Transcriber>,
    cues: Arc<dyn CuePlayer>,
    backend: Arc<dyn CaptureBackend>,
    writer: RecordingWriter,
    queue: Arc<AudioDispatchQueue>,
}

impl TriggerDispatcher {
    pub fn new(
        shared: Arc<SharedRecordingState>,
        config: Arc<EngineConfig>,
        transcriber: Arc<dyn Transcriber>,
        cues: Arc<dyn CuePlayer>,
        backend: Arc<dyn CaptureBackend>,
        writer: RecordingWriter,
        queue: Arc<AudioDispatchQueue>,
    ) -> Self {
        Self {
            shared,
            config,
            transcriber,
            cues,
            backend,
            writer,
            queue,
        }
    }

    /// Run one dispatch cycle against the current utterance snapshot
    pub fn dispatch(&self) -> DispatchOutcome {
        let cooldown = Duration::from_secs_f32(self.config.dispatch_cooldown_secs);
        if !self.shared.try_claim_dispatch(cooldown) {
            debug!("[dispatcher] Within cooldown window, ignoring utterance");
            return DispatchOutcome::CooledDown;
        }

        let snapshot = self.shared.with_buffer(|buffer| {
            let samples = buffer.snapshot_from(buffer.speech_start());
            buffer.clear_speech_start();
            samples
        });
        if snapshot.is_empty() {
            debug!("[dispatcher] Empty utterance snapshot, nothing to do");
            return DispatchOutcome::NoSpeech;
        }

        let transcription = match self.transcriber.transcribe(&snapshot, SAMPLE_RATE) {
            Ok(t) => t,
            Err(e) => {
                // A single missed trigger is recoverable on the next
                // utterance; the cooldown above still applies.
                info!("[dispatcher] Transcription failed, ignoring utterance: {}", e);
                return DispatchOutcome::NoUsableTranscript;
            }
        };
        if !is_usable_transcript(&transcription.text) {
            debug!("[dispatcher] Transcript unusable: '{}'", transcription.text);
            return DispatchOutcome::NoUsableTranscript;
        }

        let detection = detect_triggers(
            &transcription.text,
            &self.config.command_triggers,
            &self.config.dictation_triggers,
        );
        if !detection.detected {
            return DispatchOutcome::NoUsableTranscript;
        }

        if self.shared.is_recording() {
            debug!("[dispatcher] Session already active, not dispatching");
            return DispatchOutcome::Busy;
        }

        info!(
            "[dispatcher] Trigger matched: mode={}, transcript='{}' (confidence {:.2})",
            detection.trigger.label(),
            detection.transcript,
            transcription.confidence
        );
        self.spawn_session(detection.trigger);
        DispatchOutcome::Dispatched(detection.trigger)
    }

    /// Start a recording session for `mode` on an ephemeral thread
    fn spawn_session(&self, mode: RecordingMode) {
        let shared = self.shared.clone();
        let config = self.config.clone();
        let cues = self.cues.clone();
        let backend = self.backend.clone();
        let writer = self.writer.clone();
        let queue = self.queue.clone();

        thread::spawn(move || {
            match mode {
                RecordingMode::Command => cues.play_cue(CueKind::Command),
                RecordingMode::Dictation => cues.play_cue(CueKind::Dictation),
                RecordingMode::TriggerProbe => {}
            }

            let tuning = config.tuning(mode).clone();
            let mut session = RecordingSession::new(mode, tuning, shared);
            match session.run(false, true, backend.as_ref(), &writer, &queue) {
                Ok(result) => {
                    debug!(
                        "[dispatcher] Session finished: {} ({} frames)",
                        result.file_path, result.duration_frames
                    );
                }
                Err(SessionError::AlreadyRecording) => {
                    // Lost a race with an explicit session; not an error
                    debug!("[dispatcher] Session slot taken before arming");
                }
                Err(e) => {
                    error!("[dispatcher] Session failed: {}", e);
                    // Silent probes stay silent; interactive modes get an
                    // audible failure cue
                    if mode != RecordingMode::TriggerProbe {
                        cues.play_cue(CueKind::Stop);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod tests;
