//! Centralized constants for the capture and dispatch engine.
//!
//! All audio-related magic numbers are defined here with documentation
//! explaining their purpose and constraints. Several of these are
//! hand-tuned behavioral values, not incidental defaults; changing them
//! changes how the assistant feels to talk to.

// =============================================================================
// SAMPLE RATE AND FRAMING
// =============================================================================

/// Sample rate used throughout the audio pipeline (Hz).
///
/// Whisper-family transcription models expect 16 kHz mono input, and all
/// frame/duration math in the engine assumes this rate.
pub const SAMPLE_RATE: u32 = 16000;

/// Samples per captured frame.
///
/// 1024 samples at 16 kHz is a 64 ms frame: long enough for a stable
/// energy estimate, short enough that endpointing reacts within a
/// fraction of a second.
pub const FRAME_SIZE: usize = 1024;

/// Convert a duration in seconds to a whole number of frames.
///
/// Uses truncating integer math so a 5 s window at 16 kHz / 1024-sample
/// frames comes out at exactly 78 frames.
pub fn duration_to_frames(secs: f32) -> usize {
    ((secs * SAMPLE_RATE as f32) as usize) / FRAME_SIZE
}

// =============================================================================
// ROLLING WINDOW AND DISPATCH
// =============================================================================

/// Rolling buffer window over the most recent captured audio (seconds).
///
/// Five seconds comfortably holds a trigger phrase plus a short command
/// while keeping the window under 160 KB of PCM.
pub const DEFAULT_WINDOW_SECS: f32 = 5.0;

/// Minimum interval between two trigger-dispatch attempts (seconds).
///
/// The primary defense against feedback loops: sound cues and spoken
/// responses re-enter the microphone, and without this gate they would be
/// transcribed and re-dispatched. Measured from the previous dispatch's
/// start time, regardless of its outcome.
pub const DISPATCH_COOLDOWN_SECS: f32 = 4.0;

// =============================================================================
// MODE TUNING
// =============================================================================

/// Energy threshold for command-mode recording (mean absolute amplitude).
///
/// Commands are spoken deliberately at normal volume; 120 rejects keyboard
/// and fan noise that the more sensitive dictation threshold lets through.
pub const ENERGY_THRESHOLD_COMMAND: f32 = 120.0;

/// Energy threshold for dictation-mode recording (mean absolute amplitude).
///
/// Dictation favors sensitivity: trailing off at the end of a sentence
/// should not read as silence.
pub const ENERGY_THRESHOLD_DICTATION: f32 = 100.0;

/// Energy threshold for the rolling-buffer trigger probe.
///
/// Set above both recording thresholds so ambient noise does not reach
/// the transcription service during continuous listening.
pub const ENERGY_THRESHOLD_TRIGGER_PROBE: f32 = 150.0;

/// Silence run that ends a command recording (seconds).
pub const COMMAND_MAX_SILENCE_SECS: f32 = 1.0;

/// Minimum command recording length before silence can stop it (seconds).
pub const COMMAND_MIN_DURATION_SECS: f32 = 3.0;

/// Hard cap on command recording length (seconds).
pub const COMMAND_MAX_DURATION_SECS: f32 = 10.0;

/// Silence run that ends a dictation recording (seconds).
///
/// Longer than command mode: people pause to think mid-dictation.
pub const DICTATION_MAX_SILENCE_SECS: f32 = 2.0;

/// Minimum dictation recording length (seconds).
pub const DICTATION_MIN_DURATION_SECS: f32 = 0.5;

/// Hard cap on dictation recording length (seconds).
pub const DICTATION_MAX_DURATION_SECS: f32 = 30.0;

/// Silence run that ends a trigger-probe utterance (seconds).
///
/// The probe favors quick endpointing over completeness: it only needs
/// enough audio to recognize a trigger phrase, and a snappy cutoff keeps
/// trigger latency low.
pub const PROBE_MAX_SILENCE_SECS: f32 = 0.7;

/// Minimum probe utterance length (seconds).
///
/// Filters single-frame noise spikes while still catching a short spoken
/// trigger word.
pub const PROBE_MIN_DURATION_SECS: f32 = 0.6;

/// Hard cap on probe utterance length (seconds). Bounded by the rolling
/// window: audio older than the window is gone anyway.
pub const PROBE_MAX_DURATION_SECS: f32 = 5.0;

/// Command-mode floor for silence-based early stop (seconds).
///
/// Commands often contain a mid-utterance pause ("jarvis ... move this
/// window to the left half"); stopping on the pause clips the command.
/// Hand-tuned: silence cannot end a command recording before this much
/// audio has been captured, regardless of configured minimum duration.
pub const COMMAND_SILENCE_FLOOR_SECS: f32 = 3.0;

// =============================================================================
// CAPTURE TIMING
// =============================================================================

/// Timeout for a single frame read once a stream is established (ms).
///
/// A healthy 16 kHz stream produces a frame every 64 ms; 500 ms of
/// nothing means the device has stalled.
pub const FRAME_READ_TIMEOUT_MS: u64 = 500;

/// Timeout for the first frame after opening a stream (ms).
///
/// Device warm-up can take noticeably longer than steady-state delivery.
/// No frame within this window is treated as an unavailable device.
pub const FIRST_FRAME_TIMEOUT_MS: u64 = 1500;

/// Poll interval while assembling a frame from the capture ring (ms).
pub const FRAME_POLL_INTERVAL_MS: u64 = 5;

/// Backoff before the capture thread reopens the device after a
/// transient stream error (ms).
pub const CAPTURE_RETRY_BACKOFF_MS: u64 = 500;

/// Condition-variable wait slice while the capture thread cedes the
/// device to an active recording session (ms).
pub const PAUSE_WAIT_MS: u64 = 100;

/// Capacity of the SPSC ring between the audio callback and frame
/// assembly, in samples (~4 s at 16 kHz — generous slack for a consumer
/// hiccup without dropping audio).
pub const CAPTURE_RING_SAMPLES: usize = FRAME_SIZE * 64;

// =============================================================================
// OUTPUT
// =============================================================================

/// Soft minimum size for a finalized recording file (bytes).
///
/// A finished WAV smaller than this usually means the microphone captured
/// nothing useful, but short dictation snippets can legitimately be tiny,
/// so undersized files are logged as warnings rather than rejected.
pub const MIN_WAV_FILE_BYTES: u64 = 1000;
