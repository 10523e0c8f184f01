// Recording module: shared state, voice-activity detection, and
// bounded capture sessions

mod session;
mod state;
pub mod vad;

pub use session::{RecordingSession, SessionError, SessionResult, SessionState, StopCause};
pub use state::{SessionToken, SharedRecordingState, StateSnapshot};
pub use vad::{classify, has_utterance_ended, FrameClass, VadError};

use serde::Serialize;

/// What a recording is for, and therefore how it is tuned
///
/// Each mode carries its own tuning quadruple (energy threshold, silence
/// cutoff, minimum and maximum duration) in the engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordingMode {
    /// A spoken command for the assistant to execute
    Command,
    /// Free-form dictation
    Dictation,
    /// The rolling-buffer pass that listens for trigger phrases
    TriggerProbe,
}

impl RecordingMode {
    /// Whether downstream processing should treat this as dictation
    pub fn is_dictation(self) -> bool {
        self == RecordingMode::Dictation
    }

    /// Short lowercase label for filenames and log lines
    pub fn label(self) -> &'static str {
        match self {
            RecordingMode::Command => "command",
            RecordingMode::Dictation => "dictation",
            RecordingMode::TriggerProbe => "probe",
        }
    }
}
