// sotto - continuous audio capture, voice-activity detection, and
// trigger/recording dispatch for a voice-controlled assistant.
//
// The library owns the microphone: a perpetual capture thread feeds a
// rolling buffer, a trigger dispatcher turns end-of-utterance events into
// recording sessions, and completed recordings are handed to the
// downstream consumer through a FIFO queue. Transcription, cue playback,
// and the consumer itself are external collaborators behind traits.

pub mod audio;
pub mod audio_constants;
pub mod config;
pub mod dispatch_queue;
pub mod engine;
pub mod listening;
pub mod playback;
pub mod recording;
pub mod transcription;

// Re-export log macros for use throughout the crate
pub use log::{debug, error, info, trace, warn};

pub use config::{EngineConfig, ModeTuning};
pub use dispatch_queue::{AudioDispatchQueue, QueueItem};
pub use engine::{EngineError, EngineHandle, VoiceEngine};
pub use recording::RecordingMode;
