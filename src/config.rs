// Engine configuration: per-mode tuning, trigger phrases, and paths
// Loaded once at startup and treated as read-only by the engine

use crate::audio_constants::{
    duration_to_frames, COMMAND_MAX_DURATION_SECS, COMMAND_MAX_SILENCE_SECS,
    COMMAND_MIN_DURATION_SECS, DEFAULT_WINDOW_SECS, DICTATION_MAX_DURATION_SECS,
    DICTATION_MAX_SILENCE_SECS, DICTATION_MIN_DURATION_SECS, DISPATCH_COOLDOWN_SECS,
    ENERGY_THRESHOLD_COMMAND, ENERGY_THRESHOLD_DICTATION, ENERGY_THRESHOLD_TRIGGER_PROBE,
    PROBE_MAX_DURATION_SECS, PROBE_MAX_SILENCE_SECS, PROBE_MIN_DURATION_SECS,
};
use crate::recording::RecordingMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Settings file exists but could not be read
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// Settings file is not valid JSON or has the wrong shape
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tuning quadruple for one recording mode
///
/// Every field maps directly onto a behavioral knob of the capture loop:
/// how loud a frame must be to count as speech, how long a pause ends the
/// utterance, and the floor/ceiling on total recording length.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModeTuning {
    /// Mean absolute amplitude above which a frame counts as speech
    pub energy_threshold: f32,
    /// Silence run that ends the utterance (seconds)
    pub max_silence_secs: f32,
    /// Minimum recording length before silence can stop it (seconds)
    pub min_duration_secs: f32,
    /// Hard cap on recording length (seconds)
    pub max_duration_secs: f32,
}

impl ModeTuning {
    /// Silence run that ends the utterance, in frames
    pub fn max_silence_frames(&self) -> usize {
        duration_to_frames(self.max_silence_secs)
    }

    /// Minimum recording length, in frames
    pub fn min_duration_frames(&self) -> usize {
        duration_to_frames(self.min_duration_secs)
    }

    /// Hard cap on recording length, in frames
    pub fn max_duration_frames(&self) -> usize {
        duration_to_frames(self.max_duration_secs)
    }
}

fn default_command_tuning() -> ModeTuning {
    ModeTuning {
        energy_threshold: ENERGY_THRESHOLD_COMMAND,
        max_silence_secs: COMMAND_MAX_SILENCE_SECS,
        min_duration_secs: COMMAND_MIN_DURATION_SECS,
        max_duration_secs: COMMAND_MAX_DURATION_SECS,
    }
}

fn default_dictation_tuning() -> ModeTuning {
    ModeTuning {
        energy_threshold: ENERGY_THRESHOLD_DICTATION,
        max_silence_secs: DICTATION_MAX_SILENCE_SECS,
        min_duration_secs: DICTATION_MIN_DURATION_SECS,
        max_duration_secs: DICTATION_MAX_DURATION_SECS,
    }
}

fn default_probe_tuning() -> ModeTuning {
    ModeTuning {
        energy_threshold: ENERGY_THRESHOLD_TRIGGER_PROBE,
        max_silence_secs: PROBE_MAX_SILENCE_SECS,
        min_duration_secs: PROBE_MIN_DURATION_SECS,
        max_duration_secs: PROBE_MAX_DURATION_SECS,
    }
}

fn default_command_triggers() -> Vec<String> {
    vec!["jarvis".to_string()]
}

fn default_dictation_triggers() -> Vec<String> {
    vec!["take a note".to_string(), "dictate".to_string()]
}

fn default_window_secs() -> f32 {
    DEFAULT_WINDOW_SECS
}

fn default_cooldown_secs() -> f32 {
    DISPATCH_COOLDOWN_SECS
}

fn default_stt_endpoint() -> String {
    "http://127.0.0.1:8765/transcribe".to_string()
}

/// Engine configuration
///
/// Deserialized from a JSON settings file; every field has a default so a
/// missing or partial file still yields a working configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Phrases that select command mode when heard in a trigger probe
    #[serde(default = "default_command_triggers")]
    pub command_triggers: Vec<String>,
    /// Phrases that select dictation mode when heard in a trigger probe
    #[serde(default = "default_dictation_triggers")]
    pub dictation_triggers: Vec<String>,
    /// Rolling buffer window (seconds)
    #[serde(default = "default_window_secs")]
    pub window_secs: f32,
    /// Minimum interval between trigger dispatches (seconds)
    #[serde(default = "default_cooldown_secs")]
    pub dispatch_cooldown_secs: f32,
    /// Whisper-compatible transcription endpoint
    #[serde(default = "default_stt_endpoint")]
    pub stt_endpoint: String,
    /// Directory containing cue sound files; None disables cue playback
    #[serde(default)]
    pub cue_dir: Option<PathBuf>,
    /// Directory for finished recordings; None uses the system temp dir
    #[serde(default)]
    pub recordings_dir: Option<PathBuf>,
    /// Command-mode tuning
    #[serde(default = "default_command_tuning")]
    pub command: ModeTuning,
    /// Dictation-mode tuning
    #[serde(default = "default_dictation_tuning")]
    pub dictation: ModeTuning,
    /// Trigger-probe tuning
    #[serde(default = "default_probe_tuning")]
    pub trigger_probe: ModeTuning,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_triggers: default_command_triggers(),
            dictation_triggers: default_dictation_triggers(),
            window_secs: default_window_secs(),
            dispatch_cooldown_secs: default_cooldown_secs(),
            stt_endpoint: default_stt_endpoint(),
            cue_dir: None,
            recordings_dir: None,
            command: default_command_tuning(),
            dictation: default_dictation_tuning(),
            trigger_probe: default_probe_tuning(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON settings file
    ///
    /// A missing file yields the defaults; a present but malformed file is
    /// an error so a typo does not silently revert every knob.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            crate::info!("[config] No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Tuning quadruple for a recording mode
    pub fn tuning(&self, mode: RecordingMode) -> &ModeTuning {
        match mode {
            RecordingMode::Command => &self.command,
            RecordingMode::Dictation => &self.dictation,
            RecordingMode::TriggerProbe => &self.trigger_probe,
        }
    }

    /// Rolling buffer capacity in frames
    pub fn window_frames(&self) -> usize {
        duration_to_frames(self.window_secs)
    }

    /// Directory where finished recordings are written
    pub fn recordings_dir(&self) -> PathBuf {
        self.recordings_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
