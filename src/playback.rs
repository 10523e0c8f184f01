// Audio cue playback: fire-and-forget feedback sounds
// Failures are logged and ignored; cues are never load-bearing

use crate::{debug, warn};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// The feedback sounds the engine can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueKind {
    /// A recording session began
    Start,
    /// A recording session ended (doubles as the failure cue)
    Stop,
    /// A dictation session was triggered
    Dictation,
    /// A command session was triggered
    Command,
    /// Capture was muted
    Muted,
    /// Capture was unmuted
    Unmuted,
}

impl CueKind {
    /// File stem of the cue sound inside the cue directory
    pub fn file_stem(self) -> &'static str {
        match self {
            CueKind::Start => "start",
            CueKind::Stop => "stop",
            CueKind::Dictation => "dictation",
            CueKind::Command => "command",
            CueKind::Muted => "muted",
            CueKind::Unmuted => "unmuted",
        }
    }
}

/// Playback collaborator: fire-and-forget, must never block the caller
pub trait CuePlayer: Send + Sync {
    fn play_cue(&self, kind: CueKind);
}

/// Plays cue files through the macOS `afplay` binary
///
/// The child process is spawned and never waited on; a missing cue file
/// or failed spawn is logged and otherwise ignored.
pub struct SystemCuePlayer {
    cue_dir: PathBuf,
}

impl SystemCuePlayer {
    pub fn new(cue_dir: PathBuf) -> Self {
        Self { cue_dir }
    }
}

impl CuePlayer for SystemCuePlayer {
    fn play_cue(&self, kind: CueKind) {
        let path = self.cue_dir.join(format!("{}.wav", kind.file_stem()));
        if !path.exists() {
            debug!("[playback] No cue file for {:?} at {}", kind, path.display());
            return;
        }
        match Command::new("afplay")
            .arg(&path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(_) => debug!("[playback] Playing {:?} cue", kind),
            Err(e) => warn!("[playback] Failed to play {:?} cue: {}", kind, e),
        }
    }
}

/// Silent cue player for headless use and tests
pub struct NullCuePlayer;

impl CuePlayer for NullCuePlayer {
    fn play_cue(&self, _kind: CueKind) {}
}
