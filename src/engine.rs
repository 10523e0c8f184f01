// Engine wiring: builds the shared state, queue, dispatcher, and
// continuous listener, and exposes the running engine's handle

use crate::audio::{CaptureBackend, CaptureError, CpalBackend, RecordingWriter};
use crate::config::EngineConfig;
use crate::dispatch_queue::{AudioDispatchQueue, QueueItem};
use crate::listening::{ContinuousListener, TriggerDispatcher};
use crate::playback::{CueKind, CuePlayer, NullCuePlayer, SystemCuePlayer};
use crate::recording::{
    RecordingMode, RecordingSession, SessionError, SharedRecordingState, StateSnapshot,
};
use crate::transcription::{Transcriber, TranscriptionError, WhisperHttpClient};
use crate::{error, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

/// Errors that prevent the engine from starting
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The capture device could not be opened at startup — fatal, not
    /// silently retried
    #[error("capture device unavailable at startup: {0}")]
    Startup(#[from] CaptureError),
    /// The transcription client could not be built
    #[error("transcription client: {0}")]
    Transcription(#[from] TranscriptionError),
}

/// Builder for a configured engine
///
/// Collaborators default to the production implementations (cpal
/// capture, Whisper HTTP transcription, afplay cues per config) and can
/// be swapped for alternatives before `start`.
pub struct VoiceEngine {
    config: EngineConfig,
    backend: Option<Arc<dyn CaptureBackend>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    cues: Option<Arc<dyn CuePlayer>>,
}

impl VoiceEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            backend: None,
            transcriber: None,
            cues: None,
        }
    }

    /// Replace the capture backend
    pub fn with_capture_backend(mut self, backend: Arc<dyn CaptureBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the transcription collaborator
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Replace the cue player
    pub fn with_cue_player(mut self, cues: Arc<dyn CuePlayer>) -> Self {
        self.cues = Some(cues);
        self
    }

    /// Wire everything up and start the continuous capture thread
    pub fn start(self) -> Result<EngineHandle, EngineError> {
        let config = Arc::new(self.config);
        let shared = SharedRecordingState::new(config.window_frames());
        let queue = Arc::new(AudioDispatchQueue::new());
        let writer = RecordingWriter::new(config.recordings_dir());

        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(CpalBackend::new()));
        let transcriber = match self.transcriber {
            Some(t) => t,
            None => Arc::new(WhisperHttpClient::new(config.stt_endpoint.clone())?),
        };
        let cues: Arc<dyn CuePlayer> = match self.cues {
            Some(c) => c,
            None => match &config.cue_dir {
                Some(dir) => Arc::new(SystemCuePlayer::new(dir.clone())),
                None => Arc::new(NullCuePlayer),
            },
        };

        let dispatcher = Arc::new(TriggerDispatcher::new(
            shared.clone(),
            config.clone(),
            transcriber,
            cues.clone(),
            backend.clone(),
            writer.clone(),
            queue.clone(),
        ));

        let listener =
            ContinuousListener::spawn(shared.clone(), config.clone(), backend.clone(), dispatcher)?;
        info!(
            "[engine] Started: window={}s, cooldown={}s, {} command / {} dictation trigger(s)",
            config.window_secs,
            config.dispatch_cooldown_secs,
            config.command_triggers.len(),
            config.dictation_triggers.len()
        );

        Ok(EngineHandle {
            config,
            shared,
            queue,
            backend,
            cues,
            writer,
            listener: Mutex::new(Some(listener)),
        })
    }
}

/// Handle to a running engine
///
/// Cheap to share behind an `Arc`; the daemon's signal handler and
/// consumer loop both hold one.
pub struct EngineHandle {
    config: Arc<EngineConfig>,
    shared: Arc<SharedRecordingState>,
    queue: Arc<AudioDispatchQueue>,
    backend: Arc<dyn CaptureBackend>,
    cues: Arc<dyn CuePlayer>,
    writer: RecordingWriter,
    listener: Mutex<Option<ContinuousListener>>,
}

impl EngineHandle {
    /// The queue of finished recordings for the downstream consumer
    pub fn queue(&self) -> Arc<AudioDispatchQueue> {
        self.queue.clone()
    }

    /// Current recording/mute flags
    pub fn state(&self) -> StateSnapshot {
        self.shared.snapshot()
    }

    /// Register a callback for flag changes (invoked with no lock held)
    pub fn on_state_change(&self, callback: impl Fn(StateSnapshot) + Send + Sync + 'static) {
        self.shared.register_callback(callback);
    }

    /// Start an explicit recording session for `mode`
    ///
    /// The claim is taken synchronously — contention surfaces here as
    /// `AlreadyRecording` — then the session runs on its own thread. The
    /// continuous listener cedes the device for the session's duration.
    pub fn start_session(&self, mode: RecordingMode, force: bool) -> Result<(), SessionError> {
        let mut session =
            RecordingSession::new(mode, self.config.tuning(mode).clone(), self.shared.clone());
        let token = session.start(force)?;

        let backend = self.backend.clone();
        let writer = self.writer.clone();
        let queue = self.queue.clone();
        let cues = self.cues.clone();
        thread::spawn(move || {
            cues.play_cue(CueKind::Start);
            match session.run_claimed(token, false, backend.as_ref(), &writer, &queue) {
                Ok(result) => {
                    cues.play_cue(CueKind::Stop);
                    info!(
                        "[engine] Explicit session finished: {} ({} frames)",
                        result.file_path, result.duration_frames
                    );
                }
                Err(e) => {
                    error!("[engine] Explicit session failed: {}", e);
                    if mode != RecordingMode::TriggerProbe {
                        cues.play_cue(CueKind::Stop);
                    }
                }
            }
        });
        Ok(())
    }

    /// Stop the active recording session, if any
    ///
    /// The session observes the cleared flag and finalizes whatever it
    /// has captured. Returns whether a session was actually stopped.
    pub fn stop_session(&self) -> bool {
        self.shared.clear_recording()
    }

    /// Set the mute flag, playing the matching cue on a change
    pub fn set_muted(&self, muted: bool) {
        if self.shared.set_muted(muted) {
            self.cues.play_cue(if muted {
                CueKind::Muted
            } else {
                CueKind::Unmuted
            });
        }
    }

    /// Whether capture is muted
    pub fn is_muted(&self) -> bool {
        self.shared.is_muted()
    }

    /// Stop the capture thread, cancel any session, and signal the
    /// consumer to shut down
    ///
    /// Idempotent; safe to call from a signal handler thread.
    pub fn shutdown(&self) {
        info!("[engine] Shutting down");
        if let Some(mut listener) = self.listener.lock().take() {
            listener.stop();
        }
        self.shared.clear_recording();
        self.queue.enqueue(QueueItem::Shutdown);
    }
}
