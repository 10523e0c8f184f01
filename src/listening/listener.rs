// Continuous capture loop: feeds the rolling buffer, runs the trigger
// probe, and cedes the device whenever a recording session is active

use super::dispatcher::{DispatchOutcome, TriggerDispatcher};
use crate::audio::{CaptureBackend, CaptureError, FrameSource};
use crate::audio_constants::{
    CAPTURE_RETRY_BACKOFF_MS, FRAME_READ_TIMEOUT_MS, PAUSE_WAIT_MS,
};
use crate::config::EngineConfig;
use crate::recording::{
    classify, has_utterance_ended, FrameClass, RecordingMode, SharedRecordingState,
};
use crate::{debug, error, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to the long-lived capture thread
///
/// The thread runs for the process lifetime; `stop` (or drop) signals it
/// and joins. Failure to open the device at startup is fatal and is
/// reported from `spawn` rather than retried silently.
pub struct ContinuousListener {
    thread: Option<JoinHandle<()>>,
    should_stop: Arc<AtomicBool>,
}

impl ContinuousListener {
    /// Spawn the capture thread
    ///
    /// Blocks until the thread has opened its stream; an unopenable
    /// device at startup is returned as an error, with the thread
    /// already exited.
    pub fn spawn(
        shared: Arc<SharedRecordingState>,
        config: Arc<EngineConfig>,
        backend: Arc<dyn CaptureBackend>,
        dispatcher: Arc<TriggerDispatcher>,
    ) -> Result<Self, CaptureError> {
        let should_stop = Arc::new(AtomicBool::new(false));
        let (startup_tx, startup_rx) = mpsc::channel();

        let thread_stop = should_stop.clone();
        let thread = thread::spawn(move || {
            capture_thread_main(shared, config, backend, dispatcher, thread_stop, startup_tx);
        });

        match startup_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                thread: Some(thread),
                should_stop,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CaptureError::Stream(
                    "capture thread exited before startup".to_string(),
                ))
            }
        }
    }

    /// Whether the capture thread is still running
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Signal the capture thread to exit and wait for it
    pub fn stop(&mut self) {
        self.should_stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        debug!("[listener] Stopped");
    }
}

impl Drop for ContinuousListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Per-utterance bookkeeping for the trigger probe
#[derive(Default)]
struct ProbeState {
    speech_seen: bool,
    silence_run: usize,
    utterance_frames: usize,
}

impl ProbeState {
    fn reset(&mut self) {
        *self = ProbeState::default();
    }
}

/// Main loop of the capture thread
fn capture_thread_main(
    shared: Arc<SharedRecordingState>,
    config: Arc<EngineConfig>,
    backend: Arc<dyn CaptureBackend>,
    dispatcher: Arc<TriggerDispatcher>,
    should_stop: Arc<AtomicBool>,
    startup_tx: mpsc::Sender<Result<(), CaptureError>>,
) {
    // Initial device open is the startup handshake: failure here is
    // fatal to the process, not silently retried.
    let mut source: Option<Box<dyn FrameSource>> = match backend.open() {
        Ok(source) => {
            let _ = startup_tx.send(Ok(()));
            Some(source)
        }
        Err(e) => {
            error!("[listener] Cannot open input device at startup: {}", e);
            let _ = startup_tx.send(Err(e));
            return;
        }
    };

    let probe_tuning = config.tuning(RecordingMode::TriggerProbe).clone();
    let read_timeout = Duration::from_millis(FRAME_READ_TIMEOUT_MS);
    let mut probe = ProbeState::default();

    info!("[listener] Continuous capture started");

    loop {
        if should_stop.load(Ordering::SeqCst) {
            break;
        }

        // An active session owns the device: close our stream, park on
        // the condvar, and reopen once the flag clears.
        if shared.is_recording() {
            if source.is_some() {
                debug!("[listener] Ceding device to active recording session");
                source = None;
                probe.reset();
                shared.with_buffer(|buffer| buffer.clear_speech_start());
            }
            shared.wait_while_recording(Duration::from_millis(PAUSE_WAIT_MS));
            continue;
        }

        if source.is_none() {
            match backend.open() {
                Ok(new_source) => {
                    debug!("[listener] Reopened input stream");
                    source = Some(new_source);
                }
                Err(e) => {
                    warn!(
                        "[listener] Reopen failed ({}), retrying in {} ms",
                        e, CAPTURE_RETRY_BACKOFF_MS
                    );
                    thread::sleep(Duration::from_millis(CAPTURE_RETRY_BACKOFF_MS));
                }
            }
            continue;
        }
        // Safe to unwrap: the stream was opened or reopened above
        let src = source.as_mut().expect("source checked above");

        match src.read_frame(read_timeout) {
            Ok(Some(frame)) => {
                if shared.is_muted() {
                    // Keep the stream warm but forget the utterance: a
                    // phrase straddling the mute boundary must not trigger.
                    if probe.speech_seen {
                        probe.reset();
                        shared.with_buffer(|buffer| buffer.clear_speech_start());
                    }
                    continue;
                }

                let class = match classify(&frame, probe_tuning.energy_threshold) {
                    Ok(class) => class,
                    Err(e) => {
                        // Producer/consumer frame-size mismatch is a
                        // wiring bug; surface it and stop rather than
                        // misclassify audio forever.
                        error!("[listener] {}", e);
                        break;
                    }
                };

                let is_speech = class == FrameClass::Speech;
                shared.with_buffer(|buffer| {
                    buffer.append(frame);
                    if is_speech {
                        buffer.mark_speech_start();
                    }
                });

                if is_speech {
                    if !probe.speech_seen {
                        trace!("[listener] Speech onset");
                    }
                    probe.speech_seen = true;
                    probe.silence_run = 0;
                } else if probe.speech_seen {
                    probe.silence_run += 1;
                }
                if probe.speech_seen {
                    probe.utterance_frames += 1;
                }

                let ended = has_utterance_ended(
                    RecordingMode::TriggerProbe,
                    &probe_tuning,
                    probe.silence_run,
                    probe.utterance_frames,
                    probe.speech_seen,
                );
                let overran = probe.speech_seen
                    && probe.utterance_frames >= probe_tuning.max_duration_frames();
                if ended || overran {
                    debug!(
                        "[listener] Utterance ended after {} frames, dispatching",
                        probe.utterance_frames
                    );
                    let outcome = dispatcher.dispatch();
                    trace!("[listener] Dispatch outcome: {:?}", outcome);
                    if outcome == DispatchOutcome::CooledDown {
                        // The dispatcher only consumes the bookmark on
                        // attempts it accepts; forget the utterance here
                        // so the same audio is not re-dispatched.
                        shared.with_buffer(|buffer| buffer.clear_speech_start());
                    }
                    probe.reset();
                }
            }
            Ok(None) => {
                // Stalled read; loop re-checks stop and recording flags
            }
            Err(e) => {
                warn!(
                    "[listener] Stream error ({}), reopening after backoff",
                    e
                );
                source = None;
                probe.reset();
                shared.with_buffer(|buffer| buffer.clear_speech_start());
                thread::sleep(Duration::from_millis(CAPTURE_RETRY_BACKOFF_MS));
            }
        }
    }

    debug!("[listener] Capture thread exiting");
}
