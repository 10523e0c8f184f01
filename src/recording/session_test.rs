// Tests for RecordingSession
// Sessions are driven against scripted frame sources; no hardware

use super::*;
use crate::audio::{AudioFrame, CaptureBackend, CaptureError, FrameSource};
use crate::recording::SharedRecordingState;
use parking_lot::Mutex;
use serial_test::serial;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

enum ScriptStep {
    Frame(AudioFrame),
    Timeout,
    Fail(String),
}

/// Frame source that replays a fixed script, then times out forever
struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
}

impl FrameSource for ScriptedSource {
    fn read_frame(&mut self, _timeout: Duration) -> Result<Option<AudioFrame>, CaptureError> {
        match self.steps.pop_front() {
            Some(ScriptStep::Frame(frame)) => Ok(Some(frame)),
            Some(ScriptStep::Timeout) => Ok(None),
            Some(ScriptStep::Fail(msg)) => Err(CaptureError::Stream(msg)),
            None => Ok(None),
        }
    }
}

/// Backend yielding one scripted source, then failing
struct ScriptedBackend {
    source: Mutex<Option<ScriptedSource>>,
}

impl ScriptedBackend {
    fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            source: Mutex::new(Some(ScriptedSource {
                steps: steps.into(),
            })),
        }
    }
}

impl CaptureBackend for ScriptedBackend {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        match self.source.lock().take() {
            Some(source) => Ok(Box::new(source)),
            None => Err(CaptureError::DeviceUnavailable(
                "scripted source already consumed".to_string(),
            )),
        }
    }
}

/// Backend with no device at all
struct FailBackend;

impl CaptureBackend for FailBackend {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        Err(CaptureError::DeviceUnavailable(
            "device reports zero input channels".to_string(),
        ))
    }
}

/// Source that produces speech frames forever, paced like a device
struct EndlessSpeechSource;

impl FrameSource for EndlessSpeechSource {
    fn read_frame(&mut self, _timeout: Duration) -> Result<Option<AudioFrame>, CaptureError> {
        thread::sleep(Duration::from_millis(2));
        Ok(Some(speech_frame()))
    }
}

struct EndlessSpeechBackend;

impl CaptureBackend for EndlessSpeechBackend {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        Ok(Box::new(EndlessSpeechSource))
    }
}

fn speech_frame() -> AudioFrame {
    AudioFrame::new(vec![1000; FRAME_SIZE])
}

fn silence_frame() -> AudioFrame {
    AudioFrame::new(vec![0; FRAME_SIZE])
}

fn tuning(max_silence_secs: f32, min_duration_secs: f32, max_duration_secs: f32) -> ModeTuning {
    ModeTuning {
        energy_threshold: 100.0,
        max_silence_secs,
        min_duration_secs,
        max_duration_secs,
    }
}

fn fixture() -> (Arc<SharedRecordingState>, RecordingWriter, AudioDispatchQueue, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let writer = RecordingWriter::new(dir.path().to_path_buf());
    (SharedRecordingState::new(78), writer, AudioDispatchQueue::new(), dir)
}

fn frames(steps: &[ScriptStep]) -> Vec<ScriptStep> {
    steps
        .iter()
        .map(|s| match s {
            ScriptStep::Frame(f) => ScriptStep::Frame(f.clone()),
            ScriptStep::Timeout => ScriptStep::Timeout,
            ScriptStep::Fail(m) => ScriptStep::Fail(m.clone()),
        })
        .collect()
}

fn speech_then_silence(speech: usize, silence: usize) -> Vec<ScriptStep> {
    let mut steps = Vec::new();
    for _ in 0..speech {
        steps.push(ScriptStep::Frame(speech_frame()));
    }
    for _ in 0..silence {
        steps.push(ScriptStep::Frame(silence_frame()));
    }
    steps
}

#[test]
fn test_run_completes_on_utterance_end() {
    let (shared, writer, queue, _dir) = fixture();
    let backend = ScriptedBackend::new(speech_then_silence(2, 10));
    let mut session =
        RecordingSession::new(RecordingMode::Dictation, tuning(0.2, 0.0, 1.0), shared.clone());

    let result = session
        .run(false, false, &backend, &writer, &queue)
        .unwrap();

    // 2 speech frames + 3 silence frames to reach the 0.2 s cutoff
    assert_eq!(result.duration_frames, 5);
    assert_eq!(result.mode, RecordingMode::Dictation);
    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.stop_cause(), Some(StopCause::UtteranceEnded));
    assert!(!shared.is_recording());

    // Result enqueued with the session's tags
    assert_eq!(
        queue.try_dequeue(),
        Some(QueueItem::Recording {
            file_path: result.file_path.clone(),
            mode: RecordingMode::Dictation,
            is_trigger: false,
        })
    );
}

#[test]
fn test_wav_round_trip_preserves_captured_audio() {
    let (shared, writer, queue, _dir) = fixture();
    let backend = ScriptedBackend::new(speech_then_silence(2, 10));
    let mut session =
        RecordingSession::new(RecordingMode::Dictation, tuning(0.2, 0.0, 1.0), shared);

    let result = session.run(false, false, &backend, &writer, &queue).unwrap();

    let (samples, rate) = wav::read_wav(std::path::Path::new(&result.file_path)).unwrap();
    assert_eq!(rate, SAMPLE_RATE);
    assert_eq!(samples.len(), 5 * FRAME_SIZE);
    // Capture order preserved: speech first, then silence
    assert!(samples[..2 * FRAME_SIZE].iter().all(|&s| s == 1000));
    assert!(samples[2 * FRAME_SIZE..].iter().all(|&s| s == 0));
}

#[test]
fn test_run_stops_at_max_duration() {
    let (shared, writer, queue, _dir) = fixture();
    let backend = ScriptedBackend::new(speech_then_silence(20, 0));
    let mut session =
        RecordingSession::new(RecordingMode::Dictation, tuning(0.2, 0.0, 0.3), shared);

    let result = session.run(false, false, &backend, &writer, &queue).unwrap();

    // 0.3 s cap is 4 frames
    assert_eq!(result.duration_frames, 4);
    assert_eq!(session.stop_cause(), Some(StopCause::MaxDuration));
}

#[test]
fn test_command_floor_suppresses_early_silence_stop() {
    let (shared, writer, queue, _dir) = fixture();
    // Silence cutoff (3 frames) is reached 1.5 s in, well under the
    // 3.0 s command floor; the session must keep capturing to 46 frames.
    let backend = ScriptedBackend::new(speech_then_silence(2, 60));
    let mut session =
        RecordingSession::new(RecordingMode::Command, tuning(0.2, 0.0, 10.0), shared);

    let result = session.run(false, false, &backend, &writer, &queue).unwrap();

    assert_eq!(result.duration_frames, 46);
    assert_eq!(session.stop_cause(), Some(StopCause::UtteranceEnded));
}

#[test]
fn test_start_fails_when_already_recording() {
    let (shared, writer, queue, _dir) = fixture();
    let holder = shared.try_begin_recording().unwrap();

    let backend = ScriptedBackend::new(speech_then_silence(2, 10));
    let mut session =
        RecordingSession::new(RecordingMode::Command, tuning(0.2, 0.0, 1.0), shared.clone());

    let result = session.run(false, false, &backend, &writer, &queue);
    assert_eq!(result, Err(SessionError::AlreadyRecording));
    // No side effects: the session never armed and the holder's claim stands
    assert_eq!(session.state(), SessionState::Idle);
    assert!(shared.is_current(holder));
    assert!(queue.is_empty());
}

#[test]
fn test_force_start_preempts_holder() {
    let (shared, writer, queue, _dir) = fixture();
    let holder = shared.try_begin_recording().unwrap();

    let backend = ScriptedBackend::new(speech_then_silence(2, 10));
    let mut session =
        RecordingSession::new(RecordingMode::Dictation, tuning(0.2, 0.0, 1.0), shared.clone());

    let result = session.run(true, false, &backend, &writer, &queue).unwrap();
    assert_eq!(result.duration_frames, 5);
    assert!(!shared.is_recording());

    // The preempted holder's token went stale; its release is a no-op
    assert!(!shared.end_recording(holder));
}

#[test]
fn test_device_unavailable_on_open_failure() {
    let (shared, writer, queue, _dir) = fixture();
    let mut session =
        RecordingSession::new(RecordingMode::Command, tuning(0.2, 0.0, 1.0), shared.clone());

    let result = session.run(false, false, &FailBackend, &writer, &queue);
    assert!(matches!(result, Err(SessionError::DeviceUnavailable(_))));
    assert_eq!(session.state(), SessionState::Aborted);
    assert!(!shared.is_recording());
    assert!(queue.is_empty());
}

#[test]
fn test_device_unavailable_when_first_read_yields_nothing() {
    let (shared, writer, queue, _dir) = fixture();
    let backend = ScriptedBackend::new(frames(&[ScriptStep::Timeout]));
    let mut session =
        RecordingSession::new(RecordingMode::Dictation, tuning(0.2, 0.0, 1.0), shared.clone());

    let result = session.run(false, false, &backend, &writer, &queue);
    assert!(matches!(result, Err(SessionError::DeviceUnavailable(_))));
    assert!(!shared.is_recording());
}

#[test]
fn test_no_audio_captured_when_claim_lost_before_first_frame() {
    let (shared, writer, queue, _dir) = fixture();
    let backend = ScriptedBackend::new(speech_then_silence(5, 0));
    let mut session =
        RecordingSession::new(RecordingMode::Dictation, tuning(0.2, 0.0, 1.0), shared.clone());

    let token = session.start(false).unwrap();
    shared.clear_recording();

    let result = session.run_claimed(token, false, &backend, &writer, &queue);
    assert_eq!(result, Err(SessionError::NoAudioCaptured));
    assert_eq!(session.state(), SessionState::Aborted);
    assert!(!shared.is_recording());
    assert!(queue.is_empty());
}

#[test]
fn test_partial_audio_finalized_on_stream_error() {
    let (shared, writer, queue, _dir) = fixture();
    let mut steps = speech_then_silence(3, 0);
    steps.push(ScriptStep::Fail("device disconnected".to_string()));
    let backend = ScriptedBackend::new(steps);
    let mut session =
        RecordingSession::new(RecordingMode::Dictation, tuning(0.2, 0.0, 2.0), shared.clone());

    let result = session.run(false, false, &backend, &writer, &queue).unwrap();
    assert_eq!(result.duration_frames, 3);
    assert_eq!(session.stop_cause(), Some(StopCause::StreamError));
    assert_eq!(session.state(), SessionState::Completed);
    assert!(!shared.is_recording());
    assert_eq!(queue.len(), 1);
}

#[test]
#[serial]
fn test_external_clear_finalizes_partial_audio() {
    let (shared, writer, queue, _dir) = fixture();
    let shared_session = shared.clone();
    let queue = Arc::new(queue);
    let queue_session = queue.clone();

    let handle = thread::spawn(move || {
        let mut session = RecordingSession::new(
            RecordingMode::Dictation,
            tuning(10.0, 0.0, 100.0),
            shared_session,
        );
        let result = session.run(
            false,
            false,
            &EndlessSpeechBackend,
            &writer,
            &queue_session,
        );
        (result, session.stop_cause())
    });

    // Let it capture a few frames, then stop it manually
    thread::sleep(Duration::from_millis(100));
    assert!(shared.is_recording());
    shared.clear_recording();

    let (result, stop_cause) = handle.join().unwrap();
    let result = result.unwrap();
    assert!(result.duration_frames >= 1);
    assert_eq!(stop_cause, Some(StopCause::ClaimLost));
    assert!(!shared.is_recording());
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_invalid_frame_surfaces_as_error() {
    let (shared, writer, queue, _dir) = fixture();
    let backend = ScriptedBackend::new(vec![ScriptStep::Frame(AudioFrame::new(vec![0; 100]))]);
    let mut session =
        RecordingSession::new(RecordingMode::Dictation, tuning(0.2, 0.0, 1.0), shared.clone());

    let result = session.run(false, false, &backend, &writer, &queue);
    assert!(matches!(result, Err(SessionError::Vad(_))));
    assert_eq!(session.state(), SessionState::Aborted);
    assert!(!shared.is_recording());
}

#[test]
#[serial]
fn test_concurrent_starts_admit_exactly_one() {
    let (shared, _writer, _queue, _dir) = fixture();
    let mut handles = Vec::new();
    for _ in 0..6 {
        let shared = shared.clone();
        handles.push(thread::spawn(move || {
            let mut session = RecordingSession::new(
                RecordingMode::Command,
                tuning(0.2, 0.0, 1.0),
                shared,
            );
            let outcome = session.start(false);
            (outcome.is_ok(), session.state())
        }));
    }

    let results: Vec<(bool, SessionState)> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|(ok, _)| *ok).count();
    assert_eq!(winners, 1);
    for (ok, state) in results {
        if ok {
            assert_eq!(state, SessionState::Arming);
        } else {
            // Losers return AlreadyRecording with no state change
            assert_eq!(state, SessionState::Idle);
        }
    }
}
