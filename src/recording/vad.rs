// Voice-activity detection: frame energy classification and endpointing
// Pure functions; all state lives with the callers

use super::RecordingMode;
use crate::audio::AudioFrame;
use crate::audio_constants::{duration_to_frames, COMMAND_SILENCE_FLOOR_SECS, FRAME_SIZE};
use crate::config::ModeTuning;

/// Classification of a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    Speech,
    Silence,
}

/// Errors from frame classification
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VadError {
    /// Frame size does not match the capture format — a producer/consumer
    /// mismatch, never silently padded or truncated
    #[error("invalid frame: got {got} samples, expected {expected}")]
    InvalidFrame { got: usize, expected: usize },
}

/// Mean absolute amplitude of a run of samples
///
/// Zero for an empty slice; a frame of digital silence measures 0.0.
pub fn mean_abs_amplitude(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u64 = samples
        .iter()
        .map(|&s| (s as i32).unsigned_abs() as u64)
        .sum();
    sum as f32 / samples.len() as f32
}

/// Classify a frame as speech or silence against an energy threshold
pub fn classify(frame: &AudioFrame, threshold: f32) -> Result<FrameClass, VadError> {
    if frame.len() != FRAME_SIZE {
        return Err(VadError::InvalidFrame {
            got: frame.len(),
            expected: FRAME_SIZE,
        });
    }
    if mean_abs_amplitude(frame.samples()) >= threshold {
        Ok(FrameClass::Speech)
    } else {
        Ok(FrameClass::Silence)
    }
}

/// Decide whether the current utterance has ended
///
/// True only when the silence run has reached the mode's cutoff, speech
/// was actually observed, and enough audio has been recorded. Command
/// mode additionally enforces a hand-tuned 3.0 s floor
/// (`COMMAND_SILENCE_FLOOR_SECS`): commands often contain a mid-utterance
/// pause, and stopping on it clips the command.
pub fn has_utterance_ended(
    mode: RecordingMode,
    tuning: &ModeTuning,
    silence_run: usize,
    frames_recorded: usize,
    has_speech: bool,
) -> bool {
    if !has_speech {
        return false;
    }
    if silence_run < tuning.max_silence_frames() {
        return false;
    }
    let mut min_frames = tuning.min_duration_frames();
    if mode == RecordingMode::Command {
        min_frames = min_frames.max(duration_to_frames(COMMAND_SILENCE_FLOOR_SECS));
    }
    frames_recorded >= min_frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_frame(amplitude: i16) -> AudioFrame {
        AudioFrame::new(vec![amplitude; FRAME_SIZE])
    }

    fn tuning(max_silence_secs: f32, min_duration_secs: f32) -> ModeTuning {
        ModeTuning {
            energy_threshold: 100.0,
            max_silence_secs,
            min_duration_secs,
            max_duration_secs: 30.0,
        }
    }

    #[test]
    fn test_mean_abs_amplitude_empty() {
        assert_eq!(mean_abs_amplitude(&[]), 0.0);
    }

    #[test]
    fn test_mean_abs_amplitude_mixed_signs() {
        assert_eq!(mean_abs_amplitude(&[100, -100, 50, -50]), 75.0);
    }

    #[test]
    fn test_mean_abs_amplitude_extreme_negative() {
        // i16::MIN has no i16 absolute value; must not overflow
        assert_eq!(mean_abs_amplitude(&[i16::MIN]), 32768.0);
    }

    #[test]
    fn test_classify_speech_above_threshold() {
        let frame = full_frame(500);
        assert_eq!(classify(&frame, 100.0).unwrap(), FrameClass::Speech);
    }

    #[test]
    fn test_classify_silence_below_threshold() {
        let frame = full_frame(20);
        assert_eq!(classify(&frame, 100.0).unwrap(), FrameClass::Silence);
    }

    #[test]
    fn test_classify_at_threshold_is_speech() {
        let frame = full_frame(100);
        assert_eq!(classify(&frame, 100.0).unwrap(), FrameClass::Speech);
    }

    #[test]
    fn test_all_zero_frame_is_silence() {
        // Muted hardware delivers digital silence; must classify cleanly
        let frame = full_frame(0);
        assert_eq!(classify(&frame, 100.0).unwrap(), FrameClass::Silence);
    }

    #[test]
    fn test_short_frame_is_rejected() {
        let frame = AudioFrame::new(vec![0; FRAME_SIZE - 1]);
        let err = classify(&frame, 100.0).unwrap_err();
        assert_eq!(
            err,
            VadError::InvalidFrame {
                got: FRAME_SIZE - 1,
                expected: FRAME_SIZE,
            }
        );
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let frame = AudioFrame::new(vec![0; FRAME_SIZE + 1]);
        assert!(classify(&frame, 100.0).is_err());
    }

    #[test]
    fn test_no_end_without_speech() {
        // A long silence run alone never ends an utterance
        let t = tuning(0.2, 0.0);
        assert!(!has_utterance_ended(
            RecordingMode::Dictation,
            &t,
            100,
            100,
            false
        ));
    }

    #[test]
    fn test_no_end_before_silence_cutoff() {
        let t = tuning(1.0, 0.0); // 15 frames of silence required
        assert!(!has_utterance_ended(
            RecordingMode::Dictation,
            &t,
            14,
            50,
            true
        ));
        assert!(has_utterance_ended(
            RecordingMode::Dictation,
            &t,
            15,
            50,
            true
        ));
    }

    #[test]
    fn test_min_duration_suppresses_early_stop() {
        let t = tuning(0.2, 2.0); // 3 silence frames, 31 frame minimum
        assert!(!has_utterance_ended(
            RecordingMode::Dictation,
            &t,
            10,
            30,
            true
        ));
        assert!(has_utterance_ended(
            RecordingMode::Dictation,
            &t,
            10,
            31,
            true
        ));
    }

    #[test]
    fn test_command_floor_overrides_configured_minimum() {
        // Even with a zero configured minimum, command mode holds the
        // recording open until the 3.0 s floor (46 frames)
        let t = tuning(0.2, 0.0);
        assert!(!has_utterance_ended(
            RecordingMode::Command,
            &t,
            10,
            23, // 1.5 s recorded: silence cutoff reached, floor not
            true
        ));
        assert!(!has_utterance_ended(RecordingMode::Command, &t, 10, 45, true));
        assert!(has_utterance_ended(RecordingMode::Command, &t, 10, 46, true));
    }

    #[test]
    fn test_command_floor_does_not_apply_to_other_modes() {
        let t = tuning(0.2, 0.0);
        assert!(has_utterance_ended(
            RecordingMode::Dictation,
            &t,
            10,
            23,
            true
        ));
        assert!(has_utterance_ended(
            RecordingMode::TriggerProbe,
            &t,
            10,
            23,
            true
        ));
    }
}
