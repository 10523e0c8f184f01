// Rolling window over the most recent captured audio frames
// Holds the speech-start bookmark for the in-progress utterance

use crate::audio::AudioFrame;
use std::collections::VecDeque;

/// A bounded FIFO window of audio frames
///
/// The continuous capture thread appends; when the window is full the
/// oldest frame is evicted. The buffer also tracks where in the window
/// the current utterance started, kept buffer-relative as eviction
/// shifts the window.
#[derive(Debug)]
pub struct RollingBuffer {
    frames: VecDeque<AudioFrame>,
    capacity: usize,
    /// Index of the frame where the current utterance began, if one is
    /// in progress. Invariant: `0 <= index < len` while set.
    speech_start: Option<usize>,
}

impl RollingBuffer {
    /// Create a buffer holding at most `capacity` frames
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            speech_start: None,
        }
    }

    /// Append a frame, evicting the oldest if the window is full
    ///
    /// Eviction shifts every remaining frame down one slot, so the
    /// speech-start bookmark is decremented with it; once the bookmarked
    /// frame itself is evicted the bookmark becomes unset.
    pub fn append(&mut self, frame: AudioFrame) {
        self.frames.push_back(frame);
        if self.frames.len() > self.capacity {
            self.frames.pop_front();
            self.speech_start = match self.speech_start {
                Some(0) | None => None,
                Some(index) => Some(index - 1),
            };
        }
    }

    /// Bookmark the newest frame as the start of an utterance
    ///
    /// Idempotent while an utterance is in progress: only the first call
    /// after the bookmark was cleared takes effect.
    pub fn mark_speech_start(&mut self) {
        if self.speech_start.is_none() && !self.frames.is_empty() {
            self.speech_start = Some(self.frames.len() - 1);
        }
    }

    /// Forget the current utterance bookmark
    pub fn clear_speech_start(&mut self) {
        self.speech_start = None;
    }

    /// Where the current utterance started, if one is in progress
    pub fn speech_start(&self) -> Option<usize> {
        self.speech_start
    }

    /// Copy samples from `start` (or the window start if unset) to the tail
    pub fn snapshot_from(&self, start: Option<usize>) -> Vec<i16> {
        let start = start.unwrap_or(0).min(self.frames.len());
        let mut samples = Vec::new();
        for frame in self.frames.iter().skip(start) {
            samples.extend_from_slice(frame.samples());
        }
        samples
    }

    /// Number of frames currently held
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the window holds no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Maximum number of frames the window can hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
