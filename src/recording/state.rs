// Process-wide recording state shared by the capture thread, recording
// sessions, and the trigger dispatcher

use crate::listening::RollingBuffer;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Point-in-time view of the shared flags, handed to change callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub recording: bool,
    pub muted: bool,
}

/// Proof of a claim on the recording flag
///
/// Claims are stamped with a generation counter so a force-preempted
/// session's cleanup cannot clear a successor's claim: releasing with a
/// stale token is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionToken {
    epoch: u64,
}

type StateCallback = Arc<dyn Fn(StateSnapshot) + Send + Sync>;

/// Fields guarded by the single state mutex
///
/// The rolling buffer lives under the same lock as the flags so readers
/// always see buffer contents and the speech-start bookmark consistently.
struct StateInner {
    recording: bool,
    muted: bool,
    epoch: u64,
    last_dispatch: Option<Instant>,
    buffer: RollingBuffer,
}

/// The single arbiter of who owns the microphone
///
/// `recording == false`: the continuous capture thread owns the device.
/// `recording == true`: exactly one recording session owns it. The flag
/// is claimed by test-and-set under the mutex; the capture thread parks
/// on the paired condvar while a session is active.
///
/// Critical sections are plain field reads and writes; no lock is ever
/// held across I/O, and change callbacks run with no lock held.
pub struct SharedRecordingState {
    inner: Mutex<StateInner>,
    /// Signaled whenever the recording flag clears
    resumed: Condvar,
    callbacks: Mutex<Vec<StateCallback>>,
}

impl SharedRecordingState {
    /// Create shared state with a rolling window of `window_frames` frames
    pub fn new(window_frames: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(StateInner {
                recording: false,
                muted: false,
                epoch: 0,
                last_dispatch: None,
                buffer: RollingBuffer::new(window_frames),
            }),
            resumed: Condvar::new(),
            callbacks: Mutex::new(Vec::new()),
        })
    }

    /// Whether a recording session currently owns the microphone
    pub fn is_recording(&self) -> bool {
        self.inner.lock().recording
    }

    /// Whether capture input is muted
    pub fn is_muted(&self) -> bool {
        self.inner.lock().muted
    }

    /// Current flag values
    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.lock();
        StateSnapshot {
            recording: inner.recording,
            muted: inner.muted,
        }
    }

    /// Claim the recording flag if nobody holds it
    ///
    /// Returns `None` without side effects when a session is already
    /// active — the expected contention outcome, not an error.
    pub fn try_begin_recording(&self) -> Option<SessionToken> {
        let (token, snapshot) = {
            let mut inner = self.inner.lock();
            if inner.recording {
                return None;
            }
            inner.epoch += 1;
            inner.recording = true;
            (
                SessionToken { epoch: inner.epoch },
                StateSnapshot {
                    recording: true,
                    muted: inner.muted,
                },
            )
        };
        self.notify(snapshot);
        Some(token)
    }

    /// Claim the recording flag, preempting any current holder
    ///
    /// Bumping the epoch invalidates the previous holder's token; its
    /// capture loop notices the lost claim on the next frame and
    /// finalizes whatever it has. Best-effort: the old session keeps the
    /// physical device until it reaches that check.
    pub fn force_begin_recording(&self) -> SessionToken {
        let (token, snapshot, preempted) = {
            let mut inner = self.inner.lock();
            let preempted = inner.recording;
            inner.epoch += 1;
            inner.recording = true;
            (
                SessionToken { epoch: inner.epoch },
                StateSnapshot {
                    recording: true,
                    muted: inner.muted,
                },
                preempted,
            )
        };
        if preempted {
            crate::debug!("[state] Force-claim preempted an active session");
        }
        self.notify(snapshot);
        token
    }

    /// Whether `token` still holds the claim
    pub fn is_current(&self, token: SessionToken) -> bool {
        let inner = self.inner.lock();
        inner.recording && inner.epoch == token.epoch
    }

    /// Release the claim held by `token`
    ///
    /// A stale token (preempted session, or already-cleared flag) is a
    /// no-op. Returns whether the flag was actually cleared.
    pub fn end_recording(&self, token: SessionToken) -> bool {
        let snapshot = {
            let mut inner = self.inner.lock();
            if !inner.recording || inner.epoch != token.epoch {
                return false;
            }
            inner.recording = false;
            StateSnapshot {
                recording: false,
                muted: inner.muted,
            }
        };
        self.resumed.notify_all();
        self.notify(snapshot);
        true
    }

    /// Clear the recording flag regardless of who holds it (manual stop)
    ///
    /// The active session observes the lost claim and finalizes what it
    /// has captured. Returns whether a claim was actually cleared.
    pub fn clear_recording(&self) -> bool {
        let snapshot = {
            let mut inner = self.inner.lock();
            if !inner.recording {
                return false;
            }
            inner.recording = false;
            StateSnapshot {
                recording: false,
                muted: inner.muted,
            }
        };
        self.resumed.notify_all();
        self.notify(snapshot);
        true
    }

    /// Set the muted flag; returns whether it changed
    pub fn set_muted(&self, muted: bool) -> bool {
        let snapshot = {
            let mut inner = self.inner.lock();
            if inner.muted == muted {
                return false;
            }
            inner.muted = muted;
            StateSnapshot {
                recording: inner.recording,
                muted,
            }
        };
        self.notify(snapshot);
        true
    }

    /// Park until the recording flag clears, up to `max_wait`
    ///
    /// Returns immediately if no session is active. Used by the capture
    /// thread instead of sleep-polling; the bounded wait lets the caller
    /// re-check its own stop flag.
    pub fn wait_while_recording(&self, max_wait: Duration) {
        let mut inner = self.inner.lock();
        if inner.recording {
            let _ = self.resumed.wait_for(&mut inner, max_wait);
        }
    }

    /// Claim a dispatch slot if the cooldown window has elapsed
    ///
    /// Test-and-set on the last dispatch timestamp: a refused attempt
    /// does not update it, an accepted one stamps it immediately so a
    /// concurrent attempt cannot also pass.
    pub fn try_claim_dispatch(&self, cooldown: Duration) -> bool {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        if let Some(last) = inner.last_dispatch {
            if now.duration_since(last) < cooldown {
                return false;
            }
        }
        inner.last_dispatch = Some(now);
        true
    }

    /// Run `f` against the rolling buffer under the state lock
    ///
    /// The closure must stay cheap: it runs inside the shared critical
    /// section (no I/O, no callbacks).
    pub fn with_buffer<R>(&self, f: impl FnOnce(&mut RollingBuffer) -> R) -> R {
        let mut inner = self.inner.lock();
        f(&mut inner.buffer)
    }

    /// Register a callback invoked after every flag change
    ///
    /// Callbacks run with no state lock held, so they may call back into
    /// this struct freely.
    pub fn register_callback(&self, callback: impl Fn(StateSnapshot) + Send + Sync + 'static) {
        self.callbacks.lock().push(Arc::new(callback));
    }

    /// Invoke registered callbacks outside any lock
    fn notify(&self, snapshot: StateSnapshot) {
        let callbacks: Vec<StateCallback> = self.callbacks.lock().clone();
        for callback in callbacks {
            callback(snapshot);
        }
    }
}
