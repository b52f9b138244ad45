use crate::fingerprint::Fingerprint;
use std::time::{
    Duration,
    Instant,
};
use tracing::trace;

/// Phase of one detection cycle. Moves forward only; any fingerprint
/// mismatch while stabilizing drops back to `AwaitingChange`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DetectionPhase {
    AwaitingChange,
    Stabilizing,
    Stable,
    TimedOut,
}

/// Debounces a stream of (timestamp, fingerprint) pairs into phase
/// transitions. Raw pixel comparison catches any visual change; the dwell
/// window absorbs intermediate animation frames before content counts as
/// settled.
pub struct StabilityDetector {
    window: Duration,
    phase: DetectionPhase,
    last: Option<Fingerprint>,
    stable_since: Option<Instant>,
}

impl StabilityDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            phase: DetectionPhase::AwaitingChange,
            last: None,
            stable_since: None,
        }
    }

    pub fn phase(&self) -> DetectionPhase {
        self.phase
    }

    /// Start a fresh cycle: cleared baseline, `AwaitingChange`.
    pub fn reset(&mut self) {
        self.phase = DetectionPhase::AwaitingChange;
        self.last = None;
        self.stable_since = None;
    }

    /// Feed one sample's fingerprint, taken at `now`.
    pub fn observe(&mut self, now: Instant, fingerprint: Fingerprint) -> DetectionPhase {
        match self.phase {
            DetectionPhase::Stable | DetectionPhase::TimedOut => return self.phase,
            _ => {}
        }

        match self.last {
            None => {
                self.last = Some(fingerprint);
            }
            Some(previous) if previous != fingerprint => {
                if self.phase == DetectionPhase::Stabilizing {
                    trace!(?fingerprint, "content changed mid-dwell, restarting");
                }
                self.phase = DetectionPhase::AwaitingChange;
                self.last = Some(fingerprint);
                self.stable_since = None;
            }
            Some(_) => match self.phase {
                DetectionPhase::AwaitingChange => {
                    self.phase = DetectionPhase::Stabilizing;
                    self.stable_since = Some(now);
                }
                DetectionPhase::Stabilizing => {
                    let held = self
                        .stable_since
                        .map(|since| now.saturating_duration_since(since))
                        .unwrap_or_default();
                    if held >= self.window {
                        trace!(?fingerprint, held_ms = held.as_millis(), "content stable");
                        self.phase = DetectionPhase::Stable;
                    }
                }
                _ => {}
            },
        }
        self.phase
    }

    /// The cycle's overall deadline passed without a stable reading.
    pub fn expire(&mut self) -> DetectionPhase {
        if self.phase != DetectionPhase::Stable {
            self.phase = DetectionPhase::TimedOut;
        }
        self.phase
    }
}
