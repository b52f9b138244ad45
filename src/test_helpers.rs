//! Scripted port implementations for driving the engine through exact
//! frame and result sequences in tests.

use crate::{
    round::{
        ResultClassifier,
        RoundResult,
    },
    screen::{
        DispatchError,
        Region,
        ScreenSample,
        ScreenSampler,
        TapDispatcher,
    },
    stake::TapAction,
};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
        PoisonError,
    },
    time::Instant,
};

pub const RESULT_TAG: u8 = 0x0D;
const NOISE_TAG: u8 = 0x0A;

/// Frame encoding a settled round; `FrameClassifier` decodes it.
pub fn result_frame(first: u8, second: u8) -> Vec<u8> {
    vec![RESULT_TAG, first, second]
}

/// Frame distinguishable from every frame with a different tag.
pub fn noise_frame(tag: u64) -> Vec<u8> {
    let mut pixels = vec![NOISE_TAG];
    pixels.extend_from_slice(&tag.to_le_bytes());
    pixels
}

/// Replays a fixed frame script, then keeps returning the final frame so
/// the detector can dwell on it. `None` entries model a transiently
/// unavailable sampler; an empty script is a sampler that never delivers.
pub struct ScriptedSampler {
    frames: VecDeque<Option<Vec<u8>>>,
    last: Option<Vec<u8>>,
}

impl ScriptedSampler {
    pub fn new(frames: Vec<Option<Vec<u8>>>) -> Self {
        Self {
            frames: frames.into(),
            last: None,
        }
    }

    pub fn never_available() -> Self {
        Self::new(Vec::new())
    }
}

impl ScreenSampler for ScriptedSampler {
    async fn sample(&mut self, region: &Region) -> Option<ScreenSample> {
        let pixels = match self.frames.pop_front() {
            Some(Some(pixels)) => {
                self.last = Some(pixels.clone());
                pixels
            }
            Some(None) => return None,
            None => self.last.clone()?,
        };
        Some(ScreenSample {
            region: *region,
            taken_at: Instant::now(),
            pixels,
        })
    }
}

/// Decodes `result_frame` pixels at a fixed confidence.
pub struct FrameClassifier {
    pub confidence: f64,
}

impl FrameClassifier {
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }
}

impl ResultClassifier for FrameClassifier {
    async fn classify(&mut self, sample: &ScreenSample) -> Option<RoundResult> {
        match sample.pixels.as_slice() {
            [RESULT_TAG, first, second, ..] => {
                Some(RoundResult::new(*first, *second, self.confidence))
            }
            _ => None,
        }
    }
}

/// Returns each scripted result once, then "unrecognized" forever.
pub struct ScriptedClassifier {
    results: VecDeque<Option<RoundResult>>,
}

impl ScriptedClassifier {
    pub fn new(results: Vec<Option<RoundResult>>) -> Self {
        Self {
            results: results.into(),
        }
    }

    pub fn never_recognizes() -> Self {
        Self::new(Vec::new())
    }
}

impl ResultClassifier for ScriptedClassifier {
    async fn classify(&mut self, _sample: &ScreenSample) -> Option<RoundResult> {
        self.results.pop_front().flatten()
    }
}

/// Records every dispatched tap for later assertions.
pub struct RecordingDispatcher {
    taps: Arc<Mutex<Vec<TapAction>>>,
    fail_all: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self {
            taps: Arc::new(Mutex::new(Vec::new())),
            fail_all: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            taps: Arc::new(Mutex::new(Vec::new())),
            fail_all: true,
        }
    }

    pub fn taps(&self) -> Arc<Mutex<Vec<TapAction>>> {
        self.taps.clone()
    }
}

impl Default for RecordingDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TapDispatcher for RecordingDispatcher {
    async fn dispatch(&mut self, action: &TapAction) -> Result<(), DispatchError> {
        if self.fail_all {
            return Err(DispatchError {
                action: action.clone(),
            });
        }
        self.taps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action.clone());
        Ok(())
    }
}
