use crate::stake::TapAction;
use serde::{
    Deserialize,
    Serialize,
};
use std::time::Instant;
use thiserror::Error;

/// Rectangular screen area watched for one game instance.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One timestamped raster capture of a region. Owned by the engine for a
/// single detection tick and discarded after fingerprinting/classification.
#[derive(Clone, Debug)]
pub struct ScreenSample {
    pub region: Region,
    pub taken_at: Instant,
    pub pixels: Vec<u8>,
}

/// Domain-specific override on top of the stability machine: returns true
/// when a would-be stable sample is a known false positive (e.g. a
/// countdown overlay), making the engine discard it and restart the cycle.
pub type StableVeto = Box<dyn Fn(&ScreenSample) -> bool + Send>;

/// Produces raster samples of a screen region.
///
/// Capture mechanics live behind this seam. None means the sampler was
/// transiently unavailable; the engine skips the tick and retries on the
/// next one.
pub trait ScreenSampler: Send {
    fn sample(
        &mut self,
        region: &Region,
    ) -> impl Future<Output = Option<ScreenSample>> + Send;
}

#[derive(Clone, Debug, Error)]
#[error("tap {action:?} was not delivered")]
pub struct DispatchError {
    pub action: TapAction,
}

/// Delivers synthetic taps to the game. Injection mechanics live behind
/// this seam; the engine does not retry individual failed taps beyond the
/// round-level failure policy.
pub trait TapDispatcher: Send {
    fn dispatch(
        &mut self,
        action: &TapAction,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;
}
