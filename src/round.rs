use crate::screen::ScreenSample;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

pub const MIN_PIP: u8 = 1;
pub const MAX_PIP: u8 = 6;
pub const MIN_TOTAL: u8 = MIN_PIP * 2;
pub const MAX_TOTAL: u8 = MAX_PIP * 2;

/// Highest total covered by the red selection; orange covers the rest.
const RED_TOTAL_CEILING: u8 = 7;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Side {
    Red,
    Orange,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Red => Side::Orange,
            Side::Orange => Side::Red,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Side::Red => "red",
            Side::Orange => "orange",
        };
        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

/// One classified round: two pip counts plus the classifier's confidence.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub first: u8,
    pub second: u8,
    pub confidence: f64,
}

impl RoundResult {
    pub fn new(first: u8, second: u8, confidence: f64) -> Self {
        Self {
            first,
            second,
            confidence,
        }
    }

    pub fn total(&self) -> u8 {
        self.first.saturating_add(self.second)
    }

    pub fn is_double(&self) -> bool {
        self.first == self.second
    }

    /// Side the round pays out on, or None when the round is a draw.
    pub fn winning_side(&self) -> Option<Side> {
        if self.is_double() {
            return None;
        }
        if self.total() <= RED_TOTAL_CEILING {
            Some(Side::Red)
        } else {
            Some(Side::Orange)
        }
    }

    pub fn outcome_for(&self, selection: Side) -> Outcome {
        match self.winning_side() {
            None => Outcome::Draw,
            Some(winner) if winner == selection => Outcome::Win,
            Some(_) => Outcome::Loss,
        }
    }
}

impl fmt::Display for RoundResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}+{}={} ({:.0}%)",
            self.first,
            self.second,
            self.total(),
            self.confidence * 100.0
        )
    }
}

/// Visual classification of a settled sample into a typed round result.
///
/// Implementations may be deterministic decoders or probabilistic services;
/// the engine only consumes the typed result. None means the sample was not
/// recognized as a finished round.
pub trait ResultClassifier: Send {
    fn classify(
        &mut self,
        sample: &ScreenSample,
    ) -> impl Future<Output = Option<RoundResult>> + Send;
}
