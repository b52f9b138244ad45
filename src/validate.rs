use crate::round::{
    MAX_PIP,
    MAX_TOTAL,
    MIN_PIP,
    MIN_TOTAL,
    RoundResult,
};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::warn;

/// Total jump from the previous round considered worth flagging.
const ABRUPT_JUMP: u8 = 8;
/// Identical results in a row considered worth flagging.
const REPEAT_RUN: usize = 4;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum RejectReason {
    #[error("pip value {pip} outside {MIN_PIP}..={MAX_PIP}")]
    PipOutOfRange { pip: u8 },
    #[error("confidence {confidence:.2} below floor {floor:.2}")]
    LowConfidence { confidence: f64, floor: f64 },
    #[error("total {total} outside {MIN_TOTAL}..={MAX_TOTAL}")]
    TotalOutOfRange { total: u8 },
}

/// Rejects structurally impossible results and flags statistical oddities.
///
/// Hard checks run in order: pip range, confidence floor, total range.
/// Soft checks (abrupt total jump, long identical runs) only log — repeated
/// and abrupt results legitimately occur, so they never reject. Accepted
/// results land in a bounded history, oldest evicted first.
pub struct ResultValidator {
    floor: f64,
    capacity: usize,
    history: VecDeque<RoundResult>,
}

impl ResultValidator {
    pub fn new(floor: f64, capacity: usize) -> Self {
        Self {
            floor,
            capacity,
            history: VecDeque::with_capacity(capacity),
        }
    }

    pub fn history(&self) -> &VecDeque<RoundResult> {
        &self.history
    }

    pub fn validate(&mut self, result: &RoundResult) -> Result<(), RejectReason> {
        for pip in [result.first, result.second] {
            if !(MIN_PIP..=MAX_PIP).contains(&pip) {
                return Err(RejectReason::PipOutOfRange { pip });
            }
        }
        if result.confidence < self.floor {
            return Err(RejectReason::LowConfidence {
                confidence: result.confidence,
                floor: self.floor,
            });
        }
        let total = result.total();
        if !(MIN_TOTAL..=MAX_TOTAL).contains(&total) {
            return Err(RejectReason::TotalOutOfRange { total });
        }

        self.flag_anomalies(result);

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(*result);
        Ok(())
    }

    fn flag_anomalies(&self, result: &RoundResult) {
        if let Some(last) = self.history.back() {
            let jump = result.total().abs_diff(last.total());
            if jump >= ABRUPT_JUMP {
                warn!(
                    previous = %last,
                    current = %result,
                    jump,
                    "abrupt total jump (accepted)"
                );
            }
        }
        let run = self
            .history
            .iter()
            .rev()
            .take_while(|r| r.first == result.first && r.second == result.second)
            .count();
        if run + 1 >= REPEAT_RUN {
            warn!(result = %result, run = run + 1, "identical result repeating (accepted)");
        }
    }
}
