use crate::round::Side;
use serde::{
    Deserialize,
    Serialize,
};

pub const DEFAULT_DENOMINATIONS: [u64; 5] = [2500, 500, 100, 50, 10];

/// One atomic UI action the click executor can deliver.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TapAction {
    SelectSide(Side),
    SelectChip(u64),
    PressMultiplier,
    ConfirmBet,
}

/// A target stake expressed as concrete chip selections.
///
/// `picks` holds `(denomination, repeat)` pairs in the order they should be
/// tapped. When the target cannot be composed exactly from the denomination
/// set, the fallback is the smallest chip doubled with the multiplier button
/// until the target is reached; `exact` is false in that case and the caller
/// must surface the difference rather than clamp silently.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Decomposition {
    pub picks: Vec<(u64, u32)>,
    pub multiplier_presses: u32,
    pub achieved: u64,
    pub exact: bool,
}

impl Decomposition {
    /// Chip and multiplier taps in dispatch order.
    pub fn taps(&self) -> Vec<TapAction> {
        let mut taps = Vec::new();
        for (denomination, repeat) in &self.picks {
            for _ in 0..*repeat {
                taps.push(TapAction::SelectChip(*denomination));
            }
        }
        for _ in 0..self.multiplier_presses {
            taps.push(TapAction::PressMultiplier);
        }
        taps
    }

    /// The amount the taps add up to; round-trip check for `decompose`.
    pub fn recomposed(&self) -> u64 {
        let selected: u64 = self
            .picks
            .iter()
            .map(|(denomination, repeat)| denomination * u64::from(*repeat))
            .sum();
        selected << self.multiplier_presses
    }
}

/// Greedy decomposition of `target` over a descending denomination set.
///
/// Denominations are consumed largest-first, each repeated as often as it
/// fits. A residual that no denomination covers switches the whole
/// composition to the fallback: one smallest chip doubled until the target
/// is reached or passed.
pub fn decompose(target: u64, denominations: &[u64]) -> Decomposition {
    let mut ordered: Vec<u64> =
        denominations.iter().copied().filter(|d| *d > 0).collect();
    ordered.sort_unstable_by(|a, b| b.cmp(a));
    ordered.dedup();

    let Some(&smallest) = ordered.last() else {
        return Decomposition {
            picks: Vec::new(),
            multiplier_presses: 0,
            achieved: 0,
            exact: target == 0,
        };
    };
    if target == 0 {
        return Decomposition {
            picks: Vec::new(),
            multiplier_presses: 0,
            achieved: 0,
            exact: true,
        };
    }

    let mut picks = Vec::new();
    let mut remaining = target;
    for denomination in &ordered {
        let repeat = remaining / denomination;
        if repeat > 0 {
            picks.push((*denomination, repeat as u32));
            remaining -= denomination * repeat;
        }
    }

    if remaining == 0 {
        return Decomposition {
            picks,
            multiplier_presses: 0,
            achieved: target,
            exact: true,
        };
    }

    // Residual not coverable: double the smallest chip up to the target.
    let mut achieved = smallest;
    let mut presses = 0u32;
    while achieved < target {
        achieved = achieved.saturating_mul(2);
        presses += 1;
    }
    Decomposition {
        picks: vec![(smallest, 1)],
        multiplier_presses: presses,
        achieved,
        exact: achieved == target,
    }
}
