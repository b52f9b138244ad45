use crate::round::{
    Outcome,
    RoundResult,
    Side,
};
use serde::Serialize;
use std::fmt;
use tracing::{
    debug,
    info,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum InstanceId {
    A,
    B,
}

impl InstanceId {
    pub fn other(self) -> Self {
        match self {
            InstanceId::A => InstanceId::B,
            InstanceId::B => InstanceId::A,
        }
    }

    fn index(self) -> usize {
        match self {
            InstanceId::A => 0,
            InstanceId::B => 1,
        }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstanceId::A => "A",
            InstanceId::B => "B",
        };
        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum TurnKind {
    Active,
    Passive,
}

/// What the engine should do for its next round.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TurnPlan {
    Wager { side: Side, stake: u64 },
    Observe,
}

/// Result of applying one settled round to the strategy.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Settlement {
    /// false when the result was the discarded leftover from before the
    /// session started; the engine keeps its plan and re-detects.
    pub counted: bool,
    /// Present when this settlement resolved the in-flight turn.
    pub resolved: Option<ResolvedTurn>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResolvedTurn {
    pub turn: u64,
    pub kind: TurnKind,
    pub outcome: Option<Outcome>,
    pub stake: u64,
    pub side_switch: Option<(Side, Side)>,
}

impl Settlement {
    fn observation() -> Self {
        Settlement {
            counted: true,
            resolved: None,
        }
    }

    fn discarded() -> Self {
        Settlement {
            counted: false,
            resolved: None,
        }
    }
}

/// Baseline the strategies start from; validated by the session config.
#[derive(Copy, Clone, Debug)]
pub struct StrategyParams {
    pub base_stake: u64,
    pub stake_cap: u64,
    pub switch_after_losses: u32,
    pub start_side: Side,
}

/// Shared progression core: base on a win, capped doubling otherwise.
/// A draw counts as a loss. The cap is a ceiling, never an error.
pub fn progress_stake(outcome: Outcome, current: u64, base: u64, cap: u64) -> u64 {
    match outcome {
        Outcome::Win => base,
        Outcome::Loss | Outcome::Draw => current.saturating_mul(2).min(cap),
    }
}

/// Pure state transition from (previous state, round outcome) to
/// (next state, next action). Implementations own all betting state;
/// the engine only relays plans and settlements.
pub trait StakeStrategy: Send {
    /// Plan the next turn for the given instance. Idempotent while a
    /// planned turn is unresolved.
    fn plan(&mut self, instance: InstanceId) -> TurnPlan;

    /// Apply one settled round observed on the given instance.
    fn settle(&mut self, instance: InstanceId, result: &RoundResult) -> Settlement;

    fn snapshot(&self) -> StrategySnapshot;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum StrategySnapshot {
    Single(BettingState),
    Dual(DualState),
}

// ---------------------------------------------------------------------------
// single-instance variant
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BettingState {
    pub side: Side,
    pub stake: u64,
    pub streak: u32,
    pub games: u64,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub net_units: i64,
}

/// Martingale with side switch: double on loss up to the cap, reset to the
/// base on a win, flip to the other side after a configured loss streak.
pub struct Martingale {
    params: StrategyParams,
    state: BettingState,
    pending: Option<(Side, u64)>,
}

impl Martingale {
    pub fn new(params: StrategyParams) -> Self {
        Self {
            params,
            state: BettingState {
                side: params.start_side,
                stake: params.base_stake,
                streak: 0,
                games: 0,
                wins: 0,
                losses: 0,
                draws: 0,
                net_units: 0,
            },
            pending: None,
        }
    }
}

impl StakeStrategy for Martingale {
    fn plan(&mut self, _instance: InstanceId) -> TurnPlan {
        let (side, stake) = *self
            .pending
            .get_or_insert((self.state.side, self.state.stake));
        TurnPlan::Wager { side, stake }
    }

    fn settle(&mut self, _instance: InstanceId, result: &RoundResult) -> Settlement {
        let Some((side, stake)) = self.pending.take() else {
            return Settlement::observation();
        };
        let outcome = result.outcome_for(side);
        let state = &mut self.state;
        state.games += 1;
        match outcome {
            Outcome::Win => {
                state.wins += 1;
                state.net_units += stake as i64;
            }
            Outcome::Loss => {
                state.losses += 1;
                state.net_units -= stake as i64;
            }
            Outcome::Draw => {
                state.draws += 1;
                state.net_units -= stake as i64;
            }
        }
        state.stake = progress_stake(
            outcome,
            state.stake,
            self.params.base_stake,
            self.params.stake_cap,
        );
        let mut side_switch = None;
        match outcome {
            Outcome::Win => state.streak = 0,
            Outcome::Loss | Outcome::Draw => {
                state.streak += 1;
                if state.streak >= self.params.switch_after_losses {
                    let from = state.side;
                    state.side = from.other();
                    state.streak = 0;
                    info!(%from, to = %state.side, "switching side after loss streak");
                    side_switch = Some((from, state.side));
                }
            }
        }
        Settlement {
            counted: true,
            resolved: Some(ResolvedTurn {
                turn: state.games,
                kind: TurnKind::Active,
                outcome: Some(outcome),
                stake,
                side_switch,
            }),
        }
    }

    fn snapshot(&self) -> StrategySnapshot {
        StrategySnapshot::Single(self.state.clone())
    }
}

// ---------------------------------------------------------------------------
// dual-instance alternating variant
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InstanceLedger {
    pub rounds: u64,
    pub consecutive_losses: u32,
    pub net_units: i64,
    pub last_result: Option<RoundResult>,
    #[serde(skip)]
    seen_first: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DualState {
    pub side: Side,
    pub previous_side: Side,
    pub stake: u64,
    pub streak: u32,
    pub target: InstanceId,
    pub turn_kind: TurnKind,
    pub turn_index: u64,
    pub a: InstanceLedger,
    pub b: InstanceLedger,
}

#[derive(Copy, Clone, Debug)]
struct PendingTurn {
    instance: InstanceId,
    kind: TurnKind,
    wager: Option<(Side, u64)>,
}

/// Two game instances sharing one progression. Real wagers ping-pong
/// between the instances; with `observe_alternate` every other turn is
/// pure observation. The side toggles between exactly two sides through a
/// remembered previous side, and the first result seen on each instance is
/// discarded as leftover state from before the session began.
pub struct DualAlternating {
    params: StrategyParams,
    observe_alternate: bool,
    side: Side,
    previous_side: Side,
    stake: u64,
    streak: u32,
    target: InstanceId,
    turn_kind: TurnKind,
    turn_index: u64,
    ledgers: [InstanceLedger; 2],
    pending: Option<PendingTurn>,
}

impl DualAlternating {
    pub fn new(params: StrategyParams, observe_alternate: bool) -> Self {
        Self {
            params,
            observe_alternate,
            side: params.start_side,
            previous_side: params.start_side.other(),
            stake: params.base_stake,
            streak: 0,
            target: InstanceId::A,
            turn_kind: TurnKind::Active,
            turn_index: 0,
            ledgers: [InstanceLedger::default(), InstanceLedger::default()],
            pending: None,
        }
    }

    fn switch_side(&mut self) -> (Side, Side) {
        let from = self.side;
        self.side = self.previous_side;
        self.previous_side = from;
        self.streak = 0;
        info!(%from, to = %self.side, "switching side after loss streak");
        (from, self.side)
    }
}

impl StakeStrategy for DualAlternating {
    fn plan(&mut self, instance: InstanceId) -> TurnPlan {
        if let Some(pending) = &self.pending {
            if pending.instance == instance {
                return match pending.wager {
                    Some((side, stake)) => TurnPlan::Wager { side, stake },
                    None => TurnPlan::Observe,
                };
            }
        }
        if instance != self.target {
            return TurnPlan::Observe;
        }
        let wager = match self.turn_kind {
            TurnKind::Active => Some((self.side, self.stake)),
            TurnKind::Passive => None,
        };
        self.pending = Some(PendingTurn {
            instance,
            kind: self.turn_kind,
            wager,
        });
        match wager {
            Some((side, stake)) => TurnPlan::Wager { side, stake },
            None => TurnPlan::Observe,
        }
    }

    fn settle(&mut self, instance: InstanceId, result: &RoundResult) -> Settlement {
        let ledger = &mut self.ledgers[instance.index()];
        if !ledger.seen_first {
            ledger.seen_first = true;
            debug!(%instance, result = %result, "discarding leftover pre-session result");
            return Settlement::discarded();
        }
        ledger.rounds += 1;
        ledger.last_result = Some(*result);

        let pending = match self.pending {
            Some(pending) if pending.instance == instance => pending,
            _ => return Settlement::observation(),
        };
        self.pending = None;

        let turn = self.turn_index;
        let mut outcome = None;
        let mut stake = 0;
        let mut side_switch = None;
        if let Some((side, amount)) = pending.wager {
            let resolved = result.outcome_for(side);
            outcome = Some(resolved);
            stake = amount;
            let ledger = &mut self.ledgers[instance.index()];
            match resolved {
                Outcome::Win => {
                    ledger.consecutive_losses = 0;
                    ledger.net_units += amount as i64;
                }
                Outcome::Loss | Outcome::Draw => {
                    ledger.consecutive_losses += 1;
                    ledger.net_units -= amount as i64;
                }
            }
            self.stake = progress_stake(
                resolved,
                self.stake,
                self.params.base_stake,
                self.params.stake_cap,
            );
            match resolved {
                Outcome::Win => self.streak = 0,
                Outcome::Loss | Outcome::Draw => {
                    self.streak += 1;
                    if self.streak >= self.params.switch_after_losses {
                        side_switch = Some(self.switch_side());
                    }
                }
            }
        }

        // Advance the shared turn ledger: real wagers ping-pong between
        // instances, so the target flips after active turns only.
        self.turn_index += 1;
        if pending.kind == TurnKind::Active {
            self.target = self.target.other();
        }
        if self.observe_alternate {
            self.turn_kind = match self.turn_kind {
                TurnKind::Active => TurnKind::Passive,
                TurnKind::Passive => TurnKind::Active,
            };
        }

        Settlement {
            counted: true,
            resolved: Some(ResolvedTurn {
                turn,
                kind: pending.kind,
                outcome,
                stake,
                side_switch,
            }),
        }
    }

    fn snapshot(&self) -> StrategySnapshot {
        StrategySnapshot::Dual(DualState {
            side: self.side,
            previous_side: self.previous_side,
            stake: self.stake,
            streak: self.streak,
            target: self.target,
            turn_kind: self.turn_kind,
            turn_index: self.turn_index,
            a: self.ledgers[0].clone(),
            b: self.ledgers[1].clone(),
        })
    }
}
