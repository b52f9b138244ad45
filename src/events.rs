use crate::{
    round::{
        Outcome,
        RoundResult,
        Side,
    },
    strategy::InstanceId,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;
use std::fmt;

/// How a session ended.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum EndStatus {
    Stopped,
    FailureLimitReached { consecutive_failures: u32 },
}

impl fmt::Display for EndStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndStatus::Stopped => write!(f, "stopped"),
            EndStatus::FailureLimitReached {
                consecutive_failures,
            } => {
                write!(f, "failure limit reached ({consecutive_failures} consecutive)")
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum SessionMode {
    Single,
    Dual,
}

/// Observable stream of round/wager/state-change occurrences, one entry per
/// thing that happened, stamped when it happened.
#[derive(Clone, Debug, Serialize)]
pub enum SessionEvent {
    Started {
        mode: SessionMode,
        at: DateTime<Utc>,
    },
    WagerPlaced {
        instance: InstanceId,
        side: Side,
        stake: u64,
        achieved: u64,
        at: DateTime<Utc>,
    },
    /// The requested stake was not exactly composable from the
    /// denomination set; `achieved` is what actually went on the table.
    InexactStake {
        instance: InstanceId,
        requested: u64,
        achieved: u64,
        at: DateTime<Utc>,
    },
    RoundSettled {
        instance: InstanceId,
        result: RoundResult,
        outcome: Option<Outcome>,
        turn: Option<u64>,
        at: DateTime<Utc>,
    },
    /// First reading after session start, thrown away as leftover state.
    ResultDiscarded {
        instance: InstanceId,
        result: RoundResult,
        at: DateTime<Utc>,
    },
    RoundFailed {
        instance: InstanceId,
        reason: String,
        consecutive: u32,
        at: DateTime<Utc>,
    },
    SideSwitched {
        from: Side,
        to: Side,
        at: DateTime<Utc>,
    },
    Paused {
        at: DateTime<Utc>,
    },
    Resumed {
        at: DateTime<Utc>,
    },
    Ended {
        instance: InstanceId,
        status: EndStatus,
        at: DateTime<Utc>,
    },
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}
