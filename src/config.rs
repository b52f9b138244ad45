use crate::{
    round::Side,
    screen::Region,
    stake::{
        self,
        DEFAULT_DENOMINATIONS,
    },
    strategy::StrategyParams,
};
use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("base stake must be greater than zero")]
    ZeroBaseStake,
    #[error("stake cap {cap} is below base stake {base}")]
    CapBelowBase { base: u64, cap: u64 },
    #[error("switch-after-losses threshold must be greater than zero")]
    ZeroSwitchThreshold,
    #[error("denomination set is empty")]
    NoDenominations,
    #[error("base stake {base} is not composable from denominations {denominations:?}")]
    UnrepresentableBase {
        base: u64,
        denominations: Vec<u64>,
    },
    #[error("confidence floor {floor} must be within 0.0..=1.0")]
    ConfidenceFloorOutOfRange { floor: f64 },
    #[error("history capacity must be greater than zero")]
    ZeroHistoryCapacity,
    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },
    #[error("stability window must be shorter than the detection timeout")]
    WindowExceedsTimeout,
    #[error("failure limit must be greater than zero")]
    ZeroFailureLimit,
    #[error("dual mode requires a second capture region")]
    MissingSecondRegion,
}

/// Session configuration, read once at start and immutable afterwards.
/// All durations are milliseconds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    pub base_stake: u64,
    pub stake_cap: u64,
    pub switch_after_losses: u32,
    pub start_side: Side,
    pub denominations: Vec<u64>,
    pub min_confidence: f64,
    pub history_capacity: usize,
    pub stability_window_ms: u64,
    pub detection_timeout_ms: u64,
    pub idle_poll_ms: u64,
    pub burst_poll_ms: u64,
    pub retry_backoff_ms: u64,
    pub max_consecutive_failures: u32,
    pub observe_alternate_turns: bool,
    pub region: Region,
    pub region_b: Option<Region>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_stake: 20,
            stake_cap: 30_000,
            switch_after_losses: 2,
            start_side: Side::Red,
            denominations: DEFAULT_DENOMINATIONS.to_vec(),
            min_confidence: 0.6,
            history_capacity: 32,
            stability_window_ms: 400,
            detection_timeout_ms: 8_000,
            idle_poll_ms: 120,
            burst_poll_ms: 40,
            retry_backoff_ms: 500,
            max_consecutive_failures: 3,
            observe_alternate_turns: false,
            region: Region {
                x: 0,
                y: 0,
                width: 320,
                height: 200,
            },
            region_b: None,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; `~` in the path is expanded.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let expanded = shellexpand::tilde(path).into_owned();
        let bytes = fs::read(&expanded).map_err(|source| ConfigError::Io {
            path: expanded.clone(),
            source,
        })?;
        let config: EngineConfig =
            serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
                path: expanded,
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks; a session never starts on a config that fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_stake == 0 {
            return Err(ConfigError::ZeroBaseStake);
        }
        if self.stake_cap < self.base_stake {
            return Err(ConfigError::CapBelowBase {
                base: self.base_stake,
                cap: self.stake_cap,
            });
        }
        if self.switch_after_losses == 0 {
            return Err(ConfigError::ZeroSwitchThreshold);
        }
        let denominations = self.normalized_denominations();
        if denominations.is_empty() {
            return Err(ConfigError::NoDenominations);
        }
        if !stake::decompose(self.base_stake, &denominations).exact {
            return Err(ConfigError::UnrepresentableBase {
                base: self.base_stake,
                denominations,
            });
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::ConfidenceFloorOutOfRange {
                floor: self.min_confidence,
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        for (name, value) in [
            ("stability window", self.stability_window_ms),
            ("detection timeout", self.detection_timeout_ms),
            ("idle poll interval", self.idle_poll_ms),
            ("burst poll interval", self.burst_poll_ms),
            ("retry backoff", self.retry_backoff_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration { name });
            }
        }
        if self.stability_window_ms >= self.detection_timeout_ms {
            return Err(ConfigError::WindowExceedsTimeout);
        }
        if self.max_consecutive_failures == 0 {
            return Err(ConfigError::ZeroFailureLimit);
        }
        Ok(())
    }

    /// Denominations as the decomposer consumes them: descending, deduped,
    /// zeroes dropped.
    pub fn normalized_denominations(&self) -> Vec<u64> {
        self.denominations
            .iter()
            .copied()
            .filter(|d| *d > 0)
            .sorted()
            .rev()
            .dedup()
            .collect()
    }

    pub fn strategy_params(&self) -> StrategyParams {
        StrategyParams {
            base_stake: self.base_stake,
            stake_cap: self.stake_cap,
            switch_after_losses: self.switch_after_losses,
            start_side: self.start_side,
        }
    }

    pub fn stability_window(&self) -> Duration {
        Duration::from_millis(self.stability_window_ms)
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::from_millis(self.detection_timeout_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn burst_poll(&self) -> Duration {
        Duration::from_millis(self.burst_poll_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
