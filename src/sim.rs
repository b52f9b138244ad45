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
    session::TablePorts,
    stake::TapAction,
};
use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};
use std::{
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::{
        Duration,
        Instant,
    },
};

const SETTLED_TAG: u8 = 0x5A;
const ROLLING_TAG: u8 = 0xA5;

/// Self-contained stand-in for a real table: implements all three consumed
/// seams over a seeded RNG so the engine runs end-to-end with no screen,
/// no classifier service, and no input injection. The table rolls on its
/// own schedule, renders "animation" frames while rolling, and settles on
/// a pip-encoded frame the bundled classifier decodes.
#[derive(Clone)]
pub struct SimulatedTable {
    shared: Arc<Mutex<TableState>>,
}

struct TableState {
    rng: StdRng,
    current: (u8, u8),
    next_roll: Instant,
    rolling_until: Option<Instant>,
    roll_every: Duration,
    roll_duration: Duration,
    drop_rate: f64,
    confidence: f64,
    noise_seq: u64,
    taps: Vec<TapAction>,
    rolls: u64,
}

impl SimulatedTable {
    pub fn new(seed: u64) -> Self {
        let shared = TableState {
            rng: StdRng::seed_from_u64(seed),
            current: (3, 4),
            next_roll: Instant::now() + Duration::from_millis(600),
            rolling_until: None,
            roll_every: Duration::from_millis(600),
            roll_duration: Duration::from_millis(250),
            drop_rate: 0.0,
            confidence: 0.95,
            noise_seq: 0,
            taps: Vec::new(),
            rolls: 0,
        };
        Self {
            shared: Arc::new(Mutex::new(shared)),
        }
    }

    pub fn with_timing(self, roll_every: Duration, roll_duration: Duration) -> Self {
        {
            let mut state = self.state();
            state.roll_every = roll_every;
            state.roll_duration = roll_duration;
            state.next_roll = Instant::now() + roll_every;
        }
        self
    }

    /// Fraction of sample calls that return no sample, simulating a
    /// transiently unavailable sampler.
    pub fn with_dropouts(self, rate: f64) -> Self {
        self.state().drop_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_confidence(self, confidence: f64) -> Self {
        self.state().confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn ports(&self) -> TablePorts<SimulatedTable, SimulatedTable, SimulatedTable> {
        TablePorts::new(self.clone(), self.clone(), self.clone())
    }

    pub fn taps(&self) -> Vec<TapAction> {
        self.state().taps.clone()
    }

    pub fn rolls(&self) -> u64 {
        self.state().rolls
    }

    pub fn current(&self) -> (u8, u8) {
        self.state().current
    }

    fn state(&self) -> MutexGuard<'_, TableState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TableState {
    /// Move the table's timeline up to `now`.
    fn advance(&mut self, now: Instant) {
        loop {
            match self.rolling_until {
                Some(until) if now >= until => {
                    self.current = (
                        self.rng.random_range(1..=6),
                        self.rng.random_range(1..=6),
                    );
                    self.rolling_until = None;
                    self.next_roll = until + self.roll_every;
                    self.rolls += 1;
                }
                Some(_) => break,
                None if now >= self.next_roll => {
                    self.rolling_until = Some(self.next_roll + self.roll_duration);
                }
                None => break,
            }
        }
    }

    fn frame(&mut self) -> Vec<u8> {
        if self.rolling_until.is_some() {
            self.noise_seq += 1;
            let mut pixels = vec![ROLLING_TAG];
            pixels.extend_from_slice(&self.noise_seq.to_le_bytes());
            pixels
        } else {
            vec![SETTLED_TAG, self.current.0, self.current.1]
        }
    }
}

impl ScreenSampler for SimulatedTable {
    async fn sample(&mut self, region: &Region) -> Option<ScreenSample> {
        let mut state = self.state();
        let now = Instant::now();
        state.advance(now);
        let rate = state.drop_rate;
        if rate > 0.0 && state.rng.random_bool(rate) {
            return None;
        }
        let pixels = state.frame();
        Some(ScreenSample {
            region: *region,
            taken_at: now,
            pixels,
        })
    }
}

impl ResultClassifier for SimulatedTable {
    async fn classify(&mut self, sample: &ScreenSample) -> Option<RoundResult> {
        let confidence = self.state().confidence;
        match sample.pixels.as_slice() {
            [SETTLED_TAG, first, second, ..] => {
                Some(RoundResult::new(*first, *second, confidence))
            }
            _ => None,
        }
    }
}

impl TapDispatcher for SimulatedTable {
    async fn dispatch(&mut self, action: &TapAction) -> Result<(), DispatchError> {
        self.state().taps.push(action.clone());
        Ok(())
    }
}
