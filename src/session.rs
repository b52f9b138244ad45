use crate::{
    config::{
        ConfigError,
        EngineConfig,
    },
    engine::Engine,
    events::{
        EndStatus,
        SessionEvent,
        SessionMode,
        now,
    },
    round::ResultClassifier,
    screen::{
        ScreenSample,
        ScreenSampler,
        StableVeto,
        TapDispatcher,
    },
    strategy::{
        DualAlternating,
        InstanceId,
        Martingale,
        StakeStrategy,
        StrategySnapshot,
    },
};
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};
use tokio::{
    sync::{
        broadcast,
        watch,
    },
    task::JoinHandle,
};
use tracing::error;

const EVENT_BUFFER: usize = 256;

/// Explicit session control value, read through a single watch channel at
/// every suspension point instead of ad-hoc shared flags.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Control {
    Run,
    Pause,
    Stop,
}

pub(crate) type SharedStrategy = Arc<Mutex<Box<dyn StakeStrategy>>>;

pub(crate) fn lock_strategy(
    strategy: &SharedStrategy,
) -> MutexGuard<'_, Box<dyn StakeStrategy>> {
    strategy.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The three consumed seams for one game instance, bundled for wiring.
pub struct TablePorts<S, C, D> {
    pub sampler: S,
    pub classifier: C,
    pub dispatcher: D,
    pub(crate) stable_veto: Option<StableVeto>,
}

impl<S, C, D> TablePorts<S, C, D>
where
    S: ScreenSampler,
    C: ResultClassifier,
    D: TapDispatcher,
{
    pub fn new(sampler: S, classifier: C, dispatcher: D) -> Self {
        Self {
            sampler,
            classifier,
            dispatcher,
            stable_veto: None,
        }
    }

    pub fn with_stable_veto(
        mut self,
        veto: impl Fn(&ScreenSample) -> bool + Send + 'static,
    ) -> Self {
        self.stable_veto = Some(Box::new(veto));
        self
    }
}

/// Handle to a running session: control, state snapshots, and the event
/// stream. Dropping the handle does not stop the engines; call `stop` and
/// `join` for a clean end.
pub struct Session {
    mode: SessionMode,
    control: Arc<watch::Sender<Control>>,
    events: broadcast::Sender<SessionEvent>,
    initial_events: Option<broadcast::Receiver<SessionEvent>>,
    strategy: SharedStrategy,
    tasks: Vec<JoinHandle<EndStatus>>,
}

/// Start a single-instance Martingale session.
pub fn start_single<S, C, D>(
    config: EngineConfig,
    ports: TablePorts<S, C, D>,
) -> Result<Session, ConfigError>
where
    S: ScreenSampler + 'static,
    C: ResultClassifier + 'static,
    D: TapDispatcher + 'static,
{
    config.validate()?;
    let strategy: SharedStrategy =
        Arc::new(Mutex::new(Box::new(Martingale::new(config.strategy_params()))));
    let (control, events, initial_events) = channels();
    let _ = events.send(SessionEvent::Started {
        mode: SessionMode::Single,
        at: now(),
    });
    let engine = Engine::new(
        InstanceId::A,
        config.region,
        config.clone(),
        ports,
        strategy.clone(),
        control.clone(),
        events.clone(),
    );
    let tasks = vec![tokio::spawn(engine.run())];
    Ok(Session::assemble(
        SessionMode::Single,
        control,
        events,
        initial_events,
        strategy,
        tasks,
    ))
}

/// Start a dual-instance alternating session; instance A watches
/// `config.region`, instance B watches `config.region_b`.
pub fn start_dual<S1, C1, D1, S2, C2, D2>(
    config: EngineConfig,
    ports_a: TablePorts<S1, C1, D1>,
    ports_b: TablePorts<S2, C2, D2>,
) -> Result<Session, ConfigError>
where
    S1: ScreenSampler + 'static,
    C1: ResultClassifier + 'static,
    D1: TapDispatcher + 'static,
    S2: ScreenSampler + 'static,
    C2: ResultClassifier + 'static,
    D2: TapDispatcher + 'static,
{
    config.validate()?;
    let region_b = config.region_b.ok_or(ConfigError::MissingSecondRegion)?;
    let strategy: SharedStrategy = Arc::new(Mutex::new(Box::new(DualAlternating::new(
        config.strategy_params(),
        config.observe_alternate_turns,
    ))));
    let (control, events, initial_events) = channels();
    let _ = events.send(SessionEvent::Started {
        mode: SessionMode::Dual,
        at: now(),
    });
    let engine_a = Engine::new(
        InstanceId::A,
        config.region,
        config.clone(),
        ports_a,
        strategy.clone(),
        control.clone(),
        events.clone(),
    );
    let engine_b = Engine::new(
        InstanceId::B,
        region_b,
        config.clone(),
        ports_b,
        strategy.clone(),
        control.clone(),
        events.clone(),
    );
    let tasks = vec![tokio::spawn(engine_a.run()), tokio::spawn(engine_b.run())];
    Ok(Session::assemble(
        SessionMode::Dual,
        control,
        events,
        initial_events,
        strategy,
        tasks,
    ))
}

/// The receiver is created before any engine task is spawned so nothing
/// emitted during startup is lost.
fn channels() -> (
    Arc<watch::Sender<Control>>,
    broadcast::Sender<SessionEvent>,
    broadcast::Receiver<SessionEvent>,
) {
    let (control, _) = watch::channel(Control::Run);
    let (events, initial_events) = broadcast::channel(EVENT_BUFFER);
    (Arc::new(control), events, initial_events)
}

impl Session {
    fn assemble(
        mode: SessionMode,
        control: Arc<watch::Sender<Control>>,
        events: broadcast::Sender<SessionEvent>,
        initial_events: broadcast::Receiver<SessionEvent>,
        strategy: SharedStrategy,
        tasks: Vec<JoinHandle<EndStatus>>,
    ) -> Self {
        Session {
            mode,
            control,
            events,
            initial_events: Some(initial_events),
            strategy,
            tasks,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn pause(&self) {
        let changed = self.control.send_if_modified(|control| {
            if *control == Control::Run {
                *control = Control::Pause;
                true
            } else {
                false
            }
        });
        if changed {
            let _ = self.events.send(SessionEvent::Paused { at: now() });
        }
    }

    pub fn resume(&self) {
        let changed = self.control.send_if_modified(|control| {
            if *control == Control::Pause {
                *control = Control::Run;
                true
            } else {
                false
            }
        });
        if changed {
            let _ = self.events.send(SessionEvent::Resumed { at: now() });
        }
    }

    pub fn stop(&self) {
        self.control.send_if_modified(|control| {
            if *control == Control::Stop {
                false
            } else {
                *control = Control::Stop;
                true
            }
        });
    }

    /// Event stream receiver. The first call returns the receiver that has
    /// been live since the session started.
    pub fn subscribe(&mut self) -> broadcast::Receiver<SessionEvent> {
        self.initial_events
            .take()
            .unwrap_or_else(|| self.events.subscribe())
    }

    /// Point-in-time snapshot of the strategy state.
    pub fn current_state(&self) -> StrategySnapshot {
        lock_strategy(&self.strategy).snapshot()
    }

    /// Wait for every engine loop to finish; a failure status from any
    /// instance wins over a plain stop.
    pub async fn join(self) -> EndStatus {
        let mut status = EndStatus::Stopped;
        for task in self.tasks {
            match task.await {
                Ok(end @ EndStatus::FailureLimitReached { .. }) => status = end,
                Ok(EndStatus::Stopped) => {}
                Err(join_error) => {
                    error!(%join_error, "engine task did not finish cleanly");
                }
            }
        }
        status
    }
}
