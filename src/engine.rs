use crate::{
    config::EngineConfig,
    detect::{
        DetectionPhase,
        StabilityDetector,
    },
    events::{
        EndStatus,
        SessionEvent,
        now,
    },
    fingerprint::Fingerprint,
    round::{
        ResultClassifier,
        Side,
    },
    screen::{
        Region,
        ScreenSample,
        ScreenSampler,
        StableVeto,
        TapDispatcher,
    },
    session::{
        Control,
        SharedStrategy,
        TablePorts,
        lock_strategy,
    },
    stake::{
        self,
        TapAction,
    },
    strategy::{
        InstanceId,
        TurnPlan,
    },
    validate::ResultValidator,
};
use std::{
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};
use tokio::{
    sync::{
        broadcast,
        watch,
    },
    time::sleep,
};
use tracing::{
    debug,
    info,
    warn,
};

/// One session's control loop for one game instance: plan a wager,
/// dispatch it, wait for the screen to settle, classify, validate, settle
/// the strategy, repeat. Pause and stop are observed at every suspension
/// point.
pub(crate) struct Engine<S, C, D> {
    instance: InstanceId,
    region: Region,
    config: EngineConfig,
    denominations: Vec<u64>,
    sampler: S,
    classifier: C,
    dispatcher: D,
    veto: Option<StableVeto>,
    detector: StabilityDetector,
    validator: ResultValidator,
    strategy: SharedStrategy,
    control_tx: Arc<watch::Sender<Control>>,
    control: watch::Receiver<Control>,
    events: broadcast::Sender<SessionEvent>,
    failures: u32,
    wager_pending: bool,
}

enum RoundStep {
    Continue,
    End(EndStatus),
}

enum CycleEnd {
    Stable(ScreenSample),
    TimedOut,
    Stopped,
}

impl<S, C, D> Engine<S, C, D>
where
    S: ScreenSampler,
    C: ResultClassifier,
    D: TapDispatcher,
{
    pub(crate) fn new(
        instance: InstanceId,
        region: Region,
        config: EngineConfig,
        ports: TablePorts<S, C, D>,
        strategy: SharedStrategy,
        control_tx: Arc<watch::Sender<Control>>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let control = control_tx.subscribe();
        Self {
            instance,
            region,
            denominations: config.normalized_denominations(),
            detector: StabilityDetector::new(config.stability_window()),
            validator: ResultValidator::new(config.min_confidence, config.history_capacity),
            config,
            sampler: ports.sampler,
            classifier: ports.classifier,
            dispatcher: ports.dispatcher,
            veto: ports.stable_veto,
            strategy,
            control_tx,
            control,
            events,
            failures: 0,
            wager_pending: false,
        }
    }

    pub(crate) async fn run(mut self) -> EndStatus {
        info!(instance = %self.instance, "engine loop started");
        let status = loop {
            match self.round().await {
                RoundStep::Continue => {}
                RoundStep::End(status) => break status,
            }
        };
        info!(instance = %self.instance, %status, "engine loop ended");
        if matches!(status, EndStatus::FailureLimitReached { .. }) {
            // one exhausted instance ends the whole session; the sibling
            // loop must not keep wagering
            let _ = self.control_tx.send(Control::Stop);
        }
        self.emit(SessionEvent::Ended {
            instance: self.instance,
            status: status.clone(),
            at: now(),
        });
        status
    }

    async fn round(&mut self) -> RoundStep {
        if self.gate().await.is_err() {
            return RoundStep::End(EndStatus::Stopped);
        }

        if !self.wager_pending {
            let plan = lock_strategy(&self.strategy).plan(self.instance);
            if let TurnPlan::Wager { side, stake } = plan {
                match self.place_wager(side, stake).await {
                    Ok(true) => self.wager_pending = true,
                    Ok(false) => return RoundStep::End(EndStatus::Stopped),
                    Err(error) => return self.fail(error.to_string()).await,
                }
            }
        }

        match self.detection_cycle().await {
            CycleEnd::Stopped => RoundStep::End(EndStatus::Stopped),
            CycleEnd::TimedOut => {
                self.fail(String::from("no stable result before the detection timeout"))
                    .await
            }
            CycleEnd::Stable(sample) => {
                let Some(result) = self.classifier.classify(&sample).await else {
                    return self
                        .fail(String::from("classifier did not recognize the sample"))
                        .await;
                };
                if let Err(reason) = self.validator.validate(&result) {
                    return self.fail(reason.to_string()).await;
                }

                let settlement = lock_strategy(&self.strategy).settle(self.instance, &result);
                if !settlement.counted {
                    self.emit(SessionEvent::ResultDiscarded {
                        instance: self.instance,
                        result,
                        at: now(),
                    });
                    return RoundStep::Continue;
                }
                self.failures = 0;
                match settlement.resolved {
                    Some(turn) => {
                        self.wager_pending = false;
                        if let Some((from, to)) = turn.side_switch {
                            self.emit(SessionEvent::SideSwitched { from, to, at: now() });
                        }
                        info!(
                            instance = %self.instance,
                            result = %result,
                            outcome = ?turn.outcome,
                            turn = turn.turn,
                            "turn settled"
                        );
                        self.emit(SessionEvent::RoundSettled {
                            instance: self.instance,
                            result,
                            outcome: turn.outcome,
                            turn: Some(turn.turn),
                            at: now(),
                        });
                    }
                    None => {
                        debug!(instance = %self.instance, result = %result, "round observed");
                        self.emit(SessionEvent::RoundSettled {
                            instance: self.instance,
                            result,
                            outcome: None,
                            turn: None,
                            at: now(),
                        });
                    }
                }
                RoundStep::Continue
            }
        }
    }

    /// Ok(true): fully dispatched. Ok(false): stop arrived mid-sequence —
    /// the confirm tap is last, so an aborted sequence places no wager.
    async fn place_wager(
        &mut self,
        side: Side,
        stake: u64,
    ) -> Result<bool, crate::screen::DispatchError> {
        let decomposition = stake::decompose(stake, &self.denominations);
        if !decomposition.exact {
            warn!(
                instance = %self.instance,
                requested = stake,
                achieved = decomposition.achieved,
                "stake not exactly composable from the denomination set"
            );
            self.emit(SessionEvent::InexactStake {
                instance: self.instance,
                requested: stake,
                achieved: decomposition.achieved,
                at: now(),
            });
        }
        let mut taps = vec![TapAction::SelectSide(side)];
        taps.extend(decomposition.taps());
        taps.push(TapAction::ConfirmBet);
        for tap in &taps {
            if self.gate().await.is_err() {
                return Ok(false);
            }
            self.dispatcher.dispatch(tap).await?;
        }
        debug!(
            instance = %self.instance,
            %side,
            stake,
            achieved = decomposition.achieved,
            "wager dispatched"
        );
        self.emit(SessionEvent::WagerPlaced {
            instance: self.instance,
            side,
            stake,
            achieved: decomposition.achieved,
            at: now(),
        });
        Ok(true)
    }

    /// One detection cycle: fresh baseline, then poll until the content
    /// settles or the deadline passes. Polling runs at the idle cadence
    /// until a change starts dwelling, then tightens to the burst cadence.
    async fn detection_cycle(&mut self) -> CycleEnd {
        self.detector.reset();
        let mut deadline = Instant::now() + self.config.detection_timeout();
        loop {
            match self.gate().await {
                Err(()) => return CycleEnd::Stopped,
                Ok(true) => {
                    // dwell timing is stale after a pause; start over
                    self.detector.reset();
                    deadline = Instant::now() + self.config.detection_timeout();
                }
                Ok(false) => {}
            }
            if Instant::now() >= deadline {
                self.detector.expire();
                return CycleEnd::TimedOut;
            }
            if let Some(sample) = self.sampler.sample(&self.region).await {
                let fingerprint = Fingerprint::of(&sample);
                if self.detector.observe(sample.taken_at, fingerprint)
                    == DetectionPhase::Stable
                {
                    let vetoed =
                        self.veto.as_ref().map(|veto| veto(&sample)).unwrap_or(false);
                    if vetoed {
                        debug!(
                            instance = %self.instance,
                            "stable reading vetoed, restarting cycle"
                        );
                        self.detector.reset();
                    } else {
                        return CycleEnd::Stable(sample);
                    }
                }
            }
            let cadence = if self.detector.phase() == DetectionPhase::Stabilizing {
                self.config.burst_poll()
            } else {
                self.config.idle_poll()
            };
            match self.pace(cadence).await {
                Err(()) => return CycleEnd::Stopped,
                Ok(true) => {
                    self.detector.reset();
                    deadline = Instant::now() + self.config.detection_timeout();
                }
                Ok(false) => {}
            }
        }
    }

    async fn fail(&mut self, reason: String) -> RoundStep {
        self.failures += 1;
        warn!(
            instance = %self.instance,
            consecutive = self.failures,
            %reason,
            "round failed"
        );
        self.emit(SessionEvent::RoundFailed {
            instance: self.instance,
            reason,
            consecutive: self.failures,
            at: now(),
        });
        if self.failures >= self.config.max_consecutive_failures {
            return RoundStep::End(EndStatus::FailureLimitReached {
                consecutive_failures: self.failures,
            });
        }
        if self.pace(self.config.retry_backoff()).await.is_err() {
            return RoundStep::End(EndStatus::Stopped);
        }
        RoundStep::Continue
    }

    /// Block while paused. Err on stop; Ok(true) when a pause was sat out.
    async fn gate(&mut self) -> Result<bool, ()> {
        let mut was_paused = false;
        loop {
            let current = *self.control.borrow_and_update();
            match current {
                Control::Stop => return Err(()),
                Control::Run => return Ok(was_paused),
                Control::Pause => {
                    was_paused = true;
                    if self.control.changed().await.is_err() {
                        return Err(());
                    }
                }
            }
        }
    }

    /// Sleep that wakes early for control changes, so pause and stop take
    /// effect promptly instead of only between rounds.
    async fn pace(&mut self, duration: Duration) -> Result<bool, ()> {
        let deadline = Instant::now() + duration;
        let mut was_paused = false;
        loop {
            was_paused |= self.gate().await?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(was_paused);
            }
            tokio::select! {
                _ = sleep(deadline - now) => return Ok(was_paused),
                changed = self.control.changed() => {
                    if changed.is_err() {
                        return Err(());
                    }
                }
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }
}
