#![allow(non_snake_case)]
use dicepilot::{
    round::{
        Outcome,
        RoundResult,
        Side,
    },
    strategy::{
        DualAlternating,
        InstanceId,
        Martingale,
        StakeStrategy,
        StrategyParams,
        StrategySnapshot,
        TurnKind,
        TurnPlan,
        progress_stake,
    },
};
use proptest::prelude::*;

const CONFIDENT: f64 = 0.95;

fn params() -> StrategyParams {
    StrategyParams {
        base_stake: 20,
        stake_cap: 30_000,
        switch_after_losses: 2,
        start_side: Side::Red,
    }
}

/// Red covers totals 2..=7, so 1+2 pays red and 3+6 pays orange.
fn pays_red() -> RoundResult {
    RoundResult::new(1, 2, CONFIDENT)
}

fn pays_orange() -> RoundResult {
    RoundResult::new(3, 6, CONFIDENT)
}

fn draw() -> RoundResult {
    RoundResult::new(4, 4, CONFIDENT)
}

fn planned_stake(plan: TurnPlan) -> u64 {
    match plan {
        TurnPlan::Wager { stake, .. } => stake,
        TurnPlan::Observe => panic!("expected a wager plan"),
    }
}

fn planned_side(plan: TurnPlan) -> Side {
    match plan {
        TurnPlan::Wager { side, .. } => side,
        TurnPlan::Observe => panic!("expected a wager plan"),
    }
}

// ---------------------------------------------------------------------------
// shared progression core
// ---------------------------------------------------------------------------

#[test]
fn progress_stake__win_returns_base() {
    assert_eq!(progress_stake(Outcome::Win, 640, 20, 30_000), 20);
}

#[test]
fn progress_stake__loss_doubles_up_to_cap() {
    assert_eq!(progress_stake(Outcome::Loss, 40, 20, 30_000), 80);
    assert_eq!(progress_stake(Outcome::Loss, 20_000, 20, 30_000), 30_000);
    assert_eq!(progress_stake(Outcome::Loss, 30_000, 20, 30_000), 30_000);
}

proptest! {
    #[test]
    fn progress_stake__loss_is_min_of_double_and_cap(
        stake in 1u64..1_000_000,
        cap in 1u64..1_000_000,
    ) {
        let next = progress_stake(Outcome::Loss, stake, 1, cap);
        prop_assert_eq!(next, (stake * 2).min(cap));
        // idempotently bounded: a further loss never exceeds the cap
        prop_assert!(progress_stake(Outcome::Loss, next, 1, cap) <= cap);
    }

    #[test]
    fn progress_stake__win_always_returns_base(
        stake in 1u64..1_000_000,
        base in 1u64..10_000,
    ) {
        prop_assert_eq!(progress_stake(Outcome::Win, stake, base, 1_000_000), base);
    }
}

// ---------------------------------------------------------------------------
// single-instance martingale
// ---------------------------------------------------------------------------

#[test]
fn martingale__two_losses_then_win_runs_20_40_80_20() {
    // given: the same orange result three times — losses while the
    // selection is red, a win once the loss streak has flipped it
    let mut strategy = Martingale::new(params());

    // when/then: stake sequence 20 -> 40 -> 80 -> 20
    assert_eq!(planned_stake(strategy.plan(InstanceId::A)), 20);
    strategy.settle(InstanceId::A, &pays_orange());
    assert_eq!(planned_stake(strategy.plan(InstanceId::A)), 40);
    strategy.settle(InstanceId::A, &pays_orange());
    assert_eq!(planned_stake(strategy.plan(InstanceId::A)), 80);
    let settlement = strategy.settle(InstanceId::A, &pays_orange());
    assert_eq!(
        settlement.resolved.and_then(|r| r.outcome),
        Some(Outcome::Win)
    );
    assert_eq!(planned_stake(strategy.plan(InstanceId::A)), 20);
}

#[test]
fn martingale__draw_is_treated_as_loss() {
    // given
    let mut strategy = Martingale::new(params());
    strategy.plan(InstanceId::A);

    // when
    let settlement = strategy.settle(InstanceId::A, &draw());

    // then
    let resolved = settlement.resolved.expect("turn should resolve");
    assert_eq!(resolved.outcome, Some(Outcome::Draw));
    assert_eq!(planned_stake(strategy.plan(InstanceId::A)), 40);
}

#[test]
fn martingale__stake_never_exceeds_cap() {
    // given
    let mut strategy = Martingale::new(params());

    // when: losses well past the doubling range, on whichever side is live
    for _ in 0..20 {
        let stake = planned_stake(strategy.plan(InstanceId::A));
        assert!(stake <= 30_000);
        let losing = match planned_side(strategy.plan(InstanceId::A)) {
            Side::Red => pays_orange(),
            Side::Orange => pays_red(),
        };
        strategy.settle(InstanceId::A, &losing);
    }

    // then
    assert_eq!(planned_stake(strategy.plan(InstanceId::A)), 30_000);
}

#[test]
fn martingale__loss_streak_switches_side_and_back() {
    // given: threshold 2, starting side red
    let mut strategy = Martingale::new(params());

    // when: L1, L2 on red
    assert_eq!(planned_side(strategy.plan(InstanceId::A)), Side::Red);
    strategy.settle(InstanceId::A, &pays_orange());
    strategy.plan(InstanceId::A);
    let settlement = strategy.settle(InstanceId::A, &pays_orange());

    // then: side becomes orange, counter reset
    assert_eq!(
        settlement.resolved.and_then(|r| r.side_switch),
        Some((Side::Red, Side::Orange))
    );
    assert_eq!(planned_side(strategy.plan(InstanceId::A)), Side::Orange);

    // and: L3, L4 on orange return to red (round-trip invariant)
    strategy.settle(InstanceId::A, &pays_red());
    strategy.plan(InstanceId::A);
    let settlement = strategy.settle(InstanceId::A, &pays_red());
    assert_eq!(
        settlement.resolved.and_then(|r| r.side_switch),
        Some((Side::Orange, Side::Red))
    );
    assert_eq!(planned_side(strategy.plan(InstanceId::A)), Side::Red);
}

#[test]
fn martingale__win_resets_streak_before_threshold() {
    // given
    let mut strategy = Martingale::new(params());
    strategy.plan(InstanceId::A);
    strategy.settle(InstanceId::A, &pays_orange());

    // when: a win lands with one loss on the streak
    strategy.plan(InstanceId::A);
    strategy.settle(InstanceId::A, &pays_red());
    strategy.plan(InstanceId::A);
    let settlement = strategy.settle(InstanceId::A, &pays_orange());

    // then: one loss after the win does not switch yet
    assert_eq!(settlement.resolved.and_then(|r| r.side_switch), None);
    assert_eq!(planned_side(strategy.plan(InstanceId::A)), Side::Red);
}

#[test]
fn martingale__snapshot_tracks_totals() {
    // given: loss 20, loss 40 (switch to orange), win 80, draw 20
    let mut strategy = Martingale::new(params());

    // when
    for result in [pays_orange(), pays_orange(), pays_orange(), draw()] {
        strategy.plan(InstanceId::A);
        strategy.settle(InstanceId::A, &result);
    }

    // then
    let StrategySnapshot::Single(state) = strategy.snapshot() else {
        panic!("expected single snapshot");
    };
    assert_eq!(state.games, 4);
    assert_eq!(state.wins, 1);
    assert_eq!(state.losses, 2);
    assert_eq!(state.draws, 1);
    // -20 -40 +80 -20
    assert_eq!(state.net_units, 0);
}

// ---------------------------------------------------------------------------
// dual-instance alternating
// ---------------------------------------------------------------------------

/// Consume the unconditional first-result discard on both instances.
fn discard_leftovers(strategy: &mut DualAlternating) {
    for instance in [InstanceId::A, InstanceId::B] {
        let settlement = strategy.settle(instance, &pays_red());
        assert!(!settlement.counted, "first result must be discarded");
    }
}

fn run_turn(
    strategy: &mut DualAlternating,
    instance: InstanceId,
    result: RoundResult,
) -> dicepilot::strategy::Settlement {
    strategy.plan(instance);
    strategy.settle(instance, &result)
}

#[test]
fn dual__first_result_per_instance_is_discarded() {
    // given
    let mut strategy = DualAlternating::new(params(), false);

    // when/then
    assert!(!strategy.settle(InstanceId::A, &pays_orange()).counted);
    assert!(!strategy.settle(InstanceId::B, &pays_orange()).counted);
    assert!(strategy.settle(InstanceId::A, &pays_orange()).counted);
    assert!(strategy.settle(InstanceId::B, &pays_orange()).counted);
}

#[test]
fn dual__wagers_ping_pong_between_instances() {
    // given
    let mut strategy = DualAlternating::new(params(), false);
    discard_leftovers(&mut strategy);

    // when/then: A wagers while B only observes, then roles flip
    assert!(matches!(strategy.plan(InstanceId::A), TurnPlan::Wager { .. }));
    assert_eq!(strategy.plan(InstanceId::B), TurnPlan::Observe);
    strategy.settle(InstanceId::A, &pays_red());

    assert!(matches!(strategy.plan(InstanceId::B), TurnPlan::Wager { .. }));
    assert_eq!(strategy.plan(InstanceId::A), TurnPlan::Observe);
    strategy.settle(InstanceId::B, &pays_red());

    assert!(matches!(strategy.plan(InstanceId::A), TurnPlan::Wager { .. }));
}

#[test]
fn dual__plan_is_idempotent_while_turn_is_unresolved() {
    // given
    let mut strategy = DualAlternating::new(params(), false);
    discard_leftovers(&mut strategy);

    // when
    let first = strategy.plan(InstanceId::A);
    let second = strategy.plan(InstanceId::A);

    // then
    assert_eq!(first, second);
}

#[test]
fn dual__observation_does_not_advance_the_turn() {
    // given
    let mut strategy = DualAlternating::new(params(), false);
    discard_leftovers(&mut strategy);
    strategy.plan(InstanceId::A);

    // when: B settles rounds while A's turn is in flight
    let settlement = strategy.settle(InstanceId::B, &pays_orange());

    // then
    assert!(settlement.counted);
    assert_eq!(settlement.resolved, None);
    let StrategySnapshot::Dual(state) = strategy.snapshot() else {
        panic!("expected dual snapshot");
    };
    assert_eq!(state.turn_index, 0);
    assert_eq!(state.target, InstanceId::A);
    assert_eq!(state.b.rounds, 1);
}

#[test]
fn dual__observe_mode_alternates_active_and_passive_turns() {
    // given
    let mut strategy = DualAlternating::new(params(), true);
    discard_leftovers(&mut strategy);

    // turn 0: active wager on A
    assert!(matches!(strategy.plan(InstanceId::A), TurnPlan::Wager { .. }));
    let resolved = strategy
        .settle(InstanceId::A, &pays_red())
        .resolved
        .expect("turn 0 resolves");
    assert_eq!(resolved.kind, TurnKind::Active);

    // turn 1: passive observation on B
    assert_eq!(strategy.plan(InstanceId::B), TurnPlan::Observe);
    let resolved = strategy
        .settle(InstanceId::B, &pays_orange())
        .resolved
        .expect("turn 1 resolves");
    assert_eq!(resolved.kind, TurnKind::Passive);
    assert_eq!(resolved.outcome, None);

    // turn 2: active wager on B — real wagers still ping-pong A, B, A
    assert!(matches!(strategy.plan(InstanceId::B), TurnPlan::Wager { .. }));
    strategy.settle(InstanceId::B, &pays_red());

    // turn 3: passive on A, turn 4: active on A
    assert_eq!(strategy.plan(InstanceId::A), TurnPlan::Observe);
    strategy.settle(InstanceId::A, &pays_orange());
    assert!(matches!(strategy.plan(InstanceId::A), TurnPlan::Wager { .. }));
}

#[test]
fn dual__passive_turn_never_touches_stake_or_side() {
    // given: an active red loss moves the stake to 40
    let mut strategy = DualAlternating::new(params(), true);
    discard_leftovers(&mut strategy);
    run_turn(&mut strategy, InstanceId::A, pays_orange());

    // when: the passive turn observes another red-losing result
    run_turn(&mut strategy, InstanceId::B, pays_orange());

    // then: stake and streak are exactly where the active loss left them
    let StrategySnapshot::Dual(state) = strategy.snapshot() else {
        panic!("expected dual snapshot");
    };
    assert_eq!(state.stake, 40);
    assert_eq!(state.streak, 1);
    assert_eq!(state.side, Side::Red);
}

#[test]
fn dual__side_cycles_through_remembered_previous_side() {
    // given: threshold 2, start red
    let mut strategy = DualAlternating::new(params(), false);
    discard_leftovers(&mut strategy);

    // when: two losses on red (turns land on A then B)
    run_turn(&mut strategy, InstanceId::A, pays_orange());
    let settlement = run_turn(&mut strategy, InstanceId::B, pays_orange());

    // then: side becomes orange
    assert_eq!(
        settlement.resolved.and_then(|r| r.side_switch),
        Some((Side::Red, Side::Orange))
    );

    // and: two losses on orange swing back to red
    run_turn(&mut strategy, InstanceId::A, pays_red());
    let settlement = run_turn(&mut strategy, InstanceId::B, pays_red());
    assert_eq!(
        settlement.resolved.and_then(|r| r.side_switch),
        Some((Side::Orange, Side::Red))
    );
}

#[test]
fn dual__instance_ledgers_track_profit_separately() {
    // given
    let mut strategy = DualAlternating::new(params(), false);
    discard_leftovers(&mut strategy);

    // when: A wins its turn (stake 20), B loses its turn (stake 20)
    run_turn(&mut strategy, InstanceId::A, pays_red());
    run_turn(&mut strategy, InstanceId::B, pays_orange());

    // then
    let StrategySnapshot::Dual(state) = strategy.snapshot() else {
        panic!("expected dual snapshot");
    };
    assert_eq!(state.a.net_units, 20);
    assert_eq!(state.b.net_units, -20);
    assert_eq!(state.a.consecutive_losses, 0);
    assert_eq!(state.b.consecutive_losses, 1);
}
