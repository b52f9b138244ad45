#![allow(non_snake_case)]
use dicepilot::{
    round::RoundResult,
    validate::{
        RejectReason,
        ResultValidator,
    },
};

const FLOOR: f64 = 0.6;
const CAPACITY: usize = 8;

fn validator() -> ResultValidator {
    ResultValidator::new(FLOOR, CAPACITY)
}

#[test]
fn validate__pip_seven_is_rejected_regardless_of_confidence() {
    // given
    let mut validator = validator();
    let result = RoundResult::new(7, 4, 1.0);

    // when
    let rejected = validator.validate(&result);

    // then
    assert_eq!(rejected, Err(RejectReason::PipOutOfRange { pip: 7 }));
    assert!(validator.history().is_empty());
}

#[test]
fn validate__pip_zero_is_rejected() {
    let mut validator = validator();
    let rejected = validator.validate(&RoundResult::new(0, 4, 1.0));
    assert_eq!(rejected, Err(RejectReason::PipOutOfRange { pip: 0 }));
}

#[test]
fn validate__zero_confidence_is_rejected() {
    // given
    let mut validator = validator();
    let result = RoundResult::new(3, 4, 0.0);

    // when
    let rejected = validator.validate(&result);

    // then
    assert_eq!(
        rejected,
        Err(RejectReason::LowConfidence {
            confidence: 0.0,
            floor: FLOOR,
        })
    );
}

#[test]
fn validate__pip_range_is_checked_before_confidence() {
    // given: both violations at once
    let mut validator = validator();
    let result = RoundResult::new(7, 4, 0.0);

    // when
    let rejected = validator.validate(&result);

    // then: the structural pip check wins
    assert_eq!(rejected, Err(RejectReason::PipOutOfRange { pip: 7 }));
}

#[test]
fn validate__confidence_at_the_floor_is_accepted() {
    let mut validator = validator();
    assert_eq!(validator.validate(&RoundResult::new(3, 4, FLOOR)), Ok(()));
}

#[test]
fn validate__accepted_results_enter_history() {
    // given
    let mut validator = validator();

    // when
    validator.validate(&RoundResult::new(2, 5, 0.9)).unwrap();
    validator.validate(&RoundResult::new(6, 6, 0.9)).unwrap();

    // then
    assert_eq!(validator.history().len(), 2);
}

#[test]
fn validate__history_is_bounded_oldest_evicted_first() {
    // given
    let mut validator = ResultValidator::new(FLOOR, 3);

    // when: four accepted results into a capacity of three
    for first in 1..=4 {
        validator.validate(&RoundResult::new(first, 5, 0.9)).unwrap();
    }

    // then
    assert_eq!(validator.history().len(), 3);
    assert_eq!(validator.history().front().map(|r| r.first), Some(2));
    assert_eq!(validator.history().back().map(|r| r.first), Some(4));
}

#[test]
fn validate__abrupt_jump_is_flagged_but_accepted() {
    // given: total 3 followed by total 12
    let mut validator = validator();
    validator.validate(&RoundResult::new(1, 2, 0.9)).unwrap();

    // when
    let accepted = validator.validate(&RoundResult::new(6, 6, 0.9));

    // then: soft checks never reject
    assert_eq!(accepted, Ok(()));
    assert_eq!(validator.history().len(), 2);
}

#[test]
fn validate__long_identical_run_is_flagged_but_accepted() {
    // given
    let mut validator = validator();

    // when: the same result six times
    for _ in 0..6 {
        assert_eq!(validator.validate(&RoundResult::new(2, 3, 0.9)), Ok(()));
    }

    // then
    assert_eq!(validator.history().len(), 6);
}
