use harvester_core::{
    CandidateKey, HarvestLimits, HarvestState, KeyShape, LimitsError, PostingRecord,
    RoundVerdict, StopReason,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    engine_logging::initialize_for_tests();
}

fn key(id: u32) -> CandidateKey {
    KeyShape::new(r"^/jobs/view/\d+")
        .unwrap()
        .normalize(&format!("https://example.com/jobs/view/{id}/"), None)
        .unwrap()
}

fn limits(max_results: usize, max_rounds: u32, stagnation_threshold: u32) -> HarvestLimits {
    HarvestLimits {
        max_results,
        max_rounds,
        stagnation_threshold,
    }
}

#[test]
fn unseen_keeps_order_and_drops_repeats() {
    init_logging();
    let mut state = HarvestState::new(HarvestLimits::default());
    assert!(state.mark_dispatched(key(2)));

    let fresh = state.unseen(&[key(3), key(2), key(1), key(3), key(4)]);
    assert_eq!(fresh, vec![key(3), key(1), key(4)]);
}

#[test]
fn dispatched_keys_are_never_offered_again() {
    init_logging();
    let mut state = HarvestState::new(HarvestLimits::default());
    assert!(state.mark_dispatched(key(1)));
    assert!(!state.mark_dispatched(key(1)));
    assert!(state.unseen(&[key(1)]).is_empty());
    assert!(state.has_seen(&key(1)));
}

#[test]
fn accept_enforces_cap_and_distinct_links() {
    init_logging();
    let mut state = HarvestState::new(limits(2, 10, 3));

    // Never dispatched.
    assert!(!state.accept(PostingRecord::empty(key(9))));

    for id in 1..=3 {
        state.mark_dispatched(key(id));
    }
    assert!(state.accept(PostingRecord::empty(key(1))));
    assert!(!state.accept(PostingRecord::empty(key(1))));
    assert!(state.accept(PostingRecord::empty(key(2))));
    assert!(state.cap_reached());
    assert!(!state.accept(PostingRecord::empty(key(3))));
    assert_eq!(state.results().len(), 2);
}

#[test]
fn zero_cap_is_reached_immediately() {
    init_logging();
    let state = HarvestState::new(limits(0, 10, 3));
    assert!(state.cap_reached());
}

#[test]
fn stagnation_counts_consecutive_idle_rounds() {
    init_logging();
    let mut state = HarvestState::new(limits(10, 100, 3));

    state.mark_dispatched(key(1));
    assert_eq!(state.close_round(0), RoundVerdict::Continue);
    assert_eq!(state.stagnation_counter(), 0);

    assert_eq!(state.close_round(0), RoundVerdict::Continue);
    assert_eq!(state.close_round(0), RoundVerdict::Continue);
    assert_eq!(state.stagnation_counter(), 2);

    // Unseen keys after the scroll reset the counter.
    assert_eq!(state.close_round(2), RoundVerdict::Continue);
    assert_eq!(state.stagnation_counter(), 0);

    assert_eq!(state.close_round(0), RoundVerdict::Continue);
    assert_eq!(state.close_round(0), RoundVerdict::Continue);
    assert_eq!(
        state.close_round(0),
        RoundVerdict::Done(StopReason::Stagnant)
    );
    assert_eq!(state.round_index(), 7);
}

#[test]
fn failed_rounds_without_dispatches_are_stagnant() {
    init_logging();
    let mut state = HarvestState::new(limits(10, 100, 2));
    assert_eq!(state.close_failed_round(), RoundVerdict::Continue);
    assert_eq!(
        state.close_failed_round(),
        RoundVerdict::Done(StopReason::Stagnant)
    );
}

#[test]
fn failed_rounds_still_credit_dispatched_candidates() {
    init_logging();
    let mut state = HarvestState::new(limits(10, 100, 1));
    state.mark_dispatched(key(1));
    assert_eq!(state.close_failed_round(), RoundVerdict::Continue);
    assert_eq!(state.stagnation_counter(), 0);
    assert_eq!(
        state.close_failed_round(),
        RoundVerdict::Done(StopReason::Stagnant)
    );
}

#[test]
fn round_budget_is_a_hard_ceiling() {
    init_logging();
    let mut state = HarvestState::new(limits(10, 2, 5));
    state.mark_dispatched(key(1));
    assert_eq!(state.close_round(0), RoundVerdict::Continue);
    state.mark_dispatched(key(2));
    assert_eq!(
        state.close_round(0),
        RoundVerdict::Done(StopReason::MaxRounds)
    );
    assert_eq!(state.round_index(), 2);
}

#[test]
fn limits_validation_rejects_zero_budgets() {
    assert_eq!(limits(1, 0, 1).validate(), Err(LimitsError::NoRounds));
    assert_eq!(
        limits(1, 1, 0).validate(),
        Err(LimitsError::NoStagnationThreshold)
    );
    assert_eq!(HarvestLimits::default().validate(), Ok(()));
}
