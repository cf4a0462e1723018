//! End-to-end scenarios for the nested-optimization tracker
//!
//! These run the tracker through the call sequences an outer search loop
//! makes and check the result log it leaves behind.

use evotrack::timing::ManualClock;
use evotrack::tracker::{
    read_log, Level, NestedOptimization, ObservationOutcome, Phase, ResultFileMode, TrackerMode,
    LOG_HEADER,
};
use evotrack::TrackerError;

fn tracker(dir: &tempfile::TempDir, max_frames: u64) -> NestedOptimization<ManualClock> {
    NestedOptimization::with_clock(
        dir.path().join("result.txt"),
        max_frames,
        TrackerMode::Standard,
        ResultFileMode::Truncate,
        ManualClock::new(),
    )
    .unwrap()
}

// ============================================================================
// Best tracking
// ============================================================================

#[test]
fn test_best_sequence_and_reevaluation_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut no = tracker(&dir, 1_000);

    let mut bests = Vec::new();
    let mut outcomes = Vec::new();
    for value in [5.0, 3.0, 7.0] {
        outcomes.push(no.record_outer_observation(value).unwrap());
        bests.push(no.f_best());
    }

    assert_eq!(bests, vec![5.0, 5.0, 7.0]);
    assert_eq!(
        outcomes,
        vec![
            ObservationOutcome::ReevaluationRequired,
            ObservationOutcome::Continue,
            ObservationOutcome::ReevaluationRequired,
        ]
    );
}

#[test]
fn test_reevaluation_round_trip_returns_to_primary() {
    let dir = tempfile::tempdir().unwrap();
    let mut no = tracker(&dir, 1_000);

    no.record_outer_observation(2.0).unwrap();
    assert_eq!(no.phase(), Phase::RunningReeval);
    assert!(no.reevaluation_required());

    no.record_reeval_observation(1.5).unwrap();
    assert_eq!(no.phase(), Phase::RunningPrimary);
    assert!(!no.reevaluation_required());

    // Not a new best: stays primary
    no.record_outer_observation(1.0).unwrap();
    assert_eq!(no.phase(), Phase::RunningPrimary);
}

#[test]
fn test_bests_never_decrease() {
    let dir = tempfile::tempdir().unwrap();
    let mut no = tracker(&dir, 1_000_000);

    let values = [0.3, -1.0, 0.9, 0.1, 2.5, 2.5, -4.0, 3.0, 0.0];
    let mut last_best = f64::NEG_INFINITY;
    let mut last_reeval_best = f64::NEG_INFINITY;
    for (i, v) in values.iter().enumerate() {
        if no.record_outer_observation(*v).unwrap() == ObservationOutcome::ReevaluationRequired {
            // Reevaluations come back noisy
            let noisy = if i % 2 == 0 { v - 0.5 } else { v + 0.25 };
            no.record_reeval_observation(noisy).unwrap();
        }
        assert!(no.f_best() >= last_best);
        assert!(no.f_reeval_best() >= last_reeval_best);
        last_best = no.f_best();
        last_reeval_best = no.f_reeval_best();
    }
    assert_eq!(no.f_best(), 3.0);
}

#[test]
fn test_invalid_objective_fails_loudly() {
    let dir = tempfile::tempdir().unwrap();
    let mut no = tracker(&dir, 1_000);
    no.record_outer_observation(1.0).unwrap();

    assert!(matches!(
        no.record_reeval_observation(f64::NAN),
        Err(TrackerError::InvalidObjective { .. })
    ));
    // Still waiting for a valid reevaluation
    assert_eq!(no.phase(), Phase::RunningReeval);
}

// ============================================================================
// Budget
// ============================================================================

#[test]
fn test_budget_exhaustion_after_overrun() {
    let dir = tempfile::tempdir().unwrap();
    let mut no = tracker(&dir, 100);

    for _ in 0..50 {
        no.advance_step();
    }
    no.record_outer_observation(0.5).unwrap();
    no.record_reeval_observation(0.5).unwrap();

    for _ in 0..51 {
        no.advance_step();
    }
    assert_eq!(no.step(), 101);
    assert_eq!(
        no.record_outer_observation(1.0).unwrap(),
        ObservationOutcome::BudgetExhausted
    );

    // The exhausted observation is not logged and the best is untouched
    let rows = read_log(no.result_path()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(no.f_best(), 0.5);
    assert!(rows.iter().all(|r| r.step <= 100));
}

#[test]
fn test_hundred_and_one_steps_exhaust_budget_of_hundred() {
    let dir = tempfile::tempdir().unwrap();
    let mut no = tracker(&dir, 100);
    for _ in 0..101 {
        no.advance_step();
    }
    assert_eq!(
        no.record_outer_observation(1.0).unwrap(),
        ObservationOutcome::BudgetExhausted
    );
    assert!(no.budget_exhausted());
    assert!(!no.result_path().exists());
}

#[test]
fn test_exactly_at_budget_is_not_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let mut no = tracker(&dir, 10);
    for _ in 0..10 {
        no.advance_step();
    }
    assert_eq!(
        no.record_outer_observation(1.0).unwrap(),
        ObservationOutcome::ReevaluationRequired
    );
}

#[test]
fn test_reevaluation_steps_do_not_consume_budget() {
    let dir = tempfile::tempdir().unwrap();
    let mut no = tracker(&dir, 10);
    no.record_outer_observation(1.0).unwrap();
    for _ in 0..100 {
        no.advance_step();
    }
    assert!(!no.budget_exhausted());
    assert_eq!(no.reevaluating_steps(), 100);
}

// ============================================================================
// Result log
// ============================================================================

#[test]
fn test_log_has_one_header_and_rows_in_call_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut no = tracker(&dir, 10_000);

    let mut expected_levels = Vec::new();
    for (i, v) in [1.0, 0.5, 2.0, 1.5].iter().enumerate() {
        for _ in 0..=i {
            no.advance_step();
        }
        let outcome = no.record_outer_observation(*v).unwrap();
        expected_levels.push(Level::Outer);
        if outcome == ObservationOutcome::ReevaluationRequired {
            no.advance_step();
            no.record_reeval_observation(v * 0.9).unwrap();
            expected_levels.push(Level::Reeval);
        }
    }

    let text = std::fs::read_to_string(no.result_path()).unwrap();
    assert_eq!(text.lines().next(), Some(LOG_HEADER));
    assert_eq!(text.matches(LOG_HEADER).count(), 1);

    let rows = read_log(no.result_path()).unwrap();
    assert_eq!(rows.len(), expected_levels.len());
    assert_eq!(
        rows.iter().map(|r| r.level).collect::<Vec<_>>(),
        expected_levels
    );

    let evaluations: Vec<u64> = rows
        .iter()
        .filter(|r| r.level == Level::Outer)
        .map(|r| r.evaluation)
        .collect();
    assert_eq!(evaluations, vec![1, 2, 3, 4]);

    // Steps are cumulative and never go backwards
    assert!(rows.windows(2).all(|w| w[1].step >= w[0].step));
    assert!(rows
        .windows(2)
        .all(|w| w[1].step_including_reeval >= w[0].step_including_reeval));
}

#[test]
fn test_resumed_run_appends_without_second_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.txt");

    for value in [1.0, 2.0] {
        let mut no = NestedOptimization::with_clock(
            &path,
            1_000,
            TrackerMode::Standard,
            ResultFileMode::Append,
            ManualClock::new(),
        )
        .unwrap();
        no.record_outer_observation(value).unwrap();
    }

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.matches(LOG_HEADER).count(), 1);
    assert_eq!(read_log(&path).unwrap().len(), 2);
}

#[test]
fn test_background_thread_writes_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let mut no = tracker(&dir, 1_000_000);
    no.record_outer_observation(-1.0).unwrap();
    no.record_reeval_observation(-1.0).unwrap();
    let handle = no.log_handle();

    let writer = std::thread::spawn(move || {
        for i in 0..50 {
            handle
                .append_raw(&format!("# note {}\n", i))
                .expect("append from background thread");
        }
    });
    for i in 0..50 {
        no.record_outer_observation(i as f64 * 0.01).unwrap();
        if no.reevaluation_required() {
            no.record_reeval_observation(i as f64 * 0.01).unwrap();
        }
    }
    writer.join().unwrap();

    let text = std::fs::read_to_string(no.result_path()).unwrap();
    assert_eq!(text.lines().next(), Some(LOG_HEADER));
    for line in text.lines().skip(1) {
        assert!(
            line.starts_with("# note ") || line.split(',').count() == 8,
            "interleaved line: {}",
            line
        );
    }
}
