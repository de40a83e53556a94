//! The spy harness driving the real retry engine, end to end.

use rand::rngs::StdRng;
use rand::SeedableRng;
use relent::testing::{ResultRetrySpy, RetrySpy};

#[tokio::test]
async fn policy_drives_the_spied_operation_exactly_once_per_attempt() {
    let mut rng = StdRng::seed_from_u64(0xDEC0DE);
    let spy = RetrySpy::from_rng(&mut rng, || "transient fault");

    spy.policy()
        .run(spy.operation())
        .await
        .expect("faults fit the budget");

    spy.verify().expect("one invocation per attempt");
    assert_eq!(spy.invocations(), spy.transient_fault_count() + 1);
}

#[tokio::test]
async fn result_policy_returns_the_spied_success_value() {
    let mut rng = StdRng::seed_from_u64(0xFACADE);
    let spy = ResultRetrySpy::from_rng(&mut rng, || "ready", || "transient fault");

    let result = spy
        .policy()
        .run(spy.operation())
        .await
        .expect("faults fit the budget");

    assert_eq!(result, "ready");
    spy.verify().expect("one invocation per attempt");
}

#[tokio::test]
async fn distinct_seeds_exercise_distinct_scenarios() {
    // A sample of seeds; each scenario must still verify cleanly.
    for seed in [1u64, 2, 3, 5, 8, 13, 21] {
        let mut rng = StdRng::seed_from_u64(seed);
        let spy = RetrySpy::from_rng(&mut rng, || "transient fault");

        spy.policy()
            .run(spy.operation())
            .await
            .expect("faults fit the budget");
        spy.verify().unwrap_or_else(|e| panic!("seed {seed}: {e}"));
    }
}

#[tokio::test]
async fn verify_reports_a_skipped_operation() {
    let mut rng = StdRng::seed_from_u64(99);
    let spy = RetrySpy::from_rng(&mut rng, || "transient fault");

    // Policy never ran, so the count cannot match.
    let err = spy.verify().expect_err("nothing was invoked");
    assert_eq!(err.observed, 0);
    assert!(err.to_string().contains("retry policy"));
}
