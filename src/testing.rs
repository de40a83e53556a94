//! Spy harnesses for asserting retry-driven invocation counts.
//!
//! A spy wraps an operation, counts how many times the policy invokes it,
//! and deterministically fails a configured number of times before
//! succeeding. After the run, [`RetrySpy::verify`] checks that the
//! operation was driven exactly once per attempt the policy made - never
//! fewer (the policy skipped it) nor more (something invoked it outside the
//! policy).
//!
//! Spies draw their retry budget and fault count from a caller-supplied,
//! explicitly seeded generator, so a failing case is reproducible from its
//! seed alone.
//!
//! # Examples
//!
//! ```rust
//! use rand::{rngs::StdRng, SeedableRng};
//! use relent::testing::RetrySpy;
//!
//! # tokio_test::block_on(async {
//! let mut rng = StdRng::seed_from_u64(42);
//! let spy = RetrySpy::from_rng(&mut rng, || "transient fault");
//!
//! spy.policy().run(spy.operation()).await.unwrap();
//! spy.verify().unwrap();
//! # });
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;

use crate::classify::{FaultClassifier, ResultClassifier};
use crate::interval::RetryInterval;
use crate::policy::{ResultRetryPolicy, RetryPolicy};

// Budget range for randomized scenarios: large enough that an off-by-one
// loop bound cannot pass by coincidence.
const RETRY_COUNT_RANGE: std::ops::Range<u32> = 1000..2000;

/// Verification failure: the operation was not invoked exactly once per
/// policy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpyVerificationError {
    /// Invocations the policy's attempt count dictates.
    pub expected: u32,
    /// Invocations actually observed.
    pub observed: u32,
}

impl fmt::Display for SpyVerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation was invoked {} times but the retry policy should have driven exactly {} attempts",
            self.observed, self.expected
        )
    }
}

impl std::error::Error for SpyVerificationError {}

/// Spy for a value-less retry policy.
///
/// Fails with a transient error on every invocation until the configured
/// fault count is spent, then succeeds. [`RetrySpy::policy`] is a ready-made
/// engine (always-transient classifier, zero constant interval, immediate
/// first retry) whose budget always covers the fault count.
pub struct RetrySpy<E> {
    transient_fault_count: u32,
    invocations: Arc<AtomicU32>,
    policy: RetryPolicy<E>,
    make_error: Arc<dyn Fn() -> E + Send + Sync>,
}

impl<E> RetrySpy<E> {
    /// Build a spy from an explicitly seeded generator.
    ///
    /// Picks a retry budget in `1000..2000` and a transient-fault count
    /// strictly below it, so the wrapped operation always succeeds within
    /// budget. `make_error` produces the transient error for each failing
    /// invocation.
    pub fn from_rng<R, F>(rng: &mut R, make_error: F) -> Self
    where
        R: Rng + ?Sized,
        F: Fn() -> E + Send + Sync + 'static,
    {
        let max_retry_count = rng.random_range(RETRY_COUNT_RANGE);
        let transient_fault_count = rng.random_range(0..max_retry_count);

        Self {
            transient_fault_count,
            invocations: Arc::new(AtomicU32::new(0)),
            policy: RetryPolicy::new(
                max_retry_count,
                FaultClassifier::transient(),
                RetryInterval::constant(Duration::ZERO, true),
            ),
            make_error: Arc::new(make_error),
        }
    }

    /// The policy wired to this spy's scenario.
    pub fn policy(&self) -> &RetryPolicy<E> {
        &self.policy
    }

    /// How many invocations will fail before the operation succeeds.
    pub fn transient_fault_count(&self) -> u32 {
        self.transient_fault_count
    }

    /// Invocations observed so far.
    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// The counting operation, in the cancellation-less shape accepted by
    /// [`RetryPolicy::run`].
    pub fn operation(&self) -> impl FnMut() -> BoxFuture<'static, Result<(), E>>
    where
        E: Send + 'static,
    {
        let invocations = Arc::clone(&self.invocations);
        let make_error = Arc::clone(&self.make_error);
        let succeed_at = self.transient_fault_count + 1;

        move || {
            let nth = invocations.fetch_add(1, Ordering::SeqCst) + 1;
            let outcome = if nth == succeed_at {
                Ok(())
            } else {
                Err(make_error())
            };
            Box::pin(async move { outcome })
        }
    }

    /// Check that the operation was invoked exactly once per attempt.
    ///
    /// # Errors
    ///
    /// Returns [`SpyVerificationError`] when the observed invocation count
    /// differs from `transient_fault_count + 1` in either direction.
    pub fn verify(&self) -> Result<(), SpyVerificationError> {
        let expected = self.transient_fault_count + 1;
        let observed = self.invocations();

        if observed == expected {
            Ok(())
        } else {
            Err(SpyVerificationError { expected, observed })
        }
    }
}

impl<E> fmt::Debug for RetrySpy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySpy")
            .field("transient_fault_count", &self.transient_fault_count)
            .field("invocations", &self.invocations())
            .finish_non_exhaustive()
    }
}

/// Spy for a result-bearing retry policy.
///
/// Like [`RetrySpy`], but the wrapped operation produces a caller-supplied
/// value once the configured faults are spent. The ready-made policy uses
/// the base result classifier, so results are never treated as transient.
pub struct ResultRetrySpy<T, E> {
    transient_fault_count: u32,
    invocations: Arc<AtomicU32>,
    policy: ResultRetryPolicy<T, E>,
    make_result: Arc<dyn Fn() -> T + Send + Sync>,
    make_error: Arc<dyn Fn() -> E + Send + Sync>,
}

impl<T, E> ResultRetrySpy<T, E> {
    /// Build a spy from an explicitly seeded generator.
    ///
    /// `make_result` produces the success value for the final invocation;
    /// `make_error` the transient error for every invocation before it.
    pub fn from_rng<R, F, G>(rng: &mut R, make_result: F, make_error: G) -> Self
    where
        R: Rng + ?Sized,
        F: Fn() -> T + Send + Sync + 'static,
        G: Fn() -> E + Send + Sync + 'static,
    {
        let max_retry_count = rng.random_range(RETRY_COUNT_RANGE);
        let transient_fault_count = rng.random_range(0..max_retry_count);

        Self {
            transient_fault_count,
            invocations: Arc::new(AtomicU32::new(0)),
            policy: ResultRetryPolicy::new(
                max_retry_count,
                ResultClassifier::new(),
                RetryInterval::constant(Duration::ZERO, true),
            ),
            make_result: Arc::new(make_result),
            make_error: Arc::new(make_error),
        }
    }

    /// The policy wired to this spy's scenario.
    pub fn policy(&self) -> &ResultRetryPolicy<T, E> {
        &self.policy
    }

    /// How many invocations will fail before the operation succeeds.
    pub fn transient_fault_count(&self) -> u32 {
        self.transient_fault_count
    }

    /// Invocations observed so far.
    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// The counting operation, in the cancellation-less shape accepted by
    /// [`ResultRetryPolicy::run`].
    pub fn operation(&self) -> impl FnMut() -> BoxFuture<'static, Result<T, E>>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        let invocations = Arc::clone(&self.invocations);
        let make_result = Arc::clone(&self.make_result);
        let make_error = Arc::clone(&self.make_error);
        let succeed_at = self.transient_fault_count + 1;

        move || {
            let nth = invocations.fetch_add(1, Ordering::SeqCst) + 1;
            let outcome = if nth == succeed_at {
                Ok(make_result())
            } else {
                Err(make_error())
            };
            Box::pin(async move { outcome })
        }
    }

    /// Check that the operation was invoked exactly once per attempt.
    ///
    /// # Errors
    ///
    /// Returns [`SpyVerificationError`] when the observed invocation count
    /// differs from `transient_fault_count + 1` in either direction.
    pub fn verify(&self) -> Result<(), SpyVerificationError> {
        let expected = self.transient_fault_count + 1;
        let observed = self.invocations();

        if observed == expected {
            Ok(())
        } else {
            Err(SpyVerificationError { expected, observed })
        }
    }
}

impl<T, E> fmt::Debug for ResultRetrySpy<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultRetrySpy")
            .field("transient_fault_count", &self.transient_fault_count)
            .field("invocations", &self.invocations())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod testing_tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn spy_scenario_always_fits_the_budget() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let spy = RetrySpy::from_rng(&mut rng, || "fault");
            assert!(spy.transient_fault_count() < spy.policy().max_retry_count());
        }
    }

    #[test]
    fn verify_fails_before_any_invocation() {
        let mut rng = StdRng::seed_from_u64(11);
        let spy = RetrySpy::from_rng(&mut rng, || "fault");

        let err = spy.verify().unwrap_err();
        assert_eq!(err.observed, 0);
        assert_eq!(err.expected, spy.transient_fault_count() + 1);
    }

    #[tokio::test]
    async fn operation_fails_until_the_fault_count_is_spent() {
        let mut rng = StdRng::seed_from_u64(13);
        let spy = RetrySpy::from_rng(&mut rng, || "fault");
        let mut operation = spy.operation();

        for _ in 0..spy.transient_fault_count() {
            assert_eq!(operation().await, Err("fault"));
        }
        assert_eq!(operation().await, Ok(()));
        assert!(spy.verify().is_ok());
    }

    #[tokio::test]
    async fn verify_rejects_invocations_outside_the_policy() {
        let mut rng = StdRng::seed_from_u64(17);
        let spy = ResultRetrySpy::from_rng(&mut rng, || 42u64, || "fault");
        let mut operation = spy.operation();

        spy.policy().run(&mut operation).await.unwrap();
        // A direct call after the run is one invocation too many.
        let _ = operation().await;

        let err = spy.verify().unwrap_err();
        assert_eq!(err.observed, err.expected + 1);
    }

    #[test]
    fn verification_error_display_names_both_counts() {
        let err = SpyVerificationError {
            expected: 5,
            observed: 3,
        };
        let display = err.to_string();

        assert!(display.contains('5'));
        assert!(display.contains('3'));
    }
}
