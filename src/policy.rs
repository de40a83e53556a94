//! Retry policies: the orchestrating loop.
//!
//! A policy owns a retry budget, a [fault classifier](crate::classify) and an
//! [interval schedule](crate::interval), and drives the
//! attempt / classify / delay cycle for one asynchronous operation at a time.
//! Policies hold no mutable state, so a single long-lived instance can run
//! any number of operations concurrently.
//!
//! Two shapes are provided: [`RetryPolicy`] for operations that produce no
//! value, and [`ResultRetryPolicy`] for operations whose *returned value*
//! may itself count as a transient fault (a sentinel meaning "not ready
//! yet").
//!
//! # Cancellation
//!
//! Every run threads a [`CancellationToken`] into the operation and races it
//! against the inter-attempt delay. Cancellation is advisory: the in-flight
//! attempt is never aborted by the policy, but the delay and all subsequent
//! attempts stop promptly, and the run settles with the last outcome seen.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::classify::{FaultClassifier, ResultClassifier};
use crate::interval::RetryInterval;

/// Retry policy for operations that produce no value.
///
/// The budget counts *extra* attempts: a policy with `max_retry_count` of 3
/// invokes the operation at most 4 times.
///
/// # Examples
///
/// ```rust
/// use relent::{FaultClassifier, RetryInterval, RetryPolicy};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let policy = RetryPolicy::new(
///     3,
///     FaultClassifier::transient(),
///     RetryInterval::constant(Duration::ZERO, true),
/// );
///
/// let mut calls = 0;
/// let result: Result<(), &str> = policy
///     .run(|| {
///         calls += 1;
///         let outcome = if calls < 3 { Err("flaky") } else { Ok(()) };
///         async move { outcome }
///     })
///     .await;
///
/// assert!(result.is_ok());
/// assert_eq!(calls, 3);
/// # });
/// ```
pub struct RetryPolicy<E> {
    max_retry_count: u32,
    classifier: FaultClassifier<E>,
    interval: RetryInterval,
}

impl<E> RetryPolicy<E> {
    /// Create a policy from a retry budget, classifier and schedule.
    pub fn new(
        max_retry_count: u32,
        classifier: FaultClassifier<E>,
        interval: RetryInterval,
    ) -> Self {
        Self {
            max_retry_count,
            classifier,
            interval,
        }
    }

    /// Number of extra attempts allowed beyond the first.
    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    /// The classifier deciding which errors are transient.
    pub fn classifier(&self) -> &FaultClassifier<E> {
        &self.classifier
    }

    /// The backoff schedule.
    pub fn interval(&self) -> &RetryInterval {
        &self.interval
    }

    /// Run a cancellation-less operation under this policy.
    ///
    /// Adapts the operation to the cancellable shape with a token that is
    /// never cancelled, then delegates to [`RetryPolicy::run_cancellable`].
    pub async fn run<F, Fut>(&self, mut operation: F) -> Result<(), E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        self.run_cancellable(move |_| operation(), CancellationToken::new())
            .await
    }

    /// Run an operation under this policy, honoring `cancellation`.
    ///
    /// The operation receives a clone of the token on every attempt and is
    /// always invoked at least once, even if the token is already cancelled
    /// - it may observe the token and bail out itself. If cancellation hits
    /// before or during an inter-attempt delay, the run stops retrying and
    /// surfaces the last error seen.
    ///
    /// # Errors
    ///
    /// Returns the error from the final attempt: the first non-transient
    /// error immediately, or the last transient error once the budget is
    /// exhausted or the token cancelled. Historical failures are never
    /// aggregated.
    pub async fn run_cancellable<F, Fut>(
        &self,
        mut operation: F,
        cancellation: CancellationToken,
    ) -> Result<(), E>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut retried = 0;

        loop {
            let error = match operation(cancellation.clone()).await {
                Ok(()) => return Ok(()),
                Err(error) => error,
            };

            if !self.classifier.is_transient_error(&error) {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempts = retried + 1, "non-transient fault, giving up");
                return Err(error);
            }

            if retried >= self.max_retry_count {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempts = retried + 1, "retry budget exhausted");
                return Err(error);
            }

            if !pause(&self.interval, retried, &cancellation).await {
                return Err(error);
            }
            retried += 1;
        }
    }

    /// Run an operation taking one extra argument.
    ///
    /// Pure plumbing: closes over `arg` (cloned per attempt) and delegates
    /// to [`RetryPolicy::run_cancellable`]. No new retry semantics.
    pub async fn run_with<A, F, Fut>(
        &self,
        mut operation: F,
        arg: A,
        cancellation: CancellationToken,
    ) -> Result<(), E>
    where
        A: Clone,
        F: FnMut(A, CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        self.run_cancellable(move |token| operation(arg.clone(), token), cancellation)
            .await
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_retry_count: self.max_retry_count,
            classifier: self.classifier.clone(),
            interval: self.interval.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retry_count", &self.max_retry_count)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Retry policy for operations whose returned value may itself be a
/// transient fault.
///
/// Besides errors, the classifier inspects every successful result; a
/// "transient" result is discarded and the operation retried after the
/// scheduled delay. Once the budget is exhausted the last result is
/// returned as-is - a transient result is never turned into an error.
///
/// # Examples
///
/// ```rust
/// use relent::{ResultClassifier, ResultRetryPolicy, RetryInterval};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// // Poll until the lookup returns something other than None.
/// let policy = ResultRetryPolicy::new(
///     5,
///     ResultClassifier::transient_default(),
///     RetryInterval::constant(Duration::ZERO, true),
/// );
///
/// let mut polls = 0;
/// let result: Result<Option<u32>, &str> = policy
///     .run(|| {
///         polls += 1;
///         let value = if polls < 4 { None } else { Some(99) };
///         async move { Ok(value) }
///     })
///     .await;
///
/// assert_eq!(result, Ok(Some(99)));
/// assert_eq!(polls, 4);
/// # });
/// ```
pub struct ResultRetryPolicy<T, E> {
    max_retry_count: u32,
    classifier: ResultClassifier<T, E>,
    interval: RetryInterval,
}

impl<T, E> ResultRetryPolicy<T, E> {
    /// Create a policy from a retry budget, classifier and schedule.
    pub fn new(
        max_retry_count: u32,
        classifier: ResultClassifier<T, E>,
        interval: RetryInterval,
    ) -> Self {
        Self {
            max_retry_count,
            classifier,
            interval,
        }
    }

    /// Number of extra attempts allowed beyond the first.
    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    /// The classifier deciding which errors and results are transient.
    pub fn classifier(&self) -> &ResultClassifier<T, E> {
        &self.classifier
    }

    /// The backoff schedule.
    pub fn interval(&self) -> &RetryInterval {
        &self.interval
    }

    /// Run a cancellation-less operation under this policy.
    ///
    /// Adapts the operation to the cancellable shape with a token that is
    /// never cancelled, then delegates to
    /// [`ResultRetryPolicy::run_cancellable`].
    pub async fn run<F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_cancellable(move |_| operation(), CancellationToken::new())
            .await
    }

    /// Run an operation under this policy, honoring `cancellation`.
    ///
    /// Identical to [`RetryPolicy::run_cancellable`] except that every
    /// successful result is also consulted for transience: a transient
    /// result within budget is discarded and retried; a transient result
    /// with the budget exhausted (or the token cancelled during the delay)
    /// is returned as a normal value.
    ///
    /// # Errors
    ///
    /// Returns the error from the final attempt, never an aggregate.
    pub async fn run_cancellable<F, Fut>(
        &self,
        mut operation: F,
        cancellation: CancellationToken,
    ) -> Result<T, E>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retried = 0;

        loop {
            match operation(cancellation.clone()).await {
                Ok(result) => {
                    if !self.classifier.is_transient_result(&result)
                        || retried >= self.max_retry_count
                    {
                        return Ok(result);
                    }

                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempts = retried + 1, "transient result, discarding");
                    if !pause(&self.interval, retried, &cancellation).await {
                        return Ok(result);
                    }
                }
                Err(error) => {
                    if !self.classifier.is_transient_error(&error) {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(attempts = retried + 1, "non-transient fault, giving up");
                        return Err(error);
                    }

                    if retried >= self.max_retry_count {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(attempts = retried + 1, "retry budget exhausted");
                        return Err(error);
                    }

                    if !pause(&self.interval, retried, &cancellation).await {
                        return Err(error);
                    }
                }
            }
            retried += 1;
        }
    }

    /// Run an operation taking one extra argument.
    ///
    /// Pure plumbing: closes over `arg` (cloned per attempt) and delegates
    /// to [`ResultRetryPolicy::run_cancellable`]. No new retry semantics.
    pub async fn run_with<A, F, Fut>(
        &self,
        mut operation: F,
        arg: A,
        cancellation: CancellationToken,
    ) -> Result<T, E>
    where
        A: Clone,
        F: FnMut(A, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_cancellable(move |token| operation(arg.clone(), token), cancellation)
            .await
    }
}

impl<T, E> ResultRetryPolicy<T, E>
where
    T: Default + PartialEq + 'static,
{
    /// Default-detection classifier with linear backoff.
    ///
    /// Retries both errors and default-valued results, waiting `increment`
    /// longer before each attempt, uncapped, with no immediate first retry.
    pub fn linear_transient_default(max_retry_count: u32, increment: Duration) -> Self {
        Self::new(
            max_retry_count,
            ResultClassifier::transient_default(),
            RetryInterval::linear(Duration::ZERO, increment, Duration::MAX, false),
        )
    }

    /// Default-detection classifier with a constant interval.
    pub fn constant_transient_default(
        max_retry_count: u32,
        interval: Duration,
        immediate_first_retry: bool,
    ) -> Self {
        Self::new(
            max_retry_count,
            ResultClassifier::transient_default(),
            RetryInterval::constant(interval, immediate_first_retry),
        )
    }
}

impl<T, E> Clone for ResultRetryPolicy<T, E> {
    fn clone(&self) -> Self {
        Self {
            max_retry_count: self.max_retry_count,
            classifier: self.classifier.clone(),
            interval: self.interval.clone(),
        }
    }
}

impl<T, E> fmt::Debug for ResultRetryPolicy<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultRetryPolicy")
            .field("max_retry_count", &self.max_retry_count)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Wait out the scheduled delay, racing it against cancellation.
///
/// Returns false if the token was cancelled first; `biased` so an
/// already-cancelled token always wins over a zero-length sleep.
async fn pause(
    interval: &RetryInterval,
    retried: u32,
    cancellation: &CancellationToken,
) -> bool {
    let delay = interval.interval(retried);

    #[cfg(feature = "tracing")]
    tracing::debug!(retried, delay_ms = delay.as_millis() as u64, "waiting before retry");

    tokio::select! {
        biased;
        _ = cancellation.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod policy_tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn policy_exposes_its_configuration() {
        let policy: RetryPolicy<String> = RetryPolicy::new(
            7,
            FaultClassifier::transient(),
            RetryInterval::constant(Duration::from_millis(10), true),
        );

        assert_eq!(policy.max_retry_count(), 7);
        assert!(policy.interval().immediate_first_retry());
    }

    #[test]
    fn policies_are_clone_and_debug() {
        let policy: ResultRetryPolicy<u64, String> =
            ResultRetryPolicy::constant_transient_default(3, Duration::ZERO, true);
        let cloned = policy.clone();

        assert_eq!(cloned.max_retry_count(), 3);
        assert!(format!("{:?}", cloned).contains("ResultRetryPolicy"));
        assert!(format!("{:?}", RetryPolicy::<String>::new(
            0,
            FaultClassifier::transient(),
            RetryInterval::constant(Duration::ZERO, false),
        ))
        .contains("RetryPolicy"));
    }

    #[test]
    fn linear_transient_default_wires_the_uncapped_ramp() {
        let policy: ResultRetryPolicy<u64, String> =
            ResultRetryPolicy::linear_transient_default(3, Duration::from_millis(100));

        let interval = policy.interval();
        assert!(!interval.immediate_first_retry());
        assert_eq!(interval.interval(0), Duration::ZERO);
        assert_eq!(interval.interval(1), Duration::from_millis(100));
        assert_eq!(interval.interval(2), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn zero_budget_invokes_exactly_once() {
        let policy: RetryPolicy<&str> = RetryPolicy::new(
            0,
            FaultClassifier::transient(),
            RetryInterval::constant(Duration::ZERO, true),
        );

        let mut calls = 0;
        let result = policy
            .run(|| {
                calls += 1;
                async { Err("always") }
            })
            .await;

        assert_eq!(result, Err("always"));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn result_classifier_is_consulted_before_the_budget() {
        let consulted = Arc::new(AtomicU32::new(0));
        let policy: ResultRetryPolicy<u32, &str> = ResultRetryPolicy::new(
            0,
            ResultClassifier::from_result_fn({
                let consulted = consulted.clone();
                move |_| {
                    consulted.fetch_add(1, Ordering::SeqCst);
                    true
                }
            }),
            RetryInterval::constant(Duration::ZERO, true),
        );

        let result = policy.run(|| async { Ok(5u32) }).await;

        // Even with the budget already spent, every result goes through
        // the classifier before the return.
        assert_eq!(result, Ok(5));
        assert_eq!(consulted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_with_forwards_the_argument_each_attempt() {
        let policy: ResultRetryPolicy<u32, &str> = ResultRetryPolicy::new(
            2,
            ResultClassifier::new(),
            RetryInterval::constant(Duration::ZERO, true),
        );

        let mut calls = 0;
        let result = policy
            .run_with(
                |arg: u32, _token| {
                    calls += 1;
                    let outcome = if calls < 2 { Err("flaky") } else { Ok(arg * 2) };
                    async move { outcome }
                },
                21,
                CancellationToken::new(),
            )
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls, 2);
    }
}
