//! Transient-fault classification.
//!
//! Classifiers decide whether a failed attempt is worth retrying. They are
//! pure predicates over the operation's error type (and, for result-aware
//! policies, over the returned value), held behind `Arc` so a single
//! classifier can back any number of concurrent runs.
//!
//! The default stance is permissive: every error is transient and every
//! result is accepted. Callers opt *out* of retrying specific errors rather
//! than opting in.

use std::fmt;
use std::sync::Arc;

/// Decides whether an error is transient and worth retrying.
///
/// # Examples
///
/// ```rust
/// use relent::FaultClassifier;
///
/// #[derive(Debug)]
/// enum DbError {
///     Timeout,
///     SchemaMismatch,
/// }
///
/// let classifier = FaultClassifier::from_fn(|e: &DbError| matches!(e, DbError::Timeout));
///
/// assert!(classifier.is_transient_error(&DbError::Timeout));
/// assert!(!classifier.is_transient_error(&DbError::SchemaMismatch));
/// ```
pub struct FaultClassifier<E> {
    error_predicate: Arc<dyn Fn(&E) -> bool + Send + Sync>,
}

impl<E> FaultClassifier<E> {
    /// Classifier that treats every error as transient.
    ///
    /// This is the base policy: retry everything, and narrow down with
    /// [`FaultClassifier::from_fn`] when some errors are known to be fatal.
    pub fn transient() -> Self {
        Self {
            error_predicate: Arc::new(|_| true),
        }
    }

    /// Classifier delegating to the given predicate.
    pub fn from_fn<F>(error_predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            error_predicate: Arc::new(error_predicate),
        }
    }

    /// Whether `error` is transient, i.e. the attempt should be retried.
    pub fn is_transient_error(&self, error: &E) -> bool {
        (self.error_predicate)(error)
    }
}

impl<E> Default for FaultClassifier<E> {
    fn default() -> Self {
        Self::transient()
    }
}

impl<E> Clone for FaultClassifier<E> {
    fn clone(&self) -> Self {
        Self {
            error_predicate: Arc::clone(&self.error_predicate),
        }
    }
}

impl<E> fmt::Debug for FaultClassifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultClassifier").finish_non_exhaustive()
    }
}

/// Decides transience for both errors and successfully returned values.
///
/// An operation can "succeed" with a value that still means "not ready yet"
/// - a sentinel, an empty page, a default-initialized record. A
/// `ResultClassifier` lets the policy treat such values like transient
/// faults: the value is discarded and the operation retried, without ever
/// turning it into an error.
///
/// # Examples
///
/// ```rust
/// use relent::ResultClassifier;
///
/// let classifier = ResultClassifier::<Option<u64>, String>::from_result_fn(Option::is_none);
///
/// assert!(classifier.is_transient_result(&None));
/// assert!(!classifier.is_transient_result(&Some(7)));
/// // Only a result predicate was given, so every error stays transient.
/// assert!(classifier.is_transient_error(&"boom".to_string()));
/// ```
pub struct ResultClassifier<T, E> {
    error_predicate: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    result_predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T, E> ResultClassifier<T, E> {
    /// Base policy: every error is transient, no result is.
    pub fn new() -> Self {
        Self {
            error_predicate: Arc::new(|_| true),
            result_predicate: Arc::new(|_| false),
        }
    }

    /// Classifier delegating both predicates to the given functions.
    pub fn from_fns<F, G>(error_predicate: F, result_predicate: G) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
        G: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            error_predicate: Arc::new(error_predicate),
            result_predicate: Arc::new(result_predicate),
        }
    }

    /// Classifier with a result predicate only; errors stay transient.
    pub fn from_result_fn<G>(result_predicate: G) -> Self
    where
        G: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::from_fns(|_| true, result_predicate)
    }

    /// Whether `error` is transient, i.e. the attempt should be retried.
    pub fn is_transient_error(&self, error: &E) -> bool {
        (self.error_predicate)(error)
    }

    /// Whether `result` should be treated as a transient fault.
    pub fn is_transient_result(&self, result: &T) -> bool {
        (self.result_predicate)(result)
    }
}

impl<T, E> ResultClassifier<T, E>
where
    T: Default + PartialEq + 'static,
{
    /// Classifier treating a result equal to `T::default()` as transient.
    ///
    /// This models "the operation has not produced real data yet", e.g. a
    /// lookup returning `None` or a counter still at zero. It is a coarse
    /// heuristic: a legitimate result that happens to equal the default
    /// value is indistinguishable from "not ready" and will be retried
    /// until the budget runs out, then returned as-is.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relent::ResultClassifier;
    ///
    /// let classifier = ResultClassifier::<u64, String>::transient_default();
    ///
    /// assert!(classifier.is_transient_result(&0));
    /// assert!(!classifier.is_transient_result(&42));
    /// ```
    pub fn transient_default() -> Self {
        Self::from_result_fn(|result: &T| *result == T::default())
    }
}

impl<T, E> Default for ResultClassifier<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for ResultClassifier<T, E> {
    fn clone(&self) -> Self {
        Self {
            error_predicate: Arc::clone(&self.error_predicate),
            result_predicate: Arc::clone(&self.result_predicate),
        }
    }
}

impl<T, E> fmt::Debug for ResultClassifier<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultClassifier").finish_non_exhaustive()
    }
}
