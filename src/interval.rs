//! Retry interval scheduling.
//!
//! A [`RetryInterval`] maps "number of attempts already made" to the delay
//! before the next attempt. Schedulers are pure data: they describe the
//! backoff curve but never sleep themselves, which keeps them trivially
//! testable and safe to share across concurrent runs.
//!
//! # Tick convention
//!
//! Formulas are evaluated at a **one-based tick**. When
//! `immediate_first_retry` is false, attempt `retried` maps to tick
//! `retried + 1`; when it is true, the first retry bypasses the formula
//! entirely (zero delay) and attempt `retried` maps to tick `retried`.
//! Either way, the nth *delayed* retry sees the same tick, so enabling the
//! immediate first retry shifts the whole schedule by one attempt instead of
//! skipping a step of the curve.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A backoff schedule for retry delays.
///
/// `RetryInterval` is immutable and cheap to clone (custom formulas are
/// reference-counted), so one instance can serve arbitrarily many concurrent
/// policy runs.
///
/// # Examples
///
/// ```rust
/// use relent::RetryInterval;
/// use std::time::Duration;
///
/// let interval = RetryInterval::constant(Duration::from_millis(500), true);
///
/// // Immediate first retry, constant afterwards.
/// assert_eq!(interval.interval(0), Duration::ZERO);
/// assert_eq!(interval.interval(1), Duration::from_millis(500));
/// assert_eq!(interval.interval(2), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone)]
pub struct RetryInterval {
    immediate_first_retry: bool,
    formula: IntervalFormula,
}

/// The tick-to-duration formula behind a [`RetryInterval`].
///
/// The variant set is closed: constant, linear-with-cap, and a delegating
/// escape hatch for bespoke or test schedules.
#[derive(Clone)]
pub enum IntervalFormula {
    /// Fixed delay, independent of tick.
    Constant(Duration),
    /// Delay grows linearly and saturates at a ceiling:
    /// `min(maximum, initial + increment * (tick - 1))`.
    Linear {
        /// Delay at tick 1.
        initial: Duration,
        /// Added per subsequent tick.
        increment: Duration,
        /// Ceiling the schedule saturates at.
        maximum: Duration,
    },
    /// Delegates to an arbitrary function of the one-based tick.
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl RetryInterval {
    /// Create a constant-delay schedule.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relent::RetryInterval;
    /// use std::time::Duration;
    ///
    /// let interval = RetryInterval::constant(Duration::from_millis(100), false);
    ///
    /// assert_eq!(interval.interval(0), Duration::from_millis(100));
    /// assert_eq!(interval.interval(5), Duration::from_millis(100));
    /// ```
    pub fn constant(interval: Duration, immediate_first_retry: bool) -> Self {
        Self {
            immediate_first_retry,
            formula: IntervalFormula::Constant(interval),
        }
    }

    /// Create a linear-backoff schedule saturating at `maximum`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relent::RetryInterval;
    /// use std::time::Duration;
    ///
    /// let interval = RetryInterval::linear(
    ///     Duration::ZERO,
    ///     Duration::from_millis(100),
    ///     Duration::from_millis(250),
    ///     false,
    /// );
    ///
    /// // 0ms, 100ms, 200ms, then capped at 250ms.
    /// assert_eq!(interval.interval(0), Duration::ZERO);
    /// assert_eq!(interval.interval(1), Duration::from_millis(100));
    /// assert_eq!(interval.interval(2), Duration::from_millis(200));
    /// assert_eq!(interval.interval(3), Duration::from_millis(250));
    /// ```
    pub fn linear(
        initial: Duration,
        increment: Duration,
        maximum: Duration,
        immediate_first_retry: bool,
    ) -> Self {
        Self {
            immediate_first_retry,
            formula: IntervalFormula::Linear {
                initial,
                increment,
                maximum,
            },
        }
    }

    /// Create a schedule from an arbitrary function of the one-based tick.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relent::RetryInterval;
    /// use std::time::Duration;
    ///
    /// // Exponential doubling: 100ms, 200ms, 400ms, ...
    /// let interval = RetryInterval::from_fn(
    ///     |tick| Duration::from_millis(100) * 2u32.saturating_pow(tick - 1),
    ///     false,
    /// );
    ///
    /// assert_eq!(interval.interval(0), Duration::from_millis(100));
    /// assert_eq!(interval.interval(1), Duration::from_millis(200));
    /// assert_eq!(interval.interval(2), Duration::from_millis(400));
    /// ```
    pub fn from_fn<F>(formula: F, immediate_first_retry: bool) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            immediate_first_retry,
            formula: IntervalFormula::Custom(Arc::new(formula)),
        }
    }

    /// Whether the very first retry fires without delay.
    pub fn immediate_first_retry(&self) -> bool {
        self.immediate_first_retry
    }

    /// The formula this schedule evaluates.
    pub fn formula(&self) -> &IntervalFormula {
        &self.formula
    }

    /// Delay before the next attempt, given how many retries have already
    /// been made.
    ///
    /// `retried` is zero for the first retry. With `immediate_first_retry`
    /// set, that first call returns [`Duration::ZERO`] without consulting
    /// the formula.
    pub fn interval(&self, retried: u32) -> Duration {
        if self.immediate_first_retry && retried == 0 {
            return Duration::ZERO;
        }

        let tick = if self.immediate_first_retry {
            retried
        } else {
            retried + 1
        };

        self.formula.at_tick(tick)
    }
}

impl IntervalFormula {
    /// Evaluate the formula at a one-based tick.
    fn at_tick(&self, tick: u32) -> Duration {
        debug_assert!(tick >= 1, "ticks are one-based");

        match self {
            IntervalFormula::Constant(interval) => *interval,
            IntervalFormula::Linear {
                initial,
                increment,
                maximum,
            } => initial
                .saturating_add(increment.saturating_mul(tick - 1))
                .min(*maximum),
            IntervalFormula::Custom(formula) => formula(tick),
        }
    }
}

impl fmt::Debug for IntervalFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalFormula::Constant(interval) => {
                f.debug_tuple("Constant").field(interval).finish()
            }
            IntervalFormula::Linear {
                initial,
                increment,
                maximum,
            } => f
                .debug_struct("Linear")
                .field("initial", initial)
                .field("increment", increment)
                .field("maximum", maximum)
                .finish(),
            IntervalFormula::Custom(_) => f.debug_tuple("Custom").field(&"..").finish(),
        }
    }
}
