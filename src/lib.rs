//! # Relent
//!
//! > *Classify, back off, try again.*
//!
//! Transient-fault retry policies for async Rust.
//!
//! ## Philosophy
//!
//! A retry policy decouples *how to call an operation* from *when and
//! whether to call it again*. **Relent** keeps that split explicit with
//! three small pieces:
//!
//! - A [`FaultClassifier`] (or [`ResultClassifier`]) decides whether a
//!   failure - or an unsatisfactory result - is transient and worth
//!   another attempt.
//! - A [`RetryInterval`] computes the delay before each retry: constant,
//!   linear with a cap, or any custom curve, with optional zero-delay
//!   first retry.
//! - A [`RetryPolicy`] (or [`ResultRetryPolicy`]) owns the retry budget
//!   and drives the attempt / classify / delay loop.
//!
//! All three are immutable values with no shared mutable state: build them
//! once, share them across as many concurrent runs as you like.
//!
//! ## Quick Example
//!
//! ```rust
//! use relent::{FaultClassifier, RetryInterval, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::new(
//!     3,
//!     FaultClassifier::from_fn(|e: &std::io::Error| {
//!         e.kind() == std::io::ErrorKind::TimedOut
//!     }),
//!     RetryInterval::linear(
//!         Duration::from_millis(100),
//!         Duration::from_millis(100),
//!         Duration::from_secs(1),
//!         true,
//!     ),
//! );
//!
//! let mut calls = 0;
//! let result = policy
//!     .run(|| {
//!         calls += 1;
//!         let outcome = if calls < 2 {
//!             Err(std::io::Error::from(std::io::ErrorKind::TimedOut))
//!         } else {
//!             Ok(())
//!         };
//!         async move { outcome }
//!     })
//!     .await;
//!
//! assert!(result.is_ok());
//! assert_eq!(calls, 2);
//! # });
//! ```
//!
//! Runs are cooperative and cancellable: pass a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) to
//! [`RetryPolicy::run_cancellable`] and the policy stops scheduling new
//! attempts as soon as the token fires.
//!
//! The [`testing`] module ships spy harnesses for asserting that a policy
//! drove an operation exactly once per attempt.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod classify;
pub mod interval;
pub mod policy;
pub mod testing;

// Re-exports
pub use classify::{FaultClassifier, ResultClassifier};
pub use interval::{IntervalFormula, RetryInterval};
pub use policy::{ResultRetryPolicy, RetryPolicy};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::classify::{FaultClassifier, ResultClassifier};
    pub use crate::interval::{IntervalFormula, RetryInterval};
    pub use crate::policy::{ResultRetryPolicy, RetryPolicy};
    pub use tokio_util::sync::CancellationToken;
}
