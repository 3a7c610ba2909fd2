//! Per-key admission control over a shared fixed-window counter.
//!
//! The read/compare/increment sequence runs inside the [`CounterStore`] as one atomic call, so
//! concurrent requests for the same key can never be admitted past the configured limit. The
//! limiter itself keeps no per-key state.

pub mod config;

mod admission;
mod key;
mod window;

pub use admission::*;
pub use config::*;
pub use key::RateLimitKey;
pub use window::WindowCounter;

// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	obs::{self, OpOutcome, OpSpan, Operation},
	store::{CounterStore, WindowHit},
};

/// Admission-control gate bounding request rate per key.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
	config: Arc<LimiterConfig>,
	store: Arc<dyn CounterStore>,
	clock: Arc<dyn Clock>,
}
impl SlidingWindowLimiter {
	/// Creates a limiter over the given budget and counter store.
	pub fn new(config: LimiterConfig, store: Arc<dyn CounterStore>) -> Self {
		Self { config: Arc::new(config), store, clock: Arc::new(SystemClock) }
	}

	/// Replaces the clock consulted by [`SlidingWindowLimiter::admit_now`].
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &LimiterConfig {
		&self.config
	}

	/// Decides whether `key` may proceed at `now`, counting the request when it does.
	///
	/// Returns [`Error::Unavailable`] only when the store is unreachable under
	/// [`FailurePolicy::FailClosed`].
	pub async fn admit(&self, key: &RateLimitKey, now: OffsetDateTime) -> Result<Admission> {
		const OP: Operation = Operation::Admit;

		if !self.config.enabled {
			return Ok(Admission::Bypassed(BypassReason::Disabled));
		}

		let span = OpSpan::new(OP, "admit");
		let store_key = self.config.store_key(key);

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let hit = span
			.instrument(self.store.try_acquire(
				&store_key,
				self.config.limit,
				self.config.window_length,
				now,
			))
			.await;

		match hit {
			Ok(WindowHit::Admitted(counter)) => {
				obs::record_op_outcome(OP, OpOutcome::Success);

				Ok(Admission::Admitted { remaining: counter.remaining() })
			},
			Ok(WindowHit::Exhausted(counter)) => {
				let directive = RetryDirective::for_window(&counter, now);

				obs::log_rejected(&store_key, directive.retry_after);
				obs::record_op_outcome(OP, OpOutcome::Rejected);

				Ok(Admission::Rejected(directive))
			},
			Err(err) => {
				let fail_open = self.config.failure_policy == FailurePolicy::FailOpen;

				obs::log_unavailable(OP, &err, fail_open);
				obs::record_op_outcome(OP, OpOutcome::Failure);

				if fail_open {
					Ok(Admission::Bypassed(BypassReason::StoreUnavailable))
				} else {
					Err(err.into())
				}
			},
		}
	}

	/// [`SlidingWindowLimiter::admit`] at the limiter clock's current instant.
	pub async fn admit_now(&self, key: &RateLimitKey) -> Result<Admission> {
		self.admit(key, self.clock.now()).await
	}

	/// Reports the window state of `key` without consuming budget.
	pub async fn peek(&self, key: &RateLimitKey, now: OffsetDateTime) -> Result<WindowState> {
		let counter = self.store.peek(&self.config.store_key(key)).await?;

		Ok(WindowState::of(counter.as_ref(), now))
	}

	/// Drops counters whose window elapsed before `now`.
	pub async fn evict_idle(&self, now: OffsetDateTime) -> Result<usize> {
		Ok(self.store.evict_idle(now).await?)
	}
}
impl Debug for SlidingWindowLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SlidingWindowLimiter").field("config", &self.config).finish()
	}
}
