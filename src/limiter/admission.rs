//! Decisions emitted by the limiter.

// self
use crate::{_prelude::*, limiter::WindowCounter};

/// Result of [`SlidingWindowLimiter::admit`](crate::limiter::SlidingWindowLimiter::admit).
///
/// Rejections are backpressure, not errors: callers should surface
/// [`RetryDirective::retry_after`] to the client and keep them apart from authentication
/// failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
	/// The request was counted and may proceed.
	Admitted {
		/// Budget left in the current window.
		remaining: u64,
	},
	/// The key exhausted its budget for the current window.
	Rejected(RetryDirective),
	/// The request proceeds without having been counted.
	Bypassed(BypassReason),
}
impl Admission {
	/// Returns `true` when the request may proceed, counted or not.
	pub fn is_allowed(&self) -> bool {
		!matches!(self, Self::Rejected(_))
	}

	/// Returns `true` for [`Admission::Rejected`].
	pub fn is_rejected(&self) -> bool {
		matches!(self, Self::Rejected(_))
	}

	/// Retry hint carried by a rejection.
	pub fn retry_directive(&self) -> Option<&RetryDirective> {
		match self {
			Self::Rejected(directive) => Some(directive),
			_ => None,
		}
	}
}

/// Why a request went through without being counted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BypassReason {
	/// The limiter is switched off.
	Disabled,
	/// The counter store was unreachable and the policy is fail-open.
	StoreUnavailable,
}

/// Advises callers when to retry after a rejection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant the current window rolls over.
	pub earliest_retry_at: OffsetDateTime,
	/// Time left until `earliest_retry_at`; always positive for a rejection.
	pub retry_after: Duration,
}
impl RetryDirective {
	/// Builds the directive for an exhausted window observed at `now`.
	pub fn for_window(counter: &WindowCounter, now: OffsetDateTime) -> Self {
		Self { earliest_retry_at: counter.window_end(), retry_after: counter.retry_after(now) }
	}

	/// Whole seconds to advertise in a `Retry-After` header, rounded up and never zero.
	pub fn retry_after_secs(&self) -> u64 {
		let millis = u128::try_from(self.retry_after.whole_milliseconds()).unwrap_or(0).max(1);

		u64::try_from(millis.div_ceil(1_000)).unwrap_or(u64::MAX)
	}
}

/// Per-key state reported by
/// [`SlidingWindowLimiter::peek`](crate::limiter::SlidingWindowLimiter::peek).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WindowState {
	/// No live window: the key is unseen or its window elapsed.
	Fresh,
	/// Budget remains in the current window.
	Active {
		/// Requests admitted so far.
		count: u64,
		/// Budget left.
		remaining: u64,
	},
	/// The budget is spent until the window rolls over.
	Exhausted {
		/// Time until roll-over.
		retry_after: Duration,
	},
}
impl WindowState {
	/// Classifies a stored counter at `now`.
	pub fn of(counter: Option<&WindowCounter>, now: OffsetDateTime) -> Self {
		match counter {
			None => Self::Fresh,
			Some(counter) if counter.is_elapsed_at(now) => Self::Fresh,
			Some(counter) if counter.count >= counter.limit =>
				Self::Exhausted { retry_after: counter.retry_after(now) },
			Some(counter) => Self::Active { count: counter.count, remaining: counter.remaining() },
		}
	}
}
