//! Fixed-window counter state and its admission step.

// crates.io
use time::PrimitiveDateTime;
// self
use crate::_prelude::*;

/// Per-key accounting window.
///
/// `count` is the number of requests admitted since `window_start`. Once
/// `now - window_start >= window_length` the window rolls over before admission is evaluated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounter {
	/// Start of the current accounting window.
	pub window_start: OffsetDateTime,
	/// Requests admitted in the current window.
	pub count: u64,
	/// Maximum admissions per window.
	pub limit: u64,
	/// Window size.
	pub window_length: Duration,
}
impl WindowCounter {
	/// Creates an empty window opened at `now`.
	pub fn fresh(limit: u64, window_length: Duration, now: OffsetDateTime) -> Self {
		Self { window_start: now, count: 0, limit, window_length }
	}

	/// Returns `true` when the window has elapsed at `now`.
	pub fn is_elapsed_at(&self, now: OffsetDateTime) -> bool {
		now - self.window_start >= self.window_length
	}

	/// Restarts the window at `now` if it elapsed.
	pub fn roll_over(&mut self, now: OffsetDateTime) {
		if self.is_elapsed_at(now) {
			self.window_start = now;
			self.count = 0;
		}
	}

	/// Rolls over if needed, then counts the request when budget remains.
	pub fn try_admit(&mut self, now: OffsetDateTime) -> bool {
		self.roll_over(now);

		if self.count >= self.limit {
			return false;
		}

		self.count += 1;

		true
	}

	/// Budget left in the current window.
	pub fn remaining(&self) -> u64 {
		self.limit.saturating_sub(self.count)
	}

	/// Instant the current window ends, saturating at the last representable instant.
	pub fn window_end(&self) -> OffsetDateTime {
		self.window_start
			.checked_add(self.window_length)
			.unwrap_or(PrimitiveDateTime::MAX.assume_utc())
	}

	/// Time until the window rolls over, clamped to `[0, window_length]`.
	pub fn retry_after(&self, now: OffsetDateTime) -> Duration {
		let left = self.window_length.saturating_sub(now - self.window_start);

		left.clamp(Duration::ZERO, self.window_length)
	}
}
