//! Shared-state contracts consumed by the authority and the limiter, plus built-in backends.
//!
//! Both contracts are atomic per call: a [`RevocationStore::consume`] either retires the token
//! identifier or reports that it was already retired, and a [`CounterStore::try_acquire`]
//! performs the roll-over/compare/increment sequence as one step. Callers never read-then-write.

pub mod file;
pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "redis")] pub use redis::RedisStore;

// self
use crate::{
	_prelude::*,
	auth::{SubjectId, TokenId},
	limiter::WindowCounter,
};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Ledger of retired refresh-token identifiers and per-subject revocation cut-offs.
pub trait RevocationStore
where
	Self: Send + Sync,
{
	/// Atomically retires `entry.token_id` unless it was retired before.
	fn consume(&self, entry: RetiredToken) -> StoreFuture<'_, ConsumeOutcome>;

	/// Revokes every refresh token of `subject` issued at or before `instant`.
	///
	/// Cut-offs only move forward; an older instant leaves the stored one untouched.
	fn revoke_subject<'a>(
		&'a self,
		subject: &'a SubjectId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, ()>;

	/// Returns the revocation cut-off recorded for `subject`, if any.
	fn subject_cutoff<'a>(
		&'a self,
		subject: &'a SubjectId,
	) -> StoreFuture<'a, Option<OffsetDateTime>>;

	/// Drops retired entries whose token has expired anyway. Returns the number removed.
	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize>;
}

/// Shared per-key counters backing the limiter.
pub trait CounterStore
where
	Self: Send + Sync,
{
	/// Atomically rolls the window for `key` over if it elapsed, then admits the request when
	/// fewer than `limit` requests were admitted in the current window.
	fn try_acquire<'a>(
		&'a self,
		key: &'a str,
		limit: u64,
		window_length: Duration,
		now: OffsetDateTime,
	) -> StoreFuture<'a, WindowHit>;

	/// Reads the counter for `key` without consuming budget.
	fn peek<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<WindowCounter>>;

	/// Evicts counters whose window has elapsed at `now`. Returns the number removed.
	fn evict_idle(&self, now: OffsetDateTime) -> StoreFuture<'_, usize>;
}

/// Why a refresh-token identifier was retired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireReason {
	/// Exchanged for a new pair during refresh.
	Rotated,
	/// Explicitly revoked (logout).
	Revoked,
}
impl RetireReason {
	/// Returns a stable label for storage backends.
	pub const fn as_str(self) -> &'static str {
		match self {
			RetireReason::Rotated => "rotated",
			RetireReason::Revoked => "revoked",
		}
	}
}
impl FromStr for RetireReason {
	type Err = StoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"rotated" => Ok(Self::Rotated),
			"revoked" => Ok(Self::Revoked),
			other => Err(StoreError::Serialization {
				message: format!("Unknown retire reason `{other}`"),
			}),
		}
	}
}

/// Ledger entry for a retired refresh token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetiredToken {
	/// Identifier of the retired token.
	pub token_id: TokenId,
	/// Subject the token belonged to.
	pub subject: SubjectId,
	/// Why the token was retired.
	pub reason: RetireReason,
	/// Retirement instant.
	pub retired_at: OffsetDateTime,
	/// Expiry of the retired token; the entry is useless afterwards.
	pub expires_at: OffsetDateTime,
}

/// Result of [`RevocationStore::consume`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumeOutcome {
	/// The identifier was live and is now retired.
	Consumed,
	/// The identifier had already been retired for the given reason.
	AlreadyRetired(RetireReason),
}

/// Result of [`CounterStore::try_acquire`], carrying the counter state after the call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WindowHit {
	/// The request was counted.
	Admitted(WindowCounter),
	/// The window budget was already spent; nothing was counted.
	Exhausted(WindowCounter),
}

/// Error type produced by store implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// The backing store could not be reached (connection refused, timeout).
	#[error("Store unreachable: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// In-process ledger state shared by the memory and file backends.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct Ledger {
	retired: HashMap<TokenId, RetiredToken>,
	cutoffs: HashMap<SubjectId, OffsetDateTime>,
}
impl Ledger {
	pub(crate) fn consume(&mut self, entry: RetiredToken) -> ConsumeOutcome {
		match self.retired.get(&entry.token_id) {
			Some(existing) => ConsumeOutcome::AlreadyRetired(existing.reason),
			None => {
				self.retired.insert(entry.token_id.clone(), entry);

				ConsumeOutcome::Consumed
			},
		}
	}

	pub(crate) fn revoke_subject(&mut self, subject: &SubjectId, instant: OffsetDateTime) {
		let cutoff = self.cutoffs.entry(subject.clone()).or_insert(instant);

		if *cutoff < instant {
			*cutoff = instant;
		}
	}

	pub(crate) fn cutoff(&self, subject: &SubjectId) -> Option<OffsetDateTime> {
		self.cutoffs.get(subject).copied()
	}

	pub(crate) fn purge_expired(&mut self, now: OffsetDateTime) -> usize {
		let before = self.retired.len();

		self.retired.retain(|_, entry| entry.expires_at > now);

		before - self.retired.len()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn retired(token_id: &str, reason: RetireReason) -> RetiredToken {
		RetiredToken {
			token_id: TokenId::new(token_id).expect("Token id fixture should be valid."),
			subject: SubjectId::new("user-1").expect("Subject fixture should be valid."),
			reason,
			retired_at: macros::datetime!(2025-01-01 00:00 UTC),
			expires_at: macros::datetime!(2025-01-08 00:00 UTC),
		}
	}

	#[test]
	fn ledger_consumes_each_identifier_once() {
		let mut ledger = Ledger::default();

		assert_eq!(ledger.consume(retired("t1", RetireReason::Rotated)), ConsumeOutcome::Consumed);
		assert_eq!(
			ledger.consume(retired("t1", RetireReason::Rotated)),
			ConsumeOutcome::AlreadyRetired(RetireReason::Rotated)
		);
		assert_eq!(ledger.consume(retired("t2", RetireReason::Revoked)), ConsumeOutcome::Consumed);
		assert_eq!(
			ledger.consume(retired("t2", RetireReason::Rotated)),
			ConsumeOutcome::AlreadyRetired(RetireReason::Revoked)
		);
	}

	#[test]
	fn subject_cutoffs_only_move_forward() {
		let mut ledger = Ledger::default();
		let subject = SubjectId::new("user-1").expect("Subject fixture should be valid.");
		let later = macros::datetime!(2025-01-02 00:00 UTC);

		ledger.revoke_subject(&subject, later);
		ledger.revoke_subject(&subject, macros::datetime!(2025-01-01 00:00 UTC));

		assert_eq!(ledger.cutoff(&subject), Some(later));
	}

	#[test]
	fn purge_drops_only_expired_entries() {
		let mut ledger = Ledger::default();
		let mut short = retired("short", RetireReason::Rotated);

		short.expires_at = macros::datetime!(2025-01-01 00:30 UTC);
		ledger.consume(short);
		ledger.consume(retired("long", RetireReason::Rotated));

		assert_eq!(ledger.purge_expired(macros::datetime!(2025-01-01 01:00 UTC)), 1);
		assert_eq!(
			ledger.consume(retired("long", RetireReason::Rotated)),
			ConsumeOutcome::AlreadyRetired(RetireReason::Rotated)
		);
	}

	#[test]
	fn retire_reason_labels_round_trip() {
		for reason in [RetireReason::Rotated, RetireReason::Revoked] {
			assert_eq!(reason.as_str().parse::<RetireReason>(), Ok(reason));
		}

		assert!("stolen".parse::<RetireReason>().is_err());
	}
}
