//! Thread-safe in-memory store for single-instance deployments and tests.

// self
use crate::{
	_prelude::*,
	auth::SubjectId,
	limiter::WindowCounter,
	store::{
		ConsumeOutcome, CounterStore, Ledger, RetiredToken, RevocationStore, StoreFuture, WindowHit,
	},
};

type LedgerCell = Arc<RwLock<Ledger>>;
type WindowMap = Arc<Mutex<HashMap<String, WindowCounter>>>;

/// Process-local backend implementing both [`RevocationStore`] and [`CounterStore`].
///
/// Every operation runs under a single lock acquisition, so check-and-update sequences are
/// atomic with respect to other callers sharing the same instance.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	ledger: LedgerCell,
	windows: WindowMap,
}
impl MemoryStore {
	/// Number of live rate-limit counters.
	pub fn counter_len(&self) -> usize {
		self.windows.lock().len()
	}

	fn acquire_now(
		windows: WindowMap,
		key: &str,
		limit: u64,
		window_length: Duration,
		now: OffsetDateTime,
	) -> WindowHit {
		let mut guard = windows.lock();
		let counter = guard
			.entry(key.to_owned())
			.or_insert_with(|| WindowCounter::fresh(limit, window_length, now));

		// Configuration may change between calls; the newest values win.
		counter.limit = limit;
		counter.window_length = window_length;

		if counter.try_admit(now) {
			WindowHit::Admitted(counter.clone())
		} else {
			WindowHit::Exhausted(counter.clone())
		}
	}

	fn evict_now(windows: WindowMap, now: OffsetDateTime) -> usize {
		let mut guard = windows.lock();
		let before = guard.len();

		guard.retain(|_, counter| !counter.is_elapsed_at(now));

		before - guard.len()
	}
}
impl RevocationStore for MemoryStore {
	fn consume(&self, entry: RetiredToken) -> StoreFuture<'_, ConsumeOutcome> {
		let ledger = self.ledger.clone();

		Box::pin(async move { Ok(ledger.write().consume(entry)) })
	}

	fn revoke_subject<'a>(
		&'a self,
		subject: &'a SubjectId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		let ledger = self.ledger.clone();
		let subject = subject.to_owned();

		Box::pin(async move {
			ledger.write().revoke_subject(&subject, instant);

			Ok(())
		})
	}

	fn subject_cutoff<'a>(
		&'a self,
		subject: &'a SubjectId,
	) -> StoreFuture<'a, Option<OffsetDateTime>> {
		let ledger = self.ledger.clone();
		let subject = subject.to_owned();

		Box::pin(async move { Ok(ledger.read().cutoff(&subject)) })
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		let ledger = self.ledger.clone();

		Box::pin(async move { Ok(ledger.write().purge_expired(now)) })
	}
}
impl CounterStore for MemoryStore {
	fn try_acquire<'a>(
		&'a self,
		key: &'a str,
		limit: u64,
		window_length: Duration,
		now: OffsetDateTime,
	) -> StoreFuture<'a, WindowHit> {
		let windows = self.windows.clone();

		Box::pin(async move { Ok(Self::acquire_now(windows, key, limit, window_length, now)) })
	}

	fn peek<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<WindowCounter>> {
		let windows = self.windows.clone();

		Box::pin(async move { Ok(windows.lock().get(key).cloned()) })
	}

	fn evict_idle(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		let windows = self.windows.clone();

		Box::pin(async move { Ok(Self::evict_now(windows, now)) })
	}
}
