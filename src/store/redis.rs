//! Redis-backed store shared by every serving instance.
//!
//! The conditional increment runs as a Lua script so the roll-over/compare/increment sequence is
//! atomic on the server; token consumption relies on `SET NX`.

// crates.io
use redis::{AsyncCommands, Client, RedisError, Script, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	auth::SubjectId,
	authority::AuthorityConfig,
	limiter::WindowCounter,
	store::{
		ConsumeOutcome, CounterStore, RetireReason, RetiredToken, RevocationStore, StoreError,
		StoreFuture, WindowHit,
	},
};

const ACQUIRE_SCRIPT: &str = r"
local state = redis.call('HMGET', KEYS[1], 'start', 'count')
local limit = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local start = tonumber(state[1])
local count = tonumber(state[2])
if start == nil or now - start >= window then
	start = now
	count = 0
end
local admitted = 0
if count < limit then
	count = count + 1
	admitted = 1
end
redis.call('HSET', KEYS[1], 'start', start, 'count', count, 'limit', limit, 'window', window)
redis.call('PEXPIRE', KEYS[1], math.max(window - (now - start), 1))
return {admitted, start, count}
";
const CUTOFF_SCRIPT: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]))
local next = tonumber(ARGV[1])
if current == nil or current < next then
	redis.call('SET', KEYS[1], next, 'PX', ARGV[2])
end
return 1
";

/// Multi-instance backend implementing both [`RevocationStore`] and [`CounterStore`].
///
/// Every key expires on its own. Retired token identifiers live until the token would have
/// expired, window counters until their window closes, and subject cut-offs for
/// [`RedisStore::with_cutoff_ttl`] after they were last moved.
#[derive(Clone)]
pub struct RedisStore {
	connection: ConnectionManager,
	prefix: String,
	cutoff_ttl: Duration,
	acquire: Arc<Script>,
	cutoff: Arc<Script>,
}
impl RedisStore {
	/// Connects to `url` and namespaces every key under `prefix`.
	pub async fn connect(url: &Url, prefix: impl Into<String>) -> Result<Self, StoreError> {
		let client = Client::open(url.as_str()).map_err(map_redis_error)?;
		let connection = ConnectionManager::new(client).await.map_err(map_redis_error)?;

		Ok(Self {
			connection,
			prefix: prefix.into(),
			cutoff_ttl: AuthorityConfig::DEFAULT_REFRESH_LIFETIME,
			acquire: Arc::new(Script::new(ACQUIRE_SCRIPT)),
			cutoff: Arc::new(Script::new(CUTOFF_SCRIPT)),
		})
	}

	/// Sets how long a subject cut-off is retained.
	///
	/// Must be at least the refresh-token lifetime; a shorter TTL lets tokens issued before the
	/// cut-off refresh again once the key expires.
	pub fn with_cutoff_ttl(mut self, ttl: Duration) -> Self {
		self.cutoff_ttl = ttl;

		self
	}

	fn window_key(&self, key: &str) -> String {
		format!("{}:window:{key}", self.prefix)
	}

	fn retired_key(&self, token_id: &str) -> String {
		format!("{}:retired:{token_id}", self.prefix)
	}

	fn cutoff_key(&self, subject: &str) -> String {
		format!("{}:cutoff:{subject}", self.prefix)
	}
}
impl Debug for RedisStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisStore")
			.field("prefix", &self.prefix)
			.field("cutoff_ttl", &self.cutoff_ttl)
			.finish()
	}
}
impl RevocationStore for RedisStore {
	fn consume(&self, entry: RetiredToken) -> StoreFuture<'_, ConsumeOutcome> {
		Box::pin(async move {
			let mut connection = self.connection.clone();
			let key = self.retired_key(&entry.token_id);
			let ttl_ms = millis(entry.expires_at - entry.retired_at).max(1_000);
			let set: Option<String> = redis::cmd("SET")
				.arg(&key)
				.arg(entry.reason.as_str())
				.arg("NX")
				.arg("PX")
				.arg(ttl_ms)
				.query_async(&mut connection)
				.await
				.map_err(map_redis_error)?;

			if set.is_some() {
				return Ok(ConsumeOutcome::Consumed);
			}

			let existing: Option<String> =
				connection.get(&key).await.map_err(map_redis_error)?;
			let reason = match existing {
				Some(label) => label.parse::<RetireReason>()?,
				// Expired between SET and GET; the token is dead either way.
				None => RetireReason::Rotated,
			};

			Ok(ConsumeOutcome::AlreadyRetired(reason))
		})
	}

	fn revoke_subject<'a>(
		&'a self,
		subject: &'a SubjectId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut connection = self.connection.clone();
			let _: i64 = self
				.cutoff
				.key(self.cutoff_key(subject))
				.arg(instant.unix_timestamp())
				.arg(millis(self.cutoff_ttl).max(1_000))
				.invoke_async(&mut connection)
				.await
				.map_err(map_redis_error)?;

			Ok(())
		})
	}

	fn subject_cutoff<'a>(
		&'a self,
		subject: &'a SubjectId,
	) -> StoreFuture<'a, Option<OffsetDateTime>> {
		Box::pin(async move {
			let mut connection = self.connection.clone();
			let stored: Option<i64> =
				connection.get(self.cutoff_key(subject)).await.map_err(map_redis_error)?;

			stored
				.map(|secs| {
					OffsetDateTime::from_unix_timestamp(secs).map_err(|e| {
						StoreError::Serialization { message: format!("Invalid cut-off: {e}") }
					})
				})
				.transpose()
		})
	}

	fn purge_expired(&self, _now: OffsetDateTime) -> StoreFuture<'_, usize> {
		// Retired entries carry a TTL matching the token expiry.
		Box::pin(async move { Ok(0) })
	}
}
impl CounterStore for RedisStore {
	fn try_acquire<'a>(
		&'a self,
		key: &'a str,
		limit: u64,
		window_length: Duration,
		now: OffsetDateTime,
	) -> StoreFuture<'a, WindowHit> {
		Box::pin(async move {
			let mut connection = self.connection.clone();
			let (admitted, start_ms, count): (i64, i64, u64) = self
				.acquire
				.key(self.window_key(key))
				.arg(limit)
				.arg(millis(window_length))
				.arg(unix_millis(now))
				.invoke_async(&mut connection)
				.await
				.map_err(map_redis_error)?;
			let counter = WindowCounter {
				window_start: from_unix_millis(start_ms)?,
				count,
				limit,
				window_length,
			};

			if admitted == 1 {
				Ok(WindowHit::Admitted(counter))
			} else {
				Ok(WindowHit::Exhausted(counter))
			}
		})
	}

	fn peek<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<WindowCounter>> {
		Box::pin(async move {
			let mut connection = self.connection.clone();
			let fields: (Option<i64>, Option<u64>, Option<u64>, Option<i64>) = redis::cmd("HMGET")
				.arg(self.window_key(key))
				.arg("start")
				.arg("count")
				.arg("limit")
				.arg("window")
				.query_async(&mut connection)
				.await
				.map_err(map_redis_error)?;

			let (Some(start_ms), Some(count), Some(limit), Some(window_ms)) = fields else {
				return Ok(None);
			};

			Ok(Some(WindowCounter {
				window_start: from_unix_millis(start_ms)?,
				count,
				limit,
				window_length: Duration::milliseconds(window_ms),
			}))
		})
	}

	fn evict_idle(&self, _now: OffsetDateTime) -> StoreFuture<'_, usize> {
		// Window keys expire on their own once the window closes.
		Box::pin(async move { Ok(0) })
	}
}

fn map_redis_error(err: RedisError) -> StoreError {
	StoreError::Unavailable { message: err.to_string() }
}

fn millis(duration: Duration) -> i64 {
	i64::try_from(duration.whole_milliseconds()).unwrap_or(i64::MAX)
}

fn unix_millis(instant: OffsetDateTime) -> i64 {
	i64::try_from(instant.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

fn from_unix_millis(ms: i64) -> Result<OffsetDateTime, StoreError> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).map_err(|e| {
		StoreError::Serialization { message: format!("Invalid window start: {e}") }
	})
}
