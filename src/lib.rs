//! Bearer-token authority and shared-store admission control for request pipelines: mint,
//! verify, and rotate signed access/refresh tokens, and bound per-key request rates with an
//! atomic fixed-window counter.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod authority;
pub mod clock;
pub mod config;
pub mod error;
pub mod limiter;
pub mod obs;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{KeySet, SigningAlgorithm, SigningKey},
		authority::{AuthorityConfig, TokenAuthority},
		clock::{Clock, ManualClock},
		limiter::{LimiterConfig, SlidingWindowLimiter},
		store::{CounterStore, MemoryStore, RevocationStore},
	};

	/// Fixed instant every test clock starts from.
	pub const TEST_EPOCH: OffsetDateTime = time::macros::datetime!(2025-01-01 00:00 UTC);

	/// Builds the HS256 signing key used across tests.
	pub fn test_signing_key(kid: &str, secret: &str) -> SigningKey {
		SigningKey::new(
			crate::auth::KeyId::new(kid).expect("Test key identifier should be valid."),
			SigningAlgorithm::Hs256,
			secret,
		)
		.expect("Test signing key should be valid.")
	}

	/// Constructs a [`TokenAuthority`] backed by an in-memory ledger and a manual clock pinned
	/// to [`TEST_EPOCH`].
	pub fn build_test_authority() -> (TokenAuthority, Arc<MemoryStore>, ManualClock) {
		let keys = KeySet::new(test_signing_key("k1", "test-secret-key-material"));
		let config =
			AuthorityConfig::builder(keys).build().expect("Default authority config should build.");

		build_test_authority_with(config)
	}

	/// Same as [`build_test_authority`] with a caller-supplied configuration.
	pub fn build_test_authority_with(
		config: AuthorityConfig,
	) -> (TokenAuthority, Arc<MemoryStore>, ManualClock) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn RevocationStore> = store_backend.clone();
		let clock = ManualClock::new(TEST_EPOCH);
		let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
		let authority = TokenAuthority::new(config, store).with_clock(shared_clock);

		(authority, store_backend, clock)
	}

	/// Constructs a [`SlidingWindowLimiter`] over an in-memory counter store and a manual clock
	/// pinned to [`TEST_EPOCH`].
	pub fn build_test_limiter(
		limit: u64,
		window_length: Duration,
	) -> (SlidingWindowLimiter, Arc<MemoryStore>, ManualClock) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CounterStore> = store_backend.clone();
		let config = LimiterConfig::builder(limit, window_length)
			.build()
			.expect("Limiter test config should build.");
		let clock = ManualClock::new(TEST_EPOCH);
		let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
		let limiter = SlidingWindowLimiter::new(config, store).with_clock(shared_clock);

		(limiter, store_backend, clock)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use jsonwebtoken;
pub use url;
#[cfg(test)] use color_eyre as _;
