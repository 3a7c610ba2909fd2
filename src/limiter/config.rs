//! Immutable limiter configuration and its builder.

// self
use crate::{_prelude::*, error::ConfigError, limiter::RateLimitKey};

/// Decision taken when the shared counter store cannot be reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
	/// Surface [`Error::Unavailable`] so the caller rejects the request.
	#[default]
	FailClosed,
	/// Let the request through and report the bypass.
	FailOpen,
}

/// Per-scope admission budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LimiterConfig {
	/// Maximum admissions per window.
	pub limit: u64,
	/// Accounting window size.
	pub window_length: Duration,
	/// Behavior when the counter store is unavailable.
	pub failure_policy: FailurePolicy,
	/// When `false` every request is admitted without consulting the store.
	pub enabled: bool,
	/// Optional namespace prepended to every key (`<prefix>:<key>`).
	pub key_prefix: Option<String>,
}
impl LimiterConfig {
	/// Requests per window when nothing else is configured.
	pub const DEFAULT_LIMIT: u64 = 100;
	/// Window size when nothing else is configured.
	pub const DEFAULT_WINDOW: Duration = Duration::MINUTE;

	/// Starts a builder with the provided budget.
	pub fn builder(limit: u64, window_length: Duration) -> LimiterConfigBuilder {
		LimiterConfigBuilder {
			limit,
			window_length,
			failure_policy: FailurePolicy::default(),
			enabled: true,
			key_prefix: None,
		}
	}

	/// Starts a builder allowing `limit` requests per minute.
	pub fn per_minute(limit: u64) -> LimiterConfigBuilder {
		Self::builder(limit, Self::DEFAULT_WINDOW)
	}

	pub(crate) fn store_key(&self, key: &RateLimitKey) -> String {
		match &self.key_prefix {
			Some(prefix) => format!("{prefix}:{key}"),
			None => key.as_str().to_owned(),
		}
	}
}

/// Builder for [`LimiterConfig`].
#[derive(Clone, Debug)]
pub struct LimiterConfigBuilder {
	limit: u64,
	window_length: Duration,
	failure_policy: FailurePolicy,
	enabled: bool,
	key_prefix: Option<String>,
}
impl LimiterConfigBuilder {
	/// Sets the store-outage policy.
	pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
		self.failure_policy = policy;

		self
	}

	/// Shorthand for choosing between [`FailurePolicy::FailOpen`] and the fail-closed default.
	pub fn fail_open(self, fail_open: bool) -> Self {
		let policy = if fail_open { FailurePolicy::FailOpen } else { FailurePolicy::FailClosed };

		self.failure_policy(policy)
	}

	/// Turns the limiter on or off.
	pub fn enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;

		self
	}

	/// Namespaces every key under `prefix`.
	pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.key_prefix = Some(prefix.into());

		self
	}

	/// Validates and freezes the configuration.
	pub fn build(self) -> Result<LimiterConfig, ConfigError> {
		if self.limit == 0 {
			return Err(ConfigError::ZeroLimit);
		}
		if !self.window_length.is_positive() {
			return Err(ConfigError::NonPositiveWindow);
		}

		Ok(LimiterConfig {
			limit: self.limit,
			window_length: self.window_length,
			failure_policy: self.failure_policy,
			enabled: self.enabled,
			key_prefix: self.key_prefix.filter(|prefix| !prefix.is_empty()),
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn builder_defaults_to_fail_closed_and_enabled() {
		let config = LimiterConfig::per_minute(100).build().expect("Default config should build.");

		assert_eq!(config.limit, 100);
		assert_eq!(config.window_length, Duration::MINUTE);
		assert_eq!(config.failure_policy, FailurePolicy::FailClosed);
		assert!(config.enabled);
		assert_eq!(config.key_prefix, None);
	}

	#[test]
	fn builder_rejects_empty_budgets() {
		assert!(matches!(
			LimiterConfig::builder(0, Duration::MINUTE).build(),
			Err(ConfigError::ZeroLimit)
		));
		assert!(matches!(
			LimiterConfig::builder(5, Duration::ZERO).build(),
			Err(ConfigError::NonPositiveWindow)
		));
		assert!(matches!(
			LimiterConfig::builder(5, Duration::seconds(-1)).build(),
			Err(ConfigError::NonPositiveWindow)
		));
	}

	#[test]
	fn store_key_applies_prefix() {
		let key = RateLimitKey::origin("10.0.0.1");
		let plain = LimiterConfig::per_minute(1).build().expect("Config should build.");
		let prefixed = LimiterConfig::per_minute(1)
			.key_prefix("api")
			.fail_open(true)
			.build()
			.expect("Config should build.");

		assert_eq!(plain.store_key(&key), "10.0.0.1");
		assert_eq!(prefixed.store_key(&key), "api:10.0.0.1");
		assert_eq!(prefixed.failure_policy, FailurePolicy::FailOpen);
	}
}
