//! Immutable authority configuration and its builder.

// self
use crate::{
	_prelude::*,
	auth::{KeySet, TokenKind},
	error::ConfigError,
};

/// What to do when a rotated-out refresh token is presented again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPolicy {
	/// Reject the request and revoke every outstanding refresh token of the subject.
	#[default]
	RevokeSubject,
	/// Reject the request only.
	RejectOnly,
}

/// Lifetimes, keys, and policies consumed by [`TokenAuthority`](crate::authority::TokenAuthority).
#[derive(Clone, Debug)]
pub struct AuthorityConfig {
	/// Lifetime of access tokens.
	pub access_lifetime: Duration,
	/// Lifetime of refresh tokens.
	pub refresh_lifetime: Duration,
	/// Signing and verification keys.
	pub keys: KeySet,
	/// Reaction to refresh-token replay.
	pub replay_policy: ReplayPolicy,
	/// Optional `iss` claim written on issue and required on verify.
	pub issuer: Option<String>,
}
impl AuthorityConfig {
	/// Default access-token lifetime.
	pub const DEFAULT_ACCESS_LIFETIME: Duration = Duration::minutes(30);
	/// Default refresh-token lifetime.
	pub const DEFAULT_REFRESH_LIFETIME: Duration = Duration::days(7);
	/// Longest lifetime accepted for either token kind.
	pub const MAX_LIFETIME: Duration = Duration::days(3_650);

	/// Returns a builder seeded with the default lifetimes.
	pub fn builder(keys: KeySet) -> AuthorityConfigBuilder {
		AuthorityConfigBuilder::new(keys)
	}

	/// Lifetime configured for `kind`.
	pub fn lifetime(&self, kind: TokenKind) -> Duration {
		match kind {
			TokenKind::Access => self.access_lifetime,
			TokenKind::Refresh => self.refresh_lifetime,
		}
	}
}

/// Builder for [`AuthorityConfig`].
#[derive(Clone, Debug)]
pub struct AuthorityConfigBuilder {
	access_lifetime: Duration,
	refresh_lifetime: Duration,
	keys: KeySet,
	replay_policy: ReplayPolicy,
	issuer: Option<String>,
}
impl AuthorityConfigBuilder {
	fn new(keys: KeySet) -> Self {
		Self {
			access_lifetime: AuthorityConfig::DEFAULT_ACCESS_LIFETIME,
			refresh_lifetime: AuthorityConfig::DEFAULT_REFRESH_LIFETIME,
			keys,
			replay_policy: ReplayPolicy::default(),
			issuer: None,
		}
	}

	/// Overrides the access-token lifetime.
	pub fn access_lifetime(mut self, lifetime: Duration) -> Self {
		self.access_lifetime = lifetime;

		self
	}

	/// Overrides the refresh-token lifetime.
	pub fn refresh_lifetime(mut self, lifetime: Duration) -> Self {
		self.refresh_lifetime = lifetime;

		self
	}

	/// Overrides the replay policy.
	pub fn replay_policy(mut self, policy: ReplayPolicy) -> Self {
		self.replay_policy = policy;

		self
	}

	/// Sets the issuer label.
	pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
		self.issuer = Some(issuer.into());

		self
	}

	/// Validates the lifetimes and produces the configuration.
	pub fn build(self) -> Result<AuthorityConfig, ConfigError> {
		ensure_lifetime(self.access_lifetime, TokenKind::Access)?;
		ensure_lifetime(self.refresh_lifetime, TokenKind::Refresh)?;

		Ok(AuthorityConfig {
			access_lifetime: self.access_lifetime,
			refresh_lifetime: self.refresh_lifetime,
			keys: self.keys,
			replay_policy: self.replay_policy,
			issuer: self.issuer,
		})
	}
}

// Claims carry whole seconds, so anything shorter would yield `exp == iat`.
pub(crate) fn ensure_lifetime(lifetime: Duration, which: TokenKind) -> Result<(), ConfigError> {
	if lifetime < Duration::SECOND {
		return Err(ConfigError::NonPositiveLifetime { which });
	}
	if lifetime > AuthorityConfig::MAX_LIFETIME {
		return Err(ConfigError::LifetimeOutOfRange { which });
	}

	Ok(())
}
