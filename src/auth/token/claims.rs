//! Signed claim payload carried by access and refresh tokens.

// self
use crate::{
	_prelude::*,
	auth::{SubjectId, TokenId},
	error::ConfigError,
};

/// Token category; verification always names the kind it expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
	/// Short-lived credential presented on every request.
	Access,
	/// Long-lived, single-use credential exchanged for a new pair.
	Refresh,
}
impl TokenKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenKind::Access => "access",
			TokenKind::Refresh => "refresh",
		}
	}
}
impl Display for TokenKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Claims embedded in every issued token.
///
/// Timestamps travel as whole Unix seconds (`iat`/`exp`), so issuance truncates the clock to
/// second precision before deriving the expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
	/// Authenticated principal.
	pub sub: SubjectId,
	/// Token category, immutable once issued.
	#[serde(rename = "type")]
	pub kind: TokenKind,
	/// Issue instant.
	#[serde(rename = "iat", with = "time::serde::timestamp")]
	pub issued_at: OffsetDateTime,
	/// Absolute expiry instant.
	#[serde(rename = "exp", with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
	/// Unique token identifier used for rotation and replay detection.
	pub jti: TokenId,
	/// Optional issuer label.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub iss: Option<String>,
}
impl Claims {
	/// Builds claims for `subject` issued at `issued_at` (truncated to whole seconds) and living
	/// for `lifetime`.
	pub fn new(
		subject: SubjectId,
		kind: TokenKind,
		issued_at: OffsetDateTime,
		lifetime: Duration,
	) -> Result<Self, ConfigError> {
		let issued_at = truncate_to_seconds(issued_at);
		let expires_at = issued_at
			.checked_add(lifetime)
			.ok_or(ConfigError::LifetimeOutOfRange { which: kind })?;

		Ok(Self { sub: subject, kind, issued_at, expires_at, jti: TokenId::generate(), iss: None })
	}

	/// Attaches an issuer label.
	pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
		self.iss = issuer;

		self
	}

	/// Returns `true` once `instant` reaches the expiry instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Remaining lifetime at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}

pub(crate) fn truncate_to_seconds(instant: OffsetDateTime) -> OffsetDateTime {
	instant - Duration::nanoseconds(i64::from(instant.nanosecond()))
}
