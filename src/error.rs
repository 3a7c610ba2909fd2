//! Crate-level error types shared by the token authority, the limiter, and their stores.

// self
use crate::{_prelude::*, auth::TokenKind, store::StoreError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Generic message surfaced to clients for every authentication failure.
pub const PUBLIC_AUTH_FAILURE: &str = "Could not validate credentials.";

/// Canonical error exposed by public APIs.
///
/// Limiter denials are not errors; they surface as
/// [`Admission::Rejected`](crate::limiter::Admission::Rejected).
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token signature does not verify against any trusted key, or the token is malformed.
	#[error("Token signature could not be verified.")]
	InvalidSignature,
	/// Token expiry instant has passed.
	#[error("Token has expired.")]
	Expired,
	/// Token category differs from the one the caller expected.
	#[error("Token kind mismatch: expected {expected}, found {found}.")]
	KindMismatch {
		/// Kind required by the caller.
		expected: TokenKind,
		/// Kind carried by the token.
		found: TokenKind,
	},
	/// A refresh token that was already rotated out has been presented again.
	#[error("Refresh token has already been used.")]
	ReplayDetected,
	/// Token was revoked explicitly or by a subject-wide revocation.
	#[error("Token has been revoked.")]
	Revoked,
	/// Shared store could not be reached or failed mid-operation.
	#[error("Shared store is unavailable: {0}")]
	Unavailable(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token encoding failed while signing.
	#[error("Token could not be signed.")]
	Signing {
		/// Underlying encoder failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
}
impl Error {
	/// Returns `true` for failures that must be reported to clients as an authentication failure.
	pub fn is_authentication_failure(&self) -> bool {
		matches!(
			self,
			Self::InvalidSignature
				| Self::Expired
				| Self::KindMismatch { .. }
				| Self::ReplayDetected
				| Self::Revoked
		)
	}

	/// Returns `true` when the shared store is the cause of the failure.
	pub fn is_unavailable(&self) -> bool {
		matches!(self, Self::Unavailable(_))
	}

	/// Client-safe description that never reveals which verification step failed.
	pub fn public_message(&self) -> &'static str {
		if self.is_authentication_failure() {
			PUBLIC_AUTH_FAILURE
		} else if self.is_unavailable() {
			"Service temporarily unavailable."
		} else {
			"Internal server error."
		}
	}

	/// Stable label for logs and metrics.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::InvalidSignature => "invalid_signature",
			Self::Expired => "expired",
			Self::KindMismatch { .. } => "kind_mismatch",
			Self::ReplayDetected => "replay_detected",
			Self::Revoked => "revoked",
			Self::Unavailable(_) => "unavailable",
			Self::Config(_) => "config",
			Self::Signing { .. } => "signing",
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A token lifetime was shorter than one second.
	#[error("The {which} token lifetime must be at least one second.")]
	NonPositiveLifetime {
		/// Which lifetime was rejected.
		which: TokenKind,
	},
	/// A token lifetime exceeded the supported range, or the expiry fell outside the calendar.
	#[error("The {which} token lifetime is out of range.")]
	LifetimeOutOfRange {
		/// Which lifetime was rejected.
		which: TokenKind,
	},
	/// The limiter limit was zero.
	#[error("Rate limit must allow at least one request per window.")]
	ZeroLimit,
	/// The limiter window length was zero or negative.
	#[error("Rate limit window length must be positive.")]
	NonPositiveWindow,
	/// A signing secret was empty.
	#[error("Signing secret for key `{kid}` cannot be empty.")]
	EmptySecret {
		/// Key identifier the secret belongs to.
		kid: String,
	},
	/// Two keys share the same key identifier.
	#[error("Key set already contains key `{kid}`.")]
	DuplicateKey {
		/// Conflicting key identifier.
		kid: String,
	},
	/// The active signing key cannot be retired.
	#[error("Key `{kid}` is the active signing key and cannot be retired.")]
	RetireActiveKey {
		/// Active key identifier.
		kid: String,
	},
	/// Signing algorithm label is not supported.
	#[error("Signing algorithm `{value}` is not supported.")]
	UnsupportedAlgorithm {
		/// Rejected label.
		value: String,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Required setting is missing.
	#[error("Setting `{name}` is required.")]
	MissingSetting {
		/// Setting name.
		name: &'static str,
	},
	/// Setting value could not be parsed.
	#[error("Setting `{name}` has an invalid value: {reason}.")]
	InvalidSetting {
		/// Setting name.
		name: &'static str,
		/// Parser-supplied reason.
		reason: String,
	},
	/// JSON settings document could not be parsed.
	#[error("Settings document is invalid.")]
	SettingsParse {
		/// Path-aware parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl ConfigError {
	pub(crate) fn invalid_setting(name: &'static str, reason: impl Display) -> Self {
		Self::InvalidSetting { name, reason: reason.to_string() }
	}
}
