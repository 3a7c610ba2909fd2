//! Issued credentials handed back to the request layer.

// self
use crate::{
	_prelude::*,
	auth::{Claims, TokenSecret},
};

/// Signed token string plus the claims it was minted from.
#[derive(Clone)]
pub struct IssuedToken {
	/// Encoded token; callers must avoid logging it.
	pub token: TokenSecret,
	/// Claims signed into the token.
	pub claims: Claims,
}
impl IssuedToken {
	/// Returns the encoded token string.
	pub fn expose(&self) -> &str {
		self.token.expose()
	}
}
impl Debug for IssuedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuedToken")
			.field("token", &"<redacted>")
			.field("claims", &self.claims)
			.finish()
	}
}

/// Access + refresh pair returned by login and refresh.
#[derive(Clone)]
pub struct TokenPair {
	/// Short-lived access token.
	pub access: IssuedToken,
	/// Single-use refresh token.
	pub refresh: IssuedToken,
}
impl TokenPair {
	/// Builds the wire response body (`access_token`, `refresh_token`, `token_type`,
	/// `expires_in`) relative to `now`.
	pub fn to_response(&self, now: OffsetDateTime) -> TokenResponse {
		TokenResponse {
			access_token: self.access.token.clone(),
			refresh_token: self.refresh.token.clone(),
			token_type: TokenResponse::BEARER.into(),
			expires_in: self.access.claims.remaining_at(now).whole_seconds(),
		}
	}
}
impl Debug for TokenPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenPair")
			.field("access", &self.access)
			.field("refresh", &self.refresh)
			.finish()
	}
}

/// Serializable token response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
	/// Encoded access token.
	pub access_token: TokenSecret,
	/// Encoded refresh token.
	pub refresh_token: TokenSecret,
	/// Always `bearer`.
	pub token_type: String,
	/// Seconds until the access token expires.
	pub expires_in: i64,
}
impl TokenResponse {
	/// Token type advertised to clients.
	pub const BEARER: &'static str = "bearer";
}
