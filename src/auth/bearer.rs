//! `Authorization` header parsing.

// self
use crate::_prelude::*;

const SCHEME: &str = "bearer";

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively. Anything else (missing token, other schemes,
/// embedded whitespace) is reported as [`Error::InvalidSignature`] so the caller treats it like
/// any other untrusted credential.
pub fn parse_bearer(header: &str) -> Result<&str> {
	let (scheme, token) = header.trim().split_once(' ').ok_or(Error::InvalidSignature)?;
	let token = token.trim_start();

	if !scheme.eq_ignore_ascii_case(SCHEME)
		|| token.is_empty()
		|| token.chars().any(char::is_whitespace)
	{
		return Err(Error::InvalidSignature);
	}

	Ok(token)
}
