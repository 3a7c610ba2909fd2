// self
use crate::{_prelude::*, auth::SubjectId};

const UNKNOWN_ORIGIN: &str = "unknown";

/// Rate-limit identity: an authenticated subject or the client origin.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RateLimitKey(String);
impl RateLimitKey {
	/// Key for an authenticated subject (`user:<id>`).
	pub fn subject(subject: &SubjectId) -> Self {
		Self(format!("user:{subject}"))
	}

	/// Key for an anonymous client, usually its remote address.
	pub fn origin(origin: impl Display) -> Self {
		let origin = origin.to_string();

		if origin.trim().is_empty() { Self(UNKNOWN_ORIGIN.into()) } else { Self(origin) }
	}

	/// Picks the subject key when the request is authenticated, otherwise the origin key.
	pub fn for_request(subject: Option<&SubjectId>, origin: impl Display) -> Self {
		match subject {
			Some(subject) => Self::subject(subject),
			None => Self::origin(origin),
		}
	}

	/// Arbitrary caller-defined key.
	pub fn custom(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Key as stored.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for RateLimitKey {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}
impl Display for RateLimitKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
