//! Signing keys and the rotatable key set used to mint and verify tokens.
//!
//! Every token header carries the `kid` of the key that signed it. A [`KeySet`] holds one active
//! key (used for signing) plus any number of verification-only keys, so a secret can be rolled
//! over without invalidating every outstanding session at once.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{KeyId, TokenSecret},
	error::ConfigError,
};

/// HMAC algorithms accepted for signing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SigningAlgorithm {
	/// HMAC with SHA-256.
	#[default]
	Hs256,
	/// HMAC with SHA-384.
	Hs384,
	/// HMAC with SHA-512.
	Hs512,
}
impl SigningAlgorithm {
	/// Returns the JOSE `alg` label.
	pub const fn as_str(self) -> &'static str {
		match self {
			SigningAlgorithm::Hs256 => "HS256",
			SigningAlgorithm::Hs384 => "HS384",
			SigningAlgorithm::Hs512 => "HS512",
		}
	}
}
impl From<SigningAlgorithm> for Algorithm {
	fn from(value: SigningAlgorithm) -> Self {
		match value {
			SigningAlgorithm::Hs256 => Algorithm::HS256,
			SigningAlgorithm::Hs384 => Algorithm::HS384,
			SigningAlgorithm::Hs512 => Algorithm::HS512,
		}
	}
}
impl From<SigningAlgorithm> for String {
	fn from(value: SigningAlgorithm) -> Self {
		value.as_str().into()
	}
}
impl TryFrom<String> for SigningAlgorithm {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl FromStr for SigningAlgorithm {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_uppercase().as_str() {
			"HS256" => Ok(Self::Hs256),
			"HS384" => Ok(Self::Hs384),
			"HS512" => Ok(Self::Hs512),
			_ => Err(ConfigError::UnsupportedAlgorithm { value: s.to_owned() }),
		}
	}
}
impl Display for SigningAlgorithm {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Symmetric signing key tagged with its key identifier.
#[derive(Clone)]
pub struct SigningKey {
	/// Identifier written into the token header.
	pub id: KeyId,
	/// Algorithm the key signs with.
	pub algorithm: SigningAlgorithm,
	secret: TokenSecret,
}
impl SigningKey {
	/// Creates a key from an explicit identifier and secret.
	pub fn new(
		id: KeyId,
		algorithm: SigningAlgorithm,
		secret: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let secret = TokenSecret::new(secret);

		if secret.is_empty() {
			return Err(ConfigError::EmptySecret { kid: id.to_string() });
		}

		Ok(Self { id, algorithm, secret })
	}

	/// Creates a key whose identifier is derived from the secret's SHA-256 fingerprint.
	pub fn from_secret(
		algorithm: SigningAlgorithm,
		secret: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let secret = secret.into();
		let id = KeyId::new(fingerprint(&secret))?;

		Self::new(id, algorithm, secret)
	}

	pub(crate) fn encoding_key(&self) -> EncodingKey {
		EncodingKey::from_secret(self.secret.expose_bytes())
	}

	pub(crate) fn decoding_key(&self) -> DecodingKey {
		DecodingKey::from_secret(self.secret.expose_bytes())
	}

	/// Validation pinned to this key's algorithm. Expiry is checked against the authority's
	/// clock instead of the library's wall clock.
	pub(crate) fn validation(&self, issuer: Option<&str>) -> Validation {
		let mut validation = Validation::new(self.algorithm.into());

		validation.validate_exp = false;
		validation.validate_aud = false;
		validation.leeway = 0;
		validation.set_required_spec_claims(&["exp", "sub"]);

		if let Some(issuer) = issuer {
			validation.set_issuer(&[issuer]);
		}

		validation
	}
}
impl Debug for SigningKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningKey")
			.field("id", &self.id)
			.field("algorithm", &self.algorithm)
			.field("secret", &"<redacted>")
			.finish()
	}
}

/// Active signing key plus verification-only keys accepted during rollover.
#[derive(Clone, Debug)]
pub struct KeySet {
	active: KeyId,
	keys: BTreeMap<KeyId, SigningKey>,
}
impl KeySet {
	/// Creates a key set that signs and verifies with `active`.
	pub fn new(active: SigningKey) -> Self {
		let id = active.id.clone();

		Self { active: id.clone(), keys: BTreeMap::from([(id, active)]) }
	}

	/// Adds a key that is accepted for verification only.
	pub fn with_verification_key(mut self, key: SigningKey) -> Result<Self, ConfigError> {
		if self.keys.contains_key(&key.id) {
			return Err(ConfigError::DuplicateKey { kid: key.id.to_string() });
		}

		self.keys.insert(key.id.clone(), key);

		Ok(self)
	}

	/// Promotes `next` to the active key; the previous active key stays valid for verification.
	pub fn rotate(mut self, next: SigningKey) -> Result<Self, ConfigError> {
		if self.keys.contains_key(&next.id) {
			return Err(ConfigError::DuplicateKey { kid: next.id.to_string() });
		}

		self.active = next.id.clone();
		self.keys.insert(next.id.clone(), next);

		Ok(self)
	}

	/// Drops a verification-only key; tokens it signed stop verifying.
	pub fn retire(mut self, id: &KeyId) -> Result<Self, ConfigError> {
		if &self.active == id {
			return Err(ConfigError::RetireActiveKey { kid: id.to_string() });
		}

		self.keys.remove(id);

		Ok(self)
	}

	/// Key used for signing new tokens.
	pub fn active(&self) -> &SigningKey {
		// `active` always names an entry: it is inserted on construction/rotation and
		// `retire` refuses to remove it.
		&self.keys[&self.active]
	}

	/// Looks up a trusted key by identifier.
	pub fn get(&self, id: &str) -> Option<&SigningKey> {
		self.keys.get(id)
	}

	/// Identifiers of every trusted key.
	pub fn ids(&self) -> impl Iterator<Item = &KeyId> {
		self.keys.keys()
	}
}

fn fingerprint(secret: &str) -> String {
	let digest = Sha256::digest(secret.as_bytes());

	URL_SAFE_NO_PAD.encode(&digest[..9])
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn key(kid: &str, secret: &str) -> SigningKey {
		let id = KeyId::new(kid).expect("Key id fixture should be valid.");

		SigningKey::new(id, SigningAlgorithm::default(), secret)
			.expect("Key fixture should be valid.")
	}

	#[test]
	fn algorithm_labels_parse_case_insensitively() {
		assert_eq!("hs512".parse::<SigningAlgorithm>().ok(), Some(SigningAlgorithm::Hs512));
		assert_eq!(SigningAlgorithm::Hs384.to_string(), "HS384");
		assert!(matches!(
			"RS256".parse::<SigningAlgorithm>(),
			Err(ConfigError::UnsupportedAlgorithm { .. })
		));
	}

	#[test]
	fn empty_secrets_are_rejected() {
		let id = KeyId::new("k1").expect("Key id fixture should be valid.");

		assert!(matches!(
			SigningKey::new(id, SigningAlgorithm::Hs256, ""),
			Err(ConfigError::EmptySecret { .. })
		));
	}

	#[test]
	fn derived_key_ids_are_stable_and_distinct() {
		let a = SigningKey::from_secret(SigningAlgorithm::Hs256, "secret-a")
			.expect("Derived key should build.");
		let a_again = SigningKey::from_secret(SigningAlgorithm::Hs256, "secret-a")
			.expect("Derived key should build.");
		let b = SigningKey::from_secret(SigningAlgorithm::Hs256, "secret-b")
			.expect("Derived key should build.");

		assert_eq!(a.id, a_again.id);
		assert_ne!(a.id, b.id);
		assert_eq!(a.id.len(), 12);
	}

	#[test]
	fn rotation_keeps_previous_key_for_verification() {
		let keys = KeySet::new(key("k1", "one"))
			.rotate(key("k2", "two"))
			.expect("Rotation to a new key id should succeed.");

		assert_eq!(keys.active().id.as_ref(), "k2");
		assert!(keys.get("k1").is_some());
		assert_eq!(keys.ids().count(), 2);

		let keys = keys
			.retire(&KeyId::new("k1").expect("Key id should be valid."))
			.expect("Retiring a verification key should succeed.");

		assert!(keys.get("k1").is_none());
		assert!(matches!(
			keys.clone().retire(&KeyId::new("k2").expect("Key id should be valid.")),
			Err(ConfigError::RetireActiveKey { .. })
		));
		assert!(matches!(
			keys.with_verification_key(key("k2", "dup")),
			Err(ConfigError::DuplicateKey { .. })
		));
	}

	#[test]
	fn debug_output_redacts_secret() {
		let rendered = format!("{:?}", key("k1", "very-secret"));

		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("very-secret"));
	}
}
