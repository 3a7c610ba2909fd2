//! Deployment settings and their conversion into component configurations.
//!
//! Settings use the conventional environment variable names so one source can drive both the
//! authority and the limiter:
//!
//! | variable | default |
//! |---|---|
//! | `JWT_SECRET_KEY` | required |
//! | `JWT_ALGORITHM` | `HS256` |
//! | `JWT_KEY_ID` | derived from the secret |
//! | `JWT_PREVIOUS_SECRET_KEYS` | none (`kid:secret,kid:secret`) |
//! | `ACCESS_TOKEN_EXPIRE_MINUTES` | `30` |
//! | `REFRESH_TOKEN_EXPIRE_DAYS` | `7` |
//! | `RATE_LIMIT_ENABLED` | `true` |
//! | `RATE_LIMIT_PER_MINUTE` | `100` |
//! | `RATE_LIMIT_FAIL_OPEN` | `false` |
//! | `REDIS_URL` | none |

// std
use std::env;
// self
use crate::{
	_prelude::*,
	auth::{KeyId, KeySet, SigningAlgorithm, SigningKey, TokenSecret},
	authority::AuthorityConfig,
	error::ConfigError,
	limiter::LimiterConfig,
};

const JWT_SECRET_KEY: &str = "JWT_SECRET_KEY";
const JWT_ALGORITHM: &str = "JWT_ALGORITHM";
const JWT_KEY_ID: &str = "JWT_KEY_ID";
const JWT_PREVIOUS_SECRET_KEYS: &str = "JWT_PREVIOUS_SECRET_KEYS";
const ACCESS_TOKEN_EXPIRE_MINUTES: &str = "ACCESS_TOKEN_EXPIRE_MINUTES";
const REFRESH_TOKEN_EXPIRE_DAYS: &str = "REFRESH_TOKEN_EXPIRE_DAYS";
const RATE_LIMIT_ENABLED: &str = "RATE_LIMIT_ENABLED";
const RATE_LIMIT_PER_MINUTE: &str = "RATE_LIMIT_PER_MINUTE";
const RATE_LIMIT_FAIL_OPEN: &str = "RATE_LIMIT_FAIL_OPEN";
const REDIS_URL: &str = "REDIS_URL";

/// Verification-only key accepted while clients still hold tokens it signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousKey {
	/// Key identifier found in old token headers.
	pub kid: KeyId,
	/// Former signing secret.
	pub secret: TokenSecret,
}

/// Flat deployment settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Settings {
	/// Active signing secret.
	pub jwt_secret_key: TokenSecret,
	/// Signing algorithm shared by every key.
	#[serde(default)]
	pub jwt_algorithm: SigningAlgorithm,
	/// Identifier of the active key; derived from the secret when absent.
	#[serde(default)]
	pub jwt_key_id: Option<KeyId>,
	/// Keys kept for verification during rollover.
	#[serde(default)]
	pub jwt_previous_secret_keys: Vec<PreviousKey>,
	/// Access token lifetime in minutes.
	#[serde(default = "default_access_minutes")]
	pub access_token_expire_minutes: i64,
	/// Refresh token lifetime in days.
	#[serde(default = "default_refresh_days")]
	pub refresh_token_expire_days: i64,
	/// Whether the limiter counts requests at all.
	#[serde(default = "default_true")]
	pub rate_limit_enabled: bool,
	/// Requests admitted per key and minute.
	#[serde(default = "default_rate_limit")]
	pub rate_limit_per_minute: u64,
	/// Admit requests when the counter store is unreachable.
	#[serde(default)]
	pub rate_limit_fail_open: bool,
	/// Shared store location for multi-instance deployments.
	#[serde(default)]
	pub redis_url: Option<Url>,
}
impl Settings {
	/// Reads settings from `(name, value)` pairs; unknown names are ignored.
	pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let vars = vars
			.into_iter()
			.map(|(k, v)| (k.into(), v.into()))
			.collect::<HashMap<String, String>>();
		let lookup = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());
		let jwt_secret_key = lookup(JWT_SECRET_KEY)
			.map(TokenSecret::new)
			.ok_or(ConfigError::MissingSetting { name: JWT_SECRET_KEY })?;
		let jwt_algorithm = match lookup(JWT_ALGORITHM) {
			Some(value) => value.parse()?,
			None => SigningAlgorithm::default(),
		};
		let jwt_key_id = lookup(JWT_KEY_ID).map(KeyId::new).transpose()?;
		let jwt_previous_secret_keys = lookup(JWT_PREVIOUS_SECRET_KEYS)
			.map(parse_previous_keys)
			.transpose()?
			.unwrap_or_default();
		let redis_url = lookup(REDIS_URL)
			.map(|raw| Url::parse(raw).map_err(|e| ConfigError::invalid_setting(REDIS_URL, e)))
			.transpose()?;

		Ok(Self {
			jwt_secret_key,
			jwt_algorithm,
			jwt_key_id,
			jwt_previous_secret_keys,
			access_token_expire_minutes: parse_or(
				lookup(ACCESS_TOKEN_EXPIRE_MINUTES),
				ACCESS_TOKEN_EXPIRE_MINUTES,
				default_access_minutes(),
			)?,
			refresh_token_expire_days: parse_or(
				lookup(REFRESH_TOKEN_EXPIRE_DAYS),
				REFRESH_TOKEN_EXPIRE_DAYS,
				default_refresh_days(),
			)?,
			rate_limit_enabled: parse_bool_or(
				lookup(RATE_LIMIT_ENABLED),
				RATE_LIMIT_ENABLED,
				true,
			)?,
			rate_limit_per_minute: parse_or(
				lookup(RATE_LIMIT_PER_MINUTE),
				RATE_LIMIT_PER_MINUTE,
				default_rate_limit(),
			)?,
			rate_limit_fail_open: parse_bool_or(
				lookup(RATE_LIMIT_FAIL_OPEN),
				RATE_LIMIT_FAIL_OPEN,
				false,
			)?,
			redis_url,
		})
	}

	/// Reads settings from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_vars(env::vars())
	}

	/// Parses a JSON settings document, reporting the path of the offending field on failure.
	pub fn from_json(document: &str) -> Result<Self, ConfigError> {
		let deserializer = &mut serde_json::Deserializer::from_str(document);

		serde_path_to_error::deserialize(deserializer)
			.map_err(|source| ConfigError::SettingsParse { source })
	}

	/// Builds the key set: the active key plus every previous key for verification.
	pub fn key_set(&self) -> Result<KeySet, ConfigError> {
		let secret = self.jwt_secret_key.expose();
		let active = match &self.jwt_key_id {
			Some(kid) => SigningKey::new(kid.clone(), self.jwt_algorithm, secret)?,
			None => SigningKey::from_secret(self.jwt_algorithm, secret)?,
		};

		self.jwt_previous_secret_keys.iter().try_fold(KeySet::new(active), |keys, previous| {
			keys.with_verification_key(SigningKey::new(
				previous.kid.clone(),
				self.jwt_algorithm,
				previous.secret.expose(),
			)?)
		})
	}

	/// Converts the token settings into an [`AuthorityConfig`].
	pub fn authority_config(&self) -> Result<AuthorityConfig, ConfigError> {
		let access = self
			.access_token_expire_minutes
			.checked_mul(60)
			.map(Duration::seconds)
			.ok_or_else(|| ConfigError::invalid_setting(ACCESS_TOKEN_EXPIRE_MINUTES, "overflow"))?;
		let refresh = self
			.refresh_token_expire_days
			.checked_mul(86_400)
			.map(Duration::seconds)
			.ok_or_else(|| ConfigError::invalid_setting(REFRESH_TOKEN_EXPIRE_DAYS, "overflow"))?;

		AuthorityConfig::builder(self.key_set()?)
			.access_lifetime(access)
			.refresh_lifetime(refresh)
			.build()
	}

	/// Converts the rate-limit settings into a per-minute [`LimiterConfig`].
	pub fn limiter_config(&self) -> Result<LimiterConfig, ConfigError> {
		LimiterConfig::per_minute(self.rate_limit_per_minute)
			.enabled(self.rate_limit_enabled)
			.fail_open(self.rate_limit_fail_open)
			.build()
	}
}

fn default_access_minutes() -> i64 {
	30
}

fn default_refresh_days() -> i64 {
	7
}

fn default_rate_limit() -> u64 {
	LimiterConfig::DEFAULT_LIMIT
}

fn default_true() -> bool {
	true
}

fn parse_or<T>(raw: Option<&str>, name: &'static str, default: T) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: Display,
{
	match raw {
		Some(raw) => raw.parse().map_err(|e| ConfigError::invalid_setting(name, e)),
		None => Ok(default),
	}
}

fn parse_bool_or(
	raw: Option<&str>,
	name: &'static str,
	default: bool,
) -> Result<bool, ConfigError> {
	let Some(raw) = raw else {
		return Ok(default);
	};

	match raw.to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		other => Err(ConfigError::invalid_setting(name, format!("`{other}` is not a boolean"))),
	}
}

fn parse_previous_keys(raw: &str) -> Result<Vec<PreviousKey>, ConfigError> {
	raw.split(',')
		.map(str::trim)
		.filter(|entry| !entry.is_empty())
		.map(|entry| -> Result<PreviousKey, ConfigError> {
			let (kid, secret) = entry.split_once(':').ok_or_else(|| {
				ConfigError::invalid_setting(JWT_PREVIOUS_SECRET_KEYS, "expected `kid:secret`")
			})?;

			Ok(PreviousKey {
				kid: KeyId::new(kid.trim())?,
				secret: TokenSecret::new(secret.trim()),
			})
		})
		.collect()
}
