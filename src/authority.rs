//! Token authority: mints, verifies, and rotates signed bearer credentials.
//!
//! Issuance and verification are pure functions of the presented token, the configured key set,
//! and the clock. Only [`TokenAuthority::refresh`] and the revocation helpers touch shared state:
//! each refresh atomically retires the presented token's `jti` through
//! [`RevocationStore::consume`], so two concurrent refreshes of the same token produce exactly
//! one new pair. Presenting a rotated-out token again fails with [`Error::ReplayDetected`] and,
//! under [`ReplayPolicy::RevokeSubject`], revokes every outstanding refresh token of the subject.

pub mod config;

mod metrics;

pub use config::*;
pub use metrics::RotationMetrics;

// crates.io
use jsonwebtoken::Header;
// self
use crate::{
	_prelude::*,
	auth::{Claims, IssuedToken, SubjectId, TokenKind, TokenPair, TokenSecret},
	clock::{Clock, SystemClock},
	obs::{self, OpOutcome, OpSpan, Operation},
	store::{ConsumeOutcome, RetireReason, RetiredToken, RevocationStore},
};

/// Issues, verifies, and rotates access/refresh tokens.
#[derive(Clone)]
pub struct TokenAuthority {
	config: Arc<AuthorityConfig>,
	store: Arc<dyn RevocationStore>,
	clock: Arc<dyn Clock>,
	/// Shared counters for refresh rotations.
	pub rotation_metrics: Arc<RotationMetrics>,
}
impl TokenAuthority {
	/// Creates an authority over the given configuration and revocation ledger, reading time
	/// from the system clock.
	pub fn new(config: AuthorityConfig, store: Arc<dyn RevocationStore>) -> Self {
		Self {
			config: Arc::new(config),
			store,
			clock: Arc::new(SystemClock),
			rotation_metrics: Default::default(),
		}
	}

	/// Replaces the clock source.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &AuthorityConfig {
		&self.config
	}

	/// Mints an access token for `subject` using the configured access lifetime.
	pub fn issue_access_token(&self, subject: &SubjectId) -> Result<IssuedToken> {
		self.issue(subject, TokenKind::Access, self.config.access_lifetime, self.clock.now())
	}

	/// Mints an access token with a caller-chosen lifetime (at least one second).
	pub fn issue_access_token_with_lifetime(
		&self,
		subject: &SubjectId,
		lifetime: Duration,
	) -> Result<IssuedToken> {
		ensure_lifetime(lifetime, TokenKind::Access)?;
		self.issue(subject, TokenKind::Access, lifetime, self.clock.now())
	}

	/// Mints a refresh token with a fresh `jti` using the configured refresh lifetime.
	pub fn issue_refresh_token(&self, subject: &SubjectId) -> Result<IssuedToken> {
		self.issue(subject, TokenKind::Refresh, self.config.refresh_lifetime, self.clock.now())
	}

	/// Mints the access + refresh pair handed out after a successful login.
	pub fn issue_pair(&self, subject: &SubjectId) -> Result<TokenPair> {
		self.issue_pair_at(subject, self.clock.now())
	}

	/// Checks signature, expiry, and kind of `token`, returning its claims.
	///
	/// Failures are terminal; the error kind is meant for internal diagnostics only (see
	/// [`Error::public_message`]).
	pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims> {
		const OP: Operation = Operation::Verify;

		let _span = OpSpan::new(OP, "verify").entered();

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = self.verify_at(token, expected, self.clock.now());

		match &result {
			Ok(_) => obs::record_op_outcome(OP, OpOutcome::Success),
			Err(err) => {
				obs::log_auth_failure(OP, err);
				obs::record_op_outcome(OP, OpOutcome::Failure);
			},
		}

		result
	}

	/// Exchanges a valid refresh token for a new pair and retires the presented one.
	pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
		const OP: Operation = Operation::Refresh;

		let span = OpSpan::new(OP, "refresh");

		obs::record_op_outcome(OP, OpOutcome::Attempt);
		self.rotation_metrics.record_attempt();

		let result = span.instrument(self.rotate(refresh_token)).await;

		match &result {
			Ok(_) => {
				self.rotation_metrics.record_success();
				obs::record_op_outcome(OP, OpOutcome::Success);
			},
			Err(err) => {
				self.rotation_metrics.record_failure();
				report_failure(OP, err);
				obs::record_op_outcome(OP, OpOutcome::Failure);
			},
		}

		result
	}

	/// Retires a refresh token on logout; a later refresh with it fails with [`Error::Revoked`].
	///
	/// Revoking an already revoked token succeeds. Presenting a rotated-out token is treated as a
	/// replay.
	pub async fn revoke(&self, refresh_token: &str) -> Result<()> {
		const OP: Operation = Operation::Revoke;

		let span = OpSpan::new(OP, "revoke");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span.instrument(self.retire_for_logout(refresh_token)).await;

		match &result {
			Ok(_) => obs::record_op_outcome(OP, OpOutcome::Success),
			Err(err) => {
				report_failure(OP, err);
				obs::record_op_outcome(OP, OpOutcome::Failure);
			},
		}

		result
	}

	/// Revokes every refresh token of `subject` issued up to now.
	pub async fn revoke_subject(&self, subject: &SubjectId) -> Result<()> {
		let span = OpSpan::new(Operation::Revoke, "revoke_subject");
		let now = self.clock.now();

		span.instrument(self.store.revoke_subject(subject, now)).await.map_err(|err| {
			obs::log_unavailable(Operation::Revoke, &err, false);

			Error::from(err)
		})
	}

	/// Drops ledger entries for tokens that have expired anyway.
	pub async fn purge_expired(&self) -> Result<usize> {
		Ok(self.store.purge_expired(self.clock.now()).await?)
	}

	async fn rotate(&self, refresh_token: &str) -> Result<TokenPair> {
		let now = self.clock.now();
		let claims = self.verify_at(refresh_token, TokenKind::Refresh, now)?;
		// Every read-only check runs before `consume`; once the `jti` is retired as rotated, a
		// second presentation counts as replay.
		let cutoff = self.store.subject_cutoff(&claims.sub).await?;

		if cutoff.is_some_and(|cutoff| claims.issued_at <= cutoff) {
			return Err(Error::Revoked);
		}

		let pair = self.issue_pair_at(&claims.sub, now)?;
		let entry = retired(&claims, RetireReason::Rotated, now);

		match self.store.consume(entry).await? {
			ConsumeOutcome::Consumed => Ok(pair),
			ConsumeOutcome::AlreadyRetired(RetireReason::Rotated) =>
				Err(self.handle_replay(&claims.sub, now).await),
			ConsumeOutcome::AlreadyRetired(RetireReason::Revoked) => Err(Error::Revoked),
		}
	}

	async fn retire_for_logout(&self, refresh_token: &str) -> Result<()> {
		let now = self.clock.now();
		let claims = self.verify_at(refresh_token, TokenKind::Refresh, now)?;
		let entry = retired(&claims, RetireReason::Revoked, now);

		match self.store.consume(entry).await? {
			ConsumeOutcome::Consumed | ConsumeOutcome::AlreadyRetired(RetireReason::Revoked) =>
				Ok(()),
			ConsumeOutcome::AlreadyRetired(RetireReason::Rotated) =>
				Err(self.handle_replay(&claims.sub, now).await),
		}
	}

	async fn handle_replay(&self, subject: &SubjectId, now: OffsetDateTime) -> Error {
		let revoke_subject = self.config.replay_policy == ReplayPolicy::RevokeSubject;

		self.rotation_metrics.record_replay();
		obs::log_replay(subject, revoke_subject);

		if revoke_subject {
			let revoked = self.store.revoke_subject(subject, now).await;

			if let Err(err) = revoked {
				obs::log_unavailable(Operation::Refresh, &err, false);
			}
		}

		Error::ReplayDetected
	}

	fn verify_at(&self, token: &str, expected: TokenKind, now: OffsetDateTime) -> Result<Claims> {
		let header = jsonwebtoken::decode_header(token).map_err(|_| Error::InvalidSignature)?;
		let key = header
			.kid
			.as_deref()
			.and_then(|kid| self.config.keys.get(kid))
			.ok_or(Error::InvalidSignature)?;
		let validation = key.validation(self.config.issuer.as_deref());
		let claims = jsonwebtoken::decode::<Claims>(token, &key.decoding_key(), &validation)
			.map_err(|_| Error::InvalidSignature)?
			.claims;

		if claims.is_expired_at(now) {
			return Err(Error::Expired);
		}
		if claims.kind != expected {
			return Err(Error::KindMismatch { expected, found: claims.kind });
		}

		Ok(claims)
	}

	fn issue_pair_at(&self, subject: &SubjectId, now: OffsetDateTime) -> Result<TokenPair> {
		let [access, refresh] = [TokenKind::Access, TokenKind::Refresh]
			.map(|kind| self.issue(subject, kind, self.config.lifetime(kind), now));

		Ok(TokenPair { access: access?, refresh: refresh? })
	}

	fn issue(
		&self,
		subject: &SubjectId,
		kind: TokenKind,
		lifetime: Duration,
		now: OffsetDateTime,
	) -> Result<IssuedToken> {
		let _span = OpSpan::new(Operation::Issue, kind.as_str()).entered();
		let key = self.config.keys.active();
		let claims = Claims::new(subject.clone(), kind, now, lifetime)?
			.with_issuer(self.config.issuer.clone());
		let mut header = Header::new(key.algorithm.into());

		header.kid = Some(key.id.to_string());

		let token = jsonwebtoken::encode(&header, &claims, &key.encoding_key()).map_err(|source| {
			obs::record_op_outcome(Operation::Issue, OpOutcome::Failure);

			Error::Signing { source }
		})?;

		obs::record_op_outcome(Operation::Issue, OpOutcome::Success);

		Ok(IssuedToken { token: TokenSecret::new(token), claims })
	}
}
impl Debug for TokenAuthority {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenAuthority")
			.field("config", &self.config)
			.field("rotation_metrics", &self.rotation_metrics)
			.finish()
	}
}

fn retired(claims: &Claims, reason: RetireReason, now: OffsetDateTime) -> RetiredToken {
	RetiredToken {
		token_id: claims.jti.clone(),
		subject: claims.sub.clone(),
		reason,
		retired_at: now,
		expires_at: claims.expires_at,
	}
}

fn report_failure(op: Operation, err: &Error) {
	match err {
		Error::Unavailable(store_err) => obs::log_unavailable(op, store_err, false),
		err if err.is_authentication_failure() => obs::log_auth_failure(op, err),
		_ => (),
	}
}
