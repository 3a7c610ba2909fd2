// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use time::{Duration, OffsetDateTime, macros};
// self
use bearer_gate::{
	auth::{KeyId, KeySet, SigningAlgorithm, SigningKey, SubjectId, TokenKind, TokenResponse},
	authority::{AuthorityConfig, ReplayPolicy, TokenAuthority},
	clock::ManualClock,
	error::{Error, PUBLIC_AUTH_FAILURE},
	store::{ConsumeOutcome, MemoryStore, RetiredToken, RevocationStore, StoreError, StoreFuture},
};

const EPOCH: OffsetDateTime = macros::datetime!(2025-03-01 09:00 UTC);

/// Ledger whose cut-off lookups fail a fixed number of times before recovering.
#[derive(Default)]
struct FlakyCutoffStore {
	inner: MemoryStore,
	failures_left: AtomicUsize,
}
impl RevocationStore for FlakyCutoffStore {
	fn consume(&self, entry: RetiredToken) -> StoreFuture<'_, ConsumeOutcome> {
		self.inner.consume(entry)
	}

	fn revoke_subject<'a>(
		&'a self,
		subject: &'a SubjectId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		self.inner.revoke_subject(subject, instant)
	}

	fn subject_cutoff<'a>(
		&'a self,
		subject: &'a SubjectId,
	) -> StoreFuture<'a, Option<OffsetDateTime>> {
		let failing = self
			.failures_left
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
			.is_ok();

		if failing {
			return Box::pin(async {
				Err(StoreError::Unavailable { message: "connection reset".into() })
			});
		}

		self.inner.subject_cutoff(subject)
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		self.inner.purge_expired(now)
	}
}

fn signing_key(kid: &str, secret: &str) -> SigningKey {
	SigningKey::new(
		KeyId::new(kid).expect("Key identifier fixture should be valid."),
		SigningAlgorithm::Hs256,
		secret,
	)
	.expect("Signing key fixture should be valid.")
}

fn config_with(keys: KeySet, policy: ReplayPolicy) -> AuthorityConfig {
	AuthorityConfig::builder(keys)
		.replay_policy(policy)
		.build()
		.expect("Authority config fixture should build.")
}

fn build_authority_with(
	config: AuthorityConfig,
) -> (TokenAuthority, Arc<MemoryStore>, ManualClock) {
	let store = Arc::new(MemoryStore::default());
	let clock = ManualClock::new(EPOCH);
	let authority = TokenAuthority::new(config, store.clone()).with_clock(Arc::new(clock.clone()));

	(authority, store, clock)
}

fn build_authority(policy: ReplayPolicy) -> (TokenAuthority, Arc<MemoryStore>, ManualClock) {
	build_authority_with(config_with(KeySet::new(signing_key("k1", "integration-secret")), policy))
}

fn subject() -> SubjectId {
	SubjectId::from_numeric(1001)
}

#[tokio::test]
async fn refresh_rotates_and_rejects_replay() {
	let (authority, _, _) = build_authority(ReplayPolicy::RevokeSubject);
	let login = authority.issue_pair(&subject()).expect("Login pair should be issued.");
	let rotated =
		authority.refresh(login.refresh.expose()).await.expect("First refresh should succeed.");

	assert_eq!(rotated.access.claims.sub, subject());
	assert_ne!(rotated.refresh.claims.jti, login.refresh.claims.jti);
	authority
		.verify(rotated.access.expose(), TokenKind::Access)
		.expect("Rotated access token should verify.");
	authority
		.verify(rotated.refresh.expose(), TokenKind::Refresh)
		.expect("Rotated refresh token should verify.");

	let replay = authority.refresh(login.refresh.expose()).await;

	assert!(matches!(replay, Err(Error::ReplayDetected)));
	assert_eq!(authority.rotation_metrics.attempts(), 2);
	assert_eq!(authority.rotation_metrics.successes(), 1);
	assert_eq!(authority.rotation_metrics.failures(), 1);
	assert_eq!(authority.rotation_metrics.replays(), 1);
}

#[tokio::test]
async fn replay_revokes_every_outstanding_refresh_token() {
	let (authority, store, clock) = build_authority(ReplayPolicy::RevokeSubject);
	let login = authority.issue_pair(&subject()).expect("Login pair should be issued.");
	let other_device = authority.issue_pair(&subject()).expect("Second pair should be issued.");
	let rotated =
		authority.refresh(login.refresh.expose()).await.expect("First refresh should succeed.");

	clock.advance(Duration::minutes(5));

	assert!(matches!(
		authority.refresh(login.refresh.expose()).await,
		Err(Error::ReplayDetected)
	));
	assert_eq!(
		store.subject_cutoff(&subject()).await.expect("Cut-off lookup should succeed."),
		Some(EPOCH + Duration::minutes(5))
	);
	assert!(matches!(authority.refresh(rotated.refresh.expose()).await, Err(Error::Revoked)));
	assert!(matches!(
		authority.refresh(other_device.refresh.expose()).await,
		Err(Error::Revoked)
	));

	clock.advance(Duration::seconds(1));

	let relogin = authority.issue_pair(&subject()).expect("Fresh login should be issued.");

	authority
		.refresh(relogin.refresh.expose())
		.await
		.expect("Tokens issued after the revocation should refresh.");
}

#[tokio::test]
async fn reject_only_policy_leaves_sibling_tokens_alive() {
	let (authority, store, _) = build_authority(ReplayPolicy::RejectOnly);
	let login = authority.issue_pair(&subject()).expect("Login pair should be issued.");
	let rotated =
		authority.refresh(login.refresh.expose()).await.expect("First refresh should succeed.");

	assert!(matches!(
		authority.refresh(login.refresh.expose()).await,
		Err(Error::ReplayDetected)
	));
	assert_eq!(
		store.subject_cutoff(&subject()).await.expect("Cut-off lookup should succeed."),
		None
	);
	authority
		.refresh(rotated.refresh.expose())
		.await
		.expect("Sibling refresh token should still rotate.");
}

#[tokio::test]
async fn logout_revokes_without_signalling_replay() {
	let (authority, store, _) = build_authority(ReplayPolicy::RevokeSubject);
	let login = authority.issue_pair(&subject()).expect("Login pair should be issued.");

	authority.revoke(login.refresh.expose()).await.expect("Logout should succeed.");
	authority.revoke(login.refresh.expose()).await.expect("Repeated logout should be idempotent.");

	assert!(matches!(authority.refresh(login.refresh.expose()).await, Err(Error::Revoked)));
	assert_eq!(
		store.subject_cutoff(&subject()).await.expect("Cut-off lookup should succeed."),
		None
	);
	assert_eq!(authority.rotation_metrics.replays(), 0);
}

#[tokio::test]
async fn revoke_subject_cuts_off_issued_tokens_only() {
	let (authority, _, clock) = build_authority(ReplayPolicy::RevokeSubject);
	let login = authority.issue_pair(&subject()).expect("Login pair should be issued.");
	let bystander = SubjectId::from_numeric(2002);
	let bystander_login =
		authority.issue_pair(&bystander).expect("Bystander pair should be issued.");

	clock.advance(Duration::minutes(1));
	authority.revoke_subject(&subject()).await.expect("Subject revocation should succeed.");

	assert!(matches!(authority.refresh(login.refresh.expose()).await, Err(Error::Revoked)));
	authority
		.refresh(bystander_login.refresh.expose())
		.await
		.expect("Other subjects must be unaffected.");

	clock.advance(Duration::seconds(1));

	let relogin = authority.issue_pair(&subject()).expect("Fresh login should be issued.");

	authority
		.refresh(relogin.refresh.expose())
		.await
		.expect("Post-revocation login should rotate.");
}

#[tokio::test]
async fn cut_off_tokens_stay_revoked_on_every_presentation() {
	let (authority, store, clock) = build_authority(ReplayPolicy::RevokeSubject);
	let stale = authority.issue_pair(&subject()).expect("Login pair should be issued.");

	clock.advance(Duration::minutes(1));
	authority.revoke_subject(&subject()).await.expect("Subject revocation should succeed.");
	clock.advance(Duration::minutes(1));

	let relogin = authority.issue_pair(&subject()).expect("Fresh login should be issued.");

	for _ in 0..2 {
		assert!(matches!(authority.refresh(stale.refresh.expose()).await, Err(Error::Revoked)));
	}

	assert_eq!(authority.rotation_metrics.replays(), 0);
	assert_eq!(
		store.subject_cutoff(&subject()).await.expect("Cut-off lookup should succeed."),
		Some(EPOCH + Duration::minutes(1))
	);
	authority
		.refresh(relogin.refresh.expose())
		.await
		.expect("Sessions opened after the revocation must keep working.");
}

#[tokio::test]
async fn store_outage_before_rotation_keeps_the_token_usable() {
	let store =
		Arc::new(FlakyCutoffStore { failures_left: AtomicUsize::new(1), ..Default::default() });
	let config = config_with(
		KeySet::new(signing_key("k1", "integration-secret")),
		ReplayPolicy::RevokeSubject,
	);
	let authority =
		TokenAuthority::new(config, store.clone()).with_clock(Arc::new(ManualClock::new(EPOCH)));
	let login = authority.issue_pair(&subject()).expect("Login pair should be issued.");
	let outage = authority.refresh(login.refresh.expose()).await;

	assert!(matches!(outage, Err(Error::Unavailable(StoreError::Unavailable { .. }))));
	authority
		.refresh(login.refresh.expose())
		.await
		.expect("Retry after the outage should rotate the untouched token.");
	assert_eq!(authority.rotation_metrics.replays(), 0);
	assert_eq!(
		store.subject_cutoff(&subject()).await.expect("Cut-off lookup should succeed."),
		None
	);
}

#[tokio::test]
async fn refresh_rejects_expired_and_wrong_kind_tokens() {
	let (authority, _, clock) = build_authority(ReplayPolicy::RevokeSubject);
	let login = authority.issue_pair(&subject()).expect("Login pair should be issued.");

	assert!(matches!(
		authority.refresh(login.access.expose()).await,
		Err(Error::KindMismatch { expected: TokenKind::Refresh, found: TokenKind::Access })
	));

	clock.advance(Duration::days(7));

	let expired = authority.refresh(login.refresh.expose()).await;

	assert!(matches!(expired, Err(Error::Expired)));

	let err = expired.expect_err("Expired refresh must fail.");

	assert!(err.is_authentication_failure());
	assert_eq!(err.public_message(), PUBLIC_AUTH_FAILURE);
	assert_eq!(Error::ReplayDetected.public_message(), PUBLIC_AUTH_FAILURE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refresh_allows_single_winner() {
	let (authority, _, _) = build_authority(ReplayPolicy::RejectOnly);
	let login = authority.issue_pair(&subject()).expect("Login pair should be issued.");
	let token = login.refresh.expose().to_owned();
	let tasks = (0..16)
		.map(|_| {
			let authority = authority.clone();
			let token = token.clone();

			tokio::spawn(async move { authority.refresh(&token).await })
		})
		.collect::<Vec<_>>();
	let mut successes = 0;
	let mut replays = 0;

	for task in tasks {
		match task.await.expect("Refresh task should not panic.") {
			Ok(_) => successes += 1,
			Err(Error::ReplayDetected) => replays += 1,
			Err(other) => panic!("Unexpected refresh failure: {other:?}"),
		}
	}

	assert_eq!(successes, 1, "only one refresh may win the rotation");
	assert_eq!(replays, 15);
}

#[tokio::test]
async fn key_rollover_keeps_old_sessions_valid() {
	let old_key = signing_key("2025-01", "old-secret");
	let (old_authority, _, _) =
		build_authority_with(config_with(KeySet::new(old_key.clone()), ReplayPolicy::default()));
	let legacy = old_authority.issue_pair(&subject()).expect("Legacy pair should be issued.");
	let rotated_keys = KeySet::new(old_key)
		.rotate(signing_key("2025-02", "new-secret"))
		.expect("Key rotation should succeed.");
	let (authority, _, _) =
		build_authority_with(config_with(rotated_keys.clone(), ReplayPolicy::default()));

	authority
		.verify(legacy.access.expose(), TokenKind::Access)
		.expect("Tokens signed by the previous key should verify during rollover.");

	let fresh = authority
		.refresh(legacy.refresh.expose())
		.await
		.expect("Legacy refresh token should rotate during rollover.");

	assert_eq!(fresh.access.claims.sub, subject());

	let retired_keys = rotated_keys
		.retire(&KeyId::new("2025-01").expect("Key identifier fixture should be valid."))
		.expect("Retiring the previous key should succeed.");
	let (strict, _, _) = build_authority_with(config_with(retired_keys, ReplayPolicy::default()));

	assert!(matches!(
		strict.verify(legacy.access.expose(), TokenKind::Access),
		Err(Error::InvalidSignature)
	));
	strict
		.verify(fresh.access.expose(), TokenKind::Access)
		.expect("Tokens signed by the active key should verify.");
}

#[tokio::test]
async fn purge_drops_ledger_entries_of_expired_tokens() {
	let (authority, _, clock) = build_authority(ReplayPolicy::RevokeSubject);
	let login = authority.issue_pair(&subject()).expect("Login pair should be issued.");

	authority.refresh(login.refresh.expose()).await.expect("Refresh should succeed.");

	assert_eq!(authority.purge_expired().await.expect("Purge should succeed."), 0);

	clock.advance(Duration::days(7));

	assert_eq!(authority.purge_expired().await.expect("Purge should succeed."), 1);
}

#[test]
fn token_response_reports_bearer_and_lifetime() {
	let (authority, _, _) = build_authority(ReplayPolicy::RevokeSubject);
	let pair = authority.issue_pair(&subject()).expect("Login pair should be issued.");
	let response = pair.to_response(EPOCH);
	let body = serde_json::to_value(&response).expect("Token response should serialize.");

	assert_eq!(response.token_type, TokenResponse::BEARER);
	assert_eq!(response.expires_in, 30 * 60);
	assert_eq!(body["token_type"], "bearer");
	assert_eq!(body["access_token"], pair.access.expose());
}
