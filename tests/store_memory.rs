// std
use std::sync::Arc;
// crates.io
use time::{Duration, OffsetDateTime, macros};
// self
use bearer_gate::{
	auth::{SubjectId, TokenId},
	store::{
		ConsumeOutcome, CounterStore, MemoryStore, RetireReason, RetiredToken, RevocationStore,
		WindowHit,
	},
};

const ISSUED: OffsetDateTime = macros::datetime!(2025-11-10 12:00 UTC);

fn make_subject() -> SubjectId {
	SubjectId::new("principal-456").expect("Failed to build subject identifier for store tests.")
}

fn retired(token_id: &str, reason: RetireReason) -> RetiredToken {
	RetiredToken {
		token_id: TokenId::new(token_id).expect("Failed to build token id for store tests."),
		subject: make_subject(),
		reason,
		retired_at: ISSUED,
		expires_at: ISSUED + Duration::days(7),
	}
}

#[tokio::test]
async fn consume_reports_first_retirement_reason() {
	let store = MemoryStore::default();

	assert_eq!(
		store
			.consume(retired("jti-1", RetireReason::Revoked))
			.await
			.expect("Consuming a fresh token id should succeed."),
		ConsumeOutcome::Consumed
	);
	assert_eq!(
		store
			.consume(retired("jti-1", RetireReason::Rotated))
			.await
			.expect("Consuming a retired token id should still succeed."),
		ConsumeOutcome::AlreadyRetired(RetireReason::Revoked)
	);
	assert_eq!(
		store
			.consume(retired("jti-2", RetireReason::Rotated))
			.await
			.expect("Consuming an unrelated token id should succeed."),
		ConsumeOutcome::Consumed
	);
}

#[tokio::test]
async fn subject_cutoff_only_moves_forward() {
	let store = MemoryStore::default();
	let subject = make_subject();

	assert_eq!(
		store.subject_cutoff(&subject).await.expect("Reading an absent cut-off should succeed."),
		None
	);

	store
		.revoke_subject(&subject, ISSUED + Duration::hours(2))
		.await
		.expect("Recording a cut-off should succeed.");
	store
		.revoke_subject(&subject, ISSUED + Duration::hours(1))
		.await
		.expect("Recording an older cut-off should succeed.");

	assert_eq!(
		store.subject_cutoff(&subject).await.expect("Reading the cut-off should succeed."),
		Some(ISSUED + Duration::hours(2))
	);
}

#[tokio::test]
async fn purge_keeps_live_entries() {
	let store = MemoryStore::default();
	let mut short_lived = retired("jti-short", RetireReason::Rotated);

	short_lived.expires_at = ISSUED + Duration::hours(1);
	store.consume(short_lived).await.expect("Consuming the short-lived id should succeed.");
	store
		.consume(retired("jti-long", RetireReason::Rotated))
		.await
		.expect("Consuming the long-lived id should succeed.");

	assert_eq!(
		store.purge_expired(ISSUED + Duration::hours(1)).await.expect("Purge should succeed."),
		1
	);
	assert_eq!(
		store
			.consume(retired("jti-long", RetireReason::Rotated))
			.await
			.expect("Consuming a live retired id should succeed."),
		ConsumeOutcome::AlreadyRetired(RetireReason::Rotated)
	);
}

#[tokio::test]
async fn concurrent_consume_allows_single_winner() {
	let store = Arc::new(MemoryStore::default());
	let store_a = store.clone();
	let store_b = store.clone();
	let task_a = tokio::spawn(async move {
		store_a
			.consume(retired("jti-race", RetireReason::Rotated))
			.await
			.expect("Consume task A should complete successfully.")
	});
	let task_b = tokio::spawn(async move {
		store_b
			.consume(retired("jti-race", RetireReason::Rotated))
			.await
			.expect("Consume task B should complete successfully.")
	});
	let (outcome_a, outcome_b) = tokio::join!(task_a, task_b);
	let outcomes = [
		outcome_a.expect("Consume task A should not panic."),
		outcome_b.expect("Consume task B should not panic."),
	];
	let winners = outcomes.iter().filter(|outcome| **outcome == ConsumeOutcome::Consumed).count();

	assert_eq!(winners, 1, "only one consume should succeed");
}

#[tokio::test]
async fn counter_hits_report_the_window() {
	let store = MemoryStore::default();
	let window = Duration::seconds(30);
	let first = store.try_acquire("k", 1, window, ISSUED).await.expect("Acquire should succeed.");
	let second = store.try_acquire("k", 1, window, ISSUED).await.expect("Acquire should succeed.");

	let WindowHit::Admitted(counter) = first else {
		panic!("First acquire should be admitted.");
	};

	assert_eq!(counter.count, 1);
	assert_eq!(counter.window_end(), ISSUED + window);
	assert!(matches!(second, WindowHit::Exhausted(ref counter) if counter.count == 1));
	assert_eq!(store.evict_idle(ISSUED + window).await.expect("Eviction should succeed."), 1);
	assert_eq!(store.counter_len(), 0);
}
