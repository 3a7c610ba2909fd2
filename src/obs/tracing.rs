// self
use crate::{_prelude::*, auth::SubjectId, obs::Operation, store::StoreError};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used by authority and limiter operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(op: Operation, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("bearer_gate.op", op = op.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (op, stage);

			Self {}
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> OpSpanGuard {
		#[cfg(feature = "tracing")]
		{
			OpSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			OpSpanGuard {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// RAII guard returned by [`OpSpan::entered`].
pub struct OpSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for OpSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("OpSpanGuard(..)")
	}
}

/// Logs a token verification failure for internal diagnostics.
pub fn log_auth_failure(op: Operation, error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::debug!(op = op.as_str(), reason = error.kind(), "credential rejected");
	#[cfg(not(feature = "tracing"))]
	let _ = (op, error);
}

/// Logs a shared-store outage; emitted for fail-open and fail-closed decisions alike.
pub fn log_unavailable(op: Operation, error: &StoreError, failed_open: bool) {
	#[cfg(feature = "tracing")]
	tracing::warn!(op = op.as_str(), failed_open, %error, "shared store unavailable");
	#[cfg(not(feature = "tracing"))]
	let _ = (op, error, failed_open);
}

/// Logs reuse of a rotated-out refresh token.
pub fn log_replay(subject: &SubjectId, revoked_subject: bool) {
	#[cfg(feature = "tracing")]
	tracing::warn!(%subject, revoked_subject, "refresh token replay detected");
	#[cfg(not(feature = "tracing"))]
	let _ = (subject, revoked_subject);
}

/// Logs a limiter rejection.
pub fn log_rejected(key: &str, retry_after: Duration) {
	#[cfg(feature = "tracing")]
	tracing::debug!(
		key,
		retry_after_ms = i64::try_from(retry_after.whole_milliseconds()).unwrap_or(i64::MAX),
		"request rejected"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (key, retry_after);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn op_span_works_with_or_without_subscriber() {
		let _guard = OpSpan::new(Operation::Verify, "test").entered();

		log_auth_failure(Operation::Verify, &Error::Expired);
		log_rejected("user:1", Duration::seconds(3));
		log_rejected("user:1", Duration::MAX);
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OpSpan::new(Operation::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
