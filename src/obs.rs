//! Optional observability helpers for authority and limiter operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit spans named `bearer_gate.op` with the `op` and `stage`
//!   fields, `debug` events for verification failures, and `warn` events whenever the shared
//!   store is unavailable or a refresh-token replay is detected.
//! - Enable `metrics` to increment the `bearer_gate_op_total` counter for every
//!   attempt/success/failure/rejection, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Access/refresh token issuance.
	Issue,
	/// Token verification.
	Verify,
	/// Refresh-token rotation.
	Refresh,
	/// Explicit revocation.
	Revoke,
	/// Limiter admission check.
	Admit,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Issue => "issue",
			Operation::Verify => "verify",
			Operation::Refresh => "refresh",
			Operation::Revoke => "revoke",
			Operation::Admit => "admit",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Limiter backpressure (not a failure).
	Rejected,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
			OpOutcome::Rejected => "rejected",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
