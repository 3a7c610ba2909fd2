//! Simple file-backed [`RevocationStore`] for single-node deployments that must survive restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::SubjectId,
	store::{ConsumeOutcome, Ledger, RetiredToken, RevocationStore, StoreError, StoreFuture},
};

/// Persists the revocation ledger to a JSON file after each mutation.
///
/// A mutation becomes visible only once its snapshot is on disk; a failed write leaves the
/// ledger as it was.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Ledger>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<Ledger, StoreError> {
		if !path.exists() {
			return Ok(Ledger::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(Ledger::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &Ledger) -> Result<(), StoreError> {
		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize ledger snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl RevocationStore for FileStore {
	fn consume(&self, entry: RetiredToken) -> StoreFuture<'_, ConsumeOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut next = guard.clone();
			let outcome = next.consume(entry);

			if outcome == ConsumeOutcome::Consumed {
				self.persist_locked(&next)?;
				*guard = next;
			}

			Ok(outcome)
		})
	}

	fn revoke_subject<'a>(
		&'a self,
		subject: &'a SubjectId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut next = guard.clone();

			next.revoke_subject(subject, instant);
			self.persist_locked(&next)?;
			*guard = next;

			Ok(())
		})
	}

	fn subject_cutoff<'a>(
		&'a self,
		subject: &'a SubjectId,
	) -> StoreFuture<'a, Option<OffsetDateTime>> {
		Box::pin(async move { Ok(self.inner.read().cutoff(subject)) })
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut next = guard.clone();
			let removed = next.purge_expired(now);

			if removed > 0 {
				self.persist_locked(&next)?;
				*guard = next;
			}

			Ok(removed)
		})
	}
}
