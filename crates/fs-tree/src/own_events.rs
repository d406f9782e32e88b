use std::{
	collections::{HashMap, HashSet},
	path::{Path, PathBuf},
	sync::{Arc, Mutex, MutexGuard, PoisonError},
	time::{Duration, Instant},
};

use tracing::trace;

/// Paths this process just mutated.
///
/// Marked synchronously right before a self-initiated mutation and consumed once a
/// reconciliation of the parent directory reported the change, so the resulting callbacks
/// carry `own_event = true`. Marks nobody consumes expire after the configured TTL.
#[derive(Debug, Clone, Default)]
pub struct OwnEventTracker {
	marks: Arc<Mutex<HashMap<PathBuf, Instant>>>,
}

impl OwnEventTracker {
	fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Instant>> {
		// The map stays consistent even if a holder panicked, every operation is a single call
		self.marks.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn mark(&self, path: impl Into<PathBuf>) {
		let path = path.into();
		trace!(path = %path.display(), "Marking own mutation;");
		self.lock().insert(path, Instant::now());
	}

	/// Withdraws a mark whose mutation never happened
	pub fn unmark(&self, path: &Path) {
		self.lock().remove(path);
	}

	/// Marks for direct children of `directory` that are younger than `ttl`
	pub fn children_of(&self, directory: &Path, ttl: Duration) -> HashSet<PathBuf> {
		self.lock()
			.iter()
			.filter(|(path, marked_at)| {
				path.parent() == Some(directory) && marked_at.elapsed() <= ttl
			})
			.map(|(path, _)| path.clone())
			.collect()
	}

	/// Drops the marks of paths whose change has been reported
	pub fn consume<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) {
		let mut marks = self.lock();
		for path in paths {
			marks.remove(path);
		}
	}

	pub fn evict_expired(&self, ttl: Duration) {
		self.lock().retain(|_, marked_at| marked_at.elapsed() <= ttl);
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	pub fn clear(&self) {
		self.lock().clear();
	}
}
