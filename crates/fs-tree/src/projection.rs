//! Seams towards the UI that renders the tree and the code reacting to file changes.

use crate::reconcile::{FileEvent, StructuralOperation};

use std::path::Path;

/// Index addressed row model mirroring the directory tree.
///
/// Operations may target nodes that are collapsed or off screen; the projection only has to
/// keep its row indices consistent with them.
pub trait TreeProjection {
	/// Rebuild the rows under `directory` from scratch
	fn reload_subtree(&mut self, directory: &Path);

	/// Apply one operation. Operations of a reconciliation arrive in the order they must be
	/// applied: every removal first, then every insertion.
	fn apply(&mut self, operation: &StructuralOperation);
}

/// Semantic callbacks, fired once per logical change in addition to structural operations
pub trait FileEventObserver {
	fn on_file_created(&mut self, path: &Path, own_event: bool);

	fn on_file_deleted(&mut self, path: &Path, own_event: bool);

	fn on_file_renamed(&mut self, from: &Path, to: &Path, own_event: bool);

	/// Dispatches to the matching callback
	fn on_file_event(&mut self, event: &FileEvent) {
		match event {
			FileEvent::Created { path, own_event } => self.on_file_created(path, *own_event),
			FileEvent::Deleted { path, own_event } => self.on_file_deleted(path, *own_event),
			FileEvent::Renamed {
				from,
				to,
				own_event,
			} => self.on_file_renamed(from, to, *own_event),
		}
	}
}

/// Observer for trees nobody listens to semantically
impl FileEventObserver for () {
	fn on_file_created(&mut self, _: &Path, _: bool) {}

	fn on_file_deleted(&mut self, _: &Path, _: bool) {}

	fn on_file_renamed(&mut self, _: &Path, _: &Path, _: bool) {}
}
