//! Diffs freshly enumerated directories against their last known listing.

use crate::{
	cache::DirectoryStateCache,
	diff::{diff_listings, diff_listings_with_renames, ItemChange},
	lister::{child_path, DirectoryLister, DirectoryListing},
};

use std::{
	collections::{HashMap, HashSet},
	path::{Path, PathBuf},
};

use tracing::{debug, instrument, trace};

/// Index addressed row mutation for the tree projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralOperation {
	/// `index` refers to the listing before this reconciliation
	RemoveAt {
		parent: PathBuf,
		index: usize,
		name: String,
	},
	/// `index` refers to the listing after this reconciliation
	InsertAt {
		parent: PathBuf,
		index: usize,
		name: String,
	},
}

impl StructuralOperation {
	#[must_use]
	pub fn parent(&self) -> &Path {
		match self {
			Self::RemoveAt { parent, .. } | Self::InsertAt { parent, .. } => parent,
		}
	}

	#[must_use]
	pub const fn index(&self) -> usize {
		match self {
			Self::RemoveAt { index, .. } | Self::InsertAt { index, .. } => *index,
		}
	}

	#[must_use]
	pub const fn is_remove(&self) -> bool {
		matches!(self, Self::RemoveAt { .. })
	}
}

/// Semantic change, reported once per logical filesystem mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
	Created {
		path: PathBuf,
		own_event: bool,
	},
	Deleted {
		path: PathBuf,
		own_event: bool,
	},
	Renamed {
		from: PathBuf,
		to: PathBuf,
		own_event: bool,
	},
}

impl FileEvent {
	#[must_use]
	pub const fn own_event(&self) -> bool {
		match self {
			Self::Created { own_event, .. }
			| Self::Deleted { own_event, .. }
			| Self::Renamed { own_event, .. } => *own_event,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralUpdate {
	/// No baseline existed, the projection has to rebuild this node
	ReloadSubtree,
	/// Every `RemoveAt` (descending) precedes every `InsertAt` (ascending)
	Operations(Vec<StructuralOperation>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationResult {
	pub directory: PathBuf,
	pub update: StructuralUpdate,
	pub file_events: Vec<FileEvent>,
}

impl ReconciliationResult {
	#[must_use]
	pub fn structural_ops(&self) -> &[StructuralOperation] {
		match &self.update {
			StructuralUpdate::ReloadSubtree => &[],
			StructuralUpdate::Operations(ops) => ops,
		}
	}

	#[must_use]
	pub const fn is_reload(&self) -> bool {
		matches!(self.update, StructuralUpdate::ReloadSubtree)
	}

	/// Nothing for the projection or the observers to do
	#[must_use]
	pub fn is_noop(&self) -> bool {
		!self.is_reload() && self.structural_ops().is_empty() && self.file_events.is_empty()
	}
}

/// Owns the listing cache; every read and write of it goes through `&mut self`, so two
/// reconciliations of the same directory can never interleave.
#[derive(Debug, Default)]
pub struct ReconciliationEngine {
	lister: DirectoryLister,
	cache: DirectoryStateCache,
}

impl ReconciliationEngine {
	#[must_use]
	pub fn new(lister: DirectoryLister) -> Self {
		Self {
			lister,
			cache: DirectoryStateCache::default(),
		}
	}

	#[must_use]
	pub const fn lister(&self) -> &DirectoryLister {
		&self.lister
	}

	#[must_use]
	pub const fn cache(&self) -> &DirectoryStateCache {
		&self.cache
	}

	/// Forgets every known listing, e.g. when the watched root changes
	pub fn reset(&mut self) {
		self.cache.clear();
	}

	/// Enumerates `directory` for the projection and records it as the new baseline
	pub fn populate(&mut self, directory: &Path) -> DirectoryListing {
		let listing = self.lister.list(directory);
		trace!(directory = %directory.display(), entries = listing.len(), "Populated directory;");
		self.cache.set(directory, listing.clone());

		listing
	}

	#[instrument(skip_all, fields(directory = %directory.display()))]
	pub fn reconcile(
		&mut self,
		directory: &Path,
		renames: &HashMap<String, String>,
		own_event_paths: &HashSet<PathBuf>,
	) -> ReconciliationResult {
		// One enumeration per pass; every index below derives from this value and the cached one
		let new_listing = self.lister.list(directory);

		let Some(old_listing) = self.cache.set(directory, new_listing.clone()) else {
			debug!("First observation of directory, reloading its subtree");
			return ReconciliationResult {
				directory: directory.to_path_buf(),
				update: StructuralUpdate::ReloadSubtree,
				file_events: vec![],
			};
		};

		let update = StructuralUpdate::Operations(structural_operations(
			directory,
			diff_listings(&old_listing, &new_listing),
		));

		let file_events = file_events(
			directory,
			&old_listing,
			&new_listing,
			renames,
			own_event_paths,
		);

		let result = ReconciliationResult {
			directory: directory.to_path_buf(),
			update,
			file_events,
		};

		debug!(
			structural_ops = result.structural_ops().len(),
			file_events = result.file_events.len(),
			"Reconciled directory;"
		);

		result
	}
}

fn structural_operations(directory: &Path, changes: Vec<ItemChange>) -> Vec<StructuralOperation> {
	let mut removals = Vec::new();
	let mut insertions = Vec::new();

	for change in changes {
		match change {
			ItemChange::Removed { name, index } => removals.push(StructuralOperation::RemoveAt {
				parent: directory.to_path_buf(),
				index,
				name,
			}),
			ItemChange::Added { name, index } => insertions.push(StructuralOperation::InsertAt {
				parent: directory.to_path_buf(),
				index,
				name,
			}),
		}
	}

	// Removing from the back keeps the remaining old indices valid for sequential appliers
	removals.sort_unstable_by(|a, b| b.index().cmp(&a.index()));
	insertions.sort_unstable_by_key(StructuralOperation::index);

	removals.extend(insertions);
	removals
}

fn file_events(
	directory: &Path,
	old_listing: &DirectoryListing,
	new_listing: &DirectoryListing,
	renames: &HashMap<String, String>,
	own_event_paths: &HashSet<PathBuf>,
) -> Vec<FileEvent> {
	// A rename we can't see both ends of degrades into a deletion and/or a creation
	let renames = renames
		.iter()
		.filter(|(new_name, old_name)| {
			new_name != old_name
				&& new_listing.contains(new_name)
				&& old_listing.contains(old_name)
		})
		.map(|(new_name, old_name)| (new_name.clone(), old_name.clone()))
		.collect::<HashMap<_, _>>();

	let is_own = |path: &Path| own_event_paths.contains(path);

	let mut deleted = Vec::new();
	let mut created = Vec::new();

	for change in diff_listings_with_renames(old_listing, new_listing, &renames) {
		match change {
			ItemChange::Removed { name, .. } => {
				let path = child_path(directory, &name);
				deleted.push(FileEvent::Deleted {
					own_event: is_own(&path),
					path,
				});
			}
			ItemChange::Added { name, .. } => {
				let path = child_path(directory, &name);
				created.push(FileEvent::Created {
					own_event: is_own(&path),
					path,
				});
			}
		}
	}

	let mut renamed = renames
		.iter()
		.map(|(new_name, old_name)| {
			let from = child_path(directory, old_name);
			let to = child_path(directory, new_name);
			FileEvent::Renamed {
				own_event: is_own(&from) || is_own(&to),
				from,
				to,
			}
		})
		.collect::<Vec<_>>();
	// Report renames in listing order, not hash order
	renamed.sort_unstable_by_key(|event| match event {
		FileEvent::Renamed { to, .. } => to
			.file_name()
			.and_then(|name| name.to_str())
			.and_then(|name| new_listing.position(name)),
		_ => None,
	});

	deleted.extend(created);
	deleted.extend(renamed);
	deleted
}
