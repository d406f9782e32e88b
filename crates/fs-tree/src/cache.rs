use crate::lister::DirectoryListing;

use std::{
	collections::HashMap,
	path::{Path, PathBuf},
};

/// Last observed listing of every directory enumerated so far.
///
/// Entries are never evicted: a directory that disappears keeps its stale entry, which is
/// harmless because nothing reachable from the root asks for it again. Memory therefore grows
/// with the number of distinct directories ever expanded under one root, and is released only
/// on [`clear`](Self::clear) (done when the tree is retargeted).
#[derive(Debug, Default)]
pub struct DirectoryStateCache {
	listings: HashMap<PathBuf, DirectoryListing>,
}

impl DirectoryStateCache {
	#[must_use]
	pub fn get(&self, path: &Path) -> Option<&DirectoryListing> {
		self.listings.get(path)
	}

	/// Replaces the listing for `path` wholesale, returning the previous one
	pub fn set(
		&mut self,
		path: impl Into<PathBuf>,
		listing: DirectoryListing,
	) -> Option<DirectoryListing> {
		self.listings.insert(path.into(), listing)
	}

	#[must_use]
	pub fn has_prior(&self, path: &Path) -> bool {
		self.listings.contains_key(path)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.listings.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.listings.is_empty()
	}

	pub fn clear(&mut self) {
		self.listings.clear();
	}
}
