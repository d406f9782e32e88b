//! Enumerates the displayable children of a directory.

use crate::{config::TreeConfig, error::FileIOError};

use std::{
	cmp::Ordering,
	fmt, fs,
	path::{Path, PathBuf},
	sync::Arc,
};

use tracing::{debug, trace, warn};

const HIDDEN_FILE_MARKER: char = '.';

pub type DisplayFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;
pub type NameComparator = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

/// Decides which child names are shown and in which order.
///
/// Shared between the background classifier and the reconciliation context, so the same
/// policy filters notifications and listings alike.
#[derive(Clone, Default)]
pub struct ListingPolicy {
	show_hidden_files: bool,
	filter: Option<DisplayFilter>,
	comparator: Option<NameComparator>,
}

impl fmt::Debug for ListingPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ListingPolicy")
			.field("show_hidden_files", &self.show_hidden_files)
			.field("custom_filter", &self.filter.is_some())
			.field("custom_comparator", &self.comparator.is_some())
			.finish()
	}
}

impl ListingPolicy {
	#[must_use]
	pub fn new(config: &TreeConfig) -> Self {
		Self {
			show_hidden_files: config.show_hidden_files,
			..Default::default()
		}
	}

	/// Replaces the hidden file policy with a custom predicate
	#[must_use]
	pub fn with_filter(mut self, filter: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
		self.filter = Some(Arc::new(filter));
		self
	}

	/// Replaces the default lexicographic order
	#[must_use]
	pub fn with_comparator(
		mut self,
		comparator: impl Fn(&str, &str) -> Ordering + Send + Sync + 'static,
	) -> Self {
		self.comparator = Some(Arc::new(comparator));
		self
	}

	#[must_use]
	pub fn should_display(&self, name: &str) -> bool {
		match &self.filter {
			Some(filter) => filter(name),
			None => self.show_hidden_files || !name.starts_with(HIDDEN_FILE_MARKER),
		}
	}

	fn sort(&self, names: &mut [String]) {
		match &self.comparator {
			Some(comparator) => names.sort_by(|a, b| comparator(a, b)),
			None => names.sort_unstable(),
		}
	}
}

/// Filtered and sorted child names of a single directory.
///
/// Never edited in place; a fresh enumeration always produces a new listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
	names: Vec<String>,
}

impl DirectoryListing {
	#[must_use]
	pub fn names(&self) -> &[String] {
		&self.names
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.names.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.names.is_empty()
	}

	#[must_use]
	pub fn contains(&self, name: &str) -> bool {
		self.names.iter().any(|n| n == name)
	}

	#[must_use]
	pub fn position(&self, name: &str) -> Option<usize> {
		self.names.iter().position(|n| n == name)
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
		self.names.iter().map(String::as_str)
	}
}

impl<S: Into<String>> FromIterator<S> for DirectoryListing {
	/// Builds a listing from names that are already filtered and ordered
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		Self {
			names: iter.into_iter().map(Into::into).collect(),
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryLister {
	policy: ListingPolicy,
}

impl DirectoryLister {
	#[must_use]
	pub const fn new(policy: ListingPolicy) -> Self {
		Self { policy }
	}

	#[must_use]
	pub const fn policy(&self) -> &ListingPolicy {
		&self.policy
	}

	/// Current children of `path` on disk.
	///
	/// A directory that is unreadable or already gone yields an empty listing, as it can
	/// vanish between a notification and its enumeration.
	pub fn list(&self, path: impl AsRef<Path>) -> DirectoryListing {
		let path = path.as_ref();

		match self.try_list(path) {
			Ok(listing) => listing,
			Err(e) if e.is_not_found() => {
				trace!(path = %path.display(), "Directory vanished before enumeration;");
				DirectoryListing::default()
			}
			Err(e) => {
				debug!(?e, "Unable to enumerate directory, treating it as empty;");
				DirectoryListing::default()
			}
		}
	}

	fn try_list(&self, path: &Path) -> Result<DirectoryListing, FileIOError> {
		let read_dir = fs::read_dir(path).map_err(|e| {
			FileIOError::from_std_io_err_with_msg(path, e, "failed to read directory")
		})?;

		let mut names = Vec::new();
		for entry in read_dir {
			let entry = entry.map_err(|e| {
				FileIOError::from_std_io_err_with_msg(path, e, "failed to read directory entry")
			})?;

			match entry.file_name().into_string() {
				Ok(name) if self.policy.should_display(&name) => names.push(name),
				Ok(name) => trace!(%name, "Skipping filtered entry;"),
				Err(name) => warn!(?name, parent = %path.display(), "Skipping non UTF-8 entry;"),
			}
		}

		self.policy.sort(&mut names);

		Ok(DirectoryListing { names })
	}
}

/// Joins a child name onto its parent directory path
pub(crate) fn child_path(parent: &Path, name: &str) -> PathBuf {
	parent.join(name)
}
