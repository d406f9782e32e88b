//! Turns an ordered batch of raw notifications into per directory touch sets.
//!
//! Platforms like FSEvents deliver a rename as two separate notifications, one for the old
//! name and one for the new. Those are paired back together here, but only when they are
//! adjacent in the batch and share a parent; anything else degrades to plain directory touches.

use crate::{
	event::{Disposition, ItemKind, NormalizedEvent, RawFsEvent},
	lister::ListingPolicy,
};

use std::{
	collections::{BTreeMap, HashMap, HashSet},
	path::{Component, Path, PathBuf},
};

use tracing::trace;

/// Everything a batch says about one directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchedDirectory {
	/// new name -> old name
	pub renames: HashMap<String, String>,
	pub own_event_paths: HashSet<PathBuf>,
}

impl TouchedDirectory {
	fn record_rename(&mut self, from: String, to: String) -> bool {
		// `a -> b` followed by `b -> c` collapses into `a -> c`
		let (origin, collapsed) = match self.renames.remove(&from) {
			Some(origin) => (origin, true),
			None => (from, false),
		};

		if origin != to {
			self.renames.insert(to, origin);
		}

		collapsed
	}
}

/// Immutable unit of work handed from the watcher task to the reconciliation context
#[derive(Debug, Clone, Default)]
pub struct ClassifiedBatch {
	/// Watch generation this batch was produced under
	pub generation: u64,
	pub root: PathBuf,
	pub directories: BTreeMap<PathBuf, TouchedDirectory>,
	pub raw_events: usize,
	pub rename_pairs: usize,
}

#[derive(Debug, Clone)]
pub struct EventClassifier {
	root: PathBuf,
	policy: ListingPolicy,
}

impl EventClassifier {
	#[must_use]
	pub fn new(root: impl Into<PathBuf>, policy: ListingPolicy) -> Self {
		Self {
			root: root.into(),
			policy,
		}
	}

	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Whether a path lies under the root with every component below it displayable
	#[must_use]
	pub fn is_displayable(&self, path: &Path) -> bool {
		let Ok(relative) = path.strip_prefix(&self.root) else {
			return false;
		};

		relative.components().all(|component| match component {
			Component::Normal(name) => name
				.to_str()
				.is_some_and(|name| self.policy.should_display(name)),
			_ => false,
		})
	}

	#[must_use]
	pub fn classify(&self, raw_events: &[RawFsEvent]) -> Vec<NormalizedEvent> {
		let mut normalized = Vec::with_capacity(raw_events.len());
		let mut cursor = 0;

		while cursor < raw_events.len() {
			let event = &raw_events[cursor];

			if !self.is_displayable(&event.path) {
				trace!(path = %event.path.display(), "Skipping filtered event;");
				cursor += 1;
				continue;
			}

			if let Some(pair) = raw_events
				.get(cursor + 1)
				.and_then(|next| self.rename_pair(event, next))
			{
				// inotify reports a rename as From, To and then Both, which pairs up twice
				if normalized.last() == Some(&pair) {
					trace!(?pair, "Skipping repeated rename pair;");
				} else {
					normalized.push(pair);
				}
				cursor += 2;
				continue;
			}

			normalized.push(self.touch(event));
			cursor += 1;
		}

		normalized
	}

	fn rename_pair(&self, current: &RawFsEvent, next: &RawFsEvent) -> Option<NormalizedEvent> {
		if !current.is_renamed() || !next.is_renamed() || !self.is_displayable(&next.path) {
			return None;
		}

		let parent = current.parent()?;
		if next.parent() != Some(parent) || parent.as_os_str().is_empty() {
			return None;
		}

		Some(NormalizedEvent::RenamePair {
			parent: parent.to_path_buf(),
			from: current.name()?.to_string(),
			to: next.name()?.to_string(),
			own_event: current.own_event,
		})
	}

	fn touch(&self, event: &RawFsEvent) -> NormalizedEvent {
		let touches_itself = event.kind == ItemKind::Directory
			&& event.disposition == Disposition::Modified;

		let directory = if touches_itself || event.path == self.root {
			event.path.clone()
		} else {
			// Displayable paths are strictly below the root here, so a parent always exists
			event
				.parent()
				.map_or_else(|| self.root.clone(), Path::to_path_buf)
		};

		NormalizedEvent::DirectoryTouched {
			directory,
			item: event.path.clone(),
			own_event: event.own_event,
		}
	}

	/// Groups normalized events so each directory is reconciled once per batch.
	///
	/// Returns the groups and how many rename chains were collapsed.
	pub fn group(
		events: impl IntoIterator<Item = NormalizedEvent>,
	) -> (BTreeMap<PathBuf, TouchedDirectory>, usize) {
		let mut directories = BTreeMap::<_, TouchedDirectory>::new();
		let mut collapsed_chains = 0;

		for event in events {
			match event {
				NormalizedEvent::DirectoryTouched {
					directory,
					item,
					own_event,
				} => {
					let touched = directories.entry(directory).or_default();
					if own_event {
						touched.own_event_paths.insert(item);
					}
				}
				NormalizedEvent::RenamePair {
					parent,
					from,
					to,
					own_event,
				} => {
					let touched = directories.entry(parent.clone()).or_default();
					if own_event {
						touched.own_event_paths.insert(parent.join(&from));
						touched.own_event_paths.insert(parent.join(&to));
					}
					if touched.record_rename(from, to) {
						collapsed_chains += 1;
					}
				}
			}
		}

		(directories, collapsed_chains)
	}

	/// Classifies and groups a whole raw batch
	#[must_use]
	pub fn classify_batch(&self, generation: u64, raw_events: &[RawFsEvent]) -> ClassifiedBatch {
		let normalized = self.classify(raw_events);
		let rename_pairs = normalized
			.iter()
			.filter(|event| matches!(event, NormalizedEvent::RenamePair { .. }))
			.count();

		let (directories, collapsed_chains) = Self::group(normalized);
		if collapsed_chains > 0 {
			trace!(collapsed_chains, "Collapsed rename chains;");
		}

		ClassifiedBatch {
			generation,
			root: self.root.clone(),
			directories,
			raw_events: raw_events.len(),
			rename_pairs,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn classifier() -> EventClassifier {
		EventClassifier::new("/w", ListingPolicy::default())
	}

	fn renamed(path: &str) -> RawFsEvent {
		RawFsEvent::new(path, ItemKind::File, Disposition::Renamed)
	}

	fn touched(directory: &str, item: &str) -> NormalizedEvent {
		NormalizedEvent::DirectoryTouched {
			directory: directory.into(),
			item: item.into(),
			own_event: false,
		}
	}

	#[test]
	fn adjacent_renames_in_same_parent_pair_up() {
		let events = classifier().classify(&[renamed("/w/foo.txt"), renamed("/w/bar.txt")]);

		assert_eq!(
			events,
			vec![NormalizedEvent::RenamePair {
				parent: "/w".into(),
				from: "foo.txt".into(),
				to: "bar.txt".into(),
				own_event: false,
			}]
		);
	}

	#[test]
	fn repeated_rename_pair_counts_once() {
		let batch = classifier().classify_batch(
			0,
			&[
				renamed("/w/foo.txt"),
				renamed("/w/bar.txt"),
				renamed("/w/foo.txt"),
				renamed("/w/bar.txt"),
			],
		);

		assert_eq!(batch.rename_pairs, 1);
		assert_eq!(
			batch.directories[Path::new("/w")].renames,
			HashMap::from([("bar.txt".to_string(), "foo.txt".to_string())])
		);
	}

	#[test]
	fn cross_directory_renames_are_plain_touches() {
		let events = classifier().classify(&[renamed("/w/a/foo"), renamed("/w/b/foo")]);

		assert_eq!(
			events,
			vec![touched("/w/a", "/w/a/foo"), touched("/w/b", "/w/b/foo")]
		);
	}

	#[test]
	fn non_adjacent_renames_are_not_paired() {
		let events = classifier().classify(&[
			renamed("/w/foo"),
			RawFsEvent::new("/w/x", ItemKind::File, Disposition::Created),
			renamed("/w/bar"),
		]);

		assert_eq!(events.len(), 3);
		assert!(events
			.iter()
			.all(|event| matches!(event, NormalizedEvent::DirectoryTouched { .. })));
	}

	#[test]
	fn trailing_unmatched_rename_degrades_to_touch() {
		let events = classifier().classify(&[
			renamed("/w/a"),
			renamed("/w/b"),
			renamed("/w/c"),
		]);

		assert_eq!(events.len(), 2);
		assert!(matches!(events[0], NormalizedEvent::RenamePair { .. }));
		assert_eq!(events[1], touched("/w", "/w/c"));
	}

	#[test]
	fn directory_events_pick_the_right_directory() {
		let events = classifier().classify(&[
			RawFsEvent::new("/w/src", ItemKind::Directory, Disposition::Created),
			RawFsEvent::new("/w/lib", ItemKind::Directory, Disposition::Modified),
			RawFsEvent::new("/w/lib/mod.rs", ItemKind::File, Disposition::Modified),
			RawFsEvent::new("/w", ItemKind::Directory, Disposition::Removed),
		]);

		assert_eq!(
			events,
			vec![
				touched("/w", "/w/src"),
				touched("/w/lib", "/w/lib"),
				touched("/w/lib", "/w/lib/mod.rs"),
				touched("/w", "/w"),
			]
		);
	}

	#[test]
	fn hidden_items_and_hidden_ancestors_are_skipped() {
		let events = classifier().classify(&[
			RawFsEvent::new("/w/.git/HEAD", ItemKind::File, Disposition::Modified),
			RawFsEvent::new("/w/.env", ItemKind::File, Disposition::Created),
			RawFsEvent::new("/elsewhere/file", ItemKind::File, Disposition::Created),
			RawFsEvent::new("/w/visible", ItemKind::File, Disposition::Created),
		]);

		assert_eq!(events, vec![touched("/w", "/w/visible")]);
	}

	#[test]
	fn rename_to_hidden_name_is_not_paired() {
		let events = classifier().classify(&[renamed("/w/notes"), renamed("/w/.notes")]);

		assert_eq!(events, vec![touched("/w", "/w/notes")]);
	}

	#[test]
	fn grouping_merges_touches_per_directory() {
		let raw = [
			RawFsEvent::new("/w/a", ItemKind::File, Disposition::Created).own(),
			RawFsEvent::new("/w/b", ItemKind::File, Disposition::Created),
			renamed("/w/sub/old").own(),
			renamed("/w/sub/new"),
		];

		let batch = classifier().classify_batch(7, &raw);

		assert_eq!(batch.generation, 7);
		assert_eq!(batch.raw_events, 4);
		assert_eq!(batch.rename_pairs, 1);
		assert_eq!(batch.directories.len(), 2);

		let root = &batch.directories[Path::new("/w")];
		assert!(root.renames.is_empty());
		assert_eq!(
			root.own_event_paths,
			HashSet::from([PathBuf::from("/w/a")])
		);

		let sub = &batch.directories[Path::new("/w/sub")];
		assert_eq!(sub.renames.get("new").map(String::as_str), Some("old"));
		assert!(sub.own_event_paths.contains(Path::new("/w/sub/old")));
		assert!(sub.own_event_paths.contains(Path::new("/w/sub/new")));
	}

	#[test]
	fn rename_chains_collapse() {
		let (directories, collapsed) = EventClassifier::group([
			NormalizedEvent::RenamePair {
				parent: "/w".into(),
				from: "a".into(),
				to: "b".into(),
				own_event: false,
			},
			NormalizedEvent::RenamePair {
				parent: "/w".into(),
				from: "b".into(),
				to: "c".into(),
				own_event: false,
			},
		]);

		assert_eq!(collapsed, 1);
		let renames = &directories[Path::new("/w")].renames;
		assert_eq!(renames.len(), 1);
		assert_eq!(renames.get("c").map(String::as_str), Some("a"));
	}

	#[test]
	fn rename_back_and_forth_cancels_out() {
		let (directories, _) = EventClassifier::group([
			NormalizedEvent::RenamePair {
				parent: "/w".into(),
				from: "a".into(),
				to: "b".into(),
				own_event: false,
			},
			NormalizedEvent::RenamePair {
				parent: "/w".into(),
				from: "b".into(),
				to: "a".into(),
				own_event: false,
			},
		]);

		assert!(directories[Path::new("/w")].renames.is_empty());
	}
}
