//! Raw watcher notifications and the normalized events derived from them

use std::path::{Path, PathBuf};

use notify::{
	event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind, RenameMode},
	Event, EventKind,
};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
	File,
	Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
	Created,
	Removed,
	Renamed,
	Modified,
}

/// One notification as delivered by the platform watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFsEvent {
	pub path: PathBuf,
	pub kind: ItemKind,
	pub disposition: Disposition,
	/// The change was caused by this process
	pub own_event: bool,
}

impl RawFsEvent {
	#[must_use]
	pub fn new(path: impl Into<PathBuf>, kind: ItemKind, disposition: Disposition) -> Self {
		Self {
			path: path.into(),
			kind,
			disposition,
			own_event: false,
		}
	}

	#[must_use]
	pub const fn own(mut self) -> Self {
		self.own_event = true;
		self
	}

	#[must_use]
	pub fn name(&self) -> Option<&str> {
		self.path.file_name().and_then(|name| name.to_str())
	}

	#[must_use]
	pub fn parent(&self) -> Option<&Path> {
		self.path.parent()
	}

	#[must_use]
	pub const fn is_renamed(&self) -> bool {
		matches!(self.disposition, Disposition::Renamed)
	}

	/// Converts a notify event into zero or more raw events, preserving path order.
	///
	/// notify exposes no own event flag, so every produced event carries `own_event = false`.
	#[must_use]
	pub fn from_notify(event: Event) -> Vec<Self> {
		let Event { kind, paths, .. } = event;

		let (disposition, precise_kind) = match kind {
			EventKind::Create(CreateKind::File) => (Disposition::Created, Some(ItemKind::File)),
			EventKind::Create(CreateKind::Folder) => {
				(Disposition::Created, Some(ItemKind::Directory))
			}
			EventKind::Create(_) => (Disposition::Created, None),
			EventKind::Remove(RemoveKind::File) => (Disposition::Removed, Some(ItemKind::File)),
			EventKind::Remove(RemoveKind::Folder) => {
				(Disposition::Removed, Some(ItemKind::Directory))
			}
			EventKind::Remove(_) => (Disposition::Removed, None),
			EventKind::Modify(ModifyKind::Name(
				RenameMode::From | RenameMode::To | RenameMode::Any | RenameMode::Both,
			)) => (Disposition::Renamed, None),
			EventKind::Modify(_) | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
				(Disposition::Modified, None)
			}
			other => {
				trace!(?other, "Ignoring notification kind;");
				return vec![];
			}
		};

		// A `Both` rename carries [from, to], which lines up as two adjacent renamed events
		paths
			.into_iter()
			.map(|path| {
				let kind = precise_kind.unwrap_or_else(|| probe_kind(&path));
				Self::new(path, kind, disposition)
			})
			.collect()
	}
}

/// Best effort item kind for notifications that don't carry one; vanished paths count as files
fn probe_kind(path: &Path) -> ItemKind {
	match std::fs::symlink_metadata(path) {
		Ok(metadata) if metadata.is_dir() => ItemKind::Directory,
		_ => ItemKind::File,
	}
}

/// A classified change, ready to be grouped by the directory it touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedEvent {
	/// Something changed under `directory`, which must be re-enumerated
	DirectoryTouched {
		directory: PathBuf,
		item: PathBuf,
		own_event: bool,
	},
	/// Two adjacent rename notifications sharing a parent, resolved into one rename
	RenamePair {
		parent: PathBuf,
		from: String,
		to: String,
		own_event: bool,
	},
}

impl NormalizedEvent {
	/// Directory whose listing this event invalidates
	#[must_use]
	pub fn directory(&self) -> &Path {
		match self {
			Self::DirectoryTouched { directory, .. } => directory,
			Self::RenamePair { parent, .. } => parent,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use notify::event::DataChange;
	use tempfile::tempdir;

	#[test]
	fn precise_create_kind_is_kept() {
		let event = Event::new(EventKind::Create(CreateKind::Folder)).add_path("/w/dir".into());

		let raws = RawFsEvent::from_notify(event);

		assert_eq!(
			raws,
			vec![RawFsEvent::new(
				"/w/dir",
				ItemKind::Directory,
				Disposition::Created
			)]
		);
	}

	#[test]
	fn both_rename_splits_into_adjacent_events() {
		let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
			.add_path("/w/old.txt".into())
			.add_path("/w/new.txt".into());

		let raws = RawFsEvent::from_notify(event);

		assert_eq!(raws.len(), 2);
		assert!(raws.iter().all(RawFsEvent::is_renamed));
		assert_eq!(raws[0].name(), Some("old.txt"));
		assert_eq!(raws[1].name(), Some("new.txt"));
	}

	#[test]
	fn imprecise_kind_probes_disk() {
		let dir = tempdir().unwrap();
		let inner = dir.path().join("inner");
		std::fs::create_dir(&inner).unwrap();

		let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)))
			.add_path(inner.clone());
		let gone = Event::new(EventKind::Remove(RemoveKind::Any))
			.add_path(dir.path().join("gone"));

		assert_eq!(RawFsEvent::from_notify(event)[0].kind, ItemKind::Directory);
		assert_eq!(RawFsEvent::from_notify(gone)[0].kind, ItemKind::File);
	}

	#[test]
	fn data_changes_are_modifications() {
		let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
			.add_path("/w/a".into());

		assert_eq!(
			RawFsEvent::from_notify(event)[0].disposition,
			Disposition::Modified
		);
	}

	#[test]
	fn plain_access_is_ignored() {
		let event = Event::new(EventKind::Access(AccessKind::Read)).add_path("/w/a".into());

		assert!(RawFsEvent::from_notify(event).is_empty());
	}
}
