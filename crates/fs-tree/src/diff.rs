//! Positional diffing of two directory listings.
//!
//! Runs Myers' O(ND) edit script over the names, so a handful of changes in a directory with
//! thousands of entries stays cheap.

use crate::lister::DirectoryListing;

use std::{
	borrow::Cow,
	collections::{HashMap, HashSet},
};

use similar::{capture_diff_slices, Algorithm, DiffTag};

/// Can't appear in a file name, so keys prefixed with it never match a listed name
const RECREATED_KEY_PREFIX: char = '\0';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemChange {
	/// `index` is a position in the new listing
	Added { name: String, index: usize },
	/// `index` is a position in the old listing
	Removed { name: String, index: usize },
}

impl ItemChange {
	#[must_use]
	pub fn name(&self) -> &str {
		match self {
			Self::Added { name, .. } | Self::Removed { name, .. } => name,
		}
	}
}

/// Removed entries in ascending old index order, followed by added entries in ascending new
/// index order.
#[must_use]
pub fn diff_listings(old: &DirectoryListing, new: &DirectoryListing) -> Vec<ItemChange> {
	let old_keys = old.iter().collect::<Vec<_>>();
	let new_keys = new.iter().collect::<Vec<_>>();

	changes_by_keys(old, new, &old_keys, &new_keys)
}

/// Same as [`diff_listings`], but a new name that `renames` maps to an old name is
/// considered equal to it, so a rename never shows up as a removal plus an addition.
///
/// `renames` maps new names to old names and should only hold pairs where the old name was
/// in `old` and the new name is in `new`.
#[must_use]
pub fn diff_listings_with_renames(
	old: &DirectoryListing,
	new: &DirectoryListing,
	renames: &HashMap<String, String>,
) -> Vec<ItemChange> {
	let origins = renames.values().map(String::as_str).collect::<HashSet<_>>();

	let old_keys = old.iter().collect::<Vec<_>>();
	// A name that was renamed away and then recreated is a new entry, not its origin
	let new_keys = new
		.iter()
		.map(|name| match renames.get(name) {
			Some(old_name) => Cow::Borrowed(old_name.as_str()),
			None if origins.contains(name) => Cow::Owned(format!("{RECREATED_KEY_PREFIX}{name}")),
			None => Cow::Borrowed(name),
		})
		.collect::<Vec<_>>();
	let new_keys = new_keys.iter().map(|key| &**key).collect::<Vec<&str>>();

	let mut changes = changes_by_keys(old, new, &old_keys, &new_keys);

	// Renames can reorder entries, which an edit script reports as a removal and an addition
	// of the very same name; those entries survived.
	let removed = changes
		.iter()
		.filter_map(|change| match change {
			ItemChange::Removed { name, .. } => Some(name.clone()),
			ItemChange::Added { .. } => None,
		})
		.collect::<HashSet<_>>();
	let added = changes
		.iter()
		.filter_map(|change| match change {
			ItemChange::Added { name, .. } => Some(name.clone()),
			ItemChange::Removed { .. } => None,
		})
		.collect::<HashSet<_>>();

	changes.retain(|change| {
		let name = change.name();
		match change {
			ItemChange::Removed { .. } => !origins.contains(name) && !added.contains(name),
			// Keyed apart from its old self above, so this addition is a real creation
			ItemChange::Added { .. } if origins.contains(name) => !renames.contains_key(name),
			ItemChange::Added { .. } => !renames.contains_key(name) && !removed.contains(name),
		}
	});

	changes
}

fn changes_by_keys(
	old: &DirectoryListing,
	new: &DirectoryListing,
	old_keys: &[&str],
	new_keys: &[&str],
) -> Vec<ItemChange> {
	let mut removed = Vec::new();
	let mut added = Vec::new();

	for op in capture_diff_slices(Algorithm::Myers, old_keys, new_keys) {
		let (tag, old_range, new_range) = op.as_tag_tuple();

		if matches!(tag, DiffTag::Delete | DiffTag::Replace) {
			removed.extend(old_range.map(|index| ItemChange::Removed {
				name: old.names()[index].clone(),
				index,
			}));
		}

		if matches!(tag, DiffTag::Insert | DiffTag::Replace) {
			added.extend(new_range.map(|index| ItemChange::Added {
				name: new.names()[index].clone(),
				index,
			}));
		}
	}

	removed.extend(added);
	removed
}

#[cfg(test)]
mod tests {
	use super::*;

	fn listing(names: &[&str]) -> DirectoryListing {
		names.iter().copied().collect()
	}

	#[test]
	fn removes_and_adds_against_their_own_listing() {
		let changes = diff_listings(&listing(&["a", "b", "c"]), &listing(&["a", "c", "d"]));

		assert_eq!(
			changes,
			vec![
				ItemChange::Removed {
					name: "b".into(),
					index: 1
				},
				ItemChange::Added {
					name: "d".into(),
					index: 2
				},
			]
		);
	}

	#[test]
	fn identical_listings_have_no_changes() {
		let names = listing(&["x", "y", "z"]);

		assert!(diff_listings(&names, &names).is_empty());
	}

	#[test]
	fn empty_new_listing_removes_everything() {
		let changes = diff_listings(&listing(&["a", "b"]), &DirectoryListing::default());

		assert_eq!(changes.len(), 2);
		assert!(changes
			.iter()
			.all(|change| matches!(change, ItemChange::Removed { .. })));
	}

	#[test]
	fn rename_in_place_is_not_a_change() {
		let renames = HashMap::from([("bar.txt".to_string(), "foo.txt".to_string())]);

		let plain = diff_listings(&listing(&["foo.txt"]), &listing(&["bar.txt"]));
		let aware =
			diff_listings_with_renames(&listing(&["foo.txt"]), &listing(&["bar.txt"]), &renames);

		assert_eq!(plain.len(), 2);
		assert!(aware.is_empty());
	}

	#[test]
	fn rename_that_moves_position_hides_no_real_change() {
		let renames = HashMap::from([("a2".to_string(), "z".to_string())]);

		let changes = diff_listings_with_renames(
			&listing(&["b", "c", "z"]),
			&listing(&["a2", "b", "c", "new"]),
			&renames,
		);

		assert_eq!(
			changes,
			vec![ItemChange::Added {
				name: "new".into(),
				index: 3
			}]
		);
	}

	#[test]
	fn recreated_origin_of_a_rename_is_added() {
		let renames = HashMap::from([("x~".to_string(), "x".to_string())]);

		let changes =
			diff_listings_with_renames(&listing(&["x"]), &listing(&["x", "x~"]), &renames);

		assert_eq!(
			changes,
			vec![ItemChange::Added {
				name: "x".into(),
				index: 0
			}]
		);
	}

	#[test]
	fn recreated_origin_survives_reordering() {
		let renames = HashMap::from([("z".to_string(), "x".to_string())]);

		let changes =
			diff_listings_with_renames(&listing(&["x", "a"]), &listing(&["a", "x", "z"]), &renames);

		assert_eq!(
			changes,
			vec![ItemChange::Added {
				name: "x".into(),
				index: 1
			}]
		);
	}

	#[test]
	fn large_listings_with_few_changes() {
		let old = (0..5_000).map(|i| format!("{i:05}")).collect::<DirectoryListing>();
		let new = (0..5_000)
			.filter(|i| i % 1_000 != 0)
			.map(|i| format!("{i:05}"))
			.chain(["zzz".to_string()])
			.collect::<DirectoryListing>();

		let changes = diff_listings(&old, &new);

		assert_eq!(changes.len(), 6);
		assert_eq!(
			changes.last(),
			Some(&ItemChange::Added {
				name: "zzz".into(),
				index: 4_995
			})
		);
	}
}
