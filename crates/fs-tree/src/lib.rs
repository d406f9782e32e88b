//!
//! # Filesystem Tree
//!
//! Keeps a hierarchical, index-addressed view of a directory in sync with the filesystem
//! without ever reloading the whole tree. Only the rows that actually changed are removed or
//! inserted, and every logical change is also reported as a semantic created/deleted/renamed
//! callback, tagged with whether this process caused it.
//!
//! The pipeline:
//! - a [`TreeWatcher`] subscribes to the platform watcher and coalesces raw notifications on a
//!   background task;
//! - the [`EventClassifier`] pairs split rename notifications back together and groups the
//!   batch per touched directory;
//! - the [`DirectoryTree`] applies batches one at a time: the [`ReconciliationEngine`]
//!   re-enumerates each touched directory once, diffs it against the cached listing and the
//!   result is delivered to a [`TreeProjection`] and a [`FileEventObserver`].
//!
//! ## Basic example
//!
//! ```no_run
//! use sd_fs_tree::{
//! 	DirectoryTree, ListingPolicy, StructuralOperation, TreeConfig, TreeProjection,
//! };
//! use std::path::Path;
//!
//! struct PrintProjection;
//!
//! impl TreeProjection for PrintProjection {
//! 	fn reload_subtree(&mut self, directory: &Path) {
//! 		println!("reload {}", directory.display());
//! 	}
//!
//! 	fn apply(&mut self, operation: &StructuralOperation) {
//! 		println!("{operation:?}");
//! 	}
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sd_fs_tree::Error> {
//! 	let config = TreeConfig::default();
//! 	let policy = ListingPolicy::new(&config);
//! 	let mut tree = DirectoryTree::new(".", config, policy, PrintProjection, ());
//!
//! 	let root = tree.root().to_path_buf();
//! 	tree.populate(&root);
//! 	tree.watch()?;
//!
//! 	let handle = tree.handle();
//! 	tokio::spawn(async move {
//! 		tokio::signal::ctrl_c().await.ok();
//! 		handle.stop().await.ok();
//! 	});
//!
//! 	tree.run().await;
//!
//! 	Ok(())
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod cache;
mod classifier;
mod config;
mod diff;
mod error;
mod event;
mod lister;
mod metrics;
mod own_events;
mod projection;
mod reconcile;
mod tree;
mod watcher;

pub use cache::DirectoryStateCache;
pub use classifier::{ClassifiedBatch, EventClassifier, TouchedDirectory};
pub use config::TreeConfig;
pub use diff::{diff_listings, diff_listings_with_renames, ItemChange};
pub use error::{Error, FileIOError, Result};
pub use event::{Disposition, ItemKind, NormalizedEvent, RawFsEvent};
pub use lister::{DirectoryLister, DirectoryListing, DisplayFilter, ListingPolicy, NameComparator};
pub use metrics::TreeMetrics;
pub use own_events::OwnEventTracker;
pub use projection::{FileEventObserver, TreeProjection};
pub use reconcile::{
	FileEvent, ReconciliationEngine, ReconciliationResult, StructuralOperation, StructuralUpdate,
};
pub use tree::{DirectoryTree, TreeCommand, TreeHandle};
pub use watcher::TreeWatcher;
