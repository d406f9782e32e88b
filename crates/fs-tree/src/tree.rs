//! The serialized reconciliation context.
//!
//! A [`DirectoryTree`] owns the listing cache, the projection and the observer. Batches coming
//! from the watcher task and commands coming from [`TreeHandle`]s are applied one at a time,
//! in arrival order, so no directory is ever diffed twice concurrently and a batch never
//! starts before the previous one reached the projection.

use crate::{
	classifier::ClassifiedBatch,
	config::TreeConfig,
	error::{Error, FileIOError, Result},
	lister::{DirectoryLister, DirectoryListing, ListingPolicy},
	metrics::TreeMetrics,
	own_events::OwnEventTracker,
	projection::{FileEventObserver, TreeProjection},
	reconcile::{FileEvent, ReconciliationEngine, ReconciliationResult, StructuralUpdate},
	watcher::TreeWatcher,
};

use std::{
	path::{Path, PathBuf},
	pin::pin,
	sync::Arc,
	time::Instant,
};

use async_channel as chan;
use futures::StreamExt;
use futures_concurrency::stream::Merge;
use tokio::{fs, sync::oneshot};
use tracing::{debug, info, instrument, trace, warn};

#[derive(Debug)]
pub enum TreeCommand {
	Populate {
		directory: PathBuf,
		reply: oneshot::Sender<DirectoryListing>,
	},
	Retarget {
		root: PathBuf,
		reply: oneshot::Sender<Result<()>>,
	},
	Stop,
}

pub struct DirectoryTree<P, O> {
	root: PathBuf,
	config: TreeConfig,
	policy: ListingPolicy,
	engine: ReconciliationEngine,
	/// Bumped on every retarget; batches stamped with an older value are ignored
	generation: u64,
	watcher: Option<TreeWatcher>,
	batches_tx: chan::Sender<ClassifiedBatch>,
	batches_rx: chan::Receiver<ClassifiedBatch>,
	commands_tx: chan::Sender<TreeCommand>,
	commands_rx: chan::Receiver<TreeCommand>,
	own_events: OwnEventTracker,
	metrics: Arc<TreeMetrics>,
	projection: P,
	observer: O,
}

impl<P: TreeProjection, O: FileEventObserver> DirectoryTree<P, O> {
	pub fn new(
		root: impl AsRef<Path>,
		config: TreeConfig,
		policy: ListingPolicy,
		projection: P,
		observer: O,
	) -> Self {
		let (batches_tx, batches_rx) = chan::unbounded();
		let (commands_tx, commands_rx) = chan::bounded(16);

		Self {
			root: absolute_root(root.as_ref()),
			engine: ReconciliationEngine::new(DirectoryLister::new(policy.clone())),
			config,
			policy,
			generation: 0,
			watcher: None,
			batches_tx,
			batches_rx,
			commands_tx,
			commands_rx,
			own_events: OwnEventTracker::default(),
			metrics: Arc::new(TreeMetrics::new()),
			projection,
			observer,
		}
	}

	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}

	#[must_use]
	pub const fn generation(&self) -> u64 {
		self.generation
	}

	#[must_use]
	pub const fn engine(&self) -> &ReconciliationEngine {
		&self.engine
	}

	#[must_use]
	pub fn metrics(&self) -> Arc<TreeMetrics> {
		Arc::clone(&self.metrics)
	}

	#[must_use]
	pub const fn projection(&self) -> &P {
		&self.projection
	}

	pub fn projection_mut(&mut self) -> &mut P {
		&mut self.projection
	}

	#[must_use]
	pub const fn observer(&self) -> &O {
		&self.observer
	}

	#[must_use]
	pub const fn is_watching(&self) -> bool {
		self.watcher.is_some()
	}

	#[must_use]
	pub fn handle(&self) -> TreeHandle {
		TreeHandle {
			commands_tx: self.commands_tx.clone(),
			own_events: self.own_events.clone(),
		}
	}

	/// Sender the watcher task feeds; exposed so batches can be injected by other sources
	#[must_use]
	pub fn batch_sender(&self) -> chan::Sender<ClassifiedBatch> {
		self.batches_tx.clone()
	}

	/// Starts watching the current root. A no-op if already watching.
	///
	/// Must be called inside a tokio runtime.
	pub fn watch(&mut self) -> Result<()> {
		if self.watcher.is_none() {
			self.watcher = Some(TreeWatcher::new(
				self.root.clone(),
				self.generation,
				&self.config,
				self.policy.clone(),
				self.batches_tx.clone(),
				Arc::clone(&self.metrics),
			)?);
		}

		Ok(())
	}

	pub fn unwatch(&mut self) {
		if self.watcher.take().is_some() {
			info!(root = %self.root.display(), "Stopped watching directory tree");
		}
	}

	/// Enumerates `directory` for the projection, making it the baseline for later diffs
	pub fn populate(&mut self, directory: impl AsRef<Path>) -> DirectoryListing {
		self.engine.populate(directory.as_ref())
	}

	/// Points the tree at a new root.
	///
	/// Batches already in flight for the previous root are discarded when they arrive, and every
	/// cached listing is dropped. The projection is expected to populate the new root itself.
	#[instrument(skip_all, fields(old_root = %self.root.display()))]
	pub fn retarget(&mut self, root: impl AsRef<Path>) -> Result<()> {
		let was_watching = self.watcher.take().is_some();

		self.generation += 1;
		self.root = absolute_root(root.as_ref());
		self.engine.reset();
		self.own_events.clear();

		info!(
			new_root = %self.root.display(),
			generation = self.generation,
			"Retargeted directory tree"
		);

		if was_watching {
			self.watch()?;
		}

		Ok(())
	}

	/// Reconciles every directory the batch touched and delivers the outcome.
	///
	/// Returns how many directories were reconciled.
	#[instrument(
		skip_all,
		fields(root = %self.root.display(), generation = batch.generation),
	)]
	pub fn apply_batch(&mut self, batch: ClassifiedBatch) -> usize {
		if batch.generation != self.generation || batch.root != self.root {
			debug!("Dropping batch from a previous watch");
			self.metrics.record_stale_batch();
			return 0;
		}

		let started_at = Instant::now();
		let ttl = self.config.own_event_ttl();
		self.metrics.record_rename_pairs(batch.rename_pairs);

		let mut reconciled = 0;
		for (directory, touched) in batch.directories {
			let mut own_event_paths = touched.own_event_paths;
			own_event_paths.extend(self.own_events.children_of(&directory, ttl));

			let result = self
				.engine
				.reconcile(&directory, &touched.renames, &own_event_paths);

			self.own_events
				.consume(result.file_events.iter().flat_map(reported_paths));

			self.deliver(&result);
			reconciled += 1;
		}

		self.own_events.evict_expired(ttl);
		self.metrics.record_batch_applied(started_at.elapsed());

		reconciled
	}

	fn deliver(&mut self, result: &ReconciliationResult) {
		match &result.update {
			StructuralUpdate::ReloadSubtree => self.projection.reload_subtree(&result.directory),
			StructuralUpdate::Operations(ops) => {
				for op in ops {
					self.projection.apply(op);
				}
			}
		}

		for event in &result.file_events {
			trace!(?event, "Notifying file event;");
			self.observer.on_file_event(event);
		}

		self.metrics.record_reconciliation(
			result.is_reload(),
			result.structural_ops().len(),
			result.file_events.len(),
		);
	}

	/// Processes batches and commands until a [`TreeCommand::Stop`] arrives
	pub async fn run(&mut self) {
		enum StreamMessage {
			NewBatch(ClassifiedBatch),
			Command(TreeCommand),
		}

		let mut msg_stream = pin!((
			self.batches_rx.clone().map(StreamMessage::NewBatch),
			self.commands_rx.clone().map(StreamMessage::Command),
		)
			.merge());

		while let Some(msg) = msg_stream.next().await {
			match msg {
				StreamMessage::NewBatch(batch) => {
					self.apply_batch(batch);
				}

				StreamMessage::Command(TreeCommand::Populate { directory, reply }) => {
					if reply.send(self.populate(&directory)).is_err() {
						trace!(directory = %directory.display(), "Populate requester went away;");
					}
				}

				StreamMessage::Command(TreeCommand::Retarget { root, reply }) => {
					if reply.send(self.retarget(root)).is_err() {
						trace!("Retarget requester went away;");
					}
				}

				StreamMessage::Command(TreeCommand::Stop) => {
					debug!("Stopping directory tree");
					break;
				}
			}
		}

		self.metrics.log_summary();
	}
}

fn reported_paths(event: &FileEvent) -> Vec<&Path> {
	match event {
		FileEvent::Created { path, .. } | FileEvent::Deleted { path, .. } => vec![path.as_path()],
		FileEvent::Renamed { from, to, .. } => vec![from.as_path(), to.as_path()],
	}
}

/// Watcher backends report canonical absolute paths, so the root has to match them
fn absolute_root(root: &Path) -> PathBuf {
	match std::fs::canonicalize(root) {
		Ok(canonical) => canonical,
		Err(e) => {
			warn!(?e, root = %root.display(), "Unable to canonicalize root, using it as is;");
			root.to_path_buf()
		}
	}
}

/// Cloneable command side of a running [`DirectoryTree`].
///
/// Also the entry point for mutations this process performs itself: each one marks the
/// affected paths first, so the notifications they cause are reported as own events.
#[derive(Debug, Clone)]
pub struct TreeHandle {
	commands_tx: chan::Sender<TreeCommand>,
	own_events: OwnEventTracker,
}

impl TreeHandle {
	async fn send(&self, command: TreeCommand) -> Result<()> {
		self.commands_tx
			.send(command)
			.await
			.map_err(|_| Error::Disconnected)
	}

	pub async fn populate(&self, directory: impl Into<PathBuf>) -> Result<DirectoryListing> {
		let (reply, rx) = oneshot::channel();
		self.send(TreeCommand::Populate {
			directory: directory.into(),
			reply,
		})
		.await?;

		rx.await.map_err(|_| Error::Disconnected)
	}

	pub async fn retarget(&self, root: impl Into<PathBuf>) -> Result<()> {
		let (reply, rx) = oneshot::channel();
		self.send(TreeCommand::Retarget {
			root: root.into(),
			reply,
		})
		.await?;

		rx.await.map_err(|_| Error::Disconnected)?
	}

	pub async fn stop(&self) -> Result<()> {
		self.send(TreeCommand::Stop).await
	}

	#[must_use]
	pub const fn own_events(&self) -> &OwnEventTracker {
		&self.own_events
	}

	pub async fn create_file(&self, path: impl AsRef<Path>) -> Result<()> {
		let path = path.as_ref();
		self.own_events.mark(path);

		fs::File::create(path).await.map(|_| ()).map_err(|e| {
			self.own_events.unmark(path);
			FileIOError::from_std_io_err_with_msg(path, e, "failed to create file").into()
		})
	}

	pub async fn create_dir(&self, path: impl AsRef<Path>) -> Result<()> {
		let path = path.as_ref();
		self.own_events.mark(path);

		fs::create_dir(path).await.map_err(|e| {
			self.own_events.unmark(path);
			FileIOError::from_std_io_err_with_msg(path, e, "failed to create directory").into()
		})
	}

	/// Removes a file, or a directory with everything inside it
	pub async fn remove(&self, path: impl AsRef<Path>) -> Result<()> {
		let path = path.as_ref();

		let metadata = fs::symlink_metadata(path)
			.await
			.map_err(|e| FileIOError::from_std_io_err(path, e))?;

		self.own_events.mark(path);

		let removed = if metadata.is_dir() {
			fs::remove_dir_all(path).await
		} else {
			fs::remove_file(path).await
		};

		removed.map_err(|e| {
			self.own_events.unmark(path);
			FileIOError::from_std_io_err_with_msg(path, e, "failed to remove").into()
		})
	}

	/// Renames or moves `from` to `to`
	pub async fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
		let (from, to) = (from.as_ref(), to.as_ref());
		self.own_events.mark(from);
		self.own_events.mark(to);

		fs::rename(from, to).await.map_err(|e| {
			self.own_events.unmark(from);
			self.own_events.unmark(to);
			FileIOError::from_std_io_err_with_msg(
				from,
				e,
				format!("failed to rename to '{}'", to.display()),
			)
			.into()
		})
	}
}
