//! Background side of the tree: subscribes to the platform watcher, coalesces raw
//! notifications and hands classified batches over to the reconciliation context.

use crate::{
	classifier::{ClassifiedBatch, EventClassifier},
	config::TreeConfig,
	error::{Error, Result},
	event::RawFsEvent,
	lister::ListingPolicy,
	metrics::TreeMetrics,
};

use std::{
	path::{Path, PathBuf},
	pin::pin,
	sync::Arc,
	time::Duration,
};

use async_channel as chan;
use futures::StreamExt;
use futures_concurrency::stream::Merge;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::{
	spawn,
	task::JoinHandle,
	time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, instrument, trace, Instrument};

/// Knobs of the coalescing task, copied out of [`TreeConfig`]
#[derive(Debug, Clone, Copy)]
struct Coalescing {
	latency: Duration,
	tick_interval: Duration,
	max_batch_size: usize,
}

/// Recursive watch on one root, stamped with the generation it was started under.
///
/// Must be created inside a tokio runtime. Dropping it stops the coalescing task.
#[derive(Debug)]
pub struct TreeWatcher {
	root: PathBuf,
	generation: u64,
	watcher: RecommendedWatcher,
	handle: Option<JoinHandle<()>>,
	stop_tx: chan::Sender<()>,
}

impl TreeWatcher {
	#[instrument(
		name = "tree_watcher",
		skip(root, config, policy, batches_tx, metrics),
		fields(root = %root.display()),
	)]
	pub fn new(
		root: PathBuf,
		generation: u64,
		config: &TreeConfig,
		policy: ListingPolicy,
		batches_tx: chan::Sender<ClassifiedBatch>,
		metrics: Arc<TreeMetrics>,
	) -> Result<Self> {
		let (events_tx, events_rx) = chan::unbounded();
		let (stop_tx, stop_rx) = chan::bounded(1);

		let mut watcher = RecommendedWatcher::new(
			move |result| {
				if events_tx.is_closed() {
					trace!("Dropping file system event, coalescer already stopped;");
				} else if events_tx.send_blocking(result).is_err() {
					// Unbounded channel, so this never blocks the notify thread
					error!("Unable to hand file system event over to the coalescer;");
				}
			},
			Config::default(),
		)?;

		watcher
			.watch(&root, RecursiveMode::Recursive)
			.map_err(|source| Error::WatchPath {
				path: root.clone(),
				source,
			})?;

		let handle = spawn(
			coalesce_events(
				EventClassifier::new(root.clone(), policy),
				generation,
				Coalescing {
					latency: config.latency(),
					tick_interval: config.tick_interval(),
					max_batch_size: config.max_batch_size.max(1),
				},
				events_rx,
				stop_rx,
				batches_tx,
				metrics,
			)
			.in_current_span(),
		);

		info!("Now watching directory tree");

		Ok(Self {
			root,
			generation,
			watcher,
			handle: Some(handle),
			stop_tx,
		})
	}

	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}

	#[must_use]
	pub const fn generation(&self) -> u64 {
		self.generation
	}
}

impl Drop for TreeWatcher {
	fn drop(&mut self) {
		if let Err(e) = self.watcher.unwatch(&self.root) {
			// The root itself may be gone already
			debug!(?e, root = %self.root.display(), "Unable to unwatch root;");
		}

		if self.handle.take().is_some() && self.stop_tx.try_send(()).is_err() {
			trace!("Coalescer already stopped");
		}
	}
}

#[allow(clippy::too_many_arguments)]
async fn coalesce_events(
	classifier: EventClassifier,
	generation: u64,
	coalescing: Coalescing,
	events_rx: chan::Receiver<notify::Result<Event>>,
	stop_rx: chan::Receiver<()>,
	batches_tx: chan::Sender<ClassifiedBatch>,
	metrics: Arc<TreeMetrics>,
) {
	enum StreamMessage {
		NewEvent(notify::Result<Event>),
		Tick,
		Stop,
	}

	let mut pending = Vec::<RawFsEvent>::new();
	let mut last_event_at = Instant::now();

	let mut tick_interval = interval_at(
		Instant::now() + coalescing.tick_interval,
		coalescing.tick_interval,
	);
	// In case of doubt check: https://docs.rs/tokio/latest/tokio/time/enum.MissedTickBehavior.html
	tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

	let mut msg_stream = pin!((
		events_rx.map(StreamMessage::NewEvent),
		IntervalStream::new(tick_interval).map(|_| StreamMessage::Tick),
		stop_rx.map(|()| StreamMessage::Stop),
	)
		.merge());

	while let Some(msg) = msg_stream.next().await {
		let ripe = match msg {
			StreamMessage::NewEvent(Ok(event)) => {
				let raw_events = RawFsEvent::from_notify(event);
				metrics.record_raw_events(raw_events.len());
				pending.extend(raw_events);
				last_event_at = Instant::now();

				pending.len() >= coalescing.max_batch_size
			}

			StreamMessage::NewEvent(Err(e)) => {
				error!(?e, "Watcher error;");
				false
			}

			StreamMessage::Tick => {
				!pending.is_empty() && last_event_at.elapsed() >= coalescing.latency
			}

			StreamMessage::Stop => {
				debug!("Stopping directory tree coalescer");
				break;
			}
		};

		if !ripe {
			continue;
		}

		let batch = classifier.classify_batch(generation, &pending);
		pending.clear();

		if batch.directories.is_empty() {
			trace!(
				raw_events = batch.raw_events,
				"Batch only held filtered events;"
			);
			continue;
		}

		debug!(
			raw_events = batch.raw_events,
			directories = batch.directories.len(),
			"Handing batch over for reconciliation;"
		);

		if batches_tx.send(batch).await.is_err() {
			debug!("Directory tree is gone, stopping coalescer");
			break;
		}
	}
}
