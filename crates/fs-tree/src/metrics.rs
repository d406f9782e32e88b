//! Counters describing how much work the tree synchronisation does

use std::{
	sync::atomic::{AtomicU64, Ordering},
	time::Duration,
};

use tracing::info;

#[derive(Debug, Default)]
pub struct TreeMetrics {
	/// Raw notifications received from the backend
	pub raw_events: AtomicU64,
	/// Classified batches applied to the tree
	pub batches_applied: AtomicU64,
	/// Batches discarded because the tree was retargeted meanwhile
	pub stale_batches: AtomicU64,
	pub directories_reconciled: AtomicU64,
	/// Directories rebuilt from scratch because they had no baseline
	pub reloads: AtomicU64,
	pub rename_pairs: AtomicU64,
	pub structural_ops: AtomicU64,
	pub file_events: AtomicU64,
	/// Last batch processing time in milliseconds
	pub last_batch_duration: AtomicU64,
	/// Maximum batch processing time in milliseconds
	pub max_batch_duration: AtomicU64,
}

impl TreeMetrics {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record_raw_events(&self, count: usize) {
		self.raw_events.fetch_add(count as u64, Ordering::Relaxed);
	}

	pub fn record_stale_batch(&self) {
		self.stale_batches.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_rename_pairs(&self, count: usize) {
		self.rename_pairs.fetch_add(count as u64, Ordering::Relaxed);
	}

	pub fn record_reconciliation(&self, reload: bool, structural_ops: usize, file_events: usize) {
		self.directories_reconciled.fetch_add(1, Ordering::Relaxed);
		if reload {
			self.reloads.fetch_add(1, Ordering::Relaxed);
		}
		self.structural_ops
			.fetch_add(structural_ops as u64, Ordering::Relaxed);
		self.file_events
			.fetch_add(file_events as u64, Ordering::Relaxed);
	}

	pub fn record_batch_applied(&self, duration: Duration) {
		self.batches_applied.fetch_add(1, Ordering::Relaxed);

		let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
		self.last_batch_duration
			.store(duration_ms, Ordering::Relaxed);
		self.max_batch_duration
			.fetch_max(duration_ms, Ordering::Relaxed);
	}

	pub fn log_summary(&self) {
		info!(
			raw_events = self.raw_events.load(Ordering::Relaxed),
			batches_applied = self.batches_applied.load(Ordering::Relaxed),
			stale_batches = self.stale_batches.load(Ordering::Relaxed),
			directories_reconciled = self.directories_reconciled.load(Ordering::Relaxed),
			reloads = self.reloads.load(Ordering::Relaxed),
			rename_pairs = self.rename_pairs.load(Ordering::Relaxed),
			structural_ops = self.structural_ops.load(Ordering::Relaxed),
			file_events = self.file_events.load(Ordering::Relaxed),
			max_batch_duration_ms = self.max_batch_duration.load(Ordering::Relaxed),
			"Directory tree metrics;"
		);
	}
}
