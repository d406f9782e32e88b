use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for a watched directory tree.
///
/// Custom display predicates and comparators can't be serialized, so those live on
/// [`ListingPolicy`](crate::ListingPolicy), which is built from this config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
	/// Show entries whose name starts with the hidden file marker
	pub show_hidden_files: bool,
	/// Coalescing window applied to raw notifications before a batch is classified
	pub latency_ms: u64,
	/// How often the coalescer checks whether the pending batch is ripe
	pub tick_interval_ms: u64,
	/// Flush a batch early once this many raw events are pending
	pub max_batch_size: usize,
	/// How long a path touched by one of our own mutations is reported as an own event
	pub own_event_ttl_ms: u64,
}

impl Default for TreeConfig {
	fn default() -> Self {
		Self {
			show_hidden_files: false,
			latency_ms: 100,
			tick_interval_ms: 50,
			max_batch_size: 1024,
			own_event_ttl_ms: 1000,
		}
	}
}

impl TreeConfig {
	#[must_use]
	pub const fn latency(&self) -> Duration {
		Duration::from_millis(self.latency_ms)
	}

	#[must_use]
	pub const fn tick_interval(&self) -> Duration {
		// A zero period would make the tick interval panic
		Duration::from_millis(if self.tick_interval_ms == 0 {
			1
		} else {
			self.tick_interval_ms
		})
	}

	#[must_use]
	pub const fn own_event_ttl(&self) -> Duration {
		Duration::from_millis(self.own_event_ttl_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_config_falls_back_to_defaults() {
		let config: TreeConfig =
			serde_json::from_str(r#"{ "show_hidden_files": true, "latency_ms": 250 }"#).unwrap();

		assert!(config.show_hidden_files);
		assert_eq!(config.latency(), Duration::from_millis(250));
		assert_eq!(config.max_batch_size, TreeConfig::default().max_batch_size);
		assert_eq!(config.own_event_ttl(), Duration::from_secs(1));
	}

	#[test]
	fn zero_tick_interval_is_clamped() {
		let config = TreeConfig {
			tick_interval_ms: 0,
			..Default::default()
		};

		assert_eq!(config.tick_interval(), Duration::from_millis(1));
	}
}
