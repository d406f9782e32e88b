use sd_fs_tree::{
	DirectoryTree, FileEvent, FileEventObserver, ListingPolicy, StructuralOperation, TreeConfig,
	TreeProjection,
};

use std::{
	path::Path,
	sync::{Arc, Mutex},
	time::Duration,
};

use tempfile::tempdir;
use tokio::time::{sleep, timeout};
use tracing_test::traced_test;

const WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
struct SharedRecorder {
	operations: Arc<Mutex<Vec<StructuralOperation>>>,
	events: Arc<Mutex<Vec<FileEvent>>>,
}

impl SharedRecorder {
	fn events(&self) -> Vec<FileEvent> {
		self.events.lock().unwrap().clone()
	}

	async fn wait_for(&self, expected: &FileEvent) {
		let found = timeout(WAIT, async {
			while !self.events().contains(expected) {
				sleep(Duration::from_millis(20)).await;
			}
		})
		.await;

		assert!(
			found.is_ok(),
			"never saw {expected:?}, got {:?}",
			self.events()
		);
	}
}

impl TreeProjection for SharedRecorder {
	fn reload_subtree(&mut self, _: &Path) {}

	fn apply(&mut self, operation: &StructuralOperation) {
		self.operations.lock().unwrap().push(operation.clone());
	}
}

impl FileEventObserver for SharedRecorder {
	fn on_file_created(&mut self, path: &Path, own_event: bool) {
		self.events.lock().unwrap().push(FileEvent::Created {
			path: path.to_path_buf(),
			own_event,
		});
	}

	fn on_file_deleted(&mut self, path: &Path, own_event: bool) {
		self.events.lock().unwrap().push(FileEvent::Deleted {
			path: path.to_path_buf(),
			own_event,
		});
	}

	fn on_file_renamed(&mut self, from: &Path, to: &Path, own_event: bool) {
		self.events.lock().unwrap().push(FileEvent::Renamed {
			from: from.to_path_buf(),
			to: to.to_path_buf(),
			own_event,
		});
	}
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn live_changes_reach_the_projection() {
	let dir = tempdir().unwrap();
	std::fs::write(dir.path().join("a"), b"").unwrap();

	let recorder = SharedRecorder::default();
	let config = TreeConfig {
		latency_ms: 50,
		..Default::default()
	};
	let policy = ListingPolicy::new(&config);
	let mut tree = DirectoryTree::new(
		dir.path(),
		config,
		policy,
		recorder.clone(),
		recorder.clone(),
	);

	let root = tree.root().to_path_buf();
	let handle = tree.handle();
	tree.watch().unwrap();
	assert!(tree.is_watching());

	let running = tokio::spawn(async move {
		tree.run().await;
		tree
	});

	let listing = handle.populate(root.clone()).await.unwrap();
	assert_eq!(listing.names(), ["a"]);

	handle.create_file(root.join("mine")).await.unwrap();
	recorder
		.wait_for(&FileEvent::Created {
			path: root.join("mine"),
			own_event: true,
		})
		.await;

	std::fs::rename(root.join("a"), root.join("b")).unwrap();
	recorder
		.wait_for(&FileEvent::Renamed {
			from: root.join("a"),
			to: root.join("b"),
			own_event: false,
		})
		.await;

	handle.stop().await.unwrap();
	let tree = running.await.unwrap();

	assert_eq!(
		tree.engine().cache().get(&root).unwrap().names(),
		["b", "mine"]
	);
	assert!(!recorder.operations.lock().unwrap().is_empty());
}
