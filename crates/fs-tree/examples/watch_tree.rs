//! Watches a directory and prints what a tree widget would be told.
//!
//! Usage: `cargo run --example watch_tree -- <directory> [config.json]`

use sd_fs_tree::{
	DirectoryTree, FileEventObserver, ListingPolicy, StructuralOperation, TreeConfig,
	TreeProjection,
};

use std::{env, fs, path::Path};

use tracing::info;

struct PrintProjection;

impl TreeProjection for PrintProjection {
	fn reload_subtree(&mut self, directory: &Path) {
		println!("reload  {}", directory.display());
	}

	fn apply(&mut self, operation: &StructuralOperation) {
		match operation {
			StructuralOperation::RemoveAt {
				parent,
				index,
				name,
			} => println!("remove  {}[{index}] {name}", parent.display()),
			StructuralOperation::InsertAt {
				parent,
				index,
				name,
			} => println!("insert  {}[{index}] {name}", parent.display()),
		}
	}
}

struct LogObserver;

impl FileEventObserver for LogObserver {
	fn on_file_created(&mut self, path: &Path, own_event: bool) {
		info!(path = %path.display(), own_event, "Created");
	}

	fn on_file_deleted(&mut self, path: &Path, own_event: bool) {
		info!(path = %path.display(), own_event, "Deleted");
	}

	fn on_file_renamed(&mut self, from: &Path, to: &Path, own_event: bool) {
		info!(from = %from.display(), to = %to.display(), own_event, "Renamed");
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.init();

	let mut args = env::args().skip(1);
	let directory = args.next().unwrap_or_else(|| ".".to_string());
	let config = match args.next() {
		Some(path) => serde_json::from_slice::<TreeConfig>(&fs::read(path)?)?,
		None => TreeConfig::default(),
	};

	let policy = ListingPolicy::new(&config);
	let mut tree = DirectoryTree::new(directory, config, policy, PrintProjection, LogObserver);

	let root = tree.root().to_path_buf();
	for name in tree.populate(&root).iter() {
		println!("        {name}");
	}
	tree.watch()?;

	let handle = tree.handle();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			handle.stop().await.ok();
		}
	});

	tree.run().await;

	Ok(())
}
