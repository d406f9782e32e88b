use std::{
	fmt::{self, Display},
	path::{Path, PathBuf},
};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("failed to create filesystem watcher: {0}")]
	Watcher(#[from] notify::Error),
	#[error("failed to watch path <path='{}'>: {source}", .path.display())]
	WatchPath {
		path: PathBuf,
		#[source]
		source: notify::Error,
	},
	#[error("directory tree is no longer running")]
	Disconnected,

	#[error(transparent)]
	FileIO(#[from] FileIOError),
}

/// File I/O error that includes the path that caused the error
#[derive(Error, Debug)]
pub struct FileIOError {
	pub path: Box<Path>,
	#[source]
	pub source: std::io::Error,
	pub maybe_context: Option<String>,
}

impl Display for FileIOError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"file I/O error{}: {}; path: '{}'",
			self.maybe_context
				.as_ref()
				.map(|ctx| format!(" ({ctx})"))
				.unwrap_or_default(),
			self.source,
			self.path.display()
		)
	}
}

impl FileIOError {
	pub fn from_std_io_err(path: impl AsRef<Path>, source: std::io::Error) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: None,
		}
	}

	pub fn from_std_io_err_with_msg(
		path: impl AsRef<Path>,
		source: std::io::Error,
		msg: impl Into<String>,
	) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: Some(msg.into()),
		}
	}

	/// Whether the underlying error only means the path is gone
	#[must_use]
	pub fn is_not_found(&self) -> bool {
		self.source.kind() == std::io::ErrorKind::NotFound
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::io;

	#[test]
	fn file_io_error_display_includes_context() {
		let err = FileIOError::from_std_io_err_with_msg(
			"/tmp/gone",
			io::Error::new(io::ErrorKind::NotFound, "missing"),
			"reading directory",
		);

		let rendered = err.to_string();
		assert!(rendered.contains("(reading directory)"));
		assert!(rendered.contains("/tmp/gone"));
		assert!(err.is_not_found());
	}

	#[test]
	fn file_io_error_converts_into_crate_error() {
		let err: Error =
			FileIOError::from_std_io_err("/x", io::Error::from(io::ErrorKind::PermissionDenied))
				.into();

		assert!(matches!(err, Error::FileIO(_)));
	}
}
