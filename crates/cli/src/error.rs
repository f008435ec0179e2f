use std::path::PathBuf;

use orderpull::FetchError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Fetch(#[from] FetchError),

	#[error("download directory {} does not exist or is not a directory", .0.display())]
	DownloadDir(PathBuf),

	#[error("failed to serialize: {0}")]
	Json(#[from] serde_json::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}
