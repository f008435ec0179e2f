//! Download directory polling.
//!
//! The browser gives no completion signal, so arrival is detected by
//! comparing the directory against a [`FileSnapshot`] taken before the
//! export was triggered.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{FetchError, Result};
use crate::settings::Settings;
use crate::status::StatusSender;

/// When a new file counts as fully written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionCheck {
	/// Size above zero.
	#[default]
	NonEmpty,
	/// Size above zero, unchanged across two polls, and no partial download present.
	Stable,
}

/// Matching files in a directory at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSnapshot {
	files: BTreeSet<PathBuf>,
}

impl FileSnapshot {
	/// Lists regular files in `dir` whose names match `pattern`.
	pub fn capture(dir: &Path, pattern: &Pattern) -> Result<Self> {
		let mut files = BTreeSet::new();
		for entry in fs::read_dir(dir)? {
			let entry = entry?;
			if !entry.file_type()?.is_file() {
				continue;
			}
			let name = entry.file_name();
			if name.to_str().is_some_and(|name| pattern.matches(name)) {
				files.insert(entry.path());
			}
		}
		Ok(Self { files })
	}

	/// Files present here but not in `baseline`, in path order.
	pub fn new_since<'a>(&'a self, baseline: &'a FileSnapshot) -> impl Iterator<Item = &'a PathBuf> + 'a {
		self.files.difference(&baseline.files)
	}

	pub fn contains(&self, path: &Path) -> bool {
		self.files.contains(path)
	}

	pub fn len(&self) -> usize {
		self.files.len()
	}

	pub fn is_empty(&self) -> bool {
		self.files.is_empty()
	}
}

#[derive(Debug, Clone)]
pub struct DownloadWatcher {
	dir: PathBuf,
	pattern: Pattern,
	in_progress: Pattern,
	poll_interval: Duration,
	completion: CompletionCheck,
}

impl DownloadWatcher {
	pub fn new(dir: impl Into<PathBuf>, pattern: &str, in_progress: &str) -> Result<Self> {
		Ok(Self {
			dir: dir.into(),
			pattern: compile(pattern)?,
			in_progress: compile(in_progress)?,
			poll_interval: Duration::from_secs(1),
			completion: CompletionCheck::NonEmpty,
		})
	}

	pub fn from_settings(settings: &Settings) -> Result<Self> {
		let download = &settings.download;
		Ok(Self::new(&settings.download_dir, &download.pattern, &download.in_progress_pattern)?
			.with_poll_interval(download.poll_interval())
			.with_completion(download.completion))
	}

	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	pub fn with_completion(mut self, completion: CompletionCheck) -> Self {
		self.completion = completion;
		self
	}

	pub fn snapshot(&self) -> Result<FileSnapshot> {
		FileSnapshot::capture(&self.dir, &self.pattern)
	}

	/// Polls until a file absent from `baseline` is complete, or `budget` runs out.
	///
	/// The directory is checked once more at the deadline, so a timeout is never
	/// reported before the full budget has elapsed.
	pub async fn wait_for_new_file(&self, baseline: &FileSnapshot, budget: Duration, status: &StatusSender) -> Result<PathBuf> {
		let deadline = Instant::now() + budget;
		let mut last_sizes: HashMap<PathBuf, u64> = HashMap::new();
		let mut downloading = false;

		loop {
			let current = self.snapshot()?;
			let partial = self.partial_download_present()?;

			if let Some(path) = self.completed(&current, baseline, partial, &mut last_sizes) {
				debug!(target = "orderpull", path = %path.display(), "download complete");
				return Ok(path);
			}

			if partial && !downloading {
				status.progress("Download in progress...");
			}
			downloading = partial;

			let now = Instant::now();
			if now >= deadline {
				return Err(FetchError::DownloadTimeout {
					dir: self.dir.clone(),
					pattern: self.pattern.as_str().to_string(),
					secs: budget.as_secs(),
				});
			}
			trace!(target = "orderpull", partial, "no complete download yet");
			tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
		}
	}

	fn completed(&self, current: &FileSnapshot, baseline: &FileSnapshot, partial: bool, last_sizes: &mut HashMap<PathBuf, u64>) -> Option<PathBuf> {
		for path in current.new_since(baseline) {
			let Ok(meta) = fs::metadata(path) else { continue };
			let size = meta.len();
			if size == 0 {
				continue;
			}
			match self.completion {
				CompletionCheck::NonEmpty => return Some(path.clone()),
				CompletionCheck::Stable => {
					let previous = last_sizes.insert(path.clone(), size);
					if !partial && previous == Some(size) {
						return Some(path.clone());
					}
				}
			}
		}
		None
	}

	fn partial_download_present(&self) -> Result<bool> {
		Ok(!FileSnapshot::capture(&self.dir, &self.in_progress)?.is_empty())
	}
}

fn compile(pattern: &str) -> Result<Pattern> {
	Pattern::new(pattern).map_err(|e| FetchError::Config(format!("invalid file pattern {pattern:?}: {e}")))
}
