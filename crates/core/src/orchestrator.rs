//! End-to-end run: snapshot, launch, login, export, watch.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::{error, info};

use crate::auth::AuthSequencer;
use crate::credentials::Credentials;
use crate::error::{FetchError, Stage};
use crate::export::trigger_export;
use crate::session::{BrowserSession, CdpLauncher, SessionLauncher};
use crate::settings::Settings;
use crate::status::StatusSender;
use crate::watcher::{DownloadWatcher, FileSnapshot};

const STEPS: usize = 4;

#[derive(Debug)]
pub struct RunFailure {
	pub stage: Stage,
	pub error: FetchError,
}

impl RunFailure {
	pub fn new(stage: Stage, error: FetchError) -> Self {
		Self { stage, error }
	}
}

impl fmt::Display for RunFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} failed: {}", self.stage, self.error)
	}
}

/// Terminal result of one run.
#[derive(Debug)]
pub enum RunOutcome {
	Success(PathBuf),
	Failure(RunFailure),
}

impl RunOutcome {
	pub fn is_success(&self) -> bool {
		matches!(self, RunOutcome::Success(_))
	}

	pub fn path(&self) -> Option<&Path> {
		match self {
			RunOutcome::Success(path) => Some(path),
			RunOutcome::Failure(_) => None,
		}
	}
}

impl fmt::Display for RunOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RunOutcome::Success(path) => write!(f, "downloaded {}", path.display()),
			RunOutcome::Failure(failure) => fmt::Display::fmt(failure, f),
		}
	}
}

impl Serialize for RunOutcome {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			RunOutcome::Success(path) => {
				let mut s = serializer.serialize_struct("RunOutcome", 2)?;
				s.serialize_field("outcome", "success")?;
				s.serialize_field("path", path)?;
				s.end()
			}
			RunOutcome::Failure(failure) => {
				let mut s = serializer.serialize_struct("RunOutcome", 3)?;
				s.serialize_field("outcome", "failure")?;
				s.serialize_field("stage", &failure.stage)?;
				s.serialize_field("message", &failure.error.to_string())?;
				s.end()
			}
		}
	}
}

/// Sequences one download run and owns its browser session.
pub struct Orchestrator {
	settings: Settings,
	credentials: Credentials,
	launcher: Arc<dyn SessionLauncher>,
}

impl Orchestrator {
	pub fn new(settings: Settings, credentials: Credentials, launcher: Arc<dyn SessionLauncher>) -> Self {
		Self {
			settings,
			credentials,
			launcher,
		}
	}

	/// Uses a locally launched Chromium for each run.
	pub fn with_cdp(settings: Settings, credentials: Credentials) -> Self {
		let launcher = Arc::new(CdpLauncher::from_settings(&settings));
		Self::new(settings, credentials, launcher)
	}

	/// Runs the workflow to completion. Never panics and never returns early
	/// without closing the session it launched.
	pub async fn run(&self, status: &StatusSender) -> RunOutcome {
		let started = Instant::now();
		info!(target = "orderpull", dir = %self.settings.download_dir.display(), "run started");
		status.info("Starting...");

		let outcome = match self.prepare() {
			Ok((watcher, baseline)) => self.launch_and_drive(&watcher, &baseline, status).await,
			Err(error) => RunOutcome::Failure(RunFailure::new(Stage::Snapshot, error)),
		};

		match &outcome {
			RunOutcome::Success(path) => {
				info!(target = "orderpull", path = %path.display(), elapsed_ms = started.elapsed().as_millis() as u64, "run succeeded")
			}
			RunOutcome::Failure(failure) => {
				error!(target = "orderpull", stage = %failure.stage, error = %failure.error, elapsed_ms = started.elapsed().as_millis() as u64, "run failed")
			}
		}
		outcome
	}

	fn prepare(&self) -> Result<(DownloadWatcher, FileSnapshot), FetchError> {
		let watcher = DownloadWatcher::from_settings(&self.settings)?;
		let baseline = watcher.snapshot()?;
		info!(target = "orderpull", existing = baseline.len(), "download directory scanned");
		Ok((watcher, baseline))
	}

	async fn launch_and_drive(&self, watcher: &DownloadWatcher, baseline: &FileSnapshot, status: &StatusSender) -> RunOutcome {
		step(1, Stage::Launch);
		status.progress("Launching browser...");
		let mut session = match self.launcher.launch().await {
			Ok(session) => session,
			Err(error) => return RunOutcome::Failure(RunFailure::new(Stage::Launch, error)),
		};

		let current = Mutex::new(Stage::Login);
		let result = AssertUnwindSafe(self.drive(session.as_mut(), watcher, baseline, status, &current))
			.catch_unwind()
			.await;
		session.close().await;

		match result {
			Ok(Ok(path)) => RunOutcome::Success(path),
			Ok(Err(failure)) => RunOutcome::Failure(failure),
			Err(panic) => RunOutcome::Failure(RunFailure::new(*current.lock(), FetchError::Unclassified(panic_message(panic.as_ref())))),
		}
	}

	async fn drive(
		&self,
		session: &mut dyn BrowserSession,
		watcher: &DownloadWatcher,
		baseline: &FileSnapshot,
		status: &StatusSender,
		current: &Mutex<Stage>,
	) -> Result<PathBuf, RunFailure> {
		let enter = |stage: Stage, n: usize| {
			*current.lock() = stage;
			step(n, stage);
		};

		enter(Stage::Login, 2);
		AuthSequencer::new(&self.settings, &self.credentials)
			.run(session, status)
			.await
			.map_err(|e| RunFailure::new(Stage::Login, e))?;

		enter(Stage::Export, 3);
		trigger_export(session, &self.settings, status)
			.await
			.map_err(|e| RunFailure::new(Stage::Export, e))?;

		enter(Stage::Download, 4);
		status.progress("Downloading file...");
		watcher
			.wait_for_new_file(baseline, self.settings.download.budget(), status)
			.await
			.map_err(|e| RunFailure::new(Stage::Download, e))
	}
}

fn step(n: usize, stage: Stage) {
	info!(target = "orderpull", %stage, "step {n}/{STEPS}");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
	if let Some(s) = panic.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s.clone()
	} else {
		"worker panicked".to_string()
	}
}
