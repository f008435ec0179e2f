//! Single-run controller for a presentation layer.
//!
//! [`DownloadController::start`] returns immediately; the run happens on a
//! dedicated worker thread with its own current-thread runtime, and reports
//! back only through the status channel.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{FetchError, Stage};
use crate::orchestrator::{Orchestrator, RunFailure, RunOutcome};
use crate::status::{StatusReceiver, StatusSender, status_channel};

const WORKER_NAME: &str = "orderpull-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
	Idle,
	Running,
}

pub struct DownloadController {
	orchestrator: Arc<Orchestrator>,
	status: StatusSender,
	phase: Arc<Mutex<Phase>>,
	worker: Mutex<Option<JoinHandle<()>>>,
}

impl DownloadController {
	pub fn new(orchestrator: Orchestrator) -> (Self, StatusReceiver) {
		let (status, updates) = status_channel();
		let controller = Self {
			orchestrator: Arc::new(orchestrator),
			status,
			phase: Arc::new(Mutex::new(Phase::Idle)),
			worker: Mutex::new(None),
		};
		(controller, updates)
	}

	/// Starts a run unless one is active. Returns `false` when ignored.
	pub fn start(&self) -> bool {
		{
			let mut phase = self.phase.lock();
			if *phase == Phase::Running {
				debug!(target = "orderpull", "start ignored: run already active");
				return false;
			}
			*phase = Phase::Running;
		}

		let orchestrator = Arc::clone(&self.orchestrator);
		let status = self.status.clone();
		let phase = Arc::clone(&self.phase);
		let spawned = thread::Builder::new()
			.name(WORKER_NAME.to_string())
			.spawn(move || work(&orchestrator, &status, &phase));

		match spawned {
			Ok(handle) => {
				if let Some(previous) = self.worker.lock().replace(handle) {
					let _ = previous.join();
				}
			}
			Err(e) => {
				error!(target = "orderpull", error = %e, "could not spawn worker thread");
				let mut phase = self.phase.lock();
				self.status.finish(RunOutcome::Failure(RunFailure::new(Stage::Worker, FetchError::Io(e))));
				*phase = Phase::Idle;
			}
		}
		true
	}

	pub fn is_running(&self) -> bool {
		*self.phase.lock() == Phase::Running
	}

	/// Waits for the current worker thread, if any, to exit.
	pub fn join(&self) {
		let handle = self.worker.lock().take();
		if let Some(handle) = handle {
			if handle.join().is_err() {
				error!(target = "orderpull", "worker thread panicked");
			}
		}
	}
}

fn work(orchestrator: &Orchestrator, status: &StatusSender, phase: &Mutex<Phase>) {
	let outcome = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
		Ok(runtime) => catch_unwind(AssertUnwindSafe(|| runtime.block_on(orchestrator.run(status)))).unwrap_or_else(|_| {
			RunOutcome::Failure(RunFailure::new(Stage::Worker, FetchError::Unclassified("worker panicked".into())))
		}),
		Err(e) => RunOutcome::Failure(RunFailure::new(Stage::Worker, FetchError::Io(e))),
	};

	// Outcome and Idle become visible together, so a caller reacting to
	// `Finished` can start the next run.
	let mut phase = phase.lock();
	status.finish(outcome);
	*phase = Phase::Idle;
}

#[cfg(test)]
mod tests {
	use std::path::Path;

	use tempfile::TempDir;

	use super::*;
	use crate::credentials::Credentials;
	use crate::session::fake::{FakeLauncher, FakeSession};
	use crate::settings::Settings;
	use crate::status::StatusUpdate;

	fn controller(dir: &Path, session: FakeSession) -> (DownloadController, StatusReceiver) {
		let mut settings = Settings::default();
		settings.download_dir = dir.to_path_buf();
		settings.timeouts.element_wait_ms = 100;
		settings.timeouts.login_dismiss_ms = 100;
		settings.timeouts.login_settle_ms = 5;
		settings.timeouts.listing_settle_ms = 5;
		settings.timeouts.scroll_settle_ms = 5;
		settings.download.poll_interval_ms = 20;
		settings.download.budget_secs = 1;
		let launcher = Arc::new(FakeLauncher::new(session));
		DownloadController::new(Orchestrator::new(settings, Credentials::new("buyer", "secret"), launcher))
	}

	fn drain_until_finished(rx: &mut StatusReceiver) -> (usize, RunOutcome) {
		let mut statuses = 0;
		loop {
			match rx.blocking_recv().expect("channel closed before outcome") {
				StatusUpdate::Status(_) => statuses += 1,
				StatusUpdate::Finished(outcome) => return (statuses, outcome),
			}
		}
	}

	#[test]
	fn second_start_while_running_is_ignored() {
		let temp = TempDir::new().unwrap();
		let (controller, mut rx) = controller(temp.path(), FakeSession::cooperative());

		assert!(controller.start());
		assert!(!controller.start());
		assert!(controller.is_running());

		let (_, outcome) = drain_until_finished(&mut rx);
		assert!(!outcome.is_success());
		controller.join();
		assert!(!controller.is_running());
		assert!(rx.try_recv().is_err());
	}

	#[test]
	fn exactly_one_outcome_follows_status_events() {
		let temp = TempDir::new().unwrap();
		let mut session = FakeSession::cooperative();
		session.download_on_script(crate::export::FORCE_CLICK, temp.path().join("orders.csv"), b"id\n1\n");
		let (controller, mut rx) = controller(temp.path(), session);

		controller.start();
		let (statuses, outcome) = drain_until_finished(&mut rx);
		controller.join();

		assert!(statuses > 0);
		assert_eq!(outcome.path(), Some(temp.path().join("orders.csv").as_path()));
		assert!(rx.try_recv().is_err());
	}

	#[test]
	fn controller_can_start_again_after_finish() {
		let temp = TempDir::new().unwrap();
		let (controller, mut rx) = controller(temp.path(), FakeSession::cooperative());

		assert!(controller.start());
		drain_until_finished(&mut rx);

		// The fake launcher hands out a single session, so the rerun fails at launch.
		assert!(controller.start());
		let (_, outcome) = drain_until_finished(&mut rx);
		assert!(matches!(outcome, RunOutcome::Failure(RunFailure { stage: Stage::Launch, .. })));
		controller.join();
	}
}
