use std::process::ExitCode;

use orderpull::{DownloadController, StatusReceiver, StatusUpdate};

use crate::error::Result;
use crate::output::{self, OutputFormat};

/// Runs a single download, printing updates until the outcome arrives.
pub async fn execute(controller: DownloadController, mut updates: StatusReceiver, format: OutputFormat) -> Result<ExitCode> {
	controller.start();

	let mut success = false;
	while let Some(update) = updates.recv().await {
		output::print(&update, format);
		if let StatusUpdate::Finished(outcome) = update {
			success = outcome.is_success();
			break;
		}
	}
	controller.join();

	Ok(if success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
