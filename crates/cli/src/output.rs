use clap::ValueEnum;
use colored::Colorize;
use orderpull::{RunOutcome, Severity, StatusEvent, StatusUpdate};

/// How status updates are written to stdout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Colored status lines
	#[default]
	Text,
	/// One JSON object per update
	Ndjson,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
		}
	}
}

/// Renders one update as a single line, without the trailing newline.
pub fn render(update: &StatusUpdate, format: OutputFormat) -> String {
	match format {
		OutputFormat::Ndjson => serde_json::to_string(update).unwrap_or_else(|e| format!(r#"{{"type":"error","message":"{e}"}}"#)),
		OutputFormat::Text => match update {
			StatusUpdate::Status(event) => render_event(event),
			StatusUpdate::Finished(outcome) => render_outcome(outcome),
		},
	}
}

pub fn print(update: &StatusUpdate, format: OutputFormat) {
	println!("{}", render(update, format));
}

fn render_event(event: &StatusEvent) -> String {
	match event.severity {
		Severity::Info => event.message.dimmed().to_string(),
		Severity::Progress => event.message.blue().to_string(),
		Severity::Success => event.message.green().to_string(),
		Severity::Error => event.message.red().to_string(),
	}
}

fn render_outcome(outcome: &RunOutcome) -> String {
	match outcome {
		RunOutcome::Success(path) => format!("{} {}", "Saved".green().bold(), path.display()),
		RunOutcome::Failure(failure) => format!("{} {failure}", "Failed".red().bold()),
	}
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use orderpull::{FetchError, RunFailure, Stage};

	use super::*;

	#[test]
	fn text_lines_carry_the_message() {
		colored::control::set_override(false);
		let update = StatusUpdate::Status(StatusEvent::new("Logging in...", Severity::Progress));
		assert_eq!(render(&update, OutputFormat::Text), "Logging in...");

		let done = StatusUpdate::Finished(RunOutcome::Success(PathBuf::from("/srv/exports/orders.csv")));
		assert_eq!(render(&done, OutputFormat::Text), "Saved /srv/exports/orders.csv");
	}

	#[test]
	fn text_failure_names_the_stage() {
		colored::control::set_override(false);
		let update = StatusUpdate::Finished(RunOutcome::Failure(RunFailure::new(
			Stage::Login,
			FetchError::Timeout {
				condition: "login form to close".into(),
				ms: 15000,
			},
		)));
		assert_eq!(
			render(&update, OutputFormat::Text),
			"Failed login failed: timed out after 15000ms waiting for login form to close"
		);
	}

	#[test]
	fn ndjson_is_one_object_per_line() {
		let update = StatusUpdate::Finished(RunOutcome::Success(PathBuf::from("orders.csv")));
		let line = render(&update, OutputFormat::Ndjson);
		assert!(!line.contains('\n'));

		let value: serde_json::Value = serde_json::from_str(&line).unwrap();
		assert_eq!(value["type"], "finished");
		assert_eq!(value["outcome"], "success");
		assert_eq!(value["path"], "orders.csv");
	}
}
