//! Worker-to-presentation status channel.
//!
//! Updates are strictly FIFO. Each run produces any number of
//! [`StatusUpdate::Status`] events followed by exactly one
//! [`StatusUpdate::Finished`].

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::FetchError;
use crate::orchestrator::RunOutcome;

/// Characters of an error message kept on the one-line status.
pub const STATUS_MESSAGE_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Info,
	Progress,
	Success,
	Error,
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Severity::Info => "info",
			Severity::Progress => "progress",
			Severity::Success => "success",
			Severity::Error => "error",
		};
		f.write_str(name)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
	pub message: String,
	pub severity: Severity,
}

impl StatusEvent {
	pub fn new(message: impl Into<String>, severity: Severity) -> Self {
		Self {
			message: message.into(),
			severity,
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StatusUpdate {
	Status(StatusEvent),
	Finished(RunOutcome),
}

pub type StatusReceiver = mpsc::UnboundedReceiver<StatusUpdate>;

/// Sending half held by the worker. Sends to a dropped receiver are discarded.
#[derive(Debug, Clone)]
pub struct StatusSender {
	tx: mpsc::UnboundedSender<StatusUpdate>,
}

pub fn status_channel() -> (StatusSender, StatusReceiver) {
	let (tx, rx) = mpsc::unbounded_channel();
	(StatusSender { tx }, rx)
}

impl StatusSender {
	pub fn send(&self, event: StatusEvent) {
		let _ = self.tx.send(StatusUpdate::Status(event));
	}

	pub fn info(&self, message: impl Into<String>) {
		self.send(StatusEvent::new(message, Severity::Info));
	}

	pub fn progress(&self, message: impl Into<String>) {
		self.send(StatusEvent::new(message, Severity::Progress));
	}

	pub fn success(&self, message: impl Into<String>) {
		self.send(StatusEvent::new(message, Severity::Success));
	}

	pub fn error(&self, message: impl Into<String>) {
		self.send(StatusEvent::new(message, Severity::Error));
	}

	/// Emits the terminal status line followed by the outcome itself.
	pub fn finish(&self, outcome: RunOutcome) {
		match &outcome {
			RunOutcome::Success(path) => {
				let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.display().to_string());
				self.success(format!("Downloaded: {name}"));
			}
			RunOutcome::Failure(failure) => match &failure.error {
				FetchError::DownloadTimeout { .. } => self.error("No export file found"),
				error => self.error(format!("Error: {}...", truncate(&error.to_string(), STATUS_MESSAGE_LIMIT))),
			},
		}
		let _ = self.tx.send(StatusUpdate::Finished(outcome));
	}
}

/// Cuts `text` to at most `max` characters without splitting a code point.
pub fn truncate(text: &str, max: usize) -> &str {
	match text.char_indices().nth(max) {
		Some((idx, _)) => &text[..idx],
		None => text,
	}
}
