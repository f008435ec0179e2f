use std::path::PathBuf;

use orderpull_runtime::RuntimeError;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
	#[error("could not open {url}: {reason}")]
	Navigation { url: String, reason: String },

	#[error("element {locator} not found within {ms}ms")]
	ElementNotFound { locator: String, ms: u64 },

	#[error("timed out after {ms}ms waiting for {condition}")]
	Timeout { condition: String, ms: u64 },

	#[error("export control could not be activated: {0}")]
	ExportTrigger(#[source] Box<FetchError>),

	#[error("no new {pattern} file appeared in {} within {secs}s", .dir.display())]
	DownloadTimeout { dir: PathBuf, pattern: String, secs: u64 },

	#[error("browser session error: {0}")]
	Session(String),

	/// The page was between documents when asked; retrying may succeed.
	#[error("page context changed: {0}")]
	Transient(String),

	#[error("unexpected failure: {0}")]
	Unclassified(String),

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("credentials unavailable: {0}")]
	Credentials(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

impl From<RuntimeError> for FetchError {
	fn from(err: RuntimeError) -> Self {
		if err.is_transient() {
			return FetchError::Transient(err.to_string());
		}
		match err {
			RuntimeError::Navigation { url, reason } => FetchError::Navigation { url, reason },
			RuntimeError::Timeout { method, ms } => FetchError::Timeout { condition: method, ms },
			RuntimeError::Io(e) => FetchError::Io(e),
			other => FetchError::Session(other.to_string()),
		}
	}
}

/// Workflow step a run failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
	Snapshot,
	Launch,
	Login,
	Export,
	Download,
	Worker,
}

impl std::fmt::Display for Stage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Stage::Snapshot => write!(f, "download directory scan"),
			Stage::Launch => write!(f, "browser launch"),
			Stage::Login => write!(f, "login"),
			Stage::Export => write!(f, "export"),
			Stage::Download => write!(f, "download"),
			Stage::Worker => write!(f, "worker"),
		}
	}
}

#[cfg(test)]
mod tests {
	use orderpull_protocol::ProtocolError;

	use super::*;

	#[test]
	fn runtime_navigation_keeps_its_class() {
		let err: FetchError = RuntimeError::Navigation {
			url: "https://example.test/".into(),
			reason: "net::ERR_NAME_NOT_RESOLVED".into(),
		}
		.into();
		assert!(matches!(err, FetchError::Navigation { .. }));
		assert_eq!(err.to_string(), "could not open https://example.test/: net::ERR_NAME_NOT_RESOLVED");
	}

	#[test]
	fn connection_level_failures_become_session_errors() {
		let err: FetchError = RuntimeError::Protocol {
			method: "Runtime.evaluate".into(),
			error: ProtocolError {
				code: -32000,
				message: "Target closed".into(),
				data: None,
			},
		}
		.into();
		assert!(matches!(err, FetchError::Session(ref msg) if msg.contains("Target closed")));

		let err: FetchError = RuntimeError::ChannelClosed.into();
		assert!(matches!(err, FetchError::Session(_)));
	}

	#[test]
	fn destroyed_context_is_kept_apart_from_session_errors() {
		let err: FetchError = RuntimeError::Protocol {
			method: "Runtime.evaluate".into(),
			error: ProtocolError {
				code: -32000,
				message: "Execution context was destroyed.".into(),
				data: None,
			},
		}
		.into();
		assert!(matches!(err, FetchError::Transient(ref msg) if msg.contains("context was destroyed")));
	}

	#[test]
	fn export_trigger_wraps_its_cause() {
		let err = FetchError::ExportTrigger(Box::new(FetchError::ElementNotFound {
			locator: "cx-icon.fa-arrow-down".into(),
			ms: 15000,
		}));
		assert_eq!(
			err.to_string(),
			"export control could not be activated: element cx-icon.fa-arrow-down not found within 15000ms"
		);
		assert!(std::error::Error::source(&err).is_some());
	}
}
