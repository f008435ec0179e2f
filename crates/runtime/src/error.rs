use orderpull_protocol::ProtocolError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
	#[error("Browser launch failed: {0}")]
	Launch(String),

	#[error("DevTools endpoint on port {port} unreachable: {message}")]
	Probe { port: u16, message: String },

	#[error("WebSocket error: {0}")]
	WebSocket(String),

	#[error("{method} failed: {error}")]
	Protocol { method: String, error: ProtocolError },

	#[error("{method} timed out after {ms}ms")]
	Timeout { method: String, ms: u64 },

	#[error("Navigation to {url} failed: {reason}")]
	Navigation { url: String, reason: String },

	#[error("Script error: {0}")]
	Script(String),

	#[error("Connection closed")]
	ChannelClosed,

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for RuntimeError {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		RuntimeError::WebSocket(err.to_string())
	}
}

impl RuntimeError {
	/// CDP answers lookups against a page that is mid-navigation with
	/// "context destroyed"/"cannot find context" errors; those resolve on retry.
	pub fn is_transient(&self) -> bool {
		match self {
			RuntimeError::Protocol { error, .. } => {
				let msg = error.message.to_lowercase();
				msg.contains("context was destroyed") || msg.contains("cannot find context") || msg.contains("no frame")
			}
			RuntimeError::Script(msg) => msg.contains("Execution context was destroyed"),
			_ => false,
		}
	}
}
