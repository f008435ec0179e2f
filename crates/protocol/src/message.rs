//! CDP message envelopes.
//!
//! Commands carry a caller-chosen `id`; the browser echoes it on the matching
//! response. Events never carry an `id`. With flat target sessions every
//! message addressed to a page also carries `sessionId`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command sent to the browser.
///
/// ```json
/// { "id": 7, "method": "Page.navigate", "params": { "url": "https://example.com" }, "sessionId": "A1B2" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
	pub id: u64,
	pub method: String,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Reply to a [`Request`], correlated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
	pub id: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ProtocolError>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Error payload of a failed command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

impl std::fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match &self.data {
			Some(data) => write!(f, "{} ({}): {}", self.message, self.code, data),
			None => write!(f, "{} ({})", self.message, self.code),
		}
	}
}

/// Unsolicited notification from the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Any inbound message. Responses are tried first since only they carry `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	Response(Response),
	Event(Event),
}
