//! Browser, `Target` and `Page` domain types.

use serde::{Deserialize, Serialize};

/// `/json/version` response subset from the DevTools HTTP endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser", default)]
	pub browser: Option<String>,
	#[serde(rename = "Protocol-Version", default)]
	pub protocol_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetResult {
	pub target_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetResult {
	pub session_id: String,
}

/// Result of `Page.navigate`. A present `error_text` means the navigation never committed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateResult {
	pub frame_id: String,
	#[serde(default)]
	pub loader_id: Option<String>,
	#[serde(default)]
	pub error_text: Option<String>,
}

/// Download routing for `Browser.setDownloadBehavior`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DownloadBehavior {
	Deny,
	Allow,
	AllowAndName,
	Default,
}
