//! `Runtime` domain types: remote object references and script results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mirror of a JavaScript value living in the page.
///
/// Non-primitive values are addressed through `object_id`, which stays valid
/// until the page navigates or the object group is released.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subtype: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub class_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub object_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

impl RemoteObject {
	/// `true` for `null` and `undefined` results, e.g. a failed `querySelector`.
	pub fn is_nullish(&self) -> bool {
		self.kind == "undefined" || self.subtype.as_deref() == Some("null")
	}

	/// `true` when the object is a DOM node with a usable handle.
	pub fn is_node(&self) -> bool {
		self.subtype.as_deref() == Some("node") && self.object_id.is_some()
	}
}

/// Details of an exception thrown while evaluating script.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
	pub text: String,
	#[serde(default)]
	pub line_number: i64,
	#[serde(default)]
	pub column_number: i64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
	/// Best human-readable description: the thrown object's description when
	/// present (it carries the `Error` message), else the summary text.
	pub fn message(&self) -> String {
		self.exception
			.as_ref()
			.and_then(|exc| exc.description.clone())
			.unwrap_or_else(|| self.text.clone())
	}
}

/// Result of `Runtime.evaluate` and `Runtime.callFunctionOn`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
	pub result: RemoteObject,
	#[serde(default)]
	pub exception_details: Option<ExceptionDetails>,
}

/// Argument passed to `Runtime.callFunctionOn`: either a live object or a plain value.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallArgument {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub object_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
}

impl CallArgument {
	pub fn object(object_id: impl Into<String>) -> Self {
		Self {
			object_id: Some(object_id.into()),
			value: None,
		}
	}

	pub fn value(value: Value) -> Self {
		Self {
			object_id: None,
			value: Some(value),
		}
	}
}
