//! Single attached tab driven over a flat CDP session.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use orderpull_protocol::{AttachToTargetResult, CallArgument, DownloadBehavior, EvaluateResult, NavigateResult, RemoteObject};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::connection::Connection;
use crate::error::{Result, RuntimeError};

const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Viewport coordinate in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

/// A browser tab. Cheap to clone; clones share the underlying connection.
#[derive(Clone)]
pub struct Page {
	conn: Arc<Connection>,
	session_id: String,
}

impl Page {
	/// Attaches a flat session to `target_id` and enables the Page and Runtime domains.
	pub async fn attach(conn: Arc<Connection>, target_id: &str) -> Result<Self> {
		let attached: AttachToTargetResult =
			serde_json::from_value(conn.send("Target.attachToTarget", json!({ "targetId": target_id, "flatten": true })).await?)?;
		let page = Self {
			conn,
			session_id: attached.session_id,
		};
		page.send("Page.enable", json!({})).await?;
		page.send("Runtime.enable", json!({})).await?;
		debug!(target = "orderpull", target_id, session_id = %page.session_id, "page attached");
		Ok(page)
	}

	/// Saves downloads into `dir` without prompting.
	///
	/// Uses the browser-wide setting and falls back to the per-page one on
	/// browsers that lack `Browser.setDownloadBehavior`.
	pub async fn route_downloads(&self, dir: &Path) -> Result<()> {
		let path = dir.to_string_lossy().to_string();
		let browser_level = self
			.conn
			.send(
				"Browser.setDownloadBehavior",
				json!({ "behavior": DownloadBehavior::Allow, "downloadPath": path, "eventsEnabled": true }),
			)
			.await;

		match browser_level {
			Ok(_) => Ok(()),
			Err(RuntimeError::Protocol { error, .. }) => {
				debug!(target = "orderpull", error = %error, "Browser.setDownloadBehavior unsupported; using Page domain");
				self.send("Page.setDownloadBehavior", json!({ "behavior": DownloadBehavior::Allow, "downloadPath": path }))
					.await
					.map(|_| ())
			}
			Err(e) => Err(e),
		}
	}

	async fn send(&self, method: &str, params: Value) -> Result<Value> {
		self.conn.send_to(Some(&self.session_id), method, params).await
	}

	/// Navigates and waits for `document.readyState == "complete"` within `timeout`.
	pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
		debug!(target = "orderpull", %url, "navigate");
		let value = self.send("Page.navigate", json!({ "url": url })).await.map_err(|e| match e {
			RuntimeError::Protocol { error, .. } => RuntimeError::Navigation {
				url: url.to_string(),
				reason: error.message,
			},
			other => other,
		})?;
		let result: NavigateResult = serde_json::from_value(value)?;
		if let Some(reason) = result.error_text.filter(|text| !text.is_empty()) {
			return Err(RuntimeError::Navigation { url: url.to_string(), reason });
		}

		self.wait_for_load(timeout).await.map_err(|e| match e {
			RuntimeError::Timeout { ms, .. } => RuntimeError::Navigation {
				url: url.to_string(),
				reason: format!("page did not finish loading within {ms}ms"),
			},
			other => other,
		})
	}

	async fn wait_for_load(&self, timeout: Duration) -> Result<()> {
		let deadline = tokio::time::Instant::now() + timeout;
		loop {
			match self.evaluate("document.readyState").await {
				Ok(state) if state == "complete" => return Ok(()),
				Ok(state) => trace!(target = "orderpull", %state, "waiting for load"),
				Err(e) if e.is_transient() => trace!(target = "orderpull", error = %e, "context not ready"),
				Err(e) => return Err(e),
			}
			if tokio::time::Instant::now() >= deadline {
				return Err(RuntimeError::Timeout {
					method: "page load".into(),
					ms: timeout.as_millis() as u64,
				});
			}
			tokio::time::sleep(LOAD_POLL_INTERVAL).await;
		}
	}

	/// Evaluates `expression` in the page and returns its JSON value.
	pub async fn evaluate(&self, expression: &str) -> Result<Value> {
		let value = self
			.send(
				"Runtime.evaluate",
				json!({
					"expression": expression,
					"returnByValue": true,
					"awaitPromise": true,
				}),
			)
			.await?;
		let result = into_result(value)?;
		Ok(result.value.unwrap_or(Value::Null))
	}

	/// Returns a handle to the first element matching `css`, if any.
	///
	/// While the page is between documents this fails with an error for which
	/// [`RuntimeError::is_transient`] holds; callers decide what absence means.
	pub async fn query_selector(&self, css: &str) -> Result<Option<RemoteObject>> {
		let expression = format!("document.querySelector({})", serde_json::to_string(css)?);
		let value = self.send("Runtime.evaluate", json!({ "expression": expression })).await?;
		let object = into_result(value)?;
		Ok(object.is_node().then_some(object))
	}

	/// Calls `declaration` (a JS function source) with `this` bound to `this_object`.
	///
	/// Without a `this_object` the function runs in the page's global scope.
	pub async fn call_function(&self, declaration: &str, this_object: Option<&str>, args: Vec<CallArgument>) -> Result<Value> {
		let Some(object_id) = this_object else {
			let expression = format!("({declaration}).apply(null, {})", args_as_literal(&args)?);
			return self.evaluate(&expression).await;
		};

		let value = self
			.send(
				"Runtime.callFunctionOn",
				json!({
					"functionDeclaration": declaration,
					"objectId": object_id,
					"arguments": args,
					"returnByValue": true,
					"awaitPromise": true,
				}),
			)
			.await?;
		let result = into_result(value)?;
		Ok(result.value.unwrap_or(Value::Null))
	}

	/// Focuses the element and replaces its value with nothing, firing `input`.
	pub async fn clear_input(&self, object_id: &str) -> Result<()> {
		self.call_function(
			"function() { this.focus(); if ('value' in this) { this.value = ''; this.dispatchEvent(new Event('input', { bubbles: true })); } }",
			Some(object_id),
			Vec::new(),
		)
		.await
		.map(|_| ())
	}

	/// Types `text` into the focused element as if from an IME commit.
	pub async fn insert_text(&self, text: &str) -> Result<()> {
		self.send("Input.insertText", json!({ "text": text })).await.map(|_| ())
	}

	/// Fires `change` on the element after text entry so frameworks pick up the value.
	pub async fn commit_input(&self, object_id: &str) -> Result<()> {
		self.call_function(
			"function() { this.dispatchEvent(new Event('change', { bubbles: true })); }",
			Some(object_id),
			Vec::new(),
		)
		.await
		.map(|_| ())
	}

	/// Scrolls the element into view and returns its viewport centre.
	pub async fn element_center(&self, object_id: &str) -> Result<Point> {
		let value = self
			.call_function(
				"function() { this.scrollIntoView({ block: 'center', inline: 'center' }); const r = this.getBoundingClientRect(); return { x: r.left + r.width / 2, y: r.top + r.height / 2 }; }",
				Some(object_id),
				Vec::new(),
			)
			.await?;
		Ok(serde_json::from_value(value)?)
	}

	/// Dispatches a left-button press/release at `point`.
	pub async fn click_at(&self, point: Point) -> Result<()> {
		self.send("Input.dispatchMouseEvent", json!({ "type": "mouseMoved", "x": point.x, "y": point.y }))
			.await?;
		for kind in ["mousePressed", "mouseReleased"] {
			self.send(
				"Input.dispatchMouseEvent",
				json!({ "type": kind, "x": point.x, "y": point.y, "button": "left", "clickCount": 1 }),
			)
			.await?;
		}
		Ok(())
	}
}

fn into_result(value: Value) -> Result<RemoteObject> {
	let result: EvaluateResult = serde_json::from_value(value)?;
	match result.exception_details {
		Some(details) => Err(RuntimeError::Script(details.message())),
		None => Ok(result.result),
	}
}

fn args_as_literal(args: &[CallArgument]) -> Result<String> {
	let values = args
		.iter()
		.map(|arg| match (&arg.value, &arg.object_id) {
			(Some(value), _) => Ok(value.clone()),
			(None, Some(_)) => Err(RuntimeError::Script("object arguments require a bound element".into())),
			(None, None) => Ok(Value::Null),
		})
		.collect::<Result<Vec<_>>>()?;
	Ok(serde_json::to_string(&values)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fake::{devtools, methods, tab};

	#[tokio::test]
	async fn attach_enables_domains_on_the_flat_session() {
		let (conn, requests) = devtools(tab(|_, _| Err("unexpected"))).await;
		Page::attach(conn, "T-1").await.unwrap();

		let requests = requests.lock();
		assert_eq!(requests[0]["params"], json!({ "targetId": "T-1", "flatten": true }));
		assert_eq!(requests[1]["method"], "Page.enable");
		assert_eq!(requests[1]["sessionId"], "S-1");
		assert_eq!(requests[2]["method"], "Runtime.enable");
		assert_eq!(requests[2]["sessionId"], "S-1");
	}

	#[tokio::test]
	async fn navigation_error_text_fails_the_navigation() {
		let (conn, _) = devtools(tab(|method, _| match method {
			"Page.navigate" => Ok(json!({ "frameId": "F-1", "errorText": "net::ERR_NAME_NOT_RESOLVED" })),
			_ => Err("unexpected"),
		}))
		.await;
		let page = Page::attach(conn, "T-1").await.unwrap();

		let err = page.navigate("https://portal.invalid/login", Duration::from_secs(1)).await.unwrap_err();
		assert!(matches!(
			err,
			RuntimeError::Navigation { ref url, ref reason } if url == "https://portal.invalid/login" && reason == "net::ERR_NAME_NOT_RESOLVED"
		));
	}

	#[tokio::test]
	async fn navigation_waits_for_complete_ready_state() {
		let polls = std::sync::atomic::AtomicUsize::new(0);
		let (conn, _) = devtools(tab(move |method, _| match method {
			"Page.navigate" => Ok(json!({ "frameId": "F-1", "errorText": "" })),
			"Runtime.evaluate" => {
				let state = if polls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) < 2 { "loading" } else { "complete" };
				Ok(json!({ "result": { "type": "string", "value": state } }))
			}
			_ => Err("unexpected"),
		}))
		.await;
		let page = Page::attach(conn, "T-1").await.unwrap();

		page.navigate("https://portal.test/login", Duration::from_secs(5)).await.unwrap();
	}

	#[tokio::test]
	async fn destroyed_context_during_lookup_is_transient() {
		let (conn, _) = devtools(tab(|method, _| match method {
			"Runtime.evaluate" => Err("Execution context was destroyed."),
			_ => Err("unexpected"),
		}))
		.await;
		let page = Page::attach(conn, "T-1").await.unwrap();

		let err = page.query_selector("#username").await.unwrap_err();
		assert!(err.is_transient(), "{err}");
	}

	#[tokio::test]
	async fn lookup_returns_only_nodes() {
		let (conn, requests) = devtools(tab(|method, params| match method {
			"Runtime.evaluate" if params["expression"] == r##"document.querySelector("#username")"## => {
				Ok(json!({ "result": { "type": "object", "subtype": "node", "className": "HTMLInputElement", "objectId": "O-1" } }))
			}
			"Runtime.evaluate" => Ok(json!({ "result": { "type": "object", "subtype": "null", "value": null } })),
			_ => Err("unexpected"),
		}))
		.await;
		let page = Page::attach(conn, "T-1").await.unwrap();

		let found = page.query_selector("#username").await.unwrap().unwrap();
		assert_eq!(found.object_id.as_deref(), Some("O-1"));
		assert!(page.query_selector("#missing").await.unwrap().is_none());
		assert_eq!(requests.lock().last().unwrap()["sessionId"], "S-1");
	}

	#[tokio::test]
	async fn call_function_binds_this_and_object_arguments() {
		let (conn, requests) = devtools(tab(|method, _| match method {
			"Runtime.callFunctionOn" => Ok(json!({ "result": { "type": "undefined" } })),
			_ => Err("unexpected"),
		}))
		.await;
		let page = Page::attach(conn, "T-1").await.unwrap();

		let value = page
			.call_function("function() { arguments[0].click(); }", Some("O-7"), vec![CallArgument::object("O-7")])
			.await
			.unwrap();
		assert_eq!(value, Value::Null);

		let requests = requests.lock();
		let call = requests.last().unwrap();
		assert_eq!(call["method"], "Runtime.callFunctionOn");
		assert_eq!(call["params"]["objectId"], "O-7");
		assert_eq!(call["params"]["arguments"], json!([{ "objectId": "O-7" }]));
		assert_eq!(call["params"]["functionDeclaration"], "function() { arguments[0].click(); }");
	}

	#[tokio::test]
	async fn downloads_fall_back_to_the_page_domain() {
		let (conn, requests) = devtools(tab(|method, _| match method {
			"Browser.setDownloadBehavior" => Err("'Browser.setDownloadBehavior' wasn't found"),
			"Page.setDownloadBehavior" => Ok(json!({})),
			_ => Err("unexpected"),
		}))
		.await;
		let page = Page::attach(conn, "T-1").await.unwrap();

		page.route_downloads(Path::new("/srv/exports")).await.unwrap();

		let requests = requests.lock();
		let fallback = requests.last().unwrap();
		assert_eq!(fallback["method"], "Page.setDownloadBehavior");
		assert_eq!(fallback["sessionId"], "S-1");
		assert_eq!(fallback["params"], json!({ "behavior": "allow", "downloadPath": "/srv/exports" }));
	}

	#[tokio::test]
	async fn browser_wide_download_routing_is_preferred() {
		let (conn, requests) = devtools(tab(|method, _| match method {
			"Browser.setDownloadBehavior" => Ok(json!({})),
			_ => Err("unexpected"),
		}))
		.await;
		let page = Page::attach(conn, "T-1").await.unwrap();

		page.route_downloads(Path::new("/srv/exports")).await.unwrap();
		let methods = methods(&requests);
		assert_eq!(methods.last().map(String::as_str), Some("Browser.setDownloadBehavior"));
		assert!(!methods.iter().any(|m| m == "Page.setDownloadBehavior"));
		assert!(requests.lock().last().unwrap().get("sessionId").is_none());
	}

	#[test]
	fn exception_details_become_script_errors() {
		let err = into_result(json!({
			"result": { "type": "object", "subtype": "error" },
			"exceptionDetails": {
				"text": "Uncaught",
				"exception": { "type": "object", "description": "SyntaxError: 'cx-icon..' is not a valid selector" }
			}
		}))
		.unwrap_err();
		assert!(matches!(err, RuntimeError::Script(ref msg) if msg.contains("not a valid selector")));
	}

	#[test]
	fn value_arguments_render_as_array_literal() {
		let literal = args_as_literal(&[CallArgument::value(json!("a")), CallArgument::value(json!(2))]).unwrap();
		assert_eq!(literal, r#"["a",2]"#);
	}

	#[test]
	fn object_arguments_need_a_bound_element() {
		assert!(args_as_literal(&[CallArgument::object("1.1")]).is_err());
	}

	#[test]
	fn point_parses_from_script_value() {
		let point: Point = serde_json::from_value(json!({ "x": 10.5, "y": 20 })).unwrap();
		assert_eq!(point, Point { x: 10.5, y: 20.0 });
	}
}
