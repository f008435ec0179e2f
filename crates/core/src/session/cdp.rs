//! [`BrowserSession`] backed by a launched Chromium over the DevTools protocol.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use orderpull_protocol::CallArgument;
use orderpull_runtime::{Browser, LaunchOptions, Page};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{BrowserSession, ElementHandle, SessionLauncher};
use crate::error::Result;
use crate::locator::Locator;
use crate::settings::Settings;

pub struct CdpSession {
	browser: Option<Browser>,
	page: Page,
	navigation_timeout: Duration,
	close_grace: Duration,
}

impl CdpSession {
	/// Drives `page` without owning a browser; [`BrowserSession::close`] leaves it running.
	pub fn new(page: Page, navigation_timeout: Duration, close_grace: Duration) -> Self {
		Self {
			browser: None,
			page,
			navigation_timeout,
			close_grace,
		}
	}

	/// Shuts `browser` down when the session closes.
	pub fn owning(mut self, browser: Browser) -> Self {
		self.browser = Some(browser);
		self
	}
}

#[async_trait]
impl BrowserSession for CdpSession {
	async fn open(&mut self, url: &str) -> Result<()> {
		debug!(target = "orderpull", url, "navigating");
		self.page.navigate(url, self.navigation_timeout).await?;
		Ok(())
	}

	async fn query(&mut self, locator: &Locator) -> Result<Option<ElementHandle>> {
		for css in locator.alternatives() {
			if let Some(object) = self.page.query_selector(css).await? {
				let Some(id) = object.object_id else { continue };
				return Ok(Some(ElementHandle {
					id,
					locator: locator.clone(),
				}));
			}
		}
		Ok(None)
	}

	async fn type_into(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
		self.page.clear_input(&element.id).await?;
		self.page.insert_text(text).await?;
		self.page.commit_input(&element.id).await?;
		Ok(())
	}

	async fn click_element(&mut self, element: &ElementHandle) -> Result<()> {
		let point = self.page.element_center(&element.id).await?;
		self.page.click_at(point).await?;
		Ok(())
	}

	async fn execute_script(&mut self, script: &str, args: &[&ElementHandle]) -> Result<Value> {
		let declaration = format!("function() {{ {script} }}");
		let this_object = args.first().map(|a| a.id.as_str());
		let arguments = args.iter().map(|a| CallArgument::object(a.id.clone())).collect();
		Ok(self.page.call_function(&declaration, this_object, arguments).await?)
	}

	async fn close(&mut self) {
		let Some(browser) = self.browser.take() else {
			return;
		};
		if let Err(e) = browser.close(self.close_grace).await {
			warn!(target = "orderpull", error = %e, "browser did not close cleanly");
		}
	}
}

/// Launches a fresh browser per run from [`Settings`].
pub struct CdpLauncher {
	options: LaunchOptions,
	navigation_timeout: Duration,
	close_grace: Duration,
}

impl CdpLauncher {
	pub fn from_settings(settings: &Settings) -> Self {
		let mut options = LaunchOptions::new(absolute(&settings.download_dir));
		options.executable = settings.browser.executable.clone();
		options.headless = settings.browser.headless;
		options.extra_args = settings.browser.extra_args.clone();
		Self {
			options,
			navigation_timeout: settings.timeouts.navigation(),
			close_grace: settings.timeouts.close(),
		}
	}
}

/// The browser resolves download paths against its own working directory.
fn absolute(dir: &std::path::Path) -> PathBuf {
	std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf())
}

#[async_trait]
impl SessionLauncher for CdpLauncher {
	async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
		let browser = Browser::launch(self.options.clone()).await?;
		info!(target = "orderpull", pid = browser.pid(), version = browser.version().unwrap_or("unknown"), "browser ready");
		let page = match browser.new_page().await {
			Ok(page) => page,
			Err(e) => {
				if let Err(close_err) = browser.close(self.close_grace).await {
					warn!(target = "orderpull", error = %close_err, "browser did not close after failed page setup");
				}
				return Err(e.into());
			}
		};
		Ok(Box::new(CdpSession::new(page, self.navigation_timeout, self.close_grace).owning(browser)))
	}
}

#[cfg(test)]
mod tests {
	use orderpull_runtime::fake::{Reply, Requests, devtools, tab};
	use serde_json::json;

	use super::*;
	use crate::error::FetchError;

	async fn session<F>(rest: F) -> (CdpSession, Requests)
	where
		F: Fn(&str, &Value) -> Reply + Send + 'static,
	{
		let (conn, requests) = devtools(tab(rest)).await;
		let page = Page::attach(conn, "T-1").await.unwrap();
		(CdpSession::new(page, Duration::from_secs(1), Duration::from_millis(200)), requests)
	}

	fn node(object_id: &str) -> Reply {
		Ok(json!({ "result": { "type": "object", "subtype": "node", "objectId": object_id } }))
	}

	fn null() -> Reply {
		Ok(json!({ "result": { "type": "object", "subtype": "null", "value": null } }))
	}

	#[tokio::test]
	async fn failed_navigation_is_a_navigation_error() {
		let (mut session, _) = session(|method, _| match method {
			"Page.navigate" => Ok(json!({ "frameId": "F-1", "errorText": "net::ERR_CONNECTION_REFUSED" })),
			_ => Err("unexpected"),
		})
		.await;

		let err = session.open("https://portal.test/login").await.unwrap_err();
		assert!(matches!(err, FetchError::Navigation { ref reason, .. } if reason == "net::ERR_CONNECTION_REFUSED"));
	}

	#[tokio::test]
	async fn query_falls_back_to_later_alternative() {
		let (mut session, requests) = session(|method, params| match method {
			"Runtime.evaluate" if params["expression"].as_str().is_some_and(|e| e.contains("cx-icon.fas")) => node("O-2"),
			"Runtime.evaluate" => null(),
			_ => Err("unexpected"),
		})
		.await;

		let locator = Locator::css("cx-icon.fa-arrow-down").or("cx-icon.fas.fa-arrow-down");
		let element = session.query(&locator).await.unwrap().unwrap();
		assert_eq!(element.id, "O-2");
		assert_eq!(element.locator, locator);
		assert_eq!(requests.lock().iter().filter(|r| r["method"] == "Runtime.evaluate").count(), 2);
	}

	#[tokio::test]
	async fn destroyed_context_is_transient_and_lookups_retry() {
		let attempts = std::sync::atomic::AtomicUsize::new(0);
		let (mut session, _) = session(move |method, _| match method {
			"Runtime.evaluate" if attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 => Err("Execution context was destroyed."),
			"Runtime.evaluate" => node("O-1"),
			_ => Err("unexpected"),
		})
		.await;

		let username = Locator::css("#username");
		let err = session.query(&username).await.unwrap_err();
		assert!(matches!(err, FetchError::Transient(_)));

		let element = session.find_element(&username, Duration::from_secs(1)).await.unwrap();
		assert_eq!(element.id, "O-1");
	}

	#[tokio::test]
	async fn script_arguments_are_bound_by_object_id() {
		let (mut session, requests) = session(|method, _| match method {
			"Runtime.callFunctionOn" => Ok(json!({ "result": { "type": "undefined" } })),
			_ => Err("unexpected"),
		})
		.await;
		let icon = ElementHandle {
			id: "O-9".into(),
			locator: Locator::css("cx-icon.fa-arrow-down"),
		};

		session.execute_script("arguments[0].click();", &[&icon]).await.unwrap();

		let requests = requests.lock();
		let call = &requests.last().unwrap()["params"];
		assert_eq!(call["functionDeclaration"], "function() { arguments[0].click(); }");
		assert_eq!(call["objectId"], "O-9");
		assert_eq!(call["arguments"], json!([{ "objectId": "O-9" }]));
	}

	#[tokio::test]
	async fn close_twice_is_harmless() {
		let (mut session, requests) = session(|_, _| Err("unexpected")).await;
		let before = requests.lock().len();

		session.close().await;
		session.close().await;
		assert_eq!(requests.lock().len(), before);
	}

	#[test]
	fn launcher_carries_browser_settings() {
		let mut settings = Settings::default();
		settings.browser.headless = true;
		settings.browser.extra_args = vec!["--lang=pl".into()];
		settings.download_dir = PathBuf::from("/srv/exports");

		let launcher = CdpLauncher::from_settings(&settings);
		assert!(launcher.options.headless);
		assert_eq!(launcher.options.extra_args, ["--lang=pl"]);
		assert_eq!(launcher.options.download_dir, PathBuf::from("/srv/exports"));
		assert_eq!(launcher.navigation_timeout, Duration::from_secs(30));
	}

	#[test]
	fn relative_download_dir_is_made_absolute() {
		let dir = absolute(std::path::Path::new("downloads"));
		assert!(dir.is_absolute());
		assert!(dir.ends_with("downloads"));
	}
}
