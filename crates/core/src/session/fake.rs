//! Scripted in-memory session for exercising the workflow without a browser.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{BrowserSession, ElementHandle, SessionLauncher};
use crate::error::{FetchError, Result};
use crate::locator::Locator;

/// When a selector matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
	Always,
	/// Absent for the first `n` lookups, present afterwards.
	AfterQueries(usize),
}

/// Ordered record of what the workflow did to the session.
pub type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
pub struct FakeSession {
	presence: HashMap<String, Presence>,
	queries: HashMap<String, usize>,
	vanish_on_click: HashMap<String, String>,
	reload_on_click: HashMap<String, (String, usize)>,
	downloads: Vec<(String, PathBuf, Vec<u8>)>,
	open_failures: HashMap<String, String>,
	transient: HashMap<String, usize>,
	panic_on_open: bool,
	typed: Vec<(String, String)>,
	journal: Journal,
}

impl FakeSession {
	pub fn new() -> Self {
		Self::default()
	}

	/// A portal whose login and listing pages behave.
	pub fn cooperative() -> Self {
		let mut session = Self::new();
		for css in ["#username", "#password", "button[type='submit']", "sco-filter-tag", "cx-icon.fa-arrow-down"] {
			session.set_presence(css, Presence::Always);
		}
		session.vanish_on_click("button[type='submit']", "#username");
		session
	}

	pub fn set_presence(&mut self, css: &str, presence: Presence) {
		self.presence.insert(css.to_string(), presence);
	}

	pub fn remove(&mut self, css: &str) {
		self.presence.remove(css);
	}

	/// Clicking `trigger` removes `target` from the page.
	pub fn vanish_on_click(&mut self, trigger: &str, target: &str) {
		self.vanish_on_click.insert(trigger.to_string(), target.to_string());
	}

	/// Clicking `trigger` reloads the page; the next `n` lookups of `css` hit the old document.
	pub fn reload_on_click(&mut self, trigger: &str, css: &str, n: usize) {
		self.reload_on_click.insert(trigger.to_string(), (css.to_string(), n));
	}

	/// Running a script containing `fragment` writes `contents` to `path`.
	pub fn download_on_script(&mut self, fragment: &str, path: PathBuf, contents: &[u8]) {
		self.downloads.push((fragment.to_string(), path, contents.to_vec()));
	}

	/// The next `n` lookups of `css` fail as if the page were between documents.
	pub fn reload_during(&mut self, css: &str, n: usize) {
		self.transient.insert(css.to_string(), n);
	}

	pub fn fail_open(&mut self, url: &str, reason: &str) {
		self.open_failures.insert(url.to_string(), reason.to_string());
	}

	pub fn panic_on_open(&mut self) {
		self.panic_on_open = true;
	}

	pub fn journal(&self) -> Journal {
		Arc::clone(&self.journal)
	}

	pub fn query_count(&self, css: &str) -> usize {
		self.queries.get(css).copied().unwrap_or(0)
	}

	pub fn typed(&self) -> &[(String, String)] {
		&self.typed
	}

	fn record(&self, entry: String) {
		self.journal.lock().push(entry);
	}

	fn matches(&mut self, css: &str) -> bool {
		let seen = self.queries.entry(css.to_string()).or_insert(0);
		*seen += 1;
		match self.presence.get(css) {
			Some(Presence::Always) => true,
			Some(Presence::AfterQueries(n)) => *seen > *n,
			None => false,
		}
	}
}

#[async_trait]
impl BrowserSession for FakeSession {
	async fn open(&mut self, url: &str) -> Result<()> {
		if self.panic_on_open {
			panic!("renderer crashed while opening {url}");
		}
		self.record(format!("open {url}"));
		match self.open_failures.get(url) {
			Some(reason) => Err(FetchError::Navigation {
				url: url.to_string(),
				reason: reason.clone(),
			}),
			None => Ok(()),
		}
	}

	async fn query(&mut self, locator: &Locator) -> Result<Option<ElementHandle>> {
		for css in locator.alternatives() {
			if let Some(left @ 1..) = self.transient.get_mut(css) {
				*left -= 1;
				*self.queries.entry(css.clone()).or_insert(0) += 1;
				return Err(FetchError::Transient("Execution context was destroyed.".into()));
			}
			if self.matches(css) {
				return Ok(Some(ElementHandle {
					id: css.clone(),
					locator: locator.clone(),
				}));
			}
		}
		Ok(None)
	}

	async fn type_into(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
		self.record(format!("type {}", element.id));
		self.typed.push((element.id.clone(), text.to_string()));
		Ok(())
	}

	async fn click_element(&mut self, element: &ElementHandle) -> Result<()> {
		self.record(format!("click {}", element.id));
		if let Some(target) = self.vanish_on_click.get(&element.id).cloned() {
			self.presence.remove(&target);
		}
		if let Some((css, n)) = self.reload_on_click.get(&element.id).cloned() {
			self.reload_during(&css, n);
		}
		Ok(())
	}

	async fn execute_script(&mut self, script: &str, args: &[&ElementHandle]) -> Result<Value> {
		let ids: Vec<&str> = args.iter().map(|a| a.id.as_str()).collect();
		self.record(format!("script {script} [{}]", ids.join(", ")));
		for (fragment, path, contents) in &self.downloads {
			if script.contains(fragment.as_str()) {
				std::fs::write(path, contents)?;
			}
		}
		Ok(Value::Null)
	}

	async fn close(&mut self) {
		self.record("close".to_string());
	}
}

/// Hands out one prepared [`FakeSession`]; later launches fail.
pub struct FakeLauncher {
	session: Mutex<Option<FakeSession>>,
	failure: Option<String>,
}

impl FakeLauncher {
	pub fn new(session: FakeSession) -> Self {
		Self {
			session: Mutex::new(Some(session)),
			failure: None,
		}
	}

	pub fn failing(reason: &str) -> Self {
		Self {
			session: Mutex::new(None),
			failure: Some(reason.to_string()),
		}
	}
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
	async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
		if let Some(reason) = &self.failure {
			return Err(FetchError::Session(reason.clone()));
		}
		match self.session.lock().take() {
			Some(session) => Ok(Box::new(session)),
			None => Err(FetchError::Session("fake session already handed out".into())),
		}
	}
}
