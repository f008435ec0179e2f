//! Workflow settings.
//!
//! Defaults describe the supplier portal the tool was built for. A JSON file
//! (`~/.config/orderpull/config.json` unless given explicitly) may override
//! any subset of fields; missing keys keep their defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FetchError, Result};
use crate::locator::Locator;
use crate::watcher::CompletionCheck;

pub const DEFAULT_LOGIN_URL: &str = "https://connect.schueco.com/";
pub const DEFAULT_ORDERS_URL: &str = "https://connect.schueco.com/schueco/pl/purchaseOrders/orders?filters=default&sort=code,false&view=default";

const CONFIG_DIR: &str = "orderpull";
const CONFIG_FILE: &str = "config.json";

/// Longest accepted step timeout or poll interval: one hour.
pub const MAX_TIMEOUT_MS: u64 = 3_600_000;
/// Longest accepted download budget: one day.
pub const MAX_BUDGET_SECS: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
	pub login_url: String,
	pub orders_url: String,
	/// Where the browser saves the export; observed, never written.
	pub download_dir: PathBuf,
	pub locators: Locators,
	pub timeouts: Timeouts,
	pub download: DownloadSettings,
	pub browser: BrowserSettings,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			login_url: DEFAULT_LOGIN_URL.to_string(),
			orders_url: DEFAULT_ORDERS_URL.to_string(),
			download_dir: PathBuf::from("."),
			locators: Locators::default(),
			timeouts: Timeouts::default(),
			download: DownloadSettings::default(),
			browser: BrowserSettings::default(),
		}
	}
}

/// CSS selectors for the portal's controls. Each entry lists alternatives tried in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Locators {
	pub identifier: Vec<String>,
	pub secret: Vec<String>,
	pub submit: Vec<String>,
	pub listing_ready: Vec<String>,
	pub export_icon: Vec<String>,
}

impl Default for Locators {
	fn default() -> Self {
		Self {
			identifier: vec!["#username".into()],
			secret: vec!["#password".into()],
			submit: vec!["button[type='submit']".into()],
			listing_ready: vec!["sco-filter-tag".into()],
			export_icon: vec!["cx-icon.fa-arrow-down".into(), "cx-icon.fas.fa-arrow-down".into()],
		}
	}
}

impl Locators {
	pub fn identifier(&self) -> Result<Locator> {
		to_locator("identifier", &self.identifier)
	}

	pub fn secret(&self) -> Result<Locator> {
		to_locator("secret", &self.secret)
	}

	pub fn submit(&self) -> Result<Locator> {
		to_locator("submit", &self.submit)
	}

	pub fn listing_ready(&self) -> Result<Locator> {
		to_locator("listingReady", &self.listing_ready)
	}

	pub fn export_icon(&self) -> Result<Locator> {
		to_locator("exportIcon", &self.export_icon)
	}
}

fn to_locator(name: &str, selectors: &[String]) -> Result<Locator> {
	Locator::any(selectors.iter().cloned()).ok_or_else(|| FetchError::Config(format!("locators.{name} has no selectors")))
}

/// Per-step bounds and settle delays, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
	pub element_wait_ms: u64,
	pub login_dismiss_ms: u64,
	pub login_settle_ms: u64,
	pub listing_settle_ms: u64,
	pub scroll_settle_ms: u64,
	pub navigation_ms: u64,
	pub close_ms: u64,
}

impl Default for Timeouts {
	fn default() -> Self {
		Self {
			element_wait_ms: 15_000,
			login_dismiss_ms: 15_000,
			login_settle_ms: 2_000,
			listing_settle_ms: 1_000,
			scroll_settle_ms: 500,
			navigation_ms: 30_000,
			close_ms: 10_000,
		}
	}
}

impl Timeouts {
	fn named(&self) -> [(&'static str, u64); 7] {
		[
			("timeouts.elementWaitMs", self.element_wait_ms),
			("timeouts.loginDismissMs", self.login_dismiss_ms),
			("timeouts.loginSettleMs", self.login_settle_ms),
			("timeouts.listingSettleMs", self.listing_settle_ms),
			("timeouts.scrollSettleMs", self.scroll_settle_ms),
			("timeouts.navigationMs", self.navigation_ms),
			("timeouts.closeMs", self.close_ms),
		]
	}

	pub fn element_wait(&self) -> Duration {
		Duration::from_millis(self.element_wait_ms)
	}

	pub fn login_dismiss(&self) -> Duration {
		Duration::from_millis(self.login_dismiss_ms)
	}

	pub fn login_settle(&self) -> Duration {
		Duration::from_millis(self.login_settle_ms)
	}

	pub fn listing_settle(&self) -> Duration {
		Duration::from_millis(self.listing_settle_ms)
	}

	pub fn scroll_settle(&self) -> Duration {
		Duration::from_millis(self.scroll_settle_ms)
	}

	pub fn navigation(&self) -> Duration {
		Duration::from_millis(self.navigation_ms)
	}

	pub fn close(&self) -> Duration {
		Duration::from_millis(self.close_ms)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadSettings {
	pub budget_secs: u64,
	pub poll_interval_ms: u64,
	/// Glob for finished export files, matched against file names.
	pub pattern: String,
	/// Glob for the browser's partial-download files.
	pub in_progress_pattern: String,
	pub completion: CompletionCheck,
}

impl Default for DownloadSettings {
	fn default() -> Self {
		Self {
			budget_secs: 120,
			poll_interval_ms: 1_000,
			pattern: "*.csv".into(),
			in_progress_pattern: "*.crdownload".into(),
			completion: CompletionCheck::NonEmpty,
		}
	}
}

impl DownloadSettings {
	pub fn budget(&self) -> Duration {
		Duration::from_secs(self.budget_secs)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserSettings {
	/// Browser binary; discovered when unset.
	pub executable: Option<PathBuf>,
	pub headless: bool,
	pub extra_args: Vec<String>,
}

impl Settings {
	/// Loads settings from `path`, or from the default config file when it exists.
	///
	/// An explicit `path` must exist; the default location is optional.
	pub fn load(path: Option<&Path>) -> Result<Self> {
		let settings = match path {
			Some(path) => Self::from_file(path)?,
			None => match default_config_path() {
				Some(path) if path.is_file() => Self::from_file(&path)?,
				_ => Self::default(),
			},
		};
		settings.validate()?;
		Ok(settings)
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		debug!(target = "orderpull", path = %path.display(), "loading settings");
		let content = fs::read_to_string(path).map_err(|e| FetchError::Config(format!("cannot read {}: {e}", path.display())))?;
		serde_json::from_str(&content).map_err(|e| FetchError::Config(format!("cannot parse {}: {e}", path.display())))
	}

	/// Rejects settings the workflow cannot run with.
	pub fn validate(&self) -> Result<()> {
		check_url("loginUrl", &self.login_url)?;
		check_url("ordersUrl", &self.orders_url)?;

		self.locators.identifier()?;
		self.locators.secret()?;
		self.locators.submit()?;
		self.locators.listing_ready()?;
		self.locators.export_icon()?;

		if self.download.poll_interval_ms == 0 {
			return Err(FetchError::Config("download.pollIntervalMs must be greater than zero".into()));
		}
		if self.download.budget_secs == 0 {
			return Err(FetchError::Config("download.budgetSecs must be greater than zero".into()));
		}
		if self.download.budget_secs > MAX_BUDGET_SECS {
			return Err(FetchError::Config(format!("download.budgetSecs must be at most {MAX_BUDGET_SECS}")));
		}
		for (name, ms) in self.timeouts.named().into_iter().chain([("download.pollIntervalMs", self.download.poll_interval_ms)]) {
			if ms > MAX_TIMEOUT_MS {
				return Err(FetchError::Config(format!("{name} must be at most {MAX_TIMEOUT_MS}")));
			}
		}
		for (name, pattern) in [
			("download.pattern", &self.download.pattern),
			("download.inProgressPattern", &self.download.in_progress_pattern),
		] {
			glob::Pattern::new(pattern).map_err(|e| FetchError::Config(format!("{name} is not a valid glob: {e}")))?;
		}
		Ok(())
	}
}

fn check_url(name: &str, value: &str) -> Result<()> {
	let url = url::Url::parse(value).map_err(|e| FetchError::Config(format!("{name} '{value}' is not a valid URL: {e}")))?;
	match url.scheme() {
		"http" | "https" => Ok(()),
		other => Err(FetchError::Config(format!("{name} must use http or https, not {other}"))),
	}
}

/// `~/.config/orderpull/config.json` on Linux, the platform equivalent elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}
