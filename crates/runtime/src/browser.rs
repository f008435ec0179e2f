//! Browser process launch, page attachment and teardown.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use orderpull_protocol::CreateTargetResult;
use serde_json::json;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::connection::{Connection, DEFAULT_COMMAND_TIMEOUT};
use crate::error::{Result, RuntimeError};
use crate::finder::{BROWSER_ENV, find_browser_executable};
use crate::page::Page;
use crate::probe::VersionEndpoint;
use crate::process::{free_port, kill_now, reap_or_kill};

const PROBE_INTERVAL: Duration = Duration::from_millis(200);

/// How to launch the browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	/// Explicit executable; discovered when `None`.
	pub executable: Option<PathBuf>,
	pub headless: bool,
	/// Directory the browser saves downloads into.
	pub download_dir: PathBuf,
	/// Appended after the built-in flags.
	pub extra_args: Vec<String>,
	/// Endpoint probes before giving up, spaced 200ms apart.
	pub probe_attempts: u32,
	pub command_timeout: Duration,
}

impl LaunchOptions {
	pub fn new(download_dir: impl Into<PathBuf>) -> Self {
		Self {
			executable: None,
			headless: false,
			download_dir: download_dir.into(),
			extra_args: Vec::new(),
			probe_attempts: 50,
			command_timeout: DEFAULT_COMMAND_TIMEOUT,
		}
	}

	fn args(&self, port: u16, profile_dir: &Path) -> Vec<String> {
		let mut args = vec![
			format!("--remote-debugging-port={port}"),
			format!("--user-data-dir={}", profile_dir.display()),
			"--no-first-run".to_string(),
			"--no-default-browser-check".to_string(),
			"--disable-notifications".to_string(),
			"--start-maximized".to_string(),
			"--no-sandbox".to_string(),
			"--disable-dev-shm-usage".to_string(),
		];
		if self.headless {
			args.push("--headless=new".to_string());
		}
		args.extend(self.extra_args.iter().cloned());
		args.push("about:blank".to_string());
		args
	}
}

/// A launched browser with a live DevTools connection.
///
/// Owns the process and its throwaway profile directory. Dropping a `Browser`
/// without calling [`Browser::close`] still kills the process.
pub struct Browser {
	conn: Arc<Connection>,
	child: Child,
	download_dir: PathBuf,
	profile_dir: Option<TempDir>,
	version: Option<String>,
}

impl Browser {
	/// Starts the browser and connects to its DevTools endpoint.
	pub async fn launch(options: LaunchOptions) -> Result<Self> {
		let executable = find_browser_executable(options.executable.as_deref()).ok_or_else(|| {
			RuntimeError::Launch(format!(
				"could not find a Chrome/Chromium executable; install Chrome or set {BROWSER_ENV}"
			))
		})?;

		let port = free_port()?;
		let profile_dir = tempfile::Builder::new().prefix("orderpull-profile-").tempdir()?;

		let mut cmd = Command::new(&executable);
		cmd.args(options.args(port, profile_dir.path()))
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null());

		#[cfg(unix)]
		std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

		let mut child = cmd
			.spawn()
			.map_err(|e| RuntimeError::Launch(format!("failed to start {}: {e}", executable.display())))?;
		info!(target = "orderpull", exe = %executable.display(), pid = child.id(), port, headless = options.headless, "browser started");

		let info = match wait_for_endpoint(&mut child, port, options.probe_attempts).await {
			Ok(info) => info,
			Err(e) => {
				kill_now(&mut child);
				return Err(e);
			}
		};

		let conn = match Connection::connect_with_timeout(&info.web_socket_debugger_url, options.command_timeout).await {
			Ok(conn) => conn,
			Err(e) => {
				kill_now(&mut child);
				return Err(e);
			}
		};

		Ok(Self {
			conn,
			child,
			download_dir: options.download_dir,
			profile_dir: Some(profile_dir),
			version: info.browser,
		})
	}

	/// Browser product string reported by `/json/version`.
	pub fn version(&self) -> Option<&str> {
		self.version.as_deref()
	}

	pub fn pid(&self) -> u32 {
		self.child.id()
	}

	/// Opens a fresh tab, attaches to it and routes its downloads to the download directory.
	pub async fn new_page(&self) -> Result<Page> {
		let created: CreateTargetResult = serde_json::from_value(self.conn.send("Target.createTarget", json!({ "url": "about:blank" })).await?)?;
		let page = Page::attach(Arc::clone(&self.conn), &created.target_id).await?;
		page.route_downloads(&self.download_dir).await?;
		Ok(page)
	}

	/// Shuts the browser down within `grace`, killing it if it lingers.
	///
	/// Every step runs even when an earlier one fails; the first failure is returned.
	pub async fn close(mut self, grace: Duration) -> Result<()> {
		let mut first_error = None;

		match tokio::time::timeout(grace, self.conn.send("Browser.close", json!({}))).await {
			Ok(Ok(_)) | Ok(Err(RuntimeError::ChannelClosed)) => {}
			Ok(Err(e)) => first_error = Some(e),
			Err(_) => {
				first_error = Some(RuntimeError::Timeout {
					method: "Browser.close".into(),
					ms: grace.as_millis() as u64,
				})
			}
		}
		self.conn.close().await;

		if reap_or_kill(&mut self.child, grace).await {
			warn!(target = "orderpull", pid = self.child.id(), "browser did not exit in time; killed");
		}

		if let Some(dir) = self.profile_dir.take() {
			let path = dir.path().to_path_buf();
			if let Err(e) = dir.close() {
				debug!(target = "orderpull", path = %path.display(), error = %e, "profile cleanup failed");
				first_error.get_or_insert(RuntimeError::Io(e));
			}
		}

		match first_error {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}
}

impl Drop for Browser {
	fn drop(&mut self) {
		kill_now(&mut self.child);
	}
}

async fn wait_for_endpoint(child: &mut Child, port: u16, attempts: u32) -> Result<orderpull_protocol::VersionInfo> {
	let endpoint = VersionEndpoint::new(port)?;
	let mut last_error = "endpoint not reachable".to_string();
	for _ in 0..attempts.max(1) {
		tokio::time::sleep(PROBE_INTERVAL).await;

		if let Ok(Some(status)) = child.try_wait() {
			return Err(RuntimeError::Launch(format!(
				"browser exited before its debugging endpoint became available (status: {status})"
			)));
		}

		match endpoint.fetch().await {
			Ok(info) => return Ok(info),
			Err(e) => last_error = e.to_string(),
		}
	}

	Err(RuntimeError::Launch(format!(
		"debugging endpoint on port {port} not available after {attempts} attempts: {last_error}"
	)))
}
