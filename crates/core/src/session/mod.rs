//! Browser session abstraction.
//!
//! [`BrowserSession`] is the seam between the workflow and a real browser.
//! Implementors supply the primitive operations; the polling waits are
//! provided on top of [`BrowserSession::query`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::trace;

use crate::error::{FetchError, Result};
use crate::locator::Locator;

mod cdp;
#[cfg(test)]
pub(crate) mod fake;

pub use cdp::{CdpLauncher, CdpSession};

/// Interval between element lookups while waiting.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Reference to a live element, valid until the page navigates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
	pub id: String,
	pub locator: Locator,
}

#[async_trait]
pub trait BrowserSession: Send {
	/// Navigates the page and waits for it to finish loading.
	async fn open(&mut self, url: &str) -> Result<()>;

	/// Single lookup; the first matching alternative wins.
	///
	/// A page caught between documents yields [`FetchError::Transient`].
	async fn query(&mut self, locator: &Locator) -> Result<Option<ElementHandle>>;

	/// Clears the element's value, then enters `text`.
	async fn type_into(&mut self, element: &ElementHandle, text: &str) -> Result<()>;

	async fn click_element(&mut self, element: &ElementHandle) -> Result<()>;

	/// Runs `script` as a function body with `arguments[i]` bound to `args[i]`.
	async fn execute_script(&mut self, script: &str, args: &[&ElementHandle]) -> Result<Value>;

	/// Releases the browser. Idempotent; failures are logged, never returned.
	async fn close(&mut self);

	async fn find_element(&mut self, locator: &Locator, timeout: Duration) -> Result<ElementHandle> {
		let deadline = Instant::now() + timeout;
		loop {
			match self.query(locator).await {
				Ok(Some(element)) => return Ok(element),
				Ok(None) => {}
				Err(FetchError::Transient(reason)) => trace!(target = "orderpull", %locator, %reason, "lookup retried"),
				Err(e) => return Err(e),
			}
			let now = Instant::now();
			if now >= deadline {
				return Err(FetchError::ElementNotFound {
					locator: locator.to_string(),
					ms: timeout.as_millis() as u64,
				});
			}
			tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
		}
	}

	async fn find_now(&mut self, locator: &Locator) -> Result<ElementHandle> {
		match self.query(locator).await {
			Ok(Some(element)) => Ok(element),
			Ok(None) | Err(FetchError::Transient(_)) => Err(FetchError::ElementNotFound {
				locator: locator.to_string(),
				ms: 0,
			}),
			Err(e) => Err(e),
		}
	}

	/// Waits until a lookup settles on "absent".
	///
	/// A transient failure means the page is mid-navigation and may bring the
	/// element back, so it counts as still present.
	async fn wait_for_disappearance(&mut self, locator: &Locator, timeout: Duration) -> Result<()> {
		let deadline = Instant::now() + timeout;
		loop {
			match self.query(locator).await {
				Ok(None) => return Ok(()),
				Ok(Some(_)) => {}
				Err(FetchError::Transient(reason)) => trace!(target = "orderpull", %locator, %reason, "page changing; still waiting"),
				Err(e) => return Err(e),
			}
			let now = Instant::now();
			if now >= deadline {
				return Err(FetchError::Timeout {
					condition: format!("{locator} to disappear"),
					ms: timeout.as_millis() as u64,
				});
			}
			tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
		}
	}

	async fn send_text(&mut self, locator: &Locator, text: &str) -> Result<()> {
		let element = self.find_now(locator).await?;
		self.type_into(&element, text).await
	}

	async fn click(&mut self, locator: &Locator) -> Result<()> {
		let element = self.find_now(locator).await?;
		self.click_element(&element).await
	}
}

/// Creates one session per run.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
	async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}
