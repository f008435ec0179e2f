//! DevTools HTTP endpoint probing.

use std::time::Duration;

use orderpull_protocol::VersionInfo;
use tracing::trace;

use crate::error::{Result, RuntimeError};

/// Loopback spellings tried in order; browsers differ in which one they bind.
const LOOPBACK_HOSTS: [&str; 3] = ["127.0.0.1", "localhost", "[::1]"];

const REQUEST_TIMEOUT: Duration = Duration::from_millis(400);

/// The `/json/version` endpoint of a browser listening on `port`.
///
/// Holds one HTTP client for the whole launch wait instead of one per attempt.
pub struct VersionEndpoint {
	client: reqwest::Client,
	port: u16,
}

impl VersionEndpoint {
	pub fn new(port: u16) -> Result<Self> {
		let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().map_err(|e| RuntimeError::Probe {
			port,
			message: format!("failed to create HTTP client: {e}"),
		})?;
		Ok(Self { client, port })
	}

	/// Fetches version metadata from the first loopback host that answers.
	///
	/// A host that answers with a body that isn't version metadata fails at once.
	pub async fn fetch(&self) -> Result<VersionInfo> {
		let mut unreachable = Vec::with_capacity(LOOPBACK_HOSTS.len());
		for host in LOOPBACK_HOSTS {
			let url = format!("http://{host}:{}/json/version", self.port);
			match self.client.get(&url).send().await.and_then(|r| r.error_for_status()) {
				Ok(response) => {
					return response.json::<VersionInfo>().await.map_err(|e| RuntimeError::Probe {
						port: self.port,
						message: format!("invalid /json/version response from {host}: {e}"),
					});
				}
				Err(e) => {
					trace!(target = "orderpull", %url, error = %e, "version endpoint not answering");
					unreachable.push(format!("{host}: {e}"));
				}
			}
		}
		Err(RuntimeError::Probe {
			port: self.port,
			message: unreachable.join("; "),
		})
	}
}
