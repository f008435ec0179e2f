//! Process and port lifecycle helpers for launched browsers.

use std::process::Child;
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// Asks the OS for an unused localhost port for the remote-debugging endpoint.
pub fn free_port() -> Result<u16> {
	let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
	Ok(listener.local_addr()?.port())
}

/// Waits up to `grace` for `child` to exit on its own, then kills it.
///
/// Returns `true` if the process had to be killed.
pub async fn reap_or_kill(child: &mut Child, grace: Duration) -> bool {
	let deadline = tokio::time::Instant::now() + grace;
	loop {
		match child.try_wait() {
			Ok(Some(status)) => {
				debug!(target = "orderpull", pid = child.id(), %status, "browser process exited");
				return false;
			}
			Ok(None) if tokio::time::Instant::now() < deadline => {
				tokio::time::sleep(Duration::from_millis(100)).await;
			}
			_ => break,
		}
	}

	kill_now(child);
	true
}

/// Kills `child` and collects its exit status, ignoring failures.
pub fn kill_now(child: &mut Child) {
	if matches!(child.try_wait(), Ok(Some(_))) {
		return;
	}
	debug!(target = "orderpull", pid = child.id(), "killing browser process");
	if let Err(e) = child.kill() {
		debug!(target = "orderpull", pid = child.id(), error = %e, "kill failed");
	}
	let _ = child.wait();
}
