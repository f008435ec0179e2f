//! CDP connection over the browser's remote-debugging WebSocket.
//!
//! Handles request/response correlation on top of the socket:
//! - Generates sequential request IDs
//! - Parks a oneshot sender per in-flight request
//! - Routes responses back to their caller by ID
//! - Logs and drops events (the export flow polls instead of subscribing)
//!
//! A background reader task owns the receiving half of the socket. When the
//! socket closes every pending request fails with [`RuntimeError::ChannelClosed`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use orderpull_protocol::{Message as CdpMessage, Request};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::{Result, RuntimeError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// Default upper bound for a single CDP command round trip.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC style connection to a browser's DevTools endpoint.
///
/// Thread-safe; share it behind an `Arc` between the browser and its pages.
pub struct Connection {
	last_id: AtomicU64,
	pending: Pending,
	sink: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
	reader: JoinHandle<()>,
	command_timeout: Duration,
}

impl Connection {
	/// Connects to `ws_url` (the `webSocketDebuggerUrl` of `/json/version`).
	pub async fn connect(ws_url: &str) -> Result<Arc<Self>> {
		Self::connect_with_timeout(ws_url, DEFAULT_COMMAND_TIMEOUT).await
	}

	pub async fn connect_with_timeout(ws_url: &str, command_timeout: Duration) -> Result<Arc<Self>> {
		let (ws, _) = tokio_tungstenite::connect_async(ws_url).await?;
		debug!(target = "orderpull", url = %ws_url, "devtools socket connected");
		let (sink, stream) = ws.split();

		let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
		let reader = tokio::spawn(read_loop(stream, Arc::clone(&pending)));

		Ok(Arc::new(Self {
			last_id: AtomicU64::new(1),
			pending,
			sink: tokio::sync::Mutex::new(sink),
			reader,
			command_timeout,
		}))
	}

	/// Sends a browser-level command.
	pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
		self.send_to(None, method, params).await
	}

	/// Sends a command, addressed to the attached target `session_id` when given.
	pub async fn send_to(&self, session_id: Option<&str>, method: &str, params: Value) -> Result<Value> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);

		let request = Request {
			id,
			method: method.to_string(),
			params,
			session_id: session_id.map(str::to_string),
		};
		let text = serde_json::to_string(&request)?;
		trace!(target = "orderpull", id, %method, "cdp send");

		if let Err(e) = self.sink.lock().await.send(Message::Text(text.into())).await {
			self.pending.lock().remove(&id);
			return Err(e.into());
		}

		match tokio::time::timeout(self.command_timeout, rx).await {
			Ok(Ok(result)) => result.map_err(|err| match err {
				RuntimeError::Protocol { error, .. } => RuntimeError::Protocol {
					method: method.to_string(),
					error,
				},
				other => other,
			}),
			Ok(Err(_)) => Err(RuntimeError::ChannelClosed),
			Err(_) => {
				self.pending.lock().remove(&id);
				Err(RuntimeError::Timeout {
					method: method.to_string(),
					ms: self.command_timeout.as_millis() as u64,
				})
			}
		}
	}

	/// Number of requests still waiting for a response.
	pub fn in_flight(&self) -> usize {
		self.pending.lock().len()
	}

	/// Closes the socket. Pending requests resolve with [`RuntimeError::ChannelClosed`].
	pub async fn close(&self) {
		if let Err(e) = self.sink.lock().await.close().await {
			debug!(target = "orderpull", error = %e, "devtools socket close failed");
		}
	}
}

impl Drop for Connection {
	fn drop(&mut self) {
		self.reader.abort();
	}
}

async fn read_loop(mut stream: SplitStream<WsStream>, pending: Pending) {
	while let Some(frame) = stream.next().await {
		let text = match frame {
			Ok(Message::Text(text)) => text,
			Ok(Message::Close(_)) => break,
			Ok(_) => continue,
			Err(e) => {
				debug!(target = "orderpull", error = %e, "devtools socket read failed");
				break;
			}
		};

		match serde_json::from_str::<CdpMessage>(&text) {
			Ok(CdpMessage::Response(response)) => {
				let Some(tx) = pending.lock().remove(&response.id) else {
					trace!(target = "orderpull", id = response.id, "response for unknown request");
					continue;
				};
				let result = match response.error {
					Some(error) => Err(RuntimeError::Protocol { method: String::new(), error }),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				let _ = tx.send(result);
			}
			Ok(CdpMessage::Event(event)) => {
				trace!(target = "orderpull", method = %event.method, "cdp event");
			}
			Err(e) => warn!(target = "orderpull", error = %e, "unparseable devtools message"),
		}
	}

	// Dropping the senders wakes every waiter with ChannelClosed.
	pending.lock().clear();
	debug!(target = "orderpull", "devtools reader stopped");
}
