//! Scripted DevTools endpoint for driving pages without a browser.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use crate::connection::Connection;

/// Every request the endpoint received, in arrival order.
pub type Requests = Arc<Mutex<Vec<Value>>>;

/// Answer to one request; `Err` goes back as a protocol error with that message.
pub type Reply = std::result::Result<Value, &'static str>;

/// Serves one DevTools socket answering each request with `reply(method, params)`.
///
/// Requests are recorded before their answer goes out, so a caller that got a
/// response always sees its request in the log.
pub async fn devtools<F>(reply: F) -> (Arc<Connection>, Requests)
where
	F: Fn(&str, &Value) -> Reply + Send + 'static,
{
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let requests = Requests::default();
	let seen = Arc::clone(&requests);
	tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
		let (mut tx, mut rx) = ws.split();
		while let Some(Ok(frame)) = rx.next().await {
			let Message::Text(text) = frame else { continue };
			let request: Value = serde_json::from_str(&text).unwrap();
			let response = match reply(request["method"].as_str().unwrap_or_default(), &request["params"]) {
				Ok(result) => json!({ "id": request["id"], "result": result }),
				Err(message) => json!({ "id": request["id"], "error": { "code": -32000, "message": message } }),
			};
			seen.lock().push(request);
			if tx.send(Message::Text(response.to_string().into())).await.is_err() {
				break;
			}
		}
	});
	(Connection::connect(&format!("ws://{addr}")).await.unwrap(), requests)
}

/// Answers tab attachment as session `S-1`; everything else goes to `rest`.
pub fn tab<F>(rest: F) -> impl Fn(&str, &Value) -> Reply + Send + 'static
where
	F: Fn(&str, &Value) -> Reply + Send + 'static,
{
	move |method, params| match method {
		"Target.attachToTarget" => Ok(json!({ "sessionId": "S-1" })),
		"Page.enable" | "Runtime.enable" => Ok(json!({})),
		_ => rest(method, params),
	}
}

pub fn methods(requests: &Requests) -> Vec<String> {
	requests.lock().iter().map(|r| r["method"].as_str().unwrap_or_default().to_string()).collect()
}
