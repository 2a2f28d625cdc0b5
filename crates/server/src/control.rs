//! Control plane client: subscribes to the lifecycle event stream over
//! WebSocket and feeds it to the collector through the `EventSource`
//! boundary.

use async_trait::async_trait;
use futures::StreamExt;
use gridgate_protocol::BrowserEvent;
use gridgate_runtime::{Error, EventSource, Subscription};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

type ControlSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket-backed event source for the control plane's event API.
///
/// Events are JSON text frames, one `BrowserEvent` per frame, delivered in
/// order. The reader task stops as soon as the subscription is dropped.
pub struct ControlPlane {
	base_url: String,
}

impl ControlPlane {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
		}
	}

	fn events_url(&self, group: &str) -> String {
		format!(
			"{}/api/v1/events?group={group}",
			self.base_url.trim_end_matches('/')
		)
	}
}

#[async_trait]
impl EventSource for ControlPlane {
	async fn subscribe(&self, group: &str) -> gridgate_runtime::Result<Subscription> {
		let url = self.events_url(group);
		let (socket, _) = connect_async(url.as_str())
			.await
			.map_err(|err| Error::StreamUnavailable(format!("{url}: {err}")))?;

		debug!(url, "subscribed to control plane events");

		let (events_tx, events) = mpsc::channel(64);
		let (errors_tx, errors) = mpsc::channel(1);
		tokio::spawn(read_loop(socket, events_tx, errors_tx));

		Ok(Subscription { events, errors })
	}
}

/// Pumps decoded events into the subscription until the stream ends, a
/// transport error occurs, or the subscriber goes away.
async fn read_loop(
	mut socket: ControlSocket,
	events: mpsc::Sender<BrowserEvent>,
	errors: mpsc::Sender<String>,
) {
	loop {
		let message = tokio::select! {
			// Subscriber dropped; release the stream promptly instead of
			// waiting for the next frame.
			_ = events.closed() => return,
			message = socket.next() => match message {
				Some(message) => message,
				None => return,
			},
		};

		match message {
			Ok(Message::Text(text)) => match serde_json::from_str::<BrowserEvent>(&text) {
				Ok(event) => {
					if events.send(event).await.is_err() {
						return;
					}
				}
				Err(err) => {
					warn!(error = %err, "discarding malformed control plane event");
				}
			},
			// Server-initiated close: ends the events channel, which the
			// collector reports as an unexpected closure.
			Ok(Message::Close(_)) => return,
			Ok(_) => {}
			Err(err) => {
				let _ = errors.send(err.to_string()).await;
				return;
			}
		}
	}
}
