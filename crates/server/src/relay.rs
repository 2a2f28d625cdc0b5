//! Duplex VNC relay between a web client and the backend browser instance.
//!
//! The relay resolves the session in the registry, dials the instance's VNC
//! sidecar, and runs two pumps (client→backend, backend→client) until either
//! side terminates. The first terminal outcome wins; the other pump is torn
//! down so both connections close. A normal close handshake or plain EOF
//! ends the relay silently; anything else is reported as an error.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use gridgate_protocol::Session;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{self, protocol::Message as BackendMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{error, info, warn};

use crate::service::AppState;

/// Versioned path template the VNC sidecar serves inside each backend
/// instance. Must match what the sidecar exposes.
const VNC_PATH: &str = "gridgate/v1/vnc";

/// Close status sent by peers that vanish without a status code.
const NO_STATUS: u16 = 1005;

type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type RelayOutcome = Result<(), RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
	#[error("backend dial failed: {url}")]
	Dial {
		url: String,
		#[source]
		source: tungstenite::Error,
	},

	#[error("client websocket error: {0}")]
	Client(axum::Error),

	#[error("backend websocket error: {0}")]
	Backend(tungstenite::Error),

	#[error("peer closed with unexpected status {0}")]
	UnexpectedClose(u16),
}

pub async fn vnc_upgrade(
	Path(browser_id): Path<String>,
	State(state): State<AppState>,
	ws: WebSocketUpgrade,
) -> Response {
	let Some(session) = state.store.get(&browser_id) else {
		warn!(browser_id, "unknown browserId");
		return (StatusCode::BAD_REQUEST, "invalid session").into_response();
	};

	let vnc_port = state.vnc_port;
	ws.on_upgrade(move |client| async move {
		match run_relay(client, &session, vnc_port).await {
			Ok(()) => {
				info!(browser_id = %session.browser_id, "vnc connection closed");
			}
			Err(err) => {
				error!(
					browser_id = %session.browser_id,
					error = %err,
					"vnc connection terminated with error",
				);
			}
		}
	})
}

fn backend_url(session: &Session, port: u16) -> String {
	// Bracket IPv6 literals; IPv4 passes through untouched.
	let host = if session.address.contains(':') {
		format!("[{}]", session.address)
	} else {
		session.address.clone()
	};
	format!("ws://{host}:{port}/{VNC_PATH}/{}", session.session_id)
}

async fn run_relay(mut client: WebSocket, session: &Session, vnc_port: u16) -> RelayOutcome {
	let url = backend_url(session, vnc_port);

	let backend = match connect_async(url.as_str()).await {
		Ok((socket, _)) => socket,
		Err(source) => {
			// The client upgrade already succeeded; close it before bailing.
			let _ = client.send(Message::Close(None)).await;
			return Err(RelayError::Dial { url, source });
		}
	};

	info!(browser_id = %session.browser_id, "vnc connection established");

	let (backend_tx, backend_rx) = backend.split();
	let (client_tx, client_rx) = client.split();

	// Single-slot result channel: the first pump to finish decides the
	// outcome for the whole relay session.
	let (done_tx, mut done_rx) = mpsc::channel::<RelayOutcome>(1);

	let downstream = tokio::spawn(pump_client_to_backend(client_rx, backend_tx, done_tx.clone()));
	let upstream = tokio::spawn(pump_backend_to_client(backend_rx, client_tx, done_tx));

	let outcome = done_rx.recv().await.unwrap_or(Ok(()));

	// Aborting the surviving pump drops its socket halves, which closes the
	// underlying connections and unblocks the peer.
	downstream.abort();
	upstream.abort();

	outcome
}

async fn pump_client_to_backend(
	mut client_rx: futures::stream::SplitStream<WebSocket>,
	mut backend_tx: futures::stream::SplitSink<BackendSocket, BackendMessage>,
	done: mpsc::Sender<RelayOutcome>,
) {
	loop {
		let forwarded = match client_rx.next().await {
			None => {
				// EOF from the client transport: graceful.
				let _ = done.try_send(Ok(()));
				return;
			}
			Some(Err(err)) => {
				let _ = done.try_send(Err(RelayError::Client(err)));
				return;
			}
			Some(Ok(Message::Text(text))) => BackendMessage::Text(text.as_str().to_owned()),
			Some(Ok(Message::Binary(data))) => BackendMessage::Binary(data.to_vec()),
			Some(Ok(Message::Ping(data))) => BackendMessage::Ping(data.to_vec()),
			Some(Ok(Message::Pong(data))) => BackendMessage::Pong(data.to_vec()),
			Some(Ok(Message::Close(frame))) => {
				let _ = done.try_send(classify_close(frame.map(|f| f.code)));
				return;
			}
		};

		if let Err(err) = backend_tx.send(forwarded).await {
			let outcome = if is_graceful_disconnect(&err) {
				Ok(())
			} else {
				Err(RelayError::Backend(err))
			};
			let _ = done.try_send(outcome);
			return;
		}
	}
}

async fn pump_backend_to_client(
	mut backend_rx: futures::stream::SplitStream<BackendSocket>,
	mut client_tx: futures::stream::SplitSink<WebSocket, Message>,
	done: mpsc::Sender<RelayOutcome>,
) {
	loop {
		let forwarded = match backend_rx.next().await {
			None => {
				let _ = done.try_send(Ok(()));
				return;
			}
			Some(Err(err)) => {
				let outcome = if is_graceful_disconnect(&err) {
					Ok(())
				} else {
					Err(RelayError::Backend(err))
				};
				let _ = done.try_send(outcome);
				return;
			}
			Some(Ok(BackendMessage::Text(text))) => Message::Text(text.into()),
			Some(Ok(BackendMessage::Binary(data))) => Message::Binary(data.into()),
			Some(Ok(BackendMessage::Ping(data))) => Message::Ping(data.into()),
			Some(Ok(BackendMessage::Pong(data))) => Message::Pong(data.into()),
			Some(Ok(BackendMessage::Close(frame))) => {
				let _ = done.try_send(classify_close(frame.map(|f| u16::from(f.code))));
				return;
			}
			// Raw frames only surface on raw-mode sockets; never here.
			Some(Ok(BackendMessage::Frame(_))) => continue,
		};

		if let Err(err) = client_tx.send(forwarded).await {
			let _ = done.try_send(Err(RelayError::Client(err)));
			return;
		}
	}
}

/// A close handshake counts as graceful only for the normal, going-away,
/// and no-status codes. Everything else is an abnormal termination.
fn classify_close(code: Option<u16>) -> RelayOutcome {
	match code {
		None => Ok(()),
		Some(close_code::NORMAL | close_code::AWAY | NO_STATUS) => Ok(()),
		Some(code) => Err(RelayError::UnexpectedClose(code)),
	}
}

/// Transport-level errors that mean the peer simply went away.
fn is_graceful_disconnect(err: &tungstenite::Error) -> bool {
	match err {
		tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
		tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
		tungstenite::Error::Io(err) => err.kind() == std::io::ErrorKind::UnexpectedEof,
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use gridgate_protocol::Phase;

	use super::*;

	fn session(address: &str) -> Session {
		Session {
			session_id: "00000000-0000-0000-0000-ffff0a000001".into(),
			browser_id: "b1".into(),
			address: address.into(),
			browser_name: "chrome".into(),
			browser_version: "123".into(),
			start_time: None,
			phase: Phase::Running,
		}
	}

	#[test]
	fn backend_url_embeds_port_path_and_session_id() {
		let url = backend_url(&session("10.0.0.1"), 4445);
		assert_eq!(
			url,
			"ws://10.0.0.1:4445/gridgate/v1/vnc/00000000-0000-0000-0000-ffff0a000001"
		);
	}

	#[test]
	fn backend_url_brackets_ipv6_hosts() {
		let url = backend_url(&session("fe80::1"), 4445);
		assert!(url.starts_with("ws://[fe80::1]:4445/"));
	}

	#[test]
	fn normal_close_codes_are_graceful() {
		assert!(classify_close(None).is_ok());
		assert!(classify_close(Some(close_code::NORMAL)).is_ok());
		assert!(classify_close(Some(close_code::AWAY)).is_ok());
		assert!(classify_close(Some(NO_STATUS)).is_ok());
	}

	#[test]
	fn other_close_codes_are_abnormal() {
		let err = classify_close(Some(close_code::PROTOCOL)).unwrap_err();
		assert!(matches!(err, RelayError::UnexpectedClose(code) if code == close_code::PROTOCOL));
		assert!(classify_close(Some(close_code::ABNORMAL)).is_err());
	}

	#[test]
	fn eof_and_closed_connection_are_graceful() {
		assert!(is_graceful_disconnect(&tungstenite::Error::ConnectionClosed));
		assert!(is_graceful_disconnect(&tungstenite::Error::AlreadyClosed));
		assert!(is_graceful_disconnect(&tungstenite::Error::Io(
			std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof")
		)));
		assert!(is_graceful_disconnect(&tungstenite::Error::Protocol(
			ProtocolError::ResetWithoutClosingHandshake
		)));
	}

	#[test]
	fn other_transport_errors_are_abnormal() {
		assert!(!is_graceful_disconnect(&tungstenite::Error::Io(
			std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused")
		)));
		assert!(!is_graceful_disconnect(&tungstenite::Error::Utf8));
	}
}
