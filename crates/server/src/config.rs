use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Gateway exposing live browser-automation sessions and VNC relay.
#[derive(Debug, Parser)]
#[command(name = "gridgate", version, about)]
pub struct Config {
	/// Address the HTTP server listens on.
	#[arg(long, env = "GRIDGATE_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
	pub listen_addr: SocketAddr,

	/// Base WebSocket URL of the control plane event API.
	#[arg(long, env = "GRIDGATE_CONTROL_URL", default_value = "ws://browser-control:8080")]
	pub control_url: String,

	/// Group whose browser instances are mirrored into the registry.
	#[arg(long, env = "GRIDGATE_GROUP", default_value = "default")]
	pub group: String,

	/// Port the VNC sidecar listens on inside each backend instance.
	#[arg(long, env = "GRIDGATE_VNC_PORT", default_value_t = 4445)]
	pub vnc_port: u16,

	/// Password handed to web clients for the VNC handshake.
	#[arg(long, env = "GRIDGATE_VNC_PASSWORD", default_value = "secret")]
	pub vnc_password: String,

	/// Directory with the built web UI, served under /ui.
	#[arg(long, env = "GRIDGATE_STATIC_PATH")]
	pub static_path: Option<PathBuf>,

	/// Increase log verbosity (-v, -vv).
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,
}
