use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gridgate_runtime::{Collector, SessionStore};
use gridgate_server::config::Config;
use gridgate_server::control::ControlPlane;
use gridgate_server::logging;
use gridgate_server::service::{self, AppState};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let config = Config::parse();
	logging::init_logging(config.verbose);

	// The registry is constructed once and threaded through both its writer
	// (the collector) and its readers (the HTTP layer).
	let store = Arc::new(SessionStore::new());
	let (shutdown_tx, shutdown_rx) = watch::channel(false);

	let source = ControlPlane::new(config.control_url.clone());
	let collector = Collector::new(source, config.group.clone(), store.clone());
	let mut collector_task = tokio::spawn(collector.run(shutdown_rx));
	info!(
		control_url = %config.control_url,
		group = %config.group,
		"event collector started",
	);

	let state = AppState {
		store,
		vnc_port: config.vnc_port,
		vnc_password: config.vnc_password.clone(),
	};
	let app = service::router(state, config.static_path.clone());

	let listener = TcpListener::bind(config.listen_addr)
		.await
		.with_context(|| format!("failed to bind {}", config.listen_addr))?;
	info!(addr = %config.listen_addr, "gateway listening");

	tokio::select! {
		result = axum::serve(listener, app.into_make_service()).into_future() => {
			result.context("http server error")?;
		}
		result = &mut collector_task => {
			match result {
				Ok(Err(err)) if !err.is_canceled() => {
					error!(error = %err, "collector failed");
					return Err(err.into());
				}
				Ok(_) => info!("collector stopped"),
				Err(err) => return Err(err).context("collector task panicked"),
			}
		}
		_ = tokio::signal::ctrl_c() => {
			info!("shutdown signal received");
			let _ = shutdown_tx.send(true);
		}
	}

	Ok(())
}
