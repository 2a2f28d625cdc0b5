//! Query handlers over the session registry, plus router assembly.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use gridgate_protocol::Session;
use gridgate_runtime::SessionStore;
use serde_json::json;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

use crate::relay;

/// Shared state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
	pub store: Arc<SessionStore>,
	/// Port the VNC sidecar listens on inside each backend instance.
	pub vnc_port: u16,
	pub vnc_password: String,
}

pub fn router(state: AppState, static_path: Option<PathBuf>) -> Router {
	let browsers = Router::new()
		.route("/", get(list_browsers))
		.route("/{browser_id}", get(get_browser))
		.route("/{browser_id}/vnc", get(relay::vnc_upgrade))
		.route("/{browser_id}/vnc/settings", get(vnc_settings));

	let mut app = Router::new()
		.nest("/api/v1/browsers", browsers)
		.route("/health", get(health))
		.with_state(state);

	if let Some(dir) = static_path {
		let index = ServeFile::new(dir.join("index.html"));
		app = app
			.route("/", get(|| async { Redirect::to("/ui/") }))
			.nest_service("/ui", ServeDir::new(&dir).fallback(index));
	}

	app
}

async fn list_browsers(State(state): State<AppState>) -> Json<Vec<Session>> {
	let sessions = state.store.list();
	info!(count = sessions.len(), "session list retrieved");
	Json(sessions)
}

async fn get_browser(
	Path(browser_id): Path<String>,
	State(state): State<AppState>,
) -> Response {
	match state.store.get(&browser_id) {
		Some(session) => {
			info!(browser_id, "session retrieved");
			Json(session).into_response()
		}
		None => {
			warn!(browser_id, "unknown browserId");
			(StatusCode::NOT_FOUND, "session not found").into_response()
		}
	}
}

async fn vnc_settings(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(json!({ "password": state.vnc_password }))
}

async fn health() -> Json<serde_json::Value> {
	Json(json!({ "status": "ok" }))
}
