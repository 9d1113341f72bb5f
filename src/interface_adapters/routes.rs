use crate::interface_adapters::net::ws_handler;
use crate::interface_adapters::state::AppState;
use axum::{Router, routing::get};
use std::sync::Arc;

// Every client connects to the root path; the first frame picks its channel.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new().route("/", get(ws_handler)).with_state(state)
}
