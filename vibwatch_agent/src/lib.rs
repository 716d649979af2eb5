//! vibwatch_agent: serves vibration status and samples over WebSocket and
//! HTTP, fed by a scripted simulator.

pub mod detector;
pub mod http;
pub mod link;
pub mod sim;
pub mod state;
pub mod types;
pub mod ws;

use axum::{routing::get, Router};

pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/realtime/state", get(http::realtime_state))
        .route("/realtime/samples", get(http::realtime_samples))
        .route("/health", get(http::health))
        .with_state(state)
}
