use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod forwarder;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;

use crate::handlers::{health_handler, metrics_handler, submit_booking_handler};
use crate::state::AppState;

pub const SUBMIT_BOOKING_PATH: &str = "/api/submit-booking";

// creating the router with routes
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(SUBMIT_BOOKING_PATH, post(submit_booking_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
