pub mod activity;
pub mod drivers;
pub mod orders;
pub mod scheduling;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Header carrying the operator identity written into audit entries.
pub const ACTOR_HEADER: &str = "x-admin-id";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(orders::router())
        .merge(drivers::router())
        .merge(scheduling::router())
        .merge(activity::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub(crate) fn actor(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("admin")
        .to_string()
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    persistent_store: bool,
    orders: usize,
    drivers: usize,
    pending_scheduled: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pending_scheduled = state
        .assignments
        .scheduled_assignments()
        .iter()
        .filter(|entry| entry.is_pending())
        .count();

    Json(HealthResponse {
        status: "ok",
        persistent_store: state.store.is_persistent(),
        orders: state.orders.list().len(),
        drivers: state.assignments.drivers().len(),
        pending_scheduled,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
