use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::engine::sequence::ReconcileReport;
use crate::engine::sweep::{sweep_once, SweepReport};
use crate::models::assignment::{ScheduledAssignment, ScheduledStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scheduled-assignments", get(list_scheduled))
        .route("/scheduled-assignments/sweep", post(run_sweep))
        .route("/order-numbers/next", get(preview_order_number))
        .route("/order-numbers", post(issue_order_number))
        .route("/order-numbers/reconcile", post(reconcile_order_numbers))
}

#[derive(Deserialize)]
pub struct ScheduledQuery {
    #[serde(default)]
    pub status: Option<ScheduledStatus>,
}

#[derive(Serialize)]
pub struct OrderNumberResponse {
    pub id: String,
}

async fn list_scheduled(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScheduledQuery>,
) -> Json<Vec<ScheduledAssignment>> {
    let entries = state
        .assignments
        .scheduled_assignments()
        .into_iter()
        .filter(|entry| query.status.is_none_or(|status| entry.status == status))
        .collect();

    Json(entries)
}

async fn run_sweep(State(state): State<Arc<AppState>>) -> Json<SweepReport> {
    Json(sweep_once(&state.assignments, Utc::now()).await)
}

async fn preview_order_number(State(state): State<Arc<AppState>>) -> Json<OrderNumberResponse> {
    Json(OrderNumberResponse {
        id: state.sequence.preview_next_order_number(),
    })
}

async fn issue_order_number(State(state): State<Arc<AppState>>) -> Json<OrderNumberResponse> {
    Json(OrderNumberResponse {
        id: state.sequence.next_order_number().await,
    })
}

async fn reconcile_order_numbers(State(state): State<Arc<AppState>>) -> Json<ReconcileReport> {
    Json(state.orders.reconcile_order_numbers().await)
}
