use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::api::rest::actor;
use crate::engine::compatibility::Compatibility;
use crate::engine::orders::NewOrder;
use crate::error::{AppError, AssignmentError};
use crate::models::assignment::ScheduledAssignment;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/duplicate", post(duplicate_order))
        .route("/orders/:id/status", patch(update_order_status))
        .route("/orders/:id/assign", post(assign_driver))
        .route("/orders/:id/reassign", post(reassign_driver))
        .route("/orders/:id/driver", delete(unassign_driver))
        .route("/orders/:id/schedule", post(schedule_driver))
        .route("/orders/:id/compatibility/:driver_id", get(compatibility))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub driver_id: String,
}

#[derive(Deserialize)]
pub struct ScheduleRequest {
    pub driver_id: String,
    pub execute_at: String,
}

#[derive(Serialize)]
pub struct OrderOutcome {
    pub success: bool,
    pub order: Order,
}

#[derive(Serialize)]
pub struct ScheduleOutcome {
    pub success: bool,
    pub scheduled: ScheduledAssignment,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<NewOrder>,
) -> Result<Json<Order>, AppError> {
    let order = state.orders.create_order(payload, &actor(&headers)).await?;
    Ok(Json(order))
}

async fn list_orders(State(state): State<Arc<AppState>>) -> Json<Vec<Order>> {
    Json(state.orders.list())
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    Ok(Json(order))
}

async fn duplicate_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = state.orders.duplicate_order(&id, &actor(&headers)).await?;
    Ok(Json(order))
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let status = OrderStatus::normalize(&payload.status)
        .ok_or_else(|| AppError::BadRequest(format!("unknown order status '{}'", payload.status)))?;

    let order = state
        .orders
        .set_order_status(&id, status, &actor(&headers))
        .await?;
    Ok(Json(order))
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<OrderOutcome>, AssignmentError> {
    let order = state
        .assignments
        .assign_driver(&id, &payload.driver_id, &actor(&headers))
        .await?;

    Ok(Json(OrderOutcome {
        success: true,
        order,
    }))
}

async fn reassign_driver(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<OrderOutcome>, AssignmentError> {
    let order = state
        .assignments
        .reassign_driver(&id, &payload.driver_id, &actor(&headers))
        .await?;

    Ok(Json(OrderOutcome {
        success: true,
        order,
    }))
}

async fn unassign_driver(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderOutcome>, AssignmentError> {
    let order = state
        .assignments
        .unassign_driver(&id, &actor(&headers))
        .await?;

    Ok(Json(OrderOutcome {
        success: true,
        order,
    }))
}

async fn schedule_driver(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<ScheduleRequest>,
) -> Result<Json<ScheduleOutcome>, AssignmentError> {
    let scheduled = state
        .assignments
        .schedule_driver_assignment(&id, &payload.driver_id, &payload.execute_at, &actor(&headers))
        .await?;

    Ok(Json(ScheduleOutcome {
        success: true,
        scheduled,
    }))
}

async fn compatibility(
    State(state): State<Arc<AppState>>,
    Path((id, driver_id)): Path<(String, String)>,
) -> Result<Json<Compatibility>, AssignmentError> {
    Ok(Json(state.assignments.compatibility(&id, &driver_id)?))
}
