use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::availability::Availability;
use crate::error::AppError;
use crate::models::driver::{Driver, DriverLifecycle, DriverStatus};
use crate::models::order::TimeWindow;
use crate::state::AppState;
use crate::store::{keys, StoreExt};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id/status", patch(update_driver_status))
        .route("/drivers/:id/availability", get(driver_availability))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub vehicle_capacity: String,
    #[serde(default)]
    pub vehicle: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<DriverStatus>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: Option<DriverStatus>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub lifecycle_status: Option<DriverLifecycle>,
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let id = match payload.id.map(|id| id.trim().to_string()) {
        Some(id) if !id.is_empty() => id,
        _ => format!("DRV-{}", Uuid::new_v4().simple()),
    };

    let _guard = state.writes.lock().await;
    let mut drivers: Vec<Driver> = state.store.get_list(keys::DRIVERS);
    if drivers.iter().any(|driver| driver.id == id) {
        return Err(AppError::Conflict(format!("driver {id} already exists")));
    }

    let driver = Driver {
        id,
        name: payload.name.trim().to_string(),
        status: payload.status.unwrap_or(DriverStatus::Available),
        active: true,
        lifecycle_status: DriverLifecycle::Active,
        vehicle_capacity: payload.vehicle_capacity,
        vehicle: payload.vehicle,
        phone: payload.phone,
        created_at: Utc::now(),
    };

    drivers.push(driver.clone());
    state.store.put(keys::DRIVERS, &drivers);
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    Json(state.assignments.drivers())
}

async fn update_driver_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Driver>, AppError> {
    let _guard = state.writes.lock().await;
    let mut drivers: Vec<Driver> = state.store.get_list(keys::DRIVERS);
    let driver = drivers
        .iter_mut()
        .find(|driver| driver.id == id)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))?;

    if let Some(status) = payload.status {
        driver.status = status;
    }
    if let Some(active) = payload.active {
        driver.active = active;
    }
    if let Some(lifecycle) = payload.lifecycle_status {
        driver.lifecycle_status = lifecycle;
    }
    let updated = driver.clone();

    state.store.put(keys::DRIVERS, &drivers);
    Ok(Json(updated))
}

async fn driver_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>, AppError> {
    if !state.assignments.drivers().iter().any(|driver| driver.id == id) {
        return Err(AppError::NotFound(format!("driver {} not found", id)));
    }
    if query.start >= query.end {
        return Err(AppError::BadRequest("start must be before end".to_string()));
    }

    let window = TimeWindow::new(query.start, query.end);
    Ok(Json(state.assignments.availability(&id, &window)))
}
