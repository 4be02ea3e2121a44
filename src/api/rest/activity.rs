use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::activity::{ActivityEntry, Notification};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/activity", get(list_activity))
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", patch(mark_notification_read))
}

#[derive(Deserialize)]
pub struct ActivityQuery {
    #[serde(default)]
    pub order_id: Option<String>,
}

async fn list_activity(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActivityQuery>,
) -> Json<Vec<ActivityEntry>> {
    Json(state.audit.activity(query.order_id.as_deref()))
}

async fn list_notifications(State(state): State<Arc<AppState>>) -> Json<Vec<Notification>> {
    Json(state.audit.notifications())
}

async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let _guard = state.writes.lock().await;
    let notification = state
        .audit
        .mark_read(id)
        .ok_or_else(|| AppError::NotFound(format!("notification {} not found", id)))?;

    Ok(Json(notification))
}
