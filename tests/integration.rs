use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use courier_dispatch::api::rest::router;
use courier_dispatch::models::activity::{ActivityKind, NotificationScope};
use courier_dispatch::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> axum::Router {
    router(Arc::new(AppState::in_memory()))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-admin-id", "ops-lyon")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn order_payload(id: &str) -> Value {
    json!({
        "id": id,
        "client_id": "CLI-42",
        "sector": "santé",
        "weight_kg": 50.0,
        "volume_m3": 0.5,
        "pickup_address": "12 rue de la Gare, Lyon",
        "dropoff_address": "3 place Bellecour, Lyon",
        "window": {
            "start": "2025-01-15T16:00:00Z",
            "end": "2025-01-15T17:00:00Z"
        }
    })
}

fn driver_payload(id: &str, capacity: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Chauffeur {id}"),
        "vehicle_capacity": capacity
    })
}

async fn seed(app: &axum::Router, order_id: &str, driver_id: &str, capacity: &str) {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/orders", order_payload(order_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/drivers", driver_payload(driver_id, capacity)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["persistent_store"], true);
    assert_eq!(body["orders"], 0);
    assert_eq!(body["drivers"], 0);
    assert_eq!(body["pending_scheduled"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    seed(&app, "ORD-100", "DRV-101", "800 kg").await;
    app.clone()
        .oneshot(json_request("POST", "/orders/ORD-100/assign", json!({ "driver_id": "DRV-101" })))
        .await
        .unwrap();

    let response = app.oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("assignments_total"));
    assert!(body.contains("scheduled_pending"));
}

#[tokio::test]
async fn create_driver_rejects_blank_name() {
    let app = setup();
    let response = app
        .oneshot(json_request("POST", "/drivers", json!({ "name": "  " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn duplicate_driver_id_conflicts() {
    let app = setup();
    let first = app
        .clone()
        .oneshot(json_request("POST", "/drivers", driver_payload("DRV-101", "800 kg")))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(json_request("POST", "/drivers", driver_payload("DRV-101", "1 t")))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn orders_without_id_receive_sequential_numbers() {
    let app = setup();
    let mut payload = order_payload("unused");
    payload.as_object_mut().unwrap().remove("id");

    let first = app
        .clone()
        .oneshot(json_request("POST", "/orders", payload.clone()))
        .await
        .unwrap();
    let second = app
        .clone()
        .oneshot(json_request("POST", "/orders", payload))
        .await
        .unwrap();

    assert_eq!(body_json(first).await["id"], "ORD-001");
    assert_eq!(body_json(second).await["id"], "ORD-002");

    let list = app.oneshot(get_request("/orders")).await.unwrap();
    assert_eq!(body_json(list).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn order_with_inverted_window_is_rejected() {
    let app = setup();
    let mut payload = order_payload("ORD-100");
    payload["window"] = json!({
        "start": "2025-01-15T17:00:00Z",
        "end": "2025-01-15T16:00:00Z"
    });

    let response = app
        .oneshot(json_request("POST", "/orders", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn assign_returns_success_and_records_actor() {
    let app = setup();
    seed(&app, "ORD-100", "DRV-101", "800 kg").await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/orders/ORD-100/assign", json!({ "driver_id": "DRV-101" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["order"]["driver_id"], "DRV-101");

    let activity = app
        .oneshot(get_request("/activity?order_id=ORD-100"))
        .await
        .unwrap();
    let entries = body_json(activity).await;
    let last = entries.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["type"], "driver_assigned");
    assert_eq!(last["by"], "ops-lyon");
}

#[tokio::test]
async fn assign_rejection_carries_the_reason() {
    let app = setup();
    seed(&app, "ORD-100", "DRV-101", "20 kg").await;

    let response = app
        .oneshot(json_request("POST", "/orders/ORD-100/assign", json!({ "driver_id": "DRV-101" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().starts_with("Capacité insuffisante"));
}

#[tokio::test]
async fn unknown_driver_is_not_found() {
    let app = setup();
    seed(&app, "ORD-100", "DRV-101", "800 kg").await;

    let response = app
        .oneshot(json_request("POST", "/orders/ORD-100/assign", json!({ "driver_id": "DRV-999" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn paused_driver_cannot_be_assigned_until_resumed() {
    let app = setup();
    seed(&app, "ORD-100", "DRV-101", "800 kg").await;

    app.clone()
        .oneshot(json_request("PATCH", "/drivers/DRV-101/status", json!({ "status": "paused" })))
        .await
        .unwrap();
    let rejected = app
        .clone()
        .oneshot(json_request("POST", "/orders/ORD-100/assign", json!({ "driver_id": "DRV-101" })))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);

    app.clone()
        .oneshot(json_request("PATCH", "/drivers/DRV-101/status", json!({ "status": "AVAILABLE" })))
        .await
        .unwrap();
    let accepted = app
        .oneshot(json_request("POST", "/orders/ORD-100/assign", json!({ "driver_id": "DRV-101" })))
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);
}

#[tokio::test]
async fn compatibility_endpoint_reports_reasons_and_warnings() {
    let app = setup();
    seed(&app, "ORD-100", "DRV-101", "800 kg").await;

    let response = app
        .oneshot(get_request("/orders/ORD-100/compatibility/DRV-101"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["assignable"], true);
    assert_eq!(body["reasons"].as_array().unwrap().len(), 0);
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unassign_clears_the_driver() {
    let app = setup();
    seed(&app, "ORD-100", "DRV-101", "800 kg").await;
    app.clone()
        .oneshot(json_request("POST", "/orders/ORD-100/assign", json!({ "driver_id": "DRV-101" })))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/orders/ORD-100/driver"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["order"]["driver_id"].is_null());

    let order = app.oneshot(get_request("/orders/ORD-100")).await.unwrap();
    assert!(body_json(order).await["driver_id"].is_null());
}

#[tokio::test]
async fn cancelled_order_is_read_only() {
    let app = setup();
    seed(&app, "ORD-100", "DRV-101", "800 kg").await;

    let cancel = app
        .clone()
        .oneshot(json_request("PATCH", "/orders/ORD-100/status", json!({ "status": "annulée" })))
        .await
        .unwrap();
    assert_eq!(cancel.status(), StatusCode::OK);
    assert_eq!(body_json(cancel).await["status"], "Annulée");

    let response = app
        .oneshot(json_request("POST", "/orders/ORD-100/assign", json!({ "driver_id": "DRV-101" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn schedule_then_sweep_promotes_due_entries() {
    let app = setup();
    seed(&app, "ORD-100", "DRV-101", "800 kg").await;

    let scheduled = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders/ORD-100/schedule",
            json!({ "driver_id": "DRV-101", "execute_at": "2025-01-15T09:00:00Z" }),
        ))
        .await
        .unwrap();
    assert_eq!(scheduled.status(), StatusCode::OK);
    let body = body_json(scheduled).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["scheduled"]["status"], "PENDING");

    let pending = app
        .clone()
        .oneshot(get_request("/scheduled-assignments?status=PENDING"))
        .await
        .unwrap();
    assert_eq!(body_json(pending).await.as_array().unwrap().len(), 1);

    let sweep = app
        .clone()
        .oneshot(empty_request("POST", "/scheduled-assignments/sweep"))
        .await
        .unwrap();
    let report = body_json(sweep).await;
    assert_eq!(report["due"], 1);
    assert_eq!(report["completed"], 1);

    let order = app.oneshot(get_request("/orders/ORD-100")).await.unwrap();
    assert_eq!(body_json(order).await["driver_id"], "DRV-101");
}

#[tokio::test]
async fn schedule_rejects_unparseable_execution_time() {
    let app = setup();
    seed(&app, "ORD-100", "DRV-101", "800 kg").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders/ORD-100/schedule",
            json!({ "driver_id": "DRV-101", "execute_at": "15/01/2025 09h" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn driver_availability_reflects_bookings() {
    let app = setup();
    seed(&app, "ORD-100", "DRV-101", "800 kg").await;
    app.clone()
        .oneshot(json_request("POST", "/orders/ORD-100/assign", json!({ "driver_id": "DRV-101" })))
        .await
        .unwrap();

    let overlapping = app
        .clone()
        .oneshot(get_request(
            "/drivers/DRV-101/availability?start=2025-01-15T16:30:00Z&end=2025-01-15T17:30:00Z",
        ))
        .await
        .unwrap();
    let body = body_json(overlapping).await;
    assert_eq!(body["assignable"], false);
    assert_eq!(body["conflict"]["order_id"], "ORD-100");

    let adjacent = app
        .oneshot(get_request(
            "/drivers/DRV-101/availability?start=2025-01-15T17:00:00Z&end=2025-01-15T18:00:00Z",
        ))
        .await
        .unwrap();
    assert_eq!(body_json(adjacent).await["assignable"], true);
}

#[tokio::test]
async fn order_number_preview_and_issue() {
    let app = setup();

    let preview = app
        .clone()
        .oneshot(get_request("/order-numbers/next"))
        .await
        .unwrap();
    assert_eq!(body_json(preview).await["id"], "ORD-001");

    let issued = app
        .clone()
        .oneshot(empty_request("POST", "/order-numbers"))
        .await
        .unwrap();
    assert_eq!(body_json(issued).await["id"], "ORD-001");

    let preview = app.oneshot(get_request("/order-numbers/next")).await.unwrap();
    assert_eq!(body_json(preview).await["id"], "ORD-002");
}

#[tokio::test]
async fn notifications_can_be_marked_read() {
    let app = setup();
    seed(&app, "ORD-100", "DRV-101", "800 kg").await;

    let list = app.clone().oneshot(get_request("/notifications")).await.unwrap();
    let notifications = body_json(list).await;
    let first = &notifications.as_array().unwrap()[0];
    assert_eq!(first["read"], false);

    let id = first["id"].as_str().unwrap();
    let response = app
        .oneshot(empty_request("PATCH", &format!("/notifications/{id}/read")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["read"], true);
}

#[tokio::test]
async fn marking_read_waits_for_writes_in_flight() {
    let state = Arc::new(AppState::in_memory());
    let app = router(state.clone());
    let first = state.audit.notify(
        NotificationScope::Admin,
        ActivityKind::OrderCreated,
        "ORD-001",
        "Nouvelle commande ORD-001",
    );

    let guard = state.writes.lock().await;
    let request = tokio::spawn(
        app.oneshot(empty_request("PATCH", &format!("/notifications/{}/read", first.id))),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!request.is_finished());

    state.audit.notify(
        NotificationScope::Admin,
        ActivityKind::OrderCreated,
        "ORD-002",
        "Nouvelle commande ORD-002",
    );
    drop(guard);

    let response = request.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let feed = state.audit.notifications();
    assert_eq!(feed.len(), 2);
    assert!(feed[0].read);
    assert!(!feed[1].read);
}

#[tokio::test]
async fn reconcile_endpoint_renumbers_legacy_ids() {
    let app = setup();
    seed(&app, "ORD-003", "DRV-101", "800 kg").await;

    let response = app
        .clone()
        .oneshot(empty_request("POST", "/order-numbers/reconcile"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["counter"], 3);
    assert_eq!(report["renamed"].as_array().unwrap().len(), 0);
}
