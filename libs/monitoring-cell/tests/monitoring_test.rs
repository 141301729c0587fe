use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use monitoring_cell::{monitoring_routes, track_request_metrics, MonitoringState, RequestLabels};

fn app(state: &MonitoringState) -> Router {
    Router::new()
        .route("/items/{item_id}", get(|| async { "item" }))
        .merge(monitoring_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state.clone(), track_request_metrics))
}

async fn get_body(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|value| value.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn health_returns_ok_json() {
    let state = MonitoringState::new();
    let (status, content_type, body) = get_body(app(&state), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn requests_are_recorded_under_their_route_template() {
    let state = MonitoringState::new();

    for id in ["1", "2", "3"] {
        let (status, _, _) = get_body(app(&state), &format!("/items/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _, _) = get_body(app(&state), "/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let item_labels = RequestLabels {
        method: "GET".to_string(),
        route: "/items/{item_id}".to_string(),
        status_code: 200,
    };
    assert_eq!(state.metrics.request_count(&item_labels).await, 3);

    let (status, content_type, text) = get_body(app(&state), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/plain"));
    assert!(text.contains(
        "http_request_duration_seconds_count{method=\"GET\",route=\"/items/{item_id}\",statusCode=\"200\"} 3"
    ));
    assert!(!text.contains("/items/1"));
    assert!(!text.contains("/nowhere"));
}
