//! HTTP frontend behavior via `tower::ServiceExt::oneshot`.

mod support;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use infergraph::api::{build_router, ApiState};
use infergraph::graph::parse_graph;
use infergraph::{Executor, PredictiveUnit};

use support::RecordingClient;

fn single_model_graph(endpoint: &str) -> Arc<PredictiveUnit> {
    let (host, port) = endpoint.split_once(':').unwrap();
    parse_graph(&format!(
        r#"{{"name": "m", "type": "MODEL",
             "endpoint": {{"serviceHost": "{host}", "servicePort": {port}}}}}"#
    ))
    .unwrap()
}

fn state_with(client: Arc<RecordingClient>, graph: Arc<PredictiveUnit>) -> ApiState {
    ApiState {
        engine: Executor::new(client),
        graph,
    }
}

fn prediction_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_predictions_success() {
    let client = Arc::new(RecordingClient::new().respond(
        "h:9000",
        "predict",
        br#"{"data":{"ndarray":[[0.9]]}}"#,
    ));
    let router = build_router(state_with(client, single_model_graph("h:9000")), false);

    let response = router
        .oneshot(prediction_request(
            "/api/v1/predictions",
            r#"{"data":{"ndarray":[[1,2]]}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], br#"{"data":{"ndarray":[[0.9]]}}"#);
}

#[tokio::test]
async fn test_predictions_v01_alias() {
    let client = Arc::new(RecordingClient::new().respond("h:9000", "predict", br#"{"ok":1}"#));
    let router = build_router(state_with(client, single_model_graph("h:9000")), false);

    let response = router
        .oneshot(prediction_request("/api/v0.1/predictions", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_predictions_backend_failure_yields_error_payload() {
    let client = Arc::new(RecordingClient::new().fail_http("h:9000", "predict", 503));
    let router = build_router(state_with(client, single_model_graph("h:9000")), false);

    let response = router
        .oneshot(prediction_request("/api/v1/predictions", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"]["code"], 500);
    assert!(value["status"]["info"]
        .as_str()
        .unwrap()
        .contains("status 503"));
}

#[tokio::test]
async fn test_predictions_malformed_body() {
    let client = Arc::new(RecordingClient::new());
    let router = build_router(
        state_with(client.clone(), single_model_graph("h:9000")),
        false,
    );

    let response = router
        .oneshot(prediction_request("/api/v1/predictions", "not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_live_probe() {
    let client = Arc::new(RecordingClient::new());
    let router = build_router(state_with(client, single_model_graph("h:9000")), true);

    let response = router
        .oneshot(Request::builder().uri("/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_probes_only_hides_predictions() {
    let client = Arc::new(RecordingClient::new());
    let router = build_router(state_with(client, single_model_graph("h:9000")), true);

    let response = router
        .oneshot(prediction_request("/api/v1/predictions", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ready_probe_reflects_backend_reachability() {
    // A live local listener makes the single-unit graph ready.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let _ = listener.accept().await;
        }
    });

    let client = Arc::new(RecordingClient::new());
    let router = build_router(
        state_with(client, single_model_graph(&format!("127.0.0.1:{port}"))),
        false,
    );
    let response = router
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ready_probe_unreachable_backend() {
    let client = Arc::new(RecordingClient::new());
    // Port 1 is essentially never listening.
    let router = build_router(state_with(client, single_model_graph("127.0.0.1:1")), false);

    let response = router
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
