//! HTTP frontend: prediction endpoints plus liveness and readiness probes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::engine::{Executor, RequestContext};
use crate::error::{ExecutorError, ExecutorResult};
use crate::graph::{self, PredictiveUnit};
use crate::payload::SharedPayload;

/// Shared state accessible by all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Executor,
    pub graph: Arc<PredictiveUnit>,
}

/// Build the frontend router. With `probes_only` only `/ready` and `/live`
/// are mounted.
pub fn build_router(state: ApiState, probes_only: bool) -> Router {
    let mut router = Router::new()
        .route("/ready", get(check_ready))
        .route("/live", get(alive));
    if !probes_only {
        router = router
            .route("/api/v0.1/predictions", post(predictions))
            .route("/api/v1/predictions", post(predictions));
    }
    router.layer(TraceLayer::new_for_http()).with_state(state)
}

fn request_context(headers: &HeaderMap) -> RequestContext {
    super::context_from(|name| headers.get(name).and_then(|v| v.to_str().ok()))
}

async fn predictions(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ctx = request_context(&headers);
    match run_prediction(&state, &ctx, &body).await {
        Ok(payload) => respond_with_success(&state, payload),
        Err(e) => respond_with_error(&state, &e),
    }
}

async fn run_prediction(
    state: &ApiState,
    ctx: &RequestContext,
    body: &[u8],
) -> ExecutorResult<SharedPayload> {
    let payload = state.engine.client().unmarshal(body)?;
    state.engine.execute(ctx, &state.graph, payload).await
}

fn respond_with_success(state: &ApiState, payload: SharedPayload) -> Response {
    match state.engine.client().marshal(payload.as_ref()) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, payload.content_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => respond_with_error(state, &e),
    }
}

fn respond_with_error(state: &ApiState, err: &ExecutorError) -> Response {
    tracing::error!(error = %err, "prediction failed");
    let client = state.engine.client();
    let payload = client.error_payload(err);
    let body = client.marshal(payload.as_ref()).unwrap_or_default();
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, payload.content_type().to_string())],
        body,
    )
        .into_response()
}

async fn check_ready(State(state): State<ApiState>) -> StatusCode {
    match graph::ready(&state.graph).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn alive() -> StatusCode {
    StatusCode::OK
}
