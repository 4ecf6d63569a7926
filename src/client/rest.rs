//! JSON-over-HTTP backend client for the Seldon and TensorFlow dialects.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::IgnoredAny;
use serde_json::Value;

use crate::client::observer::{CallInfo, CallObserver, TracingObserver};
use crate::client::{ApiMethod, BackendClient, Protocol, RouteDecision};
use crate::engine::RequestContext;
use crate::error::{ExecutorError, ExecutorResult};
use crate::graph::Endpoint;
use crate::payload::{BytesPayload, Payload, SharedPayload, CONTENT_TYPE_JSON};

/// Connection pool knobs for the shared outbound client.
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub default_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(90),
            default_timeout: Duration::from_secs(30),
            tcp_keepalive: Some(Duration::from_secs(60)),
        }
    }
}

/// REST client shared across requests. Reentrant; the connection pool lives
/// in the inner reqwest client.
pub struct JsonRestClient {
    http: reqwest::Client,
    protocol: Protocol,
    deployment: String,
    images: HashMap<String, String>,
    observer: Arc<dyn CallObserver>,
}

impl JsonRestClient {
    pub fn new(
        protocol: Protocol,
        deployment: impl Into<String>,
        config: RestClientConfig,
    ) -> ExecutorResult<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .tcp_keepalive(config.tcp_keepalive)
            .timeout(config.default_timeout)
            .build()
            .map_err(|e| ExecutorError::Config(e.to_string()))?;
        Ok(Self {
            http,
            protocol,
            deployment: deployment.into(),
            images: HashMap::new(),
            observer: Arc::new(TracingObserver),
        })
    }

    /// Unit-name to image labels for call instrumentation.
    pub fn with_image_labels(mut self, images: HashMap<String, String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn method_path(&self, method: ApiMethod, model: &str) -> String {
        match self.protocol {
            Protocol::Seldon => method.seldon_path().to_string(),
            Protocol::Tensorflow => {
                format!("/v1/models/{}:{}", model, method.tensorflow_verb())
            }
        }
    }

    fn observe(
        &self,
        model: &str,
        method: ApiMethod,
        endpoint: &Endpoint,
        started: Instant,
        success: bool,
    ) {
        self.observer.observe(
            &CallInfo {
                deployment: &self.deployment,
                model,
                method: method.name(),
                endpoint,
                image: self.images.get(model).map(String::as_str),
            },
            started.elapsed(),
            success,
        );
    }

    async fn call(
        &self,
        ctx: &RequestContext,
        model: &str,
        method: ApiMethod,
        endpoint: &Endpoint,
        body: Bytes,
    ) -> ExecutorResult<BytesPayload> {
        let url = format!("http://{}{}", endpoint, self.method_path(method, model));
        tracing::debug!(%url, model, "calling backend");

        let mut request = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_JSON)
            .body(body);
        for (name, value) in ctx.trace_headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(remaining) = ctx.remaining()? {
            request = request.timeout(remaining);
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.observe(model, method, endpoint, started, false);
                return Err(if e.is_timeout() {
                    ExecutorError::DeadlineExceeded
                } else {
                    ExecutorError::BackendTransport {
                        url,
                        cause: e.to_string(),
                    }
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.observe(model, method, endpoint, started, false);
            tracing::warn!(%url, status = status.as_u16(), "backend returned error status");
            return Err(ExecutorError::BackendHttp {
                status: status.as_u16(),
                url,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(CONTENT_TYPE_JSON)
            .to_string();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                self.observe(model, method, endpoint, started, false);
                return Err(ExecutorError::BackendTransport {
                    url,
                    cause: e.to_string(),
                });
            }
        };
        self.observe(model, method, endpoint, started, true);
        Ok(BytesPayload::new(body, content_type))
    }
}

fn body_bytes(payload: &dyn Payload) -> ExecutorResult<Bytes> {
    payload
        .as_any()
        .downcast_ref::<BytesPayload>()
        .map(BytesPayload::body_bytes)
        .ok_or_else(|| ExecutorError::MalformedPayload("expected a byte payload".into()))
}

/// Extract the route vector from a router reply: the native routing message
/// first, then a bare JSON integer array.
fn parse_routes(body: &[u8]) -> ExecutorResult<Vec<i64>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ExecutorError::MalformedPayload(format!("route response is not JSON: {e}")))?;

    let routes = if let Some(data) = value.get("data") {
        if let Some(rows) = data.get("ndarray").and_then(Value::as_array) {
            ndarray_routes(rows)?
        } else if let Some(values) = data
            .get("tensor")
            .and_then(|t| t.get("values"))
            .and_then(Value::as_array)
        {
            int_routes(values)?
        } else {
            return Err(ExecutorError::MalformedPayload(
                "route response carries neither ndarray nor tensor".into(),
            ));
        }
    } else if let Some(values) = value.as_array() {
        int_routes(values)?
    } else {
        return Err(ExecutorError::MalformedPayload(
            "unable to extract routes from response".into(),
        ));
    };

    if routes.is_empty() {
        return Err(ExecutorError::RouteEmpty);
    }
    Ok(routes)
}

/// One route per row: the row's first element, or the row itself when the
/// ndarray is flat.
pub(crate) fn ndarray_routes(rows: &[Value]) -> ExecutorResult<Vec<i64>> {
    rows.iter()
        .map(|row| {
            let cell = match row {
                Value::Array(columns) => columns.first().ok_or(ExecutorError::RouteEmpty)?,
                other => other,
            };
            cell.as_i64().ok_or_else(|| {
                ExecutorError::MalformedPayload(format!("route entry is not an integer: {cell}"))
            })
        })
        .collect()
}

pub(crate) fn int_routes(values: &[Value]) -> ExecutorResult<Vec<i64>> {
    values
        .iter()
        .map(|v| {
            v.as_i64().ok_or_else(|| {
                ExecutorError::MalformedPayload(format!("route entry is not an integer: {v}"))
            })
        })
        .collect()
}

/// Join sibling bodies into one JSON array, in child-index order. Bodies are
/// spliced verbatim after a validity check, not re-serialized.
fn join_json_bodies(payloads: &[SharedPayload]) -> ExecutorResult<Vec<u8>> {
    let mut joined = Vec::new();
    joined.push(b'[');
    for (i, payload) in payloads.iter().enumerate() {
        let body = body_bytes(payload.as_ref())?;
        if serde_json::from_slice::<IgnoredAny>(&body).is_err() {
            return Err(ExecutorError::NotJson);
        }
        if i > 0 {
            joined.push(b',');
        }
        joined.extend_from_slice(&body);
    }
    joined.push(b']');
    Ok(joined)
}

/// Rewrite a TensorFlow predict-response into the matching predict-request
/// shape. A body that is already request-shaped passes through unchanged.
fn chain_tensorflow(payload: SharedPayload) -> ExecutorResult<SharedPayload> {
    let body = body_bytes(payload.as_ref())?;
    let value: Value = serde_json::from_slice(&body).map_err(|e| {
        ExecutorError::MalformedPayload(format!("chained payload is not JSON: {e}"))
    })?;

    let request = if let Some(predictions) = value.get("predictions") {
        serde_json::json!({ "instances": predictions })
    } else if let Some(outputs) = value.get("outputs") {
        serde_json::json!({ "inputs": outputs })
    } else {
        return Ok(payload);
    };

    let body = serde_json::to_vec(&request)
        .map_err(|e| ExecutorError::MalformedPayload(e.to_string()))?;
    Ok(Arc::new(BytesPayload::json(body)))
}

#[async_trait]
impl BackendClient for JsonRestClient {
    async fn predict(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        let body = body_bytes(payload.as_ref())?;
        let out = self.call(ctx, model, ApiMethod::Predict, endpoint, body).await?;
        Ok(Arc::new(out))
    }

    async fn transform_input(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        let body = body_bytes(payload.as_ref())?;
        let out = self
            .call(ctx, model, ApiMethod::TransformInput, endpoint, body)
            .await?;
        Ok(Arc::new(out))
    }

    async fn transform_output(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        let body = body_bytes(payload.as_ref())?;
        let out = self
            .call(ctx, model, ApiMethod::TransformOutput, endpoint, body)
            .await?;
        Ok(Arc::new(out))
    }

    async fn route(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<RouteDecision> {
        let body = body_bytes(payload.as_ref())?;
        let out = self.call(ctx, model, ApiMethod::Route, endpoint, body).await?;
        RouteDecision::new(parse_routes(out.body())?)
    }

    async fn combine(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payloads: Vec<SharedPayload>,
    ) -> ExecutorResult<SharedPayload> {
        let joined = join_json_bodies(&payloads)?;
        let out = self
            .call(ctx, model, ApiMethod::Combine, endpoint, Bytes::from(joined))
            .await?;
        Ok(Arc::new(out))
    }

    async fn chain(
        &self,
        _ctx: &RequestContext,
        _model: &str,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        match self.protocol {
            Protocol::Seldon => Ok(payload),
            Protocol::Tensorflow => chain_tensorflow(payload),
        }
    }

    fn unmarshal(&self, body: &[u8]) -> ExecutorResult<SharedPayload> {
        serde_json::from_slice::<IgnoredAny>(body)
            .map_err(|e| ExecutorError::MalformedPayload(e.to_string()))?;
        Ok(Arc::new(BytesPayload::json(Bytes::copy_from_slice(body))))
    }

    fn marshal(&self, payload: &dyn Payload) -> ExecutorResult<Vec<u8>> {
        Ok(body_bytes(payload)?.to_vec())
    }

    fn error_payload(&self, err: &ExecutorError) -> SharedPayload {
        let body = serde_json::json!({
            "status": {
                "code": 500,
                "info": err.to_string(),
                "status": "FAILURE"
            }
        });
        Arc::new(BytesPayload::json(body.to_string()))
    }
}
