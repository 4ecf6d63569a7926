//! Shared test doubles: a scripted, recording backend client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use infergraph::engine::RequestContext;
use infergraph::error::{ExecutorError, ExecutorResult};
use infergraph::graph::Endpoint;
use infergraph::payload::{bytes_of, BytesPayload, Payload, SharedPayload};
use infergraph::{BackendClient, RouteDecision};

/// One observed backend call.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub method: &'static str,
    pub model: String,
    pub endpoint: String,
    pub body: Vec<u8>,
}

enum Reply {
    Body(Vec<u8>),
    HttpError(u16),
}

/// Backend client whose replies are scripted per (endpoint, method) and
/// which records every call in arrival order.
#[derive(Default)]
pub struct RecordingClient {
    replies: HashMap<(String, &'static str), Reply>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<CallRecord>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, endpoint: &str, method: &'static str, body: &[u8]) -> Self {
        self.replies
            .insert((endpoint.into(), method), Reply::Body(body.to_vec()));
        self
    }

    pub fn fail_http(mut self, endpoint: &str, method: &'static str, status: u16) -> Self {
        self.replies
            .insert((endpoint.into(), method), Reply::HttpError(status));
        self
    }

    /// Delay every call to this endpoint, to skew completion order.
    pub fn delay(mut self, endpoint: &str, delay: Duration) -> Self {
        self.delays.insert(endpoint.into(), delay);
        self
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<CallRecord> {
        self.calls()
            .into_iter()
            .filter(|c| c.endpoint == endpoint)
            .collect()
    }

    async fn call(
        &self,
        model: &str,
        endpoint: &Endpoint,
        method: &'static str,
        body: Vec<u8>,
    ) -> ExecutorResult<SharedPayload> {
        let key = endpoint.to_string();
        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }
        self.calls.lock().unwrap().push(CallRecord {
            method,
            model: model.into(),
            endpoint: key.clone(),
            body,
        });
        match self.replies.get(&(key.clone(), method)) {
            Some(Reply::Body(body)) => Ok(Arc::new(BytesPayload::json(body.clone()))),
            Some(Reply::HttpError(status)) => Err(ExecutorError::BackendHttp {
                status: *status,
                url: format!("http://{key}/{method}"),
            }),
            None => Err(ExecutorError::BackendTransport {
                url: format!("http://{key}/{method}"),
                cause: "no scripted response".into(),
            }),
        }
    }
}

#[async_trait]
impl BackendClient for RecordingClient {
    async fn predict(
        &self,
        _ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        let body = bytes_of(payload.as_ref())?.to_vec();
        self.call(model, endpoint, "predict", body).await
    }

    async fn transform_input(
        &self,
        _ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        let body = bytes_of(payload.as_ref())?.to_vec();
        self.call(model, endpoint, "transform-input", body).await
    }

    async fn transform_output(
        &self,
        _ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        let body = bytes_of(payload.as_ref())?.to_vec();
        self.call(model, endpoint, "transform-output", body).await
    }

    async fn route(
        &self,
        _ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<RouteDecision> {
        let body = bytes_of(payload.as_ref())?.to_vec();
        let reply = self.call(model, endpoint, "route", body).await?;
        let routes: Vec<i64> = serde_json::from_slice(bytes_of(reply.as_ref())?)
            .map_err(|e| ExecutorError::MalformedPayload(e.to_string()))?;
        RouteDecision::new(routes)
    }

    async fn combine(
        &self,
        _ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payloads: Vec<SharedPayload>,
    ) -> ExecutorResult<SharedPayload> {
        let mut joined = Vec::new();
        joined.push(b'[');
        for (i, payload) in payloads.iter().enumerate() {
            if i > 0 {
                joined.push(b',');
            }
            joined.extend_from_slice(bytes_of(payload.as_ref())?);
        }
        joined.push(b']');
        self.call(model, endpoint, "combine", joined).await
    }

    async fn chain(
        &self,
        _ctx: &RequestContext,
        _model: &str,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        Ok(payload)
    }

    fn unmarshal(&self, body: &[u8]) -> ExecutorResult<SharedPayload> {
        serde_json::from_slice::<serde_json::Value>(body)
            .map_err(|e| ExecutorError::MalformedPayload(e.to_string()))?;
        Ok(Arc::new(BytesPayload::json(body.to_vec())))
    }

    fn marshal(&self, payload: &dyn Payload) -> ExecutorResult<Vec<u8>> {
        Ok(bytes_of(payload)?.to_vec())
    }

    fn error_payload(&self, err: &ExecutorError) -> SharedPayload {
        let body = serde_json::json!({
            "status": { "code": 500, "info": err.to_string(), "status": "FAILURE" }
        });
        Arc::new(BytesPayload::json(body.to_string()))
    }
}
