//! gRPC backend client for the native protobuf dialect.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use prost::Message;
use serde_json::Value;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use tonic::transport::Channel;

use crate::client::observer::{CallInfo, CallObserver, TracingObserver};
use crate::client::rest::{int_routes, ndarray_routes};
use crate::client::{ApiMethod, BackendClient, Protocol, RouteDecision};
use crate::engine::RequestContext;
use crate::error::{ExecutorError, ExecutorResult};
use crate::graph::Endpoint;
use crate::payload::{message_of, MessagePayload, Payload, SharedPayload};
use crate::proto::inference_unit_client::InferenceUnitClient;
use crate::proto::{self, InferenceMessage, InferenceMessageList};

/// Default cap on encoded message size, matching the edge default.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 100 * 1024 * 1024;

/// Protobuf client shared across requests. Channels are established per call;
/// the native messages chain without adaptation.
pub struct GrpcBackendClient {
    deployment: String,
    images: HashMap<String, String>,
    observer: Arc<dyn CallObserver>,
    max_message_bytes: usize,
}

impl GrpcBackendClient {
    pub fn new(
        protocol: Protocol,
        deployment: impl Into<String>,
        max_message_bytes: usize,
    ) -> ExecutorResult<Self> {
        if protocol != Protocol::Seldon {
            return Err(ExecutorError::UnknownProtocol(format!(
                "{protocol:?} is not served over gRPC"
            )));
        }
        Ok(Self {
            deployment: deployment.into(),
            images: HashMap::new(),
            observer: Arc::new(TracingObserver),
            max_message_bytes,
        })
    }

    pub fn with_image_labels(mut self, images: HashMap<String, String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = observer;
        self
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

    async fn connect(&self, url: &str) -> ExecutorResult<InferenceUnitClient<Channel>> {
        let channel = Channel::from_shared(url.to_string())
            .map_err(|e| ExecutorError::BackendTransport {
                url: url.to_string(),
                cause: e.to_string(),
            })?
            .connect()
            .await
            .map_err(|e| ExecutorError::BackendTransport {
                url: url.to_string(),
                cause: e.to_string(),
            })?;
        Ok(InferenceUnitClient::new(channel)
            .max_decoding_message_size(self.max_message_bytes)
            .max_encoding_message_size(self.max_message_bytes))
    }

    fn request_of<T>(ctx: &RequestContext, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        for (name, value) in ctx.trace_headers() {
            if let (Ok(key), Ok(value)) = (
                name.parse::<AsciiMetadataKey>(),
                value.parse::<AsciiMetadataValue>(),
            ) {
                request.metadata_mut().insert(key, value);
            }
        }
        request
    }

    async fn call(
        &self,
        ctx: &RequestContext,
        model: &str,
        method: ApiMethod,
        endpoint: &Endpoint,
        message: InferenceMessage,
    ) -> ExecutorResult<InferenceMessage> {
        let url = format!("http://{endpoint}");
        tracing::debug!(%url, model, method = method.name(), "calling backend");
        let remaining = ctx.remaining()?;
        let started = Instant::now();

        let dispatch = async {
            let mut client = self.connect(&url).await?;
            let request = Self::request_of(ctx, message);
            let response = match method {
                ApiMethod::Predict => client.predict(request).await,
                ApiMethod::TransformInput => client.transform_input(request).await,
                ApiMethod::TransformOutput => client.transform_output(request).await,
                ApiMethod::Route => client.route(request).await,
                ApiMethod::Combine => {
                    unreachable!("combine is dispatched through call_combine")
                }
            };
            response
                .map(tonic::Response::into_inner)
                .map_err(|status| ExecutorError::BackendTransport {
                    url: url.clone(),
                    cause: format!("{}: {}", status.code(), status.message()),
                })
        };

        let result = match remaining {
            Some(remaining) => tokio::time::timeout(remaining, dispatch)
                .await
                .map_err(|_| ExecutorError::DeadlineExceeded)
                .and_then(|r| r),
            None => dispatch.await,
        };
        self.observe(model, method, endpoint, started, result.is_ok());
        result
    }

    async fn call_combine(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        list: InferenceMessageList,
    ) -> ExecutorResult<InferenceMessage> {
        let url = format!("http://{endpoint}");
        tracing::debug!(%url, model, method = "combine", "calling backend");
        let remaining = ctx.remaining()?;
        let started = Instant::now();

        let dispatch = async {
            let mut client = self.connect(&url).await?;
            let request = Self::request_of(ctx, list);
            client
                .aggregate(request)
                .await
                .map(tonic::Response::into_inner)
                .map_err(|status| ExecutorError::BackendTransport {
                    url: url.clone(),
                    cause: format!("{}: {}", status.code(), status.message()),
                })
        };

        let result = match remaining {
            Some(remaining) => tokio::time::timeout(remaining, dispatch)
                .await
                .map_err(|_| ExecutorError::DeadlineExceeded)
                .and_then(|r| r),
            None => dispatch.await,
        };
        self.observe(model, ApiMethod::Combine, endpoint, started, result.is_ok());
        result
    }
}

/// Extract the route vector from a router reply message.
pub(crate) fn routes_from_message(message: &InferenceMessage) -> ExecutorResult<Vec<i64>> {
    let routes = match &message.data_oneof {
        Some(proto::inference_message::DataOneof::Data(data)) => match &data.data_oneof {
            Some(proto::inference_data::DataOneof::Tensor(tensor)) => {
                tensor.values.iter().map(|v| *v as i64).collect()
            }
            Some(proto::inference_data::DataOneof::NdarrayJson(text)) => {
                let rows: Value = serde_json::from_str(text).map_err(|e| {
                    ExecutorError::MalformedPayload(format!("route ndarray is not JSON: {e}"))
                })?;
                let rows = rows.as_array().ok_or_else(|| {
                    ExecutorError::MalformedPayload("route ndarray is not an array".into())
                })?;
                ndarray_routes(rows)?
            }
            None => {
                return Err(ExecutorError::MalformedPayload(
                    "route reply data carries no tensor or ndarray".into(),
                ))
            }
        },
        Some(proto::inference_message::DataOneof::JsonData(text)) => {
            let value: Value = serde_json::from_str(text).map_err(|e| {
                ExecutorError::MalformedPayload(format!("route jsonData is not JSON: {e}"))
            })?;
            let values = value.as_array().ok_or_else(|| {
                ExecutorError::MalformedPayload("route jsonData is not an array".into())
            })?;
            int_routes(values)?
        }
        _ => {
            return Err(ExecutorError::MalformedPayload(
                "route reply carries no data".into(),
            ))
        }
    };

    if routes.is_empty() {
        return Err(ExecutorError::RouteEmpty);
    }
    Ok(routes)
}

#[async_trait]
impl BackendClient for GrpcBackendClient {
    async fn predict(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        let message = message_of(payload.as_ref())?.clone();
        let out = self
            .call(ctx, model, ApiMethod::Predict, endpoint, message)
            .await?;
        Ok(Arc::new(MessagePayload::new(out)))
    }

    async fn transform_input(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        let message = message_of(payload.as_ref())?.clone();
        let out = self
            .call(ctx, model, ApiMethod::TransformInput, endpoint, message)
            .await?;
        Ok(Arc::new(MessagePayload::new(out)))
    }

    async fn transform_output(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        let message = message_of(payload.as_ref())?.clone();
        let out = self
            .call(ctx, model, ApiMethod::TransformOutput, endpoint, message)
            .await?;
        Ok(Arc::new(MessagePayload::new(out)))
    }

    async fn route(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<RouteDecision> {
        let message = message_of(payload.as_ref())?.clone();
        let out = self
            .call(ctx, model, ApiMethod::Route, endpoint, message)
            .await?;
        RouteDecision::new(routes_from_message(&out)?)
    }

    async fn combine(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payloads: Vec<SharedPayload>,
    ) -> ExecutorResult<SharedPayload> {
        let items = payloads
            .iter()
            .map(|p| message_of(p.as_ref()).map(Clone::clone))
            .collect::<ExecutorResult<Vec<_>>>()?;
        let out = self
            .call_combine(ctx, model, endpoint, InferenceMessageList { items })
            .await?;
        Ok(Arc::new(MessagePayload::new(out)))
    }

    async fn chain(
        &self,
        _ctx: &RequestContext,
        _model: &str,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        // Native messages are always valid input for the next hop.
        Ok(payload)
    }

    fn unmarshal(&self, body: &[u8]) -> ExecutorResult<SharedPayload> {
        let message = InferenceMessage::decode(body)
            .map_err(|e| ExecutorError::MalformedPayload(e.to_string()))?;
        Ok(Arc::new(MessagePayload::new(message)))
    }

    fn marshal(&self, payload: &dyn Payload) -> ExecutorResult<Vec<u8>> {
        Ok(message_of(payload)?.encode_to_vec())
    }

    fn error_payload(&self, err: &ExecutorError) -> SharedPayload {
        Arc::new(MessagePayload::new(error_message(err)))
    }
}

/// Protocol-valid error reply carrying a 500 status and the failure text.
pub fn error_message(err: &ExecutorError) -> InferenceMessage {
    InferenceMessage {
        status: Some(proto::Status {
            code: 500,
            info: err.to_string(),
            reason: String::new(),
            flag: proto::status::Flag::Failure as i32,
        }),
        meta: None,
        data_oneof: None,
    }
}
