//! Opaque request/response carriers.
//!
//! The engine moves payloads between backend calls without ever looking
//! inside them; only the protocol client that produced a payload knows its
//! concrete shape and downcasts to it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{ExecutorError, ExecutorResult};
use crate::proto::InferenceMessage;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_PROTO: &str = "application/grpc+proto";

/// One request or response body plus its content-type tag.
///
/// Payloads are immutable from the engine's perspective; every backend call
/// returns a new one.
pub trait Payload: Send + Sync + fmt::Debug {
    /// MIME-like tag used by frontends to set response headers.
    fn content_type(&self) -> &str;

    /// Access to the concrete carrier for the owning protocol client.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle under which payloads flow through the engine.
pub type SharedPayload = Arc<dyn Payload>;

/// Raw-bytes payload used by the REST clients.
#[derive(Debug, Clone)]
pub struct BytesPayload {
    body: Bytes,
    content_type: String,
}

impl BytesPayload {
    pub fn new(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.into(),
        }
    }

    /// Bytes payload tagged as JSON.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::new(body, CONTENT_TYPE_JSON)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Cheap handle on the body for re-sending.
    pub fn body_bytes(&self) -> Bytes {
        self.body.clone()
    }
}

impl Payload for BytesPayload {
    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Protobuf payload used by the gRPC client and frontend.
#[derive(Debug, Clone)]
pub struct MessagePayload {
    message: InferenceMessage,
}

impl MessagePayload {
    pub fn new(message: InferenceMessage) -> Self {
        Self { message }
    }

    pub fn message(&self) -> &InferenceMessage {
        &self.message
    }

    pub fn into_message(self) -> InferenceMessage {
        self.message
    }
}

impl Payload for MessagePayload {
    fn content_type(&self) -> &str {
        CONTENT_TYPE_PROTO
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Borrow the raw bytes of a payload produced by a REST client.
pub fn bytes_of(payload: &dyn Payload) -> ExecutorResult<&[u8]> {
    payload
        .as_any()
        .downcast_ref::<BytesPayload>()
        .map(BytesPayload::body)
        .ok_or_else(|| ExecutorError::MalformedPayload("expected a byte payload".into()))
}

/// Borrow the protobuf message of a payload produced by the gRPC client.
pub fn message_of(payload: &dyn Payload) -> ExecutorResult<&InferenceMessage> {
    payload
        .as_any()
        .downcast_ref::<MessagePayload>()
        .map(MessagePayload::message)
        .ok_or_else(|| ExecutorError::MalformedPayload("expected a protobuf payload".into()))
}
