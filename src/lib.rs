//! Sidecar executor for declarative inference graphs.
//!
//! One inbound request (HTTP/JSON or gRPC/protobuf) is walked through an
//! immutable tree of predictive units, each describing a remote model
//! service that may transform, predict, route, or combine payloads. The
//! [`engine::Executor`] composes those calls; the [`client`] layer owns the
//! wire dialects; the [`api`] frontends decode one request and encode one
//! response.

pub mod api;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod payload;

/// Generated protobuf types for the native dialect.
pub mod proto {
    tonic::include_proto!("inference.v1");
}

pub use crate::client::{
    BackendClient, GrpcBackendClient, JsonRestClient, Protocol, RouteDecision,
};
pub use crate::config::Settings;
pub use crate::engine::{Executor, RequestContext};
pub use crate::error::{ExecutorError, ExecutorResult};
pub use crate::graph::{
    build_graph, parse_graph, Endpoint, PredictiveUnit, UnitImplementation, UnitKind, UnitMethod,
};
pub use crate::payload::{BytesPayload, MessagePayload, Payload, SharedPayload};
