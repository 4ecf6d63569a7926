//! Backend call capability.
//!
//! A [`BackendClient`] is bound to one wire protocol and owns every outbound
//! call the engine makes: one method per unit role plus the payload helpers
//! the frontends use. The engine never touches wire details.

pub mod grpc;
pub mod observer;
pub mod rest;

use async_trait::async_trait;

use crate::engine::RequestContext;
use crate::error::ExecutorResult;
use crate::graph::Endpoint;
use crate::payload::{Payload, SharedPayload};

pub use grpc::GrpcBackendClient;
pub use observer::{CallInfo, CallObserver, TracingObserver};
pub use rest::JsonRestClient;

/// Wire dialect spoken to all backends by one client instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Protocol {
    Seldon,
    Tensorflow,
}

/// The five call kinds a unit can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Predict,
    TransformInput,
    TransformOutput,
    Route,
    Combine,
}

impl ApiMethod {
    /// Fixed method path in the native dialect.
    pub fn seldon_path(self) -> &'static str {
        match self {
            ApiMethod::Predict => "/predict",
            ApiMethod::TransformInput => "/transform-input",
            ApiMethod::TransformOutput => "/transform-output",
            ApiMethod::Route => "/route",
            ApiMethod::Combine => "/combine",
        }
    }

    /// Verb used in the TensorFlow-style `/v1/models/{model}:{verb}` form.
    pub fn tensorflow_verb(self) -> &'static str {
        match self {
            ApiMethod::Predict | ApiMethod::TransformInput | ApiMethod::TransformOutput => {
                "predict"
            }
            ApiMethod::Route => "route",
            ApiMethod::Combine => "aggregate",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ApiMethod::Predict => "predict",
            ApiMethod::TransformInput => "transform-input",
            ApiMethod::TransformOutput => "transform-output",
            ApiMethod::Route => "route",
            ApiMethod::Combine => "combine",
        }
    }
}

/// Routing verdict returned by a router backend.
///
/// The engine consumes only the first entry today; the full vector is kept so
/// multi-route dispatch can be added without changing this contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    routes: Vec<i64>,
}

impl RouteDecision {
    /// Build a decision from a non-empty route vector.
    pub fn new(routes: Vec<i64>) -> ExecutorResult<Self> {
        if routes.is_empty() {
            return Err(crate::error::ExecutorError::RouteEmpty);
        }
        Ok(Self { routes })
    }

    /// The route the engine acts on.
    pub fn first(&self) -> i64 {
        self.routes[0]
    }

    pub fn routes(&self) -> &[i64] {
        &self.routes
    }
}

/// One outbound call per unit role against a host:port, plus the payload
/// helpers the frontends use. Shared across requests; implementations must be
/// reentrant.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn predict(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload>;

    async fn transform_input(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload>;

    async fn transform_output(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload>;

    async fn route(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payload: SharedPayload,
    ) -> ExecutorResult<RouteDecision>;

    /// Combine sibling results, ordered by child index.
    async fn combine(
        &self,
        ctx: &RequestContext,
        model: &str,
        endpoint: &Endpoint,
        payloads: Vec<SharedPayload>,
    ) -> ExecutorResult<SharedPayload>;

    /// Adapt a payload so it is syntactically valid as input to the next hop.
    /// Identity for naturally chainable dialects.
    async fn chain(
        &self,
        ctx: &RequestContext,
        model: &str,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload>;

    /// Decode one inbound body into a payload.
    fn unmarshal(&self, body: &[u8]) -> ExecutorResult<SharedPayload>;

    /// Encode a payload for the wire.
    fn marshal(&self, payload: &dyn Payload) -> ExecutorResult<Vec<u8>>;

    /// Protocol-valid body carrying a 500 status and the error text, returned
    /// verbatim by the frontends.
    fn error_payload(&self, err: &crate::error::ExecutorError) -> SharedPayload;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorError;

    #[test]
    fn test_seldon_paths_fixed() {
        assert_eq!(ApiMethod::Predict.seldon_path(), "/predict");
        assert_eq!(ApiMethod::TransformInput.seldon_path(), "/transform-input");
        assert_eq!(
            ApiMethod::TransformOutput.seldon_path(),
            "/transform-output"
        );
        assert_eq!(ApiMethod::Route.seldon_path(), "/route");
        assert_eq!(ApiMethod::Combine.seldon_path(), "/combine");
    }

    #[test]
    fn test_tensorflow_verbs() {
        assert_eq!(ApiMethod::Predict.tensorflow_verb(), "predict");
        assert_eq!(ApiMethod::TransformInput.tensorflow_verb(), "predict");
        assert_eq!(ApiMethod::TransformOutput.tensorflow_verb(), "predict");
        assert_eq!(ApiMethod::Route.tensorflow_verb(), "route");
        assert_eq!(ApiMethod::Combine.tensorflow_verb(), "aggregate");
    }

    #[test]
    fn test_route_decision_keeps_full_vector() {
        let decision = RouteDecision::new(vec![2, 0, 1]).unwrap();
        assert_eq!(decision.first(), 2);
        assert_eq!(decision.routes(), &[2, 0, 1]);
    }

    #[test]
    fn test_route_decision_rejects_empty() {
        assert!(matches!(
            RouteDecision::new(vec![]),
            Err(ExecutorError::RouteEmpty)
        ));
    }
}
