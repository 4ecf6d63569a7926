//! The graph-execution engine.
//!
//! [`Executor::execute`] performs one descent through the predictive-unit
//! tree: transform the input, route to (or fan out over) the children,
//! aggregate their results, transform the output. All backend access goes
//! through the [`BackendClient`] capability; the engine never touches wire
//! details and holds no per-request state.

pub mod abtest;
pub mod context;

pub use context::RequestContext;

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::client::BackendClient;
use crate::error::{ExecutorError, ExecutorResult};
use crate::graph::{PredictiveUnit, UnitImplementation, UnitKind, UnitMethod};
use crate::payload::SharedPayload;

/// Sentinel route meaning "no routing decision, fan out to all children".
const ROUTE_ALL: i64 = -1;

/// Recursive composition over the graph. Cheap to clone; one clone per
/// fan-out task.
#[derive(Clone)]
pub struct Executor {
    client: Arc<dyn BackendClient>,
}

impl Executor {
    pub fn new(client: Arc<dyn BackendClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<dyn BackendClient> {
        &self.client
    }

    /// One full descent from `node`. The graph is borrowed read-only; each
    /// call returns a fresh payload.
    pub fn execute<'a>(
        &'a self,
        ctx: &'a RequestContext,
        node: &'a Arc<PredictiveUnit>,
        payload: SharedPayload,
    ) -> BoxFuture<'a, ExecutorResult<SharedPayload>> {
        Box::pin(async move {
            ctx.check()?;
            let transformed = self.transform_input(ctx, node, payload).await?;
            let routed = self.route_children(ctx, node, transformed).await?;
            self.transform_output(ctx, node, routed).await
        })
    }

    /// Entry transform. The unit kind wins over a declared method.
    async fn transform_input(
        &self,
        ctx: &RequestContext,
        node: &PredictiveUnit,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        match node.kind {
            Some(UnitKind::Model) => {
                self.client
                    .predict(ctx, &node.name, &node.endpoint, payload)
                    .await
            }
            Some(UnitKind::Transformer) => {
                self.client
                    .transform_input(ctx, &node.name, &node.endpoint, payload)
                    .await
            }
            _ if node.has_method(UnitMethod::TransformInput) => {
                self.client
                    .transform_input(ctx, &node.name, &node.endpoint, payload)
                    .await
            }
            _ => Ok(payload),
        }
    }

    /// Exit transform, mirroring [`Self::transform_input`].
    async fn transform_output(
        &self,
        ctx: &RequestContext,
        node: &PredictiveUnit,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        match node.kind {
            Some(UnitKind::OutputTransformer) => {
                self.client
                    .transform_output(ctx, &node.name, &node.endpoint, payload)
                    .await
            }
            _ if node.has_method(UnitMethod::TransformOutput) => {
                self.client
                    .transform_output(ctx, &node.name, &node.endpoint, payload)
                    .await
            }
            _ => Ok(payload),
        }
    }

    async fn route(
        &self,
        ctx: &RequestContext,
        node: &PredictiveUnit,
        payload: SharedPayload,
    ) -> ExecutorResult<i64> {
        if node.kind == Some(UnitKind::Router) || node.has_method(UnitMethod::Route) {
            let decision = self
                .client
                .route(ctx, &node.name, &node.endpoint, payload)
                .await?;
            return Ok(decision.first());
        }
        if node.implementation == Some(UnitImplementation::RandomAbtest) {
            return Ok(abtest::choose_weighted(&node.children) as i64);
        }
        Ok(ROUTE_ALL)
    }

    async fn aggregate(
        &self,
        ctx: &RequestContext,
        node: &PredictiveUnit,
        payloads: Vec<SharedPayload>,
    ) -> ExecutorResult<SharedPayload> {
        if node.kind == Some(UnitKind::Combiner) || node.has_method(UnitMethod::Aggregate) {
            return self
                .client
                .combine(ctx, &node.name, &node.endpoint, payloads)
                .await;
        }
        let mut payloads = payloads;
        Ok(payloads.swap_remove(0))
    }

    async fn route_children(
        &self,
        ctx: &RequestContext,
        node: &Arc<PredictiveUnit>,
        payload: SharedPayload,
    ) -> ExecutorResult<SharedPayload> {
        if node.is_leaf() {
            return Ok(payload);
        }

        // Adapt the payload once so the router and every child see a valid
        // next-hop input.
        let payload = self.client.chain(ctx, &node.name, payload).await?;
        let route = self.route(ctx, node, payload.clone()).await?;

        let results = if route == ROUTE_ALL {
            self.fan_out(ctx, node, payload).await?
        } else {
            let index = usize::try_from(route)
                .ok()
                .filter(|i| *i < node.children.len())
                .ok_or(ExecutorError::RouteOutOfRange {
                    index: route,
                    children: node.children.len(),
                })?;
            vec![self.execute(ctx, &node.children[index], payload).await?]
        };

        self.aggregate(ctx, node, results).await
    }

    /// Dispatch every child concurrently and await them all. Results are
    /// ordered by child index, not completion. On failure the error of the
    /// lowest-index failing child is surfaced; later failures are logged and
    /// discarded, and no partial result leaves this function.
    async fn fan_out(
        &self,
        ctx: &RequestContext,
        node: &Arc<PredictiveUnit>,
        payload: SharedPayload,
    ) -> ExecutorResult<Vec<SharedPayload>> {
        let mut tasks = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let engine = self.clone();
            let ctx = ctx.clone();
            let child = Arc::clone(child);
            let payload = payload.clone();
            tasks.push(tokio::spawn(async move {
                engine.execute(&ctx, &child, payload).await
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        let mut first_error: Option<ExecutorError> = None;
        for (index, task) in tasks.into_iter().enumerate() {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(child = index, error = %e, "fan-out task failed to join");
                    Err(ExecutorError::Canceled)
                }
            };
            match result {
                Ok(payload) => results.push(payload),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        tracing::warn!(child = index, error = %e, "discarding sibling failure");
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}
