use std::sync::Arc;

use crate::error::{ExecutorError, ExecutorResult};

use super::schema::UnitSchema;
use super::types::{Endpoint, PredictiveUnit};

/// Build the runtime predictive-unit tree from its deserialized schema.
///
/// Validates names, deduplicates declared methods preserving order, and wraps
/// children in `Arc` so fan-out tasks can hold them without cloning subtrees.
pub fn build_graph(schema: UnitSchema) -> ExecutorResult<Arc<PredictiveUnit>> {
    build_unit(schema)
}

fn build_unit(schema: UnitSchema) -> ExecutorResult<Arc<PredictiveUnit>> {
    if schema.name.is_empty() {
        return Err(ExecutorError::GraphBuild(
            "predictive unit with empty name".into(),
        ));
    }

    let mut methods = Vec::new();
    for method in schema.methods.unwrap_or_default() {
        if !methods.contains(&method) {
            methods.push(method);
        }
    }

    let children = schema
        .children
        .into_iter()
        .map(build_unit)
        .collect::<ExecutorResult<Vec<_>>>()?;

    Ok(Arc::new(PredictiveUnit {
        name: schema.name,
        kind: schema.kind,
        methods,
        implementation: schema.implementation,
        endpoint: Endpoint {
            host: schema.endpoint.service_host,
            port: schema.endpoint.service_port,
        },
        weight: schema.weight,
        image: schema.image,
        children,
    }))
}

/// Parse a graph document and build the runtime tree in one step.
pub fn parse_graph(document: &str) -> ExecutorResult<Arc<PredictiveUnit>> {
    let schema: UnitSchema =
        serde_json::from_str(document).map_err(|e| ExecutorError::GraphParse(e.to_string()))?;
    build_graph(schema)
}
