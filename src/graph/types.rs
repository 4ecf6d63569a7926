use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Primary semantic category of a predictive unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitKind {
    Model,
    Transformer,
    OutputTransformer,
    Router,
    Combiner,
    #[serde(other)]
    Unknown,
}

/// Explicit capability declared on a unit, overriding or extending what its
/// kind implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitMethod {
    TransformInput,
    TransformOutput,
    Route,
    Aggregate,
}

/// Engine-builtin behavior selected instead of a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitImplementation {
    RandomAbtest,
    #[serde(other)]
    Unknown,
}

/// Host and port of one backend service. Opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One node of the inference graph: a backend service plus its role in the
/// composition. The tree is immutable after [`build_graph`](super::build_graph)
/// and carries no per-request state.
#[derive(Debug)]
pub struct PredictiveUnit {
    pub name: String,
    pub kind: Option<UnitKind>,
    /// Deduplicated at build time; order preserved.
    pub methods: Vec<UnitMethod>,
    pub implementation: Option<UnitImplementation>,
    pub endpoint: Endpoint,
    /// A/B traffic weight relative to siblings. Missing means uniform.
    pub weight: Option<f64>,
    /// Container image tag, kept for call instrumentation labels.
    pub image: Option<String>,
    pub children: Vec<Arc<PredictiveUnit>>,
}

impl PredictiveUnit {
    pub fn has_method(&self, method: UnitMethod) -> bool {
        self.methods.contains(&method)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Unit name to container image, for call instrumentation labels.
    pub fn image_labels(&self) -> std::collections::HashMap<String, String> {
        let mut labels = std::collections::HashMap::new();
        self.collect_image_labels(&mut labels);
        labels
    }

    fn collect_image_labels(&self, labels: &mut std::collections::HashMap<String, String>) {
        if let Some(image) = &self.image {
            labels.insert(self.name.clone(), image.clone());
        }
        for child in &self.children {
            child.collect_image_labels(labels);
        }
    }
}
