//! Serde shape of the graph description consumed at startup.
//!
//! The control plane hands the executor one JSON document describing the
//! predictor graph; this module mirrors that document field for field.
//! [`build_graph`](super::build_graph) turns it into the runtime tree.

use serde::Deserialize;

use super::types::{UnitImplementation, UnitKind, UnitMethod};

/// One predictive unit as written in the graph document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSchema {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<UnitKind>,
    #[serde(default)]
    pub methods: Option<Vec<UnitMethod>>,
    #[serde(default)]
    pub implementation: Option<UnitImplementation>,
    pub endpoint: EndpointSchema,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub children: Vec<UnitSchema>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSchema {
    pub service_host: String,
    pub service_port: u16,
}
