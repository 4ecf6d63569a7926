//! Graph construction and representation.
//!
//! The predictive-unit tree is built from a deserialized [`UnitSchema`]
//! by [`build_graph`]. It is created once at startup, shared read-only across
//! requests, and walked by the [`Executor`](crate::engine::Executor).

pub mod builder;
pub mod ready;
pub mod schema;
pub mod types;

pub use builder::{build_graph, parse_graph};
pub use ready::ready;
pub use schema::{EndpointSchema, UnitSchema};
pub use types::{Endpoint, PredictiveUnit, UnitImplementation, UnitKind, UnitMethod};
