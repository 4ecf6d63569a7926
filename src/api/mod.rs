//! Edge frontends.
//!
//! Thin demuxers: decode one inbound payload, run the engine on the graph
//! root, encode one outbound payload. All graph semantics live in
//! [`crate::engine`].

pub mod grpc;
pub mod http;

pub use grpc::InferenceApi;
pub use http::{build_router, ApiState};

use crate::engine::RequestContext;

/// Inbound headers propagated to every outbound backend call.
pub(crate) const TRACE_HEADERS: [&str; 3] = ["traceparent", "tracestate", "x-request-id"];

pub(crate) fn context_from<'a>(
    mut lookup: impl FnMut(&'static str) -> Option<&'a str>,
) -> RequestContext {
    let mut ctx = RequestContext::new();
    for name in TRACE_HEADERS {
        if let Some(value) = lookup(name) {
            ctx = ctx.with_trace_header(name, value);
        }
    }
    ctx
}
