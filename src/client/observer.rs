//! Per-call instrumentation hook.
//!
//! The clients report every outbound call here. The default observer emits a
//! structured tracing event; deployments that scrape metrics can install
//! their own implementation over the same labels.

use std::time::Duration;

use crate::graph::Endpoint;

/// Labels for one outbound backend call.
#[derive(Debug)]
pub struct CallInfo<'a> {
    pub deployment: &'a str,
    pub model: &'a str,
    pub method: &'a str,
    pub endpoint: &'a Endpoint,
    /// Container image of the unit, when the graph declares one.
    pub image: Option<&'a str>,
}

pub trait CallObserver: Send + Sync {
    fn observe(&self, info: &CallInfo<'_>, elapsed: Duration, success: bool);
}

/// Default observer: one debug event per call.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn observe(&self, info: &CallInfo<'_>, elapsed: Duration, success: bool) {
        tracing::debug!(
            deployment = info.deployment,
            model = info.model,
            method = info.method,
            endpoint = %info.endpoint,
            image = info.image.unwrap_or(""),
            elapsed_ms = elapsed.as_millis() as u64,
            success,
            "backend call"
        );
    }
}
