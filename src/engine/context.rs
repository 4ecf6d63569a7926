use std::time::{Duration, Instant};

use crate::error::{ExecutorError, ExecutorResult};

/// Per-request context threaded through every engine and backend call.
///
/// Carries the request deadline and any trace headers to propagate on
/// outbound calls. Cheap to clone; one clone per fan-out task.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    trace_headers: Vec<(String, String)>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_trace_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.trace_headers.push((name.into(), value.into()));
        self
    }

    /// Headers to copy onto outbound backend requests.
    pub fn trace_headers(&self) -> &[(String, String)] {
        &self.trace_headers
    }

    /// Time left before the deadline, or `None` when no deadline is set.
    pub fn remaining(&self) -> ExecutorResult<Option<Duration>> {
        match self.deadline {
            None => Ok(None),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    Err(ExecutorError::DeadlineExceeded)
                } else {
                    Ok(Some(deadline - now))
                }
            }
        }
    }

    /// Fail fast when the deadline has already passed.
    pub fn check(&self) -> ExecutorResult<()> {
        self.remaining().map(|_| ())
    }
}
