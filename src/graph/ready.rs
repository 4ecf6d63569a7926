use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::{ExecutorError, ExecutorResult};

use super::types::PredictiveUnit;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Walk the tree and probe every reachable endpoint.
///
/// The probe is a TCP connect with a short timeout, so it works for both the
/// REST and the gRPC backend dialects. The first unreachable unit aborts the
/// walk with [`ExecutorError::NotReady`].
pub async fn ready(node: &PredictiveUnit) -> ExecutorResult<()> {
    probe(node).await?;
    for child in &node.children {
        Box::pin(ready(child)).await?;
    }
    Ok(())
}

async fn probe(node: &PredictiveUnit) -> ExecutorResult<()> {
    let address = (node.endpoint.host.as_str(), node.endpoint.port);
    match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(address)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(ExecutorError::NotReady {
            node: node.name.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Err(ExecutorError::NotReady {
            node: node.name.clone(),
            reason: format!("dial to {} timed out", node.endpoint),
        }),
    }
}
