use thiserror::Error;

/// Executor-level errors. Everything here scopes to a single request except
/// the graph and configuration variants, which can only surface at startup.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Backend call to {url} failed with status {status}")]
    BackendHttp { status: u16, url: String },
    #[error("Backend call to {url} failed: {cause}")]
    BackendTransport { url: String, cause: String },
    #[error("Route response contained no routes")]
    RouteEmpty,
    #[error("Route index {index} out of range for {children} children")]
    RouteOutOfRange { index: i64, children: usize },
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),
    #[error("Combine input is not JSON")]
    NotJson,
    #[error("Request canceled")]
    Canceled,
    #[error("Request deadline exceeded")]
    DeadlineExceeded,
    #[error("Unit {node} not ready: {reason}")]
    NotReady { node: String, reason: String },
    #[error("Graph parse error: {0}")]
    GraphParse(String),
    #[error("Graph build error: {0}")]
    GraphBuild(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_error_display() {
        assert_eq!(
            ExecutorError::MalformedPayload("bad json".into()).to_string(),
            "Malformed payload: bad json"
        );
        assert_eq!(
            ExecutorError::BackendHttp {
                status: 500,
                url: "http://m:9000/predict".into()
            }
            .to_string(),
            "Backend call to http://m:9000/predict failed with status 500"
        );
        assert_eq!(
            ExecutorError::BackendTransport {
                url: "http://m:9000/predict".into(),
                cause: "connection refused".into()
            }
            .to_string(),
            "Backend call to http://m:9000/predict failed: connection refused"
        );
        assert_eq!(
            ExecutorError::RouteEmpty.to_string(),
            "Route response contained no routes"
        );
        assert_eq!(
            ExecutorError::RouteOutOfRange {
                index: 3,
                children: 2
            }
            .to_string(),
            "Route index 3 out of range for 2 children"
        );
        assert_eq!(
            ExecutorError::UnknownProtocol("grpc-web".into()).to_string(),
            "Unknown protocol: grpc-web"
        );
        assert_eq!(
            ExecutorError::NotJson.to_string(),
            "Combine input is not JSON"
        );
        assert_eq!(ExecutorError::Canceled.to_string(), "Request canceled");
        assert_eq!(
            ExecutorError::DeadlineExceeded.to_string(),
            "Request deadline exceeded"
        );
        assert_eq!(
            ExecutorError::NotReady {
                node: "m".into(),
                reason: "dial failed".into()
            }
            .to_string(),
            "Unit m not ready: dial failed"
        );
    }
}
