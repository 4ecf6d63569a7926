//! Runtime settings, parsed from flags or environment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::client::Protocol;
use crate::error::{ExecutorError, ExecutorResult};
use crate::graph::{parse_graph, PredictiveUnit};

#[derive(Debug, Parser)]
#[command(name = "infergraph", about = "Inference graph executor sidecar")]
pub struct Settings {
    /// Wire dialect spoken to every backend.
    #[arg(long, env = "INFERGRAPH_PROTOCOL", value_enum, default_value_t = Protocol::Seldon)]
    pub protocol: Protocol,

    /// Deployment name, used as an instrumentation label.
    #[arg(long, env = "INFERGRAPH_DEPLOYMENT_NAME", default_value = "default")]
    pub deployment_name: String,

    /// Path to the JSON graph document handed down by the control plane.
    #[arg(long, env = "INFERGRAPH_GRAPH_FILE")]
    pub graph_file: PathBuf,

    /// HTTP frontend port.
    #[arg(long, env = "INFERGRAPH_HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,

    /// gRPC frontend port.
    #[arg(long, env = "INFERGRAPH_GRPC_PORT", default_value_t = 5000)]
    pub grpc_port: u16,

    /// Mount only the probe routes.
    #[arg(long, env = "INFERGRAPH_PROBES_ONLY")]
    pub probes_only: bool,

    /// Timeout applied to each outbound backend call.
    #[arg(long, env = "INFERGRAPH_BACKEND_TIMEOUT_SECS", default_value_t = 30)]
    pub backend_timeout_secs: u64,

    /// Cap on encoded gRPC message size.
    #[arg(long, env = "INFERGRAPH_MAX_GRPC_MESSAGE_BYTES", default_value_t = 100 * 1024 * 1024)]
    pub max_grpc_message_bytes: usize,
}

impl Settings {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// Read and build the predictive-unit tree.
    pub fn load_graph(&self) -> ExecutorResult<Arc<PredictiveUnit>> {
        let document = std::fs::read_to_string(&self.graph_file).map_err(|e| {
            ExecutorError::Config(format!("cannot read {}: {e}", self.graph_file.display()))
        })?;
        parse_graph(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings =
            Settings::try_parse_from(["infergraph", "--graph-file", "/tmp/graph.json"]).unwrap();
        assert_eq!(settings.protocol, Protocol::Seldon);
        assert_eq!(settings.deployment_name, "default");
        assert_eq!(settings.http_port, 8080);
        assert_eq!(settings.grpc_port, 5000);
        assert!(!settings.probes_only);
        assert_eq!(settings.backend_timeout(), Duration::from_secs(30));
        assert_eq!(settings.max_grpc_message_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn test_settings_tensorflow_protocol() {
        let settings = Settings::try_parse_from([
            "infergraph",
            "--graph-file",
            "/tmp/graph.json",
            "--protocol",
            "tensorflow",
            "--deployment-name",
            "iris-prod",
            "--probes-only",
        ])
        .unwrap();
        assert_eq!(settings.protocol, Protocol::Tensorflow);
        assert_eq!(settings.deployment_name, "iris-prod");
        assert!(settings.probes_only);
    }

    #[test]
    fn test_settings_require_graph_file() {
        assert!(Settings::try_parse_from(["infergraph"]).is_err());
    }
}
