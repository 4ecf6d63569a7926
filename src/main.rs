use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use infergraph::api::{self, ApiState, InferenceApi};
use infergraph::client::rest::RestClientConfig;
use infergraph::client::{GrpcBackendClient, JsonRestClient, Protocol};
use infergraph::config::Settings;
use infergraph::engine::Executor;
use infergraph::error::{ExecutorError, ExecutorResult};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::parse();
    if let Err(e) = run(settings).await {
        tracing::error!(error = %e, "executor failed");
        std::process::exit(1);
    }
}

async fn run(settings: Settings) -> ExecutorResult<()> {
    let graph = settings.load_graph()?;
    let images = graph.image_labels();

    let rest_client = JsonRestClient::new(
        settings.protocol,
        settings.deployment_name.clone(),
        RestClientConfig {
            default_timeout: settings.backend_timeout(),
            ..Default::default()
        },
    )?
    .with_image_labels(images.clone());
    let state = ApiState {
        engine: Executor::new(Arc::new(rest_client)),
        graph: graph.clone(),
    };
    let router = api::build_router(state, settings.probes_only);

    let http_addr = SocketAddr::from(([0, 0, 0, 0], settings.http_port));
    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .map_err(|e| ExecutorError::Config(format!("cannot bind {http_addr}: {e}")))?;
    tracing::info!(%http_addr, deployment = %settings.deployment_name, "serving HTTP frontend");
    let http_server = axum::serve(listener, router).into_future();

    let serve_grpc = !settings.probes_only && settings.protocol == Protocol::Seldon;
    if !serve_grpc {
        if !settings.probes_only {
            tracing::info!("gRPC frontend disabled: only the native dialect is served over gRPC");
        }
        return tokio::select! {
            result = http_server => result.map_err(|e| ExecutorError::Config(e.to_string())),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                Ok(())
            }
        };
    }

    let grpc_client = GrpcBackendClient::new(
        settings.protocol,
        settings.deployment_name.clone(),
        settings.max_grpc_message_bytes,
    )?
    .with_image_labels(images);
    let grpc_addr = SocketAddr::from(([0, 0, 0, 0], settings.grpc_port));
    tracing::info!(%grpc_addr, "serving gRPC frontend");
    let grpc_server = tonic::transport::Server::builder()
        .add_service(
            InferenceApi::new(Executor::new(Arc::new(grpc_client)), graph)
                .into_server(settings.max_grpc_message_bytes),
        )
        .serve(grpc_addr);

    tokio::select! {
        result = http_server => result.map_err(|e| ExecutorError::Config(e.to_string())),
        result = grpc_server => result.map_err(|e| ExecutorError::Config(e.to_string())),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    }
}
