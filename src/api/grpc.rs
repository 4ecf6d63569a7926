//! gRPC frontend for the native protobuf dialect.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::engine::{Executor, RequestContext};
use crate::error::ExecutorError;
use crate::graph::PredictiveUnit;
use crate::payload::{message_of, MessagePayload, SharedPayload};
use crate::proto::inference_server::{Inference, InferenceServer};
use crate::proto::{Feedback, InferenceMessage};

/// Edge service: `Predict` runs the engine on the graph root; `SendFeedback`
/// is reserved.
pub struct InferenceApi {
    engine: Executor,
    graph: Arc<PredictiveUnit>,
}

impl InferenceApi {
    pub fn new(engine: Executor, graph: Arc<PredictiveUnit>) -> Self {
        Self { engine, graph }
    }

    /// Wrap into a tonic server with the configured message size cap.
    pub fn into_server(self, max_message_bytes: usize) -> InferenceServer<InferenceApi> {
        InferenceServer::new(self)
            .max_decoding_message_size(max_message_bytes)
            .max_encoding_message_size(max_message_bytes)
    }
}

fn request_context(metadata: &tonic::metadata::MetadataMap) -> RequestContext {
    super::context_from(|name| metadata.get(name).and_then(|v| v.to_str().ok()))
}

fn to_status(err: &ExecutorError) -> Status {
    match err {
        ExecutorError::DeadlineExceeded => Status::deadline_exceeded(err.to_string()),
        ExecutorError::Canceled => Status::cancelled(err.to_string()),
        ExecutorError::MalformedPayload(_) => Status::invalid_argument(err.to_string()),
        _ => Status::internal(err.to_string()),
    }
}

#[tonic::async_trait]
impl Inference for InferenceApi {
    async fn predict(
        &self,
        request: Request<InferenceMessage>,
    ) -> Result<Response<InferenceMessage>, Status> {
        let ctx = request_context(request.metadata());
        let payload: SharedPayload = Arc::new(MessagePayload::new(request.into_inner()));
        match self.engine.execute(&ctx, &self.graph, payload).await {
            Ok(out) => {
                let message = message_of(out.as_ref()).map_err(|e| to_status(&e))?.clone();
                Ok(Response::new(message))
            }
            Err(e) => {
                tracing::error!(error = %e, "prediction failed");
                Err(to_status(&e))
            }
        }
    }

    async fn send_feedback(
        &self,
        _request: Request<Feedback>,
    ) -> Result<Response<InferenceMessage>, Status> {
        Err(Status::unimplemented("feedback is not supported"))
    }
}
