//! Status bridge: pushes worker-side status transitions into the
//! gateway's registry over gRPC.
//!
//! Bridge failures are non-fatal to the caller. The durable store
//! update has already happened by the time the bridge is called; a
//! lost push only costs one interactive update.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tonic::transport::Endpoint;

use vpipe_models::{VideoId, VideoStatus};
use vpipe_proto::{EmitStatusRequest, VideoStatusServiceClient};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("RPC failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("Rejected by gateway: {0}")]
    Rejected(String),
}

/// Seam for pushing status updates out of the worker process.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn emit(
        &self,
        video_id: &VideoId,
        status: VideoStatus,
        attributes: HashMap<String, String>,
    ) -> Result<(), BridgeError>;
}

/// gRPC-backed bridge, connecting per call to the configured gateway.
pub struct GrpcStatusBridge {
    endpoint: String,
    timeout: Duration,
}

impl GrpcStatusBridge {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[async_trait]
impl StatusSink for GrpcStatusBridge {
    async fn emit(
        &self,
        video_id: &VideoId,
        status: VideoStatus,
        attributes: HashMap<String, String>,
    ) -> Result<(), BridgeError> {
        let channel = Endpoint::from_shared(self.endpoint.clone())
            .map_err(|e| BridgeError::InvalidEndpoint(e.to_string()))?
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .connect()
            .await?;

        let mut client = VideoStatusServiceClient::new(channel);

        let response = client
            .emit_status(EmitStatusRequest {
                video_id: video_id.to_string(),
                status: status.as_str().to_string(),
                attributes,
            })
            .await?
            .into_inner();

        if !response.success {
            return Err(BridgeError::Rejected(response.message));
        }

        Ok(())
    }
}
