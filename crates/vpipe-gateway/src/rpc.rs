//! gRPC status sink: the worker's bridge calls land here.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::debug;

use vpipe_models::{VideoId, VideoStatus};
use vpipe_proto::{EmitStatusRequest, EmitStatusResponse, VideoStatusService};

use crate::registry::StatusRegistry;

/// `VideoStatusService` implementation feeding the registry.
pub struct StatusRpc {
    registry: Arc<StatusRegistry>,
}

impl StatusRpc {
    pub fn new(registry: Arc<StatusRegistry>) -> Self {
        Self { registry }
    }
}

#[tonic::async_trait]
impl VideoStatusService for StatusRpc {
    async fn emit_status(
        &self,
        request: Request<EmitStatusRequest>,
    ) -> Result<Response<EmitStatusResponse>, Status> {
        let req = request.into_inner();

        let status: VideoStatus = req
            .status
            .parse()
            .map_err(|e: vpipe_models::video::ParseStatusError| {
                Status::invalid_argument(e.to_string())
            })?;
        let video_id = VideoId::from(req.video_id);

        debug!("Bridge push for video {}: {}", video_id, status);

        let accepted = self
            .registry
            .push_status(video_id.clone(), status, req.attributes)
            .await;

        // A stale push is not an error to the caller; the registry
        // already holds a newer status.
        Ok(Response::new(EmitStatusResponse {
            success: true,
            message: if accepted {
                format!("Emitted status update for video {}", video_id)
            } else {
                format!("Dropped stale status update for video {}", video_id)
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[tokio::test]
    async fn test_emit_status_updates_registry() {
        let registry = Arc::new(StatusRegistry::new(Duration::ZERO));
        let rpc = StatusRpc::new(Arc::clone(&registry));

        let mut attributes = HashMap::new();
        attributes.insert("error".to_string(), "boom".to_string());

        let response = rpc
            .emit_status(Request::new(EmitStatusRequest {
                video_id: "v1".to_string(),
                status: "failed".to_string(),
                attributes,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.success);
        let record = registry.last_status(&VideoId::from("v1")).await.unwrap();
        assert_eq!(record.status, VideoStatus::Failed);
        assert_eq!(record.attributes.get("error").unwrap(), "boom");
    }

    #[tokio::test]
    async fn test_emit_status_rejects_unknown_status() {
        let registry = Arc::new(StatusRegistry::new(Duration::ZERO));
        let rpc = StatusRpc::new(registry);

        let result = rpc
            .emit_status(Request::new(EmitStatusRequest {
                video_id: "v1".to_string(),
                status: "exploded".to_string(),
                attributes: HashMap::new(),
            }))
            .await;

        let status = result.unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }
}
