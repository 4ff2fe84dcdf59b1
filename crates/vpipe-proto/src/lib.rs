//! Generated gRPC types for the status bridge.

pub mod videostatus {
    pub mod v1 {
        tonic::include_proto!("videostatus.v1");
    }
}

pub use videostatus::v1::video_status_service_client::VideoStatusServiceClient;
pub use videostatus::v1::video_status_service_server::{
    VideoStatusService, VideoStatusServiceServer,
};
pub use videostatus::v1::{EmitStatusRequest, EmitStatusResponse};
