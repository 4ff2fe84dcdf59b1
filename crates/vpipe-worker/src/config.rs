//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Blocking-poll duration on an empty queue, also the backoff
    /// after a consume error
    pub poll_backoff: Duration,
    /// Hard wall-clock deadline for the external transcode step
    pub processing_timeout: Duration,
    /// Container image running the transcode step
    pub transcoder_image: String,
    /// Exact token the step must print on stdout to count as success
    pub success_token: String,
    /// Status bridge endpoint (gateway gRPC server)
    pub bridge_endpoint: String,
    /// Per-call bridge RPC timeout
    pub bridge_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_backoff: Duration::from_secs(5),
            processing_timeout: Duration::from_secs(20 * 60),
            transcoder_image: "video-processor".to_string(),
            success_token: "SUCCESS".to_string(),
            bridge_endpoint: "http://localhost:50051".to_string(),
            bridge_timeout: Duration::from_secs(10),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_backoff: Duration::from_secs(
                std::env::var("WORKER_POLL_BACKOFF_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            processing_timeout: Duration::from_secs(
                std::env::var("WORKER_PROCESSING_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20 * 60),
            ),
            transcoder_image: std::env::var("WORKER_TRANSCODER_IMAGE")
                .unwrap_or(defaults.transcoder_image),
            success_token: std::env::var("WORKER_SUCCESS_TOKEN").unwrap_or(defaults.success_token),
            bridge_endpoint: std::env::var("BRIDGE_ADDRESS").unwrap_or(defaults.bridge_endpoint),
            bridge_timeout: Duration::from_secs(
                std::env::var("BRIDGE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}
