//! Gateway configuration.

use std::time::Duration;

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP/WS server host
    pub host: String,
    /// HTTP/WS server port
    pub port: u16,
    /// Bind address for the status bridge gRPC server
    pub grpc_addr: String,
    /// Short delay before each broadcast (fan-out coalescing)
    pub fanout_delay: Duration,
    /// Registry records older than this are swept
    pub record_ttl: Duration,
    /// How often the registry sweep runs
    pub sweep_interval: Duration,
    /// Base URL returned for source uploads
    pub upload_url_base: String,
    /// Base URL the consumer downloads sources from
    pub source_url_base: String,
    /// Base URL the transcoder writes output to
    pub destination_url_base: String,
    /// Base URL playback manifests are served from
    pub playback_url_base: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            grpc_addr: "0.0.0.0:50051".to_string(),
            fanout_delay: Duration::from_millis(100),
            record_ttl: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            upload_url_base: "http://localhost:9000/uploads".to_string(),
            source_url_base: "http://localhost:9000/uploads".to_string(),
            destination_url_base: "http://localhost:9000/processed".to_string(),
            playback_url_base: "http://localhost:9000/processed".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("GATEWAY_HOST").unwrap_or(defaults.host),
            port: std::env::var("GATEWAY_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            grpc_addr: std::env::var("GRPC_ADDRESS").unwrap_or(defaults.grpc_addr),
            fanout_delay: Duration::from_millis(
                std::env::var("FANOUT_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(100),
            ),
            record_ttl: Duration::from_secs(
                std::env::var("REGISTRY_RECORD_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60 * 60),
            ),
            sweep_interval: Duration::from_secs(
                std::env::var("REGISTRY_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60 * 60),
            ),
            upload_url_base: std::env::var("UPLOAD_URL_BASE").unwrap_or(defaults.upload_url_base),
            source_url_base: std::env::var("SOURCE_URL_BASE").unwrap_or(defaults.source_url_base),
            destination_url_base: std::env::var("DESTINATION_URL_BASE")
                .unwrap_or(defaults.destination_url_base),
            playback_url_base: std::env::var("PLAYBACK_URL_BASE")
                .unwrap_or(defaults.playback_url_base),
        }
    }
}
