//! The `VideoStore` seam.

use std::time::Duration;

use async_trait::async_trait;

use vpipe_models::{VideoId, VideoPatch, VideoRecord};

use crate::error::StoreResult;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis URL
    pub redis_url: String,
    /// Key prefix for video records
    pub key_prefix: String,
    /// Record time-to-live, anchored at creation
    pub record_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "vpipe:video".to_string(),
            record_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("STORE_KEY_PREFIX")
                .unwrap_or_else(|_| "vpipe:video".to_string()),
            record_ttl: Duration::from_secs(
                std::env::var("STORE_RECORD_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(7 * 24 * 60 * 60),
            ),
        }
    }
}

/// Durable, video-id-keyed lifecycle store.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Create a record at submission time.
    async fn create(&self, record: VideoRecord) -> StoreResult<()>;

    /// Apply a partial update; creates a minimal record when none
    /// exists (upsert semantics).
    async fn upsert(&self, video_id: &VideoId, patch: VideoPatch) -> StoreResult<()>;

    /// Look up one record.
    async fn find_one(&self, video_id: &VideoId) -> StoreResult<Option<VideoRecord>>;
}
