//! Redis-backed video store.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use vpipe_models::{VideoId, VideoPatch, VideoRecord};

use crate::error::StoreResult;
use crate::store::{StoreConfig, VideoStore};

/// Video store holding one JSON record per key with a creation-anchored
/// TTL.
pub struct RedisVideoStore {
    client: redis::Client,
    config: StoreConfig,
}

impl RedisVideoStore {
    /// Create a new store.
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(StoreConfig::from_env())
    }

    fn key(&self, video_id: &VideoId) -> String {
        format!("{}:{}", self.config.key_prefix, video_id)
    }

    async fn write(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        record: &VideoRecord,
        fresh: bool,
    ) -> StoreResult<()> {
        let key = self.key(&record.video_id);
        let payload = serde_json::to_string(record)?;

        if fresh {
            redis::cmd("SET")
                .arg(&key)
                .arg(&payload)
                .arg("EX")
                .arg(self.config.record_ttl.as_secs())
                .query_async::<()>(conn)
                .await?;
        } else {
            // KEEPTTL keeps expiry anchored at creation time
            redis::cmd("SET")
                .arg(&key)
                .arg(&payload)
                .arg("KEEPTTL")
                .query_async::<()>(conn)
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl VideoStore for RedisVideoStore {
    async fn create(&self, record: VideoRecord) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        debug!("Creating video record {}", record.video_id);
        self.write(&mut conn, &record, true).await
    }

    async fn upsert(&self, video_id: &VideoId, patch: VideoPatch) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let existing: Option<String> = redis::cmd("GET")
            .arg(self.key(video_id))
            .query_async(&mut conn)
            .await?;

        match existing {
            Some(payload) => {
                let mut record: VideoRecord = serde_json::from_str(&payload)?;
                record.apply(&patch);
                self.write(&mut conn, &record, false).await
            }
            None => {
                warn!("Upsert for unknown video {}, creating minimal record", video_id);
                let mut record = VideoRecord {
                    video_id: video_id.clone(),
                    state: Default::default(),
                    title: None,
                    description: None,
                    url: None,
                    org_video_url: None,
                    error: None,
                    created_at: Utc::now(),
                    processing_started_at: None,
                    processing_ended_at: None,
                };
                record.apply(&patch);
                self.write(&mut conn, &record, true).await
            }
        }
    }

    async fn find_one(&self, video_id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload: Option<String> = redis::cmd("GET")
            .arg(self.key(video_id))
            .query_async(&mut conn)
            .await?;

        match payload {
            Some(p) => Ok(Some(serde_json::from_str(&p)?)),
            None => Ok(None),
        }
    }
}
