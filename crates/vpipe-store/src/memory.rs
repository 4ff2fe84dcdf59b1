//! In-memory video store for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use vpipe_models::{VideoId, VideoPatch, VideoRecord};

use crate::error::StoreResult;
use crate::store::VideoStore;

/// Map-backed store with no expiry.
#[derive(Default)]
pub struct MemoryVideoStore {
    records: RwLock<HashMap<VideoId, VideoRecord>>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn create(&self, record: VideoRecord) -> StoreResult<()> {
        self.records
            .write()
            .await
            .insert(record.video_id.clone(), record);
        Ok(())
    }

    async fn upsert(&self, video_id: &VideoId, patch: VideoPatch) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records.entry(video_id.clone()).or_insert_with(|| VideoRecord {
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
        });
        record.apply(&patch);
        Ok(())
    }

    async fn find_one(&self, video_id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        Ok(self.records.read().await.get(video_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpipe_models::VideoState;

    #[tokio::test]
    async fn test_create_then_patch() {
        let store = MemoryVideoStore::new();
        let id = VideoId::from("v1");
        store
            .create(VideoRecord::new(id.clone(), "My video"))
            .await
            .unwrap();

        store
            .upsert(&id, VideoPatch::state(VideoState::Queued).with_org_video_url("s3://src"))
            .await
            .unwrap();

        let record = store.find_one(&id).await.unwrap().unwrap();
        assert_eq!(record.state, VideoState::Queued);
        assert_eq!(record.org_video_url.as_deref(), Some("s3://src"));
        assert_eq!(record.title.as_deref(), Some("My video"));
    }

    #[tokio::test]
    async fn test_upsert_creates_when_missing() {
        let store = MemoryVideoStore::new();
        let id = VideoId::from("ghost");
        store
            .upsert(&id, VideoPatch::state(VideoState::Processing))
            .await
            .unwrap();
        let record = store.find_one(&id).await.unwrap().unwrap();
        assert_eq!(record.state, VideoState::Processing);
    }

    #[tokio::test]
    async fn test_find_one_missing() {
        let store = MemoryVideoStore::new();
        assert!(store.find_one(&VideoId::from("nope")).await.unwrap().is_none());
    }
}
