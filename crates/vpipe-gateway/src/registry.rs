//! Monotonic per-video status registry with room fan-out.
//!
//! The registry is the single source of truth for "last known status"
//! on the gateway side. Updates are accepted per key when their
//! sequence is >= the stored sequence; Failed always overrides,
//! modeling an unconditional abort. Accepted updates are broadcast to
//! the video's room after a short coalescing delay. Records are swept
//! one hour after their last update regardless of terminal state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info};

use vpipe_models::{StatusEvent, StatusRecord, VideoId, VideoStatus};

/// Capacity of each room's broadcast channel. Slow subscribers lag
/// rather than block the registry.
const ROOM_CHANNEL_CAPACITY: usize = 64;

/// Per-video status map plus subscriber rooms.
pub struct StatusRegistry {
    records: RwLock<HashMap<VideoId, StatusRecord>>,
    rooms: RwLock<HashMap<VideoId, broadcast::Sender<StatusEvent>>>,
    fanout_delay: Duration,
}

impl StatusRegistry {
    pub fn new(fanout_delay: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
            fanout_delay,
        }
    }

    /// Push a status update for a video.
    ///
    /// Returns `true` when the update was accepted. Stale updates
    /// (lower sequence than stored, and not Failed) are dropped
    /// silently. Duplicate pushes of the current status are accepted
    /// and broadcast again; there is no dedup at this layer.
    pub async fn push_status(
        &self,
        video_id: VideoId,
        status: VideoStatus,
        attributes: HashMap<String, String>,
    ) -> bool {
        let record = StatusRecord::new(video_id.clone(), status, attributes);

        {
            let mut records = self.records.write().await;
            if let Some(existing) = records.get(&video_id) {
                if record.sequence < existing.sequence && status != VideoStatus::Failed {
                    debug!(
                        "Skipping out-of-sequence update for {}: {} (stored seq {})",
                        video_id, status, existing.sequence
                    );
                    return false;
                }
            }
            records.insert(video_id.clone(), record.clone());
        }

        // Short delay models fan-out coalescing
        tokio::time::sleep(self.fanout_delay).await;

        if let Some(tx) = self.rooms.read().await.get(&video_id) {
            // A send error just means the room has no subscribers
            let _ = tx.send(record.to_event(false));
        }

        true
    }

    /// Join a video's room.
    ///
    /// Returns the live event stream plus, when a record already
    /// exists, one recap event carrying the last accepted status. A
    /// subscriber joining after eviction gets no recap.
    pub async fn join(
        &self,
        video_id: &VideoId,
    ) -> (broadcast::Receiver<StatusEvent>, Option<StatusEvent>) {
        let rx = {
            let mut rooms = self.rooms.write().await;
            rooms
                .entry(video_id.clone())
                .or_insert_with(|| broadcast::channel(ROOM_CHANNEL_CAPACITY).0)
                .subscribe()
        };

        let recap = self
            .records
            .read()
            .await
            .get(video_id)
            .map(|r| r.to_event(true));

        (rx, recap)
    }

    /// Last accepted record for a video, if not yet evicted.
    pub async fn last_status(&self, video_id: &VideoId) -> Option<StatusRecord> {
        self.records.read().await.get(video_id).cloned()
    }

    /// Remove records last updated before `cutoff` and rooms without
    /// subscribers. Returns the number of records evicted.
    pub async fn sweep(&self, cutoff: DateTime<Utc>) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.timestamp >= cutoff);
        let evicted = before - records.len();
        drop(records);

        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, tx| tx.receiver_count() > 0);

        if evicted > 0 {
            info!("Swept {} stale status records", evicted);
        }
        evicted
    }

    /// Periodic sweep task. Runs until `shutdown` flips to true.
    pub async fn run_sweeper(
        self: Arc<Self>,
        interval: Duration,
        record_ttl: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Registry sweeper stopping");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let cutoff = Utc::now()
                        - chrono::Duration::from_std(record_ttl)
                            .unwrap_or_else(|_| chrono::Duration::hours(1));
                    self.sweep(cutoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> StatusRegistry {
        // No coalescing delay in tests
        StatusRegistry::new(Duration::ZERO)
    }

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_forward_updates_accepted() {
        let reg = registry();
        let id = VideoId::from("v1");

        assert!(reg.push_status(id.clone(), VideoStatus::Queued, HashMap::new()).await);
        assert!(reg.push_status(id.clone(), VideoStatus::Processing, HashMap::new()).await);

        let record = reg.last_status(&id).await.unwrap();
        assert_eq!(record.status, VideoStatus::Processing);
        assert_eq!(record.sequence, 2);
    }

    #[tokio::test]
    async fn test_stale_update_rejected() {
        let reg = registry();
        let id = VideoId::from("v1");

        assert!(reg.push_status(id.clone(), VideoStatus::Processing, HashMap::new()).await);
        assert!(!reg.push_status(id.clone(), VideoStatus::Queued, HashMap::new()).await);

        assert_eq!(reg.last_status(&id).await.unwrap().status, VideoStatus::Processing);
    }

    #[tokio::test]
    async fn test_failed_always_overrides() {
        let reg = registry();
        let id = VideoId::from("v2");

        assert!(reg.push_status(id.clone(), VideoStatus::Processing, HashMap::new()).await);
        assert!(
            reg.push_status(id.clone(), VideoStatus::Failed, attrs(&[("error", "boom")]))
                .await
        );
        // Later Queued push is stale relative to Failed
        assert!(!reg.push_status(id.clone(), VideoStatus::Queued, HashMap::new()).await);

        let record = reg.last_status(&id).await.unwrap();
        assert_eq!(record.status, VideoStatus::Failed);
        assert_eq!(record.attributes.get("error").unwrap(), "boom");
    }

    #[tokio::test]
    async fn test_failed_overrides_live() {
        let reg = registry();
        let id = VideoId::from("v3");

        assert!(reg.push_status(id.clone(), VideoStatus::Live, HashMap::new()).await);
        assert!(reg.push_status(id.clone(), VideoStatus::Failed, HashMap::new()).await);
        assert_eq!(reg.last_status(&id).await.unwrap().status, VideoStatus::Failed);
    }

    #[tokio::test]
    async fn test_recap_on_join() {
        let reg = registry();
        let id = VideoId::from("v1");

        reg.push_status(id.clone(), VideoStatus::Queued, HashMap::new()).await;
        reg.push_status(id.clone(), VideoStatus::Processing, HashMap::new()).await;

        let (_rx, recap) = reg.join(&id).await;
        let recap = recap.expect("expected recap for existing record");
        assert_eq!(recap.status, VideoStatus::Processing);
        assert_eq!(recap.sequence, 2);
        assert_eq!(recap.is_recap, Some(true));
    }

    #[tokio::test]
    async fn test_no_recap_without_record() {
        let reg = registry();
        let (_rx, recap) = reg.join(&VideoId::from("unknown")).await;
        assert!(recap.is_none());
    }

    #[tokio::test]
    async fn test_live_push_reaches_subscriber() {
        let reg = registry();
        let id = VideoId::from("v1");

        let (mut rx, recap) = reg.join(&id).await;
        assert!(recap.is_none());

        reg.push_status(id.clone(), VideoStatus::Queued, HashMap::new()).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.status, VideoStatus::Queued);
        assert_eq!(event.is_recap, None);
    }

    #[tokio::test]
    async fn test_duplicate_push_broadcasts_each_time() {
        let reg = registry();
        let id = VideoId::from("v1");

        let (mut rx, _) = reg.join(&id).await;

        assert!(reg.push_status(id.clone(), VideoStatus::Processing, HashMap::new()).await);
        assert!(reg.push_status(id.clone(), VideoStatus::Processing, HashMap::new()).await);

        assert_eq!(rx.recv().await.unwrap().status, VideoStatus::Processing);
        assert_eq!(rx.recv().await.unwrap().status, VideoStatus::Processing);
        assert_eq!(reg.last_status(&id).await.unwrap().status, VideoStatus::Processing);
    }

    #[tokio::test]
    async fn test_sweep_evicts_old_records() {
        let reg = registry();
        let id = VideoId::from("v1");

        reg.push_status(id.clone(), VideoStatus::Live, HashMap::new()).await;

        // Cutoff in the future evicts everything
        let evicted = reg.sweep(Utc::now() + chrono::Duration::seconds(1)).await;
        assert_eq!(evicted, 1);

        assert!(reg.last_status(&id).await.is_none());
        let (_rx, recap) = reg.join(&id).await;
        assert!(recap.is_none());
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_records() {
        let reg = registry();
        let id = VideoId::from("v1");

        reg.push_status(id.clone(), VideoStatus::Queued, HashMap::new()).await;
        let evicted = reg.sweep(Utc::now() - chrono::Duration::hours(1)).await;
        assert_eq!(evicted, 0);
        assert!(reg.last_status(&id).await.is_some());
    }

    #[tokio::test]
    async fn test_scenario_late_join_recap() {
        // push(v1, Queued) -> push(v1, Processing) -> join -> one recap
        let reg = registry();
        let id = VideoId::from("v1");

        reg.push_status(id.clone(), VideoStatus::Queued, HashMap::new()).await;
        reg.push_status(id.clone(), VideoStatus::Processing, HashMap::new()).await;

        let (mut rx, recap) = reg.join(&id).await;
        let recap = recap.unwrap();
        assert_eq!(recap.status, VideoStatus::Processing);
        assert_eq!(recap.sequence, 2);
        assert_eq!(recap.is_recap, Some(true));

        // Nothing else pending on the live stream
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_scenario_failed_then_stale_queued() {
        // push(v2, Processing) -> push(v2, Failed{error}) -> push(v2, Queued)
        let reg = registry();
        let id = VideoId::from("v2");

        reg.push_status(id.clone(), VideoStatus::Processing, HashMap::new()).await;
        reg.push_status(id.clone(), VideoStatus::Failed, attrs(&[("error", "boom")])).await;
        assert!(!reg.push_status(id.clone(), VideoStatus::Queued, HashMap::new()).await);

        let record = reg.last_status(&id).await.unwrap();
        assert_eq!(record.status, VideoStatus::Failed);
        assert_eq!(record.attributes.get("error").unwrap(), "boom");
    }
}
