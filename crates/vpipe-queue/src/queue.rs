//! Work queue backed by Redis Streams.

use redis::AsyncCommands;
use tracing::{debug, info, warn};

use vpipe_models::TranscodeMessage;

use crate::error::{QueueError, QueueResult};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for transcode messages
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vpipe:transcode".to_string(),
            consumer_group: "vpipe:workers".to_string(),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "vpipe:transcode".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "vpipe:workers".to_string()),
        }
    }
}

/// Work queue client.
pub struct WorkQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl WorkQueue {
    /// Create a new work queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Enqueue a transcode message.
    pub async fn enqueue(&self, message: &TranscodeMessage) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(message)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("payload")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        info!(
            "Enqueued transcode job {} with message ID {}",
            message.video_id, message_id
        );

        Ok(message_id)
    }

    /// Acknowledge a message (mark as handled) and delete it.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged message: {}", message_id);
        Ok(())
    }

    /// Consume at most one message from the queue, blocking up to
    /// `block_ms` when the stream is empty.
    ///
    /// Malformed payloads are acked and dropped here so they are never
    /// redelivered; the caller only sees parseable messages.
    pub async fn consume_one(
        &self,
        consumer_name: &str,
        block_ms: u64,
    ) -> QueueResult<Option<(String, TranscodeMessage)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">") // Only new messages
            .query_async(&mut conn)
            .await?;

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();

                match decode_entry(&entry.map) {
                    Ok(message) => {
                        debug!("Consumed transcode job {} from stream", message.video_id);
                        return Ok(Some((message_id, message)));
                    }
                    Err(e) => {
                        warn!("Dropping malformed message {}: {}", message_id, e);
                        self.ack(&message_id).await.ok();
                    }
                }
            }
        }

        Ok(None)
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }
}

/// Decode one stream entry's field map into a transcode message.
fn decode_entry(
    map: &std::collections::HashMap<String, redis::Value>,
) -> QueueResult<TranscodeMessage> {
    match map.get("payload") {
        Some(redis::Value::BulkString(bytes)) => {
            let payload = String::from_utf8_lossy(bytes);
            Ok(serde_json::from_str(&payload)?)
        }
        Some(_) => Err(QueueError::Malformed(
            "payload field is not a string".to_string(),
        )),
        None => Err(QueueError::Malformed("missing payload field".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use vpipe_models::VideoId;

    fn entry(field: &str, value: redis::Value) -> HashMap<String, redis::Value> {
        let mut map = HashMap::new();
        map.insert(field.to_string(), value);
        map
    }

    #[test]
    fn test_decode_valid_payload() {
        let message = TranscodeMessage::new(VideoId::from("v1"), "s3://src", "s3://dst");
        let payload = serde_json::to_vec(&message).unwrap();

        let decoded = decode_entry(&entry("payload", redis::Value::BulkString(payload))).unwrap();
        assert_eq!(decoded.video_id, VideoId::from("v1"));
        assert_eq!(decoded.source_url, "s3://src");
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        let err = decode_entry(&entry(
            "payload",
            redis::Value::BulkString(b"not json".to_vec()),
        ))
        .unwrap_err();
        assert!(matches!(err, QueueError::Json(_)));
    }

    #[test]
    fn test_decode_rejects_non_string_payload() {
        let err = decode_entry(&entry("payload", redis::Value::Int(7))).unwrap_err();
        assert!(matches!(err, QueueError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_missing_payload_field() {
        let err = decode_entry(&entry(
            "other",
            redis::Value::BulkString(b"{}".to_vec()),
        ))
        .unwrap_err();
        assert!(matches!(err, QueueError::Malformed(_)));
    }
}
