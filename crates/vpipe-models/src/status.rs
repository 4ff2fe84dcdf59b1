//! Status records and the `videoStatus` wire event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::video::{VideoId, VideoStatus};

/// Last-known status of a video, as held by the gateway registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub video_id: VideoId,
    pub status: VideoStatus,
    pub sequence: u32,
    pub timestamp: DateTime<Utc>,
    /// Open key/value bag: error text, final url, title, ...
    pub attributes: HashMap<String, String>,
}

impl StatusRecord {
    pub fn new(video_id: VideoId, status: VideoStatus, attributes: HashMap<String, String>) -> Self {
        Self {
            video_id,
            status,
            sequence: status.sequence(),
            timestamp: Utc::now(),
            attributes,
        }
    }

    /// Build the wire event for this record.
    pub fn to_event(&self, is_recap: bool) -> StatusEvent {
        StatusEvent {
            video_id: self.video_id.clone(),
            status: self.status,
            sequence: self.sequence,
            timestamp: self.timestamp,
            attributes: self.attributes.clone(),
            is_recap: is_recap.then_some(true),
        }
    }
}

/// The single `videoStatus` event pushed to subscribers.
///
/// Attributes are flattened into the top level, matching the shape
/// `{videoId, status, sequence, timestamp, ...attributes, isRecap?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub video_id: VideoId,
    pub status: VideoStatus,
    pub sequence: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub attributes: HashMap<String, String>,
    /// Present (true) only on the replay delivered to a late joiner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_recap: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_flattens_attributes() {
        let mut attrs = HashMap::new();
        attrs.insert("url".to_string(), "https://cdn/master.m3u8".to_string());
        let record = StatusRecord::new(VideoId::from("v1"), VideoStatus::Live, attrs);
        let json = serde_json::to_string(&record.to_event(false)).unwrap();
        assert!(json.contains("\"videoId\":\"v1\""));
        assert!(json.contains("\"status\":\"live\""));
        assert!(json.contains("\"sequence\":4"));
        assert!(json.contains("\"url\":\"https://cdn/master.m3u8\""));
        assert!(!json.contains("isRecap"));
    }

    #[test]
    fn test_recap_flag_serialized_only_when_set() {
        let record = StatusRecord::new(VideoId::from("v2"), VideoStatus::Processing, HashMap::new());
        let json = serde_json::to_string(&record.to_event(true)).unwrap();
        assert!(json.contains("\"isRecap\":true"));
    }
}
