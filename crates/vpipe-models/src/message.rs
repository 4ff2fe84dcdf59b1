//! Queue message payload.

use serde::{Deserialize, Serialize};

use crate::video::VideoId;

/// One transcode job descriptor, as carried on the work queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeMessage {
    /// Video this job belongs to
    pub video_id: VideoId,
    /// Presigned URL of the uploaded source object
    pub source_url: String,
    /// Presigned URL the transcoder writes its output to
    pub destination_url: String,
}

impl TranscodeMessage {
    pub fn new(
        video_id: VideoId,
        source_url: impl Into<String>,
        destination_url: impl Into<String>,
    ) -> Self {
        Self {
            video_id,
            source_url: source_url.into(),
            destination_url: destination_url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_shape() {
        let msg = TranscodeMessage::new(VideoId::from("abc"), "s3://src", "s3://dst");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"videoId\":\"abc\""));
        assert!(json.contains("\"sourceUrl\":\"s3://src\""));
        assert!(json.contains("\"destinationUrl\":\"s3://dst\""));
    }
}
