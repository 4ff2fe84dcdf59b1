//! Video identifiers and lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for one video's processing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Interactive processing status, as seen by viewers.
///
/// Each status has a fixed ordinal used to reject stale or out-of-order
/// updates; see [`VideoStatus::sequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Waiting in the work queue
    Queued,
    /// Transcode step in progress
    Processing,
    /// Transcode finished, output being published
    ProcessingCompletePublishing,
    /// Playback URL available
    Live,
    /// Processing failed
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Queued => "queued",
            VideoStatus::Processing => "processing",
            VideoStatus::ProcessingCompletePublishing => "processing_complete_publishing",
            VideoStatus::Live => "live",
            VideoStatus::Failed => "failed",
        }
    }

    /// Fixed ordinal of this status.
    ///
    /// An update is accepted only when its sequence is >= the stored
    /// sequence, except Failed which always wins.
    pub fn sequence(&self) -> u32 {
        match self {
            VideoStatus::Queued => 1,
            VideoStatus::Processing => 2,
            VideoStatus::ProcessingCompletePublishing => 3,
            VideoStatus::Live => 4,
            VideoStatus::Failed => 5,
        }
    }

    /// Terminal statuses: no further forward transition is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Live | VideoStatus::Failed)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown video status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for VideoStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(VideoStatus::Queued),
            "processing" => Ok(VideoStatus::Processing),
            "processing_complete_publishing" => Ok(VideoStatus::ProcessingCompletePublishing),
            "live" => Ok(VideoStatus::Live),
            "failed" => Ok(VideoStatus::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Durable-store lifecycle state.
///
/// Superset of [`VideoStatus`]: records are created as `PendingUpload`
/// before the video enters the queue, a state that never reaches the
/// interactive registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoState {
    /// Record created at submission, upload not yet confirmed
    #[default]
    PendingUpload,
    Queued,
    Processing,
    ProcessingCompletePublishing,
    Live,
    Failed,
}

impl VideoState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoState::PendingUpload => "pending_upload",
            VideoState::Queued => "queued",
            VideoState::Processing => "processing",
            VideoState::ProcessingCompletePublishing => "processing_complete_publishing",
            VideoState::Live => "live",
            VideoState::Failed => "failed",
        }
    }

    /// States the consumer's idempotency guard treats as already done.
    ///
    /// Redelivered queue messages for these videos are skipped without
    /// re-running the transcode step. Failed is deliberately excluded:
    /// a redelivered message for a failed video runs again.
    pub fn is_success_terminal(&self) -> bool {
        matches!(
            self,
            VideoState::ProcessingCompletePublishing | VideoState::Live
        )
    }
}

impl From<VideoStatus> for VideoState {
    fn from(status: VideoStatus) -> Self {
        match status {
            VideoStatus::Queued => VideoState::Queued,
            VideoStatus::Processing => VideoState::Processing,
            VideoStatus::ProcessingCompletePublishing => VideoState::ProcessingCompletePublishing,
            VideoStatus::Live => VideoState::Live,
            VideoStatus::Failed => VideoState::Failed,
        }
    }
}

impl FromStr for VideoState {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_upload" => Ok(VideoState::PendingUpload),
            other => VideoStatus::from_str(other).map(VideoState::from),
        }
    }
}

/// Durable video record, keyed by [`VideoId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: VideoId,
    pub state: VideoState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Final playback URL, set when the video goes live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Presigned URL of the uploaded source object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_ended_at: Option<DateTime<Utc>>,
}

impl VideoRecord {
    /// Create a fresh record in the `PendingUpload` state.
    pub fn new(video_id: VideoId, title: impl Into<String>) -> Self {
        Self {
            video_id,
            state: VideoState::PendingUpload,
            title: Some(title.into()),
            description: None,
            url: None,
            org_video_url: None,
            error: None,
            created_at: Utc::now(),
            processing_started_at: None,
            processing_ended_at: None,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &VideoPatch) {
        if let Some(state) = patch.state {
            self.state = state;
        }
        if let Some(url) = &patch.url {
            self.url = Some(url.clone());
        }
        if let Some(org) = &patch.org_video_url {
            self.org_video_url = Some(org.clone());
        }
        if let Some(error) = &patch.error {
            self.error = error.clone();
        }
        if let Some(ts) = patch.processing_started_at {
            self.processing_started_at = Some(ts);
        }
        if let Some(ts) = patch.processing_ended_at {
            self.processing_ended_at = Some(ts);
        }
    }
}

/// Partial update applied by `VideoStore::upsert`.
///
/// `error` is doubly optional: `Some(None)` clears a previous error
/// when a retry begins, `None` leaves it untouched.
#[derive(Debug, Clone, Default)]
pub struct VideoPatch {
    pub state: Option<VideoState>,
    pub url: Option<String>,
    pub org_video_url: Option<String>,
    pub error: Option<Option<String>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_ended_at: Option<DateTime<Utc>>,
}

impl VideoPatch {
    pub fn state(state: VideoState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_org_video_url(mut self, url: impl Into<String>) -> Self {
        self.org_video_url = Some(url.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    pub fn started_now(mut self) -> Self {
        self.processing_started_at = Some(Utc::now());
        self
    }

    pub fn ended_now(mut self) -> Self {
        self.processing_ended_at = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_generation() {
        let id1 = VideoId::new();
        let id2 = VideoId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_status_sequence_ordering() {
        assert_eq!(VideoStatus::Queued.sequence(), 1);
        assert_eq!(VideoStatus::Processing.sequence(), 2);
        assert_eq!(VideoStatus::ProcessingCompletePublishing.sequence(), 3);
        assert_eq!(VideoStatus::Live.sequence(), 4);
        assert_eq!(VideoStatus::Failed.sequence(), 5);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            VideoStatus::Queued,
            VideoStatus::Processing,
            VideoStatus::ProcessingCompletePublishing,
            VideoStatus::Live,
            VideoStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<VideoStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<VideoStatus>().is_err());
    }

    #[test]
    fn test_success_terminal_states() {
        assert!(VideoState::ProcessingCompletePublishing.is_success_terminal());
        assert!(VideoState::Live.is_success_terminal());
        assert!(!VideoState::Failed.is_success_terminal());
        assert!(!VideoState::Processing.is_success_terminal());
        assert!(!VideoState::PendingUpload.is_success_terminal());
    }

    #[test]
    fn test_patch_clears_error() {
        let mut record = VideoRecord::new(VideoId::new(), "t");
        record.error = Some("boom".to_string());
        record.apply(&VideoPatch::state(VideoState::Processing).clear_error());
        assert_eq!(record.state, VideoState::Processing);
        assert_eq!(record.error, None);
    }
}
