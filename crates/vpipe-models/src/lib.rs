//! Shared domain types for the vpipe transcoding pipeline.
//!
//! This crate provides:
//! - Video identifiers and status/state enums
//! - Status records and the `videoStatus` wire event
//! - The queue message payload consumed by the worker

pub mod message;
pub mod status;
pub mod video;

pub use message::TranscodeMessage;
pub use status::{StatusEvent, StatusRecord};
pub use video::{ParseStatusError, VideoId, VideoPatch, VideoRecord, VideoState, VideoStatus};
