//! Transcode worker.
//!
//! This crate provides:
//! - The serial queue consumer with its idempotency guard
//! - The external transcode step bounded by a hard timeout
//! - The gRPC status bridge into the gateway registry
//! - Graceful shutdown

pub mod bridge;
pub mod config;
pub mod consumer;
pub mod error;
pub mod transcode;

pub use bridge::{BridgeError, GrpcStatusBridge, StatusSink};
pub use config::WorkerConfig;
pub use consumer::Consumer;
pub use error::{WorkerError, WorkerResult};
pub use transcode::{DockerTranscoder, TranscodeStep};
