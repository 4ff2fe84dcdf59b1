//! Redis Streams work queue for transcode jobs.
//!
//! At-least-once delivery through a consumer group with explicit
//! acknowledgment. Redelivery of already-completed jobs is handled by
//! the consumer's idempotency guard, not by this layer.

pub mod error;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::{QueueConfig, WorkQueue};
