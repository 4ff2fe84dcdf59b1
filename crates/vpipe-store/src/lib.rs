//! Durable video lifecycle store.
//!
//! One record per [`vpipe_models::VideoId`], created at submission and
//! expiring 7 days later regardless of outcome. The Redis-backed
//! implementation is the production store; the in-memory one backs
//! tests and the consumer's fakes.

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryVideoStore;
pub use redis_store::RedisVideoStore;
pub use store::{StoreConfig, VideoStore};
