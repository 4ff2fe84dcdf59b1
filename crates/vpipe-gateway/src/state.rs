//! Application state.

use std::sync::Arc;

use vpipe_queue::WorkQueue;
use vpipe_store::{RedisVideoStore, VideoStore};

use crate::config::GatewayConfig;
use crate::registry::StatusRegistry;

/// Shared gateway state.
#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub registry: Arc<StatusRegistry>,
    pub store: Arc<dyn VideoStore>,
    pub queue: Arc<WorkQueue>,
}

impl AppState {
    /// Create new application state from environment-backed services.
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let registry = Arc::new(StatusRegistry::new(config.fanout_delay));
        let store = Arc::new(RedisVideoStore::from_env()?);
        let queue = Arc::new(WorkQueue::from_env()?);

        Ok(Self {
            config,
            registry,
            store,
            queue,
        })
    }
}
