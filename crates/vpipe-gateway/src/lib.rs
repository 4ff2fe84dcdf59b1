//! Gateway process for the vpipe transcoding pipeline.
//!
//! This crate provides:
//! - The monotonic per-video status registry with TTL eviction
//! - Per-video rooms with live push and recap-on-join over WebSocket
//! - The gRPC status sink the worker pushes into
//! - Upload/transcode webhooks and the watch lookup

pub mod config;
pub mod error;
pub mod registry;
pub mod routes;
pub mod rpc;
pub mod state;
pub mod ws;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use registry::StatusRegistry;
pub use routes::create_router;
pub use rpc::StatusRpc;
pub use state::AppState;
