//! Transcode worker binary.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vpipe_queue::WorkQueue;
use vpipe_store::RedisVideoStore;
use vpipe_worker::{Consumer, DockerTranscoder, GrpcStatusBridge, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vpipe=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vpipe-worker");

    // Load configuration
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    // Create queue client
    let queue = match WorkQueue::from_env() {
        Ok(q) => Arc::new(q),
        Err(e) => {
            error!("Failed to create work queue: {}", e);
            std::process::exit(1);
        }
    };

    // Create durable store
    let store = match RedisVideoStore::from_env() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create video store: {}", e);
            std::process::exit(1);
        }
    };

    let bridge = Arc::new(GrpcStatusBridge::new(
        config.bridge_endpoint.clone(),
        config.bridge_timeout,
    ));
    let step = Arc::new(DockerTranscoder::new(&config));

    let consumer = Consumer::new(config, queue, store, bridge, step);

    // Wire ctrl_c to the cancellation token
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = consumer.run(shutdown_rx).await {
        error!("Consumer error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
