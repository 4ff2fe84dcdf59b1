//! Gateway server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tonic::transport::Server;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vpipe_gateway::{create_router, AppState, GatewayConfig, StatusRpc};
use vpipe_proto::VideoStatusServiceServer;

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

    info!("Starting vpipe-gateway");

    // Load configuration
    let config = GatewayConfig::from_env();
    info!(
        "Gateway config: host={}, port={}, grpc={}",
        config.host, config.port, config.grpc_addr
    );

    // Create application state
    let state = match AppState::new(config.clone()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create application state: {}", e);
            std::process::exit(1);
        }
    };

    // Make sure the queue's consumer group exists before webhooks enqueue
    if let Err(e) = state.queue.init().await {
        error!("Failed to initialize work queue: {}", e);
        std::process::exit(1);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Registry sweep task
    let sweeper = tokio::spawn(Arc::clone(&state.registry).run_sweeper(
        config.sweep_interval,
        config.record_ttl,
        shutdown_rx,
    ));

    // Status bridge gRPC server
    let grpc_addr: SocketAddr = config
        .grpc_addr
        .parse()
        .expect("Invalid gRPC bind address");
    let rpc = StatusRpc::new(Arc::clone(&state.registry));
    let mut grpc_shutdown = shutdown_tx.subscribe();
    let grpc_task = tokio::spawn(async move {
        info!("Status bridge listening on {}", grpc_addr);
        Server::builder()
            .add_service(VideoStatusServiceServer::new(rpc))
            .serve_with_shutdown(grpc_addr, async move {
                let _ = grpc_shutdown.changed().await;
            })
            .await
    });

    // HTTP/WS server
    let app = create_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Stop the sweeper and the gRPC server
    let _ = shutdown_tx.send(true);
    if let Err(e) = grpc_task.await.expect("gRPC task panicked") {
        error!("gRPC server error: {}", e);
    }
    sweeper.await.ok();

    info!("Gateway shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
