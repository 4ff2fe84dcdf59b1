//! Serial queue consumer.
//!
//! Exactly one job in flight: the loop pops one message, processes it
//! to a terminal state, acknowledges it, and only then polls again.
//! Errors never terminate the loop; they are logged and followed by a
//! fixed backoff. The idempotency guard against the durable store is
//! the sole defense against at-least-once redelivery.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use vpipe_models::{TranscodeMessage, VideoId, VideoPatch, VideoState, VideoStatus};
use vpipe_queue::WorkQueue;
use vpipe_store::VideoStore;

use crate::bridge::StatusSink;
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::transcode::TranscodeStep;

pub struct Consumer {
    config: WorkerConfig,
    queue: Arc<WorkQueue>,
    store: Arc<dyn VideoStore>,
    bridge: Arc<dyn StatusSink>,
    step: Arc<dyn TranscodeStep>,
    consumer_name: String,
}

impl Consumer {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<WorkQueue>,
        store: Arc<dyn VideoStore>,
        bridge: Arc<dyn StatusSink>,
        step: Arc<dyn TranscodeStep>,
    ) -> Self {
        let consumer_name = format!("worker-{}", Uuid::new_v4());
        Self {
            config,
            queue,
            store,
            bridge,
            step,
            consumer_name,
        }
    }

    /// Run the consume loop until `shutdown` flips to true.
    ///
    /// A worker crash mid-job leaves that video in Processing until
    /// the store TTL or an external monitor intervenes; completed jobs
    /// are protected by the idempotency guard on restart.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> WorkerResult<()> {
        info!("Starting consumer '{}'", self.consumer_name);
        self.queue.init().await?;

        let block_ms = self.config.poll_backoff.as_millis() as u64;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Shutdown signal received, stopping consumer");
                        break;
                    }
                }
                result = self.queue.consume_one(&self.consumer_name, block_ms) => {
                    match result {
                        Ok(Some((message_id, message))) => {
                            // Cancellation mid-job force-kills the
                            // child (kill_on_drop) and skips the ack,
                            // so the message is redelivered.
                            tokio::select! {
                                _ = self.process_message(&message) => {
                                    // Handled after one attempt, whatever the outcome
                                    if let Err(e) = self.queue.ack(&message_id).await {
                                        error!("Failed to ack message {}: {}", message_id, e);
                                    }
                                }
                                _ = wait_for_shutdown(&mut shutdown) => {
                                    warn!("Shutdown during job for video {}", message.video_id);
                                    break;
                                }
                            }
                        }
                        // Empty poll; the blocking read was the backoff
                        Ok(None) => {}
                        Err(e) => {
                            error!("Error consuming queue: {}", e);
                            tokio::time::sleep(self.config.poll_backoff).await;
                        }
                    }
                }
            }
        }

        info!("Consumer stopped");
        Ok(())
    }

    /// Process one message to a terminal state.
    ///
    /// Never returns an error: every failure path ends in a Failed
    /// status and the message counts as handled.
    pub async fn process_message(&self, message: &TranscodeMessage) {
        let video_id = &message.video_id;

        // Idempotency guard: sole defense against queue redelivery
        match self.store.find_one(video_id).await {
            Ok(Some(record)) if record.state.is_success_terminal() => {
                info!("Video {} already processed, skipping", video_id);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                // Guard unavailable: proceed rather than stall the queue
                error!("Store lookup failed for {}: {}", video_id, e);
            }
        }

        info!("Processing video {}", video_id);
        self.transition(
            video_id,
            VideoStatus::Processing,
            VideoPatch::state(VideoState::Processing)
                .clear_error()
                .started_now(),
            HashMap::new(),
        )
        .await;

        match self.step.run(message).await {
            Ok(()) => {
                // Container cleanup is best-effort, non-fatal
                self.step.release(video_id).await;
                info!("Processing completed for video {}", video_id);
                self.transition(
                    video_id,
                    VideoStatus::ProcessingCompletePublishing,
                    VideoPatch::state(VideoState::ProcessingCompletePublishing).ended_now(),
                    HashMap::new(),
                )
                .await;
            }
            Err(e) => {
                let error_text = e.to_string();
                error!("Processing failed for video {}: {}", video_id, error_text);
                let mut attributes = HashMap::new();
                attributes.insert("error".to_string(), error_text.clone());
                self.transition(
                    video_id,
                    VideoStatus::Failed,
                    VideoPatch::state(VideoState::Failed)
                        .with_error(error_text)
                        .ended_now(),
                    attributes,
                )
                .await;
            }
        }
    }

    /// Update the durable store, then push through the bridge.
    ///
    /// Store failures are fire-and-log; a bridge failure loses one
    /// interactive push but the local transition stands.
    async fn transition(
        &self,
        video_id: &VideoId,
        status: VideoStatus,
        patch: VideoPatch,
        attributes: HashMap<String, String>,
    ) {
        if let Err(e) = self.store.upsert(video_id, patch).await {
            error!("Failed to update store for {}: {}", video_id, e);
        }
        if let Err(e) = self.bridge.emit(video_id, status, attributes).await {
            warn!("Status push for {} lost: {}", video_id, e);
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if shutdown.changed().await.is_err() || *shutdown.borrow() {
            return;
        }
    }
}
