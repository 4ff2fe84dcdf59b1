//! HTTP routes: upload submission, storage webhooks, watch lookup.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use vpipe_models::{TranscodeMessage, VideoId, VideoPatch, VideoRecord, VideoState, VideoStatus};

use crate::error::{GatewayError, GatewayResult};
use crate::state::AppState;
use crate::ws::ws_watch;

/// Create the gateway router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_watch))
        .route("/upload/url", post(upload_url))
        .route("/webhook/upload-success", post(upload_successful))
        .route("/webhook/transcode-success", post(transcode_successful))
        .route("/watch", get(watch))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct UploadUrlRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub video_id: VideoId,
    pub upload_url: String,
}

/// Register a new video and hand out its upload location.
///
/// Creates the durable record in the PendingUpload state. Actual
/// presigned-URL issuance belongs to the storage layer; the returned
/// URL is derived from the configured upload base.
pub async fn upload_url(
    State(state): State<AppState>,
    Json(request): Json<UploadUrlRequest>,
) -> GatewayResult<Json<UploadUrlResponse>> {
    let video_id = VideoId::new();

    let mut record = VideoRecord::new(video_id.clone(), request.title);
    record.description = request.description;

    // Store failure at submission time is a hard failure to the caller
    state.store.create(record).await?;

    info!("Registered video {} for upload", video_id);

    let upload_url = format!("{}/{}/request.mp4", state.config.upload_url_base, video_id);
    Ok(Json(UploadUrlResponse {
        video_id,
        upload_url,
    }))
}

/// Storage notification payload, `{"data": {"resourceName": "..."}}`.
#[derive(Debug, Deserialize)]
pub struct WebhookNotification {
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    pub resource_name: String,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

fn ack() -> Json<Ack> {
    Json(Ack {
        success: true,
        message: "Notification Acknowledged".to_string(),
    })
}

/// Extract the video id from an object path like `<id>/request.mp4`.
fn slug_of(resource_name: &str) -> GatewayResult<&str> {
    match resource_name.split('/').next() {
        Some(slug) if !slug.is_empty() => Ok(slug),
        _ => Err(GatewayError::bad_request(format!(
            "Malformed resource name: {resource_name}"
        ))),
    }
}

/// Source upload landed: mark the video queued and enqueue the
/// transcode job.
pub async fn upload_successful(
    State(state): State<AppState>,
    Json(notification): Json<WebhookNotification>,
) -> GatewayResult<Json<Ack>> {
    let resource_name = notification.data.resource_name;
    let slug = slug_of(&resource_name)?;
    let video_id = VideoId::from(slug);

    let source_url = format!("{}/{}", state.config.source_url_base, resource_name);
    let destination_url = format!("{}/{}", state.config.destination_url_base, slug);

    state
        .store
        .upsert(
            &video_id,
            VideoPatch::state(VideoState::Queued).with_org_video_url(&source_url),
        )
        .await?;

    let mut attributes = HashMap::new();
    if let Some(record) = state.store.find_one(&video_id).await? {
        if let Some(title) = record.title {
            attributes.insert("title".to_string(), title);
        }
        if let Some(description) = record.description {
            attributes.insert("description".to_string(), description);
        }
    }

    state
        .registry
        .push_status(video_id.clone(), VideoStatus::Queued, attributes)
        .await;

    state
        .queue
        .enqueue(&TranscodeMessage::new(video_id, source_url, destination_url))
        .await?;

    Ok(ack())
}

/// Transcoded output landed: the video is live.
pub async fn transcode_successful(
    State(state): State<AppState>,
    Json(notification): Json<WebhookNotification>,
) -> GatewayResult<Json<Ack>> {
    let slug = slug_of(&notification.data.resource_name)?.to_string();
    let video_id = VideoId::from(slug.as_str());

    let final_url = format!("{}/{}/master.m3u8", state.config.playback_url_base, slug);
    info!("Video {} is live at {}", video_id, final_url);

    state
        .store
        .upsert(
            &video_id,
            VideoPatch::state(VideoState::Live).with_url(&final_url),
        )
        .await?;

    let mut attributes = HashMap::new();
    attributes.insert("url".to_string(), final_url);
    state
        .registry
        .push_status(video_id, VideoStatus::Live, attributes)
        .await;

    Ok(ack())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchQuery {
    pub video_id: VideoId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    pub success: bool,
    pub data: WatchData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchData {
    pub video_id: VideoId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

/// Look up playback metadata for a video.
pub async fn watch(
    State(state): State<AppState>,
    Query(query): Query<WatchQuery>,
) -> GatewayResult<Json<WatchResponse>> {
    let record = state
        .store
        .find_one(&query.video_id)
        .await?
        .ok_or_else(|| {
            GatewayError::not_found("The requested video may have been removed after 7 days")
        })?;

    Ok(Json(WatchResponse {
        success: true,
        data: WatchData {
            video_id: record.video_id,
            title: record.title,
            description: record.description,
            url: record.url,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use vpipe_queue::{QueueConfig, WorkQueue};
    use vpipe_store::{MemoryVideoStore, VideoStore};

    use crate::config::GatewayConfig;
    use crate::registry::StatusRegistry;

    fn test_state() -> AppState {
        let config = GatewayConfig {
            fanout_delay: Duration::ZERO,
            ..GatewayConfig::default()
        };
        AppState {
            registry: Arc::new(StatusRegistry::new(Duration::ZERO)),
            store: Arc::new(MemoryVideoStore::new()),
            queue: Arc::new(WorkQueue::new(QueueConfig::default()).unwrap()),
            config,
        }
    }

    #[tokio::test]
    async fn test_upload_url_creates_pending_record() {
        let state = test_state();
        let response = upload_url(
            State(state.clone()),
            Json(UploadUrlRequest {
                title: "My video".to_string(),
                description: None,
            }),
        )
        .await
        .unwrap();

        let record = state
            .store
            .find_one(&response.0.video_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.state, VideoState::PendingUpload);
        assert_eq!(record.title.as_deref(), Some("My video"));
        assert!(response.0.upload_url.ends_with("/request.mp4"));
    }

    #[tokio::test]
    async fn test_transcode_success_marks_live_and_pushes() {
        let state = test_state();
        let id = VideoId::from("abc");
        state
            .store
            .create(VideoRecord::new(id.clone(), "t"))
            .await
            .unwrap();

        let ack = transcode_successful(
            State(state.clone()),
            Json(WebhookNotification {
                data: WebhookData {
                    resource_name: "abc/master.m3u8".to_string(),
                },
            }),
        )
        .await
        .unwrap();
        assert!(ack.0.success);

        let record = state.store.find_one(&id).await.unwrap().unwrap();
        assert_eq!(record.state, VideoState::Live);
        assert!(record.url.unwrap().ends_with("abc/master.m3u8"));

        let status = state.registry.last_status(&id).await.unwrap();
        assert_eq!(status.status, VideoStatus::Live);
        assert!(status.attributes.contains_key("url"));
    }

    #[tokio::test]
    async fn test_watch_unknown_video_is_404() {
        let state = test_state();
        let err = watch(
            State(state),
            Query(WatchQuery {
                video_id: VideoId::from("missing"),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[test]
    fn test_slug_of_rejects_empty() {
        assert!(slug_of("").is_err());
        assert!(slug_of("/request.mp4").is_err());
        assert_eq!(slug_of("abc/request.mp4").unwrap(), "abc");
    }
}
