// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compose control endpoints (client-facing half of the dispatch glue).

use super::AppState;
use crate::dispatch::ComposeRequest;
use crate::error::ApiError;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use kiln_core::{
    AwsTargetOptions, AzureTargetOptions, ImageType, KojiTargetOptions, LocalTargetOptions,
    QueueStatus, SystemClock, Target, TargetOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateComposeRequest {
    pub blueprint_name: String,
    pub compose_type: String,
    #[serde(default)]
    pub upload: Vec<UploadRequest>,
}

/// One requested upload destination. The settings shape depends on the
/// provider; unknown providers are rejected.
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub provider: String,
    pub image_name: String,
    #[serde(default)]
    pub settings: serde_json::Value,
}

#[derive(Deserialize)]
struct AwsUploadSettings {
    region: String,
    #[serde(rename = "accessKeyID")]
    access_key_id: String,
    #[serde(rename = "secretAccessKey")]
    secret_access_key: String,
    bucket: String,
    #[serde(default)]
    key: String,
}

#[derive(Deserialize)]
struct AzureUploadSettings {
    #[serde(rename = "storageAccount")]
    storage_account: String,
    #[serde(rename = "storageAccessKey")]
    storage_access_key: String,
    container: String,
}

#[derive(Deserialize)]
struct KojiUploadSettings {
    server: String,
    #[serde(default)]
    upload_directory: String,
}

#[derive(Debug, Serialize)]
pub struct CreateComposeResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ComposeStatusResponse {
    pub id: Uuid,
    pub blueprint: String,
    pub version: String,
    pub compose_type: String,
    pub queue_status: QueueStatus,
    pub job_created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_started: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_finished: Option<DateTime<Utc>>,
    pub size: u64,
    pub uploads: Vec<UploadStatus>,
}

#[derive(Debug, Serialize)]
pub struct UploadStatus {
    pub uuid: Uuid,
    pub provider: &'static str,
    pub image_name: String,
    pub status: QueueStatus,
}

/// `POST /composes` — create and dispatch a compose.
pub async fn create_compose(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateComposeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let image_type = ImageType::from_name(&request.compose_type)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown compose type: {}", request.compose_type)))?;

    let clock = SystemClock;
    // The local target always exists; it is what makes the image
    // downloadable by compose id.
    let mut targets = vec![Target::new(
        request.blueprint_name.clone(),
        TargetOptions::Local(LocalTargetOptions {
            filename: image_type.filename().to_string(),
            stream_optimized: false,
        }),
        &clock,
    )];
    for upload in &request.upload {
        targets.push(upload_to_target(upload, image_type, &clock)?);
    }

    let compose_request =
        ComposeRequest { blueprint_name: request.blueprint_name, image_type, targets };

    // Depsolving shells out; keep it off the async workers
    let dispatcher = Arc::clone(&state.dispatcher);
    let id = tokio::task::spawn_blocking(move || dispatcher.start_compose(compose_request))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    info!(compose = %id, "compose created");
    Ok((StatusCode::CREATED, Json(CreateComposeResponse { id })))
}

fn upload_to_target(
    upload: &UploadRequest,
    image_type: ImageType,
    clock: &SystemClock,
) -> Result<Target, ApiError> {
    let filename = image_type.filename().to_string();
    let options = match upload.provider.as_str() {
        "aws" => {
            let settings: AwsUploadSettings = parse_settings(&upload.settings)?;
            TargetOptions::Aws(AwsTargetOptions {
                filename,
                region: settings.region,
                access_key_id: settings.access_key_id,
                secret_access_key: settings.secret_access_key,
                bucket: settings.bucket,
                key: settings.key,
            })
        }
        "azure" => {
            let settings: AzureUploadSettings = parse_settings(&upload.settings)?;
            TargetOptions::Azure(AzureTargetOptions {
                filename,
                storage_account: settings.storage_account,
                storage_access_key: settings.storage_access_key,
                container: settings.container,
            })
        }
        "koji" => {
            let settings: KojiUploadSettings = parse_settings(&upload.settings)?;
            TargetOptions::Koji(KojiTargetOptions {
                filename,
                server: settings.server,
                upload_directory: settings.upload_directory,
            })
        }
        other => {
            return Err(ApiError::BadRequest(format!("unexpected provider name: {other}")));
        }
    };
    Ok(Target::new(upload.image_name.clone(), options, clock))
}

fn parse_settings<T: serde::de::DeserializeOwned>(value: &serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(value.clone())
        .map_err(|e| ApiError::BadRequest(format!("invalid upload settings: {e}")))
}

/// `GET /composes/{id}` — status projection.
pub async fn compose_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ComposeStatusResponse>, ApiError> {
    let compose = state.store.get_compose(id).ok_or(ApiError::NotFound)?;
    let ib = &compose.image_build;

    Ok(Json(ComposeStatusResponse {
        id,
        blueprint: compose.blueprint.name.clone(),
        version: compose.blueprint.version.clone(),
        compose_type: ib.image_type.name().to_string(),
        queue_status: ib.queue_status,
        job_created: ib.job_created,
        job_started: ib.job_started,
        job_finished: ib.job_finished,
        size: ib.size,
        uploads: ib
            .targets
            .iter()
            .filter(|t| !matches!(t.options, TargetOptions::Local(_)))
            .map(|t| UploadStatus {
                uuid: t.uuid,
                provider: t.options.name(),
                image_name: t.image_name.clone(),
                status: t.status,
            })
            .collect(),
    }))
}

/// `POST /composes/{id}/cancel` — cancel the underlying jobs.
pub async fn cancel_compose(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.dispatcher.cancel_compose(id)?;
    Ok(Json(json!({ "status": true })))
}

/// `DELETE /composes/{id}` — cancel, purge jobs, remove artifacts.
pub async fn delete_compose(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.dispatcher.delete_compose(id).await?;
    Ok(Json(json!({ "status": true })))
}

/// `GET /composes/{id}/image` — download the built image.
pub async fn download_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let compose = state.store.get_compose(id).ok_or(ApiError::NotFound)?;
    if compose.image_build.queue_status != QueueStatus::Finished {
        return Err(ApiError::BadRequest(format!(
            "compose is {}, not FINISHED",
            compose.image_build.queue_status
        )));
    }
    let job = compose.image_build.job_id.ok_or(ApiError::NotFound)?;
    let image_type = compose.image_build.image_type;

    let file = state.artifacts.open(job, image_type.filename()).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound
        } else {
            ApiError::Internal(e.to_string())
        }
    })?;

    let headers = [
        (header::CONTENT_TYPE, image_type.mime_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}-{}", id, image_type.filename()),
        ),
    ];
    let body = Body::from_stream(tokio_util::io::ReaderStream::new(file));
    Ok((headers, body))
}

#[cfg(test)]
#[path = "composes_tests.rs"]
mod tests;
