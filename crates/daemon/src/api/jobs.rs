// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-facing job endpoints.

use super::AppState;
use crate::error::ApiError;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use futures_util::TryStreamExt;
use kiln_core::QueueStatus;
use kiln_queue::JobKind;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AddJobRequest {
    /// Single requested type
    #[serde(default)]
    pub job_type: Option<String>,
    /// Accepted types in preference order; wins over `job_type`
    #[serde(default)]
    pub job_types: Vec<String>,
}

impl AddJobRequest {
    fn kinds(&self) -> Result<Vec<JobKind>, ApiError> {
        let names: Vec<&str> = if self.job_types.is_empty() {
            self.job_type.as_deref().into_iter().collect()
        } else {
            self.job_types.iter().map(String::as_str).collect()
        };
        if names.is_empty() {
            return Err(ApiError::BadRequest("job_type is required".to_string()));
        }
        names.into_iter().map(|name| Ok(JobKind::from_name(name)?)).collect()
    }
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub canceled: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub status: QueueStatus,
    #[serde(default)]
    pub result: Value,
}

/// `POST /job-queue/v1/jobs` — claim the next job of the requested type.
///
/// Blocks until a job is ready. A client disconnect drops this future,
/// which abandons the wait without consuming a job.
pub async fn add_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kinds = request.kinds()?;

    let token = CancellationToken::new();
    let (id, dependencies, args) = state.queue.dequeue(&token, &kinds).await?;
    state.dispatcher.job_dequeued(id);

    let kind = state.queue.job_status(id)?.kind;
    debug!(job = %id, %kind, "job handed to worker");

    // The envelope is the job's args with the id, the kind, and (for
    // dependent jobs) the upstream results spliced in.
    let mut body: serde_json::Map<String, Value> = serde_json::from_str(args.get())
        .map_err(|e| ApiError::Internal(format!("stored args are not an object: {e}")))?;
    body.insert("id".to_string(), json!(id));
    body.insert("type".to_string(), json!(kind.name()));

    if !dependencies.is_empty() {
        let mut results = Vec::new();
        for dep in &dependencies {
            if let Some(result) = state.queue.result(*dep)? {
                let value: Value = serde_json::from_str(result.get())
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
                results.push(value);
            }
        }
        body.insert("dependencies".to_string(), json!(dependencies));
        body.insert("dependency_results".to_string(), Value::Array(results));
    }

    Ok((StatusCode::CREATED, Json(Value::Object(body))))
}

/// `GET /job-queue/v1/jobs/{id}` — cancellation poll.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let status = state.queue.job_status(id)?;
    Ok(Json(JobResponse { id, canceled: status.canceled }))
}

/// `PATCH /job-queue/v1/jobs/{id}` — record a terminal result.
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateJobRequest>,
) -> Result<Json<Value>, ApiError> {
    if !matches!(request.status, QueueStatus::Finished | QueueStatus::Failed) {
        return Err(ApiError::BadRequest(format!(
            "invalid terminal status: {}",
            request.status
        )));
    }

    let result = serde_json::value::RawValue::from_string(request.result.to_string())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    state.queue.finish_job(id, result.clone())?;

    // A canceled job surfaces as a failure regardless of what the worker
    // managed to report.
    let canceled = state.queue.job_status(id).map(|s| s.canceled).unwrap_or(false);
    let success = request.status == QueueStatus::Finished && !canceled;
    state.dispatcher.job_finished(id, success, &result);

    Ok(Json(json!({})))
}

/// `POST /job-queue/v1/jobs/{id}/artifacts/{name}` — artifact upload.
///
/// Only accepted while the job is running; before dequeue and after the
/// final status update the job is closed.
pub async fn upload_artifact(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(Uuid, String)>,
    request: Request,
) -> Result<StatusCode, ApiError> {
    let status = state.queue.job_status(id)?;
    if status.started_at.is_none() || status.finished_at.is_some() {
        return Err(ApiError::JobClosed);
    }

    let stream = request.into_body().into_data_stream().map_err(std::io::Error::other);
    let mut reader = tokio_util::io::StreamReader::new(stream);
    let written = state.artifacts.put(id, &name, &mut reader).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidInput {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    })?;

    debug!(job = %id, artifact = %name, bytes = written, "artifact stored");
    Ok(StatusCode::OK)
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
