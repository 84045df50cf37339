// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-kind job handlers.

use crate::client::{Client, ClientError};
use crate::engine::{BuildEngine, EngineError};
use crate::upload::{self, UploadError};
use kiln_core::{BuildResult, LocalTargetOptions, Manifest, Target, TargetOptions};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid job envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("registration failed: {0}")]
    Registration(String),
}

/// Args envelope for an `osbuild` job.
#[derive(Debug, Deserialize)]
pub struct BuildJobEnvelope {
    pub id: Uuid,
    pub manifest: Manifest,
    #[serde(default)]
    pub targets: Vec<Target>,
}

/// Args envelope for a `koji-init` job.
#[derive(Debug, Deserialize)]
pub struct KojiInitEnvelope {
    pub id: Uuid,
    pub server: String,
    pub name: String,
    pub version: String,
    pub release: String,
}

/// Args envelope for a `koji-finalize` job.
#[derive(Debug, Deserialize)]
pub struct KojiFinalizeEnvelope {
    pub id: Uuid,
    pub server: String,
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Results of the build and init jobs this one depends on
    #[serde(default)]
    pub dependency_results: Vec<serde_json::Value>,
}

/// Run a build: invoke the engine, then push each inline target.
///
/// Upload failures do not abort remaining targets; they are collected and
/// turn the whole build result unsuccessful, exactly as a failed stage
/// would.
pub async fn run_build_job(
    client: &Client,
    engine: &BuildEngine,
    job: &BuildJobEnvelope,
    scratch_root: &Path,
) -> Result<BuildResult, WorkerError> {
    let output_dir = tempfile::Builder::new().prefix("kiln-worker-").tempdir_in(scratch_root)?;
    let mut result = engine.run(&job.manifest, output_dir.path()).await?;
    if !result.success {
        return Ok(result);
    }

    let mut target_errors = Vec::new();
    for target in &job.targets {
        let outcome = match &target.options {
            TargetOptions::Local(options) => {
                upload_to_composer(client, job.id, options, output_dir.path()).await
            }
            TargetOptions::Aws(options) => upload::aws::upload(
                options,
                &target.image_name,
                &output_dir.path().join(&options.filename),
            )
            .await
            .map(|_| ()),
            TargetOptions::Azure(options) => {
                upload::azure::upload(options, &output_dir.path().join(&options.filename)).await
            }
            // GCP and VMware need their own adapters; koji runs as a
            // dependent registration job, never inline.
            other => Err(UploadError::UnsupportedTarget(other.name().to_string())),
        };
        if let Err(e) = outcome {
            warn!(target = target.options.name(), error = %e, "target failed");
            target_errors.push(format!("{}: {e}", target.options.name()));
        }
    }

    if result.size.is_none() {
        result.size = primary_artifact_size(&job.targets, output_dir.path()).await;
    }
    if !target_errors.is_empty() {
        result.success = false;
        result.target_errors = target_errors;
    }
    Ok(result)
}

async fn upload_to_composer(
    client: &Client,
    job: Uuid,
    options: &LocalTargetOptions,
    output_dir: &Path,
) -> Result<(), UploadError> {
    let path = output_dir.join(&options.filename);
    let file = tokio::fs::File::open(&path).await?;
    client
        .upload_artifact(job, &options.filename, file)
        .await
        .map_err(|e| UploadError::Composer(e.to_string()))
}

async fn primary_artifact_size(targets: &[Target], output_dir: &Path) -> Option<u64> {
    for target in targets {
        if let TargetOptions::Local(options) = &target.options {
            if let Ok(metadata) = tokio::fs::metadata(output_dir.join(&options.filename)).await {
                return Some(metadata.len());
            }
        }
    }
    None
}

/// Open a content-generator build on the hub.
pub async fn run_koji_init(job: &KojiInitEnvelope) -> Result<serde_json::Value, WorkerError> {
    let output = tokio::process::Command::new("koji")
        .arg("--server")
        .arg(&job.server)
        .arg("call")
        .arg("--json-output")
        .arg("CGInitBuild")
        .arg(&job.name)
        .arg(&job.version)
        .output()
        .await?;
    if !output.status.success() {
        return Err(WorkerError::Registration(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    let response: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    info!(server = %job.server, name = %job.name, "opened koji build");
    Ok(serde_json::json!({
        "build_id": response["build_id"],
        "token": response["token"],
    }))
}

/// Import the build into the hub once the build job has finished.
pub async fn run_koji_finalize(job: &KojiFinalizeEnvelope) -> Result<serde_json::Value, WorkerError> {
    let mut errors = Vec::new();
    for target in &job.targets {
        if let TargetOptions::Koji(options) = &target.options {
            let artifact = Path::new(&options.filename);
            if let Err(e) = upload::koji::import(options, artifact).await {
                errors.push(e.to_string());
            }
        }
    }

    Ok(serde_json::json!({
        "success": errors.is_empty(),
        "errors": errors,
    }))
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
