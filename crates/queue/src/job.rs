// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and the typed argument codec.

use crate::error::QueueError;
use chrono::{DateTime, Utc};
use kiln_core::{BuildResult, Clock, Manifest, Target};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use uuid::Uuid;

/// The closed set of job kinds.
///
/// The kind names the args/result contract between enqueuer and worker;
/// the queue itself never inspects either payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    #[serde(rename = "osbuild")]
    Osbuild,
    #[serde(rename = "koji-init")]
    KojiInit,
    #[serde(rename = "koji-finalize")]
    KojiFinalize,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Osbuild, JobKind::KojiInit, JobKind::KojiFinalize];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Osbuild => "osbuild",
            JobKind::KojiInit => "koji-init",
            JobKind::KojiFinalize => "koji-finalize",
        }
    }

    /// Parse a kind tag; unknown tags fail with [`QueueError::UnknownJobType`].
    pub fn from_name(name: &str) -> Result<JobKind, QueueError> {
        JobKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == name)
            .ok_or_else(|| QueueError::UnknownJobType(name.to_string()))
    }
}

kiln_core::simple_display! {
    JobKind {
        Osbuild => "osbuild",
        KojiInit => "koji-init",
        KojiFinalize => "koji-finalize",
    }
}

/// Serialize a typed args (or result) value into the opaque payload the
/// queue stores.
pub fn encode_args<T: Serialize>(args: &T) -> Result<Box<RawValue>, QueueError> {
    let bytes = serde_json::to_string(args)?;
    Ok(RawValue::from_string(bytes)?)
}

/// Decode an opaque payload back into its declared shape.
pub fn decode_args<T: DeserializeOwned>(raw: &RawValue) -> Result<T, QueueError> {
    Ok(serde_json::from_str(raw.get())?)
}

/// A unit of work claimable by a worker.
///
/// Timestamps are `None` until reached. Transitions are monotonic: a job
/// never moves from running back to ready, nor from terminal to running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub args: Box<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Uuid>,
    pub queued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub canceled: bool,
}

impl Job {
    /// Create a job with a fresh id and serialized args.
    pub fn new<T: Serialize>(
        kind: JobKind,
        args: &T,
        dependencies: Vec<Uuid>,
        clock: &impl Clock,
    ) -> Result<Job, QueueError> {
        Ok(Job {
            id: Uuid::new_v4(),
            kind,
            args: encode_args(args)?,
            result: None,
            dependencies,
            queued_at: clock.now(),
            started_at: None,
            finished_at: None,
            canceled: false,
        })
    }

    /// A worker currently holds this job.
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.finished_at.is_none()
    }

    /// No further lifecycle transitions will happen.
    pub fn is_terminal(&self) -> bool {
        self.finished_at.is_some() || self.canceled
    }
}

/// Status projection returned by the queue for a single job.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub kind: JobKind,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub canceled: bool,
    pub result: Option<Box<RawValue>>,
}

//
// Typed payloads, one pair per job kind.
//

/// Args for an `osbuild` job: build this manifest, then run the inline
/// upload targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsbuildJob {
    pub manifest: Manifest,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsbuildJobResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_output: Option<BuildResult>,
}

/// Args for a `koji-init` job: open a build in the registration system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KojiInitJob {
    pub server: String,
    pub name: String,
    pub version: String,
    pub release: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KojiInitJobResult {
    pub build_id: u64,
    pub token: String,
}

/// Args for a `koji-finalize` job: import the built artifacts. Depends on
/// the build job (for the artifact) and the init job (for the token).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KojiFinalizeJob {
    pub server: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KojiFinalizeJobResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
