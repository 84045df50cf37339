// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version 0 of the serialized store document.
//!
//! The v0 layout is an on-disk contract: field names, the image-type
//! compatibility strings, and the recovery behavior on load must not
//! change. New state goes into a new version, never into this one.

use crate::compose::{Compose, ImageBuild};
use crate::error::StoreError;
use crate::store::StoreData;
use chrono::{DateTime, Utc};
use kiln_core::{Blueprint, Change, ImageType, Manifest, QueueStatus, SourceConfig, Target};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// Current store schema version
pub const CURRENT_STORE_VERSION: u32 = 0;

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct StoreV0 {
    /// Schema version for migrations
    #[serde(rename = "v", default)]
    pub version: u32,
    #[serde(default)]
    pub blueprints: HashMap<String, Blueprint>,
    #[serde(default)]
    pub workspace: HashMap<String, Blueprint>,
    #[serde(default)]
    pub composes: HashMap<Uuid, ComposeV0>,
    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,
    #[serde(default)]
    pub changes: HashMap<String, HashMap<String, Change>>,
    #[serde(default)]
    pub commits: HashMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ComposeV0 {
    pub blueprint: Blueprint,
    pub image_builds: Vec<ImageBuildV0>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ImageBuildV0 {
    /// Image type as a compatibility string (see [`ImageType::compat_string`])
    pub image_type: String,
    pub manifest: Manifest,
    #[serde(default)]
    pub targets: Vec<Target>,
    pub job_created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_started: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_finished: Option<DateTime<Utc>>,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(default)]
    pub queue_status: QueueStatus,
}

pub(crate) fn to_document(data: &StoreData) -> StoreV0 {
    StoreV0 {
        version: CURRENT_STORE_VERSION,
        blueprints: data.blueprints.clone(),
        workspace: data.workspace.clone(),
        composes: data
            .composes
            .iter()
            .map(|(id, compose)| (*id, compose_to_v0(compose)))
            .collect(),
        sources: data.sources.clone(),
        changes: data.changes.clone(),
        commits: data.commits.clone(),
    }
}

fn compose_to_v0(compose: &Compose) -> ComposeV0 {
    let ib = &compose.image_build;
    ComposeV0 {
        blueprint: compose.blueprint.clone(),
        image_builds: vec![ImageBuildV0 {
            image_type: ib.image_type.compat_string().to_string(),
            manifest: ib.manifest.clone(),
            targets: ib.targets.clone(),
            job_created: ib.job_created,
            job_started: ib.job_started,
            job_finished: ib.job_finished,
            size: ib.size,
            job_id: ib.job_id,
            queue_status: ib.queue_status,
        }],
    }
}

/// Materialize a document into live state, applying the recovery pass.
pub(crate) fn from_document(doc: StoreV0) -> Result<StoreData, StoreError> {
    if doc.version != CURRENT_STORE_VERSION {
        return Err(StoreError::UnsupportedVersion(doc.version));
    }

    let mut composes = HashMap::new();
    for (id, compose) in doc.composes {
        match compose_from_v0(compose) {
            Some(mut compose) => {
                // Queued or running builds reference jobs that no longer
                // exist after a restart; fail them (and their pending
                // targets) rather than leaving them stuck forever.
                if matches!(
                    compose.image_build.queue_status,
                    QueueStatus::Waiting | QueueStatus::Running
                ) {
                    compose.image_build.queue_status = QueueStatus::Failed;
                    compose.image_build.fail_pending_targets();
                }
                composes.insert(id, compose);
            }
            // Unknown image types happen across upgrades; dropping the
            // compose (rather than refusing to load) is the contract.
            None => warn!(compose = %id, "dropping compose with unknown image type"),
        }
    }

    let mut data = StoreData {
        blueprints: doc.blueprints,
        workspace: doc.workspace,
        composes,
        sources: doc.sources,
        changes: doc.changes,
        commits: doc.commits,
    };

    reconstruct_commits(&mut data);
    Ok(data)
}

fn compose_from_v0(compose: ComposeV0) -> Option<Compose> {
    let ib = compose.image_builds.into_iter().next()?;
    let image_type = ImageType::from_compat_string(&ib.image_type)?;
    Some(Compose {
        blueprint: compose.blueprint,
        image_build: ImageBuild {
            image_type,
            manifest: ib.manifest,
            targets: ib.targets,
            job_id: ib.job_id,
            size: ib.size,
            job_created: ib.job_created,
            job_started: ib.job_started,
            job_finished: ib.job_finished,
            queue_status: ib.queue_status,
        },
    })
}

/// Rebuild commit lists that are out of sync with the change history.
///
/// Changes are sorted by `(timestamp, semver version)` ascending. The
/// timestamp resolution is 1 s, so the order is best-effort when two
/// commits share a second.
fn reconstruct_commits(data: &mut StoreData) {
    for (name, changes) in &data.changes {
        let commits = data.commits.entry(name.clone()).or_default();
        if changes.len() == commits.len() {
            continue;
        }

        let mut ordered: Vec<&Change> = changes.values().collect();
        ordered.sort_by(|a, b| {
            if a.timestamp == b.timestamp {
                let va = parse_version(a.version.as_deref());
                let vb = parse_version(b.version.as_deref());
                va.cmp(&vb)
            } else {
                a.timestamp.cmp(&b.timestamp)
            }
        });

        *commits = ordered.into_iter().map(|c| c.commit.clone()).collect();
    }
}

fn parse_version(version: Option<&str>) -> semver::Version {
    version
        .and_then(|v| semver::Version::parse(v).ok())
        .unwrap_or_else(|| semver::Version::new(0, 0, 0))
}

#[cfg(test)]
#[path = "v0_tests.rs"]
mod tests;
