// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upload targets: post-build destinations for a built image.

use crate::clock::Clock;
use crate::status::QueueStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A destination for a built image.
///
/// The variant payload lives in [`TargetOptions`]; the surrounding record
/// carries identity, display name, and a lifecycle status mirrored from
/// upload completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub uuid: Uuid,
    pub image_name: String,
    pub created: DateTime<Utc>,
    pub status: QueueStatus,
    /// Job driving this target's registration step, when the upload is
    /// not performed inline by the build job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_job_id: Option<Uuid>,
    #[serde(flatten)]
    pub options: TargetOptions,
}

impl Target {
    /// Create a new waiting target.
    pub fn new(image_name: impl Into<String>, options: TargetOptions, clock: &impl Clock) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            image_name: image_name.into(),
            created: clock.now(),
            status: QueueStatus::Waiting,
            registration_job_id: None,
            options,
        }
    }
}

/// The closed set of target variants.
///
/// Dispatch on the discriminator, never on payload shape: two variants may
/// carry structurally identical options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "options")]
pub enum TargetOptions {
    #[serde(rename = "org.kiln.local")]
    Local(LocalTargetOptions),
    #[serde(rename = "org.kiln.aws")]
    Aws(AwsTargetOptions),
    #[serde(rename = "org.kiln.azure")]
    Azure(AzureTargetOptions),
    #[serde(rename = "org.kiln.gcp")]
    Gcp(GcpTargetOptions),
    #[serde(rename = "org.kiln.vmware")]
    Vmware(VmwareTargetOptions),
    #[serde(rename = "org.kiln.koji")]
    Koji(KojiTargetOptions),
}

impl TargetOptions {
    /// The wire discriminator for this variant.
    pub fn name(&self) -> &'static str {
        match self {
            TargetOptions::Local(_) => "org.kiln.local",
            TargetOptions::Aws(_) => "org.kiln.aws",
            TargetOptions::Azure(_) => "org.kiln.azure",
            TargetOptions::Gcp(_) => "org.kiln.gcp",
            TargetOptions::Vmware(_) => "org.kiln.vmware",
            TargetOptions::Koji(_) => "org.kiln.koji",
        }
    }

    /// Whether this target is registered by a separate dependent job
    /// rather than uploaded inline by the build job.
    pub fn is_registration(&self) -> bool {
        matches!(self, TargetOptions::Koji(_))
    }
}

/// Keep the artifact on the composer host, downloadable by compose id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalTargetOptions {
    pub filename: String,
    /// Re-encode VMDK artifacts as stream-optimized before upload
    #[serde(default)]
    pub stream_optimized: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsTargetOptions {
    pub filename: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    /// Object key; a random one is generated when empty
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AzureTargetOptions {
    pub filename: String,
    pub storage_account: String,
    pub storage_access_key: String,
    pub container: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GcpTargetOptions {
    pub filename: String,
    pub region: String,
    pub bucket: String,
    #[serde(default)]
    pub object: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmwareTargetOptions {
    pub filename: String,
    pub host: String,
    pub username: String,
    pub password: String,
    pub datacenter: String,
    pub cluster: String,
    pub datastore: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KojiTargetOptions {
    pub filename: String,
    pub server: String,
    pub upload_directory: String,
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
