// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compose and image-build records.

use chrono::{DateTime, Utc};
use kiln_core::{Blueprint, ImageType, Manifest, QueueStatus, Target};
use uuid::Uuid;

/// The unit of client request: one blueprint snapshot bound to one image
/// build and its upload targets.
///
/// The blueprint is copied at enqueue time; later edits to the catalog
/// entry never affect a compose in flight. A compose is only removed by an
/// explicit administrative delete, never automatically.
#[derive(Debug, Clone, PartialEq)]
pub struct Compose {
    pub blueprint: Blueprint,
    pub image_build: ImageBuild,
}

/// A single image artifact being produced from a blueprint.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuild {
    pub image_type: ImageType,
    pub manifest: Manifest,
    pub targets: Vec<Target>,
    /// Root build job backing this image build
    pub job_id: Option<Uuid>,
    pub size: u64,
    pub job_created: DateTime<Utc>,
    pub job_started: Option<DateTime<Utc>>,
    pub job_finished: Option<DateTime<Utc>>,
    pub queue_status: QueueStatus,
}

impl ImageBuild {
    /// A fresh image build in the WAITING state.
    pub fn new(
        image_type: ImageType,
        manifest: Manifest,
        targets: Vec<Target>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            image_type,
            manifest,
            targets,
            job_id: None,
            size: 0,
            job_created: created,
            job_started: None,
            job_finished: None,
            queue_status: QueueStatus::Waiting,
        }
    }

    /// The backing job was dequeued by a worker.
    pub fn mark_running(&mut self, at: DateTime<Utc>) {
        if self.queue_status == QueueStatus::Waiting {
            self.queue_status = QueueStatus::Running;
            self.job_started = Some(at);
        }
    }

    /// The backing job reached a terminal state. A canceled job surfaces
    /// here as a failure.
    ///
    /// Inline targets mirror the build outcome; registration targets are
    /// completed by their own dependent job and stay pending here.
    pub fn mark_finished(&mut self, success: bool, size: Option<u64>, at: DateTime<Utc>) {
        if self.queue_status.is_terminal() {
            return;
        }
        self.queue_status = if success { QueueStatus::Finished } else { QueueStatus::Failed };
        self.job_finished = Some(at);
        if let Some(size) = size {
            self.size = size;
        }
        for target in &mut self.targets {
            if !target.options.is_registration() && !target.status.is_terminal() {
                target.status = self.queue_status;
            }
        }
    }

    /// A registration job for one of this build's targets reached a
    /// terminal state.
    pub fn mark_target_finished(&mut self, target_uuid: Uuid, success: bool) {
        if let Some(target) = self.targets.iter_mut().find(|t| t.uuid == target_uuid) {
            if !target.status.is_terminal() {
                target.status =
                    if success { QueueStatus::Finished } else { QueueStatus::Failed };
            }
        }
    }

    /// Fail every target still pending. Used when the compose's jobs are
    /// canceled (or lost to a restart) and no further transitions will
    /// arrive.
    pub fn fail_pending_targets(&mut self) {
        for target in &mut self.targets {
            if !target.status.is_terminal() {
                target.status = QueueStatus::Failed;
            }
        }
    }
}

#[cfg(test)]
#[path = "compose_tests.rs"]
mod tests;
