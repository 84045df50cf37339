// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch glue: turns a compose request into queued jobs and projects
//! job transitions back into compose state.
//!
//! Lock order is Store-then-Queue: the compose record is allocated (and
//! the store lock released) before any queue call, and projections update
//! the store only after the queue operation completed.

use crate::artifacts::ArtifactStore;
use crate::catalog::{CatalogError, DepsolveError, Depsolver, ImageCatalog};
use kiln_core::{Clock, ImageType, SystemClock, Target, TargetOptions};
use kiln_queue::{
    decode_args, FsJobQueue, JobKind, KojiFinalizeJob, KojiInitJob, OsbuildJob, OsbuildJobResult,
    QueueError,
};
use kiln_store::{Compose, ImageBuild, Store, StoreError};
use parking_lot::Mutex;
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown blueprint: {0}")]
    UnknownBlueprint(String),

    #[error("depsolve failed: {0}")]
    Depsolve(String),

    #[error("manifest generation failed: {0}")]
    Catalog(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DepsolveError> for DispatchError {
    fn from(e: DepsolveError) -> Self {
        DispatchError::Depsolve(e.to_string())
    }
}

impl From<CatalogError> for DispatchError {
    fn from(e: CatalogError) -> Self {
        DispatchError::Catalog(e.to_string())
    }
}

/// A client's request to build one image from a blueprint.
pub struct ComposeRequest {
    pub blueprint_name: String,
    pub image_type: ImageType,
    /// Upload targets beyond the implicit local one
    pub targets: Vec<Target>,
}

/// Binds the store, the queue, and the collaborator seams together.
pub struct Dispatcher {
    store: Arc<Store>,
    queue: Arc<FsJobQueue>,
    artifacts: Arc<ArtifactStore>,
    catalog: Arc<dyn ImageCatalog>,
    depsolver: Arc<dyn Depsolver>,
    clock: SystemClock,
    /// compose id → every job enqueued for it. Rebuilt after a restart
    /// from the build job id and the targets' registration job links on
    /// the compose record (which misses only koji-init jobs; those have
    /// no compose-visible output).
    compose_jobs: Mutex<HashMap<Uuid, Vec<Uuid>>>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<Store>,
        queue: Arc<FsJobQueue>,
        artifacts: Arc<ArtifactStore>,
        catalog: Arc<dyn ImageCatalog>,
        depsolver: Arc<dyn Depsolver>,
    ) -> Self {
        Self {
            store,
            queue,
            artifacts,
            catalog,
            depsolver,
            clock: SystemClock,
            compose_jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Create a compose: snapshot the blueprint, produce a manifest, and
    /// enqueue the build job plus any dependent registration jobs.
    ///
    /// Blocking (depsolving shells out); callers run it on the blocking
    /// pool.
    pub fn start_compose(&self, request: ComposeRequest) -> Result<Uuid, DispatchError> {
        let (blueprint, _) = self
            .store
            .get_blueprint(&request.blueprint_name)
            .ok_or_else(|| DispatchError::UnknownBlueprint(request.blueprint_name.clone()))?;

        let mut repos = self.catalog.repositories();
        for source in self.store.get_all_sources().values() {
            repos.push(kiln_core::RepoConfig::from_source(source));
        }

        let packages = self.depsolver.depsolve(&blueprint.package_names(), &[], &repos)?;
        let build_packages = self.depsolver.depsolve(
            &self.catalog.build_packages(request.image_type),
            &[],
            &repos,
        )?;
        let manifest = self.catalog.manifest(
            &blueprint,
            request.image_type,
            &repos,
            &packages,
            &build_packages,
        )?;

        // Allocate the compose before touching the queue (Store, then Queue)
        let compose_id = Uuid::new_v4();
        let image_build = ImageBuild::new(
            request.image_type,
            manifest.clone(),
            request.targets.clone(),
            self.clock.now(),
        );
        self.store.insert_compose(compose_id, Compose { blueprint, image_build })?;

        // The build job uploads local/S3/Azure targets inline; registration
        // targets become separate dependent jobs.
        let inline_targets: Vec<Target> =
            request.targets.iter().filter(|t| !t.options.is_registration()).cloned().collect();
        let build_args = OsbuildJob { manifest, targets: inline_targets };

        let build_job = match self.queue.enqueue(JobKind::Osbuild, &build_args, &[]) {
            Ok(id) => id,
            Err(e) => {
                // The compose exists but can never run; fail it in place
                let now = self.clock.now();
                let _ = self
                    .store
                    .update_image_build(compose_id, |ib| ib.mark_finished(false, None, now));
                return Err(e.into());
            }
        };
        self.store.update_image_build(compose_id, |ib| ib.job_id = Some(build_job))?;

        let mut jobs = vec![build_job];
        for target in request.targets.iter().filter(|t| t.options.is_registration()) {
            if let TargetOptions::Koji(options) = &target.options {
                let init_job = self.queue.enqueue(
                    JobKind::KojiInit,
                    &KojiInitJob {
                        server: options.server.clone(),
                        name: request.blueprint_name.clone(),
                        version: "1".to_string(),
                        release: "1".to_string(),
                    },
                    &[],
                )?;
                let finalize_job = self.queue.enqueue(
                    JobKind::KojiFinalize,
                    &KojiFinalizeJob {
                        server: options.server.clone(),
                        targets: vec![target.clone()],
                    },
                    &[build_job, init_job],
                )?;
                // Link the target to its registration job, so the job's
                // terminal transition finds the target after a restart too
                let target_uuid = target.uuid;
                self.store.update_image_build(compose_id, |ib| {
                    if let Some(t) = ib.targets.iter_mut().find(|t| t.uuid == target_uuid) {
                        t.registration_job_id = Some(finalize_job);
                    }
                })?;
                jobs.push(init_job);
                jobs.push(finalize_job);
            }
        }

        self.compose_jobs.lock().insert(compose_id, jobs);
        info!(compose = %compose_id, job = %build_job, "compose dispatched");
        Ok(compose_id)
    }

    /// Projection: a worker dequeued a job.
    pub fn job_dequeued(&self, job_id: Uuid) {
        if let Some((compose_id, _)) = self.store.compose_by_job(job_id) {
            let now = self.clock.now();
            if let Err(e) = self.store.update_image_build(compose_id, |ib| ib.mark_running(now)) {
                warn!(compose = %compose_id, error = %e, "failed to mark compose running");
            }
        }
    }

    /// Projection: a job reported a terminal result.
    ///
    /// `success` is the worker-reported status; the artifact size is copied
    /// out of the result payload when present. A registration job projects
    /// onto its target's status rather than the image build's.
    pub fn job_finished(&self, job_id: Uuid, success: bool, result: &RawValue) {
        if let Some((compose_id, target_uuid)) = self.store.compose_by_registration_job(job_id) {
            if let Err(e) = self
                .store
                .update_image_build(compose_id, |ib| ib.mark_target_finished(target_uuid, success))
            {
                warn!(compose = %compose_id, error = %e, "failed to record target result");
            }
            return;
        }

        let Some((compose_id, _)) = self.store.compose_by_job(job_id) else { return };

        let size = decode_args::<OsbuildJobResult>(result)
            .ok()
            .and_then(|r| r.build_output)
            .and_then(|b| b.size);

        let now = self.clock.now();
        if let Err(e) = self
            .store
            .update_image_build(compose_id, |ib| ib.mark_finished(success, size, now))
        {
            warn!(compose = %compose_id, error = %e, "failed to record compose result");
        }
    }

    /// Cancel a compose's jobs and fail the image build in place.
    pub fn cancel_compose(&self, compose_id: Uuid) -> Result<(), DispatchError> {
        let compose =
            self.store.get_compose(compose_id).ok_or(StoreError::NotExist(compose_id.to_string()))?;

        for job in self.jobs_for(compose_id, &compose) {
            match self.queue.cancel_job(job) {
                Ok(()) | Err(QueueError::AlreadyTerminal) | Err(QueueError::NotExist) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let now = self.clock.now();
        self.store.update_image_build(compose_id, |ib| {
            ib.mark_finished(false, None, now);
            // The registration jobs were just canceled with everything
            // else; no transition will ever complete their targets
            ib.fail_pending_targets();
        })?;
        info!(compose = %compose_id, "compose canceled");
        Ok(())
    }

    /// Delete a compose: cancel any non-terminal jobs, purge the job
    /// records, and remove uploaded artifacts.
    pub async fn delete_compose(&self, compose_id: Uuid) -> Result<(), DispatchError> {
        let compose = self.store.delete_compose(compose_id)?;

        for job in self.jobs_for(compose_id, &compose) {
            match self.queue.cancel_job(job) {
                Ok(()) | Err(QueueError::AlreadyTerminal) | Err(QueueError::NotExist) => {}
                Err(e) => warn!(job = %job, error = %e, "failed to cancel job on delete"),
            }
            match self.queue.delete_job(job) {
                Ok(()) | Err(QueueError::NotExist) => {}
                Err(e) => warn!(job = %job, error = %e, "failed to delete job"),
            }
            if let Err(e) = self.artifacts.delete_job(job).await {
                warn!(job = %job, error = %e, "failed to remove artifacts");
            }
        }
        self.compose_jobs.lock().remove(&compose_id);
        info!(compose = %compose_id, "compose deleted");
        Ok(())
    }

    fn jobs_for(&self, compose_id: Uuid, compose: &Compose) -> Vec<Uuid> {
        if let Some(jobs) = self.compose_jobs.lock().get(&compose_id) {
            return jobs.clone();
        }
        // Post-restart fallback: the build job and any registration jobs
        // are recorded on the compose itself
        compose
            .image_build
            .job_id
            .into_iter()
            .chain(compose.image_build.targets.iter().filter_map(|t| t.registration_job_id))
            .collect()
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
