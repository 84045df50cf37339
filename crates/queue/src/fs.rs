// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem-backed job queue.
//!
//! Every job is persisted as `<dir>/<uuid>.json`, written via a temp file
//! and an atomic rename. The in-memory ready index and dependants map are
//! rebuilt from a single scan of the directory on open.

use crate::error::QueueError;
use crate::job::{Job, JobKind, JobStatus};
use kiln_core::Clock;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::value::RawValue;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// A persistent job queue with dependency gating.
///
/// Single-writer, multi-reader: one mutex guards all bookkeeping, and a
/// [`Notify`] wakes blocked dequeues. Signals are edge-triggered; a woken
/// waiter re-scans under the lock because a racing waiter may have taken
/// the job.
pub struct FsJobQueue<C: Clock = kiln_core::SystemClock> {
    dir: PathBuf,
    clock: C,
    inner: Mutex<Inner>,
    ready: Notify,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, Job>,
    /// Ready-for-dequeue ids, FIFO within a kind.
    pending: HashMap<JobKind, VecDeque<Uuid>>,
    /// Back-edges: dependency id → jobs gated on it.
    dependants: HashMap<Uuid, Vec<Uuid>>,
}

/// A dependency gate is satisfied once the dependency has finished —
/// success or failure, but a result exists either way. A job that was
/// canceled without finishing has no result and never will; it does not
/// open the gate, its cancellation spreads to the dependants instead. A
/// missing record counts as satisfied: jobs can only be deleted once
/// terminal, and a deleted non-finished dependency has already canceled
/// everything gated on it.
fn dep_satisfied(jobs: &HashMap<Uuid, Job>, id: &Uuid) -> bool {
    jobs.get(id).map(|j| j.finished_at.is_some()).unwrap_or(true)
}

impl<C: Clock> FsJobQueue<C> {
    /// Open a queue directory, reloading every persisted job.
    ///
    /// Jobs that were running when the previous process died are reset to
    /// ready (at-least-once dispatch). Unparseable job files are a hard
    /// error: a corrupt queue must not silently lose work.
    pub fn open(dir: impl Into<PathBuf>, clock: C) -> Result<Self, QueueError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut jobs = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            let job: Job = serde_json::from_slice(&bytes)?;
            jobs.insert(job.id, job);
        }

        let queue =
            Self { dir, clock, inner: Mutex::new(Inner::default()), ready: Notify::new() };

        let mut reset = 0;
        for job in jobs.values_mut() {
            if job.is_running() {
                job.started_at = None;
                queue.write_job(job)?;
                reset += 1;
            }
        }
        if reset > 0 {
            warn!(count = reset, "reset running jobs to ready after restart");
        }

        // Cancellation spreads through the dependency graph: a job gated
        // on a canceled dependency that never produced a result can
        // itself never run. The cascade is normally applied when the
        // cancel lands; re-deriving it here covers a crash between the
        // individual job writes.
        loop {
            let doomed: Vec<Uuid> = jobs
                .values()
                .filter(|j| !j.canceled && j.finished_at.is_none())
                .filter(|j| {
                    j.dependencies.iter().any(|d| {
                        matches!(jobs.get(d), Some(dep) if dep.canceled && dep.finished_at.is_none())
                    })
                })
                .map(|j| j.id)
                .collect();
            if doomed.is_empty() {
                break;
            }
            for id in doomed {
                if let Some(job) = jobs.get_mut(&id) {
                    job.canceled = true;
                    queue.write_job(job)?;
                    warn!(%id, "canceled job gated on a canceled dependency");
                }
            }
        }

        let mut inner = queue.inner.lock();

        let mut ready: Vec<(chrono::DateTime<chrono::Utc>, Uuid, JobKind)> = jobs
            .values()
            .filter(|j| {
                j.started_at.is_none()
                    && !j.canceled
                    && j.dependencies.iter().all(|d| dep_satisfied(&jobs, d))
            })
            .map(|j| (j.queued_at, j.id, j.kind))
            .collect();
        ready.sort_by_key(|(queued_at, _, _)| *queued_at);
        for (_, id, kind) in ready {
            inner.pending.entry(kind).or_default().push_back(id);
        }

        for job in jobs.values() {
            if job.started_at.is_some() || job.canceled {
                continue;
            }
            for dep in &job.dependencies {
                if jobs.get(dep).map(|d| d.finished_at.is_none()) == Some(true) {
                    inner.dependants.entry(*dep).or_default().push(job.id);
                }
            }
        }

        inner.jobs = jobs;
        drop(inner);

        Ok(queue)
    }

    /// Persist a new job and index it.
    ///
    /// The job becomes ready immediately when every dependency is already
    /// terminal; otherwise it is registered under each still-open
    /// dependency and promoted by [`finish_job`](Self::finish_job).
    pub fn enqueue<T: Serialize>(
        &self,
        kind: JobKind,
        args: &T,
        dependencies: &[Uuid],
    ) -> Result<Uuid, QueueError> {
        let mut job = Job::new(kind, args, dependencies.to_vec(), &self.clock)?;

        let mut inner = self.inner.lock();
        self.write_job(&job)?;

        for dep in &job.dependencies {
            if !inner.jobs.contains_key(dep) {
                // Roll back the persisted record
                let _ = std::fs::remove_file(self.job_path(&job.id));
                return Err(QueueError::UnknownDependency(*dep));
            }
        }

        let id = job.id;

        // A dependency canceled before producing a result will never open
        // its gate; the new job inherits the cancellation immediately.
        let doomed = job.dependencies.iter().any(|d| {
            matches!(inner.jobs.get(d), Some(dep) if dep.canceled && dep.finished_at.is_none())
        });
        if doomed {
            job.canceled = true;
            self.write_job(&job)?;
        }

        let ready = !job.canceled && job.dependencies.iter().all(|d| dep_satisfied(&inner.jobs, d));
        if ready {
            inner.pending.entry(kind).or_default().push_back(id);
        } else if !job.canceled {
            for dep in &job.dependencies {
                if inner.jobs.get(dep).map(|j| j.finished_at.is_none()) == Some(true) {
                    inner.dependants.entry(*dep).or_default().push(id);
                }
            }
        }
        inner.jobs.insert(id, job);
        drop(inner);

        debug!(%id, %kind, ready, "enqueued job");
        if ready {
            self.ready.notify_waiters();
        }
        Ok(id)
    }

    /// Claim the next ready job of any accepted kind, blocking until one
    /// becomes ready or `token` is canceled.
    ///
    /// Kinds are tried in the caller's preference order; within a kind,
    /// dequeue order is FIFO by enqueue time. The started timestamp is
    /// stamped atomically with removal from the ready index. The returned
    /// dependency list lets the worker fetch upstream results.
    pub async fn dequeue(
        &self,
        token: &CancellationToken,
        kinds: &[JobKind],
    ) -> Result<(Uuid, Vec<Uuid>, Box<RawValue>), QueueError> {
        loop {
            // Register interest before scanning so a wake between the
            // scan and the await is not lost.
            let mut notified = std::pin::pin!(self.ready.notified());
            notified.as_mut().enable();

            if let Some(claimed) = self.try_claim(kinds)? {
                return Ok(claimed);
            }

            tokio::select! {
                _ = notified.as_mut() => {}
                _ = token.cancelled() => return Err(QueueError::Canceled),
            }
        }
    }

    fn try_claim(
        &self,
        kinds: &[JobKind],
    ) -> Result<Option<(Uuid, Vec<Uuid>, Box<RawValue>)>, QueueError> {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        let Inner { jobs, pending, .. } = &mut *inner;

        for kind in kinds {
            let Some(queue) = pending.get_mut(kind) else { continue };
            while let Some(id) = queue.pop_front() {
                // Canceled jobs sit in the index until claimed, then drop out
                let Some(job) = jobs.get_mut(&id) else { continue };
                if job.canceled {
                    continue;
                }

                job.started_at = Some(now);
                if let Err(e) = self.write_job(job) {
                    job.started_at = None;
                    queue.push_front(id);
                    return Err(e);
                }
                debug!(%id, kind = %job.kind, "dequeued job");
                return Ok(Some((id, job.dependencies.clone(), job.args.clone())));
            }
        }
        Ok(None)
    }

    /// Record a running job's result and promote any dependants whose
    /// gates are now all satisfied.
    pub fn finish_job(&self, id: Uuid, result: Box<RawValue>) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        let Inner { jobs, pending, dependants } = &mut *inner;

        let job = jobs.get_mut(&id).ok_or(QueueError::NotExist)?;
        if !job.is_running() {
            return Err(QueueError::NotRunning);
        }

        job.result = Some(result);
        job.finished_at = Some(now);
        if let Err(e) = self.write_job(job) {
            job.result = None;
            job.finished_at = None;
            return Err(e);
        }

        let mut promoted = false;
        for dep_id in dependants.remove(&id).unwrap_or_default() {
            let Some(dep) = jobs.get(&dep_id) else { continue };
            if !dep.canceled && dep.dependencies.iter().all(|d| dep_satisfied(jobs, d)) {
                pending.entry(dep.kind).or_default().push_back(dep_id);
                promoted = true;
            }
        }
        drop(inner);

        debug!(%id, promoted, "finished job");
        if promoted {
            self.ready.notify_waiters();
        }
        Ok(())
    }

    /// Mark a job canceled. Cooperative: a running worker discovers the
    /// flag by polling and is responsible for abandoning the job.
    ///
    /// A canceled job never produces a result, so nothing gated on it can
    /// ever become ready; the cancellation covers those dependants too,
    /// transitively.
    pub fn cancel_job(&self, id: Uuid) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        match inner.jobs.get(&id) {
            None => return Err(QueueError::NotExist),
            Some(job) if job.finished_at.is_some() => return Err(QueueError::AlreadyTerminal),
            Some(job) if job.canceled => return Ok(()),
            Some(_) => {}
        }

        let Inner { jobs, dependants, .. } = &mut *inner;
        let mut pending_cancel = vec![id];
        while let Some(current) = pending_cancel.pop() {
            let Some(job) = jobs.get_mut(&current) else { continue };
            if job.canceled || job.finished_at.is_some() {
                continue;
            }
            job.canceled = true;
            self.write_job(job)?;
            debug!(id = %current, "canceled job");
            if let Some(waiting) = dependants.get(&current) {
                pending_cancel.extend(waiting.iter().copied());
            }
        }
        Ok(())
    }

    /// A finished job's result payload, if any.
    pub fn result(&self, id: Uuid) -> Result<Option<Box<RawValue>>, QueueError> {
        let inner = self.inner.lock();
        let job = inner.jobs.get(&id).ok_or(QueueError::NotExist)?;
        Ok(job.result.clone())
    }

    /// Lifecycle snapshot of one job.
    pub fn job_status(&self, id: Uuid) -> Result<JobStatus, QueueError> {
        let inner = self.inner.lock();
        let job = inner.jobs.get(&id).ok_or(QueueError::NotExist)?;
        Ok(JobStatus {
            kind: job.kind,
            queued_at: job.queued_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            canceled: job.canceled,
            result: job.result.clone(),
        })
    }

    /// Remove a terminal (or canceled) job entirely.
    pub fn delete_job(&self, id: Uuid) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        let job = inner.jobs.get(&id).ok_or(QueueError::NotExist)?;
        if !job.is_terminal() {
            return Err(QueueError::NotRunning);
        }

        std::fs::remove_file(self.job_path(&id))?;
        inner.jobs.remove(&id);
        for queue in inner.pending.values_mut() {
            queue.retain(|queued| *queued != id);
        }
        inner.dependants.remove(&id);
        for waiting in inner.dependants.values_mut() {
            waiting.retain(|waiting_id| *waiting_id != id);
        }
        debug!(%id, "deleted job");
        Ok(())
    }

    fn job_path(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn write_job(&self, job: &Job) -> Result<(), QueueError> {
        let tmp = self.dir.join(format!(".{}.tmp", job.id));
        let bytes = serde_json::to_vec(job)?;
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, self.job_path(&job.id))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
