// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable store: blueprints, workspace drafts, composes, sources,
//! and blueprint change history.

use crate::compose::{Compose, ImageBuild};
use crate::error::StoreError;
use crate::v0;
use crate::writer::StateWriter;
use kiln_core::{Blueprint, Change, Clock, SourceConfig, SystemClock};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Live store contents. Mutated only through [`Store::change`].
#[derive(Debug, Clone, Default)]
pub struct StoreData {
    pub blueprints: HashMap<String, Blueprint>,
    /// Uncommitted drafts; a workspace entry shadows the committed
    /// blueprint of the same name on read.
    pub workspace: HashMap<String, Blueprint>,
    pub composes: HashMap<Uuid, Compose>,
    pub sources: HashMap<String, SourceConfig>,
    /// name → commit id → change record
    pub changes: HashMap<String, HashMap<String, Change>>,
    /// name → ordered commit ids
    pub commits: HashMap<String, Vec<String>>,
}

/// The persistent catalog, protected by a single writer lock.
///
/// Every mutation runs under the exclusive lock, re-serializes the whole
/// document, and persists it atomically before the lock is released, so a
/// reader can never observe state that would not survive a crash.
pub struct Store<C: Clock = SystemClock> {
    clock: C,
    inner: RwLock<StoreData>,
    writer: StateWriter,
}

impl<C: Clock> Store<C> {
    /// Open (or create) the store document at `path`, applying the
    /// load-time recovery pass.
    pub fn open(path: impl Into<PathBuf>, clock: C) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match std::fs::read(&path) {
            Ok(bytes) => v0::from_document(serde_json::from_slice(&bytes)?)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { clock, inner: RwLock::new(data), writer: StateWriter::new(path) })
    }

    /// Run a mutation under the exclusive lock and persist the result.
    ///
    /// On any persistence failure the in-memory state is rolled back, so
    /// memory and disk never diverge.
    pub fn change<T>(&self, f: impl FnOnce(&mut StoreData) -> T) -> Result<T, StoreError> {
        let mut data = self.inner.write();
        let backup = data.clone();
        let out = f(&mut data);

        let result = serde_json::to_vec_pretty(&v0::to_document(&data))
            .map_err(StoreError::from)
            .and_then(|bytes| self.writer.persist(&bytes).map_err(StoreError::from));
        if let Err(e) = result {
            *data = backup;
            return Err(e);
        }
        Ok(out)
    }

    /// Read a consistent snapshot under the shared lock.
    pub fn read<T>(&self, f: impl FnOnce(&StoreData) -> T) -> T {
        f(&self.inner.read())
    }

    /// Subscribe to serialized store documents as they are persisted.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Vec<u8>>> {
        self.writer.subscribe()
    }

    //
    // Blueprints
    //

    pub fn list_blueprints(&self) -> Vec<String> {
        self.read(|data| {
            let mut names: Vec<String> = data.blueprints.keys().cloned().collect();
            names.sort();
            names
        })
    }

    /// Get a blueprint by name. The workspace draft shadows the committed
    /// copy; the bool reports whether the returned value is a draft.
    pub fn get_blueprint(&self, name: &str) -> Option<(Blueprint, bool)> {
        self.read(|data| {
            if let Some(draft) = data.workspace.get(name) {
                return Some((draft.clone(), true));
            }
            data.blueprints.get(name).map(|bp| (bp.clone(), false))
        })
    }

    /// Commit a blueprint: bump its version when unchanged, record a
    /// change entry, append the commit, and clear any workspace draft.
    pub fn push_blueprint(
        &self,
        mut blueprint: Blueprint,
        message: impl Into<String>,
    ) -> Result<(), StoreError> {
        let message = message.into();
        self.change(|data| {
            match data.blueprints.get(&blueprint.name) {
                Some(existing)
                    if blueprint.version.is_empty() || blueprint.version == existing.version =>
                {
                    blueprint.version = existing.version.clone();
                    blueprint.bump_version();
                }
                None if blueprint.version.is_empty() => blueprint.bump_version(),
                _ => {}
            }

            let commit = blueprint.commit_id();
            // 1 second resolution; commit ordering on recovery is
            // best-effort within the same second.
            let timestamp = self.clock.now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
            let name = blueprint.name.clone();

            data.changes.entry(name.clone()).or_default().insert(
                commit.clone(),
                Change {
                    commit: commit.clone(),
                    message,
                    revision: None,
                    timestamp,
                    version: Some(blueprint.version.clone()),
                },
            );
            let commits = data.commits.entry(name.clone()).or_default();
            if !commits.contains(&commit) {
                commits.push(commit);
            }
            data.workspace.remove(&name);
            data.blueprints.insert(name, blueprint);
        })
    }

    /// Save a draft without committing it.
    pub fn push_blueprint_to_workspace(&self, blueprint: Blueprint) -> Result<(), StoreError> {
        self.change(|data| {
            data.workspace.insert(blueprint.name.clone(), blueprint);
        })
    }

    pub fn delete_blueprint(&self, name: &str) -> Result<(), StoreError> {
        self.change(|data| {
            // The change history is kept; only the live entry goes away
            if data.blueprints.remove(name).is_none() {
                return Err(name.to_string());
            }
            data.workspace.remove(name);
            Ok(())
        })?
        .map_err(StoreError::NotExist)
    }

    pub fn delete_workspace(&self, name: &str) -> Result<(), StoreError> {
        self.change(|data| data.workspace.remove(name).map(|_| ()).ok_or_else(|| name.to_string()))?
            .map_err(StoreError::NotExist)
    }

    /// Tag the newest commit of a blueprint with the next revision number.
    pub fn tag_blueprint(&self, name: &str) -> Result<(), StoreError> {
        self.change(|data| {
            let Some(commits) = data.commits.get(name) else {
                return Err(name.to_string());
            };
            let Some(latest) = commits.last().cloned() else {
                return Err(name.to_string());
            };
            let changes = data.changes.get_mut(name).ok_or_else(|| name.to_string())?;

            let next = changes.values().filter_map(|c| c.revision).max().unwrap_or(0) + 1;
            let latest_change = changes.get_mut(&latest).ok_or_else(|| name.to_string())?;
            if latest_change.revision.is_none() {
                latest_change.revision = Some(next);
            }
            Ok(())
        })?
        .map_err(StoreError::NotExist)
    }

    //
    // Sources
    //

    pub fn push_source(&self, source: SourceConfig) -> Result<(), StoreError> {
        self.change(|data| {
            data.sources.insert(source.name.clone(), source);
        })
    }

    pub fn delete_source(&self, name: &str) -> Result<(), StoreError> {
        self.change(|data| {
            // System sources are seeded from the host and never deletable
            match data.sources.get(name) {
                Some(source) if !source.system => {
                    data.sources.remove(name);
                    Ok(())
                }
                _ => Err(name.to_string()),
            }
        })?
        .map_err(StoreError::NotExist)
    }

    pub fn get_all_sources(&self) -> HashMap<String, SourceConfig> {
        self.read(|data| data.sources.clone())
    }

    //
    // Composes
    //

    pub fn insert_compose(&self, id: Uuid, compose: Compose) -> Result<(), StoreError> {
        self.change(|data| {
            data.composes.insert(id, compose);
        })
    }

    pub fn get_compose(&self, id: Uuid) -> Option<Compose> {
        self.read(|data| data.composes.get(&id).cloned())
    }

    pub fn get_all_composes(&self) -> HashMap<Uuid, Compose> {
        self.read(|data| data.composes.clone())
    }

    /// Find the compose whose image build is backed by the given job.
    pub fn compose_by_job(&self, job_id: Uuid) -> Option<(Uuid, Compose)> {
        self.read(|data| {
            data.composes
                .iter()
                .find(|(_, c)| c.image_build.job_id == Some(job_id))
                .map(|(id, c)| (*id, c.clone()))
        })
    }

    /// Find the compose (and target) whose registration step is driven by
    /// the given job.
    pub fn compose_by_registration_job(&self, job_id: Uuid) -> Option<(Uuid, Uuid)> {
        self.read(|data| {
            data.composes.iter().find_map(|(id, c)| {
                c.image_build
                    .targets
                    .iter()
                    .find(|t| t.registration_job_id == Some(job_id))
                    .map(|t| (*id, t.uuid))
            })
        })
    }

    /// Apply a state transition to a compose's image build.
    pub fn update_image_build(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut ImageBuild),
    ) -> Result<(), StoreError> {
        self.change(|data| match data.composes.get_mut(&id) {
            Some(compose) => {
                f(&mut compose.image_build);
                Ok(())
            }
            None => Err(id.to_string()),
        })?
        .map_err(StoreError::NotExist)
    }

    /// Remove a compose, returning it so the caller can clean up its jobs
    /// and artifacts.
    pub fn delete_compose(&self, id: Uuid) -> Result<Compose, StoreError> {
        self.change(|data| data.composes.remove(&id).ok_or_else(|| id.to_string()))?
            .map_err(StoreError::NotExist)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
