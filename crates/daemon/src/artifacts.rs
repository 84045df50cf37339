// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem-backed artifact store.
//!
//! Workers upload build outputs here, keyed by `(job id, artifact name)`.
//! The store itself is oblivious to job state; the worker API enforces the
//! temporal rules (uploads are only accepted while the job runs).

use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Stream an artifact into `<root>/<job_id>/<name>` via a temp file
    /// and atomic rename. Returns the number of bytes written.
    pub async fn put(
        &self,
        job: Uuid,
        name: &str,
        reader: &mut (impl AsyncRead + Unpin),
    ) -> std::io::Result<u64> {
        validate_name(name)?;
        let dir = self.root.join(job.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let tmp = dir.join(format!(".{name}.tmp"));
        let mut file = tokio::fs::File::create(&tmp).await?;
        let written = tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        tokio::fs::rename(&tmp, dir.join(name)).await?;
        Ok(written)
    }

    /// Open an artifact for reading.
    pub async fn open(&self, job: Uuid, name: &str) -> std::io::Result<tokio::fs::File> {
        validate_name(name)?;
        tokio::fs::File::open(self.root.join(job.to_string()).join(name)).await
    }

    /// Remove every artifact uploaded for a job. Missing directories are
    /// fine; a job need not have uploaded anything.
    pub async fn delete_job(&self, job: Uuid) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(self.root.join(job.to_string())).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Artifact names come straight from the URL path; anything that could
/// escape the job directory is rejected.
fn validate_name(name: &str) -> std::io::Result<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
    {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid artifact name: {name:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
