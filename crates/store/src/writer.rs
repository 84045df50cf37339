// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single state-writer for the serialized store document.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Persists serialized store documents atomically and fans each one out to
/// subscribers.
///
/// Subscribers get the exact bytes on disk; a lagging subscriber misses
/// intermediate documents, never sees a torn one.
pub struct StateWriter {
    path: PathBuf,
    tx: broadcast::Sender<Arc<Vec<u8>>>,
}

impl StateWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { path: path.into(), tx }
    }

    /// Write the document via a temp file and atomic rename, then notify
    /// subscribers.
    pub fn persist(&self, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, &self.path)?;

        // No receivers is fine; subscribers come and go
        let _ = self.tx.send(Arc::new(bytes.to_vec()));
        Ok(())
    }

    /// Subscribe to future store documents.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Vec<u8>>> {
        self.tx.subscribe()
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
