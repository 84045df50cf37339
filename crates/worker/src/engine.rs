// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Invocation of the external build engine.
//!
//! The engine consumes a manifest on stdin and produces an image tree in
//! the output directory plus a JSON result record on stdout. Its stderr
//! goes straight through to ours for the build log.

use kiln_core::{BuildResult, Manifest};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot run build engine: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot encode manifest: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("build engine produced unparseable output: {0}")]
    InvalidOutput(String),
}

pub struct BuildEngine {
    binary: PathBuf,
    store_dir: PathBuf,
}

impl BuildEngine {
    pub fn new(binary: impl Into<PathBuf>, store_dir: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into(), store_dir: store_dir.into() }
    }

    /// Run one build. A non-zero exit with a parseable result record is a
    /// failed build, not a transport error; the record carries the detail.
    pub async fn run(
        &self,
        manifest: &Manifest,
        output_dir: &Path,
    ) -> Result<BuildResult, EngineError> {
        let mut child = tokio::process::Command::new(&self.binary)
            .arg("--store")
            .arg(&self.store_dir)
            .arg("--output-directory")
            .arg(output_dir)
            .arg("--json")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&serde_json::to_vec(manifest)?).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        match serde_json::from_slice::<BuildResult>(&output.stdout) {
            Ok(mut result) => {
                if !output.status.success() {
                    result.success = false;
                }
                Ok(result)
            }
            Err(_) if !output.status.success() => {
                // The engine crashed without a result record (e.g. out of
                // disk); report a bare failure so the job still finishes.
                warn!(status = %output.status, "build engine died without a result");
                Ok(BuildResult::failed())
            }
            Err(e) => Err(EngineError::InvalidOutput(e.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
