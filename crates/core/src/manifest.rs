// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build manifests and build-engine results.

use serde::{Deserialize, Serialize};

/// An opaque build recipe produced by the image catalog and consumed by the
/// build engine. The orchestrator never inspects its contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(pub serde_json::Value);

impl Manifest {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Result record emitted by the build engine for one manifest.
///
/// `success` is the only field the orchestrator interprets; everything else
/// is carried for inspection by clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub success: bool,
    /// Size in bytes of the primary artifact, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<StageResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembler: Option<StageResult>,
    /// Upload or registration failures appended by the worker
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_errors: Vec<String>,
}

impl BuildResult {
    /// A failed result with no detail, used when the engine crashes without
    /// producing output.
    pub fn failed() -> Self {
        Self { success: false, ..Default::default() }
    }
}

/// Result of a single engine stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub name: String,
    pub success: bool,
    #[serde(default)]
    pub output: String,
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
