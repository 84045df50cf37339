// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Image-build queue status.

use serde::{Deserialize, Serialize};

/// State of an image build (and of each upload target) as driven by the
/// underlying job's lifecycle.
///
/// Serialized as the uppercase tokens used on the wire and in the store
/// document: `WAITING`, `RUNNING`, `FINISHED`, `FAILED`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// Job enqueued, not yet picked up by a worker
    #[default]
    Waiting,
    /// A worker has dequeued the job
    Running,
    /// Job finished and reported success
    Finished,
    /// Job finished with an error, or was canceled
    Failed,
}

impl QueueStatus {
    /// Check if this status is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Finished | QueueStatus::Failed)
    }
}

crate::simple_display! {
    QueueStatus {
        Waiting => "WAITING",
        Running => "RUNNING",
        Finished => "FINISHED",
        Failed => "FAILED",
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
