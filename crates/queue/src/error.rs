// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue error kinds.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by queue operations.
///
/// The taxonomy is closed: HTTP handlers map these kinds onto status codes
/// and must never have to parse message strings.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job does not exist")]
    NotExist,

    #[error("job is not running")]
    NotRunning,

    #[error("job is already in a terminal state")]
    AlreadyTerminal,

    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("unknown dependency: {0}")]
    UnknownDependency(Uuid),

    #[error("dequeue canceled")]
    Canceled,

    #[error("storage error: {0}")]
    StorageIo(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
