// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upload adapters for inline targets.
//!
//! The build job handles local, AWS, and Azure targets inline; anything
//! else is either a separate registration job or simply not supported by
//! this worker.

pub mod aws;
pub mod azure;
pub mod koji;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 upload failed: {0}")]
    Aws(String),

    #[error("Azure upload failed: {0}")]
    Azure(String),

    #[error("koji import failed: {0}")]
    Koji(String),

    #[error("upload to composer failed: {0}")]
    Composer(String),

    #[error("invalid target type: {0}")]
    UnsupportedTarget(String),
}
