// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kiln-queue: persistent, dependency-aware job queue.
//!
//! Jobs are typed units of work claimed by workers over the worker API.
//! The queue owns every job record, persists each one as its own JSON
//! file, and survives restarts: jobs that were running when the process
//! died are handed out again (at-least-once dispatch), so job handlers
//! must be idempotent or encode a unique artifact key in their args.

mod error;
mod fs;
mod job;

pub use error::QueueError;
pub use fs::FsJobQueue;
pub use job::{
    decode_args, encode_args, Job, JobKind, JobStatus, KojiFinalizeJob, KojiFinalizeJobResult,
    KojiInitJob, KojiInitJobResult, OsbuildJob, OsbuildJobResult,
};
