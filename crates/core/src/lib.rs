// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kiln-core: shared domain types for the kiln compose service

pub mod macros;

pub mod blueprint;
pub mod clock;
pub mod image;
pub mod manifest;
pub mod repo;
pub mod status;
pub mod target;

pub use blueprint::{Blueprint, Change, Customizations, Package, SourceConfig};
pub use clock::{Clock, FakeClock, SystemClock};
pub use image::ImageType;
pub use manifest::{BuildResult, Manifest, StageResult};
pub use repo::{PackageSpec, RepoConfig};
pub use status::QueueStatus;
pub use target::{
    AwsTargetOptions, AzureTargetOptions, GcpTargetOptions, KojiTargetOptions, LocalTargetOptions,
    Target, TargetOptions, VmwareTargetOptions,
};
