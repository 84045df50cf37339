// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Depsolver input and output records.

use serde::{Deserialize, Serialize};

/// A repository handed to the depsolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metalink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirrorlist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpg_key: Option<String>,
    #[serde(default)]
    pub check_gpg: bool,
    #[serde(default)]
    pub ignore_ssl: bool,
}

impl RepoConfig {
    /// Build a repo config from a stored source definition.
    pub fn from_source(source: &crate::blueprint::SourceConfig) -> Self {
        Self {
            id: source.name.clone(),
            name: Some(source.name.clone()),
            base_url: Some(source.url.clone()),
            check_gpg: source.check_gpg,
            ignore_ssl: !source.check_ssl,
            ..Default::default()
        }
    }
}

/// One resolved package in a depsolved closure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default)]
    pub epoch: u32,
    pub version: String,
    pub release: String,
    pub arch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}
