// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blueprint, change history, and package source types.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Declarative description of an image's contents.
///
/// A compose snapshots the blueprint value at enqueue time; the snapshot is
/// owned by the compose and never shares state with the live catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Semantic version, bumped on every push
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub modules: Vec<Package>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customizations: Option<Customizations>,
}

/// A package (or module) selected by name with an optional version glob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A package group selected by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
}

/// Image customizations applied on top of the package set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customizations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<KernelCustomization>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sshkey: Vec<SshKeyCustomization>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user: Vec<UserCustomization>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelCustomization {
    pub append: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SshKeyCustomization {
    pub user: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCustomization {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl Blueprint {
    /// Package names requested by this blueprint (packages + modules).
    pub fn package_names(&self) -> Vec<String> {
        self.packages.iter().chain(self.modules.iter()).map(|p| p.name.clone()).collect()
    }

    /// Bump the patch component of the version, defaulting to `0.0.1` when
    /// the current value is empty or unparseable.
    pub fn bump_version(&mut self) {
        match semver::Version::parse(&self.version) {
            Ok(mut v) => {
                v.patch += 1;
                self.version = v.to_string();
            }
            Err(_) => self.version = "0.0.1".to_string(),
        }
    }

    /// Content hash identifying one committed revision of the blueprint.
    pub fn commit_id(&self) -> String {
        let serialized = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&serialized);
        format!("{:x}", hasher.finalize())
    }
}

/// One committed revision of a blueprint.
///
/// The timestamp is formatted with 1 second resolution; commit ordering on
/// recovery is best-effort when two commits share a second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub commit: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
    pub timestamp: String,
    /// Blueprint version at this revision, used to order commits on recovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A package repository usable as a compose input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub url: String,
    pub check_gpg: bool,
    pub check_ssl: bool,
    /// System sources are seeded from the host and cannot be deleted
    #[serde(default)]
    pub system: bool,
}

#[cfg(test)]
#[path = "blueprint_tests.rs"]
mod tests;
