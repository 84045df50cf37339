// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborator seams: the image catalog and the package depsolver.
//!
//! Both are external concerns. The catalog knows how to turn a blueprint
//! plus a resolved package closure into a build manifest; the depsolver is
//! an external helper process that resolves package closures against the
//! configured repositories. The daemon only depends on these narrow
//! traits.

use kiln_core::{Blueprint, ImageType, Manifest, PackageSpec, RepoConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unsupported image type: {0}")]
    UnsupportedImageType(ImageType),
    #[error("manifest generation failed: {0}")]
    Manifest(String),
}

#[derive(Debug, Error)]
pub enum DepsolveError {
    #[error("depsolver failed: {0}")]
    Failed(String),
    #[error("cannot run depsolver: {0}")]
    Io(#[from] std::io::Error),
    #[error("depsolver produced invalid output: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Produces build manifests and knows the host's default repositories.
pub trait ImageCatalog: Send + Sync {
    /// Default repositories for the host distribution.
    fn repositories(&self) -> Vec<RepoConfig>;

    /// Extra packages the assembler for this image type needs in the
    /// build environment.
    fn build_packages(&self, image_type: ImageType) -> Vec<String>;

    /// Produce a build manifest from a blueprint and resolved closures.
    fn manifest(
        &self,
        blueprint: &Blueprint,
        image_type: ImageType,
        repos: &[RepoConfig],
        packages: &[PackageSpec],
        build_packages: &[PackageSpec],
    ) -> Result<Manifest, CatalogError>;
}

/// Resolves a package closure. Blocking; callers run it on the blocking
/// pool.
pub trait Depsolver: Send + Sync {
    fn depsolve(
        &self,
        packages: &[String],
        excludes: &[String],
        repos: &[RepoConfig],
    ) -> Result<Vec<PackageSpec>, DepsolveError>;
}

//
// Host implementations
//

/// Catalog for the host distribution: fixed repositories plus a pipeline
/// template per image type.
pub struct HostCatalog {
    repos: Vec<RepoConfig>,
}

impl HostCatalog {
    pub fn new(repos: Vec<RepoConfig>) -> Self {
        Self { repos }
    }
}

impl ImageCatalog for HostCatalog {
    fn repositories(&self) -> Vec<RepoConfig> {
        self.repos.clone()
    }

    fn build_packages(&self, image_type: ImageType) -> Vec<String> {
        let mut packages = vec!["rpm".to_string(), "systemd".to_string()];
        match image_type {
            ImageType::Qcow2 | ImageType::Openstack | ImageType::Vhd | ImageType::Vmdk => {
                packages.push("qemu-img".to_string());
            }
            ImageType::Ami | ImageType::PartitionedDisk | ImageType::Ext4Filesystem => {
                packages.push("e2fsprogs".to_string());
            }
            ImageType::Tar => packages.push("tar".to_string()),
            ImageType::Liveiso => packages.push("xorriso".to_string()),
            ImageType::TestType => {}
        }
        packages
    }

    fn manifest(
        &self,
        blueprint: &Blueprint,
        image_type: ImageType,
        repos: &[RepoConfig],
        packages: &[PackageSpec],
        build_packages: &[PackageSpec],
    ) -> Result<Manifest, CatalogError> {
        let assembler = assembler_for(image_type)?;
        let kernel_append = blueprint
            .customizations
            .as_ref()
            .and_then(|c| c.kernel.as_ref())
            .map(|k| k.append.clone())
            .unwrap_or_default();

        let package_refs = |specs: &[PackageSpec]| -> Vec<serde_json::Value> {
            specs
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.name,
                        "epoch": p.epoch,
                        "version": p.version,
                        "release": p.release,
                        "arch": p.arch,
                        "checksum": p.checksum,
                    })
                })
                .collect()
        };

        debug!(
            blueprint = %blueprint.name,
            image_type = %image_type,
            packages = packages.len(),
            "assembling manifest"
        );

        Ok(Manifest::new(serde_json::json!({
            "pipeline": {
                "build": {
                    "pipeline": {
                        "stages": [{
                            "name": "org.kiln.rpm",
                            "options": { "packages": package_refs(build_packages) },
                        }],
                    },
                },
                "stages": [
                    {
                        "name": "org.kiln.rpm",
                        "options": { "packages": package_refs(packages) },
                    },
                    {
                        "name": "org.kiln.kernel-cmdline",
                        "options": { "kernel_opts": kernel_append },
                    },
                ],
                "assembler": assembler,
            },
            "sources": {
                "org.kiln.files": {
                    "urls": packages
                        .iter()
                        .filter_map(|p| p.remote_location.clone())
                        .collect::<Vec<_>>(),
                },
            },
            "repositories": repos,
        })))
    }
}

fn assembler_for(image_type: ImageType) -> Result<serde_json::Value, CatalogError> {
    let assembler = match image_type {
        ImageType::Qcow2 | ImageType::Openstack => serde_json::json!({
            "name": "org.kiln.qemu",
            "options": { "format": "qcow2", "filename": image_type.filename() },
        }),
        ImageType::Vhd => serde_json::json!({
            "name": "org.kiln.qemu",
            "options": { "format": "vpc", "filename": image_type.filename() },
        }),
        ImageType::Vmdk => serde_json::json!({
            "name": "org.kiln.qemu",
            "options": { "format": "vmdk", "filename": image_type.filename() },
        }),
        ImageType::Ami | ImageType::PartitionedDisk => serde_json::json!({
            "name": "org.kiln.rawfs",
            "options": { "filename": image_type.filename(), "partitioned": true },
        }),
        ImageType::Ext4Filesystem => serde_json::json!({
            "name": "org.kiln.rawfs",
            "options": { "filename": image_type.filename(), "partitioned": false },
        }),
        ImageType::Tar => serde_json::json!({
            "name": "org.kiln.tar",
            "options": { "filename": image_type.filename(), "compression": "xz" },
        }),
        ImageType::Liveiso => return Err(CatalogError::UnsupportedImageType(image_type)),
        ImageType::TestType => serde_json::json!({
            "name": "org.kiln.noop",
            "options": { "filename": image_type.filename() },
        }),
    };
    Ok(assembler)
}

//
// Subprocess depsolver
//

#[derive(Serialize)]
struct DepsolveRequest<'a> {
    command: &'static str,
    packages: &'a [String],
    excludes: &'a [String],
    repos: &'a [RepoConfig],
}

#[derive(Deserialize)]
struct DepsolveResponse {
    #[serde(default)]
    packages: Vec<PackageSpec>,
    #[serde(default)]
    error: Option<String>,
}

/// Depsolver backed by an external helper binary speaking JSON on
/// stdin/stdout.
pub struct SubprocessDepsolver {
    helper: PathBuf,
}

impl SubprocessDepsolver {
    pub fn new(helper: impl Into<PathBuf>) -> Self {
        Self { helper: helper.into() }
    }
}

impl Depsolver for SubprocessDepsolver {
    fn depsolve(
        &self,
        packages: &[String],
        excludes: &[String],
        repos: &[RepoConfig],
    ) -> Result<Vec<PackageSpec>, DepsolveError> {
        use std::io::Write;
        use std::process::{Command, Stdio};

        let request = DepsolveRequest { command: "depsolve", packages, excludes, repos };
        let mut child = Command::new(&self.helper)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        if let Some(stdin) = child.stdin.take() {
            let mut stdin = stdin;
            stdin.write_all(&serde_json::to_vec(&request)?)?;
        }

        let output = child.wait_with_output()?;
        let response: DepsolveResponse = serde_json::from_slice(&output.stdout)?;
        if let Some(error) = response.error {
            return Err(DepsolveError::Failed(error));
        }
        if !output.status.success() {
            return Err(DepsolveError::Failed(format!(
                "helper exited with {}",
                output.status
            )));
        }
        Ok(response.packages)
    }
}

//
// Test fakes
//

/// Catalog fake producing a minimal manifest.
#[cfg(test)]
pub struct FakeCatalog;

#[cfg(test)]
impl ImageCatalog for FakeCatalog {
    fn repositories(&self) -> Vec<RepoConfig> {
        vec![RepoConfig { id: "test".to_string(), ..Default::default() }]
    }

    fn build_packages(&self, _image_type: ImageType) -> Vec<String> {
        vec!["rpm".to_string()]
    }

    fn manifest(
        &self,
        blueprint: &Blueprint,
        image_type: ImageType,
        _repos: &[RepoConfig],
        packages: &[PackageSpec],
        _build_packages: &[PackageSpec],
    ) -> Result<Manifest, CatalogError> {
        Ok(Manifest::new(serde_json::json!({
            "blueprint": blueprint.name,
            "image_type": image_type.name(),
            "packages": packages.iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
        })))
    }
}

/// Depsolver fake resolving each name to a fixed spec.
#[cfg(test)]
pub struct FakeDepsolver;

#[cfg(test)]
impl Depsolver for FakeDepsolver {
    fn depsolve(
        &self,
        packages: &[String],
        _excludes: &[String],
        _repos: &[RepoConfig],
    ) -> Result<Vec<PackageSpec>, DepsolveError> {
        Ok(packages
            .iter()
            .map(|name| PackageSpec {
                name: name.clone(),
                epoch: 0,
                version: "1.0".to_string(),
                release: "1".to_string(),
                arch: "x86_64".to_string(),
                remote_location: None,
                checksum: None,
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
