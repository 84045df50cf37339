// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration from the environment.

use kiln_core::RepoConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// CA certificate used to verify remote worker client certificates.
pub const CA_CERT_PATH: &str = "/etc/kiln/ca-crt.pem";
/// Server certificate presented to remote workers.
pub const SERVER_CERT_PATH: &str = "/etc/kiln/composer-crt.pem";
/// Server private key.
pub const SERVER_KEY_PATH: &str = "/etc/kiln/composer-key.pem";
/// Depsolver helper binary (JSON over stdin/stdout).
pub const DEPSOLVER_HELPER: &str = "/usr/libexec/kiln/dnf-json";
/// Host repository definitions, one JSON array of repo configs.
pub const REPOSITORIES_PATH: &str = "/etc/kiln/repositories.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set; is the service unit missing {1}=?")]
    MissingEnv(&'static str, &'static str),

    #[error("cannot read {0}: {1}")]
    Unreadable(PathBuf, std::io::Error),

    #[error("invalid repository definitions: {0}")]
    InvalidRepositories(#[from] serde_json::Error),
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for the store document, job queue, and artifacts
    pub state_dir: PathBuf,
    /// Scratch space handed to the external build engine
    pub cache_dir: PathBuf,
    /// Optional TCP listen address for remote (mTLS) workers
    pub remote_worker_listen: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let state_dir = std::env::var_os("STATE_DIRECTORY")
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingEnv("STATE_DIRECTORY", "StateDirectory"))?;
        let cache_dir = std::env::var_os("CACHE_DIRECTORY")
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingEnv("CACHE_DIRECTORY", "CacheDirectory"))?;
        let remote_worker_listen =
            std::env::var("KILN_REMOTE_WORKER_LISTEN").ok().filter(|s| !s.is_empty());
        Ok(Self { state_dir, cache_dir, remote_worker_listen })
    }

    pub fn store_path(&self) -> PathBuf {
        self.state_dir.join("state.json")
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.state_dir.join("jobs")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.state_dir.join("artifacts")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state_dir.join("api.sock")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("kilnd.lock")
    }

    /// Load the host repository definitions. A missing file simply means
    /// no default repositories.
    pub fn load_repositories(&self, path: &Path) -> Result<Vec<RepoConfig>, ConfigError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(ConfigError::Unreadable(path.to_path_buf(), e)),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
