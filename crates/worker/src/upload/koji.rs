// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Koji registration via the `koji` CLI.
//!
//! The hub speaks XML-RPC; rather than reimplementing that protocol the
//! worker shells out to the stock client, which also handles kerberos and
//! certificate auth from its own configuration.

use super::UploadError;
use kiln_core::KojiTargetOptions;
use std::path::Path;
use tracing::info;

/// Import one built artifact into the hub's upload directory.
pub async fn import(options: &KojiTargetOptions, artifact: &Path) -> Result<(), UploadError> {
    let output = tokio::process::Command::new("koji")
        .arg("--server")
        .arg(&options.server)
        .arg("import-archive")
        .arg(&options.upload_directory)
        .arg(artifact)
        .output()
        .await?;

    if !output.status.success() {
        return Err(UploadError::Koji(String::from_utf8_lossy(&output.stderr).to_string()));
    }

    info!(server = %options.server, artifact = %artifact.display(), "artifact imported into koji");
    Ok(())
}
