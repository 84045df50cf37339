// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blob upload for Azure targets.
//!
//! Signed REST calls against the blob endpoint; the SharedKey scheme
//! signs a canonicalized representation of each request with the storage
//! account key.

use super::UploadError;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use kiln_core::AzureTargetOptions;
use sha2::Sha256;
use std::path::Path;
use tracing::info;

const API_VERSION: &str = "2021-08-06";

/// Upload the image as a block blob named after the target filename.
pub async fn upload(options: &AzureTargetOptions, path: &Path) -> Result<(), UploadError> {
    let length = tokio::fs::metadata(path).await?.len();
    let blob = &options.filename;
    let url = format!(
        "https://{}.blob.core.windows.net/{}/{}",
        options.storage_account, options.container, blob
    );
    let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

    let canonical = format!(
        "PUT\n\n\n{length}\n\napplication/octet-stream\n\n\n\n\n\n\n\
         x-ms-blob-type:BlockBlob\nx-ms-date:{date}\nx-ms-version:{API_VERSION}\n\
         /{}/{}/{}",
        options.storage_account, options.container, blob
    );
    let signature = sign(&options.storage_access_key, &canonical)?;

    let file = tokio::fs::File::open(path).await?;
    let body = reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(file));

    let response = reqwest::Client::new()
        .put(&url)
        .header("content-type", "application/octet-stream")
        .header("content-length", length)
        .header("x-ms-blob-type", "BlockBlob")
        .header("x-ms-date", &date)
        .header("x-ms-version", API_VERSION)
        .header(
            "authorization",
            format!("SharedKey {}:{}", options.storage_account, signature),
        )
        .body(body)
        .send()
        .await
        .map_err(|e| UploadError::Azure(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        return Err(UploadError::Azure(format!("{status}: {detail}")));
    }

    info!(container = %options.container, %blob, "image uploaded to Azure");
    Ok(())
}

fn sign(account_key: &str, canonical: &str) -> Result<String, UploadError> {
    let engine = base64::engine::general_purpose::STANDARD;
    let key = engine
        .decode(account_key)
        .map_err(|e| UploadError::Azure(format!("invalid storage access key: {e}")))?;
    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|e| UploadError::Azure(e.to_string()))?;
    mac.update(canonical.as_bytes());
    Ok(engine.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
#[path = "azure_tests.rs"]
mod tests;
