// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S3 upload for AWS targets.

use super::UploadError;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use kiln_core::AwsTargetOptions;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Upload the image to the target bucket. Returns the object key, which
/// the cloud-side import tooling picks up from there.
pub async fn upload(
    options: &AwsTargetOptions,
    image_name: &str,
    path: &Path,
) -> Result<String, UploadError> {
    let credentials = Credentials::new(
        options.access_key_id.clone(),
        options.secret_access_key.clone(),
        None,
        None,
        "kiln",
    );
    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(options.region.clone()))
        .credentials_provider(credentials)
        .build();
    let client = aws_sdk_s3::Client::from_conf(config);

    let key = if options.key.is_empty() { Uuid::new_v4().to_string() } else { options.key.clone() };
    let body = ByteStream::from_path(path).await.map_err(|e| UploadError::Aws(e.to_string()))?;

    client
        .put_object()
        .bucket(&options.bucket)
        .key(&key)
        .tagging(format!("Name={image_name}"))
        .body(body)
        .send()
        .await
        .map_err(|e| UploadError::Aws(e.to_string()))?;

    info!(bucket = %options.bucket, %key, "image uploaded to S3");
    Ok(key)
}
