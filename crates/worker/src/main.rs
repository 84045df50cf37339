// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! kiln-worker: pull jobs, build images, report back.

use clap::Parser;
use kiln_core::QueueStatus;
use kiln_worker::client::Client;
use kiln_worker::engine::BuildEngine;
use kiln_worker::jobs::{
    self, BuildJobEnvelope, KojiFinalizeEnvelope, KojiInitEnvelope, WorkerError,
};
use kiln_worker::watch;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

const CA_CERT_PATH: &str = "/etc/kiln/ca-crt.pem";
const WORKER_CERT_PATH: &str = "/etc/kiln/worker-crt.pem";
const WORKER_KEY_PATH: &str = "/etc/kiln/worker-key.pem";

#[derive(Parser)]
#[command(name = "kiln-worker", about = "Image build worker")]
struct Args {
    /// Interpret ADDRESS as a path to a unix domain socket instead of a
    /// network address
    #[arg(long)]
    unix: bool,

    /// Job types to request, in preference order
    #[arg(long = "job-type", default_values_t = vec!["osbuild".to_string()])]
    job_types: Vec<String>,

    /// Build engine binary
    #[arg(long, default_value = "osbuild")]
    engine: String,

    /// Composer address (host:port, or a socket path with --unix)
    address: String,
}

/// Exit cleanly on fatal errors: the supervisor restarts the worker, and
/// a non-zero status would only flip the unit into a failed state.
fn fatal(message: impl std::fmt::Display) -> ! {
    error!("{message}");
    std::process::exit(0);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let Some(cache_dir) = std::env::var_os("CACHE_DIRECTORY").map(PathBuf::from) else {
        fatal("CACHE_DIRECTORY is not set; is the service unit missing CacheDirectory=?");
    };
    let scratch_root = Path::new("/var/tmp");

    let client = if args.unix {
        Client::new_unix(&args.address)
    } else {
        match Client::new_tls(
            &args.address,
            Path::new(CA_CERT_PATH),
            Path::new(WORKER_CERT_PATH),
            Path::new(WORKER_KEY_PATH),
        ) {
            Ok(client) => client,
            Err(e) => fatal(format!("cannot set up TLS client: {e}")),
        }
    };
    let client = Arc::new(client);
    let engine = BuildEngine::new(&args.engine, cache_dir.join("engine-store"));
    let job_types: Vec<&str> = args.job_types.iter().map(String::as_str).collect();

    loop {
        info!("waiting for a job");
        let envelope = request_job_with_backoff(&client, &job_types).await;

        let Some(job_id) = envelope["id"].as_str().and_then(|s| s.parse::<Uuid>().ok()) else {
            fatal(format!("job envelope has no usable id: {envelope}"));
        };
        let kind = envelope["type"].as_str().unwrap_or("osbuild").to_string();
        info!(job = %job_id, %kind, "running job");

        let done = CancellationToken::new();
        let watcher = watch::spawn_watcher(Arc::clone(&client), job_id, done.clone());

        let (status, result) = handle_job(&client, &engine, &kind, envelope, scratch_root).await;
        done.cancel();
        let _ = watcher.await;

        info!(job = %job_id, status = %status, "job done");
        if let Err(e) = client.update_job(job_id, status, &result).await {
            fatal(format!("cannot report job result: {e}"));
        }
    }
}

async fn handle_job(
    client: &Client,
    engine: &BuildEngine,
    kind: &str,
    envelope: Value,
    scratch_root: &Path,
) -> (QueueStatus, Value) {
    let outcome: Result<(QueueStatus, Value), WorkerError> = async {
        match kind {
            "osbuild" => {
                let job: BuildJobEnvelope = serde_json::from_value(envelope)?;
                let result = jobs::run_build_job(client, engine, &job, scratch_root).await?;
                let status =
                    if result.success { QueueStatus::Finished } else { QueueStatus::Failed };
                Ok((status, json!({ "build_output": result })))
            }
            "koji-init" => {
                let job: KojiInitEnvelope = serde_json::from_value(envelope)?;
                let result = jobs::run_koji_init(&job).await?;
                Ok((QueueStatus::Finished, result))
            }
            "koji-finalize" => {
                let job: KojiFinalizeEnvelope = serde_json::from_value(envelope)?;
                let result = jobs::run_koji_finalize(&job).await?;
                let status = if result["success"].as_bool().unwrap_or(false) {
                    QueueStatus::Finished
                } else {
                    QueueStatus::Failed
                };
                Ok((status, result))
            }
            other => Err(WorkerError::Registration(format!("unexpected job type: {other}"))),
        }
    }
    .await;

    match outcome {
        Ok(done) => done,
        Err(e) => {
            // Composer relies on the result payload for error reporting;
            // always hand back something well-formed.
            warn!(error = %e, "job failed");
            (
                QueueStatus::Failed,
                json!({ "build_output": { "success": false }, "error": e.to_string() }),
            )
        }
    }
}

async fn request_job_with_backoff(client: &Client, job_types: &[&str]) -> Value {
    let mut delay = Duration::from_secs(1);
    loop {
        match client.request_job(job_types).await {
            Ok(envelope) => return envelope,
            Err(e) if e.is_fatal() => fatal(format!("composer rejected job request: {e}")),
            Err(e) => {
                warn!(error = %e, "cannot reach composer, retrying");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(60));
            }
        }
    }
}
