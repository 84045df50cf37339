// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation watcher.

use crate::client::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// How often a running worker polls its job's cancellation flag.
pub const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Poll the composer for cancellation while a job runs.
///
/// On observing the flag the worker exits instead of killing the build:
/// the external build engine accepts no cancel signal, so process exit
/// plus the supervisor's cgroup cleanup is what tears the child down. A
/// status-fetch error gets the same treatment; without the composer there
/// is nobody to report a result to.
pub fn spawn_watcher(client: Arc<Client>, job: Uuid, done: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    match client.job_canceled(job).await {
                        Ok(false) => {}
                        Ok(true) => {
                            info!(%job, "job was canceled, exiting");
                            std::process::exit(0);
                        }
                        Err(e) => {
                            error!(%job, error = %e, "cannot fetch job status, exiting");
                            std::process::exit(0);
                        }
                    }
                }
                _ = done.cancelled() => return,
            }
        }
    })
}
