// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: the worker job API and the compose control API.
//!
//! Every request corresponds to exactly one queue or store operation. The
//! protocol carries no worker identity; the unix socket is trusted via
//! filesystem permissions and the TCP listener via client certificates.

pub mod composes;
pub mod jobs;

use crate::artifacts::ArtifactStore;
use crate::dispatch::Dispatcher;
use axum::routing::{get, post};
use axum::Router;
use kiln_queue::FsJobQueue;
use kiln_store::Store;
use std::sync::Arc;

/// Shared daemon context for all request handlers.
pub struct AppState {
    pub queue: Arc<FsJobQueue>,
    pub store: Arc<Store>,
    pub artifacts: Arc<ArtifactStore>,
    pub dispatcher: Arc<Dispatcher>,
}

/// Build the daemon router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/job-queue/v1/jobs", post(jobs::add_job))
        .route("/job-queue/v1/jobs/{id}", get(jobs::get_job).patch(jobs::update_job))
        .route("/job-queue/v1/jobs/{id}/artifacts/{name}", post(jobs::upload_artifact))
        .route("/composes", post(composes::create_compose))
        .route(
            "/composes/{id}",
            get(composes::compose_status).delete(composes::delete_compose),
        )
        .route("/composes/{id}/cancel", post(composes::cancel_compose))
        .route("/composes/{id}/image", get(composes::download_image))
        .with_state(state)
}

#[cfg(test)]
pub(crate) fn test_state(dir: &std::path::Path) -> Arc<AppState> {
    use crate::catalog::{FakeCatalog, FakeDepsolver};
    use kiln_core::{Blueprint, Package, SystemClock};

    let store = Arc::new(Store::open(dir.join("state.json"), SystemClock).unwrap());
    store
        .push_blueprint(
            Blueprint {
                name: "base".to_string(),
                packages: vec![Package { name: "httpd".to_string(), version: None }],
                ..Default::default()
            },
            "initial",
        )
        .unwrap();

    let queue = Arc::new(FsJobQueue::open(dir.join("jobs"), SystemClock).unwrap());
    let artifacts = Arc::new(ArtifactStore::new(dir.join("artifacts")).unwrap());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&artifacts),
        Arc::new(FakeCatalog),
        Arc::new(FakeDepsolver),
    ));
    Arc::new(AppState { queue, store, artifacts, dispatcher })
}
