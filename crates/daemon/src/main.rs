// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! kilnd: compose orchestration daemon.

use anyhow::Context;
use clap::Parser;
use fs2::FileExt;
use kiln_core::SystemClock;
use kiln_daemon::api::{self, AppState};
use kiln_daemon::catalog::{HostCatalog, SubprocessDepsolver};
use kiln_daemon::{config, serve, ArtifactStore, Config, Dispatcher};
use kiln_queue::FsJobQueue;
use kiln_store::Store;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "kilnd", about = "Compose orchestration daemon")]
struct Args {
    /// Print access and queue activity logs
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "kilnd=debug,kiln_daemon=debug,kiln_queue=debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.state_dir)
        .with_context(|| format!("cannot create state directory {:?}", config.state_dir))?;
    std::fs::create_dir_all(&config.cache_dir)
        .with_context(|| format!("cannot create cache directory {:?}", config.cache_dir))?;

    // A second daemon on the same state directory would corrupt the
    // single-writer store; take the lock before opening anything.
    let _lock = acquire_lock(&config.lock_path()).context("another kilnd is already running")?;

    let store = Arc::new(
        Store::open(config.store_path(), SystemClock).context("cannot open store")?,
    );
    let queue = Arc::new(
        FsJobQueue::open(config.jobs_dir(), SystemClock).context("cannot open job queue")?,
    );
    let artifacts =
        Arc::new(ArtifactStore::new(config.artifacts_dir()).context("cannot open artifact store")?);

    let repos = config.load_repositories(Path::new(config::REPOSITORIES_PATH))?;
    info!(repos = repos.len(), "loaded host repositories");
    let catalog = Arc::new(HostCatalog::new(repos));
    let depsolver = Arc::new(SubprocessDepsolver::new(config::DEPSOLVER_HELPER));

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&artifacts),
        catalog,
        depsolver,
    ));
    let state = Arc::new(AppState { queue, store, artifacts, dispatcher });
    let app = api::router(state);

    // Remote workers connect over mTLS; local workers and clients use the
    // unix socket, trusted via filesystem permissions.
    if let Some(addr) = &config.remote_worker_listen {
        let tls = serve::load_server_tls(
            Path::new(config::CA_CERT_PATH),
            Path::new(config::SERVER_CERT_PATH),
            Path::new(config::SERVER_KEY_PATH),
        )
        .context("cannot load TLS material for the remote worker listener")?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("cannot bind remote worker listener on {addr}"))?;
        let app = app.clone();
        tokio::spawn(async move {
            if let Err(e) = serve::serve_mtls(listener, tls, app).await {
                tracing::error!(error = %e, "remote worker listener failed");
            }
        });
    }

    let socket_path = config.socket_path();
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }
    let listener = tokio::net::UnixListener::bind(&socket_path)
        .with_context(|| format!("cannot bind {socket_path:?}"))?;
    info!(socket = %socket_path.display(), "kilnd ready");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// Take the exclusive daemon lock and record our PID in it.
fn acquire_lock(path: &Path) -> anyhow::Result<std::fs::File> {
    // Avoid truncating before the lock is held; the file may belong to a
    // running daemon.
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.try_lock_exclusive()?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}
