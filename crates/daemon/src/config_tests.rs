// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn config(dir: &Path) -> Config {
    Config {
        state_dir: dir.to_path_buf(),
        cache_dir: dir.join("cache"),
        remote_worker_listen: None,
    }
}

#[test]
fn paths_hang_off_the_state_dir() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());

    assert_eq!(config.store_path(), dir.path().join("state.json"));
    assert_eq!(config.jobs_dir(), dir.path().join("jobs"));
    assert_eq!(config.artifacts_dir(), dir.path().join("artifacts"));
    assert_eq!(config.socket_path(), dir.path().join("api.sock"));
}

#[test]
fn missing_repositories_file_means_none() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let repos = config.load_repositories(&dir.path().join("repositories.json")).unwrap();
    assert!(repos.is_empty());
}

#[test]
fn repositories_file_is_parsed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("repositories.json");
    std::fs::write(
        &path,
        r#"[{"id": "fedora", "base_url": "https://example.com/fedora", "check_gpg": true}]"#,
    )
    .unwrap();

    let config = config(dir.path());
    let repos = config.load_repositories(&path).unwrap();
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].id, "fedora");
    assert!(repos[0].check_gpg);
}

#[test]
fn garbage_repositories_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("repositories.json");
    std::fs::write(&path, b"not json").unwrap();

    let config = config(dir.path());
    assert!(matches!(
        config.load_repositories(&path),
        Err(ConfigError::InvalidRepositories(_))
    ));
}
