// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn persist_writes_the_exact_bytes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let writer = StateWriter::new(&path);

    writer.persist(b"{\"v\":0}").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"{\"v\":0}");

    // Overwrites atomically; no temp file left behind
    writer.persist(b"{\"v\":0,\"x\":1}").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"{\"v\":0,\"x\":1}");
    assert!(!path.with_extension("tmp").exists());
}

#[tokio::test]
async fn subscribers_receive_persisted_documents() {
    let dir = tempdir().unwrap();
    let writer = StateWriter::new(dir.path().join("state.json"));

    let mut rx = writer.subscribe();
    writer.persist(b"doc-1").unwrap();

    let doc = rx.recv().await.unwrap();
    assert_eq!(doc.as_slice(), b"doc-1");
}

#[test]
fn persist_without_subscribers_is_fine() {
    let dir = tempdir().unwrap();
    let writer = StateWriter::new(dir.path().join("state.json"));
    writer.persist(b"doc").unwrap();
}
