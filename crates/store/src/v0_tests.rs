// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kiln_core::{Clock, FakeClock};
use proptest::prelude::*;

fn compose(status: QueueStatus, image_type: ImageType) -> Compose {
    let clock = FakeClock::new();
    Compose {
        blueprint: Blueprint { name: "base".to_string(), ..Default::default() },
        image_build: ImageBuild {
            image_type,
            manifest: Manifest::new(serde_json::json!({"pipeline": {}})),
            targets: vec![],
            job_id: Some(Uuid::new_v4()),
            size: 100,
            job_created: clock.now(),
            job_started: None,
            job_finished: None,
            queue_status: status,
        },
    }
}

fn roundtrip(data: &StoreData) -> StoreData {
    let bytes = serde_json::to_vec(&to_document(data)).unwrap();
    from_document(serde_json::from_slice(&bytes).unwrap()).unwrap()
}

#[test]
fn empty_store_roundtrips() {
    let data = StoreData::default();
    let back = roundtrip(&data);
    assert!(back.blueprints.is_empty());
    assert!(back.composes.is_empty());
}

#[test]
fn document_carries_version_tag() {
    let doc = to_document(&StoreData::default());
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["v"], 0);
}

#[test]
fn future_version_is_rejected() {
    let doc = StoreV0 { version: 1, ..Default::default() };
    assert!(matches!(from_document(doc), Err(StoreError::UnsupportedVersion(1))));
}

#[test]
fn image_type_is_serialized_as_compat_string() {
    let mut data = StoreData::default();
    let id = Uuid::new_v4();
    data.composes.insert(id, compose(QueueStatus::Finished, ImageType::Vhd));

    let doc = to_document(&data);
    assert_eq!(doc.composes[&id].image_builds[0].image_type, "Azure");

    let back = roundtrip(&data);
    assert_eq!(back.composes[&id].image_build.image_type, ImageType::Vhd);
}

#[test]
fn terminal_composes_survive_the_recovery_pass() {
    let mut data = StoreData::default();
    let finished = Uuid::new_v4();
    let failed = Uuid::new_v4();
    data.composes.insert(finished, compose(QueueStatus::Finished, ImageType::Qcow2));
    data.composes.insert(failed, compose(QueueStatus::Failed, ImageType::Qcow2));

    let back = roundtrip(&data);
    assert_eq!(back.composes[&finished].image_build.queue_status, QueueStatus::Finished);
    assert_eq!(back.composes[&failed].image_build.queue_status, QueueStatus::Failed);
}

#[test]
fn waiting_and_running_composes_are_failed_on_load() {
    let mut data = StoreData::default();
    let waiting = Uuid::new_v4();
    let running = Uuid::new_v4();
    data.composes.insert(waiting, compose(QueueStatus::Waiting, ImageType::Qcow2));
    data.composes.insert(running, compose(QueueStatus::Running, ImageType::Ami));

    let back = roundtrip(&data);
    assert_eq!(back.composes[&waiting].image_build.queue_status, QueueStatus::Failed);
    assert_eq!(back.composes[&running].image_build.queue_status, QueueStatus::Failed);
}

#[test]
fn recovery_fails_the_pending_targets_of_interrupted_composes() {
    use kiln_core::{KojiTargetOptions, Target, TargetOptions};

    let clock = FakeClock::new();
    let mut interrupted = compose(QueueStatus::Running, ImageType::Qcow2);
    interrupted.image_build.targets.push(Target::new(
        "img",
        TargetOptions::Koji(KojiTargetOptions::default()),
        &clock,
    ));

    let mut data = StoreData::default();
    let id = Uuid::new_v4();
    data.composes.insert(id, interrupted);

    let back = roundtrip(&data);
    let ib = &back.composes[&id].image_build;
    assert_eq!(ib.queue_status, QueueStatus::Failed);
    assert_eq!(ib.targets[0].status, QueueStatus::Failed);
}

#[test]
fn unknown_image_type_drops_the_compose_on_load() {
    let mut data = StoreData::default();
    let good = Uuid::new_v4();
    data.composes.insert(good, compose(QueueStatus::Finished, ImageType::Qcow2));

    let mut doc = to_document(&data);
    let bad = Uuid::new_v4();
    doc.composes.insert(
        bad,
        ComposeV0 {
            blueprint: Blueprint::default(),
            image_builds: vec![ImageBuildV0 {
                image_type: "Floppy".to_string(),
                manifest: Manifest::default(),
                targets: vec![],
                job_created: FakeClock::new().now(),
                job_started: None,
                job_finished: None,
                size: 0,
                job_id: None,
                queue_status: QueueStatus::Finished,
            }],
        },
    );

    // The load succeeds; only the unknown compose is dropped
    let back = from_document(doc).unwrap();
    assert!(back.composes.contains_key(&good));
    assert!(!back.composes.contains_key(&bad));
}

// ── Commit reconstruction ────────────────────────────────────────────────────

fn change(commit: &str, timestamp: &str, version: &str) -> Change {
    Change {
        commit: commit.to_string(),
        message: String::new(),
        revision: None,
        timestamp: timestamp.to_string(),
        version: Some(version.to_string()),
    }
}

#[test]
fn out_of_sync_commits_are_rebuilt_by_timestamp() {
    let mut data = StoreData::default();
    let changes = data.changes.entry("base".to_string()).or_default();
    changes.insert("ccc".to_string(), change("ccc", "2026-01-03T00:00:00Z", "0.0.3"));
    changes.insert("aaa".to_string(), change("aaa", "2026-01-01T00:00:00Z", "0.0.1"));
    changes.insert("bbb".to_string(), change("bbb", "2026-01-02T00:00:00Z", "0.0.2"));

    let back = roundtrip(&data);
    assert_eq!(back.commits["base"], vec!["aaa", "bbb", "ccc"]);
}

#[test]
fn same_second_commits_are_ordered_by_version() {
    let mut data = StoreData::default();
    let changes = data.changes.entry("base".to_string()).or_default();
    changes.insert("new".to_string(), change("new", "2026-01-01T00:00:00Z", "0.0.10"));
    changes.insert("old".to_string(), change("old", "2026-01-01T00:00:00Z", "0.0.9"));

    let back = roundtrip(&data);
    assert_eq!(back.commits["base"], vec!["old", "new"]);
}

#[test]
fn in_sync_commit_lists_are_left_alone() {
    let mut data = StoreData::default();
    let changes = data.changes.entry("base".to_string()).or_default();
    changes.insert("aaa".to_string(), change("aaa", "2026-01-01T00:00:00Z", "0.0.1"));
    changes.insert("bbb".to_string(), change("bbb", "2026-01-02T00:00:00Z", "0.0.2"));
    // Deliberately "wrong" order, but lengths match, so it is trusted
    data.commits.insert("base".to_string(), vec!["bbb".to_string(), "aaa".to_string()]);

    let back = roundtrip(&data);
    assert_eq!(back.commits["base"], vec!["bbb", "aaa"]);
}

#[test]
fn unparseable_versions_sort_as_zero() {
    let mut data = StoreData::default();
    let changes = data.changes.entry("base".to_string()).or_default();
    changes.insert("junk".to_string(), change("junk", "2026-01-01T00:00:00Z", "not-semver"));
    changes.insert("real".to_string(), change("real", "2026-01-01T00:00:00Z", "0.0.1"));

    let back = roundtrip(&data);
    assert_eq!(back.commits["base"], vec!["junk", "real"]);
}

// ── Round-trip property ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn blueprints_roundtrip(
        name in "[a-z][a-z0-9-]{0,15}",
        description in ".{0,40}",
        version in "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}",
        packages in proptest::collection::vec("[a-z][a-z0-9-]{0,15}", 0..8),
    ) {
        let mut data = StoreData::default();
        let bp = Blueprint {
            name: name.clone(),
            description,
            version,
            packages: packages
                .into_iter()
                .map(|name| kiln_core::blueprint::Package { name, version: None })
                .collect(),
            ..Default::default()
        };
        data.blueprints.insert(name.clone(), bp.clone());
        data.workspace.insert(name.clone(), bp.clone());

        let back = roundtrip(&data);
        prop_assert_eq!(&back.blueprints[&name], &bp);
        prop_assert_eq!(&back.workspace[&name], &bp);
    }
}
