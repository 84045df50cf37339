// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kiln_core::FakeClock;
use serde_json::json;

#[test]
fn kind_names_roundtrip() {
    for kind in JobKind::ALL {
        assert_eq!(JobKind::from_name(kind.name()).unwrap(), kind);
    }
}

#[test]
fn unknown_kind_is_rejected() {
    let err = JobKind::from_name("mkisofs").unwrap_err();
    assert!(matches!(err, QueueError::UnknownJobType(name) if name == "mkisofs"));
}

#[test]
fn kind_serializes_as_wire_name() {
    assert_eq!(serde_json::to_string(&JobKind::Osbuild).unwrap(), "\"osbuild\"");
    assert_eq!(serde_json::to_string(&JobKind::KojiFinalize).unwrap(), "\"koji-finalize\"");
}

#[test]
fn args_codec_roundtrips() {
    let args = OsbuildJob { manifest: Manifest::new(json!({"pipeline": {}})), targets: vec![] };
    let raw = encode_args(&args).unwrap();
    let back: OsbuildJob = decode_args(&raw).unwrap();
    assert_eq!(back.manifest, args.manifest);
    assert!(back.targets.is_empty());
}

#[test]
fn decode_rejects_mismatched_shape() {
    let raw = encode_args(&json!({"manifest": 7})).unwrap();
    assert!(matches!(decode_args::<OsbuildJob>(&raw), Err(QueueError::Codec(_))));
}

#[test]
fn new_job_is_neither_running_nor_terminal() {
    let clock = FakeClock::new();
    let job = Job::new(JobKind::Osbuild, &json!({}), vec![], &clock).unwrap();

    assert_eq!(job.queued_at, clock.now());
    assert!(job.started_at.is_none());
    assert!(job.finished_at.is_none());
    assert!(!job.is_running());
    assert!(!job.is_terminal());
}

#[test]
fn lifecycle_predicates() {
    let clock = FakeClock::new();
    let mut job = Job::new(JobKind::Osbuild, &json!({}), vec![], &clock).unwrap();

    job.started_at = Some(clock.now());
    assert!(job.is_running());
    assert!(!job.is_terminal());

    job.finished_at = Some(clock.now());
    assert!(!job.is_running());
    assert!(job.is_terminal());

    let mut canceled = Job::new(JobKind::Osbuild, &json!({}), vec![], &clock).unwrap();
    canceled.canceled = true;
    assert!(canceled.is_terminal());
}

#[test]
fn job_record_roundtrips_with_type_tag() {
    let clock = FakeClock::new();
    let job = Job::new(
        JobKind::KojiInit,
        &KojiInitJob {
            server: "https://koji.example.com".to_string(),
            name: "base".to_string(),
            version: "1".to_string(),
            release: "2".to_string(),
        },
        vec![],
        &clock,
    )
    .unwrap();

    let json = serde_json::to_value(&job).unwrap();
    assert_eq!(json["type"], "koji-init");

    let back: Job = serde_json::from_value(json).unwrap();
    assert_eq!(back.id, job.id);
    assert_eq!(back.kind, JobKind::KojiInit);
    let args: KojiInitJob = decode_args(&back.args).unwrap();
    assert_eq!(args.name, "base");
}
