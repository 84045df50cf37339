// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn serializes_as_uppercase_tokens() {
    assert_eq!(serde_json::to_string(&QueueStatus::Waiting).unwrap(), "\"WAITING\"");
    assert_eq!(serde_json::to_string(&QueueStatus::Running).unwrap(), "\"RUNNING\"");
    assert_eq!(serde_json::to_string(&QueueStatus::Finished).unwrap(), "\"FINISHED\"");
    assert_eq!(serde_json::to_string(&QueueStatus::Failed).unwrap(), "\"FAILED\"");
}

#[test]
fn roundtrips() {
    for status in [
        QueueStatus::Waiting,
        QueueStatus::Running,
        QueueStatus::Finished,
        QueueStatus::Failed,
    ] {
        let json = serde_json::to_string(&status).unwrap();
        let back: QueueStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}

#[test]
fn terminal_states() {
    assert!(!QueueStatus::Waiting.is_terminal());
    assert!(!QueueStatus::Running.is_terminal());
    assert!(QueueStatus::Finished.is_terminal());
    assert!(QueueStatus::Failed.is_terminal());
}
