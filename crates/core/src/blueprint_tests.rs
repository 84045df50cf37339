// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn base_blueprint() -> Blueprint {
    Blueprint {
        name: "base".to_string(),
        description: "A base system".to_string(),
        version: "0.1.0".to_string(),
        packages: vec![Package { name: "httpd".to_string(), version: Some("2.4.*".to_string()) }],
        modules: vec![Package { name: "nodejs".to_string(), version: None }],
        ..Default::default()
    }
}

#[test]
fn package_names_includes_modules() {
    let bp = base_blueprint();
    assert_eq!(bp.package_names(), vec!["httpd".to_string(), "nodejs".to_string()]);
}

#[test]
fn bump_version_increments_patch() {
    let mut bp = base_blueprint();
    bp.bump_version();
    assert_eq!(bp.version, "0.1.1");
}

#[test]
fn bump_version_defaults_on_garbage() {
    let mut bp = base_blueprint();
    bp.version = "not-a-version".to_string();
    bp.bump_version();
    assert_eq!(bp.version, "0.0.1");

    let mut empty = Blueprint::default();
    empty.bump_version();
    assert_eq!(empty.version, "0.0.1");
}

#[test]
fn commit_id_is_stable_and_content_addressed() {
    let bp = base_blueprint();
    assert_eq!(bp.commit_id(), bp.commit_id());
    assert_eq!(bp.commit_id().len(), 64);

    let mut changed = bp.clone();
    changed.description = "different".to_string();
    assert_ne!(bp.commit_id(), changed.commit_id());
}

#[test]
fn blueprint_roundtrips_through_json() {
    let bp = Blueprint {
        customizations: Some(Customizations {
            hostname: Some("web".to_string()),
            kernel: Some(KernelCustomization { append: "quiet".to_string() }),
            ..Default::default()
        }),
        ..base_blueprint()
    };

    let json = serde_json::to_string(&bp).unwrap();
    let back: Blueprint = serde_json::from_str(&json).unwrap();
    assert_eq!(back, bp);
}

#[test]
fn deserializes_with_missing_optional_fields() {
    let bp: Blueprint = serde_json::from_str(r#"{"name": "minimal"}"#).unwrap();
    assert_eq!(bp.name, "minimal");
    assert!(bp.packages.is_empty());
    assert!(bp.customizations.is_none());
}

#[test]
fn source_config_renames_type_field() {
    let source = SourceConfig {
        name: "updates".to_string(),
        source_type: "yum-baseurl".to_string(),
        url: "https://example.com/repo".to_string(),
        check_gpg: true,
        check_ssl: true,
        system: false,
    };
    let json = serde_json::to_value(&source).unwrap();
    assert_eq!(json["type"], "yum-baseurl");
}
