// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn spec(name: &str) -> PackageSpec {
    PackageSpec {
        name: name.to_string(),
        version: "1.0".to_string(),
        release: "1".to_string(),
        arch: "x86_64".to_string(),
        remote_location: Some(format!("https://example.com/{name}.rpm")),
        ..Default::default()
    }
}

#[test]
fn manifest_embeds_packages_and_assembler() {
    let catalog = HostCatalog::new(vec![]);
    let blueprint = Blueprint { name: "base".to_string(), ..Default::default() };

    let manifest = catalog
        .manifest(&blueprint, ImageType::Qcow2, &[], &[spec("httpd")], &[spec("rpm")])
        .unwrap();

    let json = manifest.0;
    assert_eq!(json["pipeline"]["assembler"]["name"], "org.kiln.qemu");
    assert_eq!(json["pipeline"]["assembler"]["options"]["format"], "qcow2");
    assert_eq!(json["pipeline"]["stages"][0]["options"]["packages"][0]["name"], "httpd");
    assert_eq!(
        json["pipeline"]["build"]["pipeline"]["stages"][0]["options"]["packages"][0]["name"],
        "rpm"
    );
    assert_eq!(json["sources"]["org.kiln.files"]["urls"][0], "https://example.com/httpd.rpm");
}

#[test]
fn kernel_append_flows_into_the_manifest() {
    let catalog = HostCatalog::new(vec![]);
    let blueprint = Blueprint {
        name: "base".to_string(),
        customizations: Some(kiln_core::Customizations {
            kernel: Some(kiln_core::blueprint::KernelCustomization {
                append: "console=ttyS0".to_string(),
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    let manifest =
        catalog.manifest(&blueprint, ImageType::Qcow2, &[], &[], &[]).unwrap();
    assert_eq!(manifest.0["pipeline"]["stages"][1]["options"]["kernel_opts"], "console=ttyS0");
}

#[test]
fn each_image_type_has_an_assembler_or_is_rejected() {
    let catalog = HostCatalog::new(vec![]);
    let blueprint = Blueprint::default();

    for image_type in ImageType::ALL {
        let result = catalog.manifest(&blueprint, image_type, &[], &[], &[]);
        if image_type == ImageType::Liveiso {
            assert!(matches!(result, Err(CatalogError::UnsupportedImageType(_))));
        } else {
            assert!(result.is_ok(), "no assembler for {image_type}");
        }
    }
}

#[test]
fn build_packages_include_format_tools() {
    let catalog = HostCatalog::new(vec![]);
    assert!(catalog.build_packages(ImageType::Qcow2).contains(&"qemu-img".to_string()));
    assert!(catalog.build_packages(ImageType::Tar).contains(&"tar".to_string()));
}
