// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output image types and their on-disk metadata.

use serde::{Deserialize, Serialize};

/// The closed set of image formats a compose can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageType {
    Qcow2,
    Vhd,
    Ami,
    Openstack,
    Vmdk,
    Tar,
    Liveiso,
    Ext4Filesystem,
    PartitionedDisk,
    /// Only used by tests; never produced by a real catalog
    #[serde(rename = "test_type")]
    TestType,
}

impl ImageType {
    /// All known image types, in a stable order.
    pub const ALL: [ImageType; 10] = [
        ImageType::Qcow2,
        ImageType::Vhd,
        ImageType::Ami,
        ImageType::Openstack,
        ImageType::Vmdk,
        ImageType::Tar,
        ImageType::Liveiso,
        ImageType::Ext4Filesystem,
        ImageType::PartitionedDisk,
        ImageType::TestType,
    ];

    /// Parse the client-facing name (`qcow2`, `vhd`, `ami`, …).
    pub fn from_name(name: &str) -> Option<ImageType> {
        match name {
            "qcow2" => Some(ImageType::Qcow2),
            "vhd" => Some(ImageType::Vhd),
            "ami" => Some(ImageType::Ami),
            "openstack" => Some(ImageType::Openstack),
            "vmdk" => Some(ImageType::Vmdk),
            "tar" => Some(ImageType::Tar),
            "liveiso" => Some(ImageType::Liveiso),
            "ext4-filesystem" => Some(ImageType::Ext4Filesystem),
            "partitioned-disk" => Some(ImageType::PartitionedDisk),
            "test_type" => Some(ImageType::TestType),
            _ => None,
        }
    }

    /// The client-facing name.
    pub fn name(&self) -> &'static str {
        match self {
            ImageType::Qcow2 => "qcow2",
            ImageType::Vhd => "vhd",
            ImageType::Ami => "ami",
            ImageType::Openstack => "openstack",
            ImageType::Vmdk => "vmdk",
            ImageType::Tar => "tar",
            ImageType::Liveiso => "liveiso",
            ImageType::Ext4Filesystem => "ext4-filesystem",
            ImageType::PartitionedDisk => "partitioned-disk",
            ImageType::TestType => "test_type",
        }
    }

    /// Compatibility string used in the serialized store document.
    ///
    /// The mapping is fixed; store documents written by older releases use
    /// these exact values, so it must never change.
    pub fn compat_string(&self) -> &'static str {
        match self {
            ImageType::Qcow2 => "qcow2",
            ImageType::Vhd => "Azure",
            ImageType::Ami => "AWS",
            ImageType::Openstack => "OpenStack",
            ImageType::Vmdk => "VMWare",
            ImageType::Tar => "Tar",
            ImageType::Liveiso => "LiveISO",
            ImageType::Ext4Filesystem => "Raw-filesystem",
            ImageType::PartitionedDisk => "Partitioned-disk",
            ImageType::TestType => "test_type",
        }
    }

    /// Parse the compatibility string back. Returns `None` for unknown
    /// values; callers drop the surrounding compose in that case.
    pub fn from_compat_string(input: &str) -> Option<ImageType> {
        ImageType::ALL.iter().copied().find(|t| t.compat_string() == input)
    }

    /// Filename of the primary artifact this image type produces.
    pub fn filename(&self) -> &'static str {
        match self {
            ImageType::Qcow2 | ImageType::Openstack => "disk.qcow2",
            ImageType::Vhd => "disk.vhd",
            ImageType::Ami => "image.ami",
            ImageType::Vmdk => "disk.vmdk",
            ImageType::Tar => "root.tar.xz",
            ImageType::Liveiso => "live.iso",
            ImageType::Ext4Filesystem => "filesystem.img",
            ImageType::PartitionedDisk => "disk.img",
            ImageType::TestType => "test.img",
        }
    }

    /// MIME type of the primary artifact.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageType::Qcow2 | ImageType::Openstack => "application/x-qemu-disk",
            ImageType::Vhd => "application/x-vhd",
            ImageType::Vmdk => "application/x-vmdk",
            ImageType::Tar => "application/x-tar",
            ImageType::Liveiso => "application/x-iso9660-image",
            ImageType::Ami
            | ImageType::Ext4Filesystem
            | ImageType::PartitionedDisk
            | ImageType::TestType => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for ImageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
