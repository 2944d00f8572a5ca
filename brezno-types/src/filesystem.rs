// SPDX-License-Identifier: GPL-3.0-only

//! Filesystems that can live inside a container
//!
//! Only filesystems that can be grown while mounted are supported, since resizing a container
//! happens online.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilesystemType {
    #[default]
    Ext4,
    Xfs,
    Btrfs,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported filesystem: {0} (use ext4, xfs, or btrfs)")]
pub struct UnsupportedFilesystem(pub String);

impl FilesystemType {
    pub const ALL: [FilesystemType; 3] = [
        FilesystemType::Ext4,
        FilesystemType::Xfs,
        FilesystemType::Btrfs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilesystemType::Ext4 => "ext4",
            FilesystemType::Xfs => "xfs",
            FilesystemType::Btrfs => "btrfs",
        }
    }

    /// Program that creates this filesystem
    pub fn mkfs_tool(self) -> &'static str {
        match self {
            FilesystemType::Ext4 => "mkfs.ext4",
            FilesystemType::Xfs => "mkfs.xfs",
            FilesystemType::Btrfs => "mkfs.btrfs",
        }
    }

    /// Arguments for the mkfs tool, labelling the filesystem `encrypted`
    pub fn mkfs_args(self, device: &str) -> Vec<String> {
        let mut args = Vec::new();
        if self == FilesystemType::Ext4 {
            args.push("-q".to_string());
        }
        args.push("-L".to_string());
        args.push("encrypted".to_string());
        args.push(device.to_string());
        args
    }

    /// Program that grows this filesystem online
    pub fn grow_tool(self) -> &'static str {
        match self {
            FilesystemType::Ext4 => "resize2fs",
            FilesystemType::Xfs => "xfs_growfs",
            FilesystemType::Btrfs => "btrfs",
        }
    }

    /// Package that ships [`Self::grow_tool`], for install hints
    pub fn grow_package(self) -> &'static str {
        match self {
            FilesystemType::Ext4 => "e2fsprogs",
            FilesystemType::Xfs => "xfsprogs",
            FilesystemType::Btrfs => "btrfs-progs",
        }
    }

    /// Arguments for growing to fill the device.
    ///
    /// ext4 is grown through the block device, xfs and btrfs through the mount point.
    pub fn grow_args(self, mapper_device: &str, mount_point: &str) -> Vec<String> {
        match self {
            FilesystemType::Ext4 => vec![mapper_device.to_string()],
            FilesystemType::Xfs => vec![mount_point.to_string()],
            FilesystemType::Btrfs => vec![
                "filesystem".to_string(),
                "resize".to_string(),
                "max".to_string(),
                mount_point.to_string(),
            ],
        }
    }

    /// Shell form of the growth command, used in remediation messages
    pub fn grow_command_line(self, mapper_device: &str, mount_point: &str) -> String {
        let mut parts = vec![self.grow_tool().to_string()];
        parts.extend(self.grow_args(mapper_device, mount_point));
        parts.join(" ")
    }
}

impl fmt::Display for FilesystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilesystemType {
    type Err = UnsupportedFilesystem;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ext4" => Ok(FilesystemType::Ext4),
            "xfs" => Ok(FilesystemType::Xfs),
            "btrfs" => Ok(FilesystemType::Btrfs),
            _ => Err(UnsupportedFilesystem(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_filesystems() {
        assert_eq!("ext4".parse::<FilesystemType>(), Ok(FilesystemType::Ext4));
        assert_eq!("XFS".parse::<FilesystemType>(), Ok(FilesystemType::Xfs));
        assert!("vfat".parse::<FilesystemType>().is_err());
    }

    #[test]
    fn growth_targets_device_or_mount_point() {
        assert_eq!(
            FilesystemType::Ext4.grow_command_line("/dev/mapper/x", "/mnt/x"),
            "resize2fs /dev/mapper/x"
        );
        assert_eq!(
            FilesystemType::Xfs.grow_command_line("/dev/mapper/x", "/mnt/x"),
            "xfs_growfs /mnt/x"
        );
        assert_eq!(
            FilesystemType::Btrfs.grow_command_line("/dev/mapper/x", "/mnt/x"),
            "btrfs filesystem resize max /mnt/x"
        );
    }

    #[test]
    fn only_ext4_mkfs_is_quiet() {
        assert_eq!(
            FilesystemType::Ext4.mkfs_args("/dev/mapper/x"),
            vec!["-q", "-L", "encrypted", "/dev/mapper/x"]
        );
        assert_eq!(
            FilesystemType::Xfs.mkfs_args("/dev/mapper/x"),
            vec!["-L", "encrypted", "/dev/mapper/x"]
        );
    }
}
