// SPDX-License-Identifier: GPL-3.0-only

//! Parsers for the textual output of the system tools

use std::collections::HashMap;

use serde::Deserialize;

use brezno_types::MAPPER_DIR;

use crate::error::{Result, SysError};

/// Block-device major number of loop devices
pub const LOOP_MAJOR: &str = "7";

/// One row of the live mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRow {
    pub device: String,
    pub mount_point: String,
    pub filesystem: String,
}

/// Mapper names from `dmsetup ls --target crypt`.
///
/// Rows look like `name\t(253:0)` or `name (253, 0)`; `No devices found` yields nothing.
pub fn parse_dmsetup_ls(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("No devices found"))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Backing device field of a `dmsetup table` crypt row.
///
/// Format: `start length crypt cipher key iv_offset device offset [options]`; the device is the
/// 7th field.
pub fn parse_dmsetup_table(output: &str) -> Result<String> {
    let fields: Vec<&str> = output.split_whitespace().collect();
    fields
        .get(6)
        .map(|field| field.to_string())
        .ok_or_else(|| {
            SysError::parse(
                "dmsetup table",
                format!("expected 7 fields in '{}'", output.trim()),
            )
        })
}

/// Translate a `major:minor` pair to a loop device path.
///
/// Only major 7 is a loop device; anything else is returned unchanged.
pub fn device_to_loop(device: &str) -> String {
    match device.split_once(':') {
        Some((major, minor))
            if major == LOOP_MAJOR
                && !minor.is_empty()
                && minor.chars().all(|c| c.is_ascii_digit()) =>
        {
            format!("/dev/loop{minor}")
        }
        _ => device.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct LosetupDevice {
    name: String,
    #[serde(rename = "back-file")]
    back_file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LosetupOutput {
    #[serde(default)]
    loopdevices: Vec<LosetupDevice>,
}

/// Loop device → backing file from `losetup -l -J`.
///
/// An empty output (no loop devices configured) is an empty map.
pub fn parse_losetup_json(output: &str) -> Result<HashMap<String, String>> {
    if output.trim().is_empty() {
        return Ok(HashMap::new());
    }

    let parsed: LosetupOutput = serde_json::from_str(output)
        .map_err(|e| SysError::parse("losetup output", e.to_string()))?;

    Ok(parsed
        .loopdevices
        .into_iter()
        .filter_map(|device| {
            let back_file = device.back_file?.trim().to_string();
            if back_file.is_empty() {
                None
            } else {
                Some((device.name, back_file))
            }
        })
        .collect())
}

/// Loop device from `losetup -j <file>` (`/dev/loop0: []: (/path/to/file)`).
pub fn parse_losetup_find(output: &str) -> Option<String> {
    let line = output.lines().next()?.trim();
    let (device, _) = line.split_once(':')?;
    if device.is_empty() {
        None
    } else {
        Some(device.to_string())
    }
}

/// Total and used bytes from `df --block-size=1 <mount point>`.
pub fn parse_df(output: &str) -> Result<(u64, u64)> {
    let data = output
        .lines()
        .nth(1)
        .ok_or_else(|| SysError::parse("df output", "missing data row"))?;

    let fields: Vec<&str> = data.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(SysError::parse("df output", format!("short row '{data}'")));
    }

    let size = fields[1]
        .parse()
        .map_err(|_| SysError::parse("df output", format!("invalid size '{}'", fields[1])))?;
    let used = fields[2]
        .parse()
        .map_err(|_| SysError::parse("df output", format!("invalid used '{}'", fields[2])))?;
    Ok((size, used))
}

/// Mount table rows whose device is an opened mapper.
pub fn parse_mapper_mounts(table: &str) -> Vec<MountRow> {
    let prefix = format!("{MAPPER_DIR}/");
    table
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let filesystem = fields.next()?;
            if !device.starts_with(&prefix) {
                return None;
            }
            Some(MountRow {
                device: unescape_mount_field(device),
                mount_point: unescape_mount_field(mount_point),
                filesystem: filesystem.to_string(),
            })
        })
        .collect()
}

/// Decode the octal escapes (`\040` for space, ...) the kernel uses in the mount table.
fn unescape_mount_field(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1..index + 4].iter().all(u8::is_ascii_digit)
        {
            if let Ok(num) = u8::from_str_radix(&value[index + 1..index + 4], 8) {
                output.push(num);
                index += 4;
                continue;
            }
        }

        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}
