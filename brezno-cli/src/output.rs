// SPDX-License-Identifier: GPL-3.0-only

//! Rendering of the container inventory

use anyhow::Result;

use brezno_types::{Container, bytes_to_pretty, usage_percent};

const TABLE_HEADERS: [&str; 5] = ["CONTAINER", "MAPPER", "MOUNT POINT", "SIZE", "USED"];

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

/// Column-aligned table, one row per container.
pub fn render_table(containers: &[Container]) -> String {
    let rows: Vec<[String; 5]> = containers
        .iter()
        .map(|container| {
            let (size, used) = if container.size > 0 {
                (
                    bytes_to_pretty(&container.size, false),
                    bytes_to_pretty(&container.used, false),
                )
            } else {
                ("-".to_string(), "-".to_string())
            };
            [
                or_dash(&container.path),
                container.mapper_name.clone(),
                or_dash(&container.mount_point),
                size,
                used,
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_row(TABLE_HEADERS.to_vec())];
    lines.extend(
        rows.iter()
            .map(|row| format_row(row.iter().map(String::as_str).collect())),
    );
    lines.join("\n")
}

/// One block per container with every known detail.
pub fn render_verbose(containers: &[Container]) -> String {
    containers
        .iter()
        .map(|container| {
            let mut block = vec![
                format!("Container: {}", or_dash(&container.path)),
                format!("  Mapper: {}", container.mapper_name),
            ];
            if container.is_mounted() {
                block.push(format!("  Mount Point: {}", container.mount_point));
            }
            if !container.loop_device.is_empty() {
                block.push(format!("  Loop Device: {}", container.loop_device));
            }
            if !container.filesystem.is_empty() {
                block.push(format!("  Filesystem: {}", container.filesystem));
            }
            if container.size > 0 {
                block.push(format!("  Size: {}", bytes_to_pretty(&container.size, true)));
                block.push(format!(
                    "  Used: {} ({:.1}%)",
                    bytes_to_pretty(&container.used, false),
                    usage_percent(container.used, container.size)
                ));
                if container.available() > 0 {
                    block.push(format!(
                        "  Available: {}",
                        bytes_to_pretty(&container.available(), false)
                    ));
                }
            }
            block.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_json(containers: &[Container]) -> Result<String> {
    Ok(serde_json::to_string_pretty(containers)?)
}
