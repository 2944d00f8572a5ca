// SPDX-License-Identifier: GPL-3.0-only

//! Domain models for brezno
//!
//! These types are shared by the system layer (`brezno-sys`), which builds them from live OS
//! state, and the command-line front end, which renders them.
//!
//! Nothing here is ever persisted: a [`Container`] is rebuilt from device-mapper, loop-device
//! and mount-table queries every time it is needed.

pub mod common;
pub mod container;
pub mod filesystem;

pub use common::{SizeParseError, bytes_to_pretty, parse_size, usage_percent};
pub use container::{Container, MAPPER_DIR};
pub use filesystem::{FilesystemType, UnsupportedFilesystem};
