// SPDX-License-Identifier: GPL-3.0-only

//! Creating, opening and closing containers
//!
//! Each multi-resource sequence registers the inverse of every acquired resource on a
//! [`CleanupGuard`]. Returning early through `?` drops the guard, which releases what was
//! acquired so far in reverse order; reaching the end commits it.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tracing::{info, warn};

use brezno_types::{Container, FilesystemType, MAPPER_DIR, bytes_to_pretty};

use crate::auth::AuthMethod;
use crate::cleanup::CleanupGuard;
use crate::cmd::CommandRunner;
use crate::discovery::Discovery;
use crate::error::{Result, SysError};
use crate::host::HostFs;
use crate::loop_dev::LoopManager;
use crate::luks::LuksManager;
use crate::mount::MountManager;
use crate::pathutil::canonical_container_path;

/// Device-mapper name derived from a container file name.
///
/// `/srv/my-vault.img` becomes `my_vault_img`: dots and dashes turn into underscores, other
/// characters outside `[A-Za-z0-9_]` are dropped, and a leading digit gets a `crypt_` prefix.
pub fn generate_mapper_name(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name: String = base
        .chars()
        .map(|c| if c == '.' || c == '-' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("crypt_{name}")
    } else {
        name
    }
}

pub struct Lifecycle<R, H> {
    runner: R,
    host: H,
}

impl<R: CommandRunner + Sync, H: HostFs> Lifecycle<R, H> {
    pub fn new(runner: R, host: H) -> Self {
        Self { runner, host }
    }

    fn discovery(&self) -> Discovery<&R, &H> {
        Discovery::new(&self.runner, &self.host)
    }

    /// Find an active container by backing file, mount point or mapper name, in that order.
    pub fn resolve(&self, identifier: &str) -> Result<Option<Container>> {
        let discovery = self.discovery();
        if let Some(found) = discovery.find_by_path(Path::new(identifier))? {
            return Ok(Some(found));
        }
        if let Some(found) = discovery.find_by_mount(Path::new(identifier))? {
            return Ok(Some(found));
        }
        discovery.find_by_mapper(identifier)
    }

    /// Create a new LUKS2 container file of `size` bytes holding an empty `filesystem`.
    ///
    /// The file is created exclusively with mode 0600. On any failure every step taken so far
    /// is undone, including removal of the file. The container is left closed.
    pub fn create(
        &self,
        path: &Path,
        size: u64,
        filesystem: FilesystemType,
        auth: &AuthMethod,
    ) -> Result<()> {
        let path = canonical_container_path(path)?;
        if size == 0 {
            return Err(SysError::PreconditionFailed(
                "Container size must be greater than zero".to_string(),
            ));
        }

        let mapper_name = generate_mapper_name(&path);
        if mapper_name.is_empty() {
            return Err(SysError::PreconditionFailed(format!(
                "Cannot derive a mapper name from {}",
                path.display()
            )));
        }
        if self.discovery().find_by_mapper(&mapper_name)?.is_some() {
            return Err(SysError::AlreadyActive(format!(
                "mapper {mapper_name} is already open"
            )));
        }

        let runner = &self.runner;
        let loops = LoopManager::new(runner);
        let luks = LuksManager::new(runner);
        let guard = CleanupGuard::new();

        info!(
            "Creating {} sparse file {}",
            bytes_to_pretty(&size, false),
            path.display()
        );
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => SysError::PreconditionFailed(format!(
                    "File already exists: {}",
                    path.display()
                )),
                _ => SysError::Io(e),
            })?;
        let created = path.clone();
        guard.add(format!("remove {}", created.display()), move || {
            Ok(std::fs::remove_file(&created)?)
        });
        file.set_len(size)?;
        drop(file);

        info!("Formatting as LUKS2");
        luks.format(&path, auth)?;

        let loop_device = loops.attach(&path)?;
        let device = loop_device.clone();
        guard.add(format!("detach {loop_device}"), move || {
            LoopManager::new(runner).detach(&device)
        });

        luks.open(&loop_device, &mapper_name, auth)?;
        let mapper = mapper_name.clone();
        guard.add(format!("close {mapper_name}"), move || {
            LuksManager::new(runner).close(&mapper)
        });

        let mapper_device = format!("{MAPPER_DIR}/{mapper_name}");
        MountManager::new(runner).make_filesystem(&mapper_device, filesystem)?;

        guard.commit();

        if let Err(e) = luks.close(&mapper_name) {
            warn!("Could not close {} after creation: {}", mapper_name, e);
        }
        if let Err(e) = loops.detach(&loop_device) {
            warn!("Could not detach {} after creation: {}", loop_device, e);
        }

        info!("Created container {}", path.display());
        Ok(())
    }

    /// Attach, unlock and mount the container at `path`, returning its mapper name.
    pub fn open_and_mount(
        &self,
        path: &Path,
        mount_point: &Path,
        read_only: bool,
        auth: &AuthMethod,
    ) -> Result<String> {
        let path = canonical_container_path(path)?;
        let mount_point = canonical_container_path(mount_point)?;
        if !path.is_file() {
            return Err(SysError::NotFound(format!("container {}", path.display())));
        }

        let runner = &self.runner;
        let luks = LuksManager::new(runner);
        if !luks.is_luks(&path)? {
            return Err(SysError::PreconditionFailed(format!(
                "Not a LUKS container: {}",
                path.display()
            )));
        }

        if let Some(existing) = self.discovery().find_by_path(&path)? {
            return Err(SysError::AlreadyActive(if existing.is_mounted() {
                format!("{} is mounted at {}", path.display(), existing.mount_point)
            } else {
                format!("{} is open as {}", path.display(), existing.mapper_name)
            }));
        }

        let mapper_name = generate_mapper_name(&path);
        if self.discovery().find_by_mapper(&mapper_name)?.is_some() {
            return Err(SysError::AlreadyActive(format!(
                "mapper {mapper_name} is already open for another file"
            )));
        }

        let guard = CleanupGuard::new();

        let loop_device = LoopManager::new(runner).attach(&path)?;
        let device = loop_device.clone();
        guard.add(format!("detach {loop_device}"), move || {
            LoopManager::new(runner).detach(&device)
        });

        luks.open(&loop_device, &mapper_name, auth)?;
        let mapper = mapper_name.clone();
        guard.add(format!("close {mapper_name}"), move || {
            LuksManager::new(runner).close(&mapper)
        });

        let mapper_device = format!("{MAPPER_DIR}/{mapper_name}");
        let mounts = MountManager::new(runner);
        mounts.mount(&mapper_device, &mount_point, read_only)?;
        let target = mount_point.clone();
        guard.add(format!("unmount {}", mount_point.display()), move || {
            MountManager::new(runner).unmount(&target, false)
        });

        guard.commit();
        info!("Container mounted at {}", mount_point.display());
        Ok(mapper_name)
    }

    /// Unmount (if mounted), close the mapper and detach its loop device.
    ///
    /// Failing to detach the loop device is only a warning; the container is closed by then.
    pub fn close(&self, container: &Container, force: bool) -> Result<()> {
        if container.is_mounted() {
            info!("Unmounting {}", container.mount_point);
            MountManager::new(&self.runner).unmount(Path::new(&container.mount_point), force)?;
        }

        if !container.mapper_name.is_empty() {
            LuksManager::new(&self.runner).close(&container.mapper_name)?;
        }

        if container.has_loop_device() {
            if let Err(e) = LoopManager::new(&self.runner).detach(&container.loop_device) {
                warn!(
                    "Failed to detach loop device {}: {}",
                    container.loop_device, e
                );
            }
        }

        info!("Closed container {}", container.mapper_name);
        Ok(())
    }
}
