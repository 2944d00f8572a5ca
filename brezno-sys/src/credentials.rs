// SPDX-License-Identifier: GPL-3.0-only

//! Credential rotation for closed containers

use std::path::{Path, PathBuf};

use tracing::info;

use crate::auth::AuthMethod;
use crate::cmd::CommandRunner;
use crate::discovery::Discovery;
use crate::error::{Result, SysError};
use crate::host::HostFs;
use crate::lifecycle::generate_mapper_name;
use crate::loop_dev::LoopManager;
use crate::luks::LuksManager;
use crate::pathutil::canonical_container_path;

pub struct CredentialChanger<R, H> {
    runner: R,
    host: H,
}

impl<R: CommandRunner, H: HostFs> CredentialChanger<R, H> {
    pub fn new(runner: R, host: H) -> Self {
        Self { runner, host }
    }

    /// Check that the container at `path` exists and is not in use, returning its canonical
    /// path.
    ///
    /// A container counts as in use when discovery maps it to an open mapper, when its derived
    /// mapper name is open, or when a loop device is still attached to the file.
    pub fn ensure_closed(&self, path: &Path) -> Result<PathBuf> {
        let path = canonical_container_path(path)?;
        if !path.is_file() {
            return Err(SysError::NotFound(format!("container {}", path.display())));
        }

        let discovery = Discovery::new(&self.runner, &self.host);
        if let Some(active) = discovery.find_by_path(&path)? {
            return Err(open_container(&path, &active.mapper_name));
        }

        let mapper_name = generate_mapper_name(&path);
        if discovery.find_by_mapper(&mapper_name)?.is_some() {
            return Err(open_container(&path, &mapper_name));
        }

        if let Some(device) = LoopManager::new(&self.runner).find_by_file(&path)? {
            return Err(SysError::PreconditionFailed(format!(
                "Container {} is still attached to {}; close it before changing its credentials",
                path.display(),
                device
            )));
        }

        Ok(path)
    }

    /// Replace the credential in key slot 0 of the container at `path`.
    ///
    /// The container must exist, be LUKS formatted and be closed. The rewrite is a single
    /// `luksChangeKey` run; a rejected `current` credential surfaces as
    /// [`SysError::AuthenticationFailed`] and is never retried.
    pub fn change_key(&self, path: &Path, current: &AuthMethod, new: &AuthMethod) -> Result<()> {
        let path = self.ensure_closed(path)?;

        let luks = LuksManager::new(&self.runner);
        if !luks.is_luks(&path)? {
            return Err(SysError::PreconditionFailed(format!(
                "{} is not a LUKS container",
                path.display()
            )));
        }

        info!(
            "Changing credentials of {} ({} -> {})",
            path.display(),
            current.kind(),
            new.kind()
        );
        luks.change_key(&path, current, new)
    }
}

fn open_container(path: &Path, mapper_name: &str) -> SysError {
    SysError::PreconditionFailed(format!(
        "Container {} is open as {}; close it before changing its credentials",
        path.display(),
        mapper_name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeHost, FakeRunner};
    use crate::secret::SecretBuffer;
    use std::fs;
    use std::path::PathBuf;

    fn password(value: &str) -> AuthMethod {
        AuthMethod::password(SecretBuffer::new(value.as_bytes().to_vec()))
    }

    fn container_file() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = fs::canonicalize(dir.path()).unwrap().join("c.img");
        fs::write(&path, b"LUKS").unwrap();
        (dir, path)
    }

    fn closed_runner() -> FakeRunner {
        FakeRunner::new().fail("dmsetup ls --target crypt", 1, "No devices found")
    }

    fn change_call(runner: &FakeRunner) -> crate::fake::RecordedCall {
        runner
            .calls()
            .into_iter()
            .find(|call| call.line.starts_with("cryptsetup luksChangeKey"))
            .unwrap()
    }

    #[test]
    fn password_to_keyfile() {
        let (_dir, path) = container_file();
        let runner = closed_runner();
        let host = FakeHost::default();
        CredentialChanger::new(&runner, &host)
            .change_key(&path, &password("old"), &AuthMethod::keyfile("/k/new"))
            .unwrap();

        let call = change_call(&runner);
        assert_eq!(
            call.line,
            format!("cryptsetup luksChangeKey --key-slot 0 {} /k/new", path.display())
        );
        assert_eq!(call.stdin.as_deref(), Some(&b"old\n"[..]));
    }

    #[test]
    fn password_to_password() {
        let (_dir, path) = container_file();
        let runner = closed_runner();
        let host = FakeHost::default();
        CredentialChanger::new(&runner, &host)
            .change_key(&path, &password("old"), &password("new"))
            .unwrap();

        let call = change_call(&runner);
        assert_eq!(
            call.line,
            format!("cryptsetup luksChangeKey --key-slot 0 {}", path.display())
        );
        assert_eq!(call.stdin.as_deref(), Some(&b"old\nnew\n"[..]));
    }

    #[test]
    fn keyfile_to_password() {
        let (_dir, path) = container_file();
        let runner = closed_runner();
        let host = FakeHost::default();
        CredentialChanger::new(&runner, &host)
            .change_key(&path, &AuthMethod::keyfile("/k/old"), &password("new"))
            .unwrap();

        let call = change_call(&runner);
        assert_eq!(
            call.line,
            format!(
                "cryptsetup luksChangeKey --key-slot 0 {} --key-file /k/old",
                path.display()
            )
        );
        assert_eq!(call.stdin.as_deref(), Some(&b"new\n"[..]));
    }

    #[test]
    fn keyfile_to_keyfile() {
        let (_dir, path) = container_file();
        let runner = closed_runner();
        let host = FakeHost::default();
        CredentialChanger::new(&runner, &host)
            .change_key(
                &path,
                &AuthMethod::keyfile("/k/old"),
                &AuthMethod::keyfile("/k/new"),
            )
            .unwrap();

        let call = change_call(&runner);
        assert_eq!(
            call.line,
            format!(
                "cryptsetup luksChangeKey --key-slot 0 {} --key-file /k/old /k/new",
                path.display()
            )
        );
        assert!(call.stdin.is_none());
    }

    #[test]
    fn open_container_is_rejected_before_mutation() {
        let (_dir, path) = container_file();
        let runner = FakeRunner::new()
            .respond("dmsetup ls --target crypt", "c_img\t(253:0)\n")
            .respond("dmsetup table c_img", "0 100 crypt aes 0 0 7:1 4096\n")
            .respond(
                "losetup -l -J",
                &format!(
                    r#"{{"loopdevices": [{{"name": "/dev/loop1", "back-file": "{}"}}]}}"#,
                    path.display()
                ),
            );
        let host = FakeHost::default();
        let err = CredentialChanger::new(&runner, &host)
            .change_key(&path, &password("old"), &password("new"))
            .unwrap_err();

        assert!(matches!(err, SysError::PreconditionFailed(_)));
        assert!(!runner.ran("cryptsetup"));
    }

    #[test]
    fn open_mapper_with_unreadable_table_is_rejected() {
        let (_dir, path) = container_file();
        let runner = FakeRunner::new()
            .respond("dmsetup ls --target crypt", "c_img\t(253:0)\n")
            .fail("dmsetup table c_img", 1, "No such device");
        let host = FakeHost::default();
        let err = CredentialChanger::new(&runner, &host)
            .change_key(&path, &password("old"), &password("new"))
            .unwrap_err();

        assert!(matches!(err, SysError::PreconditionFailed(_)));
        assert!(err.to_string().contains("c_img"));
        assert!(!runner.ran("cryptsetup luksChangeKey"));
    }

    #[test]
    fn attached_loop_device_is_rejected() {
        let (_dir, path) = container_file();
        let runner = closed_runner().respond(
            &format!("losetup -j {}", path.display()),
            &format!("/dev/loop1: [2049]:131 ({})\n", path.display()),
        );
        let host = FakeHost::default();
        let changer = CredentialChanger::new(&runner, &host);

        let err = changer.ensure_closed(&path).unwrap_err();
        assert!(err.to_string().contains("/dev/loop1"));

        let err = changer
            .change_key(&path, &password("old"), &password("new"))
            .unwrap_err();
        assert!(matches!(err, SysError::PreconditionFailed(_)));
        assert!(!runner.ran("cryptsetup"));
    }

    #[test]
    fn closed_container_passes_the_check() {
        let (_dir, path) = container_file();
        let runner = closed_runner();
        let host = FakeHost::default();
        let checked = CredentialChanger::new(&runner, &host)
            .ensure_closed(&path)
            .unwrap();
        assert_eq!(checked, path);
        assert!(runner.ran("losetup -j"));
    }

    #[test]
    fn non_luks_file_is_rejected() {
        let (_dir, path) = container_file();
        let runner = closed_runner().fail(&format!("cryptsetup isLuks {}", path.display()), 1, "");
        let host = FakeHost::default();
        let err = CredentialChanger::new(&runner, &host)
            .change_key(&path, &password("old"), &password("new"))
            .unwrap_err();
        assert!(err.to_string().contains("not a LUKS container"));
        assert!(!runner.ran("cryptsetup luksChangeKey"));
    }

    #[test]
    fn missing_container_is_not_found() {
        let (_dir, path) = container_file();
        let runner = closed_runner();
        let host = FakeHost::default();
        let err = CredentialChanger::new(&runner, &host)
            .change_key(&path.with_file_name("absent.img"), &password("a"), &password("b"))
            .unwrap_err();
        assert!(matches!(err, SysError::NotFound(_)));
    }

    #[test]
    fn wrong_current_credential_is_an_authentication_failure() {
        let (_dir, path) = container_file();
        let runner = closed_runner().fail(
            &format!("cryptsetup luksChangeKey --key-slot 0 {}", path.display()),
            2,
            "No key available with this passphrase.",
        );
        let host = FakeHost::default();
        let err = CredentialChanger::new(&runner, &host)
            .change_key(&path, &password("wrong"), &password("new"))
            .unwrap_err();
        assert!(matches!(err, SysError::AuthenticationFailed(_)));

        let attempts = runner
            .lines()
            .iter()
            .filter(|line| line.starts_with("cryptsetup luksChangeKey"))
            .count();
        assert_eq!(attempts, 1);
    }
}
