// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use brezno_sys::{
    AuthMethod, CleanupStack, CommandOutput, CommandRequest, CommandRunner, CredentialChanger,
    Discovery, HostFs, Lifecycle, Resizer, Result, SecretBuffer, SysError,
};

/// Answers from a fixed table; unknown commands succeed silently.
#[derive(Default)]
struct ScriptedRunner {
    answers: HashMap<String, CommandOutput>,
    log: Mutex<Vec<(String, Option<Vec<u8>>)>>,
}

impl ScriptedRunner {
    fn answer(mut self, line: &str, status: i32, stdout: &str, stderr: &str) -> Self {
        self.answers.insert(
            line.to_string(),
            CommandOutput {
                status,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
        self
    }

    fn log(&self) -> Vec<(String, Option<Vec<u8>>)> {
        self.log.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let line = std::iter::once(request.program().to_string())
            .chain(request.get_args().iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.log
            .lock()
            .unwrap()
            .push((line.clone(), request.stdin().map(<[u8]>::to_vec)));
        Ok(self.answers.get(&line).cloned().unwrap_or_default())
    }

    fn command_exists(&self, _name: &str) -> bool {
        true
    }
}

struct StaticHost {
    mounts: &'static str,
}

impl HostFs for StaticHost {
    fn mount_table(&self) -> Result<String> {
        Ok(self.mounts.to_string())
    }

    fn available_space(&self, _path: &Path) -> Result<u64> {
        Ok(u64::MAX)
    }
}

fn password(value: &str) -> AuthMethod {
    AuthMethod::password(SecretBuffer::new(value.as_bytes().to_vec()))
}

#[test]
fn discovery_reconstructs_mounted_container() {
    let runner = ScriptedRunner::default()
        .answer("dmsetup ls --target crypt", 0, "c_img\t(253:0)\n", "")
        .answer(
            "dmsetup table c_img",
            0,
            "0 200704 crypt aes-xts-plain64 :64:logon:cryptsetup:k 0 7:7 32768\n",
            "",
        )
        .answer(
            "losetup -l -J",
            0,
            r#"{"loopdevices": [{"name": "/dev/loop7", "back-file": "/abs/c.img"}]}"#,
            "",
        )
        .answer(
            "df --block-size=1 /mnt/x",
            0,
            "Filesystem 1B-blocks Used Available Use% Mounted on\n/dev/mapper/c_img 104857600 20000000 84857600 20% /mnt/x\n",
            "",
        );
    let host = StaticHost {
        mounts: "/dev/mapper/c_img /mnt/x ext4 rw 0 0\n",
    };

    let containers = Discovery::new(&runner, &host).discover_active().unwrap();
    let json = serde_json::to_value(&containers[0]).unwrap();
    assert_eq!(json["path"], "/abs/c.img");
    assert_eq!(json["mapper_name"], "c_img");
    assert_eq!(json["loop_device"], "/dev/loop7");
    assert_eq!(json["mount_point"], "/mnt/x");
    assert_eq!(json["filesystem"], "ext4");
    assert_eq!(json["size"], 104_857_600u64);
    assert_eq!(json["used"], 20_000_000u64);
    assert_eq!(json["active"], true);
}

#[test]
fn password_to_keyfile_rotation_sends_one_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = fs::canonicalize(dir.path()).unwrap().join("c.img");
    fs::write(&path, b"LUKS").unwrap();
    let runner = ScriptedRunner::default().answer(
        "dmsetup ls --target crypt",
        1,
        "",
        "No devices found",
    );
    let host = StaticHost { mounts: "" };

    CredentialChanger::new(&runner, &host)
        .change_key(&path, &password("old"), &AuthMethod::keyfile("/k/new"))
        .unwrap();

    let rotations: Vec<_> = runner
        .log()
        .into_iter()
        .filter(|(line, _)| line.starts_with("cryptsetup luksChangeKey"))
        .collect();
    assert_eq!(rotations.len(), 1);
    assert_eq!(
        rotations[0].0,
        format!("cryptsetup luksChangeKey --key-slot 0 {} /k/new", path.display())
    );
    assert_eq!(rotations[0].1.as_deref(), Some(&b"old\n"[..]));
}

#[test]
fn resize_of_closed_container_is_rejected_without_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.img");
    fs::File::create(&path).unwrap().set_len(100 << 20).unwrap();
    let runner = ScriptedRunner::default().answer(
        "dmsetup ls --target crypt",
        1,
        "",
        "No devices found",
    );
    let host = StaticHost { mounts: "" };

    let err = Resizer::new(&runner, &host)
        .prepare(&path, 200 << 20)
        .unwrap_err();
    assert!(matches!(err, SysError::PreconditionFailed(_)));
    assert_eq!(fs::metadata(&path).unwrap().len(), 100 << 20);
}

#[test]
fn unmount_resolves_by_mapper_name() {
    let runner = ScriptedRunner::default()
        .answer("dmsetup ls --target crypt", 0, "c_img\t(253:0)\n", "")
        .answer("dmsetup table c_img", 0, "0 100 crypt aes 0 0 7:7 4096\n", "")
        .answer(
            "losetup -l -J",
            0,
            r#"{"loopdevices": [{"name": "/dev/loop7", "back-file": "/abs/c.img"}]}"#,
            "",
        );
    let host = StaticHost {
        mounts: "/dev/mapper/c_img /mnt/x ext4 rw 0 0\n",
    };
    let lifecycle = Lifecycle::new(&runner, &host);

    let container = lifecycle.resolve("c_img").unwrap().unwrap();
    lifecycle.close(&container, false).unwrap();

    let lines: Vec<String> = runner.log().into_iter().map(|(line, _)| line).collect();
    let tail = &lines[lines.len() - 3..];
    assert_eq!(
        tail,
        ["umount /mnt/x", "cryptsetup luksClose c_img", "losetup -d /dev/loop7"]
    );
}

#[test]
fn cleanup_reports_every_failure() {
    let order = Mutex::new(Vec::new());
    let stack = CleanupStack::new();
    for step in 1..=4 {
        let order = &order;
        stack.add(format!("step {step}"), move || {
            order.lock().unwrap().push(step);
            if step == 3 {
                Err(SysError::NotFound(format!("resource {step}")))
            } else {
                Ok(())
            }
        });
    }

    match stack.execute() {
        Err(SysError::Cleanup(failures)) => {
            assert_eq!(failures.len(), 1);
            assert!(failures[0].starts_with("step 3"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(*order.lock().unwrap(), vec![4, 3, 2, 1]);
}
