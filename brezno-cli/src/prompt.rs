// SPDX-License-Identifier: GPL-3.0-only

//! Interactive input on the controlling terminal

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};

use brezno_sys::{AuthMethod, SecretBuffer, validate_keyfile};

/// Which passphrase prompts to show
pub struct PassphrasePrompt<'a> {
    pub enter: &'a str,
    pub confirm: Option<&'a str>,
}

impl PassphrasePrompt<'_> {
    pub const UNLOCK: PassphrasePrompt<'static> = PassphrasePrompt {
        enter: "Enter passphrase",
        confirm: None,
    };

    pub const NEW: PassphrasePrompt<'static> = PassphrasePrompt {
        enter: "Enter passphrase",
        confirm: Some("Confirm passphrase"),
    };
}

pub fn prompt_string(prompt: &str) -> Result<String> {
    eprint!("{prompt}: ");
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .context("failed to read input")?;
    Ok(input.trim().to_string())
}

pub fn confirm(prompt: &str) -> Result<bool> {
    let input = prompt_string(&format!("{prompt} [y/N]"))?;
    Ok(is_yes(&input))
}

fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Read a passphrase without echo.
pub fn prompt_password(prompt: &str) -> Result<SecretBuffer> {
    let value =
        rpassword::prompt_password(format!("{prompt}: ")).context("failed to read passphrase")?;
    Ok(SecretBuffer::from_string(value))
}

/// Read one passphrase line from stdin, for scripted use.
pub fn read_password_line(input: &mut impl BufRead) -> Result<SecretBuffer> {
    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("failed to read passphrase from stdin")?;
    if read == 0 {
        bail!("unexpected end of input while reading passphrase");
    }
    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(SecretBuffer::from_string(line))
}

/// Read a passphrase (and its confirmation, when asked) from stdin or the terminal.
pub fn read_passphrase(prompt: &PassphrasePrompt<'_>, from_stdin: bool) -> Result<SecretBuffer> {
    let mut stdin = io::stdin().lock();
    let mut read = |text: &str| {
        if from_stdin {
            read_password_line(&mut stdin)
        } else {
            prompt_password(text)
        }
    };

    let secret = read(prompt.enter)?;
    if secret.is_empty() {
        bail!("passphrase must not be empty");
    }
    if let Some(confirm_text) = prompt.confirm {
        let confirmation = read(confirm_text)?;
        if !secret.matches(&confirmation) {
            bail!("passphrases don't match");
        }
    }
    Ok(secret)
}

/// A validated keyfile when one is given, otherwise a passphrase.
pub fn auth_method(
    keyfile: Option<&Path>,
    prompt: &PassphrasePrompt<'_>,
    from_stdin: bool,
) -> Result<AuthMethod> {
    match keyfile {
        Some(path) => Ok(AuthMethod::keyfile(validate_keyfile(path)?)),
        None => Ok(AuthMethod::password(read_passphrase(prompt, from_stdin)?)),
    }
}
