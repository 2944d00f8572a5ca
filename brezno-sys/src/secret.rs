// SPDX-License-Identifier: GPL-3.0-only

//! Owned passphrase material
//!
//! A [`SecretBuffer`] is wiped when its owner drops it. It cannot be cloned, so each secret is
//! wiped exactly once, on every exit path of the call that created it.

use std::fmt;

use zeroize::{Zeroize, Zeroizing};

pub struct SecretBuffer {
    bytes: Zeroizing<Vec<u8>>,
}

impl SecretBuffer {
    /// Take ownership of `bytes`; the caller keeps no copy.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Build from a string read off a prompt, wiping the string's allocation.
    pub fn from_string(mut value: String) -> Self {
        let secret = Self::new(value.as_bytes().to_vec());
        value.zeroize();
        secret
    }

    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Compare against another secret without early exit on the first differing byte.
    pub fn matches(&self, other: &SecretBuffer) -> bool {
        if self.bytes.len() != other.bytes.len() {
            return false;
        }
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuffer([REDACTED; {}])", self.bytes.len())
    }
}
