// SPDX-License-Identifier: GPL-3.0-only

//! LIFO rollback register for multi-resource sequences
//!
//! Right after a resource is acquired (sparse file, loop attachment, opened mapper, mount) its
//! inverse is pushed onto a [`CleanupStack`]. When the sequence completes the stack is cleared;
//! when it fails the stack is executed and releases everything acquired so far, newest first.

use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::error::{Result, SysError};

type ReleaseAction<'a> = Box<dyn FnOnce() -> Result<()> + Send + 'a>;

struct Entry<'a> {
    label: String,
    action: ReleaseAction<'a>,
}

/// Release actions may borrow from the operation that owns the stack (`'a`).
#[derive(Default)]
pub struct CleanupStack<'a> {
    entries: Mutex<Vec<Entry<'a>>>,
}

impl<'a> CleanupStack<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry<'a>>> {
        // A panic inside a release action must not make the remaining actions unreachable.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register the inverse of a just-acquired resource.
    pub fn add<F>(&self, label: impl Into<String>, release: F)
    where
        F: FnOnce() -> Result<()> + Send + 'a,
    {
        self.lock().push(Entry {
            label: label.into(),
            action: Box::new(release),
        });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run every registered action once, newest first.
    ///
    /// Failures do not stop the remaining actions; they are collected into one
    /// [`SysError::Cleanup`].
    pub fn execute(&self) -> Result<()> {
        let entries = std::mem::take(&mut *self.lock());

        let mut errors = Vec::new();
        for entry in entries.into_iter().rev() {
            if let Err(e) = (entry.action)() {
                warn!("Cleanup step '{}' failed: {}", entry.label, e);
                errors.push(format!("{}: {}", entry.label, e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SysError::Cleanup(errors))
        }
    }

    /// Forget every pending action without running it.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Executes its stack on drop unless [`CleanupGuard::commit`] was called.
///
/// Lets `?` early returns unwind whatever was acquired before the failure.
pub struct CleanupGuard<'a> {
    stack: CleanupStack<'a>,
    committed: bool,
}

impl<'a> CleanupGuard<'a> {
    pub fn new() -> Self {
        Self {
            stack: CleanupStack::new(),
            committed: false,
        }
    }

    pub fn add<F>(&self, label: impl Into<String>, release: F)
    where
        F: FnOnce() -> Result<()> + Send + 'a,
    {
        self.stack.add(label, release);
    }

    /// The sequence succeeded: drop all pending actions.
    pub fn commit(mut self) {
        self.stack.clear();
        self.committed = true;
    }
}

impl Default for CleanupGuard<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = self.stack.execute() {
            warn!("Cleanup errors occurred: {}", e);
        }
    }
}
