// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine-observable error taxonomy.

use core::fmt;

use skfs_core::{DirName, Path};

/// An error raised by the engine.
///
/// `DirNotFound`, `DirTypeMismatch`, and `WriteToDeletedDir` are fatal: the caller should abort
/// the current session/frame rather than try to recover in place. `CycleDetected` and
/// `ComputeFailure` are not: a lazy read that hits either of these returns the previous cache and
/// leaves the reader dirty for retry on the next `update()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// No directory exists with this name.
    DirNotFound(DirName),
    /// The directory exists but is not the variant the caller expected (e.g. calling an eager-only
    /// operation on a lazy directory).
    DirTypeMismatch {
        /// The directory whose variant didn't match.
        dir: DirName,
        /// What the caller expected.
        expected: &'static str,
        /// What was actually stored.
        found: &'static str,
    },
    /// A directory name is already in use by a live (non-tombstoned) directory.
    DuplicateDir(DirName),
    /// A write was attempted against a directory that has been removed.
    WriteToDeletedDir(DirName),
    /// A lazy compute detected re-entrancy into a key already in flight on the same stack.
    ///
    /// Non-fatal: the stale (or empty) cache is returned and the key stays dirty for the next
    /// `update()`.
    CycleDetected(Path),
    /// A mapper or lazy compute closure reported a failure for a specific entry.
    ///
    /// Non-fatal: the previous cached value, if any, is preserved and the entry remains dirty.
    ComputeFailure {
        /// The path whose producer failed.
        path: Path,
        /// A short, human-readable description of the failure.
        message: alloc::boxed::Box<str>,
    },
    /// The persisted arena's magic number did not match.
    PersistenceMagicMismatch,
    /// An `ExternalPointer` failed to survive a copying collection.
    ///
    /// The associated finalizer has already run by the time this is observed.
    ExternalPointerInvalid,
}

impl EngineError {
    /// Returns `true` for errors that should abort the current session/frame rather than being
    /// retried in place.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::DirNotFound(_)
            | Self::DirTypeMismatch { .. }
            | Self::DuplicateDir(_)
            | Self::WriteToDeletedDir(_)
            | Self::PersistenceMagicMismatch => true,
            Self::CycleDetected(_) | Self::ComputeFailure { .. } | Self::ExternalPointerInvalid => {
                false
            }
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirNotFound(dir) => write!(f, "unknown directory: {dir}"),
            Self::DirTypeMismatch {
                dir,
                expected,
                found,
            } => write!(f, "directory {dir} is {found}, expected {expected}"),
            Self::DuplicateDir(dir) => write!(f, "directory already exists: {dir}"),
            Self::WriteToDeletedDir(dir) => write!(f, "write to deleted directory: {dir}"),
            Self::CycleDetected(path) => write!(f, "dependency cycle detected at {path}"),
            Self::ComputeFailure { path, message } => {
                write!(f, "compute failed for {path}: {message}")
            }
            Self::PersistenceMagicMismatch => write!(f, "persisted arena has an incompatible magic number"),
            Self::ExternalPointerInvalid => write!(f, "external pointer did not survive garbage collection"),
        }
    }
}

impl core::error::Error for EngineError {}
