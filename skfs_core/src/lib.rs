// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value model and persistence arena for the `skfs` incremental computation engine.
//!
//! This crate is intentionally small and `no_std + alloc`: it defines the key/value vocabulary
//! (`BaseName`, `DirName`, `Path`, `Time`, `File`) that `skfs_engine` builds directories and
//! dependency tracking on top of, plus (behind the `std` feature) the binary arena used to persist
//! a whole context to a single memory-mapped file.
//!
//! Nothing in this crate knows about directories, mappers, or reducers — that is `skfs_engine`'s
//! job. This crate only has to make sure that keys compare and hash the way callers expect, and
//! that `File` values are cheap to compare for the identity-on-equality property the engine's
//! caching relies on.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod file;
pub mod format;
pub mod name;
pub mod path;
pub mod time;

#[cfg(feature = "std")]
pub mod arena;

pub use file::{ExternalPointer, File, FileId, FileInterner};
pub use name::{BaseName, DirName};
pub use path::Path;
pub use time::Time;
