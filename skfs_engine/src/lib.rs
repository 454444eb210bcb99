// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Directories, dependency tracking, and the recompute loop for the `skfs` incremental computation
//! engine.
//!
//! [`Context`] is the root handle: it owns every [`eager::EagerDir`] and [`lazy::LazyDir`], the
//! shared [`skfs_core::FileInterner`], and the dirty-tracking engine (`dirty`) that schedules
//! recomputation when a write invalidates a dependent entry.
//!
//! This crate is `no_std + alloc` by default so it can run inside a host process with no
//! filesystem; the `std` feature adds [`persist`] (mapping a [`skfs_core::arena::Arena`] back onto
//! a live `Context`) and [`gc`] (the copying collector), both of which need real files. `driver`
//! and `stdin_protocol` are also `std`-gated: the driver loop reads stdin and exit-codes a process,
//! which has no meaning in a `no_std` embedding.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod access;
pub mod context;
pub mod dirty;
pub mod dispatch;
pub mod eager;
pub mod error;
pub mod lazy;
pub mod plan;
pub mod reducer;
pub mod report;
pub mod trace;

#[cfg(feature = "std")]
pub mod driver;
#[cfg(feature = "std")]
pub mod gc;
#[cfg(feature = "std")]
pub mod persist;
#[cfg(feature = "std")]
pub mod stdin_protocol;

pub use context::{Context, Dir};
pub use error::EngineError;
pub use reducer::{Delta, Reducer};
