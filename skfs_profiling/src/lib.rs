// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Profiling adapters for the `skfs` incremental computation engine (currently Tracy).
//!
//! This crate is `std`-only and keeps `skfs_engine` itself free of profiling dependencies. It
//! implements [`skfs_engine::trace::TraceSink`] and emits matching Tracy spans for the two scopes
//! the engine brackets: a whole `update()` pass, and each individual mapper rerun.
//!
//! ## Backend
//! This crate currently supports the Tracy backend via `tracy-client`.
//!
//! ## Example
//! ```ignore
//! use skfs_engine::context::Context;
//! use skfs_profiling::ProfilingTraceSink;
//!
//! let mut ctx = Context::new();
//! ctx.set_trace_sink(Some(Box::new(ProfilingTraceSink::new())));
//! ctx.update()?;
//! # Ok::<(), skfs_engine::EngineError>(())
//! ```

mod resolver;
mod sink;

pub use resolver::{DefaultLabelResolver, LabelResolver};
pub use sink::ProfilingTraceSink;
