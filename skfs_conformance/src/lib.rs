// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conformance tests for the `skfs` engine's cross-cutting invariants and scenarios.
//!
//! Several invariants already have unit-test coverage alongside the modules that establish them
//! (`skfs_engine::eager`, `::lazy`, `::gc`) and are not duplicated here. This crate carries:
//!
//! - the two properties that benefit from many-case generation rather than a handful of fixed
//!   cases — confluence of incremental vs batch writes, and stdin idempotence under arbitrary
//!   chunk boundaries (both in `properties`);
//! - six named end-to-end scenarios, each a standalone test in [`scenarios`].

#[cfg(test)]
mod properties;

pub mod scenarios;
