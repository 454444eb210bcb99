// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A precomputed, ordered batch of eager-channel work for one `update()` pass.
//!
//! Separating "what to run" ([`RunPlan`]) from "how to run it" ([`crate::dispatch`]) keeps
//! `Context::update` free to swap dispatch strategies later without reshaping its public surface.

use alloc::vec::Vec;

use skfs_core::Path;

use crate::report::WorkRunDetail;

/// How much of the dependency graph a [`RunPlan`] covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanScope {
    /// Every dirty path reachable from the drained roots.
    All,
    /// Only paths within the dependency closure of a specific path (used by targeted re-forces,
    /// e.g. a CLI `--probe` query).
    WithinDependenciesOf(Path),
}

/// Optional per-entry trace payload carried alongside a [`RunPlan`], consumed by
/// `Dispatcher::dispatch_with_report`.
#[derive(Clone, Debug, Default)]
pub struct RunPlanTrace {
    details: Vec<Option<WorkRunDetail>>,
}

impl RunPlanTrace {
    /// Builds a trace payload from one detail slot per planned path, in the same order as
    /// [`RunPlan::paths`].
    #[must_use]
    pub const fn from_details(details: Vec<Option<WorkRunDetail>>) -> Self {
        Self { details }
    }

    /// Takes the detail recorded for the `index`-th planned path, if any.
    pub fn take_detail_for(&mut self, index: usize) -> Option<WorkRunDetail> {
        self.details.get_mut(index).and_then(Option::take)
    }
}

/// A batch of paths to recompute, in the order they must run.
#[derive(Clone, Debug)]
pub struct RunPlan {
    paths: Vec<Path>,
    scope: PlanScope,
    trace: Option<RunPlanTrace>,
}

impl RunPlan {
    /// Builds a plan covering every path drained this pass, with no scope restriction.
    #[must_use]
    pub const fn all(paths: Vec<Path>) -> Self {
        Self {
            paths,
            scope: PlanScope::All,
            trace: None,
        }
    }

    /// Builds a plan restricted to the dependency closure of `root`.
    #[must_use]
    pub const fn within_dependencies_of(paths: Vec<Path>, root: Path) -> Self {
        Self {
            paths,
            scope: PlanScope::WithinDependenciesOf(root),
            trace: None,
        }
    }

    /// Attaches a trace payload to this plan, consumed alongside dispatch.
    #[must_use]
    pub fn with_trace(mut self, trace: RunPlanTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Returns this plan's scope.
    #[must_use]
    pub const fn scope(&self) -> &PlanScope {
        &self.scope
    }

    /// Takes the planned paths, leaving an empty vector behind.
    pub fn take_paths(&mut self) -> Vec<Path> {
        core::mem::take(&mut self.paths)
    }

    /// Takes this plan's trace payload, if any.
    pub fn take_trace(&mut self) -> Option<RunPlanTrace> {
        self.trace.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skfs_core::{BaseName, DirName};

    fn p(key: i64) -> Path {
        Path::new(DirName::new("/out/"), BaseName::iid(key))
    }

    #[test]
    fn take_paths_drains_exactly_once() {
        let mut plan = RunPlan::all(alloc::vec![p(1), p(2)]);
        assert_eq!(plan.take_paths().len(), 2);
        assert!(plan.take_paths().is_empty());
    }

    #[test]
    fn within_dependencies_of_records_the_root() {
        let plan = RunPlan::within_dependencies_of(alloc::vec![p(1)], p(0));
        assert_eq!(plan.scope(), &PlanScope::WithinDependenciesOf(p(0)));
    }
}
