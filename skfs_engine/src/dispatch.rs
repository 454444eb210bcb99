// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Internal dispatch interfaces for executing [`RunPlan`](crate::plan::RunPlan) values.
//!
//! This module intentionally stays internal. It provides a stable seam between planning ("what to
//! run", [`RunPlan`]) and execution strategy ("how to run it", [`Dispatcher`]), so future scheduler
//! work can swap dispatch implementations without reshaping [`crate::context::Context`]'s public
//! API. The only implementation today is [`InlineDispatcher`]: this engine commits to a
//! single-threaded, cooperative execution model, so there is nothing for a parallel dispatcher to
//! do yet — but `Context::update` is written against the trait, not the concrete type.

use alloc::vec::Vec;

use skfs_core::Path;

use crate::plan::{PlanScope, RunPlan};
use crate::report::{RunDetailReport, WorkRunDetail};

/// Internal dispatcher contract.
///
/// Dispatchers execute the paths in a precomputed [`RunPlan`] and may optionally assemble detailed
/// per-path reporting if the caller wants it.
pub(crate) trait Dispatcher {
    /// Executes every path in `plan`, calling `run_path` once per path in plan order.
    ///
    /// Returns the number of paths executed.
    fn dispatch<F>(&mut self, plan: &mut RunPlan, run_path: F) -> usize
    where
        F: FnMut(&Path);

    /// Executes every path in `plan`, calling `run_path` once per path and collecting whatever
    /// detail it returns into a [`RunDetailReport`].
    fn dispatch_with_report<F>(&mut self, plan: &mut RunPlan, run_path: F) -> RunDetailReport
    where
        F: FnMut(&Path) -> Option<WorkRunDetail>;
}

/// Serial in-process dispatcher used by default.
///
/// Paths are executed in the order the [`RunPlan`] lists them, preserving deterministic behavior
/// (matching the dirty-reader draining order requirement).
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch<F>(&mut self, plan: &mut RunPlan, mut run_path: F) -> usize
    where
        F: FnMut(&Path),
    {
        // Keep scope as part of the dispatch contract even before scope-specific strategies exist.
        match plan.scope() {
            PlanScope::All | PlanScope::WithinDependenciesOf(_) => {}
        }

        let paths: Vec<Path> = plan.take_paths();
        for path in &paths {
            run_path(path);
        }
        paths.len()
    }

    fn dispatch_with_report<F>(&mut self, plan: &mut RunPlan, mut run_path: F) -> RunDetailReport
    where
        F: FnMut(&Path) -> Option<WorkRunDetail>,
    {
        match plan.scope() {
            PlanScope::All | PlanScope::WithinDependenciesOf(_) => {}
        }

        let mut trace = plan.take_trace();
        let mut report = RunDetailReport::default();
        let paths: Vec<Path> = plan.take_paths();

        for path in &paths {
            if let Some(detail) = run_path(path) {
                report.recomputed.push(detail);
            } else if let Some(t) = trace.as_mut() {
                let _ = t.take_detail_for(report.recomputed.len());
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::{Dispatcher, InlineDispatcher};
    use crate::plan::RunPlan;
    use crate::report::WorkRunDetail;
    use alloc::vec;
    use skfs_core::{BaseName, DirName, Path};

    fn p(key: i64) -> Path {
        Path::new(DirName::new("/out/"), BaseName::iid(key))
    }

    #[test]
    fn inline_dispatcher_runs_every_path_in_order() {
        let mut plan = RunPlan::all(vec![p(1), p(2), p(3)]);
        let mut dispatcher = InlineDispatcher;
        let mut executed = vec![];

        let ran = dispatcher.dispatch(&mut plan, |path| executed.push(path.clone()));

        assert_eq!(ran, 3);
        assert_eq!(executed, vec![p(1), p(2), p(3)]);
    }

    #[test]
    fn inline_dispatcher_with_report_collects_only_some_paths() {
        let mut plan = RunPlan::all(vec![p(1), p(2)]);
        let mut dispatcher = InlineDispatcher;

        let report = dispatcher.dispatch_with_report(&mut plan, |path| {
            if path == &p(1) {
                Some(WorkRunDetail {
                    path: path.clone(),
                    because_of: None,
                    why_path: None,
                })
            } else {
                None
            }
        });

        assert_eq!(report.recomputed.len(), 1);
        assert_eq!(report.recomputed[0].path, p(1));
    }
}
