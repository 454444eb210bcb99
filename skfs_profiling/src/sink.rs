// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::resolver::{DefaultLabelResolver, LabelResolver, default_label};
use skfs_engine::trace::{ScopeKind, TraceSink};
use std::string::String;
use std::vec::Vec;

type BackendGuard = tracy_client::Span;

struct ScopeEntry {
    // Keep the label alive for backends that may borrow it.
    label: String,
    guard: Option<BackendGuard>,
}

/// A [`TraceSink`] that emits Tracy scopes via `tracy-client`.
///
/// Pushed onto `Context` via `Context::set_trace_sink`, this brackets one Tracy span per `update()`
/// pass and per mapper rerun, nesting naturally since mapper reruns always happen inside an
/// `update()` scope.
pub struct ProfilingTraceSink<R = DefaultLabelResolver> {
    resolver: R,
    stack: Vec<ScopeEntry>,
}

impl ProfilingTraceSink<DefaultLabelResolver> {
    /// Create a new sink with directory-name-based labels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: LabelResolver> ProfilingTraceSink<R> {
    /// Create a new sink with a custom label resolver.
    #[must_use]
    pub fn with_resolver(resolver: R) -> Self {
        Self {
            resolver,
            stack: Vec::new(),
        }
    }

    fn resolve_label(&mut self, kind: &ScopeKind) -> String {
        self.resolver.scope_label(kind).unwrap_or_else(|| default_label(kind))
    }

    fn start_scope(&self, kind: &ScopeKind, label: &str) -> Option<BackendGuard> {
        let function_name = match kind {
            ScopeKind::Update => "skfs.update",
            ScopeKind::MapperRun { .. } => "skfs.mapper_run",
        };
        let client = tracy_client::Client::running()?;
        Some(client.span_alloc(Some(label), function_name, "skfs_engine", 0, 0))
    }
}

impl<R: LabelResolver> TraceSink for ProfilingTraceSink<R> {
    fn scope_enter(&mut self, kind: &ScopeKind) {
        let label = self.resolve_label(kind);
        let guard = self.start_scope(kind, &label);
        self.stack.push(ScopeEntry { label, guard });
    }

    fn scope_exit(&mut self, _kind: &ScopeKind) {
        // Scopes nest strictly (a mapper run never outlives the `update()` pass it belongs to),
        // so the most recently entered scope is always the one exiting; dropping its guard here
        // ends the span.
        self.stack.pop();
    }
}

impl<R> Default for ProfilingTraceSink<R>
where
    R: LabelResolver + Default,
{
    fn default() -> Self {
        Self::with_resolver(R::default())
    }
}

impl<R> std::fmt::Debug for ProfilingTraceSink<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilingTraceSink")
            .field("stack_depth", &self.stack.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::ProfilingTraceSink;
    use skfs_engine::trace::ScopeKind;

    #[test]
    fn start_scope_without_tracy_client_does_not_panic() {
        let sink = ProfilingTraceSink::new();
        let _guard = sink.start_scope(&ScopeKind::Update, "test");
    }

    #[test]
    fn scope_enter_and_exit_keep_the_stack_balanced() {
        let mut sink = ProfilingTraceSink::new();
        sink.scope_enter(&ScopeKind::Update);
        sink.scope_enter(&ScopeKind::MapperRun {
            dir: skfs_core::DirName::new("/out/"),
        });
        assert_eq!(sink.stack.len(), 2);
        sink.scope_exit(&ScopeKind::MapperRun {
            dir: skfs_core::DirName::new("/out/"),
        });
        sink.scope_exit(&ScopeKind::Update);
        assert!(sink.stack.is_empty());
    }
}
