// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instrumentation hook consumed by `skfs_profiling`.
//!
//! The engine itself has no opinion on *how* a scope is recorded: it only calls
//! [`TraceSink::scope_enter`]/[`TraceSink::scope_exit`] around the two recompute boundaries worth
//! timing — a whole [`crate::context::Context::update`] pass, and each individual mapper rerun.
//! `skfs_profiling::ProfilingTraceSink` is the one implementation that actually does something
//! (emits Tracy spans); the default is [`NullTraceSink`], which the optimizer removes entirely.

use skfs_core::DirName;

/// Which kind of recompute boundary a [`TraceSink`] scope brackets.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScopeKind {
    /// One whole `update()` pass, draining the eager channel to a fixed point.
    Update,
    /// One mapper rerun for a single dirty source key, writing into `dir`.
    MapperRun {
        /// The mapper's output directory.
        dir: DirName,
    },
}

/// Receives scope enter/exit callbacks around engine recompute boundaries.
///
/// Both methods default to no-ops so implementing just one of them (or neither, for
/// [`NullTraceSink`]) is enough.
pub trait TraceSink {
    /// Called immediately before the scope named by `kind` begins.
    fn scope_enter(&mut self, kind: &ScopeKind) {
        let _ = kind;
    }

    /// Called immediately after the scope named by `kind` ends.
    fn scope_exit(&mut self, kind: &ScopeKind) {
        let _ = kind;
    }
}

/// A [`TraceSink`] that does nothing. The engine's default when no embedder installs a sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        enters: usize,
        exits: usize,
    }

    impl TraceSink for Counting {
        fn scope_enter(&mut self, _kind: &ScopeKind) {
            self.enters += 1;
        }
        fn scope_exit(&mut self, _kind: &ScopeKind) {
            self.exits += 1;
        }
    }

    #[test]
    fn null_sink_accepts_both_calls_without_effect() {
        let mut sink = NullTraceSink;
        sink.scope_enter(&ScopeKind::Update);
        sink.scope_exit(&ScopeKind::Update);
    }

    #[test]
    fn custom_sink_observes_enter_and_exit() {
        let mut sink = Counting::default();
        sink.scope_enter(&ScopeKind::MapperRun {
            dir: DirName::new("/out/"),
        });
        sink.scope_exit(&ScopeKind::MapperRun {
            dir: DirName::new("/out/"),
        });
        assert_eq!(sink.enters, 1);
        assert_eq!(sink.exits, 1);
    }
}
