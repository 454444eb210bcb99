// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use skfs_engine::trace::ScopeKind;
use std::string::String;

/// Optional label resolver for profiling scopes.
///
/// Return `None` to fall back to the default directory-name-based label.
pub trait LabelResolver {
    /// Resolve a label for a scope. `kind` is the scope the engine is about to enter or has just
    /// exited.
    fn scope_label(&mut self, _kind: &ScopeKind) -> Option<String> {
        None
    }
}

/// Default resolver that keeps the directory-name-based labels the engine already provides.
#[derive(Default, Debug)]
pub struct DefaultLabelResolver;

impl LabelResolver for DefaultLabelResolver {}

pub(crate) fn default_label(kind: &ScopeKind) -> String {
    match kind {
        ScopeKind::Update => "update".into(),
        ScopeKind::MapperRun { dir } => format!("mapper:{dir}"),
    }
}
