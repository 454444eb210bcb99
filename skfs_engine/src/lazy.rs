// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lazy directories: entries computed on demand and cached until a dependency changes.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;

use skfs_core::{BaseName, DirName, FileId};

/// Why a [`LazyEntry`]'s cache can or can't be trusted right now.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LazyState {
    /// `cached` matches what `compute` would return right now.
    Clean,
    /// A dependency changed since `cached` was computed; the next read must recompute.
    Dirty,
    /// A read of this key is already on the call stack. Forcing it again means a dependency
    /// cycle: the algorithm returns the entry's last good cache (or an empty value, if there is
    /// none yet) rather than recursing.
    InFlight,
}

/// A lazily computed, cached directory entry.
#[derive(Clone, Debug, Default)]
pub struct LazyEntry {
    /// The last computed value, if this key has been forced at least once.
    pub cached: Option<Vec<FileId>>,
    /// Whether `cached` is trustworthy without recomputing.
    pub state: Option<LazyState>,
}

/// A lazy directory's per-key compute function.
///
/// Receives the key being forced and a [`crate::context::LazyCtx`] through which it reads its
/// dependencies — from this directory, from another lazy directory, or from an eager directory —
/// recording every read so the engine can invalidate this key when any of them change.
///
/// This is `Rc<dyn Fn>`, not `Box<dyn FnMut>`: forcing a key needs a live `&mut Context` for
/// nested reads (cross-directory dependencies go through `Context::force_lazy` /
/// `Context::read_eager_for_lazy`), and a directory's own compute function is one of the things
/// that nested call may need to invoke again recursively (the fib-style self-referential case
/// forces the same directory from inside its own compute closure). A plain `FnMut` can't be
/// called while a `&mut Context` borrow that might re-enter it is live; a clonable,
/// immutably-callable handle can, since cloning the `Rc` never aliases the mutable borrow it
/// closes over at call time — only `Context` itself does, through `LazyCtx`.
pub type ComputeFn = Rc<dyn Fn(&BaseName, &mut crate::context::LazyCtx<'_>) -> Vec<FileId>>;

/// A directory of lazily computed entries.
pub struct LazyDir {
    name: DirName,
    entries: BTreeMap<BaseName, LazyEntry>,
    compute: ComputeFn,
}

impl core::fmt::Debug for LazyDir {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LazyDir")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl LazyDir {
    /// Creates a lazy directory computed by `compute`.
    #[must_use]
    pub fn new(name: DirName, compute: ComputeFn) -> Self {
        Self {
            name,
            entries: BTreeMap::new(),
            compute,
        }
    }

    /// Returns this directory's name.
    #[must_use]
    pub const fn name(&self) -> &DirName {
        &self.name
    }

    /// Returns a cheap clone of this directory's compute function, for `Context::force_lazy` to
    /// invoke without holding a borrow of the directory itself.
    #[must_use]
    pub fn compute_handle(&self) -> ComputeFn {
        Rc::clone(&self.compute)
    }

    /// Returns `key`'s current state, or `None` if it has never been forced.
    #[must_use]
    pub fn state_of(&self, key: &BaseName) -> Option<LazyState> {
        self.entries.get(key).and_then(|e| e.state)
    }

    /// Marks `key` in flight: a force of it is already on the call stack.
    pub fn mark_in_flight(&mut self, key: &BaseName) {
        self.entries.entry(key.clone()).or_default().state = Some(LazyState::InFlight);
    }

    /// Stores a freshly computed value for `key` and marks it clean.
    pub fn store_cache(&mut self, key: BaseName, computed: Vec<FileId>) {
        let entry = self.entries.entry(key).or_default();
        entry.cached = Some(computed);
        entry.state = Some(LazyState::Clean);
    }

    /// Marks `key` dirty, forcing a recompute on its next read.
    ///
    /// A no-op if `key` has never been forced: an entry with no cache is already treated as dirty.
    /// Never downgrades an in-flight entry — a dirty signal can't arrive mid-compute in this
    /// single-threaded engine, but this guard keeps the state machine well-defined regardless.
    pub fn mark_dirty(&mut self, key: &BaseName) {
        if let Some(entry) = self.entries.get_mut(key)
            && entry.state != Some(LazyState::InFlight)
        {
            entry.state = Some(LazyState::Dirty);
        }
    }

    /// Returns `key`'s cached value without forcing a recompute, or `None` if it's never been
    /// forced.
    #[must_use]
    pub fn maybe_get(&self, key: &BaseName) -> Option<&[FileId]> {
        self.entries.get(key).and_then(|e| e.cached.as_deref())
    }

    /// Returns `key`'s cached value, or an empty slice if it's never been forced.
    #[must_use]
    pub fn cached_or_empty(&self, key: &BaseName) -> Vec<FileId> {
        self.maybe_get(key).map(<[FileId]>::to_vec).unwrap_or_default()
    }

    /// Visits every `FileId` currently cached by this directory. Used by GC to compute the
    /// reachable set before compacting the interner.
    pub fn visit_ids(&self, mut visit: impl FnMut(FileId)) {
        for entry in self.entries.values() {
            if let Some(cached) = &entry.cached {
                for id in cached {
                    visit(*id);
                }
            }
        }
    }

    /// Rewrites every cached `FileId` through `remap`. A lazy entry whose cache references an id
    /// `remap` has no entry for is cleared and marked dirty — that can only happen if the cached
    /// value referenced something no live eager entry reaches any more, which means it's stale
    /// anyway.
    pub fn remap_ids(&mut self, remap: &hashbrown::HashMap<FileId, FileId>) {
        for entry in self.entries.values_mut() {
            let Some(cached) = entry.cached.as_mut() else {
                continue;
            };
            let mut all_found = true;
            for id in cached.iter_mut() {
                if let Some(&new_id) = remap.get(id) {
                    *id = new_id;
                } else {
                    all_found = false;
                }
            }
            if !all_found {
                entry.cached = None;
                entry.state = Some(LazyState::Dirty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use skfs_core::File;

    #[test]
    fn unforced_key_computes_then_caches() {
        let mut ctx = Context::new();
        ctx.mkdir_lazy(
            DirName::new("/lazy/"),
            Rc::new(|_key, reader| {
                let id = reader.intern(File::Int(9));
                alloc::vec![id]
            }),
        )
        .unwrap();

        let first = ctx.force_lazy(&DirName::new("/lazy/"), &BaseName::iid(1)).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(*ctx.interner().get(first[0]), File::Int(9));
    }

    #[test]
    fn dirty_key_recomputes_on_next_force() {
        let mut ctx = Context::new();
        ctx.mkdir_lazy(
            DirName::new("/lazy/"),
            Rc::new(|_key, reader| {
                let id = reader.intern(File::Int(1));
                alloc::vec![id]
            }),
        )
        .unwrap();

        ctx.force_lazy(&DirName::new("/lazy/"), &BaseName::iid(1)).unwrap();
        ctx.mark_lazy_dirty(&DirName::new("/lazy/"), &BaseName::iid(1));
        let again = ctx.force_lazy(&DirName::new("/lazy/"), &BaseName::iid(1)).unwrap();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn self_referential_key_does_not_recurse_forever() {
        let mut ctx = Context::new();
        ctx.mkdir_lazy(
            DirName::new("/lazy/"),
            Rc::new(|key, reader| reader.get_lazy(&DirName::new("/lazy/"), key).unwrap_or_default()),
        )
        .unwrap();

        let result = ctx.force_lazy(&DirName::new("/lazy/"), &BaseName::iid(1)).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn fibonacci_recurses_within_the_same_directory_without_conflict() {
        let mut ctx = Context::new();
        let dir = DirName::new("/fib/");
        ctx.mkdir_lazy(
            dir.clone(),
            Rc::new(|key, reader| {
                let Some(n) = key.as_iid() else {
                    return Vec::new();
                };
                let value = if n < 2 {
                    n
                } else {
                    let a = reader
                        .get_lazy(&DirName::new("/fib/"), &BaseName::iid(n - 1))
                        .ok()
                        .and_then(|v| v.first().copied())
                        .map(|id| reader.ctx_interner().get(id).clone());
                    let b = reader
                        .get_lazy(&DirName::new("/fib/"), &BaseName::iid(n - 2))
                        .ok()
                        .and_then(|v| v.first().copied())
                        .map(|id| reader.ctx_interner().get(id).clone());
                    let (File::Int(a), File::Int(b)) = (a.unwrap_or(File::Int(0)), b.unwrap_or(File::Int(0))) else {
                        unreachable!("fib entries are always File::Int")
                    };
                    a + b
                };
                alloc::vec![reader.intern(File::Int(value))]
            }),
        )
        .unwrap();

        let ten = ctx.force_lazy(&dir, &BaseName::iid(10)).unwrap();
        assert_eq!(*ctx.interner().get(ten[0]), File::Int(55));
    }
}
