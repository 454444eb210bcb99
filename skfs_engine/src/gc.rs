// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The copying garbage collector and external-pointer finalizer registry.
//!
//! Collection never discards a live directory entry: it only compacts the shared
//! [`skfs_core::FileInterner`] down to the [`skfs_core::FileId`]s some live entry (eager or
//! lazy-cached) still references, and rewrites every stored id accordingly. A `File::Blob` that
//! doesn't survive — because no live entry referenced it any more — has its registered finalizer
//! invoked exactly once through a [`FinalizerRegistry`], mirroring `ExternalPointer`'s role as a
//! handle to something this collector can't reclaim on its own.
//!
//! A reducer's aggregate needs no special handling here: it's stored as an ordinary entry in its
//! owning directory, so it's reachable (and carried across a collection untouched) by the same
//! walk as every other entry. `Reducer::can_reset` governs whether the driver may rebuild an
//! aggregate from a partial snapshot during replay; it has no bearing on whether a compaction pass
//! here is safe, since compaction never drops a live entry.

use alloc::boxed::Box;
use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};

use skfs_core::{ExternalPointer, File, FileId};

use crate::context::{Context, Dir};

/// A finalizer invoked exactly once when its registered `ExternalPointer` fails to survive a
/// collection.
pub type Finalizer = Box<dyn FnMut(u64)>;

/// Tracks the finalizer registered for each live `ExternalPointer`.
///
/// Registration is the embedder's responsibility: whenever a mapper or lazy compute produces a
/// `File::Blob`, whatever allocated the pointee should register a finalizer here before the value
/// is written into a directory, so a later collection that drops it can reclaim it.
#[derive(Default)]
pub struct FinalizerRegistry {
    finalizers: HashMap<u64, Finalizer>,
}

impl core::fmt::Debug for FinalizerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FinalizerRegistry")
            .field("registered", &self.finalizers.len())
            .finish()
    }
}

impl FinalizerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `finalizer` to run if `ptr` fails to survive a future collection.
    ///
    /// Replaces any finalizer already registered for the same raw handle.
    pub fn register(&mut self, ptr: ExternalPointer, finalizer: Finalizer) {
        self.finalizers.insert(ptr.raw(), finalizer);
    }

    /// Returns the number of pointers with a live registration.
    #[must_use]
    pub fn len(&self) -> usize {
        self.finalizers.len()
    }

    /// Returns `true` if no pointer is currently registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.finalizers.is_empty()
    }

    fn finalize(&mut self, raw: u64) {
        if let Some(mut finalizer) = self.finalizers.remove(&raw) {
            finalizer(raw);
        }
    }
}

/// Summary of one collection cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Distinct `File`s that survived compaction.
    pub survivors: usize,
    /// Distinct `File`s dropped because no live entry referenced them.
    pub collected: usize,
    /// `ExternalPointer`s whose finalizer ran because they didn't survive.
    pub finalized: usize,
}

/// Runs one copying collection over `ctx`.
///
/// Computes the reachable `FileId` set from every live directory entry, compacts `ctx`'s interner
/// down to just that set, rewrites every entry's stored ids, and finalizes any `File::Blob` that
/// didn't survive (an `ExternalPointer(42, freeFn)` that is replaced across a GC cycle
/// calls `freeFn(42)` exactly once).
///
/// A context with nothing unreachable collects nothing and finalizes nothing — running this with
/// no pending updates is a no-op on observable state.
pub fn collect(ctx: &mut Context, finalizers: &mut FinalizerRegistry) -> GcStats {
    let mut reachable: HashSet<FileId> = HashSet::new();
    for (_, dir) in ctx.dirs_mut() {
        match dir {
            Dir::Eager(eager) => eager.visit_ids(|id| {
                reachable.insert(id);
            }),
            Dir::Lazy(lazy) => lazy.visit_ids(|id| {
                reachable.insert(id);
            }),
            Dir::Deleted { .. } => {}
        }
    }

    let before = ctx.interner().len();
    let blobs_before = collect_blobs(ctx);

    let remap = ctx.interner_mut().compact(|id| reachable.contains(&id));

    let mut finalized = 0;
    for (old_id, ptr) in blobs_before {
        if !remap.contains_key(&old_id) {
            finalizers.finalize(ptr.raw());
            finalized += 1;
        }
    }

    for (_, dir) in ctx.dirs_mut() {
        match dir {
            Dir::Eager(eager) => eager.remap_ids(&remap),
            Dir::Lazy(lazy) => lazy.remap_ids(&remap),
            Dir::Deleted { .. } => {}
        }
    }

    let survivors = ctx.interner().len();
    GcStats {
        survivors,
        collected: before - survivors,
        finalized,
    }
}

fn collect_blobs(ctx: &Context) -> Vec<(FileId, ExternalPointer)> {
    ctx.interner()
        .iter()
        .filter_map(|(id, file)| match file {
            File::Blob(ptr) => Some((id, *ptr)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicUsize, Ordering};

    use skfs_core::{BaseName, DirName};

    #[test]
    fn no_pending_updates_collects_and_finalizes_nothing() {
        let mut ctx = Context::new();
        ctx.mkdir(DirName::new("/in/"), true).unwrap();
        let id = ctx.interner_mut().intern(File::Int(1));
        ctx.write_array(&DirName::new("/in/"), BaseName::iid(1), alloc::vec![id]).unwrap();

        let mut finalizers = FinalizerRegistry::new();
        let stats = collect(&mut ctx, &mut finalizers);

        assert_eq!(stats.collected, 0);
        assert_eq!(stats.finalized, 0);
        assert_eq!(stats.survivors, 1);
    }

    #[test]
    fn unreferenced_blob_is_finalized_exactly_once() {
        let mut ctx = Context::new();
        ctx.mkdir(DirName::new("/in/"), true).unwrap();

        let ptr = ExternalPointer::from_raw(42);
        let dropped_id = ctx.interner_mut().intern(File::Blob(ptr));
        // Write it once, then overwrite the key so nothing reaches `dropped_id` any more.
        ctx.write_array(&DirName::new("/in/"), BaseName::iid(1), alloc::vec![dropped_id]).unwrap();
        let replacement = ctx.interner_mut().intern(File::Int(0));
        ctx.write_array(&DirName::new("/in/"), BaseName::iid(1), alloc::vec![replacement]).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let mut finalizers = FinalizerRegistry::new();
        finalizers.register(
            ptr,
            Box::new(move |raw| {
                assert_eq!(raw, 42);
                counted.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let stats = collect(&mut ctx, &mut finalizers);

        assert_eq!(stats.finalized, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(finalizers.is_empty());
    }

    #[test]
    fn collection_preserves_reachable_entries_and_remaps_their_ids() {
        let mut ctx = Context::new();
        ctx.mkdir(DirName::new("/in/"), true).unwrap();
        // Interned but never written anywhere: unreachable, should be dropped.
        ctx.interner_mut().intern(File::Int(0));
        let live = ctx.interner_mut().intern(File::Int(7));
        ctx.write_array(&DirName::new("/in/"), BaseName::iid(1), alloc::vec![live]).unwrap();

        let stats = collect(&mut ctx, &mut FinalizerRegistry::new());
        assert_eq!(stats.collected, 1);
        assert_eq!(stats.survivors, 1);

        let dir = ctx.maybe_get_eager_dir(&DirName::new("/in/")).unwrap();
        let entry = dir.entry(&BaseName::iid(1)).unwrap();
        assert_eq!(entry.values.len(), 1);
        assert_eq!(*ctx.interner().get(entry.values[0]), File::Int(7));
    }
}
