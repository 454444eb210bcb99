// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking integration built on `understory_dirty`.
//!
//! This is a thin adapter that interns owned [`Path`] values into the `Copy` ids
//! `understory_dirty` requires, and maintains *two* independent trackers:
//!
//! - `eager`: the dependency DAG between eager-directory entries and the mapper outputs derived
//!   from them. This DAG must stay acyclic: `CycleHandling::Error` rejects
//!   an edge that would close a cycle.
//! - `lazy`: the dependency graph between lazy entries. Lazy compute functions are allowed to read
//!   each other in a cycle; `CycleHandling::Allow` skips cycle detection entirely, and
//!   `LazyDir` tolerates the resulting cycles itself via an `inFlight` guard rather than relying on
//!   the graph to reject them.
//!
//! Both trackers share one [`Interner`] so the same [`Path`] always maps to the same [`DirtyKey`]
//! regardless of which tracker it's used with.

use alloc::vec::Vec;

use understory_dirty::intern::Interner;
use understory_dirty::{Channel, CycleHandling, DirtyTracker, InternId, LazyPolicy};

use skfs_core::Path;

const EAGER_CHANNEL: Channel = Channel::new(0);
const LAZY_CHANNEL: Channel = Channel::new(0);

/// Interned key id for dirty-tracking.
pub type DirtyKey = InternId;

/// Which dependency graph a [`DirtyKey`] operation applies to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DepChannel {
    /// The acyclic DAG of eager mapper derivations.
    Eager,
    /// The cycle-tolerant graph of lazy dependencies.
    Lazy,
}

/// Dirty engine keyed by interned [`Path`] values, split into an eager (acyclic) and a lazy
/// (cycle-tolerant) dependency graph.
#[derive(Debug, Default)]
pub struct DirtyEngine {
    eager: DirtyTracker<DirtyKey>,
    lazy: DirtyTracker<DirtyKey>,
    keys: Interner<Path>,
}

impl DirtyEngine {
    /// Creates a new, empty dirty engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            eager: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            lazy: DirtyTracker::with_cycle_handling(CycleHandling::Allow),
            keys: Interner::new(),
        }
    }

    fn tracker(&self, channel: DepChannel) -> &DirtyTracker<DirtyKey> {
        match channel {
            DepChannel::Eager => &self.eager,
            DepChannel::Lazy => &self.lazy,
        }
    }

    fn tracker_mut(&mut self, channel: DepChannel) -> &mut DirtyTracker<DirtyKey> {
        match channel {
            DepChannel::Eager => &mut self.eager,
            DepChannel::Lazy => &mut self.lazy,
        }
    }

    const fn raw_channel(channel: DepChannel) -> Channel {
        match channel {
            DepChannel::Eager => EAGER_CHANNEL,
            DepChannel::Lazy => LAZY_CHANNEL,
        }
    }

    /// Interns `path`, returning its compact id.
    ///
    /// Returns the existing id if `path` was interned before.
    pub fn intern(&mut self, path: Path) -> DirtyKey {
        self.keys.intern(path)
    }

    /// Returns the path behind `id`, if it was interned by this engine.
    #[must_use]
    pub fn path(&self, id: DirtyKey) -> Option<&Path> {
        self.keys.get(id)
    }

    /// Marks `key` dirty on `channel` (lazy propagation: expanded at drain time).
    pub fn mark_dirty(&mut self, key: DirtyKey, channel: DepChannel) {
        let raw = Self::raw_channel(channel);
        self.tracker_mut(channel).mark_with(key, raw, &LazyPolicy);
    }

    /// Drains dirty work on `channel` in deterministic (topological) order.
    pub fn drain(&mut self, channel: DepChannel) -> Vec<(DirtyKey, Path)> {
        let raw = Self::raw_channel(channel);
        let keys = &self.keys;
        self.tracker_mut(channel)
            .drain(raw)
            .affected()
            .deterministic()
            .run()
            .filter_map(move |id| keys.get(id).map(|p| (id, p.clone())))
            .collect()
    }

    /// Replaces `from`'s dependency set on `channel` with `to`.
    ///
    /// On the eager channel this rejects edges that would introduce a cycle, leaving the previous
    /// dependency set in place if so.
    pub fn set_dependencies(
        &mut self,
        from: DirtyKey,
        to: impl IntoIterator<Item = DirtyKey>,
        channel: DepChannel,
    ) {
        let raw = Self::raw_channel(channel);
        let cycle_handling = match channel {
            DepChannel::Eager => CycleHandling::Error,
            DepChannel::Lazy => CycleHandling::Allow,
        };
        let _ = self
            .tracker_mut(channel)
            .graph_mut()
            .replace_dependencies(from, raw, to, cycle_handling);
    }

    /// Adds a single dependency edge `from -> to` on `channel`.
    pub fn add_dependency(&mut self, from: DirtyKey, to: DirtyKey, channel: DepChannel) {
        let raw = Self::raw_channel(channel);
        let _ = self.tracker_mut(channel).add_dependency(from, to, raw);
    }

    /// Returns the direct dependencies of `key` on `channel`.
    pub fn dependencies(&self, key: DirtyKey, channel: DepChannel) -> Vec<DirtyKey> {
        let raw = Self::raw_channel(channel);
        self.tracker(channel)
            .graph()
            .dependencies(key, raw)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skfs_core::{BaseName, DirName};

    fn p(dir: &str, key: i64) -> Path {
        Path::new(DirName::new(dir), BaseName::iid(key))
    }

    #[test]
    fn dirty_propagates_to_dependents_on_the_eager_channel() {
        let mut e = DirtyEngine::new();
        let in_key = e.intern(p("/in/", 1));
        let out_key = e.intern(p("/out/", 1));

        e.set_dependencies(out_key, [in_key], DepChannel::Eager);
        e.mark_dirty(in_key, DepChannel::Eager);

        let order: Vec<_> = e.drain(DepChannel::Eager).into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, alloc::vec![in_key, out_key]);
    }

    #[test]
    fn lazy_channel_tolerates_cycles() {
        let mut e = DirtyEngine::new();
        let a = e.intern(p("/lazy/", 1));
        let b = e.intern(p("/lazy/", 2));

        e.set_dependencies(a, [b], DepChannel::Lazy);
        e.set_dependencies(b, [a], DepChannel::Lazy);

        e.mark_dirty(a, DepChannel::Lazy);
        let drained: Vec<_> = e.drain(DepChannel::Lazy).into_iter().map(|(id, _)| id).collect();
        assert!(drained.contains(&a));
    }
}
