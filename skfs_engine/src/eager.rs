// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Eager directories: materialized entries written by producers.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use skfs_core::{BaseName, DirName, FileId, FileInterner, Path, Time};

use crate::reducer::{Delta, Reducer};

/// A materialized directory entry.
///
/// `producers` holds, for every path that has contributed a sub-slice of `values` via
/// [`EagerDir::write_entry_at`], that producer's own slice and the time it was last written — this
/// is what lets multiple producers share one key without clobbering each other's contribution.
/// `values` is always the concatenation of `producers`' slices in ascending producer-path order
/// (the canonical ordering policy).
#[derive(Clone, Debug, Default)]
pub struct Entry {
    /// The entry's current value: the merge of all producers' slices, in path order.
    pub values: Vec<FileId>,
    /// The time this entry (or any of its producer slices) was last written.
    pub write_time: Time,
    /// Per-producer contribution, ordered by producer path so the merged `values` is stable.
    pub producers: BTreeMap<Path, (Vec<FileId>, Time)>,
}

impl Entry {
    fn tombstone(time: Time) -> Self {
        Self {
            values: Vec::new(),
            write_time: time,
            producers: BTreeMap::new(),
        }
    }

    fn remerge(&mut self) {
        self.values = self
            .producers
            .values()
            .flat_map(|(values, _)| values.iter().copied())
            .collect();
    }
}

/// A mapper rerun for one dirty source key.
///
/// Receives the key that changed and the current values read from the directory's `source`, and
/// writes zero or more output values through `writer`. Mappers are re-run one source key at a
/// time: a mapper that needs the whole source directory should read it via
/// [`EagerDir::get_array_raw`] from within the closure rather than relying on `sources`.
pub type MapperFn = Box<dyn FnMut(&mut MapperWriter<'_>, &BaseName, &[FileId])>;

/// The write surface handed to a mapper closure.
///
/// Every write performed through this type is tagged with the mapper's own producer path
/// (`source dir + source key`), so a later recomputation of the same key can cleanly replace only
/// that producer's contribution. Also carries the shared interner, since a mapper that aggregates
/// or transforms its input (a sum, a string join) needs to intern values the source directory
/// never held.
pub struct MapperWriter<'a> {
    out: &'a mut EagerDir,
    producer: Path,
    time: Time,
    interner: &'a mut FileInterner,
}

impl<'a> MapperWriter<'a> {
    /// Writes `values` to `key` in the mapper's output directory, tagged with the current producer
    /// path.
    pub fn write(&mut self, key: BaseName, values: Vec<FileId>) {
        self.out.write_entry_at(&key, &self.producer, values, self.time);
    }

    /// Provides read access to the shared interner.
    #[must_use]
    pub fn interner(&self) -> &FileInterner {
        self.interner
    }

    /// Provides mutable access to the shared interner, for interning values the mapper computes.
    pub fn interner_mut(&mut self) -> &mut FileInterner {
        self.interner
    }
}

/// An eager directory: `Ord.Map<BaseName, Entry>`, optionally fed by a mapper over a source
/// directory and optionally aggregated by a [`Reducer`].
pub struct EagerDir {
    name: DirName,
    /// Input directories are written to directly by callers; non-input directories are only
    /// ever written by their mapper.
    is_input: bool,
    entries: BTreeMap<BaseName, Entry>,
    mapper: Option<MapperFn>,
    source: Option<DirName>,
    reducer: Option<(BaseName, alloc::boxed::Box<dyn Reducer>)>,
}

impl core::fmt::Debug for EagerDir {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EagerDir")
            .field("name", &self.name)
            .field("is_input", &self.is_input)
            .field("entries", &self.entries.len())
            .field("has_mapper", &self.mapper.is_some())
            .field("source", &self.source)
            .field("has_reducer", &self.reducer.is_some())
            .finish()
    }
}

impl EagerDir {
    /// Creates an empty eager directory.
    #[must_use]
    pub fn new(name: DirName, is_input: bool) -> Self {
        Self {
            name,
            is_input,
            entries: BTreeMap::new(),
            mapper: None,
            source: None,
            reducer: None,
        }
    }

    /// Registers `mapper` to be re-run, one source key at a time, whenever `source` reports that
    /// key dirty. Mirrors `contextWriterKeyValues`: this directory becomes derived, not an input.
    pub fn set_mapper(&mut self, source: DirName, mapper: MapperFn) {
        self.source = Some(source);
        self.mapper = Some(mapper);
        self.is_input = false;
    }

    /// Registers a [`Reducer`] whose aggregate is stored at `output_key` within this directory.
    pub fn set_reducer(&mut self, output_key: BaseName, reducer: alloc::boxed::Box<dyn Reducer>) {
        self.reducer = Some((output_key, reducer));
    }

    /// Returns this directory's name.
    #[must_use]
    pub const fn name(&self) -> &DirName {
        &self.name
    }

    /// Returns the directory this directory's mapper reads from, if any.
    #[must_use]
    pub const fn source(&self) -> Option<&DirName> {
        self.source.as_ref()
    }

    /// Returns `true` if this directory is a plain input (never written by a mapper).
    #[must_use]
    pub const fn is_input(&self) -> bool {
        self.is_input
    }

    /// Returns an ordered view of the directory's keys.
    pub fn keys(&self) -> impl Iterator<Item = &BaseName> {
        self.entries.keys()
    }

    /// Reads `key`'s current values without recording a dependency.
    ///
    /// Used by mappers that already depend on their input directory holistically rather than
    /// key-by-key.
    #[must_use]
    pub fn get_array_raw(&self, key: &BaseName) -> &[FileId] {
        self.entries.get(key).map_or(&[], |e| e.values.as_slice())
    }

    /// Returns the full entry for `key`, if it has ever been written (tombstones included — check
    /// `values.is_empty()` to distinguish a removed key from one that was never written).
    #[must_use]
    pub fn entry(&self, key: &BaseName) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Replaces `key`'s entry wholesale.
    ///
    /// Returns `true` if the write changed the entry's value (by `FileId` identity — since
    /// `FileId` already implies structural equality, comparing ids is enough to detect a no-op
    /// write, per the edge-case policy).
    pub fn write_array(&mut self, key: BaseName, values: Vec<FileId>, time: Time) -> bool {
        let changed = self
            .entries
            .get(&key)
            .is_none_or(|e| e.values != values);
        if changed {
            self.entries.insert(
                key,
                Entry {
                    values,
                    write_time: time,
                    producers: BTreeMap::new(),
                },
            );
        }
        changed
    }

    /// Writes `values` as `producer`'s contribution to `key`, merging with any other producers'
    /// slices already recorded for this key in ascending producer-path order.
    pub fn write_entry_at(
        &mut self,
        key: &BaseName,
        producer: &Path,
        values: Vec<FileId>,
        time: Time,
    ) -> bool {
        let entry = self.entries.entry(key.clone()).or_default();
        let previous = entry.producers.get(producer).map(|(v, _)| v.clone());
        let unchanged_slice = previous.as_deref() == Some(values.as_slice());
        entry.producers.insert(producer.clone(), (values, time));
        entry.remerge();
        entry.write_time = time;
        !unchanged_slice
    }

    /// Replaces `key`'s entry with a tombstone. A no-op if the key doesn't exist.
    pub fn remove(&mut self, key: &BaseName, time: Time) -> bool {
        if let Some(entry) = self.entries.get_mut(key) {
            if entry.values.is_empty() {
                return false;
            }
            *entry = Entry::tombstone(time);
            true
        } else {
            false
        }
    }

    /// Streams `(key, values)` pairs as one write batch: every change is stamped with the same
    /// `time`, and (conceptually) dirty propagation for the whole batch happens once, not once per
    /// key — see `Context::write_array_many`, which drives this and then fires the directory's
    /// reducer exactly once over the whole batch's deltas.
    pub fn write_array_many(
        &mut self,
        writes: impl IntoIterator<Item = (BaseName, Vec<FileId>)>,
        time: Time,
    ) -> Vec<(BaseName, Delta)> {
        let mut deltas = Vec::new();
        for (key, values) in writes {
            let removed = self.entries.get(&key).map(|e| e.values.clone()).unwrap_or_default();
            let changed = self.write_array(key.clone(), values.clone(), time);
            if changed {
                deltas.push((key, Delta {
                    removed,
                    added: values,
                }));
            }
        }
        deltas
    }

    /// Reinstalls `entry` verbatim under `key`, bypassing change detection and dirty propagation.
    ///
    /// Used by persistence to restore a directory's previously committed entries without
    /// re-triggering the recomputation that produced them.
    pub fn restore_entry(&mut self, key: BaseName, entry: Entry) {
        self.entries.insert(key, entry);
    }

    /// Returns the registered reducer's output key and a mutable reference to it, if any.
    pub fn reducer_mut(&mut self) -> Option<(&BaseName, &mut alloc::boxed::Box<dyn Reducer>)> {
        self.reducer.as_mut().map(|(k, r)| (&*k, r))
    }

    /// Applies `deltas` through the directory's reducer (if any), writing the new aggregate at the
    /// reducer's output key.
    pub fn apply_reducer(
        &mut self,
        deltas: &[Delta],
        interner: &mut skfs_core::FileInterner,
        time: Time,
    ) {
        let Some((output_key, reducer)) = self.reducer.as_mut() else {
            return;
        };
        let current = self
            .entries
            .get(output_key)
            .map(|e| e.values.clone())
            .unwrap_or_default();

        let new_values = match reducer.update(&current, deltas, interner) {
            Some(v) => v,
            None => {
                let all_values: Vec<&[FileId]> = self
                    .entries
                    .iter()
                    .filter(|(k, _)| *k != &*output_key)
                    .map(|(_, e)| e.values.as_slice())
                    .collect();
                reducer.init(&all_values, interner)
            }
        };

        let output_key = output_key.clone();
        self.write_array(output_key, new_values, time);
    }

    /// Visits every `FileId` currently stored in this directory's entries (merged values and each
    /// producer's own slice). Used by GC to compute the reachable set before compacting the
    /// interner.
    pub fn visit_ids(&self, mut visit: impl FnMut(FileId)) {
        for entry in self.entries.values() {
            for id in &entry.values {
                visit(*id);
            }
            for (slice, _) in entry.producers.values() {
                for id in slice {
                    visit(*id);
                }
            }
        }
    }

    /// Rewrites every stored `FileId` through `remap`, dropping ids `remap` has no entry for (they
    /// were proven unreachable by the same GC pass that built `remap`).
    pub fn remap_ids(&mut self, remap: &hashbrown::HashMap<FileId, FileId>) {
        for entry in self.entries.values_mut() {
            entry.values.retain_mut(|id| {
                let Some(&new_id) = remap.get(id) else {
                    return false;
                };
                *id = new_id;
                true
            });
            for (slice, _) in entry.producers.values_mut() {
                slice.retain_mut(|id| {
                    let Some(&new_id) = remap.get(id) else {
                        return false;
                    };
                    *id = new_id;
                    true
                });
            }
        }
    }

    /// Reruns this directory's mapper for `key`, given the current values read from `source`.
    ///
    /// Returns the output key's freshly written values, or `None` if this directory has no mapper.
    pub fn run_mapper_for_key(
        &mut self,
        key: &BaseName,
        source_values: &[FileId],
        producer: Path,
        time: Time,
        interner: &mut FileInterner,
    ) -> Option<()> {
        let mut mapper = self.mapper.take()?;
        {
            let mut writer = MapperWriter {
                out: self,
                producer,
                time,
                interner,
            };
            mapper(&mut writer, key, source_values);
        }
        self.mapper = Some(mapper);
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skfs_core::{File, FileInterner};

    #[test]
    fn write_array_is_a_no_op_for_identical_interned_values() {
        let mut interner = FileInterner::new();
        let id = interner.intern(File::Int(1));
        let mut dir = EagerDir::new(DirName::new("/in/"), true);

        assert!(dir.write_array(BaseName::iid(1), alloc::vec![id], Time::ZERO.next()));
        assert!(!dir.write_array(BaseName::iid(1), alloc::vec![id], Time::ZERO.next().next()));
    }

    #[test]
    fn remove_of_missing_key_is_a_no_op() {
        let mut dir = EagerDir::new(DirName::new("/in/"), true);
        assert!(!dir.remove(&BaseName::iid(1), Time::ZERO.next()));
    }

    #[test]
    fn write_array_many_reports_only_changed_keys() {
        let mut interner = FileInterner::new();
        let a = interner.intern(File::Int(1));
        let mut dir = EagerDir::new(DirName::new("/in/"), true);
        dir.write_array(BaseName::iid(1), alloc::vec![a], Time::ZERO.next());

        let deltas = dir.write_array_many(
            [
                (BaseName::iid(1), alloc::vec![a]),
                (BaseName::iid(2), alloc::vec![a]),
            ],
            Time::ZERO.next().next(),
        );
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].0, BaseName::iid(2));
    }
}
