// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental aggregation over an eager directory's entries.

use alloc::vec;
use alloc::vec::Vec;

use skfs_core::{File, FileId, FileInterner};

/// One key's old and new value, as seen by a reducer during a write batch.
#[derive(Clone, Debug)]
pub struct Delta {
    /// Values the key held before this batch (empty if the key is new).
    pub removed: Vec<FileId>,
    /// Values the key holds after this batch (empty if the key was removed).
    pub added: Vec<FileId>,
}

/// Maintains one or more aggregate entries derived from an eager directory's per-key entries.
///
/// `update` is given every delta observed during a single write batch at once: a reducer never
/// sees more than one aggregated call per batch, so it does not need to worry about interleaving
/// with a key's own in-batch history.
///
/// Implementations must make `init` and repeated `update` calls produce the same result for the
/// same final state (commutativity of the fold), since the engine may call either one depending on
/// whether a fast incremental path is available.
///
/// Both entry points receive the directory's [`FileInterner`] so they can inspect the actual
/// `File` payload behind each [`FileId`], and intern whatever new aggregate value they compute.
pub trait Reducer {
    /// Computes the aggregate from a full, unordered scan of the directory's current values.
    fn init(&mut self, values: &[&[FileId]], interner: &mut FileInterner) -> Vec<FileId>;

    /// Applies a batch of deltas to `state`, returning the new aggregate.
    ///
    /// Returns `None` if the reducer cannot incrementally maintain the aggregate from this delta
    /// set, in which case the engine falls back to [`Reducer::init`].
    fn update(
        &mut self,
        state: &[FileId],
        deltas: &[Delta],
        interner: &mut FileInterner,
    ) -> Option<Vec<FileId>>;

    /// Whether [`Reducer::init`] is safe to call with partial data during GC replay.
    ///
    /// Reducers that answer `false` are evacuated whole by the collector instead of being
    /// recomputed from a partial scan.
    fn can_reset(&self) -> bool {
        true
    }
}

/// A reducer that sums `File::Int` values, ignoring any other `File` variant.
///
/// This is the reference reducer used by the counter example and conformance tests: it exercises
/// both `init` (full rescan) and `update` (incremental delta) paths against the same invariant.
#[derive(Debug, Default)]
pub struct SumReducer;

impl SumReducer {
    fn as_int(file: &File) -> i64 {
        match file {
            File::Int(n) => *n,
            _ => 0,
        }
    }

    fn sum(values: &[FileId], interner: &FileInterner) -> i64 {
        values
            .iter()
            .map(|id| Self::as_int(interner.get(*id)))
            .sum()
    }
}

impl Reducer for SumReducer {
    fn init(&mut self, values: &[&[FileId]], interner: &mut FileInterner) -> Vec<FileId> {
        let total: i64 = values.iter().map(|v| Self::sum(v, interner)).sum();
        vec![interner.intern(File::Int(total))]
    }

    fn update(
        &mut self,
        state: &[FileId],
        deltas: &[Delta],
        interner: &mut FileInterner,
    ) -> Option<Vec<FileId>> {
        let mut total = state.first().map_or(0, |id| Self::as_int(interner.get(*id)));
        for delta in deltas {
            total -= Self::sum(&delta.removed, interner);
            total += Self::sum(&delta.added, interner);
        }
        Some(vec![interner.intern(File::Int(total))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_reducer_init_matches_incremental_update() {
        let mut interner = FileInterner::new();
        let a = vec![interner.intern(File::Int(3))];
        let b = vec![interner.intern(File::Int(4))];

        let mut reducer = SumReducer;
        let via_init = reducer.init(&[&a, &b], &mut interner);
        assert_eq!(interner.get(via_init[0]), &File::Int(7));

        let mut reducer = SumReducer;
        let state = vec![interner.intern(File::Int(0))];
        let deltas = [
            Delta {
                removed: Vec::new(),
                added: a.clone(),
            },
            Delta {
                removed: Vec::new(),
                added: b.clone(),
            },
        ];
        let via_update = reducer.update(&state, &deltas, &mut interner).unwrap();
        assert_eq!(interner.get(via_update[0]), &File::Int(7));
    }

    #[test]
    fn sum_reducer_update_applies_removals() {
        let mut interner = FileInterner::new();
        let old = vec![interner.intern(File::Int(10))];
        let new = vec![interner.intern(File::Int(2))];
        let state = vec![interner.intern(File::Int(10))];

        let mut reducer = SumReducer;
        let deltas = [Delta {
            removed: old,
            added: new,
        }];
        let result = reducer.update(&state, &deltas, &mut interner).unwrap();
        assert_eq!(interner.get(result[0]), &File::Int(2));
    }
}
