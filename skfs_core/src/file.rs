// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The value type stored in directory entries, and its interner.

use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// A handle to an out-of-line, host-managed allocation.
///
/// `File::Blob` carries one of these instead of raw bytes when the payload is large enough that
/// copying it into the value arena on every write would be wasteful, or when its lifetime is
/// managed by something other than the arena's copying collector (an open file, a native buffer
/// handed in from `skfs_lang`'s host bindings, etc).
///
/// The handle itself is a plain opaque id: the finalizer that actually reclaims whatever it points
/// at lives in `skfs_engine::gc`'s finalizer registry, not on this type, so that `File` stays
/// `no_std`-clean (a boxed closure would force every build of this crate to carry `alloc`'s heap
/// vtable machinery even when persistence/GC is compiled out).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExternalPointer(u64);

impl ExternalPointer {
    /// Wraps a raw handle value.
    #[must_use]
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[must_use]
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A value stored in a directory entry.
///
/// `File` is a small closed union, not an open/extensible value type: every variant is something
/// the engine itself needs to reason about (equality for memoization, size for GC accounting), so
/// adding a new kind of payload means adding a variant here rather than reaching for a generic
/// `Box<dyn Any>`.
#[derive(Clone, Debug, PartialEq)]
pub enum File {
    /// `()`.
    Unit,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    ///
    /// Note this makes `File` only `PartialEq`, not `Eq`: `FileInterner` hashes and compares by
    /// bit pattern (see `file_hash`/`file_eq` below), so `NaN` values still intern consistently
    /// even though `NaN != NaN` under IEEE equality.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Handle to an out-of-line allocation.
    Blob(ExternalPointer),
}

impl File {
    /// Returns a stable discriminant used for hashing and arena tagging.
    #[must_use]
    const fn tag(&self) -> u8 {
        match self {
            Self::Unit => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Float(_) => 3,
            Self::Str(_) => 4,
            Self::Bytes(_) => 5,
            Self::Blob(_) => 6,
        }
    }

    fn structural_hash(&self) -> u64 {
        use core::hash::{BuildHasher, Hash, Hasher};
        let mut state = hashbrown::DefaultHashBuilder::default().build_hasher();
        self.tag().hash(&mut state);
        match self {
            Self::Unit => {}
            Self::Bool(b) => b.hash(&mut state),
            Self::Int(i) => i.hash(&mut state),
            Self::Float(f) => f.to_bits().hash(&mut state),
            Self::Str(s) => s.hash(&mut state),
            Self::Bytes(b) => b.hash(&mut state),
            Self::Blob(p) => p.hash(&mut state),
        }
        state.finish()
    }

    /// Structural equality that treats `NaN == NaN`, matching `structural_hash`.
    #[must_use]
    fn structural_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            _ => false,
        }
    }
}

/// An interned `File` id.
///
/// Two `FileId`s compare equal if and only if the underlying `File` values are structurally equal:
/// identity implies equality, and — because `FileInterner` never hands out a second id for a value
/// already seen — equality implies identity too.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileId(u32);

impl FileId {
    #[must_use]
    #[inline]
    const fn from_index(index: usize) -> Self {
        #[expect(clippy::cast_possible_truncation, reason = "interner is capped well under u32::MAX")]
        Self(index as u32)
    }

    #[must_use]
    #[inline]
    const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Caches `File` values behind a structural-equality-implies-identity id.
///
/// Mappers and lazy thunks compare their new output against the previous `FileId` for the same
/// path rather than the `File` value itself (`EagerDir`/`LazyDir` only re-propagate dirtiness when
/// the interned id changes), which is what lets "recomputed but produced the same answer" stop
/// propagation early.
#[derive(Debug, Default)]
pub struct FileInterner {
    values: Vec<File>,
    by_hash: HashMap<u64, Vec<FileId>>,
}

impl FileInterner {
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            by_hash: HashMap::new(),
        }
    }

    /// Interns `file`, returning an existing id if an equal value was already interned.
    pub fn intern(&mut self, file: File) -> FileId {
        let hash = file.structural_hash();
        if let Some(candidates) = self.by_hash.get(&hash) {
            for &id in candidates {
                if self.values[id.index()].structural_eq(&file) {
                    return id;
                }
            }
        }
        let id = FileId::from_index(self.values.len());
        self.values.push(file);
        self.by_hash.entry(hash).or_default().push(id);
        id
    }

    /// Looks up the value behind an id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this interner.
    #[must_use]
    pub fn get(&self, id: FileId) -> &File {
        &self.values[id.index()]
    }

    /// Returns the number of distinct values currently interned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no values have been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over every currently interned id alongside its value, in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (FileId, &File)> {
        self.values.iter().enumerate().map(|(index, file)| (FileId::from_index(index), file))
    }

    /// Rebuilds this interner keeping only the ids for which `reachable` returns `true`,
    /// compacting the survivors to a dense `0..n` range in their original relative order.
    ///
    /// Used by `skfs_engine::gc`'s copying collector. Returns a map from each surviving old id to
    /// its new id; an id for which `reachable` returned `false` is dropped and must not be looked
    /// up afterward.
    pub fn compact(&mut self, mut reachable: impl FnMut(FileId) -> bool) -> HashMap<FileId, FileId> {
        let mut remap = HashMap::new();
        let mut new_values = Vec::new();
        let mut new_by_hash: HashMap<u64, Vec<FileId>> = HashMap::new();
        for (index, value) in self.values.drain(..).enumerate() {
            let old_id = FileId::from_index(index);
            if !reachable(old_id) {
                continue;
            }
            let new_id = FileId::from_index(new_values.len());
            let hash = value.structural_hash();
            new_by_hash.entry(hash).or_default().push(new_id);
            new_values.push(value);
            remap.insert(old_id, new_id);
        }
        self.values = new_values;
        self.by_hash = new_by_hash;
        remap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn equal_values_intern_to_the_same_id() {
        let mut interner = FileInterner::new();
        let a = interner.intern(File::Str("hi".to_string()));
        let b = interner.intern(File::Str("hi".to_string()));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_values_intern_to_distinct_ids() {
        let mut interner = FileInterner::new();
        let a = interner.intern(File::Int(1));
        let b = interner.intern(File::Int(2));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_collisions_across_variants_do_not_merge_values() {
        let mut interner = FileInterner::new();
        let a = interner.intern(File::Int(0));
        let b = interner.intern(File::Bool(false));
        assert_ne!(a, b);
        assert_eq!(*interner.get(a), File::Int(0));
        assert_eq!(*interner.get(b), File::Bool(false));
    }

    #[test]
    fn nan_floats_intern_consistently() {
        let mut interner = FileInterner::new();
        let a = interner.intern(File::Float(f64::NAN));
        let b = interner.intern(File::Float(f64::NAN));
        assert_eq!(a, b);
    }

    #[test]
    fn compact_drops_unreachable_and_remaps_survivors() {
        let mut interner = FileInterner::new();
        let a = interner.intern(File::Int(1));
        let b = interner.intern(File::Int(2));
        let c = interner.intern(File::Int(3));

        let remap = interner.compact(|id| id == a || id == c);

        assert_eq!(interner.len(), 2);
        assert_eq!(*interner.get(remap[&a]), File::Int(1));
        assert_eq!(*interner.get(remap[&c]), File::Int(3));
        assert!(!remap.contains_key(&b));
    }
}
