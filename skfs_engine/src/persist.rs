// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bridges a live [`Context`] onto [`skfs_core::arena`]'s mmap-backed byte arena.
//!
//! Only eager directories' entries (and deleted-directory tombstones) are persisted. Lazy caches
//! are a pure function of the eager graph they read from, so they are left to recompute on the
//! first post-load force rather than carried across a restart. Directory *topology* — which names
//! exist, which have a mapper or reducer attached — is Rust code, not data: the client's own
//! `init` routine rebuilds it on every load (the same routine `--init` uses to build it the first
//! time), and [`apply`] only restores the `Entry` values those directories held on the previous
//! commit.

use alloc::vec::Vec;
use std::path::Path as StdPath;

use skfs_core::arena::{Arena, ArenaWriter, PersistError};
use skfs_core::format::leb128::{read_uleb128_u64, write_uleb128_u64};
use skfs_core::format::{decode_base_name, decode_dir_name, decode_file, decode_time, encode_base_name, encode_dir_name, encode_file, encode_time};
use skfs_core::{BaseName, DirName, File, Time};

use crate::context::{Context, Dir};
use crate::eager::Entry;

const DIR_TAG_EAGER: u8 = 0;
const DIR_TAG_DELETED: u8 = 1;

/// Writes every eager directory's entries (and every deleted directory's tombstone time) in `ctx`
/// to `path`, committing atomically.
///
/// # Errors
///
/// Returns [`PersistError`] on any I/O failure while writing or renaming the file.
pub fn save(ctx: &Context, path: &StdPath) -> Result<(), PersistError> {
    let mut writer = ArenaWriter::new();
    let interner = ctx.interner();
    let mut dir_records: Vec<(DirName, u8, u64)> = Vec::new();

    for name in ctx.dir_names() {
        let Ok(dir) = ctx.unsafe_get_dir(name) else {
            continue;
        };
        match dir {
            Dir::Eager(eager) => {
                let mut bytes = Vec::new();
                bytes.push(u8::from(eager.is_input()));
                let keys: Vec<&BaseName> = eager.keys().collect();
                write_uleb128_u64(&mut bytes, keys.len() as u64);
                for key in keys {
                    let Some(entry) = eager.entry(key) else { continue };
                    encode_base_name(&mut bytes, key);
                    encode_time(&mut bytes, entry.write_time);
                    write_uleb128_u64(&mut bytes, entry.values.len() as u64);
                    for id in &entry.values {
                        encode_file(&mut bytes, interner.get(*id));
                    }
                }
                let offset = writer.write_record(&bytes);
                dir_records.push((name.clone(), DIR_TAG_EAGER, offset));
            }
            Dir::Deleted { time } => {
                let mut bytes = Vec::new();
                encode_time(&mut bytes, *time);
                let offset = writer.write_record(&bytes);
                dir_records.push((name.clone(), DIR_TAG_DELETED, offset));
            }
            Dir::Lazy(_) => {}
        }
    }

    let mut root = Vec::new();
    encode_time(&mut root, ctx.time());
    write_uleb128_u64(&mut root, dir_records.len() as u64);
    for (name, tag, offset) in &dir_records {
        encode_dir_name(&mut root, name);
        root.push(*tag);
        write_uleb128_u64(&mut root, *offset);
    }
    let root_offset = writer.write_record(&root);
    writer.commit(path, root_offset)
}

/// One eager directory's persisted entries, ready to be restored into a freshly `init`-ed
/// [`Context`] by [`apply`].
#[derive(Debug, Default)]
pub struct LoadedEagerDir {
    /// Whether the directory was an input (as opposed to mapper-derived) when it was saved.
    pub is_input: bool,
    /// `(key, write_time, values)` triples, one per entry the directory held.
    pub entries: Vec<(BaseName, Time, Vec<File>)>,
}

/// What a persisted directory record decoded to.
#[derive(Debug)]
pub enum LoadedDir {
    /// An eager directory's restored entries.
    Eager(LoadedEagerDir),
    /// A tombstone, restored at the time it was removed.
    Deleted {
        /// The time the directory was removed.
        time: Time,
    },
}

/// The decoded contents of a committed arena, not yet applied to any [`Context`].
#[derive(Debug)]
pub struct LoadedContext {
    /// The clock value at the moment this arena was committed.
    pub time: Time,
    /// Every persisted directory, in the order they were written.
    pub dirs: Vec<(DirName, LoadedDir)>,
}

fn corrupt() -> PersistError {
    PersistError::RecordOutOfBounds
}

/// Opens and decodes the arena at `path`.
///
/// # Errors
///
/// Returns [`PersistError::BadMagic`] or [`PersistError::Truncated`] if `path` isn't a committed
/// skfs arena, and [`PersistError::RecordOutOfBounds`] if a record's encoding is malformed.
pub fn load(path: &StdPath) -> Result<LoadedContext, PersistError> {
    let arena = Arena::open(path)?;
    let root = arena.record_at(arena.root_offset())?;
    let mut cursor = 0usize;

    let time = decode_time(root, &mut cursor).map_err(|_| corrupt())?;
    let dir_count = read_uleb128_u64(root, &mut cursor).map_err(|_| corrupt())?;

    let mut dirs = Vec::with_capacity(dir_count as usize);
    for _ in 0..dir_count {
        let dir_name = decode_dir_name(root, &mut cursor).map_err(|_| corrupt())?;
        let tag = *root.get(cursor).ok_or_else(corrupt)?;
        cursor += 1;
        let offset = read_uleb128_u64(root, &mut cursor).map_err(|_| corrupt())?;
        let bytes = arena.record_at(offset)?;
        let mut inner = 0usize;

        let loaded = match tag {
            DIR_TAG_EAGER => {
                let is_input = *bytes.first().ok_or_else(corrupt)? != 0;
                inner = 1;
                let entry_count = read_uleb128_u64(bytes, &mut inner).map_err(|_| corrupt())?;
                let mut entries = Vec::with_capacity(entry_count as usize);
                for _ in 0..entry_count {
                    let key = decode_base_name(bytes, &mut inner).map_err(|_| corrupt())?;
                    let write_time = decode_time(bytes, &mut inner).map_err(|_| corrupt())?;
                    let value_count = read_uleb128_u64(bytes, &mut inner).map_err(|_| corrupt())?;
                    let mut values = Vec::with_capacity(value_count as usize);
                    for _ in 0..value_count {
                        values.push(decode_file(bytes, &mut inner).map_err(|_| corrupt())?);
                    }
                    entries.push((key, write_time, values));
                }
                LoadedDir::Eager(LoadedEagerDir { is_input, entries })
            }
            DIR_TAG_DELETED => {
                let time = decode_time(bytes, &mut inner).map_err(|_| corrupt())?;
                LoadedDir::Deleted { time }
            }
            _ => return Err(corrupt()),
        };
        dirs.push((dir_name, loaded));
    }

    Ok(LoadedContext { time, dirs })
}

/// Restores `loaded` into `ctx`.
///
/// `ctx` is expected to already have had its directories and mappers registered by the client's
/// `init` routine (an eager directory's entries are restored directly into it via
/// [`crate::eager::EagerDir::restore_entry`], bypassing the normal write path so restoring a prior
/// commit doesn't re-trigger the recomputation that produced it). A directory named in `loaded`
/// that no longer exists in `ctx` is skipped rather than treated as fatal, so a client can drop a
/// directory between versions without `apply` failing the whole load.
pub fn apply(ctx: &mut Context, loaded: LoadedContext) {
    for (dir_name, kind) in loaded.dirs {
        match kind {
            LoadedDir::Eager(dir) => {
                for (key, write_time, values) in dir.entries {
                    let values = values.into_iter().map(|file| ctx.interner_mut().intern(file)).collect();
                    let entry = Entry {
                        values,
                        write_time,
                        producers: alloc::collections::BTreeMap::new(),
                    };
                    if let Ok(eager) = ctx.eager_dir_mut(&dir_name) {
                        eager.restore_entry(key, entry);
                    }
                }
            }
            LoadedDir::Deleted { time } => {
                if ctx.unsafe_get_dir(&dir_name).is_ok() {
                    ctx.set_dir(dir_name, Dir::Deleted { time });
                }
            }
        }
    }
    ctx.restore_time(loaded.time);
}

#[cfg(test)]
mod tests {
    use super::*;
    use skfs_core::BaseName;

    #[test]
    fn save_then_load_then_apply_restores_entries() {
        let mut ctx = Context::new();
        ctx.mkdir(DirName::new("/in/"), true).unwrap();
        let id = ctx.interner_mut().intern(File::Int(7));
        ctx.write_array(&DirName::new("/in/"), BaseName::iid(1), alloc::vec![id]).unwrap();

        let path = std::env::temp_dir().join(format!("skfs-persist-test-{}", std::process::id()));
        save(&ctx, &path).unwrap();

        let mut restored = Context::new();
        restored.mkdir(DirName::new("/in/"), true).unwrap();
        let loaded = load(&path).unwrap();
        apply(&mut restored, loaded);

        let dir = restored.maybe_get_eager_dir(&DirName::new("/in/")).unwrap();
        let entry = dir.entry(&BaseName::iid(1)).unwrap();
        assert_eq!(*restored.interner().get(entry.values[0]), File::Int(7));
        assert_eq!(restored.time(), ctx.time());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn deleted_directory_round_trips_as_a_tombstone() {
        let mut ctx = Context::new();
        ctx.mkdir(DirName::new("/gone/"), true).unwrap();
        ctx.rmdir(&DirName::new("/gone/")).unwrap();

        let path = std::env::temp_dir().join(format!("skfs-persist-tombstone-{}", std::process::id()));
        save(&ctx, &path).unwrap();

        let mut restored = Context::new();
        restored.mkdir(DirName::new("/gone/"), true).unwrap();
        let loaded = load(&path).unwrap();
        apply(&mut restored, loaded);

        assert!(matches!(
            restored.unsafe_get_dir(&DirName::new("/gone/")),
            Ok(Dir::Deleted { .. })
        ));

        std::fs::remove_file(&path).unwrap();
    }
}
