// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The on-disk persistence arena.
//!
//! A whole `Context` is persisted as one flat binary file: a small fixed header (magic number,
//! format version, root offset) followed by a sequence of LEB128-framed records written by
//! `skfs_engine::persist`. Internal references between records are arena-relative byte offsets,
//! never pointers, so the file can be memory-mapped back in at a different address on the next
//! run and read without any fix-up pass.
//!
//! This module only knows about bytes in and bytes out; it has no idea what a directory or an
//! entry is. `skfs_engine::persist` walks the `Context` and calls `ArenaWriter::write_record` once
//! per directory/entry, and walks the mapped file back calling `Arena::record_at` to reconstruct
//! them.

use std::fs::File as StdFile;
use std::io;
use std::path::Path as StdPath;

use memmap2::Mmap;

use crate::format::leb128::{read_uleb128_u64, write_uleb128_u64};

/// Identifies the file as an skfs persistence arena. Chosen so a stray text file or an arena from
/// an incompatible version is rejected immediately instead of producing confusing decode errors
/// deep in a record.
const MAGIC: [u8; 8] = *b"SKFSARN1";

/// Byte length of the fixed header: magic (8) + root offset (8, fixed-width so it can be
/// overwritten in place when the root changes without rewriting the whole file).
const HEADER_LEN: usize = MAGIC.len() + 8;

/// An error encountered while reading or writing the persistence arena.
#[derive(Debug)]
pub enum PersistError {
    /// The underlying file could not be opened, read, or written.
    Io(io::Error),
    /// The file is shorter than the fixed header.
    Truncated,
    /// The magic number didn't match; this isn't an skfs arena file (or it's from an incompatible
    /// format version).
    BadMagic,
    /// A record's declared length runs past the end of the file.
    RecordOutOfBounds,
}

impl core::fmt::Display for PersistError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "arena i/o error: {e}"),
            Self::Truncated => write!(f, "arena file is shorter than its header"),
            Self::BadMagic => write!(f, "not an skfs arena file"),
            Self::RecordOutOfBounds => write!(f, "record offset/length out of bounds"),
        }
    }
}

impl core::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Truncated | Self::BadMagic | Self::RecordOutOfBounds => None,
        }
    }
}

impl From<io::Error> for PersistError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Accumulates records in memory before they are committed to disk in one write.
///
/// Building the whole image in memory and writing it once keeps a crash mid-write from ever
/// producing a file with a valid magic number but a truncated record stream: the old file on disk
/// is untouched until `ArenaWriter::commit` replaces it.
#[derive(Debug, Default)]
pub struct ArenaWriter {
    buf: Vec<u8>,
}

impl ArenaWriter {
    /// Starts a new, empty arena image.
    #[must_use]
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Appends a length-prefixed record and returns the offset of its length prefix, which is
    /// the stable reference other records should use to point at it.
    pub fn write_record(&mut self, bytes: &[u8]) -> u64 {
        let offset = self.buf.len() as u64;
        write_uleb128_u64(&mut self.buf, bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
        offset
    }

    /// Writes the accumulated records to `path`, with `root_offset` (as returned by a prior
    /// `write_record` call) recorded in the header.
    ///
    /// Writes to a sibling temporary file and renames it into place, so readers never observe a
    /// partially written arena.
    pub fn commit(&self, path: &StdPath, root_offset: u64) -> Result<(), PersistError> {
        let mut image = Vec::with_capacity(HEADER_LEN + self.buf.len());
        image.extend_from_slice(&MAGIC);
        image.extend_from_slice(&root_offset.to_le_bytes());
        image.extend_from_slice(&self.buf);

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &image)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// A read-only, memory-mapped view of a committed arena file.
pub struct Arena {
    mmap: Mmap,
    root_offset: u64,
}

impl core::fmt::Debug for Arena {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("len", &self.mmap.len())
            .field("root_offset", &self.root_offset)
            .finish()
    }
}

impl Arena {
    /// Opens and maps the arena file at `path`, validating its header.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::BadMagic`] if the file isn't an skfs arena, and
    /// [`PersistError::Truncated`] if it's shorter than the fixed header.
    pub fn open(path: &StdPath) -> Result<Self, PersistError> {
        let file = StdFile::open(path)?;

        // SAFETY: the arena file is expected to be exclusively owned by this process for the
        // duration of the mapping; concurrent external mutation of the backing file while mapped
        // is the one hazard `Mmap::map` cannot rule out for us.
        #[allow(
            unsafe_code,
            reason = "memmap2::Mmap::map is unsafe because the OS can't prevent the backing file \
                      from being truncated or rewritten out from under the mapping"
        )]
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < HEADER_LEN {
            return Err(PersistError::Truncated);
        }
        if mmap[..MAGIC.len()] != MAGIC {
            return Err(PersistError::BadMagic);
        }
        let mut root_bytes = [0u8; 8];
        root_bytes.copy_from_slice(&mmap[MAGIC.len()..HEADER_LEN]);
        let root_offset = u64::from_le_bytes(root_bytes);

        Ok(Self { mmap, root_offset })
    }

    /// Returns the offset of the root record, as committed by [`ArenaWriter::commit`].
    #[must_use]
    pub fn root_offset(&self) -> u64 {
        self.root_offset
    }

    /// Reads the record at `offset` (the value returned by the matching `write_record` call).
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::RecordOutOfBounds`] if `offset` or the record's declared length
    /// would read past the end of the mapped file.
    pub fn record_at(&self, offset: u64) -> Result<&[u8], PersistError> {
        let data = &self.mmap[HEADER_LEN..];
        let mut cursor = usize::try_from(offset).map_err(|_| PersistError::RecordOutOfBounds)?;
        let len = read_uleb128_u64(data, &mut cursor).map_err(|_| PersistError::RecordOutOfBounds)?;
        let len = usize::try_from(len).map_err(|_| PersistError::RecordOutOfBounds)?;
        let end = cursor.checked_add(len).ok_or(PersistError::RecordOutOfBounds)?;
        data.get(cursor..end).ok_or(PersistError::RecordOutOfBounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_and_reader_roundtrip_a_record() {
        let mut writer = ArenaWriter::new();
        let child_offset = writer.write_record(b"leaf");
        let root_bytes = {
            let mut buf = Vec::new();
            write_uleb128_u64(&mut buf, child_offset);
            buf
        };
        let root_offset = writer.write_record(&root_bytes);

        let dir = std::env::temp_dir().join(format!("skfs-arena-test-{}", std::process::id()));
        writer.commit(&dir, root_offset).unwrap();

        let arena = Arena::open(&dir).unwrap();
        assert_eq!(arena.root_offset(), root_offset);
        let root_record = arena.record_at(arena.root_offset()).unwrap();
        let mut cursor = 0;
        let referenced_offset = read_uleb128_u64(root_record, &mut cursor).unwrap();
        assert_eq!(arena.record_at(referenced_offset).unwrap(), b"leaf");

        std::fs::remove_file(&dir).unwrap();
    }

    #[test]
    fn rejects_files_without_the_magic_number() {
        let dir = std::env::temp_dir().join(format!("skfs-arena-bad-magic-{}", std::process::id()));
        std::fs::write(&dir, b"not an arena, just twelve bytes").unwrap();
        assert!(matches!(Arena::open(&dir), Err(PersistError::BadMagic)));
        std::fs::remove_file(&dir).unwrap();
    }

    #[test]
    fn rejects_truncated_headers() {
        let dir = std::env::temp_dir().join(format!("skfs-arena-truncated-{}", std::process::id()));
        std::fs::write(&dir, b"short").unwrap();
        assert!(matches!(Arena::open(&dir), Err(PersistError::Truncated)));
        std::fs::remove_file(&dir).unwrap();
    }
}
