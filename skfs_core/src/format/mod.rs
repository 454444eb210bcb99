// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary encoding for the key/value types this crate defines.
//!
//! The persistence arena (`crate::arena`, `std`-only) is a flat byte buffer; everything written
//! into it — `BaseName`s, `Path`s, `Time`s, `File`s — goes through the encode/decode helpers here
//! first. Integers are LEB128 (`leb128`) so small values (the overwhelmingly common case for
//! `BaseName::IID` and reducer counters) cost one byte instead of eight.

pub mod leb128;

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::file::{ExternalPointer, File};
use crate::name::{BaseName, DirName};
use crate::path::Path;
use crate::time::Time;

use self::leb128::{read_sleb128_i64, read_uleb128_u64, write_sleb128_i64, write_uleb128_u64};

/// An error produced while decoding a persisted record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ended before a complete value could be read.
    UnexpectedEof,
    /// A length or offset field would index past the end of the buffer.
    OutOfBounds,
    /// A LEB128 varint used more bytes or bits than it validly could.
    InvalidVarint,
    /// A tag byte didn't match any known variant for the type being decoded.
    UnknownTag(u8),
    /// A string field's bytes were not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of buffer"),
            Self::OutOfBounds => write!(f, "length or offset out of bounds"),
            Self::InvalidVarint => write!(f, "invalid varint encoding"),
            Self::UnknownTag(tag) => write!(f, "unknown tag byte {tag:#x}"),
            Self::InvalidUtf8 => write!(f, "string field is not valid utf-8"),
        }
    }
}

impl core::error::Error for DecodeError {}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_uleb128_u64(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn read_bytes<'b>(buf: &'b [u8], offset: &mut usize) -> Result<&'b [u8], DecodeError> {
    let len = read_uleb128_u64(buf, offset)? as usize;
    let end = offset.checked_add(len).ok_or(DecodeError::OutOfBounds)?;
    let slice = buf.get(*offset..end).ok_or(DecodeError::UnexpectedEof)?;
    *offset = end;
    Ok(slice)
}

/// Encodes a [`Time`] as a uleb128 tick count.
pub fn encode_time(out: &mut Vec<u8>, time: Time) {
    write_uleb128_u64(out, time.ticks());
}

/// Decodes a [`Time`].
pub fn decode_time(buf: &[u8], offset: &mut usize) -> Result<Time, DecodeError> {
    Ok(Time::from_ticks(read_uleb128_u64(buf, offset)?))
}

const BASE_NAME_TAG_IID: u8 = 0;
const BASE_NAME_TAG_SID: u8 = 1;

/// Encodes a [`BaseName`].
pub fn encode_base_name(out: &mut Vec<u8>, name: &BaseName) {
    match name {
        BaseName::IID(v) => {
            out.push(BASE_NAME_TAG_IID);
            write_sleb128_i64(out, *v);
        }
        BaseName::SID(s) => {
            out.push(BASE_NAME_TAG_SID);
            write_bytes(out, s.as_bytes());
        }
    }
}

/// Decodes a [`BaseName`].
pub fn decode_base_name(buf: &[u8], offset: &mut usize) -> Result<BaseName, DecodeError> {
    let tag = *buf.get(*offset).ok_or(DecodeError::UnexpectedEof)?;
    *offset += 1;
    match tag {
        BASE_NAME_TAG_IID => Ok(BaseName::iid(read_sleb128_i64(buf, offset)?)),
        BASE_NAME_TAG_SID => {
            let bytes = read_bytes(buf, offset)?;
            let s = core::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
            Ok(BaseName::sid(s))
        }
        other => Err(DecodeError::UnknownTag(other)),
    }
}

/// Encodes a directory name.
pub fn encode_dir_name(out: &mut Vec<u8>, name: &DirName) {
    write_bytes(out, name.as_str().as_bytes());
}

/// Decodes a directory name.
pub fn decode_dir_name(buf: &[u8], offset: &mut usize) -> Result<DirName, DecodeError> {
    let bytes = read_bytes(buf, offset)?;
    let s = core::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
    Ok(DirName::new(s))
}

/// Encodes a [`Path`].
pub fn encode_path(out: &mut Vec<u8>, path: &Path) {
    encode_dir_name(out, path.dir());
    encode_base_name(out, path.name());
}

/// Decodes a [`Path`].
pub fn decode_path(buf: &[u8], offset: &mut usize) -> Result<Path, DecodeError> {
    let dir = decode_dir_name(buf, offset)?;
    let name = decode_base_name(buf, offset)?;
    Ok(Path::new(dir, name))
}

const FILE_TAG_UNIT: u8 = 0;
const FILE_TAG_BOOL: u8 = 1;
const FILE_TAG_INT: u8 = 2;
const FILE_TAG_FLOAT: u8 = 3;
const FILE_TAG_STR: u8 = 4;
const FILE_TAG_BYTES: u8 = 5;
const FILE_TAG_BLOB: u8 = 6;

/// Encodes a [`File`] value.
///
/// `File::Blob` persists only the raw `ExternalPointer` handle, not whatever it points at —
/// reattaching the pointee after a reload is `skfs_engine::gc`'s job, not this crate's.
pub fn encode_file(out: &mut Vec<u8>, file: &File) {
    match file {
        File::Unit => out.push(FILE_TAG_UNIT),
        File::Bool(b) => {
            out.push(FILE_TAG_BOOL);
            out.push(u8::from(*b));
        }
        File::Int(i) => {
            out.push(FILE_TAG_INT);
            write_sleb128_i64(out, *i);
        }
        File::Float(f) => {
            out.push(FILE_TAG_FLOAT);
            out.extend_from_slice(&f.to_bits().to_le_bytes());
        }
        File::Str(s) => {
            out.push(FILE_TAG_STR);
            write_bytes(out, s.as_bytes());
        }
        File::Bytes(b) => {
            out.push(FILE_TAG_BYTES);
            write_bytes(out, b);
        }
        File::Blob(ptr) => {
            out.push(FILE_TAG_BLOB);
            write_uleb128_u64(out, ptr.raw());
        }
    }
}

/// Decodes a [`File`] value.
pub fn decode_file(buf: &[u8], offset: &mut usize) -> Result<File, DecodeError> {
    let tag = *buf.get(*offset).ok_or(DecodeError::UnexpectedEof)?;
    *offset += 1;
    match tag {
        FILE_TAG_UNIT => Ok(File::Unit),
        FILE_TAG_BOOL => {
            let b = *buf.get(*offset).ok_or(DecodeError::UnexpectedEof)?;
            *offset += 1;
            Ok(File::Bool(b != 0))
        }
        FILE_TAG_INT => Ok(File::Int(read_sleb128_i64(buf, offset)?)),
        FILE_TAG_FLOAT => {
            let end = offset.checked_add(8).ok_or(DecodeError::OutOfBounds)?;
            let bytes = buf.get(*offset..end).ok_or(DecodeError::UnexpectedEof)?;
            let mut le = [0u8; 8];
            le.copy_from_slice(bytes);
            *offset = end;
            Ok(File::Float(f64::from_bits(u64::from_le_bytes(le))))
        }
        FILE_TAG_STR => {
            let bytes = read_bytes(buf, offset)?;
            let s = core::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
            Ok(File::Str(String::from(s)))
        }
        FILE_TAG_BYTES => Ok(File::Bytes(read_bytes(buf, offset)?.to_vec())),
        FILE_TAG_BLOB => Ok(File::Blob(ExternalPointer::from_raw(read_uleb128_u64(
            buf, offset,
        )?))),
        other => Err(DecodeError::UnknownTag(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn roundtrip_file(file: File) {
        let mut buf = Vec::new();
        encode_file(&mut buf, &file);
        let mut offset = 0;
        let back = decode_file(&buf, &mut offset).unwrap();
        assert_eq!(back, file);
        assert_eq!(offset, buf.len());
    }

    #[test]
    fn file_variants_roundtrip() {
        roundtrip_file(File::Unit);
        roundtrip_file(File::Bool(true));
        roundtrip_file(File::Int(-42));
        roundtrip_file(File::Float(core::f64::consts::PI));
        roundtrip_file(File::Str(String::from("hello")));
        roundtrip_file(File::Bytes(alloc::vec![1, 2, 3]));
        roundtrip_file(File::Blob(ExternalPointer::from_raw(7)));
    }

    #[test]
    fn path_roundtrips() {
        let path = Path::new(DirName::new("/in/"), BaseName::sid("k"));
        let mut buf = Vec::new();
        encode_path(&mut buf, &path);
        let mut offset = 0;
        assert_eq!(decode_path(&buf, &mut offset).unwrap(), path);
        assert_eq!(offset, buf.len());
    }

    #[test]
    fn truncated_buffer_is_rejected_not_panicked_on() {
        let mut buf = Vec::new();
        encode_file(&mut buf, &File::Str(String::from("hello")));
        buf.truncate(buf.len() - 1);
        let mut offset = 0;
        assert_eq!(decode_file(&buf, &mut offset), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let buf = [0xff_u8];
        let mut offset = 0;
        assert_eq!(
            decode_file(&buf, &mut offset),
            Err(DecodeError::UnknownTag(0xff))
        );
    }
}
