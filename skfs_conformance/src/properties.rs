// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Many-case properties covering the engine's determinism and chunk-boundary invariants.

use std::collections::BTreeMap;

use proptest::prelude::*;

use skfs_core::{BaseName, DirName, File, FileId};
use skfs_engine::context::Context;
use skfs_engine::eager::MapperWriter;
use skfs_engine::stdin_protocol::StdinParser;

fn identity_mapper(out: &mut MapperWriter<'_>, key: &BaseName, values: &[FileId]) {
    out.write(key.clone(), values.to_vec());
}

fn build_ctx() -> Context {
    let mut ctx = Context::new();
    ctx.mkdir(DirName::new("/in/"), true).unwrap();
    ctx.mkdir(DirName::new("/derived/"), false).unwrap();
    ctx.eager_dir_mut(&DirName::new("/derived/")).unwrap().set_mapper(DirName::new("/in/"), Box::new(identity_mapper));
    ctx
}

fn key_name(i: usize) -> BaseName {
    BaseName::sid(format!("k{i}"))
}

fn derived_snapshot(ctx: &Context) -> BTreeMap<BaseName, Vec<i64>> {
    let dir = ctx.maybe_get_eager_dir(&DirName::new("/derived/")).unwrap();
    dir.keys()
        .map(|key| {
            let values = dir
                .get_array_raw(key)
                .iter()
                .map(|id| match ctx.interner().get(*id) {
                    File::Int(n) => *n,
                    other => panic!("unexpected value {other:?}"),
                })
                .collect();
            (key.clone(), values)
        })
        .collect()
}

proptest! {
    /// A full rebuild from scratch (one batch write, one `update()`) and the
    /// incremental result of applying the same writes one at a time produce byte-identical derived
    /// directory contents.
    #[test]
    fn incremental_and_batch_application_converge_to_the_same_derived_state(
        writes in proptest::collection::vec((0usize..4, -100i64..100), 0..30),
    ) {
        let mut incremental = build_ctx();
        for &(k, v) in &writes {
            let id = incremental.interner_mut().intern(File::Int(v));
            incremental.write_array(&DirName::new("/in/"), key_name(k), vec![id]).unwrap();
            incremental.update().unwrap();
        }

        let mut batched = build_ctx();
        let batch: Vec<_> = writes
            .iter()
            .map(|&(k, v)| {
                let id = batched.interner_mut().intern(File::Int(v));
                (key_name(k), vec![id])
            })
            .collect();
        batched.write_array_many(&DirName::new("/in/"), batch).unwrap();
        batched.update().unwrap();

        prop_assert_eq!(derived_snapshot(&incremental), derived_snapshot(&batched));
    }
}

fn escape_byte(buf: &mut Vec<u8>, byte: u8) {
    match byte {
        b'\\' => buf.extend_from_slice(b"\\\\"),
        b'\t' => buf.extend_from_slice(b"\\t"),
        b'\n' => buf.extend_from_slice(b"\\n"),
        b'"' => buf.extend_from_slice(b"\\\""),
        other => buf.push(other),
    }
}

fn encode_record(key: &str, value: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    for b in key.bytes() {
        escape_byte(&mut bytes, b);
    }
    bytes.push(b'\t');
    bytes.push(b'"');
    for b in value.bytes() {
        escape_byte(&mut bytes, b);
    }
    bytes.push(b'"');
    bytes.push(b'\n');
    bytes
}

proptest! {
    /// Interrupting and retrying chunks at arbitrary byte boundaries never changes
    /// the parsed event set. `stdin_protocol`'s own unit test already covers every single split
    /// point for one fixed stream; this generates the stream itself and splits it at several
    /// arbitrary points at once, which is a strictly larger space than a single cut.
    #[test]
    fn stdin_protocol_reparses_identically_under_arbitrary_chunk_splits(
        records in proptest::collection::vec(("[a-zA-Z0-9]{0,6}", "[a-zA-Z0-9 \\\\\\t\\n\"]{0,6}"), 0..6),
        raw_splits in proptest::collection::vec(0usize..512, 0..8),
    ) {
        let mut stream = Vec::new();
        for (key, value) in &records {
            stream.extend(encode_record(key, value));
        }

        let whole = StdinParser::new().feed(&stream);

        let mut points: Vec<usize> = raw_splits.into_iter().map(|p| p % (stream.len() + 1)).collect();
        points.sort_unstable();
        points.dedup();

        let mut parser = StdinParser::new();
        let mut chunked = Vec::new();
        let mut start = 0usize;
        for point in points {
            chunked.extend(parser.feed(&stream[start..point]));
            start = point;
        }
        chunked.extend(parser.feed(&stream[start..]));

        prop_assert_eq!(chunked, whole);
    }
}
