// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A set of concrete scenarios, each a standalone test named after the behavior it reproduces.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use skfs_core::{BaseName, DirName, ExternalPointer, File, FileId};
use skfs_engine::context::Context;
use skfs_engine::eager::MapperWriter;
use skfs_engine::gc::{self, FinalizerRegistry};
use skfs_engine::reducer::SumReducer;
use skfs_engine::stdin_protocol::{StdinEvent, StdinParser};

fn identity_mapper(out: &mut MapperWriter<'_>, key: &BaseName, values: &[FileId]) {
    out.write(key.clone(), values.to_vec());
}

fn int_at(ctx: &Context, dir: &DirName, key: &BaseName) -> Option<i64> {
    let values = ctx.maybe_get_eager_dir(dir)?.get_array_raw(key);
    values.first().map(|id| match ctx.interner().get(*id) {
        File::Int(n) => *n,
        other => panic!("unexpected value {other:?}"),
    })
}

/// Single eager input `/counter/` with a `SumReducer` aggregating its entries into `IID(0)`.
/// Writing `x ↦ 2`, then `y ↦ 3`, then removing `x` yields sums `2`, `5`, `3` after each batch.
#[test]
fn counter() {
    let mut ctx = Context::new();
    ctx.mkdir(DirName::new("/counter/"), true).unwrap();
    ctx.eager_dir_mut(&DirName::new("/counter/")).unwrap().set_reducer(BaseName::iid(0), Box::new(SumReducer));

    let write_one = |ctx: &mut Context, key: &str, value: i64| {
        let id = ctx.interner_mut().intern(File::Int(value));
        ctx.write_array_many(&DirName::new("/counter/"), [(BaseName::sid(key), vec![id])]).unwrap();
        ctx.update().unwrap();
    };

    write_one(&mut ctx, "x", 2);
    assert_eq!(int_at(&ctx, &DirName::new("/counter/"), &BaseName::iid(0)), Some(2));

    write_one(&mut ctx, "y", 3);
    assert_eq!(int_at(&ctx, &DirName::new("/counter/"), &BaseName::iid(0)), Some(5));

    ctx.write_array_many(&DirName::new("/counter/"), [(BaseName::sid("x"), Vec::new())]).unwrap();
    ctx.update().unwrap();
    assert_eq!(int_at(&ctx, &DirName::new("/counter/"), &BaseName::iid(0)), Some(3));
}

/// `"k\t\"v1\"\nk\t\"v2\"\n"` parses to `{k -> [v1, v2]}`; splitting the input at every byte
/// boundary and feeding the pieces in sequence yields the same map.
#[test]
fn stdin_chunking() {
    let stream = b"k\t\"v1\"\nk\t\"v2\"\n";

    fn into_map(events: Vec<StdinEvent>) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for event in events {
            if let StdinEvent::Entry { key, value } = event {
                map.entry(key.as_sid().unwrap().to_owned()).or_default().push(value);
            }
        }
        map
    }

    let whole = into_map(StdinParser::new().feed(stream));
    assert_eq!(whole.get("k"), Some(&vec!["v1".to_owned(), "v2".to_owned()]));

    for split in 0..=stream.len() {
        let mut parser = StdinParser::new();
        let mut events = parser.feed(&stream[..split]);
        events.extend(parser.feed(&stream[split..]));
        assert_eq!(into_map(events), whole, "split at byte {split} diverged");
    }
}

/// Two keys `a`, `b` in a source dir both feed a derived dir via a per-key mapper. Writing to `a`
/// recomputes exactly one entry; `b`'s derived entry keeps the same `FileId`.
#[test]
fn invalidation_minimality() {
    let mut ctx = Context::new();
    ctx.mkdir(DirName::new("/in/"), true).unwrap();
    ctx.mkdir(DirName::new("/derived/"), false).unwrap();
    ctx.eager_dir_mut(&DirName::new("/derived/")).unwrap().set_mapper(DirName::new("/in/"), Box::new(identity_mapper));

    let a_id = ctx.interner_mut().intern(File::Int(1));
    ctx.write_array(&DirName::new("/in/"), BaseName::sid("a"), vec![a_id]).unwrap();
    let b_id = ctx.interner_mut().intern(File::Int(2));
    ctx.write_array(&DirName::new("/in/"), BaseName::sid("b"), vec![b_id]).unwrap();
    ctx.update().unwrap();

    let b_before = {
        let derived = ctx.maybe_get_eager_dir(&DirName::new("/derived/")).unwrap();
        derived.get_array_raw(&BaseName::sid("b")).to_vec()
    };

    let a_id2 = ctx.interner_mut().intern(File::Int(10));
    ctx.write_array(&DirName::new("/in/"), BaseName::sid("a"), vec![a_id2]).unwrap();
    let summary = ctx.update().unwrap();

    assert_eq!(summary.recomputed_entries, 1, "only a's key should have rerun the mapper");

    let derived = ctx.maybe_get_eager_dir(&DirName::new("/derived/")).unwrap();
    assert_eq!(derived.get_array_raw(&BaseName::sid("a")), &[a_id2]);
    assert_eq!(derived.get_array_raw(&BaseName::sid("b")), b_before.as_slice(), "untouched by a's write");
}

/// A lazy dir computing `fib(n)` recursively: forcing `fib(20)` performs one compute call per
/// distinct `n` it touches; re-forcing with no intervening write performs none.
#[test]
fn lazy_memoisation() {
    let calls = Rc::new(std::cell::Cell::new(0usize));
    let counted = Rc::clone(&calls);

    let mut ctx = Context::new();
    let dir = DirName::new("/fib/");
    ctx.mkdir_lazy(
        dir.clone(),
        Rc::new(move |key, reader| {
            counted.set(counted.get() + 1);
            let Some(n) = key.as_iid() else { return Vec::new() };
            let value = if n < 2 {
                n
            } else {
                let a = reader
                    .get_lazy(&DirName::new("/fib/"), &BaseName::iid(n - 1))
                    .ok()
                    .and_then(|v| v.first().copied())
                    .map(|id| *reader.ctx_interner().get(id));
                let b = reader
                    .get_lazy(&DirName::new("/fib/"), &BaseName::iid(n - 2))
                    .ok()
                    .and_then(|v| v.first().copied())
                    .map(|id| *reader.ctx_interner().get(id));
                let (File::Int(a), File::Int(b)) = (a.unwrap_or(File::Int(0)), b.unwrap_or(File::Int(0))) else {
                    unreachable!("fib entries are always File::Int")
                };
                a + b
            };
            vec![reader.intern(File::Int(value))]
        }),
    )
    .unwrap();

    let result = ctx.force_lazy(&dir, &BaseName::iid(20)).unwrap();
    assert_eq!(*ctx.interner().get(result[0]), File::Int(6765));
    assert_eq!(calls.get(), 21, "each of fib(0)..=fib(20) computes exactly once");

    let before_reforce = calls.get();
    let again = ctx.force_lazy(&dir, &BaseName::iid(20)).unwrap();
    assert_eq!(again, result);
    assert_eq!(calls.get(), before_reforce, "re-forcing a clean entry performs no further compute calls");
}

/// An `ExternalPointer` that fails to survive a collection has its finalizer invoked exactly once,
/// even across a second collection that finds nothing new to reclaim.
#[test]
fn external_pointer() {
    let mut ctx = Context::new();
    ctx.mkdir(DirName::new("/in/"), true).unwrap();

    let ptr = ExternalPointer::from_raw(42);
    let dropped_id = ctx.interner_mut().intern(File::Blob(ptr));
    ctx.write_array(&DirName::new("/in/"), BaseName::iid(1), vec![dropped_id]).unwrap();

    let mut finalizers = FinalizerRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    finalizers.register(
        ptr,
        Box::new(move |raw| {
            assert_eq!(raw, 42);
            counted.fetch_add(1, Ordering::SeqCst);
        }),
    );

    // Survives the first collection: still referenced.
    gc::collect(&mut ctx, &mut finalizers);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Replaced by a second value: the pointer no longer has a live reference.
    let replacement = ctx.interner_mut().intern(File::Int(0));
    ctx.write_array(&DirName::new("/in/"), BaseName::iid(1), vec![replacement]).unwrap();

    let stats = gc::collect(&mut ctx, &mut finalizers);
    assert_eq!(stats.finalized, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A further collection with nothing left to reclaim must not call the finalizer again.
    gc::collect(&mut ctx, &mut finalizers);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// After removing a source entry, reads of the derived dir's corresponding key return empty and no
/// error escapes to the caller.
#[test]
fn deleted_dir() {
    let mut ctx = Context::new();
    ctx.mkdir(DirName::new("/in/"), true).unwrap();
    ctx.mkdir(DirName::new("/derived/"), false).unwrap();
    ctx.eager_dir_mut(&DirName::new("/derived/")).unwrap().set_mapper(DirName::new("/in/"), Box::new(identity_mapper));

    let id = ctx.interner_mut().intern(File::Int(7));
    ctx.write_array(&DirName::new("/in/"), BaseName::sid("x"), vec![id]).unwrap();
    ctx.update().unwrap();
    assert!(!ctx.maybe_get_eager_dir(&DirName::new("/derived/")).unwrap().get_array_raw(&BaseName::sid("x")).is_empty());

    ctx.remove(&DirName::new("/in/"), &BaseName::sid("x")).unwrap();
    ctx.update().unwrap();

    let derived = ctx.maybe_get_eager_dir(&DirName::new("/derived/")).unwrap();
    assert!(derived.get_array_raw(&BaseName::sid("x")).is_empty());
}
