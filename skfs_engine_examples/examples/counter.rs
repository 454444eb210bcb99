// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A minimal eager-directory pipeline: `/in/` holds one integer per key, `/sum/` holds a single
//! mapper-maintained running total.
//!
//! Run with `cargo run -p skfs_engine_examples --example counter`.

use skfs_core::{BaseName, DirName, File, FileId};
use skfs_engine::context::Context;
use skfs_engine::eager::MapperWriter;

fn sum_mapper(out: &mut MapperWriter<'_>, key: &BaseName, values: &[FileId]) {
    let total: i64 = values
        .iter()
        .filter_map(|id| match out.interner().get(*id) {
            File::Int(n) => Some(*n),
            _ => None,
        })
        .sum();
    let id = out.interner_mut().intern(File::Int(total));
    out.write(key.clone(), vec![id]);
}

fn main() {
    let mut ctx = Context::new();
    ctx.mkdir(DirName::new("/in/"), true).expect("mkdir /in/");
    ctx.mkdir(DirName::new("/sum/"), false).expect("mkdir /sum/");
    ctx.eager_dir_mut(&DirName::new("/sum/"))
        .expect("/sum/ is eager")
        .set_mapper(DirName::new("/in/"), Box::new(sum_mapper));

    for (key, value) in [("a", 3_i64), ("b", 4), ("c", 5)] {
        let id = ctx.interner_mut().intern(File::Int(value));
        ctx.write_array(&DirName::new("/in/"), BaseName::sid(key), vec![id]).expect("write /in/");
    }
    ctx.update().expect("update");

    let sum_dir = ctx.maybe_get_eager_dir(&DirName::new("/sum/")).expect("/sum/ exists");
    for key in ["a", "b", "c"] {
        let values = sum_dir.get_array_raw(&BaseName::sid(key));
        let total = values.first().map(|id| ctx.interner().get(*id));
        println!("/sum/{key} = {total:?}");
    }

    // Overwriting one input only reruns that key's mapper call, not the whole directory.
    let id = ctx.interner_mut().intern(File::Int(10));
    ctx.write_array(&DirName::new("/in/"), BaseName::sid("a"), vec![id]).expect("rewrite /in/a");
    ctx.update().expect("update");

    let sum_dir = ctx.maybe_get_eager_dir(&DirName::new("/sum/")).expect("/sum/ exists");
    let values = sum_dir.get_array_raw(&BaseName::sid("a"));
    let total = values.first().map(|id| ctx.interner().get(*id));
    println!("after rewrite, /sum/a = {total:?}");
}
