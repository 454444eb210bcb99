// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The `selftest` subcommand: a unit-test runner for the engine, runnable from a
//! built binary rather than through `cargo test`. Each check mirrors a named scenario;
//! the full property and invariant suite lives in `skfs_conformance`, exercised by `cargo test`.

use skfs_core::{BaseName, DirName, File};
use skfs_engine::context::Context;
use skfs_engine::reducer::SumReducer;
use skfs_lang::engine::{self, ProgramOutcome};

/// Runs every built-in check in order, stopping at the first failure.
///
/// # Errors
///
/// Returns a human-readable message naming the check and what diverged.
pub fn run() -> Result<(), String> {
    counter_reducer_tracks_incremental_writes()?;
    mini_language_rewrite_only_invalidates_one_program()?;
    Ok(())
}

fn counter_reducer_tracks_incremental_writes() -> Result<(), String> {
    let mut ctx = Context::new();
    let dir = DirName::new("/selftest/counter/");
    ctx.mkdir(dir.clone(), true).map_err(|e| e.to_string())?;
    ctx.eager_dir_mut(&dir).map_err(|e| e.to_string())?.set_reducer(BaseName::iid(0), Box::new(SumReducer));

    let write = |ctx: &mut Context, key: &str, value: i64| -> Result<(), String> {
        let id = ctx.interner_mut().intern(File::Int(value));
        ctx.write_array_many(&dir, [(BaseName::sid(key), alloc_vec(id))]).map_err(|e| e.to_string())?;
        ctx.update().map_err(|e| e.to_string())
    };

    write(&mut ctx, "x", 2)?;
    let after_x = sum_of(&ctx, &dir);
    if after_x != Some(2) {
        return Err(format!("counter: expected sum 2 after writing x=2, got {after_x:?}"));
    }

    write(&mut ctx, "y", 3)?;
    let after_y = sum_of(&ctx, &dir);
    if after_y != Some(5) {
        return Err(format!("counter: expected sum 5 after writing y=3, got {after_y:?}"));
    }

    ctx.write_array_many(&dir, [(BaseName::sid("x"), Vec::new())]).map_err(|e| e.to_string())?;
    ctx.update().map_err(|e| e.to_string())?;
    let after_remove = sum_of(&ctx, &dir);
    if after_remove != Some(3) {
        return Err(format!("counter: expected sum 3 after removing x, got {after_remove:?}"));
    }
    Ok(())
}

fn alloc_vec(id: skfs_core::FileId) -> Vec<skfs_core::FileId> {
    vec![id]
}

fn sum_of(ctx: &Context, dir: &DirName) -> Option<i64> {
    let values = ctx.maybe_get_eager_dir(dir)?.get_array_raw(&BaseName::iid(0));
    values.first().map(|id| match ctx.interner().get(*id) {
        File::Int(n) => *n,
        other => panic!("selftest: reducer output was {other:?}, not an int"),
    })
}

fn mini_language_rewrite_only_invalidates_one_program() -> Result<(), String> {
    let mut ctx = Context::new();
    let src = DirName::new("/selftest/lang/src/");
    let out = DirName::new("/selftest/lang/out/");
    engine::install(&mut ctx, src.clone(), out.clone()).map_err(|e| e.to_string())?;

    engine::set_source(&mut ctx, &src, BaseName::sid("a"), "1 + 1").map_err(|e| e.to_string())?;
    engine::set_source(&mut ctx, &src, BaseName::sid("b"), "2 + 2").map_err(|e| e.to_string())?;

    let a = engine::get_outcome(&mut ctx, &out, &BaseName::sid("a")).map_err(|e| e.to_string())?;
    if a != ProgramOutcome::Int(2) {
        return Err(format!("mini language: expected a=2, got {a:?}"));
    }

    engine::set_source(&mut ctx, &src, BaseName::sid("a"), "10 + 1").map_err(|e| e.to_string())?;
    ctx.update().map_err(|e| e.to_string())?;

    let a = engine::get_outcome(&mut ctx, &out, &BaseName::sid("a")).map_err(|e| e.to_string())?;
    let b = engine::get_outcome(&mut ctx, &out, &BaseName::sid("b")).map_err(|e| e.to_string())?;
    if a != ProgramOutcome::Int(11) {
        return Err(format!("mini language: expected a=11 after rewrite, got {a:?}"));
    }
    if b != ProgramOutcome::Int(4) {
        return Err(format!("mini language: expected b to stay 4, got {b:?}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selftest_passes_against_a_correct_engine() {
        run().unwrap();
    }
}
