// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command-line driver: parses `--init`/`--data`/`selftest`, wires the mini language
//! (`skfs_lang::engine`) as the body `init` routine every session uses, and drives
//! `skfs_engine::driver` to do the rest. Maps every failure onto a process exit code.

use std::io;

use skfs_core::{BaseName, DirName};
use skfs_engine::context::Context;
use skfs_engine::driver::{self, DriverControl, Session};

pub mod args;
pub mod error;
pub mod selftest;

use args::Command;
use error::AppError;

/// The eager input directory stdin writes land in.
pub fn source_dir() -> DirName {
    DirName::new("/lang/src/")
}

/// The lazy directory programs are evaluated through.
pub fn result_dir() -> DirName {
    DirName::new("/lang/out/")
}

fn init_context(ctx: &mut Context) {
    skfs_lang::engine::install(ctx, source_dir(), result_dir()).expect("directory names are fixed and distinct");
}

/// Runs the CLI end to end given raw argv (excluding `argv[0]`), stdin, and a line sink for
/// `--data` sessions' output. Returns the process exit code.
pub fn run(argv: impl IntoIterator<Item = String>, stdin: &mut impl io::Read, stdout: &mut impl io::Write) -> u8 {
    match run_inner(argv, stdin, stdout) {
        Ok(()) => 0,
        Err(err) => {
            if matches!(err, AppError::Cli(_)) {
                eprintln!("{err}\n\n{}", args::HELP);
            } else {
                eprintln!("{err}");
            }
            err.exit_code()
        }
    }
}

fn run_inner(argv: impl IntoIterator<Item = String>, stdin: &mut impl io::Read, stdout: &mut impl io::Write) -> Result<(), AppError> {
    match args::parse(argv)? {
        Command::Init { path } => {
            driver::run(Session::Init { out_path: path }, init_context, stdin, |_ctx| DriverControl::Continue)?;
            Ok(())
        }
        Command::Data { path, gc_interval, trace } => {
            run_data_session(&path, gc_interval, trace, stdin, stdout)
        }
        Command::Selftest => selftest::run().map_err(AppError::SelftestFailed),
    }
}

fn run_data_session(
    path: &std::path::Path,
    gc_interval: usize,
    trace: bool,
    stdin: &mut impl io::Read,
    stdout: &mut impl io::Write,
) -> Result<(), AppError> {
    let session = Session::Data {
        data_path: path.to_path_buf(),
        target_dir: source_dir(),
        gc_interval,
    };
    let out = result_dir();
    let src = source_dir();

    driver::run(
        session,
        |ctx| {
            init_context(ctx);
            if trace {
                install_trace_sink(ctx);
            }
        },
        stdin,
        move |ctx| {
            print_outcomes(ctx, &src, &out, stdout);
            DriverControl::Continue
        },
    )?;
    Ok(())
}

#[cfg(feature = "profiling")]
fn install_trace_sink(ctx: &mut Context) {
    ctx.set_trace_sink(Some(Box::new(skfs_profiling::ProfilingTraceSink::new())));
}

#[cfg(not(feature = "profiling"))]
fn install_trace_sink(_ctx: &mut Context) {
    eprintln!("--trace was given but this build was compiled without the `profiling` feature; ignoring");
}

/// Forces every program currently held in `src` and writes its outcome to `stdout` as one
/// `key\tvalue\n` line per program, mirroring the stdin protocol's own record shape.
fn print_outcomes(ctx: &mut Context, src: &DirName, out: &DirName, stdout: &mut impl io::Write) {
    let Some(keys) = ctx.maybe_get_eager_dir(src).map(|d| d.keys().cloned().collect::<Vec<BaseName>>()) else {
        return;
    };
    for key in keys {
        let outcome = skfs_lang::engine::get_outcome(ctx, out, &key).expect("result_dir is always a lazy dir");
        let _ = writeln!(stdout, "{key}\t{outcome:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn init_then_data_session_evaluates_a_program_from_stdin() {
        let dir = std::env::temp_dir().join(format!("skfs_cli_test_{}", std::process::id()));
        let _ = std::fs::remove_file(&dir);

        let mut no_stdin = Cursor::new(Vec::new());
        let mut no_stdout = Vec::new();
        let code = run(
            ["--init".to_owned(), dir.to_string_lossy().into_owned()],
            &mut no_stdin,
            &mut no_stdout,
        );
        assert_eq!(code, 0, "init failed: {}", String::from_utf8_lossy(&no_stdout));

        let mut stdin = Cursor::new(b"p\t\"1 + 2 * 3\"\n\n".to_vec());
        let mut stdout = Vec::new();
        let code = run(
            ["--data".to_owned(), dir.to_string_lossy().into_owned()],
            &mut stdin,
            &mut stdout,
        );
        assert_eq!(code, 0, "data session failed: {}", String::from_utf8_lossy(&stdout));
        let printed = String::from_utf8(stdout).unwrap();
        assert!(printed.contains("Int(7)"), "expected an Int(7) outcome, got: {printed}");

        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn selftest_exits_zero() {
        let mut no_stdin = Cursor::new(Vec::new());
        let mut no_stdout = Vec::new();
        let code = run(["selftest".to_owned()], &mut no_stdin, &mut no_stdout);
        assert_eq!(code, 0);
    }

    #[test]
    fn bad_flags_exit_two() {
        let mut no_stdin = Cursor::new(Vec::new());
        let mut no_stdout = Vec::new();
        let code = run(["--bogus".to_owned()], &mut no_stdin, &mut no_stdout);
        assert_eq!(code, 2);
    }
}
