// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The driver loop: owns the `--init` vs `--data` session split, the per-iteration stdin
//! → `update()` → caller-supplied body cycle, and periodic collection.
//!
//! This module only knows how to drive a [`Context`]; it has no opinion on argv or exit codes —
//! `skfs_cli` parses flags and maps [`DriverError`] onto a process exit code.

use std::io::Read;
use std::path::{Path as StdPath, PathBuf};

use skfs_core::{DirName, File};

use crate::context::Context;
use crate::error::EngineError;
use crate::gc::{self, FinalizerRegistry, GcStats};
use crate::persist::{self, PersistError};
use crate::stdin_protocol::{StdinEvent, StdinParser};

/// What the caller-supplied body wants the driver to do after one iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverControl {
    /// Apply the next batch of stdin updates and run another iteration.
    Continue,
    /// Stop the loop; the driver commits the current state and returns.
    Stop,
}

/// Which kind of session [`run`] drives.
pub enum Session {
    /// Build a fresh `Context` via the caller's `init` routine and snapshot it to `out_path`,
    /// without entering the stdin/update loop.
    Init {
        /// Where to write the freshly built snapshot.
        out_path: PathBuf,
    },
    /// Load an existing snapshot from `data_path`, rebuild its directory topology via `init`, and
    /// drive [`run_with_gc`] against it until the body signals [`DriverControl::Stop`].
    Data {
        /// The snapshot to load and, at the end of the session, overwrite.
        data_path: PathBuf,
        /// The eager input directory stdin updates are written to.
        target_dir: DirName,
        /// Run a collection every this many iterations; `0` disables periodic collection.
        gc_interval: usize,
    },
}

/// Everything that can keep a session from completing.
#[derive(Debug)]
pub enum DriverError {
    /// A fatal error surfaced from `Context::update` or a write; fatal in the calling frame.
    Engine(EngineError),
    /// Loading or saving the arena failed.
    Persist(PersistError),
    /// Reading stdin failed.
    Io(std::io::Error),
}

impl core::fmt::Display for DriverError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Engine(e) => write!(f, "engine error: {e}"),
            Self::Persist(e) => write!(f, "persistence error: {e}"),
            Self::Io(e) => write!(f, "stdin read error: {e}"),
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Engine(e) => Some(e),
            Self::Persist(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<EngineError> for DriverError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl From<PersistError> for DriverError {
    fn from(e: PersistError) -> Self {
        Self::Persist(e)
    }
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Runs one session against a freshly constructed `Context`.
///
/// `init` registers the client's input directories, mappers, reducers, and lazy directories — the
/// same routine for both session kinds, since `Session::Data` needs the topology rebuilt before
/// [`persist::apply`] can restore entries into it. `stdin` is only read for `Session::Data`.
pub fn run(
    session: Session,
    init: impl FnOnce(&mut Context),
    stdin: &mut impl Read,
    body: impl FnMut(&mut Context) -> DriverControl,
) -> Result<(), DriverError> {
    match session {
        Session::Init { out_path } => run_init(&out_path, init),
        Session::Data {
            data_path,
            target_dir,
            gc_interval,
        } => run_data(&data_path, &target_dir, init, stdin, gc_interval, body),
    }
}

fn run_init(out_path: &StdPath, init: impl FnOnce(&mut Context)) -> Result<(), DriverError> {
    let mut ctx = Context::new();
    init(&mut ctx);
    persist::save(&ctx, out_path)?;
    Ok(())
}

fn run_data(
    data_path: &StdPath,
    target_dir: &DirName,
    init: impl FnOnce(&mut Context),
    stdin: &mut impl Read,
    gc_interval: usize,
    body: impl FnMut(&mut Context) -> DriverControl,
) -> Result<(), DriverError> {
    let mut ctx = Context::new();
    init(&mut ctx);
    let loaded = persist::load(data_path)?;
    persist::apply(&mut ctx, loaded);

    let mut finalizers = FinalizerRegistry::new();
    run_with_gc(&mut ctx, target_dir, stdin, gc_interval, &mut finalizers, body)?;

    persist::save(&ctx, data_path)?;
    Ok(())
}

/// Drives `ctx` in place: applies one batch of stdin updates to `target_dir`, ticks, runs
/// `Context::update`, invokes `body`, and repeats until `body` returns [`DriverControl::Stop`] or
/// stdin reaches EOF. Collects every `gc_interval` iterations (`0` disables it).
///
/// Exposed separately from [`run`] so a caller that already holds a loaded, initialized `Context`
/// — the CLI's `selftest` subcommand, a benchmark harness — can drive it without going through a
/// file-backed session.
pub fn run_with_gc(
    ctx: &mut Context,
    target_dir: &DirName,
    stdin: &mut impl Read,
    gc_interval: usize,
    finalizers: &mut FinalizerRegistry,
    mut body: impl FnMut(&mut Context) -> DriverControl,
) -> Result<GcStats, DriverError> {
    let mut parser = StdinParser::new();
    let mut stats = GcStats::default();
    let mut iterations: usize = 0;

    loop {
        let (entries, eof) = read_one_batch(stdin, &mut parser)?;
        if !entries.is_empty() {
            let writes: Vec<_> = entries
                .into_iter()
                .map(|(key, value)| {
                    let id = ctx.interner_mut().intern(File::Str(value));
                    (key, vec![id])
                })
                .collect();
            ctx.write_array_many(target_dir, writes)?;
        }

        ctx.update()?;
        let control = body(ctx);

        iterations += 1;
        if gc_interval > 0 && iterations % gc_interval == 0 {
            stats = gc::collect(ctx, finalizers);
        }

        if control == DriverControl::Stop || eof {
            break;
        }
    }

    Ok(stats)
}

/// Reads from `stdin` until a [`StdinEvent::Batch`] separator is parsed or the stream reaches
/// EOF, returning the entries accumulated and whether EOF was hit.
fn read_one_batch(
    stdin: &mut impl Read,
    parser: &mut StdinParser,
) -> std::io::Result<(Vec<(skfs_core::BaseName, String)>, bool)> {
    let mut entries = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = stdin.read(&mut buf)?;
        if n == 0 {
            return Ok((entries, true));
        }
        for event in parser.feed(&buf[..n]) {
            match event {
                StdinEvent::Entry { key, value } => entries.push((key, value)),
                StdinEvent::Batch => return Ok((entries, false)),
            }
        }
    }
}
