// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wires the mini language into `skfs_engine` as a client: an eager input directory holds source
//! text, a lazy directory holds the parsed/type-checked/evaluated result, recomputed on demand and
//! invalidated whenever the corresponding source entry is rewritten.
//!
//! This is the "just enough to exercise the engine's lazy/eager directory interfaces end to end"
//! collaborator: it has no module system, no functions, and no
//! host calls, only the handful of constructs needed to demonstrate a real dependency edge from a
//! lazy compute into an eager input.

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use skfs_core::{BaseName, DirName, File, FileId, FileInterner};
use skfs_engine::context::Context;
use skfs_engine::error::EngineError;

use crate::eval::{self, Value};
use crate::parser::parse_source;
use crate::types::infer;

/// The outcome of running one program: either the value it evaluated to, or the first error
/// encountered lexing, parsing, type-checking, or evaluating it.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgramOutcome {
    /// Evaluated successfully to an integer.
    Int(i64),
    /// Evaluated successfully to a boolean.
    Bool(bool),
    /// Failed somewhere in the pipeline; holds a human-readable message.
    Error(String),
}

/// The convention a [`ProgramOutcome`] is encoded as a single [`File`] under.
///
/// There is no dedicated `File::Result` variant (`skfs_core::File` is a closed union shared by
/// every client, not just this one), so a failed program is represented as a `File::Str` whose
/// text starts with this prefix; anything else is a successful `File::Int` or `File::Bool`.
const ERROR_PREFIX: &str = "error: ";

impl ProgramOutcome {
    fn into_file(self) -> File {
        match self {
            Self::Int(n) => File::Int(n),
            Self::Bool(b) => File::Bool(b),
            Self::Error(message) => File::Str(format!("{ERROR_PREFIX}{message}")),
        }
    }

    /// Decodes the `File` a [`ProgramOutcome`] was interned as back into one.
    #[must_use]
    pub fn from_file(file: &File) -> Self {
        match file {
            File::Int(n) => Self::Int(*n),
            File::Bool(b) => Self::Bool(*b),
            File::Str(s) => match s.strip_prefix(ERROR_PREFIX) {
                Some(message) => Self::Error(message.into()),
                None => Self::Error(format!("malformed outcome encoding: {s}")),
            },
            other => Self::Error(format!("malformed outcome encoding: {other:?}")),
        }
    }

    /// Reads `key`'s cached or freshly forced outcome out of `values`, decoding the first entry
    /// (or [`Self::Error`] if the lazy directory produced nothing, e.g. the source key was never
    /// written).
    #[must_use]
    pub fn from_values(values: &[FileId], interner: &FileInterner) -> Self {
        match values.first() {
            Some(id) => Self::from_file(interner.get(*id)),
            None => Self::Error(String::from("no source for this program")),
        }
    }
}

fn run_program(source: &str) -> ProgramOutcome {
    let expr = match parse_source(source) {
        Ok(expr) => expr,
        Err(e) => return ProgramOutcome::Error(format!("{e}")),
    };
    if let Err(e) = infer(&expr) {
        return ProgramOutcome::Error(format!("{e}"));
    }
    match eval::eval(&expr) {
        Ok(Value::Int(n)) => ProgramOutcome::Int(n),
        Ok(Value::Bool(b)) => ProgramOutcome::Bool(b),
        Err(e) => ProgramOutcome::Error(format!("{e}")),
    }
}

/// Registers `source_dir` as a plain eager input directory and `result_dir` as a lazy directory
/// whose entries are this language's pipeline applied to the matching key in `source_dir`.
///
/// Forcing `result_dir`'s key `k` reads `source_dir`'s key `k` through the dependency-recording
/// [`skfs_engine::context::LazyCtx`] handle the compute closure receives, so rewriting the source
/// at `k` invalidates exactly that cached result rather than the whole directory.
pub fn install(ctx: &mut Context, source_dir: DirName, result_dir: DirName) -> Result<(), EngineError> {
    ctx.mkdir(source_dir.clone(), true)?;
    let compute: skfs_engine::lazy::ComputeFn = Rc::new(move |key, reader| {
        let source_values = reader.get_eager(&source_dir, key).unwrap_or_default();
        let outcome = match source_values.first() {
            Some(id) => match reader.ctx_interner().get(*id) {
                File::Str(source) => run_program(source),
                other => ProgramOutcome::Error(format!("source entry is not text: {other:?}")),
            },
            None => ProgramOutcome::Error(String::from("no source for this program")),
        };
        let id = reader.intern(outcome.into_file());
        vec![id]
    });
    ctx.mkdir_lazy(result_dir, compute)?;
    Ok(())
}

/// Writes `source` as the program text at `key` within `source_dir`.
pub fn set_source(ctx: &mut Context, source_dir: &DirName, key: BaseName, source: impl Into<Box<str>>) -> Result<(), EngineError> {
    let id = ctx.interner_mut().intern(File::Str(source.into().into()));
    ctx.write_array(source_dir, key, vec![id])
}

/// Forces and decodes `key`'s outcome out of `result_dir`.
pub fn get_outcome(ctx: &mut Context, result_dir: &DirName, key: &BaseName) -> Result<ProgramOutcome, EngineError> {
    let values = ctx.force_lazy(result_dir, key)?;
    Ok(ProgramOutcome::from_values(&values, ctx.interner()))
}
