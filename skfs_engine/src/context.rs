// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The engine's root handle: directories, globals, time, and the recompute loop.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;

use skfs_core::{BaseName, DirName, File, FileId, FileInterner, Path, Time};

use crate::dirty::{DepChannel, DirtyEngine};
use crate::dispatch::{Dispatcher, InlineDispatcher};
use crate::eager::EagerDir;
use crate::error::EngineError;
use crate::lazy::{LazyDir, LazyState};
use crate::plan::RunPlan;
use crate::report::RunSummary;
use crate::trace::{ScopeKind, TraceSink};

/// Result type for fallible `Context` operations.
pub type Result<T> = core::result::Result<T, EngineError>;

/// The three states a directory name can resolve to (exactly one of these, never
/// more than one, never none once created).
pub enum Dir {
    /// A materialized directory of entries, written directly or by a mapper.
    Eager(EagerDir),
    /// A directory whose entries are computed on demand from a closure.
    Lazy(LazyDir),
    /// A tombstone left behind by a removed directory; writes to it are rejected.
    Deleted {
        /// The time the directory was removed.
        time: Time,
    },
}

impl Dir {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Eager(_) => "eager",
            Self::Lazy(_) => "lazy",
            Self::Deleted { .. } => "deleted",
        }
    }
}

/// The engine's root handle.
///
/// Owns every directory, the interner shared by their entries, the two dirty-tracking channels,
/// the monotonic clock, and a small untyped slot for process-wide globals.
pub struct Context {
    time: Time,
    dirs: BTreeMap<DirName, Dir>,
    interner: FileInterner,
    dirty: DirtyEngine,
    globals: BTreeMap<String, Box<dyn Any>>,
    trace: Option<Box<dyn TraceSink>>,
    /// Paths currently mid-force, innermost last. A lazy compute that reads a path already on this
    /// stack is a dependency cycle; `force_lazy` checks it directly rather than relying on
    /// the lazy dirty graph to reject the edge, since the lazy channel is `CycleHandling::Allow`.
    lazy_in_flight: Vec<Path>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates an empty context at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            time: Time::ZERO,
            dirs: BTreeMap::new(),
            interner: FileInterner::new(),
            dirty: DirtyEngine::new(),
            globals: BTreeMap::new(),
            trace: None,
            lazy_in_flight: Vec::new(),
        }
    }

    /// Installs a [`TraceSink`] to receive scope callbacks around `update()` and mapper reruns.
    ///
    /// Replaces any previously installed sink. Pass `None` to go back to tracing nothing.
    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.trace = sink;
    }

    /// Returns the context's current time.
    #[must_use]
    pub const fn time(&self) -> Time {
        self.time
    }

    /// Advances and returns the context's clock.
    ///
    /// Every write batch is stamped with one tick: same-tick writes are only
    /// valid for disjoint paths, which callers are responsible for respecting.
    pub fn tick(&mut self) -> Time {
        self.time = self.time.next();
        self.time
    }

    /// Provides direct access to the shared interner.
    pub const fn interner(&self) -> &FileInterner {
        &self.interner
    }

    /// Provides mutable access to the shared interner.
    pub fn interner_mut(&mut self) -> &mut FileInterner {
        &mut self.interner
    }

    /// Provides access to the dirty-tracking engine.
    pub const fn dirty(&self) -> &DirtyEngine {
        &self.dirty
    }

    /// Provides mutable access to the dirty-tracking engine.
    pub fn dirty_mut(&mut self) -> &mut DirtyEngine {
        &mut self.dirty
    }

    /// Creates a new eager directory at `name`.
    ///
    /// Fails with [`EngineError::DuplicateDir`] if `name` already resolves to a live (non-deleted)
    /// directory.
    pub fn mkdir(&mut self, name: DirName, is_input: bool) -> Result<()> {
        if matches!(self.dirs.get(&name), Some(d) if !matches!(d, Dir::Deleted { .. })) {
            return Err(EngineError::DuplicateDir(name));
        }
        self.dirs.insert(name.clone(), Dir::Eager(EagerDir::new(name, is_input)));
        Ok(())
    }

    /// Creates a new lazy directory at `name` computed by `compute`.
    pub fn mkdir_lazy(&mut self, name: DirName, compute: crate::lazy::ComputeFn) -> Result<()> {
        if matches!(self.dirs.get(&name), Some(d) if !matches!(d, Dir::Deleted { .. })) {
            return Err(EngineError::DuplicateDir(name));
        }
        self.dirs.insert(name.clone(), Dir::Lazy(LazyDir::new(name, compute)));
        Ok(())
    }

    /// Returns the `Dir` at `name`, whatever its variant.
    pub fn unsafe_get_dir(&self, name: &DirName) -> Result<&Dir> {
        self.dirs.get(name).ok_or_else(|| EngineError::DirNotFound(name.clone()))
    }

    /// Returns the eager directory at `name`, failing if it's missing or a different variant.
    pub fn unsafe_get_eager_dir(&self, name: &DirName) -> Result<&EagerDir> {
        match self.dirs.get(name) {
            Some(Dir::Eager(d)) => Ok(d),
            Some(other) => Err(EngineError::DirTypeMismatch {
                dir: name.clone(),
                expected: "eager",
                found: other.kind(),
            }),
            None => Err(EngineError::DirNotFound(name.clone())),
        }
    }

    /// Returns the eager directory at `name` if it exists and is the right variant, `None`
    /// otherwise (no error on a missing or mismatched directory).
    pub fn maybe_get_eager_dir(&self, name: &DirName) -> Option<&EagerDir> {
        match self.dirs.get(name) {
            Some(Dir::Eager(d)) => Some(d),
            _ => None,
        }
    }

    /// Returns the lazy directory at `name`, failing if it's missing or a different variant.
    pub fn unsafe_get_lazy_dir(&self, name: &DirName) -> Result<&LazyDir> {
        match self.dirs.get(name) {
            Some(Dir::Lazy(d)) => Ok(d),
            Some(other) => Err(EngineError::DirTypeMismatch {
                dir: name.clone(),
                expected: "lazy",
                found: other.kind(),
            }),
            None => Err(EngineError::DirNotFound(name.clone())),
        }
    }

    /// Temporarily removes the directory at `name` so it can be mutated alongside a `&mut
    /// Context` that no longer aliases it, then must be returned via [`Context::restore_dir`].
    ///
    /// This is how mapper reruns get a `&mut EagerDir` and a `&mut Context` simultaneously without
    /// violating the borrow checker: the directory being recomputed is never borrowed out of
    /// `self.dirs` at the same time `self` itself is borrowed mutably.
    pub fn take_dir(&mut self, name: &DirName) -> Option<Dir> {
        self.dirs.remove(name)
    }

    /// Reinserts a directory previously removed by [`Context::take_dir`].
    pub fn restore_dir(&mut self, name: DirName, dir: Dir) {
        self.dirs.insert(name, dir);
    }

    /// Replaces the directory at `name` wholesale. Used by persistence/GC to install a
    /// reconstructed directory.
    pub fn set_dir(&mut self, name: DirName, dir: Dir) {
        self.dirs.insert(name, dir);
    }

    /// Returns every directory name currently registered, in ascending order.
    pub fn dir_names(&self) -> impl Iterator<Item = &DirName> {
        self.dirs.keys()
    }

    /// Returns every directory, by name, currently registered. Used by GC to walk and rewrite
    /// `FileId`s across the whole graph without the take/restore dance `rerun_mapper_for` needs
    /// (GC never needs `&mut Context` and `&mut Dir` at the same time).
    pub fn dirs_mut(&mut self) -> impl Iterator<Item = (&DirName, &mut Dir)> {
        self.dirs.iter_mut()
    }

    /// Returns a mutable reference to the eager directory at `name`, failing if it's missing or a
    /// different variant. Used by persistence to restore entries without the borrow-splitting
    /// `take_dir`/`restore_dir` pair, since restoring an entry needs no other access to `self`.
    pub fn eager_dir_mut(&mut self, name: &DirName) -> Result<&mut EagerDir> {
        match self.dirs.get_mut(name) {
            Some(Dir::Eager(d)) => Ok(d),
            Some(other) => Err(EngineError::DirTypeMismatch {
                dir: name.clone(),
                expected: "eager",
                found: other.kind(),
            }),
            None => Err(EngineError::DirNotFound(name.clone())),
        }
    }

    /// Overwrites the context's clock directly, bypassing `tick()`'s monotonic bump. Used only by
    /// persistence to restore the time a loaded arena was committed at.
    pub fn restore_time(&mut self, time: Time) {
        self.time = time;
    }

    /// Marks the directory at `name` deleted. Further writes to it fail with
    /// [`EngineError::WriteToDeletedDir`].
    pub fn rmdir(&mut self, name: &DirName) -> Result<()> {
        let time = self.tick();
        match self.dirs.get_mut(name) {
            Some(dir @ Dir::Eager(_)) | Some(dir @ Dir::Lazy(_)) => {
                *dir = Dir::Deleted { time };
                Ok(())
            }
            Some(Dir::Deleted { .. }) => Ok(()),
            None => Err(EngineError::DirNotFound(name.clone())),
        }
    }

    /// Writes `values` to `key` within the eager directory at `dir`, ticking the clock once for
    /// this single write.
    pub fn write_array(&mut self, dir: &DirName, key: BaseName, values: Vec<skfs_core::FileId>) -> Result<()> {
        let time = self.tick();
        match self.dirs.get_mut(dir) {
            Some(Dir::Eager(eager)) => {
                if eager.write_array(key.clone(), values, time) {
                    let dirty_key = self.dirty.intern(Path::new(dir.clone(), key));
                    self.dirty.mark_dirty(dirty_key, DepChannel::Eager);
                    self.dirty.mark_dirty(dirty_key, DepChannel::Lazy);
                }
                Ok(())
            }
            Some(Dir::Lazy(_)) => Err(EngineError::DirTypeMismatch {
                dir: dir.clone(),
                expected: "eager",
                found: "lazy",
            }),
            Some(Dir::Deleted { .. }) => Err(EngineError::WriteToDeletedDir(dir.clone())),
            None => Err(EngineError::DirNotFound(dir.clone())),
        }
    }

    /// Replaces `key`'s entry in the eager directory at `dir` with a tombstone, ticking the clock
    /// once and propagating dirtiness the same way `write_array` does for a write (covering cases such as
    /// `remove` resyncs downstream mappers just like a write with new values would).
    pub fn remove(&mut self, dir: &DirName, key: &BaseName) -> Result<()> {
        let time = self.tick();
        match self.dirs.get_mut(dir) {
            Some(Dir::Eager(eager)) => {
                if eager.remove(key, time) {
                    let dirty_key = self.dirty.intern(Path::new(dir.clone(), key.clone()));
                    self.dirty.mark_dirty(dirty_key, DepChannel::Eager);
                    self.dirty.mark_dirty(dirty_key, DepChannel::Lazy);
                }
                Ok(())
            }
            Some(Dir::Lazy(_)) => Err(EngineError::DirTypeMismatch {
                dir: dir.clone(),
                expected: "eager",
                found: "lazy",
            }),
            Some(Dir::Deleted { .. }) => Err(EngineError::WriteToDeletedDir(dir.clone())),
            None => Err(EngineError::DirNotFound(dir.clone())),
        }
    }

    /// Writes a whole batch of `(key, values)` pairs to the eager directory at `dir` as a single
    /// tick, then fires its reducer (if any) once over the batch's aggregated deltas (the
    /// one-aggregated-delta-per-batch decision).
    pub fn write_array_many(
        &mut self,
        dir: &DirName,
        writes: impl IntoIterator<Item = (BaseName, Vec<skfs_core::FileId>)>,
    ) -> Result<()> {
        let time = self.tick();
        let Some(mut taken) = self.take_dir(dir) else {
            return Err(EngineError::DirNotFound(dir.clone()));
        };
        let result = match &mut taken {
            Dir::Eager(eager) => {
                let deltas = eager.write_array_many(writes, time);
                for (key, _) in &deltas {
                    let dirty_key = self.dirty.intern(Path::new(dir.clone(), key.clone()));
                    self.dirty.mark_dirty(dirty_key, DepChannel::Eager);
                    self.dirty.mark_dirty(dirty_key, DepChannel::Lazy);
                }
                if !deltas.is_empty() {
                    let only_deltas: Vec<_> = deltas.into_iter().map(|(_, d)| d).collect();
                    eager.apply_reducer(&only_deltas, &mut self.interner, time);
                }
                Ok(())
            }
            Dir::Lazy(_) => Err(EngineError::DirTypeMismatch {
                dir: dir.clone(),
                expected: "eager",
                found: "lazy",
            }),
            Dir::Deleted { .. } => Err(EngineError::WriteToDeletedDir(dir.clone())),
        };
        self.restore_dir(dir.clone(), taken);
        result
    }

    /// Sets a process-wide global keyed by `name`.
    pub fn set_global<T: Any + 'static>(&mut self, name: impl Into<String>, value: T) {
        self.globals.insert(name.into(), Box::new(value));
    }

    /// Returns the global previously set under `name`, if present and of type `T`.
    #[must_use]
    pub fn get_global<T: Any + 'static>(&self, name: &str) -> Option<&T> {
        self.globals.get(name).and_then(|v| v.downcast_ref::<T>())
    }

    /// Drains the eager channel in topological order, re-running each dirty key's owning
    /// directory's mapper (if it has one) against the current value of its source key, and
    /// replacing its dependency edges with whatever the rerun actually read.
    ///
    /// Returns once the eager channel is fully drained; does not touch the lazy channel — lazy
    /// entries are only flagged dirty here, and recomputed on demand by [`LazyDir::unsafe_get_array`].
    ///
    /// Internally this builds one [`RunPlan`] per drain round and executes it through
    /// [`InlineDispatcher`] — the only dispatcher today is serial, but
    /// `update`'s public behavior does not depend on that, so a future scheduler can be dropped in
    /// without reshaping this method.
    pub fn update(&mut self) -> Result<RunSummary> {
        if let Some(sink) = self.trace.as_mut() {
            sink.scope_enter(&ScopeKind::Update);
        }
        let mut summary = RunSummary::default();
        let result = (|| -> Result<()> {
            loop {
                let drained = self.dirty.drain(DepChannel::Eager);
                if drained.is_empty() {
                    break;
                }
                let paths: Vec<Path> = drained.into_iter().map(|(_, path)| path).collect();
                let mut plan = RunPlan::all(paths);
                let mut dispatcher = InlineDispatcher;
                let mut errored = None;
                let ran = dispatcher.dispatch(&mut plan, |path| {
                    if let Err(err) = self.rerun_mapper_for(path) {
                        errored = Some(err);
                    }
                });
                summary.recomputed_entries += ran;
                if let Some(err) = errored {
                    return Err(err);
                }
            }
            Ok(())
        })();
        self.mark_lazy_dependents_dirty(&mut summary);
        if let Some(sink) = self.trace.as_mut() {
            sink.scope_exit(&ScopeKind::Update);
        }
        result?;
        Ok(summary)
    }

    fn rerun_mapper_for(&mut self, source_path: &Path) -> Result<()> {
        let Some(out_name) = self.find_mapper_output_for(source_path.dir()) else {
            return Ok(());
        };
        if let Some(sink) = self.trace.as_mut() {
            sink.scope_enter(&ScopeKind::MapperRun {
                dir: out_name.clone(),
            });
        }
        let time = self.tick();
        let Some(source_values) = self
            .maybe_get_eager_dir(source_path.dir())
            .map(|d| d.get_array_raw(source_path.name()).to_vec())
        else {
            return Ok(());
        };

        let Some(mut taken) = self.take_dir(&out_name) else {
            return Ok(());
        };
        if let Dir::Eager(eager) = &mut taken {
            eager.run_mapper_for_key(
                source_path.name(),
                &source_values,
                source_path.clone(),
                time,
                &mut self.interner,
            );
            let out_key = source_path.name().clone();
            let dirty_key = self.dirty.intern(Path::new(out_name.clone(), out_key));
            self.dirty.mark_dirty(dirty_key, DepChannel::Eager);
            self.dirty.mark_dirty(dirty_key, DepChannel::Lazy);
        }
        self.restore_dir(out_name.clone(), taken);
        if let Some(sink) = self.trace.as_mut() {
            sink.scope_exit(&ScopeKind::MapperRun { dir: out_name });
        }
        Ok(())
    }

    fn find_mapper_output_for(&self, source: &DirName) -> Option<DirName> {
        self.dirs.iter().find_map(|(name, dir)| match dir {
            Dir::Eager(eager) if eager.source() == Some(source) => Some(name.clone()),
            _ => None,
        })
    }

    fn mark_lazy_dependents_dirty(&mut self, summary: &mut RunSummary) {
        let drained = self.dirty.drain(DepChannel::Lazy);
        for (_, path) in drained {
            if let Some(Dir::Lazy(lazy)) = self.dirs.get_mut(path.dir()) {
                lazy.mark_dirty(path.name());
                summary.invalidated_lazy_entries += 1;
            }
        }
    }

    /// Marks `key` in the lazy directory at `dir` dirty directly, without going through the
    /// dependency graph. Used to invalidate a lazy entry in response to something outside the
    /// graph this `Context` tracks (an external clock tick, a host-side cache flush).
    pub fn mark_lazy_dirty(&mut self, dir: &DirName, key: &BaseName) {
        if let Some(Dir::Lazy(lazy)) = self.dirs.get_mut(dir) {
            lazy.mark_dirty(key);
        }
    }

    /// Returns `key`'s value from the lazy directory at `dir`, computing and caching it if it
    /// isn't already clean.
    ///
    /// Every read `compute` performs through the [`LazyCtx`] it's given — of this directory, of
    /// another lazy directory, or of an eager directory — is recorded as a dependency edge on the
    /// lazy channel, so a later write that reaches any of them invalidates this cache too. A read
    /// that's already on the call stack (the fib-style self-referential case, or any cycle across
    /// several lazy directories) short-circuits to the entry's last good cache, or an empty value
    /// if it has never completed, instead of recursing forever.
    pub fn force_lazy(&mut self, dir: &DirName, key: &BaseName) -> Result<Vec<FileId>> {
        let path = Path::new(dir.clone(), key.clone());

        if self.lazy_in_flight.contains(&path) {
            return Ok(match self.dirs.get(dir) {
                Some(Dir::Lazy(lazy)) => lazy.cached_or_empty(key),
                _ => Vec::new(),
            });
        }

        let state = match self.dirs.get(dir) {
            Some(Dir::Lazy(lazy)) => lazy.state_of(key),
            Some(other) => {
                return Err(EngineError::DirTypeMismatch {
                    dir: dir.clone(),
                    expected: "lazy",
                    found: other.kind(),
                });
            }
            None => return Err(EngineError::DirNotFound(dir.clone())),
        };

        if state == Some(LazyState::Clean)
            && let Some(Dir::Lazy(lazy)) = self.dirs.get(dir)
            && let Some(cached) = lazy.maybe_get(key)
        {
            return Ok(cached.to_vec());
        }

        let compute = match self.dirs.get(dir) {
            Some(Dir::Lazy(lazy)) => lazy.compute_handle(),
            _ => unreachable!("checked above"),
        };
        if let Some(Dir::Lazy(lazy)) = self.dirs.get_mut(dir) {
            lazy.mark_in_flight(key);
        }
        self.lazy_in_flight.push(path.clone());

        let reader_key = self.dirty.intern(path.clone());
        let computed = {
            let mut reader = LazyCtx { ctx: self, deps: Vec::new() };
            let computed = compute(key, &mut reader);
            let deps = reader.deps;
            self.lazy_in_flight.pop();
            let dep_keys: Vec<_> = deps.iter().map(|p| self.dirty.intern(p.clone())).collect();
            self.dirty.set_dependencies(reader_key, dep_keys, DepChannel::Lazy);
            computed
        };

        if let Some(Dir::Lazy(lazy)) = self.dirs.get_mut(dir) {
            lazy.store_cache(key.clone(), computed.clone());
        }
        Ok(computed)
    }
}

/// A handle a lazy directory's [`crate::lazy::ComputeFn`] uses to read its dependencies.
///
/// Every [`LazyCtx::get_lazy`] and [`LazyCtx::get_eager`] call is recorded so `force_lazy` can
/// register the dependency edges the compute actually exercised once it returns — not a
/// statically declared set, since which paths a compute reads can depend on the values it reads
/// (the dependency set is whatever the most recent evaluation actually read).
pub struct LazyCtx<'a> {
    ctx: &'a mut Context,
    deps: Vec<Path>,
}

impl LazyCtx<'_> {
    /// Reads `key` from the lazy directory at `dir`, forcing it if necessary, and records the
    /// read as a dependency of the entry currently being computed.
    pub fn get_lazy(&mut self, dir: &DirName, key: &BaseName) -> Result<Vec<FileId>> {
        self.deps.push(Path::new(dir.clone(), key.clone()));
        self.ctx.force_lazy(dir, key)
    }

    /// Reads `key` from the eager directory at `dir` without recomputing anything, and records
    /// the read as a dependency of the entry currently being computed.
    pub fn get_eager(&mut self, dir: &DirName, key: &BaseName) -> Result<Vec<FileId>> {
        self.deps.push(Path::new(dir.clone(), key.clone()));
        let eager = self.ctx.unsafe_get_eager_dir(dir)?;
        Ok(eager.get_array_raw(key).to_vec())
    }

    /// Interns `file` into the shared interner.
    pub fn intern(&mut self, file: File) -> FileId {
        self.ctx.interner_mut().intern(file)
    }

    /// Provides read access to the shared interner, for inspecting values read via
    /// [`LazyCtx::get_lazy`] or [`LazyCtx::get_eager`].
    #[must_use]
    pub fn ctx_interner(&self) -> &FileInterner {
        self.ctx.interner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skfs_core::File;

    #[test]
    fn mkdir_rejects_duplicate_live_directories() {
        let mut ctx = Context::new();
        ctx.mkdir(DirName::new("/in/"), true).unwrap();
        assert!(matches!(
            ctx.mkdir(DirName::new("/in/"), true),
            Err(EngineError::DuplicateDir(_))
        ));
    }

    #[test]
    fn write_array_fails_against_a_deleted_directory() {
        let mut ctx = Context::new();
        ctx.mkdir(DirName::new("/in/"), true).unwrap();
        ctx.rmdir(&DirName::new("/in/")).unwrap();
        let id = ctx.interner_mut().intern(File::Int(1));
        assert!(matches!(
            ctx.write_array(&DirName::new("/in/"), BaseName::iid(1), alloc::vec![id]),
            Err(EngineError::WriteToDeletedDir(_))
        ));
    }

    #[test]
    fn write_array_ticks_the_clock() {
        let mut ctx = Context::new();
        ctx.mkdir(DirName::new("/in/"), true).unwrap();
        let before = ctx.time();
        let id = ctx.interner_mut().intern(File::Int(1));
        ctx.write_array(&DirName::new("/in/"), BaseName::iid(1), alloc::vec![id]).unwrap();
        assert!(ctx.time() > before);
    }

    #[test]
    fn remove_tombstones_an_entry_and_marks_it_dirty() {
        let mut ctx = Context::new();
        ctx.mkdir(DirName::new("/in/"), true).unwrap();
        let id = ctx.interner_mut().intern(File::Int(1));
        ctx.write_array(&DirName::new("/in/"), BaseName::iid(1), alloc::vec![id]).unwrap();

        ctx.remove(&DirName::new("/in/"), &BaseName::iid(1)).unwrap();

        let dir = ctx.maybe_get_eager_dir(&DirName::new("/in/")).unwrap();
        assert!(dir.entry(&BaseName::iid(1)).unwrap().values.is_empty());
    }

    #[test]
    fn global_roundtrips_through_downcast() {
        let mut ctx = Context::new();
        ctx.set_global("answer", 42i64);
        assert_eq!(ctx.get_global::<i64>("answer"), Some(&42));
        assert_eq!(ctx.get_global::<&str>("answer"), None);
    }
}
