// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy mapped onto the process's exit codes.

use std::fmt;

use skfs_engine::driver::DriverError;

/// Everything [`crate::args::parse`] can reject, each printed with the help summary (exit code 2).
#[derive(Debug)]
pub enum CliError {
    /// An option this CLI doesn't recognize.
    UnknownOption(String),
    /// A flag that takes a value wasn't given one.
    MissingValue(&'static str),
    /// A bare argument with no flag in front of it.
    UnexpectedPositional(String),
    /// `--init` and `--data` were both given; they're mutually exclusive.
    ConflictingModes,
    /// Neither `--init` nor `--data` nor `selftest` was given.
    MissingMode,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOption(opt) => write!(f, "unknown option: {opt}"),
            Self::MissingValue(flag) => write!(f, "{flag} requires a value"),
            Self::UnexpectedPositional(arg) => write!(f, "unexpected argument: {arg}"),
            Self::ConflictingModes => write!(f, "--init and --data are mutually exclusive"),
            Self::MissingMode => write!(f, "one of --init, --data, or selftest is required"),
        }
    }
}

impl std::error::Error for CliError {}

/// Top-level failure from running the CLI, already carrying the exit code it maps onto.
#[derive(Debug)]
pub enum AppError {
    /// A malformed invocation (exit code 2).
    Cli(CliError),
    /// A fatal failure from the driver loop — engine, persistence, or stdin I/O (exit code 1).
    Driver(DriverError),
    /// A selftest assertion failed (exit code 23).
    SelftestFailed(String),
}

impl AppError {
    /// The process exit code this failure maps onto.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Cli(_) => 2,
            Self::Driver(_) => 1,
            Self::SelftestFailed(_) => 23,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli(e) => write!(f, "{e}"),
            Self::Driver(e) => write!(f, "{e}"),
            Self::SelftestFailed(msg) => write!(f, "selftest failed: {msg}"),
        }
    }
}

impl From<CliError> for AppError {
    fn from(e: CliError) -> Self {
        Self::Cli(e)
    }
}

impl From<DriverError> for AppError {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}
