// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flag parsing for the `skfs` binary: `--init <path>`, `--data <path>`, `selftest`.
//!
//! Hand-rolled rather than built on a derive-macro argument framework: this CLI's surface is
//! exactly two mutually exclusive flags plus one subcommand, which doesn't justify pulling in a
//! parsing crate.

use std::path::PathBuf;

use crate::error::CliError;

/// What the CLI was asked to do, fully parsed and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `--init <path>`: build a fresh context and snapshot it.
    Init {
        /// Where to write the snapshot.
        path: PathBuf,
    },
    /// `--data <path>`: load a snapshot, drive the stdin/update loop, commit back.
    Data {
        /// The snapshot to load and overwrite.
        path: PathBuf,
        /// Run a collection every this many iterations (`0` disables it). Defaults to `0`.
        gc_interval: usize,
        /// Install a profiling trace sink around `update()` and mapper reruns.
        trace: bool,
    },
    /// `selftest`: run the built-in conformance checks and exit 23 on the first failure.
    Selftest,
}

/// Parses `args` (the program's argv, *not* including `argv[0]`).
///
/// # Errors
///
/// Returns [`CliError`] for any unrecognized option, stray positional argument, missing flag
/// value, conflicting `--init`/`--data`, or missing mode — the CLI convention is exit
/// code 2 plus a help summary for every one of these.
pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Command, CliError> {
    let mut args = args.into_iter().peekable();

    if args.peek().map(String::as_str) == Some("selftest") {
        args.next();
        if let Some(extra) = args.next() {
            return Err(CliError::UnexpectedPositional(extra));
        }
        return Ok(Command::Selftest);
    }

    let mut init_path: Option<PathBuf> = None;
    let mut data_path: Option<PathBuf> = None;
    let mut gc_interval: usize = 0;
    let mut trace = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--init" => {
                let value = args.next().ok_or(CliError::MissingValue("--init"))?;
                init_path = Some(PathBuf::from(value));
            }
            "--data" => {
                let value = args.next().ok_or(CliError::MissingValue("--data"))?;
                data_path = Some(PathBuf::from(value));
            }
            "--gc-interval" => {
                let value = args.next().ok_or(CliError::MissingValue("--gc-interval"))?;
                gc_interval = value.parse().map_err(|_| CliError::MissingValue("--gc-interval"))?;
            }
            "--trace" => trace = true,
            other if other.starts_with("--") => return Err(CliError::UnknownOption(other.into())),
            other => return Err(CliError::UnexpectedPositional(other.into())),
        }
    }

    match (init_path, data_path) {
        (Some(_), Some(_)) => Err(CliError::ConflictingModes),
        (Some(path), None) => Ok(Command::Init { path }),
        (None, Some(path)) => Ok(Command::Data { path, gc_interval, trace }),
        (None, None) => Err(CliError::MissingMode),
    }
}

/// The help summary printed to stderr alongside exit code 2.
pub const HELP: &str = "\
usage: skfs --init <path>
       skfs --data <path> [--gc-interval <n>] [--trace]
       skfs selftest

  --init <path>        build a fresh context and snapshot it to <path>
  --data <path>         load <path>, drive stdin updates, commit back to <path>
  --gc-interval <n>     run a collection every <n> update iterations (default: 0, disabled)
  --trace               install a profiling trace sink around update() and mapper reruns
  selftest               run the built-in conformance checks
";

#[cfg(test)]
mod tests {
    use super::*;

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn parses_init() {
        assert_eq!(
            parse(args(&["--init", "snap.bin"])).unwrap(),
            Command::Init { path: "snap.bin".into() }
        );
    }

    #[test]
    fn parses_data_with_optional_flags() {
        assert_eq!(
            parse(args(&["--data", "snap.bin", "--gc-interval", "10", "--trace"])).unwrap(),
            Command::Data {
                path: "snap.bin".into(),
                gc_interval: 10,
                trace: true,
            }
        );
    }

    #[test]
    fn parses_selftest() {
        assert_eq!(parse(args(&["selftest"])).unwrap(), Command::Selftest);
    }

    #[test]
    fn rejects_both_init_and_data() {
        assert!(matches!(
            parse(args(&["--init", "a", "--data", "b"])),
            Err(CliError::ConflictingModes)
        ));
    }

    #[test]
    fn rejects_no_mode_at_all() {
        assert!(matches!(parse(args(&[])), Err(CliError::MissingMode)));
    }

    #[test]
    fn rejects_unknown_option() {
        assert!(matches!(
            parse(args(&["--bogus"])),
            Err(CliError::UnknownOption(opt)) if opt == "--bogus"
        ));
    }

    #[test]
    fn rejects_stray_positional_argument() {
        assert!(matches!(
            parse(args(&["--init", "a", "extra"])),
            Err(CliError::UnexpectedPositional(arg)) if arg == "extra"
        ));
    }

    #[test]
    fn rejects_flag_missing_its_value() {
        assert!(matches!(parse(args(&["--init"])), Err(CliError::MissingValue("--init"))));
    }

    #[test]
    fn selftest_rejects_trailing_arguments() {
        assert!(matches!(
            parse(args(&["selftest", "extra"])),
            Err(CliError::UnexpectedPositional(arg)) if arg == "extra"
        ));
    }
}
