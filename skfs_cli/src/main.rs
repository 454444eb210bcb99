// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thin binary wrapper: collects argv and stdio, hands them to [`skfs_cli::run`], exits with the
//! code it returns. All the actual logic lives in the library half so it's testable without a
//! subprocess.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let argv = std::env::args().skip(1);
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let code = skfs_cli::run(argv, &mut stdin, &mut stdout);
    ExitCode::from(code)
}
