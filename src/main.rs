// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/main.rs

// The renc binary: logging setup, then the host on its own thread

// <>

use renc::host::{self, HostOptions};

use std::process;
use std::thread;

/// The evaluator recurses per nested call; give it room
const STACK_SIZE: usize = 256 * 1024 * 1024;

fn main() {
    let opts = HostOptions::from_env();

    let level = if opts.trace {
        log::LevelFilter::Trace
    } else if opts.verbose {
        log::LevelFilter::Info
    } else if opts.quiet() {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Warn
    };
    if let Err(e) = simple_logger::SimpleLogger::new().with_level(level).init() {
        eprintln!("logger setup failed: {}", e);
    }

    let interp = thread::Builder::new()
        .name("interp".to_string())
        .stack_size(STACK_SIZE)
        .spawn(move || host::run(&opts));

    let code = match interp.map(|h| h.join()) {
        Ok(Ok(code)) => code,
        Ok(Err(_)) => {
            log::error!("interpreter thread panicked");
            host::EXIT_ERROR
        }
        Err(e) => {
            log::error!("cannot start interpreter thread: {}", e);
            host::EXIT_ERROR
        }
    };
    process::exit(code);
}
