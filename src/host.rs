// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/host.rs

// The command line host: option parsing, script and REPL drivers, and
// the mapping from interpreter outcomes to process exit codes.

// <>

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};

use crate::ren::cell::{Cell, Kind};
use crate::ren::error::Fail;
use crate::ren::{Interp, InterpConfig, RenErr};

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_HALT: i32 = 100;
pub const EXIT_HALT_STARTUP: i32 = 128;

const HISTORY_LINES: usize = 300;
const PROMPT: &str = ">> ";

#[derive(Parser, Debug, Default)]
#[command(name = "renc", about = "An evaluator for the Ren-C family of languages")]
#[command(disable_version_flag = true)]
pub struct HostOptions {
    /// Boot image to use instead of the built-in one
    #[arg(short = 'b', long, value_name = "FILE")]
    pub boot: Option<PathBuf>,

    /// Quiet mode with CGI defaults
    #[arg(short = 'c', long)]
    pub cgi: bool,

    #[arg(long, value_name = "SPEC")]
    pub debug: Option<String>,

    /// Evaluate an expression and exit
    #[arg(long = "do", value_name = "EXPR")]
    pub do_arg: Option<String>,

    /// Enter the REPL after the script finishes
    #[arg(long)]
    pub halt: bool,

    /// Script to run before the main one
    #[arg(long, value_name = "FILE")]
    pub import: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Security level; `+s` is short for `--secure quit`
    #[arg(long, value_name = "LEVEL")]
    pub secure: Option<String>,

    /// Log every evaluator step
    #[arg(short = 't', long)]
    pub trace: bool,

    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print the version, or check it against SPEC
    #[arg(short = 'V', long, value_name = "SPEC", num_args = 0..=1, default_missing_value = "")]
    pub version: Option<String>,

    /// Accepted for compatibility; there is no window
    #[arg(short = 'w', long = "no-window")]
    pub no_window: bool,

    pub script: Option<PathBuf>,

    /// Arguments handed to the script as `system/options/args`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl HostOptions {
    /// Parses the process arguments after normalization
    pub fn from_env() -> Self {
        HostOptions::parse_from(normalize_args(std::env::args()))
    }

    pub fn quiet(&self) -> bool {
        self.quiet || self.cgi
    }
}

/// Options whose value is the next argument
const VALUED: &[&str] = &["-b", "--boot", "--debug", "--do", "--import", "--profile", "--secure"];

/// Rewrites the short forms clap cannot express: `-?` asks for help,
/// `+s` means maximal security and `-s` none
pub fn normalize_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out = Vec::new();
    let mut args = args.into_iter().peekable();
    if let Some(program) = args.next() {
        out.push(program);
    }
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-?" => out.push("--help".to_string()),
            "+s" => out.extend(["--secure".to_string(), "quit".to_string()]),
            "-s" => out.extend(["--secure".to_string(), "allow".to_string()]),
            a if VALUED.contains(&a) => {
                out.push(arg);
                out.extend(args.next());
            }
            "-V" | "--version" => {
                out.push(arg);
                // the version spec is optional
                if let Some(spec) = args.next_if(|next| !next.starts_with(['-', '+'])) {
                    out.push(spec);
                }
            }
            _ if arg.starts_with('-') => out.push(arg),
            _ => {
                // everything after the script name belongs to the script
                out.push(arg);
                out.extend(args);
                break;
            }
        }
    }
    out
}

/// Exit code for an outcome, reporting errors on stderr
fn report(outcome: Result<(), RenErr>) -> i32 {
    match outcome {
        Ok(()) => EXIT_OK,
        Err(RenErr::Halt) => {
            log::info!("halted");
            EXIT_HALT
        }
        Err(RenErr::Quit(code)) => code,
        Err(e) => {
            eprintln!("{}", e);
            EXIT_ERROR
        }
    }
}

/// Makes SIGINT set the flag the evaluator polls for halts
#[cfg(unix)]
fn install_interrupt(flag: Arc<AtomicBool>) {
    if let Err(e) = signal_hook::flag::register(signal_hook::consts::SIGINT, flag) {
        log::warn!("cannot install the interrupt handler: {}", e);
    }
}

#[cfg(not(unix))]
fn install_interrupt(_flag: Arc<AtomicBool>) {}

/// Fills `system/options` from the command line
fn record_options(it: &mut Interp, opts: &HostOptions) -> Result<(), Fail> {
    if let Some(script) = &opts.script {
        let cell = it.string_cell(Kind::File, &script.to_string_lossy())?;
        it.set_option("script", cell)?;
    }
    let mut args = Vec::with_capacity(opts.args.len());
    for a in &opts.args {
        args.push(it.string_cell(Kind::String, a)?);
    }
    let block = it.block_cell(&args)?;
    it.set_option("args", block)?;

    let texts = [
        ("do-arg", opts.do_arg.clone()),
        ("secure", opts.secure.clone()),
        ("debug", opts.debug.clone()),
        ("boot", opts.boot.as_ref().map(|p| p.to_string_lossy().into_owned())),
        ("import", opts.import.as_ref().map(|p| p.to_string_lossy().into_owned())),
        ("profile", opts.profile.as_ref().map(|p| p.to_string_lossy().into_owned())),
    ];
    for (name, text) in texts {
        if let Some(text) = text {
            let cell = it.string_cell(Kind::String, &text)?;
            it.set_option(name, cell)?;
        }
    }
    it.set_option("quiet", Cell::logic(opts.quiet()))?;
    it.set_option("halt", Cell::logic(opts.halt))?;
    it.set_option("trace", Cell::logic(opts.trace))?;
    it.set_option("verbose", Cell::logic(opts.verbose))?;
    it.set_option("cgi", Cell::logic(opts.cgi))?;
    Ok(())
}

/// Runs a script file in the user context
pub fn run_file(it: &mut Interp, path: &std::path::Path) -> Result<(), RenErr> {
    let text = std::fs::read_to_string(path).map_err(|e| RenErr::Load(format!("{}: {}", path.display(), e)))?;
    let name = path.to_string_lossy();
    log::info!("running {}", name);
    it.trap_unhaltable(|it| it.do_string(&text, Some(&name)))
        .map(|_| ())
        .map_err(|fail| it.to_ren_err(fail))
}

/// Evaluates one REPL entry, printing its result. `Some` carries an
/// exit code when the session should end.
pub fn repl_line(it: &mut Interp, line: &str) -> Option<i32> {
    match it.interpret(line) {
        Ok(out) => {
            if !out.is_empty() {
                println!("== {}", out);
            }
            None
        }
        Err(RenErr::Halt) => {
            println!("[interrupted]");
            None
        }
        Err(RenErr::Quit(code)) => Some(code),
        Err(e) => {
            eprintln!("{}", e);
            None
        }
    }
}

/// Read-eval-print loop over the terminal
pub fn repl(it: &mut Interp, quiet: bool) -> i32 {
    let config = match Config::builder().max_history_size(HISTORY_LINES) {
        Ok(b) => b.auto_add_history(false).build(),
        Err(e) => {
            log::error!("bad line editor configuration: {}", e);
            return EXIT_ERROR;
        }
    };
    let mut editor = match DefaultEditor::with_config(config) {
        Ok(ed) => ed,
        Err(e) => {
            log::error!("cannot open the line editor: {}", e);
            return EXIT_ERROR;
        }
    };
    if !quiet {
        println!("RENC {}", env!("CARGO_PKG_VERSION"));
    }

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = editor.add_history_entry(line.as_str()) {
                    log::warn!("history: {}", e);
                }
                if let Some(code) = repl_line(it, &line) {
                    return code;
                }
            }
            // ^C at the prompt abandons the line
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => return EXIT_OK,
            Err(e) => {
                log::error!("reading input failed: {}", e);
                return EXIT_ERROR;
            }
        }
    }
}

/// Runs the host with parsed options and returns the exit code
pub fn run(opts: &HostOptions) -> i32 {
    if let Some(spec) = &opts.version {
        if spec.is_empty() {
            println!("renc {}", env!("CARGO_PKG_VERSION"));
            return EXIT_OK;
        }
        log::warn!("version checks are not supported; ignoring {}", spec);
    }
    for (name, given) in [
        ("--boot", opts.boot.is_some()),
        ("--debug", opts.debug.is_some()),
        ("--profile", opts.profile.is_some()),
    ] {
        if given {
            log::info!("{} has no effect in this build", name);
        }
    }

    let config = InterpConfig {
        trace: opts.trace,
        ..InterpConfig::default()
    };
    let mut it = match Interp::new(config) {
        Ok(it) => it,
        Err(RenErr::Halt) => return EXIT_HALT_STARTUP,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_ERROR;
        }
    };

    install_interrupt(Arc::clone(&it.signals));

    if let Err(fail) = record_options(&mut it, opts) {
        return report(Err(it.to_ren_err(fail)));
    }

    if let Some(import) = &opts.import {
        let code = report(run_file(&mut it, import));
        if code != EXIT_OK {
            return code;
        }
    }

    if let Some(expr) = &opts.do_arg {
        let outcome = it.trap_unhaltable(|it| it.do_string(expr, None)).map(|_| ());
        let outcome = outcome.map_err(|fail| it.to_ren_err(fail));
        let code = report(outcome);
        if !opts.halt || code != EXIT_OK {
            return code;
        }
    }

    if let Some(script) = &opts.script {
        let code = report(run_file(&mut it, script));
        if !opts.halt || code != EXIT_OK {
            return code;
        }
    }

    repl(&mut it, opts.quiet())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn options(list: &[&str]) -> HostOptions {
        HostOptions::parse_from(normalize_args(args(list)))
    }

    #[test]
    fn short_forms_are_normalized() {
        assert_eq!(
            normalize_args(args(&["renc", "+s", "-?"])),
            args(&["renc", "--secure", "quit", "--help"])
        );
        // flags after the script name are left for the script
        assert_eq!(
            normalize_args(args(&["renc", "script.reb", "+s"])),
            args(&["renc", "script.reb", "+s"])
        );
        // option values are not mistaken for the script
        assert_eq!(
            normalize_args(args(&["renc", "--do", "print 1", "+s", "-?"])),
            args(&["renc", "--do", "print 1", "--secure", "quit", "--help"])
        );
        assert_eq!(
            normalize_args(args(&["renc", "--import", "lib.reb", "-s", "run.reb", "-s"])),
            args(&["renc", "--import", "lib.reb", "--secure", "allow", "run.reb", "-s"])
        );
        assert_eq!(
            normalize_args(args(&["renc", "-V", "+s", "run.reb"])),
            args(&["renc", "-V", "--secure", "quit", "run.reb"])
        );
    }

    #[test]
    fn options_parse() {
        let opts = options(&["renc", "-q", "--do", "print 1", "--secure", "none"]);
        assert!(opts.quiet());
        assert_eq!(opts.do_arg.as_deref(), Some("print 1"));
        assert_eq!(opts.secure.as_deref(), Some("none"));

        let opts = options(&["renc", "--do", "print 1", "+s", "run.reb", "x"]);
        assert_eq!(opts.do_arg.as_deref(), Some("print 1"));
        assert_eq!(opts.secure.as_deref(), Some("quit"));
        assert_eq!(opts.script, Some(PathBuf::from("run.reb")));
        assert_eq!(opts.args, args(&["x"]));

        let opts = options(&["renc", "-c", "run.reb", "a", "-b"]);
        assert!(opts.quiet());
        assert_eq!(opts.script, Some(PathBuf::from("run.reb")));
        assert_eq!(opts.args, args(&["a", "-b"]));
    }

    #[test]
    fn script_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, text: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, text).unwrap();
            path
        };
        let code_of = |path: PathBuf| {
            let opts = HostOptions {
                script: Some(path),
                quiet: true,
                ..HostOptions::default()
            };
            run(&opts)
        };

        assert_eq!(code_of(write("ok.reb", "x: 1 + 1")), EXIT_OK);
        assert_eq!(code_of(write("err.reb", "1 / 0")), EXIT_ERROR);
        assert_eq!(code_of(write("quit.reb", "quit/with 7")), 7);
        assert_eq!(code_of(write("halt.reb", "halt")), EXIT_HALT);
        assert_eq!(code_of(dir.path().join("missing.reb")), EXIT_ERROR);
    }

    #[test]
    fn script_sees_its_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("args.reb");
        std::fs::write(&path, "if system/options/args <> [\"one\"] [quit/with 3]").unwrap();
        let opts = HostOptions {
            script: Some(path),
            args: vec!["one".to_string()],
            quiet: true,
            ..HostOptions::default()
        };
        assert_eq!(run(&opts), EXIT_OK);
    }

    #[test]
    fn repl_lines() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        assert_eq!(repl_line(&mut it, "x: 10"), None);
        assert_eq!(repl_line(&mut it, "1 / 0"), None);
        assert_eq!(repl_line(&mut it, "quit/with x"), Some(10));
    }
}
