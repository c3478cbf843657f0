// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/natives/mod.rs

// The lib context: datatypes, typesets, natives written in Rust, the
// generic actions and the type predicates.

// <>

use super::cell::*;
use super::context::BindMode;
use super::error::{ErrId, Fail};
use super::eval::Feed;
use super::func::{Dispatcher, NativeFn, SpecKind};
use super::interp::Interp;
use super::series::SeriesId;
use super::symtab::Sym;

/// Generates a slice of natives along with their names and spec text
///
/// The body of each native reads its arguments from the running frame
/// through `$it` and evaluates to the result cell. Early exits return
/// a full `Result<Bounce, Fail>`.
macro_rules! ren_fn {
    ( const $array:ident; $it:ident;
      $( $name:literal $spec:literal $body:block )+
    ) => {
        pub const $array: &[(&str, &str, crate::ren::func::NativeFn)] = &[$((
            $name,
            $spec,
            |$it: &mut crate::ren::interp::Interp|
             -> Result<crate::ren::func::Bounce, crate::ren::error::Fail> {
                Ok(crate::ren::func::Bounce::Out($body))
            },
        )),+];
    };
}

pub mod context;
pub mod control;
pub mod data;
pub mod function;

/// Generic actions and their interfaces; the dispatcher picks the
/// implementation by the kind of the first argument
const ACTIONS: &[(&str, &str)] = &[
    ("add", "value1 value2"),
    ("subtract", "value1 value2"),
    ("multiply", "value1 value2"),
    ("divide", "value1 value2"),
    ("remainder", "value1 value2"),
    ("power", "number exponent"),
    ("negate", "number"),
    ("absolute", "value"),
    ("even?", "number"),
    ("odd?", "number"),
    ("and~", "value1 value2"),
    ("or~", "value1 value2"),
    ("xor~", "value1 value2"),
    ("complement", "value"),
    ("append", "series value [<opt> any-value!] /part limit /only /dup count"),
    ("insert", "series value [<opt> any-value!] /part limit /only /dup count"),
    ("change", "series value [<opt> any-value!] /part limit /only /dup count"),
    ("remove", "series /part limit"),
    ("clear", "series"),
    ("copy", "value /part limit /deep /types kinds [typeset! datatype!]"),
    ("length-of", "series"),
    ("reverse", "series /part limit"),
    ("pick", "location picker"),
    ("poke", "location picker value [<opt> any-value!]"),
    ("find", "series value /part limit /only /case /skip size /last /reverse /tail /match"),
    ("select", "series value /part limit /only /case /skip size /last /reverse"),
    ("skip", "series offset"),
    ("at", "series index"),
    ("head", "series"),
    ("tail", "series"),
    ("next", "series"),
    ("back", "series"),
    ("head?", "series"),
    ("tail?", "series"),
    ("index-of", "series"),
    ("take", "series /part limit /deep /last"),
    ("sort", "series /case /skip size /compare comparator /part limit /all /reverse"),
    ("make", "type spec [<opt> any-value!]"),
    ("to", "type spec"),
];

/// Words naming LOGIC! values
const LOGIC_WORDS: &[(&str, bool)] = &[
    ("true", true),
    ("false", false),
    ("on", true),
    ("off", false),
    ("yes", true),
    ("no", false),
];

fn define(it: &mut Interp, name: &str, spec: &str, disp: Dispatcher, body: Cell) -> Result<Cell, Fail> {
    let spec_cells = it.transcode_values(spec)?;
    let keys = it.make_paramlist(&spec_cells, SpecKind::Plain)?;
    let f = it.make_function(&keys, disp, body)?;
    it.lib_set(name, f)?;
    Ok(f)
}

fn lib_function(it: &mut Interp, name: &str) -> Result<Cell, Fail> {
    let sym = it.intern(name);
    match it.lib_get(sym) {
        Some(f) if f.is_function() => Ok(f),
        _ => Err(it.error(ErrId::ApplyNonFunction, &[Cell::word(Kind::Word, sym)])),
    }
}

/// Fills lib with everything written in Rust. The boot script builds
/// on top of this.
pub fn register(it: &mut Interp) -> Result<(), Fail> {
    for k in Kind::all() {
        it.lib_set(k.name(), Cell::datatype(k))?;
    }
    for (name, bits) in TYPESET_NAMES {
        it.lib_set(name, Cell::typeset(*bits))?;
    }
    for (name, value) in LOGIC_WORDS {
        it.lib_set(name, Cell::logic(*value))?;
    }

    let mut natives = 0;
    for table in [control::NATIVES, function::NATIVES, context::NATIVES, data::NATIVES] {
        for (name, spec, f) in table {
            define(it, name, spec, Dispatcher::Native(*f as NativeFn), Cell::BLANK)?;
            natives += 1;
        }
    }

    for (name, spec) in ACTIONS {
        let verb = it.intern(name);
        define(it, name, spec, Dispatcher::Action(verb), Cell::BLANK)?;
    }

    for k in Kind::all() {
        let name = format!("{}?", k.stem());
        define(it, &name, "value [<opt> any-value!]", Dispatcher::TypeChecker, Cell::datatype(k))?;
    }
    for (name, bits) in TYPESET_NAMES {
        let name = format!("{}?", &name[..name.len() - 1]);
        define(it, &name, "value [<opt> any-value!]", Dispatcher::TypeChecker, Cell::typeset(*bits))?;
    }

    it.archetypes.return_ = lib_function(it, "return")?;
    it.archetypes.leave = lib_function(it, "leave")?;
    it.archetypes.quit = lib_function(it, "quit")?;
    it.archetypes.break_ = lib_function(it, "break")?;
    it.archetypes.continue_ = lib_function(it, "continue")?;
    it.archetypes.throw = lib_function(it, "throw")?;

    log::debug!(
        "registered {} natives, {} actions and {} datatypes",
        natives,
        ACTIONS.len(),
        Kind::all().count()
    );
    Ok(())
}

// helpers shared by the natives

/// Function named by a value: itself, or what a word or path holds.
/// The name comes back as the label for error reports.
pub fn resolve_function(it: &mut Interp, v: Cell) -> Result<(Cell, Option<Sym>), Fail> {
    let (f, label) = match v.kind {
        Kind::Function => (v, None),
        k if k.is_word() => (it.get_var(v, None)?, Some(v.spelling())),
        k if k.is_path() => (it.eval_path(v.with_kind(Kind::GetPath), None, None)?, None),
        _ => return Err(it.error(ErrId::ApplyNonFunction, &[v])),
    };
    if !f.is_function() {
        return Err(it.error(ErrId::ApplyNonFunction, &[v]));
    }
    let mut f = f;
    f.flags.clear(CellFlags::ENFIX);
    Ok((f, label))
}

/// Runs a branch of a conditional: blocks are evaluated, functions
/// are called with the condition when they take an argument
pub fn run_branch(it: &mut Interp, branch: Cell, condition: Cell) -> Result<Cell, Fail> {
    match branch.kind {
        k if k.is_array() => it.do_block(branch),
        Kind::Function => {
            let takes_arg = it.param_keys(branch).iter().any(|k| k.key_class().is_gathered());
            if takes_arg {
                it.apply_values(branch, &[condition])
            } else {
                it.apply_values(branch, &[])
            }
        }
        _ => Ok(branch),
    }
}

/// Runs `body` over a feed reading `block` a step at a time
pub fn with_feed<T>(
    it: &mut Interp,
    block: Cell,
    body: impl FnOnce(&mut Interp, usize) -> Result<T, Fail>,
) -> Result<T, Fail> {
    let specifier = it.specifier_of(block);
    let f = it.stack.push_feed(Feed {
        array: block.series_id(),
        index: block.index(),
        specifier,
        expr_start: block.index(),
    });
    let result = body(it, f);
    it.stack.feeds.truncate(f);
    result
}

/// Runs `body` with `n` void cells reserved on the data stack, starting
/// at the index passed in. Values kept across evaluation steps live
/// there so the collector sees them.
pub fn with_slots<T>(
    it: &mut Interp,
    n: usize,
    body: impl FnOnce(&mut Interp, usize) -> Result<T, Fail>,
) -> Result<T, Fail> {
    let mark = it.ds.len();
    it.ds.resize(mark + n, Cell::VOID);
    let result = body(it, mark);
    it.ds.truncate(mark);
    result
}

/// Outcome of one pass through a loop body
pub enum LoopStep {
    Next(Cell),
    Break,
}

/// Runs a loop body, catching BREAK and CONTINUE aimed at the loop
pub fn loop_body(it: &mut Interp, array: SeriesId, specifier: Option<SeriesId>) -> Result<LoopStep, Fail> {
    match it.do_array(array, 0, specifier) {
        Ok(v) => Ok(LoopStep::Next(v)),
        Err(Fail::Thrown) => {
            let brk = it.archetypes.break_;
            let cont = it.archetypes.continue_;
            if it.catch_thrown(|it, l| l.is_function() && it.same_function(l, brk)).is_some() {
                return Ok(LoopStep::Break);
            }
            if it.catch_thrown(|it, l| l.is_function() && it.same_function(l, cont)).is_some() {
                return Ok(LoopStep::Next(Cell::VOID));
            }
            Err(Fail::Thrown)
        }
        Err(e) => Err(e),
    }
}

/// Context holding loop variables, and a deep copy of `body` bound to
/// it. Both are pushed on the guard stack; the caller pops them.
pub fn loop_context(it: &mut Interp, words: &[Sym], body: Cell) -> Result<(SeriesId, SeriesId), Fail> {
    let varlist = it.make_context(Kind::Object, words)?;
    it.guards.push(varlist);
    let copy = it.copy_array(body, it.specifier_of(body), true, TS_ANY_ARRAY)?;
    it.guards.push(copy);
    it.bind_array(copy, 0, varlist, BindMode::Existing, true)?;
    Ok((varlist, copy))
}

/// Words of a loop variable spec: one word or a block of them
pub fn loop_words(it: &mut Interp, spec: Cell) -> Result<Vec<Sym>, Fail> {
    match spec.kind {
        k if k.is_word() => Ok(vec![spec.spelling()]),
        Kind::Block => {
            let cells = it.array_values(spec);
            if cells.is_empty() || cells.iter().any(|c| !c.kind.is_word()) {
                return Err(it.error(ErrId::InvalidArg, &[spec]));
            }
            Ok(cells.iter().map(|c| c.spelling()).collect())
        }
        _ => Err(it.error(ErrId::InvalidArg, &[spec])),
    }
}

#[cfg(test)]
mod tests {
    use crate::ren::cell::Kind;
    use crate::ren::interp::{Interp, InterpConfig};

    #[test]
    fn lib_is_populated() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        for name in ["append", "func", "integer!", "any-series!", "block?", "any-string?", "true", "print"] {
            let sym = it.intern(name);
            assert!(it.lib_get(sym).is_some(), "{} missing from lib", name);
        }
        let sym = it.intern("integer!");
        assert_eq!(it.lib_get(sym).unwrap().datatype_val(), Kind::Integer);
    }

    #[test]
    fn predicates() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        assert_eq!(it.interpret("integer? 1").unwrap(), "true");
        assert_eq!(it.interpret("block? 1").unwrap(), "false");
        assert_eq!(it.interpret("any-series? \"a\"").unwrap(), "true");
        assert_eq!(it.interpret("void? ()").unwrap(), "true");
    }
}
