// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/natives/data.rs

// Comparison, type reflection, output, loading and memory statistics

// <>

use std::cmp::Ordering;

use super::super::{
    cell::*,
    compare::Strictness,
    error::{ErrId, Fail},
    interp::Interp,
    symtab::*,
    types::{self, string::make_bitset},
};
use super::control::{pop_block, reduce_onto_stack};

/// Ordering of the two arguments of a comparison native
fn ordering(it: &mut Interp) -> Result<Ordering, Fail> {
    let (a, b) = (it.arg(1), it.arg(2));
    match it.compare_values(a, b, false) {
        Some(o) => Ok(o),
        None => Err(it.error(ErrId::InvalidCompare, &[a, b])),
    }
}

fn equality(it: &mut Interp, mode: Strictness) -> bool {
    let (a, b) = (it.arg(1), it.arg(2));
    it.equal_values(a, b, mode)
}

/// Text of a source argument for LOAD and TRANSCODE
fn source_text(it: &mut Interp, source: Cell) -> Result<(String, Option<String>), Fail> {
    match source.kind {
        Kind::Binary => {
            let series = it.pool.get(source.series_id());
            let bytes = series.bytes().as_slice().get(source.index() as usize..).unwrap_or(&[]);
            Ok((String::from_utf8_lossy(bytes).into_owned(), None))
        }
        Kind::File => {
            let path = it.text_of(source);
            match std::fs::read_to_string(&path) {
                Ok(text) => Ok((text, Some(path))),
                Err(e) => {
                    let reason = it.string_cell(Kind::String, &e.to_string())?;
                    Err(it.error(ErrId::CannotOpen, &[source, reason]))
                }
            }
        }
        _ => Ok((it.text_of(source), None)),
    }
}

ren_fn! {
    const NATIVES;
    it;

    "equal?" "value1 [<opt> any-value!] value2 [<opt> any-value!]" {
        Cell::logic(equality(it, Strictness::Lax))
    }

    "not-equal?" "value1 [<opt> any-value!] value2 [<opt> any-value!]" {
        Cell::logic(!equality(it, Strictness::Lax))
    }

    "strict-equal?" "value1 [<opt> any-value!] value2 [<opt> any-value!]" {
        Cell::logic(equality(it, Strictness::Strict))
    }

    "strict-not-equal?" "value1 [<opt> any-value!] value2 [<opt> any-value!]" {
        Cell::logic(!equality(it, Strictness::Strict))
    }

    "same?" "value1 [<opt> any-value!] value2 [<opt> any-value!]" {
        Cell::logic(equality(it, Strictness::Same))
    }

    "lesser?" "value1 value2" {
        Cell::logic(ordering(it)? == Ordering::Less)
    }

    "greater?" "value1 value2" {
        Cell::logic(ordering(it)? == Ordering::Greater)
    }

    "lesser-or-equal?" "value1 value2" {
        Cell::logic(ordering(it)? != Ordering::Greater)
    }

    "greater-or-equal?" "value1 value2" {
        Cell::logic(ordering(it)? != Ordering::Less)
    }

    "minimum" "value1 value2" {
        if ordering(it)? == Ordering::Greater { it.arg(2) } else { it.arg(1) }
    }

    "maximum" "value1 value2" {
        if ordering(it)? == Ordering::Less { it.arg(2) } else { it.arg(1) }
    }

    "not" "value [<opt> any-value!]" {
        Cell::logic(!it.arg(1).is_truthy())
    }

    "type-of" "value [<opt> any-value!]" {
        let value = it.arg(1);
        if value.is_void() {
            Cell::BLANK
        } else {
            Cell::datatype(value.kind)
        }
    }

    "print" "value [<opt> any-value!]" {
        let value = it.arg(1);
        let text = match value.kind {
            Kind::Void => String::new(),
            Kind::Block => {
                let mark = reduce_onto_stack(it, value)?;
                let reduced = pop_block(it, mark, Kind::Block)?;
                it.form(reduced)
            }
            _ => it.form(value),
        };
        it.emit(&text);
        it.emit("\n");
        Cell::VOID
    }

    "mold" "value [<opt> any-value!] /only /flat" {
        let value = it.arg(1);
        let flat = it.intern("flat");
        let text = if it.refine(SYM_ONLY) {
            it.mold_only(value)
        } else if it.refine(flat) {
            it.mold_flat(value)
        } else {
            it.mold(value)
        };
        it.string_cell(Kind::String, &text)?
    }

    "form" "value [<opt> any-value!]" {
        let value = it.arg(1);
        let text = it.form(value);
        it.string_cell(Kind::String, &text)?
    }

    "load" "source [string! binary! file!] /all" {
        let source = it.arg(1);
        let all = it.refine(SYM_ALL);
        let (text, file) = source_text(it, source)?;
        let arr = it.load(&text, file.as_deref())?;
        let len = it.pool.get(arr).len();
        if len == 1 && !all {
            it.pool.get(arr).array().get(0)
        } else {
            Cell::series(Kind::Block, arr, 0)
        }
    }

    "transcode" "source [string! binary!]" {
        let source = it.arg(1);
        let (text, _) = source_text(it, source)?;
        let cells = it.transcode_values(&text)?;
        it.block_cell(&cells)?
    }

    "to-string" "value [<opt> any-value!]" {
        let value = it.arg(1);
        types::to_value(it, Kind::String, value)?
    }

    "spelling-of" "value [any-word! any-string!]" {
        let value = it.arg(1);
        let text = if value.kind.is_word() {
            it.spelling(value.spelling()).to_string()
        } else {
            it.text_of(value)
        };
        it.string_cell(Kind::String, &text)?
    }

    "charset" "spec [block! string! char! integer!]" {
        let spec = it.arg(1);
        make_bitset(it, spec)?
    }

    "recycle" "" {
        let freed = it.recycle();
        Cell::integer(freed as i64)
    }

    "stats" "/show" {
        if it.refine(SYM_SHOW) {
            let s = it.pool.stats;
            log::info!(
                "pool: {} live, {} peak, {} collections, {} recycled, {} dropped, {} manuals, {} guards",
                it.pool.live(),
                s.peak,
                s.collections,
                s.recycled,
                s.dropped,
                it.pool.manuals().count(),
                it.guards.len()
            );
        }
        Cell::integer(it.pool.live() as i64)
    }
}

#[cfg(test)]
mod tests {
    use crate::ren::interp::{Interp, InterpConfig};

    fn run(src: &str) -> String {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        it.interpret(src).unwrap()
    }

    #[test]
    fn comparisons() {
        assert_eq!(run("1 = 1.0"), "true");
        assert_eq!(run("1 == 1.0"), "false");
        assert_eq!(run("\"abc\" = \"ABC\""), "true");
        assert_eq!(run("\"abc\" == \"ABC\""), "false");
        assert_eq!(run("2 < 3"), "true");
        assert_eq!(run("3 <= 2"), "false");
        assert_eq!(run("maximum 4 9"), "9");
        assert_eq!(run("minimum \"b\" \"a\""), "\"a\"");
        assert_eq!(run("b: [1] same? b b"), "true");
        assert_eq!(run("same? [1] [1]"), "false");
    }

    #[test]
    fn uncomparable_values_fail() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        let err = it.interpret("1 < \"a\"").unwrap_err();
        assert_eq!(err.id(), Some("invalid-compare"));
    }

    #[test]
    fn types_and_logic() {
        assert_eq!(run("type-of 1"), "integer!");
        assert_eq!(run("type-of ()"), "_");
        assert_eq!(run("not _"), "true");
        assert_eq!(run("not 0"), "false");
    }

    #[test]
    fn printing_is_captured() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        it.capture_output();
        it.interpret("x: 3 print [\"x is\" x] print \"done\"").unwrap();
        assert_eq!(it.take_output(), "x is 3\ndone\n");
    }

    #[test]
    fn mold_form_and_loading() {
        assert_eq!(run("mold [a b]"), "\"[a b]\"");
        assert_eq!(run("form [a \"b\"]"), "\"a b\"");
        assert_eq!(run("load \"1 2\""), "[1 2]");
        assert_eq!(run("load \"42\""), "42");
        assert_eq!(run("transcode \"a b\""), "[a b]");
        assert_eq!(run("spelling-of 'foo"), "\"foo\"");
        assert_eq!(run("to-string 12"), "\"12\"");
    }

    #[test]
    fn memory_natives() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        it.interpret("loop 100 [copy [a b c]]").unwrap();
        let freed: i64 = it.interpret("recycle").unwrap().parse().unwrap();
        assert!(freed >= 0);
        let live: usize = it.interpret("stats").unwrap().parse().unwrap();
        assert!(live > 0);
    }
}
