// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/natives/control.rs

// Control flow: conditionals, loops, throws, traps and DO.

// <>

use super::super::{
    cell::*,
    compare::Strictness,
    error::{ErrId, Fail, ERR_NEAR},
    func::Bounce,
    interp::Interp,
    symtab::*,
    types::{object, series_len},
};
use super::{loop_body, loop_context, loop_words, run_branch, with_feed, with_slots, LoopStep};

/// Evaluates a block one step at a time, pushing each result that is
/// not void on the data stack. Returns the stack mark.
pub(super) fn reduce_onto_stack(it: &mut Interp, block: Cell) -> Result<usize, Fail> {
    let mark = it.ds.len();
    let result = with_feed(it, block, |it, f| {
        while let Some(v) = it.eval_step(f)? {
            if !v.is_void() {
                it.ds.push(v);
            }
        }
        Ok(())
    });
    if let Err(e) = result {
        it.ds.truncate(mark);
        return Err(e);
    }
    Ok(mark)
}

/// Block made from the data stack above `mark`
pub(super) fn pop_block(it: &mut Interp, mark: usize, kind: Kind) -> Result<Cell, Fail> {
    let cells: Vec<Cell> = it.ds.drain(mark..).collect();
    let id = it.make_array(&cells)?;
    Ok(Cell::series(kind, id, 0))
}

fn compose(it: &mut Interp, block: Cell, deep: bool, only: bool) -> Result<Cell, Fail> {
    let mark = it.ds.len();
    if let Err(e) = compose_onto_stack(it, block, deep, only) {
        it.ds.truncate(mark);
        return Err(e);
    }
    pop_block(it, mark, block.kind)
}

fn compose_onto_stack(it: &mut Interp, block: Cell, deep: bool, only: bool) -> Result<(), Fail> {
    for cell in it.array_values(block) {
        match cell.kind {
            Kind::Group => {
                let v = it.do_block(cell)?;
                match v.kind {
                    Kind::Void => {}
                    Kind::Block if !only => {
                        let items = it.array_values(v);
                        it.ds.extend(items);
                    }
                    _ => it.ds.push(v),
                }
            }
            Kind::Block if deep => {
                let inner = compose(it, cell, deep, only)?;
                it.ds.push(inner);
            }
            _ => it.ds.push(cell),
        }
    }
    Ok(())
}

/// Item `n` of a FOR-EACH pass over `data`, or `None` past the end
fn element(it: &Interp, data: Cell, pos: usize) -> Option<Cell> {
    match data.kind {
        k if k.is_array() || k == Kind::Map => {
            let arr = it.pool.get(data.series_id()).array();
            let v = arr.get(pos);
            (!v.is_end()).then(|| v.unflagged())
        }
        k if k.is_string() => {
            let series = it.pool.get(data.series_id());
            (pos < series.len()).then(|| Cell::char(series.char_at(pos)))
        }
        Kind::Binary => {
            let series = it.pool.get(data.series_id());
            (pos < series.len()).then(|| Cell::integer(series.bytes().get(pos) as i64))
        }
        _ => None,
    }
}

/// Whether a thrown label is caught by a CATCH with the given names
fn catches(it: &Interp, label: Cell, names: Option<Cell>, any: bool, quit: bool) -> bool {
    if label.is_function() {
        let arch = &it.archetypes;
        if it.same_function(label, arch.quit) {
            return quit;
        }
        if it.same_function(label, arch.return_)
            || it.same_function(label, arch.leave)
            || it.same_function(label, arch.break_)
            || it.same_function(label, arch.continue_)
        {
            return false;
        }
    }
    if any {
        return true;
    }
    match names {
        None => label.is_function() && it.same_function(label, it.archetypes.throw),
        Some(n) if n.kind.is_word() => label.kind.is_word() && it.syms.same_canon(label.spelling(), n.spelling()),
        Some(n) => {
            let arr = it.pool.get(n.series_id()).array().as_slice();
            label.kind.is_word()
                && arr[n.index() as usize..]
                    .iter()
                    .any(|w| w.kind.is_word() && it.syms.same_canon(label.spelling(), w.spelling()))
        }
    }
}

ren_fn! {
    const NATIVES;
    it;

    "do" "source [<opt> any-value!] /next var [word!]" {
        let source = it.arg(1);
        let next = it.intern("next");
        match source.kind {
            Kind::Block | Kind::Group => match it.param(next) {
                Some(var) => {
                    let (value, pos) = with_feed(it, source, |it, f| {
                        let v = it.eval_step(f)?.unwrap_or(Cell::VOID);
                        Ok((v, it.stack.feeds[f].index))
                    })?;
                    it.set_var(var, None, source.with_index(pos))?;
                    value
                }
                None => it.do_block(source)?,
            },
            Kind::String => {
                let text = it.text_of(source);
                it.do_string(&text, None)?
            }
            Kind::File => {
                let path = it.text_of(source);
                let text = match std::fs::read_to_string(&path) {
                    Ok(t) => t,
                    Err(e) => {
                        let reason = it.string_cell(Kind::String, &e.to_string())?;
                        return Err(it.error(ErrId::CannotOpen, &[source, reason]));
                    }
                };
                log::info!("running script {}", path);
                it.do_string(&text, Some(&path))?
            }
            Kind::Frame => it.do_frame(source)?,
            Kind::Function => it.apply_values(source, &[])?,
            Kind::Error => return Err(Fail::Error(source)),
            _ => source,
        }
    }

    "if" "condition [<opt> any-value!] branch [block! function!]" {
        let (cond, branch) = (it.arg(1), it.arg(2));
        if cond.is_truthy() {
            run_branch(it, branch, cond)?
        } else {
            Cell::VOID
        }
    }

    "unless" "condition [<opt> any-value!] branch [block! function!]" {
        let (cond, branch) = (it.arg(1), it.arg(2));
        if cond.is_truthy() {
            Cell::VOID
        } else {
            run_branch(it, branch, cond)?
        }
    }

    "either" "condition [<opt> any-value!] true-branch [block! function!] false-branch [block! function!]" {
        let cond = it.arg(1);
        let branch = if cond.is_truthy() { it.arg(2) } else { it.arg(3) };
        run_branch(it, branch, cond)?
    }

    "case" "cases [block!] /all" {
        let cases = it.arg(1);
        let all = it.refine(SYM_ALL);
        let name = Cell::word(Kind::Word, it.intern("case"));
        // slots: result so far, then the pending condition
        with_slots(it, 2, |it, s| {
            with_feed(it, cases, |it, f| {
                while let Some(cond) = it.eval_step(f)? {
                    it.ds[s + 1] = cond;
                    let Some(branch) = it.eval_step(f)? else {
                        return Err(it.error(ErrId::Needs, &[name, cond]));
                    };
                    let cond = it.ds[s + 1];
                    if cond.is_truthy() {
                        it.ds[s] = run_branch(it, branch, cond)?;
                        if !all {
                            break;
                        }
                    }
                }
                Ok(it.ds[s])
            })
        })?
    }

    "switch" "value [<opt> any-value!] cases [block!] /default case [block!] /all" {
        let (value, cases) = (it.arg(1), it.arg(2));
        let all = it.refine(SYM_ALL);
        let fallback = it.param(SYM_DEFAULT);
        let items = it.array_values(cases);

        let mut out = None;
        let mut i = 0;
        while i < items.len() {
            if items[i].kind != Kind::Block && it.equal_values(items[i], value, Strictness::Lax) {
                // the next block after a match is its body
                if let Some(body) = items[i..].iter().find(|c| c.kind == Kind::Block) {
                    out = Some(it.do_block(*body)?);
                    if !all {
                        break;
                    }
                }
            }
            i += 1;
        }
        match (out, fallback) {
            (Some(v), _) => v,
            (None, Some(d)) => it.do_block(d)?,
            (None, None) => Cell::VOID,
        }
    }

    "while" "condition [block!] body [block!]" {
        let (cond, body) = (it.arg(1), it.arg(2));
        let spec = it.specifier_of(body);
        with_slots(it, 1, |it, s| {
            loop {
                if !it.do_block(cond)?.is_truthy() {
                    break;
                }
                match loop_body(it, body.series_id(), spec)? {
                    LoopStep::Next(v) => it.ds[s] = v,
                    LoopStep::Break => return Ok(Cell::BLANK),
                }
            }
            Ok(it.ds[s])
        })?
    }

    "loop" "count [integer! decimal! logic! blank!] body [block!]" {
        let (count, body) = (it.arg(1), it.arg(2));
        let n = match count.kind {
            Kind::Integer => count.int(),
            Kind::Decimal => count.dec() as i64,
            Kind::Logic if count.logic_val() => i64::MAX,
            _ => 0,
        };
        let spec = it.specifier_of(body);
        with_slots(it, 1, |it, s| {
            for _ in 0..n.max(0) {
                match loop_body(it, body.series_id(), spec)? {
                    LoopStep::Next(v) => it.ds[s] = v,
                    LoopStep::Break => return Ok(Cell::BLANK),
                }
            }
            Ok(it.ds[s])
        })?
    }

    "forever" "body [block!]" {
        let body = it.arg(1);
        let spec = it.specifier_of(body);
        loop {
            if let LoopStep::Break = loop_body(it, body.series_id(), spec)? {
                break Cell::BLANK;
            }
        }
    }

    "repeat" "'word [word!] value [any-number! any-series! blank!] body [block!]" {
        let (word, value, body) = (it.arg(1), it.arg(2), it.arg(3));
        let mark = it.guards.len();
        let result = with_slots(it, 1, |it, s| {
            let (varlist, copy) = loop_context(it, &[word.spelling()], body)?;
            let (start, end) = match value.kind {
                Kind::Integer => (1, value.int()),
                Kind::Decimal | Kind::Percent => (1, value.dec() as i64),
                Kind::Blank => (1, 0),
                _ => (value.index() as i64, series_len(it, value) as i64 - 1),
            };
            let mut n = start;
            while n <= end {
                let v = if value.kind.is_series() {
                    value.with_index(n as u32)
                } else {
                    Cell::integer(n)
                };
                it.ctx_set(varlist, 1, v);
                match loop_body(it, copy, None)? {
                    LoopStep::Next(v) => it.ds[s] = v,
                    LoopStep::Break => return Ok(Cell::BLANK),
                }
                n += 1;
            }
            Ok(it.ds[s])
        });
        it.guards.truncate(mark);
        result?
    }

    "for-each" "'vars [word! block!] data [any-series! map! blank!] body [block!]" {
        let (vars, data, body) = (it.arg(1), it.arg(2), it.arg(3));
        if data.is_blank() {
            return Ok(Bounce::Out(Cell::VOID));
        }
        let words = loop_words(it, vars)?;
        let mark = it.guards.len();
        let result = with_slots(it, 1, |it, s| {
            let (varlist, copy) = loop_context(it, &words, body)?;
            let mut pos = if data.kind == Kind::Map { 0 } else { data.index() as usize };
            loop {
                if element(it, data, pos).is_none() {
                    break;
                }
                for n in 0..words.len() {
                    let v = element(it, data, pos).unwrap_or(Cell::BLANK);
                    it.ctx_set(varlist, n as u32 + 1, v);
                    pos += 1;
                }
                match loop_body(it, copy, None)? {
                    LoopStep::Next(v) => it.ds[s] = v,
                    LoopStep::Break => return Ok(Cell::BLANK),
                }
            }
            Ok(it.ds[s])
        });
        it.guards.truncate(mark);
        result?
    }

    "break" "" {
        let label = it.archetypes.break_;
        return Err(it.throw(label, Cell::VOID));
    }

    "continue" "" {
        let label = it.archetypes.continue_;
        return Err(it.throw(label, Cell::VOID));
    }

    "all" "block [block!]" {
        let block = it.arg(1);
        with_slots(it, 1, |it, s| {
            it.ds[s] = Cell::logic(true);
            with_feed(it, block, |it, f| {
                while let Some(v) = it.eval_step(f)? {
                    if v.is_void() {
                        continue;
                    }
                    if !v.is_truthy() {
                        return Ok(Cell::BLANK);
                    }
                    it.ds[s] = v;
                }
                Ok(it.ds[s])
            })
        })?
    }

    "any" "block [block!]" {
        let block = it.arg(1);
        with_feed(it, block, |it, f| {
            while let Some(v) = it.eval_step(f)? {
                if !v.is_void() && v.is_truthy() {
                    return Ok(v);
                }
            }
            Ok(Cell::BLANK)
        })?
    }

    "reduce" "value [<opt> any-value!]" {
        let value = it.arg(1);
        if value.kind != Kind::Block && value.kind != Kind::Group {
            return Ok(Bounce::Out(value));
        }
        let mark = reduce_onto_stack(it, value)?;
        pop_block(it, mark, Kind::Block)?
    }

    "compose" "value [<opt> any-value!] /deep /only" {
        let value = it.arg(1);
        if value.kind != Kind::Block {
            return Ok(Bounce::Out(value));
        }
        let (deep, only) = (it.refine(SYM_DEEP), it.refine(SYM_ONLY));
        compose(it, value, deep, only)?
    }

    "catch" "block [block!] /name names [word! block!] /quit /any" {
        let block = it.arg(1);
        let names = it.param(SYM_NAME);
        let (any, quit) = (it.refine(SYM_ANY), it.refine(SYM_QUIT));
        match it.do_block(block) {
            Ok(v) => v,
            Err(Fail::Thrown) => match it.catch_thrown(|it, l| catches(it, l, names, any, quit)) {
                Some(v) => v,
                None => return Err(Fail::Thrown),
            },
            Err(e) => return Err(e),
        }
    }

    "throw" "value [<opt> any-value!] /name word [word!]" {
        let value = it.arg(1);
        let label = match it.param(SYM_NAME) {
            Some(w) => Cell::word(Kind::Word, w.spelling()),
            None => it.archetypes.throw,
        };
        return Err(it.throw(label, value));
    }

    "trap" "block [block!] /with handler [block! function!]" {
        let block = it.arg(1);
        let handler = it.param(SYM_WITH);
        match it.trap(|it| it.do_block(block))? {
            Ok(v) => v,
            Err(e) => match handler {
                Some(h) => run_branch(it, h, e)?,
                None => e,
            },
        }
    }

    "fail" "reason [error! string! block!]" {
        let reason = it.arg(1);
        let err = match reason.kind {
            Kind::Error => {
                if it.ctx_get(reason.varlist(), ERR_NEAR).is_blank() {
                    it.locate_error(reason.varlist())?;
                }
                reason
            }
            Kind::Block => {
                let mark = reduce_onto_stack(it, reason)?;
                let reduced = pop_block(it, mark, Kind::Block)?;
                let text = it.form(reduced);
                let msg = it.string_cell(Kind::String, &text)?;
                object::make_error_value(it, msg)?
            }
            _ => object::make_error_value(it, reason)?,
        };
        return Err(Fail::Error(err));
    }

    "quit" "/with value [<opt> any-value!]" {
        let value = it.param(SYM_WITH).unwrap_or(Cell::VOID);
        let label = it.archetypes.quit;
        log::debug!("quit requested");
        return Err(it.throw(label, value));
    }

    "halt" "" {
        log::info!("halt native called");
        return Err(Fail::Halt);
    }

    "comment" ":discarded [block! any-string! binary! any-scalar!]" {
        Cell::VOID
    }
}

#[cfg(test)]
mod tests {
    use crate::ren::interp::{Interp, InterpConfig};
    use crate::ren::RenErr;

    fn run(src: &str) -> String {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        it.interpret(src).unwrap()
    }

    #[test]
    fn conditionals() {
        assert_eq!(run("if 1 > 0 [\"yes\"]"), "\"yes\"");
        assert_eq!(run("if false [1]"), "");
        assert_eq!(run("either _ [1] [2]"), "2");
        assert_eq!(run("unless false [3]"), "3");
        assert_eq!(run("case [false [1] 2 > 1 [2] true [3]]"), "2");
        assert_eq!(run("switch 2 [1 [\"one\"] 2 [\"two\"]]"), "\"two\"");
        assert_eq!(run("switch/default 9 [1 [\"one\"]] [\"other\"]"), "\"other\"");
    }

    #[test]
    fn pending_results_survive_collection() {
        let mut it = Interp::new(InterpConfig { ballast: 5, ..InterpConfig::default() }).unwrap();
        let churn = "loop 50 [copy [zz zz zz]]";
        let src = "n: 0 x: while [n: n + 1 loop 50 [copy [junk]] n < 3] [copy [keep me]]";
        it.interpret(src).unwrap();
        it.interpret(churn).unwrap();
        assert_eq!(it.interpret("x").unwrap(), "[keep me]");

        it.interpret("y: all [copy [kept] (loop 50 [copy [junk]] ())]").unwrap();
        it.interpret(churn).unwrap();
        assert_eq!(it.interpret("y").unwrap(), "[kept]");

        it.interpret("z: case/all [true [copy [hit]] (loop 50 [copy [junk]] false) [0]]").unwrap();
        it.interpret(churn).unwrap();
        assert_eq!(it.interpret("z").unwrap(), "[hit]");

        let src = "w: for-each v [1 2] [copy [last]] loop 50 [copy [junk]] w";
        assert_eq!(it.interpret(src).unwrap(), "[last]");
    }

    #[test]
    fn loops() {
        assert_eq!(run("n: 0 loop 5 [n: n + 1] n"), "5");
        assert_eq!(run("n: 0 repeat i 4 [n: n + i] n"), "10");
        assert_eq!(run("s: 0 for-each x [1 2 3] [s: s + x] s"), "6");
        assert_eq!(run("out: copy [] for-each [k v] [a 1 b 2] [append out v] out"), "[1 2]");
        assert_eq!(run("n: 0 while [n < 10] [n: n + 1 if n = 3 [break]] n"), "3");
        assert_eq!(run("n: 0 forever [n: n + 1 if n = 4 [break]] n"), "4");
        assert_eq!(run("s: 0 for-each x [1 2 3 4] [if even? x [continue] s: s + x] s"), "4");
        assert_eq!(run("x: 10 repeat x 2 [] x"), "10");
    }

    #[test]
    fn logic_and_reduction() {
        assert_eq!(run("all [1 2 3]"), "3");
        assert_eq!(run("all [1 false 3]"), "_");
        assert_eq!(run("any [false _ 7]"), "7");
        assert_eq!(run("reduce [1 + 1 \"a\"]"), "[2 \"a\"]");
        assert_eq!(run("compose [a (1 + 1) ([b c])]"), "[a 2 b c]");
        assert_eq!(run("compose/only [a ([b c])]"), "[a [b c]]");
        assert_eq!(run("compose/deep [a [(1 + 2)]]"), "[a [3]]");
    }

    #[test]
    fn throws_and_traps() {
        assert_eq!(run("catch [throw 5 6]"), "5");
        assert_eq!(run("catch/name [throw/name 1 'x] 'x"), "1");
        assert_eq!(run("e: trap [1 / 0] e/id"), "zero-divide");
        assert_eq!(run("trap [10]"), "10");
        assert_eq!(run("trap/with [fail \"x\"] [99]"), "99");
        assert_eq!(run("e: trap [fail \"boom\"] e/message"), "\"boom\"");
    }

    #[test]
    fn uncaught_throw_and_quit() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        assert!(matches!(it.interpret("throw 1"), Err(RenErr::UncaughtThrow(_))));
        assert_eq!(it.interpret("quit/with 3"), Err(RenErr::Quit(3)));
        assert_eq!(it.interpret("quit"), Err(RenErr::Quit(0)));
    }

    #[test]
    fn do_forms() {
        assert_eq!(run("do [1 + 2]"), "3");
        assert_eq!(run("do \"3 * 3\""), "9");
        assert_eq!(run("comment [ignored] 5"), "5");
    }

    #[test]
    fn do_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.reb");
        std::fs::write(&path, "x: 40 x + 2").unwrap();
        let src = format!("do %\"{}\"", path.display());
        assert_eq!(run(&src), "42");
    }
}
