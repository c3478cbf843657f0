// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/natives/context.rs

// Variables and contexts: SET, GET, BIND, IN, USE and reflection

// <>

use super::super::{
    cell::*,
    context::BindMode,
    error::{ErrId, Fail},
    interp::Interp,
    series::SeriesId,
    symtab::*,
    types::block::map_pairs,
};
use super::{loop_context, loop_words};

/// Varlist a BIND or IN target names: a context, or the context a
/// word is bound into
fn target_context(it: &mut Interp, v: Cell) -> Result<SeriesId, Fail> {
    match v.kind {
        k if k.is_context() => Ok(v.varlist()),
        k if k.is_word() => match v.binding {
            Binding::Specific(varlist) => Ok(varlist),
            _ => Err(it.error(ErrId::NotBound, &[v.with_kind(Kind::Word)])),
        },
        _ => Err(it.error(ErrId::InvalidArg, &[v])),
    }
}

/// Word of a function's interface, its kind showing the parameter
/// class
fn param_word(key: Cell) -> Option<Cell> {
    let kind = match key.key_class() {
        ParamClass::Normal | ParamClass::Tight | ParamClass::Variadic => Kind::Word,
        ParamClass::HardQuote => Kind::GetWord,
        ParamClass::SoftQuote => Kind::LitWord,
        ParamClass::Refinement => Kind::Refinement,
        ParamClass::Local | ParamClass::Return | ParamClass::Leave => return None,
    };
    Some(Cell::word(kind, key.key_spelling()))
}

/// Sets or clears the protection bit on the variable a word names
fn protection(it: &mut Interp, word: Cell, on: bool) -> Result<Cell, Fail> {
    let (varlist, n) = it.var_slot(word, None)?;
    let arr = it.pool.get_mut(varlist).array_mut();
    let mut cell = arr.get(n as usize);
    if on {
        cell.flags.set(CellFlags::PROTECTED);
    } else {
        cell.flags.clear(CellFlags::PROTECTED);
    }
    arr.set(n as usize, cell);
    Ok(word)
}

ren_fn! {
    const NATIVES;
    it;

    "set" "target [any-word! any-path! block!] value [<opt> any-value!]" {
        let (target, value) = (it.arg(1), it.arg(2));
        match target.kind {
            k if k.is_word() => it.set_var(target, None, value)?,
            k if k.is_path() => it.set_path(target.with_kind(Kind::SetPath), None, value)?,
            _ => {
                let words = it.array_values(target);
                let spread = value.kind == Kind::Block;
                let values = if spread { it.array_values(value) } else { Vec::new() };
                for (n, w) in words.iter().enumerate() {
                    if !w.kind.is_word() {
                        return Err(it.error(ErrId::InvalidArg, &[*w]));
                    }
                    let v = if spread {
                        values.get(n).copied().unwrap_or(Cell::BLANK)
                    } else {
                        value
                    };
                    it.set_var(*w, None, v)?;
                }
            }
        }
        value
    }

    "get" "source [any-word! any-path! any-context!] /any" {
        let source = it.arg(1);
        let any = it.refine(SYM_ANY);
        let value = match source.kind {
            k if k.is_word() => it.get_var(source, None)?,
            k if k.is_path() => it.eval_path(source.with_kind(Kind::GetPath), None, None)?,
            _ => {
                let varlist = source.varlist();
                let values: Vec<Cell> = it.ctx_words(varlist).iter().map(|(n, _)| it.ctx_get(varlist, *n)).collect();
                it.block_cell(&values)?
            }
        };
        if value.is_void() && !any {
            return Err(it.error(ErrId::NoValue, &[source.with_kind(Kind::Word)]));
        }
        value
    }

    "bind" "target [block! any-word!] context [any-context! any-word!] /copy" {
        let (target, ctx) = (it.arg(1), it.arg(2));
        let varlist = target_context(it, ctx)?;
        if target.kind.is_word() {
            match it.ctx_find(varlist, target.spelling()) {
                Some(n) => Cell::bound_word(target.kind, target.spelling(), Binding::Specific(varlist), n),
                None => return Err(it.error(ErrId::NotBound, &[target.with_kind(Kind::Word)])),
            }
        } else {
            let block = if it.refine(SYM_COPY) {
                let id = it.copy_array(target, it.specifier_of(target), true, TS_ANY_ARRAY)?;
                Cell::series(target.kind, id, 0)
            } else {
                it.check_mutable(target)?;
                target
            };
            it.bind_array(block.series_id(), block.index(), varlist, BindMode::Existing, true)?;
            block
        }
    }

    "in" "context [any-context!] word [any-word!]" {
        let (ctx, word) = (it.arg(1), it.arg(2));
        let varlist = ctx.varlist();
        match it.ctx_find(varlist, word.spelling()) {
            Some(n) => Cell::bound_word(word.kind, word.spelling(), Binding::Specific(varlist), n),
            None => Cell::BLANK,
        }
    }

    "use" "vars [word! block!] body [block!]" {
        let (vars, body) = (it.arg(1), it.arg(2));
        let words = loop_words(it, vars)?;
        let mark = it.guards.len();
        let result = loop_context(it, &words, body).and_then(|(_, copy)| it.do_array(copy, 0, None));
        it.guards.truncate(mark);
        result?
    }

    "words-of" "value [any-context! function!]" {
        let value = it.arg(1);
        let words: Vec<Cell> = if value.is_function() {
            it.param_keys(value).into_iter().filter_map(param_word).collect()
        } else {
            it.ctx_words(value.varlist())
                .into_iter()
                .map(|(_, sym)| Cell::word(Kind::Word, sym))
                .collect()
        };
        it.block_cell(&words)?
    }

    "values-of" "value [any-context! map!]" {
        let value = it.arg(1);
        let values: Vec<Cell> = if value.kind == Kind::Map {
            map_pairs(it, value.series_id()).into_iter().map(|(_, v)| v).collect()
        } else {
            let varlist = value.varlist();
            it.ctx_words(varlist).into_iter().map(|(n, _)| it.ctx_get(varlist, n)).collect()
        };
        it.block_cell(&values)?
    }

    "protect" "word [any-word!]" {
        let word = it.arg(1);
        protection(it, word, true)?
    }

    "unprotect" "word [any-word!]" {
        let word = it.arg(1);
        protection(it, word, false)?
    }
}

#[cfg(test)]
mod tests {
    use crate::ren::interp::{Interp, InterpConfig};

    fn interp() -> Interp {
        Interp::new(InterpConfig::default()).unwrap()
    }

    #[test]
    fn set_and_get() {
        let mut it = interp();
        assert_eq!(it.interpret("set 'a 5 a").unwrap(), "5");
        assert_eq!(it.interpret("set [b c] [1 2] reduce [b c]").unwrap(), "[1 2]");
        assert_eq!(it.interpret("set [d e] 0 reduce [d e]").unwrap(), "[0 0]");
        assert_eq!(it.interpret("get 'a").unwrap(), "5");
        assert_eq!(it.interpret("void? get/any 'never-set").unwrap(), "true");
        let err = it.interpret("get 'never-set").unwrap_err();
        assert_eq!(err.id(), Some("no-value"));
    }

    #[test]
    fn binding() {
        let mut it = interp();
        it.interpret("o: make object! [x: 10] x: 1").unwrap();
        assert_eq!(it.interpret("do bind copy [x] o").unwrap(), "10");
        assert_eq!(it.interpret("do bind/copy [x + 1] o").unwrap(), "11");
        assert_eq!(it.interpret("get in o 'x").unwrap(), "10");
        assert_eq!(it.interpret("in o 'nothing").unwrap(), "_");
        assert_eq!(it.interpret("x").unwrap(), "1");
    }

    #[test]
    fn use_makes_locals() {
        let mut it = interp();
        assert_eq!(it.interpret("y: 1 use [y] [y: 2 y]").unwrap(), "2");
        assert_eq!(it.interpret("y").unwrap(), "1");
    }

    #[test]
    fn reflection() {
        let mut it = interp();
        assert_eq!(it.interpret("words-of make object! [a: 1 b: 2]").unwrap(), "[a b]");
        assert_eq!(it.interpret("values-of make object! [a: 1 b: 2]").unwrap(), "[1 2]");
        assert_eq!(it.interpret("words-of func [x 'y :z /r] []").unwrap(), "[x 'y :z /r]");
    }

    #[test]
    fn protected_variables() {
        let mut it = interp();
        it.interpret("p: 1 protect 'p").unwrap();
        let err = it.interpret("p: 2").unwrap_err();
        assert_eq!(err.id(), Some("protected"));
        assert_eq!(it.interpret("unprotect 'p p: 3 p").unwrap(), "3");
    }
}
