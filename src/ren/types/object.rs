// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/types/object.rs

// Datatype methods for the context kinds, TYPESET! and VARARGS!.

// <>

use super::super::{
    cell::*,
    context::BindMode,
    error::{Category, ErrId, Fail, ERR_CODE, ERR_ID, ERR_MESSAGE, ERR_TYPE},
    func::Bounce,
    interp::Interp,
    series::SeriesId,
    symtab::*,
};
use super::int_arg;

/// Slot a word picker names in a context
fn field_slot(it: &Interp, varlist: SeriesId, picker: Cell) -> Option<u32> {
    if !picker.kind.is_word() {
        return None;
    }
    let n = it.ctx_find(varlist, picker.spelling())?;
    // SELF is hidden from reflection but still reachable by name
    if it.ctx_key_hidden(varlist, n) && it.syms.canon(picker.spelling()) != SYM_SELF {
        return None;
    }
    Some(n)
}

pub fn context_pick(it: &mut Interp, value: Cell, picker: Cell) -> Result<Cell, Fail> {
    let varlist = value.varlist();
    match field_slot(it, varlist, picker) {
        Some(n) => Ok(it.ctx_get(varlist, n)),
        None => Err(it.error(ErrId::BadPathPick, &[picker.unflagged()])),
    }
}

/// Assigns a field; protection and locking are honored the way they
/// are for a plain SET-WORD!
pub fn context_poke(it: &mut Interp, target: Cell, picker: Cell, value: Cell) -> Result<(), Fail> {
    let varlist = target.varlist();
    let Some(n) = field_slot(it, varlist, picker) else {
        return Err(it.error(ErrId::BadPathSet, &[picker.unflagged()]));
    };
    let word = Cell::bound_word(Kind::Word, picker.spelling(), Binding::Specific(varlist), n);
    it.set_var(word, None, value)
}

/// Adds the set-words of `block` to a context and runs the block
/// bound to it
fn extend_context(it: &mut Interp, varlist: SeriesId, block: Cell) -> Result<(), Fail> {
    let spec = it.specifier_of(block);
    let body = it.copy_array(block, spec, true, TS_ANY_ARRAY)?;
    let mark = it.guards.len();
    it.guards.push(varlist);
    it.guards.push(body);
    let result = it
        .bind_array(body, 0, varlist, BindMode::AddSetWords, true)
        .and_then(|_| it.do_array(body, 0, None));
    it.guards.truncate(mark);
    result.map(|_| ())
}

/// MAKE of OBJECT!, MODULE! and PORT!: the spec block's top-level
/// set-words become the fields, then the block runs bound to them.
/// With a parent the new context starts as a deep copy of it.
pub fn make_context(it: &mut Interp, kind: Kind, parent: Option<SeriesId>, spec: Cell) -> Result<Cell, Fail> {
    if spec.kind != Kind::Block {
        return Err(it.error(ErrId::BadMake, &[Cell::datatype(kind), spec.unflagged()]));
    }

    let varlist = match parent {
        Some(p) => it.ctx_copy(p, true)?,
        None => {
            let mut words = Vec::new();
            it.collect_set_words(spec.series_id(), spec.index(), false, &mut words);
            let varlist = it.make_context(kind, &words)?;
            if kind != Kind::Error {
                it.ctx_add_self(varlist)?;
            }
            varlist
        }
    };

    if cfg!(feature = "memdbg") {
        log::debug!("making {} with {} fields", kind.name(), it.ctx_len(varlist));
    }

    extend_context(it, varlist, spec)?;
    Ok(it.ctx_archetype(varlist))
}

/// MAKE ERROR!: a string gives a user error with that message; a
/// block sets the error's fields, and a known TYPE and ID pair fills
/// in the code and message from the catalog
pub fn make_error_value(it: &mut Interp, spec: Cell) -> Result<Cell, Fail> {
    match spec.kind {
        k if k.is_string() => {
            let message = it.copy_array_or_string(spec, false)?.with_kind(Kind::String);
            let err = it.make_error(ErrId::User, &[])?;
            it.ctx_set(err.varlist(), ERR_MESSAGE, message);
            Ok(err)
        }
        Kind::Block => {
            let varlist = it.error_context()?;
            extend_context(it, varlist, spec)?;

            let ty = it.ctx_get(varlist, ERR_TYPE);
            let id = it.ctx_get(varlist, ERR_ID);
            let category = if ty.kind.is_word() {
                Category::from_sym(it.syms.canon(ty.spelling()))
            } else {
                it.ctx_set(varlist, ERR_TYPE, Cell::word(Kind::Word, SYM_USER));
                Some(Category::User)
            };
            let entry = match (category, id.kind.is_word()) {
                (Some(cat), true) => ErrId::from_name(cat, &it.spelling(id.spelling()).to_string()),
                _ => None,
            };

            match (entry, category) {
                (Some(e), _) => {
                    it.ctx_set(varlist, ERR_CODE, Cell::integer(e.code()));
                    if it.ctx_get(varlist, ERR_MESSAGE).is_blank() {
                        let template = it.string_cell(Kind::String, e.template())?;
                        it.ctx_set(varlist, ERR_MESSAGE, template);
                    }
                }
                (None, Some(cat)) => it.ctx_set(varlist, ERR_CODE, Cell::integer(cat.base())),
                (None, None) => {}
            }
            it.locate_error(varlist)?;
            Ok(Cell::context(Kind::Error, varlist))
        }
        _ => Err(it.error(ErrId::BadMake, &[Cell::datatype(Kind::Error), spec.unflagged()])),
    }
}

/// Datatype methods for OBJECT!, MODULE!, ERROR!, PORT! and FRAME!
pub fn context_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let varlist = value.varlist();

    let out = match verb {
        SYM_PICK | SYM_SELECT => {
            let picker = it.arg(2);
            match field_slot(it, varlist, picker) {
                Some(n) => it.ctx_get(varlist, n),
                None if verb == SYM_SELECT => Cell::BLANK,
                None => return Err(it.error(ErrId::BadPathPick, &[picker.unflagged()])),
            }
        }
        SYM_FIND => {
            let picker = it.arg(2);
            match field_slot(it, varlist, picker) {
                Some(_) => Cell::logic(true),
                None => Cell::BLANK,
            }
        }
        SYM_POKE => {
            let (picker, newval) = (it.arg(2), it.arg(3));
            context_poke(it, value, picker, newval)?;
            newval
        }
        SYM_APPEND => {
            let arg = it.arg(2);
            if value.kind == Kind::Frame || arg.kind != Kind::Block {
                return Err(it.error(ErrId::InvalidArg, &[arg]));
            }
            // words alone are added as fields; set-words take values
            for cell in it.array_values(arg) {
                if cell.kind == Kind::Word && it.ctx_find(varlist, cell.spelling()).is_none() {
                    it.ctx_append(varlist, cell.spelling())?;
                }
            }
            extend_context(it, varlist, arg)?;
            value
        }
        SYM_COPY => {
            let deep = it.refine(SYM_DEEP);
            let fresh = it.ctx_copy(varlist, deep)?;
            match value.phase() {
                Some(phase) if value.kind == Kind::Frame => Cell::frame(fresh, phase),
                _ => it.ctx_archetype(fresh),
            }
        }
        SYM_LENGTH_OF => Cell::integer(it.ctx_words(varlist).len() as i64),
        SYM_TAIL_Q => Cell::logic(it.ctx_words(varlist).is_empty()),
        _ => return Err(it.unhandled(verb, value)),
    };
    Ok(Bounce::Out(out))
}

/// Datatype methods for TYPESET!
pub fn typeset_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let bits = value.typeset_bits();

    let other = |it: &mut Interp, v: Cell| -> Result<u64, Fail> {
        match v.kind {
            Kind::Typeset => Ok(v.typeset_bits()),
            Kind::Datatype => Ok(v.datatype_val().bit()),
            Kind::Block => Ok(it.typeset_from_spec(v)?.0),
            _ => Err(it.error(ErrId::InvalidArg, &[v])),
        }
    };

    let out = match verb {
        SYM_FIND | SYM_PICK => {
            let arg = it.arg(2);
            match arg.kind {
                Kind::Datatype => Cell::logic(bits & arg.datatype_val().bit() != 0),
                _ => return Err(it.error(ErrId::InvalidArg, &[arg])),
            }
        }
        SYM_AND_T | SYM_OR_T | SYM_XOR_T => {
            let arg = it.arg(2);
            let rhs = other(it, arg)?;
            Cell::typeset(match verb {
                SYM_AND_T => bits & rhs,
                SYM_OR_T => bits | rhs,
                _ => bits ^ rhs,
            })
        }
        SYM_COMPLEMENT => Cell::typeset(!bits & TS_OPT_ANY_VALUE),
        SYM_COPY => Cell::typeset(bits),
        SYM_LENGTH_OF => Cell::integer(bits.count_ones() as i64),
        _ => return Err(it.unhandled(verb, value)),
    };
    Ok(Bounce::Out(out))
}

/// Datatype methods for VARARGS!
pub fn varargs_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let out = match verb {
        SYM_TAKE => match it.param(SYM_PART) {
            None => it.varargs_take(value)?,
            Some(n) => {
                let n = int_arg(it, n)?.max(0);
                let mut taken = Vec::new();
                for _ in 0..n {
                    if it.varargs_tail(value)? {
                        break;
                    }
                    taken.push(it.varargs_take(value)?);
                }
                it.block_cell(&taken)?
            }
        },
        SYM_TAIL_Q => Cell::logic(it.varargs_tail(value)?),
        _ => return Err(it.unhandled(verb, value)),
    };
    Ok(Bounce::Out(out))
}

#[cfg(test)]
mod tests {
    use crate::ren::interp::{Interp, InterpConfig};

    fn run(src: &str) -> String {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        it.interpret(src).unwrap()
    }

    fn fails(src: &str) -> String {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        it.interpret(src).unwrap_err().id().unwrap_or_default().to_string()
    }

    #[test]
    fn objects() {
        assert_eq!(run("o: make object! [a: 1 b: a + 1] o/b"), "2");
        assert_eq!(run("o: make object! [a: 1 f: does [a * 10]] o/f"), "10");
        assert_eq!(run("o: make object! [n: 1] o/n: 5 o/n"), "5");
        assert_eq!(run("o: make object! [a: 1] words-of o"), "[a]");
        assert_eq!(run("o: make object! [a: 1] same? o o/self"), "true");
        assert_eq!(fails("o: make object! [a: 1] o/z"), "bad-path-pick");
    }

    #[test]
    fn derivation() {
        assert_eq!(run("p: make object! [a: 1 b: 2] c: make p [b: 20 c: 30] reduce [c/a c/b c/c p/b]"), "[1 20 30 2]");
        assert_eq!(run("p: make object! [n: 0 f: does [n]] c: make p [n: 9] c/f"), "9");
        assert_eq!(run("p: make object! [a: [1]] c: copy/deep p append c/a 2 p/a"), "[1]");
    }

    #[test]
    fn extension() {
        assert_eq!(run("o: make object! [a: 1] append o [b: 2] o/b"), "2");
        assert_eq!(run("o: make object! [a: 1] select o 'a"), "1");
        assert_eq!(run("o: make object! [a: 1] select o 'q"), "_");
    }

    #[test]
    fn errors() {
        assert_eq!(run("e: make error! \"boom\" e/message"), "\"boom\"");
        assert_eq!(run("e: make error! [type: 'math id: 'zero-divide] e/code"), "400");
        assert_eq!(run("e: make error! [message: \"x\"] e/type"), "user");
        assert_eq!(fails("fail make error! [type: 'script id: 'invalid-arg arg1: 10]"), "invalid-arg");
    }

    #[test]
    fn typesets() {
        assert_eq!(run("find any-number! integer!"), "true");
        assert_eq!(run("find any-number! string!"), "false");
        assert_eq!(run("t: and~ any-series! any-string! find t block!"), "false");
    }
}
