// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/types/mod.rs

// Per-kind datatype methods. A generic action is dispatched on the
// kind of its first argument through the method table below; path
// picking and poking, MAKE and TO go through here as well.

// <>

pub mod block;
pub mod date;
pub mod money;
pub mod number;
pub mod object;
pub mod string;
pub mod tuple;

use super::cell::*;
use super::error::{ErrId, Fail};
use super::func::{Bounce, SpecKind};
use super::interp::Interp;
use super::series::{Buffer, Content};
use super::symtab::*;

/// Handler for the generic actions on one family of kinds
pub type ActionFn = fn(&mut Interp, Sym) -> Result<Bounce, Fail>;

/// The method table
fn handler(kind: Kind) -> Option<ActionFn> {
    Some(match kind {
        Kind::Integer => number::integer_action,
        Kind::Decimal | Kind::Percent => number::decimal_action,
        Kind::Money => number::money_action,
        Kind::Char => number::char_action,
        Kind::Logic => number::logic_action,
        Kind::Blank => number::blank_action,
        Kind::Tuple => tuple::tuple_action,
        Kind::Pair => tuple::pair_action,
        Kind::Date => date::date_action,
        Kind::Time => date::time_action,
        Kind::String | Kind::File | Kind::Email | Kind::Url | Kind::Tag | Kind::Binary => string::string_action,
        Kind::Bitset => string::bitset_action,
        Kind::Block | Kind::Group | Kind::Path | Kind::SetPath | Kind::GetPath | Kind::LitPath => block::array_action,
        Kind::Map => block::map_action,
        Kind::Object | Kind::Module | Kind::Error | Kind::Port | Kind::Frame => object::context_action,
        Kind::Typeset => object::typeset_action,
        Kind::Varargs => object::varargs_action,
        _ => return None,
    })
}

/// Runs generic action `verb` for the top frame
pub fn dispatch_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    match verb {
        SYM_MAKE => {
            let spec = it.arg(2);
            return Ok(Bounce::Out(make_value(it, value, spec)?));
        }
        SYM_TO => {
            let spec = it.arg(2);
            let kind = match value.kind {
                Kind::Datatype => value.datatype_val(),
                k => k,
            };
            return Ok(Bounce::Out(to_value(it, kind, spec)?));
        }
        SYM_COPY if value.is_function() => return Ok(Bounce::Out(it.copy_function(value)?)),
        SYM_COPY if !value.kind.has_series() && !value.kind.is_context() && handler(value.kind).is_none() => {
            return Ok(Bounce::Out(value));
        }
        _ => {}
    }
    match handler(value.kind) {
        Some(h) => {
            if it.config.trace {
                log::trace!("action {} on {}", it.spelling(verb), value.kind.name());
            }
            h(it, verb)
        }
        None => Err(it.unhandled(verb, value)),
    }
}

// series helpers shared by the string and array handlers

/// Length of the underlying series
pub fn series_len(it: &Interp, v: Cell) -> usize {
    it.pool.get(v.series_id()).len()
}

/// Index of a series value, limited to its tail
pub fn clamped_index(it: &Interp, v: Cell) -> usize {
    (v.index() as usize).min(series_len(it, v))
}

/// Integer value of an index or count argument
pub fn int_arg(it: &mut Interp, v: Cell) -> Result<i64, Fail> {
    match v.kind {
        Kind::Integer => Ok(v.int()),
        Kind::Decimal | Kind::Percent => Ok(v.dec() as i64),
        Kind::Logic => Ok(if v.logic_val() { 1 } else { 2 }),
        _ => Err(it.error(ErrId::InvalidArg, &[v])),
    }
}

/// Start and count of the range a /PART limit selects. A negative
/// count seeks backward from the index, never past the head.
pub fn part_range(it: &mut Interp, value: Cell, part: Option<Cell>) -> Result<(usize, usize), Fail> {
    let len = series_len(it, value);
    let index = clamped_index(it, value);
    let Some(p) = part else {
        return Ok((index, len - index));
    };
    let n = match p.kind {
        Kind::Integer => p.int(),
        Kind::Decimal | Kind::Percent => p.dec() as i64,
        Kind::Blank => return Ok((index, len - index)),
        k if k.has_series() && p.series_id() == value.series_id() => p.index() as i64 - index as i64,
        _ => return Err(it.error(ErrId::InvalidPart, &[p])),
    };
    if n >= 0 {
        Ok((index, (n as usize).min(len - index)))
    } else {
        let back = (n.unsigned_abs() as usize).min(index);
        Ok((index - back, back))
    }
}

/// Count taken from a /PART limit applied to an inserted value
pub fn part_count(it: &mut Interp, part: Option<Cell>, available: usize) -> Result<usize, Fail> {
    match part {
        None => Ok(available),
        Some(p) => {
            let n = int_arg(it, p)?;
            Ok((n.max(0) as usize).min(available))
        }
    }
}

/// Navigation actions every series shares; `None` for other verbs
pub fn navigate(it: &mut Interp, verb: Sym, value: Cell) -> Result<Option<Cell>, Fail> {
    let len = series_len(it, value) as i64;
    let index = value.index() as i64;
    let at = |i: i64| Some(value.with_index(i.clamp(0, len) as u32));
    Ok(match verb {
        SYM_SKIP => {
            let n = it.arg(2);
            let n = int_arg(it, n)?;
            at(index + n)
        }
        SYM_AT => {
            let n = it.arg(2);
            let n = int_arg(it, n)?;
            at(index + if n > 0 { n - 1 } else { n })
        }
        SYM_HEAD => at(0),
        SYM_TAIL => at(len),
        SYM_NEXT => at(index + 1),
        SYM_BACK => at(index - 1),
        SYM_HEAD_Q => Some(Cell::logic(index == 0)),
        SYM_TAIL_Q => Some(Cell::logic(index >= len)),
        SYM_INDEX_OF => Some(Cell::integer(index + 1)),
        SYM_LENGTH_OF => Some(Cell::integer((len - index).max(0))),
        _ => None,
    })
}

/// Position a picker selects in a series: one-based from the index
/// for positive integers, backward for negative ones
pub fn pick_position(it: &mut Interp, value: Cell, picker: Cell) -> Result<Option<usize>, Fail> {
    let n = int_arg(it, picker)?;
    let index = value.index() as i64;
    let pos = match n {
        0 => return Ok(None),
        n if n > 0 => index + n - 1,
        n => index + n,
    };
    let len = series_len(it, value) as i64;
    Ok((0..len).contains(&pos).then_some(pos as usize))
}

// paths

/// One step of a path: selects from `value` by `picker`
pub fn pick_path(it: &mut Interp, value: Cell, picker: Cell) -> Result<Cell, Fail> {
    match value.kind {
        k if k.is_array() => block::array_pick(it, value, picker),
        k if k.is_string() || k == Kind::Binary => string::string_pick(it, value, picker),
        Kind::Bitset => string::bitset_pick(it, value, picker),
        Kind::Map => block::map_pick(it, value, picker),
        k if k.is_context() => object::context_pick(it, value, picker),
        Kind::Tuple => tuple::tuple_pick(it, &value.tuple_val(), picker),
        Kind::Pair => tuple::pair_pick(it, value.pair_val(), picker),
        Kind::Date => date::date_pick(it, &value.date_val(), picker),
        Kind::Time => date::time_pick(it, value.time_val(), picker),
        Kind::Typeset if picker.kind == Kind::Datatype => {
            Ok(Cell::logic(value.typeset_bits() & picker.datatype_val().bit() != 0))
        }
        _ => Err(it.error(ErrId::BadPathPick, &[picker.unflagged()])),
    }
}

/// Assigns through the last step of a path. Immediate values can not
/// be changed where they live, so the updated value is handed back to
/// be stored one level up.
pub fn poke_path(it: &mut Interp, target: Cell, picker: Cell, value: Cell) -> Result<Option<Cell>, Fail> {
    match target.kind {
        k if k.is_array() => block::array_poke(it, target, picker, value).map(|_| None),
        k if k.is_string() || k == Kind::Binary => string::string_poke(it, target, picker, value).map(|_| None),
        Kind::Bitset => string::bitset_poke(it, target, picker, value).map(|_| None),
        Kind::Map => block::map_poke(it, target, picker, value).map(|_| None),
        k if k.is_context() => object::context_poke(it, target, picker, value).map(|_| None),
        Kind::Tuple => {
            let mut tup = target.tuple_val();
            tuple::tuple_poke(it, &mut tup, picker, value)?;
            Ok(Some(Cell::tuple(tup)))
        }
        Kind::Pair => {
            let (x, y) = target.pair_val();
            let n = match picker.kind {
                Kind::Word => match it.syms.canon(picker.spelling()) {
                    SYM_X => 1,
                    SYM_Y => 2,
                    _ => 0,
                },
                Kind::Integer => picker.int(),
                _ => 0,
            };
            let v = match value.kind {
                Kind::Integer => value.int() as f32,
                Kind::Decimal => value.dec() as f32,
                _ => return Err(it.error(ErrId::InvalidArg, &[value])),
            };
            match n {
                1 => Ok(Some(Cell::pair(v, y))),
                2 => Ok(Some(Cell::pair(x, v))),
                _ => Err(it.error(ErrId::BadPathSet, &[picker.unflagged()])),
            }
        }
        Kind::Date => date::date_poke(it, target.date_val(), picker, value).map(|d| Some(Cell::date(d))),
        Kind::Time => date::time_poke(it, target.time_val(), picker, value).map(|t| Some(Cell::time(t))),
        _ => Err(it.error(ErrId::BadPathSet, &[picker.unflagged()])),
    }
}

// MAKE and TO

fn bad_make(it: &mut Interp, kind: Kind, spec: Cell) -> Fail {
    it.error(ErrId::BadMake, &[Cell::datatype(kind), spec.unflagged()])
}

/// MAKE: `kind` is a datatype, or an example value of the kind to
/// make. Objects given as the example are derived from.
pub fn make_value(it: &mut Interp, example: Cell, spec: Cell) -> Result<Cell, Fail> {
    let kind = match example.kind {
        Kind::Datatype => example.datatype_val(),
        k if k.is_context() && k != Kind::Frame => {
            return object::make_context(it, k, Some(example.varlist()), spec);
        }
        k => k,
    };

    match kind {
        k if k.is_array() => match spec.kind {
            Kind::Integer | Kind::Decimal => {
                let n = int_arg(it, spec)?.max(0);
                let n = it.check_len(usize::try_from(n).ok())?;
                let id = it.alloc(Content::Array(Buffer::with_capacity(n)))?;
                it.pool.manage(id);
                Ok(Cell::series(kind, id, 0))
            }
            _ => to_value(it, kind, spec),
        },
        k if k.is_string() || k == Kind::Binary => match spec.kind {
            Kind::Integer | Kind::Decimal => {
                let n = int_arg(it, spec)?.max(0);
                let n = it.check_len(usize::try_from(n).ok())?;
                let id = it.alloc(Content::Bytes(Buffer::with_capacity(n)))?;
                it.pool.manage(id);
                Ok(Cell::series(kind, id, 0))
            }
            _ => to_value(it, kind, spec),
        },
        Kind::Map => block::make_map(it, spec),
        Kind::Bitset => string::make_bitset(it, spec),
        Kind::Object | Kind::Module | Kind::Port => object::make_context(it, kind, None, spec),
        Kind::Error => object::make_error_value(it, spec),
        Kind::Frame => {
            if !spec.is_function() {
                return Err(bad_make(it, kind, spec));
            }
            let varlist = it.make_frame_for(spec)?;
            Ok(Cell::frame(varlist, spec.paramlist()))
        }
        Kind::Function => {
            if spec.kind != Kind::Block {
                return Err(bad_make(it, kind, spec));
            }
            let parts = it.array_values(spec);
            match parts.as_slice() {
                [s, b] if s.kind == Kind::Block && b.kind == Kind::Block => {
                    it.make_interpreted(*s, *b, SpecKind::Func, false)
                }
                _ => Err(bad_make(it, kind, spec)),
            }
        }
        Kind::Typeset if spec.kind == Kind::Block => {
            let (bits, _) = it.typeset_from_spec(spec)?;
            Ok(Cell::typeset(bits))
        }
        _ => to_value(it, kind, spec),
    }
}

/// TO: conversion of a value to another kind
pub fn to_value(it: &mut Interp, kind: Kind, spec: Cell) -> Result<Cell, Fail> {
    if spec.kind == kind && !kind.has_series() && !kind.is_context() {
        return Ok(spec.unflagged());
    }
    match kind {
        Kind::Integer | Kind::Decimal | Kind::Percent | Kind::Money | Kind::Char | Kind::Logic => {
            number::to_number(it, kind, spec)
        }
        Kind::Blank => Ok(Cell::BLANK),
        Kind::Pair => match spec.kind {
            Kind::Integer => Ok(Cell::pair(spec.int() as f32, spec.int() as f32)),
            Kind::Decimal => Ok(Cell::pair(spec.dec() as f32, spec.dec() as f32)),
            Kind::Block => {
                let vals = it.array_values(spec);
                let coord = |c: &Cell| match c.kind {
                    Kind::Integer => Some(c.int() as f32),
                    Kind::Decimal => Some(c.dec() as f32),
                    _ => None,
                };
                match vals.as_slice() {
                    [x, y] => match (coord(x), coord(y)) {
                        (Some(x), Some(y)) => Ok(Cell::pair(x, y)),
                        _ => Err(bad_make(it, kind, spec)),
                    },
                    _ => Err(bad_make(it, kind, spec)),
                }
            }
            k if k.is_string() => scan_as(it, kind, spec),
            _ => Err(bad_make(it, kind, spec)),
        },
        Kind::Tuple => match spec.kind {
            Kind::Block => {
                let vals = it.array_values(spec);
                let bytes: Option<Vec<u8>> = vals
                    .iter()
                    .map(|v| (v.kind == Kind::Integer && (0..=255).contains(&v.int())).then(|| v.int() as u8))
                    .collect();
                match bytes.and_then(|b| tuple::Tuple::new(&b)) {
                    Some(t) => Ok(Cell::tuple(t)),
                    None => Err(bad_make(it, kind, spec)),
                }
            }
            Kind::Binary => {
                let bytes = it.pool.get(spec.series_id()).bytes().as_slice().to_vec();
                let bytes = bytes.get(spec.index() as usize..).unwrap_or(&[]).to_vec();
                match tuple::Tuple::new(&bytes) {
                    Some(t) => Ok(Cell::tuple(t)),
                    None => Err(bad_make(it, kind, spec)),
                }
            }
            k if k.is_string() => scan_as(it, kind, spec),
            _ => Err(bad_make(it, kind, spec)),
        },
        Kind::Time => match spec.kind {
            Kind::Integer => match spec.int().checked_mul(date::NANOS_PER_SEC) {
                Some(n) => Ok(Cell::time(n)),
                None => Err(it.error(ErrId::Overflow, &[])),
            },
            Kind::Decimal => Ok(Cell::time(date::nanos_of(it, spec.dec() * date::NANOS_PER_SEC as f64)?)),
            Kind::Block => {
                let vals = it.array_values(spec);
                let mut nanos = 0i64;
                let units = [date::NANOS_PER_HOUR, date::NANOS_PER_MIN, date::NANOS_PER_SEC];
                for (v, unit) in vals.iter().zip(units) {
                    let part = match v.kind {
                        Kind::Integer => v.int().checked_mul(unit),
                        Kind::Decimal => Some(date::nanos_of(it, v.dec() * unit as f64)?),
                        _ => return Err(bad_make(it, kind, spec)),
                    };
                    match part.and_then(|p| nanos.checked_add(p)) {
                        Some(n) => nanos = n,
                        None => return Err(it.error(ErrId::Overflow, &[])),
                    }
                }
                Ok(Cell::time(nanos))
            }
            k if k.is_string() => scan_as(it, kind, spec),
            _ => Err(bad_make(it, kind, spec)),
        },
        Kind::Date => match spec.kind {
            Kind::Block => {
                let vals = it.array_values(spec);
                let part = |i: usize| vals.get(i).filter(|v| v.kind == Kind::Integer).map(|v| v.int());
                let made = match (part(0), part(1), part(2)) {
                    (Some(y), Some(m), Some(d)) => date::Date::new(y, m as u8, d as u8),
                    _ => None,
                };
                made.map(Cell::date).ok_or_else(|| bad_make(it, kind, spec))
            }
            k if k.is_string() => scan_as(it, kind, spec),
            _ => Err(bad_make(it, kind, spec)),
        },
        k if k.is_word() => match spec.kind {
            sk if sk.is_word() => Ok(Cell::word(kind, spec.spelling())),
            sk if sk.is_string() => {
                let text = it.text_of(spec);
                let name = text.trim();
                if name.is_empty() || name.contains(char::is_whitespace) {
                    return Err(bad_make(it, kind, spec));
                }
                let sym = it.intern(name);
                Ok(Cell::word(kind, sym))
            }
            Kind::Datatype => {
                let sym = it.intern(spec.datatype_val().name());
                Ok(Cell::word(kind, sym))
            }
            Kind::Logic => {
                let sym = if spec.logic_val() { SYM_TRUE } else { SYM_FALSE };
                Ok(Cell::word(kind, sym))
            }
            _ => Err(bad_make(it, kind, spec)),
        },
        k if k.is_string() => string::to_string_kind(it, kind, spec),
        Kind::Binary => string::to_binary(it, spec),
        k if k.is_array() => block::to_array(it, kind, spec),
        Kind::Map => block::make_map(it, spec),
        Kind::Bitset => string::make_bitset(it, spec),
        Kind::Datatype => match spec.kind {
            sk if sk.is_word() => {
                let name = it.spelling(spec.spelling()).to_string();
                match Kind::from_name(&name) {
                    Some(k) => Ok(Cell::datatype(k)),
                    None => Err(bad_make(it, kind, spec)),
                }
            }
            _ => Ok(Cell::datatype(spec.kind)),
        },
        Kind::Typeset => match spec.kind {
            Kind::Datatype => Ok(Cell::typeset(spec.datatype_val().bit())),
            Kind::Block => {
                let (bits, _) = it.typeset_from_spec(spec)?;
                Ok(Cell::typeset(bits))
            }
            _ => Err(bad_make(it, kind, spec)),
        },
        Kind::Frame if spec.kind == Kind::Frame => Ok(spec.unflagged()),
        Kind::Object | Kind::Module | Kind::Error | Kind::Port if spec.kind.is_context() => {
            let varlist = it.ctx_copy(spec.varlist(), false)?;
            Ok(Cell::context(kind, varlist))
        }
        Kind::Object | Kind::Module | Kind::Port => object::make_context(it, kind, None, spec),
        Kind::Error => object::make_error_value(it, spec),
        _ => Err(bad_make(it, kind, spec)),
    }
}

/// Loads a single value of `kind` from string text
fn scan_as(it: &mut Interp, kind: Kind, spec: Cell) -> Result<Cell, Fail> {
    let text = it.text_of(spec);
    let vals = match it.trap(|it| it.transcode_values(&text))? {
        Ok(v) => v,
        Err(_) => return Err(bad_make(it, kind, spec)),
    };
    match vals.as_slice() {
        [v] if v.kind == kind => Ok(v.unflagged()),
        [v] if kind == Kind::Decimal && v.kind == Kind::Integer => Ok(Cell::decimal(v.int() as f64)),
        _ => Err(bad_make(it, kind, spec)),
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
    fn navigation() {
        assert_eq!(run("index-of next next [a b c]"), "3");
        assert_eq!(run("head? back next [a]"), "true");
        assert_eq!(run("tail? skip [a b] 5"), "true");
        assert_eq!(run("at [a b c] 2"), "[b c]");
        assert_eq!(run("length-of next \"abc\""), "2");
    }

    #[test]
    fn negative_part_seeks_backward() {
        assert_eq!(run("copy/part tail [a b c] -2"), "[b c]");
        assert_eq!(run("copy/part next [a b c] -5"), "[a]");
    }

    #[test]
    fn conversions() {
        assert_eq!(run("to integer! \"12\""), "12");
        assert_eq!(run("to string! 12"), "\"12\"");
        assert_eq!(run("to block! \"a 1\""), "[a 1]");
        assert_eq!(run("make block! 10"), "[]");
        assert_eq!(run("to word! \"abc\""), "abc");
        assert_eq!(run("to tuple! [1 2 3]"), "1.2.3");
        assert_eq!(run("to pair! [1 2]"), "1x2");
        assert_eq!(run("to time! 90"), "0:01:30");
        assert_eq!(run("to datatype! 'integer!"), "integer!");
    }

    #[test]
    fn host_kinds_are_not_made() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        for src in ["make image! 10x10", "make vector! [integer! 8]", "make gob! []"] {
            let err = it.interpret(src).unwrap_err();
            assert_eq!(err.id(), Some("bad-make"), "{}", src);
        }
    }
}
