// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/types/block.rs

// Datatype methods for ANY-ARRAY! and MAP!.

// <>

use std::cmp::Ordering;

use super::super::{
    cell::*,
    compare::Strictness,
    error::{ErrId, Fail},
    func::Bounce,
    interp::Interp,
    series::{flag, Buffer, Content, SeriesId},
    symtab::*,
};
use super::{clamped_index, int_arg, navigate, part_count, part_range, pick_position, series_len};

/// Cells of an array from `start`, resolved against its specifier
fn cells_from(it: &mut Interp, value: Cell, start: usize) -> Vec<Cell> {
    it.array_values(value.with_index(start as u32))
}

fn insert_cells(it: &mut Interp, id: SeriesId, at: usize, cells: &[Cell]) {
    let arr = it.pool.get_mut(id).array_mut();
    arr.insert(at, cells);
    arr.terminate();
}

fn new_array(it: &mut Interp, kind: Kind, cells: &[Cell]) -> Result<Cell, Fail> {
    let id = it.make_array(cells)?;
    Ok(Cell::series(kind, id, 0))
}

/// What an inserted value contributes: a block's items spliced, or
/// the value itself under /ONLY
fn insertion_cells(it: &mut Interp, value: Cell, only: bool) -> Vec<Cell> {
    if value.kind == Kind::Block && !only {
        it.array_values(value)
    } else {
        vec![value.unflagged()]
    }
}

fn strictness(it: &Interp) -> Strictness {
    if it.refine(SYM_CASE) {
        Strictness::Strict
    } else {
        Strictness::Lax
    }
}

/// What FIND and SELECT look for in an array
enum Target {
    Items(Vec<Cell>),
    Kind(Kind),
    Typeset(u64),
}

fn target_of(it: &mut Interp, value: Cell) -> Target {
    let only = it.refine(SYM_ONLY);
    match value.kind {
        Kind::Datatype if !only => Target::Kind(value.datatype_val()),
        Kind::Typeset if !only => Target::Typeset(value.typeset_bits()),
        _ => Target::Items(insertion_cells(it, value, only)),
    }
}

/// Position and length of a match in `hay`; the options are read
/// from the running frame's refinements
fn find_cells(it: &mut Interp, hay: &[Cell], start: usize, end: usize, target: &Target) -> Result<Option<(usize, usize)>, Fail> {
    let mode = strictness(it);
    let skip = match it.param(SYM_SKIP) {
        Some(n) => {
            let n = int_arg(it, n)?;
            if n <= 0 {
                return Err(it.error(ErrId::OutOfRange, &[Cell::integer(n)]));
            }
            n as usize
        }
        None => 1,
    };
    let (last, reverse, matching) = (it.refine(SYM_LAST), it.refine(SYM_REVERSE), it.refine(SYM_MATCH));

    let matches_at = |it: &Interp, i: usize| -> Option<usize> {
        match target {
            Target::Items(items) => {
                let fits = i + items.len() <= end
                    && hay[i..i + items.len()].iter().zip(items).all(|(a, b)| it.equal_values(*a, *b, mode));
                fits.then_some(items.len())
            }
            Target::Kind(k) => (i < end && hay[i].kind == *k).then_some(1),
            Target::Typeset(bits) => (i < end && bits & hay[i].kind.bit() != 0).then_some(1),
        }
    };

    if matching {
        return Ok(matches_at(it, start).map(|n| (start, n)));
    }
    if last || reverse {
        let Some(from) = (if reverse { start.checked_sub(1) } else { end.checked_sub(1) }) else {
            return Ok(None);
        };
        let floor = if reverse { 0 } else { start as isize };
        let mut i = from as isize;
        while i >= floor {
            if let Some(n) = matches_at(it, i as usize) {
                return Ok(Some((i as usize, n)));
            }
            i -= skip as isize;
        }
        return Ok(None);
    }
    let mut i = start;
    while i < end {
        if let Some(n) = matches_at(it, i) {
            return Ok(Some((i, n)));
        }
        i += skip;
    }
    Ok(None)
}

/// Total order for SORT: values that cannot be compared fall back to
/// their kind's position among the datatypes
fn sort_order(it: &Interp, a: Cell, b: Cell, case: bool) -> Ordering {
    match it.compare_values(a, b, case) {
        Some(o) => o,
        None => a.kind.cmp(&b.kind),
    }
}

fn sort_array(it: &mut Interp, value: Cell) -> Result<(), Fail> {
    let id = value.series_id();
    let index = clamped_index(it, value);
    let case = it.refine(SYM_CASE);
    let reverse = it.refine(SYM_REVERSE);
    let comparator = {
        let sym = it.intern("compare");
        it.param(sym)
    };
    let size = match it.param(SYM_SKIP) {
        Some(n) => int_arg(it, n)?.max(1) as usize,
        None => 1,
    };
    let part = it.param(SYM_PART);
    let (start, count) = part_range(it, value, part)?;
    let start = start.max(index);

    let cells: Vec<Cell> = it.pool.get(id).array().as_slice()[start..start + count].to_vec();
    let mut records: Vec<Vec<Cell>> = cells.chunks(size).map(|c| c.to_vec()).collect();

    let mut failure = None;
    match comparator {
        Some(f) if f.is_function() => {
            records.sort_by(|a, b| {
                if failure.is_some() {
                    return Ordering::Equal;
                }
                match it.apply_values(f, &[a[0], b[0]]) {
                    Ok(r) if r.kind == Kind::Integer => r.int().cmp(&0),
                    Ok(r) if r.is_truthy() => Ordering::Less,
                    Ok(_) => Ordering::Greater,
                    Err(e) => {
                        failure = Some(e);
                        Ordering::Equal
                    }
                }
            });
        }
        Some(n) if n.kind == Kind::Integer => {
            let it: &Interp = it;
            let col = (n.int().max(1) as usize - 1).min(size - 1);
            records.sort_by(|a, b| match (a.get(col), b.get(col)) {
                (Some(x), Some(y)) => sort_order(it, *x, *y, case),
                _ => a.len().cmp(&b.len()),
            });
        }
        _ => {
            let it: &Interp = it;
            records.sort_by(|a, b| sort_order(it, a[0], b[0], case))
        }
    }
    if let Some(e) = failure {
        return Err(e);
    }
    if reverse {
        records.reverse();
    }

    let sorted: Vec<Cell> = records.into_iter().flatten().collect();
    let arr = it.pool.get_mut(id).array_mut();
    for (n, c) in sorted.into_iter().enumerate() {
        arr.set(start + n, c);
    }
    Ok(())
}

/// Datatype methods for BLOCK!, GROUP! and the path kinds
pub fn array_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    if let Some(out) = navigate(it, verb, value)? {
        return Ok(Bounce::Out(out));
    }

    let id = value.series_id();
    let index = clamped_index(it, value);
    let len = series_len(it, value);

    let out = match verb {
        SYM_APPEND | SYM_INSERT | SYM_CHANGE => {
            it.check_mutable(value)?;
            let arg = it.arg(2);
            let only = it.refine(SYM_ONLY);
            let mut cells = insertion_cells(it, arg, only);
            if verb != SYM_CHANGE {
                let part = it.param(SYM_PART);
                let n = part_count(it, part, cells.len())?;
                cells.truncate(n);
            }
            if let Some(d) = it.param(SYM_DUP) {
                let d = int_arg(it, d)?.max(0);
                let grown = usize::try_from(d).ok().and_then(|d| cells.len().checked_mul(d));
                it.check_len(grown.and_then(|g| g.checked_add(len)))?;
                cells = cells.repeat(d as usize);
            }
            match verb {
                SYM_APPEND => {
                    insert_cells(it, id, len, &cells);
                    value.with_index(0)
                }
                SYM_INSERT => {
                    insert_cells(it, id, index, &cells);
                    value.with_index((index + cells.len()) as u32)
                }
                _ => {
                    let part = it.param(SYM_PART);
                    let (start, count) = match part {
                        Some(_) => part_range(it, value, part)?,
                        None => (index, cells.len().min(len - index)),
                    };
                    it.pool.get_mut(id).remove(start, count);
                    insert_cells(it, id, start, &cells);
                    value.with_index((start + cells.len()) as u32)
                }
            }
        }
        SYM_REMOVE => {
            it.check_mutable(value)?;
            let part = it.param(SYM_PART);
            let (start, count) = match part {
                Some(_) => part_range(it, value, part)?,
                None => (index, usize::from(index < len)),
            };
            it.pool.get_mut(id).remove(start, count);
            value.with_index(start as u32)
        }
        SYM_CLEAR => {
            it.check_mutable(value)?;
            it.pool.get_mut(id).truncate(index);
            value
        }
        SYM_COPY => {
            let part = it.param(SYM_PART);
            let deep = it.refine(SYM_DEEP);
            let types = match it.param(SYM_TYPES) {
                Some(t) if t.kind == Kind::Typeset => t.typeset_bits(),
                Some(t) if t.kind == Kind::Datatype => t.datatype_val().bit(),
                _ if deep => TS_ANY_SERIES,
                _ => 0,
            };
            let (start, count) = part_range(it, value, part)?;
            let spec = it.specifier_of(value);
            let copy = it.copy_array(value.with_index(start as u32), spec, deep || types != 0, types)?;
            it.pool.get_mut(copy).truncate(count);
            let out = Cell::series(value.kind, copy, 0);
            if value.kind.is_path() {
                out.with_binding(value.binding)
            } else {
                out
            }
        }
        SYM_REVERSE => {
            it.check_mutable(value)?;
            let part = it.param(SYM_PART);
            let (start, count) = part_range(it, value, part)?;
            it.pool.get_mut(id).reverse(start, count);
            value.with_index(start as u32)
        }
        SYM_PICK => {
            let picker = it.arg(2);
            array_pick(it, value, picker)?
        }
        SYM_POKE => {
            let (picker, newval) = (it.arg(2), it.arg(3));
            array_poke(it, value, picker, newval)?;
            newval
        }
        SYM_FIND | SYM_SELECT => {
            let arg = it.arg(2);
            let target = target_of(it, arg);
            let part = it.param(SYM_PART);
            let (start, count) = part_range(it, value, part)?;
            let hay = cells_from(it, value, 0);
            match find_cells(it, &hay, start, start + count, &target)? {
                None => Cell::BLANK,
                Some((pos, n)) if verb == SYM_SELECT => match hay.get(pos + n) {
                    Some(v) => v.unflagged(),
                    None => Cell::BLANK,
                },
                Some((pos, n)) if it.refine(SYM_TAIL) || it.refine(SYM_MATCH) => value.with_index((pos + n) as u32),
                Some((pos, _)) => value.with_index(pos as u32),
            }
        }
        SYM_TAKE => {
            it.check_mutable(value)?;
            let part = it.param(SYM_PART);
            let last = it.refine(SYM_LAST);
            let deep = it.refine(SYM_DEEP);
            match part {
                None => {
                    if index >= len {
                        return Ok(Bounce::Out(Cell::BLANK));
                    }
                    let at = if last { len - 1 } else { index };
                    let taken = cells_from(it, value, at)[0].unflagged();
                    it.pool.get_mut(id).remove(at, 1);
                    if deep && taken.kind.is_series() {
                        it.copy_array_or_string(taken, true)?
                    } else {
                        taken
                    }
                }
                Some(p) => {
                    let n = (int_arg(it, p)?.max(0) as usize).min(len - index);
                    let start = if last { len - n } else { index };
                    let cells: Vec<Cell> = cells_from(it, value, start).into_iter().take(n).collect();
                    let taken = new_array(it, Kind::Block, &cells)?;
                    let taken = if deep { it.copy_array_or_string(taken, true)? } else { taken };
                    it.pool.get_mut(id).remove(start, n);
                    taken
                }
            }
        }
        SYM_SORT => {
            it.check_mutable(value)?;
            sort_array(it, value)?;
            value
        }
        _ => return Err(it.unhandled(verb, value)),
    };
    Ok(Bounce::Out(out))
}

/// Index of the item after a word, for `block/word`
fn word_position(it: &mut Interp, value: Cell, word: Cell) -> Option<usize> {
    let cells = cells_from(it, value, clamped_index(it, value));
    let pos = cells
        .iter()
        .position(|c| c.kind.is_word() && it.syms.same_canon(c.spelling(), word.spelling()))?;
    Some(clamped_index(it, value) + pos + 1)
}

pub fn array_pick(it: &mut Interp, value: Cell, picker: Cell) -> Result<Cell, Fail> {
    let pos = match picker.kind {
        Kind::Integer | Kind::Decimal => pick_position(it, value, picker)?,
        Kind::Logic => {
            let n = Cell::integer(if picker.logic_val() { 1 } else { 2 });
            pick_position(it, value, n)?
        }
        k if k.is_word() => word_position(it, value, picker).filter(|p| *p < series_len(it, value)),
        _ => return Err(it.error(ErrId::BadPathPick, &[picker.unflagged()])),
    };
    Ok(match pos {
        Some(p) => cells_from(it, value, p)[0].unflagged(),
        None => Cell::BLANK,
    })
}

pub fn array_poke(it: &mut Interp, target: Cell, picker: Cell, value: Cell) -> Result<(), Fail> {
    it.check_mutable(target)?;
    let pos = match picker.kind {
        Kind::Integer | Kind::Decimal => pick_position(it, target, picker)?,
        Kind::Logic => {
            let n = Cell::integer(if picker.logic_val() { 1 } else { 2 });
            pick_position(it, target, n)?
        }
        k if k.is_word() => word_position(it, target, picker).filter(|p| *p < series_len(it, target)),
        _ => return Err(it.error(ErrId::BadPathSet, &[picker.unflagged()])),
    };
    let Some(pos) = pos else {
        return Err(it.error(ErrId::PastEnd, &[picker.unflagged()]));
    };
    let old = it.pool.get(target.series_id()).array().get(pos);
    let mut v = value.unflagged();
    if old.flags.has(CellFlags::NEWLINE) {
        v.flags.set(CellFlags::NEWLINE);
    }
    it.pool.get_mut(target.series_id()).array_mut().set(pos, v);
    Ok(())
}

/// TO for the array kinds
pub fn to_array(it: &mut Interp, kind: Kind, spec: Cell) -> Result<Cell, Fail> {
    let cells = match spec.kind {
        k if k.is_array() => it.array_values(spec),
        k if k.is_string() => {
            let text = it.text_of(spec);
            it.transcode_values(&text)?
        }
        Kind::Binary => {
            let bytes = it.pool.get(spec.series_id()).bytes().as_slice().to_vec();
            let bytes = bytes.get(spec.index() as usize..).unwrap_or(&[]);
            let text = String::from_utf8_lossy(bytes).into_owned();
            it.transcode_values(&text)?
        }
        Kind::Map => map_pairs(it, spec.series_id()).into_iter().flat_map(|(k, v)| [k, v]).collect(),
        k if k.is_context() => {
            let varlist = spec.varlist();
            let mut out = Vec::new();
            for (n, sym) in it.ctx_words(varlist) {
                if it.ctx_key_hidden(varlist, n) {
                    continue;
                }
                out.push(Cell::word(Kind::SetWord, sym));
                out.push(it.ctx_get(varlist, n));
            }
            out
        }
        Kind::Typeset => Kind::all()
            .filter(|k| spec.typeset_bits() & k.bit() != 0)
            .map(Cell::datatype)
            .collect(),
        _ => vec![spec.unflagged()],
    };
    new_array(it, kind, &cells)
}

// maps

/// Key and value pairs of a map, in insertion order
pub fn map_pairs(it: &Interp, id: SeriesId) -> Vec<(Cell, Cell)> {
    it.pool
        .get(id)
        .array()
        .as_slice()
        .chunks(2)
        .filter(|p| p.len() == 2)
        .map(|p| (p[0], p[1]))
        .collect()
}

fn map_slot(it: &Interp, id: SeriesId, key: Cell, mode: Strictness) -> Option<usize> {
    let arr = it.pool.get(id).array().as_slice();
    (0..arr.len() / 2).find(|n| it.equal_values(arr[n * 2], key, mode)).map(|n| n * 2)
}

/// Key as stored: series keys are copied and frozen so later changes
/// to the original cannot disturb lookup
fn map_key(it: &mut Interp, key: Cell) -> Result<Cell, Fail> {
    if key.kind.is_string() || key.kind == Kind::Binary {
        let copy = it.copy_array_or_string(key, false)?;
        it.pool.get_mut(copy.series_id()).set(flag::FROZEN);
        Ok(copy)
    } else if key.kind.is_word() {
        Ok(Cell::word(key.kind, key.spelling()))
    } else {
        Ok(key.unflagged())
    }
}

fn map_put(it: &mut Interp, id: SeriesId, key: Cell, value: Cell) -> Result<(), Fail> {
    if key.is_void() || key.is_blank() {
        return Err(it.error(ErrId::InvalidArg, &[key]));
    }
    match map_slot(it, id, key, Strictness::Lax) {
        Some(slot) if value.is_void() || value.is_blank() => it.pool.get_mut(id).remove(slot, 2),
        Some(slot) => it.pool.get_mut(id).array_mut().set(slot + 1, value.unflagged()),
        None if value.is_void() || value.is_blank() => {}
        None => {
            let key = map_key(it, key)?;
            let arr = it.pool.get_mut(id).array_mut();
            arr.push(key);
            arr.push(value.unflagged());
        }
    }
    Ok(())
}

fn new_map(it: &mut Interp, capacity: usize) -> Result<SeriesId, Fail> {
    let id = it.alloc(Content::Array(Buffer::with_capacity(capacity * 2)))?;
    it.pool.get_mut(id).set(flag::MAP);
    it.pool.manage(id);
    Ok(id)
}

/// MAKE MAP!: from a capacity, a block of key and value pairs, or
/// another map
pub fn make_map(it: &mut Interp, spec: Cell) -> Result<Cell, Fail> {
    let id = match spec.kind {
        Kind::Integer => new_map(it, spec.int().max(0) as usize)?,
        Kind::Block => {
            let cells = it.array_values(spec);
            let id = new_map(it, cells.len() / 2)?;
            for pair in cells.chunks(2) {
                match pair {
                    [k, v] => map_put(it, id, *k, *v)?,
                    _ => return Err(it.error(ErrId::InvalidArg, &[spec])),
                }
            }
            id
        }
        Kind::Map => {
            let pairs = map_pairs(it, spec.series_id());
            let id = new_map(it, pairs.len())?;
            for (k, v) in pairs {
                map_put(it, id, k, v)?;
            }
            id
        }
        _ => return Err(it.error(ErrId::BadMake, &[Cell::datatype(Kind::Map), spec.unflagged()])),
    };
    Ok(Cell::series(Kind::Map, id, 0))
}

pub fn map_pick(it: &mut Interp, value: Cell, key: Cell) -> Result<Cell, Fail> {
    let id = value.series_id();
    Ok(match map_slot(it, id, key, Strictness::Lax) {
        Some(slot) => it.pool.get(id).array().get(slot + 1),
        None => Cell::BLANK,
    })
}

pub fn map_poke(it: &mut Interp, target: Cell, key: Cell, value: Cell) -> Result<(), Fail> {
    it.check_mutable(target)?;
    map_put(it, target.series_id(), key, value)
}

/// Datatype methods for MAP!
pub fn map_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let id = value.series_id();

    let out = match verb {
        SYM_PICK | SYM_SELECT => {
            let key = it.arg(2);
            let mode = strictness(it);
            match map_slot(it, id, key, mode) {
                Some(slot) => it.pool.get(id).array().get(slot + 1),
                None => Cell::BLANK,
            }
        }
        SYM_FIND => {
            let key = it.arg(2);
            let mode = strictness(it);
            match map_slot(it, id, key, mode) {
                Some(_) => Cell::logic(true),
                None => Cell::BLANK,
            }
        }
        SYM_POKE => {
            let (key, newval) = (it.arg(2), it.arg(3));
            map_poke(it, value, key, newval)?;
            newval
        }
        SYM_APPEND | SYM_INSERT => {
            it.check_mutable(value)?;
            let arg = it.arg(2);
            if arg.kind != Kind::Block {
                return Err(it.error(ErrId::InvalidArg, &[arg]));
            }
            let cells = it.array_values(arg);
            for pair in cells.chunks(2) {
                match pair {
                    [k, v] => map_put(it, id, *k, *v)?,
                    _ => return Err(it.error(ErrId::InvalidArg, &[arg])),
                }
            }
            value
        }
        SYM_REMOVE => {
            it.check_mutable(value)?;
            let key = match it.param(SYM_PART) {
                Some(k) => k,
                None => return Err(it.error(ErrId::InvalidArg, &[value])),
            };
            map_put(it, id, key, Cell::VOID)?;
            value
        }
        SYM_CLEAR => {
            it.check_mutable(value)?;
            it.pool.get_mut(id).truncate(0);
            value
        }
        SYM_COPY => {
            let pairs = map_pairs(it, id);
            let copy = new_map(it, pairs.len())?;
            let deep = it.refine(SYM_DEEP);
            for (k, v) in pairs {
                let v = if deep && v.kind.is_series() {
                    it.copy_array_or_string(v, true)?
                } else {
                    v
                };
                let arr = it.pool.get_mut(copy).array_mut();
                arr.push(k);
                arr.push(v);
            }
            Cell::series(Kind::Map, copy, 0)
        }
        SYM_LENGTH_OF => Cell::integer((series_len(it, value) / 2) as i64),
        SYM_TAIL_Q => Cell::logic(series_len(it, value) == 0),
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

    #[test]
    fn splicing() {
        assert_eq!(run("append copy [a] [b c]"), "[a b c]");
        assert_eq!(run("append/only copy [a] [b c]"), "[a [b c]]");
        assert_eq!(run("length-of append/only copy [] [a b]"), "1");
        assert_eq!(run("append/dup copy [] 'x 3"), "[x x x]");
        assert_eq!(run("head insert/part copy [d] [a b c] 2"), "[a b d]");
        assert_eq!(run("head change copy [1 2 3] [a b]"), "[a b 3]");
        assert_eq!(run("head change/part copy [1 2 3] 'x 2"), "[x 3]");
    }

    #[test]
    fn removal() {
        assert_eq!(run("head remove copy [a b c]"), "[b c]");
        assert_eq!(run("head remove/part next copy [a b c d] 2"), "[a d]");
        assert_eq!(run("head clear next copy [a b c]"), "[a]");
        assert_eq!(run("b: copy [a b c] take b b"), "[b c]");
        assert_eq!(run("take/last copy [a b c]"), "c");
        assert_eq!(run("take/part copy [a b c] 2"), "[a b]");
        assert_eq!(run("take copy []"), "_");
    }

    #[test]
    fn searching() {
        assert_eq!(run("find [a b c] 'b"), "[b c]");
        assert_eq!(run("find [a b c d] [b c]"), "[b c d]");
        assert_eq!(run("find/only [a [b] c] [b]"), "[[b] c]");
        assert_eq!(run("find [1 \"a\" x] string!"), "[\"a\" x]");
        assert_eq!(run("find/skip [a b a c] 'c 2"), "_");
        assert_eq!(run("find/last [a b a c] 'a"), "[a c]");
        assert_eq!(run("find/tail [a b c] 'a"), "[b c]");
        assert_eq!(run("select [a 1 b 2] 'b"), "2");
        assert_eq!(run("select [a 1] 'z"), "_");
        assert_eq!(run("find [\"A\"] \"a\""), "[\"A\"]");
        assert_eq!(run("find/case [\"A\"] \"a\""), "_");
    }

    #[test]
    fn picking() {
        assert_eq!(run("pick [a b c] 2"), "b");
        assert_eq!(run("pick [a b c] 10"), "_");
        assert_eq!(run("b: [x 10 y 20] b/y"), "20");
        assert_eq!(run("b: copy [1 2 3] b/2: 'two b"), "[1 two 3]");
        assert_eq!(run("pick next [a b c] -1"), "a");
    }

    #[test]
    fn copying() {
        assert_eq!(run("copy/part [a b c] 2"), "[a b]");
        assert_eq!(run("a: [[1]] b: copy/deep a append first b 2 a"), "[[1]]");
        assert_eq!(run("a: copy/deep [[1]] b: copy a append first b 2 a"), "[[1 2]]");
    }

    #[test]
    fn cyclic_deep_copy() {
        assert_eq!(run("b: copy [] append/only b b c: copy/deep b same? c first c"), "true");
        assert_eq!(run("b: copy [] append/only b b c: copy/deep b same? b first c"), "false");
        assert_eq!(run("b: copy [x] append/only b b mold copy/deep b"), "\"[x [...]]\"");
    }

    #[test]
    fn oversized_growth_fails() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        let err = it.interpret("append/dup copy [] 1 100000000000").unwrap_err();
        assert_eq!(err.id(), Some("out-of-range"));
        let err = it.interpret("append/dup copy \"\" #\"x\" 100000000000").unwrap_err();
        assert_eq!(err.id(), Some("out-of-range"));
        let err = it.interpret("make block! 100000000000").unwrap_err();
        assert_eq!(err.id(), Some("out-of-range"));
        let err = it.interpret("make bitset! 100000000000").unwrap_err();
        assert_eq!(err.id(), Some("out-of-range"));
        assert_eq!(it.interpret("length-of append/dup copy [] 1 1000").unwrap(), "1000");
    }

    #[test]
    fn sorting() {
        assert_eq!(run("sort copy [3 1 2]"), "[1 2 3]");
        assert_eq!(run("sort/reverse copy [3 1 2]"), "[3 2 1]");
        assert_eq!(run("sort/skip copy [b 2 a 1] 2"), "[a 1 b 2]");
        assert_eq!(run("sort/compare copy [1 3 2] func [a b] [a > b]"), "[3 2 1]");
        assert_eq!(run("sort copy [\"b\" \"A\" \"c\"]"), "[\"A\" \"b\" \"c\"]");
    }

    #[test]
    fn maps() {
        assert_eq!(run("m: make map! [a 1 b 2] m/b"), "2");
        assert_eq!(run("m: make map! [a 1] m/z"), "_");
        assert_eq!(run("m: make map! [] m/k: 10 length-of m"), "1");
        assert_eq!(run("m: make map! [\"Key\" 1] select m \"key\""), "1");
        assert_eq!(run("m: make map! [a 1 b 2] m/a: _ length-of m"), "1");
    }

    #[test]
    fn locked_source() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        let err = it.interpret("append [a] 'b").unwrap_err();
        assert_eq!(err.id(), Some("locked-series"));
    }
}
