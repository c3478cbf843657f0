// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/types/string.rs

// Datatype methods for ANY-STRING!, BINARY! and BITSET!.

// Strings and binaries share one representation here: a series of
// units, codepoints for strings and bytes for binaries. A Latin-1
// string and a binary are both byte series, so the unit helpers of
// `Series` serve both.

// <>

use super::super::{
    cell::{Cell, Kind},
    compare::fold,
    error::{ErrId, Fail},
    func::Bounce,
    interp::Interp,
    series::{Buffer, Content, SeriesId},
    symtab::*,
};
use super::{clamped_index, int_arg, navigate, part_count, part_range, pick_position, series_len};

/// Value of the unit at `i` as a cell
fn unit_cell(binary: bool, u: u32) -> Cell {
    if binary {
        Cell::integer(u as i64)
    } else {
        Cell::char(u)
    }
}

/// New series of `kind` holding `units`
fn units_cell(it: &mut Interp, kind: Kind, units: &[u32]) -> Result<Cell, Fail> {
    let content = if units.iter().all(|u| *u <= 0xFF) {
        Content::Bytes(Buffer::from_slice(&units.iter().map(|u| *u as u8).collect::<Vec<u8>>()))
    } else {
        Content::Wide(Buffer::from_slice(units))
    };
    let id = it.alloc(content)?;
    it.pool.manage(id);
    Ok(Cell::series(kind, id, 0))
}

fn units_from(it: &Interp, value: Cell) -> Vec<u32> {
    it.pool.get(value.series_id()).chars_from(clamped_index(it, value))
}

fn text_units(text: &str) -> Vec<u32> {
    text.chars().map(|c| c as u32).collect()
}

fn utf8_units(text: &str) -> Vec<u32> {
    text.bytes().map(|b| b as u32).collect()
}

/// Units a value contributes when inserted into a string or binary
fn insertion_units(it: &mut Interp, value: Cell, binary: bool) -> Result<Vec<u32>, Fail> {
    if binary {
        return Ok(match value.kind {
            Kind::Binary => units_from(it, value),
            k if k.is_string() => utf8_units(&it.text_of(value)),
            Kind::Integer => match u8::try_from(value.int()) {
                Ok(b) => vec![b as u32],
                Err(_) => return Err(it.error(ErrId::OutOfRange, &[value])),
            },
            Kind::Char => {
                let c = char::from_u32(value.chr()).unwrap_or(char::REPLACEMENT_CHARACTER);
                utf8_units(c.encode_utf8(&mut [0; 4]))
            }
            Kind::Block => {
                let mut out = Vec::new();
                for v in it.array_values(value) {
                    out.extend(insertion_units(it, v, true)?);
                }
                out
            }
            _ => return Err(it.error(ErrId::InvalidArg, &[value])),
        });
    }
    Ok(match value.kind {
        k if k.is_string() => units_from(it, value),
        Kind::Char => vec![value.chr()],
        Kind::Binary => {
            let bytes: Vec<u8> = units_from(it, value).into_iter().map(|u| u as u8).collect();
            text_units(&String::from_utf8_lossy(&bytes))
        }
        Kind::Block => {
            let mut out = Vec::new();
            for v in it.array_values(value) {
                out.extend(insertion_units(it, v, false)?);
            }
            out
        }
        _ => {
            let text = it.form(value);
            text_units(&text)
        }
    })
}

fn insert_units(it: &mut Interp, id: SeriesId, at: usize, units: &[u32]) {
    it.pool.get_mut(id).insert_chars(at, units);
}

fn same_unit(a: u32, b: u32, case: bool) -> bool {
    a == b || (!case && fold(a) == fold(b))
}

/// Bit test for a BITSET! series
fn bit_of(it: &Interp, id: SeriesId, n: u32) -> bool {
    let bytes = it.pool.get(id).bytes();
    let i = (n / 8) as usize;
    i < bytes.len() && bytes.get(i) & (0x80 >> (n % 8)) != 0
}

fn set_bit(it: &mut Interp, id: SeriesId, n: u32, on: bool) {
    let i = (n / 8) as usize;
    let buf = it.pool.get_mut(id).bytes_mut();
    if i >= buf.len() {
        if !on {
            return;
        }
        let grow = vec![0u8; i + 1 - buf.len()];
        buf.append_extra(&grow, 0);
    }
    let mask = 0x80 >> (n % 8);
    let b = buf.get(i);
    buf.set(i, if on { b | mask } else { b & !mask });
}

/// What FIND looks for
enum Pattern {
    Units(Vec<u32>),
    Charset(SeriesId),
}

struct FindOpts {
    case: bool,
    last: bool,
    reverse: bool,
    tail: bool,
    matching: bool,
    skip: usize,
}

fn find_opts(it: &mut Interp, binary: bool) -> Result<FindOpts, Fail> {
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
    Ok(FindOpts {
        case: binary || it.refine(SYM_CASE),
        last: it.refine(SYM_LAST),
        reverse: it.refine(SYM_REVERSE),
        tail: it.refine(SYM_TAIL),
        matching: it.refine(SYM_MATCH),
        skip,
    })
}

/// Position and length of a match of `pat` in `hay`, searching the
/// positions `start..end` in the direction the options ask for
fn find_in(it: &Interp, hay: &[u32], start: usize, end: usize, pat: &Pattern, o: &FindOpts) -> Option<(usize, usize)> {
    let matches_at = |i: usize| -> Option<usize> {
        match pat {
            Pattern::Units(p) => {
                let fits = i + p.len() <= end && hay[i..i + p.len()].iter().zip(p).all(|(a, b)| same_unit(*a, *b, o.case));
                fits.then_some(p.len())
            }
            Pattern::Charset(bits) => {
                let c = *hay.get(i)?;
                (i < end && (bit_of(it, *bits, c) || (!o.case && (bit_of(it, *bits, fold(c)))))).then_some(1)
            }
        }
    };

    if o.matching {
        return matches_at(start).map(|n| (start, n));
    }
    if o.last || o.reverse {
        let from = if o.reverse { start.checked_sub(1)? } else { end.checked_sub(1)? };
        let floor = if o.reverse { 0 } else { start as isize };
        let mut i = from as isize;
        while i >= floor {
            if let Some(n) = matches_at(i as usize) {
                return Some((i as usize, n));
            }
            i -= o.skip as isize;
        }
        None
    } else {
        let mut i = start;
        while i < end {
            if let Some(n) = matches_at(i) {
                return Some((i, n));
            }
            i += o.skip;
        }
        None
    }
}

fn pattern_of(it: &mut Interp, value: Cell, binary: bool) -> Result<Pattern, Fail> {
    match value.kind {
        Kind::Bitset if !binary => Ok(Pattern::Charset(value.series_id())),
        _ => Ok(Pattern::Units(insertion_units(it, value, binary)?)),
    }
}

/// Datatype methods for the string kinds and BINARY!
pub fn string_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    if let Some(out) = navigate(it, verb, value)? {
        return Ok(Bounce::Out(out));
    }

    let binary = value.kind == Kind::Binary;
    let id = value.series_id();
    let index = clamped_index(it, value);
    let len = series_len(it, value);

    let out = match verb {
        SYM_APPEND | SYM_INSERT | SYM_CHANGE => {
            it.check_mutable(value)?;
            let arg = it.arg(2);
            let mut units = insertion_units(it, arg, binary)?;
            if verb != SYM_CHANGE {
                let part = it.param(SYM_PART);
                let n = part_count(it, part, units.len())?;
                units.truncate(n);
            }
            if let Some(d) = it.param(SYM_DUP) {
                let d = int_arg(it, d)?.max(0);
                let grown = usize::try_from(d).ok().and_then(|d| units.len().checked_mul(d));
                it.check_len(grown.and_then(|g| g.checked_add(len)))?;
                units = units.repeat(d as usize);
            }
            match verb {
                SYM_APPEND => {
                    insert_units(it, id, len, &units);
                    value.with_index(0)
                }
                SYM_INSERT => {
                    insert_units(it, id, index, &units);
                    value.with_index((index + units.len()) as u32)
                }
                _ => {
                    let part = it.param(SYM_PART);
                    let (start, count) = match part {
                        Some(_) => part_range(it, value, part)?,
                        None => (index, units.len().min(len - index)),
                    };
                    it.pool.get_mut(id).remove(start, count);
                    insert_units(it, id, start, &units);
                    value.with_index((start + units.len()) as u32)
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
            let (start, count) = part_range(it, value, part)?;
            let units = it.pool.get(id).chars_from(start);
            units_cell(it, value.kind, &units[..count.min(units.len())])?
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
            string_pick(it, value, picker)?
        }
        SYM_POKE => {
            let (picker, newval) = (it.arg(2), it.arg(3));
            string_poke(it, value, picker, newval)?;
            newval
        }
        SYM_FIND | SYM_SELECT => {
            let arg = it.arg(2);
            let pat = pattern_of(it, arg, binary)?;
            let opts = find_opts(it, binary)?;
            let part = it.param(SYM_PART);
            let (start, count) = part_range(it, value, part)?;
            let hay = it.pool.get(id).chars_from(0);
            match find_in(it, &hay, start, start + count, &pat, &opts) {
                None => Cell::BLANK,
                Some((pos, n)) if verb == SYM_SELECT => match hay.get(pos + n) {
                    Some(u) => unit_cell(binary, *u),
                    None => Cell::BLANK,
                },
                Some((pos, n)) if opts.tail || opts.matching => value.with_index((pos + n) as u32),
                Some((pos, _)) => value.with_index(pos as u32),
            }
        }
        SYM_TAKE => {
            it.check_mutable(value)?;
            let part = it.param(SYM_PART);
            let last = it.refine(SYM_LAST);
            match part {
                None => {
                    if index >= len {
                        return Ok(Bounce::Out(Cell::BLANK));
                    }
                    let at = if last { len - 1 } else { index };
                    let u = it.pool.get(id).char_at(at);
                    it.pool.get_mut(id).remove(at, 1);
                    unit_cell(binary, u)
                }
                Some(p) => {
                    let n = int_arg(it, p)?.max(0) as usize;
                    let n = n.min(len - index);
                    let start = if last { len - n } else { index };
                    let units = it.pool.get(id).chars_from(start);
                    let taken = units_cell(it, value.kind, &units[..n])?;
                    it.pool.get_mut(id).remove(start, n);
                    taken
                }
            }
        }
        SYM_SORT => {
            it.check_mutable(value)?;
            let case = binary || it.refine(SYM_CASE);
            let mut units = it.pool.get(id).chars_from(index);
            if case {
                units.sort_unstable();
            } else {
                units.sort_by_key(|u| (fold(*u), *u));
            }
            if it.refine(SYM_REVERSE) {
                units.reverse();
            }
            let series = it.pool.get_mut(id);
            series.truncate(index);
            series.insert_chars(index, &units);
            value
        }
        SYM_AND_T | SYM_OR_T | SYM_XOR_T if binary => {
            let arg = it.arg(2);
            if arg.kind != Kind::Binary {
                return Err(it.error(ErrId::InvalidArg, &[arg]));
            }
            let (a, b) = (units_from(it, value), units_from(it, arg));
            let n = a.len().max(b.len());
            let units: Vec<u32> = (0..n)
                .map(|i| {
                    let (x, y) = (a.get(i).copied().unwrap_or(0), b.get(i).copied().unwrap_or(0));
                    match verb {
                        SYM_AND_T => x & y,
                        SYM_OR_T => x | y,
                        _ => x ^ y,
                    }
                })
                .collect();
            units_cell(it, Kind::Binary, &units)?
        }
        SYM_COMPLEMENT if binary => {
            let units: Vec<u32> = units_from(it, value).into_iter().map(|u| !u & 0xFF).collect();
            units_cell(it, Kind::Binary, &units)?
        }
        _ => return Err(it.unhandled(verb, value)),
    };
    Ok(Bounce::Out(out))
}

pub fn string_pick(it: &mut Interp, value: Cell, picker: Cell) -> Result<Cell, Fail> {
    if !matches!(picker.kind, Kind::Integer | Kind::Decimal) {
        return Err(it.error(ErrId::BadPathPick, &[picker.unflagged()]));
    }
    Ok(match pick_position(it, value, picker)? {
        Some(pos) => unit_cell(value.kind == Kind::Binary, it.pool.get(value.series_id()).char_at(pos)),
        None => Cell::BLANK,
    })
}

pub fn string_poke(it: &mut Interp, target: Cell, picker: Cell, value: Cell) -> Result<(), Fail> {
    if !matches!(picker.kind, Kind::Integer | Kind::Decimal) {
        return Err(it.error(ErrId::BadPathSet, &[picker.unflagged()]));
    }
    it.check_mutable(target)?;
    let Some(pos) = pick_position(it, target, picker)? else {
        return Err(it.error(ErrId::PastEnd, &[picker.unflagged()]));
    };
    let unit = match (target.kind, value.kind) {
        (Kind::Binary, Kind::Integer) if (0..=255).contains(&value.int()) => value.int() as u32,
        (Kind::Binary, Kind::Char) if value.chr() <= 0xFF => value.chr(),
        (Kind::Binary, Kind::Integer | Kind::Char) => return Err(it.error(ErrId::OutOfRange, &[value])),
        (_, Kind::Char) if target.kind != Kind::Binary => value.chr(),
        (_, Kind::Integer) if target.kind != Kind::Binary => {
            match u32::try_from(value.int()).ok().filter(|c| char::from_u32(*c).is_some()) {
                Some(c) => c,
                None => return Err(it.error(ErrId::OutOfRange, &[value])),
            }
        }
        _ => return Err(it.error(ErrId::InvalidArg, &[value])),
    };
    it.pool.get_mut(target.series_id()).set_char(pos, unit);
    Ok(())
}

/// TO for the string kinds: a string's text, a word's spelling, or
/// the formed value
pub fn to_string_kind(it: &mut Interp, kind: Kind, spec: Cell) -> Result<Cell, Fail> {
    let units = match spec.kind {
        k if k.is_string() => units_from(it, spec),
        k if k.is_word() => text_units(it.spelling(spec.spelling())),
        Kind::Binary | Kind::Char | Kind::Block => insertion_units(it, spec, false)?,
        _ => {
            let text = it.form(spec);
            text_units(&text)
        }
    };
    units_cell(it, kind, &units)
}

/// TO BINARY!
pub fn to_binary(it: &mut Interp, spec: Cell) -> Result<Cell, Fail> {
    let bytes: Vec<u8> = match spec.kind {
        Kind::Integer => spec.int().to_be_bytes().to_vec(),
        Kind::Tuple => spec.tuple_val().as_slice().to_vec(),
        Kind::Bitset => it.pool.get(spec.series_id()).bytes().as_slice().to_vec(),
        Kind::Decimal => spec.dec().to_be_bytes().to_vec(),
        k if k.is_string() || matches!(k, Kind::Binary | Kind::Char | Kind::Block) => {
            insertion_units(it, spec, true)?.into_iter().map(|u| u as u8).collect()
        }
        _ => return Err(it.error(ErrId::BadMake, &[Cell::datatype(Kind::Binary), spec.unflagged()])),
    };
    it.binary_cell(&bytes)
}

// bitsets

/// Bits a charset specification sets
fn charset_bits(it: &mut Interp, spec: Cell, out: &mut Vec<u32>) -> Result<(), Fail> {
    match spec.kind {
        Kind::Char | Kind::Integer => out.push(bitset_index(it, spec)?),
        k if k.is_string() => out.extend(units_from(it, spec)),
        Kind::Block => {
            let vals = it.array_values(spec);
            let mut i = 0;
            while i < vals.len() {
                let v = vals[i];
                let dash = vals.get(i + 1).is_some_and(|d| d.kind == Kind::Word && it.spelling(d.spelling()) == "-");
                match (v.kind, dash, vals.get(i + 2)) {
                    (Kind::Char | Kind::Integer, true, Some(hi)) if matches!(hi.kind, Kind::Char | Kind::Integer) => {
                        let lo = bitset_index(it, v)?;
                        let hi = bitset_index(it, *hi)?;
                        if hi < lo {
                            return Err(it.error(ErrId::OutOfRange, &[vals[i + 2]]));
                        }
                        out.extend(lo..=hi);
                        i += 3;
                    }
                    _ => {
                        charset_bits(it, v, out)?;
                        i += 1;
                    }
                }
            }
        }
        _ => return Err(it.error(ErrId::BadMake, &[Cell::datatype(Kind::Bitset), spec.unflagged()])),
    }
    Ok(())
}

/// MAKE BITSET!
pub fn make_bitset(it: &mut Interp, spec: Cell) -> Result<Cell, Fail> {
    let bytes: Vec<u8> = match spec.kind {
        Kind::Integer => {
            let bits = usize::try_from(spec.int().max(0)).ok();
            vec![0; it.check_len(bits.map(|b| b.div_ceil(8)))?]
        }
        Kind::Binary => units_from(it, spec).into_iter().map(|u| u as u8).collect(),
        Kind::Bitset => it.pool.get(spec.series_id()).bytes().as_slice().to_vec(),
        _ => Vec::new(),
    };
    let id = it.alloc(Content::Bytes(Buffer::from_slice(&bytes)))?;
    it.pool.manage(id);
    if !matches!(spec.kind, Kind::Integer | Kind::Binary | Kind::Bitset) {
        let mut bits = Vec::new();
        charset_bits(it, spec, &mut bits)?;
        for b in bits {
            set_bit(it, id, b, true);
        }
    }
    Ok(Cell::series(Kind::Bitset, id, 0))
}

fn bitset_index(it: &mut Interp, picker: Cell) -> Result<u32, Fail> {
    let n = match picker.kind {
        Kind::Char => picker.chr(),
        Kind::Integer if picker.int() >= 0 => match u32::try_from(picker.int()) {
            Ok(n) => n,
            Err(_) => return Err(it.error(ErrId::OutOfRange, &[picker.unflagged()])),
        },
        _ => return Err(it.error(ErrId::InvalidArg, &[picker.unflagged()])),
    };
    it.check_len(Some(n as usize / 8 + 1))?;
    Ok(n)
}

pub fn bitset_pick(it: &mut Interp, value: Cell, picker: Cell) -> Result<Cell, Fail> {
    let id = value.series_id();
    let hit = match picker.kind {
        k if k.is_string() || k == Kind::Block => {
            let mut bits = Vec::new();
            charset_bits(it, picker, &mut bits)?;
            bits.into_iter().all(|b| bit_of(it, id, b))
        }
        _ => {
            let n = bitset_index(it, picker)?;
            bit_of(it, id, n)
        }
    };
    Ok(Cell::logic(hit))
}

pub fn bitset_poke(it: &mut Interp, target: Cell, picker: Cell, value: Cell) -> Result<(), Fail> {
    it.check_mutable(target)?;
    let n = bitset_index(it, picker)?;
    set_bit(it, target.series_id(), n, value.is_truthy());
    Ok(())
}

/// Datatype methods for BITSET!
pub fn bitset_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let id = value.series_id();

    let out = match verb {
        SYM_PICK | SYM_FIND => {
            let picker = it.arg(2);
            let hit = bitset_pick(it, value, picker)?;
            if verb == SYM_FIND && !hit.logic_val() {
                Cell::BLANK
            } else {
                hit
            }
        }
        SYM_POKE => {
            let (picker, newval) = (it.arg(2), it.arg(3));
            bitset_poke(it, value, picker, newval)?;
            newval
        }
        SYM_APPEND | SYM_INSERT | SYM_REMOVE => {
            it.check_mutable(value)?;
            let spec = match verb {
                SYM_REMOVE => match it.param(SYM_PART) {
                    Some(p) => p,
                    None => return Err(it.error(ErrId::InvalidArg, &[value])),
                },
                _ => it.arg(2),
            };
            let mut bits = Vec::new();
            charset_bits(it, spec, &mut bits)?;
            for b in bits {
                set_bit(it, id, b, verb != SYM_REMOVE);
            }
            value
        }
        SYM_CLEAR => {
            it.check_mutable(value)?;
            it.pool.get_mut(id).bytes_mut().as_mut_slice().fill(0);
            value
        }
        SYM_COPY => {
            let bytes = it.pool.get(id).bytes().as_slice().to_vec();
            let copy = it.alloc(Content::Bytes(Buffer::from_slice(&bytes)))?;
            it.pool.manage(copy);
            Cell::series(Kind::Bitset, copy, 0)
        }
        SYM_LENGTH_OF => Cell::integer(series_len(it, value) as i64 * 8),
        SYM_TAIL_Q => {
            let empty = it.pool.get(id).bytes().as_slice().iter().all(|b| *b == 0);
            Cell::logic(empty)
        }
        SYM_AND_T | SYM_OR_T | SYM_XOR_T => {
            let arg = it.arg(2);
            if arg.kind != Kind::Bitset {
                return Err(it.error(ErrId::InvalidArg, &[arg]));
            }
            let a = it.pool.get(id).bytes().as_slice().to_vec();
            let b = it.pool.get(arg.series_id()).bytes().as_slice().to_vec();
            let n = a.len().max(b.len());
            let bytes: Vec<u8> = (0..n)
                .map(|i| {
                    let (x, y) = (a.get(i).copied().unwrap_or(0), b.get(i).copied().unwrap_or(0));
                    match verb {
                        SYM_AND_T => x & y,
                        SYM_OR_T => x | y,
                        _ => x ^ y,
                    }
                })
                .collect();
            let out = it.alloc(Content::Bytes(Buffer::from_slice(&bytes)))?;
            it.pool.manage(out);
            Cell::series(Kind::Bitset, out, 0)
        }
        SYM_COMPLEMENT => {
            let bytes: Vec<u8> = it.pool.get(id).bytes().as_slice().iter().map(|b| !b).collect();
            let out = it.alloc(Content::Bytes(Buffer::from_slice(&bytes)))?;
            it.pool.manage(out);
            Cell::series(Kind::Bitset, out, 0)
        }
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
    fn modification() {
        assert_eq!(run("append copy \"ab\" \"cd\""), "\"abcd\"");
        assert_eq!(run("append copy \"ab\" [1 c]"), "\"ab1c\"");
        assert_eq!(run("head insert copy \"cd\" \"ab\""), "\"abcd\"");
        assert_eq!(run("append/dup copy \"\" #\"x\" 3"), "\"xxx\"");
        assert_eq!(run("append/part copy \"\" \"abcdef\" 2"), "\"ab\"");
        assert_eq!(run("head change copy \"abc\" \"X\""), "\"Xbc\"");
        assert_eq!(run("head remove/part copy \"abcd\" 2"), "\"cd\"");
        assert_eq!(run("clear next copy \"abc\""), "\"\"");
        assert_eq!(run("reverse copy \"abc\""), "\"cba\"");
    }

    #[test]
    fn astral_codepoints() {
        assert_eq!(run("length-of \"a\u{1F600}b\""), "3");
        assert_eq!(run("to integer! second \"a\u{1F600}b\""), "128512");
        assert_eq!(run("to integer! pick \"a\u{1F600}b\" 2"), "128512");
        assert_eq!(run("s: copy \"ab\" poke s 1 #\"^(1F600)\" to integer! first s"), "128512");
        assert_eq!(run("s: copy \"ab\" poke s 2 128512 to integer! second s"), "128512");
    }

    #[test]
    fn searching() {
        assert_eq!(run("find \"abcabc\" \"ca\""), "\"cabc\"");
        assert_eq!(run("find \"abc\" \"B\""), "\"bc\"");
        assert_eq!(run("find/case \"abc\" \"B\""), "_");
        assert_eq!(run("find/tail \"abcd\" \"bc\""), "\"d\"");
        assert_eq!(run("find/last \"abcabc\" \"b\""), "\"bc\"");
        assert_eq!(run("find/match \"abc\" \"ab\""), "\"c\"");
        assert_eq!(run("find/match \"abc\" \"b\""), "_");
        assert_eq!(run("select \"abc\" #\"b\""), "#\"c\"");
        assert_eq!(run("find \"a1b\" charset \"0123456789\""), "\"1b\"");
    }

    #[test]
    fn take_and_sort() {
        assert_eq!(run("s: copy \"abc\" take s"), "#\"a\"");
        assert_eq!(run("s: copy \"abc\" take/last s s"), "\"ab\"");
        assert_eq!(run("take/part copy \"abcd\" 2"), "\"ab\"");
        assert_eq!(run("sort copy \"cBa\""), "\"aBc\"");
        assert_eq!(run("sort/case copy \"cBa\""), "\"Bac\"");
    }

    #[test]
    fn binaries() {
        assert_eq!(run("append copy #{01} 2"), "#{0102}");
        assert_eq!(run("first #{FF}"), "255");
        assert_eq!(run("to binary! \"A\""), "#{41}");
        assert_eq!(run("b: copy #{0000} b/2: 16 b"), "#{0010}");
    }

    #[test]
    fn wide_text() {
        assert_eq!(run("length-of append copy \"a\" to char! 9786"), "2");
        assert_eq!(run("s: copy \"abc\" s/2: #\"X\" s"), "\"aXc\"");
    }

    #[test]
    fn bitsets() {
        assert_eq!(run("b: charset [#\"a\" - #\"c\"] pick b #\"b\""), "true");
        assert_eq!(run("b: charset \"xy\" find b #\"z\""), "_");
        assert_eq!(run("b: make bitset! 16 b/3: true pick b 3"), "true");
    }

    #[test]
    fn past_end_poke() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        let err = it.interpret("s: copy \"ab\" s/5: #\"x\"").unwrap_err();
        assert_eq!(err.id(), Some("past-end"));
    }
}
