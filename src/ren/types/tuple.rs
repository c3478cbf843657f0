// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/types/tuple.rs

// TUPLE! and PAIR! values: their storage and their datatype methods.

// <>

use std::fmt;

use super::super::{
    cell::{Cell, Kind},
    error::{ErrId, Fail},
    func::Bounce,
    interp::Interp,
    symtab::*,
};

pub const MAX_TUPLE: usize = 10;

/// Up to ten bytes, such as a version number or a color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tuple {
    len: u8,
    bytes: [u8; MAX_TUPLE],
}

impl Tuple {
    pub fn new(src: &[u8]) -> Option<Tuple> {
        if src.len() > MAX_TUPLE {
            return None;
        }
        let mut bytes = [0; MAX_TUPLE];
        bytes[..src.len()].copy_from_slice(src);
        Some(Tuple {
            len: src.len() as u8,
            bytes,
        })
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len as usize]
    }

    /// Extends (with zeros) or shortens the tuple
    pub fn resize(&mut self, len: usize) {
        let len = len.min(MAX_TUPLE);
        for b in self.bytes[len..].iter_mut() {
            *b = 0;
        }
        self.len = len as u8;
    }

    /// Reverses the first `part` bytes in place
    pub fn reverse(&mut self, part: usize) {
        let part = part.min(self.len());
        self.bytes[..part].reverse()
    }

    /// Bytewise arithmetic, clamped to 0..=255; the shorter operand is
    /// padded with zeros
    pub fn combine(&self, other: &Tuple, op: impl Fn(i64, i64) -> i64) -> Tuple {
        let len = self.len.max(other.len);
        let mut out = Tuple {
            len,
            bytes: [0; MAX_TUPLE],
        };
        for i in 0..len as usize {
            out.bytes[i] = op(self.bytes[i] as i64, other.bytes[i] as i64).clamp(0, 255) as u8;
        }
        out
    }

    pub fn scale(&self, op: impl Fn(i64) -> i64) -> Tuple {
        let mut out = *self;
        for b in out.as_mut_slice() {
            *b = op(*b as i64).clamp(0, 255) as u8;
        }
        out
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for b in self.as_slice() {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", b)?;
            first = false;
        }
        Ok(())
    }
}

/// Formats a pair coordinate the way the scanner reads it back
pub fn form_coord(v: f32) -> String {
    if v.fract() == 0.0 && v.abs() < 1e9 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn number_of(it: &mut Interp, val: Cell) -> Result<f64, Fail> {
    match val.kind {
        Kind::Integer => Ok(val.int() as f64),
        Kind::Decimal | Kind::Percent => Ok(val.dec()),
        _ => Err(it.error(ErrId::InvalidArg, &[val])),
    }
}

/// Datatype methods for TUPLE!
pub fn tuple_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let mut tup = value.tuple_val();

    let out = match verb {
        SYM_ADD | SYM_SUBTRACT | SYM_MULTIPLY | SYM_DIVIDE | SYM_REMAINDER => {
            let arg = it.arg(2);
            let zero = |it: &mut Interp| it.error(ErrId::ZeroDivide, &[]);
            match arg.kind {
                Kind::Tuple => {
                    let other = arg.tuple_val();
                    if matches!(verb, SYM_DIVIDE | SYM_REMAINDER)
                        && other.as_slice().iter().any(|b| *b == 0)
                    {
                        return Err(zero(it));
                    }
                    tup.combine(&other, |a, b| match verb {
                        SYM_ADD => a + b,
                        SYM_SUBTRACT => a - b,
                        SYM_MULTIPLY => a * b,
                        SYM_DIVIDE => a / b,
                        _ => a % b,
                    })
                }
                _ => {
                    let n = number_of(it, arg)?;
                    if matches!(verb, SYM_DIVIDE | SYM_REMAINDER) && n == 0.0 {
                        return Err(zero(it));
                    }
                    tup.scale(|a| {
                        let a = a as f64;
                        (match verb {
                            SYM_ADD => a + n,
                            SYM_SUBTRACT => a - n,
                            SYM_MULTIPLY => a * n,
                            SYM_DIVIDE => a / n,
                            _ => a % n,
                        }) as i64
                    })
                }
            }
        }
        SYM_COMPLEMENT => tup.scale(|a| 255 - a),
        SYM_REVERSE => {
            let part = match it.param(SYM_PART) {
                Some(limit) if !limit.is_void() => {
                    number_of(it, limit)?.max(0.0) as usize
                }
                _ => tup.len(),
            };
            tup.reverse(part);
            tup
        }
        SYM_LENGTH_OF => return Ok(Bounce::Out(Cell::integer(tup.len() as i64))),
        SYM_PICK => {
            let idx = it.arg(2);
            return Ok(Bounce::Out(tuple_pick(it, &tup, idx)?));
        }
        _ => return Err(it.unhandled(verb, value)),
    };

    Ok(Bounce::Out(Cell::tuple(out)))
}

pub fn tuple_pick(it: &mut Interp, tup: &Tuple, picker: Cell) -> Result<Cell, Fail> {
    if picker.kind != Kind::Integer {
        return Err(it.error(ErrId::BadPathPick, &[picker]));
    }
    let n = picker.int();
    if n >= 1 && (n as usize) <= tup.len() {
        Ok(Cell::integer(tup.as_slice()[n as usize - 1] as i64))
    } else {
        Ok(Cell::BLANK)
    }
}

pub fn tuple_poke(it: &mut Interp, tup: &mut Tuple, picker: Cell, value: Cell) -> Result<(), Fail> {
    if picker.kind != Kind::Integer || value.kind != Kind::Integer {
        return Err(it.error(ErrId::BadPathSet, &[picker]));
    }
    let n = picker.int();
    if n < 1 || n as usize > MAX_TUPLE {
        return Err(it.error(ErrId::OutOfRange, &[picker]));
    }
    if n as usize > tup.len() {
        tup.resize(n as usize);
    }
    tup.as_mut_slice()[n as usize - 1] = value.int().clamp(0, 255) as u8;
    Ok(())
}

/// Datatype methods for PAIR!
pub fn pair_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let (x, y) = value.pair_val();

    let (nx, ny) = match verb {
        SYM_ADD | SYM_SUBTRACT | SYM_MULTIPLY | SYM_DIVIDE | SYM_REMAINDER => {
            let arg = it.arg(2);
            let (ax, ay) = match arg.kind {
                Kind::Pair => arg.pair_val(),
                _ => {
                    let n = number_of(it, arg)? as f32;
                    (n, n)
                }
            };
            if matches!(verb, SYM_DIVIDE | SYM_REMAINDER) && (ax == 0.0 || ay == 0.0) {
                return Err(it.error(ErrId::ZeroDivide, &[]));
            }
            match verb {
                SYM_ADD => (x + ax, y + ay),
                SYM_SUBTRACT => (x - ax, y - ay),
                SYM_MULTIPLY => (x * ax, y * ay),
                SYM_DIVIDE => (x / ax, y / ay),
                _ => (x % ax, y % ay),
            }
        }
        SYM_NEGATE => (-x, -y),
        SYM_ABSOLUTE => (x.abs(), y.abs()),
        SYM_REVERSE => (y, x),
        SYM_PICK => {
            let idx = it.arg(2);
            return Ok(Bounce::Out(pair_pick(it, (x, y), idx)?));
        }
        _ => return Err(it.unhandled(verb, value)),
    };

    Ok(Bounce::Out(Cell::pair(nx, ny)))
}

pub fn pair_pick(it: &mut Interp, (x, y): (f32, f32), picker: Cell) -> Result<Cell, Fail> {
    let which = match picker.kind {
        Kind::Integer => picker.int(),
        Kind::Word => match it.syms.canon(picker.spelling()) {
            SYM_X => 1,
            SYM_Y => 2,
            _ => 0,
        },
        _ => 0,
    };
    let v = match which {
        1 => x,
        2 => y,
        _ => return Err(it.error(ErrId::BadPathPick, &[picker])),
    };
    if v.fract() == 0.0 {
        Ok(Cell::integer(v as i64))
    } else {
        Ok(Cell::decimal(v as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_in_place() {
        let mut t = Tuple::new(&[1, 2, 3, 4]).unwrap();
        t.reverse(4);
        assert_eq!(t.as_slice(), &[4, 3, 2, 1]);
        assert_eq!(t.len(), 4);
        t.reverse(2);
        assert_eq!(t.to_string(), "3.4.2.1");
    }

    #[test]
    fn clamped_math() {
        let a = Tuple::new(&[250, 10, 5]).unwrap();
        let b = Tuple::new(&[10, 20]).unwrap();
        assert_eq!(a.combine(&b, |x, y| x + y).as_slice(), &[255, 30, 5]);
        assert_eq!(a.combine(&b, |x, y| x - y).as_slice(), &[240, 0, 5]);
    }

    #[test]
    fn limits() {
        assert!(Tuple::new(&[0; 11]).is_none());
        let mut t = Tuple::new(&[1, 2, 3]).unwrap();
        t.resize(5);
        assert_eq!(t.to_string(), "1.2.3.0.0");
    }

    #[test]
    fn coords() {
        assert_eq!(form_coord(10.0), "10");
        assert_eq!(form_coord(1.5), "1.5");
    }
}
