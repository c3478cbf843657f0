// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/compare.rs

// Equality at three strictness levels, and ordering.

// <>

use std::cmp::Ordering;

use super::cell::*;
use super::interp::Interp;
use super::series::{Content, SeriesId};
use super::types::money::Money;

/// How alike two values must be to count as equal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// EQUAL?: numbers across kinds, case-insensitive text, any word
    /// kind with the same spelling
    Lax,
    /// STRICT-EQUAL?: same kind, case-sensitive
    Strict,
    /// SAME?: the very same series, context or function
    Same,
}

/// Nesting past which arrays are not compared further
const MAX_COMPARE_DEPTH: usize = 512;

/// Number as compared: money dominates, then decimal, then integer
enum Num {
    Int(i64),
    Dec(f64),
    Money(Money),
}

fn as_num(v: Cell) -> Option<Num> {
    match v.kind {
        Kind::Integer => Some(Num::Int(v.int())),
        Kind::Decimal | Kind::Percent => Some(Num::Dec(v.dec())),
        Kind::Money => Some(Num::Money(v.money_val())),
        _ => None,
    }
}

fn num_to_money(n: &Num) -> Option<Money> {
    match n {
        Num::Int(i) => Some(Money::from_i64(*i)),
        Num::Dec(d) => Money::from_f64(*d).ok(),
        Num::Money(m) => Some(*m),
    }
}

fn num_to_f64(n: &Num) -> f64 {
    match n {
        Num::Int(i) => *i as f64,
        Num::Dec(d) => *d,
        Num::Money(m) => m.to_f64(),
    }
}

/// Total decision table for mixed numbers
fn compare_nums(a: &Num, b: &Num) -> Option<Ordering> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Some(x.cmp(y)),
        (Num::Money(_), _) | (_, Num::Money(_)) => {
            let (x, y) = (num_to_money(a)?, num_to_money(b)?);
            Some(x.cmp(&y))
        }
        _ => num_to_f64(a).partial_cmp(&num_to_f64(b)),
    }
}

/// Case folding used by lax comparisons
pub fn fold(c: u32) -> u32 {
    match char::from_u32(c) {
        Some(ch) => ch.to_lowercase().next().map(|l| l as u32).unwrap_or(c),
        None => c,
    }
}

impl Interp {
    /// Whether two values are equal at the given strictness
    pub fn equal_values(&self, a: Cell, b: Cell, mode: Strictness) -> bool {
        self.equal_at(a, b, mode, 0)
    }

    fn equal_at(&self, a: Cell, b: Cell, mode: Strictness, depth: usize) -> bool {
        if depth > MAX_COMPARE_DEPTH {
            return false;
        }

        if mode == Strictness::Lax {
            if let (Some(x), Some(y)) = (as_num(a), as_num(b)) {
                return compare_nums(&x, &y) == Some(Ordering::Equal);
            }
            if a.kind.is_word() && b.kind.is_word() {
                return self.syms.same_canon(a.spelling(), b.spelling());
            }
            if a.kind.is_string() && b.kind.is_string() {
                return self.compare_text(a, b, false) == Ordering::Equal;
            }
            if a.kind.is_path() && b.kind.is_path() {
                return self.equal_arrays(a, b, mode, depth);
            }
        }

        if a.kind != b.kind {
            return false;
        }

        match a.kind {
            Kind::End | Kind::Void | Kind::Blank => true,
            Kind::Logic => a.logic_val() == b.logic_val(),
            Kind::Integer => a.int() == b.int(),
            Kind::Decimal | Kind::Percent => a.dec() == b.dec(),
            Kind::Money => a.money_val() == b.money_val(),
            Kind::Char => match mode {
                Strictness::Lax => fold(a.chr()) == fold(b.chr()),
                _ => a.chr() == b.chr(),
            },
            Kind::Pair => a.pair_val() == b.pair_val(),
            Kind::Tuple => {
                let (x, y) = (a.tuple_val(), b.tuple_val());
                match mode {
                    Strictness::Lax => {
                        let n = x.len().max(y.len());
                        (0..n).all(|i| x.as_slice().get(i).unwrap_or(&0) == y.as_slice().get(i).unwrap_or(&0))
                    }
                    _ => x == y,
                }
            }
            Kind::Time => a.time_val() == b.time_val(),
            Kind::Date => {
                let (x, y) = (a.date_val(), b.date_val());
                match mode {
                    Strictness::Lax => x.compare(&y) == Ordering::Equal,
                    _ => x == y,
                }
            }
            k if k.is_word() => a.spelling() == b.spelling(),
            Kind::Datatype => a.datatype_val() == b.datatype_val(),
            Kind::Typeset => a.typeset_bits() == b.typeset_bits(),
            Kind::Function => a.paramlist() == b.paramlist(),
            Kind::Varargs | Kind::Handle => a.payload == b.payload,

            k if k.is_context() => {
                if a.varlist() == b.varlist() {
                    return true;
                }
                mode != Strictness::Same && self.equal_contexts(a.varlist(), b.varlist(), mode, depth)
            }

            _ if mode == Strictness::Same => {
                a.kind.has_series() && a.series_id() == b.series_id() && a.index() == b.index()
            }

            k if k.is_array() => self.equal_arrays(a, b, mode, depth),
            Kind::Map => {
                a.series_id() == b.series_id() || self.equal_series_cells(a.series_id(), 0, b.series_id(), 0, mode, depth)
            }
            k if k.is_string() => self.compare_text(a, b, true) == Ordering::Equal,
            Kind::Binary | Kind::Bitset => self.compare_bytes(a, b) == Ordering::Equal,
            _ => false,
        }
    }

    fn equal_arrays(&self, a: Cell, b: Cell, mode: Strictness, depth: usize) -> bool {
        if a.series_id() == b.series_id() && a.index() == b.index() {
            return true;
        }
        self.equal_series_cells(a.series_id(), a.index() as usize, b.series_id(), b.index() as usize, mode, depth)
    }

    fn equal_series_cells(&self, a: SeriesId, ai: usize, b: SeriesId, bi: usize, mode: Strictness, depth: usize) -> bool {
        let xs = self.pool.get(a).array().as_slice().get(ai..).unwrap_or(&[]);
        let ys = self.pool.get(b).array().as_slice().get(bi..).unwrap_or(&[]);
        xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.equal_at(*x, *y, mode, depth + 1))
    }

    fn equal_contexts(&self, a: SeriesId, b: SeriesId, mode: Strictness, depth: usize) -> bool {
        let visible = |v: SeriesId| -> Vec<(u32, super::symtab::Sym)> {
            self.ctx_words(v)
                .into_iter()
                .filter(|(n, _)| !self.ctx_key_hidden(v, *n))
                .collect()
        };
        let (xs, ys) = (visible(a), visible(b));
        if xs.len() != ys.len() {
            return false;
        }
        xs.iter().zip(&ys).all(|((n, s), (m, t))| {
            self.syms.same_canon(*s, *t) && self.equal_at(self.ctx_get(a, *n), self.ctx_get(b, *m), mode, depth + 1)
        })
    }

    fn compare_text(&self, a: Cell, b: Cell, case: bool) -> Ordering {
        let xs = self.pool.get(a.series_id()).chars_from(a.index() as usize);
        let ys = self.pool.get(b.series_id()).chars_from(b.index() as usize);
        if case {
            xs.cmp(&ys)
        } else {
            xs.iter().map(|c| fold(*c)).cmp(ys.iter().map(|c| fold(*c)))
        }
    }

    fn compare_bytes(&self, a: Cell, b: Cell) -> Ordering {
        let bytes = |c: Cell| -> &[u8] {
            match &self.pool.get(c.series_id()).content {
                Content::Bytes(buf) => buf.as_slice().get(c.index() as usize..).unwrap_or(&[]),
                _ => &[],
            }
        };
        bytes(a).cmp(bytes(b))
    }

    /// Ordering for LESSER? and friends; `None` when the values cannot
    /// be ordered against each other
    pub fn compare_values(&self, a: Cell, b: Cell, case: bool) -> Option<Ordering> {
        if let (Some(x), Some(y)) = (as_num(a), as_num(b)) {
            return compare_nums(&x, &y);
        }
        if a.kind.is_string() && b.kind.is_string() {
            return Some(self.compare_text(a, b, case));
        }
        if a.kind.is_word() && b.kind.is_word() {
            let (x, y) = (self.syms.spelling(a.spelling()), self.syms.spelling(b.spelling()));
            return Some(if case {
                x.cmp(y)
            } else {
                x.to_lowercase().cmp(&y.to_lowercase())
            });
        }
        if a.kind != b.kind {
            return None;
        }
        match a.kind {
            Kind::Char => Some(if case {
                a.chr().cmp(&b.chr())
            } else {
                fold(a.chr()).cmp(&fold(b.chr()))
            }),
            Kind::Time => Some(a.time_val().cmp(&b.time_val())),
            Kind::Date => Some(a.date_val().compare(&b.date_val())),
            Kind::Tuple => Some(a.tuple_val().as_slice().cmp(b.tuple_val().as_slice())),
            Kind::Pair => {
                let ((ax, ay), (bx, by)) = (a.pair_val(), b.pair_val());
                ay.partial_cmp(&by).map(|o| o.then(ax.partial_cmp(&bx).unwrap_or(Ordering::Equal)))
            }
            Kind::Binary => Some(self.compare_bytes(a, b)),
            Kind::Logic => Some(a.logic_val().cmp(&b.logic_val())),
            _ => None,
        }
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
    fn mixed_numbers() {
        assert_eq!(run("1 = 1.0"), "true");
        assert_eq!(run("1 == 1.0"), "false");
        assert_eq!(run("$1 = 1"), "true");
        assert_eq!(run("0.1 + 0.2 = 0.3"), "false");
        assert_eq!(run("$0.1 + $0.2 = $0.3"), "true");
        assert_eq!(run("#\"a\" = 97"), "false");
    }

    #[test]
    fn text_and_words() {
        assert_eq!(run("\"abc\" = \"ABC\""), "true");
        assert_eq!(run("\"abc\" == \"ABC\""), "false");
        assert_eq!(run("'a = first [a:]"), "true");
        assert_eq!(run("'a == first [a:]"), "false");
        assert_eq!(run("\"a\" < \"B\""), "true");
    }

    #[test]
    fn sameness() {
        assert_eq!(run("a: [1 2] b: a a =? b"), "true");
        assert_eq!(run("[1 2] =? [1 2]"), "false");
        assert_eq!(run("[1 [2]] = [1 [2]]"), "true");
        assert_eq!(run("1.2.0 = 1.2.0.0"), "true");
        assert_eq!(run("1.2.0 == 1.2.0.0"), "false");
        assert_eq!(run("1.2.0 = 1.2"), "false");
    }

    #[test]
    fn ordering_failures() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        let err = it.interpret("[1] < [2]").unwrap_err();
        assert_eq!(err.id(), Some("invalid-compare"));
    }
}
