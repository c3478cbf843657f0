// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/types/number.rs

// Datatype methods for the numeric kinds, CHAR!, LOGIC! and BLANK!.

// <>

use super::super::{
    cell::{Cell, Kind},
    error::{ErrId, Fail},
    func::Bounce,
    interp::Interp,
    symtab::*,
};
use super::date::{nanos_of, NANOS_PER_SEC};
use super::money::{Money, MoneyErr};

fn math_err(it: &mut Interp, e: MoneyErr) -> Fail {
    match e {
        MoneyErr::Overflow => it.error(ErrId::Overflow, &[]),
        MoneyErr::ZeroDivide => it.error(ErrId::ZeroDivide, &[]),
    }
}

fn overflow(it: &mut Interp) -> Fail {
    it.error(ErrId::Overflow, &[])
}

fn to_money(it: &mut Interp, v: Cell) -> Result<Money, Fail> {
    match v.kind {
        Kind::Money => Ok(v.money_val()),
        Kind::Integer => Ok(Money::from_i64(v.int())),
        Kind::Decimal | Kind::Percent => Money::from_f64(v.dec()).map_err(|e| math_err(it, e)),
        _ => Err(it.error(ErrId::InvalidArg, &[v])),
    }
}

fn to_f64(it: &mut Interp, v: Cell) -> Result<f64, Fail> {
    match v.kind {
        Kind::Integer => Ok(v.int() as f64),
        Kind::Decimal | Kind::Percent => Ok(v.dec()),
        Kind::Money => Ok(v.money_val().to_f64()),
        Kind::Char => Ok(v.chr() as f64),
        _ => Err(it.error(ErrId::InvalidArg, &[v])),
    }
}

/// A finite decimal result, or overflow
fn finite(it: &mut Interp, d: f64) -> Result<f64, Fail> {
    if d.is_finite() {
        Ok(d)
    } else {
        Err(overflow(it))
    }
}

fn is_arith(verb: Sym) -> bool {
    matches!(verb, SYM_ADD | SYM_SUBTRACT | SYM_MULTIPLY | SYM_DIVIDE | SYM_REMAINDER | SYM_POWER)
}

/// Binary math where the operand decides the result kind: money
/// dominates, then decimal, then integer
fn promote(it: &mut Interp, verb: Sym, value: Cell, arg: Cell) -> Result<Option<Bounce>, Fail> {
    if !is_arith(verb) {
        return Ok(None);
    }
    match arg.kind {
        Kind::Money if value.kind != Kind::Money => {
            let m = to_money(it, value)?;
            Ok(Some(money_math(it, verb, m, arg)?))
        }
        Kind::Decimal | Kind::Percent if value.kind == Kind::Integer => {
            Ok(Some(decimal_math(it, verb, Kind::Decimal, value.int() as f64, arg)?))
        }
        Kind::Time | Kind::Pair | Kind::Tuple | Kind::Date if matches!(verb, SYM_ADD | SYM_MULTIPLY) => {
            // commutative forms: the scalar on the right does the work
            let out = match arg.kind {
                Kind::Time => {
                    let n = match value.kind {
                        Kind::Integer => value.int().checked_mul(NANOS_PER_SEC).ok_or_else(|| overflow(it))?,
                        _ => {
                            let secs = to_f64(it, value)?;
                            nanos_of(it, secs * NANOS_PER_SEC as f64)?
                        }
                    };
                    if verb == SYM_ADD {
                        Cell::time(arg.time_val().checked_add(n).ok_or_else(|| overflow(it))?)
                    } else {
                        let k = to_f64(it, value)?;
                        Cell::time(nanos_of(it, arg.time_val() as f64 * k)?)
                    }
                }
                Kind::Pair => {
                    let k = to_f64(it, value)? as f32;
                    let (x, y) = arg.pair_val();
                    if verb == SYM_ADD {
                        Cell::pair(x + k, y + k)
                    } else {
                        Cell::pair(x * k, y * k)
                    }
                }
                Kind::Tuple => {
                    let k = to_f64(it, value)?;
                    let t = arg.tuple_val();
                    Cell::tuple(t.scale(|a| {
                        if verb == SYM_ADD {
                            (a as f64 + k) as i64
                        } else {
                            (a as f64 * k) as i64
                        }
                    }))
                }
                _ if verb == SYM_ADD && value.kind == Kind::Integer => {
                    let d = arg.date_val().add_days(value.int());
                    Cell::date(d.ok_or_else(|| it.error(ErrId::OutOfRange, &[arg]))?)
                }
                _ => return Err(it.error(ErrId::InvalidArg, &[arg])),
            };
            Ok(Some(Bounce::Out(out)))
        }
        _ => Ok(None),
    }
}

/// Datatype methods for INTEGER!
pub fn integer_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let i = value.int();

    if is_arith(verb) {
        let arg = it.arg(2);
        if let Some(b) = promote(it, verb, value, arg)? {
            return Ok(b);
        }
        let n = match arg.kind {
            Kind::Integer => arg.int(),
            Kind::Char => arg.chr() as i64,
            _ => return Err(it.error(ErrId::InvalidArg, &[arg])),
        };
        let out = match verb {
            SYM_ADD => i.checked_add(n),
            SYM_SUBTRACT => i.checked_sub(n),
            SYM_MULTIPLY => i.checked_mul(n),
            SYM_DIVIDE => {
                if n == 0 {
                    return Err(it.error(ErrId::ZeroDivide, &[]));
                }
                match i.checked_rem(n) {
                    Some(0) => i.checked_div(n),
                    Some(_) => return Ok(Bounce::Out(Cell::decimal(i as f64 / n as f64))),
                    None => None,
                }
            }
            SYM_REMAINDER => {
                if n == 0 {
                    return Err(it.error(ErrId::ZeroDivide, &[]));
                }
                // MIN / -1 has no representable quotient but a zero remainder
                Some(i.checked_rem(n).unwrap_or(0))
            }
            _ => {
                let d = finite(it, (i as f64).powf(n as f64))?;
                return Ok(Bounce::Out(Cell::decimal(d)));
            }
        };
        return match out {
            Some(o) => Ok(Bounce::Out(Cell::integer(o))),
            None => Err(overflow(it)),
        };
    }

    let out = match verb {
        SYM_NEGATE => Cell::integer(i.checked_neg().ok_or_else(|| overflow(it))?),
        SYM_ABSOLUTE => Cell::integer(i.checked_abs().ok_or_else(|| overflow(it))?),
        SYM_EVEN_Q => Cell::logic(i % 2 == 0),
        SYM_ODD_Q => Cell::logic(i % 2 != 0),
        SYM_COMPLEMENT => Cell::integer(!i),
        SYM_AND_T | SYM_OR_T | SYM_XOR_T => {
            let arg = it.arg(2);
            let n = match arg.kind {
                Kind::Integer => arg.int(),
                Kind::Char => arg.chr() as i64,
                _ => return Err(it.error(ErrId::InvalidArg, &[arg])),
            };
            Cell::integer(match verb {
                SYM_AND_T => i & n,
                SYM_OR_T => i | n,
                _ => i ^ n,
            })
        }
        _ => return Err(it.unhandled(verb, value)),
    };
    Ok(Bounce::Out(out))
}

fn decimal_math(it: &mut Interp, verb: Sym, kind: Kind, d: f64, arg: Cell) -> Result<Bounce, Fail> {
    let n = match arg.kind {
        Kind::Integer | Kind::Decimal | Kind::Percent => to_f64(it, arg)?,
        _ => return Err(it.error(ErrId::InvalidArg, &[arg])),
    };
    // percent survives only against percent or a plain count
    let kind = match (kind, arg.kind) {
        (Kind::Percent, Kind::Percent | Kind::Integer) => Kind::Percent,
        _ => Kind::Decimal,
    };
    let out = match verb {
        SYM_ADD => d + n,
        SYM_SUBTRACT => d - n,
        SYM_MULTIPLY => d * n,
        SYM_DIVIDE | SYM_REMAINDER if n == 0.0 => return Err(it.error(ErrId::ZeroDivide, &[])),
        SYM_DIVIDE => d / n,
        SYM_REMAINDER => d % n,
        _ => d.powf(n),
    };
    let out = finite(it, out)?;
    Ok(Bounce::Out(if kind == Kind::Percent {
        Cell::percent(out)
    } else {
        Cell::decimal(out)
    }))
}

/// Datatype methods for DECIMAL! and PERCENT!
pub fn decimal_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let d = value.dec();

    if is_arith(verb) {
        let arg = it.arg(2);
        if let Some(b) = promote(it, verb, value, arg)? {
            return Ok(b);
        }
        return decimal_math(it, verb, value.kind, d, arg);
    }

    let same_kind = |x: f64| {
        if value.kind == Kind::Percent {
            Cell::percent(x)
        } else {
            Cell::decimal(x)
        }
    };
    let out = match verb {
        SYM_NEGATE => same_kind(-d),
        SYM_ABSOLUTE => same_kind(d.abs()),
        SYM_EVEN_Q | SYM_ODD_Q => {
            let whole = d.trunc();
            if whole != d {
                return Err(it.error(ErrId::InvalidArg, &[value]));
            }
            let even = whole % 2.0 == 0.0;
            Cell::logic(if verb == SYM_EVEN_Q { even } else { !even })
        }
        _ => return Err(it.unhandled(verb, value)),
    };
    Ok(Bounce::Out(out))
}

fn money_math(it: &mut Interp, verb: Sym, m: Money, arg: Cell) -> Result<Bounce, Fail> {
    let n = to_money(it, arg)?;
    let out = match verb {
        SYM_ADD => m.add(n),
        SYM_SUBTRACT => m.sub(n),
        SYM_MULTIPLY => m.mul(n),
        SYM_DIVIDE => m.div(n),
        SYM_REMAINDER => m.rem(n),
        _ => {
            let d = finite(it, m.to_f64().powf(n.to_f64()))?;
            Money::from_f64(d)
        }
    };
    match out {
        Ok(o) => Ok(Bounce::Out(Cell::money(o))),
        Err(e) => Err(math_err(it, e)),
    }
}

/// Datatype methods for MONEY!
pub fn money_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let m = value.money_val();

    if is_arith(verb) {
        let arg = it.arg(2);
        return money_math(it, verb, m, arg);
    }

    let out = match verb {
        SYM_NEGATE => Cell::money(m.neg()),
        SYM_ABSOLUTE => Cell::money(m.abs()),
        _ => return Err(it.unhandled(verb, value)),
    };
    Ok(Bounce::Out(out))
}

fn char_cell(it: &mut Interp, c: i64) -> Result<Cell, Fail> {
    match u32::try_from(c).ok().filter(|c| char::from_u32(*c).is_some()) {
        Some(c) => Ok(Cell::char(c)),
        None => Err(it.error(ErrId::TypeLimit, &[Cell::datatype(Kind::Char)])),
    }
}

/// Datatype methods for CHAR!
pub fn char_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let c = value.chr() as i64;

    let out = match verb {
        SYM_ADD | SYM_SUBTRACT | SYM_MULTIPLY | SYM_DIVIDE | SYM_REMAINDER => {
            let arg = it.arg(2);
            let n = match arg.kind {
                Kind::Integer => arg.int(),
                Kind::Char => arg.chr() as i64,
                _ => return Err(it.error(ErrId::InvalidArg, &[arg])),
            };
            if verb == SYM_SUBTRACT && arg.kind == Kind::Char {
                return Ok(Bounce::Out(Cell::integer(c - n)));
            }
            let r = match verb {
                SYM_ADD => c.checked_add(n),
                SYM_SUBTRACT => c.checked_sub(n),
                SYM_MULTIPLY => c.checked_mul(n),
                _ if n == 0 => return Err(it.error(ErrId::ZeroDivide, &[])),
                SYM_DIVIDE => Some(c / n),
                _ => Some(c % n),
            };
            let r = r.ok_or_else(|| overflow(it))?;
            char_cell(it, r)?
        }
        SYM_EVEN_Q => Cell::logic(c % 2 == 0),
        SYM_ODD_Q => Cell::logic(c % 2 != 0),
        SYM_COMPLEMENT => char_cell(it, !c & 0xFFFF)?,
        _ => return Err(it.unhandled(verb, value)),
    };
    Ok(Bounce::Out(out))
}

/// Datatype methods for LOGIC!
pub fn logic_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let b = value.logic_val();

    let out = match verb {
        SYM_AND_T | SYM_OR_T | SYM_XOR_T => {
            let other = it.arg(2).is_truthy();
            match verb {
                SYM_AND_T => b && other,
                SYM_OR_T => b || other,
                _ => b != other,
            }
        }
        SYM_COMPLEMENT => !b,
        _ => return Err(it.unhandled(verb, value)),
    };
    Ok(Bounce::Out(Cell::logic(out)))
}

/// BLANK! in, BLANK! out for the lookups that tolerate absence
pub fn blank_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    match verb {
        SYM_PICK | SYM_FIND | SYM_SELECT | SYM_TAKE | SYM_COPY | SYM_LENGTH_OF | SYM_INDEX_OF | SYM_SKIP
        | SYM_AT | SYM_HEAD | SYM_TAIL | SYM_NEXT | SYM_BACK | SYM_CLEAR => Ok(Bounce::Out(Cell::BLANK)),
        _ => {
            let value = it.arg(1);
            Err(it.unhandled(verb, value))
        }
    }
}

/// Numeric text as a cell: integer when it reads as one
fn parse_number(text: &str) -> Option<Cell> {
    let t = text.trim().replace('\'', "");
    if let Ok(i) = t.parse::<i64>() {
        return Some(Cell::integer(i));
    }
    if let Some(p) = t.strip_suffix('%') {
        return p.parse::<f64>().ok().map(|d| Cell::percent(d / 100.0));
    }
    let t = t.replace(',', ".");
    t.parse::<f64>().ok().filter(|d| d.is_finite()).map(Cell::decimal)
}

/// TO for the numeric kinds, CHAR! and LOGIC!
pub fn to_number(it: &mut Interp, kind: Kind, spec: Cell) -> Result<Cell, Fail> {
    let bad = |it: &mut Interp| it.error(ErrId::BadMake, &[Cell::datatype(kind), spec.unflagged()]);

    if kind == Kind::Logic {
        return Ok(Cell::logic(spec.is_truthy()));
    }

    // text is read as a number first and then converted
    let spec = if spec.kind.is_string() {
        let text = it.text_of(spec);
        match kind {
            Kind::Money => {
                let t = text.trim();
                let t = t.strip_prefix('$').unwrap_or(t);
                return match Money::parse(t) {
                    Some(m) => Ok(Cell::money(m)),
                    None => Err(bad(it)),
                };
            }
            Kind::Char => {
                let mut chars = text.chars();
                return match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Cell::char(c as u32)),
                    _ => Err(bad(it)),
                };
            }
            _ => match parse_number(&text) {
                Some(n) => n,
                None => return Err(bad(it)),
            },
        }
    } else {
        spec
    };

    match kind {
        Kind::Integer => match spec.kind {
            Kind::Integer => Ok(spec.unflagged()),
            Kind::Decimal | Kind::Percent => {
                let d = spec.dec().trunc();
                if d.is_finite() && d >= i64::MIN as f64 && d < i64::MAX as f64 {
                    Ok(Cell::integer(d as i64))
                } else {
                    Err(overflow(it))
                }
            }
            Kind::Money => match spec.money_val().to_i64() {
                Some(i) => Ok(Cell::integer(i)),
                None => Err(overflow(it)),
            },
            Kind::Char => Ok(Cell::integer(spec.chr() as i64)),
            Kind::Time => Ok(Cell::integer(spec.time_val() / NANOS_PER_SEC)),
            Kind::Binary => {
                let bytes = it.pool.get(spec.series_id()).bytes().as_slice().to_vec();
                let bytes = bytes.get(spec.index() as usize..).unwrap_or(&[]);
                if bytes.len() > 8 {
                    return Err(overflow(it));
                }
                Ok(Cell::integer(bytes.iter().fold(0i64, |acc, b| (acc << 8) | *b as i64)))
            }
            Kind::Issue => {
                let text = it.spelling(spec.spelling()).to_string();
                i64::from_str_radix(&text, 16).map(Cell::integer).map_err(|_| bad(it))
            }
            _ => Err(bad(it)),
        },
        Kind::Decimal | Kind::Percent => {
            let d = match spec.kind {
                Kind::Integer | Kind::Decimal | Kind::Percent | Kind::Money | Kind::Char => to_f64(it, spec)?,
                Kind::Time => spec.time_val() as f64 / NANOS_PER_SEC as f64,
                _ => return Err(bad(it)),
            };
            Ok(if kind == Kind::Percent {
                Cell::percent(d)
            } else {
                Cell::decimal(d)
            })
        }
        Kind::Money => match spec.kind {
            Kind::Integer | Kind::Decimal | Kind::Percent | Kind::Money => Ok(Cell::money(to_money(it, spec)?)),
            _ => Err(bad(it)),
        },
        Kind::Char => match spec.kind {
            Kind::Integer => char_cell(it, spec.int()),
            Kind::Char => Ok(spec.unflagged()),
            Kind::Binary => {
                let series = it.pool.get(spec.series_id());
                match series.bytes().as_slice().get(spec.index() as usize) {
                    Some(b) => Ok(Cell::char(*b as u32)),
                    None => Err(bad(it)),
                }
            }
            _ => Err(bad(it)),
        },
        _ => Err(bad(it)),
    }
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
        it.interpret(src).unwrap_err().id().unwrap_or("").to_string()
    }

    #[test]
    fn integer_math() {
        assert_eq!(run("1 + 2 * 3"), "9");
        assert_eq!(run("7 / 2"), "3.5");
        assert_eq!(run("8 / 2"), "4");
        assert_eq!(run("7 // 2"), "1");
        assert_eq!(run("2 ** 10"), "1024.0");
        assert_eq!(run("negate 5"), "-5");
        assert_eq!(run("even? 4"), "true");
        assert_eq!(fails("1 / 0"), "zero-divide");
        assert_eq!(fails("9223372036854775807 + 1"), "overflow");
    }

    #[test]
    fn promotion() {
        assert_eq!(run("1 + 0.5"), "1.5");
        assert_eq!(run("1 + $1"), "$2.00");
        assert_eq!(run("$1.50 * 2"), "$3.00");
        assert_eq!(run("10% * 2"), "20%");
        assert_eq!(run("2 + 1:00"), "1:00:02");
    }

    #[test]
    fn chars_and_logic() {
        assert_eq!(run("#\"a\" + 1"), "#\"b\"");
        assert_eq!(run("#\"c\" - #\"a\""), "2");
        assert_eq!(run("true and false"), "false");
        assert_eq!(run("complement false"), "true");
    }

    #[test]
    fn conversions() {
        assert_eq!(run("to integer! 3.9"), "3");
        assert_eq!(run("to decimal! 3"), "3.0");
        assert_eq!(run("to money! \"$1.25\""), "$1.25");
        assert_eq!(run("to char! 65"), "#\"A\"");
        assert_eq!(run("to integer! #{0102}"), "258");
        assert_eq!(fails("to integer! \"abc\""), "bad-make");
    }
}
