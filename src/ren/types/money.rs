// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/types/money.rs

// Platform independent decimal floating point for MONEY! values: a
// signed mantissa of at most 18 digits scaled by a power of ten.

// <>

use std::cmp::Ordering;
use std::fmt;

/// Decimal significant digits kept by a money value
pub const MAX_DIGITS: u32 = 18;

const MANT_LIMIT: i128 = 1_000_000_000_000_000_000;
const EXP_LIMIT: i32 = 300;

/// `mant * 10^exp`, normalized so that equal values share bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Money {
    mant: i64,
    exp: i16,
}

/// Ways money arithmetic fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoneyErr {
    Overflow,
    ZeroDivide,
}

fn pow10(n: u32) -> i128 {
    10i128.pow(n)
}

/// Divides by a power of ten, rounding half away from zero
fn div_round(val: i128, digits: u32) -> i128 {
    if digits == 0 {
        return val;
    }
    if digits > 38 {
        return 0;
    }
    let div = pow10(digits);
    let q = val / div;
    let r = val % div;
    if r.abs() * 2 >= div {
        q + val.signum()
    } else {
        q
    }
}

impl Money {
    pub const ZERO: Money = Money { mant: 0, exp: 0 };

    /// Builds a normalized value, rounding the mantissa to fit
    pub fn make(mut mant: i128, mut exp: i32) -> Result<Money, MoneyErr> {
        while mant.abs() >= MANT_LIMIT {
            mant = div_round(mant, 1);
            exp += 1;
        }
        if mant == 0 {
            return Ok(Money::ZERO);
        }
        while mant % 10 == 0 {
            mant /= 10;
            exp += 1;
        }
        if exp > EXP_LIMIT {
            return Err(MoneyErr::Overflow);
        }
        if exp < -EXP_LIMIT {
            return Ok(Money::ZERO);
        }
        Ok(Money {
            mant: mant as i64,
            exp: exp as i16,
        })
    }

    pub fn from_i64(i: i64) -> Money {
        // an i64 always fits after rounding to 18 digits
        Money::make(i as i128, 0).unwrap_or(Money::ZERO)
    }

    pub fn from_f64(f: f64) -> Result<Money, MoneyErr> {
        if !f.is_finite() {
            return Err(MoneyErr::Overflow);
        }
        Money::parse(&format!("{:e}", f)).ok_or(MoneyErr::Overflow)
    }

    /// Reads digits with an optional point (`.` or `,`), `'` digit
    /// separators and an optional `e` exponent. No currency sign.
    pub fn parse(text: &str) -> Option<Money> {
        let (body, exp_part) = match text.find(['e', 'E']) {
            Some(p) => (&text[..p], Some(&text[p + 1..])),
            None => (text, None),
        };

        let (neg, body) = match body.as_bytes().first() {
            Some(b'-') => (true, &body[1..]),
            Some(b'+') => (false, &body[1..]),
            _ => (false, body),
        };

        let mut mant: i128 = 0;
        let mut exp: i32 = 0;
        let mut seen_point = false;
        let mut digits = 0;
        for c in body.chars() {
            match c {
                '0'..='9' => {
                    digits += 1;
                    if mant.abs() < MANT_LIMIT * 1000 {
                        mant = mant * 10 + (c as i128 - '0' as i128);
                        if seen_point {
                            exp -= 1;
                        }
                    } else if !seen_point {
                        exp += 1;
                    }
                }
                '.' | ',' if !seen_point => seen_point = true,
                '\'' => {}
                _ => return None,
            }
        }
        if digits == 0 {
            return None;
        }

        if let Some(ep) = exp_part {
            exp += ep.parse::<i32>().ok()?;
        }

        Money::make(if neg { -mant } else { mant }, exp).ok()
    }

    pub fn is_zero(self) -> bool {
        self.mant == 0
    }

    pub fn is_negative(self) -> bool {
        self.mant < 0
    }

    pub fn neg(self) -> Money {
        Money {
            mant: -self.mant,
            exp: self.exp,
        }
    }

    pub fn abs(self) -> Money {
        Money {
            mant: self.mant.abs(),
            exp: self.exp,
        }
    }

    pub fn to_f64(self) -> f64 {
        format!("{}e{}", self.mant, self.exp)
            .parse()
            .unwrap_or(f64::NAN)
    }

    /// Truncates toward zero
    pub fn to_i64(self) -> Option<i64> {
        let m = self.mant as i128;
        let val = if self.exp >= 0 {
            let e = self.exp as u32;
            if e > 20 {
                return None;
            }
            m.checked_mul(pow10(e))?
        } else {
            let e = (-self.exp) as u32;
            if e > 38 {
                0
            } else {
                m / pow10(e)
            }
        };
        i64::try_from(val).ok()
    }

    /// Both mantissas rescaled to one exponent, dropping precision
    /// from the smaller operand when the gap is too wide
    fn align(a: Money, b: Money) -> (i128, i128, i32) {
        let (hi, lo, swapped) = if a.exp >= b.exp {
            (a, b, false)
        } else {
            (b, a, true)
        };
        let diff = (hi.exp - lo.exp) as u32;
        let (hm, lm, exp) = if diff <= 19 {
            (
                hi.mant as i128 * pow10(diff),
                lo.mant as i128,
                lo.exp as i32,
            )
        } else {
            let exp = hi.exp as i32 - 19;
            (
                hi.mant as i128 * pow10(19),
                div_round(lo.mant as i128, (exp - lo.exp as i32) as u32),
                exp,
            )
        };
        if swapped {
            (lm, hm, exp)
        } else {
            (hm, lm, exp)
        }
    }

    pub fn add(self, other: Money) -> Result<Money, MoneyErr> {
        let (a, b, exp) = Money::align(self, other);
        Money::make(a + b, exp)
    }

    pub fn sub(self, other: Money) -> Result<Money, MoneyErr> {
        self.add(other.neg())
    }

    pub fn mul(self, other: Money) -> Result<Money, MoneyErr> {
        Money::make(
            self.mant as i128 * other.mant as i128,
            self.exp as i32 + other.exp as i32,
        )
    }

    pub fn div(self, other: Money) -> Result<Money, MoneyErr> {
        if other.is_zero() {
            return Err(MoneyErr::ZeroDivide);
        }
        let num = self.mant as i128 * pow10(19);
        let den = other.mant as i128;
        let q = num / den;
        let r = num % den;
        let q = if (r * 2).abs() >= den.abs() {
            q + (num.signum() * den.signum())
        } else {
            q
        };
        Money::make(q, self.exp as i32 - 19 - other.exp as i32)
    }

    /// Remainder with the sign of the dividend
    pub fn rem(self, other: Money) -> Result<Money, MoneyErr> {
        if other.is_zero() {
            return Err(MoneyErr::ZeroDivide);
        }
        let (a, b, exp) = Money::align(self, other);
        if b == 0 {
            return Err(MoneyErr::ZeroDivide);
        }
        Money::make(a % b, exp)
    }
}

impl Ord for Money {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b, _) = Money::align(*self, *other);
        a.cmp(&b)
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Money {
    /// Molded form: `$1.50`, `-$0.01`, at least two fraction digits
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mant.unsigned_abs().to_string();
        let (int_part, frac_part) = if self.exp >= 0 {
            (
                format!("{}{}", digits, "0".repeat(self.exp as usize)),
                String::new(),
            )
        } else {
            let shift = (-self.exp) as usize;
            if digits.len() > shift {
                let (i, fr) = digits.split_at(digits.len() - shift);
                (i.to_string(), fr.to_string())
            } else {
                ("0".to_string(), format!("{}{}", "0".repeat(shift - digits.len()), digits))
            }
        };
        let mut frac = frac_part;
        while frac.len() < 2 {
            frac.push('0');
        }
        let sign = if self.mant < 0 { "-" } else { "" };
        write!(f, "{}${}.{}", sign, int_part, frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn normalizes() {
        assert_eq!(m("1.50"), m("1.5"));
        assert_eq!(m("100"), Money::from_i64(100));
        assert_eq!(m("0.000"), Money::ZERO);
        assert_eq!(m("1'000"), Money::from_i64(1000));
    }

    #[test]
    fn displays() {
        assert_eq!(m("1.5").to_string(), "$1.50");
        assert_eq!(m("-0.01").to_string(), "-$0.01");
        assert_eq!(m("12").to_string(), "$12.00");
        assert_eq!(m("3.14159").to_string(), "$3.14159");
    }

    #[test]
    fn arithmetic() {
        assert_eq!(m("0.1").add(m("0.2")).unwrap(), m("0.3"));
        assert_eq!(m("5").sub(m("7.25")).unwrap(), m("-2.25"));
        assert_eq!(m("1.5").mul(m("4")).unwrap(), m("6"));
        assert_eq!(m("1").div(m("4")).unwrap(), m("0.25"));
        assert_eq!(m("7").rem(m("2")).unwrap(), m("1"));
        assert_eq!(m("1").div(Money::ZERO), Err(MoneyErr::ZeroDivide));
    }

    #[test]
    fn wide_alignment() {
        let big = m("1e25");
        let small = m("1");
        assert_eq!(big.add(small).unwrap(), big);
        assert!(big > small);
        assert_eq!(m("1e21").add(m("1e4")).unwrap(), m("1000000000000000010000"));
    }

    #[test]
    fn conversions() {
        assert_eq!(Money::from_f64(2.5).unwrap(), m("2.5"));
        assert_eq!(m("2.75").to_i64(), Some(2));
        assert_eq!(m("-2.75").to_i64(), Some(-2));
        assert_eq!(m("0.5").to_f64(), 0.5);
        assert!(Money::from_f64(f64::INFINITY).is_err());
    }
}
