// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/types/date.rs

// DATE! and TIME! values: calendar arithmetic, lexical forms and
// datatype methods.

// <>

use std::cmp::Ordering;
use std::fmt;

use super::super::{
    cell::{Cell, Kind},
    error::{ErrId, Fail},
    func::Bounce,
    interp::Interp,
    symtab::*,
};

pub const NANOS_PER_SEC: i64 = 1_000_000_000;
pub const NANOS_PER_MIN: i64 = 60 * NANOS_PER_SEC;
pub const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MIN;
pub const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A calendar day, optionally with a time of day and a zone offset
/// in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Date {
    pub year: i16,
    pub month: u8,
    pub day: u8,
    pub time: Option<i64>,
    pub zone: Option<i16>,
}

pub fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i64, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Days since 1970-01-01 of a proleptic Gregorian date
pub fn days_from_civil(y: i64, m: u8, d: u8) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (m as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

pub fn civil_from_days(z: i64) -> (i64, u8, u8) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    let y = yoe + era * 400 + if m <= 2 { 1 } else { 0 };
    (y, m, d)
}

impl Date {
    pub fn new(year: i64, month: u8, day: u8) -> Option<Date> {
        if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
            return None;
        }
        Some(Date {
            year: i16::try_from(year).ok()?,
            month,
            day,
            time: None,
            zone: None,
        })
    }

    pub fn days(&self) -> i64 {
        days_from_civil(self.year as i64, self.month, self.day)
    }

    fn from_days(days: i64, like: &Date) -> Option<Date> {
        let (y, m, d) = civil_from_days(days);
        let mut out = Date::new(y, m, d)?;
        out.time = like.time;
        out.zone = like.zone;
        Some(out)
    }

    pub fn add_days(&self, n: i64) -> Option<Date> {
        Date::from_days(self.days().checked_add(n)?, self)
    }

    /// Adds a duration, carrying whole days into the date
    pub fn add_time(&self, nanos: i64) -> Option<Date> {
        let total = self.time.unwrap_or(0).checked_add(nanos)?;
        let mut out = self.add_days(total.div_euclid(NANOS_PER_DAY))?;
        out.time = Some(total.rem_euclid(NANOS_PER_DAY));
        Some(out)
    }

    /// Monday is 1
    pub fn weekday(&self) -> i64 {
        (self.days() + 3).rem_euclid(7) + 1
    }

    pub fn yearday(&self) -> i64 {
        self.days() - days_from_civil(self.year as i64, 1, 1) + 1
    }

    /// Position on a single UTC timeline, for ordering
    pub fn utc_nanos(&self) -> i128 {
        self.days() as i128 * NANOS_PER_DAY as i128 + self.time.unwrap_or(0) as i128
            - self.zone.unwrap_or(0) as i128 * NANOS_PER_MIN as i128
    }

    pub fn compare(&self, other: &Date) -> Ordering {
        self.utc_nanos().cmp(&other.utc_nanos())
    }

    /// Reads `1-Jan-2017`, `1/Jan/2017`, `2017-01-31` and the same
    /// with a `/10:30` time and `+1:00` zone suffix
    pub fn parse(text: &str) -> Option<Date> {
        let (day_part, rest) = match text.find(['/', 'T']) {
            Some(p) if text[..p].contains('-') => (&text[..p], Some(&text[p + 1..])),
            _ => (text, None),
        };

        let fields: Vec<&str> = day_part.split(['-', '/']).collect();
        if fields.len() != 3 {
            return None;
        }

        let mut date = if fields[0].len() == 4 && fields[0].bytes().all(|b| b.is_ascii_digit()) {
            let m: u8 = fields[1].parse().ok()?;
            Date::new(fields[0].parse().ok()?, m, fields[2].parse().ok()?)?
        } else {
            let month = match fields[1].parse::<u8>() {
                Ok(m) => m,
                Err(_) => {
                    let nm = fields[1].to_ascii_lowercase();
                    if nm.len() < 3 {
                        return None;
                    }
                    MONTHS
                        .iter()
                        .position(|full| full.to_ascii_lowercase().starts_with(&nm))?
                        as u8
                        + 1
                }
            };
            let mut year: i64 = fields[2].parse().ok()?;
            if fields[2].len() <= 2 {
                year += if year < 50 { 2000 } else { 1900 };
            }
            Date::new(year, month, fields[0].parse().ok()?)?
        };

        if let Some(rest) = rest {
            let (tpart, zpart) = match rest.rfind(['+', '-', 'Z']) {
                Some(p) if p > 0 => (&rest[..p], Some(&rest[p..])),
                _ => (rest, None),
            };
            date.time = Some(parse_time(tpart)?);
            if let Some(z) = zpart {
                date.zone = Some(parse_zone(z)?);
            }
        }

        Some(date)
    }
}

fn parse_zone(text: &str) -> Option<i16> {
    if text == "Z" {
        return Some(0);
    }
    let (neg, body) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => return None,
    };
    let mins = if let Some((h, m)) = body.split_once(':') {
        h.parse::<i16>().ok()? * 60 + m.parse::<i16>().ok()?
    } else {
        body.parse::<i16>().ok()? * 60
    };
    Some(if neg { -mins } else { mins })
}

/// Reads `h:mm`, `h:mm:ss` and `h:mm:ss.fff` (also `-` prefixed)
pub fn parse_time(text: &str) -> Option<i64> {
    let (neg, body) = match text.strip_prefix('-') {
        Some(b) => (true, b),
        None => (false, text),
    };
    let parts: Vec<&str> = body.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }
    let hours: i64 = parts[0].parse().ok()?;
    let mins: i64 = parts[1].parse().ok()?;
    let nanos = if parts.len() == 3 {
        let secs: f64 = parts[2].replace(',', ".").parse().ok()?;
        (secs * NANOS_PER_SEC as f64).round() as i64
    } else {
        0
    };
    if mins >= 60 && parts.len() == 3 {
        return None;
    }
    let total = hours
        .checked_mul(NANOS_PER_HOUR)?
        .checked_add(mins * NANOS_PER_MIN)?
        .checked_add(nanos)?;
    Some(if neg { -total } else { total })
}

/// Molded form of a time: `1:02`, `1:02:03`, `0:00:00.5`
pub fn form_time(nanos: i64) -> String {
    let sign = if nanos < 0 { "-" } else { "" };
    let n = nanos.unsigned_abs() as i128;
    let hours = n / NANOS_PER_HOUR as i128;
    let mins = (n / NANOS_PER_MIN as i128) % 60;
    let secs = (n / NANOS_PER_SEC as i128) % 60;
    let frac = n % NANOS_PER_SEC as i128;

    if secs == 0 && frac == 0 {
        format!("{}{}:{:02}", sign, hours, mins)
    } else if frac == 0 {
        format!("{}{}:{:02}:{:02}", sign, hours, mins, secs)
    } else {
        let f = format!("{:09}", frac);
        format!("{}{}:{:02}:{:02}.{}", sign, hours, mins, secs, f.trim_end_matches('0'))
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.day,
            &MONTHS[self.month as usize - 1][..3],
            self.year
        )?;
        if let Some(t) = self.time {
            write!(f, "/{}", form_time(t))?;
            if let Some(z) = self.zone {
                let sign = if z < 0 { '-' } else { '+' };
                write!(f, "{}{}:{:02}", sign, z.abs() / 60, z.abs() % 60)?;
            }
        }
        Ok(())
    }
}

/// Nanoseconds from a decimal count of them, failing when it does not
/// fit a time
pub fn nanos_of(it: &mut Interp, n: f64) -> Result<i64, Fail> {
    // i64::MAX as f64 rounds up to 2^63, itself out of range
    if n.is_finite() && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Ok(n as i64)
    } else {
        Err(it.error(ErrId::Overflow, &[]))
    }
}

fn time_operand(it: &mut Interp, arg: Cell) -> Result<i64, Fail> {
    match arg.kind {
        Kind::Time => Ok(arg.time_val()),
        Kind::Integer => arg
            .int()
            .checked_mul(NANOS_PER_SEC)
            .ok_or_else(|| it.error(ErrId::Overflow, &[])),
        Kind::Decimal => nanos_of(it, arg.dec() * NANOS_PER_SEC as f64),
        _ => Err(it.error(ErrId::InvalidArg, &[arg])),
    }
}

/// Datatype methods for DATE!
pub fn date_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let date = value.date_val();

    let out = match verb {
        SYM_ADD | SYM_SUBTRACT => {
            let arg = it.arg(2);
            let sign = if verb == SYM_ADD { 1 } else { -1 };
            let result = match arg.kind {
                Kind::Integer => date.add_days(sign * arg.int()),
                Kind::Time => date.add_time(sign * arg.time_val()),
                Kind::Date if verb == SYM_SUBTRACT => {
                    let other = arg.date_val();
                    return Ok(Bounce::Out(Cell::integer(date.days() - other.days())));
                }
                _ => return Err(it.error(ErrId::InvalidArg, &[arg])),
            };
            result.ok_or_else(|| it.error(ErrId::OutOfRange, &[value]))?
        }
        SYM_PICK => {
            let picker = it.arg(2);
            return Ok(Bounce::Out(date_pick(it, &date, picker)?));
        }
        _ => return Err(it.unhandled(verb, value)),
    };

    Ok(Bounce::Out(Cell::date(out)))
}

pub fn date_pick(it: &mut Interp, date: &Date, picker: Cell) -> Result<Cell, Fail> {
    let field = match picker.kind {
        Kind::Word => it.syms.canon(picker.spelling()),
        Kind::Integer => match picker.int() {
            1 => SYM_YEAR,
            2 => SYM_MONTH,
            3 => SYM_DAY,
            4 => SYM_TIME,
            5 => SYM_ZONE,
            6 => SYM_WEEKDAY,
            7 => SYM_YEARDAY,
            _ => return Ok(Cell::BLANK),
        },
        _ => return Err(it.error(ErrId::BadPathPick, &[picker])),
    };
    Ok(match field {
        SYM_YEAR => Cell::integer(date.year as i64),
        SYM_MONTH => Cell::integer(date.month as i64),
        SYM_DAY => Cell::integer(date.day as i64),
        SYM_TIME => date.time.map(Cell::time).unwrap_or(Cell::BLANK),
        SYM_ZONE => date
            .zone
            .map(|z| Cell::time(z as i64 * NANOS_PER_MIN))
            .unwrap_or(Cell::BLANK),
        SYM_WEEKDAY => Cell::integer(date.weekday()),
        SYM_YEARDAY => Cell::integer(date.yearday()),
        _ => return Err(it.error(ErrId::BadPathPick, &[picker])),
    })
}

/// Datatype methods for TIME!
pub fn time_action(it: &mut Interp, verb: Sym) -> Result<Bounce, Fail> {
    let value = it.arg(1);
    let t = value.time_val();
    let overflow = |it: &mut Interp| it.error(ErrId::Overflow, &[]);

    let out = match verb {
        SYM_ADD | SYM_SUBTRACT => {
            let arg = it.arg(2);
            let n = time_operand(it, arg)?;
            let r = if verb == SYM_ADD {
                t.checked_add(n)
            } else {
                t.checked_sub(n)
            };
            r.ok_or_else(|| overflow(it))?
        }
        SYM_MULTIPLY => {
            let arg = it.arg(2);
            match arg.kind {
                Kind::Integer => t.checked_mul(arg.int()).ok_or_else(|| overflow(it))?,
                Kind::Decimal => nanos_of(it, t as f64 * arg.dec())?,
                _ => return Err(it.error(ErrId::InvalidArg, &[arg])),
            }
        }
        SYM_DIVIDE => {
            let arg = it.arg(2);
            match arg.kind {
                Kind::Time => {
                    if arg.time_val() == 0 {
                        return Err(it.error(ErrId::ZeroDivide, &[]));
                    }
                    return Ok(Bounce::Out(Cell::decimal(t as f64 / arg.time_val() as f64)));
                }
                Kind::Integer if arg.int() != 0 => t / arg.int(),
                Kind::Decimal if arg.dec() != 0.0 => nanos_of(it, t as f64 / arg.dec())?,
                Kind::Integer | Kind::Decimal => return Err(it.error(ErrId::ZeroDivide, &[])),
                _ => return Err(it.error(ErrId::InvalidArg, &[arg])),
            }
        }
        SYM_REMAINDER => {
            let arg = it.arg(2);
            let n = time_operand(it, arg)?;
            if n == 0 {
                return Err(it.error(ErrId::ZeroDivide, &[]));
            }
            t % n
        }
        SYM_NEGATE => t.checked_neg().ok_or_else(|| overflow(it))?,
        SYM_ABSOLUTE => t.checked_abs().ok_or_else(|| overflow(it))?,
        SYM_PICK => {
            let picker = it.arg(2);
            return Ok(Bounce::Out(time_pick(it, t, picker)?));
        }
        _ => return Err(it.unhandled(verb, value)),
    };

    Ok(Bounce::Out(Cell::time(out)))
}

pub fn time_pick(it: &mut Interp, t: i64, picker: Cell) -> Result<Cell, Fail> {
    let field = match picker.kind {
        Kind::Word => it.syms.canon(picker.spelling()),
        Kind::Integer => match picker.int() {
            1 => SYM_HOUR,
            2 => SYM_MINUTE,
            3 => SYM_SECOND,
            _ => return Ok(Cell::BLANK),
        },
        _ => return Err(it.error(ErrId::BadPathPick, &[picker])),
    };
    Ok(match field {
        SYM_HOUR => Cell::integer(t / NANOS_PER_HOUR),
        SYM_MINUTE => Cell::integer((t / NANOS_PER_MIN) % 60),
        SYM_SECOND => {
            let ns = t % NANOS_PER_MIN;
            if ns % NANOS_PER_SEC == 0 {
                Cell::integer(ns / NANOS_PER_SEC)
            } else {
                Cell::decimal(ns as f64 / NANOS_PER_SEC as f64)
            }
        }
        _ => return Err(it.error(ErrId::BadPathPick, &[picker])),
    })
}

fn field_int(it: &mut Interp, value: Cell) -> Result<i64, Fail> {
    match value.kind {
        Kind::Integer => Ok(value.int()),
        _ => Err(it.error(ErrId::InvalidArg, &[value])),
    }
}

/// Date with one field replaced, for SET-PATH! on a date variable
pub fn date_poke(it: &mut Interp, date: Date, picker: Cell, value: Cell) -> Result<Date, Fail> {
    let field = match picker.kind {
        Kind::Word => it.syms.canon(picker.spelling()),
        _ => return Err(it.error(ErrId::BadPathSet, &[picker])),
    };
    let out = match field {
        SYM_YEAR => {
            let y = field_int(it, value)?;
            Date::new(y, date.month, date.day).map(|d| Date { time: date.time, zone: date.zone, ..d })
        }
        SYM_MONTH => {
            let m = field_int(it, value)?;
            u8::try_from(m)
                .ok()
                .and_then(|m| Date::new(date.year as i64, m, date.day))
                .map(|d| Date { time: date.time, zone: date.zone, ..d })
        }
        SYM_DAY => {
            let n = field_int(it, value)?;
            u8::try_from(n)
                .ok()
                .and_then(|n| Date::new(date.year as i64, date.month, n))
                .map(|d| Date { time: date.time, zone: date.zone, ..d })
        }
        SYM_TIME => match value.kind {
            Kind::Time => Some(Date { time: Some(value.time_val()), ..date }),
            Kind::Blank => Some(Date { time: None, zone: None, ..date }),
            _ => return Err(it.error(ErrId::InvalidArg, &[value])),
        },
        SYM_ZONE => match value.kind {
            Kind::Time => Some(Date { zone: Some((value.time_val() / NANOS_PER_MIN) as i16), ..date }),
            Kind::Blank => Some(Date { zone: None, ..date }),
            _ => return Err(it.error(ErrId::InvalidArg, &[value])),
        },
        _ => return Err(it.error(ErrId::BadPathSet, &[picker])),
    };
    out.ok_or_else(|| it.error(ErrId::OutOfRange, &[value]))
}

/// Time with one field replaced
pub fn time_poke(it: &mut Interp, t: i64, picker: Cell, value: Cell) -> Result<i64, Fail> {
    let field = match picker.kind {
        Kind::Word => it.syms.canon(picker.spelling()),
        Kind::Integer => match picker.int() {
            1 => SYM_HOUR,
            2 => SYM_MINUTE,
            3 => SYM_SECOND,
            _ => return Err(it.error(ErrId::BadPathSet, &[picker])),
        },
        _ => return Err(it.error(ErrId::BadPathSet, &[picker])),
    };
    let (h, m, s) = (t / NANOS_PER_HOUR, (t / NANOS_PER_MIN) % 60, t % NANOS_PER_MIN);
    let n = match value.kind {
        Kind::Integer => value.int(),
        Kind::Decimal if field == SYM_SECOND => {
            return Ok(h * NANOS_PER_HOUR + m * NANOS_PER_MIN + (value.dec() * NANOS_PER_SEC as f64) as i64);
        }
        _ => return Err(it.error(ErrId::InvalidArg, &[value])),
    };
    Ok(match field {
        SYM_HOUR => n * NANOS_PER_HOUR + m * NANOS_PER_MIN + s,
        SYM_MINUTE => h * NANOS_PER_HOUR + n * NANOS_PER_MIN + s,
        SYM_SECOND => h * NANOS_PER_HOUR + m * NANOS_PER_MIN + n * NANOS_PER_SEC,
        _ => return Err(it.error(ErrId::BadPathSet, &[picker])),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn civil_roundtrip() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        for z in [-1000, -1, 59, 365, 11_016, 20_000, 100_000] {
            let (y, m, d) = civil_from_days(z);
            assert_eq!(days_from_civil(y, m, d), z);
        }
    }

    #[test]
    fn parses_dates() {
        let d = Date::parse("1-Jan-2017").unwrap();
        assert_eq!((d.year, d.month, d.day), (2017, 1, 1));
        assert_eq!(Date::parse("2017-01-31").unwrap().day, 31);
        assert!(Date::parse("30-Feb-2017").is_none());
        let t = Date::parse("4-Jul-1999/10:30+2:00").unwrap();
        assert_eq!(t.time, Some(10 * NANOS_PER_HOUR + 30 * NANOS_PER_MIN));
        assert_eq!(t.zone, Some(120));
        assert_eq!(t.to_string(), "4-Jul-1999/10:30+2:00");
    }

    #[test]
    fn date_math() {
        let d = Date::parse("28-Feb-2016").unwrap();
        assert_eq!(d.add_days(1).unwrap().to_string(), "29-Feb-2016");
        assert_eq!(d.add_days(2).unwrap().to_string(), "1-Mar-2016");
        assert_eq!(Date::parse("1-Jan-1970").unwrap().weekday(), 4);
        let later = d.add_time(25 * NANOS_PER_HOUR).unwrap();
        assert_eq!(later.day, 29);
        assert_eq!(later.time, Some(NANOS_PER_HOUR));
    }

    #[test]
    fn times() {
        assert_eq!(parse_time("12:30"), Some(12 * NANOS_PER_HOUR + 30 * NANOS_PER_MIN));
        assert_eq!(form_time(parse_time("1:02:03").unwrap()), "1:02:03");
        assert_eq!(form_time(parse_time("0:00:00.5").unwrap()), "0:00:00.5");
        assert_eq!(form_time(-NANOS_PER_HOUR), "-1:00");
    }

    #[test]
    fn time_overflow_fails() {
        use crate::ren::interp::InterpConfig;
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        for src in ["12:30 * 1e300", "1e300 * 12:30", "12:30 / 1e-300", "to time! 1e300", "to time! 9223372036854775807", "12:30 + 1e300"] {
            let err = it.interpret(src).unwrap_err();
            assert_eq!(err.id(), Some("overflow"), "{}", src);
        }
        assert_eq!(it.interpret("12:30 * 2").unwrap(), "25:00");
        assert_eq!(it.interpret("to time! 90").unwrap(), "0:01:30");
    }
}
