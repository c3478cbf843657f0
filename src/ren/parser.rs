// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/parser.rs

// Scanner. Reads source text into a block of cells with a recursive
// descent over characters.

// <>

use super::cell::*;
use super::error::{ErrId, Fail};
use super::eval::{RED_ZONE, STACK_GROWTH};
use super::interp::Interp;
use super::series::{flag, Link, Misc, SeriesId};
use super::symtab::Sym;
use super::types::date::{parse_time, Date};
use super::types::money::Money;
use super::types::tuple::Tuple;

/// Characters that end any token
const DELIMITERS: &str = "[]()\"{};";

/// Scans `text` into a managed block array. With a file name, the
/// arrays produced remember it and their starting line.
pub fn scan(it: &mut Interp, text: &str, file: Option<&str>) -> Result<SeriesId, Fail> {
    let file = file.map(|f| it.intern(f));
    let mut sc = Scanner {
        it,
        src: text.chars().collect(),
        pos: 0,
        line: 1,
        file,
        newline: false,
    };
    let cells = sc.read_items(None)?;
    sc.finish_array(&cells, 1)
}

struct Scanner<'a> {
    it: &'a mut Interp,
    src: Vec<char>,
    pos: usize,
    line: u32,
    file: Option<Sym>,
    /// A line break was passed since the last value
    newline: bool,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || DELIMITERS.contains(c)
}

impl Scanner<'_> {
    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src.get(self.pos + n).copied()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn invalid(&mut self, what: &str, text: &str) -> Fail {
        let what = Cell::word(Kind::Word, self.it.intern(what));
        match self.it.string_cell(Kind::String, text) {
            Ok(t) => self.it.error(ErrId::Invalid, &[what, t]),
            Err(fail) => fail,
        }
    }

    fn missing(&mut self, close: char, line: u32) -> Fail {
        let at = format!("line {}", line);
        let at = self.it.string_cell(Kind::String, &at);
        let close = self.it.string_cell(Kind::String, &close.to_string());
        match (at, close) {
            (Ok(a), Ok(c)) => self.it.error(ErrId::Missing, &[a, c]),
            (Err(fail), _) | (_, Err(fail)) => fail,
        }
    }

    /// Skips whitespace and comments, noting line breaks
    fn skip_space(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                self.newline = true;
                self.next_char();
            } else if c.is_whitespace() {
                self.pos += 1;
            } else if c == ';' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn finish_array(&mut self, cells: &[Cell], line: u32) -> Result<SeriesId, Fail> {
        let id = self.it.make_array(cells)?;
        if let Some(file) = self.file {
            let series = self.it.pool.get_mut(id);
            series.set(flag::FILE_LINE);
            series.link = Link::File(file);
            series.misc = Misc::Line(line);
        }
        Ok(id)
    }

    /// Values up to `close`, or to the end of input when there is none
    fn read_items(&mut self, close: Option<char>) -> Result<Vec<Cell>, Fail> {
        let start = self.line;
        let mut out = Vec::new();
        loop {
            self.skip_space();
            let Some(c) = self.peek() else {
                return match close {
                    Some(cl) => Err(self.missing(cl, start)),
                    None => Ok(out),
                };
            };
            match c {
                ']' | ')' => {
                    self.pos += 1;
                    if close == Some(c) {
                        return Ok(out);
                    }
                    return Err(self.invalid("end-of-block", &c.to_string()));
                }
                _ => {
                    let mut v = self.read_value()?;
                    if self.newline {
                        v.flags.set(CellFlags::NEWLINE);
                        self.newline = false;
                    }
                    out.push(v);
                }
            }
        }
    }

    fn read_array(&mut self, kind: Kind, close: char) -> Result<Cell, Fail> {
        let line = self.line;
        self.pos += 1;
        // a break right after the opening bracket belongs inside
        let outer = std::mem::replace(&mut self.newline, false);
        let cells = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.read_items(Some(close)))?;
        self.newline = outer;
        let id = self.finish_array(&cells, line)?;
        Ok(Cell::series(kind, id, 0))
    }

    fn read_value(&mut self) -> Result<Cell, Fail> {
        let Some(c) = self.peek() else {
            return Err(self.invalid("end-of-script", ""));
        };
        match c {
            '[' => self.read_array(Kind::Block, ']'),
            '(' => self.read_array(Kind::Group, ')'),
            '"' => {
                let s = self.read_quoted()?;
                self.it.string_cell(Kind::String, &s)
            }
            '{' => {
                let s = self.read_braced()?;
                self.it.string_cell(Kind::String, &s)
            }
            '#' => match self.peek_at(1) {
                Some('"') => self.read_char(),
                Some('{') => self.read_binary(),
                _ => {
                    self.pos += 1;
                    let tok = self.read_token();
                    if tok.is_empty() {
                        return Err(self.invalid("issue", "#"));
                    }
                    let sym = self.it.intern(&tok);
                    Ok(Cell::word(Kind::Issue, sym))
                }
            },
            '%' => {
                self.pos += 1;
                let path = if self.peek() == Some('"') {
                    self.read_quoted()?
                } else {
                    self.read_to_delimiter()
                };
                self.it.string_cell(Kind::File, &path)
            }
            '<' if self.is_tag_start() => self.read_tag(),
            _ => {
                let tok = self.read_token();
                if tok.is_empty() {
                    let text = c.to_string();
                    self.pos += 1;
                    return Err(self.invalid("word", &text));
                }
                let head = self.classify(&tok)?;
                let pathable = matches!(head.kind, Kind::Word | Kind::GetWord | Kind::LitWord);
                if pathable && self.peek() == Some('/') && !tok.starts_with('/') {
                    self.read_path(head)
                } else {
                    Ok(head)
                }
            }
        }
    }

    fn is_tag_start(&self) -> bool {
        matches!(self.peek_at(1), Some(c) if c.is_alphabetic() || c == '/' || c == '.' || c == '!')
    }

    /// Raw text of a token. Slashes end a token unless it is made of
    /// slashes, a URL, or a date carrying a time.
    fn read_token(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            if c == '/' {
                let so_far: String = self.src[start..self.pos].iter().collect();
                if so_far.chars().all(|c| c == '/') {
                    // `/`, `//` and the slash before a refinement name
                    self.pos += 1;
                    continue;
                }
                if so_far.ends_with(':') && self.peek_at(1) == Some('/') {
                    self.read_to_delimiter();
                    break;
                }
                if looks_like_date(&so_far) {
                    self.pos += 1;
                    continue;
                }
                break;
            }
            self.pos += 1;
        }
        self.src[start..self.pos].iter().collect()
    }

    /// Rest of a URL or file; slashes and braces are part of it
    fn read_to_delimiter(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || "[]()\";".contains(c) {
                break;
            }
            self.pos += 1;
        }
        self.src[start..self.pos].iter().collect()
    }

    /// Path segments after a head value; a trailing colon makes a
    /// set-path
    fn read_path(&mut self, head: Cell) -> Result<Cell, Fail> {
        let kind = match head.kind {
            Kind::GetWord => Kind::GetPath,
            Kind::LitWord => Kind::LitPath,
            _ => Kind::Path,
        };
        let mut cells = vec![head.with_kind(Kind::Word)];
        let mut kind = kind;
        while self.peek() == Some('/') {
            self.pos += 1;
            let seg = match self.peek() {
                Some('(') => self.read_array(Kind::Group, ')')?,
                Some(c) if is_delimiter(c) || c == '/' => return Err(self.invalid("path", "/")),
                None => return Err(self.invalid("path", "/")),
                _ => {
                    let start = self.pos;
                    while let Some(c) = self.peek() {
                        if is_delimiter(c) || c == '/' {
                            break;
                        }
                        self.pos += 1;
                    }
                    let mut tok: String = self.src[start..self.pos].iter().collect();
                    let setter = tok.ends_with(':') && tok.len() > 1;
                    if setter {
                        tok.pop();
                    }
                    let seg = self.classify(&tok)?;
                    if setter {
                        if kind != Kind::Path || self.peek() == Some('/') {
                            return Err(self.invalid("path", &tok));
                        }
                        kind = Kind::SetPath;
                    }
                    seg
                }
            };
            cells.push(seg);
        }
        let id = self.it.make_array(&cells)?;
        Ok(Cell::series(kind, id, 0))
    }

    fn read_escape(&mut self) -> Result<char, Fail> {
        let Some(c) = self.next_char() else {
            return Err(self.invalid("char", "^"));
        };
        Ok(match c {
            '/' => '\n',
            '-' => '\t',
            '@' => '\0',
            '[' => '\u{1b}',
            '(' => {
                let start = self.pos;
                while let Some(c) = self.next_char() {
                    if c == ')' {
                        break;
                    }
                }
                let name: String = self.src[start..self.pos.saturating_sub(1)].iter().collect();
                let named = match name.to_ascii_lowercase().as_str() {
                    "line" => Some('\n'),
                    "tab" => Some('\t'),
                    "null" => Some('\0'),
                    "back" => Some('\u{8}'),
                    "esc" => Some('\u{1b}'),
                    "del" => Some('\u{7f}'),
                    _ => None,
                };
                match named {
                    Some(c) => c,
                    None => u32::from_str_radix(&name, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| self.invalid("char", &format!("^({})", name)))?,
                }
            }
            c if c.is_ascii_alphabetic() => char::from(c.to_ascii_uppercase() as u8 & 0x1F),
            c => c,
        })
    }

    fn read_quoted(&mut self) -> Result<String, Fail> {
        let line = self.line;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.next_char() {
                None | Some('\n') => return Err(self.missing('"', line)),
                Some('"') => return Ok(out),
                Some('^') => out.push(self.read_escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn read_braced(&mut self) -> Result<String, Fail> {
        let line = self.line;
        self.pos += 1;
        let mut depth = 1;
        let mut out = String::new();
        loop {
            match self.next_char() {
                None => return Err(self.missing('}', line)),
                Some('{') => {
                    depth += 1;
                    out.push('{');
                }
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push('}');
                }
                Some('^') => out.push(self.read_escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn read_char(&mut self) -> Result<Cell, Fail> {
        self.pos += 1;
        let text = self.read_quoted()?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Cell::char(c as u32)),
            _ => Err(self.invalid("char", &format!("#\"{}\"", text))),
        }
    }

    fn read_binary(&mut self) -> Result<Cell, Fail> {
        let line = self.line;
        self.pos += 2;
        let mut digits = String::new();
        loop {
            match self.next_char() {
                None => return Err(self.missing('}', line)),
                Some('}') => break,
                Some(c) if c.is_whitespace() => {}
                Some(c) => digits.push(c),
            }
        }
        if digits.len() % 2 != 0 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(self.invalid("binary", &format!("#{{{}}}", digits)));
        }
        let bytes: Vec<u8> = (0..digits.len())
            .step_by(2)
            .filter_map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
            .collect();
        self.it.binary_cell(&bytes)
    }

    fn read_tag(&mut self) -> Result<Cell, Fail> {
        let line = self.line;
        self.pos += 1;
        let start = self.pos;
        loop {
            match self.next_char() {
                None => return Err(self.missing('>', line)),
                Some('>') => break,
                Some(_) => {}
            }
        }
        let text: String = self.src[start..self.pos - 1].iter().collect();
        self.it.string_cell(Kind::Tag, &text)
    }

    /// Turns a token into a value: words of every kind, numbers and the
    /// other lexical scalars, urls and emails
    fn classify(&mut self, tok: &str) -> Result<Cell, Fail> {
        if tok == "_" {
            return Ok(Cell::BLANK);
        }
        if tok.starts_with('/') {
            if tok.chars().all(|c| c == '/') {
                return self.word(Kind::Word, tok);
            }
            if let Some(name) = tok.strip_suffix(':').filter(|n| n.chars().all(|c| c == '/')) {
                return self.word(Kind::SetWord, name);
            }
            return self.word(Kind::Refinement, &tok[1..]);
        }
        if let Some(rest) = tok.strip_prefix(':') {
            return self.word(Kind::GetWord, rest);
        }
        if let Some(rest) = tok.strip_prefix('\'') {
            return self.word(Kind::LitWord, rest);
        }

        let first = tok.chars().next().unwrap_or(' ');
        let second = tok.chars().nth(1);
        let numeric = first.is_ascii_digit()
            || (matches!(first, '+' | '-' | '.') && second.map(|c| c.is_ascii_digit()).unwrap_or(false));
        if numeric {
            return self.number(tok);
        }
        if first == '$' || tok.starts_with("-$") || tok.starts_with("+$") {
            return match Money::parse(&tok.replacen('$', "", 1)) {
                Some(m) => Ok(Cell::money(m)),
                None => Err(self.invalid("money", tok)),
            };
        }
        if tok.contains("://") || (tok.contains(':') && !tok.ends_with(':') && first.is_alphabetic()) {
            return self.it.string_cell(Kind::Url, tok);
        }
        if tok.contains('@') {
            return self.it.string_cell(Kind::Email, tok);
        }
        if let Some(name) = tok.strip_suffix(':') {
            return self.word(Kind::SetWord, name);
        }
        self.word(Kind::Word, tok)
    }

    fn word(&mut self, kind: Kind, name: &str) -> Result<Cell, Fail> {
        let valid = !name.is_empty()
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && !name.contains([':', '\'', '@', '%', '$'])
            && !(name.contains('/') && !name.chars().all(|c| c == '/'));
        if !valid {
            return Err(self.invalid(kind.name(), name));
        }
        let sym = self.it.intern(name);
        Ok(Cell::word(kind, sym))
    }

    fn number(&mut self, tok: &str) -> Result<Cell, Fail> {
        if tok.contains('@') {
            return self.it.string_cell(Kind::Email, tok);
        }
        if let Some(body) = tok.strip_suffix('%') {
            return match parse_decimal(body) {
                Some(d) => Ok(Cell::percent(d / 100.0)),
                None => Err(self.invalid("percent", tok)),
            };
        }
        if looks_like_date(tok) {
            return match Date::parse(tok) {
                Some(d) => Ok(Cell::date(d)),
                None => Err(self.invalid("date", tok)),
            };
        }
        if tok.contains(':') {
            return match parse_time(tok) {
                Some(t) => Ok(Cell::time(t)),
                None => Err(self.invalid("time", tok)),
            };
        }
        if let Some((x, y)) = tok.split_once(['x', 'X']) {
            return match (parse_decimal(x), parse_decimal(y)) {
                (Some(x), Some(y)) => Ok(Cell::pair(x as f32, y as f32)),
                _ => Err(self.invalid("pair", tok)),
            };
        }
        if tok.matches('.').count() >= 2 {
            let bytes: Option<Vec<u8>> = tok
                .trim_end_matches('.')
                .split('.')
                .map(|seg| seg.parse::<u8>().ok())
                .collect();
            return match bytes.and_then(|b| Tuple::new(&b)) {
                Some(t) => Ok(Cell::tuple(t)),
                None => Err(self.invalid("tuple", tok)),
            };
        }
        let digits: String = tok.chars().filter(|c| *c != '\'').collect();
        if let Ok(i) = digits.parse::<i64>() {
            return Ok(Cell::integer(i));
        }
        if digits.trim_start_matches(['+', '-']).bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.invalid("integer", tok));
        }
        match parse_decimal(tok) {
            Some(d) => Ok(Cell::decimal(d)),
            None => Err(self.invalid("decimal", tok)),
        }
    }
}

/// Digit-led token with a `-` after its first character, as in
/// `1-Jan-2017` or `2017-01-31`
fn looks_like_date(tok: &str) -> bool {
    tok.starts_with(|c: char| c.is_ascii_digit()) && tok[1..].contains('-') && !tok.contains(['e', 'E'])
        || tok.starts_with(|c: char| c.is_ascii_digit()) && tok[1..].matches('-').count() >= 2
}

/// Decimal text with `'` separators and `,` allowed as the point
fn parse_decimal(text: &str) -> Option<f64> {
    let clean: String = text
        .chars()
        .filter(|c| *c != '\'')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if clean.is_empty() || clean.contains(|c: char| c.is_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    clean.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ren::interp::InterpConfig;

    fn kinds(src: &str) -> Vec<Kind> {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        it.transcode_values(src).unwrap().iter().map(|c| c.kind).collect()
    }

    #[test]
    fn scalar_forms() {
        assert_eq!(
            kinds("-12 1'000 1.5 1e3 1,5 50% $1.50 -$2 10x20 1.2.3 12:30 1-Jan-2017 #\"a\" _"),
            vec![
                Kind::Integer,
                Kind::Integer,
                Kind::Decimal,
                Kind::Decimal,
                Kind::Decimal,
                Kind::Percent,
                Kind::Money,
                Kind::Money,
                Kind::Pair,
                Kind::Tuple,
                Kind::Time,
                Kind::Date,
                Kind::Char,
                Kind::Blank,
            ]
        );
    }

    #[test]
    fn word_and_string_forms() {
        assert_eq!(
            kinds("a b: :c 'd /e #f \"g\" {h {i}} %j %\"k l\" m@n.o http://p <q> #{0A0B} + // <"),
            vec![
                Kind::Word,
                Kind::SetWord,
                Kind::GetWord,
                Kind::LitWord,
                Kind::Refinement,
                Kind::Issue,
                Kind::String,
                Kind::String,
                Kind::File,
                Kind::File,
                Kind::Email,
                Kind::Url,
                Kind::Tag,
                Kind::Binary,
                Kind::Word,
                Kind::Word,
                Kind::Word,
            ]
        );
    }

    #[test]
    fn paths_and_arrays() {
        assert_eq!(
            kinds("a/b a/b: :a/b 'a/b a/(1 + 1)/c [x (y)] (z)"),
            vec![
                Kind::Path,
                Kind::SetPath,
                Kind::GetPath,
                Kind::LitPath,
                Kind::Path,
                Kind::Block,
                Kind::Group,
            ]
        );
    }

    #[test]
    fn escapes_and_chars() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        let vals = it.transcode_values("#\"^/\" #\"^(41)\" \"a^\"b\" #\"^(tab)\"").unwrap();
        assert_eq!(vals[0].chr(), '\n' as u32);
        assert_eq!(vals[1].chr(), 'A' as u32);
        assert_eq!(it.text_of(vals[2]), "a\"b");
        assert_eq!(vals[3].chr(), '\t' as u32);
    }

    #[test]
    fn newline_flags() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        let vals = it.transcode_values("a\nb c").unwrap();
        assert!(!vals[0].flags.has(CellFlags::NEWLINE));
        assert!(vals[1].flags.has(CellFlags::NEWLINE));
        assert!(!vals[2].flags.has(CellFlags::NEWLINE));
    }

    #[test]
    fn syntax_errors() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        for (src, id) in [("[a b", "missing"), ("\"abc", "missing"), ("a ]", "invalid"), ("1.2.300", "invalid")] {
            match it.transcode_values(src) {
                Err(Fail::Error(e)) => assert_eq!(it.error_id_name(e), id, "{}", src),
                _ => panic!("{} should not scan", src),
            }
        }
    }

    #[test]
    fn file_line_tracking() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        let arr = scan(&mut it, "a\n[b]", Some("test.reb")).unwrap();
        let inner = it.pool.get(arr).array().get(1);
        let series = it.pool.get(inner.series_id());
        assert!(series.has(flag::FILE_LINE));
        assert!(matches!(series.misc, Misc::Line(2)));
    }
}
