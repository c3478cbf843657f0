// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/mold.rs

// MOLD (text that loads back as the same value) and FORM (text for
// people to read).

// <>

use std::fmt::Write;

use super::cell::*;
use super::eval::{RED_ZONE, STACK_GROWTH};
use super::func::Dispatcher;
use super::interp::Interp;
use super::series::SeriesId;
use super::types::date::form_time;
use super::types::tuple::form_coord;

const INDENT: &str = "    ";

impl Interp {
    /// Loadable text of a value
    pub fn mold(&mut self, value: Cell) -> String {
        let mut m = Molder::new(self, false);
        m.value(value);
        m.out
    }

    /// Display text of a value; an error gives its full report
    pub fn form(&mut self, value: Cell) -> String {
        if value.kind == Kind::Error {
            return self.error_report(value);
        }
        let mut m = Molder::new(self, false);
        m.form = true;
        m.value(value);
        m.out
    }

    /// Mold of an array's contents without the outer brackets
    pub fn mold_only(&mut self, value: Cell) -> String {
        if !value.kind.is_array() {
            return self.mold(value);
        }
        let mut m = Molder::new(self, false);
        m.items(value.series_id(), value.index() as usize, " ");
        m.out.trim_start_matches('\n').to_string()
    }

    /// Mold with newline markers ignored
    pub fn mold_flat(&mut self, value: Cell) -> String {
        let mut m = Molder::new(self, true);
        m.value(value);
        m.out
    }
}

struct Molder<'a> {
    it: &'a Interp,
    out: String,
    /// Series being molded, to cut cycles short
    stack: Vec<SeriesId>,
    depth: usize,
    form: bool,
    flat: bool,
}

impl<'a> Molder<'a> {
    fn new(it: &'a Interp, flat: bool) -> Self {
        Molder {
            it,
            out: String::new(),
            stack: Vec::new(),
            depth: 0,
            form: false,
            flat,
        }
    }

    fn spelling(&self, cell: Cell) -> &'a str {
        self.it.syms.spelling(cell.spelling())
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn value(&mut self, v: Cell) {
        match v.kind {
            Kind::End | Kind::Void => {
                if !self.form {
                    self.out.push_str("#[void]")
                }
            }
            Kind::Blank => self.out.push('_'),
            Kind::Logic => self.out.push_str(if v.logic_val() { "true" } else { "false" }),
            Kind::Integer => {
                let _ = write!(self.out, "{}", v.int());
            }
            Kind::Decimal => self.out.push_str(&form_decimal(v.dec())),
            Kind::Percent => {
                let n = (v.dec() * 100.0 * 1e9).round() / 1e9;
                self.out.push_str(&form_decimal(n).trim_end_matches(".0").to_string());
                self.out.push('%');
            }
            Kind::Money => {
                let _ = write!(self.out, "{}", v.money_val());
            }
            Kind::Char => {
                let c = v.chr();
                if self.form {
                    self.out.push(char::from_u32(c).unwrap_or('?'));
                } else {
                    self.out.push_str("#\"");
                    escape_char(&mut self.out, c, '"');
                    self.out.push('"');
                }
            }
            Kind::Pair => {
                let (x, y) = v.pair_val();
                let _ = write!(self.out, "{}x{}", form_coord(x), form_coord(y));
            }
            Kind::Tuple => {
                let _ = write!(self.out, "{}", v.tuple_val());
            }
            Kind::Time => self.out.push_str(&form_time(v.time_val())),
            Kind::Date => {
                let _ = write!(self.out, "{}", v.date_val());
            }

            Kind::Word => self.out.push_str(self.spelling(v)),
            Kind::SetWord => {
                self.out.push_str(self.spelling(v));
                self.out.push(':');
            }
            Kind::GetWord => {
                self.out.push(':');
                self.out.push_str(self.spelling(v));
            }
            Kind::LitWord => {
                self.out.push('\'');
                self.out.push_str(self.spelling(v));
            }
            Kind::Refinement => {
                self.out.push('/');
                self.out.push_str(self.spelling(v));
            }
            Kind::Issue => {
                self.out.push('#');
                self.out.push_str(self.spelling(v));
            }

            Kind::String => self.string(v),
            Kind::File => {
                let text = self.it.text_of(v);
                if self.form {
                    self.out.push_str(&text);
                } else if text.contains(char::is_whitespace) || text.contains(['"', '[', ']']) {
                    self.out.push('%');
                    self.quoted(&text);
                } else {
                    self.out.push('%');
                    self.out.push_str(&text);
                }
            }
            Kind::Email | Kind::Url => self.out.push_str(&self.it.text_of(v)),
            Kind::Tag => {
                self.out.push('<');
                self.out.push_str(&self.it.text_of(v));
                self.out.push('>');
            }
            Kind::Binary => self.binary(v.series_id(), v.index() as usize),
            Kind::Bitset => {
                self.out.push_str("make bitset! ");
                self.binary(v.series_id(), 0);
            }

            Kind::Block | Kind::Group => self.array(v),
            Kind::Path | Kind::SetPath | Kind::GetPath | Kind::LitPath => self.path(v),

            Kind::Map => self.map(v),
            Kind::Datatype => self.out.push_str(v.datatype_val().name()),
            Kind::Typeset => {
                self.out.push_str("make typeset! [");
                let names: Vec<&str> = Kind::all()
                    .filter(|k| v.typeset_bits() & k.bit() != 0)
                    .map(|k| k.name())
                    .collect();
                self.out.push_str(&names.join(" "));
                self.out.push(']');
            }

            Kind::Object | Kind::Module | Kind::Error | Kind::Port | Kind::Frame => self.context(v),
            Kind::Function => self.function(v),
            Kind::Varargs => self.out.push_str("make varargs! [...]"),

            Kind::Image | Kind::Vector | Kind::Gob | Kind::Event | Kind::Handle | Kind::Struct | Kind::Library => {
                let _ = write!(self.out, "#[{}]", v.kind.name());
            }
        }
    }

    fn string(&mut self, v: Cell) {
        let text = self.it.text_of(v);
        if self.form {
            self.out.push_str(&text);
            return;
        }
        if text.contains(['"', '\n']) {
            self.braced(&text);
        } else {
            self.quoted(&text);
        }
    }

    fn quoted(&mut self, text: &str) {
        self.out.push('"');
        for c in text.chars() {
            escape_char(&mut self.out, c as u32, '"');
        }
        self.out.push('"');
    }

    fn braced(&mut self, text: &str) {
        let mut balance = 0i32;
        let mut balanced = true;
        for c in text.chars() {
            match c {
                '{' => balance += 1,
                '}' => {
                    balance -= 1;
                    if balance < 0 {
                        balanced = false;
                    }
                }
                _ => {}
            }
        }
        balanced &= balance == 0;

        self.out.push('{');
        for c in text.chars() {
            match c {
                '\n' => self.out.push('\n'),
                '{' | '}' if !balanced => {
                    self.out.push('^');
                    self.out.push(c);
                }
                '"' => self.out.push('"'),
                _ => escape_char(&mut self.out, c as u32, '}'),
            }
        }
        self.out.push('}');
    }

    fn binary(&mut self, id: SeriesId, from: usize) {
        self.out.push_str("#{");
        let bytes = self.it.pool.get(id).bytes();
        for b in bytes.as_slice().get(from..).unwrap_or(&[]) {
            let _ = write!(self.out, "{:02X}", b);
        }
        self.out.push('}');
    }

    /// Cuts a cycle short; true when `id` is already being molded
    fn enter(&mut self, id: SeriesId) -> bool {
        if self.stack.contains(&id) {
            return true;
        }
        self.stack.push(id);
        false
    }

    fn array(&mut self, v: Cell) {
        let (open, close) = match v.kind {
            Kind::Group => ('(', ')'),
            _ => ('[', ']'),
        };
        if self.form && v.kind == Kind::Block {
            if self.enter(v.series_id()) {
                self.out.push_str("...");
                return;
            }
            let cells = self.cells_of(v.series_id(), v.index() as usize);
            let mut first = true;
            for c in cells {
                if !first {
                    self.out.push(' ');
                }
                first = false;
                self.value(c);
            }
            self.stack.pop();
            return;
        }

        self.out.push(open);
        if self.enter(v.series_id()) {
            self.out.push_str("...");
            self.out.push(close);
            return;
        }
        self.depth += 1;
        let broke = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.items(v.series_id(), v.index() as usize, " "));
        self.depth -= 1;
        if broke {
            self.newline();
        }
        self.stack.pop();
        self.out.push(close);
    }

    fn cells_of(&self, id: SeriesId, from: usize) -> Vec<Cell> {
        self.it
            .pool
            .get(id)
            .array()
            .as_slice()
            .get(from..)
            .unwrap_or(&[])
            .to_vec()
    }

    /// Molds cells separated by `sep`, breaking lines where cells are
    /// marked; true if any line was broken
    fn items(&mut self, id: SeriesId, from: usize, sep: &str) -> bool {
        let saved = self.form;
        self.form = false;
        let mut broke = false;
        let cells = self.cells_of(id, from);
        for (i, c) in cells.iter().enumerate() {
            if c.flags.has(CellFlags::NEWLINE) && !self.flat {
                self.newline();
                broke = true;
            } else if i > 0 {
                self.out.push_str(sep);
            }
            self.value(*c);
        }
        self.form = saved;
        broke
    }

    fn path(&mut self, v: Cell) {
        match v.kind {
            Kind::GetPath => self.out.push(':'),
            Kind::LitPath => self.out.push('\''),
            _ => {}
        }
        if self.enter(v.series_id()) {
            self.out.push_str("...");
            return;
        }
        let saved = self.form;
        self.form = false;
        let cells = self.cells_of(v.series_id(), v.index() as usize);
        for (i, c) in cells.iter().enumerate() {
            if i > 0 {
                self.out.push('/');
            }
            self.value(c.unflagged());
        }
        self.form = saved;
        self.stack.pop();
        if v.kind == Kind::SetPath {
            self.out.push(':');
        }
    }

    fn map(&mut self, v: Cell) {
        self.out.push_str("make map! [");
        if self.enter(v.series_id()) {
            self.out.push_str("...]");
            return;
        }
        let cells = self.cells_of(v.series_id(), 0);
        let saved = self.form;
        self.form = false;
        self.depth += 1;
        for pair in cells.chunks(2) {
            if pair.len() < 2 || pair[1].is_void() {
                continue;
            }
            self.newline();
            self.value(pair[0].unflagged());
            self.out.push(' ');
            self.value(pair[1].unflagged());
        }
        self.depth -= 1;
        if cells.chunks(2).any(|p| p.len() == 2 && !p[1].is_void()) {
            self.newline();
        }
        self.form = saved;
        self.stack.pop();
        self.out.push(']');
    }

    fn context(&mut self, v: Cell) {
        let varlist = v.varlist();
        let words = self.it.ctx_words(varlist);
        if self.form {
            if self.enter(varlist) {
                self.out.push_str("...");
                return;
            }
            let mut first = true;
            for (n, sym) in words {
                if self.it.ctx_key_hidden(varlist, n) {
                    continue;
                }
                if !first {
                    self.out.push('\n');
                }
                first = false;
                self.out.push_str(self.it.syms.spelling(sym));
                self.out.push_str(": ");
                let val = self.it.ctx_get(varlist, n);
                self.value(val);
            }
            self.stack.pop();
            return;
        }

        let _ = write!(self.out, "make {} [", v.kind.name());
        if self.enter(varlist) {
            self.out.push_str("...]");
            return;
        }
        self.depth += 1;
        let mut any = false;
        for (n, sym) in words {
            if self.it.ctx_key_hidden(varlist, n) {
                continue;
            }
            any = true;
            self.newline();
            self.out.push_str(self.it.syms.spelling(sym));
            self.out.push_str(": ");
            let val = self.it.ctx_get(varlist, n);
            match val.kind {
                // words would be looked up when the mold is loaded
                Kind::Word | Kind::Path => self.out.push('\''),
                _ => {}
            }
            self.value(val.unflagged());
        }
        self.depth -= 1;
        if any {
            self.newline();
        }
        self.stack.pop();
        self.out.push(']');
    }

    fn function(&mut self, v: Cell) {
        self.out.push_str("make function! [[");
        let keys = self.it.param_keys(v);
        let mut first = true;
        for key in keys {
            let class = key.key_class();
            if matches!(class, ParamClass::Local | ParamClass::Return | ParamClass::Leave) {
                continue;
            }
            if !first {
                self.out.push(' ');
            }
            first = false;
            match class {
                ParamClass::HardQuote => self.out.push(':'),
                ParamClass::SoftQuote => self.out.push('\''),
                ParamClass::Refinement => self.out.push('/'),
                _ => {}
            }
            self.out.push_str(self.it.syms.spelling(key.key_spelling()));
            let bits = key.typeset_bits();
            if class != ParamClass::Refinement && bits & TS_ANY_VALUE != TS_ANY_VALUE {
                let names: Vec<&str> = Kind::all().filter(|k| bits & k.bit() != 0).map(|k| k.name()).collect();
                let _ = write!(self.out, " [{}]", names.join(" "));
            }
        }
        self.out.push_str("] ");
        match self.it.dispatcher_of(v) {
            Dispatcher::Interpreted | Dispatcher::Voider => {
                let body = self.it.body_of(v);
                self.array(body);
            }
            _ => self.out.push_str("[...]"),
        }
        self.out.push(']');
    }
}

/// Shortest text that reads back as the same decimal, always with a
/// point or exponent
pub fn form_decimal(d: f64) -> String {
    if d.is_nan() {
        return "1.#NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "1.#INF" } else { "-1.#INF" }.to_string();
    }
    let a = d.abs();
    if a != 0.0 && !(1e-5..1e15).contains(&a) {
        return format!("{:e}", d);
    }
    let text = format!("{}", d);
    if text.contains('.') {
        text
    } else {
        text + ".0"
    }
}

/// Appends a character with the escapes the scanner understands
fn escape_char(out: &mut String, c: u32, quote: char) {
    match char::from_u32(c) {
        Some('\n') => out.push_str("^/"),
        Some('\t') => out.push_str("^-"),
        Some('^') => out.push_str("^^"),
        Some(ch) if ch == quote => {
            out.push('^');
            out.push(ch);
        }
        Some('\u{1b}') => out.push_str("^["),
        Some(ch) if (ch as u32) < 0x20 => {
            out.push('^');
            out.push(char::from(b'@' + ch as u8));
        }
        Some('\u{7f}') => out.push_str("^(7F)"),
        Some(ch) => out.push(ch),
        None => {
            let _ = write!(out, "^({:X})", c);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ren::interp::{Interp, InterpConfig};

    fn mold_of(src: &str) -> String {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        it.interpret(src).unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(mold_of("1.5"), "1.5");
        assert_eq!(mold_of("3.0"), "3.0");
        assert_eq!(mold_of("50%"), "50%");
        assert_eq!(mold_of("$1.5"), "$1.50");
        assert_eq!(mold_of("#\"^/\""), "#\"^/\"");
        assert_eq!(mold_of("10x20"), "10x20");
        assert_eq!(mold_of("_"), "_");
        assert_eq!(mold_of("true"), "true");
        assert_eq!(mold_of("12:30"), "12:30");
    }

    #[test]
    fn strings() {
        assert_eq!(mold_of("\"a^^b\""), "\"a^^b\"");
        assert_eq!(mold_of("{say \"hi\"}"), "{say \"hi\"}");
        assert_eq!(mold_of("%\"a b\""), "%\"a b\"");
        assert_eq!(mold_of("<tag>"), "<tag>");
        assert_eq!(mold_of("#{0a0b}"), "#{0A0B}");
    }

    #[test]
    fn arrays_and_paths() {
        assert_eq!(mold_of("[a [b] (c) d/e :f/g 'h/i]"), "[a [b] (c) d/e :f/g 'h/i]");
        assert_eq!(mold_of("[\n    a\n]"), "[\n    a\n]");
        assert_eq!(mold_of("form [1 \"a\" [b c]]"), "\"1 a b c\"");
    }

    #[test]
    fn cycles_are_cut() {
        assert_eq!(mold_of("a: copy [1] append/only a a a"), "[1 [...]]");
    }

    #[test]
    fn objects() {
        assert_eq!(mold_of("make object! [a: 1 b: 'c]"), "make object! [\n    a: 1\n    b: 'c\n]");
        assert_eq!(mold_of("form make object! [a: 1]"), "\"a: 1\"");
    }
}
