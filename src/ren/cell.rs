// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/cell.rs

// The fixed-size value record. A cell carries a kind tag, a few
// flags, a binding (the "extra" slot) and a payload. All values the
// evaluator touches are cells; cells are plain data and copy freely.

// <>

use super::series::SeriesId;
use super::symtab::Sym;
use super::types::{date::Date, money::Money, tuple::Tuple};

/// Creates an enum along with a `TryFrom<u8>` implementation, so that
/// stored discriminants may be turned back into variants
macro_rules! enum_and_tryfrom {
    ($(#[$meta:meta])* $vis:vis enum $name:ident {
        $($(#[$vmeta:meta])* $vname:ident $(= $val:expr)?,)*
    }) => {
        $(#[$meta])*
        $vis enum $name {
            $($(#[$vmeta])* $vname $(= $val)?,)*
        }

        impl std::convert::TryFrom<u8> for $name {
            type Error = ();

            #[inline(always)]
            fn try_from(v: u8) -> Result<Self, ()> {
                match v {
                    $(x if x == $name::$vname as u8 => Ok($name::$vname),)*
                    _ => Err(()),
                }
            }
        }
    }
}

pub(crate) use enum_and_tryfrom;

/// Asserts the kind of a cell; reading a payload through the wrong
/// kind is an interpreter bug
macro_rules! cellck {
    ( $var:expr ; $($typ:ident)|+ ) => {
        assert!(
            matches!($var.kind, $(crate::ren::cell::Kind::$typ)|+),
            "cell kind {:?} where {} expected",
            $var.kind,
            stringify!($($typ)|+)
        );
    };
}

pub(crate) use cellck;

enum_and_tryfrom! {
    /// Every kind of value a cell may hold. The discriminant doubles
    /// as the bit position in a typeset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[repr(u8)]
    pub enum Kind {
        /// Terminator of every array; never a user-visible value
        End = 0,
        Void,
        Blank,
        Logic,
        Integer,
        Decimal,
        Percent,
        Money,
        Char,
        Pair,
        Tuple,
        Time,
        Date,
        Word,
        SetWord,
        GetWord,
        LitWord,
        Refinement,
        Issue,
        Binary,
        String,
        File,
        Email,
        Url,
        Tag,
        Bitset,
        Image,
        Vector,
        Block,
        Group,
        Path,
        SetPath,
        GetPath,
        LitPath,
        Map,
        Datatype,
        Typeset,
        Gob,
        Event,
        Handle,
        Struct,
        Library,
        Object,
        Module,
        Error,
        Port,
        Frame,
        Function,
        Varargs,
    }
}

pub const KIND_COUNT: usize = Kind::Varargs as usize + 1;

const KIND_NAMES: [&str; KIND_COUNT] = [
    "end!", "void!", "blank!", "logic!", "integer!", "decimal!", "percent!", "money!", "char!",
    "pair!", "tuple!", "time!", "date!", "word!", "set-word!", "get-word!", "lit-word!",
    "refinement!", "issue!", "binary!", "string!", "file!", "email!", "url!", "tag!", "bitset!",
    "image!", "vector!", "block!", "group!", "path!", "set-path!", "get-path!", "lit-path!",
    "map!", "datatype!", "typeset!", "gob!", "event!", "handle!", "struct!", "library!",
    "object!", "module!", "error!", "port!", "frame!", "function!", "varargs!",
];

impl Kind {
    /// Datatype name, with the trailing `!`
    pub fn name(self) -> &'static str {
        KIND_NAMES[self as usize]
    }

    /// Name without the `!`, as used by type predicates
    pub fn stem(self) -> &'static str {
        let nm = self.name();
        &nm[..nm.len() - 1]
    }

    pub fn from_name(name: &str) -> Option<Kind> {
        KIND_NAMES
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .and_then(|i| Kind::try_from(i as u8).ok())
    }

    pub fn all() -> impl Iterator<Item = Kind> {
        (1..KIND_COUNT as u8).filter_map(|i| Kind::try_from(i).ok())
    }

    #[inline(always)]
    pub const fn bit(self) -> u64 {
        1u64 << (self as u8)
    }

    pub fn is_word(self) -> bool {
        TS_ANY_WORD & self.bit() != 0
    }

    pub fn is_string(self) -> bool {
        TS_ANY_STRING & self.bit() != 0
    }

    pub fn is_array(self) -> bool {
        TS_ANY_ARRAY & self.bit() != 0
    }

    pub fn is_path(self) -> bool {
        TS_ANY_PATH & self.bit() != 0
    }

    pub fn is_series(self) -> bool {
        TS_ANY_SERIES & self.bit() != 0
    }

    pub fn is_context(self) -> bool {
        TS_ANY_CONTEXT & self.bit() != 0
    }

    pub fn is_number(self) -> bool {
        TS_ANY_NUMBER & self.bit() != 0
    }

    pub fn is_scalar(self) -> bool {
        TS_ANY_SCALAR & self.bit() != 0
    }

    /// Kinds whose payload is a series plus an index
    pub fn has_series(self) -> bool {
        self.is_series() || matches!(self, Kind::Bitset | Kind::Map)
    }
}

const fn bits(kinds: &[Kind]) -> u64 {
    let mut acc = 0;
    let mut i = 0;
    while i < kinds.len() {
        acc |= kinds[i].bit();
        i += 1;
    }
    acc
}

pub const TS_ANY_WORD: u64 = bits(&[
    Kind::Word,
    Kind::SetWord,
    Kind::GetWord,
    Kind::LitWord,
    Kind::Refinement,
    Kind::Issue,
]);
pub const TS_ANY_STRING: u64 = bits(&[Kind::String, Kind::File, Kind::Email, Kind::Url, Kind::Tag]);
pub const TS_ANY_PATH: u64 = bits(&[Kind::Path, Kind::SetPath, Kind::GetPath, Kind::LitPath]);
pub const TS_ANY_ARRAY: u64 = TS_ANY_PATH | bits(&[Kind::Block, Kind::Group]);
pub const TS_ANY_SERIES: u64 =
    TS_ANY_STRING | TS_ANY_ARRAY | bits(&[Kind::Binary, Kind::Image, Kind::Vector]);
pub const TS_ANY_CONTEXT: u64 =
    bits(&[Kind::Object, Kind::Module, Kind::Error, Kind::Port, Kind::Frame]);
pub const TS_ANY_NUMBER: u64 = bits(&[Kind::Integer, Kind::Decimal, Kind::Percent, Kind::Money]);
pub const TS_ANY_SCALAR: u64 =
    TS_ANY_NUMBER | bits(&[Kind::Char, Kind::Pair, Kind::Tuple, Kind::Time, Kind::Date]);
/// Every kind except void and the terminator
pub const TS_ANY_VALUE: u64 = ((1u64 << KIND_COUNT) - 1) & !bits(&[Kind::End, Kind::Void]);
pub const TS_OPT_ANY_VALUE: u64 = TS_ANY_VALUE | Kind::Void.bit();

/// Named typesets installed in lib, in addition to one word per kind
pub const TYPESET_NAMES: &[(&str, u64)] = &[
    ("any-value!", TS_ANY_VALUE),
    ("any-word!", TS_ANY_WORD),
    ("any-string!", TS_ANY_STRING),
    ("any-path!", TS_ANY_PATH),
    ("any-array!", TS_ANY_ARRAY),
    ("any-series!", TS_ANY_SERIES),
    ("any-context!", TS_ANY_CONTEXT),
    ("any-number!", TS_ANY_NUMBER),
    ("any-scalar!", TS_ANY_SCALAR),
];

/// Per-cell header flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellFlags(u8);

impl CellFlags {
    /// Variable may not be assigned (on varlist slots)
    pub const PROTECTED: u8 = 1 << 0;
    /// A newline preceded this value in source
    pub const NEWLINE: u8 = 1 << 1;
    /// Function takes its first argument from the left
    pub const ENFIX: u8 = 1 << 2;
    /// Argument was taken literally from the callsite
    pub const UNEVALUATED: u8 = 1 << 3;

    #[inline(always)]
    pub fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    #[inline(always)]
    pub fn set(&mut self, flag: u8) {
        self.0 |= flag
    }

    #[inline(always)]
    pub fn clear(&mut self, flag: u8) {
        self.0 &= !flag
    }
}

/// The binding slot of a cell.
///
/// Words and arrays are either unbound, specifically bound to a
/// context varlist, or relatively bound to a function paramlist;
/// relative cells need a specifier (a frame varlist) when read.
/// Function cells use `Specific` to name the frame a definitional
/// RETURN or LEAVE belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    Unbound,
    Specific(SeriesId),
    Relative(SeriesId),
}

/// How a parameter is fulfilled at a callsite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamClass {
    /// Evaluate a full expression, enfix lookahead included
    Normal,
    /// Evaluate without right-hand enfix lookahead
    Tight,
    /// Take the next cell literally
    HardQuote,
    /// Take the next cell literally unless it is a group or get-form
    SoftQuote,
    /// Logic switch, set by naming it in the call path
    Refinement,
    /// Never filled by the callsite
    Local,
    /// Slot holding the definitional RETURN
    Return,
    /// Slot holding the definitional LEAVE
    Leave,
    /// Receives a VARARGS! fed lazily from the callsite
    Variadic,
}

impl ParamClass {
    /// Whether the callsite supplies a value for this class
    pub fn is_gathered(self) -> bool {
        matches!(
            self,
            ParamClass::Normal
                | ParamClass::Tight
                | ParamClass::HardQuote
                | ParamClass::SoftQuote
                | ParamClass::Variadic
        )
    }
}

/// Payload of a cell, discriminated independently of the kind so
/// that families of kinds may share a shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    None,
    Logic(bool),
    Integer(i64),
    /// Decimal and percent
    Decimal(f64),
    Money(Money),
    Char(u32),
    Pair(f32, f32),
    Tuple(Tuple),
    /// Nanoseconds
    Time(i64),
    Date(Date),
    /// Any-word; `index` selects the slot when bound
    Word { spelling: Sym, index: u32 },
    /// Any-series, bitset and map
    Series { series: SeriesId, index: u32 },
    /// Any-context; frames also carry the phase they run
    Context { varlist: SeriesId, phase: Option<SeriesId> },
    Function { paramlist: SeriesId, body_holder: SeriesId },
    Datatype(Kind),
    /// Typesets; parameter and context keys also carry a spelling and
    /// a parameter class
    Typeset { bits: u64, spelling: Option<Sym>, class: ParamClass },
    Varargs { varlist: SeriesId, param: u32 },
    Handle(usize),
}

/// The value record
#[derive(Debug, Clone, Copy)]
pub struct Cell {
    pub kind: Kind,
    pub flags: CellFlags,
    pub binding: Binding,
    pub payload: Payload,
}

impl Cell {
    pub const END: Cell = Cell::inert(Kind::End);
    pub const VOID: Cell = Cell::inert(Kind::Void);
    pub const BLANK: Cell = Cell::inert(Kind::Blank);

    const fn inert(kind: Kind) -> Cell {
        Cell {
            kind,
            flags: CellFlags(0),
            binding: Binding::Unbound,
            payload: Payload::None,
        }
    }

    #[inline(always)]
    fn with(kind: Kind, payload: Payload) -> Cell {
        Cell {
            kind,
            flags: CellFlags::default(),
            binding: Binding::Unbound,
            payload,
        }
    }

    pub fn logic(b: bool) -> Cell {
        Cell::with(Kind::Logic, Payload::Logic(b))
    }

    pub fn integer(i: i64) -> Cell {
        Cell::with(Kind::Integer, Payload::Integer(i))
    }

    pub fn decimal(d: f64) -> Cell {
        Cell::with(Kind::Decimal, Payload::Decimal(d))
    }

    /// Percents are stored as their fraction: 50% is 0.5
    pub fn percent(d: f64) -> Cell {
        Cell::with(Kind::Percent, Payload::Decimal(d))
    }

    pub fn money(m: Money) -> Cell {
        Cell::with(Kind::Money, Payload::Money(m))
    }

    pub fn char(c: u32) -> Cell {
        Cell::with(Kind::Char, Payload::Char(c))
    }

    pub fn pair(x: f32, y: f32) -> Cell {
        Cell::with(Kind::Pair, Payload::Pair(x, y))
    }

    pub fn tuple(t: Tuple) -> Cell {
        Cell::with(Kind::Tuple, Payload::Tuple(t))
    }

    pub fn time(nanos: i64) -> Cell {
        Cell::with(Kind::Time, Payload::Time(nanos))
    }

    pub fn date(d: Date) -> Cell {
        Cell::with(Kind::Date, Payload::Date(d))
    }

    /// Unbound word of any word kind
    pub fn word(kind: Kind, spelling: Sym) -> Cell {
        debug_assert!(kind.is_word());
        Cell::with(kind, Payload::Word { spelling, index: 0 })
    }

    pub fn bound_word(kind: Kind, spelling: Sym, binding: Binding, index: u32) -> Cell {
        let mut out = Cell::word(kind, spelling);
        out.binding = binding;
        out.payload = Payload::Word { spelling, index };
        out
    }

    pub fn series(kind: Kind, series: SeriesId, index: u32) -> Cell {
        debug_assert!(kind.has_series());
        Cell::with(kind, Payload::Series { series, index })
    }

    pub fn context(kind: Kind, varlist: SeriesId) -> Cell {
        debug_assert!(kind.is_context());
        Cell::with(kind, Payload::Context { varlist, phase: None })
    }

    pub fn frame(varlist: SeriesId, phase: SeriesId) -> Cell {
        Cell::with(
            Kind::Frame,
            Payload::Context {
                varlist,
                phase: Some(phase),
            },
        )
    }

    pub fn function(paramlist: SeriesId, body_holder: SeriesId) -> Cell {
        Cell::with(
            Kind::Function,
            Payload::Function {
                paramlist,
                body_holder,
            },
        )
    }

    pub fn datatype(kind: Kind) -> Cell {
        Cell::with(Kind::Datatype, Payload::Datatype(kind))
    }

    pub fn typeset(bits: u64) -> Cell {
        Cell::with(
            Kind::Typeset,
            Payload::Typeset {
                bits,
                spelling: None,
                class: ParamClass::Normal,
            },
        )
    }

    /// A keylist or paramlist entry
    pub fn key(spelling: Sym, class: ParamClass, bits: u64) -> Cell {
        Cell::with(
            Kind::Typeset,
            Payload::Typeset {
                bits,
                spelling: Some(spelling),
                class,
            },
        )
    }

    pub fn varargs(varlist: SeriesId, param: u32) -> Cell {
        Cell::with(Kind::Varargs, Payload::Varargs { varlist, param })
    }

    pub fn handle(h: usize) -> Cell {
        Cell::with(Kind::Handle, Payload::Handle(h))
    }

    // predicates

    #[inline(always)]
    pub fn is_end(&self) -> bool {
        self.kind == Kind::End
    }

    #[inline(always)]
    pub fn is_void(&self) -> bool {
        self.kind == Kind::Void
    }

    #[inline(always)]
    pub fn is_blank(&self) -> bool {
        self.kind == Kind::Blank
    }

    #[inline(always)]
    pub fn is_function(&self) -> bool {
        self.kind == Kind::Function
    }

    pub fn is_enfixed(&self) -> bool {
        self.kind == Kind::Function && self.flags.has(CellFlags::ENFIX)
    }

    /// Conditional truth: only FALSE and BLANK are falsey. Callers
    /// reject void before asking.
    pub fn is_truthy(&self) -> bool {
        match self.kind {
            Kind::Blank => false,
            Kind::Logic => self.logic_val(),
            _ => true,
        }
    }

    // accessors; each asserts the kind family it reads

    pub fn logic_val(&self) -> bool {
        match self.payload {
            Payload::Logic(b) => b,
            _ => self.mismatch("logic"),
        }
    }

    pub fn int(&self) -> i64 {
        match self.payload {
            Payload::Integer(i) => i,
            _ => self.mismatch("integer"),
        }
    }

    pub fn dec(&self) -> f64 {
        match self.payload {
            Payload::Decimal(d) => d,
            _ => self.mismatch("decimal"),
        }
    }

    pub fn money_val(&self) -> Money {
        match self.payload {
            Payload::Money(m) => m,
            _ => self.mismatch("money"),
        }
    }

    pub fn chr(&self) -> u32 {
        match self.payload {
            Payload::Char(c) => c,
            _ => self.mismatch("char"),
        }
    }

    pub fn pair_val(&self) -> (f32, f32) {
        match self.payload {
            Payload::Pair(x, y) => (x, y),
            _ => self.mismatch("pair"),
        }
    }

    pub fn tuple_val(&self) -> Tuple {
        match self.payload {
            Payload::Tuple(t) => t,
            _ => self.mismatch("tuple"),
        }
    }

    pub fn time_val(&self) -> i64 {
        match self.payload {
            Payload::Time(t) => t,
            _ => self.mismatch("time"),
        }
    }

    pub fn date_val(&self) -> Date {
        match self.payload {
            Payload::Date(d) => d,
            _ => self.mismatch("date"),
        }
    }

    pub fn spelling(&self) -> Sym {
        match self.payload {
            Payload::Word { spelling, .. } => spelling,
            _ => self.mismatch("word"),
        }
    }

    pub fn word_index(&self) -> u32 {
        match self.payload {
            Payload::Word { index, .. } => index,
            _ => self.mismatch("word"),
        }
    }

    pub fn series_id(&self) -> SeriesId {
        match self.payload {
            Payload::Series { series, .. } => series,
            _ => self.mismatch("series"),
        }
    }

    pub fn index(&self) -> u32 {
        match self.payload {
            Payload::Series { index, .. } => index,
            _ => self.mismatch("series"),
        }
    }

    pub fn varlist(&self) -> SeriesId {
        match self.payload {
            Payload::Context { varlist, .. } => varlist,
            _ => self.mismatch("context"),
        }
    }

    pub fn phase(&self) -> Option<SeriesId> {
        match self.payload {
            Payload::Context { phase, .. } => phase,
            _ => self.mismatch("context"),
        }
    }

    pub fn paramlist(&self) -> SeriesId {
        match self.payload {
            Payload::Function { paramlist, .. } => paramlist,
            _ => self.mismatch("function"),
        }
    }

    pub fn body_holder(&self) -> SeriesId {
        match self.payload {
            Payload::Function { body_holder, .. } => body_holder,
            _ => self.mismatch("function"),
        }
    }

    pub fn datatype_val(&self) -> Kind {
        match self.payload {
            Payload::Datatype(k) => k,
            _ => self.mismatch("datatype"),
        }
    }

    pub fn typeset_bits(&self) -> u64 {
        match self.payload {
            Payload::Typeset { bits, .. } => bits,
            _ => self.mismatch("typeset"),
        }
    }

    pub fn key_spelling(&self) -> Sym {
        match self.payload {
            Payload::Typeset {
                spelling: Some(s), ..
            } => s,
            _ => self.mismatch("key"),
        }
    }

    pub fn key_class(&self) -> ParamClass {
        match self.payload {
            Payload::Typeset { class, .. } => class,
            _ => self.mismatch("key"),
        }
    }

    /// Whether a key admits a value of the given kind
    pub fn key_allows(&self, kind: Kind) -> bool {
        self.typeset_bits() & kind.bit() != 0
    }

    #[cold]
    fn mismatch(&self, want: &str) -> ! {
        panic!("read {} payload from {:?} cell", want, self.kind)
    }

    // modifiers returning an adjusted copy

    pub fn with_index(mut self, index: u32) -> Cell {
        if let Payload::Series { series, .. } = self.payload {
            self.payload = Payload::Series { series, index };
        }
        self
    }

    pub fn with_kind(mut self, kind: Kind) -> Cell {
        self.kind = kind;
        self
    }

    pub fn with_binding(mut self, binding: Binding) -> Cell {
        self.binding = binding;
        self
    }

    pub fn with_class(mut self, class: ParamClass) -> Cell {
        if let Payload::Typeset { bits, spelling, .. } = self.payload {
            self.payload = Payload::Typeset {
                bits,
                spelling,
                class,
            };
        }
        self
    }

    /// Copy without the per-slot flags (newline, unevaluated) that
    /// describe a position rather than a value
    pub fn unflagged(mut self) -> Cell {
        self.flags.clear(CellFlags::NEWLINE | CellFlags::UNEVALUATED);
        self
    }

    /// Series this cell keeps alive directly, for the collector
    pub fn referenced(&self, mut visit: impl FnMut(SeriesId)) {
        match self.binding {
            Binding::Specific(s) | Binding::Relative(s) => visit(s),
            Binding::Unbound => {}
        }
        match self.payload {
            Payload::Series { series, .. } => visit(series),
            Payload::Context { varlist, phase } => {
                visit(varlist);
                if let Some(p) = phase {
                    visit(p)
                }
            }
            Payload::Function {
                paramlist,
                body_holder,
            } => {
                visit(paramlist);
                visit(body_holder);
            }
            Payload::Varargs { varlist, .. } => visit(varlist),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrip() {
        for k in Kind::all() {
            assert_eq!(Kind::try_from(k as u8), Ok(k));
            assert_eq!(Kind::from_name(k.name()), Some(k));
        }
        assert_eq!(Kind::try_from(KIND_COUNT as u8), Err(()));
    }

    #[test]
    fn typesets() {
        assert!(Kind::Block.is_array());
        assert!(Kind::LitPath.is_path());
        assert!(Kind::Tag.is_series());
        assert!(!Kind::Integer.is_series());
        assert!(Kind::Money.is_number());
        assert_eq!(TS_ANY_VALUE & Kind::Void.bit(), 0);
        assert_ne!(TS_OPT_ANY_VALUE & Kind::Void.bit(), 0);
        assert_ne!(TS_ANY_VALUE & Kind::Varargs.bit(), 0);
    }

    #[test]
    fn truthiness() {
        assert!(!Cell::BLANK.is_truthy());
        assert!(!Cell::logic(false).is_truthy());
        assert!(Cell::integer(0).is_truthy());
    }

    #[test]
    #[should_panic]
    fn wrong_read() {
        Cell::integer(1).dec();
    }
}
