// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/error.rs

// Error catalog, the failure signal threaded through the evaluator,
// ERROR! context construction and the error type seen by embedders.

// <>

use std::fmt;

use super::cell::{Cell, Kind};
use super::interp::Interp;
use super::series::SeriesId;
use super::symtab::*;

/// Error categories, each with its base code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Syntax,
    Script,
    Math,
    Access,
    Resource,
    User,
    Internal,
}

impl Category {
    pub fn base(self) -> i64 {
        match self {
            Category::Syntax => 200,
            Category::Script => 300,
            Category::Math => 400,
            Category::Access => 500,
            Category::Resource => 600,
            Category::User => 800,
            Category::Internal => 900,
        }
    }

    pub fn sym(self) -> Sym {
        match self {
            Category::Syntax => SYM_SYNTAX,
            Category::Script => SYM_SCRIPT,
            Category::Math => SYM_MATH,
            Category::Access => SYM_ACCESS,
            Category::Resource => SYM_RESOURCE,
            Category::User => SYM_USER,
            Category::Internal => SYM_INTERNAL,
        }
    }

    /// Title used in error reports
    pub fn title(self) -> &'static str {
        match self {
            Category::Syntax => "Syntax",
            Category::Script => "Script",
            Category::Math => "Math",
            Category::Access => "Access",
            Category::Resource => "Resource",
            Category::User => "User",
            Category::Internal => "Internal",
        }
    }

    pub fn from_sym(sym: Sym) -> Option<Category> {
        Some(match sym {
            SYM_SYNTAX => Category::Syntax,
            SYM_SCRIPT => Category::Script,
            SYM_MATH => Category::Math,
            SYM_ACCESS => Category::Access,
            SYM_RESOURCE => Category::Resource,
            SYM_USER => Category::User,
            SYM_INTERNAL => Category::Internal,
            _ => return None,
        })
    }
}

/// Builds the `ErrId` enum and its static table from a list of
/// categories holding `Variant "id" "message template"` entries
macro_rules! error_catalog {
    ( $( $cat:ident { $( $var:ident $id:literal $msg:literal, )+ } )+ ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum ErrId {
            $( $( $var, )+ )+
        }

        const CATALOG: &[(ErrId, Category, &str, &str)] = &[
            $( $( (ErrId::$var, Category::$cat, $id, $msg), )+ )+
        ];
    };
}

error_catalog! {
    Syntax {
        Invalid "invalid" "invalid :arg1 -- :arg2",
        Missing "missing" "missing :arg2 at :arg1",
    }
    Script {
        NoValue "no-value" ":arg1 has no value",
        NeedValue "need-value" ":arg1 needs a value",
        NotBound "not-bound" ":arg1 word is not bound to a context",
        ExpectArg "expect-arg" ":arg1 does not allow :arg3 for its :arg2 argument",
        ArgRequired "arg-required" ":arg1 requires :arg2 argument to not be void",
        Needs "needs" ":arg1 is missing its :arg2 argument",
        BadRefine "bad-refine" "incompatible or invalid refinement: :arg1",
        BadReturnType "bad-return-type" "return type :arg2 not allowed by :arg1",
        InvalidArg "invalid-arg" "invalid argument: :arg1",
        InvalidType "invalid-type" ":arg1 type is not allowed here",
        InvalidPart "invalid-part" "invalid /part count: :arg1",
        InvalidCompare "invalid-compare" "cannot compare :arg1 with :arg2",
        NotFound "not-found" ":arg1 not found",
        LockedSeries "locked-series" "locked series or value cannot be modified",
        PastEnd "past-end" "out of range or past end",
        BadPathPick "bad-path-pick" "cannot pick :arg1",
        BadPathSet "bad-path-set" "cannot set :arg1",
        BadMake "bad-make" "cannot MAKE/TO :arg1 from: :arg2",
        CannotUse "cannot-use" "cannot use :arg1 on :arg2 value",
        InvalidExit "invalid-exit" "exit not in a function",
        ReturnArchetype "return-archetype" "RETURN or LEAVE called with no function frame",
        ApplyNonFunction "apply-non-function" ":arg1 needs to be a function for APPLY",
        VarargsNoStack "varargs-no-stack" "call originating VARARGS! has finished running",
        NotRelated "not-related" ":arg1 is not related to :arg2",
        StackOverflow "stack-overflow" "stack overflow",
        NoCatch "no-catch" "missing CATCH for THROW of :arg1",
        BadFuncDef "bad-func-def" "invalid function definition: :arg1",
        DifferentUnderlying "different-underlying" ":arg1 frame does not belong to :arg2",
        TypeLimit "type-limit" ":arg1 overflow or underflow",
        NoArg "no-arg" ":arg1 is missing its left hand argument",
    }
    Math {
        ZeroDivide "zero-divide" "attempt to divide by zero",
        Overflow "overflow" "math or number overflow",
        Positive "positive" "positive number required",
        OutOfRange "out-of-range" "value out of range: :arg1",
    }
    Access {
        Protected "protected" "protected variable - cannot modify: :arg1",
        NotOpen "not-open" "port is not open: :arg1",
        CannotOpen "cannot-open" "cannot open: :arg1 reason: :arg2",
        WriteError "write-error" "write failed: :arg1 reason: :arg2",
    }
    Resource {
        NoMemory "no-memory" "not enough memory: :arg1 series",
    }
    User {
        User "user" ":arg1",
    }
    Internal {
        NotDone "not-done" "reserved for future use (or not yet implemented)",
    }
}

impl ErrId {
    fn entry(self) -> &'static (ErrId, Category, &'static str, &'static str) {
        // the table holds every variant
        CATALOG.iter().find(|e| e.0 == self).unwrap_or(&CATALOG[0])
    }

    pub fn category(self) -> Category {
        self.entry().1
    }

    pub fn name(self) -> &'static str {
        self.entry().2
    }

    pub fn template(self) -> &'static str {
        self.entry().3
    }

    /// Category base plus the ordinal within the category
    pub fn code(self) -> i64 {
        let cat = self.category();
        let ordinal = CATALOG
            .iter()
            .filter(|e| e.1 == cat)
            .position(|e| e.0 == self)
            .unwrap_or(0);
        cat.base() + ordinal as i64
    }

    pub fn from_name(cat: Category, name: &str) -> Option<ErrId> {
        CATALOG
            .iter()
            .find(|e| e.1 == cat && e.2 == name)
            .map(|e| e.0)
    }
}

/// Why an evaluation stopped short
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    /// An ERROR! value was raised
    Error(Cell),
    /// A throw is staged in the interpreter's `thrown` slot
    Thrown,
    /// Cancellation; only unhaltable traps see it
    Halt,
}

/// Failure seen by code embedding the interpreter
#[derive(Clone, PartialEq, Eq)]
pub enum RenErr {
    Error {
        id: String,
        category: String,
        message: String,
        near: String,
    },
    Halt,
    Quit(i32),
    UncaughtThrow(String),
    Load(String),
}

impl RenErr {
    /// The error id, for errors raised by script
    pub fn id(&self) -> Option<&str> {
        match self {
            RenErr::Error { id, .. } => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for RenErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenErr::Error {
                category,
                message,
                near,
                ..
            } => {
                write!(f, "** {} error: {}", category, message)?;
                if !near.is_empty() {
                    write!(f, "\n** Near: {}", near)?;
                }
                Ok(())
            }
            RenErr::Halt => write!(f, "** Halted"),
            RenErr::Quit(code) => write!(f, "** Quit with status {}", code),
            RenErr::UncaughtThrow(label) => write!(f, "** No CATCH for THROW: {}", label),
            RenErr::Load(why) => write!(f, "** Cannot load script: {}", why),
        }
    }
}

impl fmt::Debug for RenErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenErr::Error { id, .. } => write!(f, "RenErr({}: {})", id, self),
            _ => write!(f, "RenErr({})", self),
        }
    }
}

impl std::error::Error for RenErr {}

/// Slots of an ERROR! context, in key order
pub const ERROR_KEYS: [Sym; 11] = [
    SYM_CODE, SYM_TYPE, SYM_ID, SYM_MESSAGE, SYM_NEAR, SYM_WHERE, SYM_FILE, SYM_LINE, SYM_ARG1,
    SYM_ARG2, SYM_ARG3,
];

pub const ERR_CODE: u32 = 1;
pub const ERR_TYPE: u32 = 2;
pub const ERR_ID: u32 = 3;
pub const ERR_MESSAGE: u32 = 4;
pub const ERR_NEAR: u32 = 5;
pub const ERR_WHERE: u32 = 6;
pub const ERR_FILE: u32 = 7;
pub const ERR_LINE: u32 = 8;
pub const ERR_ARG1: u32 = 9;

impl Interp {
    /// Creates an ERROR! for a catalog entry and wraps it for raising
    pub fn error(&mut self, id: ErrId, args: &[Cell]) -> Fail {
        match self.make_error(id, args) {
            Ok(err) => Fail::Error(err),
            Err(fail) => fail,
        }
    }

    /// Error for an action a datatype does not implement
    pub fn unhandled(&mut self, verb: Sym, value: Cell) -> Fail {
        let verb = Cell::word(Kind::Word, verb);
        let kind = Cell::datatype(value.kind);
        self.error(ErrId::CannotUse, &[verb, kind])
    }

    /// A user error carrying the given message
    pub fn user_error(&mut self, message: &str) -> Fail {
        match self.string_cell(Kind::String, message) {
            Ok(msg) => self.error(ErrId::User, &[msg]),
            Err(fail) => fail,
        }
    }

    /// Allocates a fresh error context for `id`
    pub fn make_error(&mut self, id: ErrId, args: &[Cell]) -> Result<Cell, Fail> {
        let varlist = self.error_context()?;
        let cat = id.category();

        let template = self.string_cell(Kind::String, id.template())?;
        let id_word = self.intern(id.name());

        self.ctx_set(varlist, ERR_CODE, Cell::integer(id.code()));
        self.ctx_set(varlist, ERR_TYPE, Cell::word(Kind::Word, cat.sym()));
        self.ctx_set(varlist, ERR_ID, Cell::word(Kind::Word, id_word));
        self.ctx_set(varlist, ERR_MESSAGE, template);
        for (n, arg) in args.iter().take(3).enumerate() {
            self.ctx_set(varlist, ERR_ARG1 + n as u32, arg.unflagged());
        }
        self.locate_error(varlist)?;

        if cfg!(feature = "stkdbg") {
            log::debug!("raising {} error {}", cat.title(), id.name());
        }

        Ok(Cell::context(Kind::Error, varlist))
    }

    /// Fresh, blank error context with the standard keys
    pub(crate) fn error_context(&mut self) -> Result<SeriesId, Fail> {
        let varlist = self.make_context(Kind::Error, &ERROR_KEYS)?;
        for n in 1..=ERROR_KEYS.len() as u32 {
            self.ctx_set(varlist, n, Cell::BLANK);
        }
        Ok(varlist)
    }

    /// Fills NEAR, WHERE, FILE and LINE from the running evaluation
    pub(crate) fn locate_error(&mut self, varlist: SeriesId) -> Result<(), Fail> {
        let near = self.stack.near_cells(&self.pool);
        if !near.is_empty() {
            let arr = self.make_array(&near)?;
            self.ctx_set(varlist, ERR_NEAR, Cell::series(Kind::Block, arr, 0));
        }

        let labels: Vec<Cell> = self
            .stack
            .frames
            .iter()
            .rev()
            .filter_map(|f| f.label)
            .map(|s| Cell::word(Kind::Word, s))
            .collect();
        if !labels.is_empty() {
            let arr = self.make_array(&labels)?;
            self.ctx_set(varlist, ERR_WHERE, Cell::series(Kind::Block, arr, 0));
        }

        if let Some((file, line)) = self.stack.file_line(&self.pool) {
            self.ctx_set(varlist, ERR_FILE, Cell::word(Kind::Word, file));
            self.ctx_set(varlist, ERR_LINE, Cell::integer(line as i64));
        }
        Ok(())
    }

    /// Catalog entry behind an ERROR! value, when it has one
    pub fn error_id(&self, err: Cell) -> Option<ErrId> {
        let varlist = err.varlist();
        let ty = self.ctx_get(varlist, ERR_TYPE);
        let id = self.ctx_get(varlist, ERR_ID);
        if !ty.kind.is_word() || !id.kind.is_word() {
            return None;
        }
        let cat = Category::from_sym(self.syms.canon(ty.spelling()))?;
        ErrId::from_name(cat, self.syms.spelling(id.spelling()))
    }

    /// Id word of an ERROR! value, as text
    pub fn error_id_name(&self, err: Cell) -> String {
        let id = self.ctx_get(err.varlist(), ERR_ID);
        if id.kind.is_word() {
            self.syms.spelling(id.spelling()).to_string()
        } else {
            String::new()
        }
    }

    /// Message with its `:argN` slots filled in
    pub fn error_message(&mut self, err: Cell) -> String {
        let varlist = err.varlist();
        let msg = self.ctx_get(varlist, ERR_MESSAGE);
        let template = match msg.kind {
            Kind::String => self.pool.get(msg.series_id()).text_from(msg.index() as usize),
            Kind::Block => self.form(msg),
            _ => return String::new(),
        };

        let mut out = template;
        for n in 0..3u32 {
            let slot = format!(":arg{}", n + 1);
            if out.contains(&slot) {
                let arg = self.ctx_get(varlist, ERR_ARG1 + n);
                let text = match arg.kind {
                    k if k.is_word() || k.is_string() || k == Kind::Datatype => self.form(arg),
                    _ => self.mold(arg),
                };
                out = out.replace(&slot, &text);
            }
        }
        out
    }

    /// Converts an escaped failure into the embedder's error type
    pub fn to_ren_err(&mut self, fail: Fail) -> RenErr {
        match fail {
            Fail::Halt => RenErr::Halt,
            Fail::Thrown => {
                let (label, value) = self.thrown.take().unwrap_or((Cell::BLANK, Cell::VOID));
                if label.is_function() && self.same_function(label, self.archetypes.quit) {
                    let code = match value.kind {
                        Kind::Integer => value.int() as i32,
                        Kind::Void | Kind::Blank => 0,
                        Kind::Logic if value.logic_val() => 0,
                        _ => 1,
                    };
                    RenErr::Quit(code)
                } else {
                    RenErr::UncaughtThrow(self.mold(label))
                }
            }
            Fail::Error(err) => {
                let varlist = err.varlist();
                let ty = self.ctx_get(varlist, ERR_TYPE);
                let category = if ty.kind.is_word() {
                    match Category::from_sym(self.syms.canon(ty.spelling())) {
                        Some(c) => c.title().to_string(),
                        None => self.syms.spelling(ty.spelling()).to_string(),
                    }
                } else {
                    "User".to_string()
                };
                let near = self.ctx_get(varlist, ERR_NEAR);
                let near = if near.kind == Kind::Block {
                    self.mold_only(near)
                } else {
                    String::new()
                };
                RenErr::Error {
                    id: self.error_id_name(err),
                    category,
                    message: self.error_message(err),
                    near,
                }
            }
        }
    }

    /// Multi-line report printed for an uncaught error
    pub fn error_report(&mut self, err: Cell) -> String {
        let varlist = err.varlist();
        let mut out = match self.to_ren_err(Fail::Error(err)) {
            RenErr::Error {
                category, message, ..
            } => format!("** {} error: {}", category, message),
            other => other.to_string(),
        };
        let wher = self.ctx_get(varlist, ERR_WHERE);
        if wher.kind == Kind::Block {
            out.push_str("\n** Where: ");
            out.push_str(&self.mold_only(wher));
        }
        let near = self.ctx_get(varlist, ERR_NEAR);
        if near.kind == Kind::Block {
            out.push_str("\n** Near: ");
            out.push_str(&self.mold_only(near));
        }
        let file = self.ctx_get(varlist, ERR_FILE);
        let line = self.ctx_get(varlist, ERR_LINE);
        if file.kind.is_word() && line.kind == Kind::Integer {
            out.push_str(&format!(
                "\n** File: {}\n** Line: {}",
                self.syms.spelling(file.spelling()),
                line.int()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_category_bases() {
        assert_eq!(ErrId::Invalid.code(), 200);
        assert_eq!(ErrId::Missing.code(), 201);
        assert_eq!(ErrId::NoValue.code(), 300);
        assert_eq!(ErrId::ZeroDivide.code(), 400);
        assert_eq!(ErrId::Protected.code(), 500);
        assert_eq!(ErrId::NoMemory.code(), 600);
        assert_eq!(ErrId::User.code(), 800);
        assert_eq!(ErrId::NotDone.code(), 900);
    }

    #[test]
    fn names_round_trip() {
        for entry in CATALOG {
            assert_eq!(ErrId::from_name(entry.1, entry.2), Some(entry.0));
        }
        assert_eq!(ErrId::ExpectArg.name(), "expect-arg");
        assert_eq!(ErrId::from_name(Category::Math, "expect-arg"), None);
    }

    #[test]
    fn reports() {
        let e = RenErr::Error {
            id: "zero-divide".into(),
            category: "Math".into(),
            message: "attempt to divide by zero".into(),
            near: "1 / 0".into(),
        };
        assert_eq!(
            e.to_string(),
            "** Math error: attempt to divide by zero\n** Near: 1 / 0"
        );
        assert_eq!(e.id(), Some("zero-divide"));
    }
}
