// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/interp.rs

// The interpreter record. Everything a running evaluation touches
// (series pool, symbols, root contexts, stacks, the throw slot and
// the signal flag) lives here and is passed explicitly.

// <>

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::cell::*;
use super::context::BindMode;
use super::error::{ErrId, Fail, RenErr};
use super::eval::{EvalStack, RED_ZONE, STACK_GROWTH};
use super::memmgt::Pool;
use super::natives;
use super::parser;
use super::series::{flag, Buffer, Content, SeriesId};
use super::symtab::{Sym, SymbolTable, SYM_OPTIONS};

/// Mezzanine definitions evaluated into lib at startup
const BOOT_SCRIPT: &str = include_str!("natives/boot.reb");

/// Runtime knobs
#[derive(Debug, Clone)]
pub struct InterpConfig {
    /// Allocations between garbage collections
    pub ballast: usize,
    /// Live series allowed before allocation fails with no-memory
    pub max_series: usize,
    /// Longest a single series may grow, in elements
    pub max_len: usize,
    /// Evaluator ticks between checks of the signal flag
    pub poll_interval: u32,
    /// Deepest frame stack allowed before stack-overflow
    pub max_depth: usize,
    /// Log every evaluation step at trace level
    pub trace: bool,
}

impl Default for InterpConfig {
    fn default() -> Self {
        InterpConfig {
            ballast: 20_000,
            max_series: 4_000_000,
            max_len: 1 << 26,
            poll_interval: 1024,
            max_depth: 200,
            trace: false,
        }
    }
}

/// Cells the evaluator compares throw labels against
#[derive(Debug, Clone, Copy)]
pub struct Archetypes {
    pub return_: Cell,
    pub leave: Cell,
    pub quit: Cell,
    pub break_: Cell,
    pub continue_: Cell,
    pub throw: Cell,
    /// Preallocated, as there is no memory left to make it when needed
    pub nomem: Cell,
}

impl Archetypes {
    fn cells(&self) -> [Cell; 7] {
        [
            self.return_,
            self.leave,
            self.quit,
            self.break_,
            self.continue_,
            self.throw,
            self.nomem,
        ]
    }
}

pub struct Interp {
    pub pool: Pool,
    pub syms: SymbolTable,

    /// Natives, actions and mezzanines
    pub lib: SeriesId,
    /// Where loaded code is bound
    pub user: SeriesId,
    /// The SYSTEM object
    pub system: SeriesId,

    pub config: InterpConfig,

    /// Data stack natives collect values on; a root
    pub ds: Vec<Cell>,
    /// Series natives hold across evaluations; roots
    pub guards: Vec<SeriesId>,
    pub stack: EvalStack,
    /// Staged throw: label and value
    pub thrown: Option<(Cell, Cell)>,
    /// Set from outside to request a halt
    pub signals: Arc<AtomicBool>,
    pub archetypes: Archetypes,
    /// Cells kept alive for the life of the interpreter
    pub roots: Vec<Cell>,

    pub(crate) ticks: u64,
    output: Option<String>,
}

impl Interp {
    /// Creates an interpreter with lib populated and the boot script
    /// evaluated
    pub fn new(config: InterpConfig) -> Result<Interp, RenErr> {
        let placeholder = SeriesId(u32::MAX);
        let mut it = Interp {
            pool: Pool::new(config.ballast, config.max_series),
            syms: SymbolTable::new(2048),
            lib: placeholder,
            user: placeholder,
            system: placeholder,
            config,
            ds: Vec::with_capacity(256),
            guards: Vec::new(),
            stack: EvalStack::new(),
            thrown: None,
            signals: Arc::new(AtomicBool::new(false)),
            archetypes: Archetypes {
                return_: Cell::BLANK,
                leave: Cell::BLANK,
                quit: Cell::BLANK,
                break_: Cell::BLANK,
                continue_: Cell::BLANK,
                throw: Cell::BLANK,
                nomem: Cell::BLANK,
            },
            roots: Vec::new(),
            ticks: 0,
            output: None,
        };

        match it.boot() {
            Ok(()) => {
                log::info!(
                    "interpreter ready: {} symbols, {} live series",
                    it.syms.len(),
                    it.pool.live()
                );
                Ok(it)
            }
            Err(fail) => Err(it.to_ren_err(fail)),
        }
    }

    fn boot(&mut self) -> Result<(), Fail> {
        self.lib = self.make_context(Kind::Module, &[])?;
        self.user = self.make_context(Kind::Module, &[])?;
        self.system = self.make_context(Kind::Object, &[])?;
        self.archetypes.nomem = self.make_error(ErrId::NoMemory, &[])?;

        natives::register(self)?;

        let boot = parser::scan(self, BOOT_SCRIPT, Some("boot"))?;
        let lib = self.lib;
        self.bind_array(boot, 0, lib, BindMode::AddAll, true)?;
        self.guards.push(boot);
        let result = self.do_array(boot, 0, None);
        self.guards.pop();
        result?;

        let system = self.intern("system");
        match self.lib_get(system) {
            Some(sys) if sys.kind == Kind::Object => self.system = sys.varlist(),
            _ => log::warn!("boot script did not define a system object"),
        }
        Ok(())
    }

    // allocation

    /// Checks a series length about to be reached; `None` means the
    /// computation of it overflowed
    pub fn check_len(&mut self, len: Option<usize>) -> Result<usize, Fail> {
        match len {
            Some(n) if n <= self.config.max_len => Ok(n),
            _ => {
                let shown = len.map_or(i64::MAX, |n| i64::try_from(n).unwrap_or(i64::MAX));
                Err(self.error(ErrId::OutOfRange, &[Cell::integer(shown)]))
            }
        }
    }

    /// Allocates an unmanaged series, failing with no-memory when the
    /// pool is exhausted
    pub fn alloc(&mut self, content: Content) -> Result<SeriesId, Fail> {
        match self.pool.alloc(content) {
            Some(id) => Ok(id),
            None if self.archetypes.nomem.kind == Kind::Error => Err(Fail::Error(self.archetypes.nomem)),
            None => Err(Fail::Halt),
        }
    }

    /// Managed array holding copies of `cells`
    pub fn make_array(&mut self, cells: &[Cell]) -> Result<SeriesId, Fail> {
        let id = self.alloc(Content::Array(Buffer::from_slice(cells)))?;
        self.pool.manage(id);
        Ok(id)
    }

    /// Managed string series
    pub fn make_string(&mut self, text: &str) -> Result<SeriesId, Fail> {
        let chars: Vec<u32> = text.chars().map(|c| c as u32).collect();
        let content = if chars.iter().all(|c| *c <= 0xFF) {
            Content::Bytes(Buffer::from_slice(&chars.iter().map(|c| *c as u8).collect::<Vec<u8>>()))
        } else {
            Content::Wide(Buffer::from_slice(&chars))
        };
        let id = self.alloc(content)?;
        self.pool.manage(id);
        Ok(id)
    }

    /// A value of any string kind holding `text`
    pub fn string_cell(&mut self, kind: Kind, text: &str) -> Result<Cell, Fail> {
        let id = self.make_string(text)?;
        Ok(Cell::series(kind, id, 0))
    }

    /// A BINARY! holding `bytes`
    pub fn binary_cell(&mut self, bytes: &[u8]) -> Result<Cell, Fail> {
        let id = self.alloc(Content::Bytes(Buffer::from_slice(bytes)))?;
        self.pool.manage(id);
        Ok(Cell::series(Kind::Binary, id, 0))
    }

    /// Block value over fresh copies of `cells`
    pub fn block_cell(&mut self, cells: &[Cell]) -> Result<Cell, Fail> {
        let id = self.make_array(cells)?;
        Ok(Cell::series(Kind::Block, id, 0))
    }

    /// Text of a string value from its index
    pub fn text_of(&self, cell: Cell) -> String {
        let series = self.pool.get(cell.series_id());
        series.text_from(cell.index() as usize)
    }

    /// Cells of an array value from its index, resolved against the
    /// value's specifier
    pub fn array_values(&mut self, cell: Cell) -> Vec<Cell> {
        let spec = self.specifier_of(cell);
        let cells: Vec<Cell> = {
            let arr = self.pool.get(cell.series_id()).array();
            arr.as_slice().get(cell.index() as usize..).unwrap_or(&[]).to_vec()
        };
        cells.into_iter().map(|c| self.derelativize(c, spec)).collect()
    }

    /// Copies an array from the value's index. Nested series whose
    /// kinds are in `types` are copied too when `deep`. Relative cells
    /// are made specific with `specifier`. The result is managed.
    pub fn copy_array(&mut self, cell: Cell, specifier: Option<SeriesId>, deep: bool, types: u64) -> Result<SeriesId, Fail> {
        let mut copied = HashMap::new();
        self.copy_array_in(cell, specifier, deep, types, &mut copied)
    }

    /// `copied` maps arrays already copied (by series and index) to
    /// their copies, so a block holding itself copies to one holding
    /// its copy
    fn copy_array_in(
        &mut self,
        cell: Cell,
        specifier: Option<SeriesId>,
        deep: bool,
        types: u64,
        copied: &mut HashMap<(SeriesId, u32), SeriesId>,
    ) -> Result<SeriesId, Fail> {
        let cells: Vec<Cell> = {
            let arr = self.pool.get(cell.series_id()).array();
            arr.as_slice().get(cell.index() as usize..).unwrap_or(&[]).to_vec()
        };
        let id = self.alloc(Content::Array(Buffer::with_capacity(cells.len())))?;
        copied.insert((cell.series_id(), cell.index()), id);
        let mark = self.guards.len();
        self.guards.push(id);
        let result = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || {
            for c in cells {
                let mut c = self.derelativize(c, specifier);
                if deep && c.kind.is_series() && types & c.kind.bit() != 0 {
                    c = if c.kind.is_array() {
                        let inner = match copied.get(&(c.series_id(), c.index())) {
                            Some(done) => *done,
                            None => self.copy_array_in(c, specifier, true, types, copied)?,
                        };
                        Cell::series(c.kind, inner, 0).with_binding(c.binding)
                    } else {
                        let mut copy = self.copy_array_or_string(c, false)?;
                        copy.flags = c.flags;
                        copy
                    };
                }
                self.pool.get_mut(id).array_mut().push(c);
            }
            Ok(())
        });
        self.guards.truncate(mark);
        result?;
        self.pool.manage(id);
        Ok(id)
    }

    /// Copy of any series value from its index; arrays deep or shallow
    pub fn copy_array_or_string(&mut self, cell: Cell, deep: bool) -> Result<Cell, Fail> {
        if cell.kind.is_array() {
            let spec = self.specifier_of(cell);
            let types = if deep { TS_ANY_SERIES } else { 0 };
            let id = self.copy_array(cell, spec, deep, types)?;
            let out = Cell::series(cell.kind, id, 0);
            return Ok(out.with_binding(if cell.kind.is_path() { cell.binding } else { Binding::Unbound }));
        }
        let from = cell.index() as usize;
        let content = match &self.pool.get(cell.series_id()).content {
            Content::Bytes(b) => Content::Bytes(Buffer::from_slice(b.as_slice().get(from..).unwrap_or(&[]))),
            Content::Wide(w) => Content::Wide(Buffer::from_slice(w.as_slice().get(from..).unwrap_or(&[]))),
            Content::Array(_) => return Err(self.error(ErrId::InvalidArg, &[cell])),
        };
        let id = self.alloc(content)?;
        self.pool.manage(id);
        Ok(Cell::series(cell.kind, id, 0))
    }

    /// Marks an array and every array inside it frozen
    pub fn freeze_deep(&mut self, array: SeriesId) {
        let mut todo = vec![array];
        while let Some(arr) = todo.pop() {
            let series = self.pool.get_mut(arr);
            if series.has(flag::FROZEN) {
                continue;
            }
            series.set(flag::FROZEN);
            if let Content::Array(b) = &series.content {
                todo.extend(b.as_slice().iter().filter(|c| c.kind.has_series()).map(|c| c.series_id()));
            }
        }
    }

    /// Fails unless the series of a value may be modified
    pub fn check_mutable(&mut self, cell: Cell) -> Result<(), Fail> {
        if self.pool.get(cell.series_id()).is_read_only() {
            return Err(self.error(ErrId::LockedSeries, &[cell]));
        }
        Ok(())
    }

    // symbols

    pub fn intern(&mut self, name: &str) -> Sym {
        self.syms.get_id(name)
    }

    pub fn spelling(&self, sym: Sym) -> &str {
        self.syms.spelling(sym)
    }

    // loading

    /// Scans source text without binding or freezing it
    pub fn transcode_values(&mut self, text: &str) -> Result<Vec<Cell>, Fail> {
        let arr = parser::scan(self, text, None)?;
        Ok(self.pool.get(arr).array().as_slice().to_vec())
    }

    /// Scans source text, binds it into user and freezes it
    pub fn load(&mut self, text: &str, file: Option<&str>) -> Result<SeriesId, Fail> {
        let arr = parser::scan(self, text, file)?;
        self.bind_user(arr)?;
        self.freeze_deep(arr);
        Ok(arr)
    }

    /// Loads and evaluates source text in the user context
    pub fn do_string(&mut self, text: &str, file: Option<&str>) -> Result<Cell, Fail> {
        let arr = self.load(text, file)?;
        self.guards.push(arr);
        let result = self.do_array(arr, 0, None);
        self.guards.pop();
        result
    }

    /// Evaluates source text and molds the result; void gives an
    /// empty string
    pub fn interpret(&mut self, text: &str) -> Result<String, RenErr> {
        match self.trap_unhaltable(|it| it.do_string(text, None)) {
            Ok(v) if v.is_void() => Ok(String::new()),
            Ok(v) => Ok(self.mold(v)),
            Err(fail) => Err(self.to_ren_err(fail)),
        }
    }

    /// Sets a field of `system/options`
    pub fn set_option(&mut self, name: &str, value: Cell) -> Result<(), Fail> {
        let system = self.system;
        let Some(n) = self.ctx_find(system, SYM_OPTIONS) else {
            return Ok(());
        };
        let options = self.ctx_get(system, n);
        if options.kind != Kind::Object {
            return Ok(());
        }
        let sym = self.intern(name);
        let varlist = options.varlist();
        let slot = match self.ctx_find(varlist, sym) {
            Some(slot) => slot,
            None => self.ctx_append(varlist, sym)?,
        };
        self.ctx_set(varlist, slot, value);
        Ok(())
    }

    // output

    /// Writes user-visible output, to stdout or the capture buffer
    pub fn emit(&mut self, text: &str) {
        match &mut self.output {
            Some(buf) => buf.push_str(text),
            None => {
                let mut out = std::io::stdout().lock();
                if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
                    log::warn!("output failed: {}", e);
                }
            }
        }
    }

    /// Sends later output to a buffer instead of stdout
    pub fn capture_output(&mut self) {
        self.output = Some(String::new());
    }

    /// Output captured so far
    pub fn take_output(&mut self) -> String {
        self.output.as_mut().map(std::mem::take).unwrap_or_default()
    }

    // memory

    /// Runs a full collection over every root; returns series freed
    pub fn recycle(&mut self) -> usize {
        let mut cells: Vec<Cell> = Vec::with_capacity(self.ds.len() + self.roots.len() + 16);
        cells.extend_from_slice(&self.ds);
        cells.extend_from_slice(&self.roots);
        cells.extend_from_slice(&self.archetypes.cells());
        if let Some((label, value)) = self.thrown {
            cells.push(label);
            cells.push(value);
        }

        let mut series = vec![self.lib, self.user, self.system];
        series.extend_from_slice(&self.guards);
        for f in &self.stack.frames {
            cells.push(f.original);
            cells.push(f.phase);
            series.push(f.varlist);
            if let Binding::Specific(s) = f.binding {
                series.push(s);
            }
        }
        for feed in &self.stack.feeds {
            series.push(feed.array);
            if let Some(s) = feed.specifier {
                series.push(s);
            }
        }

        let freed = self.pool.collect(&cells, &series);
        let pool = &self.pool;
        self.syms.prune_hints(|s| pool.is_live(s));
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boots_with_system() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        assert_eq!(it.ctx_archetype(it.system).kind, Kind::Object);
        assert_eq!(it.interpret("object? system/options").unwrap(), "true");
    }

    #[test]
    fn recycle_keeps_reachable() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        it.interpret("keep: [a [b c] \"text\"]").unwrap();
        let before = it.pool.live();
        it.make_array(&[Cell::integer(1)]).unwrap();
        it.recycle();
        assert!(it.pool.live() < before + 1);
        assert_eq!(it.interpret("keep").unwrap(), "[a [b c] \"text\"]");
    }

    #[test]
    fn exhaustion_is_trappable() {
        let booted = Interp::new(InterpConfig::default()).unwrap().pool.live();
        let mut it = Interp::new(InterpConfig {
            max_series: booted + 5_000,
            ..InterpConfig::default()
        })
        .unwrap();
        let out = it
            .interpret("b: copy [] e: trap [forever [append/only b copy [x]]] e/id")
            .unwrap();
        assert_eq!(out, "no-memory");
    }

    #[test]
    fn output_capture() {
        let mut it = Interp::new(InterpConfig::default()).unwrap();
        it.capture_output();
        it.interpret("print \"hi\" print [1 + 1 \"x\"]").unwrap();
        assert_eq!(it.take_output(), "hi\n2 x\n");
    }
}
