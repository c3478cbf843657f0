// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/eval.rs

// The evaluator. Walks arrays one step at a time, pushes a frame for
// each function call, fulfills its arguments from the callsite and
// runs the dispatcher; throws travel back up as failures until the
// frame or construct they target catches them.

// <>

use std::sync::atomic::Ordering;

use super::cell::*;
use super::error::{ErrId, Fail};
use super::func::{Bounce, Dispatcher};
use super::interp::Interp;
use super::memmgt::Pool;
use super::series::{flag, Buffer, Content, Link, Misc, SeriesId};
use super::symtab::Sym;
use super::types;

/// Stack left below which recursive evaluation moves to a new segment
pub const RED_ZONE: usize = 256 * 1024;

/// Size of each stack segment allocated when the red zone is reached
pub const STACK_GROWTH: usize = 4 * 1024 * 1024;

/// Position in an array being evaluated
#[derive(Debug, Clone, Copy)]
pub struct Feed {
    pub array: SeriesId,
    pub index: u32,
    /// Frame resolving relative words in the array
    pub specifier: Option<SeriesId>,
    /// Where the current expression began, for error reports
    pub expr_start: u32,
}

/// A function call in progress
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    /// Function as it was invoked
    pub original: Cell,
    /// Function whose dispatcher is running now
    pub phase: Cell,
    /// Argument cells; its keylist is the facade
    pub varlist: SeriesId,
    /// Callsite feed arguments come from, if any
    pub feed: Option<usize>,
    pub label: Option<Sym>,
    /// Binding of the invoked cell; names the target of RETURN
    pub binding: Binding,
    /// Manual series mark when the frame was pushed
    pub manuals: u64,
}

/// Evaluation stack: live frames plus the feeds they read from
pub struct EvalStack {
    pub frames: Vec<Frame>,
    pub feeds: Vec<Feed>,
}

impl Default for EvalStack {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalStack {
    pub fn new() -> Self {
        EvalStack {
            frames: Vec::with_capacity(64),
            feeds: Vec::with_capacity(64),
        }
    }

    /// Pushes a complete frame
    #[inline(always)]
    pub fn push_frame(&mut self, frame: Frame) {
        if cfg!(feature = "stkdbg") {
            log::debug!("PUSH {:?}; depth {}", frame.label, self.frames.len() + 1);
        }
        self.frames.push(frame);
    }

    /// Pops a full frame off of the stack
    #[inline(always)]
    pub fn pop_frame(&mut self) -> Option<Frame> {
        let frame = self.frames.pop();
        if cfg!(feature = "stkdbg") {
            if let Some(f) = &frame {
                log::debug!("POP {:?}; depth {}", f.label, self.frames.len());
            }
        }
        frame
    }

    pub fn push_feed(&mut self, feed: Feed) -> usize {
        self.feeds.push(feed);
        self.feeds.len() - 1
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Cells of the expression under evaluation in the innermost feed
    pub fn near_cells(&self, pool: &Pool) -> Vec<Cell> {
        let Some(feed) = self.feeds.last() else {
            return Vec::new();
        };
        if !pool.is_live(feed.array) {
            return Vec::new();
        }
        let arr = pool.get(feed.array).array();
        let len = arr.len();
        let start = (feed.expr_start as usize).min(len);
        let end = (feed.index as usize).max(start + 1).min(len);
        arr.as_slice()[start..end]
            .iter()
            .take(8)
            .map(|c| match c.binding {
                Binding::Relative(_) => c.with_binding(Binding::Unbound).unflagged(),
                _ => c.unflagged(),
            })
            .collect()
    }

    /// Source file and line of the innermost feed, when tracked
    pub fn file_line(&self, pool: &Pool) -> Option<(Sym, u32)> {
        let feed = self.feeds.iter().rev().find(|f| pool.is_live(f.array) && pool.get(f.array).has(flag::FILE_LINE))?;
        let series = pool.get(feed.array);
        let (Link::File(file), Misc::Line(line)) = (series.link, series.misc) else {
            return None;
        };
        let breaks = series
            .array()
            .as_slice()
            .iter()
            .take(feed.index as usize)
            .filter(|c| c.flags.has(CellFlags::NEWLINE))
            .count();
        Some((file, line + breaks as u32))
    }
}

/// Where a frame's arguments come from
#[derive(Clone, Copy)]
pub enum ArgSource<'a> {
    /// Evaluated from a feed
    Feed(usize),
    /// Given as values: positional arguments, then refinements with
    /// their arguments
    Values(&'a [Cell], &'a [(Sym, Vec<Cell>)]),
}

/// Saved stack heights a trap restores
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    ds: usize,
    guards: usize,
    frames: usize,
    feeds: usize,
    manuals: u64,
}

impl Interp {
    /// The innermost running frame
    pub fn frame(&self) -> &Frame {
        match self.stack.frames.last() {
            Some(f) => f,
            None => panic!("frame access with no function running"),
        }
    }

    pub fn frame_mut(&mut self) -> &mut Frame {
        match self.stack.frames.last_mut() {
            Some(f) => f,
            None => panic!("frame access with no function running"),
        }
    }

    /// Argument `n` (one-based) of the running frame
    #[inline(always)]
    pub fn arg(&self, n: u32) -> Cell {
        self.ctx_get(self.frame().varlist, n)
    }

    /// Parameter of the running frame by name. For a refinement this
    /// is its first argument, or TRUE when it takes none; `None` when
    /// the refinement is not in use or the name is unknown.
    pub fn param(&self, sym: Sym) -> Option<Cell> {
        let varlist = self.frame().varlist;
        let n = self.ctx_find(varlist, sym)?;
        let key = self.ctx_key(varlist, n);
        let val = self.ctx_get(varlist, n);
        if key.key_class() != ParamClass::Refinement {
            return Some(val);
        }
        if !val.is_truthy() || val.is_void() {
            return None;
        }
        if n < self.ctx_len(varlist) && self.ctx_key(varlist, n + 1).key_class().is_gathered() {
            Some(self.ctx_get(varlist, n + 1))
        } else {
            Some(Cell::logic(true))
        }
    }

    /// Whether a refinement of the running frame is in use
    pub fn refine(&self, sym: Sym) -> bool {
        self.param(sym).is_some()
    }

    /// Label of the running frame as a word, for error reports
    fn label_word(&self) -> Cell {
        match self.frame().label {
            Some(s) => Cell::word(Kind::Word, s),
            None => Cell::BLANK,
        }
    }

    /// Evaluates an array from `index` to its end; void when empty
    pub fn do_array(&mut self, array: SeriesId, index: u32, specifier: Option<SeriesId>) -> Result<Cell, Fail> {
        let f = self.stack.push_feed(Feed {
            array,
            index,
            specifier,
            expr_start: index,
        });
        let result = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || {
            let mut out = Cell::VOID;
            while let Some(v) = self.eval_step(f)? {
                out = v;
            }
            Ok(out)
        });
        self.stack.feeds.truncate(f);
        result
    }

    /// DO of an array value
    pub fn do_block(&mut self, block: Cell) -> Result<Cell, Fail> {
        let spec = self.specifier_of(block);
        self.do_array(block.series_id(), block.index(), spec)
    }

    #[inline(always)]
    fn peek(&self, f: usize) -> Option<Cell> {
        let feed = &self.stack.feeds[f];
        let cell = self.pool.get(feed.array).array().get(feed.index as usize);
        (!cell.is_end()).then_some(cell)
    }

    #[inline(always)]
    fn fetch(&mut self, f: usize) -> Option<Cell> {
        let cell = self.peek(f)?;
        self.stack.feeds[f].index += 1;
        Some(cell)
    }

    /// Whether a feed is exhausted
    pub fn feed_at_end(&self, f: usize) -> bool {
        self.peek(f).is_none()
    }

    /// One full expression, including any enfix operations after it.
    /// `None` when the feed was already at its end.
    pub fn eval_step(&mut self, f: usize) -> Result<Option<Cell>, Fail> {
        let start = self.stack.feeds[f].index;
        self.stack.feeds[f].expr_start = start;
        let Some(mut out) = self.eval_core(f)? else {
            return Ok(None);
        };
        self.lookahead(f, &mut out)?;
        Ok(Some(out))
    }

    /// One expression without right hand enfix lookahead
    pub fn eval_step_tight(&mut self, f: usize) -> Result<Option<Cell>, Fail> {
        self.eval_core(f)
    }

    fn lookahead(&mut self, f: usize, out: &mut Cell) -> Result<(), Fail> {
        while let Some(next) = self.peek(f) {
            if next.kind != Kind::Word {
                break;
            }
            let spec = self.stack.feeds[f].specifier;
            match self.try_get_var(next, spec) {
                Some(v) if v.is_enfixed() => {
                    self.stack.feeds[f].index += 1;
                    *out = self.invoke(v, Some(next.spelling()), ArgSource::Feed(f), Some(*out), &[])?;
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn eval_core(&mut self, f: usize) -> Result<Option<Cell>, Fail> {
        self.poll()?;

        let Some(cell) = self.fetch(f) else {
            return Ok(None);
        };
        let spec = self.stack.feeds[f].specifier;

        if self.config.trace {
            log::trace!("eval: {}", self.mold(cell.with_binding(Binding::Unbound)));
        }

        let out = match cell.kind {
            Kind::Word => {
                let val = self.get_var(cell, spec)?;
                if val.is_function() {
                    if val.is_enfixed() {
                        let w = Cell::word(Kind::Word, cell.spelling());
                        return Err(self.error(ErrId::NoArg, &[w]));
                    }
                    self.invoke(val, Some(cell.spelling()), ArgSource::Feed(f), None, &[])?
                } else if val.is_void() {
                    let w = Cell::word(Kind::Word, cell.spelling());
                    return Err(self.error(ErrId::NoValue, &[w]));
                } else {
                    val
                }
            }

            Kind::SetWord => {
                let Some(val) = self.eval_step(f)? else {
                    let w = Cell::word(Kind::SetWord, cell.spelling());
                    return Err(self.error(ErrId::NeedValue, &[w]));
                };
                self.set_var(cell, spec, val)?;
                val
            }

            Kind::GetWord => {
                let mut val = self.get_var(cell, spec)?;
                val.flags.clear(CellFlags::ENFIX);
                val
            }

            Kind::LitWord => self.derelativize(cell, spec).with_kind(Kind::Word),

            Kind::Group => {
                let group = self.derelativize(cell, spec);
                self.do_block(group)?
            }

            Kind::Path => self.eval_path(cell, spec, Some(f))?,

            Kind::SetPath => {
                let Some(val) = self.eval_step(f)? else {
                    let p = self.derelativize(cell, spec);
                    return Err(self.error(ErrId::NeedValue, &[p]));
                };
                self.set_path(cell, spec, val)?;
                val
            }

            Kind::GetPath => self.eval_path(cell, spec, None)?,

            Kind::LitPath => self.derelativize(cell, spec).with_kind(Kind::Path),

            Kind::Function => self.invoke(cell, None, ArgSource::Feed(f), None, &[])?,

            _ => self.derelativize(cell, spec),
        };

        Ok(Some(out.unflagged()))
    }

    /// Checks the signal flag and runs the collector when due
    pub fn poll(&mut self) -> Result<(), Fail> {
        self.ticks += 1;
        if self.ticks % self.config.poll_interval.max(1) as u64 == 0 && self.signals.swap(false, Ordering::SeqCst) {
            log::info!("halt requested after {} ticks", self.ticks);
            return Err(Fail::Halt);
        }
        if self.pool.gc_due() {
            self.recycle();
        }
        Ok(())
    }

    // calls

    /// Calls a function, taking arguments from `source`. `left` is the
    /// value to the left of an enfix call, `refines` the refinements
    /// named in a call path.
    pub fn invoke(
        &mut self,
        fcell: Cell,
        label: Option<Sym>,
        source: ArgSource,
        left: Option<Cell>,
        refines: &[Sym],
    ) -> Result<Cell, Fail> {
        stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || {
            let varlist = self.push_frame(fcell, label, source)?;
            let result = self
                .fulfill(source, left, refines)
                .and_then(|_| self.typecheck_frame())
                .and_then(|_| self.dispatch_frame());
            let result = self.catch_definitional(result, varlist);
            self.drop_frame();
            result
        })
    }

    /// Calls a function with already evaluated arguments
    pub fn apply_values(&mut self, fcell: Cell, args: &[Cell]) -> Result<Cell, Fail> {
        self.invoke(fcell, None, ArgSource::Values(args, &[]), None, &[])
    }

    /// As `apply_values`, also switching on refinements with their
    /// arguments
    pub fn apply_refined(
        &mut self,
        fcell: Cell,
        label: Option<Sym>,
        args: &[Cell],
        refines: &[(Sym, Vec<Cell>)],
    ) -> Result<Cell, Fail> {
        let names: Vec<Sym> = refines.iter().map(|r| r.0).collect();
        self.invoke(fcell, label, ArgSource::Values(args, refines), None, &names)
    }

    fn push_frame(&mut self, fcell: Cell, label: Option<Sym>, source: ArgSource) -> Result<SeriesId, Fail> {
        if self.stack.depth() >= self.config.max_depth {
            return Err(self.error(ErrId::StackOverflow, &[]));
        }

        let facade = self.facade_of(fcell.paramlist());
        let len = self.pool.get(facade).len();
        let manuals = self.pool.manuals_mark();

        let varlist = self.alloc(Content::Array(Buffer::with_capacity(len)))?;
        {
            let series = self.pool.get_mut(varlist);
            series.set(flag::VARLIST | flag::RUNNING);
            series.link = Link::Keylist(facade);
            let arr = series.array_mut();
            arr.push(Cell::frame(varlist, fcell.paramlist()));
            for _ in 1..len {
                arr.push(Cell::VOID);
            }
        }

        let feed = match source {
            ArgSource::Feed(f) => Some(f),
            ArgSource::Values(..) => None,
        };
        self.stack.push_frame(Frame {
            original: fcell,
            phase: fcell,
            varlist,
            feed,
            label,
            binding: fcell.binding,
            manuals,
        });
        Ok(varlist)
    }

    fn drop_frame(&mut self) {
        if let Some(frame) = self.stack.pop_frame() {
            if self.pool.is_live(frame.varlist) {
                self.pool.get_mut(frame.varlist).clear(flag::RUNNING);
            }
            self.pool.drop_manuals(frame.manuals);
        }
    }

    /// Hands the running frame's varlist to the collector so that a
    /// FRAME! or VARARGS! value may refer to it
    pub fn reify_frame(&mut self) -> SeriesId {
        let varlist = self.frame().varlist;
        self.pool.manage(varlist);
        varlist
    }

    /// Fills the top frame: exemplar values first, then definitional
    /// exits, then arguments in callsite order
    fn fulfill(&mut self, source: ArgSource, left: Option<Cell>, refines: &[Sym]) -> Result<(), Fail> {
        let (fcell, varlist) = {
            let fr = self.frame();
            (fr.original, fr.varlist)
        };
        let facade = self.facade_of(fcell.paramlist());
        let keys: Vec<Cell> = self.pool.get(facade).array().as_slice()[1..].to_vec();
        let exemplar: Option<Vec<Cell>> = self
            .exemplar_of(fcell)
            .map(|e| self.pool.get(e).array().as_slice()[1..].to_vec());
        let preset = |n: usize| -> Option<Cell> {
            exemplar
                .as_ref()
                .and_then(|ex| ex.get(n).copied())
                .filter(|v| !v.is_void())
        };

        // refinements named at the callsite, in callsite order
        let mut used: Vec<usize> = Vec::with_capacity(refines.len());
        for r in refines {
            let canon = self.syms.canon(*r);
            let pos = keys.iter().position(|k| {
                k.key_class() == ParamClass::Refinement && self.syms.canon(k.key_spelling()) == canon
            });
            match pos {
                Some(p) if preset(p).is_none() && !used.contains(&p) => used.push(p),
                _ => {
                    let w = Cell::word(Kind::Refinement, *r);
                    return Err(self.error(ErrId::BadRefine, &[w]));
                }
            }
        }

        let mut main: Vec<usize> = Vec::new();
        let mut by_refinement: Vec<(usize, Vec<usize>)> = Vec::new();
        let mut current: Option<(usize, bool)> = None;

        for (n, key) in keys.iter().enumerate() {
            let slot = n as u32 + 1;
            match key.key_class() {
                ParamClass::Local => self.ctx_set(varlist, slot, Cell::VOID),
                ParamClass::Return => {
                    let exit = self.archetypes.return_.with_binding(Binding::Specific(varlist));
                    self.ctx_set(varlist, slot, exit);
                }
                ParamClass::Leave => {
                    let exit = self.archetypes.leave.with_binding(Binding::Specific(varlist));
                    self.ctx_set(varlist, slot, exit);
                }
                ParamClass::Refinement => {
                    if let Some(v) = preset(n) {
                        self.ctx_set(varlist, slot, v);
                        // arguments of a preset refinement come preset
                        current = Some((n, false));
                    } else if used.contains(&n) {
                        self.ctx_set(varlist, slot, Cell::logic(true));
                        by_refinement.push((n, Vec::new()));
                        current = Some((n, true));
                    } else {
                        self.ctx_set(varlist, slot, Cell::logic(false));
                        current = Some((n, false));
                    }
                }
                _ => {
                    if let Some(v) = preset(n) {
                        self.ctx_set(varlist, slot, v);
                        continue;
                    }
                    match current {
                        None => main.push(n),
                        Some((r, true)) => {
                            if let Some(entry) = by_refinement.iter_mut().find(|e| e.0 == r) {
                                entry.1.push(n);
                            }
                        }
                        Some((_, false)) => {}
                    }
                }
            }
        }

        // gather: main arguments, then refinement arguments in the
        // order the refinements were named
        let mut left = left;
        let mut positional = 0usize;
        for n in main.iter().copied() {
            let val = match left.take() {
                Some(l) => l,
                None => match source {
                    ArgSource::Feed(f) => self.gather(f, varlist, n, keys[n])?,
                    ArgSource::Values(args, _) => {
                        let v = args.get(positional).copied();
                        positional += 1;
                        self.given(v, varlist, n, keys[n])?
                    }
                },
            };
            self.ctx_set(varlist, n as u32 + 1, val);
        }
        for r in used.iter().copied() {
            let args = by_refinement
                .iter()
                .find(|e| e.0 == r)
                .map(|e| e.1.clone())
                .unwrap_or_default();
            for (i, n) in args.into_iter().enumerate() {
                let val = match source {
                    ArgSource::Feed(f) => self.gather(f, varlist, n, keys[n])?,
                    ArgSource::Values(_, refs) => {
                        let canon = self.syms.canon(keys[r].key_spelling());
                        let v = refs
                            .iter()
                            .find(|(s, _)| self.syms.canon(*s) == canon)
                            .and_then(|(_, vals)| vals.get(i).copied());
                        self.given(v, varlist, n, keys[n])?
                    }
                };
                self.ctx_set(varlist, n as u32 + 1, val);
            }
        }
        Ok(())
    }

    /// Takes one argument for slot `n` from the callsite
    fn gather(&mut self, f: usize, varlist: SeriesId, n: usize, key: Cell) -> Result<Cell, Fail> {
        let spec = self.stack.feeds[f].specifier;
        let val = match key.key_class() {
            ParamClass::Variadic => {
                self.pool.manage(varlist);
                return Ok(Cell::varargs(varlist, n as u32 + 1));
            }
            ParamClass::Tight => self.eval_step_tight(f)?,
            ParamClass::HardQuote => self.fetch(f).map(|c| {
                let mut c = self.derelativize(c, spec).unflagged();
                c.flags.set(CellFlags::UNEVALUATED);
                c
            }),
            ParamClass::SoftQuote => match self.peek(f) {
                Some(c) if matches!(c.kind, Kind::Group | Kind::GetWord | Kind::GetPath) => self.eval_step_tight(f)?,
                Some(c) => {
                    self.stack.feeds[f].index += 1;
                    let mut c = self.derelativize(c, spec).unflagged();
                    c.flags.set(CellFlags::UNEVALUATED);
                    Some(c)
                }
                None => None,
            },
            _ => self.eval_step(f)?,
        };
        match val {
            Some(v) => Ok(v),
            None => self.at_end(key),
        }
    }

    /// Argument for slot `n` from a list of values
    fn given(&mut self, val: Option<Cell>, varlist: SeriesId, n: usize, key: Cell) -> Result<Cell, Fail> {
        match (val, key.key_class()) {
            (Some(v), _) => Ok(v),
            (None, ParamClass::Variadic) => {
                self.pool.manage(varlist);
                Ok(Cell::varargs(varlist, n as u32 + 1))
            }
            (None, _) => self.at_end(key),
        }
    }

    fn at_end(&mut self, key: Cell) -> Result<Cell, Fail> {
        if key.key_allows(Kind::End) {
            Ok(Cell::VOID)
        } else {
            let label = self.label_word();
            let param = Cell::word(Kind::Word, key.key_spelling());
            Err(self.error(ErrId::Needs, &[label, param]))
        }
    }

    /// Checks every argument of the top frame against its key
    pub fn typecheck_frame(&mut self) -> Result<(), Fail> {
        let varlist = self.frame().varlist;
        let len = self.ctx_len(varlist);
        let mut active = true;
        for n in 1..=len {
            let key = self.ctx_key(varlist, n);
            let val = self.ctx_get(varlist, n);
            let class = key.key_class();
            match class {
                ParamClass::Local | ParamClass::Return | ParamClass::Leave => {}
                ParamClass::Refinement => {
                    active = val.kind == Kind::Logic && val.logic_val();
                    if !matches!(val.kind, Kind::Logic | Kind::Void | Kind::Blank) {
                        let w = Cell::word(Kind::Refinement, key.key_spelling());
                        return Err(self.error(ErrId::BadRefine, &[w]));
                    }
                    if !matches!(val.kind, Kind::Logic) {
                        self.ctx_set(varlist, n, Cell::logic(false));
                    }
                }
                _ if !active => {}
                ParamClass::Variadic if val.kind == Kind::Varargs => {}
                _ => {
                    if val.is_void() {
                        if !key.key_allows(Kind::Void) && !key.key_allows(Kind::End) {
                            let label = self.label_word();
                            let param = Cell::word(Kind::Word, key.key_spelling());
                            return Err(self.error(ErrId::ArgRequired, &[label, param]));
                        }
                    } else if !key.key_allows(val.kind) {
                        let label = self.label_word();
                        let param = Cell::word(Kind::Word, key.key_spelling());
                        let kind = Cell::datatype(val.kind);
                        return Err(self.error(ErrId::ExpectArg, &[label, param, kind]));
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs dispatchers for the top frame until one produces a result
    pub fn dispatch_frame(&mut self) -> Result<Cell, Fail> {
        loop {
            let phase = self.frame().phase;
            let bounce = match self.dispatcher_of(phase) {
                Dispatcher::Native(native) => native(self)?,
                Dispatcher::Action(verb) => types::dispatch_action(self, verb)?,
                Dispatcher::Interpreted => self.run_body(phase, false)?,
                Dispatcher::Voider => self.run_body(phase, true)?,
                Dispatcher::Specializer => {
                    self.frame_mut().phase = self.body_of(phase);
                    Bounce::Redo { typecheck: false }
                }
                Dispatcher::Adapter => {
                    let body = self.array_values(self.body_of(phase));
                    let (prelude, adaptee) = (body[0], body[1]);
                    let varlist = self.frame().varlist;
                    self.do_array(prelude.series_id(), prelude.index(), Some(varlist))?;
                    self.frame_mut().phase = adaptee;
                    Bounce::Redo { typecheck: true }
                }
                Dispatcher::Chainer => {
                    let fns = self.array_values(self.body_of(phase));
                    self.frame_mut().phase = fns[0];
                    let mut out = self.dispatch_frame()?;
                    for g in &fns[1..] {
                        out = self.apply_values(*g, &[out])?;
                    }
                    Bounce::Out(out)
                }
                Dispatcher::Encloser => {
                    let parts = self.array_values(self.body_of(phase));
                    let (inner, outer) = (parts[0], parts[1]);
                    let copy = self.copy_frame_values(inner)?;
                    let out = self.apply_values(outer, &[Cell::frame(copy, inner.paramlist())])?;
                    Bounce::Out(out)
                }
                Dispatcher::Hijacker => {
                    let hijacker = self.body_of(phase);
                    let (args, refines) = self.frame_arguments();
                    let label = self.frame().label;
                    Bounce::Out(self.apply_refined(hijacker, label, &args, &refines)?)
                }
                Dispatcher::TypeChecker => {
                    let test = self.body_of(phase);
                    let arg = self.arg(1);
                    let hit = match test.kind {
                        Kind::Datatype => arg.kind == test.datatype_val(),
                        _ => test.typeset_bits() & arg.kind.bit() != 0,
                    };
                    Bounce::Out(Cell::logic(hit))
                }
            };
            match bounce {
                Bounce::Out(out) => return Ok(out),
                Bounce::Redo { typecheck } => {
                    if typecheck {
                        self.typecheck_frame()?;
                    }
                }
            }
        }
    }

    fn run_body(&mut self, phase: Cell, void: bool) -> Result<Bounce, Fail> {
        let body = self.body_of(phase);
        let varlist = self.frame().varlist;
        let out = self.do_array(body.series_id(), body.index(), Some(varlist))?;
        if void {
            return Ok(Bounce::Out(Cell::VOID));
        }
        self.check_return(varlist, out)?;
        Ok(Bounce::Out(out))
    }

    /// Checks a result against the RETURN key of a frame, if it has one
    pub fn check_return(&mut self, varlist: SeriesId, out: Cell) -> Result<(), Fail> {
        let len = self.ctx_len(varlist);
        for n in 1..=len {
            let key = self.ctx_key(varlist, n);
            if key.key_class() == ParamClass::Return {
                let ok = if out.is_void() {
                    key.key_allows(Kind::Void)
                } else {
                    key.key_allows(out.kind)
                };
                if !ok {
                    let label = self
                        .stack
                        .frames
                        .iter()
                        .rev()
                        .find(|f| f.varlist == varlist)
                        .and_then(|f| f.label)
                        .map(|s| Cell::word(Kind::Word, s))
                        .unwrap_or(Cell::BLANK);
                    let kind = Cell::datatype(out.kind);
                    return Err(self.error(ErrId::BadReturnType, &[label, kind]));
                }
                break;
            }
        }
        Ok(())
    }

    /// Arguments of the top frame in positional form: main arguments,
    /// then each refinement in use with its arguments
    pub fn frame_arguments(&self) -> (Vec<Cell>, Vec<(Sym, Vec<Cell>)>) {
        let varlist = self.frame().varlist;
        let len = self.ctx_len(varlist);
        let mut args = Vec::new();
        let mut refines: Vec<(Sym, Vec<Cell>)> = Vec::new();
        let mut current: Option<bool> = None;
        for n in 1..=len {
            let key = self.ctx_key(varlist, n);
            let val = self.ctx_get(varlist, n);
            match key.key_class() {
                ParamClass::Refinement => {
                    let on = val.kind == Kind::Logic && val.logic_val();
                    if on {
                        refines.push((key.key_spelling(), Vec::new()));
                    }
                    current = Some(on);
                }
                c if c.is_gathered() => match current {
                    None => args.push(val),
                    Some(true) => {
                        if let Some(last) = refines.last_mut() {
                            last.1.push(val);
                        }
                    }
                    Some(false) => {}
                },
                _ => {}
            }
        }
        (args, refines)
    }

    /// Managed FRAME! varlist holding a copy of the top frame's values
    fn copy_frame_values(&mut self, phase: Cell) -> Result<SeriesId, Fail> {
        let varlist = self.frame().varlist;
        let keylist = self.ctx_keylist(varlist);
        let values: Vec<Cell> = self.pool.get(varlist).array().as_slice()[1..].to_vec();
        let copy = self.alloc(Content::Array(Buffer::with_capacity(values.len() + 1)))?;
        {
            let series = self.pool.get_mut(copy);
            series.set(flag::VARLIST);
            series.link = Link::Keylist(keylist);
            let arr = series.array_mut();
            arr.push(Cell::frame(copy, phase.paramlist()));
            for v in values {
                arr.push(v);
            }
        }
        self.pool.manage(copy);
        Ok(copy)
    }

    /// DO of a FRAME! value: runs its function with the frame's values
    pub fn do_frame(&mut self, frame: Cell) -> Result<Cell, Fail> {
        let Some(phase) = frame.phase() else {
            return Err(self.error(ErrId::InvalidArg, &[frame]));
        };
        let fcell = self.pool.get(phase).array().get(0);
        let source = frame.varlist();

        let facade = self.facade_of(fcell.paramlist());
        if self.ctx_keylist(source) != facade && self.pool.get(facade).len() != self.pool.get(source).len() {
            let f = Cell::function(fcell.paramlist(), fcell.body_holder());
            return Err(self.error(ErrId::DifferentUnderlying, &[frame, f]));
        }

        let varlist = self.push_frame(fcell, None, ArgSource::Values(&[], &[]))?;
        let result = (|| {
            let len = self.ctx_len(varlist);
            for n in 1..=len {
                let key = self.ctx_key(varlist, n);
                let val = self.ctx_get(source, n);
                let val = match key.key_class() {
                    ParamClass::Return => self.archetypes.return_.with_binding(Binding::Specific(varlist)),
                    ParamClass::Leave => self.archetypes.leave.with_binding(Binding::Specific(varlist)),
                    ParamClass::Refinement if !val.is_truthy() || val.is_void() => Cell::logic(false),
                    ParamClass::Refinement => Cell::logic(true),
                    _ => val,
                };
                self.ctx_set(varlist, n, val);
            }
            self.frame_needs()?;
            self.typecheck_frame()?;
            self.dispatch_frame()
        })();
        let result = self.catch_definitional(result, varlist);
        self.drop_frame();
        result
    }

    /// Fails with `needs` for the first required argument left void
    fn frame_needs(&mut self) -> Result<(), Fail> {
        let varlist = self.frame().varlist;
        let len = self.ctx_len(varlist);
        let mut active = true;
        for n in 1..=len {
            let key = self.ctx_key(varlist, n);
            let val = self.ctx_get(varlist, n);
            match key.key_class() {
                ParamClass::Refinement => active = val.is_truthy(),
                c if c.is_gathered() && active && c != ParamClass::Variadic => {
                    if val.is_void() && !key.key_allows(Kind::Void) && !key.key_allows(Kind::End) {
                        let label = self.label_word();
                        let param = Cell::word(Kind::Word, key.key_spelling());
                        return Err(self.error(ErrId::Needs, &[label, param]));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Catches a RETURN or LEAVE aimed at the frame owning `varlist`
    fn catch_definitional(&mut self, result: Result<Cell, Fail>, varlist: SeriesId) -> Result<Cell, Fail> {
        if let Err(Fail::Thrown) = result {
            if let Some((label, value)) = self.thrown {
                if label.is_function() && label.binding == Binding::Specific(varlist) {
                    if self.same_function(label, self.archetypes.return_) {
                        self.thrown = None;
                        return Ok(value);
                    }
                    if self.same_function(label, self.archetypes.leave) {
                        self.thrown = None;
                        return Ok(Cell::VOID);
                    }
                }
            }
        }
        result
    }

    /// Stages a throw and produces the failure that carries it
    pub fn throw(&mut self, label: Cell, value: Cell) -> Fail {
        self.thrown = Some((label, value));
        Fail::Thrown
    }

    /// Takes the staged throw when its label satisfies `test`
    pub fn catch_thrown(&mut self, test: impl Fn(&Interp, Cell) -> bool) -> Option<Cell> {
        let (label, value) = self.thrown?;
        if test(self, label) {
            self.thrown = None;
            Some(value)
        } else {
            None
        }
    }

    // varargs

    /// Frame a VARARGS! value reads from, if it is still running
    fn varargs_feed(&mut self, va: Cell) -> Result<(usize, Cell), Fail> {
        let (varlist, param) = match va.payload {
            Payload::Varargs { varlist, param } => (varlist, param),
            _ => return Err(self.error(ErrId::InvalidArg, &[va])),
        };
        let feed = self
            .stack
            .frames
            .iter()
            .rev()
            .find(|f| f.varlist == varlist)
            .and_then(|f| f.feed);
        match feed {
            Some(f) if self.pool.get(varlist).has(flag::RUNNING) => Ok((f, self.ctx_key(varlist, param))),
            _ => Err(self.error(ErrId::VarargsNoStack, &[])),
        }
    }

    /// Evaluates the next expression at a VARARGS!'s callsite
    pub fn varargs_take(&mut self, va: Cell) -> Result<Cell, Fail> {
        let (f, key) = self.varargs_feed(va)?;
        let Some(val) = self.eval_step(f)? else {
            return Ok(Cell::VOID);
        };
        let bits = key.typeset_bits();
        if bits & val.kind.bit() == 0 {
            let param = Cell::word(Kind::Word, key.key_spelling());
            return Err(self.error(ErrId::ExpectArg, &[Cell::BLANK, param, Cell::datatype(val.kind)]));
        }
        Ok(val)
    }

    pub fn varargs_tail(&mut self, va: Cell) -> Result<bool, Fail> {
        let (f, _) = self.varargs_feed(va)?;
        Ok(self.feed_at_end(f))
    }

    // paths

    /// Picker for one path step: groups and get-words are evaluated,
    /// everything else is taken literally
    fn path_picker(&mut self, cell: Cell, spec: Option<SeriesId>) -> Result<Cell, Fail> {
        match cell.kind {
            Kind::Group => {
                let g = self.derelativize(cell, spec);
                self.do_block(g)
            }
            Kind::GetWord => self.get_var(cell, spec),
            _ => Ok(self.derelativize(cell, spec)),
        }
    }

    /// Evaluates a path; with a feed a function at its end is invoked
    /// with the rest of the path as refinements
    pub fn eval_path(&mut self, path: Cell, spec: Option<SeriesId>, feed: Option<usize>) -> Result<Cell, Fail> {
        let path = self.derelativize(path, spec);
        let pspec = self.specifier_of(path);
        let cells: Vec<Cell> = self.pool.get(path.series_id()).array().as_slice()[path.index() as usize..].to_vec();
        let Some(head) = cells.first().copied() else {
            return Err(self.error(ErrId::InvalidArg, &[path]));
        };

        let mut label = None;
        let mut value = match head.kind {
            Kind::Word | Kind::GetWord => {
                label = Some(head.spelling());
                self.get_var(head, pspec)?
            }
            Kind::Group => {
                let g = self.derelativize(head, pspec);
                self.do_block(g)?
            }
            _ => self.derelativize(head, pspec),
        };

        let mut i = 1;
        while i < cells.len() && !value.is_function() {
            if value.is_void() {
                let w = self.derelativize(cells[i - 1], pspec);
                return Err(self.error(ErrId::NoValue, &[w.with_binding(Binding::Unbound)]));
            }
            self.ds.push(value);
            let picker = self.path_picker(cells[i], pspec);
            self.ds.pop();
            let picker = picker?;
            value = types::pick_path(self, value, picker)?;
            if picker.kind.is_word() {
                label = Some(picker.spelling());
            }
            i += 1;
        }

        if value.is_function() {
            let mut refines = Vec::new();
            let mark = self.ds.len();
            self.ds.push(value);
            for c in &cells[i..] {
                let r = self.path_picker(*c, pspec);
                let r = match r {
                    Ok(r) => r,
                    Err(e) => {
                        self.ds.truncate(mark);
                        return Err(e);
                    }
                };
                match r.kind {
                    k if k.is_word() => refines.push(r.spelling()),
                    Kind::Blank => {}
                    _ => {
                        self.ds.truncate(mark);
                        return Err(self.error(ErrId::BadRefine, &[r]));
                    }
                }
            }
            self.ds.truncate(mark);
            return match feed {
                Some(f) => {
                    if value.is_enfixed() && i == 1 {
                        let w = Cell::word(Kind::Word, head.spelling());
                        return Err(self.error(ErrId::NoArg, &[w]));
                    }
                    self.invoke(value, label, ArgSource::Feed(f), None, &refines)
                }
                None if refines.is_empty() => {
                    let mut v = value;
                    v.flags.clear(CellFlags::ENFIX);
                    Ok(v)
                }
                None => self.specialize_refinements(value, &refines),
            };
        }

        if value.is_void() && feed.is_some() {
            return Err(self.error(ErrId::NoValue, &[path.with_binding(Binding::Unbound)]));
        }
        Ok(value)
    }

    /// GET-PATH with refinements: a specialization with them switched on
    fn specialize_refinements(&mut self, f: Cell, refines: &[Sym]) -> Result<Cell, Fail> {
        let mut code = Vec::new();
        for r in refines {
            code.push(Cell::word(Kind::SetWord, *r));
            code.push(Cell::word(Kind::Word, super::symtab::SYM_TRUE));
        }
        let arr = self.make_array(&code)?;
        let lib = self.lib;
        self.bind_array(arr, 0, lib, super::context::BindMode::Existing, false)?;
        self.specialize(f, Cell::series(Kind::Block, arr, 0))
    }

    /// SET-PATH: assigns through the path, writing changed immediate
    /// values (tuples, pairs, dates) back to where they came from
    pub fn set_path(&mut self, path: Cell, spec: Option<SeriesId>, value: Cell) -> Result<(), Fail> {
        let path = self.derelativize(path, spec);
        let pspec = self.specifier_of(path);
        let cells: Vec<Cell> = self.pool.get(path.series_id()).array().as_slice()[path.index() as usize..].to_vec();
        if cells.len() < 2 || !cells[0].kind.is_word() {
            return Err(self.error(ErrId::BadPathSet, &[path.with_kind(Kind::Path)]));
        }
        let head = cells[0];

        let mut current = self.get_var(head, pspec)?;
        let mut trail: Vec<(Cell, Cell)> = Vec::new();
        for c in &cells[1..cells.len() - 1] {
            let picker = self.path_picker(*c, pspec)?;
            trail.push((current, picker));
            current = types::pick_path(self, current, picker)?;
        }
        let mut picker = self.path_picker(cells[cells.len() - 1], pspec)?;
        let mut newval = value;
        let mut target = current;

        loop {
            match types::poke_path(self, target, picker, newval)? {
                None => return Ok(()),
                Some(updated) => match trail.pop() {
                    Some((parent, p)) => {
                        target = parent;
                        picker = p;
                        newval = updated;
                    }
                    None => return self.set_var(head, pspec, updated),
                },
            }
        }
    }

    // traps

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            ds: self.ds.len(),
            guards: self.guards.len(),
            frames: self.stack.frames.len(),
            feeds: self.stack.feeds.len(),
            manuals: self.pool.manuals_mark(),
        }
    }

    fn restore(&mut self, snap: Snapshot) {
        while self.stack.frames.len() > snap.frames {
            self.drop_frame();
        }
        self.stack.feeds.truncate(snap.feeds);
        self.ds.truncate(snap.ds);
        self.guards.truncate(snap.guards);
        self.pool.drop_manuals(snap.manuals);
    }

    /// Runs `body`, catching a raised error as `Ok(Err(error))`.
    /// Throws and halts pass through.
    pub fn trap<T>(&mut self, body: impl FnOnce(&mut Interp) -> Result<T, Fail>) -> Result<Result<T, Cell>, Fail> {
        let snap = self.snapshot();
        match body(self) {
            Ok(v) => Ok(Ok(v)),
            Err(Fail::Error(e)) => {
                self.restore(snap);
                Ok(Err(e))
            }
            Err(other) => Err(other),
        }
    }

    /// Runs `body`, restoring the stacks after any failure, halts
    /// included. Only the host uses this.
    pub fn trap_unhaltable<T>(&mut self, body: impl FnOnce(&mut Interp) -> Result<T, Fail>) -> Result<T, Fail> {
        let snap = self.snapshot();
        let result = body(self);
        if result.is_err() {
            self.restore(snap);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::ren::interp::{Interp, InterpConfig};
    use crate::ren::RenErr;

    fn run(src: &str) -> Result<String, RenErr> {
        let mut it = Interp::new(InterpConfig::default())?;
        it.interpret(src)
    }

    #[test]
    fn left_to_right_enfix() {
        assert_eq!(run("1 + 2 * 3").unwrap(), "9");
        assert_eq!(run("x: 1 + 2 x").unwrap(), "3");
    }

    #[test]
    fn refinement_arguments_follow_callsite_order() {
        let src = "f: func [/a x /b y] [reduce [x y]] f/b/a 1 2";
        assert_eq!(run(src).unwrap(), "[2 1]");
    }

    #[test]
    fn missing_argument_needs() {
        let err = run("f: func [x] [x] f").unwrap_err();
        assert_eq!(err.id(), Some("needs"));
        let err = run("g: func [a b] [a] do [g 1]").unwrap_err();
        assert_eq!(err.id(), Some("needs"));
        assert_eq!(run("f: func [x] [x] e: trap [f] e/id").unwrap(), "needs");
    }

    #[test]
    fn unset_word_has_no_value() {
        let err = run("undefined-thing").unwrap_err();
        assert_eq!(err.id(), Some("no-value"));
    }

    #[test]
    fn paths_pick_and_poke() {
        assert_eq!(run("b: [1 2 3] b/2").unwrap(), "2");
        assert_eq!(run("b: copy [1 2 3] b/2: 20 b").unwrap(), "[1 20 3]");
        assert_eq!(run("t: 1.2.3 t/2: 9 t").unwrap(), "1.9.3");
        assert_eq!(run("o: make object! [p: 1x2] o/p/x: 5 o/p").unwrap(), "5x2");
    }

    #[test]
    fn stack_overflow_is_trappable() {
        let mut it = Interp::new(InterpConfig {
            max_depth: 40,
            ..InterpConfig::default()
        })
        .unwrap();
        let out = it
            .interpret("f: func [] [f] e: trap [f] e/id")
            .unwrap();
        assert_eq!(out, "stack-overflow");
    }

    #[test]
    fn halt_passes_user_traps() {
        let mut it = Interp::new(InterpConfig {
            poll_interval: 1,
            ..InterpConfig::default()
        })
        .unwrap();
        it.signals.store(true, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(it.interpret("trap [forever []]"), Err(RenErr::Halt));
    }

    #[test]
    fn varargs_take_from_callsite() {
        let src = "sum: func [args [integer! <...>]] [t: 0 while [not tail? args] [t: t + take args] t] sum 1 2 3";
        assert_eq!(run(src).unwrap(), "6");
    }
}
