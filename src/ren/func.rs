// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/func.rs

// Functions: paramlists compiled from spec blocks, body holders with
// their dispatchers, and the operators that derive new functions from
// old ones (specialize, adapt, chain, enclose, hijack, tighten).

// <>

use super::cell::*;
use super::context::BindMode;
use super::error::{ErrId, Fail};
use super::interp::Interp;
use super::series::{flag, Buffer, Content, Link, Misc, SeriesId};
use super::symtab::*;

/// Native code behind a function. It reads its arguments from the top
/// frame of the interpreter.
pub type NativeFn = fn(&mut Interp) -> Result<Bounce, Fail>;

/// What a dispatcher asks the evaluator to do next
#[derive(Debug, Clone, Copy)]
pub enum Bounce {
    /// The call is finished with this result
    Out(Cell),
    /// Run the frame again under its (changed) phase
    Redo { typecheck: bool },
}

/// How a function's frame is consumed
#[derive(Debug, Clone, Copy)]
pub enum Dispatcher {
    /// Rust code
    Native(NativeFn),
    /// Generic action, dispatched on the kind of the first argument
    Action(Sym),
    /// Body block run in the frame; its last value is the result
    Interpreted,
    /// As `Interpreted`, but the result is always void
    Voider,
    /// Body is the specialized function; exemplar fills the frame
    Specializer,
    /// Body is `[prelude function]`
    Adapter,
    /// Body is the block of chained functions
    Chainer,
    /// Body is `[inner outer]`
    Encloser,
    /// Body is the function that replaced this one
    Hijacker,
    /// Body is the datatype or typeset tested against the argument
    TypeChecker,
}

/// Spec compilation flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    /// Appends a definitional RETURN
    Func,
    /// Appends a definitional LEAVE
    Proc,
    /// No definitional exit
    Plain,
}

impl Interp {
    /// Compiles a spec block into the keys of a paramlist
    pub fn make_paramlist(&mut self, spec: &[Cell], kind: SpecKind) -> Result<Vec<Cell>, Fail> {
        let mut keys: Vec<Cell> = Vec::new();
        let mut locals = false;
        let mut return_bits = TS_OPT_ANY_VALUE;
        let mut typed_return = false;
        // index in `keys` that a following block or tag applies to
        let mut last: Option<usize> = None;

        let mut i = 0;
        while i < spec.len() {
            let item = spec[i];
            i += 1;

            match item.kind {
                Kind::String => {}
                Kind::Block => {
                    let Some(k) = last else {
                        return Err(self.bad_spec(item));
                    };
                    let (bits, variadic) = self.typeset_from_spec(item)?;
                    let key = keys[k];
                    if key.key_class() == ParamClass::Refinement {
                        return Err(self.bad_spec(item));
                    }
                    let mut fresh = Cell::key(key.key_spelling(), key.key_class(), bits);
                    if variadic {
                        fresh = fresh.with_class(ParamClass::Variadic);
                    }
                    keys[k] = fresh;
                    last = None;
                }
                Kind::Tag => {
                    let tag = self.form(item);
                    match tag.as_str() {
                        "<local>" => locals = true,
                        "<no-return>" => {}
                        _ => return Err(self.bad_spec(item)),
                    }
                    last = None;
                }
                Kind::SetWord => {
                    // `return: [types]` restricts the result
                    if self.syms.canon(item.spelling()) != SYM_RETURN || kind != SpecKind::Func {
                        return Err(self.bad_spec(item));
                    }
                    let types = spec.get(i).copied();
                    match types {
                        Some(b) if b.kind == Kind::Block => {
                            return_bits = self.typeset_from_spec(b)?.0;
                            typed_return = true;
                            i += 1;
                        }
                        _ => return Err(self.bad_spec(item)),
                    }
                    last = None;
                }
                Kind::Word | Kind::GetWord | Kind::LitWord | Kind::Refinement => {
                    let sym = item.spelling();
                    let canon = self.syms.canon(sym);

                    if item.kind == Kind::Refinement && canon == SYM_LOCAL {
                        locals = true;
                        last = None;
                        continue;
                    }

                    if keys.iter().any(|k| self.syms.canon(k.key_spelling()) == canon) {
                        return Err(self.bad_spec(item));
                    }

                    let class = if locals {
                        if item.kind != Kind::Word {
                            return Err(self.bad_spec(item));
                        }
                        ParamClass::Local
                    } else {
                        match item.kind {
                            Kind::Word => ParamClass::Normal,
                            Kind::GetWord => ParamClass::HardQuote,
                            Kind::LitWord => ParamClass::SoftQuote,
                            _ => ParamClass::Refinement,
                        }
                    };
                    let bits = match class {
                        ParamClass::Refinement => Kind::Logic.bit() | Kind::Blank.bit(),
                        ParamClass::Local => TS_OPT_ANY_VALUE,
                        _ => TS_ANY_VALUE,
                    };
                    keys.push(Cell::key(sym, class, bits));
                    last = if class == ParamClass::Local {
                        None
                    } else {
                        Some(keys.len() - 1)
                    };
                }
                _ => return Err(self.bad_spec(item)),
            }
        }

        let exit = match kind {
            SpecKind::Func => Some((SYM_RETURN, ParamClass::Return)),
            SpecKind::Proc => Some((SYM_LEAVE, ParamClass::Leave)),
            SpecKind::Plain => None,
        };
        if typed_return && kind != SpecKind::Func {
            return Err(self.error(ErrId::BadFuncDef, &[]));
        }
        if let Some((sym, class)) = exit {
            if keys.iter().any(|k| self.syms.canon(k.key_spelling()) == sym) {
                // a parameter named like the exit shadows it
                return Err(self.error(ErrId::BadFuncDef, &[Cell::word(Kind::Word, sym)]));
            }
            keys.push(Cell::key(sym, class, return_bits));
        }

        Ok(keys)
    }

    fn bad_spec(&mut self, item: Cell) -> Fail {
        self.error(ErrId::BadFuncDef, &[item.unflagged()])
    }

    /// Type bits named by a spec block, and whether `<...>` was given
    pub fn typeset_from_spec(&mut self, block: Cell) -> Result<(u64, bool), Fail> {
        let specifier = self.specifier_of(block);
        let cells = self.array_values(block);
        let mut bits = 0u64;
        let mut variadic = false;
        for item in cells {
            match item.kind {
                Kind::Word => {
                    let val = match self.try_get_var(item, specifier) {
                        Some(v) if !v.is_void() => Some(v),
                        _ => self.lib_get(item.spelling()),
                    };
                    match val {
                        Some(v) if v.kind == Kind::Datatype => bits |= v.datatype_val().bit(),
                        Some(v) if v.kind == Kind::Typeset => bits |= v.typeset_bits(),
                        _ => return Err(self.bad_spec(item)),
                    }
                }
                Kind::Datatype => bits |= item.datatype_val().bit(),
                Kind::Typeset => bits |= item.typeset_bits(),
                Kind::Tag => match self.form(item).as_str() {
                    "<opt>" => bits |= Kind::Void.bit(),
                    "<end>" => bits |= Kind::End.bit(),
                    "<...>" => variadic = true,
                    _ => return Err(self.bad_spec(item)),
                },
                _ => return Err(self.bad_spec(item)),
            }
        }
        if bits & !(Kind::Void.bit() | Kind::End.bit()) == 0 {
            bits |= TS_ANY_VALUE;
        }
        Ok((bits, variadic))
    }

    /// Allocates a function from paramlist keys, a dispatcher and a body
    pub fn make_function(&mut self, keys: &[Cell], disp: Dispatcher, body: Cell) -> Result<Cell, Fail> {
        let paramlist = self.alloc(Content::Array(Buffer::with_capacity(keys.len() + 1)))?;
        let holder = self.alloc(Content::Array(Buffer::from_slice(&[body])))?;

        let fcell = Cell::function(paramlist, holder);
        {
            let series = self.pool.get_mut(paramlist);
            series.set(flag::PARAMLIST);
            series.misc = Misc::Facade(paramlist);
            series.link = Link::Meta(None);
            let arr = series.array_mut();
            arr.push(fcell);
            for k in keys {
                arr.push(*k);
            }
        }
        {
            let series = self.pool.get_mut(holder);
            series.set(flag::BODY_HOLDER);
            series.misc = Misc::Dispatcher(disp);
            series.link = Link::Exemplar(None);
        }

        self.pool.manage(paramlist);
        self.pool.manage(holder);
        Ok(fcell)
    }

    /// FUNC, PROC, FUNCTION and PROCEDURE: an interpreted function
    /// whose body is a relatively bound copy of `body`
    pub fn make_interpreted(&mut self, spec: Cell, body: Cell, kind: SpecKind, auto_locals: bool) -> Result<Cell, Fail> {
        let spec_cells = self.array_values(spec);
        let mut keys = self.make_paramlist(&spec_cells, kind)?;

        let copy = self.copy_array(body, self.specifier_of(body), true, TS_ANY_ARRAY)?;
        self.guards.push(copy);

        let result = (|| {
            if auto_locals {
                let mut words = Vec::new();
                self.collect_set_words(copy, 0, true, &mut words);
                let at = keys
                    .iter()
                    .position(|k| matches!(k.key_class(), ParamClass::Return | ParamClass::Leave))
                    .unwrap_or(keys.len());
                let mut n = at;
                for w in words {
                    let canon = self.syms.canon(w);
                    if !keys.iter().any(|k| self.syms.canon(k.key_spelling()) == canon) {
                        keys.insert(n, Cell::key(w, ParamClass::Local, TS_OPT_ANY_VALUE));
                        n += 1;
                    }
                }
            }

            let disp = match kind {
                SpecKind::Proc => Dispatcher::Voider,
                _ => Dispatcher::Interpreted,
            };
            let fcell = self.make_function(&keys, disp, Cell::BLANK)?;
            let paramlist = fcell.paramlist();

            self.bind_relative(copy, paramlist);
            let body_cell = Cell::series(Kind::Block, copy, 0).with_binding(Binding::Relative(paramlist));
            self.pool.get_mut(fcell.body_holder()).array_mut().set(0, body_cell);
            Ok(fcell)
        })();

        self.guards.pop();
        result
    }

    // component access

    pub fn facade_of(&self, paramlist: SeriesId) -> SeriesId {
        match self.pool.get(paramlist).misc {
            Misc::Facade(f) => f,
            _ => paramlist,
        }
    }

    /// Function whose paramlist relative bodies are bound to
    pub fn underlying_of(&self, f: Cell) -> Cell {
        let facade = self.facade_of(f.paramlist());
        self.pool.get(facade).array().get(0)
    }

    pub fn exemplar_of(&self, f: Cell) -> Option<SeriesId> {
        match self.pool.get(f.body_holder()).link {
            Link::Exemplar(e) => e,
            _ => None,
        }
    }

    pub fn dispatcher_of(&self, f: Cell) -> Dispatcher {
        match self.pool.get(f.body_holder()).misc {
            Misc::Dispatcher(d) => d,
            _ => panic!("body holder {} lacks a dispatcher", f.body_holder().0),
        }
    }

    pub fn body_of(&self, f: Cell) -> Cell {
        self.pool.get(f.body_holder()).array().get(0)
    }

    /// Identity comparison: the paramlist is the identity
    pub fn same_function(&self, a: Cell, b: Cell) -> bool {
        a.paramlist() == b.paramlist()
    }

    /// Interface keys of a function, without the root
    pub fn param_keys(&self, f: Cell) -> Vec<Cell> {
        self.pool.get(f.paramlist()).array().as_slice()[1..].to_vec()
    }

    /// New identity with a copied paramlist, sharing facade and exemplar;
    /// the body holder is copied too so later hijacks leave it alone
    pub fn copy_function(&mut self, f: Cell) -> Result<Cell, Fail> {
        let keys = self.param_keys(f);
        let disp = self.dispatcher_of(f);
        let body = self.body_of(f);
        let copy = self.make_function(&keys, disp, body)?;
        let facade = self.facade_of(f.paramlist());
        let exemplar = self.exemplar_of(f);
        self.pool.get_mut(copy.paramlist()).misc = Misc::Facade(facade);
        self.pool.get_mut(copy.body_holder()).link = Link::Exemplar(exemplar);
        Ok(copy)
    }

    /// Derived function presenting `keys` that runs `disp` over `body`,
    /// with frames shaped by the facade of `base`
    fn derive(&mut self, base: Cell, keys: &[Cell], disp: Dispatcher, body: Cell, exemplar: Option<SeriesId>) -> Result<Cell, Fail> {
        let fcell = self.make_function(keys, disp, body)?;
        let facade = self.facade_of(base.paramlist());
        self.pool.get_mut(fcell.paramlist()).misc = Misc::Facade(facade);
        self.pool.get_mut(fcell.body_holder()).link = Link::Exemplar(exemplar);
        Ok(fcell)
    }

    /// Frame context shaped by a function's facade, filled from its
    /// exemplar where it has one
    pub fn make_frame_for(&mut self, f: Cell) -> Result<SeriesId, Fail> {
        let facade = self.facade_of(f.paramlist());
        let len = self.pool.get(facade).len();
        let exemplar = self.exemplar_of(f);

        let varlist = self.alloc(Content::Array(Buffer::with_capacity(len)))?;
        {
            let values: Vec<Cell> = match exemplar {
                Some(e) => self.pool.get(e).array().as_slice()[1..].to_vec(),
                None => vec![Cell::VOID; len - 1],
            };
            let series = self.pool.get_mut(varlist);
            series.set(flag::VARLIST);
            series.link = Link::Keylist(facade);
            let arr = series.array_mut();
            arr.push(Cell::frame(varlist, f.paramlist()));
            for v in values {
                arr.push(v);
            }
        }
        self.pool.manage(varlist);
        Ok(varlist)
    }

    /// SPECIALIZE: presets some arguments, hiding them from callers
    pub fn specialize(&mut self, f: Cell, def: Cell) -> Result<Cell, Fail> {
        let exemplar = self.make_frame_for(f)?;
        self.guards.push(exemplar);

        let result = (|| {
            let code = self.copy_array(def, self.specifier_of(def), true, TS_ANY_ARRAY)?;
            self.bind_array(code, 0, exemplar, BindMode::Existing, true)?;
            self.do_array(code, 0, None)?;

            let len = self.ctx_len(exemplar);
            let mut n = 1;
            while n <= len {
                let key = self.ctx_key(exemplar, n);
                let val = self.ctx_get(exemplar, n);
                if key.key_class() == ParamClass::Refinement && val.kind == Kind::Logic && val.logic_val() {
                    // every argument of a refinement switched on must be given
                    let mut m = n + 1;
                    while m <= len && self.ctx_key(exemplar, m).key_class().is_gathered() {
                        if self.ctx_get(exemplar, m).is_void() {
                            let w = Cell::word(Kind::Refinement, key.key_spelling());
                            return Err(self.error(ErrId::BadRefine, &[w]));
                        }
                        m += 1;
                    }
                    n = m;
                    continue;
                }
                if key.key_class() == ParamClass::Refinement
                    && !matches!(val.kind, Kind::Void | Kind::Logic | Kind::Blank)
                {
                    let w = Cell::word(Kind::Refinement, key.key_spelling());
                    return Err(self.error(ErrId::BadRefine, &[w]));
                }
                n += 1;
            }

            // blank switches refinements off for good
            for n in 1..=len {
                let key = self.ctx_key(exemplar, n);
                let val = self.ctx_get(exemplar, n);
                if key.key_class() == ParamClass::Refinement && val.is_blank() {
                    self.ctx_set(exemplar, n, Cell::logic(false));
                }
            }

            // the interface keeps only what is still open
            let mut keys = Vec::new();
            let mut hide_args = false;
            for key in self.param_keys(f) {
                let slot = self.ctx_find(exemplar, key.key_spelling());
                let filled = slot.map(|n| !self.ctx_get(exemplar, n).is_void()).unwrap_or(false);
                if key.key_class() == ParamClass::Refinement {
                    hide_args = filled;
                    if !filled {
                        keys.push(key);
                    }
                } else if !filled && !(hide_args && key.key_class().is_gathered()) {
                    keys.push(key);
                }
            }

            self.derive(f, &keys, Dispatcher::Specializer, f.unflagged(), Some(exemplar))
        })();

        self.guards.pop();
        result
    }

    /// ADAPT: runs a prelude in the frame before the adaptee
    pub fn adapt(&mut self, f: Cell, prelude: Cell) -> Result<Cell, Fail> {
        let under = self.underlying_of(f);
        let code = self.copy_array(prelude, self.specifier_of(prelude), true, TS_ANY_ARRAY)?;
        self.guards.push(code);
        let result = (|| {
            self.bind_relative(code, under.paramlist());
            let pre = Cell::series(Kind::Block, code, 0).with_binding(Binding::Relative(under.paramlist()));
            let body = self.make_array(&[pre, f.unflagged()])?;
            let keys = self.param_keys(f);
            let exemplar = self.exemplar_of(f);
            self.derive(f, &keys, Dispatcher::Adapter, Cell::series(Kind::Block, body, 0), exemplar)
        })();
        self.guards.pop();
        result
    }

    /// CHAIN: pipes the result of each function into the next
    pub fn chain(&mut self, fns: &[Cell]) -> Result<Cell, Fail> {
        let Some(first) = fns.first().copied() else {
            return Err(self.error(ErrId::InvalidArg, &[]));
        };
        for f in fns {
            if !f.is_function() {
                return Err(self.error(ErrId::ApplyNonFunction, &[*f]));
            }
        }
        let cells: Vec<Cell> = fns.iter().map(|f| f.unflagged()).collect();
        let body = self.make_array(&cells)?;
        let keys = self.param_keys(first);
        let exemplar = self.exemplar_of(first);
        self.derive(first, &keys, Dispatcher::Chainer, Cell::series(Kind::Block, body, 0), exemplar)
    }

    /// ENCLOSE: hands the inner function's built frame to `outer`
    pub fn enclose(&mut self, inner: Cell, outer: Cell) -> Result<Cell, Fail> {
        let body = self.make_array(&[inner.unflagged(), outer.unflagged()])?;
        let keys = self.param_keys(inner);
        let exemplar = self.exemplar_of(inner);
        self.derive(inner, &keys, Dispatcher::Encloser, Cell::series(Kind::Block, body, 0), exemplar)
    }

    /// HIJACK: makes every reference to `victim` run `hijacker`.
    /// Returns a function with the victim's former behavior.
    pub fn hijack(&mut self, victim: Cell, hijacker: Cell) -> Result<Cell, Fail> {
        let former = self.copy_function(victim)?;

        if self.same_function(victim, hijacker) {
            return Ok(former);
        }

        let holder = victim.body_holder();
        let under_v = self.underlying_of(victim);
        let under_h = self.underlying_of(hijacker);

        if under_v.paramlist() == under_h.paramlist() {
            // frames are compatible; take over the hijacker's parts
            let disp = self.dispatcher_of(hijacker);
            let body = self.body_of(hijacker);
            let exemplar = self.exemplar_of(hijacker);
            let facade = self.facade_of(hijacker.paramlist());
            {
                let series = self.pool.get_mut(holder);
                series.misc = Misc::Dispatcher(disp);
                series.link = Link::Exemplar(exemplar);
                series.array_mut().set(0, body);
            }
            self.pool.get_mut(victim.paramlist()).misc = Misc::Facade(facade);
        } else {
            let series = self.pool.get_mut(holder);
            series.misc = Misc::Dispatcher(Dispatcher::Hijacker);
            series.array_mut().set(0, hijacker.unflagged());
        }

        log::debug!(
            "hijacked function {} (holder {})",
            victim.paramlist().0,
            holder.0
        );
        Ok(former)
    }

    /// TIGHTEN: normal parameters become tight; the body holder is
    /// shared, so the result follows later hijacks of the original
    pub fn tighten(&mut self, f: Cell) -> Result<Cell, Fail> {
        let tight = |k: &Cell| {
            if k.kind == Kind::Typeset && k.key_class() == ParamClass::Normal {
                k.with_class(ParamClass::Tight)
            } else {
                *k
            }
        };

        let keys: Vec<Cell> = self.param_keys(f).iter().map(tight).collect();
        let old_facade = self.facade_of(f.paramlist());
        let facade_cells: Vec<Cell> = self.pool.get(old_facade).array().as_slice().iter().map(tight).collect();

        let paramlist = self.alloc(Content::Array(Buffer::with_capacity(keys.len() + 1)))?;
        let facade = self.alloc(Content::Array(Buffer::from_slice(&facade_cells)))?;
        let fcell = Cell::function(paramlist, f.body_holder());
        {
            let series = self.pool.get_mut(paramlist);
            series.set(flag::PARAMLIST);
            series.misc = Misc::Facade(facade);
            series.link = Link::Meta(None);
            let arr = series.array_mut();
            arr.push(fcell);
            for k in keys {
                arr.push(k);
            }
        }
        {
            let series = self.pool.get_mut(facade);
            series.set(flag::PARAMLIST);
            series.misc = Misc::Facade(facade);
        }
        self.pool.manage(paramlist);
        self.pool.manage(facade);
        Ok(fcell)
    }
}

#[cfg(test)]
mod tests {
    use crate::ren::cell::{Kind, ParamClass};
    use crate::ren::interp::{Interp, InterpConfig};

    use super::SpecKind;

    fn interp() -> Interp {
        Interp::new(InterpConfig::default()).unwrap()
    }

    #[test]
    fn spec_classes() {
        let mut it = interp();
        let spec = it.transcode_values("a :b 'c [integer!] /d e f: <local> g").unwrap();
        // set-words other than return: are rejected
        assert!(it.make_paramlist(&spec, SpecKind::Func).is_err());

        let spec = it.transcode_values("a :b 'c [integer!] /d e <local> g").unwrap();
        let keys = it.make_paramlist(&spec, SpecKind::Func).unwrap();
        let classes: Vec<ParamClass> = keys.iter().map(|k| k.key_class()).collect();
        assert_eq!(
            classes,
            vec![
                ParamClass::Normal,
                ParamClass::HardQuote,
                ParamClass::SoftQuote,
                ParamClass::Refinement,
                ParamClass::Normal,
                ParamClass::Local,
                ParamClass::Return,
            ]
        );
        assert!(keys[2].key_allows(Kind::Integer));
        assert!(!keys[2].key_allows(Kind::String));
    }

    #[test]
    fn duplicate_params_rejected() {
        let mut it = interp();
        let spec = it.transcode_values("a A").unwrap();
        assert!(it.make_paramlist(&spec, SpecKind::Plain).is_err());
    }

    #[test]
    fn paramlist_root_names_itself() {
        let mut it = interp();
        let append = it.intern("append");
        let f = it.lib_get(append).unwrap();
        let root = it.pool.get(f.paramlist()).array().get(0);
        assert_eq!(root.paramlist(), f.paramlist());

        let t = it.tighten(f).unwrap();
        let root = it.pool.get(t.paramlist()).array().get(0);
        assert_eq!(root.paramlist(), t.paramlist());
        assert_eq!(t.body_holder(), f.body_holder());
        assert_eq!(it.underlying_of(t).paramlist(), f.paramlist());
    }
}
