// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/context.rs

// Contexts (keylist plus varlist), binding of words to their slots,
// relative binding and derelativization, and variable access.

// <>

use std::collections::HashSet;

use super::cell::{Binding, Cell, CellFlags, Kind, ParamClass, TS_ANY_ARRAY, TS_OPT_ANY_VALUE};
use super::error::{ErrId, Fail};
use super::func::Dispatcher;
use super::interp::Interp;
use super::series::{flag, Buffer, Content, Link, SeriesId};
use super::symtab::{Hint, Sym, SYM_SELF};

/// How `bind_array` treats words the target context lacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// Only words already in the context are bound
    Existing,
    /// Set-words missing from the context are added first
    AddSetWords,
    /// Every missing word is added
    AddAll,
}

impl Interp {
    /// Allocates a managed context of `kind` with the given keys, all
    /// variables void
    pub fn make_context(&mut self, kind: Kind, keys: &[Sym]) -> Result<SeriesId, Fail> {
        let mut keycells = Vec::with_capacity(keys.len() + 1);
        keycells.push(Cell::BLANK);
        keycells.extend(keys.iter().map(|k| Cell::key(*k, ParamClass::Normal, TS_OPT_ANY_VALUE)));
        let keylist = self.alloc(Content::Array(Buffer::from_slice(&keycells)))?;
        self.pool.get_mut(keylist).set(flag::KEYLIST);

        let varlist = self.alloc(Content::Array(Buffer::with_capacity(keys.len() + 1)))?;
        {
            let series = self.pool.get_mut(varlist);
            series.set(flag::VARLIST);
            series.link = Link::Keylist(keylist);
            let arr = series.array_mut();
            arr.push(Cell::context(kind, varlist));
            for _ in keys {
                arr.push(Cell::VOID);
            }
        }

        self.pool.manage(keylist);
        self.pool.manage(varlist);

        for (n, k) in keys.iter().enumerate() {
            self.syms.add_hint(
                *k,
                Hint {
                    varlist,
                    index: n as u32 + 1,
                },
            );
        }

        Ok(varlist)
    }

    /// The cell naming a context, with its kind
    pub fn ctx_archetype(&self, varlist: SeriesId) -> Cell {
        self.pool.get(varlist).array().get(0)
    }

    pub fn ctx_keylist(&self, varlist: SeriesId) -> SeriesId {
        match self.pool.get(varlist).link {
            Link::Keylist(k) => k,
            _ => panic!("series {} is not a varlist", varlist.0),
        }
    }

    /// Number of variables, not counting the archetype slot
    pub fn ctx_len(&self, varlist: SeriesId) -> u32 {
        self.pool.get(varlist).len() as u32 - 1
    }

    pub fn ctx_key(&self, varlist: SeriesId, n: u32) -> Cell {
        let keylist = self.ctx_keylist(varlist);
        self.pool.get(keylist).array().get(n as usize)
    }

    pub fn ctx_key_sym(&self, varlist: SeriesId, n: u32) -> Sym {
        self.ctx_key(varlist, n).key_spelling()
    }

    /// Whether a key is left out of reflection and molding
    pub fn ctx_key_hidden(&self, varlist: SeriesId, n: u32) -> bool {
        self.ctx_key(varlist, n).key_class() == ParamClass::Local
            && self.ctx_archetype(varlist).kind != Kind::Frame
    }

    #[inline(always)]
    pub fn ctx_get(&self, varlist: SeriesId, n: u32) -> Cell {
        self.pool.get(varlist).array().get(n as usize)
    }

    /// Writes a slot, keeping its protection flag
    #[inline(always)]
    pub fn ctx_set(&mut self, varlist: SeriesId, n: u32, value: Cell) {
        let arr = self.pool.get_mut(varlist).array_mut();
        let protected = arr.get(n as usize).flags.has(CellFlags::PROTECTED);
        let mut value = value;
        value.flags.clear(CellFlags::NEWLINE | CellFlags::UNEVALUATED);
        if protected {
            value.flags.set(CellFlags::PROTECTED);
        } else {
            value.flags.clear(CellFlags::PROTECTED);
        }
        arr.set(n as usize, value);
    }

    /// Slot index of a spelling, consulting the canon's hints first
    pub fn ctx_find(&self, varlist: SeriesId, sym: Sym) -> Option<u32> {
        let canon = self.syms.canon(sym);
        let len = self.ctx_len(varlist);
        let keylist = self.ctx_keylist(varlist);
        let keys = self.pool.get(keylist).array();

        for hint in self.syms.hints(sym) {
            if hint.varlist == varlist && hint.index >= 1 && hint.index <= len {
                let key = keys.get(hint.index as usize);
                if key.kind == Kind::Typeset && self.syms.canon(key.key_spelling()) == canon {
                    return Some(hint.index);
                }
            }
        }

        (1..=len).find(|n| {
            let key = keys.get(*n as usize);
            self.syms.canon(key.key_spelling()) == canon
        })
    }

    /// Adds a key and a void variable, unsharing the keylist if needed
    pub fn ctx_append(&mut self, varlist: SeriesId, sym: Sym) -> Result<u32, Fail> {
        if self.pool.get(varlist).has(flag::RUNNING) || self.ctx_archetype(varlist).kind == Kind::Frame {
            let word = Cell::word(Kind::Word, sym);
            return Err(self.error(ErrId::LockedSeries, &[word]));
        }
        if self.pool.get(varlist).is_read_only() {
            return Err(self.error(ErrId::LockedSeries, &[]));
        }

        let keylist = self.ctx_keylist(varlist);
        let keylist = if self.pool.get(keylist).has(flag::SHARED_KEYLIST) {
            let copy = self.pool.get(keylist).array().clone();
            let fresh = self.alloc(Content::Array(copy))?;
            self.pool.get_mut(fresh).set(flag::KEYLIST);
            self.pool.manage(fresh);
            self.pool.get_mut(varlist).link = Link::Keylist(fresh);
            fresh
        } else {
            keylist
        };

        self.pool
            .get_mut(keylist)
            .array_mut()
            .push(Cell::key(sym, ParamClass::Normal, TS_OPT_ANY_VALUE));
        self.pool.get_mut(varlist).array_mut().push(Cell::VOID);

        let index = self.ctx_len(varlist);
        self.syms.add_hint(sym, Hint { varlist, index });
        Ok(index)
    }

    /// Adds the hidden SELF key an object uses to name itself
    pub fn ctx_add_self(&mut self, varlist: SeriesId) -> Result<u32, Fail> {
        let index = self.ctx_append(varlist, SYM_SELF)?;
        let keylist = self.ctx_keylist(varlist);
        let arr = self.pool.get_mut(keylist).array_mut();
        let key = arr.get(index as usize).with_class(ParamClass::Local);
        arr.set(index as usize, key);
        let me = self.ctx_archetype(varlist);
        self.ctx_set(varlist, index, me);
        Ok(index)
    }

    /// Visible keys of a context, in order
    pub fn ctx_words(&self, varlist: SeriesId) -> Vec<(u32, Sym)> {
        (1..=self.ctx_len(varlist))
            .filter(|n| !self.ctx_key_hidden(varlist, *n))
            .map(|n| (n, self.ctx_key_sym(varlist, n)))
            .collect()
    }

    /// New context of the same kind; shallow copies share the keylist
    pub fn ctx_copy(&mut self, varlist: SeriesId, deep: bool) -> Result<SeriesId, Fail> {
        let keylist = self.ctx_keylist(varlist);
        let kind = self.ctx_archetype(varlist).kind;
        let values: Vec<Cell> = self.pool.get(varlist).array().as_slice()[1..].to_vec();

        self.pool.get_mut(keylist).set(flag::SHARED_KEYLIST);

        let fresh = self.alloc(Content::Array(Buffer::with_capacity(values.len() + 1)))?;
        self.guards.push(fresh);
        let result = (|| {
            {
                let series = self.pool.get_mut(fresh);
                series.set(flag::VARLIST);
                series.link = Link::Keylist(keylist);
                let arr = series.array_mut();
                arr.push(Cell::context(kind, fresh));
            }
            for v in values {
                let v = if deep && v.kind.is_series() {
                    self.copy_array_or_string(v, true)?
                } else {
                    v
                };
                self.pool.get_mut(fresh).array_mut().push(v);
            }

            // rebind the copied values that referred to the original
            if deep {
                let len = self.pool.get(fresh).len();
                for n in 1..len {
                    let v = self.pool.get(fresh).array().get(n);
                    if v.kind.is_array() {
                        self.rebind_array(v.series_id(), varlist, fresh);
                    } else if v.is_function() {
                        let rebound = self.rebind_function(v, varlist, fresh)?;
                        self.pool.get_mut(fresh).array_mut().set(n, rebound);
                    }
                }
            }
            Ok(())
        })();
        self.guards.pop();
        result?;

        // a hidden SELF names the copy, not the original
        if let Some(n) = self.ctx_find(fresh, SYM_SELF) {
            if self.ctx_key(fresh, n).key_class() == ParamClass::Local {
                let me = Cell::context(kind, fresh);
                self.pool.get_mut(fresh).array_mut().set(n as usize, me);
            }
        }

        self.pool.manage(fresh);
        Ok(fresh)
    }

    /// Moves words bound to `from` over to `to`, deeply
    pub fn rebind_array(&mut self, array: SeriesId, from: SeriesId, to: SeriesId) {
        let mut todo = vec![array];
        let mut seen = HashSet::new();
        while let Some(arr) = todo.pop() {
            if !seen.insert(arr) {
                continue;
            }
            let len = self.pool.get(arr).len();
            for n in 0..len {
                let cell = self.pool.get(arr).array().get(n);
                if cell.kind.is_word() && cell.binding == Binding::Specific(from) {
                    let moved = cell.with_binding(Binding::Specific(to));
                    self.pool.get_mut(arr).array_mut().set(n, moved);
                } else if cell.kind.is_array() {
                    todo.push(cell.series_id());
                }
            }
        }
    }

    /// Copy of an interpreted function whose body refers to `to`
    /// wherever the original referred to `from`
    fn rebind_function(&mut self, f: Cell, from: SeriesId, to: SeriesId) -> Result<Cell, Fail> {
        let holder = f.body_holder();
        let body = self.pool.get(holder).array().get(0);
        if !body.kind.is_array() || !matches!(self.dispatcher_of(f), Dispatcher::Interpreted | Dispatcher::Voider) {
            return Ok(f);
        }
        let copy = self.copy_function(f)?;
        let new_body = self.copy_array(body, None, true, TS_ANY_ARRAY)?;
        self.rebind_array(new_body, from, to);
        let body_cell = Cell::series(Kind::Block, new_body, 0).with_binding(body.binding);
        self.pool
            .get_mut(copy.body_holder())
            .array_mut()
            .set(0, body_cell);
        Ok(copy)
    }

    /// Set-words of an array (and, when `deep`, its nested arrays) not
    /// yet in `out`
    pub fn collect_set_words(&self, array: SeriesId, index: u32, deep: bool, out: &mut Vec<Sym>) {
        // resumable positions, so nested words come in source order
        let mut stack = vec![(array, index as usize)];
        let mut seen = HashSet::from([array]);
        'arrays: while let Some((id, from)) = stack.pop() {
            let arr = self.pool.get(id).array();
            for n in from..arr.len() {
                let cell = arr.get(n);
                if cell.kind == Kind::SetWord {
                    let canon = self.syms.canon(cell.spelling());
                    if !out.iter().any(|s| self.syms.canon(*s) == canon) {
                        out.push(cell.spelling());
                    }
                } else if deep && cell.kind.is_array() && seen.insert(cell.series_id()) {
                    stack.push((id, n + 1));
                    stack.push((cell.series_id(), 0));
                    continue 'arrays;
                }
            }
        }
    }

    /// Binds the words of an array (deeply) to a context. Bindings are
    /// not content, so frozen source may be bound.
    pub fn bind_array(
        &mut self,
        array: SeriesId,
        index: u32,
        varlist: SeriesId,
        mode: BindMode,
        deep: bool,
    ) -> Result<(), Fail> {
        if mode == BindMode::AddSetWords {
            let mut words = Vec::new();
            self.collect_set_words(array, index, deep, &mut words);
            for w in words {
                if self.ctx_find(varlist, w).is_none() {
                    self.ctx_append(varlist, w)?;
                }
            }
        }

        let mut todo = vec![(array, index as usize)];
        let mut seen = HashSet::new();
        while let Some((arr, start)) = todo.pop() {
            if !seen.insert(arr) {
                continue;
            }
            let len = self.pool.get(arr).len();
            for n in start..len {
                let cell = self.pool.get(arr).array().get(n);
                if cell.kind.is_word() {
                    let found = match self.ctx_find(varlist, cell.spelling()) {
                        Some(i) => Some(i),
                        None if mode == BindMode::AddAll => Some(self.ctx_append(varlist, cell.spelling())?),
                        None => None,
                    };
                    if let Some(i) = found {
                        let mut bound =
                            Cell::bound_word(cell.kind, cell.spelling(), Binding::Specific(varlist), i);
                        bound.flags = cell.flags;
                        self.pool.get_mut(arr).array_mut().set(n, bound);
                    }
                } else if deep && cell.kind.is_array() {
                    todo.push((cell.series_id(), 0));
                }
            }
        }
        Ok(())
    }

    /// Binds words naming parameters of `paramlist` relatively, so a
    /// running frame supplies their storage
    pub fn bind_relative(&mut self, array: SeriesId, paramlist: SeriesId) {
        let keys: Vec<(Sym, u32)> = {
            let arr = self.pool.get(paramlist).array();
            (1..arr.len())
                .map(|n| (self.syms.canon(arr.get(n).key_spelling()), n as u32))
                .collect()
        };

        let mut todo = vec![array];
        let mut seen = HashSet::new();
        while let Some(arr) = todo.pop() {
            if !seen.insert(arr) {
                continue;
            }
            let len = self.pool.get(arr).len();
            for n in 0..len {
                let cell = self.pool.get(arr).array().get(n);
                if cell.kind.is_word() {
                    let canon = self.syms.canon(cell.spelling());
                    if let Some((_, idx)) = keys.iter().find(|(k, _)| *k == canon) {
                        let mut bound =
                            Cell::bound_word(cell.kind, cell.spelling(), Binding::Relative(paramlist), *idx);
                        bound.flags = cell.flags;
                        self.pool.get_mut(arr).array_mut().set(n, bound);
                    }
                } else if cell.kind.is_array() {
                    let rel = cell.with_binding(Binding::Relative(paramlist));
                    self.pool.get_mut(arr).array_mut().set(n, rel);
                    todo.push(cell.series_id());
                }
            }
        }
    }

    /// Resolves a relative binding against a frame. The frame is handed
    /// to the collector, as the result may outlive the call.
    pub fn derelativize(&mut self, cell: Cell, specifier: Option<SeriesId>) -> Cell {
        match cell.binding {
            Binding::Relative(_) => match specifier {
                Some(spec) => {
                    self.pool.manage(spec);
                    cell.with_binding(Binding::Specific(spec))
                }
                None => cell.with_binding(Binding::Unbound),
            },
            _ => cell,
        }
    }

    /// Specifier to use for the contents of an array cell
    pub fn specifier_of(&self, cell: Cell) -> Option<SeriesId> {
        match cell.binding {
            Binding::Specific(s) if self.pool.is_live(s) && self.pool.get(s).has(flag::VARLIST) => Some(s),
            _ => None,
        }
    }

    /// Storage slot a word refers to
    pub fn var_slot(&mut self, word: Cell, specifier: Option<SeriesId>) -> Result<(SeriesId, u32), Fail> {
        let varlist = match word.binding {
            Binding::Specific(v) => Some(v),
            Binding::Relative(_) => specifier,
            Binding::Unbound => None,
        };
        match varlist {
            Some(v) if self.pool.is_live(v) && word.word_index() <= self.ctx_len(v) => Ok((v, word.word_index())),
            _ => {
                let w = word.with_kind(Kind::Word).with_binding(Binding::Unbound);
                Err(self.error(ErrId::NotBound, &[w]))
            }
        }
    }

    /// Value of a variable, void included
    pub fn get_var(&mut self, word: Cell, specifier: Option<SeriesId>) -> Result<Cell, Fail> {
        let (v, n) = self.var_slot(word, specifier)?;
        Ok(self.ctx_get(v, n))
    }

    /// Value of a variable, if the word is bound
    pub fn try_get_var(&self, word: Cell, specifier: Option<SeriesId>) -> Option<Cell> {
        let v = match word.binding {
            Binding::Specific(v) => v,
            Binding::Relative(_) => specifier?,
            Binding::Unbound => return None,
        };
        if self.pool.is_live(v) && word.word_index() <= self.ctx_len(v) {
            Some(self.ctx_get(v, word.word_index()))
        } else {
            None
        }
    }

    pub fn set_var(&mut self, word: Cell, specifier: Option<SeriesId>, value: Cell) -> Result<(), Fail> {
        let (v, n) = self.var_slot(word, specifier)?;
        if self.ctx_get(v, n).flags.has(CellFlags::PROTECTED) {
            let w = Cell::word(Kind::Word, word.spelling());
            return Err(self.error(ErrId::Protected, &[w]));
        }
        if self.pool.get(v).has(flag::FROZEN) {
            return Err(self.error(ErrId::LockedSeries, &[]));
        }
        self.ctx_set(v, n, value);
        Ok(())
    }

    /// Looks a name up in lib
    pub fn lib_get(&self, sym: Sym) -> Option<Cell> {
        self.ctx_find(self.lib, sym).map(|n| self.ctx_get(self.lib, n))
    }

    /// Sets a name in lib, adding it when new
    pub fn lib_set(&mut self, name: &str, value: Cell) -> Result<u32, Fail> {
        let sym = self.intern(name);
        let n = match self.ctx_find(self.lib, sym) {
            Some(n) => n,
            None => self.ctx_append(self.lib, sym)?,
        };
        let lib = self.lib;
        self.ctx_set(lib, n, value);
        Ok(n)
    }

    /// Binds freshly scanned code into the user context. Words new to
    /// user are added there and take lib's value when lib has one.
    pub fn bind_user(&mut self, array: SeriesId) -> Result<(), Fail> {
        let user = self.user;
        let before = self.ctx_len(user);
        self.bind_array(array, 0, user, BindMode::AddAll, true)?;
        let after = self.ctx_len(user);
        for n in before + 1..=after {
            let sym = self.ctx_key_sym(user, n);
            if let Some(val) = self.lib_get(sym) {
                self.ctx_set(user, n, val);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ren::cell::{Cell, Kind};
    use crate::ren::interp::{Interp, InterpConfig};

    fn interp() -> Interp {
        Interp::new(InterpConfig::default()).unwrap()
    }

    #[test]
    fn append_and_find() {
        let mut it = interp();
        let a = it.intern("alpha");
        let b = it.intern("Beta");
        let ctx = it.make_context(Kind::Object, &[a]).unwrap();
        assert_eq!(it.ctx_find(ctx, a), Some(1));
        assert_eq!(it.ctx_find(ctx, b), None);

        let n = it.ctx_append(ctx, b).unwrap();
        assert_eq!(n, 2);
        let upper = it.intern("BETA");
        assert_eq!(it.ctx_find(ctx, upper), Some(2));
        assert_eq!(it.ctx_len(ctx), 2);
    }

    #[test]
    fn shallow_copy_unshares_on_append() {
        let mut it = interp();
        let a = it.intern("a");
        let ctx = it.make_context(Kind::Object, &[a]).unwrap();
        it.ctx_set(ctx, 1, Cell::integer(1));

        let copy = it.ctx_copy(ctx, false).unwrap();
        assert_eq!(it.ctx_keylist(ctx), it.ctx_keylist(copy));
        assert_eq!(it.ctx_get(copy, 1).int(), 1);

        let b = it.intern("b");
        it.ctx_append(copy, b).unwrap();
        assert_ne!(it.ctx_keylist(ctx), it.ctx_keylist(copy));
        assert_eq!(it.ctx_len(ctx), 1);
        assert_eq!(it.ctx_len(copy), 2);
    }

    #[test]
    fn unbound_words_fail() {
        let mut it = interp();
        let w = Cell::word(Kind::Word, it.intern("nowhere"));
        let err = it.get_var(w, None).unwrap_err();
        let msg = it.to_ren_err(err);
        assert_eq!(msg.id(), Some("not-bound"));
    }
}
