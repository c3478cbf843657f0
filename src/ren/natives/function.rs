// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/natives/function.rs

// Natives making, deriving and exiting functions

// <>

use super::super::{
    cell::*,
    context::BindMode,
    error::{ErrId, Fail},
    func::SpecKind,
    interp::Interp,
};
use super::{control::reduce_onto_stack, resolve_function};

/// Function values of a CHAIN pipeline, evaluated from its block
fn pipeline(it: &mut Interp, block: Cell) -> Result<Vec<Cell>, Fail> {
    let mark = reduce_onto_stack(it, block)?;
    let values: Vec<Cell> = it.ds.drain(mark..).collect();
    if values.is_empty() {
        return Err(it.error(ErrId::InvalidArg, &[block]));
    }
    values
        .into_iter()
        .map(|v| {
            if v.is_function() {
                Ok(v.unflagged())
            } else {
                Err(it.error(ErrId::ApplyNonFunction, &[v]))
            }
        })
        .collect()
}

/// Runs `def` bound into a fresh frame for `f`, then calls `f` with it
fn apply(it: &mut Interp, f: Cell, def: Cell) -> Result<Cell, Fail> {
    let varlist = it.make_frame_for(f)?;
    it.guards.push(varlist);
    let result = (|| {
        let code = it.copy_array(def, it.specifier_of(def), true, TS_ANY_ARRAY)?;
        it.guards.push(code);
        it.bind_array(code, 0, varlist, BindMode::Existing, true)?;
        let ran = it.do_array(code, 0, None);
        it.guards.pop();
        ran?;
        it.do_frame(Cell::frame(varlist, f.paramlist()))
    })();
    it.guards.pop();
    result
}

ren_fn! {
    const NATIVES;
    it;

    "func" "spec [block!] body [block!]" {
        let (spec, body) = (it.arg(1), it.arg(2));
        it.make_interpreted(spec, body, SpecKind::Func, false)?
    }

    "proc" "spec [block!] body [block!]" {
        let (spec, body) = (it.arg(1), it.arg(2));
        it.make_interpreted(spec, body, SpecKind::Proc, false)?
    }

    "function" "spec [block!] body [block!]" {
        let (spec, body) = (it.arg(1), it.arg(2));
        it.make_interpreted(spec, body, SpecKind::Func, true)?
    }

    "procedure" "spec [block!] body [block!]" {
        let (spec, body) = (it.arg(1), it.arg(2));
        it.make_interpreted(spec, body, SpecKind::Proc, true)?
    }

    "specialize" "specializee [function! word! path!] def [block!]" {
        let def = it.arg(2);
        let f = it.arg(1);
        let (f, _) = resolve_function(it, f)?;
        it.specialize(f, def)?
    }

    "adapt" "adaptee [function! word! path!] prelude [block!]" {
        let prelude = it.arg(2);
        let f = it.arg(1);
        let (f, _) = resolve_function(it, f)?;
        it.adapt(f, prelude)?
    }

    "chain" "pipeline [block!]" {
        let block = it.arg(1);
        let fns = pipeline(it, block)?;
        it.chain(&fns)?
    }

    "enclose" "inner [function! word! path!] outer [function! word! path!]" {
        let inner = it.arg(1);
        let (inner, _) = resolve_function(it, inner)?;
        let outer = it.arg(2);
        let (outer, _) = resolve_function(it, outer)?;
        it.enclose(inner, outer)?
    }

    "hijack" "victim [function! word! path!] hijacker [function! word! path!]" {
        let victim = it.arg(1);
        let (victim, _) = resolve_function(it, victim)?;
        let hijacker = it.arg(2);
        let (hijacker, _) = resolve_function(it, hijacker)?;
        it.hijack(victim, hijacker)?
    }

    "tighten" "action [function! word! path!]" {
        let f = it.arg(1);
        let (f, _) = resolve_function(it, f)?;
        it.tighten(f)?
    }

    "enfix" "action [function!]" {
        let mut f = it.arg(1);
        f.flags.set(CellFlags::ENFIX);
        f
    }

    "enfix?" "source [any-word! function!]" {
        let source = it.arg(1);
        let value = if source.is_function() {
            Some(source)
        } else {
            it.try_get_var(source, None)
        };
        Cell::logic(value.is_some_and(|v| v.is_enfixed()))
    }

    "apply" "action [function! word! path!] def [block!]" {
        let def = it.arg(2);
        let f = it.arg(1);
        let (f, _) = resolve_function(it, f)?;
        apply(it, f, def)?
    }

    "return" "value [<opt> <end> any-value!]" {
        let value = it.arg(1);
        let binding = it.frame().binding;
        let Binding::Specific(target) = binding else {
            return Err(it.error(ErrId::ReturnArchetype, &[]));
        };
        it.check_return(target, value)?;
        let label = it.archetypes.return_.with_binding(binding);
        return Err(it.throw(label, value));
    }

    "leave" "" {
        let binding = it.frame().binding;
        if !matches!(binding, Binding::Specific(_)) {
            return Err(it.error(ErrId::ReturnArchetype, &[]));
        }
        let label = it.archetypes.leave.with_binding(binding);
        return Err(it.throw(label, Cell::VOID));
    }
}

#[cfg(test)]
mod tests {
    use crate::ren::interp::{Interp, InterpConfig};

    fn interp() -> Interp {
        Interp::new(InterpConfig::default()).unwrap()
    }

    #[test]
    fn definitional_exits() {
        let mut it = interp();
        assert_eq!(it.interpret("f: func [] [return 10 20] f").unwrap(), "10");
        assert_eq!(it.interpret("p: proc [] [leave 5] p").unwrap(), "");
        assert_eq!(it.interpret("g: func [x] [if x > 1 [return \"big\"] \"small\"] g 0").unwrap(), "\"small\"");
        // an inner function's RETURN belongs to the inner function
        let src = "outer: func [] [inner: func [] [return 1] inner 2] outer";
        assert_eq!(it.interpret(src).unwrap(), "2");
    }

    #[test]
    fn return_type_checked() {
        let mut it = interp();
        let err = it.interpret("f: func [return: [integer!]] [return \"s\"] f").unwrap_err();
        assert_eq!(err.id(), Some("bad-return-type"));
        let err = it.interpret("return 1").unwrap_err();
        assert_eq!(err.id(), Some("return-archetype"));
    }

    #[test]
    fn function_gathers_locals() {
        let mut it = interp();
        it.interpret("x: 1 f: function [] [x: 2 x]").unwrap();
        assert_eq!(it.interpret("f").unwrap(), "2");
        assert_eq!(it.interpret("x").unwrap(), "1");
    }

    #[test]
    fn derivations() {
        let mut it = interp();
        assert_eq!(it.interpret("add10: specialize 'add [value1: 10] add10 5").unwrap(), "15");
        assert_eq!(it.interpret("a: adapt 'add [value1: value1 * 2] a 3 1").unwrap(), "7");
        assert_eq!(it.interpret("c: chain [:add :negate] c 1 2").unwrap(), "-3");
        let src = "e: enclose 'add func [f [frame!]] [f/value1: 100 do f] e 1 2";
        assert_eq!(it.interpret(src).unwrap(), "102");
        assert_eq!(it.interpret("apply :append [series: copy [1] value: 2]").unwrap(), "[1 2]");
    }

    #[test]
    fn hijack_follows_tightened_operators() {
        let mut it = interp();
        let src = "old: hijack 'add func [a b] [a * b] r: 1 + 2 hijack 'add :old r";
        assert_eq!(it.interpret(src).unwrap(), "2");
        assert_eq!(it.interpret("1 + 2").unwrap(), "3");
    }

    #[test]
    fn enfix_flag() {
        let mut it = interp();
        assert_eq!(it.interpret("enfix? '+").unwrap(), "true");
        assert_eq!(it.interpret("enfix? 'add").unwrap(), "false");
        assert_eq!(it.interpret("minus: enfix :subtract 10 minus 4").unwrap(), "6");
    }
}
