// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// tests/scenarios.rs

// Whole-language behavior through the embedding API

// <>

use renc::ren::{interpret, Interp, InterpConfig, RenErr};

fn interp() -> Interp {
    Interp::new(InterpConfig::default()).unwrap()
}

#[test]
fn typed_parameter() -> Result<(), RenErr> {
    let mut it = interp();
    it.interpret("inc: func [x [integer!]] [x + 1]")?;
    assert_eq!(it.interpret("inc 41")?, "42");
    let err = it.interpret("inc \"s\"").unwrap_err();
    assert_eq!(err.id(), Some("expect-arg"));
    Ok(())
}

#[test]
fn definitional_return() -> Result<(), RenErr> {
    assert_eq!(interpret("foo: func [] [return 10 20] foo")?, "10");
    Ok(())
}

#[test]
fn specialized_add() -> Result<(), RenErr> {
    let mut it = interp();
    it.interpret("add: specialize 'add [value1: 10]")?;
    assert_eq!(it.interpret("add 5")?, "15");
    Ok(())
}

#[test]
fn hijacked_add_reaches_operator() -> Result<(), RenErr> {
    let mut it = interp();
    it.interpret("hijack :add (func [a b] [a * b])")?;
    assert_eq!(it.interpret("1 + 2")?, "2");
    Ok(())
}

#[test]
fn tuple_reverse() -> Result<(), RenErr> {
    assert_eq!(interpret("reverse 1.2.3.4")?, "4.3.2.1");
    Ok(())
}

#[test]
fn append_only() -> Result<(), RenErr> {
    assert_eq!(interpret("b: append/only copy [] [a b] length-of b")?, "1");
    assert_eq!(interpret("append/only copy [] [a b]")?, "[[a b]]");
    Ok(())
}

#[test]
fn insert_then_remove_is_identity() -> Result<(), RenErr> {
    let src = "b: copy [1 2 3] insert at b 2 99 remove at b 2 b";
    assert_eq!(interpret(src)?, "[1 2 3]");
    Ok(())
}

#[test]
fn copies_of_loaded_blocks_are_mutable() -> Result<(), RenErr> {
    let mut it = interp();
    let err = it.interpret("b: [1 2] append b 3").unwrap_err();
    assert_eq!(err.id(), Some("locked-series"));
    assert_eq!(it.interpret("c: copy b append c 3")?, "[1 2 3]");
    assert_eq!(it.interpret("b = copy b")?, "true");
    Ok(())
}

#[test]
fn tighten_is_idempotent() -> Result<(), RenErr> {
    let mut it = interp();
    it.interpret("t1: enfix tighten :subtract t2: enfix tighten tighten :subtract")?;
    assert_eq!(it.interpret("10 t1 2 t1 3")?, it.interpret("10 t2 2 t2 3")?);
    Ok(())
}

#[test]
fn hijack_keeps_identity() -> Result<(), RenErr> {
    let mut it = interp();
    it.interpret("f: func [] [1] g: :f hijack 'f func [] [2]")?;
    assert_eq!(it.interpret("same? :f :g")?, "true");
    assert_eq!(it.interpret("g")?, "2");
    Ok(())
}

#[test]
fn cyclic_blocks_mold() -> Result<(), RenErr> {
    assert_eq!(interpret("a: copy [] append/only a a mold a")?, "\"[[...]]\"");
    Ok(())
}

#[test]
fn runaway_recursion_is_trappable() -> Result<(), RenErr> {
    assert_eq!(interpret("f: func [] [f] e: trap [f] e/id")?, "stack-overflow");
    Ok(())
}

#[test]
fn runaway_recursion_on_a_default_thread() {
    let id = std::thread::spawn(|| interpret("f: func [] [f] e: trap [f] e/id"))
        .join()
        .unwrap();
    assert_eq!(id, Ok("stack-overflow".to_string()));
}

#[test]
fn deep_nesting_on_a_default_thread() {
    let src = format!("{}1{}", "(".repeat(3000), ")".repeat(3000));
    let out = std::thread::spawn(move || interpret(&src)).join().unwrap();
    assert_eq!(out, Ok("1".to_string()));
}

#[test]
fn loops_and_errors_compose() -> Result<(), RenErr> {
    let src = "
        total: 0
        for-each x [1 2 0 4] [
            r: attempt [10 / x]
            if r [total: total + r]
        ]
        total
    ";
    assert_eq!(interpret(src)?, "17.5");
    Ok(())
}
