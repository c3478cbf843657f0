// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren.rs

// The Ren language runtime
//
// Values are fixed-size cells; every container is a series in the
// pool owned by an `Interp`, which also holds the symbol table, the
// lib and user contexts and the evaluation stack. Functions are built
// from paramlists and body holders, and may be derived from one
// another without copying their bodies.

// <>

pub mod cell;
pub mod compare;
pub mod context;
pub mod error;
pub mod eval;
pub mod func;
pub mod interp;
pub mod memmgt;
pub mod mold;
pub mod natives;
pub mod parser;
pub mod series;
pub mod symtab;
pub mod types;

pub use error::RenErr;
pub use interp::{Interp, InterpConfig};

/// Evaluates source text in a fresh interpreter, returning the molded
/// result; empty when the result is void
pub fn interpret(src: &str) -> Result<String, RenErr> {
    let mut it = Interp::new(InterpConfig::default())?;
    it.interpret(src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot() -> Result<(), RenErr> {
        assert_eq!(interpret("1 + 2")?, "3");
        assert_eq!(interpret("")?, "");
        assert_eq!(interpret("x: 5 x * x")?, "25");
        Ok(())
    }
}
