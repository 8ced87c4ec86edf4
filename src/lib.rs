// src/lib.rs
//! Semantic-analysis core for the Marten compiler.
//!
//! The parser hands one AST per source file to a [`sema::Compilation`],
//! which builds the type universe, resolves inter-declaration dependencies,
//! type-checks every expression, folds constants and annotates the AST for
//! the code generator. Diagnostics accumulate; nothing aborts.

pub mod ast;
pub mod errors;
pub mod sema;
