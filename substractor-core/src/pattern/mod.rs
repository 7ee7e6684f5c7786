//! Pattern tokenization and compilation for the Substractor mini-language.
//!
//! A Substractor pattern is literal text with `*` (zero or more characters),
//! `?` (exactly one character) and `{name}` macro tokens. This module turns a
//! pattern into a [`compiler::CompiledMatcher`] backed by the `regex` crate.

pub mod compiler;
pub mod tokenizer;
