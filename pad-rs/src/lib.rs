//! Pad: an embeddable template language.
//!
//! [`lang`] holds the engine (tokenizer, compiler, evaluator, builtins) and
//! its host API, [`lang::Kit`].  [`cli`] and [`config`] back the `pad`
//! binary.

pub mod cli;
pub mod config;
pub mod lang;
