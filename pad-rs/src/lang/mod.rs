//! The pad template language.
//!
//! Literal text passes through unchanged, `{@ ... @}` holds statements and
//! `{{ ... }}` (markers configurable) interpolates an expression:
//!
//! ```
//! use pad::lang::Kit;
//!
//! let mut kit = Kit::new();
//! let out = kit
//!     .compile_from_str("{@ for i = 0; i < 3; i += 1 @}{{ i }}{@ end @}")
//!     .unwrap();
//! assert_eq!(out, "012");
//! ```
//!
//! Pipeline: [`tokenizer`] → [`compiler`] (AST in [`nodes`]) →
//! [`traverser`], with values in [`object`] allocated from a [`gc`] arena
//! and variables held in [`context`] scopes.

pub mod builtins;
pub mod chain;
pub mod compiler;
pub mod context;
pub mod errors;
pub mod gc;
pub mod importer;
pub mod kit;
pub mod nodes;
pub mod object;
pub mod tokenizer;
pub mod tokens;
pub mod traverser;

pub use errors::{Diagnostic, DiagnosticKind, ErrStack};
pub use importer::FileLoader;
pub use kit::{Kit, KitOptions};
pub use tokenizer::TokenizerOptions;
