//! Diagnostics stack.
//!
//! Every fallible engine operation returns `Result<T, ErrStack>`.  The stack
//! is ordered innermost first: the record describing the actual failure is
//! pushed first, and each layer that wraps the failure (a function call, an
//! import, a compile step) appends its own record after it with
//! [`ErrStack::wrap`].  Rendering walks the records in that order, so the
//! trace reads like a call stack printed from the failing frame outwards.

use std::fmt;

use super::tokens::Pos;

// ── Kinds ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Lexical error (bad character, unterminated string or block).
    Syntax,
    /// Grammar or static-check error raised by the compiler.
    Compile,
    /// Evaluation error.
    Runtime,
    /// Module could not be located, loaded, or bound.
    Import,
    /// A state the engine believes impossible.
    Internal,
    /// Script asked to stop via `exit()` or `die()`.
    Exit(i32),
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Syntax => f.write_str("syntax error"),
            DiagnosticKind::Compile => f.write_str("compile error"),
            DiagnosticKind::Runtime => f.write_str("runtime error"),
            DiagnosticKind::Import => f.write_str("import error"),
            DiagnosticKind::Internal => f.write_str("internal error"),
            DiagnosticKind::Exit(code) => write!(f, "exit({code})"),
        }
    }
}

// ── Diagnostic ────────────────────────────────────────────────────────────────

/// Where in the engine's own source a diagnostic was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub file: &'static str,
    pub line: u32,
    pub function: &'static str,
}

/// One error record.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub origin: Origin,
    /// Position in the template program, when the failure has one.
    pub pos: Option<Pos>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, origin: Origin, pos: Option<&Pos>, message: String) -> Self {
        Diagnostic {
            kind,
            origin,
            pos: pos.cloned(),
            message,
        }
    }

    /// Name of the program the failure happened in (`"<string>"` for
    /// anonymous sources).
    pub fn program_name(&self) -> Option<&str> {
        self.pos.as_ref().map(|p| p.source.name.as_str())
    }

    /// 1-based line within the program.
    pub fn program_line(&self) -> Option<usize> {
        self.pos.as_ref().map(|p| p.line)
    }

    /// Full source text of the program.
    pub fn source(&self) -> Option<&str> {
        self.pos.as_ref().map(|p| p.source.text.as_str())
    }

    /// Byte offset into [`source`](Self::source).
    pub fn offset(&self) -> Option<usize> {
        self.pos.as_ref().map(|p| p.offset)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pos {
            Some(pos) => write!(f, "{}:{}: {}", pos.source.name, pos.line, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Build a [`Diagnostic`] stamped with the caller's file, line and module.
///
/// `diag!(Runtime, Some(&node.pos), "\"{}\" is not defined", name)`
macro_rules! diag {
    ($kind:ident, $pos:expr, $($arg:tt)*) => {
        $crate::lang::errors::Diagnostic::new(
            $crate::lang::errors::DiagnosticKind::$kind,
            $crate::lang::errors::Origin {
                file: file!(),
                line: line!(),
                function: module_path!(),
            },
            $pos,
            format!($($arg)*),
        )
    };
}
pub(crate) use diag;

/// Shorthand for a single-record [`ErrStack`].
macro_rules! fail {
    ($kind:ident, $pos:expr, $($arg:tt)*) => {
        $crate::lang::errors::ErrStack::from($crate::lang::errors::diag!($kind, $pos, $($arg)*))
    };
}
pub(crate) use fail;

// ── ErrStack ──────────────────────────────────────────────────────────────────

/// Ordered list of diagnostics, innermost failure first.
#[derive(Debug, Clone, Default)]
pub struct ErrStack {
    records: Vec<Diagnostic>,
}

impl ErrStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack holding the single request to stop with `code`.
    pub fn exit(code: i32, pos: Option<&Pos>) -> Self {
        let origin = Origin {
            file: file!(),
            line: line!(),
            function: module_path!(),
        };
        Diagnostic::new(DiagnosticKind::Exit(code), origin, pos, format!("exit({code})")).into()
    }

    pub fn push(&mut self, d: Diagnostic) {
        self.records.push(d);
    }

    /// Append an outer record describing the operation that failed.
    pub fn wrap(mut self, d: Diagnostic) -> Self {
        // An exit request is not a failure; keep it unadorned.
        if self.exit_code().is_none() {
            self.records.push(d);
        }
        self
    }

    pub fn extend(&mut self, other: ErrStack) {
        self.records.extend(other.records);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.records.iter()
    }

    /// The record describing the actual failure.
    pub fn innermost(&self) -> Option<&Diagnostic> {
        self.records.first()
    }

    /// Status requested by `exit()`/`die()`, if that is what stopped evaluation.
    pub fn exit_code(&self) -> Option<i32> {
        self.records.iter().find_map(|d| match d.kind {
            DiagnosticKind::Exit(code) => Some(code),
            _ => None,
        })
    }

    /// True if any record's message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.records.iter().any(|d| d.message.contains(needle))
    }

    /// Render the trace without the source snippet.
    pub fn trace(&self) -> String {
        let mut out = String::new();
        for d in &self.records {
            out.push_str(&d.to_string());
            out.push('\n');
        }
        out
    }

    /// The offending source line with a caret under the failing column.
    pub fn snippet(&self) -> Option<String> {
        let pos = self.records.iter().find_map(|d| d.pos.as_ref())?;
        let line = pos.line_text();
        let col = pos.column();
        let mut out = String::new();
        out.push_str(line.trim_end());
        out.push('\n');
        out.push_str(&" ".repeat(col));
        out.push('^');
        Some(out)
    }
}

impl From<Diagnostic> for ErrStack {
    fn from(d: Diagnostic) -> Self {
        ErrStack { records: vec![d] }
    }
}

impl<'a> IntoIterator for &'a ErrStack {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl fmt::Display for ErrStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.trace())?;
        if let Some(snippet) = self.snippet() {
            writeln!(f)?;
            writeln!(f, "{snippet}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrStack {}

// ── Tests ─────────────────────────────────────────────────────────────────────
