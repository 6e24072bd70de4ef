//! Token and source-position types shared by the tokenizer and compiler.

use std::fmt;
use std::rc::Rc;

// ── Source positions ──────────────────────────────────────────────────────────

/// A program's name and full text.  Shared by every token and node that
/// points into it so diagnostics can quote the offending line.
#[derive(Debug, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub text: String,
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Rc<Source> {
        Rc::new(Source {
            name: name.into(),
            text: text.into(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Pos {
    pub source: Rc<Source>,
    /// 1-based line number.
    pub line: usize,
    /// Byte offset into `source.text`.
    pub offset: usize,
}

impl Pos {
    pub fn new(source: &Rc<Source>, line: usize, offset: usize) -> Self {
        Pos {
            source: Rc::clone(source),
            line,
            offset,
        }
    }

    fn line_start(&self) -> usize {
        let text = &self.source.text;
        let end = self.offset.min(text.len());
        text[..end].rfind('\n').map_or(0, |i| i + 1)
    }

    /// The whole source line containing this position.
    pub fn line_text(&self) -> &str {
        let text = &self.source.text;
        let start = self.line_start();
        let end = text[start..].find('\n').map_or(text.len(), |i| start + i);
        &text[start..end]
    }

    /// 0-based column in characters.
    pub fn column(&self) -> usize {
        let start = self.line_start();
        let end = self.offset.min(self.source.text.len());
        self.source.text[start..end].chars().count()
    }
}

// ── Tokens ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal template text outside any block.
    Text(String),
    Newline,
    /// `{@`
    StmtOpen,
    /// `@}`
    StmtClose,
    /// Left expression marker (`{{` by default).
    RefOpen,
    /// Right expression marker (`}}` by default).
    RefClose,

    Ident(String),
    Str(String),
    Int(i64),

    // Punctuation
    Dot,
    Comma,
    Colon,
    Semicolon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Assignment
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Keywords
    Nil,
    True,
    False,
    Or,
    And,
    Not,
    End,
    Import,
    As,
    From,
    If,
    Elif,
    Else,
    For,
    Break,
    Continue,
    Return,
    Block,
    Inject,
    Global,
    Nonlocal,
    Struct,
    Def,
    Met,
    Extends,
}

/// Map an identifier-shaped word to its keyword token, if it is one.
pub fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "nil" => TokenKind::Nil,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "or" => TokenKind::Or,
        "and" => TokenKind::And,
        "not" => TokenKind::Not,
        "end" => TokenKind::End,
        "import" => TokenKind::Import,
        "as" => TokenKind::As,
        "from" => TokenKind::From,
        "if" => TokenKind::If,
        "elif" => TokenKind::Elif,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "return" => TokenKind::Return,
        "block" => TokenKind::Block,
        "inject" => TokenKind::Inject,
        "global" => TokenKind::Global,
        "nonlocal" => TokenKind::Nonlocal,
        "struct" => TokenKind::Struct,
        "def" => TokenKind::Def,
        "met" => TokenKind::Met,
        "extends" => TokenKind::Extends,
        _ => return None,
    };
    Some(kind)
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Text(_) => "text block",
            TokenKind::Newline => "newline",
            TokenKind::StmtOpen => "{@",
            TokenKind::StmtClose => "@}",
            TokenKind::RefOpen => "left reference marker",
            TokenKind::RefClose => "right reference marker",
            TokenKind::Ident(name) => return f.write_str(name),
            TokenKind::Str(s) => return write!(f, "\"{s}\""),
            TokenKind::Int(n) => return write!(f, "{n}"),
            TokenKind::Dot => ".",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Add => "+",
            TokenKind::Sub => "-",
            TokenKind::Mul => "*",
            TokenKind::Div => "/",
            TokenKind::Mod => "%",
            TokenKind::Assign => "=",
            TokenKind::AddAssign => "+=",
            TokenKind::SubAssign => "-=",
            TokenKind::MulAssign => "*=",
            TokenKind::DivAssign => "/=",
            TokenKind::ModAssign => "%=",
            TokenKind::Eq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Nil => "nil",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Or => "or",
            TokenKind::And => "and",
            TokenKind::Not => "not",
            TokenKind::End => "end",
            TokenKind::Import => "import",
            TokenKind::As => "as",
            TokenKind::From => "from",
            TokenKind::If => "if",
            TokenKind::Elif => "elif",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Return => "return",
            TokenKind::Block => "block",
            TokenKind::Inject => "inject",
            TokenKind::Global => "global",
            TokenKind::Nonlocal => "nonlocal",
            TokenKind::Struct => "struct",
            TokenKind::Def => "def",
            TokenKind::Met => "met",
            TokenKind::Extends => "extends",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

impl Token {
    /// The source line this token was read from.
    pub fn line_snippet(&self) -> &str {
        self.pos.line_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_round_trip_through_display() {
        for word in ["if", "elif", "extends", "nonlocal", "met", "nil"] {
            let kind = keyword(word).unwrap();
            assert_eq!(kind.to_string(), word);
        }
        assert!(keyword("iff").is_none());
    }

    #[test]
    fn pos_line_and_column() {
        let src = Source::new("x", "one\ntwo three\n");
        let p = Pos::new(&src, 2, 8);
        assert_eq!(p.line_text(), "two three");
        assert_eq!(p.column(), 4);
    }

    #[test]
    fn column_counts_chars_not_bytes() {
        let src = Source::new("x", "é{{ x }}");
        let p = Pos::new(&src, 1, "é{{ ".len());
        assert_eq!(p.column(), 4);
    }
}
