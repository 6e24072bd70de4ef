//! Template tokenizer.
//!
//! A single forward scan over the source with three modes:
//!
//! | Mode        | Entered by      | Left by          | Produces |
//! |-------------|-----------------|------------------|----------|
//! | text        | start, `@}`, right marker | `{@`, left marker | one `Text` token per run |
//! | statement   | `{@`            | `@}`             | code tokens, `Newline`s, `/* */` comments |
//! | reference   | left marker     | right marker     | code tokens, newlines skipped |
//!
//! Any error aborts the scan; no partial token list is returned.

use std::rc::Rc;

use super::errors::{fail, ErrStack};
use super::tokens::{keyword, Pos, Source, Token, TokenKind};

// ── Options ───────────────────────────────────────────────────────────────────

/// Configurable expression-block markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerOptions {
    pub ldbrace: String,
    pub rdbrace: String,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        TokenizerOptions {
            ldbrace: "{{".to_owned(),
            rdbrace: "}}".to_owned(),
        }
    }
}

impl TokenizerOptions {
    pub fn new(ldbrace: &str, rdbrace: &str) -> Self {
        TokenizerOptions {
            ldbrace: ldbrace.to_owned(),
            rdbrace: rdbrace.to_owned(),
        }
    }

    /// Both markers must be exactly two characters, distinct, and must not
    /// collide with the statement-block markers.
    pub fn validate(&self) -> Result<(), ErrStack> {
        for (which, m) in [("left", &self.ldbrace), ("right", &self.rdbrace)] {
            if m.chars().count() != 2 {
                return Err(fail!(
                    Syntax,
                    None,
                    "invalid {which} reference marker \"{m}\". need two characters"
                ));
            }
            if m == "{@" || m == "@}" {
                return Err(fail!(
                    Syntax,
                    None,
                    "invalid {which} reference marker \"{m}\". reserved for code blocks"
                ));
            }
        }
        if self.ldbrace == self.rdbrace {
            return Err(fail!(Syntax, None, "reference markers must differ"));
        }
        Ok(())
    }
}

// ── Tokenizer ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Stmt,
    Ref,
}

struct Tokenizer<'a> {
    src: &'a Rc<Source>,
    chars: Vec<char>,
    left: Vec<char>,
    right: Vec<char>,
    i: usize,
    byte: usize,
    line: usize,
    mode: Mode,
    /// Pending literal text and where it started.
    text: String,
    text_pos: Option<Pos>,
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a Rc<Source>, opts: &TokenizerOptions) -> Self {
        Tokenizer {
            src,
            chars: src.text.chars().collect(),
            left: opts.ldbrace.chars().collect(),
            right: opts.rdbrace.chars().collect(),
            i: 0,
            byte: 0,
            line: 1,
            mode: Mode::Text,
            text: String::new(),
            text_pos: None,
            tokens: Vec::new(),
        }
    }

    fn here(&self) -> Pos {
        Pos::new(self.src, self.line, self.byte)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.i).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.i + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.i).copied()?;
        self.i += 1;
        self.byte += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn starts_with(&self, pat: &[char]) -> bool {
        self.chars[self.i..].starts_with(pat)
    }

    fn skip(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn push(&mut self, kind: TokenKind, pos: Pos) {
        self.tokens.push(Token { kind, pos });
    }

    fn flush_text(&mut self) {
        if let Some(pos) = self.text_pos.take() {
            let text = std::mem::take(&mut self.text);
            self.push(TokenKind::Text(text), pos);
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ErrStack> {
        while self.i < self.chars.len() {
            match self.mode {
                Mode::Text => self.scan_text(),
                Mode::Stmt | Mode::Ref => self.scan_code()?,
            }
        }
        match self.mode {
            Mode::Text => {
                self.flush_text();
                Ok(self.tokens)
            }
            Mode::Stmt => Err(fail!(Syntax, Some(&self.here()), "unterminated block. not found \"@}}\"")),
            Mode::Ref => {
                let right: String = self.right.iter().collect();
                Err(fail!(Syntax, Some(&self.here()), "unterminated block. not found \"{right}\""))
            }
        }
    }

    fn scan_text(&mut self) {
        if self.starts_with(&['{', '@']) {
            self.flush_text();
            let pos = self.here();
            self.skip(2);
            self.push(TokenKind::StmtOpen, pos);
            self.mode = Mode::Stmt;
        } else if self.starts_with(&self.left) {
            self.flush_text();
            let pos = self.here();
            self.skip(2);
            self.push(TokenKind::RefOpen, pos);
            self.mode = Mode::Ref;
        } else {
            if self.text_pos.is_none() {
                self.text_pos = Some(self.here());
            }
            if let Some(c) = self.advance() {
                self.text.push(c);
            }
        }
    }

    /// Read one code token (or skip whitespace/comments) inside a block.
    fn scan_code(&mut self) -> Result<(), ErrStack> {
        let pos = self.here();

        if self.mode == Mode::Stmt && self.starts_with(&['@', '}']) {
            self.skip(2);
            self.push(TokenKind::StmtClose, pos);
            self.mode = Mode::Text;
            return Ok(());
        }
        if self.mode == Mode::Ref && self.starts_with(&self.right) {
            self.skip(2);
            self.push(TokenKind::RefClose, pos);
            self.mode = Mode::Text;
            return Ok(());
        }

        let Some(c) = self.peek() else { return Ok(()) };
        match c {
            ' ' | '\t' | '\r' => {
                self.advance();
            }
            '\n' => {
                self.advance();
                if self.mode == Mode::Stmt {
                    self.push(TokenKind::Newline, pos);
                }
            }
            '/' if self.peek2() == Some('/') => self.skip_line_comment(),
            '/' if self.peek2() == Some('*') && self.mode == Mode::Stmt => {
                self.skip_block_comment(&pos)?
            }
            '"' => {
                self.advance();
                let s = self.read_string(&pos)?;
                self.push(TokenKind::Str(s), pos);
            }
            '0'..='9' => {
                let n = self.read_int(&pos)?;
                self.push(TokenKind::Int(n), pos);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let word = self.read_ident();
                let kind = keyword(&word).unwrap_or(TokenKind::Ident(word));
                self.push(kind, pos);
            }
            _ => {
                let kind = self.read_operator(&pos)?;
                self.push(kind, pos);
            }
        }
        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            if self.mode == Mode::Stmt && self.starts_with(&['@', '}']) {
                break;
            }
            if self.mode == Mode::Ref && self.starts_with(&self.right) {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self, pos: &Pos) -> Result<(), ErrStack> {
        self.skip(2);
        loop {
            if self.starts_with(&['*', '/']) {
                self.skip(2);
                return Ok(());
            }
            if self.advance().is_none() {
                return Err(fail!(Syntax, Some(pos), "unterminated comment. not found \"*/\""));
            }
        }
    }

    fn read_string(&mut self, pos: &Pos) -> Result<String, ErrStack> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(fail!(Syntax, Some(pos), "unterminated string literal")),
                Some('"') => return Ok(s),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('r') => s.push('\r'),
                    Some('t') => s.push('\t'),
                    Some('a') => s.push('\x07'),
                    Some('b') => s.push('\x08'),
                    Some('f') => s.push('\x0c'),
                    Some('v') => s.push('\x0b'),
                    Some('0') => s.push('\0'),
                    Some(c @ ('\\' | '\'' | '"')) => s.push(c),
                    // Unknown escapes are kept verbatim.
                    Some(c) => {
                        s.push('\\');
                        s.push(c);
                    }
                    None => return Err(fail!(Syntax, Some(pos), "unterminated string literal")),
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn read_int(&mut self, pos: &Pos) -> Result<i64, ErrStack> {
        let mut digits = String::new();
        while let Some(c @ '0'..='9') = self.peek() {
            digits.push(c);
            self.advance();
        }
        digits
            .parse::<i64>()
            .map_err(|_| fail!(Syntax, Some(pos), "integer literal \"{digits}\" is out of range"))
    }

    fn read_ident(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            word.push(c);
            self.advance();
        }
        word
    }

    fn read_operator(&mut self, pos: &Pos) -> Result<TokenKind, ErrStack> {
        let c = self.peek().unwrap_or('\0');
        let two = match (c, self.peek2()) {
            ('=', Some('=')) => Some(TokenKind::Eq),
            ('!', Some('=')) => Some(TokenKind::NotEq),
            ('<', Some('=')) => Some(TokenKind::LtEq),
            ('>', Some('=')) => Some(TokenKind::GtEq),
            ('+', Some('=')) => Some(TokenKind::AddAssign),
            ('-', Some('=')) => Some(TokenKind::SubAssign),
            ('*', Some('=')) => Some(TokenKind::MulAssign),
            ('/', Some('=')) => Some(TokenKind::DivAssign),
            ('%', Some('=')) => Some(TokenKind::ModAssign),
            _ => None,
        };
        if let Some(kind) = two {
            self.skip(2);
            return Ok(kind);
        }

        let kind = match c {
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '+' => TokenKind::Add,
            '-' => TokenKind::Sub,
            '*' => TokenKind::Mul,
            '/' => TokenKind::Div,
            '%' => TokenKind::Mod,
            '=' => TokenKind::Assign,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            other => {
                return Err(fail!(Syntax, Some(pos), "unsupported character \"{}\"", other.escape_debug()))
            }
        };
        self.advance();
        Ok(kind)
    }
}

/// Tokenize `src` with the given markers.
pub fn tokenize(src: &Rc<Source>, opts: &TokenizerOptions) -> Result<Vec<Token>, ErrStack> {
    opts.validate()?;
    let tokens = Tokenizer::new(src, opts).run()?;
    log::debug!("tokenized {}: {} tokens", src.name, tokens.len());
    Ok(tokens)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
