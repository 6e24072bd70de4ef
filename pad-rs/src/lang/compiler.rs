//! Recursive-descent compiler: token sequence → AST.
//!
//! One method per grammar production.  Expression productions return
//! `Ok(None)` when the current token cannot start them (nothing consumed) and
//! `Err` once they have committed to a production that turns out malformed.
//!
//! Precedence (lowest → highest):
//!   assignment  →  or  →  and  →  not  →  comparison  →  augmented
//!   assignment  →  additive  →  multiplicative  →  negation  →  chain  →
//!   atom
//!
//! Compound statements (`if`, `for`, `def`, `block`, `inject`) may leave
//! statement mode with `@}`, emit template text, and re-enter with `{@`.  A
//! `{@` that is not closed before the next `end`/`elif`/`else` belongs to the
//! enclosing statement, so its elements are spliced into that statement's
//! body instead of forming a nested code block.

use std::rc::Rc;

use super::errors::{fail, ErrStack};
use super::nodes::{Accessor, BinOp, CompOp, FuncDef, ImportName, Node, NodeKind};
use super::tokens::{Pos, Source, Token, TokenKind};

type Parsed<T> = Result<Option<T>, ErrStack>;

/// Deepest allowed nesting of expressions and compound statements.
const MAX_NESTING: usize = 32;

struct Compiler<'t> {
    tokens: &'t [Token],
    pos: usize,
    loop_depth: usize,
    func_depth: usize,
    nesting: usize,
    eof: Pos,
}

impl<'t> Compiler<'t> {
    fn new(tokens: &'t [Token], src: &Rc<Source>) -> Self {
        let line = src.text.matches('\n').count() + 1;
        Compiler {
            tokens,
            pos: 0,
            loop_depth: 0,
            func_depth: 0,
            nesting: 0,
            eof: Pos::new(src, line, src.text.len()),
        }
    }

    // ── Cursor ────────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn here(&self) -> Pos {
        self.tokens
            .get(self.pos)
            .map_or_else(|| self.eof.clone(), |t| t.pos.clone())
    }

    /// Runs one recursive production one level deeper.
    fn nested<T>(
        &mut self,
        production: impl FnOnce(&mut Self) -> Result<T, ErrStack>,
    ) -> Result<T, ErrStack> {
        if self.nesting >= MAX_NESTING {
            return Err(fail!(
                Compile,
                Some(&self.here()),
                "nesting too deep. limit is {MAX_NESTING} levels"
            ));
        }
        self.nesting += 1;
        let result = production(self);
        self.nesting -= 1;
        result
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    fn unexpected(&self, expected: &str) -> ErrStack {
        match self.peek() {
            Some(tok) => fail!(
                Compile,
                Some(&self.here()),
                "syntax error. unexpected token \"{tok}\". expected {expected}"
            ),
            None => fail!(Compile, Some(&self.here()), "syntax error. reached EOF. expected {expected}"),
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<(), ErrStack> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn ident(&mut self, expected: &str) -> Result<String, ErrStack> {
        match self.peek() {
            Some(TokenKind::Ident(name)) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn string(&mut self, expected: &str) -> Result<String, ErrStack> {
        match self.peek() {
            Some(TokenKind::Str(s)) => {
                self.pos += 1;
                Ok(s.clone())
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// Turn an optional production into a required one.
    fn require<T>(&self, parsed: Option<T>, expected: &str) -> Result<T, ErrStack> {
        parsed.ok_or_else(|| self.unexpected(expected))
    }

    // ── Template structure ────────────────────────────────────────────────────

    fn program(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        let mut nodes = Vec::new();
        self.blocks(&mut nodes, false)?;
        if self.peek().is_some() {
            return Err(self.unexpected("text or block"));
        }
        Ok(Node::new(pos, NodeKind::Program(nodes)))
    }

    /// Read text, reference and code blocks into `out`.
    ///
    /// Inside a compound statement (`nested`), returns after consuming a `{@`
    /// whose elements run into the statement's own `end`/`elif`/`else`.
    fn blocks(&mut self, out: &mut Vec<Node>, nested: bool) -> Result<(), ErrStack> {
        loop {
            let pos = self.here();
            match self.peek() {
                Some(TokenKind::Text(text)) => {
                    self.pos += 1;
                    out.push(Node::new(pos, NodeKind::Text(text.clone())));
                }
                Some(TokenKind::RefOpen) => {
                    let node = self.ref_block()?;
                    out.push(node);
                }
                Some(TokenKind::StmtOpen) => {
                    self.pos += 1;
                    let mut elems = Vec::new();
                    self.elems(&mut elems)?;
                    if self.eat(&TokenKind::StmtClose) {
                        out.push(Node::new(pos, NodeKind::CodeBlock(elems)));
                    } else if self.peek().is_none() {
                        return Err(fail!(
                            Compile,
                            Some(&pos),
                            "syntax error. reached EOF in code block"
                        ));
                    } else if nested {
                        out.extend(elems);
                        return Ok(());
                    } else {
                        return Err(self.unexpected("\"@}\""));
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn ref_block(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        self.pos += 1;
        let formula = self.formula()?;
        let formula = self.require(formula, "expression in reference block")?;
        if !self.eat(&TokenKind::RefClose) {
            return Err(fail!(
                Compile,
                Some(&self.here()),
                "syntax error. not found close of reference block"
            ));
        }
        Ok(Node::new(pos, NodeKind::RefBlock(Box::new(formula))))
    }

    /// Statement-mode elements, newline separated.
    fn elems(&mut self, out: &mut Vec<Node>) -> Result<(), ErrStack> {
        loop {
            self.skip_newlines();
            match self.elem()? {
                Some(node) => out.push(node),
                None => return Ok(()),
            }
        }
    }

    fn elem(&mut self) -> Parsed<Node> {
        let node = match self.peek() {
            Some(TokenKind::Def | TokenKind::Met) => self.nested(Self::def)?,
            Some(TokenKind::Struct) => self.nested(Self::struct_def)?,
            Some(TokenKind::Import) => self.import()?,
            Some(TokenKind::From) => self.from_import()?,
            Some(TokenKind::If) => self.nested(Self::if_stmt)?,
            Some(TokenKind::For) => self.nested(Self::for_stmt)?,
            Some(TokenKind::Break | TokenKind::Continue) => self.jump()?,
            Some(TokenKind::Return) => self.return_stmt()?,
            Some(TokenKind::Block | TokenKind::Inject) => self.nested(Self::block_stmt)?,
            Some(TokenKind::Global | TokenKind::Nonlocal) => self.declare()?,
            _ => return self.formula(),
        };
        Ok(Some(node))
    }

    /// Body of a compound statement: elements and template text up to (not
    /// including) the closing keyword.
    fn contents(&mut self) -> Result<Vec<Node>, ErrStack> {
        let mut body = Vec::new();
        loop {
            self.elems(&mut body)?;
            if !self.eat(&TokenKind::StmtClose) {
                return Ok(body);
            }
            self.blocks(&mut body, true)?;
        }
    }

    fn expect_end(&mut self, what: &str) -> Result<(), ErrStack> {
        if self.eat(&TokenKind::End) {
            return Ok(());
        }
        match self.peek() {
            None => Err(fail!(
                Compile,
                Some(&self.here()),
                "syntax error. not found \"end\" in {what}"
            )),
            Some(_) => Err(self.unexpected(&format!("\"end\" of {what}"))),
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn import(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        self.pos += 1;
        let path = self.string("module path after \"import\"")?;
        self.expect(&TokenKind::As, "\"as\" in import statement")?;
        let alias = self.ident("module name after \"as\"")?;
        Ok(Node::new(pos, NodeKind::Import { path, alias }))
    }

    fn from_import(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        self.pos += 1;
        let path = self.string("module path after \"from\"")?;
        self.expect(&TokenKind::Import, "\"import\" in from import statement")?;

        let paren = self.eat(&TokenKind::LParen);
        let mut names = Vec::new();
        loop {
            if paren {
                self.skip_newlines();
            }
            let name = self.ident("name to import")?;
            let alias = if self.eat(&TokenKind::As) {
                Some(self.ident("alias after \"as\"")?)
            } else {
                None
            };
            names.push(ImportName { name, alias });
            if paren {
                self.skip_newlines();
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        if paren {
            self.expect(&TokenKind::RParen, "\")\" in from import statement")?;
        }
        Ok(Node::new(pos, NodeKind::FromImport { path, names }))
    }

    fn if_stmt(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        self.pos += 1;
        let mut arms = Vec::new();
        let mut orelse = None;

        loop {
            let test = self.formula()?;
            let test = self.require(test, "condition")?;
            self.eat(&TokenKind::Colon);
            let body = self.contents()?;
            arms.push((test, body));

            if self.eat(&TokenKind::Elif) {
                continue;
            }
            if self.eat(&TokenKind::Else) {
                self.eat(&TokenKind::Colon);
                orelse = Some(self.contents()?);
            }
            self.expect_end("if statement")?;
            break;
        }
        Ok(Node::new(pos, NodeKind::If { arms, orelse }))
    }

    fn for_stmt(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        self.pos += 1;
        let (mut init, mut test, mut update) = (None, None, None);

        let bare = matches!(
            self.peek(),
            None | Some(TokenKind::Colon | TokenKind::StmtClose | TokenKind::Newline)
        );
        if !bare {
            let first = self.formula()?;
            if self.eat(&TokenKind::Semicolon) {
                init = first.map(Box::new);
                test = self.formula()?.map(Box::new);
                self.expect(&TokenKind::Semicolon, "\";\" in for statement")?;
                update = self.formula()?.map(Box::new);
            } else {
                test = Some(Box::new(self.require(first, "condition in for statement")?));
            }
        }
        self.eat(&TokenKind::Colon);

        self.loop_depth += 1;
        let body = self.contents();
        self.loop_depth -= 1;
        let body = body?;
        self.expect_end("for statement")?;

        Ok(Node::new(
            pos,
            NodeKind::For {
                init,
                test,
                update,
                body,
            },
        ))
    }

    fn jump(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        let (kind, word) = match self.advance().map(|t| &t.kind) {
            Some(TokenKind::Break) => (NodeKind::Break, "break"),
            _ => (NodeKind::Continue, "continue"),
        };
        if self.loop_depth == 0 {
            return Err(fail!(
                Compile,
                Some(&pos),
                "invalid {word} statement. not in loop"
            ));
        }
        Ok(Node::new(pos, kind))
    }

    fn return_stmt(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        self.pos += 1;
        if self.func_depth == 0 {
            return Err(fail!(
                Compile,
                Some(&pos),
                "invalid return statement. not in function"
            ));
        }
        let value = self.formula()?.map(Box::new);
        Ok(Node::new(pos, NodeKind::Return(value)))
    }

    fn block_stmt(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        let is_inject = self.at(&TokenKind::Inject);
        let word = if is_inject { "inject" } else { "block" };
        self.pos += 1;
        if self.func_depth == 0 {
            return Err(fail!(
                Compile,
                Some(&pos),
                "invalid {word} statement. not in function"
            ));
        }
        let name = self.ident(&format!("name of {word}"))?;
        self.eat(&TokenKind::Colon);
        let body = self.contents()?;
        self.expect_end(&format!("{word} statement"))?;

        let kind = if is_inject {
            NodeKind::Inject {
                name,
                body: body.into(),
            }
        } else {
            NodeKind::Block { name, body }
        };
        Ok(Node::new(pos, kind))
    }

    fn declare(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        let is_global = self.at(&TokenKind::Global);
        self.pos += 1;
        let mut names = vec![self.ident("variable name")?];
        while self.eat(&TokenKind::Comma) {
            names.push(self.ident("variable name")?);
        }
        let kind = if is_global {
            NodeKind::Global(names)
        } else {
            NodeKind::Nonlocal(names)
        };
        Ok(Node::new(pos, kind))
    }

    fn def(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        let is_method = self.at(&TokenKind::Met);
        self.pos += 1;
        let name = self.ident("function name")?;

        self.expect(&TokenKind::LParen, "\"(\" after function name")?;
        let mut params = Vec::new();
        self.skip_newlines();
        if !self.eat(&TokenKind::RParen) {
            loop {
                self.skip_newlines();
                params.push(self.ident("parameter name")?);
                self.skip_newlines();
                if self.eat(&TokenKind::RParen) {
                    break;
                }
                self.expect(&TokenKind::Comma, "\",\" or \")\" in parameter list")?;
            }
        }

        let extends = if self.eat(&TokenKind::Extends) {
            Some(self.ident("function name after \"extends\"")?)
        } else {
            None
        };
        self.eat(&TokenKind::Colon);

        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.func_depth += 1;
        let body = self.contents();
        self.func_depth -= 1;
        self.loop_depth = saved_loops;
        let body = body?;
        self.expect_end("function definition")?;

        let def = FuncDef {
            name,
            params,
            extends,
            is_method,
            body,
        };
        Ok(Node::new(pos, NodeKind::Def(Rc::new(def))))
    }

    fn struct_def(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        self.pos += 1;
        let name = self.ident("struct name")?;
        self.eat(&TokenKind::Colon);
        let mut body = Vec::new();
        self.elems(&mut body)?;
        self.expect_end("struct definition")?;
        Ok(Node::new(pos, NodeKind::Struct { name, body }))
    }

    // ── Formulas ──────────────────────────────────────────────────────────────

    fn formula(&mut self) -> Parsed<Node> {
        let pos = self.here();
        let Some(first) = self.test_list()? else {
            return Ok(None);
        };
        let mut lists = vec![first];
        while self.eat(&TokenKind::Assign) {
            let list = self.test_list()?;
            lists.push(self.require(list, "expression after \"=\"")?);
        }

        if lists.len() == 1 {
            let mut list = lists.remove(0);
            if list.len() == 1 {
                return Ok(list.pop());
            }
            return Ok(Some(Node::new(pos, NodeKind::TestList(list))));
        }

        for target in lists[..lists.len() - 1].iter().flatten() {
            check_target(target)?;
        }

        if lists.iter().all(|l| l.len() == 1) {
            let mut singles: Vec<Node> = lists.into_iter().flatten().collect();
            let value = singles.pop().map(Box::new);
            let value = self.require(value, "value")?;
            return Ok(Some(Node::new(
                pos,
                NodeKind::Assign {
                    targets: singles,
                    value,
                },
            )));
        }
        Ok(Some(Node::new(pos, NodeKind::MultiAssign(lists))))
    }

    fn test_list(&mut self) -> Parsed<Vec<Node>> {
        let Some(first) = self.test()? else {
            return Ok(None);
        };
        let mut list = vec![first];
        while self.eat(&TokenKind::Comma) {
            let test = self.test()?;
            list.push(self.require(test, "expression after \",\"")?);
        }
        Ok(Some(list))
    }

    fn test(&mut self) -> Parsed<Node> {
        self.nested(Self::or_test)
    }

    fn or_test(&mut self) -> Parsed<Node> {
        let pos = self.here();
        let Some(first) = self.and_test()? else {
            return Ok(None);
        };
        let mut operands = vec![first];
        while self.eat(&TokenKind::Or) {
            let rhs = self.and_test()?;
            operands.push(self.require(rhs, "expression after \"or\"")?);
        }
        if operands.len() == 1 {
            return Ok(operands.pop());
        }
        Ok(Some(Node::new(pos, NodeKind::Or(operands))))
    }

    fn and_test(&mut self) -> Parsed<Node> {
        let pos = self.here();
        let Some(first) = self.not_test()? else {
            return Ok(None);
        };
        let mut operands = vec![first];
        while self.eat(&TokenKind::And) {
            let rhs = self.not_test()?;
            operands.push(self.require(rhs, "expression after \"and\"")?);
        }
        if operands.len() == 1 {
            return Ok(operands.pop());
        }
        Ok(Some(Node::new(pos, NodeKind::And(operands))))
    }

    fn not_test(&mut self) -> Parsed<Node> {
        let pos = self.here();
        if self.eat(&TokenKind::Not) {
            let operand = self.nested(Self::not_test)?;
            let operand = self.require(operand, "expression after \"not\"")?;
            return Ok(Some(Node::new(pos, NodeKind::Not(Box::new(operand)))));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Parsed<Node> {
        let pos = self.here();
        let Some(first) = self.asscalc()? else {
            return Ok(None);
        };
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(TokenKind::Eq) => CompOp::Eq,
                Some(TokenKind::NotEq) => CompOp::NotEq,
                Some(TokenKind::Lt) => CompOp::Lt,
                Some(TokenKind::LtEq) => CompOp::LtEq,
                Some(TokenKind::Gt) => CompOp::Gt,
                Some(TokenKind::GtEq) => CompOp::GtEq,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.asscalc()?;
            rest.push((op, self.require(rhs, "expression after comparison operator")?));
        }
        if rest.is_empty() {
            return Ok(Some(first));
        }
        Ok(Some(Node::new(
            pos,
            NodeKind::Compare {
                first: Box::new(first),
                rest,
            },
        )))
    }

    fn asscalc(&mut self) -> Parsed<Node> {
        let pos = self.here();
        let Some(lhs) = self.expr()? else {
            return Ok(None);
        };
        let op = match self.peek() {
            Some(TokenKind::AddAssign) => BinOp::Add,
            Some(TokenKind::SubAssign) => BinOp::Sub,
            Some(TokenKind::MulAssign) => BinOp::Mul,
            Some(TokenKind::DivAssign) => BinOp::Div,
            Some(TokenKind::ModAssign) => BinOp::Mod,
            _ => return Ok(Some(lhs)),
        };
        self.pos += 1;
        check_target(&lhs)?;
        let value = self.nested(Self::asscalc)?;
        let value = self.require(value, "expression after augmented assignment")?;
        Ok(Some(Node::new(
            pos,
            NodeKind::AugAssign {
                op,
                target: Box::new(lhs),
                value: Box::new(value),
            },
        )))
    }

    fn expr(&mut self) -> Parsed<Node> {
        let Some(mut lhs) = self.term()? else {
            return Ok(None);
        };
        loop {
            let op = match self.peek() {
                Some(TokenKind::Add) => BinOp::Add,
                Some(TokenKind::Sub) => BinOp::Sub,
                _ => return Ok(Some(lhs)),
            };
            let pos = self.here();
            self.pos += 1;
            let rhs = self.term()?;
            let rhs = self.require(rhs, "operand")?;
            lhs = Node::new(
                pos,
                NodeKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
    }

    fn term(&mut self) -> Parsed<Node> {
        let Some(mut lhs) = self.negative()? else {
            return Ok(None);
        };
        loop {
            let op = match self.peek() {
                Some(TokenKind::Mul) => BinOp::Mul,
                Some(TokenKind::Div) => BinOp::Div,
                Some(TokenKind::Mod) => BinOp::Mod,
                _ => return Ok(Some(lhs)),
            };
            let pos = self.here();
            self.pos += 1;
            let rhs = self.negative()?;
            let rhs = self.require(rhs, "operand")?;
            lhs = Node::new(
                pos,
                NodeKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
    }

    fn negative(&mut self) -> Parsed<Node> {
        let pos = self.here();
        if self.eat(&TokenKind::Sub) {
            let operand = self.nested(Self::negative)?;
            let operand = self.require(operand, "operand after \"-\"")?;
            return Ok(Some(Node::new(pos, NodeKind::Negative(Box::new(operand)))));
        }
        self.chain()
    }

    fn chain(&mut self) -> Parsed<Node> {
        let pos = self.here();
        let Some(operand) = self.factor()? else {
            return Ok(None);
        };
        let mut accessors = Vec::new();
        loop {
            if self.eat(&TokenKind::Dot) {
                accessors.push(Accessor::Dot(self.ident("name after \".\"")?));
            } else if self.eat(&TokenKind::LParen) {
                accessors.push(Accessor::Call(self.call_args()?));
            } else if self.eat(&TokenKind::LBracket) {
                self.skip_newlines();
                let index = self.formula()?;
                let index = self.require(index, "index")?;
                self.skip_newlines();
                self.expect(&TokenKind::RBracket, "\"]\"")?;
                accessors.push(Accessor::Index(Box::new(index)));
            } else {
                break;
            }
        }
        if accessors.is_empty() {
            return Ok(Some(operand));
        }
        Ok(Some(Node::new(
            pos,
            NodeKind::Chain {
                operand: Box::new(operand),
                accessors,
            },
        )))
    }

    fn call_args(&mut self) -> Result<Vec<Node>, ErrStack> {
        let mut args = Vec::new();
        self.skip_newlines();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            self.skip_newlines();
            let arg = self.test()?;
            args.push(self.require(arg, "argument")?);
            self.skip_newlines();
            if self.eat(&TokenKind::RParen) {
                return Ok(args);
            }
            self.expect(&TokenKind::Comma, "\",\" or \")\" in call")?;
        }
    }

    fn factor(&mut self) -> Parsed<Node> {
        if self.eat(&TokenKind::LParen) {
            self.skip_newlines();
            let inner = self.formula()?;
            let inner = self.require(inner, "expression after \"(\"")?;
            self.skip_newlines();
            self.expect(&TokenKind::RParen, "\")\"")?;
            return Ok(Some(inner));
        }
        self.atom()
    }

    fn atom(&mut self) -> Parsed<Node> {
        let pos = self.here();
        let kind = match self.peek() {
            Some(TokenKind::Nil) => NodeKind::Nil,
            Some(TokenKind::True) => NodeKind::Bool(true),
            Some(TokenKind::False) => NodeKind::Bool(false),
            Some(TokenKind::Int(n)) => NodeKind::Int(*n),
            Some(TokenKind::Str(s)) => NodeKind::Str(s.clone()),
            Some(TokenKind::Ident(name)) => NodeKind::Ident(name.clone()),
            Some(TokenKind::LBracket) => return self.array().map(Some),
            Some(TokenKind::LBrace) => return self.dict().map(Some),
            _ => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(Node::new(pos, kind)))
    }

    fn array(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::RBracket) {
                break;
            }
            let item = self.test()?;
            items.push(self.require(item, "array element")?);
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBracket, "\",\" or \"]\" in array")?;
                break;
            }
        }
        Ok(Node::new(pos, NodeKind::Array(items)))
    }

    fn dict(&mut self) -> Result<Node, ErrStack> {
        let pos = self.here();
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            let key = self.test()?;
            let key = self.require(key, "dict key")?;
            self.skip_newlines();
            self.expect(&TokenKind::Colon, "\":\" after dict key")?;
            self.skip_newlines();
            let value = self.test()?;
            let value = self.require(value, "dict value")?;
            items.push((key, value));
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBrace, "\",\" or \"}\" in dict")?;
                break;
            }
        }
        Ok(Node::new(pos, NodeKind::Dict(items)))
    }
}

/// Only names, `x.field` and `x[i]` can be assigned to.
fn check_target(node: &Node) -> Result<(), ErrStack> {
    let ok = match &node.kind {
        NodeKind::Ident(_) => true,
        NodeKind::Chain { accessors, .. } => {
            matches!(accessors.last(), Some(Accessor::Dot(_) | Accessor::Index(_)))
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(fail!(
            Compile,
            Some(&node.pos),
            "can't assign to {}",
            node.kind_name()
        ))
    }
}

/// Compile a token sequence into a `Program` node.
pub fn compile(tokens: &[Token], src: &Rc<Source>) -> Result<Node, ErrStack> {
    let program = Compiler::new(tokens, src).program()?;
    log::debug!("compiled {}: {} nodes", src.name, program.count());
    Ok(program)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::tokenizer::{tokenize, TokenizerOptions};

    fn parse(text: &str) -> Result<Node, ErrStack> {
        let src = Source::new("test", text);
        let tokens = tokenize(&src, &TokenizerOptions::default())?;
        compile(&tokens, &src)
    }

    fn program(text: &str) -> Vec<Node> {
        match parse(text).expect("compile failed").kind {
            NodeKind::Program(nodes) => nodes,
            other => panic!("not a program: {other:?}"),
        }
    }

    /// Elements of the single code block in `text`.
    fn code(text: &str) -> Vec<Node> {
        let mut nodes = program(text);
        assert_eq!(nodes.len(), 1, "expected one block");
        match nodes.remove(0).kind {
            NodeKind::CodeBlock(elems) => elems,
            other => panic!("not a code block: {other:?}"),
        }
    }

    fn one(text: &str) -> Node {
        let mut elems = code(text);
        assert_eq!(elems.len(), 1);
        elems.remove(0)
    }

    #[test]
    fn text_and_ref_blocks() {
        let nodes = program("a{{ x }}b");
        assert!(matches!(&nodes[0].kind, NodeKind::Text(t) if t == "a"));
        assert!(matches!(&nodes[1].kind, NodeKind::RefBlock(n) if matches!(n.kind, NodeKind::Ident(_))));
        assert!(matches!(&nodes[2].kind, NodeKind::Text(t) if t == "b"));
    }

    #[test]
    fn empty_program() {
        assert!(program("").is_empty());
        assert!(code("{@ @}").is_empty());
        assert!(code("{@\n\n@}").is_empty());
    }

    #[test]
    fn elements_need_no_separator() {
        let elems = code("{@ a = 1 b = 2\n c = 3 @}");
        assert_eq!(elems.len(), 3);
        assert!(elems.iter().all(|n| matches!(n.kind, NodeKind::Assign { .. })));
    }

    #[test]
    fn precedence() {
        let n = one("{@ 1 + 2 * 3 @}");
        match n.kind {
            NodeKind::Binary { op: BinOp::Add, rhs, .. } => {
                assert!(matches!(rhs.kind, NodeKind::Binary { op: BinOp::Mul, .. }))
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn subtraction_is_left_associative() {
        let n = one("{@ 5 - 2 - 1 @}");
        match n.kind {
            NodeKind::Binary { op: BinOp::Sub, lhs, rhs } => {
                assert!(matches!(lhs.kind, NodeKind::Binary { op: BinOp::Sub, .. }));
                assert!(matches!(rhs.kind, NodeKind::Int(1)));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn comparison_chain_collapses() {
        let n = one("{@ 1 < 2 <= 3 @}");
        match n.kind {
            NodeKind::Compare { rest, .. } => {
                let ops: Vec<CompOp> = rest.iter().map(|(op, _)| *op).collect();
                assert_eq!(ops, vec![CompOp::Lt, CompOp::LtEq]);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn boolean_operators() {
        let n = one("{@ a or b and not c @}");
        match n.kind {
            NodeKind::Or(ops) => {
                assert_eq!(ops.len(), 2);
                match &ops[1].kind {
                    NodeKind::And(inner) => assert!(matches!(inner[1].kind, NodeKind::Not(_))),
                    other => panic!("{other:?}"),
                }
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn chain_accessors_in_order() {
        let n = one("{@ a.b(1, 2)[0].c @}");
        match n.kind {
            NodeKind::Chain { accessors, .. } => {
                assert_eq!(accessors.len(), 4);
                assert!(matches!(&accessors[0], Accessor::Dot(n) if n == "b"));
                assert!(matches!(&accessors[1], Accessor::Call(args) if args.len() == 2));
                assert!(matches!(&accessors[2], Accessor::Index(_)));
                assert!(matches!(&accessors[3], Accessor::Dot(n) if n == "c"));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn assignment_forms() {
        assert!(matches!(
            one("{@ a = b = 1 @}").kind,
            NodeKind::Assign { ref targets, .. } if targets.len() == 2
        ));
        assert!(matches!(
            one("{@ a, b = 1, 2 @}").kind,
            NodeKind::MultiAssign(ref lists) if lists.len() == 2
        ));
        assert!(matches!(one("{@ 1, 2 @}").kind, NodeKind::TestList(ref l) if l.len() == 2));
        assert!(matches!(
            one("{@ a += b -= 1 @}").kind,
            NodeKind::AugAssign { op: BinOp::Add, ref value, .. }
                if matches!(value.kind, NodeKind::AugAssign { op: BinOp::Sub, .. })
        ));
    }

    #[test]
    fn invalid_assignment_target() {
        assert!(parse("{@ 1 = 2 @}").unwrap_err().mentions("can't assign to int"));
        assert!(parse("{@ f() = 2 @}").unwrap_err().mentions("can't assign to chain"));
    }

    #[test]
    fn collections() {
        assert!(matches!(one("{@ [1, 2,\n 3,] @}").kind, NodeKind::Array(ref v) if v.len() == 3));
        assert!(matches!(one("{@ [] @}").kind, NodeKind::Array(ref v) if v.is_empty()));
        assert!(matches!(
            one("{@ {\"a\": 1, \"b\": [2]} @}").kind,
            NodeKind::Dict(ref v) if v.len() == 2
        ));
    }

    #[test]
    fn if_with_text_branches() {
        let nodes = program("{@ if x @}yes{@ elif y: @}maybe{@ else @}no{@ end @}");
        assert_eq!(nodes.len(), 1);
        let NodeKind::CodeBlock(elems) = &nodes[0].kind else { panic!() };
        match &elems[0].kind {
            NodeKind::If { arms, orelse } => {
                assert_eq!(arms.len(), 2);
                assert!(matches!(&arms[0].1[0].kind, NodeKind::Text(t) if t == "yes"));
                assert!(matches!(&arms[1].1[0].kind, NodeKind::Text(t) if t == "maybe"));
                let orelse = orelse.as_ref().unwrap();
                assert!(matches!(&orelse[0].kind, NodeKind::Text(t) if t == "no"));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn nested_code_block_inside_statement() {
        let nodes = program("{@ if x @}a{@ y = 1 @}b{@ end @}");
        let NodeKind::CodeBlock(elems) = &nodes[0].kind else { panic!() };
        let NodeKind::If { arms, .. } = &elems[0].kind else { panic!() };
        let kinds: Vec<&str> = arms[0].1.iter().map(|n| n.kind_name()).collect();
        assert_eq!(kinds, vec!["text block", "code block", "text block"]);
    }

    #[test]
    fn statement_elements_splice_into_body() {
        let nodes = program("{@ if x @}a{@ y = 1\n end @}");
        let NodeKind::CodeBlock(elems) = &nodes[0].kind else { panic!() };
        let NodeKind::If { arms, .. } = &elems[0].kind else { panic!() };
        let kinds: Vec<&str> = arms[0].1.iter().map(|n| n.kind_name()).collect();
        assert_eq!(kinds, vec!["text block", "assignment"]);
    }

    #[test]
    fn for_forms() {
        let n = one("{@ for i = 0; i < 3; i += 1: end @}");
        assert!(matches!(
            n.kind,
            NodeKind::For { init: Some(_), test: Some(_), update: Some(_), .. }
        ));
        let n = one("{@ for ;; : break end @}");
        assert!(matches!(n.kind, NodeKind::For { init: None, test: None, update: None, .. }));
        let n = one("{@ for x < 3: end @}");
        assert!(matches!(n.kind, NodeKind::For { init: None, test: Some(_), update: None, .. }));
        let n = one("{@ for\n break\n end @}");
        assert!(matches!(n.kind, NodeKind::For { test: None, ref body, .. } if body.len() == 1));
    }

    #[test]
    fn break_outside_loop() {
        let e = parse("{@ break @}").unwrap_err();
        assert!(e.mentions("invalid break statement. not in loop"));
        let e = parse("{@ for: def f(): continue end end @}").unwrap_err();
        assert!(e.mentions("not in loop"));
    }

    #[test]
    fn return_outside_function() {
        assert!(parse("{@ return 1 @}").unwrap_err().mentions("not in function"));
        assert!(parse("{@ def f(): for: return 1 end end @}").is_ok());
    }

    #[test]
    fn def_with_params_and_extends() {
        let n = one("{@ def f(a, b) extends g: return a end @}");
        match n.kind {
            NodeKind::Def(def) => {
                assert_eq!(def.name, "f");
                assert_eq!(def.params, vec!["a", "b"]);
                assert_eq!(def.extends.as_deref(), Some("g"));
                assert!(!def.is_method);
                assert_eq!(def.body.len(), 1);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn struct_with_fields_and_methods() {
        let n = one("{@ struct P:\n x = 0\n met get(self): return self.x end\n end @}");
        match n.kind {
            NodeKind::Struct { name, body } => {
                assert_eq!(name, "P");
                assert_eq!(body.len(), 2);
                assert!(matches!(&body[1].kind, NodeKind::Def(d) if d.is_method));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn block_and_inject_need_function() {
        assert!(parse("{@ block a: end @}").unwrap_err().mentions("not in function"));
        assert!(parse("{@ inject a: end @}").unwrap_err().mentions("not in function"));
        assert!(parse("{@ def f(): block a: @}x{@ end end @}").is_ok());
    }

    #[test]
    fn imports() {
        let n = one("{@ import \"lib.pad\" as lib @}");
        assert!(matches!(n.kind, NodeKind::Import { ref path, ref alias } if path == "lib.pad" && alias == "lib"));

        let n = one("{@ from \"lib.pad\" import (\n a,\n b as c\n) @}");
        match n.kind {
            NodeKind::FromImport { names, .. } => {
                assert_eq!(names.len(), 2);
                assert_eq!(names[1].bound_name(), "c");
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn global_and_nonlocal() {
        assert!(matches!(one("{@ global a, b @}").kind, NodeKind::Global(ref v) if v.len() == 2));
        assert!(matches!(one("{@ nonlocal a @}").kind, NodeKind::Nonlocal(ref v) if v.len() == 1));
    }

    #[test]
    fn missing_end() {
        let e = parse("{@ if x: y = 1 @}").unwrap_err();
        assert!(e.mentions("\"end\""), "{e}");
    }

    #[test]
    fn stray_end_at_top_level() {
        let e = parse("{@ end @}").unwrap_err();
        assert!(e.mentions("unexpected token \"end\""));
    }

    #[test]
    fn empty_ref_block() {
        assert!(parse("{{ }}").unwrap_err().mentions("expression in reference block"));
    }

    #[test]
    fn dangling_operator() {
        let e = parse("{{ 1 + }}").unwrap_err();
        assert!(e.mentions("expected operand"));
        assert_eq!(e.innermost().unwrap().offset(), Some(7));
    }

    #[test]
    fn moderate_nesting_compiles() {
        let text = format!("{{{{ {}1{} }}}}", "(".repeat(20), ")".repeat(20));
        assert!(parse(&text).is_ok());
        assert!(parse("{@ if a: if b: if c: x = [[[1]]] end end end @}").is_ok());
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let parens = format!("{{{{ {}1{} }}}}", "(".repeat(10_000), ")".repeat(10_000));
        let e = parse(&parens).unwrap_err();
        assert!(e.mentions("nesting too deep"), "{e}");

        let negs = format!("{{{{ {}1 }}}}", "-".repeat(10_000));
        assert!(parse(&negs).unwrap_err().mentions("nesting too deep"));

        let nots = format!("{{{{ {}x }}}}", "not ".repeat(10_000));
        assert!(parse(&nots).unwrap_err().mentions("nesting too deep"));

        let augs = format!("{{@ {}1 @}}", "x += ".repeat(10_000));
        assert!(parse(&augs).unwrap_err().mentions("nesting too deep"));

        let ifs = format!("{{@ {}{} @}}", "if a: ".repeat(10_000), "end ".repeat(10_000));
        assert!(parse(&ifs).unwrap_err().mentions("nesting too deep"));
    }
}
