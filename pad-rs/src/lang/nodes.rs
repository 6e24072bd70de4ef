//! AST node model.
//!
//! Every node owns its children.  Function bodies are shared behind `Rc` so
//! that a function object created at runtime keeps its body alive after the
//! AST that declared it is dropped; `Clone` therefore deep-copies everything
//! except function and inject bodies, which it shares.

use std::rc::Rc;

use super::tokens::Pos;

#[derive(Debug, Clone)]
pub struct Node {
    pub pos: Pos,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Postfix accessor in a chain: `.name`, `(args)`, `[index]`.
#[derive(Debug, Clone)]
pub enum Accessor {
    Dot(String),
    Call(Vec<Node>),
    Index(Box<Node>),
}

/// `name` or `name as alias` in a `from ... import` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportName {
    /// Name the member is bound to in the importing scope.
    pub fn bound_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<String>,
    /// Parent function bound as `super` during a call.
    pub extends: Option<String>,
    /// Declared with `met`: the receiver is passed as the first argument.
    pub is_method: bool,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    // ── Template structure ──
    Program(Vec<Node>),
    Text(String),
    CodeBlock(Vec<Node>),
    RefBlock(Box<Node>),

    // ── Statements ──
    Import {
        path: String,
        alias: String,
    },
    FromImport {
        path: String,
        names: Vec<ImportName>,
    },
    If {
        /// `if` and `elif` arms in order.
        arms: Vec<(Node, Vec<Node>)>,
        orelse: Option<Vec<Node>>,
    },
    For {
        init: Option<Box<Node>>,
        test: Option<Box<Node>>,
        update: Option<Box<Node>>,
        body: Vec<Node>,
    },
    Break,
    Continue,
    Return(Option<Box<Node>>),
    Block {
        name: String,
        body: Vec<Node>,
    },
    Inject {
        name: String,
        body: Rc<[Node]>,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Def(Rc<FuncDef>),
    Struct {
        name: String,
        body: Vec<Node>,
    },

    // ── Formulas ──
    /// `a = b = value`: every target receives the value.
    Assign {
        targets: Vec<Node>,
        value: Box<Node>,
    },
    /// `a, b = c, d`: the last list holds the values.
    MultiAssign(Vec<Vec<Node>>),
    /// `a, b` evaluated as an array.
    TestList(Vec<Node>),
    Or(Vec<Node>),
    And(Vec<Node>),
    Not(Box<Node>),
    Compare {
        first: Box<Node>,
        rest: Vec<(CompOp, Node)>,
    },
    /// `target op= value`, right associative.
    AugAssign {
        op: BinOp,
        target: Box<Node>,
        value: Box<Node>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Negative(Box<Node>),
    Chain {
        operand: Box<Node>,
        accessors: Vec<Accessor>,
    },

    // ── Atoms ──
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    Array(Vec<Node>),
    Dict(Vec<(Node, Node)>),
    Ident(String),
}

impl Node {
    pub fn new(pos: Pos, kind: NodeKind) -> Self {
        Node { pos, kind }
    }

    /// Visit this node and every descendant in pre-order.
    pub fn walk(&self, f: &mut dyn FnMut(&Node)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Number of nodes in this subtree.
    pub fn count(&self) -> usize {
        let mut n = 0;
        self.walk(&mut |_| n += 1);
        n
    }

    /// Direct children, in source order.
    pub fn children(&self) -> Vec<&Node> {
        let mut out: Vec<&Node> = Vec::new();
        match &self.kind {
            NodeKind::Program(nodes)
            | NodeKind::CodeBlock(nodes)
            | NodeKind::TestList(nodes)
            | NodeKind::Or(nodes)
            | NodeKind::And(nodes)
            | NodeKind::Array(nodes)
            | NodeKind::Block { body: nodes, .. }
            | NodeKind::Struct { body: nodes, .. } => out.extend(nodes),
            NodeKind::RefBlock(node) | NodeKind::Not(node) | NodeKind::Negative(node) => {
                out.push(node)
            }
            NodeKind::If { arms, orelse } => {
                for (test, body) in arms {
                    out.push(test);
                    out.extend(body);
                }
                if let Some(body) = orelse {
                    out.extend(body);
                }
            }
            NodeKind::For {
                init,
                test,
                update,
                body,
            } => {
                out.extend(init.as_deref());
                out.extend(test.as_deref());
                out.extend(update.as_deref());
                out.extend(body);
            }
            NodeKind::Return(value) => out.extend(value.as_deref()),
            NodeKind::Inject { body, .. } => out.extend(body.iter()),
            NodeKind::Def(def) => out.extend(&def.body),
            NodeKind::Assign { targets, value } => {
                out.extend(targets);
                out.push(value);
            }
            NodeKind::MultiAssign(lists) => {
                for list in lists {
                    out.extend(list);
                }
            }
            NodeKind::Compare { first, rest } => {
                out.push(first);
                out.extend(rest.iter().map(|(_, n)| n));
            }
            NodeKind::AugAssign { target, value, .. } => {
                out.push(target);
                out.push(value);
            }
            NodeKind::Binary { lhs, rhs, .. } => {
                out.push(lhs);
                out.push(rhs);
            }
            NodeKind::Chain { operand, accessors } => {
                out.push(operand);
                for acc in accessors {
                    match acc {
                        Accessor::Dot(_) => {}
                        Accessor::Call(args) => out.extend(args),
                        Accessor::Index(index) => out.push(index),
                    }
                }
            }
            NodeKind::Dict(items) => {
                for (k, v) in items {
                    out.push(k);
                    out.push(v);
                }
            }
            NodeKind::Text(_)
            | NodeKind::Import { .. }
            | NodeKind::FromImport { .. }
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Global(_)
            | NodeKind::Nonlocal(_)
            | NodeKind::Nil
            | NodeKind::Bool(_)
            | NodeKind::Int(_)
            | NodeKind::Str(_)
            | NodeKind::Ident(_) => {}
        }
        out
    }

    /// Short name of the node kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Program(_) => "program",
            NodeKind::Text(_) => "text block",
            NodeKind::CodeBlock(_) => "code block",
            NodeKind::RefBlock(_) => "reference block",
            NodeKind::Import { .. } => "import statement",
            NodeKind::FromImport { .. } => "from import statement",
            NodeKind::If { .. } => "if statement",
            NodeKind::For { .. } => "for statement",
            NodeKind::Break => "break statement",
            NodeKind::Continue => "continue statement",
            NodeKind::Return(_) => "return statement",
            NodeKind::Block { .. } => "block statement",
            NodeKind::Inject { .. } => "inject statement",
            NodeKind::Global(_) => "global statement",
            NodeKind::Nonlocal(_) => "nonlocal statement",
            NodeKind::Def(_) => "function definition",
            NodeKind::Struct { .. } => "struct definition",
            NodeKind::Assign { .. } => "assignment",
            NodeKind::MultiAssign(_) => "multiple assignment",
            NodeKind::TestList(_) => "test list",
            NodeKind::Or(_) => "or expression",
            NodeKind::And(_) => "and expression",
            NodeKind::Not(_) => "not expression",
            NodeKind::Compare { .. } => "comparison",
            NodeKind::AugAssign { .. } => "augmented assignment",
            NodeKind::Binary { .. } => "binary expression",
            NodeKind::Negative(_) => "negative expression",
            NodeKind::Chain { .. } => "chain",
            NodeKind::Nil => "nil",
            NodeKind::Bool(_) => "bool",
            NodeKind::Int(_) => "int",
            NodeKind::Str(_) => "string",
            NodeKind::Array(_) => "array literal",
            NodeKind::Dict(_) => "dict literal",
            NodeKind::Ident(_) => "identifier",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::tokens::Source;

    fn node(kind: NodeKind) -> Node {
        let src = Source::new("t", "");
        Node::new(Pos::new(&src, 1, 0), kind)
    }

    #[test]
    fn walk_visits_every_descendant() {
        let sum = node(NodeKind::Binary {
            op: BinOp::Add,
            lhs: Box::new(node(NodeKind::Int(1))),
            rhs: Box::new(node(NodeKind::Chain {
                operand: Box::new(node(NodeKind::Ident("f".into()))),
                accessors: vec![
                    Accessor::Dot("g".into()),
                    Accessor::Call(vec![node(NodeKind::Int(2)), node(NodeKind::Int(3))]),
                ],
            })),
        });
        assert_eq!(sum.count(), 6);

        let mut ints = Vec::new();
        sum.walk(&mut |n| {
            if let NodeKind::Int(i) = n.kind {
                ints.push(i);
            }
        });
        assert_eq!(ints, vec![1, 2, 3]);
    }

    #[test]
    fn clone_shares_function_bodies() {
        let def = Rc::new(FuncDef {
            name: "f".into(),
            params: vec![],
            extends: None,
            is_method: false,
            body: vec![node(NodeKind::Text("x".into()))],
        });
        let a = node(NodeKind::Def(Rc::clone(&def)));
        let b = a.clone();
        match (&a.kind, &b.kind) {
            (NodeKind::Def(x), NodeKind::Def(y)) => assert!(Rc::ptr_eq(x, y)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn import_name_binding() {
        let plain = ImportName { name: "a".into(), alias: None };
        let renamed = ImportName { name: "a".into(), alias: Some("b".into()) };
        assert_eq!(plain.bound_name(), "a");
        assert_eq!(renamed.bound_name(), "b");
    }
}
