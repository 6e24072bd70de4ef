//! Evaluation contexts and their scope chains.
//!
//! A [`Context`] is created for the program root, each imported module, each
//! struct definition and each struct instance.  Function calls and `for`
//! loops do not create contexts; they push a [`Scope`] onto the context the
//! function was defined in (or the loop runs in) and pop it on exit.
//!
//! Name lookup walks the scopes innermost first.  A `global` declaration in
//! the current frame redirects a name to the outermost scope of the nearest
//! non-struct context; a `nonlocal` declaration skips the declaring frame.
//! [`Find::Escaping`] lookups may continue into the previous context but
//! never past a module.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use super::gc::Gc;
use super::object::{DeepCopy, Dict, ObjRef};

pub type ContextRef = Rc<RefCell<Context>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Default,
    StructDef,
    Instance,
    Module,
}

/// How far [`find`] may look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Find {
    /// Innermost scope only.
    CurrentScope,
    /// Every scope of this context.
    AllScopes,
    /// Every scope, then previous contexts up to a module boundary.
    Escaping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decl {
    Global,
    Nonlocal,
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub vars: Dict,
    decls: HashMap<String, Decl>,
    /// First scope of a function call; declarations do not leak past it.
    frame: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub do_break: bool,
    pub do_continue: bool,
    pub do_return: bool,
}

impl Flags {
    pub fn any(&self) -> bool {
        self.do_break || self.do_continue || self.do_return
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub value: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Context {
    kind: ContextKind,
    prev: Weak<RefCell<Context>>,
    scopes: Vec<Scope>,
    pub stdout: String,
    pub stderr: String,
    pub aliases: BTreeMap<String, Alias>,
    pub flags: Flags,
}

impl Context {
    pub fn new(kind: ContextKind) -> Self {
        Context {
            kind,
            prev: Weak::new(),
            scopes: vec![Scope::default()],
            stdout: String::new(),
            stderr: String::new(),
            aliases: BTreeMap::new(),
            flags: Flags::default(),
        }
    }

    pub fn new_ref(kind: ContextKind) -> ContextRef {
        Rc::new(RefCell::new(Context::new(kind)))
    }

    /// Context nested in `prev`.  Modules never link to a previous context.
    pub fn nested(kind: ContextKind, prev: &ContextRef) -> ContextRef {
        let mut ctx = Context::new(kind);
        if kind != ContextKind::Module {
            ctx.prev = Rc::downgrade(prev);
        }
        Rc::new(RefCell::new(ctx))
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn prev(&self) -> Option<ContextRef> {
        self.prev.upgrade()
    }

    // ── Scopes ────────────────────────────────────────────────────────────────

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Push the first scope of a function call.
    pub fn push_frame(&mut self) {
        self.scopes.push(Scope {
            frame: true,
            ..Scope::default()
        });
    }

    /// Pop the innermost scope.  The outermost scope is never popped.
    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Variables of the outermost scope.
    pub fn globals(&self) -> &Dict {
        &self.scopes[0].vars
    }

    pub fn globals_mut(&mut self) -> &mut Dict {
        &mut self.scopes[0].vars
    }

    pub fn current_mut(&mut self) -> &mut Dict {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last].vars
    }

    /// Reset to a single empty scope, empty buffers and cleared flags.
    pub fn clear(&mut self) {
        self.scopes = vec![Scope::default()];
        self.stdout.clear();
        self.stderr.clear();
        self.aliases.clear();
        self.flags = Flags::default();
    }

    /// Declaration of `name` visible from the innermost scope, with the index
    /// of the scope that made it.
    fn decl(&self, name: &str) -> Option<(usize, Decl)> {
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if let Some(d) = scope.decls.get(name) {
                return Some((i, *d));
            }
            if scope.frame {
                break;
            }
        }
        None
    }

    pub fn declare_global(&mut self, name: &str) {
        let last = self.scopes.len() - 1;
        self.scopes[last].decls.insert(name.to_owned(), Decl::Global);
    }

    /// Declare `name` nonlocal; fails if no enclosing scope binds it.
    pub fn declare_nonlocal(&mut self, name: &str) -> Result<(), String> {
        let last = self.scopes.len() - 1;
        if !self.scopes[..last].iter().any(|s| s.vars.contains(name)) {
            return Err(format!("no binding for nonlocal \"{name}\" found"));
        }
        self.scopes[last].decls.insert(name.to_owned(), Decl::Nonlocal);
        Ok(())
    }

    /// Lookup within this context only, honoring declarations.  `Err` means
    /// the name is declared global and must be looked up elsewhere.
    fn find_here(&self, name: &str, all: bool) -> Result<Option<ObjRef>, ()> {
        let mut below = self.scopes.len();
        if let Some((i, d)) = self.decl(name) {
            match d {
                Decl::Global if self.kind == ContextKind::StructDef || self.kind == ContextKind::Instance => {
                    return Err(())
                }
                Decl::Global => return Ok(self.scopes[0].vars.get(name).cloned()),
                Decl::Nonlocal => below = i,
            }
        }
        let scopes = &self.scopes[..below];
        if !all {
            return Ok(scopes.last().and_then(|s| s.vars.get(name).cloned()));
        }
        Ok(scopes.iter().rev().find_map(|s| s.vars.get(name).cloned()))
    }

    // ── Copies ────────────────────────────────────────────────────────────────

    /// Same bindings in a fresh context.
    pub fn shallow_copy(&self) -> Context {
        let mut copy = self.clone();
        copy.kind = ContextKind::Instance;
        copy.stdout.clear();
        copy.stderr.clear();
        copy.flags = Flags::default();
        copy
    }

    /// Fresh context whose variables are deep copies.
    pub fn deep_copy(&self, gc: &Gc) -> Context {
        self.deep_copy_with(&mut DeepCopy::new(gc))
    }

    /// Deep copy sharing a pass with the enclosing object copy.
    pub(crate) fn deep_copy_with(&self, copier: &mut DeepCopy<'_>) -> Context {
        let mut copy = self.shallow_copy();
        for scope in &mut copy.scopes {
            let mut vars = Dict::new();
            for (k, v) in scope.vars.iter() {
                vars.set(k, copier.copy(v));
            }
            scope.vars = vars;
        }
        copy
    }
}

/// Context that receives `global` names for `ctx`: the first context,
/// following previous links from `ctx`, that is not a struct.
fn global_target(ctx: &ContextRef) -> ContextRef {
    let mut cur = Rc::clone(ctx);
    loop {
        let next = {
            let c = cur.borrow();
            match c.kind {
                ContextKind::StructDef | ContextKind::Instance => c.prev(),
                ContextKind::Default | ContextKind::Module => None,
            }
        };
        match next {
            Some(prev) => cur = prev,
            None => return cur,
        }
    }
}

/// Look `name` up starting at `ctx`.
pub fn find(ctx: &ContextRef, name: &str, mode: Find) -> Option<ObjRef> {
    let mut cur = Rc::clone(ctx);
    loop {
        let (found, kind, prev) = {
            let c = cur.borrow();
            (c.find_here(name, mode != Find::CurrentScope), c.kind, c.prev())
        };
        match found {
            Ok(Some(obj)) => return Some(obj),
            Ok(None) => {}
            Err(()) => {
                let target = global_target(&cur);
                let t = target.borrow();
                return t.scopes[0].vars.get(name).cloned();
            }
        }
        if mode != Find::Escaping || kind == ContextKind::Module {
            return None;
        }
        cur = prev?;
    }
}

/// Bind `name` to `value` from within `ctx`.
///
/// `global` names go to the outermost scope of the global target,
/// `nonlocal` names to the nearest enclosing scope that binds them, and
/// everything else to the innermost scope.
pub fn assign(ctx: &ContextRef, name: &str, value: ObjRef) {
    let target = {
        let mut c = ctx.borrow_mut();
        match c.decl(name) {
            Some((_, Decl::Global)) if matches!(c.kind, ContextKind::StructDef | ContextKind::Instance) => {
                true
            }
            Some((_, Decl::Global)) => {
                c.scopes[0].vars.set(name, value);
                return;
            }
            Some((i, Decl::Nonlocal)) => {
                let idx = c.scopes[..i]
                    .iter()
                    .rposition(|s| s.vars.contains(name))
                    .unwrap_or(0);
                c.scopes[idx].vars.set(name, value);
                return;
            }
            None => {
                c.current_mut().set(name, value);
                return;
            }
        }
    };
    if target {
        let t = global_target(ctx);
        t.borrow_mut().globals_mut().set(name, value);
    }
}

/// Update an existing binding wherever it is visible.  Returns `false` if
/// `name` is not bound.
pub fn reassign(ctx: &ContextRef, name: &str, value: ObjRef) -> bool {
    if find(ctx, name, Find::AllScopes).is_some() {
        let declared = ctx.borrow().decl(name).is_some();
        if declared {
            assign(ctx, name, value);
        } else {
            let mut c = ctx.borrow_mut();
            if let Some(scope) = c.scopes.iter_mut().rev().find(|s| s.vars.contains(name)) {
                scope.vars.set(name, value);
            }
        }
        return true;
    }
    // Visible only through a previous context.
    let mut cur = ctx.borrow().prev();
    while let Some(c) = cur {
        let next = {
            let mut b = c.borrow_mut();
            if let Some(scope) = b.scopes.iter_mut().rev().find(|s| s.vars.contains(name)) {
                scope.vars.set(name, value);
                return true;
            }
            if b.kind == ContextKind::Module {
                return false;
            }
            b.prev()
        };
        cur = next;
    }
    false
}
