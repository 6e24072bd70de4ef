//! Tree-walking evaluator.
//!
//! [`Traverser::traverse`] executes a compiled program against a root
//! context.  Literal text and reference blocks append to the root context's
//! stdout buffer, which is the single output sink for the whole run
//! (imported modules included).
//!
//! Expressions evaluate to *raw* objects: an identifier yields an
//! [`Object::Ident`] handle and `a.b`/`a[i]` yield an [`Object::Chain`] with
//! the last accessor pending, so assignment can use them as targets.
//! [`Traverser::deref`] turns a raw object into a value; identifiers and
//! chains never survive it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::builtins::{self, opts::ScriptOpts};
use super::chain;
use super::context::{self, Context, ContextKind, ContextRef, Find, Flags};
use super::errors::{diag, fail, ErrStack};
use super::gc::Gc;
use super::importer::{self, Importer};
use super::nodes::{BinOp, CompOp, FuncDef, ImportName, Node, NodeKind};
use super::object::{equals, Dict, Func, ObjRef, Object};
use super::tokens::Pos;

/// Nested function calls allowed before evaluation fails, by default.
pub const MAX_CALL_DEPTH: usize = 200;

/// Native stack one evaluation may use, measured from where `traverse` was
/// entered.  Calls fail past it even under the depth limit.
const STACK_BUDGET: usize = 768 * 1024;

fn stack_position() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

/// `inject` bodies registered by one function invocation.
type InjectFrame = HashMap<String, Rc<[Node]>>;

pub struct Traverser {
    gc: Gc,
    importer: Importer,
    script_opts: Rc<ScriptOpts>,
    /// Builtin pseudo-modules (`__builtin__`, `alias`, `opts`).
    modules: Vec<ObjRef>,
    /// Output sink: the context passed to `traverse`.
    root: ContextRef,
    /// Context statements currently execute in.
    ctx: ContextRef,
    injects: Vec<InjectFrame>,
    depth: usize,
    max_depth: usize,
    stack_base: usize,
    ret: Option<ObjRef>,
}

impl Traverser {
    pub fn new(gc: &Gc, importer: Importer, script_opts: Rc<ScriptOpts>) -> Self {
        let root = Context::new_ref(ContextKind::Default);
        Traverser {
            modules: builtins::builtin_modules(gc),
            gc: gc.clone(),
            importer,
            script_opts,
            ctx: Rc::clone(&root),
            root,
            injects: Vec::new(),
            depth: 0,
            max_depth: MAX_CALL_DEPTH,
            stack_base: stack_position(),
            ret: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Execute `program` with `ctx` as both the starting context and the
    /// output sink.  Returns nil; the results live in `ctx`.
    pub fn traverse(&mut self, program: &Node, ctx: &ContextRef) -> Result<ObjRef, ErrStack> {
        self.stack_base = stack_position();
        self.depth = 0;
        self.enter(program, ctx)
    }

    /// `traverse` without resetting call depth or the stack base.
    fn enter(&mut self, program: &Node, ctx: &ContextRef) -> Result<ObjRef, ErrStack> {
        if self.stack_exhausted() {
            return Err(fail!(Runtime, None, "maximum call depth exceeded"));
        }
        self.root = Rc::clone(ctx);
        self.ctx = Rc::clone(ctx);
        self.injects.clear();
        self.ret = None;
        self.exec(program)?;
        Ok(self.gc.nil())
    }

    fn stack_exhausted(&self) -> bool {
        stack_position().abs_diff(self.stack_base) > STACK_BUDGET
    }

    // ── Accessors used by builtins and the importer ───────────────────────────

    pub fn gc(&self) -> &Gc {
        &self.gc
    }

    /// Context statements currently execute in.
    pub fn context(&self) -> &ContextRef {
        &self.ctx
    }

    pub fn root(&self) -> &ContextRef {
        &self.root
    }

    pub fn script_opts(&self) -> &Rc<ScriptOpts> {
        &self.script_opts
    }

    pub fn importer(&self) -> &Importer {
        &self.importer
    }

    pub(crate) fn importer_mut(&mut self) -> &mut Importer {
        &mut self.importer
    }

    pub fn write_stdout(&self, s: &str) {
        self.root.borrow_mut().stdout.push_str(s);
    }

    pub fn write_stderr(&self, s: &str) {
        self.root.borrow_mut().stderr.push_str(s);
    }

    /// Run `program` inside `ctx` (a module context), restoring the current
    /// context afterwards.
    pub(crate) fn run_in(&mut self, ctx: &ContextRef, program: &Node) -> Result<(), ErrStack> {
        if self.stack_exhausted() {
            return Err(fail!(Runtime, None, "maximum call depth exceeded"));
        }
        let saved = std::mem::replace(&mut self.ctx, Rc::clone(ctx));
        let result = self.exec(program);
        self.ctx = saved;
        result
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn flags(&self) -> Flags {
        self.ctx.borrow().flags
    }

    pub(crate) fn exec_nodes(&mut self, nodes: &[Node]) -> Result<(), ErrStack> {
        for node in nodes {
            self.exec(node)?;
            if self.flags().any() {
                break;
            }
        }
        Ok(())
    }

    fn exec(&mut self, node: &Node) -> Result<(), ErrStack> {
        match &node.kind {
            NodeKind::Program(nodes) | NodeKind::CodeBlock(nodes) => self.exec_nodes(nodes),
            NodeKind::Text(text) => {
                self.write_stdout(text);
                Ok(())
            }
            NodeKind::RefBlock(formula) => {
                let value = self.value(formula)?;
                self.write_stdout(&value.to_string());
                Ok(())
            }
            NodeKind::Import { path, alias } => {
                let module = importer::import_module(self, path, &node.pos)?;
                context::assign(&self.ctx, alias, module);
                Ok(())
            }
            NodeKind::FromImport { path, names } => self.exec_from_import(node, path, names),
            NodeKind::If { arms, orelse } => {
                for (test, body) in arms {
                    if self.value(test)?.value().is_truthy() {
                        return self.exec_nodes(body);
                    }
                }
                match orelse {
                    Some(body) => self.exec_nodes(body),
                    None => Ok(()),
                }
            }
            NodeKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.ctx.borrow_mut().push_scope();
                let result = self.exec_for(init.as_deref(), test.as_deref(), update.as_deref(), body);
                self.ctx.borrow_mut().pop_scope();
                result
            }
            NodeKind::Break => {
                self.ctx.borrow_mut().flags.do_break = true;
                Ok(())
            }
            NodeKind::Continue => {
                self.ctx.borrow_mut().flags.do_continue = true;
                Ok(())
            }
            NodeKind::Return(value) => {
                let value = match value {
                    Some(v) => self.value(v)?,
                    None => self.gc.nil(),
                };
                self.ret = Some(value);
                self.ctx.borrow_mut().flags.do_return = true;
                Ok(())
            }
            NodeKind::Block { name, body } => {
                let injected = self.injects.iter().find_map(|frame| frame.get(name).cloned());
                match injected {
                    Some(body) => self.exec_nodes(&body),
                    None => self.exec_nodes(body),
                }
            }
            NodeKind::Inject { name, body } => match self.injects.last_mut() {
                Some(frame) => {
                    frame.insert(name.clone(), Rc::clone(body));
                    Ok(())
                }
                None => Err(fail!(Internal, Some(&node.pos), "inject \"{name}\" outside of a function call")),
            },
            NodeKind::Global(names) => {
                let mut ctx = self.ctx.borrow_mut();
                for name in names {
                    ctx.declare_global(name);
                }
                Ok(())
            }
            NodeKind::Nonlocal(names) => {
                let mut ctx = self.ctx.borrow_mut();
                for name in names {
                    ctx.declare_nonlocal(name)
                        .map_err(|msg| fail!(Runtime, Some(&node.pos), "{msg}"))?;
                }
                Ok(())
            }
            NodeKind::Def(def) => self.exec_def(node, def),
            NodeKind::Struct { name, body } => self.exec_struct(node, name, body),
            _ => {
                self.value(node)?;
                Ok(())
            }
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Node>,
        test: Option<&Node>,
        update: Option<&Node>,
        body: &[Node],
    ) -> Result<(), ErrStack> {
        if let Some(init) = init {
            self.value(init)?;
        }
        loop {
            if let Some(test) = test {
                if !self.value(test)?.value().is_truthy() {
                    break;
                }
            }
            self.exec_nodes(body)?;

            let flags = self.flags();
            if flags.do_return {
                break;
            }
            if flags.do_break {
                let mut ctx = self.ctx.borrow_mut();
                ctx.flags.do_break = false;
                ctx.flags.do_continue = false;
                break;
            }
            if flags.do_continue {
                self.ctx.borrow_mut().flags.do_continue = false;
            }
            if let Some(update) = update {
                self.value(update)?;
            }
        }
        Ok(())
    }

    fn exec_from_import(&mut self, node: &Node, path: &str, names: &[ImportName]) -> Result<(), ErrStack> {
        let module = importer::import_module(self, path, &node.pos)?;
        let Some(mctx) = module.value().fields().cloned() else {
            return Err(fail!(Internal, Some(&node.pos), "imported \"{path}\" is not a module"));
        };
        for name in names {
            let Some(member) = context::find(&mctx, &name.name, Find::AllScopes) else {
                return Err(fail!(
                    Import,
                    Some(&node.pos),
                    "\"{}\" is not defined in module \"{path}\"",
                    name.name
                ));
            };
            context::assign(&self.ctx, name.bound_name(), member);
        }
        Ok(())
    }

    fn exec_def(&mut self, node: &Node, def: &Rc<FuncDef>) -> Result<(), ErrStack> {
        let extends = match &def.extends {
            Some(parent) => {
                let found = self.lookup(parent, &self.ctx);
                match found {
                    Some(obj) if matches!(obj.value(), Object::Func(_)) => Some(obj),
                    _ => {
                        return Err(fail!(
                            Runtime,
                            Some(&node.pos),
                            "can't extends. \"{parent}\" is not a function"
                        ))
                    }
                }
            }
            None => None,
        };
        let func = self.gc.alloc(Object::Func(Func {
            def: Rc::clone(def),
            ctx: Rc::downgrade(&self.ctx),
            extends,
        }));
        context::assign(&self.ctx, &def.name, func);
        Ok(())
    }

    fn exec_struct(&mut self, node: &Node, name: &str, body: &[Node]) -> Result<(), ErrStack> {
        let ctx = Context::nested(ContextKind::StructDef, &self.ctx);
        let saved = std::mem::replace(&mut self.ctx, Rc::clone(&ctx));
        let result = self.exec_nodes(body);
        self.ctx = saved;
        result.map_err(|e| e.wrap(diag!(Runtime, Some(&node.pos), "failed to define struct \"{name}\"")))?;

        let def = self.gc.alloc(Object::StructDef {
            name: name.to_owned(),
            ctx,
        });
        context::assign(&self.ctx, name, def);
        Ok(())
    }

    // ── Function calls ────────────────────────────────────────────────────────

    /// Call a user-defined function.  `receiver` is passed as the first
    /// argument of methods (`met`).
    pub(crate) fn invoke(
        &mut self,
        callee: &ObjRef,
        receiver: Option<ObjRef>,
        mut args: Vec<ObjRef>,
        pos: &Pos,
    ) -> Result<ObjRef, ErrStack> {
        let Object::Func(func) = callee.value() else {
            return Err(fail!(Internal, Some(pos), "invoke on {}", callee.value().type_name()));
        };
        let def = &func.def;
        let Some(ctx) = func.ctx.upgrade() else {
            return Err(fail!(Runtime, Some(pos), "context of function \"{}\" is gone", def.name));
        };
        if def.is_method {
            if let Some(receiver) = receiver {
                args.insert(0, receiver);
            }
        }
        if args.len() != def.params.len() {
            return Err(fail!(
                Runtime,
                Some(pos),
                "arguments not same length. \"{}\" takes {} but {} given",
                def.name,
                def.params.len(),
                args.len()
            ));
        }
        if self.depth >= self.max_depth || self.stack_exhausted() {
            return Err(fail!(Runtime, Some(pos), "maximum call depth exceeded in \"{}\"", def.name));
        }

        {
            let mut c = ctx.borrow_mut();
            c.push_frame();
            let vars = c.current_mut();
            for (param, arg) in def.params.iter().zip(args) {
                vars.set(param.as_str(), arg);
            }
            if let Some(parent) = &func.extends {
                vars.set("super", Rc::clone(parent));
            }
        }

        self.depth += 1;
        let saved_ctx = std::mem::replace(&mut self.ctx, Rc::clone(&ctx));
        let saved_ret = self.ret.take();
        self.injects.push(InjectFrame::new());

        let result = self.exec_nodes(&def.body);

        self.injects.pop();
        let ret = std::mem::replace(&mut self.ret, saved_ret);
        self.ctx = saved_ctx;
        self.depth -= 1;
        {
            let mut c = ctx.borrow_mut();
            c.flags = Flags::default();
            c.pop_scope();
        }

        result.map_err(|e| e.wrap(diag!(Runtime, Some(pos), "failed to invoke \"{}\"", def.name)))?;
        Ok(ret.unwrap_or_else(|| self.gc.nil()))
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    /// Evaluate `node` and dereference the result.
    pub fn value(&mut self, node: &Node) -> Result<ObjRef, ErrStack> {
        let raw = self.eval(node)?;
        self.deref(&raw, &node.pos)
    }

    /// Resolve identifiers and pending chains to a value.
    pub fn deref(&mut self, obj: &ObjRef, pos: &Pos) -> Result<ObjRef, ErrStack> {
        match obj.value() {
            Object::Ident { name, ctx } => self
                .lookup(name, ctx)
                .ok_or_else(|| fail!(Runtime, Some(pos), "\"{name}\" is not defined")),
            Object::Chain { operand, accessors } => chain::resolve_pending(self, operand, accessors, pos),
            _ => Ok(Rc::clone(obj)),
        }
    }

    /// Variable lookup from `ctx`, falling back to builtin modules.
    pub(crate) fn lookup(&self, name: &str, ctx: &ContextRef) -> Option<ObjRef> {
        context::find(ctx, name, Find::Escaping).or_else(|| {
            self.modules
                .iter()
                .find(|m| matches!(m.value(), Object::Module(module) if module.name == name))
                .cloned()
        })
    }

    /// Evaluate `node` to a raw object (see the module docs).
    pub fn eval(&mut self, node: &Node) -> Result<ObjRef, ErrStack> {
        let pos = &node.pos;
        match &node.kind {
            NodeKind::Nil => Ok(self.gc.nil()),
            NodeKind::Bool(b) => Ok(self.gc.boolean(*b)),
            NodeKind::Int(n) => Ok(self.gc.int(*n)),
            NodeKind::Str(s) => Ok(self.gc.string(s.clone())),
            NodeKind::Ident(name) => Ok(self.gc.alloc(Object::Ident {
                name: name.clone(),
                ctx: Rc::clone(&self.ctx),
            })),
            NodeKind::Array(items) => {
                let values = self.values(items)?;
                Ok(self.gc.array(values))
            }
            NodeKind::Dict(items) => {
                let mut dict = Dict::new();
                for (k, v) in items {
                    let key = self.value(k)?;
                    let Some(key) = key.value().as_str().map(str::to_owned) else {
                        return Err(fail!(
                            Runtime,
                            Some(&k.pos),
                            "dict key must be str, not {}",
                            key.value().type_name()
                        ));
                    };
                    let value = self.value(v)?;
                    dict.set(key, value);
                }
                Ok(self.gc.dict(dict))
            }
            NodeKind::Assign { targets, value } => {
                let value = self.value(value)?;
                for target in targets.iter().rev() {
                    self.assign_to(target, Rc::clone(&value))?;
                }
                Ok(value)
            }
            NodeKind::MultiAssign(lists) => self.eval_multi_assign(node, lists),
            NodeKind::TestList(items) => {
                let values = self.values(items)?;
                Ok(self.gc.array(values))
            }
            NodeKind::Or(operands) => {
                let mut last = self.gc.nil();
                for operand in operands {
                    last = self.value(operand)?;
                    if last.value().is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            NodeKind::And(operands) => {
                let mut last = self.gc.nil();
                for operand in operands {
                    last = self.value(operand)?;
                    if !last.value().is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            NodeKind::Not(operand) => {
                let v = self.value(operand)?;
                Ok(self.gc.boolean(!v.value().is_truthy()))
            }
            NodeKind::Compare { first, rest } => {
                let mut lhs = self.value(first)?;
                for (op, rhs_node) in rest {
                    let rhs = self.value(rhs_node)?;
                    if !compare(*op, &lhs, &rhs, &rhs_node.pos)? {
                        return Ok(self.gc.boolean(false));
                    }
                    lhs = rhs;
                }
                Ok(self.gc.boolean(true))
            }
            NodeKind::AugAssign { op, target, value } => {
                let place = self.eval(target)?;
                let current = self.deref(&place, &target.pos)?;
                let rhs = self.value(value)?;
                let result = binary(&self.gc, *op, &current, &rhs, pos)?;
                self.store(&place, Rc::clone(&result), &target.pos)?;
                Ok(result)
            }
            NodeKind::Binary { op, lhs, rhs } => {
                let l = self.value(lhs)?;
                let r = self.value(rhs)?;
                binary(&self.gc, *op, &l, &r, pos)
            }
            NodeKind::Negative(operand) => {
                let v = self.value(operand)?;
                let negated = v.value().as_int().and_then(i64::checked_neg);
                match negated {
                    Some(n) => Ok(self.gc.int(n)),
                    None => Err(fail!(Runtime, Some(pos), "can't negate {}", v.value().type_name())),
                }
            }
            NodeKind::Chain { operand, accessors } => chain::eval_chain(self, operand, accessors, pos),
            _ => Err(fail!(
                Internal,
                Some(pos),
                "can't evaluate {} as an expression",
                node.kind_name()
            )),
        }
    }

    pub(crate) fn values(&mut self, nodes: &[Node]) -> Result<Vec<ObjRef>, ErrStack> {
        nodes.iter().map(|n| self.value(n)).collect()
    }

    fn eval_multi_assign(&mut self, node: &Node, lists: &[Vec<Node>]) -> Result<ObjRef, ErrStack> {
        let Some((values, targets)) = lists.split_last() else {
            return Err(fail!(Internal, Some(&node.pos), "empty multiple assignment"));
        };
        let values = self.values(values)?;
        let whole = if values.len() == 1 {
            Rc::clone(&values[0])
        } else {
            self.gc.array(values.clone())
        };

        for list in targets.iter().rev() {
            if list.len() == 1 {
                self.assign_to(&list[0], Rc::clone(&whole))?;
                continue;
            }
            let items: Vec<ObjRef> = if values.len() == 1 {
                match whole.value() {
                    Object::Array(items) => items.borrow().clone(),
                    _ => values.clone(),
                }
            } else {
                values.clone()
            };
            if items.len() != list.len() {
                return Err(fail!(
                    Runtime,
                    Some(&node.pos),
                    "can't assign. {} values to {} targets",
                    items.len(),
                    list.len()
                ));
            }
            for (target, item) in list.iter().zip(items) {
                self.assign_to(target, item)?;
            }
        }
        Ok(whole)
    }

    /// `target = value`.
    fn assign_to(&mut self, target: &Node, value: ObjRef) -> Result<(), ErrStack> {
        match &target.kind {
            NodeKind::Ident(name) => {
                context::assign(&self.ctx, name, value);
                Ok(())
            }
            NodeKind::Chain { .. } => {
                let raw = self.eval(target)?;
                match raw.value() {
                    Object::Chain { operand, accessors } => {
                        chain::assign(operand, accessors, value, &target.pos)
                    }
                    _ => Err(fail!(Runtime, Some(&target.pos), "can't assign to result of a call")),
                }
            }
            _ => Err(fail!(Internal, Some(&target.pos), "can't assign to {}", target.kind_name())),
        }
    }

    /// Write back through an already evaluated `op=` target; the binding
    /// must exist.
    fn store(&mut self, place: &ObjRef, value: ObjRef, pos: &Pos) -> Result<(), ErrStack> {
        match place.value() {
            Object::Ident { name, .. } => {
                if context::reassign(&self.ctx, name, value) {
                    Ok(())
                } else {
                    Err(fail!(Runtime, Some(pos), "\"{name}\" is not defined"))
                }
            }
            Object::Chain { operand, accessors } => chain::assign(operand, accessors, value, pos),
            _ => Err(fail!(Runtime, Some(pos), "can't assign to result of a call")),
        }
    }

    /// Run `src` in a sandbox: a fresh root context holding `globals`,
    /// sharing this traverser's arena and options.  Returns the sandbox's
    /// context and the outcome.
    pub(crate) fn sandbox(&self, program: &Node, globals: Vec<(String, ObjRef)>) -> (ContextRef, Result<(), ErrStack>) {
        let ctx = Context::new_ref(ContextKind::Default);
        {
            let mut c = ctx.borrow_mut();
            for (k, v) in globals {
                c.globals_mut().set(k, v);
            }
        }
        let mut sandbox = Traverser::new(&self.gc, self.importer.fork(), Rc::clone(&self.script_opts))
            .with_max_depth(self.max_depth);
        sandbox.depth = self.depth;
        sandbox.stack_base = self.stack_base;
        let result = sandbox.enter(program, &ctx).map(|_| ());
        (ctx, result)
    }
}

// ── Operators ─────────────────────────────────────────────────────────────────

fn overflow(pos: &Pos) -> ErrStack {
    fail!(Runtime, Some(pos), "integer overflow")
}

/// Arithmetic on resolved values.
pub fn binary(gc: &Gc, op: BinOp, l: &ObjRef, r: &ObjRef, pos: &Pos) -> Result<ObjRef, ErrStack> {
    if let (Some(a), Some(b)) = (l.value().as_int(), r.value().as_int()) {
        let n = match op {
            BinOp::Add => a.checked_add(b).ok_or_else(|| overflow(pos))?,
            BinOp::Sub => a.checked_sub(b).ok_or_else(|| overflow(pos))?,
            BinOp::Mul => a.checked_mul(b).ok_or_else(|| overflow(pos))?,
            BinOp::Div | BinOp::Mod if b == 0 => {
                return Err(fail!(Runtime, Some(pos), "zero division error"));
            }
            BinOp::Div => a.checked_div(b).ok_or_else(|| overflow(pos))?,
            BinOp::Mod => a.checked_rem(b).ok_or_else(|| overflow(pos))?,
        };
        return Ok(gc.int(n));
    }

    match (op, l.value(), r.value()) {
        (BinOp::Add, Object::Str(a), Object::Str(b)) => Ok(gc.string(format!("{a}{b}"))),
        (BinOp::Mul, Object::Str(s), Object::Int(n)) => {
            let count = usize::try_from(*n)
                .map_err(|_| fail!(Runtime, Some(pos), "can't repeat str a negative number of times"))?;
            Ok(gc.string(s.repeat(count)))
        }
        (BinOp::Add, Object::Array(a), Object::Array(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(gc.array(items))
        }
        (op, a, b) => Err(fail!(
            Runtime,
            Some(pos),
            "unsupported operand types for {}: {} and {}",
            op_symbol(op),
            a.type_name(),
            b.type_name()
        )),
    }
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
    }
}

/// One comparison on resolved values.
pub fn compare(op: CompOp, l: &ObjRef, r: &ObjRef, pos: &Pos) -> Result<bool, ErrStack> {
    match op {
        CompOp::Eq => return Ok(equals(l, r)),
        CompOp::NotEq => return Ok(!equals(l, r)),
        _ => {}
    }
    let ord = match (l.value(), r.value()) {
        (Object::Str(a), Object::Str(b)) => a.cmp(b),
        (a, b) => match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                return Err(fail!(
                    Runtime,
                    Some(pos),
                    "can't compare {} and {}",
                    a.type_name(),
                    b.type_name()
                ))
            }
        },
    };
    Ok(match op {
        CompOp::Lt => ord.is_lt(),
        CompOp::LtEq => ord.is_le(),
        CompOp::Gt => ord.is_gt(),
        CompOp::GtEq => ord.is_ge(),
        CompOp::Eq => ord.is_eq(),
        CompOp::NotEq => ord.is_ne(),
    })
}

/// Instantiate a struct: deep-copy its definition context and bind the
/// arguments, in order, to its fields (functions are not fields).
pub(crate) fn instantiate(
    gc: &Gc,
    def: &ObjRef,
    args: Vec<ObjRef>,
    pos: &Pos,
) -> Result<ObjRef, ErrStack> {
    let Object::StructDef { name, ctx } = def.value() else {
        return Err(fail!(Internal, Some(pos), "instantiate on {}", def.value().type_name()));
    };
    let mut copy = ctx.borrow().deep_copy(gc);
    let fields: Vec<String> = copy
        .globals()
        .iter()
        .filter(|(_, v)| !matches!(v.value(), Object::Func(_)))
        .map(|(k, _)| k.to_owned())
        .collect();
    if args.len() > fields.len() {
        return Err(fail!(
            Runtime,
            Some(pos),
            "too many arguments for struct \"{name}\". it has {} fields",
            fields.len()
        ));
    }
    for (field, arg) in fields.iter().zip(args) {
        copy.globals_mut().set(field.as_str(), arg);
    }
    Ok(gc.alloc(Object::Instance {
        def: Rc::clone(def),
        ctx: Rc::new(RefCell::new(copy)),
    }))
}
