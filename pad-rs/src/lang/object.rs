//! Runtime values.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::builtins::BuiltinFunc;
use super::context::{Context, ContextRef};
use super::gc::{Arena, Gc, ObjId};
use super::nodes::{FuncDef, Node};

pub type ObjRef = Rc<Obj>;

/// An allocated object: its arena slot plus the value.
pub struct Obj {
    id: ObjId,
    arena: Weak<Arena>,
    value: Object,
}

impl Obj {
    pub(crate) fn new(id: ObjId, arena: Weak<Arena>, value: Object) -> Self {
        Obj { id, arena, value }
    }

    pub fn id(&self) -> ObjId {
        self.id
    }

    pub fn value(&self) -> &Object {
        &self.value
    }
}

impl Drop for Obj {
    fn drop(&mut self) {
        if let Some(arena) = self.arena.upgrade() {
            arena.release(self.id);
        }
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Object::Str(s) => write!(f, "{s:?}"),
            Object::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Object::Dict(dict) => f
                .debug_map()
                .entries(dict.borrow().iter().map(|(k, v)| (k, v)))
                .finish(),
            Object::Ident { name, .. } => write!(f, "<ident {name}>"),
            Object::Func(func) => write!(f, "<func {}>", func.def.name),
            Object::Module(m) => write!(f, "<module {}>", m.name),
            Object::StructDef { name, .. } => write!(f, "<struct {name}>"),
            Object::OwnersMethod { name, .. } => write!(f, "<method {name}>"),
            other => write!(f, "{other}"),
        }
    }
}

// ── Dict ──────────────────────────────────────────────────────────────────────

/// Insertion-ordered string-keyed map.  Also used as the variable map of a
/// scope.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: Vec<(String, ObjRef)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ObjRef> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert or replace; a replaced key keeps its original position.
    pub fn set(&mut self, key: impl Into<String>, value: ObjRef) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<ObjRef> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObjRef)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ── Composite payloads ────────────────────────────────────────────────────────

pub struct Func {
    pub def: Rc<FuncDef>,
    /// Context the function was defined in; calls push a scope on it.
    pub ctx: Weak<RefCell<Context>>,
    /// Parent bound as `super` while the function runs.
    pub extends: Option<ObjRef>,
}

pub struct Module {
    pub name: String,
    /// Compiled program, kept for the module's lifetime.  `None` for
    /// builtin pseudo-modules.
    pub program: Option<Rc<Node>>,
    pub ctx: ContextRef,
    pub builtins: Option<&'static [BuiltinFunc]>,
}

/// Accessor still to be applied to a chain's operand.
pub enum ChainAccessor {
    Dot(String),
    Index(ObjRef),
}

// ── Object ────────────────────────────────────────────────────────────────────

pub enum Object {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    Array(RefCell<Vec<ObjRef>>),
    Dict(RefCell<Dict>),
    /// Unresolved name.  Produced by evaluating an identifier and consumed
    /// by assignment or dereference; never bound in a variable map.
    Ident { name: String, ctx: ContextRef },
    Func(Func),
    /// Operand with accessors not yet applied.  Produced for `a.b` and
    /// `a[i]` so the same evaluation can serve as an assignment target.
    Chain {
        operand: ObjRef,
        accessors: Vec<ChainAccessor>,
    },
    Module(Module),
    StructDef { name: String, ctx: ContextRef },
    Instance { def: ObjRef, ctx: ContextRef },
    /// `receiver.name` waiting for its call arguments.
    OwnersMethod { owner: ObjRef, name: String },
}

impl Object {
    /// Name reported by `type()`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Nil => "nil",
            Object::Bool(_) => "bool",
            Object::Int(_) => "int",
            Object::Str(_) => "str",
            Object::Array(_) => "array",
            Object::Dict(_) => "dict",
            Object::Ident { .. } => "identifier",
            Object::Func(_) | Object::OwnersMethod { .. } => "func",
            Object::Chain { .. } => "chain",
            Object::Module(_) => "module",
            Object::StructDef { .. } => "struct",
            Object::Instance { .. } => "object",
        }
    }

    /// Truthiness of a resolved value.  Identifiers and chains must be
    /// dereferenced by the evaluator first.
    pub fn is_truthy(&self) -> bool {
        match self {
            Object::Nil => false,
            Object::Bool(b) => *b,
            Object::Int(n) => *n != 0,
            Object::Str(s) => !s.is_empty(),
            Object::Array(items) => !items.borrow().is_empty(),
            Object::Dict(dict) => !dict.borrow().is_empty(),
            _ => true,
        }
    }

    /// Int value, with bools coerced to 0/1.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Object::Int(n) => Some(*n),
            Object::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Object::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The context holding an entity's fields, if it has one.
    pub fn fields(&self) -> Option<&ContextRef> {
        match self {
            Object::Module(m) => Some(&m.ctx),
            Object::StructDef { ctx, .. } | Object::Instance { ctx, .. } => Some(ctx),
            _ => None,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Nil => f.write_str("nil"),
            Object::Bool(b) => write!(f, "{b}"),
            Object::Int(n) => write!(f, "{n}"),
            Object::Str(s) => f.write_str(s),
            Object::Array(_) => f.write_str("(array)"),
            Object::Dict(_) => f.write_str("(dict)"),
            Object::Ident { name, .. } => write!(f, "(identifier {name})"),
            Object::Func(_) | Object::OwnersMethod { .. } => f.write_str("(function)"),
            Object::Chain { .. } => f.write_str("(chain)"),
            Object::Module(_) => f.write_str("(module)"),
            Object::StructDef { .. } => f.write_str("(struct)"),
            Object::Instance { .. } => f.write_str("(object)"),
        }
    }
}

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

// ── Equality ──────────────────────────────────────────────────────────────────

/// `==` on resolved values: structural for scalars and containers, identity
/// for everything else.  Values of different kinds are never equal, except
/// that bools compare numerically with ints.
pub fn equals(a: &ObjRef, b: &ObjRef) -> bool {
    equals_in(a, b, &mut Vec::new())
}

/// `seen` holds the container pairs currently being compared; meeting one
/// again means the two graphs cycle in step.
fn equals_in(a: &ObjRef, b: &ObjRef, seen: &mut Vec<(*const Obj, *const Obj)>) -> bool {
    if Rc::ptr_eq(a, b) {
        return true;
    }
    let pair = (Rc::as_ptr(a), Rc::as_ptr(b));
    match (a.value(), b.value()) {
        (Object::Nil, Object::Nil) => true,
        (Object::Str(x), Object::Str(y)) => x == y,
        (Object::Array(x), Object::Array(y)) => {
            if seen.contains(&pair) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            if x.len() != y.len() {
                return false;
            }
            seen.push(pair);
            let eq = x.iter().zip(y.iter()).all(|(p, q)| equals_in(p, q, seen));
            seen.pop();
            eq
        }
        (Object::Dict(x), Object::Dict(y)) => {
            if seen.contains(&pair) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            if x.len() != y.len() {
                return false;
            }
            seen.push(pair);
            let eq = x
                .iter()
                .all(|(k, v)| y.get(k).is_some_and(|w| equals_in(v, w, seen)));
            seen.pop();
            eq
        }
        (x, y) => match (x.as_int(), y.as_int()) {
            (Some(p), Some(q)) => p == q,
            _ => false,
        },
    }
}

// ── Copying ───────────────────────────────────────────────────────────────────

/// Shallow copy: containers get a new spine whose elements are shared with
/// the original; scalars are reallocated; entities with their own context
/// (modules, struct definitions) are shared.
pub fn shallow_copy(gc: &Gc, obj: &ObjRef) -> ObjRef {
    match obj.value() {
        Object::Array(items) => gc.array(items.borrow().clone()),
        Object::Dict(dict) => gc.dict(dict.borrow().clone()),
        Object::Instance { def, ctx } => {
            let copy = ctx.borrow().shallow_copy();
            gc.alloc(Object::Instance {
                def: Rc::clone(def),
                ctx: Rc::new(RefCell::new(copy)),
            })
        }
        _ => copy_scalar(gc, obj),
    }
}

/// Deep copy: a wholly independent object graph.  Shared and cyclic
/// references in the source are shared and cyclic in the copy.
pub fn deep_copy(gc: &Gc, obj: &ObjRef) -> ObjRef {
    DeepCopy::new(gc).copy(obj)
}

/// One deep-copy pass; remembers every container already copied.
pub(crate) struct DeepCopy<'g> {
    gc: &'g Gc,
    copied: HashMap<*const Obj, ObjRef>,
}

impl<'g> DeepCopy<'g> {
    pub(crate) fn new(gc: &'g Gc) -> Self {
        DeepCopy {
            gc,
            copied: HashMap::new(),
        }
    }

    pub(crate) fn copy(&mut self, obj: &ObjRef) -> ObjRef {
        if let Some(done) = self.copied.get(&Rc::as_ptr(obj)) {
            return Rc::clone(done);
        }
        // Containers are registered empty before their children are copied.
        match obj.value() {
            Object::Array(items) => {
                let copy = self.gc.array(Vec::new());
                self.copied.insert(Rc::as_ptr(obj), Rc::clone(&copy));
                let source = items.borrow().clone();
                let filled: Vec<ObjRef> = source.iter().map(|o| self.copy(o)).collect();
                if let Object::Array(slot) = copy.value() {
                    *slot.borrow_mut() = filled;
                }
                copy
            }
            Object::Dict(dict) => {
                let copy = self.gc.dict(Dict::new());
                self.copied.insert(Rc::as_ptr(obj), Rc::clone(&copy));
                let source = dict.borrow().clone();
                let mut filled = Dict::new();
                for (k, v) in source.iter() {
                    filled.set(k, self.copy(v));
                }
                if let Object::Dict(slot) = copy.value() {
                    *slot.borrow_mut() = filled;
                }
                copy
            }
            Object::Instance { def, ctx } => {
                let fresh = Rc::new(RefCell::new(ctx.borrow().shallow_copy()));
                let copy = self.gc.alloc(Object::Instance {
                    def: Rc::clone(def),
                    ctx: Rc::clone(&fresh),
                });
                self.copied.insert(Rc::as_ptr(obj), Rc::clone(&copy));
                let fields = ctx.borrow().deep_copy_with(self);
                *fresh.borrow_mut() = fields;
                copy
            }
            _ => copy_scalar(self.gc, obj),
        }
    }
}

fn copy_scalar(gc: &Gc, obj: &ObjRef) -> ObjRef {
    match obj.value() {
        Object::Nil => gc.nil(),
        Object::Bool(b) => gc.boolean(*b),
        Object::Int(n) => gc.int(*n),
        Object::Str(s) => gc.string(s.clone()),
        Object::Func(func) => gc.alloc(Object::Func(Func {
            def: Rc::clone(&func.def),
            ctx: Weak::clone(&func.ctx),
            extends: func.extends.clone(),
        })),
        Object::OwnersMethod { owner, name } => gc.alloc(Object::OwnersMethod {
            owner: Rc::clone(owner),
            name: name.clone(),
        }),
        _ => Rc::clone(obj),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(obj: &ObjRef) -> Vec<ObjRef> {
        match obj.value() {
            Object::Array(items) => items.borrow().clone(),
            _ => panic!("not an array"),
        }
    }

    #[test]
    fn display_forms() {
        let gc = Gc::new();
        assert_eq!(gc.nil().to_string(), "nil");
        assert_eq!(gc.boolean(true).to_string(), "true");
        assert_eq!(gc.int(-4).to_string(), "-4");
        assert_eq!(gc.string("héllo").to_string(), "héllo");
        assert_eq!(gc.array(vec![]).to_string(), "(array)");
        assert_eq!(gc.dict(Dict::new()).to_string(), "(dict)");
    }

    #[test]
    fn truthiness() {
        let gc = Gc::new();
        assert!(!gc.nil().value().is_truthy());
        assert!(!gc.int(0).value().is_truthy());
        assert!(gc.int(-1).value().is_truthy());
        assert!(!gc.string("").value().is_truthy());
        assert!(gc.string("0").value().is_truthy());
        assert!(!gc.array(vec![]).value().is_truthy());
        assert!(gc.array(vec![gc.nil()]).value().is_truthy());
    }

    #[test]
    fn structural_equality() {
        let gc = Gc::new();
        let a = gc.array(vec![gc.int(1), gc.string("x")]);
        let b = gc.array(vec![gc.int(1), gc.string("x")]);
        let c = gc.array(vec![gc.int(1)]);
        assert!(equals(&a, &b));
        assert!(!equals(&a, &c));
        assert!(equals(&gc.boolean(true), &gc.int(1)));
        assert!(!equals(&gc.string("1"), &gc.int(1)));
        assert!(!equals(&gc.nil(), &gc.boolean(false)));
    }

    #[test]
    fn shallow_copy_shares_elements() {
        let gc = Gc::new();
        let inner = gc.array(vec![]);
        let outer = gc.array(vec![Rc::clone(&inner)]);
        let copy = shallow_copy(&gc, &outer);
        assert!(!Rc::ptr_eq(&copy, &outer));
        assert!(Rc::ptr_eq(&items(&copy)[0], &inner));
    }

    #[test]
    fn deep_copy_is_independent() {
        let gc = Gc::new();
        let inner = gc.array(vec![gc.int(1)]);
        let outer = gc.array(vec![Rc::clone(&inner)]);
        let copy = deep_copy(&gc, &outer);
        let copied_inner = Rc::clone(&items(&copy)[0]);
        assert!(!Rc::ptr_eq(&copied_inner, &inner));
        if let Object::Array(v) = inner.value() {
            v.borrow_mut().push(gc.int(2));
        }
        assert_eq!(items(&copied_inner).len(), 1);
    }

    fn self_containing(gc: &Gc) -> ObjRef {
        let a = gc.array(vec![gc.int(1)]);
        if let Object::Array(v) = a.value() {
            v.borrow_mut().push(Rc::clone(&a));
        }
        a
    }

    #[test]
    fn cyclic_equality_terminates() {
        let gc = Gc::new();
        let a = self_containing(&gc);
        let b = self_containing(&gc);
        assert!(equals(&a, &b));

        let d = gc.dict(Dict::new());
        if let Object::Dict(m) = d.value() {
            m.borrow_mut().set("me", Rc::clone(&d));
        }
        let e = gc.dict(Dict::new());
        if let Object::Dict(m) = e.value() {
            m.borrow_mut().set("me", gc.int(0));
        }
        assert!(!equals(&d, &e));
    }

    #[test]
    fn deep_copy_keeps_cycles_and_sharing() {
        let gc = Gc::new();
        let a = self_containing(&gc);
        let copy = deep_copy(&gc, &a);
        assert!(!Rc::ptr_eq(&copy, &a));
        assert!(Rc::ptr_eq(&items(&copy)[1], &copy));

        let shared = gc.array(vec![]);
        let pair = gc.array(vec![Rc::clone(&shared), Rc::clone(&shared)]);
        let copy = deep_copy(&gc, &pair);
        let copied = items(&copy);
        assert!(Rc::ptr_eq(&copied[0], &copied[1]));
        assert!(!Rc::ptr_eq(&copied[0], &shared));
    }

    #[test]
    fn dict_keeps_insertion_order() {
        let gc = Gc::new();
        let mut d = Dict::new();
        d.set("b", gc.int(1));
        d.set("a", gc.int(2));
        d.set("b", gc.int(3));
        assert_eq!(d.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(d.get("b").unwrap().value().as_int(), Some(3));
        assert_eq!(d.remove("b").unwrap().value().as_int(), Some(3));
        assert_eq!(d.len(), 1);
    }
}
