//! Postfix chains: `operand.name(args)[index]...`.
//!
//! Accessors are applied left to right while keeping the stack of
//! intermediate owners, so a call can find its receiver (the owner one
//! below the callee).  A trailing `.name` or `[index]` is left pending in an
//! [`Object::Chain`] so the chain can be assigned through.

use std::rc::Rc;

use super::builtins::{self, functions};
use super::context::{self, Find};
use super::errors::{fail, ErrStack};
use super::gc::Gc;
use super::nodes::{Accessor, Node};
use super::object::{ChainAccessor, ObjRef, Object};
use super::tokens::Pos;
use super::traverser::{instantiate, Traverser};

pub(crate) fn eval_chain(
    trv: &mut Traverser,
    operand: &Node,
    accessors: &[Accessor],
    pos: &Pos,
) -> Result<ObjRef, ErrStack> {
    let Some((last, init)) = accessors.split_last() else {
        return trv.eval(operand);
    };

    let mut owners = vec![trv.eval(operand)?];
    for (i, accessor) in init.iter().enumerate() {
        let calling = matches!(accessors[i + 1], Accessor::Call(_));
        let next = step(trv, &owners, accessor, calling, pos)?;
        owners.push(next);
    }

    match last {
        Accessor::Call(_) => step(trv, &owners, last, false, pos),
        Accessor::Dot(name) => {
            let operand = current(trv, &owners, pos)?;
            Ok(trv.gc().alloc(Object::Chain {
                operand,
                accessors: vec![ChainAccessor::Dot(name.clone())],
            }))
        }
        Accessor::Index(index) => {
            let operand = current(trv, &owners, pos)?;
            let key = trv.value(index)?;
            Ok(trv.gc().alloc(Object::Chain {
                operand,
                accessors: vec![ChainAccessor::Index(key)],
            }))
        }
    }
}

/// Apply the pending accessors of a chain object.
pub(crate) fn resolve_pending(
    trv: &mut Traverser,
    operand: &ObjRef,
    accessors: &[ChainAccessor],
    pos: &Pos,
) -> Result<ObjRef, ErrStack> {
    let mut cur = trv.deref(operand, pos)?;
    for accessor in accessors {
        cur = match accessor {
            ChainAccessor::Dot(name) => dot(trv.gc(), &cur, name, false, pos)?,
            ChainAccessor::Index(key) => index(trv.gc(), &cur, key, pos)?,
        };
    }
    Ok(cur)
}

/// Store `value` through the last pending accessor.
pub(crate) fn assign(
    operand: &ObjRef,
    accessors: &[ChainAccessor],
    value: ObjRef,
    pos: &Pos,
) -> Result<(), ErrStack> {
    let [accessor] = accessors else {
        return Err(fail!(Internal, Some(pos), "chain with {} pending accessors", accessors.len()));
    };
    match (accessor, operand.value()) {
        (ChainAccessor::Dot(name), target) => match target {
            Object::Module(m) if m.builtins.is_none() => {
                m.ctx.borrow_mut().globals_mut().set(name.as_str(), value);
                Ok(())
            }
            Object::StructDef { ctx, .. } | Object::Instance { ctx, .. } => {
                ctx.borrow_mut().globals_mut().set(name.as_str(), value);
                Ok(())
            }
            other => Err(fail!(
                Runtime,
                Some(pos),
                "can't assign to \"{name}\" of {}",
                other.type_name()
            )),
        },
        (ChainAccessor::Index(key), Object::Array(items)) => {
            let mut items = items.borrow_mut();
            let i = array_index(key, items.len(), pos)?;
            items[i] = value;
            Ok(())
        }
        (ChainAccessor::Index(key), Object::Dict(dict)) => {
            let key = dict_key(key, pos)?;
            dict.borrow_mut().set(key, value);
            Ok(())
        }
        (ChainAccessor::Index(_), Object::Str(_)) => {
            Err(fail!(Runtime, Some(pos), "can't assign to index of str. str is immutable"))
        }
        (ChainAccessor::Index(_), other) => {
            Err(fail!(Runtime, Some(pos), "can't assign to index of {}", other.type_name()))
        }
    }
}

// ── Accessors ─────────────────────────────────────────────────────────────────

fn current(trv: &mut Traverser, owners: &[ObjRef], pos: &Pos) -> Result<ObjRef, ErrStack> {
    match owners.last() {
        Some(owner) => trv.deref(owner, pos),
        None => Err(fail!(Internal, Some(pos), "empty owner stack")),
    }
}

fn step(
    trv: &mut Traverser,
    owners: &[ObjRef],
    accessor: &Accessor,
    calling: bool,
    pos: &Pos,
) -> Result<ObjRef, ErrStack> {
    match accessor {
        Accessor::Dot(name) => {
            let recv = current(trv, owners, pos)?;
            dot(trv.gc(), &recv, name, calling, pos)
        }
        Accessor::Index(node) => {
            let recv = current(trv, owners, pos)?;
            let key = trv.value(node)?;
            index(trv.gc(), &recv, &key, pos)
        }
        Accessor::Call(args) => {
            let args = trv.values(args)?;
            call(trv, owners, args, pos)
        }
    }
}

fn method(gc: &Gc, owner: &ObjRef, name: &str) -> ObjRef {
    gc.alloc(Object::OwnersMethod {
        owner: Rc::clone(owner),
        name: name.to_owned(),
    })
}

/// `recv.name`.  With `calling` set, a name missing from an entity resolves
/// to a method placeholder so the call can try its other strategies.
fn dot(gc: &Gc, recv: &ObjRef, name: &str, calling: bool, pos: &Pos) -> Result<ObjRef, ErrStack> {
    match recv.value() {
        Object::Module(m) => {
            if let Some(member) = context::find(&m.ctx, name, Find::AllScopes) {
                Ok(member)
            } else if m.builtins.is_some() || calling {
                Ok(method(gc, recv, name))
            } else {
                Err(fail!(Runtime, Some(pos), "\"{name}\" is not defined in module \"{}\"", m.name))
            }
        }
        Object::StructDef { ctx, .. } | Object::Instance { ctx, .. } => {
            match context::find(ctx, name, Find::AllScopes) {
                Some(member) => Ok(member),
                None if calling => Ok(method(gc, recv, name)),
                None => Err(fail!(
                    Runtime,
                    Some(pos),
                    "\"{name}\" is not a member of {}",
                    recv.value().type_name()
                )),
            }
        }
        Object::Str(_) | Object::Array(_) | Object::Dict(_) => Ok(method(gc, recv, name)),
        other => Err(fail!(Runtime, Some(pos), "can't access \"{name}\" of {}", other.type_name())),
    }
}

fn array_index(key: &ObjRef, len: usize, pos: &Pos) -> Result<usize, ErrStack> {
    let Some(n) = key.value().as_int() else {
        return Err(fail!(Runtime, Some(pos), "index must be int, not {}", key.value().type_name()));
    };
    usize::try_from(n)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| fail!(Runtime, Some(pos), "index out of range. {n} not in [0, {len})"))
}

fn dict_key<'a>(key: &'a ObjRef, pos: &Pos) -> Result<&'a str, ErrStack> {
    key.value()
        .as_str()
        .ok_or_else(|| fail!(Runtime, Some(pos), "dict key must be str, not {}", key.value().type_name()))
}

/// `recv[key]`.
fn index(gc: &Gc, recv: &ObjRef, key: &ObjRef, pos: &Pos) -> Result<ObjRef, ErrStack> {
    match recv.value() {
        Object::Str(s) => {
            let len = s.chars().count();
            let i = array_index(key, len, pos)?;
            let c = s.chars().nth(i).map(String::from).unwrap_or_default();
            Ok(gc.string(c))
        }
        Object::Array(items) => {
            let items = items.borrow();
            let i = array_index(key, items.len(), pos)?;
            Ok(Rc::clone(&items[i]))
        }
        Object::Dict(dict) => {
            let k = dict_key(key, pos)?;
            dict.borrow()
                .get(k)
                .cloned()
                .ok_or_else(|| fail!(Runtime, Some(pos), "key \"{k}\" not found"))
        }
        other => Err(fail!(Runtime, Some(pos), "can't index {}", other.type_name())),
    }
}

// ── Calls ─────────────────────────────────────────────────────────────────────

/// Call the last owner.  Strategies, first match wins: a user function; a
/// builtin for the receiver's type (or a global builtin for a bare name); a
/// function defined beside the receiver's struct; a struct, instantiated.
fn call(trv: &mut Traverser, owners: &[ObjRef], args: Vec<ObjRef>, pos: &Pos) -> Result<ObjRef, ErrStack> {
    let Some(raw) = owners.last() else {
        return Err(fail!(Internal, Some(pos), "empty owner stack"));
    };
    let receiver = match owners.len() {
        0 | 1 => None,
        n => Some(trv.deref(&owners[n - 2], pos)?),
    };

    let callee = match raw.value() {
        Object::Ident { name, ctx } => trv.lookup(name, ctx),
        _ => Some(trv.deref(raw, pos)?),
    };

    let Some(callee) = callee else {
        if let Object::Ident { name, .. } = raw.value() {
            if let Some(builtin) = builtins::lookup(functions::FUNCS, name) {
                return builtins::call(trv, builtin, None, args, pos);
            }
            return Err(fail!(Runtime, Some(pos), "cannot call \"{name}\". it is not defined"));
        }
        return Err(fail!(Internal, Some(pos), "unresolved callee"));
    };

    match callee.value() {
        Object::Func(_) => trv.invoke(&callee, receiver, args, pos),
        Object::OwnersMethod { owner, name } => {
            let table = builtins::table_for(owner.value());
            if let Some(builtin) = table.and_then(|t| builtins::lookup(t, name)) {
                return builtins::call(trv, builtin, Some(Rc::clone(owner)), args, pos);
            }
            if let Some(sibling) = sibling_func(owner, name) {
                return trv.invoke(&sibling, Some(Rc::clone(owner)), args, pos);
            }
            Err(fail!(Runtime, Some(pos), "cannot call \"{name}\" of {}", owner.value().type_name()))
        }
        Object::StructDef { .. } => instantiate(trv.gc(), &callee, args, pos),
        other => {
            let name = match raw.value() {
                Object::Ident { name, .. } => name.clone(),
                _ => other.type_name().to_owned(),
            };
            Err(fail!(Runtime, Some(pos), "cannot call \"{name}\""))
        }
    }
}

/// Function `name` visible from the definition of the instance `owner`.
fn sibling_func(owner: &ObjRef, name: &str) -> Option<ObjRef> {
    let Object::Instance { def, .. } = owner.value() else {
        return None;
    };
    let Object::StructDef { ctx, .. } = def.value() else {
        return None;
    };
    context::find(ctx, name, Find::Escaping).filter(|f| matches!(f.value(), Object::Func(_)))
}
