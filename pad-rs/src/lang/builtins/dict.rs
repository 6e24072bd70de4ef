//! Methods on `dict` receivers.

use std::rc::Rc;

use super::{Args, BuiltinFunc};
use crate::lang::errors::ErrStack;
use crate::lang::object::{ObjRef, Object};
use crate::lang::traverser::Traverser;

pub static FUNCS: &[BuiltinFunc] = &[
    BuiltinFunc { name: "get", func: get },
    BuiltinFunc { name: "pop", func: pop },
];

/// `d.get(key[, default])`.
fn get(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_range(1, 2)?;
    let Object::Dict(dict) = args.receiver()?.value() else {
        return Err(args.error("receiver must be dict"));
    };
    let key = args.str_at(0)?;
    let found = dict.borrow().get(key).cloned();
    Ok(match (found, args.get(1)) {
        (Some(v), _) => v,
        (None, Some(default)) => Rc::clone(default),
        (None, None) => trv.gc().nil(),
    })
}

/// `d.pop(key)` removes the entry and returns its value; nil when missing.
fn pop(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(1)?;
    let Object::Dict(dict) = args.receiver()?.value() else {
        return Err(args.error("receiver must be dict"));
    };
    let key = args.str_at(0)?;
    let removed = dict.borrow_mut().remove(key);
    Ok(removed.unwrap_or_else(|| trv.gc().nil()))
}
