//! Methods on `array` receivers.

use std::rc::Rc;

use super::{Args, BuiltinFunc};
use crate::lang::errors::ErrStack;
use crate::lang::object::{ObjRef, Object};
use crate::lang::traverser::Traverser;

pub static FUNCS: &[BuiltinFunc] = &[
    BuiltinFunc { name: "push", func: push },
    BuiltinFunc { name: "pop", func: pop },
];

/// `a.push(x)` appends in place and returns `a`.
fn push(_trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(1)?;
    let recv = args.receiver()?;
    let Object::Array(items) = recv.value() else {
        return Err(args.error("receiver must be array"));
    };
    items.borrow_mut().push(Rc::clone(args.arg(0)?));
    Ok(Rc::clone(recv))
}

/// `a.pop()` removes the last element; nil when empty.
fn pop(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(0)?;
    let Object::Array(items) = args.receiver()?.value() else {
        return Err(args.error("receiver must be array"));
    };
    let last = items.borrow_mut().pop();
    Ok(last.unwrap_or_else(|| trv.gc().nil()))
}
