//! The `alias` module: name/value pairs handed back to the host.

use super::{Args, BuiltinFunc};
use crate::lang::context::Alias;
use crate::lang::errors::ErrStack;
use crate::lang::object::ObjRef;
use crate::lang::traverser::Traverser;

pub static FUNCS: &[BuiltinFunc] = &[BuiltinFunc { name: "set", func: set }];

/// `alias.set(key, value[, description])`.
fn set(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_range(2, 3)?;
    let key = args.str_at(0)?.to_owned();
    let value = args.arg(1)?.to_string();
    let description = match args.get(2) {
        Some(_) => Some(args.str_at(2)?.to_owned()),
        None => None,
    };
    trv.root().borrow_mut().aliases.insert(key, Alias { value, description });
    Ok(trv.gc().nil())
}
