//! Native functions callable from templates.
//!
//! Each table is a static slice of [`BuiltinFunc`].  The global table backs
//! bare calls (`len(x)`) and the `__builtin__` module; the per-type tables
//! back method calls on strings, arrays and dicts; `alias` and `opts` are
//! pseudo-modules resolved from any context.

pub mod alias;
pub mod array;
pub mod dict;
pub mod functions;
pub mod opts;
pub mod string;

use log::trace;

use super::context::{Context, ContextKind};
use super::errors::{fail, ErrStack};
use super::gc::Gc;
use super::object::{Module, ObjRef, Object};
use super::tokens::Pos;
use super::traverser::Traverser;

pub type BuiltinFn = fn(&mut Traverser, &Args) -> Result<ObjRef, ErrStack>;

#[derive(Clone, Copy)]
pub struct BuiltinFunc {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// Arguments of one builtin call.
pub struct Args {
    /// Function name, for error messages.
    pub name: &'static str,
    /// Owner of a method call (`"a b".split()`), `None` for bare calls.
    pub receiver: Option<ObjRef>,
    pub list: Vec<ObjRef>,
    pub pos: Pos,
}

impl Args {
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&ObjRef> {
        self.list.get(i)
    }

    /// `can't invoke NAME. MSG` at the call site.
    pub fn error(&self, msg: impl std::fmt::Display) -> ErrStack {
        fail!(Runtime, Some(&self.pos), "can't invoke {}. {msg}", self.name)
    }

    pub fn expect_len(&self, n: usize) -> Result<(), ErrStack> {
        if self.list.len() == n {
            Ok(())
        } else {
            Err(self.error(format!("need {n} argument(s) but {} given", self.list.len())))
        }
    }

    pub fn expect_range(&self, min: usize, max: usize) -> Result<(), ErrStack> {
        if (min..=max).contains(&self.list.len()) {
            Ok(())
        } else {
            Err(self.error(format!(
                "need {min} to {max} arguments but {} given",
                self.list.len()
            )))
        }
    }

    pub fn arg(&self, i: usize) -> Result<&ObjRef, ErrStack> {
        self.list
            .get(i)
            .ok_or_else(|| self.error(format!("argument {} is missing", i + 1)))
    }

    pub fn str_at(&self, i: usize) -> Result<&str, ErrStack> {
        let arg = self.arg(i)?;
        arg.value().as_str().ok_or_else(|| {
            self.error(format!("argument {} must be str, not {}", i + 1, arg.value().type_name()))
        })
    }

    pub fn int_at(&self, i: usize) -> Result<i64, ErrStack> {
        let arg = self.arg(i)?;
        arg.value().as_int().ok_or_else(|| {
            self.error(format!("argument {} must be int, not {}", i + 1, arg.value().type_name()))
        })
    }

    pub fn receiver(&self) -> Result<&ObjRef, ErrStack> {
        self.receiver.as_ref().ok_or_else(|| self.error("no receiver"))
    }

    /// Receiver's string value.
    pub fn receiver_str(&self) -> Result<&str, ErrStack> {
        let recv = self.receiver()?;
        recv.value()
            .as_str()
            .ok_or_else(|| self.error(format!("receiver must be str, not {}", recv.value().type_name())))
    }
}

pub fn lookup(table: &'static [BuiltinFunc], name: &str) -> Option<&'static BuiltinFunc> {
    table.iter().find(|f| f.name == name)
}

/// Method table for a receiver of this type.
pub fn table_for(obj: &Object) -> Option<&'static [BuiltinFunc]> {
    match obj {
        Object::Str(_) => Some(string::FUNCS),
        Object::Array(_) => Some(array::FUNCS),
        Object::Dict(_) => Some(dict::FUNCS),
        Object::Module(m) => m.builtins,
        _ => None,
    }
}

pub(crate) fn call(
    trv: &mut Traverser,
    func: &BuiltinFunc,
    receiver: Option<ObjRef>,
    list: Vec<ObjRef>,
    pos: &Pos,
) -> Result<ObjRef, ErrStack> {
    trace!("builtin {} with {} argument(s)", func.name, list.len());
    let args = Args {
        name: func.name,
        receiver,
        list,
        pos: pos.clone(),
    };
    (func.func)(trv, &args)
}

/// Objects for the builtin pseudo-modules.
pub fn builtin_modules(gc: &Gc) -> Vec<ObjRef> {
    [
        ("__builtin__", functions::FUNCS),
        ("alias", alias::FUNCS),
        ("opts", opts::FUNCS),
    ]
    .into_iter()
    .map(|(name, table)| {
        gc.alloc(Object::Module(Module {
            name: name.to_owned(),
            program: None,
            ctx: Context::new_ref(ContextKind::Module),
            builtins: Some(table),
        }))
    })
    .collect()
}
