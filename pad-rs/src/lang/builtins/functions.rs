//! Global builtins: bare calls such as `len(x)` and `__builtin__.len(x)`.

use std::rc::Rc;

use log::info;

use super::{Args, BuiltinFunc};
use crate::lang::compiler::compile;
use crate::lang::context;
use crate::lang::errors::{fail, ErrStack};
use crate::lang::object::{deep_copy, shallow_copy, ObjRef, Object};
use crate::lang::tokenizer::tokenize;
use crate::lang::tokens::Source;
use crate::lang::traverser::Traverser;

pub static FUNCS: &[BuiltinFunc] = &[
    BuiltinFunc { name: "id", func: id },
    BuiltinFunc { name: "type", func: type_ },
    BuiltinFunc { name: "puts", func: puts },
    BuiltinFunc { name: "eputs", func: eputs },
    BuiltinFunc { name: "len", func: len },
    BuiltinFunc { name: "die", func: die },
    BuiltinFunc { name: "exit", func: exit },
    BuiltinFunc { name: "copy", func: copy },
    BuiltinFunc { name: "deepcopy", func: deepcopy },
    BuiltinFunc { name: "assert", func: assert },
    BuiltinFunc { name: "extract", func: extract },
    BuiltinFunc { name: "setattr", func: setattr },
    BuiltinFunc { name: "getattr", func: getattr },
    BuiltinFunc { name: "ord", func: ord },
    BuiltinFunc { name: "chr", func: chr },
    BuiltinFunc { name: "dance", func: dance },
];

fn id(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(1)?;
    Ok(trv.gc().int(args.arg(0)?.id().as_int()))
}

fn type_(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(1)?;
    Ok(trv.gc().string(args.arg(0)?.value().type_name()))
}

/// Arguments joined by spaces, newline terminated.
fn joined(args: &Args) -> String {
    let mut line = args
        .list
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    line.push('\n');
    line
}

fn puts(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    trv.write_stdout(&joined(args));
    Ok(trv.gc().nil())
}

fn eputs(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    trv.write_stderr(&joined(args));
    Ok(trv.gc().nil())
}

fn len(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(1)?;
    let n = match args.arg(0)?.value() {
        Object::Str(s) => s.chars().count(),
        Object::Array(items) => items.borrow().len(),
        Object::Dict(dict) => dict.borrow().len(),
        other => return Err(args.error(format!("{} has no length", other.type_name()))),
    };
    let n = i64::try_from(n).map_err(|_| args.error("length out of range"))?;
    Ok(trv.gc().int(n))
}

fn die(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    if !args.is_empty() {
        trv.write_stderr(&joined(args));
    }
    info!("script died at {}:{}", args.pos.source.name, args.pos.line);
    Err(ErrStack::exit(1, Some(&args.pos)))
}

fn exit(_trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_range(0, 1)?;
    let code = if args.is_empty() { 0 } else { args.int_at(0)? };
    let code = i32::try_from(code).map_err(|_| args.error(format!("exit code {code} out of range")))?;
    info!("script requested exit({code})");
    Err(ErrStack::exit(code, Some(&args.pos)))
}

fn copy(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(1)?;
    Ok(shallow_copy(trv.gc(), args.arg(0)?))
}

fn deepcopy(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(1)?;
    Ok(deep_copy(trv.gc(), args.arg(0)?))
}

fn assert(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_range(1, 2)?;
    if args.arg(0)?.value().is_truthy() {
        return Ok(trv.gc().nil());
    }
    match args.get(1) {
        Some(msg) => Err(fail!(Runtime, Some(&args.pos), "assertion error. {msg}")),
        None => Err(fail!(Runtime, Some(&args.pos), "assertion error")),
    }
}

/// Copy every field of each struct, instance or module into the current
/// scope.
fn extract(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    for (i, arg) in args.list.iter().enumerate() {
        let Some(fields) = arg.value().fields() else {
            return Err(args.error(format!(
                "argument {} must be struct, object or module, not {}",
                i + 1,
                arg.value().type_name()
            )));
        };
        let pairs: Vec<(String, ObjRef)> = fields
            .borrow()
            .globals()
            .iter()
            .map(|(k, v)| (k.to_owned(), Rc::clone(v)))
            .collect();
        for (k, v) in pairs {
            context::assign(trv.context(), &k, v);
        }
    }
    Ok(trv.gc().nil())
}

fn setattr(_trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(3)?;
    let target = args.arg(0)?;
    let key = args.str_at(1)?;
    let value = Rc::clone(args.arg(2)?);
    match target.value() {
        Object::Dict(dict) => dict.borrow_mut().set(key, Rc::clone(&value)),
        other => match other.fields() {
            Some(fields) => fields.borrow_mut().globals_mut().set(key, Rc::clone(&value)),
            None => return Err(args.error(format!("can't set attribute of {}", other.type_name()))),
        },
    }
    Ok(value)
}

fn getattr(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(2)?;
    let target = args.arg(0)?;
    let key = args.str_at(1)?;
    let found = match target.value() {
        Object::Dict(dict) => dict.borrow().get(key).cloned(),
        other => match other.fields() {
            Some(fields) => fields.borrow().globals().get(key).cloned(),
            None => return Err(args.error(format!("can't get attribute of {}", other.type_name()))),
        },
    };
    Ok(found.unwrap_or_else(|| trv.gc().nil()))
}

fn ord(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(1)?;
    let s = args.str_at(0)?;
    let c = s.chars().next().ok_or_else(|| args.error("empty string"))?;
    Ok(trv.gc().int(i64::from(u32::from(c))))
}

fn chr(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(1)?;
    let n = args.int_at(0)?;
    let c = u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| args.error(format!("{n} is not a character")))?;
    Ok(trv.gc().string(c.to_string()))
}

/// Run `code` in a sandbox and return `[stdout, stderr]`; stderr is nil
/// when the run wrote nothing there and did not fail.
fn dance(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_range(1, 2)?;
    let code = args.str_at(0)?;
    let globals: Vec<(String, ObjRef)> = match args.get(1).map(|a| a.value()) {
        None | Some(Object::Nil) => Vec::new(),
        Some(Object::Dict(dict)) => dict
            .borrow()
            .iter()
            .map(|(k, v)| (k.to_owned(), Rc::clone(v)))
            .collect(),
        Some(other) => return Err(args.error(format!("argument 2 must be dict, not {}", other.type_name()))),
    };

    let src = Source::new("<dance>", code);
    let program = tokenize(&src, trv.importer().tokenizer()).and_then(|tokens| compile(&tokens, &src));
    let (stdout, stderr) = match program {
        Ok(program) => {
            let (ctx, result) = trv.sandbox(&program, globals);
            let ctx = ctx.borrow();
            let mut stderr = ctx.stderr.clone();
            if let Err(e) = result {
                stderr.push_str(&e.trace());
            }
            (ctx.stdout.clone(), stderr)
        }
        Err(e) => (String::new(), e.trace()),
    };

    let gc = trv.gc();
    let stderr = if stderr.is_empty() { gc.nil() } else { gc.string(stderr) };
    Ok(gc.array(vec![gc.string(stdout), stderr]))
}
