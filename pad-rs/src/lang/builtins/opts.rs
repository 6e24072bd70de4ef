//! The `opts` module: script options supplied by the host.

use std::collections::BTreeMap;

use super::{Args, BuiltinFunc};
use crate::lang::errors::ErrStack;
use crate::lang::object::ObjRef;
use crate::lang::traverser::Traverser;

/// Options and positional arguments passed to a script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOpts {
    pub options: BTreeMap<String, String>,
    /// Positional arguments; the first is the program name.
    pub args: Vec<String>,
}

impl ScriptOpts {
    /// Split `rest` into `--key=value` / `--flag` options and positional
    /// arguments, with `program` as argument 0.
    pub fn parse(program: &str, rest: &[String]) -> Self {
        let mut opts = ScriptOpts {
            options: BTreeMap::new(),
            args: vec![program.to_owned()],
        };
        for arg in rest {
            match arg.strip_prefix("--") {
                Some(opt) if !opt.is_empty() => {
                    let (key, value) = opt.split_once('=').unwrap_or((opt, ""));
                    opts.options.insert(key.to_owned(), value.to_owned());
                }
                _ => opts.args.push(arg.clone()),
            }
        }
        opts
    }
}

pub static FUNCS: &[BuiltinFunc] = &[
    BuiltinFunc { name: "get", func: get },
    BuiltinFunc { name: "has", func: has },
    BuiltinFunc { name: "args", func: args },
];

/// `opts.get(name)`: the option's value, nil when absent.
fn get(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(1)?;
    let name = args.str_at(0)?;
    let value = trv.script_opts().options.get(name).cloned();
    let gc = trv.gc();
    Ok(value.map_or_else(|| gc.nil(), |v| gc.string(v)))
}

fn has(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_len(1)?;
    let name = args.str_at(0)?;
    let found = trv.script_opts().options.contains_key(name);
    Ok(trv.gc().boolean(found))
}

/// `opts.args(i)`: positional argument `i`, nil when out of range.
fn args(trv: &mut Traverser, a: &Args) -> Result<ObjRef, ErrStack> {
    a.expect_len(1)?;
    let i = a.int_at(0)?;
    let value = usize::try_from(i)
        .ok()
        .and_then(|i| trv.script_opts().args.get(i).cloned());
    let gc = trv.gc();
    Ok(value.map_or_else(|| gc.nil(), |v| gc.string(v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_options_and_positionals() {
        let opts = ScriptOpts::parse("page.pad", &argv(&["--title=Home", "out", "--draft", "-x"]));
        assert_eq!(opts.options.get("title").map(String::as_str), Some("Home"));
        assert_eq!(opts.options.get("draft").map(String::as_str), Some(""));
        assert_eq!(opts.args, argv(&["page.pad", "out", "-x"]));
    }

    #[test]
    fn bare_double_dash_is_positional() {
        let opts = ScriptOpts::parse("p", &argv(&["--"]));
        assert!(opts.options.is_empty());
        assert_eq!(opts.args, argv(&["p", "--"]));
    }

    #[test]
    fn value_may_contain_equals() {
        let opts = ScriptOpts::parse("p", &argv(&["--expr=a=b"]));
        assert_eq!(opts.options.get("expr").map(String::as_str), Some("a=b"));
    }
}
