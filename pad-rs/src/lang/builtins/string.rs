//! Methods on `str` receivers.

use super::{Args, BuiltinFunc};
use crate::lang::errors::ErrStack;
use crate::lang::object::ObjRef;
use crate::lang::traverser::Traverser;

pub static FUNCS: &[BuiltinFunc] = &[
    BuiltinFunc { name: "lower", func: lower },
    BuiltinFunc { name: "upper", func: upper },
    BuiltinFunc { name: "capitalize", func: capitalize },
    BuiltinFunc { name: "snake", func: snake },
    BuiltinFunc { name: "camel", func: camel },
    BuiltinFunc { name: "hacker", func: hacker },
    BuiltinFunc { name: "split", func: split },
    BuiltinFunc { name: "rstrip", func: rstrip },
    BuiltinFunc { name: "lstrip", func: lstrip },
    BuiltinFunc { name: "strip", func: strip },
    BuiltinFunc { name: "isdigit", func: isdigit },
    BuiltinFunc { name: "isalpha", func: isalpha },
    BuiltinFunc { name: "isspace", func: isspace },
];

/// Characters removed by the strip family when no set is given.
const DEFAULT_STRIP: &str = " \r\n\t";

fn is_sep(c: char) -> bool {
    c == '-' || c == '_'
}

// ── Conversions ───────────────────────────────────────────────────────────────

pub fn capitalized(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `fooBar-baz` → `foo_bar_baz`.
pub fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut pending_sep = false;
    for c in s.chars() {
        if is_sep(c) {
            pending_sep = !out.is_empty();
            continue;
        }
        if c.is_uppercase() {
            if !out.is_empty() {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            if pending_sep {
                out.push('_');
            }
            out.push(c);
        }
        pending_sep = false;
    }
    out
}

/// `foo_bar-baz` → `fooBarBaz`.
pub fn camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for c in s.chars() {
        if is_sep(c) {
            upper_next = true;
            continue;
        }
        if out.is_empty() {
            out.extend(c.to_lowercase());
        } else if upper_next {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        upper_next = false;
    }
    out
}

/// `Foo_Bar-baz` → `foobarbaz`.
pub fn hacker_case(s: &str) -> String {
    s.chars().filter(|&c| !is_sep(c)).flat_map(char::to_lowercase).collect()
}

// ── Methods ───────────────────────────────────────────────────────────────────

fn map_str(trv: &mut Traverser, args: &Args, f: fn(&str) -> String) -> Result<ObjRef, ErrStack> {
    args.expect_len(0)?;
    let s = f(args.receiver_str()?);
    Ok(trv.gc().string(s))
}

fn lower(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    map_str(trv, args, str::to_lowercase)
}

fn upper(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    map_str(trv, args, str::to_uppercase)
}

fn capitalize(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    map_str(trv, args, capitalized)
}

fn snake(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    map_str(trv, args, snake_case)
}

fn camel(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    map_str(trv, args, camel_case)
}

fn hacker(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    map_str(trv, args, hacker_case)
}

/// `s.split(sep)` drops empty parts; without `sep` splits on whitespace.
fn split(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    args.expect_range(0, 1)?;
    let s = args.receiver_str()?;
    let parts: Vec<&str> = if args.is_empty() {
        s.split_whitespace().collect()
    } else {
        let sep = args.str_at(0)?;
        if sep.is_empty() {
            return Err(args.error("empty separator"));
        }
        s.split(sep).filter(|p| !p.is_empty()).collect()
    };
    let gc = trv.gc();
    let items = parts.into_iter().map(|p| gc.string(p)).collect();
    Ok(gc.array(items))
}

fn strip_set(args: &Args) -> Result<Vec<char>, ErrStack> {
    args.expect_range(0, 1)?;
    let set = if args.is_empty() { DEFAULT_STRIP } else { args.str_at(0)? };
    Ok(set.chars().collect())
}

fn rstrip(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    let set = strip_set(args)?;
    let s = args.receiver_str()?.trim_end_matches(set.as_slice());
    Ok(trv.gc().string(s))
}

fn lstrip(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    let set = strip_set(args)?;
    let s = args.receiver_str()?.trim_start_matches(set.as_slice());
    Ok(trv.gc().string(s))
}

fn strip(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    let set = strip_set(args)?;
    let s = args.receiver_str()?.trim_matches(set.as_slice());
    Ok(trv.gc().string(s))
}

fn test_chars(trv: &mut Traverser, args: &Args, f: fn(char) -> bool) -> Result<ObjRef, ErrStack> {
    args.expect_len(0)?;
    let all = args.receiver_str()?.chars().all(f);
    Ok(trv.gc().boolean(all))
}

fn isdigit(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    test_chars(trv, args, |c| c.is_ascii_digit())
}

fn isalpha(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    test_chars(trv, args, char::is_alphabetic)
}

fn isspace(trv: &mut Traverser, args: &Args) -> Result<ObjRef, ErrStack> {
    test_chars(trv, args, char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake() {
        assert_eq!(snake_case("fooBar-baz"), "foo_bar_baz");
        assert_eq!(snake_case("FooBar"), "foo_bar");
        assert_eq!(snake_case("--foo__bar"), "foo_bar");
        assert_eq!(snake_case("foo_Bar"), "foo_bar");
        assert_eq!(snake_case(""), "");
    }

    #[test]
    fn camel() {
        assert_eq!(camel_case("foo_bar-baz"), "fooBarBaz");
        assert_eq!(camel_case("FooBar"), "fooBar");
        assert_eq!(camel_case("_foo"), "foo");
    }

    #[test]
    fn hacker() {
        assert_eq!(hacker_case("Foo_Bar-baz"), "foobarbaz");
    }

    #[test]
    fn capitalize() {
        assert_eq!(capitalized("hello world"), "Hello world");
        assert_eq!(capitalized("éa"), "Éa");
        assert_eq!(capitalized(""), "");
    }
}
