//! `padrc` configuration file parser.
//!
//! | Directive | Action |
//! |-----------|--------|
//! | `set <key>=<value>` or `set <key> <value>` | set an option |
//! | Lines starting with `#` | comment, ignored |
//!
//! Keys: `ldbrace`, `rdbrace` (expression markers), `path` (module search
//! directory, repeatable) and `log` (log level).

use std::path::{Path, PathBuf};

use log::LevelFilter;

use crate::lang::TokenizerOptions;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Parsed configuration.
#[derive(Debug, Default)]
pub struct Config {
    pub ldbrace: Option<String>,
    pub rdbrace: Option<String>,
    /// Module search directories in the order given.
    pub paths: Vec<PathBuf>,
    pub log: Option<LevelFilter>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string.
    ///
    /// Bad lines are reported and skipped; the rest of the file still loads.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (cmd, args_str) = line
                .split_once(|c: char| c.is_ascii_whitespace())
                .unwrap_or((line, ""));

            let result = match cmd {
                "set" => parse_set(&split_args(args_str.trim()))
                    .and_then(|(key, value)| config.apply(&key, value)),
                _ => Err(format!("unknown directive '{cmd}'")),
            };
            if let Err(message) = result {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Expression markers, defaulting the ones not configured.
    pub fn tokenizer_options(&self) -> TokenizerOptions {
        let mut opts = TokenizerOptions::default();
        if let Some(l) = &self.ldbrace {
            opts.ldbrace = l.clone();
        }
        if let Some(r) = &self.rdbrace {
            opts.rdbrace = r.clone();
        }
        opts
    }

    fn apply(&mut self, key: &str, value: String) -> Result<(), String> {
        match key {
            "ldbrace" | "rdbrace" => {
                if value.chars().count() != 2 {
                    return Err(format!("set: {key} needs two characters, got '{value}'"));
                }
                if key == "ldbrace" {
                    self.ldbrace = Some(value);
                } else {
                    self.rdbrace = Some(value);
                }
            }
            "path" => self.paths.push(PathBuf::from(value)),
            "log" => {
                let level = value
                    .parse::<LevelFilter>()
                    .map_err(|_| format!("set: unknown log level '{value}'"))?;
                self.log = Some(level);
            }
            _ => return Err(format!("set: unknown key '{key}'")),
        }
        Ok(())
    }
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens, honouring double-quoted strings
/// and `\"` escapes within them.
fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            c if c.is_ascii_whitespace() && !in_quotes => {
                if !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

// ── set ───────────────────────────────────────────────────────────────────────

/// Parse `set <key>=<value>` or `set <key> <value>`.
fn parse_set(tokens: &[String]) -> Result<(String, String), String> {
    let Some(first) = tokens.first() else {
        return Err("set: requires an argument".into());
    };

    let (key, value) = if let Some((k, v)) = first.split_once('=') {
        (k.to_owned(), v.to_owned())
    } else if tokens.len() >= 2 {
        (first.clone(), tokens[1..].join(" "))
    } else {
        return Err(format!("set: missing value for '{first}'"));
    };

    if key.is_empty() {
        return Err("set: key cannot be empty".into());
    }
    Ok((key, value))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // -- split_args -----------------------------------------------------------

    #[test]
    fn split_simple() {
        assert_eq!(split_args("path lib"), ["path", "lib"]);
    }

    #[test]
    fn split_quoted_spaces() {
        assert_eq!(split_args(r#"path "My Templates""#), ["path", "My Templates"]);
    }

    #[test]
    fn split_escaped_quote_inside_quotes() {
        assert_eq!(split_args(r#""say \"hi\"""#), [r#"say "hi""#]);
    }

    // -- set ------------------------------------------------------------------

    #[test]
    fn set_equals_syntax() {
        let (cfg, errs) = Config::load_str("set ldbrace=<%");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.ldbrace.as_deref(), Some("<%"));
    }

    #[test]
    fn set_space_syntax() {
        let (cfg, errs) = Config::load_str("set rdbrace %>");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.rdbrace.as_deref(), Some("%>"));
    }

    #[test]
    fn paths_accumulate_in_order() {
        let (cfg, errs) = Config::load_str("set path=lib\nset path \"/opt/pad templates\"");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.paths, [PathBuf::from("lib"), PathBuf::from("/opt/pad templates")]);
    }

    #[test]
    fn log_level() {
        let (cfg, errs) = Config::load_str("set log=debug");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.log, Some(LevelFilter::Debug));
    }

    #[test]
    fn tokenizer_options_default_missing_markers() {
        let (cfg, _) = Config::load_str("set ldbrace=[[");
        let opts = cfg.tokenizer_options();
        assert_eq!(opts.ldbrace, "[[");
        assert_eq!(opts.rdbrace, "}}");
    }

    // -- Errors ---------------------------------------------------------------

    #[test]
    fn bad_marker_length() {
        let (cfg, errs) = Config::load_str("set ldbrace=<");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 1);
        assert!(cfg.ldbrace.is_none());
    }

    #[test]
    fn unknown_key_and_directive_do_not_stop_loading() {
        let (cfg, errs) = Config::load_str("set colour=red\nload x\nset path=lib");
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].line, 1);
        assert_eq!(errs[1].line, 2);
        assert_eq!(cfg.paths, [PathBuf::from("lib")]);
    }

    #[test]
    fn bad_log_level() {
        let (_, errs) = Config::load_str("set log=loud");
        assert!(errs[0].message.contains("loud"));
    }

    // -- Comments -------------------------------------------------------------

    #[test]
    fn comments_and_blank_lines_ignored() {
        let src = "\
# pad configuration\n\
\n\
set ldbrace=<%\n\
set rdbrace=%>\n\
# search order\n\
set path=templates\n\
";
        let (cfg, errs) = Config::load_str(src);
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.tokenizer_options(), TokenizerOptions::new("<%", "%>"));
        assert_eq!(cfg.paths.len(), 1);
    }

    #[test]
    fn load_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padrc");
        std::fs::write(&path, "set log=warn\n").unwrap();
        let (cfg, errs) = Config::load_file(&path).unwrap();
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.log, Some(LevelFilter::Warn));
    }
}
