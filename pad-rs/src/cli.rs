//! Command-line argument parsing.
//!
//! Usage:
//!   pad [-d] [-f[<config>]] [-c<code>] [-L<dir>] [<file>|-] [script-args...]
//!
//! Flag parsing stops at the first positional argument or `--option`.  The
//! first positional is the template file (unless `-c` was given); everything
//! after it belongs to the script and is exposed through the `opts` module.

use std::path::PathBuf;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Module search directories (`-L<dir>`, repeatable).
    pub search_paths: Vec<PathBuf>,
    /// Config-file specification.
    pub config: ConfigFile,
    /// Template source given inline (`-c<code>`).
    pub command: Option<String>,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// Where the template comes from when `-c` is absent.
    pub input: Input,
    /// Arguments passed through to the script.
    pub script_args: Vec<String>,
}

/// How to choose the config file.
#[derive(Debug, Default)]
pub enum ConfigFile {
    /// Search the standard locations (default).
    #[default]
    Search,
    /// `-f` with no file argument: skip the config file.
    Skip,
    /// `-f<file>`: load this specific file.
    Explicit(PathBuf),
}

/// Template input.
#[derive(Debug, Default, PartialEq, Eq)]
pub enum Input {
    /// No file, or `-`.
    #[default]
    Stdin,
    File(PathBuf),
}

impl CliArgs {
    /// Name the script sees as `opts.args(0)`.
    pub fn program_name(&self) -> String {
        match (&self.command, &self.input) {
            (Some(_), _) => "<command>".to_owned(),
            (None, Input::Stdin) => "<stdin>".to_owned(),
            (None, Input::File(path)) => path.display().to_string(),
        }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut rest: &[String] = &[];
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            rest = &argv[i + 1..];
            break;
        }

        // Positional argument or script option.
        if !arg.starts_with('-') || arg == "-" || arg.starts_with("--") {
            rest = &argv[i..];
            break;
        }

        // Flag argument: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,

                // -f[<file>]
                'f' => {
                    if j + 1 < chars.len() {
                        let file: String = chars[j + 1..].iter().collect();
                        args.config = ConfigFile::Explicit(PathBuf::from(file));
                        j = chars.len();
                    } else {
                        args.config = ConfigFile::Skip;
                    }
                }

                // -c<code>
                'c' => {
                    let code = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-c requires a code argument".to_owned());
                    };
                    args.command = Some(code);
                }

                // -L<dir>
                'L' => {
                    let dir = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-L requires a directory argument".to_owned());
                    };
                    args.search_paths.push(PathBuf::from(dir));
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    let mut rest = rest.iter();
    if args.command.is_none() {
        let takes_file = rest
            .as_slice()
            .first()
            .is_some_and(|a| a == "-" || !a.starts_with("--"));
        if takes_file {
            if let Some(file) = rest.next() {
                if file != "-" {
                    args.input = Input::File(PathBuf::from(file));
                }
            }
        }
    }
    args.script_args = rest.cloned().collect();

    Ok(args)
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Search for the config file in the standard locations: the platform
/// config directory, then `./.padrc`.  Returns the first that exists.
pub fn find_user_config() -> Option<PathBuf> {
    let project = directories::ProjectDirs::from("", "", "pad")
        .map(|dirs| dirs.config_dir().join("padrc"));
    project
        .into_iter()
        .chain(std::iter::once(PathBuf::from("./.padrc")))
        .find(|p| p.exists())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn empty_args() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert!(!a.debug);
        assert_eq!(a.input, Input::Stdin);
        assert!(matches!(a.config, ConfigFile::Search));
        assert!(a.script_args.is_empty());
    }

    #[test]
    fn file_positional() {
        let a = parse_argv(&argv(&["page.pad"])).unwrap();
        assert_eq!(a.input, Input::File(PathBuf::from("page.pad")));
        assert_eq!(a.program_name(), "page.pad");
    }

    #[test]
    fn dash_reads_stdin() {
        let a = parse_argv(&argv(&["-", "x"])).unwrap();
        assert_eq!(a.input, Input::Stdin);
        assert_eq!(a.script_args, ["x"]);
    }

    #[test]
    fn script_args_follow_file() {
        let a = parse_argv(&argv(&["-d", "page.pad", "--title=Home", "-x", "out"])).unwrap();
        assert!(a.debug);
        assert_eq!(a.input, Input::File(PathBuf::from("page.pad")));
        assert_eq!(a.script_args, ["--title=Home", "-x", "out"]);
    }

    #[test]
    fn script_option_without_file() {
        let a = parse_argv(&argv(&["--title=Home"])).unwrap();
        assert_eq!(a.input, Input::Stdin);
        assert_eq!(a.script_args, ["--title=Home"]);
    }

    #[test]
    fn command_takes_no_file() {
        let a = parse_argv(&argv(&["-c{{ 1 }}", "arg"])).unwrap();
        assert_eq!(a.command.as_deref(), Some("{{ 1 }}"));
        assert_eq!(a.input, Input::Stdin);
        assert_eq!(a.script_args, ["arg"]);
        assert_eq!(a.program_name(), "<command>");
    }

    #[test]
    fn command_separate() {
        let a = parse_argv(&argv(&["-c", "hello"])).unwrap();
        assert_eq!(a.command.as_deref(), Some("hello"));
    }

    #[test]
    fn search_paths_repeat() {
        let a = parse_argv(&argv(&["-Llib", "-L", "/usr/share/pad"])).unwrap();
        assert_eq!(a.search_paths, [PathBuf::from("lib"), PathBuf::from("/usr/share/pad")]);
    }

    #[test]
    fn config_skip() {
        let a = parse_argv(&argv(&["-f"])).unwrap();
        assert!(matches!(a.config, ConfigFile::Skip));
    }

    #[test]
    fn config_explicit_embedded() {
        let a = parse_argv(&argv(&["-fmy.padrc"])).unwrap();
        assert!(matches!(&a.config, ConfigFile::Explicit(p) if p == &PathBuf::from("my.padrc")));
    }

    #[test]
    fn combined_flags() {
        let a = parse_argv(&argv(&["-dLlib"])).unwrap();
        assert!(a.debug);
        assert_eq!(a.search_paths, [PathBuf::from("lib")]);
    }

    #[test]
    fn double_dash_ends_flags() {
        let a = parse_argv(&argv(&["--", "-d"])).unwrap();
        assert!(!a.debug);
        assert_eq!(a.input, Input::File(PathBuf::from("-d")));
    }

    #[test]
    fn missing_command_argument() {
        assert!(parse_argv(&argv(&["-c"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["-z"])).is_err());
    }
}
