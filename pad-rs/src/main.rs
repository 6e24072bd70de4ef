use std::io::{self, Read, Write};
use std::path::PathBuf;

use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use log::{debug, warn, LevelFilter};

use pad::cli::{self, ConfigFile, Input};
use pad::config::{Config, ConfigError};
use pad::lang::builtins::opts::ScriptOpts;
use pad::lang::{ErrStack, Kit, KitOptions};

const USAGE: &str = "Usage: pad [-d] [-f[<config>]] [-c<code>] [-L<dir>] [<file>|-] [script-args...]";

fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("pad: {e}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    // ── Config file ───────────────────────────────────────────────────────────
    let config_path: Option<PathBuf> = match &args.config {
        ConfigFile::Skip => None,
        ConfigFile::Explicit(path) => Some(path.clone()),
        ConfigFile::Search => cli::find_user_config(),
    };
    let (config, config_errors) = match &config_path {
        Some(path) => match Config::load_file(path) {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("pad: {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => (Config::new(), Vec::new()),
    };

    // ── Logging ───────────────────────────────────────────────────────────────
    let level = if args.debug {
        LevelFilter::Debug
    } else {
        config.log.unwrap_or(LevelFilter::Warn)
    };
    if let Err(e) = simple_logger::SimpleLogger::new().with_level(level).env().init() {
        eprintln!("pad: can't initialize logging: {e}");
    }
    report_config_errors(config_path.as_deref(), &config_errors);

    // ── Kit ───────────────────────────────────────────────────────────────────
    let tokenizer = config.tokenizer_options();
    if let Err(e) = tokenizer.validate() {
        print_error(&e);
        std::process::exit(1);
    }
    let mut search_paths = config.paths.clone();
    search_paths.extend(args.search_paths.iter().cloned());
    debug!("search paths: {search_paths:?}");

    let mut kit = Kit::with_options(KitOptions {
        tokenizer,
        search_paths,
        opts: ScriptOpts::parse(&args.program_name(), &args.script_args),
        ..KitOptions::default()
    });

    // ── Render ────────────────────────────────────────────────────────────────
    let result = match (&args.command, &args.input) {
        (Some(code), _) => kit.render("<command>", code),
        (None, Input::File(path)) => kit.compile_file(path),
        (None, Input::Stdin) => {
            let mut src = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut src) {
                eprintln!("pad: can't read stdin: {e}");
                std::process::exit(1);
            }
            kit.render("<stdin>", &src)
        }
    };

    print!("{}", kit.stdout());
    eprint!("{}", kit.stderr());
    let _ = io::stdout().flush();

    if let Err(e) = result {
        if let Some(code) = e.exit_code() {
            std::process::exit(code);
        }
        print_error(&e);
        std::process::exit(1);
    }
}

fn report_config_errors(path: Option<&std::path::Path>, errors: &[ConfigError]) {
    let name = path.map(|p| p.display().to_string()).unwrap_or_default();
    for e in errors {
        warn!("{name}: {e}");
    }
}

/// Render `e` to stderr, with a colored prefix on a terminal.
fn print_error(e: &ErrStack) {
    let stderr = io::stderr();
    let prefix = if stderr.is_tty() {
        "error:".red().bold().to_string()
    } else {
        "error:".to_owned()
    };
    let mut out = stderr.lock();
    let _ = write!(out, "{prefix} {e}");
}
