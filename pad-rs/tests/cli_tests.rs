/// Command-line tests: run templates through the `pad` binary and check its
/// stdout, stderr and exit status.
///
/// Every invocation passes `-f` (or `-f<file>`) so a user's own `padrc`
/// never leaks into the results.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Path to the `pad` binary built by this package.
fn pad_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pad"))
}

/// Run `pad` with `args`, feeding `stdin` to it.
fn run_pad(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(pad_binary())
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn pad binary");
    {
        let input = child.stdin.as_mut().expect("stdin not open");
        input.write_all(stdin.as_bytes()).expect("write to stdin");
    }
    child.wait_with_output().expect("wait failed")
}

fn stdout_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

// ── Input sources ─────────────────────────────────────────────────────────────

#[test]
fn renders_stdin() {
    let out = run_pad(&["-f"], "{@ for i = 0; i < 3; i += 1 @}{{ i }}{@ end @}\n");
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    assert_eq!(stdout_of(&out), "012\n");
}

#[test]
fn dash_reads_stdin() {
    let out = run_pad(&["-f", "-"], "{{ \"a\" * 2 }}");
    assert!(out.status.success());
    assert_eq!(stdout_of(&out), "aa");
}

#[test]
fn renders_inline_command() {
    let out = run_pad(&["-f", "-c", "{{ 6 * 7 }}"], "");
    assert!(out.status.success());
    assert_eq!(stdout_of(&out), "42");
}

#[test]
fn renders_file_with_relative_import() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.pad"), "{@ def shout(s) return s.upper() end @}").unwrap();
    let main = dir.path().join("main.pad");
    std::fs::write(&main, "{@ import \"lib.pad\" as lib @}{{ lib.shout(\"hey\") }}").unwrap();

    let out = run_pad(&["-f", main.to_str().unwrap()], "");
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    assert_eq!(stdout_of(&out), "HEY");
}

#[test]
fn search_path_flag() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("names.pad"), "{@ who = \"lib\" @}").unwrap();

    let flag = format!("-L{}", dir.path().display());
    let out = run_pad(&["-f", &flag], "{@ from \"names.pad\" import who @}{{ who }}");
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    assert_eq!(stdout_of(&out), "lib");
}

// ── Script arguments ──────────────────────────────────────────────────────────

#[test]
fn script_options_and_arguments() {
    let out = run_pad(
        &["-f", "-c", "{{ opts.get(\"name\") }} {{ opts.has(\"v\") }} {{ opts.args(0) }} {{ opts.args(1) }}", "--name=world", "--v", "pos"],
        "",
    );
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    assert_eq!(stdout_of(&out), "world true <command> pos");
}

#[test]
fn file_name_is_argument_zero() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("args.pad");
    std::fs::write(&main, "{{ opts.args(1) }}").unwrap();

    let out = run_pad(&["-f", main.to_str().unwrap(), "first"], "");
    assert!(out.status.success());
    assert_eq!(stdout_of(&out), "first");
}

// ── Exit status ───────────────────────────────────────────────────────────────

#[test]
fn exit_builtin_sets_status() {
    let out = run_pad(&["-f"], "kept{@ exit(3) @}dropped");
    assert_eq!(out.status.code(), Some(3));
    assert_eq!(stdout_of(&out), "kept");
}

#[test]
fn die_writes_message_and_fails() {
    let out = run_pad(&["-f"], "{@ die(\"fatal\") @}");
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(stderr_of(&out), "fatal\n");
}

#[test]
fn runtime_error_is_reported() {
    let out = run_pad(&["-f"], "before {{ nope }}");
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(stdout_of(&out), "before ");
    let err = stderr_of(&out);
    assert!(err.contains("error:"), "stderr: {err}");
    assert!(err.contains("nope"), "stderr: {err}");
}

#[test]
fn eputs_goes_to_stderr() {
    let out = run_pad(&["-f"], "{@ puts(\"out\") eputs(\"err\") @}");
    assert!(out.status.success());
    assert_eq!(stdout_of(&out), "out\n");
    assert_eq!(stderr_of(&out), "err\n");
}

#[test]
fn unknown_flag_is_rejected() {
    let out = run_pad(&["-z"], "");
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr_of(&out).contains("unknown option: -z"));
}

// ── Config file ───────────────────────────────────────────────────────────────

#[test]
fn config_file_changes_markers() {
    let dir = tempfile::tempdir().unwrap();
    let rc = dir.path().join("padrc");
    std::fs::write(&rc, "# markers\nset ldbrace=<%\nset rdbrace %>\n").unwrap();

    let flag = format!("-f{}", rc.display());
    let out = run_pad(&[&flag], "{{ x }} <% 1 + 1 %>");
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    assert_eq!(stdout_of(&out), "{{ x }} 2");
}

#[test]
fn config_search_path() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("lib");
    std::fs::create_dir(&lib).unwrap();
    std::fs::write(lib.join("m.pad"), "{@ v = 7 @}").unwrap();
    let rc = dir.path().join("padrc");
    std::fs::write(&rc, format!("set path \"{}\"\n", lib.display())).unwrap();

    let flag = format!("-f{}", rc.display());
    let out = run_pad(&[&flag], "{@ import \"m.pad\" as m @}{{ m.v }}");
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    assert_eq!(stdout_of(&out), "7");
}

#[test]
fn missing_config_file_fails() {
    let out = run_pad(&["-f/nonexistent/padrc"], "x");
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr_of(&out).contains("/nonexistent/padrc"));
}
