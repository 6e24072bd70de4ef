//! Module loading for `import` and `from ... import`.
//!
//! A path is tried relative to the importing file's directory, then under
//! each search path, in order.  The first candidate the [`FileLoader`]
//! can read wins.  Modules are cached by resolved path, so a second import
//! of the same file returns the same module object.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;

use super::compiler::compile;
use super::context::{Context, ContextKind};
use super::errors::{diag, fail, ErrStack};
use super::object::{Module, ObjRef, Object};
use super::tokenizer::{tokenize, TokenizerOptions};
use super::tokens::{Pos, Source};
use super::traverser::Traverser;

/// Resolves a candidate path to the file's contents.  The error string is
/// reported if no candidate can be read.
pub type FileLoader = Rc<dyn Fn(&Path) -> Result<String, String>>;

/// Loader reading from the file system.
pub fn fs_loader() -> FileLoader {
    Rc::new(|path: &Path| std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display())))
}

pub struct Importer {
    loader: FileLoader,
    search_paths: Vec<PathBuf>,
    tokenizer: TokenizerOptions,
    cache: HashMap<PathBuf, ObjRef>,
    /// Modules whose evaluation is in progress, outermost first.
    loading: Vec<PathBuf>,
}

impl Importer {
    pub fn new(tokenizer: TokenizerOptions, search_paths: Vec<PathBuf>, loader: FileLoader) -> Self {
        Importer {
            loader,
            search_paths,
            tokenizer,
            cache: HashMap::new(),
            loading: Vec::new(),
        }
    }

    /// Same configuration, empty cache.
    pub fn fork(&self) -> Importer {
        Importer::new(self.tokenizer.clone(), self.search_paths.clone(), Rc::clone(&self.loader))
    }

    pub fn tokenizer(&self) -> &TokenizerOptions {
        &self.tokenizer
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Number of cached modules.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Read one file through the configured loader.
    pub fn read(&self, path: &Path) -> Result<String, String> {
        (self.loader)(path)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.loading.clear();
    }

    /// Candidate locations of `path` imported from `importer`.
    pub fn candidates(&self, path: &str, importer: &str) -> Vec<PathBuf> {
        let p = Path::new(path);
        if p.is_absolute() {
            return vec![p.to_path_buf()];
        }
        let mut out = Vec::with_capacity(self.search_paths.len() + 1);
        let base = Path::new(importer).parent().unwrap_or(Path::new(""));
        out.push(base.join(p));
        out.extend(self.search_paths.iter().map(|dir| dir.join(p)));
        out
    }

    /// First readable candidate and its text.
    fn load(&self, candidates: &[PathBuf], path: &str, pos: &Pos) -> Result<(PathBuf, String), ErrStack> {
        let mut last_err = String::new();
        for candidate in candidates {
            match (self.loader)(candidate) {
                Ok(text) => return Ok((candidate.clone(), text)),
                Err(e) => last_err = e,
            }
        }
        Err(fail!(Import, Some(pos), "can't import \"{path}\". {last_err}"))
    }
}

/// Load, evaluate and cache the module at `path`, or return the cached one.
pub(crate) fn import_module(trv: &mut Traverser, path: &str, pos: &Pos) -> Result<ObjRef, ErrStack> {
    let importer = trv.importer();
    let candidates = importer.candidates(path, &pos.source.name);
    if let Some(module) = candidates.iter().find_map(|c| importer.cache.get(c)) {
        debug!("import {path}: cache hit");
        return Ok(Rc::clone(module));
    }

    let (resolved, text) = importer.load(&candidates, path, pos)?;
    if importer.loading.contains(&resolved) {
        return Err(fail!(Import, Some(pos), "circular import of \"{path}\""));
    }
    debug!("import {path}: loading {}", resolved.display());

    let src = Source::new(resolved.display().to_string(), text);
    let wrap = |e: ErrStack| e.wrap(diag!(Import, Some(pos), "failed to import \"{path}\""));
    let tokens = tokenize(&src, importer.tokenizer()).map_err(wrap)?;
    let program = Rc::new(compile(&tokens, &src).map_err(wrap)?);

    let ctx = Context::new_ref(ContextKind::Module);
    trv.importer_mut().loading.push(resolved.clone());
    let result = trv.run_in(&ctx, &program);
    trv.importer_mut().loading.pop();
    result.map_err(wrap)?;

    let name = resolved
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_owned());
    let module = trv.gc().alloc(Object::Module(Module {
        name,
        program: Some(program),
        ctx,
        builtins: None,
    }));
    trv.importer_mut().cache.insert(resolved, Rc::clone(&module));
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn importer(paths: &[&str]) -> Importer {
        let loader: FileLoader = Rc::new(|p: &Path| Err(format!("{}: not found", p.display())));
        let paths = paths.iter().map(PathBuf::from).collect();
        Importer::new(TokenizerOptions::default(), paths, loader)
    }

    #[test]
    fn relative_to_importer_then_search_paths() {
        let imp = importer(&["/lib/pad", "vendor"]);
        let got = imp.candidates("util.pad", "site/index.pad");
        assert_eq!(
            got,
            vec![
                PathBuf::from("site/util.pad"),
                PathBuf::from("/lib/pad/util.pad"),
                PathBuf::from("vendor/util.pad"),
            ]
        );
    }

    #[test]
    fn absolute_path_is_the_only_candidate() {
        let imp = importer(&["/lib/pad"]);
        assert_eq!(imp.candidates("/tmp/a.pad", "x.pad"), vec![PathBuf::from("/tmp/a.pad")]);
    }

    #[test]
    fn load_reports_last_loader_error() {
        let imp = importer(&[]);
        let src = Source::new("main.pad", "");
        let pos = Pos::new(&src, 1, 0);
        let err = imp.load(&imp.candidates("x.pad", "main.pad"), "x.pad", &pos).unwrap_err();
        assert!(err.mentions("can't import \"x.pad\""));
        assert!(err.mentions("not found"));
    }

    #[test]
    fn fork_keeps_configuration_but_not_cache() {
        let imp = importer(&["lib"]);
        let forked = imp.fork();
        assert_eq!(forked.search_paths(), imp.search_paths());
        assert_eq!(forked.cached(), 0);
    }
}
