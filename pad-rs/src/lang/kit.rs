//! Host entry point: compile and render templates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;

use super::builtins::opts::ScriptOpts;
use super::compiler::compile;
use super::context::{Alias, Context, ContextKind, ContextRef};
use super::errors::{fail, ErrStack};
use super::gc::Gc;
use super::importer::{fs_loader, FileLoader, Importer};
use super::nodes::Node;
use super::tokenizer::{tokenize, TokenizerOptions};
use super::tokens::Source;
use super::traverser::{Traverser, MAX_CALL_DEPTH};

/// Everything a [`Kit`] is configured with.
#[derive(Clone)]
pub struct KitOptions {
    pub tokenizer: TokenizerOptions,
    /// Directories searched by `import` after the importing file's own.
    pub search_paths: Vec<PathBuf>,
    /// Read by the `opts` module.
    pub opts: ScriptOpts,
    /// File access for imports; the file system when `None`.
    pub loader: Option<FileLoader>,
    /// Nested function calls allowed before evaluation fails.
    pub max_call_depth: usize,
}

impl Default for KitOptions {
    fn default() -> Self {
        KitOptions {
            tokenizer: TokenizerOptions::default(),
            search_paths: Vec::new(),
            opts: ScriptOpts::default(),
            loader: None,
            max_call_depth: MAX_CALL_DEPTH,
        }
    }
}

/// One independent evaluator: its own arena, root context and module
/// cache.
pub struct Kit {
    gc: Gc,
    ctx: ContextRef,
    traverser: Traverser,
}

impl Default for Kit {
    fn default() -> Self {
        Kit::new()
    }
}

impl Kit {
    pub fn new() -> Self {
        Kit::with_options(KitOptions::default())
    }

    pub fn with_options(options: KitOptions) -> Self {
        let gc = Gc::new();
        let loader = options.loader.unwrap_or_else(fs_loader);
        let importer = Importer::new(options.tokenizer, options.search_paths, loader);
        let traverser =
            Traverser::new(&gc, importer, Rc::new(options.opts)).with_max_depth(options.max_call_depth);
        Kit {
            gc,
            ctx: Context::new_ref(ContextKind::Default),
            traverser,
        }
    }

    /// Tokenize and compile without evaluating.
    pub fn parse(&self, name: &str, src: &str) -> Result<Node, ErrStack> {
        let src = Source::new(name, src);
        let tokens = tokenize(&src, self.traverser.importer().tokenizer())?;
        let program = compile(&tokens, &src)?;
        debug!(
            "{name}: {} tokens, {} nodes",
            tokens.len(),
            program.count()
        );
        Ok(program)
    }

    /// Render `src` and return the stdout buffer.
    pub fn compile_from_str(&mut self, src: &str) -> Result<String, ErrStack> {
        self.render("<string>", src)
    }

    /// Render the file at `path`; its imports resolve relative to it.
    pub fn compile_file(&mut self, path: &Path) -> Result<String, ErrStack> {
        let text = self
            .traverser
            .importer()
            .read(path)
            .map_err(|e| fail!(Import, None, "can't read program. {e}"))?;
        self.render(&path.display().to_string(), &text)
    }

    /// Render `src` under the program name `name`.
    pub fn render(&mut self, name: &str, src: &str) -> Result<String, ErrStack> {
        let program = self.parse(name, src)?;
        self.traverser.traverse(&program, &self.ctx)?;
        Ok(self.stdout())
    }

    pub fn stdout(&self) -> String {
        self.ctx.borrow().stdout.clone()
    }

    pub fn stderr(&self) -> String {
        self.ctx.borrow().stderr.clone()
    }

    pub fn aliases(&self) -> BTreeMap<String, Alias> {
        self.ctx.borrow().aliases.clone()
    }

    /// Root context, for hosts that pre-bind variables.
    pub fn context(&self) -> &ContextRef {
        &self.ctx
    }

    pub fn gc(&self) -> &Gc {
        &self.gc
    }

    /// Fresh root context and module cache; options are kept.
    pub fn clear(&mut self) {
        self.ctx.borrow_mut().clear();
        self.traverser.importer_mut().clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_expression() {
        let mut kit = Kit::new();
        assert_eq!(kit.compile_from_str("{{ 1 + 2 }}").unwrap(), "3");
    }

    #[test]
    fn output_accumulates_until_clear() {
        let mut kit = Kit::new();
        kit.compile_from_str("a").unwrap();
        assert_eq!(kit.compile_from_str("b").unwrap(), "ab");
        kit.clear();
        assert_eq!(kit.compile_from_str("c").unwrap(), "c");
    }

    #[test]
    fn globals_survive_between_runs() {
        let mut kit = Kit::new();
        kit.compile_from_str("{@ x = 41 @}").unwrap();
        assert_eq!(kit.compile_from_str("{{ x + 1 }}").unwrap(), "42");
    }

    #[test]
    fn clear_releases_objects() {
        let mut kit = Kit::new();
        let baseline = kit.gc().live();
        kit.compile_from_str("{@ a = [1, 2, 3] d = {\"k\": a} @}").unwrap();
        assert!(kit.gc().live() > baseline);
        kit.clear();
        assert_eq!(kit.gc().live(), baseline);
    }

    #[test]
    fn custom_markers() {
        let mut kit = Kit::with_options(KitOptions {
            tokenizer: TokenizerOptions::new("<%", "%>"),
            ..KitOptions::default()
        });
        assert_eq!(kit.compile_from_str("{{x}} <% 2 * 3 %>").unwrap(), "{{x}} 6");
    }

    #[test]
    fn parse_error_has_position() {
        let kit = Kit::new();
        let err = kit.parse("t.pad", "line\n{@ if @}").unwrap_err();
        let first = err.innermost().unwrap();
        assert_eq!(first.program_name(), Some("t.pad"));
        assert_eq!(first.program_line(), Some(2));
    }
}
