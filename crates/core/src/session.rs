//! Parse session: loads one directory scope and drives it through import
//! resolution, merging, dispatch and post-validation.

use crate::ast::SourceFile;
use crate::config::ParsedConfig;
use crate::error::{Error, ErrorKind, ErrorList};
use crate::import::{is_import, ImportResolver};
use crate::merge::RawConfig;
use crate::options::ParseOptions;
use crate::parser;
use crate::registry::{ParseContext, Registry};
use crate::source::{normalize_path, FileSystemProvider, SourceProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Session lifecycle. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    ParseFiles,
    ResolveImports,
    Merge,
    Dispatch,
    PostValidate,
    Done,
    Failed,
}

pub struct ParseSession<'a> {
    registry: &'a Registry,
    provider: &'a dyn SourceProvider,
    options: &'a ParseOptions,
    root: PathBuf,
    dir: PathBuf,
    stage: Stage,
    errors: ErrorList,
}

impl<'a> ParseSession<'a> {
    /// `root` is the project root, `dir` the scope directory inside it.
    pub fn new(
        registry: &'a Registry,
        provider: &'a dyn SourceProvider,
        root: &Path,
        dir: &Path,
        options: &'a ParseOptions,
    ) -> Self {
        ParseSession {
            registry,
            provider,
            options,
            root: normalize_path(root),
            dir: normalize_path(dir),
            stage: Stage::Init,
            errors: ErrorList::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(dir = %self.dir.display(), from = ?self.stage, to = ?stage, "session stage");
        self.stage = stage;
    }

    /// Run every stage. The result holds either the complete configuration
    /// or every error found; never a partial mix.
    pub fn run(mut self) -> Result<ParsedConfig, ErrorList> {
        if !self.dir.starts_with(&self.root) {
            self.enter(Stage::Failed);
            return Err(Error::new(
                ErrorKind::Import,
                None,
                format!(
                    "directory {} is outside the project root {}",
                    self.dir.display(),
                    self.root.display()
                ),
            )
            .into());
        }

        self.enter(Stage::ParseFiles);
        let own = self.parse_files();

        self.enter(Stage::ResolveImports);
        let files = self.resolve_imports(own);

        self.enter(Stage::Merge);
        let raw = self.merge(&files);

        self.enter(Stage::Dispatch);
        let mut ctx = ParseContext::new(self.options, ParsedConfig::new(&self.dir));
        ctx.config.attributes = raw.attributes.clone();
        self.errors.append(self.registry.dispatch(&mut ctx, &raw));

        self.enter(Stage::PostValidate);
        self.errors.append(self.registry.validate(&ctx));

        if self.errors.is_empty() {
            self.enter(Stage::Done);
            Ok(ctx.config)
        } else {
            self.enter(Stage::Failed);
            Err(self.errors)
        }
    }

    fn parse_files(&mut self) -> Vec<Arc<SourceFile>> {
        let paths = match self.provider.list_config_files(&self.dir) {
            Ok(paths) => paths,
            Err(e) => {
                self.errors.push(Error::new(
                    ErrorKind::Io,
                    None,
                    format!("cannot list directory {}: {}", self.dir.display(), e),
                ));
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        for path in paths {
            let path = normalize_path(&path);
            tracing::trace!(file = %path.display(), "parsing");
            let src = match self.provider.read_source(&path) {
                Ok(src) => src,
                Err(e) => {
                    self.errors.push(Error::new(
                        ErrorKind::Io,
                        None,
                        format!("cannot read file {}: {}", path.display(), e),
                    ));
                    continue;
                }
            };
            match parser::parse_source(&src, &path) {
                Ok(file) => files.push(Arc::new(file)),
                Err(errs) => self.errors.extend(errs),
            }
        }
        files
    }

    fn resolve_imports(&mut self, own: Vec<Arc<SourceFile>>) -> Vec<Arc<SourceFile>> {
        let mut resolver =
            ImportResolver::new(self.provider, &self.root, self.registry.refused_imports())
                .with_scope_files(own.iter().map(|f| f.path.clone()));
        let mut files = Vec::new();
        for file in own {
            files.extend(resolver.expand(file, &mut self.errors));
        }
        files
    }

    fn merge(&mut self, files: &[Arc<SourceFile>]) -> RawConfig {
        let mut raw = self.registry.raw_config();
        for file in files {
            self.errors.append(raw.merge_attributes(&file.body.attributes));
            for block in file.body.blocks.iter().filter(|b| !is_import(b)) {
                self.errors.append(raw.merge_block(block));
            }
        }
        raw
    }
}

/// Parse one directory of the filesystem with the built-in handlers.
pub fn parse_dir(root: &Path, dir: &Path, options: &ParseOptions) -> Result<ParsedConfig, ErrorList> {
    let registry = Registry::builtin();
    ParseSession::new(&registry, &FileSystemProvider, root, dir, options).run()
}
