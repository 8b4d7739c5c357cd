//! Import resolution: expands `import` blocks into the effective file set
//! of a directory scope.
//!
//! Expansion is depth-first over an explicit stack of frames. Each frame
//! holds the targets its file imports; the frames on the stack form the
//! current import chain, used for cycle detection. A scope-wide visited set
//! ensures a file reached twice through different importers is merged once.
//! Files owned by the scope itself are never importable, whatever order the
//! scope's files are expanded in.

use crate::ast::{Block, Range, SourceFile};
use crate::error::{Error, ErrorList};
use crate::eval::{self, Value};
use crate::parser;
use crate::source::{normalize_path, SourceProvider};
use glob::Pattern;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The reserved block type consumed by the resolver.
pub const IMPORT_BLOCK: &str = "import";

pub fn is_import(block: &Block) -> bool {
    block.block_type == IMPORT_BLOCK
}

fn is_glob(source: &str) -> bool {
    source.contains(['*', '?', '['])
}

/// One accepted import edge.
#[derive(Debug, Clone)]
struct Target {
    path: PathBuf,
    source_range: Range,
}

struct Frame {
    path: PathBuf,
    targets: std::vec::IntoIter<Target>,
}

pub struct ImportResolver<'a> {
    provider: &'a dyn SourceProvider,
    root: PathBuf,
    refused: BTreeSet<String>,
    own: HashSet<PathBuf>,
    visited: HashSet<PathBuf>,
}

impl<'a> ImportResolver<'a> {
    /// `refused` lists block types that may not appear in imported files.
    pub fn new<I, S>(provider: &'a dyn SourceProvider, root: &Path, refused: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ImportResolver {
            provider,
            root: normalize_path(root),
            refused: refused.into_iter().map(Into::into).collect(),
            own: HashSet::new(),
            visited: HashSet::new(),
        }
    }

    /// Declare the scope's own files. An import naming one of them is an
    /// error instead of a second, order-dependent load.
    pub fn with_scope_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.own = paths.into_iter().map(|p| normalize_path(p.as_ref())).collect();
        self
    }

    /// Expand the imports of one of the scope's own files.
    ///
    /// Returns `file` followed by every file it transitively imports, in
    /// depth-first discovery order, or nothing when `file` was already
    /// pulled in through an earlier import of a resolver without declared
    /// scope files. Violations are pushed to `errors`; an offending edge is
    /// dropped and expansion continues with its siblings.
    pub fn expand(&mut self, file: Arc<SourceFile>, errors: &mut ErrorList) -> Vec<Arc<SourceFile>> {
        let root_path = file.path.to_path_buf();
        if !self.visited.insert(root_path.clone()) {
            return Vec::new();
        }

        let mut out = vec![file.clone()];
        let mut stack = vec![Frame {
            targets: self.targets_of(&file, &[root_path.clone()], errors).into_iter(),
            path: root_path,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(target) = frame.targets.next() else {
                stack.pop();
                continue;
            };
            tracing::debug!(
                importer = %frame.path.display(),
                target = %target.path.display(),
                "import edge"
            );
            if !self.visited.insert(target.path.clone()) {
                tracing::trace!(target = %target.path.display(), "already merged in this scope");
                continue;
            }
            let Some(imported) = self.load(&target, errors) else {
                continue;
            };

            let mut chain: Vec<PathBuf> = stack.iter().map(|f| f.path.clone()).collect();
            chain.push(target.path.clone());
            let targets = self.targets_of(&imported, &chain, errors);
            out.push(imported);
            stack.push(Frame {
                path: target.path,
                targets: targets.into_iter(),
            });
        }
        out
    }

    fn load(&self, target: &Target, errors: &mut ErrorList) -> Option<Arc<SourceFile>> {
        let src = match self.provider.read_source(&target.path) {
            Ok(src) => src,
            Err(e) => {
                errors.push(Error::import(
                    &target.source_range,
                    format!("cannot read imported file {}: {}", target.path.display(), e),
                ));
                return None;
            }
        };
        let file = match parser::parse_source(&src, &target.path) {
            Ok(file) => file,
            Err(errs) => {
                errors.extend(errs);
                return None;
            }
        };
        for block in &file.body.blocks {
            if self.refused.contains(&block.block_type) {
                errors.push(Error::unexpected(
                    &block.def_range(),
                    format!(
                        "block {:?} cannot be imported (imported at {})",
                        block.block_type, target.source_range
                    ),
                ));
            }
        }
        Some(Arc::new(file))
    }

    /// Validate every import block of `file` and return the accepted edges.
    /// `chain` ends with `file` itself.
    fn targets_of(&self, file: &SourceFile, chain: &[PathBuf], errors: &mut ErrorList) -> Vec<Target> {
        let importer_dir = file.path.parent().unwrap_or(Path::new("/"));
        let mut imported: HashSet<PathBuf> = HashSet::new();
        let mut targets = Vec::new();

        for block in file.blocks_of(IMPORT_BLOCK) {
            let Some((source, source_range)) = import_source(block, errors) else {
                continue;
            };
            for path in self.expand_source(importer_dir, &source, &source_range, errors) {
                if let Err(e) = self.check_edge(file, chain, &mut imported, &path, &source, &source_range) {
                    errors.push(e);
                    continue;
                }
                targets.push(Target {
                    path,
                    source_range: source_range.clone(),
                });
            }
        }
        targets
    }

    /// Resolve a `source` string to the files it names, in lexical order.
    fn expand_source(
        &self,
        importer_dir: &Path,
        source: &str,
        range: &Range,
        errors: &mut ErrorList,
    ) -> Vec<PathBuf> {
        let path = match source.strip_prefix('/') {
            Some(rooted) => normalize_path(&self.root.join(rooted)),
            None => normalize_path(&importer_dir.join(source)),
        };

        if !is_glob(source) {
            if self.provider.is_file(&path) {
                return vec![path];
            }
            errors.push(Error::import(
                range,
                format!("import path {:?} does not exist", source),
            ));
            return Vec::new();
        }

        let base = if source.starts_with('/') { self.root.as_path() } else { importer_dir };
        let pattern = match Pattern::new(&glob_pattern(base, source)) {
            Ok(pattern) => pattern,
            Err(e) => {
                errors.push(Error::schema(
                    range,
                    format!("invalid glob pattern {:?}: {}", source, e),
                ));
                return Vec::new();
            }
        };
        match self.provider.glob(&pattern) {
            Ok(matches) if matches.is_empty() => {
                errors.push(Error::import(
                    range,
                    format!("import pattern {:?} matched no files", source),
                ));
                Vec::new()
            }
            Ok(mut matches) => {
                matches.sort();
                matches
            }
            Err(e) => {
                errors.push(Error::import(
                    range,
                    format!("cannot expand import pattern {:?}: {}", source, e),
                ));
                Vec::new()
            }
        }
    }

    fn check_edge(
        &self,
        importer: &SourceFile,
        chain: &[PathBuf],
        imported: &mut HashSet<PathBuf>,
        path: &Path,
        source: &str,
        range: &Range,
    ) -> Result<(), Error> {
        if !path.starts_with(&self.root) {
            return Err(Error::import(
                range,
                format!("import path {:?} is outside the project root", source),
            ));
        }
        if path == &*importer.path {
            return Err(Error::import(
                range,
                format!("file {} imports itself", path.display()),
            ));
        }
        if path.parent() == importer.path.parent() {
            return Err(Error::import(
                range,
                format!(
                    "cannot import {} from the same directory as the importing file",
                    path.display()
                ),
            ));
        }
        let in_cycle = chain.iter().any(|p| p == path);
        if !in_cycle && self.own.contains(path) {
            return Err(Error::import(
                range,
                format!(
                    "cannot import {}: it belongs to the scope being parsed",
                    path.display()
                ),
            ));
        }
        if in_cycle {
            let cycle: Vec<String> = chain
                .iter()
                .map(|p| p.display().to_string())
                .chain(std::iter::once(path.display().to_string()))
                .collect();
            return Err(Error::import(
                range,
                format!("import cycle detected: {}", cycle.join(" \u{2192} ")),
            ));
        }
        if !imported.insert(path.to_path_buf()) {
            return Err(Error::import(
                range,
                format!("file {} is imported more than once", path.display()),
            ));
        }
        Ok(())
    }
}

/// Build a glob pattern for `source` relative to `base`. Only `source` is
/// glob syntax; `base` and the directories `..` climbs back into are
/// matched literally.
fn glob_pattern(base: &Path, source: &str) -> String {
    let mut prefix = base.to_path_buf();
    let mut rest: Vec<&str> = Vec::new();
    for part in source.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if rest.pop().is_none() {
                    prefix.pop();
                }
            }
            _ => rest.push(part),
        }
    }
    let prefix = Pattern::escape(&prefix.to_string_lossy());
    let prefix = prefix.trim_end_matches('/');
    format!("{}/{}", prefix, rest.join("/"))
}

/// Schema checks on one import block. Returns the `source` string and
/// the range of its expression when the block is well formed.
fn import_source(block: &Block, errors: &mut ErrorList) -> Option<(String, Range)> {
    let mut ok = true;
    if let Some(labels) = block.labels_range() {
        errors.push(Error::schema(&labels, "import block must not have labels"));
        ok = false;
    }
    for name in block.attributes.keys().filter(|n| *n != "source") {
        let attr = &block.attributes[name];
        errors.push(Error::schema(
            &attr.name_range,
            format!("unrecognized attribute {:?} in import block", name),
        ));
        ok = false;
    }
    for sub in &block.blocks {
        errors.push(Error::schema(
            &sub.def_range(),
            format!("unrecognized block {:?} in import block", sub.block_type),
        ));
        ok = false;
    }

    let Some(attr) = block.attributes.get("source") else {
        errors.push(Error::schema(
            &block.def_range(),
            "import block must have a \"source\" attribute",
        ));
        return None;
    };
    let source = match eval::evaluate(&attr.expr) {
        Ok(Value::String(s)) => s,
        Ok(other) => {
            errors.push(Error::schema(
                &attr.expr.range,
                format!("import source must be a string, got {}", other.type_name()),
            ));
            return None;
        }
        Err(e) => {
            errors.push(Error::schema(e.range(), format!("import source: {}", e)));
            return None;
        }
    };
    ok.then(|| (source, attr.expr.range.clone()))
}
