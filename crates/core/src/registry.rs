//! Pluggable block handlers and the ordered registry that holds them.

use crate::ast::{Block, Range};
use crate::config::ParsedConfig;
use crate::error::{Error, ErrorList};
use crate::handlers;
use crate::import::IMPORT_BLOCK;
use crate::merge::{MergePolicy, MergedBlock, RawConfig};
use crate::options::ParseOptions;
use std::collections::HashSet;
use std::sync::Arc;

/// What a handler receives, depending on its merge policy.
#[derive(Debug, Clone, Copy)]
pub enum BlockRef<'a> {
    /// One physical occurrence (`Append`, `UniqueByLabel`, `Override`).
    Raw(&'a Arc<Block>),
    /// A fully merged entity (`MergeByLabel`).
    Merged(&'a MergedBlock),
}

/// Mutable state a session threads through its handlers.
pub struct ParseContext<'a> {
    pub options: &'a ParseOptions,
    pub config: ParsedConfig,
}

impl<'a> ParseContext<'a> {
    pub fn new(options: &'a ParseOptions, config: ParsedConfig) -> Self {
        ParseContext { options, config }
    }

    /// Whether an experiment is enabled through the options or the
    /// scope's own `terramate.config.experiments`.
    pub fn has_experiment(&self, name: &str) -> bool {
        self.options.experiments.contains(name)
            || self.config.declared_experiments().any(|e| e == name)
    }

    /// Reject a gated block when its experiment is disabled.
    pub fn require_experiment(
        &self,
        experiment: &str,
        block_type: &str,
        range: &Range,
    ) -> Result<(), Error> {
        if self.has_experiment(experiment) {
            return Ok(());
        }
        Err(Error::schema(
            range,
            format!(
                "unrecognized block {:?} ({} is an experimental feature, it must be enabled before usage with terramate.config.experiments = [{:?}])",
                block_type, block_type, experiment
            ),
        ))
    }
}

/// Capability contract of one block type.
pub trait BlockParser: Send + Sync {
    /// The block type tag this handler owns.
    fn name(&self) -> &'static str;

    fn policy(&self) -> MergePolicy;

    /// Whether blocks of this type may come from imported files.
    fn import_allowed(&self) -> bool {
        true
    }

    /// Validate one block (or merged entity) and record it in the config.
    fn parse(&self, ctx: &mut ParseContext<'_>, block: BlockRef<'_>) -> Result<(), ErrorList>;

    /// Scope-wide checks, run once after every block was dispatched.
    fn validate(&self, _ctx: &ParseContext<'_>) -> Result<(), ErrorList> {
        Ok(())
    }
}

/// Immutable, ordered table of block handlers.
///
/// Built once and shared by reference across sessions. Dispatch follows
/// registration order.
pub struct Registry {
    parsers: Vec<Box<dyn BlockParser>>,
}

impl Registry {
    /// # Panics
    ///
    /// Panics if two handlers share a name, or a handler claims the
    /// reserved `import` block type.
    pub fn new(parsers: Vec<Box<dyn BlockParser>>) -> Self {
        let mut names = HashSet::new();
        for p in &parsers {
            assert!(
                p.name() != IMPORT_BLOCK,
                "block type {:?} is reserved",
                IMPORT_BLOCK
            );
            assert!(
                names.insert(p.name()),
                "duplicate block parser {:?}",
                p.name()
            );
        }
        Registry { parsers }
    }

    /// The built-in handlers. `terramate` comes first so the experiments it
    /// declares are known to every gated handler.
    pub fn builtin() -> Self {
        Registry::new(vec![
            Box::new(handlers::terramate::TerramateParser),
            Box::new(handlers::globals::GlobalsParser),
            Box::new(handlers::stack::StackParser),
            Box::new(handlers::script::ScriptParser),
            Box::new(handlers::sharing::SharingBackendParser),
            Box::new(handlers::sharing::InputParser),
            Box::new(handlers::sharing::OutputParser),
            Box::new(handlers::assert::AssertParser),
            Box::new(handlers::generate::GenerateHclParser),
            Box::new(handlers::generate::GenerateFileParser),
        ])
    }

    pub fn parsers(&self) -> impl Iterator<Item = &dyn BlockParser> {
        self.parsers.iter().map(|p| p.as_ref())
    }

    pub fn get(&self, name: &str) -> Option<&dyn BlockParser> {
        self.parsers().find(|p| p.name() == name)
    }

    /// A fresh merge table carrying every handler's policy.
    pub fn raw_config(&self) -> RawConfig {
        RawConfig::new(self.parsers().map(|p| (p.name(), p.policy())))
    }

    /// Block types that may not appear in imported files.
    pub fn refused_imports(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.parsers()
            .filter(|p| !p.import_allowed())
            .map(|p| p.name())
    }

    /// Route every merged or raw block of `raw` to its handler, in
    /// registry order.
    pub fn dispatch(&self, ctx: &mut ParseContext<'_>, raw: &RawConfig) -> Result<(), ErrorList> {
        let mut errors = ErrorList::new();
        for parser in self.parsers() {
            let name = parser.name();
            if parser.policy() == MergePolicy::MergeByLabel {
                for merged in raw.merged_of(name) {
                    tracing::trace!(block = %merged.identity(), "dispatch merged");
                    errors.append(parser.parse(ctx, BlockRef::Merged(merged)));
                }
            } else {
                for block in raw.unmerged_of(name) {
                    tracing::trace!(block = %block.identity(), "dispatch raw");
                    errors.append(parser.parse(ctx, BlockRef::Raw(block)));
                }
            }
        }
        errors.into_result()
    }

    /// Run every handler's scope-wide validation.
    pub fn validate(&self, ctx: &ParseContext<'_>) -> Result<(), ErrorList> {
        let mut errors = ErrorList::new();
        for parser in self.parsers() {
            errors.append(parser.validate(ctx));
        }
        errors.into_result()
    }
}
