#![allow(clippy::result_large_err)]
//! stackcfg-core: merge and import resolution for directory-scoped
//! configuration trees.
//!
//! Every directory of a project is a scope. A [`ParseSession`] reads the
//! scope's own `*.tm` files, expands their `import` blocks, merges
//! same-identity blocks across files and hands the result to the block
//! handlers of a [`Registry`], collecting every error on the way.
//!
//! # Public API
//!
//! - [`parse_dir()`] -- parse one directory from disk with the built-in handlers
//! - [`ParseSession`] -- the same, with a custom registry or [`SourceProvider`]
//! - [`ParsedConfig`] -- the merged, validated result
//! - [`Error`] / [`ErrorList`] -- diagnostics
//! - [`BlockParser`] -- the contract for additional block types

pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod handlers;
pub mod import;
pub mod lexer;
pub mod merge;
pub mod options;
pub mod parser;
pub mod registry;
pub mod session;
pub mod source;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{Block, LabelBlockType, Pos, Range};
pub use config::ParsedConfig;
pub use error::{Error, ErrorKind, ErrorList};
pub use merge::{MergePolicy, MergedBlock, RawConfig};
pub use options::{ParseOptions, EXPERIMENT_OUTPUTS_SHARING, EXPERIMENT_SCRIPTS};
pub use registry::{BlockParser, BlockRef, ParseContext, Registry};
pub use source::{FileSystemProvider, InMemoryProvider, SourceProvider};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use session::{parse_dir, ParseSession, Stage};
