//! The validated, merged configuration of one directory scope.
//!
//! A [`ParsedConfig`] is built incrementally by the block handlers during a
//! parse session and is immutable once the session returns it.

use crate::ast::{Attributes, Block, Expr, Range};
use crate::merge::MergedBlock;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedConfig {
    /// The scope directory.
    pub dir: PathBuf,
    /// Top-level attributes of the scope.
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terramate: Option<TerramateConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<StackConfig>,
    pub globals: Vec<MergedBlock>,
    pub scripts: Vec<Script>,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub sharing_backends: Vec<SharingBackend>,
    pub asserts: Vec<AssertConfig>,
    pub generate_hcls: Vec<GenerateHcl>,
    pub generate_files: Vec<GenerateFile>,
}

impl ParsedConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ParsedConfig {
            dir: dir.into(),
            ..ParsedConfig::default()
        }
    }

    /// Experiments declared in `terramate.config.experiments`.
    pub fn declared_experiments(&self) -> impl Iterator<Item = &str> {
        self.terramate
            .iter()
            .filter_map(|t| t.config.as_ref())
            .flat_map(|c| c.experiments.iter().map(String::as_str))
    }

    /// The merged `globals` entity with exactly these labels.
    pub fn globals_with(&self, labels: &[&str]) -> Option<&MergedBlock> {
        self.globals.iter().find(|g| g.labels == labels)
    }

    pub fn script(&self, labels: &[&str]) -> Option<&Script> {
        self.scripts.iter().find(|s| s.labels == labels)
    }
}

// ──────────────────────────────────────────────
// terramate
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TerramateConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_version: Option<String>,
    pub required_version_allow_prereleases: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<RootConfig>,
}

/// `terramate.config`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RootConfig {
    pub experiments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GitConfig {
    pub default_branch: Option<String>,
    pub default_remote: Option<String>,
    pub check_untracked: Option<bool>,
    pub check_uncommitted: Option<bool>,
    pub check_remote: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunConfig {
    pub check_gen_code: Option<bool>,
    /// `terramate.config.run.env`, kept unevaluated.
    pub env: IndexMap<String, Expr>,
}

// ──────────────────────────────────────────────
// stack
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackConfig {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    pub after: BTreeSet<String>,
    pub before: BTreeSet<String>,
    pub wants: BTreeSet<String>,
    pub wanted_by: BTreeSet<String>,
    pub watch: BTreeSet<String>,
    pub range: Range,
}

// ──────────────────────────────────────────────
// script
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Script {
    pub labels: Vec<String>,
    pub name: Option<Expr>,
    pub description: Option<Expr>,
    pub jobs: Vec<ScriptJob>,
    /// The merged `lets` block, when the script declares one.
    pub lets: Option<MergedBlock>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptJob {
    pub name: Option<Expr>,
    pub description: Option<Expr>,
    #[serde(flatten)]
    pub command: JobCommand,
    pub range: Range,
}

/// A job runs either one command or a list of commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCommand {
    Command(Expr),
    Commands(Expr),
}

// ──────────────────────────────────────────────
// outputs sharing
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Input {
    pub name: String,
    pub backend: Expr,
    pub value: Expr,
    pub from_stack_id: Expr,
    pub sensitive: Option<Expr>,
    pub mock: Option<Expr>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub name: String,
    pub backend: Expr,
    pub value: Expr,
    pub description: Option<Expr>,
    pub sensitive: Option<Expr>,
    pub range: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingBackendType {
    Terraform,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharingBackend {
    pub name: String,
    #[serde(rename = "type")]
    pub backend_type: SharingBackendType,
    pub filename: String,
    pub command: Vec<String>,
    pub range: Range,
}

// ──────────────────────────────────────────────
// assert
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertConfig {
    pub assertion: Expr,
    pub message: Expr,
    pub warning: Option<Expr>,
    pub range: Range,
}

// ──────────────────────────────────────────────
// generate_hcl / generate_file
// ──────────────────────────────────────────────

/// A `generate_hcl` block. `content` is kept as written; it is rendered
/// per stack by code generation, not here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateHcl {
    pub label: String,
    pub condition: Option<Expr>,
    pub lets: Option<MergedBlock>,
    pub content: Arc<Block>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateFile {
    pub label: String,
    pub condition: Option<Expr>,
    pub content: Expr,
    pub range: Range,
}
