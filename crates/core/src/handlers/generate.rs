//! `generate_hcl` and `generate_file` blocks.
//!
//! Both are appended per occurrence and share one label namespace: the
//! label names the generated file.

use super::globals::validate_map_children;
use super::{
    check_merged_no_labels, check_no_labels, check_unique, missing_attribute, single_label,
    unrecognized_attribute, unrecognized_block,
};
use crate::ast::{Block, Expr};
use crate::config::{GenerateFile, GenerateHcl};
use crate::error::{Error, ErrorList};
use crate::merge::{MergePolicy, RawConfig};
use crate::registry::{BlockParser, BlockRef, ParseContext};
use std::sync::Arc;

/// The block's label, which must be present and non-empty.
fn label(block: &Block, errors: &mut ErrorList) -> Option<String> {
    match single_label(block) {
        Ok(label) if label.is_empty() => {
            errors.push(Error::schema(
                &block.labels_range().unwrap_or_else(|| block.def_range()),
                format!("{} label can't be empty", block.block_type),
            ));
            None
        }
        Ok(label) => Some(label),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

// ──────────────────────────────────────────────
// generate_hcl
// ──────────────────────────────────────────────

pub struct GenerateHclParser;

impl BlockParser for GenerateHclParser {
    fn name(&self) -> &'static str {
        "generate_hcl"
    }

    fn policy(&self) -> MergePolicy {
        MergePolicy::Append
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: BlockRef<'_>) -> Result<(), ErrorList> {
        let BlockRef::Raw(block) = block else {
            return Ok(());
        };
        let mut errors = ErrorList::new();
        let label = label(block, &mut errors);

        let mut condition = None;
        for attr in block.attributes.values() {
            match attr.name.as_str() {
                "condition" => condition = Some(attr.expr.clone()),
                _ => errors.push(unrecognized_attribute("generate_hcl", attr)),
            }
        }

        let mut contents: Vec<&Arc<Block>> = Vec::new();
        let mut lets = RawConfig::new([("lets", MergePolicy::MergeByLabel)]);
        for child in &block.blocks {
            match child.block_type.as_str() {
                "content" => {
                    check_no_labels(child, &mut errors);
                    contents.push(child);
                }
                "lets" => errors.append(lets.merge_block(child)),
                _ => errors.push(unrecognized_block("generate_hcl", child)),
            }
        }
        if contents.len() != 1 {
            errors.push(Error::schema(
                &block.open_brace_range,
                format!(
                    "generate_hcl must have one \"content\" block, got {}",
                    contents.len()
                ),
            ));
        }

        let mut merged_lets = None;
        for merged in lets.merged.values() {
            check_merged_no_labels(merged, &mut errors);
            validate_map_children(merged, &mut errors);
            merged_lets = Some(merged.clone());
        }

        errors.into_result()?;
        if let (Some(label), [content]) = (label, contents.as_slice()) {
            ctx.config.generate_hcls.push(GenerateHcl {
                label,
                condition,
                lets: merged_lets,
                content: Arc::clone(content),
                range: block.range.clone(),
            });
        }
        Ok(())
    }

    /// Labels name output files, so they must be unique across both
    /// generate block types.
    fn validate(&self, ctx: &ParseContext<'_>) -> Result<(), ErrorList> {
        let hcls = ctx
            .config
            .generate_hcls
            .iter()
            .map(|g| (g.label.as_str(), &g.range));
        let files = ctx
            .config
            .generate_files
            .iter()
            .map(|g| (g.label.as_str(), &g.range));
        check_unique("generate label", hcls.chain(files))
    }
}

// ──────────────────────────────────────────────
// generate_file
// ──────────────────────────────────────────────

pub struct GenerateFileParser;

impl BlockParser for GenerateFileParser {
    fn name(&self) -> &'static str {
        "generate_file"
    }

    fn policy(&self) -> MergePolicy {
        MergePolicy::Append
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: BlockRef<'_>) -> Result<(), ErrorList> {
        let BlockRef::Raw(block) = block else {
            return Ok(());
        };
        let mut errors = ErrorList::new();
        let label = label(block, &mut errors);

        let mut content: Option<Expr> = None;
        let mut condition = None;
        for attr in block.attributes.values() {
            match attr.name.as_str() {
                "content" => content = Some(attr.expr.clone()),
                "condition" => condition = Some(attr.expr.clone()),
                _ => errors.push(unrecognized_attribute("generate_file", attr)),
            }
        }
        for sub in &block.blocks {
            errors.push(unrecognized_block("generate_file", sub));
        }
        if content.is_none() {
            errors.push(missing_attribute("generate_file", "content", &block.range));
        }

        errors.into_result()?;
        if let (Some(label), Some(content)) = (label, content) {
            ctx.config.generate_files.push(GenerateFile {
                label,
                condition,
                content,
                range: block.range.clone(),
            });
        }
        Ok(())
    }
}
