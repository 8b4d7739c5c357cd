//! Outputs sharing: `sharing_backend`, `input` and `output` blocks.

use super::{
    check_unique, eval_string, eval_string_list, missing_attribute, single_label,
    unrecognized_attribute, unrecognized_block,
};
use crate::ast::{Block, Expr};
use crate::config::{Input, Output, SharingBackend, SharingBackendType};
use crate::error::{Error, ErrorList};
use crate::merge::MergePolicy;
use crate::options::EXPERIMENT_OUTPUTS_SHARING;
use crate::registry::{BlockParser, BlockRef, ParseContext};

/// Shared preamble: the experiment gate, the single label, and no
/// sub-blocks. Only a disabled experiment stops parsing early.
fn begin(ctx: &ParseContext<'_>, block: &Block, errors: &mut ErrorList) -> Result<Option<String>, Error> {
    ctx.require_experiment(EXPERIMENT_OUTPUTS_SHARING, &block.block_type, &block.def_range())?;
    for sub in &block.blocks {
        errors.push(unrecognized_block(&block.block_type, sub));
    }
    match single_label(block) {
        Ok(name) => Ok(Some(name)),
        Err(e) => {
            errors.push(e);
            Ok(None)
        }
    }
}

fn required(block: &Block, name: &str, value: Option<Expr>, errors: &mut ErrorList) -> Option<Expr> {
    if value.is_none() {
        errors.push(missing_attribute(&block.block_type, name, &block.range));
    }
    value
}

// ──────────────────────────────────────────────
// sharing_backend
// ──────────────────────────────────────────────

pub struct SharingBackendParser;

impl BlockParser for SharingBackendParser {
    fn name(&self) -> &'static str {
        "sharing_backend"
    }

    fn policy(&self) -> MergePolicy {
        MergePolicy::Append
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: BlockRef<'_>) -> Result<(), ErrorList> {
        let BlockRef::Raw(block) = block else {
            return Ok(());
        };
        let mut errors = ErrorList::new();
        let name = begin(ctx, block, &mut errors)?;

        let mut backend_type = None;
        let mut filename = None;
        let mut command = None;
        for attr in block.attributes.values() {
            match attr.name.as_str() {
                "type" => match attr.expr.as_keyword() {
                    Some("terraform") => backend_type = Some(SharingBackendType::Terraform),
                    _ => errors.push(Error::schema(
                        &attr.expr.range,
                        format!("unrecognized sharing backend type: {}", attr.expr.text()),
                    )),
                },
                "filename" => match eval_string(attr) {
                    Ok(f) if f.is_empty() => errors.push(Error::schema(
                        &attr.expr.range,
                        "empty \"sharing_backend.filename\"",
                    )),
                    Ok(f) => filename = Some(f),
                    Err(e) => errors.push(e),
                },
                "command" => match eval_string_list(attr) {
                    Ok(c) => command = Some(c),
                    Err(e) => errors.push(e),
                },
                _ => errors.push(unrecognized_attribute("sharing_backend", attr)),
            }
        }
        for (attr, missing) in [
            ("type", !block.attributes.contains_key("type")),
            ("filename", !block.attributes.contains_key("filename")),
            ("command", !block.attributes.contains_key("command")),
        ] {
            if missing {
                errors.push(missing_attribute("sharing_backend", attr, &block.range));
            }
        }

        errors.into_result()?;
        if let (Some(name), Some(backend_type), Some(filename), Some(command)) =
            (name, backend_type, filename, command)
        {
            ctx.config.sharing_backends.push(SharingBackend {
                name,
                backend_type,
                filename,
                command,
                range: block.range.clone(),
            });
        }
        Ok(())
    }

    fn validate(&self, ctx: &ParseContext<'_>) -> Result<(), ErrorList> {
        check_unique(
            "sharing_backend",
            ctx.config
                .sharing_backends
                .iter()
                .map(|b| (b.name.as_str(), &b.range)),
        )
    }
}

// ──────────────────────────────────────────────
// input
// ──────────────────────────────────────────────

pub struct InputParser;

impl BlockParser for InputParser {
    fn name(&self) -> &'static str {
        "input"
    }

    fn policy(&self) -> MergePolicy {
        MergePolicy::Append
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: BlockRef<'_>) -> Result<(), ErrorList> {
        let BlockRef::Raw(block) = block else {
            return Ok(());
        };
        let mut errors = ErrorList::new();
        let name = begin(ctx, block, &mut errors)?;

        let (mut backend, mut value, mut from_stack_id, mut sensitive, mut mock) =
            (None, None, None, None, None);
        for attr in block.attributes.values() {
            let expr = Some(attr.expr.clone());
            match attr.name.as_str() {
                "backend" => backend = expr,
                "value" => value = expr,
                "from_stack_id" => from_stack_id = expr,
                "sensitive" => sensitive = expr,
                "mock" => mock = expr,
                _ => errors.push(unrecognized_attribute("input", attr)),
            }
        }
        let backend = required(block, "backend", backend, &mut errors);
        let value = required(block, "value", value, &mut errors);
        let from_stack_id = required(block, "from_stack_id", from_stack_id, &mut errors);

        errors.into_result()?;
        if let (Some(name), Some(backend), Some(value), Some(from_stack_id)) =
            (name, backend, value, from_stack_id)
        {
            ctx.config.inputs.push(Input {
                name,
                backend,
                value,
                from_stack_id,
                sensitive,
                mock,
                range: block.range.clone(),
            });
        }
        Ok(())
    }

    fn validate(&self, ctx: &ParseContext<'_>) -> Result<(), ErrorList> {
        check_unique(
            "input",
            ctx.config.inputs.iter().map(|i| (i.name.as_str(), &i.range)),
        )
    }
}

// ──────────────────────────────────────────────
// output
// ──────────────────────────────────────────────

pub struct OutputParser;

impl BlockParser for OutputParser {
    fn name(&self) -> &'static str {
        "output"
    }

    fn policy(&self) -> MergePolicy {
        MergePolicy::Append
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: BlockRef<'_>) -> Result<(), ErrorList> {
        let BlockRef::Raw(block) = block else {
            return Ok(());
        };
        let mut errors = ErrorList::new();
        let name = begin(ctx, block, &mut errors)?;

        let (mut backend, mut value, mut description, mut sensitive) = (None, None, None, None);
        for attr in block.attributes.values() {
            let expr = Some(attr.expr.clone());
            match attr.name.as_str() {
                "backend" => backend = expr,
                "value" => value = expr,
                "description" => description = expr,
                "sensitive" => sensitive = expr,
                _ => errors.push(unrecognized_attribute("output", attr)),
            }
        }
        let backend = required(block, "backend", backend, &mut errors);
        let value = required(block, "value", value, &mut errors);

        errors.into_result()?;
        if let (Some(name), Some(backend), Some(value)) = (name, backend, value) {
            ctx.config.outputs.push(Output {
                name,
                backend,
                value,
                description,
                sensitive,
                range: block.range.clone(),
            });
        }
        Ok(())
    }

    fn validate(&self, ctx: &ParseContext<'_>) -> Result<(), ErrorList> {
        check_unique(
            "output",
            ctx.config.outputs.iter().map(|o| (o.name.as_str(), &o.range)),
        )
    }
}
