//! `script` blocks, their `job`s and their `lets`.

use super::globals::validate_map_children;
use super::{check_merged_no_labels, check_no_labels, unrecognized_attribute, unrecognized_block};
use crate::ast::{Block, Expr, Range};
use crate::config::{JobCommand, Script, ScriptJob};
use crate::error::{Error, ErrorList};
use crate::merge::{MergePolicy, RawConfig};
use crate::options::EXPERIMENT_SCRIPTS;
use crate::registry::{BlockParser, BlockRef, ParseContext};

pub struct ScriptParser;

impl BlockParser for ScriptParser {
    fn name(&self) -> &'static str {
        "script"
    }

    fn policy(&self) -> MergePolicy {
        MergePolicy::UniqueByLabel
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: BlockRef<'_>) -> Result<(), ErrorList> {
        let BlockRef::Raw(block) = block else {
            return Ok(());
        };
        ctx.require_experiment(EXPERIMENT_SCRIPTS, "script", &block.def_range())?;
        let script = parse_script(block)?;
        ctx.config.scripts.push(script);
        Ok(())
    }
}

fn parse_script(block: &Block) -> Result<Script, ErrorList> {
    let mut errors = ErrorList::new();
    if block.labels.is_empty() {
        errors.push(Error::schema(
            &block.type_range,
            "script block must have at least one label",
        ));
    }

    let mut name = None;
    let mut description = None;
    for attr in block.attributes.values() {
        match attr.name.as_str() {
            "name" => name = Some(attr.expr.clone()),
            "description" => description = Some(attr.expr.clone()),
            _ => errors.push(unrecognized_attribute("script", attr)),
        }
    }

    let mut jobs = Vec::new();
    let mut lets = RawConfig::new([("lets", MergePolicy::MergeByLabel)]);
    for child in &block.blocks {
        match child.block_type.as_str() {
            "job" => match parse_job(child) {
                Ok(job) => jobs.push(job),
                Err(errs) => errors.extend(errs),
            },
            "lets" => errors.append(lets.merge_block(child)),
            _ => errors.push(unrecognized_block("script", child)),
        }
    }
    if jobs.is_empty() && !block.blocks.iter().any(|b| b.block_type == "job") {
        errors.push(Error::schema(
            &block.open_brace_range,
            "script block must have at least one job",
        ));
    }

    let mut merged_lets = None;
    for merged in lets.merged.values() {
        check_merged_no_labels(merged, &mut errors);
        validate_map_children(merged, &mut errors);
        merged_lets = Some(merged.clone());
    }

    errors.into_result()?;
    Ok(Script {
        labels: block.labels.clone(),
        name,
        description,
        jobs,
        lets: merged_lets,
        range: block.range.clone(),
    })
}

fn parse_job(block: &Block) -> Result<ScriptJob, ErrorList> {
    let mut errors = ErrorList::new();
    check_no_labels(block, &mut errors);

    let mut name = None;
    let mut description = None;
    let mut command: Option<(&Expr, &Range)> = None;
    let mut commands: Option<(&Expr, &Range)> = None;
    for attr in block.attributes.values() {
        match attr.name.as_str() {
            "name" => name = Some(attr.expr.clone()),
            "description" => description = Some(attr.expr.clone()),
            "command" => command = Some((&attr.expr, &attr.name_range)),
            "commands" => commands = Some((&attr.expr, &attr.name_range)),
            _ => errors.push(unrecognized_attribute("script.job", attr)),
        }
    }
    for sub in &block.blocks {
        errors.push(unrecognized_block("job", sub));
    }

    let command = match (command, commands) {
        (Some((_, first)), Some((_, second))) => {
            for range in [first, second] {
                errors.push(Error::schema(
                    range,
                    "job must set either \"command\" or \"commands\", not both",
                ));
            }
            None
        }
        (Some((expr, _)), None) => Some(JobCommand::Command(expr.clone())),
        (None, Some((expr, _))) => Some(JobCommand::Commands(expr.clone())),
        (None, None) => {
            errors.push(Error::schema(
                &block.range,
                "job must set a \"command\" or \"commands\" attribute",
            ));
            None
        }
    };

    match command {
        Some(command) if errors.is_empty() => Ok(ScriptJob {
            name,
            description,
            command,
            range: block.range.clone(),
        }),
        _ => Err(errors),
    }
}
