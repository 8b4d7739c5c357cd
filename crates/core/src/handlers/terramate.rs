//! The root `terramate` block, merged across every file of the scope.

use super::{
    assign, check_merged_children, check_merged_no_labels, eval_bool, eval_string,
    eval_string_list, unrecognized_attribute,
};
use crate::config::{GitConfig, RootConfig, RunConfig, TerramateConfig};
use crate::error::{Error, ErrorList};
use crate::merge::{MergePolicy, MergedBlock};
use crate::registry::{BlockParser, BlockRef, ParseContext};
use std::collections::HashSet;

pub struct TerramateParser;

impl BlockParser for TerramateParser {
    fn name(&self) -> &'static str {
        "terramate"
    }

    fn policy(&self) -> MergePolicy {
        MergePolicy::MergeByLabel
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: BlockRef<'_>) -> Result<(), ErrorList> {
        let BlockRef::Merged(tm) = block else {
            return Ok(());
        };
        let mut errors = ErrorList::new();
        check_merged_no_labels(tm, &mut errors);
        let parsed = parse_terramate(tm, &mut errors);
        errors.into_result()?;
        ctx.config.terramate = Some(parsed);
        Ok(())
    }
}

fn parse_terramate(tm: &MergedBlock, errors: &mut ErrorList) -> TerramateConfig {
    let mut cfg = TerramateConfig::default();
    for attr in tm.attributes.values() {
        match attr.name.as_str() {
            "required_version" => {
                assign(errors, &mut cfg.required_version, eval_string(attr).map(Some))
            }
            "required_version_allow_prereleases" => assign(
                errors,
                &mut cfg.required_version_allow_prereleases,
                eval_bool(attr),
            ),
            _ => errors.push(unrecognized_attribute("terramate", attr)),
        }
    }

    check_merged_children(tm, &["config"], errors);
    for config in tm.children_of("config") {
        check_merged_no_labels(config, errors);
        cfg.config = Some(parse_root_config(config, errors));
    }
    cfg
}

fn parse_root_config(config: &MergedBlock, errors: &mut ErrorList) -> RootConfig {
    let mut root = RootConfig::default();
    for attr in config.attributes.values() {
        match attr.name.as_str() {
            "experiments" => match eval_string_list(attr) {
                Ok(list) => {
                    let mut seen = HashSet::new();
                    for name in &list {
                        if !seen.insert(name) {
                            errors.push(Error::schema(
                                &attr.expr.range,
                                format!("duplicated experiment {:?}", name),
                            ));
                        }
                    }
                    root.experiments = list;
                }
                Err(e) => errors.push(e),
            },
            _ => errors.push(unrecognized_attribute("terramate.config", attr)),
        }
    }

    check_merged_children(config, &["git", "run"], errors);
    for git in config.children_of("git") {
        check_merged_no_labels(git, errors);
        root.git = Some(parse_git(git, errors));
    }
    for run in config.children_of("run") {
        check_merged_no_labels(run, errors);
        root.run = Some(parse_run(run, errors));
    }
    root
}

fn parse_git(git: &MergedBlock, errors: &mut ErrorList) -> GitConfig {
    let mut cfg = GitConfig::default();
    for attr in git.attributes.values() {
        match attr.name.as_str() {
            "default_branch" => assign(errors, &mut cfg.default_branch, eval_string(attr).map(Some)),
            "default_remote" => assign(errors, &mut cfg.default_remote, eval_string(attr).map(Some)),
            "check_untracked" => assign(errors, &mut cfg.check_untracked, eval_bool(attr).map(Some)),
            "check_uncommitted" => {
                assign(errors, &mut cfg.check_uncommitted, eval_bool(attr).map(Some))
            }
            "check_remote" => assign(errors, &mut cfg.check_remote, eval_bool(attr).map(Some)),
            _ => errors.push(unrecognized_attribute("terramate.config.git", attr)),
        }
    }
    check_merged_children(git, &[], errors);
    cfg
}

fn parse_run(run: &MergedBlock, errors: &mut ErrorList) -> RunConfig {
    let mut cfg = RunConfig::default();
    for attr in run.attributes.values() {
        match attr.name.as_str() {
            "check_gen_code" => assign(errors, &mut cfg.check_gen_code, eval_bool(attr).map(Some)),
            _ => errors.push(unrecognized_attribute("terramate.config.run", attr)),
        }
    }
    check_merged_children(run, &["env"], errors);
    for env in run.children_of("env") {
        check_merged_no_labels(env, errors);
        check_merged_children(env, &[], errors);
        cfg.env = env
            .attributes
            .values()
            .map(|a| (a.name.clone(), a.expr.clone()))
            .collect();
    }
    cfg
}
