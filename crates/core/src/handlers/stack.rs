//! The `stack` block: at most one per directory, never imported.

use super::{
    assign, check_no_labels, eval_string, eval_string_set, unrecognized_attribute,
    unrecognized_block,
};
use crate::config::StackConfig;
use crate::error::ErrorList;
use crate::merge::MergePolicy;
use crate::registry::{BlockParser, BlockRef, ParseContext};

pub struct StackParser;

impl BlockParser for StackParser {
    fn name(&self) -> &'static str {
        "stack"
    }

    fn policy(&self) -> MergePolicy {
        MergePolicy::UniqueByLabel
    }

    fn import_allowed(&self) -> bool {
        false
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: BlockRef<'_>) -> Result<(), ErrorList> {
        let BlockRef::Raw(block) = block else {
            return Ok(());
        };
        let mut errors = ErrorList::new();
        check_no_labels(block, &mut errors);

        let mut stack = StackConfig {
            id: None,
            name: None,
            description: None,
            tags: Default::default(),
            after: Default::default(),
            before: Default::default(),
            wants: Default::default(),
            wanted_by: Default::default(),
            watch: Default::default(),
            range: block.range.clone(),
        };
        for attr in block.attributes.values() {
            let e = &mut errors;
            match attr.name.as_str() {
                "id" => assign(e, &mut stack.id, eval_string(attr).map(Some)),
                "name" => assign(e, &mut stack.name, eval_string(attr).map(Some)),
                "description" => assign(e, &mut stack.description, eval_string(attr).map(Some)),
                "tags" => assign(e, &mut stack.tags, eval_string_set(attr)),
                "after" => assign(e, &mut stack.after, eval_string_set(attr)),
                "before" => assign(e, &mut stack.before, eval_string_set(attr)),
                "wants" => assign(e, &mut stack.wants, eval_string_set(attr)),
                "wanted_by" => assign(e, &mut stack.wanted_by, eval_string_set(attr)),
                "watch" => assign(e, &mut stack.watch, eval_string_set(attr)),
                _ => e.push(unrecognized_attribute("stack", attr)),
            }
        }
        for sub in &block.blocks {
            errors.push(unrecognized_block("stack", sub));
        }

        errors.into_result()?;
        ctx.config.stack = Some(stack);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParsedConfig;
    use crate::options::ParseOptions;
    use crate::parser::parse_source;
    use std::path::Path;
    use std::sync::Arc;

    fn run(src: &str) -> Result<ParsedConfig, ErrorList> {
        let file = parse_source(src, Path::new("/s/stack.tm")).unwrap();
        let opts = ParseOptions::default();
        let mut ctx = ParseContext::new(&opts, ParsedConfig::new("/s"));
        let block: &Arc<_> = &file.body.blocks[0];
        StackParser.parse(&mut ctx, BlockRef::Raw(block))?;
        Ok(ctx.config)
    }

    #[test]
    fn parses_metadata_and_ordering_sets() {
        let cfg = run(
            "stack {\n  name = \"app\"\n  tags = [\"b\", \"a\"]\n  after = [\"/net\"]\n}\n",
        )
        .unwrap();
        let stack = cfg.stack.unwrap();
        assert_eq!(stack.name.as_deref(), Some("app"));
        assert_eq!(stack.tags.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(stack.after.contains("/net"));
    }

    #[test]
    fn rejects_labels_duplicates_and_unknowns() {
        let errs = run(
            "stack \"x\" {\n  tags = [\"a\", \"a\"]\n  owner = \"me\"\n  sub {\n  }\n}\n",
        )
        .unwrap_err();
        assert_eq!(errs.len(), 4);
    }
}
