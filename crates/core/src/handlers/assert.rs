//! `assert` blocks. Expressions stay unevaluated.

use super::{check_no_labels, missing_attribute, unrecognized_attribute, unrecognized_block};
use crate::config::AssertConfig;
use crate::error::ErrorList;
use crate::merge::MergePolicy;
use crate::registry::{BlockParser, BlockRef, ParseContext};

pub struct AssertParser;

impl BlockParser for AssertParser {
    fn name(&self) -> &'static str {
        "assert"
    }

    fn policy(&self) -> MergePolicy {
        MergePolicy::Append
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: BlockRef<'_>) -> Result<(), ErrorList> {
        let BlockRef::Raw(block) = block else {
            return Ok(());
        };
        let mut errors = ErrorList::new();
        check_no_labels(block, &mut errors);

        let (mut assertion, mut message, mut warning) = (None, None, None);
        for attr in block.attributes.values() {
            let expr = Some(attr.expr.clone());
            match attr.name.as_str() {
                "assertion" => assertion = expr,
                "message" => message = expr,
                "warning" => warning = expr,
                _ => errors.push(unrecognized_attribute("assert", attr)),
            }
        }
        for sub in &block.blocks {
            errors.push(unrecognized_block("assert", sub));
        }
        if assertion.is_none() {
            errors.push(missing_attribute("assert", "assertion", &block.range));
        }
        if message.is_none() {
            errors.push(missing_attribute("assert", "message", &block.range));
        }

        errors.into_result()?;
        if let (Some(assertion), Some(message)) = (assertion, message) {
            ctx.config.asserts.push(AssertConfig {
                assertion,
                message,
                warning,
                range: block.range.clone(),
            });
        }
        Ok(())
    }
}
