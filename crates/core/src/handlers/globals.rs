//! `globals` blocks and the `map` blocks allowed inside them (and inside
//! script `lets`).

use super::{check_merged_children, unrecognized_attribute, unrecognized_block};
use crate::error::{Error, ErrorList};
use crate::merge::{MergePolicy, MergedBlock};
use crate::registry::{BlockParser, BlockRef, ParseContext};

pub struct GlobalsParser;

impl BlockParser for GlobalsParser {
    fn name(&self) -> &'static str {
        "globals"
    }

    fn policy(&self) -> MergePolicy {
        MergePolicy::MergeByLabel
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: BlockRef<'_>) -> Result<(), ErrorList> {
        let BlockRef::Merged(globals) = block else {
            return Ok(());
        };
        let mut errors = ErrorList::new();
        validate_map_children(globals, &mut errors);
        errors.into_result()?;
        ctx.config.globals.push(globals.clone());
        Ok(())
    }
}

/// Free-form attributes plus `map` sub-blocks only.
pub(crate) fn validate_map_children(parent: &MergedBlock, errors: &mut ErrorList) {
    check_merged_children(parent, &[MAP], errors);
    for map in parent.children_of(MAP) {
        validate_map(map, errors);
    }
}

const MAP: &str = "map";
const VALUE: &str = "value";

fn validate_map(map: &MergedBlock, errors: &mut ErrorList) {
    for origin in &map.origins {
        if origin.block().labels.len() != 1 {
            let block = origin.block();
            errors.push(Error::schema(
                &block.labels_range().unwrap_or_else(|| block.def_range()),
                "map block must have exactly one label",
            ));
        }
    }

    for attr in map.attributes.values() {
        match attr.name.as_str() {
            "for_each" | "key" | "value" => {}
            "iterator" => {
                if attr.expr.as_keyword().is_none() {
                    errors.push(Error::schema(
                        &attr.expr.range,
                        "map iterator must be a plain identifier",
                    ));
                }
            }
            _ => errors.push(unrecognized_attribute(MAP, attr)),
        }
    }

    let def_range = map.def_range();
    for required in ["for_each", "key"] {
        if !map.attributes.contains_key(required) {
            if let Some(range) = &def_range {
                errors.push(super::missing_attribute(MAP, required, range));
            }
        }
    }

    let mut value_blocks = 0;
    for child in map.raw_children() {
        if child.block_type != VALUE {
            errors.push(unrecognized_block(MAP, child));
            continue;
        }
        value_blocks += 1;
        if let Some(range) = child.labels_range() {
            errors.push(Error::schema(&range, "value block must not have labels"));
        }
    }
    if value_blocks > 1 {
        if let Some(range) = &def_range {
            errors.push(Error::schema(range, "map block must have at most one value block"));
        }
    }

    let has_value_attr = map.attributes.contains_key(VALUE);
    match (has_value_attr, value_blocks > 0, &def_range) {
        (true, true, Some(range)) => errors.push(Error::schema(
            range,
            "map block must set either a value attribute or a value block, not both",
        )),
        (false, false, Some(range)) => errors.push(Error::schema(
            range,
            "map block must set a value attribute or a value block",
        )),
        _ => {}
    }

    for value in map.children_of(VALUE) {
        validate_map_children(value, errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::RawConfig;
    use crate::parser::parse_source;
    use std::path::Path;

    fn merged(src: &str) -> MergedBlock {
        let file = parse_source(src, Path::new("/s/g.tm")).unwrap();
        let mut raw = RawConfig::new([("globals", MergePolicy::MergeByLabel)]);
        raw.merge_body(&file.body).unwrap();
        let block = raw.merged_of("globals").next().unwrap().clone();
        block
    }

    fn errors(src: &str) -> ErrorList {
        let mut errors = ErrorList::new();
        validate_map_children(&merged(src), &mut errors);
        errors
    }

    #[test]
    fn valid_maps_with_value_attribute_and_nested_value_block() {
        let errs = errors(
            r#"globals {
  a = 1
  map "m" {
    for_each = [1, 2]
    key      = element.new
    value    = element.new
  }
  map "n" {
    for_each = []
    key      = it.new
    iterator = it
    value {
      x = 1
      map "inner" {
        for_each = []
        key      = element.new
        value    = 1
      }
    }
  }
}
"#,
        );
        assert!(errs.is_empty(), "{}", errs);
    }

    #[test]
    fn missing_required_and_value_conflicts() {
        let errs = errors(
            r#"globals {
  map "m" {
    value = 1
    value {
    }
  }
  map "n" {
    for_each = []
    key      = 1
  }
}
"#,
        );
        let messages: Vec<_> = errs.iter().map(|e| e.message.as_str()).collect();
        assert!(messages.contains(&"attribute \"map.for_each\" is required"));
        assert!(messages.contains(&"attribute \"map.key\" is required"));
        assert!(messages.iter().any(|m| m.contains("not both")));
        assert!(messages.contains(&"map block must set a value attribute or a value block"));
    }

    #[test]
    fn only_map_blocks_inside_globals() {
        let errs = errors("globals {\n  other {\n  }\n  map {\n    for_each = []\n    key = 1\n    value = 1\n    iterator = \"x\"\n  }\n}\n");
        let messages: Vec<_> = errs.iter().map(|e| e.message.as_str()).collect();
        assert!(messages.contains(&"unrecognized block \"other\" inside \"globals\""));
        assert!(messages.contains(&"map block must have exactly one label"));
        assert!(messages.contains(&"map iterator must be a plain identifier"));
    }
}
