//! Built-in block handlers and the attribute helpers they share.

pub mod assert;
pub mod generate;
pub mod globals;
pub mod script;
pub mod sharing;
pub mod stack;
pub mod terramate;

use crate::ast::{Attribute, Block, Range};
use crate::error::{Error, ErrorList};
use crate::eval::{self, EvalError, Value};
use crate::merge::MergedBlock;
use std::collections::{BTreeSet, HashMap};

// ──────────────────────────────────────────────
// Attribute evaluation
// ──────────────────────────────────────────────

fn eval_error(attr: &Attribute, err: EvalError) -> Error {
    Error::schema(
        err.range(),
        format!("attribute {:?}: {}", attr.name, err),
    )
}

fn type_error(attr: &Attribute, expected: &str, got: &Value) -> Error {
    Error::schema(
        &attr.expr.range,
        format!(
            "attribute {:?} must be {} but {} given",
            attr.name,
            expected,
            got.type_name()
        ),
    )
}

pub(crate) fn eval_string(attr: &Attribute) -> Result<String, Error> {
    match eval::evaluate(&attr.expr).map_err(|e| eval_error(attr, e))? {
        Value::String(s) => Ok(s),
        other => Err(type_error(attr, "a string", &other)),
    }
}

pub(crate) fn eval_bool(attr: &Attribute) -> Result<bool, Error> {
    match eval::evaluate(&attr.expr).map_err(|e| eval_error(attr, e))? {
        Value::Bool(b) => Ok(b),
        other => Err(type_error(attr, "a bool", &other)),
    }
}

pub(crate) fn eval_string_list(attr: &Attribute) -> Result<Vec<String>, Error> {
    let value = eval::evaluate(&attr.expr).map_err(|e| eval_error(attr, e))?;
    let Value::List(items) = value else {
        return Err(type_error(attr, "a list of strings", &value));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(Error::schema(
                &attr.expr.range,
                format!(
                    "attribute {:?} must only contain strings but {} found",
                    attr.name,
                    other.type_name()
                ),
            )),
        })
        .collect()
}

/// A list of strings without duplicates.
pub(crate) fn eval_string_set(attr: &Attribute) -> Result<BTreeSet<String>, Error> {
    let mut set = BTreeSet::new();
    for item in eval_string_list(attr)? {
        if let Some(dup) = set.replace(item) {
            return Err(Error::schema(
                &attr.expr.range,
                format!("attribute {:?} has duplicated entry {:?}", attr.name, dup),
            ));
        }
    }
    Ok(set)
}

/// Store an evaluated attribute, or record why it could not be evaluated.
pub(crate) fn assign<T>(errors: &mut ErrorList, slot: &mut T, result: Result<T, Error>) {
    match result {
        Ok(v) => *slot = v,
        Err(e) => errors.push(e),
    }
}

// ──────────────────────────────────────────────
// Shared diagnostics
// ──────────────────────────────────────────────

pub(crate) fn unrecognized_attribute(block_type: &str, attr: &Attribute) -> Error {
    Error::schema(
        &attr.name_range,
        format!("unrecognized attribute \"{}.{}\"", block_type, attr.name),
    )
}

pub(crate) fn unrecognized_block(parent: &str, block: &Block) -> Error {
    Error::schema(
        &block.def_range(),
        format!("unrecognized block {:?} inside {:?}", block.block_type, parent),
    )
}

pub(crate) fn missing_attribute(block_type: &str, name: &str, range: &Range) -> Error {
    Error::schema(
        range,
        format!("attribute \"{}.{}\" is required", block_type, name),
    )
}

/// Reject labels on a block type that takes none.
pub(crate) fn check_no_labels(block: &Block, errors: &mut ErrorList) {
    if let Some(range) = block.labels_range() {
        errors.push(Error::schema(
            &range,
            format!("{} block must not have labels", block.block_type),
        ));
    }
}

pub(crate) fn check_merged_no_labels(merged: &MergedBlock, errors: &mut ErrorList) {
    for origin in &merged.origins {
        check_no_labels(origin.block(), errors);
    }
}

/// The block's single label, or an error at its labels.
pub(crate) fn single_label(block: &Block) -> Result<String, Error> {
    match block.labels.as_slice() {
        [label] => Ok(label.clone()),
        _ => Err(Error::schema(
            &block.labels_range().unwrap_or_else(|| block.def_range()),
            format!(
                "{} block must have exactly one label, {} given",
                block.block_type,
                block.labels.len()
            ),
        )),
    }
}

/// Report every child occurrence of `merged` whose type is not allowed.
pub(crate) fn check_merged_children(merged: &MergedBlock, allowed: &[&str], errors: &mut ErrorList) {
    for child in merged.raw_children() {
        if !allowed.contains(&child.block_type.as_str()) {
            errors.push(unrecognized_block(&merged.block_type, child));
        }
    }
}

/// Names declared twice within one scope.
pub(crate) fn check_unique<'a>(
    kind: &str,
    entries: impl Iterator<Item = (&'a str, &'a Range)>,
) -> Result<(), ErrorList> {
    let mut errors = ErrorList::new();
    let mut seen: HashMap<&str, &Range> = HashMap::new();
    for (name, range) in entries {
        if let Some(first) = seen.get(name) {
            errors.push(Error::redeclared(
                range,
                format!("{} {:?} redeclared (first declared at {})", kind, name, first),
            ));
            continue;
        }
        seen.insert(name, range);
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use std::path::Path;

    fn attr(src: &str) -> Attribute {
        let file = parse_source(src, Path::new("/p/t.tm")).unwrap();
        file.body.attributes["a"].clone()
    }

    #[test]
    fn typed_evaluation() {
        assert_eq!(eval_string(&attr("a = \"x\"")).unwrap(), "x");
        assert!(eval_bool(&attr("a = false")).is_ok());
        assert_eq!(
            eval_string_list(&attr("a = [\"x\", \"y\"]")).unwrap(),
            vec!["x", "y"]
        );
    }

    #[test]
    fn type_mismatch_names_the_attribute() {
        let err = eval_string(&attr("a = 1")).unwrap_err();
        assert_eq!(err.message, "attribute \"a\" must be a string but number given");
        let err = eval_string_list(&attr("a = [\"x\", true]")).unwrap_err();
        assert!(err.message.contains("must only contain strings"));
    }

    #[test]
    fn sets_reject_duplicates() {
        let err = eval_string_set(&attr("a = [\"x\", \"x\"]")).unwrap_err();
        assert!(err.message.contains("duplicated entry \"x\""));
    }

    #[test]
    fn non_literal_is_a_schema_error() {
        let err = eval_string(&attr("a = global.name")).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Schema);
        assert!(err.message.contains("cannot be evaluated statically"));
    }
}
