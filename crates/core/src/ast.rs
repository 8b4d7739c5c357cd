//! Source positions and the raw syntax records produced by the parser.
//!
//! These types are shared by the syntax layer, the merge engine, the import
//! resolver and the block handlers. Records are immutable once parsed;
//! blocks are handed around as `Arc<Block>` and expressions as cheap
//! [`Expr`] handles, so merging never copies source text.

use crate::lexer::{Spanned, Token};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

// ──────────────────────────────────────────────
// Positions
// ──────────────────────────────────────────────

/// A point in a source file. Lines and columns are 1-based, bytes 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
    pub byte: usize,
}

impl Pos {
    pub fn new(line: u32, column: u32, byte: usize) -> Self {
        Pos { line, column, byte }
    }
}

/// A span of source text in one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Range {
    pub file: Arc<Path>,
    pub start: Pos,
    pub end: Pos,
}

impl Range {
    pub fn new(file: impl Into<Arc<Path>>, start: Pos, end: Pos) -> Self {
        Range {
            file: file.into(),
            start,
            end,
        }
    }

    /// The range from the start of `self` to the end of `other`.
    pub fn to(&self, other: &Range) -> Range {
        Range {
            file: self.file.clone(),
            start: self.start,
            end: other.end,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(
                f,
                "{}:{},{}-{}",
                self.file.display(),
                self.start.line,
                self.start.column,
                self.end.column
            )
        } else {
            write!(
                f,
                "{}:{},{}-{},{}",
                self.file.display(),
                self.start.line,
                self.start.column,
                self.end.line,
                self.end.column
            )
        }
    }
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

/// Opaque handle to an attribute's expression.
///
/// The token slice and source text are shared with the syntax layer; cloning
/// an `Expr` only bumps reference counts. Interpreting the tokens is the job
/// of [`crate::eval`].
#[derive(Debug, Clone)]
pub struct Expr {
    tokens: Arc<[Spanned]>,
    text: Arc<str>,
    pub range: Range,
}

impl Expr {
    pub fn new(tokens: Vec<Spanned>, text: &str, range: Range) -> Self {
        Expr {
            tokens: tokens.into(),
            text: text.into(),
            range,
        }
    }

    pub fn tokens(&self) -> &[Spanned] {
        &self.tokens
    }

    /// The expression exactly as written in the source.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The identifier, if the whole expression is one bare word
    /// (e.g. `type = terraform`).
    pub fn as_keyword(&self) -> Option<&str> {
        match &*self.tokens {
            [Spanned {
                token: Token::Ident(word),
                ..
            }] => Some(word.as_str()),
            _ => None,
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.range == other.range
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Expr", 2)?;
        s.serialize_field("text", &*self.text)?;
        s.serialize_field("range", &self.range)?;
        s.end()
    }
}

// ──────────────────────────────────────────────
// Raw records
// ──────────────────────────────────────────────

/// `name = expr`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub expr: Expr,
    pub name_range: Range,
    pub range: Range,
}

/// Attributes of one body, in declaration order, unique by name.
pub type Attributes = IndexMap<String, Attribute>;

/// One physical `type "label"... { ... }` occurrence in one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub block_type: String,
    pub labels: Vec<String>,
    #[serde(skip)]
    pub label_ranges: Vec<Range>,
    pub attributes: Attributes,
    pub blocks: Vec<Arc<Block>>,
    pub range: Range,
    #[serde(skip)]
    pub type_range: Range,
    #[serde(skip)]
    pub open_brace_range: Range,
}

impl Block {
    /// The block header: from the type keyword to the opening brace.
    pub fn def_range(&self) -> Range {
        self.type_range.to(&self.open_brace_range)
    }

    /// Range spanning every label, or `None` for an unlabeled block.
    pub fn labels_range(&self) -> Option<Range> {
        match (self.label_ranges.first(), self.label_ranges.last()) {
            (Some(first), Some(last)) => Some(first.to(last)),
            _ => None,
        }
    }

    pub fn identity(&self) -> LabelBlockType {
        LabelBlockType::new(&self.block_type, &self.labels)
    }
}

/// The top-level content of a file, or the inside of a block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    pub attributes: Attributes,
    pub blocks: Vec<Arc<Block>>,
}

/// A parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: Arc<Path>,
    pub body: Body,
}

impl SourceFile {
    pub fn blocks_of<'a>(&'a self, block_type: &'a str) -> impl Iterator<Item = &'a Arc<Block>> {
        self.body
            .blocks
            .iter()
            .filter(move |b| b.block_type == block_type)
    }
}

// ──────────────────────────────────────────────
// Merge identity
// ──────────────────────────────────────────────

/// Identity of a logical block: its type tag plus its ordered labels.
///
/// Two occurrences with equal `LabelBlockType` in one scope are the same
/// entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LabelBlockType {
    pub block_type: String,
    pub labels: Vec<String>,
}

impl LabelBlockType {
    pub fn new(block_type: &str, labels: &[String]) -> Self {
        LabelBlockType {
            block_type: block_type.to_owned(),
            labels: labels.to_vec(),
        }
    }

    pub fn unlabeled(block_type: &str) -> Self {
        LabelBlockType::new(block_type, &[])
    }
}

impl fmt::Display for LabelBlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.block_type)?;
        for label in &self.labels {
            write!(f, " {:?}", label)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_display_single_and_multi_line() {
        let file: Arc<Path> = Arc::from(Path::new("stack/cfg.tm"));
        let one = Range::new(file.clone(), Pos::new(2, 16, 24), Pos::new(2, 31, 39));
        assert_eq!(one.to_string(), "stack/cfg.tm:2,16-31");
        let multi = Range::new(file, Pos::new(1, 1, 0), Pos::new(3, 2, 40));
        assert_eq!(multi.to_string(), "stack/cfg.tm:1,1-3,2");
    }

    #[test]
    fn label_block_type_equality_is_structural() {
        let a = LabelBlockType::new("globals", &["a".to_string(), "b".to_string()]);
        let b = LabelBlockType::new("globals", &["a".to_string(), "b".to_string()]);
        let c = LabelBlockType::new("globals", &["b".to_string(), "a".to_string()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(LabelBlockType::unlabeled("globals"), a);
        assert_eq!(a.to_string(), "globals \"a\" \"b\"");
    }
}
