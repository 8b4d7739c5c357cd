//! Diagnostics: a single [`Error`] and the append-only [`ErrorList`]
//! accumulator every phase reports through.

use crate::ast::Range;
use serde::Serialize;
use std::fmt;

/// Stable category of a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed source text, reported by the syntax layer.
    Syntax,
    /// Structural or attribute violation within one block.
    Schema,
    /// Import resolution, cycle or scope violation.
    Import,
    /// Duplicate labeled entity or duplicate attribute within a merge.
    Redeclared,
    /// A construct pulled in through an import that must be owned locally.
    Unexpected,
    /// A configuration file could not be read.
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Schema => "schema error",
            ErrorKind::Import => "import error",
            ErrorKind::Redeclared => "redeclaration error",
            ErrorKind::Unexpected => "unexpected construct",
            ErrorKind::Io => "io error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configuration error with an optional source location.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub struct Error {
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, range: Option<Range>, message: impl Into<String>) -> Self {
        Error {
            kind,
            range,
            message: message.into(),
        }
    }

    pub fn at(kind: ErrorKind, range: &Range, message: impl Into<String>) -> Self {
        Error::new(kind, Some(range.clone()), message)
    }

    pub fn syntax(range: &Range, message: impl Into<String>) -> Self {
        Error::at(ErrorKind::Syntax, range, message)
    }

    pub fn schema(range: &Range, message: impl Into<String>) -> Self {
        Error::at(ErrorKind::Schema, range, message)
    }

    pub fn import(range: &Range, message: impl Into<String>) -> Self {
        Error::at(ErrorKind::Import, range, message)
    }

    pub fn redeclared(range: &Range, message: impl Into<String>) -> Self {
        Error::at(ErrorKind::Redeclared, range, message)
    }

    pub fn unexpected(range: &Range, message: impl Into<String>) -> Self {
        Error::at(ErrorKind::Unexpected, range, message)
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(range) = &self.range {
            write!(f, "{}: ", range)?;
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Ordered, append-only collection of errors.
///
/// Phases push every violation they find and hand the list upward; nothing
/// is dropped. An empty list means success, see [`ErrorList::into_result`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, thiserror::Error)]
#[serde(transparent)]
pub struct ErrorList {
    errors: Vec<Error>,
}

impl ErrorList {
    pub fn new() -> Self {
        ErrorList::default()
    }

    pub fn push(&mut self, err: Error) {
        self.errors.push(err);
    }

    /// Append the errors of a failed result, if any.
    pub fn append(&mut self, result: Result<(), ErrorList>) {
        if let Err(other) = result {
            self.extend(other);
        }
    }

    /// Append every entry of another list, preserving order.
    pub fn extend(&mut self, other: ErrorList) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.errors.iter()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// True if any entry has the given kind.
    pub fn contains_kind(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    /// The only error, when the list holds exactly one.
    pub fn single(&self) -> Option<&Error> {
        match self.errors.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// `Ok(())` when nothing was recorded, the full list otherwise.
    pub fn into_result(self) -> Result<(), ErrorList> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl From<Error> for ErrorList {
    fn from(err: Error) -> Self {
        ErrorList { errors: vec![err] }
    }
}

impl IntoIterator for ErrorList {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
