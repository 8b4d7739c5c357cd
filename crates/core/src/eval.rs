//! Static evaluation of literal expressions.
//!
//! Only what can be known without an evaluation context is understood:
//! strings without template sequences, numbers, booleans, `null`, and
//! lists/objects of those. Anything else (references, function calls,
//! interpolation) is reported as [`EvalError::NotStatic`] so callers can
//! decide whether a literal was required.

use crate::ast::{Expr, Range};
use crate::lexer::{Spanned, Token};
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    /// Type name as shown in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("expression {text:?} cannot be evaluated statically")]
    NotStatic { range: Range, text: String },
    #[error("{message}")]
    Invalid { range: Range, message: String },
}

impl EvalError {
    pub fn range(&self) -> &Range {
        match self {
            EvalError::NotStatic { range, .. } | EvalError::Invalid { range, .. } => range,
        }
    }
}

struct Evaluator<'a> {
    tokens: Vec<&'a Spanned>,
    pos: usize,
    expr: &'a Expr,
}

impl<'a> Evaluator<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let tok = self.peek();
        self.pos += 1;
        tok
    }

    fn not_static(&self) -> EvalError {
        EvalError::NotStatic {
            range: self.expr.range.clone(),
            text: self.expr.text().to_owned(),
        }
    }

    fn invalid(&self, message: impl Into<String>) -> EvalError {
        EvalError::Invalid {
            range: self.expr.range.clone(),
            message: message.into(),
        }
    }

    fn value(&mut self) -> Result<Value, EvalError> {
        match self.advance() {
            Some(Token::Ident(w)) => match w.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                _ => Err(self.not_static()),
            },
            Some(Token::Number(n)) => self.number(n, false),
            Some(Token::Minus) => match self.advance() {
                Some(Token::Number(n)) => self.number(n, true),
                _ => Err(self.not_static()),
            },
            Some(Token::Str {
                value,
                template: false,
            }) => Ok(Value::String(value.clone())),
            Some(Token::LBracket) => self.list(),
            Some(Token::LBrace) => self.object(),
            _ => Err(self.not_static()),
        }
    }

    fn number(&self, text: &str, negative: bool) -> Result<Value, EvalError> {
        let n: f64 = text
            .parse()
            .map_err(|_| self.invalid(format!("invalid number {:?}", text)))?;
        Ok(Value::Number(if negative { -n } else { n }))
    }

    fn list(&mut self) -> Result<Value, EvalError> {
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(&Token::RBracket) {
                self.advance();
                return Ok(Value::List(items));
            }
            items.push(self.value()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => return Ok(Value::List(items)),
                _ => return Err(self.not_static()),
            }
        }
    }

    fn object(&mut self) -> Result<Value, EvalError> {
        let mut fields = IndexMap::new();
        loop {
            let key = match self.advance() {
                Some(Token::RBrace) => return Ok(Value::Object(fields)),
                Some(Token::Comma) => continue,
                Some(Token::Ident(k)) => k.clone(),
                Some(Token::Str {
                    value,
                    template: false,
                }) => value.clone(),
                _ => return Err(self.not_static()),
            };
            match self.advance() {
                Some(Token::Assign) | Some(Token::Colon) => {}
                _ => return Err(self.not_static()),
            }
            let value = self.value()?;
            if fields.insert(key.clone(), value).is_some() {
                return Err(self.invalid(format!("duplicate object key {:?}", key)));
            }
        }
    }
}

/// Evaluate an expression that must be a literal value.
pub fn evaluate(expr: &Expr) -> Result<Value, EvalError> {
    let mut ev = Evaluator {
        tokens: expr
            .tokens()
            .iter()
            .filter(|s| s.token != Token::Newline)
            .collect(),
        pos: 0,
        expr,
    };
    let value = ev.value()?;
    if ev.pos != ev.tokens.len() {
        return Err(ev.not_static());
    }
    Ok(value)
}
