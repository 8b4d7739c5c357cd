//! Syntax layer: turns tokens into positioned attribute and block records.
//! Expressions are captured as opaque token slices; nothing is evaluated
//! or validated against a schema here.

use crate::ast::{Attribute, Body, Block, Expr, Range, SourceFile};
use crate::error::{Error, ErrorList};
use crate::lexer::{self, Spanned, Token};
use std::path::Path;
use std::sync::Arc;

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'a> {
    src: &'a str,
    tokens: &'a [Spanned],
    pos: usize,
    file: Arc<Path>,
    errors: ErrorList,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, tokens: &'a [Spanned], file: &Arc<Path>) -> Self {
        Parser {
            src,
            tokens,
            pos: 0,
            file: file.clone(),
            errors: ErrorList::new(),
        }
    }

    fn cur(&self) -> &'a Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &'a Token {
        &self.cur().token
    }

    fn advance(&mut self) -> &'a Spanned {
        let t = self.cur();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn range_of(&self, tok: &Spanned) -> Range {
        tok.range(&self.file)
    }

    fn err(&self, msg: impl Into<String>) -> Error {
        Error::syntax(&self.range_of(self.cur()), msg)
    }

    fn skip_newlines(&mut self) {
        while self.peek() == &Token::Newline {
            self.advance();
        }
    }

    // -- Bodies ------------------------------------------------

    /// Parse items until end of input, or until the `}` closing the
    /// enclosing block when `nested` is set (the brace is not consumed).
    fn parse_body(&mut self, nested: bool) -> Body {
        let mut body = Body::default();
        loop {
            self.skip_newlines();
            match self.peek() {
                Token::Eof => break,
                Token::RBrace if nested => break,
                Token::Ident(_) => {
                    if let Err(e) = self.parse_item(&mut body) {
                        self.errors.push(e);
                        self.recover();
                    }
                }
                other => {
                    let e = self.err(format!("expected attribute or block, got {:?}", other));
                    self.errors.push(e);
                    self.advance();
                    self.recover();
                }
            }
        }
        body
    }

    fn parse_item(&mut self, body: &mut Body) -> Result<(), Error> {
        let name_tok = self.advance();
        let Token::Ident(name) = &name_tok.token else {
            return Err(Error::syntax(
                &self.range_of(name_tok),
                "expected an identifier",
            ));
        };

        if self.peek() == &Token::Assign {
            self.advance();
            let expr = self.parse_expr()?;
            self.expect_item_end()?;
            let name_range = self.range_of(name_tok);
            let attr = Attribute {
                name: name.clone(),
                range: name_range.to(&expr.range),
                name_range,
                expr,
            };
            if let Some(first) = body.attributes.get(name) {
                // Recorded, but parsing continues with the next item.
                self.errors.push(Error::syntax(
                    &attr.name_range,
                    format!(
                        "attribute {:?} redefined (first defined at {})",
                        name, first.name_range
                    ),
                ));
            } else {
                body.attributes.insert(name.clone(), attr);
            }
            return Ok(());
        }

        let block = self.parse_block(name_tok, name)?;
        body.blocks.push(Arc::new(block));
        Ok(())
    }

    fn parse_block(&mut self, type_tok: &Spanned, block_type: &str) -> Result<Block, Error> {
        let mut labels = Vec::new();
        let mut label_ranges = Vec::new();
        loop {
            let tok = self.cur();
            match &tok.token {
                Token::Str {
                    value,
                    template: false,
                } => {
                    labels.push(value.clone());
                    label_ranges.push(self.range_of(tok));
                    self.advance();
                }
                Token::Ident(word) => {
                    labels.push(word.clone());
                    label_ranges.push(self.range_of(tok));
                    self.advance();
                }
                Token::Str { template: true, .. } => {
                    return Err(self.err("template sequences are not allowed in block labels"));
                }
                Token::LBrace => break,
                other => {
                    return Err(self.err(format!(
                        "expected '=', a block label or '{{', got {:?}",
                        other
                    )));
                }
            }
        }

        let open = self.advance();
        let open_brace_range = self.range_of(open);
        let body = self.parse_body(true);
        if self.peek() != &Token::RBrace {
            return Err(Error::syntax(
                &open_brace_range,
                format!("unclosed block {:?}", block_type),
            ));
        }
        let close = self.advance();
        self.expect_item_end()?;

        let type_range = self.range_of(type_tok);
        Ok(Block {
            block_type: block_type.to_owned(),
            labels,
            label_ranges,
            attributes: body.attributes,
            blocks: body.blocks,
            range: type_range.to(&self.range_of(close)),
            type_range,
            open_brace_range,
        })
    }

    /// Items end at a newline, end of input, or the brace closing a
    /// single-line block.
    fn expect_item_end(&mut self) -> Result<(), Error> {
        match self.peek() {
            Token::Newline => {
                self.advance();
                Ok(())
            }
            Token::Eof | Token::RBrace => Ok(()),
            other => Err(self.err(format!(
                "expected newline after item, got {:?}",
                other
            ))),
        }
    }

    // -- Expressions -------------------------------------------

    /// Capture the tokens of one expression: everything up to a newline or
    /// an unmatched `}` at bracket depth zero.
    fn parse_expr(&mut self) -> Result<Expr, Error> {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::Eof => {
                    if depth > 0 {
                        return Err(self.err("unclosed bracket in expression"));
                    }
                    break;
                }
                Token::Newline if depth == 0 => break,
                Token::RBrace if depth == 0 => break,
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    if depth == 0 {
                        return Err(self.err(format!("unexpected {:?} in expression", self.peek())));
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.advance();
        }

        let tokens = &self.tokens[start..self.pos];
        let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
            return Err(self.err("expected an expression"));
        };
        let range = Range::new(self.file.clone(), first.start, last.end);
        let text = self.src.get(first.start.byte..last.end.byte).unwrap_or_default();
        Ok(Expr::new(tokens.to_vec(), text, range))
    }

    // -- Recovery ----------------------------------------------

    /// Skip to the end of the broken item: the next newline at nesting
    /// level zero, or the `}` of the enclosing block (left unconsumed).
    fn recover(&mut self) {
        let mut depth: i32 = 0;
        loop {
            match self.peek() {
                Token::Eof => break,
                Token::Newline if depth == 0 => break,
                Token::LBrace | Token::LBracket | Token::LParen => {
                    depth += 1;
                    self.advance();
                }
                Token::RBrace if depth == 0 => break,
                Token::RBrace | Token::RBracket | Token::RParen => {
                    depth -= 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}

/// Parse a token stream into a body, collecting every syntax error.
pub fn parse(src: &str, tokens: &[Spanned], file: &Arc<Path>) -> Result<Body, ErrorList> {
    let mut p = Parser::new(src, tokens, file);
    let body = p.parse_body(false);
    p.errors.into_result()?;
    Ok(body)
}

/// Lex and parse one file's source text.
pub fn parse_source(src: &str, path: &Path) -> Result<SourceFile, ErrorList> {
    let file: Arc<Path> = Arc::from(path);
    let tokens = lexer::lex(src, &file)?;
    let body = parse(src, &tokens, &file)?;
    Ok(SourceFile { path: file, body })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Pos;
    use crate::error::ErrorKind;

    fn parse_str(src: &str) -> Result<SourceFile, ErrorList> {
        parse_source(src, Path::new("/p/cfg.tm"))
    }

    #[test]
    fn parses_attributes_and_labeled_blocks() {
        let file = parse_str(
            r#"
a = 1
globals "x" y {
  b = [1, 2,
       3]
  map "m" {
    key = k
  }
}
"#,
        )
        .unwrap();

        assert_eq!(file.body.attributes["a"].expr.text(), "1");
        let globals = &file.body.blocks[0];
        assert_eq!(globals.block_type, "globals");
        assert_eq!(globals.labels, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(globals.attributes["b"].expr.text(), "[1, 2,\n       3]");
        assert_eq!(globals.blocks[0].block_type, "map");
        assert_eq!(globals.blocks[0].labels, vec!["m".to_string()]);
        assert_eq!(globals.type_range.start, Pos::new(3, 1, 7));
        assert_eq!(globals.range.end.line, 9);
    }

    #[test]
    fn single_line_block() {
        let file = parse_str("globals { x = 1 }").unwrap();
        let globals = &file.body.blocks[0];
        assert_eq!(globals.attributes["x"].expr.text(), "1");
        assert_eq!(globals.def_range().to_string(), "/p/cfg.tm:1,1-10");
    }

    #[test]
    fn expression_range_points_at_source() {
        let file = parse_str("import {\n  source = \"/other/cfg.tm\"\n}\n").unwrap();
        let attr = &file.body.blocks[0].attributes["source"];
        assert_eq!(attr.expr.range.start, Pos::new(2, 12, 20));
        assert_eq!(attr.expr.range.end, Pos::new(2, 27, 35));
        assert_eq!(attr.name_range.start, Pos::new(2, 3, 11));
    }

    #[test]
    fn repeated_attribute_in_one_block_is_a_syntax_error() {
        let errs = parse_str("globals {\n  a = 1\n  a = 2\n}\n").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.errors()[0].kind, ErrorKind::Syntax);
        assert!(errs.errors()[0].message.contains("redefined"));
    }

    #[test]
    fn recovers_and_reports_every_broken_item() {
        let errs = parse_str("a = \nglobals {\n  b = (1\n}\nc = = 2\n").unwrap_err();
        assert!(errs.len() >= 2, "got {:?}", errs);
        assert!(errs.iter().all(|e| e.kind == ErrorKind::Syntax));
    }

    #[test]
    fn unclosed_block_is_reported() {
        let errs = parse_str("globals {\n  a = 1\n").unwrap_err();
        assert!(errs.iter().any(|e| e.message.contains("unclosed block")));
    }
}
