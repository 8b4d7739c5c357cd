use crate::ast::{Pos, Range};
use crate::error::Error;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords, distinguished by the consumer
    Ident(String),
    /// Numeric literal, kept as written
    Number(String),
    /// Quoted string or heredoc. `template` is set when the content holds
    /// `${...}` or `%{...}` sequences, which only an evaluator can expand.
    Str { value: String, template: bool },
    // Punctuation
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Assign,
    Comma,
    Dot,
    Ellipsis,
    Colon,
    Question,
    FatArrow,
    // Comparison operators
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    // Arithmetic operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    // Logical operators
    And,
    Or,
    Bang,
    /// Significant: it terminates attributes
    Newline,
    // End of input
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: Pos,
    pub end: Pos,
}

impl Spanned {
    pub fn range(&self, file: &Arc<Path>) -> Range {
        Range::new(file.clone(), self.start, self.end)
    }
}

struct Cursor<'a> {
    chars: Vec<char>,
    idx: usize,
    line: u32,
    column: u32,
    byte: usize,
    file: &'a Arc<Path>,
}

impl<'a> Cursor<'a> {
    fn new(src: &str, file: &'a Arc<Path>) -> Self {
        Cursor {
            chars: src.chars().collect(),
            idx: 0,
            line: 1,
            column: 1,
            byte: 0,
            file,
        }
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.column, self.byte)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.idx + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.idx).copied()?;
        self.idx += 1;
        self.byte += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn err(&self, start: Pos, message: impl Into<String>) -> Error {
        Error::syntax(&Range::new(self.file.clone(), start, self.pos()), message)
    }
}

pub fn lex(src: &str, file: &Arc<Path>) -> Result<Vec<Spanned>, Error> {
    let mut cur = Cursor::new(src, file);
    let mut tokens = Vec::new();

    while let Some(c) = cur.peek() {
        let start = cur.pos();

        // Line comments
        if c == '#' || (c == '/' && cur.peek_at(1) == Some('/')) {
            while let Some(c) = cur.peek() {
                if c == '\n' {
                    break;
                }
                cur.bump();
            }
            continue;
        }

        // Block comment
        if c == '/' && cur.peek_at(1) == Some('*') {
            cur.bump();
            cur.bump();
            loop {
                match cur.peek() {
                    None => return Err(cur.err(start, "unterminated block comment")),
                    Some('*') if cur.peek_at(1) == Some('/') => {
                        cur.bump();
                        cur.bump();
                        break;
                    }
                    Some(_) => {
                        cur.bump();
                    }
                }
            }
            continue;
        }

        if c == '\n' {
            cur.bump();
            push(&mut tokens, Token::Newline, start, cur.pos());
            continue;
        }

        if c.is_whitespace() {
            cur.bump();
            continue;
        }

        if c == '"' {
            let (value, template) = lex_string(&mut cur, start)?;
            push(&mut tokens, Token::Str { value, template }, start, cur.pos());
            continue;
        }

        if c == '<' && cur.peek_at(1) == Some('<') {
            let (value, template) = lex_heredoc(&mut cur, start)?;
            push(&mut tokens, Token::Str { value, template }, start, cur.pos());
            continue;
        }

        if c.is_ascii_digit() {
            let number = lex_number(&mut cur);
            push(&mut tokens, Token::Number(number), start, cur.pos());
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut word = String::new();
            while let Some(c) = cur.peek() {
                if c.is_alphanumeric() || c == '_' || c == '-' {
                    word.push(c);
                    cur.bump();
                } else {
                    break;
                }
            }
            push(&mut tokens, Token::Ident(word), start, cur.pos());
            continue;
        }

        let two = (c, cur.peek_at(1));
        let (token, width) = match two {
            ('=', Some('=')) => (Token::Eq, 2),
            ('=', Some('>')) => (Token::FatArrow, 2),
            ('!', Some('=')) => (Token::Neq, 2),
            ('<', Some('=')) => (Token::Lte, 2),
            ('>', Some('=')) => (Token::Gte, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('.', Some('.')) if cur.peek_at(2) == Some('.') => (Token::Ellipsis, 3),
            ('=', _) => (Token::Assign, 1),
            ('!', _) => (Token::Bang, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            (':', _) => (Token::Colon, 1),
            ('?', _) => (Token::Question, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            _ => {
                cur.bump();
                return Err(cur.err(start, format!("unexpected character '{}'", c)));
            }
        };
        for _ in 0..width {
            cur.bump();
        }
        push(&mut tokens, token, start, cur.pos());
    }

    let end = cur.pos();
    push(&mut tokens, Token::Eof, end, end);
    Ok(tokens)
}

fn push(tokens: &mut Vec<Spanned>, token: Token, start: Pos, end: Pos) {
    tokens.push(Spanned { token, start, end });
}

fn lex_number(cur: &mut Cursor<'_>) -> String {
    let mut s = String::new();
    while let Some(c) = cur.peek() {
        if c.is_ascii_digit() {
            s.push(c);
            cur.bump();
        } else {
            break;
        }
    }
    if cur.peek() == Some('.') && cur.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
        s.push('.');
        cur.bump();
        while let Some(c) = cur.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                cur.bump();
            } else {
                break;
            }
        }
    }
    if matches!(cur.peek(), Some('e') | Some('E')) {
        let sign = cur.peek_at(1);
        let digit_at = if matches!(sign, Some('+') | Some('-')) { 2 } else { 1 };
        if cur.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
            for _ in 0..digit_at {
                if let Some(c) = cur.bump() {
                    s.push(c);
                }
            }
            while let Some(c) = cur.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    cur.bump();
                } else {
                    break;
                }
            }
        }
    }
    s
}

/// Lex a quoted string starting at the opening quote. Template sequences
/// are copied verbatim, including any quotes nested inside them.
fn lex_string(cur: &mut Cursor<'_>, start: Pos) -> Result<(String, bool), Error> {
    cur.bump(); // opening quote
    let mut s = String::new();
    let mut template = false;
    loop {
        let Some(c) = cur.peek() else {
            return Err(cur.err(start, "unterminated string literal"));
        };
        match c {
            '"' => {
                cur.bump();
                return Ok((s, template));
            }
            '\n' => return Err(cur.err(start, "unterminated string literal")),
            '\\' => {
                cur.bump();
                let Some(esc) = cur.bump() else {
                    return Err(cur.err(start, "unterminated escape in string"));
                };
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    'r' => s.push('\r'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            '$' | '%' if cur.peek_at(1) == Some(c) && cur.peek_at(2) == Some('{') => {
                // `$${` and `%%{` escape a literal template opener
                cur.bump();
                cur.bump();
                cur.bump();
                s.push(c);
                s.push('{');
            }
            '$' | '%' if cur.peek_at(1) == Some('{') => {
                template = true;
                copy_interpolation(cur, start, &mut s)?;
            }
            _ => {
                s.push(c);
                cur.bump();
            }
        }
    }
}

/// Copy a `${ ... }` sequence, tracking nested braces and strings.
fn copy_interpolation(cur: &mut Cursor<'_>, start: Pos, out: &mut String) -> Result<(), Error> {
    let mut depth = 0usize;
    let mut in_string = false;
    while let Some(c) = cur.bump() {
        out.push(c);
        if in_string {
            match c {
                '\\' => {
                    if let Some(next) = cur.bump() {
                        out.push(next);
                    }
                }
                '"' => in_string = false,
                '\n' => return Err(cur.err(start, "unterminated string literal")),
                _ => {}
            }
            continue;
        }
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            '"' => in_string = true,
            '\n' => return Err(cur.err(start, "unterminated template sequence")),
            _ => {}
        }
    }
    Err(cur.err(start, "unterminated template sequence"))
}

/// Lex `<<MARKER` / `<<-MARKER` heredocs. The `-` form strips the common
/// leading indentation.
fn lex_heredoc(cur: &mut Cursor<'_>, start: Pos) -> Result<(String, bool), Error> {
    cur.bump();
    cur.bump();
    let indented = if cur.peek() == Some('-') {
        cur.bump();
        true
    } else {
        false
    };
    let mut marker = String::new();
    while let Some(c) = cur.peek() {
        if c.is_alphanumeric() || c == '_' {
            marker.push(c);
            cur.bump();
        } else {
            break;
        }
    }
    if marker.is_empty() || cur.peek() != Some('\n') {
        return Err(cur.err(start, "invalid heredoc: expected marker followed by newline"));
    }
    cur.bump();

    let mut lines: Vec<String> = Vec::new();
    loop {
        if cur.peek().is_none() {
            return Err(cur.err(start, format!("unterminated heredoc, missing '{}'", marker)));
        }
        let mut line = String::new();
        while let Some(c) = cur.peek() {
            if c == '\n' {
                break;
            }
            line.push(c);
            cur.bump();
        }
        if line.trim() == marker {
            break;
        }
        cur.bump();
        lines.push(line);
    }

    if indented {
        let strip = lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.len() - l.trim_start().len())
            .min()
            .unwrap_or(0);
        for line in &mut lines {
            *line = line.chars().skip(strip).collect();
        }
    }

    let mut value = lines.join("\n");
    if !lines.is_empty() {
        value.push('\n');
    }
    let template = value.contains("${") || value.contains("%{");
    Ok((value, template))
}
