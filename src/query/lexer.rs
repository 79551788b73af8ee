//! Expression Lexer
//!
//! Splits expression text into literal runs and `{Tag ...}` / `{/Tag}`
//! markers. Braces are located with memchr; `{{` and `}}` stand for
//! literal braces.

use memchr::memchr2;

use crate::error::{FormError, Result};

/// Expression token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// Literal text (escapes already decoded)
    Text(String),
    /// `{Tag Key=Value ...}`
    Open {
        tag: &'a str,
        options: Vec<(&'a str, &'a str)>,
        offset: usize,
    },
    /// `{/Tag}`
    Close { tag: &'a str, offset: usize },
    /// End of input
    Eof,
}

/// Expression lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer
    pub fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        if self.pos >= self.input.len() {
            return Ok(Token::Eof);
        }

        if self.bytes()[self.pos] == b'{' && self.bytes().get(self.pos + 1) != Some(&b'{') {
            return self.read_tag();
        }

        self.read_text()
    }

    /// Read literal text up to the next tag
    fn read_text(&mut self) -> Result<Token<'a>> {
        let bytes = self.bytes();
        let mut text = String::new();

        loop {
            let rest = &bytes[self.pos..];
            let Some(i) = memchr2(b'{', b'}', rest) else {
                text.push_str(&self.input[self.pos..]);
                self.pos = self.input.len();
                break;
            };

            text.push_str(&self.input[self.pos..self.pos + i]);
            let brace = self.pos + i;
            let doubled = bytes.get(brace + 1) == Some(&bytes[brace]);

            match (bytes[brace], doubled) {
                (b, true) => {
                    text.push(b as char);
                    self.pos = brace + 2;
                }
                (b'{', false) => {
                    self.pos = brace;
                    break;
                }
                _ => return Err(FormError::structural(brace, "unmatched '}'")),
            }
        }

        Ok(Token::Text(text))
    }

    /// Read `{...}` starting at the current position
    fn read_tag(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        let body_start = start + 1;
        let end = match memchr2(b'{', b'}', &self.bytes()[body_start..]) {
            Some(i) if self.bytes()[body_start + i] == b'}' => body_start + i,
            Some(i) => {
                return Err(FormError::structural(body_start + i, "'{' inside a tag"));
            }
            None => return Err(FormError::structural(start, "unterminated tag")),
        };
        self.pos = end + 1;

        let body = self.input[body_start..end].trim();
        if let Some(name) = body.strip_prefix('/') {
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(FormError::structural(start, "malformed closing tag"));
            }
            return Ok(Token::Close {
                tag: name,
                offset: start,
            });
        }

        let mut parts = body.split_whitespace();
        let tag = parts
            .next()
            .ok_or_else(|| FormError::structural(start, "empty tag"))?;

        let mut options = Vec::new();
        for part in parts {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| FormError::structural(start, format!("expected Key=Value, got `{part}`")))?;
            options.push((key, unquote(value)));
        }

        Ok(Token::Open {
            tag,
            options,
            offset: start,
        })
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}
