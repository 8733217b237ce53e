//! Tokenizer for the `${{ }}` expression language.
//!
//! Produces a flat token stream that always ends with a single
//! [`TokenKind::Eof`] sentinel.

use crate::error::ExpressionError;
use std::fmt;

/// A lexical unit produced by [`tokenize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Token text. For string literals this is the unescaped content.
    pub text: String,
    /// Character offset of the first character of the token.
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }

    /// True if this token is the given operator or punctuation symbol.
    pub fn is_symbol(&self, symbol: &str) -> bool {
        matches!(self.kind, TokenKind::Operator | TokenKind::Punctuation) && self.text == symbol
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Integer,
    Float,
    String,
    Operator,
    Punctuation,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Integer => write!(f, "integer"),
            TokenKind::Float => write!(f, "float"),
            TokenKind::String => write!(f, "string literal"),
            TokenKind::Operator => write!(f, "operator"),
            TokenKind::Punctuation => write!(f, "punctuation"),
            TokenKind::Eof => write!(f, "end of expression"),
        }
    }
}

const PUNCTUATION: [char; 6] = ['(', ')', '[', ']', '.', ','];
const TWO_CHAR_OPERATORS: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];
const ONE_CHAR_OPERATORS: [char; 7] = ['!', '<', '>', '+', '-', '*', '/'];

/// Tokenize expression source text.
pub fn tokenize(text: &str) -> Result<Vec<Token>, ExpressionError> {
    Lexer::new(text).tokenize()
}

struct Lexer {
    input: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ExpressionError> {
        loop {
            self.skip_whitespace();
            let Some(ch) = self.peek(0) else {
                self.tokens.push(Token::new(TokenKind::Eof, "", self.pos));
                return Ok(self.tokens);
            };
            let token = self.next_token(ch)?;
            self.tokens.push(token);
        }
    }

    fn next_token(&mut self, ch: char) -> Result<Token, ExpressionError> {
        let start = self.pos;

        if PUNCTUATION.contains(&ch) {
            self.pos += 1;
            return Ok(Token::new(TokenKind::Punctuation, ch.to_string(), start));
        }

        if let Some(next) = self.peek(1) {
            let pair: String = [ch, next].iter().collect();
            if TWO_CHAR_OPERATORS.contains(&pair.as_str()) {
                self.pos += 2;
                return Ok(Token::new(TokenKind::Operator, pair, start));
            }
        }

        if ch == '-' && self.starts_negative_number() {
            return Ok(self.number());
        }

        if ONE_CHAR_OPERATORS.contains(&ch) {
            self.pos += 1;
            return Ok(Token::new(TokenKind::Operator, ch.to_string(), start));
        }

        if ch == '\'' {
            return self.string();
        }

        if ch.is_ascii_digit() {
            return Ok(self.number());
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            return Ok(self.identifier());
        }

        Err(ExpressionError::UnexpectedCharacter { position: start })
    }

    /// A `-` directly followed by a digit starts a number unless the previous
    /// token ends an operand (`a -1` stays a binary minus).
    fn starts_negative_number(&self) -> bool {
        let digit_follows = self.peek(1).is_some_and(|c| c.is_ascii_digit());
        let after_operand = self.tokens.last().is_some_and(|t| match t.kind {
            TokenKind::Identifier | TokenKind::Integer | TokenKind::Float | TokenKind::String => {
                true
            }
            TokenKind::Punctuation => t.text == ")" || t.text == "]",
            _ => false,
        });
        digit_follows && !after_operand
    }

    fn string(&mut self) -> Result<Token, ExpressionError> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut value = String::new();
        loop {
            match self.peek(0) {
                None => return Err(ExpressionError::UnterminatedString { position: start }),
                Some('\'') if self.peek(1) == Some('\'') => {
                    value.push('\'');
                    self.pos += 2;
                }
                Some('\'') => {
                    self.pos += 1;
                    return Ok(Token::new(TokenKind::String, value, start));
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn number(&mut self) -> Token {
        let start = self.pos;
        let mut is_float = false;

        if self.peek(0) == Some('-') {
            self.pos += 1;
        }
        self.consume_digits();

        if self.peek(0) == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            self.consume_digits();
        }

        if matches!(self.peek(0), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek(1), Some('+' | '-')));
            if self.peek(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += 1 + sign;
                self.consume_digits();
            }
        }

        let kind = if is_float {
            TokenKind::Float
        } else {
            TokenKind::Integer
        };
        Token::new(kind, self.slice(start), start)
    }

    fn identifier(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek(0)
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            self.pos += 1;
        }
        Token::new(TokenKind::Identifier, self.slice(start), start)
    }

    fn consume_digits(&mut self) {
        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek(0).is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn slice(&self, start: usize) -> String {
        self.input[start..self.pos].iter().collect()
    }
}
