use thiserror::Error;

use crate::ast::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    #[error("Unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    #[error("Invalid number '{text}' at position {position}")]
    InvalidNumber { text: String, position: usize },
}

impl LexError {
    pub fn position(&self) -> usize {
        match self {
            LexError::UnexpectedCharacter { position, .. }
            | LexError::UnterminatedString { position }
            | LexError::InvalidNumber { position, .. } => *position,
        }
    }
}

/// Tokenizes a query lazily.
///
/// The returned [`Tokens`] can be iterated any number of times; every pass
/// scans the input again from the start.
pub fn tokenize(input: &str) -> Tokens<'_> {
    Tokens { input }
}

/// Restartable token sequence over a query string.
#[derive(Debug, Clone, Copy)]
pub struct Tokens<'a> {
    input: &'a str,
}

impl<'a> Tokens<'a> {
    pub fn iter(&self) -> Lexer<'a> {
        Lexer::new(self.input)
    }

    /// Scans the whole input, stopping at the first error.
    pub fn to_vec(&self) -> Result<Vec<Token>, LexError> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &Tokens<'a> {
    type Item = Result<Token, LexError>;
    type IntoIter = Lexer<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    /// Byte offset of the next unread character
    position: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            position: 0,
            finished: false,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input[self.position..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> &'a str {
        let start = self.position;
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        &self.input[start..self.position]
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some(other) => {
                            result.push('\\');
                            result.push(other);
                        }
                        None => return Err(LexError::UnterminatedString { position: start }),
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::UnterminatedString { position: start })
    }

    fn read_number(&mut self) -> Result<TokenKind, LexError> {
        let start = self.position;
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.input[start..self.position];
        let invalid = || LexError::InvalidNumber {
            text: text.to_string(),
            position: start,
        };
        if is_float {
            // overflow to infinity is an error, not a value
            text.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(TokenKind::Float)
                .ok_or_else(invalid)
        } else {
            text.parse::<i64>().map(TokenKind::Integer).map_err(|_| invalid())
        }
    }

    /// Consumes `len` characters and returns `kind`.
    fn punct(&mut self, kind: TokenKind, len: usize) -> TokenKind {
        for _ in 0..len {
            self.advance();
        }
        kind
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let start = self.position;

        let kind = match self.current_char() {
            None => TokenKind::Eof,
            // `.5` after `?` keeps `a?.5:1` a ternary
            Some('.') if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number()?
            }
            Some('.') => self.punct(TokenKind::Dot, 1),
            Some(',') => self.punct(TokenKind::Comma, 1),
            Some('+') => self.punct(TokenKind::Plus, 1),
            Some('-') => self.punct(TokenKind::Minus, 1),
            Some('*') => self.punct(TokenKind::Star, 1),
            Some('/') => self.punct(TokenKind::Slash, 1),
            Some('%') => self.punct(TokenKind::Percent, 1),
            Some(':') => self.punct(TokenKind::Colon, 1),
            Some('(') => self.punct(TokenKind::LParen, 1),
            Some(')') => self.punct(TokenKind::RParen, 1),
            Some('[') => self.punct(TokenKind::LBracket, 1),
            Some(']') => self.punct(TokenKind::RBracket, 1),
            Some('?') => match self.peek_char(1) {
                Some('?') => self.punct(TokenKind::QuestionQuestion, 2),
                Some(':') => self.punct(TokenKind::QuestionColon, 2),
                Some('.') if !self.peek_char(2).is_some_and(|c| c.is_ascii_digit()) => {
                    self.punct(TokenKind::QuestionDot, 2)
                }
                _ => self.punct(TokenKind::Question, 1),
            },
            Some('=') => match (self.peek_char(1), self.peek_char(2)) {
                (Some('='), Some('=')) => self.punct(TokenKind::EqEqEq, 3),
                (Some('='), _) => self.punct(TokenKind::EqEq, 2),
                _ => {
                    return Err(LexError::UnexpectedCharacter {
                        ch: '=',
                        position: start,
                    });
                }
            },
            Some('!') => match (self.peek_char(1), self.peek_char(2)) {
                (Some('='), Some('=')) => self.punct(TokenKind::NotEqEq, 3),
                (Some('='), _) => self.punct(TokenKind::NotEq, 2),
                _ => self.punct(TokenKind::Bang, 1),
            },
            Some('<') => match self.peek_char(1) {
                Some('=') => self.punct(TokenKind::LtEq, 2),
                _ => self.punct(TokenKind::Lt, 1),
            },
            Some('>') => match self.peek_char(1) {
                Some('=') => self.punct(TokenKind::GtEq, 2),
                _ => self.punct(TokenKind::Gt, 1),
            },
            Some('&') if self.peek_char(1) == Some('&') => self.punct(TokenKind::AndAnd, 2),
            Some('|') if self.peek_char(1) == Some('|') => self.punct(TokenKind::OrOr, 2),
            Some('"') => TokenKind::String(self.read_string('"')?),
            Some('\'') => TokenKind::String(self.read_string('\'')?),
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                match self.read_identifier() {
                    "and" => TokenKind::AndAnd,
                    "or" => TokenKind::OrOr,
                    "true" => TokenKind::Boolean(true),
                    "false" => TokenKind::Boolean(false),
                    "null" => TokenKind::Null,
                    ident => TokenKind::Identifier(ident.to_string()),
                }
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number()?,
            Some(ch) => {
                return Err(LexError::UnexpectedCharacter {
                    ch,
                    position: start,
                });
            }
        };

        Ok(Token::new(kind, &self.input[start..self.position], start))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        match &result {
            Ok(token) if token.kind == TokenKind::Eof => self.finished = true,
            Err(_) => self.finished = true,
            Ok(_) => {}
        }
        Some(result)
    }
}
