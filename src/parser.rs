use thiserror::Error;

use crate::{
    ast::{BinOp, Expr, Literal, LogicalOp, Token, TokenKind, UnaryOp},
    lexer::{LexError, Lexer},
};

/// Nesting limit applied unless the caller picks another one.
pub const DEFAULT_MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Unexpected {found} at position {position}, expected {}", .expected.join(" or "))]
    UnexpectedToken {
        found: String,
        position: usize,
        expected: Vec<&'static str>,
    },

    #[error("Unexpected end of input at position {position}, expected {}", .expected.join(" or "))]
    UnexpectedEnd {
        position: usize,
        expected: Vec<&'static str>,
    },

    #[error("Expression nested deeper than {max_depth} levels at position {position}")]
    TooDeep { max_depth: usize, position: usize },

    #[error(transparent)]
    Lex(#[from] LexError),
}

/// Parses a complete query with the default depth limit.
pub fn parse(query: &str) -> Result<Expr, ParseError> {
    Parser::new(Lexer::new(query))?.parse()
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer<'a>) -> Result<Self, ParseError> {
        Self::with_max_depth(lexer, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(mut lexer: Lexer<'a>, max_depth: usize) -> Result<Self, ParseError> {
        let current = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current,
            depth: 0,
            max_depth,
        })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<(), ParseError> {
        if !self.check(&expected) {
            return Err(self.unexpected(vec![expected.describe()]));
        }
        self.advance()
    }

    fn unexpected(&self, expected: Vec<&'static str>) -> ParseError {
        let position = self.current.position;
        match &self.current.kind {
            TokenKind::Eof => ParseError::UnexpectedEnd { position, expected },
            kind @ (TokenKind::Identifier(_)
            | TokenKind::Integer(_)
            | TokenKind::Float(_)
            | TokenKind::String(_)
            | TokenKind::Boolean(_)) => ParseError::UnexpectedToken {
                found: format!("{} {}", kind.describe(), self.current.text),
                position,
                expected,
            },
            kind => ParseError::UnexpectedToken {
                found: kind.describe().to_string(),
                position,
                expected,
            },
        }
    }

    /// Counts one level of nesting against the depth limit.
    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::TooDeep {
                max_depth: self.max_depth,
                position: self.current.position,
            });
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    /// Parse a complete query: one expression followed by end of input.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;
        if !self.check(&TokenKind::Eof) {
            return Err(self.unexpected(vec![TokenKind::Eof.describe()]));
        }
        Ok(expr)
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let condition = self.parse_coalesce()?;

        let expr = match self.current.kind {
            TokenKind::QuestionColon => {
                self.advance()?;
                let false_branch = self.parse_ternary()?;
                Expr::Ternary {
                    condition: Box::new(condition),
                    true_branch: None,
                    false_branch: Box::new(false_branch),
                }
            }
            TokenKind::Question => {
                self.advance()?;
                // `cond ? : else` is the spaced spelling of `?:`
                let true_branch = if self.check(&TokenKind::Colon) {
                    None
                } else {
                    Some(Box::new(self.parse_ternary()?))
                };
                self.expect(TokenKind::Colon)?;
                let false_branch = self.parse_ternary()?;
                Expr::Ternary {
                    condition: Box::new(condition),
                    true_branch,
                    false_branch: Box::new(false_branch),
                }
            }
            _ => condition,
        };

        self.leave(1);
        Ok(expr)
    }

    fn parse_coalesce(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_or()?;

        if !self.check(&TokenKind::QuestionQuestion) {
            return Ok(left);
        }
        self.advance()?;
        self.enter()?;
        let right = self.parse_coalesce()?; // right-associative
        self.leave(1);

        Ok(Expr::Coalesce {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        let mut links = 0;

        while self.check(&TokenKind::OrOr) {
            self.advance()?;
            self.enter()?;
            links += 1;
            let right = self.parse_and()?;

            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.leave(links);
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        let mut links = 0;

        while self.check(&TokenKind::AndAnd) {
            self.advance()?;
            self.enter()?;
            links += 1;
            let right = self.parse_equality()?;

            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.leave(links);
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_comparison()?;

        let op = match self.current.kind {
            TokenKind::EqEq => BinOp::Equal,
            TokenKind::NotEq => BinOp::NotEqual,
            TokenKind::EqEqEq => BinOp::Identical,
            TokenKind::NotEqEq => BinOp::NotIdentical,
            _ => return Ok(left),
        };
        self.advance()?;
        let right = self.parse_comparison()?;

        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;

        let op = match self.current.kind {
            TokenKind::Lt => BinOp::LessThan,
            TokenKind::Gt => BinOp::GreaterThan,
            TokenKind::LtEq => BinOp::LessEqual,
            TokenKind::GtEq => BinOp::GreaterEqual,
            _ => return Ok(left),
        };
        self.advance()?;
        let right = self.parse_additive()?;

        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        let mut links = 0;

        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Subtract,
                _ => break,
            };
            self.advance()?;
            self.enter()?;
            links += 1;
            let right = self.parse_multiplicative()?;

            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.leave(links);
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        let mut links = 0;

        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinOp::Multiply,
                TokenKind::Slash => BinOp::Divide,
                TokenKind::Percent => BinOp::Modulo,
                _ => break,
            };
            self.advance()?;
            self.enter()?;
            links += 1;
            let right = self.parse_unary()?;

            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.leave(links);
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current.kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            _ => return self.parse_postfix(),
        };
        self.advance()?;
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave(1);

        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// Parse access chains: `.name`, `?.name`, `.name(args)`, `[expr]`
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        let mut steps = 0;

        loop {
            match self.current.kind {
                TokenKind::Dot | TokenKind::QuestionDot => {
                    let nullsafe = self.check(&TokenKind::QuestionDot);
                    self.advance()?;
                    let name = self.expect_member_name()?;

                    expr = if self.check(&TokenKind::LParen) {
                        let args = self.parse_arguments()?;
                        Expr::MethodCall {
                            object: Box::new(expr),
                            method: name,
                            args,
                            nullsafe,
                        }
                    } else {
                        Expr::MemberAccess {
                            object: Box::new(expr),
                            member: name,
                            nullsafe,
                        }
                    };
                }
                TokenKind::LBracket => {
                    self.advance()?;
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket)?;

                    expr = Expr::IndexAccess {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => break,
            }
            self.enter()?;
            steps += 1;
        }
        self.leave(steps);
        Ok(expr)
    }

    /// Member names may collide with keywords (`item.null`, `flags.and`).
    fn expect_member_name(&mut self) -> Result<String, ParseError> {
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::Boolean(_) | TokenKind::Null | TokenKind::AndAnd | TokenKind::OrOr
                if self.current.text.starts_with(|c: char| c.is_ascii_alphabetic()) =>
            {
                self.current.text.clone()
            }
            _ => return Err(self.unexpected(vec![TokenKind::Identifier(String::new()).describe()])),
        };
        self.advance()?;
        Ok(name)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let expr = match self.current.kind.clone() {
            // Literals
            TokenKind::Integer(n) => {
                self.advance()?;
                Expr::Literal(Literal::Integer(n))
            }
            TokenKind::Float(n) => {
                self.advance()?;
                Expr::Literal(Literal::Float(n))
            }
            TokenKind::String(s) => {
                self.advance()?;
                Expr::Literal(Literal::String(s))
            }
            TokenKind::Boolean(b) => {
                self.advance()?;
                Expr::Literal(Literal::Boolean(b))
            }
            TokenKind::Null => {
                self.advance()?;
                Expr::Literal(Literal::Null)
            }

            // Variables and global function calls
            TokenKind::Identifier(name) => {
                self.advance()?;
                if self.check(&TokenKind::LParen) {
                    let args = self.parse_arguments()?;
                    Expr::FunctionCall { name, args }
                } else {
                    Expr::Variable(name)
                }
            }

            TokenKind::LParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                expr
            }

            TokenKind::LBracket => {
                self.advance()?;
                Expr::Array(self.parse_list(TokenKind::RBracket)?)
            }

            _ => {
                return Err(self.unexpected(vec![
                    "number",
                    "string",
                    "identifier",
                    "'('",
                    "'['",
                    "'!'",
                    "'-'",
                ]));
            }
        };
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::LParen)?;
        self.parse_list(TokenKind::RParen)
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_list(&mut self, close: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut items = vec![];

        if self.check(&close) {
            self.advance()?;
            return Ok(items);
        }

        loop {
            items.push(self.parse_expression()?);

            if self.check(&TokenKind::Comma) {
                self.advance()?;
            } else if self.check(&close) {
                self.advance()?;
                return Ok(items);
            } else {
                return Err(self.unexpected(vec![TokenKind::Comma.describe(), close.describe()]));
            }
        }
    }
}
