//! Recursive-descent parser for the sandboxed arithmetic grammar.
//!
//! Grammar (EBNF):
//! ```text
//! expr:= term (('+' | '-') term)*
//! term:= unary (('*' | '/') unary)*
//! unary:= ('+' | '-')? atom
//! atom:= NUMBER | array | call | ident | '(' expr ')'
//! call:= IDENT '(' (expr (',' expr)*)? ')'
//! array:= '[' (expr (',' expr)*)? ']'
//! ident:= IDENT -- variable reference
//! ```

use crate::ast::{BinaryOp, ExprNode, UnaryOp};
use crate::tokenizer::{tokenize, Token, TokenKind, TokenizerError};

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Tokenizer(TokenizerError),
    UnexpectedEnd,
    UnexpectedToken { found: String, pos: usize },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Tokenizer(e) => write!(f, "{e}"),
            ParseError::UnexpectedEnd => write!(f, "unexpected end of expression"),
            ParseError::UnexpectedToken { found, pos } => {
                write!(f, "unexpected token '{found}' at position {pos}")
            }
        }
    }
}
impl std::error::Error for ParseError {}

impl From<TokenizerError> for ParseError {
    fn from(e: TokenizerError) -> Self {
        ParseError::Tokenizer(e)
    }
}

pub fn parse(source: &str) -> Result<ExprNode, ParseError> {
    let tokens = tokenize(source)?;
    let mut p = Parser { tokens, pos: 0 };
    let node = p.parse_expr()?;
    if p.pos != p.tokens.len() {
        let tok = &p.tokens[p.pos];
        return Err(ParseError::UnexpectedToken {
                found: tok.text.clone(),
                pos: tok.pos,
        });
    }
    Ok(node)
}

/// Balanced-parentheses check used by the validator before a full parse
/// ( phase 3); cheaper than parsing and gives a precise error for
/// the common authoring mistake.
pub fn parens_balanced(source: &str) -> bool {
    let mut depth_paren = 0i32;
    let mut depth_bracket = 0i32;
    for c in source.chars() {
        match c {
            '(' => depth_paren += 1,
            ')' => {
                depth_paren -= 1;
                if depth_paren < 0 {
                    return false;
                }
            }
            '[' => depth_bracket += 1,
            ']' => {
                depth_bracket -= 1;
                if depth_bracket < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth_paren == 0 && depth_bracket == 0
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token, ParseError> {
        match self.tokens.get(self.pos) {
            Some(tok) if tok.kind == kind => {
                self.pos += 1;
                Ok(&self.tokens[self.pos - 1])
            }
            Some(tok) => Err(ParseError::UnexpectedToken {
                    found: tok.text.clone(),
                    pos: tok.pos,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_expr(&mut self) -> Result<ExprNode, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek().map(|t| t.kind) {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = ExprNode::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<ExprNode, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().map(|t| t.kind) {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = ExprNode::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ExprNode, ParseError> {
        match self.peek().map(|t| t.kind) {
            Some(TokenKind::Minus) => {
                self.advance();
                Ok(ExprNode::Unary {
                        op: UnaryOp::Neg,
                        expr: Box::new(self.parse_unary()?),
                })
            }
            Some(TokenKind::Plus) => {
                self.advance();
                Ok(ExprNode::Unary {
                        op: UnaryOp::Pos,
                        expr: Box::new(self.parse_unary()?),
                })
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<ExprNode, ParseError> {
        let tok = self.peek().ok_or(ParseError::UnexpectedEnd)?.clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                let n: f64 = tok
                .text
                .parse()
                .map_err(|_| ParseError::UnexpectedToken {
                        found: tok.text.clone(),
                        pos: tok.pos,
                })?;
                Ok(ExprNode::Number(n))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.parse_arg_list(TokenKind::RBracket)?;
                Ok(ExprNode::Array(items))
            }
            TokenKind::Ident => {
                self.advance();
                if matches!(self.peek().map(|t| t.kind), Some(TokenKind::LParen)) {
                    self.advance();
                    let args = self.parse_arg_list(TokenKind::RParen)?;
                    Ok(ExprNode::Call {
                            name: tok.text,
                            args,
                    })
                } else {
                    Ok(ExprNode::Var(tok.text))
                }
            }
            _ => Err(ParseError::UnexpectedToken {
                    found: tok.text,
                    pos: tok.pos,
            }),
        }
    }

    fn parse_arg_list(&mut self, close: TokenKind) -> Result<Vec<ExprNode>, ParseError> {
        let mut args = Vec::new();
        if self.peek().map(|t| t.kind) == Some(close) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.peek().map(|t| t.kind) {
                Some(TokenKind::Comma) => {
                    self.advance();
                }
                Some(k) if k == close => {
                    self.advance();
                    break;
                }
                _ => {
                    let pos = self.peek().map(|t| t.pos).unwrap_or(0);
                    return Err(ParseError::UnexpectedToken {
                            found: self
                            .peek()
                            .map(|t| t.text.clone())
                            .unwrap_or_else(|| "<eof>".into()),
                            pos,
                    });
                }
            }
        }
        Ok(args)
    }
}
