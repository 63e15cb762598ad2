//! Tokenizer for the sandboxed arithmetic formula grammar.
//!
//! Runs the safety whitelist first, then segments the expression into a
//! flat token stream the parser consumes. Tokens are deliberately coarse —
//! there is no need for a token/sub-type matrix like a spreadsheet
//! tokenizer's, since this grammar has no ranges, arrays-of-arrays, or
//! error literals.

use crate::safety::{self, SafetyViolation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    Ident,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenizerError {
    Safety(SafetyViolation),
    UnexpectedChar(char, usize),
    MalformedNumber(String, usize),
}

impl std::fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenizerError::Safety(v) => write!(f, "{v}"),
            TokenizerError::UnexpectedChar(c, pos) => {
                write!(f, "unexpected character '{c}' at position {pos}")
            }
            TokenizerError::MalformedNumber(s, pos) => {
                write!(f, "malformed number '{s}' at position {pos}")
            }
        }
    }
}
impl std::error::Error for TokenizerError {}

pub fn tokenize(source: &str) -> Result<Vec<Token>, TokenizerError> {
    safety::check_whitelist(source).map_err(TokenizerError::Safety)?;

    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' => i += 1,
            '+' => {
                tokens.push(Token {
                        kind: TokenKind::Plus,
                        text: "+".into(),
                        pos: i,
                });
                i += 1;
            }
            '-' => {
                tokens.push(Token {
                        kind: TokenKind::Minus,
                        text: "-".into(),
                        pos: i,
                });
                i += 1;
            }
            '*' => {
                tokens.push(Token {
                        kind: TokenKind::Star,
                        text: "*".into(),
                        pos: i,
                });
                i += 1;
            }
            '/' => {
                tokens.push(Token {
                        kind: TokenKind::Slash,
                        text: "/".into(),
                        pos: i,
                });
                i += 1;
            }
            '(' => {
                tokens.push(Token {
                        kind: TokenKind::LParen,
                        text: "(".into(),
                        pos: i,
                });
                i += 1;
            }
            ')' => {
                tokens.push(Token {
                        kind: TokenKind::RParen,
                        text: ")".into(),
                        pos: i,
                });
                i += 1;
            }
            '[' => {
                tokens.push(Token {
                        kind: TokenKind::LBracket,
                        text: "[".into(),
                        pos: i,
                });
                i += 1;
            }
            ']' => {
                tokens.push(Token {
                        kind: TokenKind::RBracket,
                        text: "]".into(),
                        pos: i,
                });
                i += 1;
            }
            ',' => {
                tokens.push(Token {
                        kind: TokenKind::Comma,
                        text: ",".into(),
                        pos: i,
                });
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                let mut saw_dot = c == '.';
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    if chars[i] == '.' {
                        if saw_dot {
                            break;
                        }
                        saw_dot = true;
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if text.parse::<f64>().is_err() {
                    return Err(TokenizerError::MalformedNumber(text, start));
                }
                tokens.push(Token {
                        kind: TokenKind::Number,
                        text,
                        pos: start,
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if safety::is_banned_identifier(&text) {
                    return Err(TokenizerError::Safety(SafetyViolation::BannedIdentifier(
                                text)));
                }
                tokens.push(Token {
                        kind: TokenKind::Ident,
                        text,
                        pos: start,
                });
            }
            other => return Err(TokenizerError::UnexpectedChar(other, i)),
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_arithmetic() {
        let toks = tokenize("abs(x - 2.5) * (y + 1)").unwrap();
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::Minus,
                TokenKind::Number,
                TokenKind::RParen,
                TokenKind::Star,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn rejects_banned_identifier_token() {
        let err = tokenize("process + 1").unwrap_err();
        assert!(matches!(
                err,
                TokenizerError::Safety(SafetyViolation::BannedIdentifier(_))
        ));
    }

    #[test]
    fn rejects_malformed_number() {
        assert!(tokenize("1.2.3").is_err());
    }
}
