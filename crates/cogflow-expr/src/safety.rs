//! The expression-sandbox safety policy.
//!
//! Two independent checks run *before* tokenizing proceeds any further than
//! necessary: a character whitelist, and a banned-identifier check. Either
//! one failing rejects the expression outright; neither ever executes any
//! part of the expression.

/// `[A-Za-z0-9_ +\-*/.,\[\]]` —.
pub fn is_whitelisted_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
    || matches!(
        c,
        '_' | ' ' | '+' | '-' | '*' | '/' | '(' | ')' | '.' | ',' | '[' | ']'
    )
}

/// Banned identifiers: `eval`, `exec`, `import`, `require`,
/// `process`, `fs`. Matched case-insensitively against whole identifier
/// tokens, not substrings, so a variable like `filesystem_pressure` is not
/// falsely rejected while `fs` alone still is.
pub const BANNED_IDENTIFIERS: &[&str] = &["eval", "exec", "import", "require", "process", "fs"];

pub fn is_banned_identifier(ident: &str) -> bool {
    let lower = ident.to_ascii_lowercase();
    BANNED_IDENTIFIERS.contains(&lower.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyViolation {
    IllegalCharacter(char, usize),
    BannedIdentifier(String),
}

impl std::fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SafetyViolation::IllegalCharacter(c, pos) => {
                write!(f, "illegal character '{c}' at position {pos}")
            }
            SafetyViolation::BannedIdentifier(name) => {
                write!(f, "unsafe identifier '{name}' is not permitted")
            }
        }
    }
}

/// Character-level pass. Identifier-level banning happens during
/// tokenizing, where tokens are already segmented (see `tokenizer.rs`).
pub fn check_whitelist(source: &str) -> Result<(), SafetyViolation> {
    for (pos, c) in source.chars().enumerate() {
        if !is_whitelisted_char(c) {
            return Err(SafetyViolation::IllegalCharacter(c, pos));
        }
    }
    Ok(())
}
