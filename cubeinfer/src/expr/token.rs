use serde::{Deserialize, Serialize};

/// Lexical class of a token. Discriminants are stable and appear negated in
/// internal [`super::TokenNode`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    InputNumber = 0,
    Comma = 1,
    Add = 2,
    Mul = 3,
    LeftBracket = 4,
    RightBracket = 5,
}

impl TokenType {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Whether the token can start an expression.
    pub fn starts_expr(self) -> bool {
        matches!(self, TokenType::InputNumber | TokenType::Add | TokenType::Mul)
    }
}

/// A token spanning `start..end` of the whitespace-free statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenType,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(kind: TokenType, start: usize, end: usize) -> Self {
        Self { kind, start, end }
    }
}
