use anyhow::{anyhow, Result};

use super::token::{Token, TokenType};

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenNode {
    /// Reference to the input at this index.
    Input(usize),
    /// `add` or `mul` applied to two sub-expressions.
    Op {
        kind: TokenType,
        left: Box<TokenNode>,
        right: Box<TokenNode>,
    },
}

impl TokenNode {
    /// Input index for leaves, negated token type code for operators.
    pub fn num_index(&self) -> i32 {
        match self {
            TokenNode::Input(index) => *index as i32,
            TokenNode::Op { kind, .. } => -kind.code(),
        }
    }

    fn postorder(&self, out: &mut Vec<RpnItem>) {
        match self {
            TokenNode::Input(index) => out.push(RpnItem::Input(*index)),
            TokenNode::Op { kind, left, right } => {
                left.postorder(out);
                right.postorder(out);
                out.push(match kind {
                    TokenType::Mul => RpnItem::Mul,
                    _ => RpnItem::Add,
                });
            }
        }
    }
}

/// One step of a postorder evaluation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpnItem {
    Input(usize),
    Add,
    Mul,
}

impl RpnItem {
    /// Input index for inputs, negated token type code for operators.
    pub fn num_index(self) -> i32 {
        match self {
            RpnItem::Input(index) => index as i32,
            RpnItem::Add => -TokenType::Add.code(),
            RpnItem::Mul => -TokenType::Mul.code(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpressionParser {
    statement: String,
    tokens: Vec<Token>,
    token_strs: Vec<String>,
}

impl ExpressionParser {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            tokens: Vec::new(),
            token_strs: Vec::new(),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn token_strs(&self) -> &[String] {
        &self.token_strs
    }

    /// Statement with whitespace removed once tokenized.
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Split the statement into tokens.
    ///
    /// A no-op when tokens already exist unless `retoken` is set.
    pub fn tokenize(&mut self, retoken: bool) -> Result<()> {
        if !retoken && !self.tokens.is_empty() {
            return Ok(());
        }
        self.tokens.clear();
        self.token_strs.clear();
        self.statement.retain(|c| !c.is_whitespace());
        if self.statement.is_empty() {
            return Err(anyhow!("expression statement is empty"));
        }

        let bytes = self.statement.as_bytes();
        let mut i = 0usize;
        while i < bytes.len() {
            let (kind, end) = match bytes[i] {
                b'a' => (TokenType::Add, self.expect_word(i, "add")?),
                b'm' => (TokenType::Mul, self.expect_word(i, "mul")?),
                b'@' => {
                    let mut j = i + 1;
                    while j < bytes.len() && bytes[j].is_ascii_digit() {
                        j += 1;
                    }
                    if j == i + 1 {
                        return Err(anyhow!(
                            "expected digits after '@' at position {} in {}",
                            i,
                            self.statement
                        ));
                    }
                    (TokenType::InputNumber, j)
                }
                b',' => (TokenType::Comma, i + 1),
                b'(' => (TokenType::LeftBracket, i + 1),
                b')' => (TokenType::RightBracket, i + 1),
                _ => {
                    let c = self.statement[i..].chars().next().unwrap_or('?');
                    return Err(anyhow!(
                        "illegal character '{}' at position {} in {}",
                        c,
                        i,
                        self.statement
                    ));
                }
            };
            self.tokens.push(Token::new(kind, i, end));
            self.token_strs.push(self.statement[i..end].to_string());
            i = end;
        }
        Ok(())
    }

    fn expect_word(&self, start: usize, word: &str) -> Result<usize> {
        let end = start + word.len();
        if self.statement.get(start..end) == Some(word) {
            Ok(end)
        } else {
            Err(anyhow!(
                "expected '{}' at position {} in {}",
                word,
                start,
                self.statement
            ))
        }
    }

    /// Parse the token stream into a tree rooted at the first token.
    pub fn parse(&mut self) -> Result<TokenNode> {
        self.tokenize(false)?;
        let mut index = 0usize;
        let root = self.parse_node(&mut index)?;
        if index + 1 != self.tokens.len() {
            return Err(anyhow!(
                "unexpected trailing tokens after position {} in {}",
                index,
                self.statement
            ));
        }
        Ok(root)
    }

    /// Parse and linearize into postorder (operands before operators).
    pub fn generate(&mut self) -> Result<Vec<RpnItem>> {
        let root = self.parse()?;
        let mut nodes = Vec::new();
        root.postorder(&mut nodes);
        crate::trace!(
            "expression {} -> {:?}",
            self.statement,
            nodes.iter().map(|node| node.num_index()).collect::<Vec<_>>()
        );
        Ok(nodes)
    }

    fn token_at(&self, index: usize) -> Result<Token> {
        self.tokens
            .get(index)
            .copied()
            .ok_or_else(|| anyhow!("expression {} ends unexpectedly", self.statement))
    }

    fn expect(&self, index: usize, kind: TokenType) -> Result<()> {
        let token = self.token_at(index)?;
        if token.kind != kind {
            return Err(anyhow!(
                "expected {:?} at token {} in {}, found {:?}",
                kind,
                index,
                self.statement,
                token.kind
            ));
        }
        Ok(())
    }

    fn parse_node(&self, index: &mut usize) -> Result<TokenNode> {
        let token = self.token_at(*index)?;
        match token.kind {
            TokenType::InputNumber => {
                let digits = &self.statement[token.start + 1..token.end];
                let value = digits
                    .parse::<usize>()
                    .map_err(|err| anyhow!("invalid input index {}: {}", digits, err))?;
                Ok(TokenNode::Input(value))
            }
            TokenType::Add | TokenType::Mul => {
                *index += 1;
                self.expect(*index, TokenType::LeftBracket)?;
                *index += 1;
                let left = self.parse_operand(index)?;
                *index += 1;
                self.expect(*index, TokenType::Comma)?;
                *index += 1;
                let right = self.parse_operand(index)?;
                *index += 1;
                self.expect(*index, TokenType::RightBracket)?;
                Ok(TokenNode::Op {
                    kind: token.kind,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            other => Err(anyhow!(
                "unexpected {:?} at token {} in {}",
                other,
                index,
                self.statement
            )),
        }
    }

    fn parse_operand(&self, index: &mut usize) -> Result<TokenNode> {
        let token = self.token_at(*index)?;
        if !token.kind.starts_expr() {
            return Err(anyhow!(
                "unknown token type {} at token {} in {}",
                token.kind.code(),
                index,
                self.statement
            ));
        }
        self.parse_node(index)
    }
}
