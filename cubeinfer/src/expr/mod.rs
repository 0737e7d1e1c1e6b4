//! Fused elementwise expressions such as `add(@0,mul(@1,@2))`.
//!
//! The grammar is `expr := '@' digits | ident '(' expr ',' expr ')'` with
//! `ident` one of `add` or `mul`. [`ExpressionParser`] tokenizes a statement,
//! builds a [`TokenNode`] tree and linearizes it in postorder, the order the
//! expression layer evaluates in.
mod parser;
mod token;

pub use parser::{ExpressionParser, RpnItem, TokenNode};
pub use token::{Token, TokenType};
