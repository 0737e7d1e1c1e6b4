use anyhow::Result;
use cubeinfer::{ExpressionParser, RpnItem, TokenNode, TokenType};

#[test]
fn tokenizer_emits_grammar_tokens() -> Result<()> {
    let mut parser = ExpressionParser::new("add(add(add(@0,@1),@1),add(@0,@2))");
    parser.tokenize(false)?;
    let expected = [
        "add", "(", "add", "(", "add", "(", "@0", ",", "@1", ")", ",", "@1", ")", ",", "add",
        "(", "@0", ",", "@2", ")", ")",
    ];
    assert_eq!(parser.token_strs(), &expected[..]);
    assert_eq!(parser.tokens()[0].kind, TokenType::Add);
    assert_eq!(parser.tokens()[6].kind, TokenType::InputNumber);
    Ok(())
}

#[test]
fn whitespace_is_stripped() -> Result<()> {
    let mut parser = ExpressionParser::new(" mul( @1 , @0 ) ");
    parser.tokenize(false)?;
    assert_eq!(parser.statement(), "mul(@1,@0)");
    assert_eq!(parser.token_strs().len(), 6);
    Ok(())
}

#[test]
fn retokenizing_is_idempotent() -> Result<()> {
    let mut parser = ExpressionParser::new("add(@0,@1)");
    parser.tokenize(false)?;
    let first = parser.token_strs().to_vec();
    parser.tokenize(false)?;
    parser.tokenize(true)?;
    assert_eq!(parser.token_strs(), first.as_slice());
    Ok(())
}

#[test]
fn generate_is_postorder() -> Result<()> {
    let mut parser = ExpressionParser::new("mul(@2,add(@0,@1))");
    let program = parser.generate()?;
    assert_eq!(
        program,
        vec![
            RpnItem::Input(2),
            RpnItem::Input(0),
            RpnItem::Input(1),
            RpnItem::Add,
            RpnItem::Mul,
        ]
    );
    Ok(())
}

#[test]
fn parse_builds_binary_tree() -> Result<()> {
    let mut parser = ExpressionParser::new("add(@3,@4)");
    match parser.parse()? {
        TokenNode::Op { kind, left, right } => {
            assert_eq!(kind, TokenType::Add);
            assert_eq!(*left, TokenNode::Input(3));
            assert_eq!(*right, TokenNode::Input(4));
        }
        other => panic!("expected an operator node, got {:?}", other),
    }
    Ok(())
}

#[test]
fn malformed_statements_fail() {
    for statement in ["", "sub(@0,@1)", "add(@0,@1", "add(@0 @1)", "@", "add(@0,@1))", "ad(@0,@1)"] {
        let mut parser = ExpressionParser::new(statement);
        assert!(parser.generate().is_err(), "{} should not parse", statement);
    }
}
