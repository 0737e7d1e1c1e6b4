use std::borrow::Cow;

use anyhow::Result;
use rayon::prelude::*;

use crate::expr::{ExpressionParser, RpnItem};
use crate::graph::RuntimeOperator;
use crate::ops::{store_output, InferStatus, Layer, ParseStatus};
use crate::tensor::{element_add, element_multiply, Tensor};

/// Fused elementwise arithmetic described by a `pnnx.Expression` statement.
///
/// `@i` refers to the i-th input operand; with a batch of `n`, its tensor
/// for item `b` is `inputs[i * n + b]`.
#[derive(Debug, Clone)]
pub struct ExpressionLayer {
    statement: String,
    program: Vec<RpnItem>,
}

impl ExpressionLayer {
    pub fn new(statement: &str) -> Result<Self> {
        let mut parser = ExpressionParser::new(statement);
        let program = parser.generate()?;
        Ok(Self {
            statement: parser.statement().to_string(),
            program,
        })
    }

    pub fn create(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let statement = op
            .param("expr")
            .and_then(|p| p.as_str())
            .ok_or(ParseStatus::MissingExpr)?;
        Ok(Box::new(Self::new(statement)?))
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    fn evaluate<'a>(&self, inputs: &[&'a Tensor], batch: usize, item: usize) -> Result<Tensor, InferStatus> {
        let mut stack: Vec<Cow<'a, Tensor>> = Vec::with_capacity(self.program.len());
        for step in &self.program {
            match *step {
                RpnItem::Input(index) => {
                    let Some(input) = inputs.get(index * batch + item) else {
                        crate::error!(
                            "expression {} refers to input {} but only {} operands arrived",
                            self.statement,
                            index,
                            inputs.len() / batch
                        );
                        return Err(InferStatus::InputOutSizeAdaptingError);
                    };
                    stack.push(Cow::Borrowed(*input));
                }
                RpnItem::Add | RpnItem::Mul => {
                    let (Some(rhs), Some(lhs)) = (stack.pop(), stack.pop()) else {
                        crate::error!("expression {} is missing an operand", self.statement);
                        return Err(InferStatus::OperationUnknown);
                    };
                    let value = if *step == RpnItem::Add {
                        element_add(&lhs, &rhs)
                    } else {
                        element_multiply(&lhs, &rhs)
                    };
                    stack.push(Cow::Owned(value));
                }
            }
        }
        match (stack.pop(), stack.is_empty()) {
            (Some(result), true) => Ok(result.into_owned()),
            _ => {
                crate::error!("expression {} does not reduce to one value", self.statement);
                Err(InferStatus::OperationUnknown)
            }
        }
    }
}

impl Layer for ExpressionLayer {
    fn layer_name(&self) -> &str {
        "Expression"
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        if inputs.is_empty() {
            crate::error!("the input tensors of expression layer are empty");
            return Err(InferStatus::InputEmpty);
        }
        let batch = outputs.len();
        if batch == 0 || inputs.len() % batch != 0 {
            crate::error!(
                "expression cannot split {} inputs into batches of {}",
                inputs.len(),
                batch
            );
            return Err(InferStatus::InputOutSizeAdaptingError);
        }
        outputs
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(item, slot)| {
                let result = self.evaluate(inputs, batch, item)?;
                store_output(self.layer_name(), slot, result)
            })
    }
}
