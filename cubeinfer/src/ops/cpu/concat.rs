use anyhow::Result;

use crate::graph::RuntimeOperator;
use crate::ops::{prepare_output, InferStatus, Layer, ParseStatus};
use crate::tensor::Tensor;

use super::int_param;

/// `torch.cat` along the channel axis.
///
/// Inputs arrive grouped by operand, one tensor per batch item. Output `i`
/// stacks inputs `i, i + batch, i + 2 * batch, ...` in that order.
#[derive(Debug, Clone)]
pub struct CatLayer {
    dim: i32,
}

impl CatLayer {
    pub fn new(dim: i32) -> Self {
        Self { dim }
    }

    pub fn create(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let dim = int_param(op, "dim", ParseStatus::MissingDim)?;
        Ok(Box::new(Self::new(dim)))
    }
}

impl Layer for CatLayer {
    fn layer_name(&self) -> &str {
        "Concat"
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        if inputs.is_empty() {
            crate::error!("the input tensors of concat layer are empty");
            return Err(InferStatus::InputEmpty);
        }
        if outputs.is_empty() || inputs.len() == outputs.len() || inputs.len() % outputs.len() != 0 {
            crate::error!(
                "concat cannot group {} inputs into {} outputs",
                inputs.len(),
                outputs.len()
            );
            return Err(InferStatus::InputOutSizeAdaptingError);
        }
        if self.dim != 1 && self.dim != -3 {
            crate::error!("concat only supports the channel axis, got dim {}", self.dim);
            return Err(InferStatus::DimensionParameterError);
        }

        let batch = outputs.len();
        for (i, slot) in outputs.iter_mut().enumerate() {
            let group: Vec<&Tensor> = inputs.iter().skip(i).step_by(batch).copied().collect();
            let (rows, cols) = (group[0].rows(), group[0].cols());
            if group.iter().any(|t| t.rows() != rows || t.cols() != cols) {
                crate::error!("concat inputs of output {} differ in plane size", i);
                return Err(InferStatus::OutputSizeError);
            }
            let channels = group.iter().map(|t| t.channels()).sum();
            let output = prepare_output(self.layer_name(), slot, [channels, rows, cols])?;
            let mut offset = 0usize;
            for input in group {
                let len = input.size();
                output.data_mut()[offset..offset + len].copy_from_slice(input.data());
                offset += len;
            }
        }
        Ok(())
    }
}
