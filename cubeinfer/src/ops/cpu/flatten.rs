use anyhow::{anyhow, Result};

use crate::graph::RuntimeOperator;
use crate::ops::{check_batch, store_output, InferStatus, Layer, ParseStatus};
use crate::tensor::Tensor;

use super::int_param;

/// Axis runs a three-axis raw shape can collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlattenRange {
    /// `(c, r, w)` to `[c * r * w]`.
    All,
    /// `(c, r, w)` to `[c, r * w]`.
    Plane,
    /// `(c, r, w)` to `[c * r, w]`.
    Leading,
}

/// `torch.flatten` over NCHW dims with the batch axis excluded.
#[derive(Debug, Clone)]
pub struct FlattenLayer {
    range: FlattenRange,
}

impl FlattenLayer {
    /// Dims are numbered against NCHW; negative values count from the end.
    pub fn new(start_dim: i32, end_dim: i32) -> Result<Self> {
        let normalize = |dim: i32| (if dim < 0 { dim + 4 } else { dim }) - 1;
        let (start, end) = (normalize(start_dim), normalize(end_dim));
        let range = match (start, end) {
            (0, 2) => FlattenRange::All,
            (1, 2) => FlattenRange::Plane,
            (0, 1) => FlattenRange::Leading,
            _ => {
                return Err(anyhow!(
                    "flatten cannot collapse dims {}..{}",
                    start_dim,
                    end_dim
                ))
            }
        };
        Ok(Self { range })
    }

    pub fn create(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let start_dim = int_param(op, "start_dim", ParseStatus::MissingDim)?;
        let end_dim = int_param(op, "end_dim", ParseStatus::MissingDim)?;
        Ok(Box::new(Self::new(start_dim, end_dim)?))
    }
}

impl Layer for FlattenLayer {
    fn layer_name(&self) -> &str {
        "Flatten"
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        check_batch(self.layer_name(), inputs, outputs)?;
        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            let [channels, rows, cols] = input.shapes();
            let mut output = (*input).clone();
            match self.range {
                FlattenRange::All => output.flatten(),
                FlattenRange::Plane => output.reshape(&[channels, rows * cols]),
                FlattenRange::Leading => output.reshape(&[channels * rows, cols]),
            }
            store_output(self.layer_name(), slot, output)?;
        }
        Ok(())
    }
}
