use anyhow::{anyhow, Result};

use crate::graph::RuntimeOperator;
use crate::ops::{check_batch, store_output, InferStatus, Layer, ParseStatus};
use crate::tensor::{infer_wildcard, Tensor};

use super::int_array_param;

/// `Tensor.view` / `Tensor.reshape`: row-major reinterpretation of each item.
///
/// The first target dim is the batch and is not materialized. One `-1`
/// may stand for the remaining element count.
#[derive(Debug, Clone)]
pub struct ViewLayer {
    shapes: Vec<i64>,
}

impl ViewLayer {
    pub fn new(shapes: Vec<i64>) -> Result<Self> {
        if !(2..=4).contains(&shapes.len()) {
            return Err(anyhow!("view expects 2 to 4 target dims, got {:?}", shapes));
        }
        if shapes.iter().filter(|&&d| d == -1).count() > 1 {
            return Err(anyhow!("view allows a single -1 dim, got {:?}", shapes));
        }
        Ok(Self { shapes })
    }

    pub fn create(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let shape = int_array_param(op, "shape", None, ParseStatus::MissingShape)?;
        let shapes = shape.iter().map(|&d| i64::from(d)).collect();
        Ok(Box::new(Self::new(shapes)?))
    }
}

impl Layer for ViewLayer {
    fn layer_name(&self) -> &str {
        "View"
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        check_batch(self.layer_name(), inputs, outputs)?;
        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            let Some(dims) = infer_wildcard(&self.shapes[1..], input.size()) else {
                crate::error!(
                    "view target {:?} does not fit {} elements",
                    self.shapes,
                    input.size()
                );
                return Err(InferStatus::DimensionParameterError);
            };
            let mut output = (*input).clone();
            output.view(&dims);
            store_output(self.layer_name(), slot, output)?;
        }
        Ok(())
    }
}
