use anyhow::Result;
use rayon::prelude::*;

use crate::graph::RuntimeOperator;
use crate::ops::{check_batch, prepare_output, InferStatus, Layer};
use crate::tensor::Tensor;

/// Softmax across every element of a batch item, shifted by the maximum.
#[derive(Debug, Clone, Default)]
pub struct SoftmaxLayer;

impl SoftmaxLayer {
    pub fn new() -> Self {
        Self
    }

    pub fn create(_op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        Ok(Box::new(Self::new()))
    }

    fn forward_item(&self, input: &Tensor, slot: &mut Option<Tensor>) -> Result<(), InferStatus> {
        let output = prepare_output(self.layer_name(), slot, input.shapes())?;
        let max = input.data().iter().copied().fold(f32::MIN, f32::max);
        let mut sum = 0.0f32;
        for (dst, x) in output.data_mut().iter_mut().zip(input.data()) {
            *dst = (x - max).exp();
            sum += *dst;
        }
        output.data_mut().iter_mut().for_each(|v| *v /= sum);
        Ok(())
    }
}

impl Layer for SoftmaxLayer {
    fn layer_name(&self) -> &str {
        "Softmax"
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        check_batch(self.layer_name(), inputs, outputs)?;
        inputs
            .par_iter()
            .zip(outputs.par_iter_mut())
            .try_for_each(|(input, slot)| self.forward_item(input, slot))
    }
}
