use anyhow::Result;
use rayon::prelude::*;

use crate::graph::RuntimeOperator;
use crate::ops::{check_batch, prepare_output, InferStatus, Layer, ParseStatus};
use crate::tensor::Tensor;

use super::{int_array_param, to_usize};

/// Average pooling to a fixed output plane size.
///
/// Stride is `floor(input / output)` per axis and the window covers
/// `input - (output - 1) * stride` cells.
#[derive(Debug, Clone)]
pub struct AdaptiveAvgPoolingLayer {
    output_h: usize,
    output_w: usize,
}

impl AdaptiveAvgPoolingLayer {
    pub fn new(output_h: usize, output_w: usize) -> Self {
        Self { output_h, output_w }
    }

    pub fn create(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let output = int_array_param(op, "output_size", Some(2), ParseStatus::MissingOutHW)?;
        Ok(Box::new(Self::new(
            to_usize(output[0], "output_size")?,
            to_usize(output[1], "output_size")?,
        )))
    }

    fn forward_item(&self, input: &Tensor, slot: &mut Option<Tensor>) -> Result<(), InferStatus> {
        let (in_h, in_w) = (input.rows(), input.cols());
        let stride_h = in_h / self.output_h;
        let stride_w = in_w / self.output_w;
        if stride_h == 0 || stride_w == 0 {
            crate::error!(
                "adaptive pooling from {}x{} to {}x{} has no stride",
                in_h,
                in_w,
                self.output_h,
                self.output_w
            );
            return Err(InferStatus::StrideParameterError);
        }
        let window_h = in_h - (self.output_h - 1) * stride_h;
        let window_w = in_w - (self.output_w - 1) * stride_w;
        let output = prepare_output(
            self.layer_name(),
            slot,
            [input.channels(), self.output_h, self.output_w],
        )?;

        let area = (window_h * window_w) as f32;
        for channel in 0..input.channels() {
            let src = input.channel(channel);
            let dst = output.channel_mut(channel);
            for oc in 0..self.output_w {
                for or in 0..self.output_h {
                    let (r0, c0) = (or * stride_h, oc * stride_w);
                    let mut sum = 0.0f32;
                    for c in c0..c0 + window_w {
                        sum += src[c * in_h + r0..c * in_h + r0 + window_h].iter().sum::<f32>();
                    }
                    dst[oc * self.output_h + or] = sum / area;
                }
            }
        }
        Ok(())
    }
}

impl Layer for AdaptiveAvgPoolingLayer {
    fn layer_name(&self) -> &str {
        "AdaptiveAvgPooling"
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        check_batch(self.layer_name(), inputs, outputs)?;
        if self.output_h == 0 || self.output_w == 0 {
            crate::error!("adaptive pooling output size must be positive");
            return Err(InferStatus::OutputSizeError);
        }
        inputs
            .par_iter()
            .zip(outputs.par_iter_mut())
            .try_for_each(|(input, slot)| self.forward_item(input, slot))
    }
}
