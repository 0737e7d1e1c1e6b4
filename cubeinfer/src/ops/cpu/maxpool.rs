use anyhow::Result;
use rayon::prelude::*;

use crate::graph::RuntimeOperator;
use crate::ops::{check_batch, prepare_output, InferStatus, Layer, ParseStatus};
use crate::tensor::Tensor;

use super::{int_array_param, to_positive, to_usize};

/// Fixed-window max pooling with explicit padding.
#[derive(Debug, Clone)]
pub struct MaxPoolingLayer {
    padding_h: usize,
    padding_w: usize,
    pool_h: usize,
    pool_w: usize,
    stride_h: usize,
    stride_w: usize,
}

impl MaxPoolingLayer {
    pub fn new(
        padding: (usize, usize),
        pool_size: (usize, usize),
        stride: (usize, usize),
    ) -> Self {
        Self {
            padding_h: padding.0,
            padding_w: padding.1,
            pool_h: pool_size.0,
            pool_w: pool_size.1,
            stride_h: stride.0,
            stride_w: stride.1,
        }
    }

    pub fn create(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let stride = int_array_param(op, "stride", Some(2), ParseStatus::MissingStride)?;
        let padding = int_array_param(op, "padding", Some(2), ParseStatus::MissingPadding)?;
        let kernel = int_array_param(op, "kernel_size", Some(2), ParseStatus::MissingKernel)?;
        Ok(Box::new(Self::new(
            (to_usize(padding[0], "padding")?, to_usize(padding[1], "padding")?),
            (to_positive(kernel[0], "kernel_size")?, to_positive(kernel[1], "kernel_size")?),
            (to_usize(stride[0], "stride")?, to_usize(stride[1], "stride")?),
        )))
    }

    fn forward_item(&self, input: &Tensor, slot: &mut Option<Tensor>) -> Result<(), InferStatus> {
        let padded;
        let input = if self.padding_h > 0 || self.padding_w > 0 {
            let mut copy = input.clone();
            copy.padding(
                [self.padding_h, self.padding_h, self.padding_w, self.padding_w],
                f32::MIN,
            );
            padded = copy;
            &padded
        } else {
            input
        };
        let (in_h, in_w) = (input.rows(), input.cols());
        if in_h < self.pool_h || in_w < self.pool_w {
            crate::error!(
                "max pooling input {}x{} is smaller than window {}x{}",
                in_h,
                in_w,
                self.pool_h,
                self.pool_w
            );
            return Err(InferStatus::OutputSizeError);
        }
        let out_h = (in_h - self.pool_h) / self.stride_h + 1;
        let out_w = (in_w - self.pool_w) / self.stride_w + 1;
        let output = prepare_output(self.layer_name(), slot, [input.channels(), out_h, out_w])?;

        for channel in 0..input.channels() {
            let src = input.channel(channel);
            let dst = output.channel_mut(channel);
            for oc in 0..out_w {
                for or in 0..out_h {
                    let (r0, c0) = (or * self.stride_h, oc * self.stride_w);
                    let mut max = f32::MIN;
                    for c in c0..c0 + self.pool_w {
                        let column = &src[c * in_h + r0..c * in_h + r0 + self.pool_h];
                        max = column.iter().copied().fold(max, f32::max);
                    }
                    dst[oc * out_h + or] = max;
                }
            }
        }
        Ok(())
    }
}

impl Layer for MaxPoolingLayer {
    fn layer_name(&self) -> &str {
        "MaxPooling"
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        check_batch(self.layer_name(), inputs, outputs)?;
        if self.stride_h == 0 || self.stride_w == 0 {
            crate::error!("max pooling stride must be positive");
            return Err(InferStatus::StrideParameterError);
        }
        inputs
            .par_iter()
            .zip(outputs.par_iter_mut())
            .try_for_each(|(input, slot)| self.forward_item(input, slot))
    }
}
