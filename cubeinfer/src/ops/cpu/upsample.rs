use anyhow::{anyhow, Result};
use rayon::prelude::*;

use crate::graph::RuntimeOperator;
use crate::ops::{check_batch, prepare_output, InferStatus, Layer, ParseStatus};
use crate::tensor::Tensor;

/// Largest accepted scale factor per axis.
const MAX_SCALE_FACTOR: f32 = 4096.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpSampleMode {
    Nearest,
}

/// `nn.Upsample` with nearest-neighbour sampling.
#[derive(Debug, Clone)]
pub struct UpSampleLayer {
    scale_h: f32,
    scale_w: f32,
    mode: UpSampleMode,
}

impl UpSampleLayer {
    pub fn new(scale_h: f32, scale_w: f32, mode: UpSampleMode) -> Result<Self> {
        let valid = |scale: f32| scale > 0.0 && scale <= MAX_SCALE_FACTOR;
        if !(valid(scale_h) && valid(scale_w)) {
            return Err(anyhow!(
                "upsample scale factors must lie in (0, {}], got {} and {}",
                MAX_SCALE_FACTOR,
                scale_h,
                scale_w
            ));
        }
        Ok(Self {
            scale_h,
            scale_w,
            mode,
        })
    }

    pub fn create(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let scale = op
            .param("scale_factor")
            .and_then(|p| p.as_float_array())
            .filter(|scale| scale.len() == 2)
            .ok_or(ParseStatus::MissingScale)?;
        let mode = match op.param("mode").and_then(|p| p.as_str()) {
            Some("nearest") => UpSampleMode::Nearest,
            other => {
                crate::error!("upsample {} has unsupported mode {:?}", op.name, other);
                return Err(ParseStatus::MissingResizeMode.into());
            }
        };
        Ok(Box::new(Self::new(scale[0], scale[1], mode)?))
    }

    fn forward_item(&self, input: &Tensor, slot: &mut Option<Tensor>) -> Result<(), InferStatus> {
        let (Some(out_h), Some(out_w)) = (
            scaled_len(input.rows(), self.scale_h),
            scaled_len(input.cols(), self.scale_w),
        ) else {
            crate::error!(
                "upsample of {}x{} by {}x{} has no valid output size",
                input.rows(),
                input.cols(),
                self.scale_h,
                self.scale_w
            );
            return Err(InferStatus::OutputSizeError);
        };
        let output = prepare_output(self.layer_name(), slot, [input.channels(), out_h, out_w])?;
        let nearest = |dst: usize, scale: f32, len: usize| ((dst as f32 / scale) as usize).min(len - 1);
        match self.mode {
            UpSampleMode::Nearest => {
                for channel in 0..input.channels() {
                    let src = input.channel(channel);
                    let dst = output.channel_mut(channel);
                    for col in 0..out_w {
                        let src_col = nearest(col, self.scale_w, input.cols());
                        for row in 0..out_h {
                            let src_row = nearest(row, self.scale_h, input.rows());
                            dst[col * out_h + row] = src[src_col * input.rows() + src_row];
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// `floor(len * scale)`, or `None` when it is empty or not addressable.
fn scaled_len(len: usize, scale: f32) -> Option<usize> {
    let scaled = (len as f64 * f64::from(scale)).floor();
    if scaled >= 1.0 && scaled < u32::MAX as f64 {
        Some(scaled as usize)
    } else {
        None
    }
}

impl Layer for UpSampleLayer {
    fn layer_name(&self) -> &str {
        "UpSample"
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        check_batch(self.layer_name(), inputs, outputs)?;
        inputs
            .par_iter()
            .zip(outputs.par_iter_mut())
            .try_for_each(|(input, slot)| self.forward_item(input, slot))
    }
}
