//! Grouped, strided 2-D convolution lowered to im2col + GEMM.
use anyhow::{anyhow, Result};
use rayon::prelude::*;

use crate::graph::RuntimeOperator;
use crate::ops::{check_batch, prepare_output, InferStatus, Layer, ParamLayer, ParseStatus};
use crate::tensor::Tensor;

use super::gemm::gemm_nt;
use super::{attribute, bool_param, int_array_param, int_param, to_positive, to_usize};

#[derive(Debug, Clone)]
pub struct ConvolutionLayer {
    params: ParamLayer,
    use_bias: bool,
    padding_h: usize,
    padding_w: usize,
    stride_h: usize,
    stride_w: usize,
    groups: usize,
}

/// Geometry of one convolution call.
struct ConvShape {
    in_rows: usize,
    kernel_h: usize,
    kernel_w: usize,
    out_h: usize,
    out_w: usize,
    channels_per_group: usize,
    kernels_per_group: usize,
}

impl ConvolutionLayer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        out_channels: usize,
        in_channels: usize,
        kernel_h: usize,
        kernel_w: usize,
        padding_h: usize,
        padding_w: usize,
        stride_h: usize,
        stride_w: usize,
        groups: usize,
        use_bias: bool,
    ) -> Result<Self> {
        if groups == 0 || in_channels % groups != 0 {
            return Err(anyhow!(
                "groups {} must divide input channels {}",
                groups,
                in_channels
            ));
        }
        let weights = (0..out_channels)
            .map(|_| Tensor::new(in_channels / groups, kernel_h, kernel_w))
            .collect();
        let bias = if use_bias {
            (0..out_channels).map(|_| Tensor::new(1, 1, 1)).collect()
        } else {
            Vec::new()
        };
        Ok(Self {
            params: ParamLayer::new(weights, bias),
            use_bias,
            padding_h,
            padding_w,
            stride_h,
            stride_w,
            groups,
        })
    }

    pub fn create(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let in_channels = int_param(op, "in_channels", ParseStatus::MissingInChannel)?;
        let out_channels = int_param(op, "out_channels", ParseStatus::MissingOutChannel)?;
        let padding = int_array_param(op, "padding", Some(2), ParseStatus::MissingPadding)?;
        let use_bias = bool_param(op, "bias", ParseStatus::MissingUseBias)?;
        let stride = int_array_param(op, "stride", Some(2), ParseStatus::MissingStride)?;
        let kernel = int_array_param(op, "kernel_size", Some(2), ParseStatus::MissingKernel)?;
        let groups = int_param(op, "groups", ParseStatus::MissingGroups)?;

        let mut layer = Self::new(
            to_positive(out_channels, "out_channels")?,
            to_positive(in_channels, "in_channels")?,
            to_positive(kernel[0], "kernel_size")?,
            to_positive(kernel[1], "kernel_size")?,
            to_usize(padding[0], "padding")?,
            to_usize(padding[1], "padding")?,
            to_usize(stride[0], "stride")?,
            to_usize(stride[1], "stride")?,
            to_positive(groups, "groups")?,
            use_bias,
        )?;

        if use_bias {
            let bias = attribute(op, "bias", ParseStatus::AttrMissingBias)?;
            if bias.shape().first() != Some(&out_channels) {
                crate::error!("bias attribute of {} has shape {:?}", op.name, bias.shape());
                return Err(ParseStatus::AttrMissingBias.into());
            }
            layer.params.set_bias(&bias.get_f32())?;
        }

        let weight = attribute(op, "weight", ParseStatus::AttrMissingWeight)?;
        if weight.shape().is_empty() {
            crate::error!("weight attribute of {} has no shape", op.name);
            return Err(ParseStatus::AttrMissingWeight.into());
        }
        layer.params.set_weights(&weight.get_f32())?;
        Ok(Box::new(layer))
    }

    fn conv_shape(&self, input: &Tensor, weights: &[Tensor]) -> Result<ConvShape, InferStatus> {
        let [kernel_channels, kernel_h, kernel_w] = weights[0].shapes();
        let (in_channels, in_h, in_w) = (input.channels(), input.rows(), input.cols());
        if in_h < kernel_h || in_w < kernel_w {
            crate::error!(
                "convolution input {}x{} is smaller than kernel {}x{}",
                in_h,
                in_w,
                kernel_h,
                kernel_w
            );
            return Err(InferStatus::OutputSizeError);
        }
        let kernel_count = weights.len();
        if in_channels % self.groups != 0 || kernel_count % self.groups != 0 {
            crate::error!(
                "groups {} must divide input channels {} and kernels {}",
                self.groups,
                in_channels,
                kernel_count
            );
            return Err(InferStatus::ChannelParameterError);
        }
        let channels_per_group = in_channels / self.groups;
        if channels_per_group != kernel_channels {
            crate::error!(
                "kernel channels {} do not match input channels per group {}",
                kernel_channels,
                channels_per_group
            );
            return Err(InferStatus::ChannelParameterError);
        }
        Ok(ConvShape {
            in_rows: in_h,
            kernel_h,
            kernel_w,
            out_h: (in_h - kernel_h) / self.stride_h + 1,
            out_w: (in_w - kernel_w) / self.stride_w + 1,
            channels_per_group,
            kernels_per_group: kernel_count / self.groups,
        })
    }

    fn forward_item(&self, input: &Tensor, slot: &mut Option<Tensor>) -> Result<(), InferStatus> {
        let padded;
        let input = if self.padding_h > 0 || self.padding_w > 0 {
            let mut copy = input.clone();
            copy.padding(
                [self.padding_h, self.padding_h, self.padding_w, self.padding_w],
                0.0,
            );
            padded = copy;
            &padded
        } else {
            input
        };

        let weights = self.params.weights();
        let bias = self.params.bias();
        let shape = self.conv_shape(input, weights)?;
        let plane = shape.out_h * shape.out_w;
        let depth = shape.kernel_h * shape.kernel_w * shape.channels_per_group;
        let output = prepare_output(
            self.layer_name(),
            slot,
            [weights.len(), shape.out_h, shape.out_w],
        )?;

        for group in 0..self.groups {
            let patches = self.im2col(input, group * shape.channels_per_group, &shape);
            let group_kernels = &weights
                [group * shape.kernels_per_group..(group + 1) * shape.kernels_per_group];
            let packed: Vec<f32> = group_kernels
                .iter()
                .flat_map(|kernel| kernel.data().iter().copied())
                .collect();

            let start = group * shape.kernels_per_group * plane;
            let end = start + shape.kernels_per_group * plane;
            let out_group = &mut output.data_mut()[start..end];
            gemm_nt(&packed, &patches, depth, out_group);

            if self.use_bias {
                for (k, out_plane) in out_group.chunks_mut(plane).enumerate() {
                    let value = bias[group * shape.kernels_per_group + k].index(0);
                    out_plane.iter_mut().for_each(|v| *v += value);
                }
            }
        }
        Ok(())
    }

    /// Pack every sliding window of one channel group into a contiguous row.
    ///
    /// Windows are ordered column-major over the output plane; inside a
    /// window, channels are outermost and each kernel column is contiguous.
    fn im2col(&self, input: &Tensor, first_channel: usize, shape: &ConvShape) -> Vec<f32> {
        let depth = shape.kernel_h * shape.kernel_w * shape.channels_per_group;
        let mut patches = vec![0.0; depth * shape.out_h * shape.out_w];
        patches
            .par_chunks_mut(depth)
            .enumerate()
            .for_each(|(patch_index, patch)| {
                let out_col = patch_index / shape.out_h;
                let out_row = patch_index % shape.out_h;
                let row0 = out_row * self.stride_h;
                let col0 = out_col * self.stride_w;
                let mut offset = 0usize;
                for ic in 0..shape.channels_per_group {
                    let channel = input.channel(first_channel + ic);
                    for kw in 0..shape.kernel_w {
                        let start = (col0 + kw) * shape.in_rows + row0;
                        patch[offset..offset + shape.kernel_h]
                            .copy_from_slice(&channel[start..start + shape.kernel_h]);
                        offset += shape.kernel_h;
                    }
                }
            });
        patches
    }
}

impl Layer for ConvolutionLayer {
    fn layer_name(&self) -> &str {
        "Convolution"
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        check_batch(self.layer_name(), inputs, outputs)?;
        let weights = self.params.weights();
        if weights.is_empty() {
            crate::error!("convolution weights are empty");
            return Err(InferStatus::WeightParameterError);
        }
        if self.use_bias && self.params.bias().len() != weights.len() {
            crate::error!(
                "convolution has {} bias values for {} kernels",
                self.params.bias().len(),
                weights.len()
            );
            return Err(InferStatus::BiasParameterError);
        }
        if self.stride_h == 0 || self.stride_w == 0 {
            crate::error!("convolution stride must be positive");
            return Err(InferStatus::StrideParameterError);
        }

        inputs
            .par_iter()
            .zip(outputs.par_iter_mut())
            .try_for_each(|(input, slot)| self.forward_item(input, slot))
    }

    fn param_layer(&self) -> Option<&ParamLayer> {
        Some(&self.params)
    }

    fn param_layer_mut(&mut self) -> Option<&mut ParamLayer> {
        Some(&mut self.params)
    }
}
