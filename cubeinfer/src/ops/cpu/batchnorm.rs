use anyhow::{anyhow, Result};
use rayon::prelude::*;

use crate::graph::RuntimeOperator;
use crate::ops::{check_batch, prepare_output, InferStatus, Layer, ParamLayer, ParseStatus};
use crate::tensor::Tensor;

use super::{attribute, float_param, int_param, to_positive};

/// Inference-time batch normalization over channel planes.
///
/// Running mean and variance live in the weight and bias slots of the
/// [`ParamLayer`] as one `1x1x1` tensor per channel.
#[derive(Debug, Clone)]
pub struct BatchNorm2dLayer {
    params: ParamLayer,
    affine_weight: Vec<f32>,
    affine_bias: Vec<f32>,
    eps: f32,
}

impl BatchNorm2dLayer {
    pub fn new(num_features: usize, eps: f32, affine_weight: Vec<f32>, affine_bias: Vec<f32>) -> Self {
        let stats = || (0..num_features).map(|_| Tensor::new(1, 1, 1)).collect();
        Self {
            params: ParamLayer::new(stats(), stats()),
            affine_weight,
            affine_bias,
            eps,
        }
    }

    pub fn create(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let eps = float_param(op, "eps", ParseStatus::MissingEps)?;
        let num_features = int_param(op, "num_features", ParseStatus::MissingNumFeatures)?;
        let mean = attribute(op, "running_mean", ParseStatus::AttrMissingRunningMean)?;
        let var = attribute(op, "running_var", ParseStatus::AttrMissingRunningVar)?;
        let affine_weight = attribute(op, "weight", ParseStatus::AttrMissingWeight)?;
        let affine_bias = attribute(op, "bias", ParseStatus::AttrMissingBias)?;

        let num_features = to_positive(num_features, "num_features")?;
        let affine_weight = affine_weight.get_f32();
        let affine_bias = affine_bias.get_f32();
        if affine_weight.len() != num_features || affine_bias.len() != num_features {
            return Err(anyhow!(
                "batchnorm {} expects {} affine values, got {} weights and {} bias",
                op.name,
                num_features,
                affine_weight.len(),
                affine_bias.len()
            ));
        }
        let mut layer = Self::new(num_features, eps, affine_weight, affine_bias);
        layer.params.set_weights(&mean.get_f32())?;
        layer.params.set_bias(&var.get_f32())?;
        Ok(Box::new(layer))
    }

    fn forward_item(&self, input: &Tensor, slot: &mut Option<Tensor>) -> Result<(), InferStatus> {
        let channels = self.params.weights().len();
        if input.channels() != channels || self.affine_weight.len() != channels {
            crate::error!(
                "batchnorm expects {} channels, input has {}",
                channels,
                input.channels()
            );
            return Err(InferStatus::ChannelParameterError);
        }
        let output = prepare_output(self.layer_name(), slot, input.shapes())?;
        for channel in 0..channels {
            let mean = self.params.weights()[channel].index(0);
            let var = self.params.bias()[channel].index(0);
            let std = (var + self.eps).sqrt();
            let (scale, shift) = (self.affine_weight[channel], self.affine_bias[channel]);
            for (dst, x) in output
                .channel_mut(channel)
                .iter_mut()
                .zip(input.channel(channel))
            {
                *dst = (x - mean) / std * scale + shift;
            }
        }
        Ok(())
    }
}

impl Layer for BatchNorm2dLayer {
    fn layer_name(&self) -> &str {
        "BatchNorm2d"
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        check_batch(self.layer_name(), inputs, outputs)?;
        if self.params.weights().len() != self.params.bias().len()
            || self.affine_weight.len() != self.affine_bias.len()
        {
            crate::error!("batchnorm statistics and affine parameters disagree in length");
            return Err(InferStatus::WeightParameterError);
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
