use anyhow::Result;
use rayon::prelude::*;

use crate::graph::RuntimeOperator;
use crate::ops::{check_batch, prepare_output, InferStatus, Layer, ParamLayer, ParseStatus};
use crate::tensor::Tensor;

use super::gemm::gemm_nt;
use super::{attribute, bool_param, to_positive};

/// Fully connected layer: `W . X + b` for an `[in_features, n]` input.
#[derive(Debug, Clone)]
pub struct LinearLayer {
    params: ParamLayer,
    use_bias: bool,
    in_features: usize,
    out_features: usize,
}

impl LinearLayer {
    pub fn new(in_features: usize, out_features: usize, use_bias: bool) -> Self {
        let weights = vec![Tensor::new(1, out_features, in_features)];
        let bias = if use_bias {
            let mut bias = Tensor::new(1, out_features, 1);
            bias.reshape(&[out_features]);
            vec![bias]
        } else {
            Vec::new()
        };
        Self {
            params: ParamLayer::new(weights, bias),
            use_bias,
            in_features,
            out_features,
        }
    }

    pub fn create(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let use_bias = bool_param(op, "bias", ParseStatus::MissingUseBias)?;
        let weight = attribute(op, "weight", ParseStatus::AttrMissingWeight)?;
        let &[out_features, in_features] = weight.shape() else {
            crate::error!(
                "linear {} cannot read out_features from weight shape {:?}",
                op.name,
                weight.shape()
            );
            return Err(ParseStatus::AttrMissingOutFeatures.into());
        };
        let mut layer = Self::new(
            to_positive(in_features, "in_features")?,
            to_positive(out_features, "out_features")?,
            use_bias,
        );
        if use_bias {
            let bias = attribute(op, "bias", ParseStatus::AttrMissingBias)?;
            layer.params.set_bias(&bias.get_f32())?;
        }
        layer.params.set_weights(&weight.get_f32())?;
        Ok(Box::new(layer))
    }

    fn forward_item(
        &self,
        weight_rows: &[f32],
        input: &Tensor,
        slot: &mut Option<Tensor>,
    ) -> Result<(), InferStatus> {
        let &[features, n] = input.raw_shapes() else {
            crate::error!("linear expects a 2-D input, got {:?}", input.raw_shapes());
            return Err(InferStatus::DimensionParameterError);
        };
        if features != self.in_features {
            crate::error!(
                "linear expects {} input features, got {}",
                self.in_features,
                features
            );
            return Err(InferStatus::DimensionParameterError);
        }
        let output = prepare_output(self.layer_name(), slot, [1, self.out_features, n])?;
        // Input columns and output columns are both contiguous in the plane.
        gemm_nt(input.data(), weight_rows, self.in_features, output.data_mut());
        if self.use_bias {
            let bias = self.params.bias()[0].data();
            for column in output.data_mut().chunks_mut(self.out_features) {
                for (dst, b) in column.iter_mut().zip(bias) {
                    *dst += b;
                }
            }
        }
        Ok(())
    }
}

impl Layer for LinearLayer {
    fn layer_name(&self) -> &str {
        "Linear"
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        check_batch(self.layer_name(), inputs, outputs)?;
        let weights = self.params.weights();
        if weights.len() != 1 {
            crate::error!("linear expects one weight tensor, has {}", weights.len());
            return Err(InferStatus::WeightParameterError);
        }
        if self.use_bias && self.params.bias().len() != 1 {
            crate::error!("linear expects one bias tensor, has {}", self.params.bias().len());
            return Err(InferStatus::BiasParameterError);
        }
        let weight_rows = weights[0].values();
        inputs
            .par_iter()
            .zip(outputs.par_iter_mut())
            .try_for_each(|(input, slot)| self.forward_item(&weight_rows, input, slot))
    }

    fn param_layer(&self) -> Option<&ParamLayer> {
        Some(&self.params)
    }

    fn param_layer_mut(&mut self) -> Option<&mut ParamLayer> {
        Some(&mut self.params)
    }
}
