use anyhow::{anyhow, Result};

use crate::tensor::Tensor;

use super::status::InferStatus;

/// Compute kernel bound to one graph operator.
///
/// `inputs` and `outputs` hold one tensor per batch item (several groups of
/// them for multi-input layers). An empty output slot is allocated by the
/// layer; a filled slot must already have the expected shape.
pub trait Layer: Send + Sync {
    fn layer_name(&self) -> &str;

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>])
        -> Result<(), InferStatus>;

    /// Weight storage for parameterized layers.
    fn param_layer(&self) -> Option<&ParamLayer> {
        None
    }

    fn param_layer_mut(&mut self) -> Option<&mut ParamLayer> {
        None
    }

    fn weights(&self) -> Result<&[Tensor], InferStatus> {
        self.param_layer()
            .map(ParamLayer::weights)
            .ok_or(InferStatus::Unsupported("weights"))
    }

    fn bias(&self) -> Result<&[Tensor], InferStatus> {
        self.param_layer()
            .map(ParamLayer::bias)
            .ok_or(InferStatus::Unsupported("bias"))
    }

    fn set_weights(&mut self, values: &[f32]) -> Result<()> {
        match self.param_layer_mut() {
            Some(params) => params.set_weights(values),
            None => Err(InferStatus::Unsupported("set_weights").into()),
        }
    }

    fn set_bias(&mut self, values: &[f32]) -> Result<()> {
        match self.param_layer_mut() {
            Some(params) => params.set_bias(values),
            None => Err(InferStatus::Unsupported("set_bias").into()),
        }
    }
}

/// Weight and bias tensors of a parameterized layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamLayer {
    weights: Vec<Tensor>,
    bias: Vec<Tensor>,
}

impl ParamLayer {
    pub fn new(weights: Vec<Tensor>, bias: Vec<Tensor>) -> Self {
        Self { weights, bias }
    }

    pub fn weights(&self) -> &[Tensor] {
        &self.weights
    }

    pub fn bias(&self) -> &[Tensor] {
        &self.bias
    }

    /// Fill the weight tensors in order from one flat row-major blob.
    pub fn set_weights(&mut self, values: &[f32]) -> Result<()> {
        fill_split(&mut self.weights, values, "weight")
    }

    pub fn set_bias(&mut self, values: &[f32]) -> Result<()> {
        fill_split(&mut self.bias, values, "bias")
    }
}

fn fill_split(tensors: &mut [Tensor], values: &[f32], what: &str) -> Result<()> {
    let expected: usize = tensors.iter().map(Tensor::size).sum();
    if tensors.is_empty() || expected != values.len() {
        return Err(anyhow!(
            "{} blob has {} values, layer expects {}",
            what,
            values.len(),
            expected
        ));
    }
    let mut offset = 0usize;
    for tensor in tensors.iter_mut() {
        let len = tensor.size();
        tensor.fill_values(&values[offset..offset + len]);
        offset += len;
    }
    Ok(())
}

/// Reject an empty batch or a batch whose input and output counts differ.
pub(crate) fn check_batch(
    name: &str,
    inputs: &[&Tensor],
    outputs: &[Option<Tensor>],
) -> Result<(), InferStatus> {
    if inputs.is_empty() {
        crate::error!("the input tensors of {} layer are empty", name);
        return Err(InferStatus::InputEmpty);
    }
    if inputs.len() != outputs.len() {
        crate::error!(
            "{} layer got {} inputs for {} outputs",
            name,
            inputs.len(),
            outputs.len()
        );
        return Err(InferStatus::InputOutSizeAdaptingError);
    }
    Ok(())
}

/// Allocate an empty slot or check a filled one against `shape`.
pub(crate) fn prepare_output<'a>(
    name: &str,
    slot: &'a mut Option<Tensor>,
    shape: [usize; 3],
) -> Result<&'a mut Tensor, InferStatus> {
    if let Some(existing) = slot.as_ref() {
        if existing.shapes() != shape {
            crate::error!(
                "{} layer output shape {:?} does not match expected {:?}",
                name,
                existing.shapes(),
                shape
            );
            return Err(InferStatus::OutputSizeError);
        }
    }
    Ok(slot.get_or_insert_with(|| Tensor::from_shape(&shape)))
}

/// Store a freshly computed tensor, checking the element count of a filled slot.
pub(crate) fn store_output(
    name: &str,
    slot: &mut Option<Tensor>,
    tensor: Tensor,
) -> Result<(), InferStatus> {
    if let Some(existing) = slot.as_ref() {
        if existing.size() != tensor.size() {
            crate::error!(
                "{} layer output holds {} values, computed {}",
                name,
                existing.size(),
                tensor.size()
            );
            return Err(InferStatus::OutputSizeError);
        }
    }
    *slot = Some(tensor);
    Ok(())
}
