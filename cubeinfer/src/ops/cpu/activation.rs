//! Pointwise activations. All of them map every element independently, so a
//! single layer type parameterized by [`ActivationKind`] covers them.
use anyhow::Result;
use rayon::prelude::*;

use crate::graph::RuntimeOperator;
use crate::ops::{check_batch, prepare_output, InferStatus, Layer};
use crate::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    Relu,
    Sigmoid,
    Silu,
    HardSigmoid,
    HardSwish,
}

impl ActivationKind {
    pub fn name(self) -> &'static str {
        match self {
            ActivationKind::Relu => "ReLU",
            ActivationKind::Sigmoid => "Sigmoid",
            ActivationKind::Silu => "SiLU",
            ActivationKind::HardSigmoid => "HardSigmoid",
            ActivationKind::HardSwish => "HardSwish",
        }
    }

    pub fn apply(self, x: f32) -> f32 {
        match self {
            ActivationKind::Relu => x.max(0.0),
            ActivationKind::Sigmoid => sigmoid(x),
            ActivationKind::Silu => x / (1.0 + (-x).exp()),
            ActivationKind::HardSigmoid => {
                if x <= -3.0 {
                    0.0
                } else if x >= 3.0 {
                    1.0
                } else {
                    x / 6.0 + 0.5
                }
            }
            ActivationKind::HardSwish => {
                if x <= -3.0 {
                    0.0
                } else if x >= 3.0 {
                    x
                } else {
                    x * (x + 3.0) / 6.0
                }
            }
        }
    }
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone)]
pub struct ActivationLayer {
    kind: ActivationKind,
}

macro_rules! activation_creators {
    ($($fn_name:ident => $kind:ident),* $(,)?) => {
        impl ActivationLayer {
            $(
                pub fn $fn_name(_op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
                    Ok(Box::new(Self::new(ActivationKind::$kind)))
                }
            )*
        }
    };
}

activation_creators! {
    create_relu => Relu,
    create_sigmoid => Sigmoid,
    create_silu => Silu,
    create_hardsigmoid => HardSigmoid,
    create_hardswish => HardSwish,
}

impl ActivationLayer {
    pub fn new(kind: ActivationKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ActivationKind {
        self.kind
    }

    fn forward_item(&self, input: &Tensor, slot: &mut Option<Tensor>) -> Result<(), InferStatus> {
        let output = if slot.is_some() {
            let output = prepare_output(self.layer_name(), slot, input.shapes())?;
            output.copy_from(input);
            output
        } else {
            slot.insert(input.clone())
        };
        let kind = self.kind;
        output.transform(|x| kind.apply(x));
        Ok(())
    }
}

impl Layer for ActivationLayer {
    fn layer_name(&self) -> &str {
        self.kind.name()
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        check_batch(self.layer_name(), inputs, outputs)?;
        inputs
            .par_iter()
            .zip(outputs.par_iter_mut())
            .try_for_each(|(input, slot)| self.forward_item(input, slot))
    }
}
