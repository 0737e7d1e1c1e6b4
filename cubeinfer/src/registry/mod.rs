//! Operator-type name to layer constructor map.
//!
//! Graphs receive a registry at construction time. The builtin kernels are
//! added by [`register_builtin_layers`]; [`LayerRegistry::builtin`] shares one
//! lazily built instance across the process.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;

use crate::graph::RuntimeOperator;
use crate::ops::cpu::{
    ActivationLayer, AdaptiveAvgPoolingLayer, BatchNorm2dLayer, CatLayer, ConvolutionLayer,
    ExpressionLayer, FlattenLayer, LinearLayer, MaxPoolingLayer, SoftmaxLayer, UpSampleLayer,
    ViewLayer, YoloDetectLayer,
};
use crate::ops::Layer;

/// Builds a layer from a fully wired operator.
pub type LayerCreator = fn(&RuntimeOperator) -> Result<Box<dyn Layer>>;

static BUILTIN: Lazy<Arc<LayerRegistry>> = Lazy::new(|| {
    let mut registry = LayerRegistry::new();
    register_builtin_layers(&mut registry);
    Arc::new(registry)
});

#[derive(Clone, Default)]
pub struct LayerRegistry {
    creators: BTreeMap<String, LayerCreator>,
}

impl fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.creators.keys()).finish()
    }
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared registry holding every builtin layer.
    pub fn builtin() -> Arc<LayerRegistry> {
        Arc::clone(&BUILTIN)
    }

    pub fn register(&mut self, kind: impl Into<String>, creator: LayerCreator) -> Result<()> {
        let kind = kind.into();
        if self.creators.contains_key(&kind) {
            return Err(anyhow!("layer type {} is already registered", kind));
        }
        self.creators.insert(kind, creator);
        Ok(())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.creators.contains_key(kind)
    }

    /// Registered type names in sorted order.
    pub fn layer_types(&self) -> impl Iterator<Item = &str> {
        self.creators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.creators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }

    pub fn create_layer(&self, op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let creator = self.creators.get(&op.kind).ok_or_else(|| {
            anyhow!(
                "no layer registered for type {} (operator {})",
                op.kind,
                op.name
            )
        })?;
        creator(op)
            .with_context(|| format!("failed to create layer {} of type {}", op.name, op.kind))
    }
}

/// Add every builtin kernel under its model operator type name.
pub fn register_builtin_layers(registry: &mut LayerRegistry) {
    let builtin: [(&str, LayerCreator); 19] = [
        ("nn.Conv2d", ConvolutionLayer::create),
        ("nn.BatchNorm2d", BatchNorm2dLayer::create),
        ("nn.AdaptiveAvgPool2d", AdaptiveAvgPoolingLayer::create),
        ("nn.MaxPool2d", MaxPoolingLayer::create),
        ("nn.ReLU", ActivationLayer::create_relu),
        ("nn.Sigmoid", ActivationLayer::create_sigmoid),
        ("nn.SiLU", ActivationLayer::create_silu),
        ("nn.Hardsigmoid", ActivationLayer::create_hardsigmoid),
        ("nn.Hardswish", ActivationLayer::create_hardswish),
        ("nn.Linear", LinearLayer::create),
        ("nn.Softmax", SoftmaxLayer::create),
        ("F.softmax", SoftmaxLayer::create),
        ("nn.Upsample", UpSampleLayer::create),
        ("torch.cat", CatLayer::create),
        ("torch.flatten", FlattenLayer::create),
        ("Tensor.view", ViewLayer::create),
        ("Tensor.reshape", ViewLayer::create),
        ("pnnx.Expression", ExpressionLayer::create),
        ("models.yolo.Detect", YoloDetectLayer::create),
    ];
    for (kind, creator) in builtin {
        if registry.register(kind, creator).is_err() {
            crate::warning!("layer type {} was registered before the builtins", kind);
        }
    }
}
