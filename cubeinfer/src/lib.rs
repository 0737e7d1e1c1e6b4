#[macro_use]
pub mod logging;

mod expr;
mod formatting;
mod graph;
mod ops;
mod registry;
mod runtime;
mod tensor;
mod timer;

pub use expr::{ExpressionParser, RpnItem, Token, TokenNode, TokenType};
pub use formatting::{format_truncated, FormatValue};
pub use graph::{
    Attribute, AttributeDesc, DataType, GraphDescription, OperandDesc, OperatorDesc, OutputDesc,
    Parameter, RuntimeOperand, RuntimeOperator,
};
pub use ops::cpu::{
    ActivationKind, ActivationLayer, AdaptiveAvgPoolingLayer, BatchNorm2dLayer, CatLayer,
    ConvolutionLayer, ExpressionLayer, FlattenLayer, GridTable, LinearLayer, MaxPoolingLayer,
    SoftmaxLayer, UpSampleLayer, UpSampleMode, ViewLayer, YoloDetectLayer,
};
pub use ops::{InferStatus, Layer, ParamLayer, ParseStatus};
pub use registry::{register_builtin_layers, LayerCreator, LayerRegistry};
pub use runtime::{GraphState, RuntimeGraph, INPUT_KIND, OUTPUT_KIND};
pub use tensor::{
    default_raw_shape, element_add, element_multiply, infer_wildcard, numel, operand_dims,
    physical_dims, Random, Tensor,
};
pub use timer::Timer;
