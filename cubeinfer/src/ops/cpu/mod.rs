//! CPU kernels. Each layer exposes a `create` constructor registered by
//! [`crate::registry::register_builtin_layers`].
pub mod activation;
pub mod adaptive_avgpool;
pub mod batchnorm;
pub mod concat;
pub mod convolution;
pub mod expression;
pub mod flatten;
pub mod gemm;
pub mod linear;
pub mod maxpool;
pub mod softmax;
pub mod upsample;
pub mod view;
pub mod yolo_detect;

pub use activation::{ActivationKind, ActivationLayer};
pub use adaptive_avgpool::AdaptiveAvgPoolingLayer;
pub use batchnorm::BatchNorm2dLayer;
pub use concat::CatLayer;
pub use convolution::ConvolutionLayer;
pub use expression::ExpressionLayer;
pub use flatten::FlattenLayer;
pub use linear::LinearLayer;
pub use maxpool::MaxPoolingLayer;
pub use softmax::SoftmaxLayer;
pub use upsample::{UpSampleLayer, UpSampleMode};
pub use view::ViewLayer;
pub use yolo_detect::{GridTable, YoloDetectLayer};

use crate::graph::{Attribute, RuntimeOperator};

use super::ParseStatus;

pub(crate) fn int_param(
    op: &RuntimeOperator,
    name: &str,
    missing: ParseStatus,
) -> Result<i32, ParseStatus> {
    op.param(name).and_then(|p| p.as_int()).ok_or(missing)
}

pub(crate) fn bool_param(
    op: &RuntimeOperator,
    name: &str,
    missing: ParseStatus,
) -> Result<bool, ParseStatus> {
    op.param(name).and_then(|p| p.as_bool()).ok_or(missing)
}

pub(crate) fn float_param(
    op: &RuntimeOperator,
    name: &str,
    missing: ParseStatus,
) -> Result<f32, ParseStatus> {
    op.param(name).and_then(|p| p.as_float()).ok_or(missing)
}

/// Int array parameter, optionally checked against an exact length.
pub(crate) fn int_array_param<'a>(
    op: &'a RuntimeOperator,
    name: &str,
    len: Option<usize>,
    missing: ParseStatus,
) -> Result<&'a [i32], ParseStatus> {
    let values = op.param(name).and_then(|p| p.as_int_array()).ok_or(missing.clone())?;
    match len {
        Some(len) if values.len() != len => Err(missing),
        _ => Ok(values),
    }
}

pub(crate) fn attribute<'a>(
    op: &'a RuntimeOperator,
    name: &str,
    missing: ParseStatus,
) -> Result<&'a Attribute, ParseStatus> {
    op.attr(name).ok_or(missing)
}

/// Convert a non-negative parameter value.
pub(crate) fn to_usize(value: i32, what: &str) -> Result<usize, ParseStatus> {
    usize::try_from(value).map_err(|_| {
        ParseStatus::InvalidParameter(format!("{} must be non-negative, got {}", what, value))
    })
}

/// Convert a strictly positive parameter value.
pub(crate) fn to_positive(value: i32, what: &str) -> Result<usize, ParseStatus> {
    match to_usize(value, what)? {
        0 => Err(ParseStatus::InvalidParameter(format!("{} must be positive", what))),
        v => Ok(v),
    }
}
