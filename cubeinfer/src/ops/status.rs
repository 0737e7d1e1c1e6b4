use thiserror::Error;

/// Failure reported by a layer's forward pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferStatus {
    #[error("input batch is empty")]
    InputEmpty,
    #[error("weight parameters are missing or malformed")]
    WeightParameterError,
    #[error("bias parameters are missing or malformed")]
    BiasParameterError,
    #[error("stride parameter is invalid")]
    StrideParameterError,
    #[error("dimension parameter is invalid")]
    DimensionParameterError,
    #[error("channel parameter is invalid")]
    ChannelParameterError,
    #[error("input and output batch sizes differ")]
    InputOutSizeAdaptingError,
    #[error("output size is invalid")]
    OutputSizeError,
    #[error("operation is unknown")]
    OperationUnknown,
    #[error("input count does not match the detection stages")]
    YoloStageNumberError,
    #[error("{0} is not supported by this layer")]
    Unsupported(&'static str),
}

/// Failure reported while building a layer from an operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseStatus {
    #[error("missing stride parameter")]
    MissingStride,
    #[error("missing padding parameter")]
    MissingPadding,
    #[error("missing kernel_size parameter")]
    MissingKernel,
    #[error("missing bias parameter")]
    MissingUseBias,
    #[error("missing in_channels parameter")]
    MissingInChannel,
    #[error("missing out_channels parameter")]
    MissingOutChannel,
    #[error("missing eps parameter")]
    MissingEps,
    #[error("missing num_features parameter")]
    MissingNumFeatures,
    #[error("missing dim parameter")]
    MissingDim,
    #[error("missing expr parameter")]
    MissingExpr,
    #[error("missing output_size parameter")]
    MissingOutHW,
    #[error("missing shape parameter")]
    MissingShape,
    #[error("missing groups parameter")]
    MissingGroups,
    #[error("missing scale_factor parameter")]
    MissingScale,
    #[error("missing mode parameter")]
    MissingResizeMode,
    #[error("missing bias attribute")]
    AttrMissingBias,
    #[error("missing weight attribute")]
    AttrMissingWeight,
    #[error("missing running_mean attribute")]
    AttrMissingRunningMean,
    #[error("missing running_var attribute")]
    AttrMissingRunningVar,
    #[error("weight attribute does not give out_features")]
    AttrMissingOutFeatures,
    #[error("missing detection strides attribute")]
    AttrMissingYoloStrides,
    #[error("missing detection anchor grid attribute")]
    AttrMissingYoloAnchorGrids,
    #[error("missing detection grid attribute")]
    AttrMissingYoloGrids,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
