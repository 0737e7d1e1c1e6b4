//! Multi-stage detection head.
//!
//! Each stage runs a 1-stride convolution over its feature map, decodes the
//! raw predictions against that stage's grid and anchor tables, and appends
//! the decoded rows to a single `(1, boxes, 5 + classes)` tensor per item.
use anyhow::{anyhow, Result};
use rayon::prelude::*;

use crate::graph::{Attribute, RuntimeOperator};
use crate::ops::{prepare_output, InferStatus, Layer, ParseStatus};
use crate::tensor::Tensor;

use super::activation::sigmoid;
use super::{attribute, to_positive, ConvolutionLayer};

const STRIDES_ATTR: &str = "pnnx_5";
const ANCHOR_GRID_ATTRS: [&str; 3] = ["pnnx_4", "pnnx_2", "pnnx_0"];
const GRID_ATTRS: [&str; 3] = ["pnnx_6", "pnnx_3", "pnnx_1"];

/// Row-major `(rows, 2)` table of per-position offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct GridTable {
    values: Vec<f32>,
}

impl GridTable {
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.len() % 2 != 0 {
            return Err(anyhow!("grid table of {} values is not two-wide", values.len()));
        }
        Ok(Self { values })
    }

    /// Load a `(1, anchors, ny, nx, 2)` attribute.
    fn from_attribute(attr: &Attribute, what: &str) -> Result<Self> {
        match attr.shape() {
            [1, _, _, _, 2] => Self::new(attr.get_f32()),
            shape => Err(anyhow!("{} table has unexpected shape {:?}", what, shape)),
        }
    }

    pub fn rows(&self) -> usize {
        self.values.len() / 2
    }

    fn get(&self, row: usize, col: usize) -> f32 {
        self.values[row * 2 + col]
    }
}

#[derive(Debug, Clone)]
struct DetectStage {
    conv: ConvolutionLayer,
    stride: f32,
    grid: GridTable,
    anchor_grid: GridTable,
}

#[derive(Debug, Clone)]
pub struct YoloDetectLayer {
    stages: Vec<DetectStage>,
    num_classes: usize,
}

impl YoloDetectLayer {
    /// Stages are given in feature-pyramid order; every list must have one
    /// entry per stage.
    pub fn new(
        num_classes: usize,
        strides: Vec<f32>,
        anchor_grids: Vec<GridTable>,
        grids: Vec<GridTable>,
        convs: Vec<ConvolutionLayer>,
    ) -> Result<Self> {
        let count = convs.len();
        if count == 0
            || strides.len() != count
            || anchor_grids.len() != count
            || grids.len() != count
        {
            return Err(anyhow!(
                "detection head got {} convs, {} strides, {} anchor grids and {} grids",
                count,
                strides.len(),
                anchor_grids.len(),
                grids.len()
            ));
        }
        let stages = convs
            .into_iter()
            .zip(strides)
            .zip(anchor_grids.into_iter().zip(grids))
            .map(|((conv, stride), (anchor_grid, grid))| DetectStage {
                conv,
                stride,
                grid,
                anchor_grid,
            })
            .collect();
        Ok(Self {
            stages,
            num_classes,
        })
    }

    pub fn create(op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let strides_attr = attribute(op, STRIDES_ATTR, ParseStatus::AttrMissingYoloStrides)?;
        let Some(&stage_count) = strides_attr.shape().first() else {
            return Err(ParseStatus::AttrMissingYoloStrides.into());
        };
        if stage_count != 3 {
            return Err(anyhow!(
                "detection head {} has {} stages, expected 3",
                op.name,
                stage_count
            ));
        }
        let strides = strides_attr.get_f32();
        if strides.len() != 3 {
            return Err(anyhow!(
                "detection head {} has {} strides for 3 stages",
                op.name,
                strides.len()
            ));
        }

        let mut num_classes = None;
        let mut convs = Vec::with_capacity(3);
        for stage in 0..3 {
            let weight_name = format!("m.{}.weight", stage);
            let weight = attribute(op, &weight_name, ParseStatus::AttrMissingWeight)?;
            let &[out_channels, in_channels, kernel_h, kernel_w] = weight.shape() else {
                return Err(anyhow!(
                    "stage {} weight of {} has shape {:?}",
                    stage,
                    op.name,
                    weight.shape()
                ));
            };
            if num_classes.is_none() {
                if out_channels % stage_count != 0 || out_channels / stage_count <= 5 {
                    return Err(anyhow!(
                        "stage output channels {} do not encode a positive class count",
                        out_channels
                    ));
                }
                num_classes = Some((out_channels / stage_count - 5) as usize);
            }
            let mut conv = ConvolutionLayer::new(
                to_positive(out_channels, "out_channels")?,
                to_positive(in_channels, "in_channels")?,
                to_positive(kernel_h, "kernel_h")?,
                to_positive(kernel_w, "kernel_w")?,
                0,
                0,
                1,
                1,
                1,
                true,
            )?;
            conv.set_weights(&weight.get_f32())?;
            let bias_name = format!("m.{}.bias", stage);
            let bias = attribute(op, &bias_name, ParseStatus::AttrMissingBias)?;
            conv.set_bias(&bias.get_f32())?;
            convs.push(conv);
        }

        let anchor_grids = ANCHOR_GRID_ATTRS
            .iter()
            .map(|name| {
                let attr = attribute(op, name, ParseStatus::AttrMissingYoloAnchorGrids)?;
                GridTable::from_attribute(attr, "anchor grid")
            })
            .collect::<Result<Vec<_>>>()?;
        let grids = GRID_ATTRS
            .iter()
            .map(|name| {
                let attr = attribute(op, name, ParseStatus::AttrMissingYoloGrids)?;
                GridTable::from_attribute(attr, "grid")
            })
            .collect::<Result<Vec<_>>>()?;

        let num_classes = num_classes.ok_or(ParseStatus::AttrMissingWeight)?;
        Ok(Box::new(Self::new(num_classes, strides, anchor_grids, grids, convs)?))
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn classes_info(&self) -> usize {
        self.num_classes + 5
    }

    /// Decode one stage's convolution output into `(rows, classes_info)`
    /// row-major predictions.
    fn decode(&self, stage: &DetectStage, mut raw: Tensor) -> Result<Vec<f32>, InferStatus> {
        let count = self.stages.len();
        let info = self.classes_info();
        let spatial = raw.rows() * raw.cols();
        if raw.size() != count * info * spatial {
            crate::error!(
                "detection stage produced {} values, expected {} x {} x {}",
                raw.size(),
                count,
                info,
                spatial
            );
            return Err(InferStatus::ChannelParameterError);
        }
        raw.view(&[count, info, spatial]);
        raw.transform(sigmoid);

        let rows = count * spatial;
        if stage.grid.rows() != rows || stage.anchor_grid.rows() != rows {
            crate::error!(
                "detection tables hold {} and {} rows, stage produces {}",
                stage.grid.rows(),
                stage.anchor_grid.rows(),
                rows
            );
            return Err(InferStatus::OutputSizeError);
        }

        let mut decoded = vec![0.0f32; rows * info];
        for block in 0..count {
            for pos in 0..spatial {
                let row = block * spatial + pos;
                let dst = &mut decoded[row * info..(row + 1) * info];
                for (k, value) in dst.iter_mut().enumerate() {
                    *value = raw.at(block, k, pos);
                }
                for j in 0..2 {
                    dst[j] = (dst[j] * 2.0 + stage.grid.get(row, j)) * stage.stride;
                    let wh = dst[j + 2] * 2.0;
                    dst[j + 2] = wh * wh * stage.anchor_grid.get(row, j);
                }
            }
        }
        Ok(decoded)
    }
}

impl Layer for YoloDetectLayer {
    fn layer_name(&self) -> &str {
        "YoloDetect"
    }

    fn forward(&self, inputs: &[&Tensor], outputs: &mut [Option<Tensor>]) -> Result<(), InferStatus> {
        if inputs.is_empty() {
            crate::error!("the input feature maps of detection head are empty");
            return Err(InferStatus::InputEmpty);
        }
        let batch = outputs.len();
        if batch == 0 || inputs.len() % batch != 0 || inputs.len() / batch != self.stages.len() {
            crate::error!(
                "detection head with {} stages got {} inputs for {} outputs",
                self.stages.len(),
                inputs.len(),
                batch
            );
            return Err(InferStatus::YoloStageNumberError);
        }

        // per stage, per item
        let decoded = self
            .stages
            .par_iter()
            .zip(inputs.par_chunks(batch))
            .map(|(stage, stage_inputs)| {
                let mut raw = vec![None; batch];
                stage.conv.forward(stage_inputs, &mut raw)?;
                raw.into_iter()
                    .map(|tensor| {
                        let tensor = tensor.ok_or(InferStatus::OutputSizeError)?;
                        self.decode(stage, tensor)
                    })
                    .collect::<Result<Vec<_>, InferStatus>>()
            })
            .collect::<Result<Vec<_>, InferStatus>>()?;

        let info = self.classes_info();
        let total_rows: usize = decoded.iter().map(|stage| stage[0].len() / info).sum();
        for (item, slot) in outputs.iter_mut().enumerate() {
            let output = prepare_output(self.layer_name(), slot, [1, total_rows, info])?;
            let mut offset = 0usize;
            for stage in &decoded {
                let rows = &stage[item];
                for (r, row) in rows.chunks(info).enumerate() {
                    for (k, value) in row.iter().enumerate() {
                        *output.at_mut(0, offset + r, k) = *value;
                    }
                }
                offset += rows.len() / info;
            }
        }
        Ok(())
    }
}
