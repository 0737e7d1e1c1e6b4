use anyhow::Result;
use cubeinfer::{GraphDescription, OperatorDesc, Parameter, RuntimeGraph, Tensor};

use crate::common::{assert_close, assert_tensor_close, input_op, output_op, TOLERANCE};

/// in -> conv -> {maxpool -> upsample, concat} -> concat -> view -> flatten -> out
fn pyramid_description() -> GraphDescription {
    GraphDescription::new()
        .with(input_op("in", &[2, 1, 4, 4], &["conv"]))
        .with(
            OperatorDesc::new("nn.Conv2d", "conv")
                .input("in", &[2, 1, 4, 4])
                .output(&[2, 2, 4, 4], &["pool", "cat"])
                .param("in_channels", Parameter::Int(1))
                .param("out_channels", Parameter::Int(2))
                .param("kernel_size", Parameter::IntArray(vec![1, 1]))
                .param("padding", Parameter::IntArray(vec![0, 0]))
                .param("stride", Parameter::IntArray(vec![1, 1]))
                .param("groups", Parameter::Int(1))
                .param("bias", Parameter::Bool(true))
                .attr("weight", &[2, 1, 1, 1], &[1.0, -1.0])
                .attr("bias", &[2], &[0.0, 1.0]),
        )
        .with(
            OperatorDesc::new("nn.MaxPool2d", "pool")
                .input("conv", &[2, 2, 4, 4])
                .output(&[2, 2, 2, 2], &["up"])
                .param("kernel_size", Parameter::IntArray(vec![2, 2]))
                .param("stride", Parameter::IntArray(vec![2, 2]))
                .param("padding", Parameter::IntArray(vec![0, 0])),
        )
        .with(
            OperatorDesc::new("nn.Upsample", "up")
                .input("pool", &[2, 2, 2, 2])
                .output(&[2, 2, 4, 4], &["cat"])
                .param("scale_factor", Parameter::FloatArray(vec![2.0, 2.0]))
                .param("mode", Parameter::Str("nearest".to_string())),
        )
        .with(
            OperatorDesc::new("torch.cat", "cat")
                .input("conv", &[2, 2, 4, 4])
                .input("up", &[2, 2, 4, 4])
                .output(&[2, 4, 4, 4], &["view"])
                .param("dim", Parameter::Int(1)),
        )
        .with(
            OperatorDesc::new("Tensor.view", "view")
                .input("cat", &[2, 4, 4, 4])
                .output(&[2, 4, 16], &["flatten"])
                .param("shape", Parameter::IntArray(vec![2, 4, -1])),
        )
        .with(
            OperatorDesc::new("torch.flatten", "flatten")
                .input("view", &[2, 4, 16])
                .output(&[2, 64], &["out"])
                .param("start_dim", Parameter::Int(1))
                .param("end_dim", Parameter::Int(-1)),
        )
        .with(output_op("out", "flatten", &[2, 64]))
}

/// Nearest 2x upsample of a 2x2 block grid, row-major.
fn upsampled(pooled: [[f32; 2]; 2]) -> Vec<f32> {
    (0..16).map(|i| pooled[i / 8][(i % 4) / 2]).collect()
}

/// The view rows are the four channel planes; flatten keeps storage order,
/// which walks the `[4, 16]` view column by column.
fn flattened(planes: [Vec<f32>; 4]) -> Vec<f32> {
    let mut out = Vec::with_capacity(64);
    for j in 0..16 {
        for plane in &planes {
            out.push(plane[j]);
        }
    }
    out
}

#[test]
fn pooled_pyramid_graph() -> Result<()> {
    let mut graph = RuntimeGraph::with_builtin_layers(pyramid_description());
    graph.build("in", "out")?;

    let rising: Vec<f32> = (0..16).map(|v| v as f32).collect();
    let falling: Vec<f32> = rising.iter().rev().copied().collect();
    let inputs = [
        Tensor::from_values(1, 4, 4, &rising),
        Tensor::from_values(1, 4, 4, &falling),
    ];
    let outputs = graph.forward(&inputs, false)?;
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].shapes(), [1, 64, 1]);

    let inverted = |plane: &[f32]| plane.iter().map(|x| 1.0 - x).collect::<Vec<f32>>();
    let expected_rising = flattened([
        rising.clone(),
        inverted(&rising),
        upsampled([[5.0, 7.0], [13.0, 15.0]]),
        upsampled([[1.0, -1.0], [-7.0, -9.0]]),
    ]);
    let expected_falling = flattened([
        falling.clone(),
        inverted(&falling),
        upsampled([[15.0, 13.0], [7.0, 5.0]]),
        upsampled([[-9.0, -7.0], [-1.0, 1.0]]),
    ]);
    assert_tensor_close(&outputs[0], &expected_rising, TOLERANCE)?;
    assert_tensor_close(&outputs[1], &expected_falling, TOLERANCE)?;

    // first values: x(0,0) from each channel, then x(0,1)
    assert_eq!(&outputs[0].values()[..8], &[0.0, 1.0, 5.0, 1.0, 1.0, 0.0, 5.0, 1.0]);
    assert_eq!(
        graph.execution_order(),
        vec!["conv", "pool", "up", "cat", "view", "flatten"]
    );
    Ok(())
}

const STAGE_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];

/// Stage `s`, block `b`, cell `(x, y)` of a 2x2 map.
fn stage_tables(stage: usize) -> (Vec<f32>, Vec<f32>) {
    let mut grid = Vec::new();
    let mut anchor = Vec::new();
    for block in 0..3 {
        for pos in 0..4 {
            grid.push((pos % 2) as f32);
            grid.push((pos / 2) as f32);
            anchor.push(10.0 * (stage + 1) as f32 + block as f32);
            anchor.push(4.0 * (stage + 1) as f32);
        }
    }
    (grid, anchor)
}

fn detect_description() -> GraphDescription {
    let map = [1, 1, 2, 2];
    let grid_shape = [1, 3, 2, 2, 2];
    // box x follows the input, box h follows its negation, the rest stay at 0
    let weights: Vec<f32> = (0..18)
        .map(|o| match o % 6 {
            0 => 1.0,
            3 => -1.0,
            _ => 0.0,
        })
        .collect();

    let mut detect = OperatorDesc::new("models.yolo.Detect", "detect")
        .input("in", &map)
        .input("in", &map)
        .input("in", &map)
        .output(&[1, 36, 6], &["out"])
        .attr("pnnx_5", &[3], &STAGE_STRIDES);
    let anchor_names = ["pnnx_4", "pnnx_2", "pnnx_0"];
    let grid_names = ["pnnx_6", "pnnx_3", "pnnx_1"];
    for stage in 0..3 {
        let (grid, anchor) = stage_tables(stage);
        detect = detect
            .attr(format!("m.{}.weight", stage), &[18, 1, 1, 1], &weights)
            .attr(format!("m.{}.bias", stage), &[18], &[0.0; 18])
            .attr(anchor_names[stage], &grid_shape, &anchor)
            .attr(grid_names[stage], &grid_shape, &grid);
    }

    GraphDescription::new()
        .with(input_op("in", &map, &["detect"]))
        .with(detect)
        .with(output_op("out", "detect", &[1, 36, 6]))
}

#[test]
fn detection_head_graph() -> Result<()> {
    let mut graph = RuntimeGraph::with_builtin_layers(detect_description());
    graph.build("in", "out")?;

    let ln3 = 3f32.ln();
    let input = Tensor::from_values(1, 2, 2, &[0.0, ln3, -ln3, 0.0]);
    let outputs = graph.forward(&[input], false)?;
    let boxes = &outputs[0];
    assert_eq!(boxes.shapes(), [1, 36, 6]);

    // sigmoid(0) = 0.5, sigmoid(ln 3) = 0.75, sigmoid(-ln 3) = 0.25
    let sx = [0.5, 0.75, 0.25, 0.5];
    let sh: [f32; 4] = [0.5, 0.25, 0.75, 0.5];
    for (stage, stride) in STAGE_STRIDES.iter().enumerate() {
        let (grid, anchor) = stage_tables(stage);
        for block in 0..3 {
            for pos in 0..4 {
                let row = stage * 12 + block * 4 + pos;
                let cell = block * 4 + pos;
                let expected = [
                    (2.0 * sx[pos] + grid[cell * 2]) * stride,
                    (1.0 + grid[cell * 2 + 1]) * stride,
                    anchor[cell * 2],
                    (2.0 * sh[pos]).powi(2) * anchor[cell * 2 + 1],
                    0.5,
                    0.5,
                ];
                for (k, value) in expected.iter().enumerate() {
                    assert_close(boxes.at(0, row, k), *value, 1e-4)?;
                }
            }
        }
    }

    // stage 1, block 2, cell (0, 1): x = (0.5 + 0) * 16, w = 22, h = 2.25 * 8
    assert_close(boxes.at(0, 12 + 8 + 2, 0), 8.0, 1e-4)?;
    assert_close(boxes.at(0, 12 + 8 + 2, 2), 22.0, 1e-4)?;
    assert_close(boxes.at(0, 12 + 8 + 2, 3), 18.0, 1e-4)?;
    Ok(())
}
