use anyhow::Result;
use cubeinfer::{GraphDescription, GraphState, OperatorDesc, Parameter, RuntimeGraph, Tensor};

use crate::common::{assert_tensor_close, input_op, output_op, sigmoid, TOLERANCE};

const BATCH: i32 = 2;

/// input -> conv -> {relu, sigmoid} -> add -> pool -> flatten -> linear -> output
pub fn diamond_description() -> GraphDescription {
    let plane = [BATCH, 2, 4, 4];
    GraphDescription::new()
        .with(input_op("pnnx_input_0", &plane, &["conv1"]))
        .with(
            OperatorDesc::new("nn.Conv2d", "conv1")
                .input("pnnx_input_0", &plane)
                .output(&plane, &["act_relu", "act_sigmoid"])
                .param("in_channels", Parameter::Int(2))
                .param("out_channels", Parameter::Int(2))
                .param("kernel_size", Parameter::IntArray(vec![1, 1]))
                .param("padding", Parameter::IntArray(vec![0, 0]))
                .param("stride", Parameter::IntArray(vec![1, 1]))
                .param("groups", Parameter::Int(1))
                .param("bias", Parameter::Bool(true))
                .attr("weight", &[2, 2, 1, 1], &[1.0, 0.0, 0.0, -1.0])
                .attr("bias", &[2], &[0.5, 0.0]),
        )
        .with(
            OperatorDesc::new("nn.ReLU", "act_relu")
                .input("conv1", &plane)
                .output(&plane, &["sum"]),
        )
        .with(
            OperatorDesc::new("nn.Sigmoid", "act_sigmoid")
                .input("conv1", &plane)
                .output(&plane, &["sum"]),
        )
        .with(
            OperatorDesc::new("pnnx.Expression", "sum")
                .input("act_relu", &plane)
                .input("act_sigmoid", &plane)
                .output(&plane, &["pool"])
                .param("expr", Parameter::Str("add(@0,@1)".to_string())),
        )
        .with(
            OperatorDesc::new("nn.AdaptiveAvgPool2d", "pool")
                .input("sum", &plane)
                .output(&[BATCH, 2, 1, 1], &["flatten"])
                .param("output_size", Parameter::IntArray(vec![1, 1])),
        )
        .with(
            OperatorDesc::new("torch.flatten", "flatten")
                .input("pool", &[BATCH, 2, 1, 1])
                .output(&[BATCH, 2], &["fc"])
                .param("start_dim", Parameter::Int(1))
                .param("end_dim", Parameter::Int(-1)),
        )
        .with(
            OperatorDesc::new("nn.Linear", "fc")
                .input("flatten", &[BATCH, 2])
                .output(&[BATCH, 3], &["pnnx_output_0"])
                .param("bias", Parameter::Bool(true))
                .attr("weight", &[3, 2], &[1.0, 1.0, 1.0, -1.0, 0.0, 2.0])
                .attr("bias", &[3], &[0.0, 1.0, -1.0]),
        )
        .with(output_op("pnnx_output_0", "fc", &[BATCH, 3]))
}

fn constant_item(first: f32, second: f32) -> Tensor {
    let mut values = vec![first; 16];
    values.extend(std::iter::repeat(second).take(16));
    Tensor::from_values(2, 4, 4, &values)
}

fn expected_for(first: f32, second: f32) -> Vec<f32> {
    let (c0, c1) = (first + 0.5, -second);
    let a = c0.max(0.0) + sigmoid(c0);
    let b = c1.max(0.0) + sigmoid(c1);
    vec![a + b, a - b + 1.0, 2.0 * b - 1.0]
}

#[test]
fn diamond_graph_forward() -> Result<()> {
    let mut graph = RuntimeGraph::with_builtin_layers(diamond_description());
    assert_eq!(graph.state(), GraphState::NeedInit);
    graph.build("pnnx_input_0", "pnnx_output_0")?;
    assert_eq!(graph.state(), GraphState::Complete);

    let inputs = [constant_item(1.0, 2.0), constant_item(-1.0, -0.5)];
    let outputs = graph.forward(&inputs, false)?;
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].shapes(), [1, 3, 1]);
    assert_tensor_close(&outputs[0], &expected_for(1.0, 2.0), TOLERANCE)?;
    assert_tensor_close(&outputs[1], &expected_for(-1.0, -0.5), TOLERANCE)?;

    assert_eq!(
        graph.execution_order(),
        vec!["conv1", "act_relu", "act_sigmoid", "sum", "pool", "flatten", "fc"]
    );
    Ok(())
}

#[test]
fn graph_is_reusable_across_passes() -> Result<()> {
    let mut graph = RuntimeGraph::with_builtin_layers(diamond_description());
    graph.build("pnnx_input_0", "pnnx_output_0")?;
    let inputs = [constant_item(0.3, 0.7), constant_item(2.0, -1.0)];
    let first = graph.forward(&inputs, false)?;
    let second = graph.forward(&inputs, true)?;
    assert_eq!(first, second);
    assert!(graph.operators().iter().all(|op| op.meet_num == 0));

    let other = [constant_item(1.0, 2.0), constant_item(1.0, 2.0)];
    let third = graph.forward(&other, false)?;
    assert_tensor_close(&third[1], &expected_for(1.0, 2.0), TOLERANCE)?;
    Ok(())
}

#[test]
fn repeated_producer_feeds_both_operands() -> Result<()> {
    let plane = [1, 1, 2, 2];
    let description = GraphDescription::new()
        .with(input_op("in", &plane, &["square"]))
        .with(
            OperatorDesc::new("pnnx.Expression", "square")
                .input("in", &plane)
                .input("in", &plane)
                .output(&plane, &["out"])
                .param("expr", Parameter::Str("mul(@0,@1)".to_string())),
        )
        .with(output_op("out", "square", &plane));
    let mut graph = RuntimeGraph::with_builtin_layers(description);
    graph.build("in", "out")?;
    let input = Tensor::from_values(1, 2, 2, &[1.0, -2.0, 3.0, 0.5]);
    let outputs = graph.forward(&[input], false)?;
    assert_tensor_close(&outputs[0], &[1.0, 4.0, 9.0, 0.25], 0.0)
}
