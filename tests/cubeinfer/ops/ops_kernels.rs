use anyhow::{anyhow, Result};
use cubeinfer::{
    AdaptiveAvgPoolingLayer, BatchNorm2dLayer, CatLayer, ConvolutionLayer, ExpressionLayer,
    InferStatus, Layer, Random, SoftmaxLayer, Tensor, ViewLayer,
};

use crate::common::{assert_close, assert_tensor_close, filled};

fn run(layer: &dyn Layer, inputs: &[&Tensor], batch: usize) -> Result<Vec<Tensor>> {
    let mut outputs = vec![None; batch];
    layer.forward(inputs, &mut outputs)?;
    outputs
        .into_iter()
        .map(|slot| slot.ok_or_else(|| anyhow!("layer left an output empty")))
        .collect()
}

#[test]
fn global_average_pool_is_channel_mean() -> Result<()> {
    let input = Random::generate(3, (-1.0, 1.0), 4, 7, 5);
    let outputs = run(&AdaptiveAvgPoolingLayer::new(1, 1), &[&input], 1)?;
    assert_eq!(outputs[0].shapes(), [4, 1, 1]);
    for channel in 0..4 {
        let plane = input.channel(channel);
        let mean = plane.iter().sum::<f32>() / plane.len() as f32;
        assert_close(outputs[0].at(channel, 0, 0), mean, 1e-5)?;
    }
    Ok(())
}

#[test]
fn unit_kernel_convolution_sums_window() -> Result<()> {
    let (in_channels, kernel) = (3usize, 3usize);
    let mut layer = ConvolutionLayer::new(2, in_channels, kernel, kernel, 0, 0, 1, 1, 1, false)?;
    layer.set_weights(&vec![1.0; 2 * in_channels * kernel * kernel])?;
    let value = 0.25f32;
    let batch = [filled(in_channels, 6, 5, value), filled(in_channels, 6, 5, value)];
    let outputs = run(&layer, &[&batch[0], &batch[1]], 2)?;
    let expected = value * (kernel * kernel * in_channels) as f32;
    for output in &outputs {
        assert_eq!(output.shapes(), [2, 4, 3]);
        assert!(output.data().iter().all(|v| (v - expected).abs() < 1e-5));
    }
    Ok(())
}

#[test]
fn padded_convolution_keeps_plane_size() -> Result<()> {
    let mut layer = ConvolutionLayer::new(1, 1, 3, 3, 1, 1, 1, 1, 1, true)?;
    layer.set_weights(&[1.0; 9])?;
    layer.set_bias(&[0.5])?;
    let outputs = run(&layer, &[&filled(1, 3, 3, 1.0)], 1)?;
    assert_tensor_close(
        &outputs[0],
        &[4.5, 6.5, 4.5, 6.5, 9.5, 6.5, 4.5, 6.5, 4.5],
        1e-6,
    )
}

#[test]
fn batchnorm_with_zero_scale_is_bias() -> Result<()> {
    let channels = 3;
    let mut layer = BatchNorm2dLayer::new(channels, 1e-5, vec![0.0; channels], vec![1.0; channels]);
    layer.set_weights(&vec![0.0; channels])?;
    layer.set_bias(&vec![1.0; channels])?;
    let input = Random::generate(5, (-4.0, 4.0), channels, 4, 4);
    let outputs = run(&layer, &[&input], 1)?;
    assert!(outputs[0].data().iter().all(|v| (v - 1.0).abs() < 1e-6));
    Ok(())
}

#[test]
fn expression_adds_and_multiplies() -> Result<()> {
    let layer = ExpressionLayer::new("add(@0,@1)")?;
    let ones = filled(2, 3, 3, 1.0);
    let outputs = run(&layer, &[&ones, &ones], 1)?;
    assert!(outputs[0].data().iter().all(|v| (v - 2.0).abs() < 1e-5));

    let layer = ExpressionLayer::new("mul(@2,add(@0,@1))")?;
    let (a, b, c) = (filled(2, 3, 3, 2.0), filled(2, 3, 3, 3.0), filled(2, 3, 3, 4.0));
    let outputs = run(&layer, &[&a, &b, &c], 1)?;
    assert!(outputs[0].data().iter().all(|v| (v - 20.0).abs() < 1e-5));
    Ok(())
}

#[test]
fn concat_groups_inputs_round_robin() -> Result<()> {
    let inputs: Vec<Tensor> = (0..4).map(|i| filled(2, 2, 2, i as f32)).collect();
    let refs: Vec<&Tensor> = inputs.iter().collect();
    let outputs = run(&CatLayer::new(1), &refs, 2)?;
    assert_eq!(outputs[0].shapes(), [4, 2, 2]);
    assert_eq!(outputs[1].shapes(), [4, 2, 2]);
    let channel_values = |t: &Tensor| (0..4).map(|c| t.at(c, 0, 0)).collect::<Vec<_>>();
    assert_eq!(channel_values(&outputs[0]), vec![0.0, 0.0, 2.0, 2.0]);
    assert_eq!(channel_values(&outputs[1]), vec![1.0, 1.0, 3.0, 3.0]);
    Ok(())
}

#[test]
fn softmax_matches_reference_values() -> Result<()> {
    let cases: [(&[f32], &[f32]); 4] = [
        (&[1.0, 2.0, 3.0], &[0.09003057, 0.24472847, 0.66524096]),
        (&[1.0, 1.0, 1.0], &[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]),
        (&[-1.0, -2.0, -3.0], &[0.66524096, 0.24472847, 0.09003057]),
        (
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            &[0.01165623, 0.03168492, 0.08612854, 0.23412166, 0.63640865],
        ),
    ];
    for (input, expected) in cases {
        let tensor = Tensor::from_values(1, 1, input.len(), input);
        let outputs = run(&SoftmaxLayer::new(), &[&tensor], 1)?;
        assert_tensor_close(&outputs[0], expected, 1e-6)?;
    }
    Ok(())
}

#[test]
fn view_reorders_across_channels() -> Result<()> {
    let values: Vec<f32> = (0..24).map(|v| v as f32).collect();
    let input = Tensor::from_values(2, 3, 4, &values);
    let layer = ViewLayer::new(vec![1, 4, -1])?;
    let outputs = run(&layer, &[&input], 1)?;
    assert_eq!(outputs[0].raw_shapes(), &[4, 6]);
    assert_eq!(outputs[0].at(0, 1, 0), 6.0);
    assert_tensor_close(&outputs[0], &values, 0.0)
}

#[test]
fn empty_batches_are_rejected() {
    let layer = AdaptiveAvgPoolingLayer::new(1, 1);
    let status = layer.forward(&[], &mut []);
    assert_eq!(status, Err(InferStatus::InputEmpty));

    let input = Tensor::new(1, 2, 2);
    let mut outputs = vec![None, None];
    let status = layer.forward(&[&input], &mut outputs);
    assert_eq!(status, Err(InferStatus::InputOutSizeAdaptingError));
}
