use anyhow::Result;
use cubeinfer::{element_add, element_multiply, Random, Tensor};

use crate::common::assert_tensor_close;

#[test]
fn fill_is_row_major_per_channel() -> Result<()> {
    let values: Vec<f32> = (0..12).map(|v| v as f32).collect();
    let tensor = Tensor::from_values(2, 2, 3, &values);
    assert_eq!(tensor.at(0, 0, 1), 1.0);
    assert_eq!(tensor.at(0, 1, 0), 3.0);
    assert_eq!(tensor.at(1, 1, 2), 11.0);
    // planes are column-major
    assert_eq!(tensor.index(1), 3.0);
    assert_eq!(tensor.values(), values);
    Ok(())
}

#[test]
fn reshape_relabels_view_moves() -> Result<()> {
    let values: Vec<f32> = (0..6).map(|v| v as f32).collect();
    let mut relabeled = Tensor::from_values(1, 2, 3, &values);
    let data = relabeled.data().to_vec();
    relabeled.reshape(&[3, 2]);
    assert_eq!(relabeled.raw_shapes(), &[3, 2]);
    assert_eq!(relabeled.data(), data.as_slice());

    let mut viewed = Tensor::from_values(1, 2, 3, &values);
    viewed.view(&[3, 2]);
    assert_eq!(viewed.shapes(), [1, 3, 2]);
    assert_tensor_close(&viewed, &values, 0.0)
}

#[test]
fn padding_surrounds_each_plane() {
    let mut tensor = Tensor::from_values(2, 1, 1, &[1.0, 2.0]);
    tensor.padding([1, 0, 0, 2], -1.0);
    assert_eq!(tensor.shapes(), [2, 2, 3]);
    assert_eq!(
        tensor.values(),
        vec![-1.0, -1.0, -1.0, 1.0, -1.0, -1.0, -1.0, -1.0, -1.0, 2.0, -1.0, -1.0]
    );
}

#[test]
fn flatten_and_raw_shapes() {
    let mut tensor = Tensor::new(2, 3, 4);
    assert_eq!(tensor.raw_shapes(), &[2, 3, 4]);
    tensor.flatten();
    assert_eq!(tensor.raw_shapes(), &[24]);
    assert_eq!(tensor.shapes(), [1, 24, 1]);
    assert_eq!(Tensor::new(1, 1, 5).raw_shapes(), &[5]);
    assert_eq!(Tensor::new(1, 4, 5).raw_shapes(), &[4, 5]);
}

#[test]
fn broadcast_keeps_operand_order() -> Result<()> {
    let full = Tensor::from_values(2, 1, 2, &[1.0, 2.0, 3.0, 4.0]);
    let scalars = Tensor::from_values(2, 1, 1, &[10.0, 100.0]);
    let sum = element_add(&scalars, &full);
    assert_tensor_close(&sum, &[11.0, 12.0, 103.0, 104.0], 0.0)?;
    let product = element_multiply(&full, &scalars);
    assert_tensor_close(&product, &[10.0, 20.0, 300.0, 400.0], 0.0)
}

#[test]
#[should_panic(expected = "not adapting")]
fn mismatched_shapes_are_fatal() {
    let _ = element_add(&Tensor::new(2, 2, 2), &Tensor::new(3, 2, 2));
}

#[test]
fn seeded_fill_is_reproducible() {
    let mut a = Tensor::new(2, 4, 4);
    let mut b = Tensor::new(2, 4, 4);
    a.rand(11);
    b.rand(11);
    assert_eq!(a, b);
    assert!(a.data().iter().all(|v| (-1.0..=1.0).contains(v)));
    let c = Random::generate(11, (0.0, 0.5), 1, 2, 2);
    assert!(c.data().iter().all(|v| (0.0..=0.5).contains(v)));
}
