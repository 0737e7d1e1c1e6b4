use super::Tensor;

/// Elementwise sum of two tensors.
///
/// Shapes must match, or one side must be `(C, 1, 1)` with the same channel
/// count, in which case its per-channel value is broadcast across the plane.
pub fn element_add(lhs: &Tensor, rhs: &Tensor) -> Tensor {
    combine(lhs, rhs, |a, b| a + b)
}

/// Elementwise product with the same broadcast rule as [`element_add`].
pub fn element_multiply(lhs: &Tensor, rhs: &Tensor) -> Tensor {
    combine(lhs, rhs, |a, b| a * b)
}

fn combine<F>(lhs: &Tensor, rhs: &Tensor, op: F) -> Tensor
where
    F: Fn(f32, f32) -> f32,
{
    if lhs.shapes() == rhs.shapes() {
        let mut out = lhs.clone();
        for (dst, src) in out.data_mut().iter_mut().zip(rhs.data()) {
            *dst = op(*dst, *src);
        }
        return out;
    }

    assert_eq!(
        lhs.channels(),
        rhs.channels(),
        "tensor shapes {:?} and {:?} are not adapting",
        lhs.shapes(),
        rhs.shapes()
    );
    // Broadcast operand is always the (C, 1, 1) side; op order is preserved.
    let (full, scalar, scalar_on_left) = if rhs.plane_size() == 1 {
        (lhs, rhs, false)
    } else if lhs.plane_size() == 1 {
        (rhs, lhs, true)
    } else {
        panic!(
            "tensor shapes {:?} and {:?} are not adapting",
            lhs.shapes(),
            rhs.shapes()
        );
    };

    let mut out = Tensor::new(full.channels(), full.rows(), full.cols());
    for channel in 0..full.channels() {
        let value = scalar.index(channel);
        let src = full.channel(channel);
        for (dst, x) in out.channel_mut(channel).iter_mut().zip(src) {
            *dst = if scalar_on_left {
                op(value, *x)
            } else {
                op(*x, value)
            };
        }
    }
    out
}
