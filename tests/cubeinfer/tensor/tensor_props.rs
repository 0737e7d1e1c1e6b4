use cubeinfer::{physical_dims, Random, Tensor};
use proptest::prelude::*;

fn raw_shapes() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    // Two raw shapes of rank 1 to 3 over the same element count.
    (1usize..4, 1usize..4, 1usize..4).prop_flat_map(|(a, b, c)| {
        let total = a * b * c;
        let candidates = vec![
            vec![a, b, c],
            vec![a * b, c],
            vec![a, b * c],
            vec![total],
            vec![c, b, a],
            vec![c, a * b],
        ];
        let n = candidates.len();
        (0..n, 0..n).prop_map(move |(i, j)| (candidates[i].clone(), candidates[j].clone()))
    })
}

fn tensor_for(shape: &[usize], seed: u64) -> Tensor {
    let (c, r, w) = physical_dims(shape);
    let mut tensor = Random::generate(seed, (-1.0, 1.0), c, r, w);
    tensor.reshape(shape);
    tensor
}

proptest! {
    #[test]
    fn reshape_round_trip_keeps_flat_order((from, to) in raw_shapes(), seed in 0u64..1000) {
        let original = tensor_for(&from, seed);
        let mut tensor = original.clone();
        tensor.reshape(&to);
        prop_assert_eq!(tensor.data(), original.data());
        tensor.reshape(&from);
        prop_assert_eq!(tensor, original);
    }

    #[test]
    fn view_round_trip_is_bijection((from, to) in raw_shapes(), seed in 0u64..1000) {
        let original = tensor_for(&from, seed);
        let mut tensor = original.clone();
        tensor.view(&to);
        prop_assert_eq!(tensor.values(), original.values());
        tensor.view(&from);
        prop_assert_eq!(tensor, original);
    }
}
