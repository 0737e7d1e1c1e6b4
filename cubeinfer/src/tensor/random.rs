use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Tensor;

/// Seeded uniform generator for filling tensors.
pub struct Random {
    rng: StdRng,
}

impl Random {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Build a `(channels, rows, cols)` tensor of uniform values in `range`.
    pub fn generate(
        seed: u64,
        range: (f32, f32),
        channels: usize,
        rows: usize,
        cols: usize,
    ) -> Tensor {
        let mut tensor = Tensor::new(channels, rows, cols);
        Self::with_seed(seed).fill(&mut tensor, range);
        tensor
    }

    /// Overwrite every element with the next values of the stream.
    pub fn fill(&mut self, tensor: &mut Tensor, range: (f32, f32)) {
        for value in tensor.data_mut() {
            *value = self.rng.gen_range(range.0..=range.1);
        }
    }
}

impl Tensor {
    /// Fill with seeded uniform values in `[-1, 1]`.
    pub fn rand(&mut self, seed: u64) {
        Random::with_seed(seed).fill(self, (-1.0, 1.0));
    }
}
