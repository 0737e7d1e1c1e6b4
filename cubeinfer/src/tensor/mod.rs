mod elementwise;
mod random;
mod shape;
mod tensor;

pub use elementwise::{element_add, element_multiply};
pub use random::Random;
pub use shape::{default_raw_shape, infer_wildcard, numel, operand_dims, physical_dims};
pub use tensor::Tensor;
