//! Layer abstraction and the CPU kernels behind every registered operator.
pub mod cpu;
mod layer;
mod status;

pub(crate) use layer::{check_batch, prepare_output, store_output};
pub use layer::{Layer, ParamLayer};
pub use status::{InferStatus, ParseStatus};
