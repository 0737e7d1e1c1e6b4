//! Graph executor: wiring, operand allocation and the dataflow pass.
mod builder;
mod graph;
mod scheduler;

pub use graph::{GraphState, RuntimeGraph};

/// Operator type of the graph input sentinel.
pub const INPUT_KIND: &str = "pnnx.Input";
/// Operator type of the graph output sentinel.
pub const OUTPUT_KIND: &str = "pnnx.Output";
