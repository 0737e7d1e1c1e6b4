//! Operand/operator graph model and the description it is built from.
mod attribute;
mod description;
mod operator;
mod parameter;

pub use attribute::{Attribute, DataType};
pub use description::{AttributeDesc, GraphDescription, OperandDesc, OperatorDesc, OutputDesc};
pub use operator::{RuntimeOperand, RuntimeOperator};
pub use parameter::Parameter;
