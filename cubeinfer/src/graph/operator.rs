use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::ops::Layer;
use crate::tensor::Tensor;

use super::attribute::{Attribute, DataType};
use super::parameter::Parameter;

/// Edge carrying one tensor per batch item.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeOperand {
    pub name: String,
    /// Declared shape, batch first.
    pub shapes: Vec<i32>,
    pub datas: Vec<Tensor>,
    pub dtype: DataType,
}

impl RuntimeOperand {
    pub fn new(name: impl Into<String>, shapes: Vec<i32>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            shapes,
            datas: Vec::new(),
            dtype,
        }
    }

    /// Declared batch size, or `None` when absent or negative.
    pub fn batch(&self) -> Option<usize> {
        self.shapes
            .first()
            .and_then(|batch| usize::try_from(*batch).ok())
    }
}

/// Graph node bound to one layer.
pub struct RuntimeOperator {
    /// Number of producers that fired during the current pass.
    pub meet_num: usize,
    pub name: String,
    /// Registry key of the layer.
    pub kind: String,
    pub layer: Option<Box<dyn Layer>>,
    /// Consumers named by the output edges.
    pub output_names: Vec<String>,
    pub output_operand: Option<RuntimeOperand>,
    /// Producer name to the first position of its operand in
    /// `input_operands_seq`.
    pub input_operands: HashMap<String, usize>,
    pub input_operands_seq: Vec<RuntimeOperand>,
    /// Successor name to its index in the graph's operator list.
    pub output_operators: BTreeMap<String, usize>,
    pub params: HashMap<String, Parameter>,
    pub attrs: HashMap<String, Attribute>,
}

impl RuntimeOperator {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            meet_num: 0,
            name: name.into(),
            kind: kind.into(),
            layer: None,
            output_names: Vec::new(),
            output_operand: None,
            input_operands: HashMap::new(),
            input_operands_seq: Vec::new(),
            output_operators: BTreeMap::new(),
            params: HashMap::new(),
            attrs: HashMap::new(),
        }
    }

    /// Append an input edge. Repeated producers share one readiness slot.
    pub fn push_input(&mut self, operand: RuntimeOperand) {
        let position = self.input_operands_seq.len();
        self.input_operands
            .entry(operand.name.clone())
            .or_insert(position);
        self.input_operands_seq.push(operand);
    }

    pub fn param(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name)
    }

    /// Distinct producers feeding this operator.
    pub fn predecessor_count(&self) -> usize {
        self.input_operands.len()
    }

    pub fn is_ready(&self) -> bool {
        assert!(
            self.meet_num <= self.predecessor_count(),
            "operator {} saw {} arrivals for {} producers",
            self.name,
            self.meet_num,
            self.predecessor_count()
        );
        self.meet_num == self.predecessor_count()
    }

    /// Operand fed by `producer`, if any.
    pub fn input_operand(&self, producer: &str) -> Option<&RuntimeOperand> {
        self.input_operands
            .get(producer)
            .map(|position| &self.input_operands_seq[*position])
    }

    /// Every input operand fed by `producer`, in sequence order.
    pub fn input_operands_from_mut<'a>(
        &'a mut self,
        producer: &'a str,
    ) -> impl Iterator<Item = &'a mut RuntimeOperand> + 'a {
        self.input_operands_seq
            .iter_mut()
            .filter(move |operand| operand.name == producer)
    }
}

impl fmt::Debug for RuntimeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeOperator")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("meet_num", &self.meet_num)
            .field("inputs", &self.input_operands_seq.iter().map(|o| &o.name).collect::<Vec<_>>())
            .field("outputs", &self.output_names)
            .field("has_layer", &self.layer.is_some())
            .finish()
    }
}
