use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use crate::graph::{DataType, GraphDescription, RuntimeOperand, RuntimeOperator};
use crate::registry::LayerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    NeedInit,
    NeedBuild,
    Complete,
}

/// Executable form of a [`GraphDescription`].
///
/// Operators live in one arena and refer to each other by index. A graph is
/// driven through `init`, `build` and then any number of `forward` calls.
pub struct RuntimeGraph {
    pub(super) description: GraphDescription,
    pub(super) registry: Arc<LayerRegistry>,
    pub(super) state: GraphState,
    pub(super) operators: Vec<RuntimeOperator>,
    pub(super) operator_index: HashMap<String, usize>,
    pub(super) input_index: Option<usize>,
    pub(super) output_index: Option<usize>,
    pub(super) execution_order: Vec<usize>,
}

impl RuntimeGraph {
    pub fn new(description: GraphDescription, registry: Arc<LayerRegistry>) -> Self {
        Self {
            description,
            registry,
            state: GraphState::NeedInit,
            operators: Vec::new(),
            operator_index: HashMap::new(),
            input_index: None,
            output_index: None,
            execution_order: Vec::new(),
        }
    }

    /// Graph backed by the shared builtin registry.
    pub fn with_builtin_layers(description: GraphDescription) -> Self {
        Self::new(description, LayerRegistry::builtin())
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn operators(&self) -> &[RuntimeOperator] {
        &self.operators
    }

    pub fn operator(&self, name: &str) -> Option<&RuntimeOperator> {
        self.operator_index.get(name).map(|&index| &self.operators[index])
    }

    /// Names of compute operators in the order they fired during the first
    /// completed pass. Empty until a pass has run.
    pub fn execution_order(&self) -> Vec<&str> {
        self.execution_order
            .iter()
            .map(|&index| self.operators[index].name.as_str())
            .collect()
    }

    /// Create operators and operands from the description and wire each
    /// operator to the consumers its output edges name.
    pub fn init(&mut self) -> Result<()> {
        if self.description.is_empty() {
            return Err(anyhow!("graph description has no operators"));
        }
        let mut operators = Vec::with_capacity(self.description.operators.len());
        let mut operator_index = HashMap::new();
        for desc in &self.description.operators {
            if operator_index.contains_key(&desc.name) {
                return Err(anyhow!("operator name {} appears twice", desc.name));
            }
            let mut op = RuntimeOperator::new(desc.name.clone(), desc.kind.clone());
            for input in &desc.inputs {
                let dtype = DataType::from_code(input.dtype).unwrap_or(DataType::Unknown);
                op.push_input(RuntimeOperand::new(
                    input.producer.clone(),
                    input.shape.clone(),
                    dtype,
                ));
            }
            op.output_names = desc
                .outputs
                .iter()
                .flat_map(|output| output.consumers.iter().cloned())
                .collect();
            op.params = desc
                .params
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            for (name, attr) in &desc.attrs {
                let attr = attr
                    .to_attribute()
                    .with_context(|| format!("attribute {} of operator {}", name, desc.name))?;
                op.attrs.insert(name.clone(), attr);
            }
            operator_index.insert(desc.name.clone(), operators.len());
            operators.push(op);
        }

        for op in operators.iter_mut() {
            for consumer in &op.output_names {
                match operator_index.get(consumer) {
                    Some(&index) => {
                        op.output_operators.insert(consumer.clone(), index);
                    }
                    None => crate::warning!(
                        "operator {} names unknown consumer {}",
                        op.name,
                        consumer
                    ),
                }
            }
        }

        crate::trace!("initialized graph with {} operators", operators.len());
        self.operators = operators;
        self.operator_index = operator_index;
        self.input_index = None;
        self.output_index = None;
        self.execution_order.clear();
        self.state = GraphState::NeedBuild;
        Ok(())
    }
}
