use anyhow::{anyhow, Context, Result};

use crate::graph::{DataType, RuntimeOperand};
use crate::tensor::{operand_dims, Tensor};

use super::graph::{GraphState, RuntimeGraph};
use super::{INPUT_KIND, OUTPUT_KIND};

impl RuntimeGraph {
    /// Instantiate layers and allocate operand storage.
    ///
    /// Runs [`RuntimeGraph::init`] first when needed. Building a complete
    /// graph again is a no-op.
    pub fn build(&mut self, input_name: &str, output_name: &str) -> Result<()> {
        match self.state {
            GraphState::Complete => {
                crate::trace!("graph is already built");
                return Ok(());
            }
            GraphState::NeedInit => self.init()?,
            GraphState::NeedBuild => {}
        }

        let input_index = self.sentinel(input_name, INPUT_KIND)?;
        let output_index = self.sentinel(output_name, OUTPUT_KIND)?;

        let registry = self.registry.clone();
        for op in self.operators.iter_mut() {
            if op.kind == INPUT_KIND || op.kind == OUTPUT_KIND {
                continue;
            }
            op.layer = Some(registry.create_layer(op)?);
        }

        for op in self.operators.iter_mut() {
            for operand in op.input_operands_seq.iter_mut() {
                if operand.dtype != DataType::Float32 {
                    return Err(anyhow!(
                        "input operand {} of {} is not float32",
                        operand.name,
                        op.name
                    ));
                }
                allocate_operand(operand)
                    .with_context(|| format!("input operand of operator {}", op.name))?;
            }

            let Some(desc) = self.description.operators.iter().find(|d| d.name == op.name) else {
                continue;
            };
            match desc.outputs.as_slice() {
                [] => {}
                [output] => {
                    let dtype = DataType::from_code(output.dtype)?;
                    let operand = op.output_operand.get_or_insert_with(|| {
                        RuntimeOperand::new(
                            format!("{}_output", op.name),
                            output.shape.clone(),
                            dtype,
                        )
                    });
                    allocate_operand(operand)
                        .with_context(|| format!("output operand of operator {}", op.name))?;
                }
                outputs => {
                    return Err(anyhow!(
                        "operator {} declares {} outputs, only one is supported",
                        op.name,
                        outputs.len()
                    ))
                }
            }
        }

        self.input_index = Some(input_index);
        self.output_index = Some(output_index);
        self.execution_order.clear();
        self.state = GraphState::Complete;
        crate::trace!(
            "built graph from {} to {} with {} operators",
            input_name,
            output_name,
            self.operators.len()
        );
        Ok(())
    }

    fn sentinel(&self, name: &str, kind: &str) -> Result<usize> {
        let index = *self
            .operator_index
            .get(name)
            .ok_or_else(|| anyhow!("graph has no operator named {}", name))?;
        let op = &self.operators[index];
        if op.kind != kind {
            return Err(anyhow!(
                "operator {} has type {}, expected {}",
                name,
                op.kind,
                kind
            ));
        }
        Ok(index)
    }
}

/// Allocate one tensor per batch item, or check existing storage against
/// the declared shape.
fn allocate_operand(operand: &mut RuntimeOperand) -> Result<()> {
    let batch = operand.batch().ok_or_else(|| {
        anyhow!(
            "operand {} has shape {:?} without a valid batch",
            operand.name,
            operand.shapes
        )
    })?;
    let (channels, rows, cols) = operand_dims(&operand.shapes).ok_or_else(|| {
        anyhow!(
            "operand {} has unsupported shape {:?}",
            operand.name,
            operand.shapes
        )
    })?;

    if operand.datas.is_empty() {
        operand.datas = (0..batch).map(|_| Tensor::new(channels, rows, cols)).collect();
        return Ok(());
    }
    if operand.datas.len() != batch {
        return Err(anyhow!(
            "operand {} holds {} tensors for batch {}",
            operand.name,
            operand.datas.len(),
            batch
        ));
    }
    for tensor in &operand.datas {
        if tensor.size() != channels * rows * cols {
            return Err(anyhow!(
                "operand {} holds a {:?} tensor, declared ({}, {}, {})",
                operand.name,
                tensor.shapes(),
                channels,
                rows,
                cols
            ));
        }
    }
    Ok(())
}
