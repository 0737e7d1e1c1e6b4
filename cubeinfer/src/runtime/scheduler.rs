use std::collections::VecDeque;
use std::mem;

use anyhow::{anyhow, Context, Result};

use crate::ops::InferStatus;
use crate::tensor::{operand_dims, Tensor};
use crate::timer::Timer;

use super::graph::{GraphState, RuntimeGraph};
use super::{INPUT_KIND, OUTPUT_KIND};

impl RuntimeGraph {
    /// Run one batch through the graph and return the output sentinel's
    /// input tensors.
    ///
    /// `debug` only adds per-operator-type timing to the log.
    pub fn forward(&mut self, inputs: &[Tensor], debug: bool) -> Result<Vec<Tensor>> {
        if self.state != GraphState::Complete {
            return Err(anyhow!("graph must be built before forward"));
        }
        let (input_index, output_index) = match (self.input_index, self.output_index) {
            (Some(input), Some(output)) => (input, output),
            _ => return Err(anyhow!("graph has no input or output operator")),
        };
        self.check_inputs(input_index, inputs)?;

        let mut timer = debug.then(Timer::new);
        let result = self.run_pass(input_index, output_index, inputs, timer.as_mut());
        for op in self.operators.iter_mut() {
            op.meet_num = 0;
        }
        let outputs = result?;

        if let Some(timer) = timer {
            for (kind, elapsed) in timer.entries() {
                crate::log!("{}: {:.3} ms", kind, elapsed.as_secs_f64() * 1e3);
            }
            crate::log!("total: {:.3} ms", timer.total().as_secs_f64() * 1e3);
        }
        Ok(outputs)
    }

    fn check_inputs(&self, input_index: usize, inputs: &[Tensor]) -> Result<()> {
        let op = &self.operators[input_index];
        let operand = op
            .output_operand
            .as_ref()
            .ok_or_else(|| anyhow!("input operator {} has no output operand", op.name))?;
        let batch = operand.batch().unwrap_or(0);
        if inputs.len() != batch {
            return Err(anyhow!(
                "graph expects a batch of {}, got {} tensors",
                batch,
                inputs.len()
            ));
        }
        let (channels, rows, cols) = operand_dims(&operand.shapes)
            .ok_or_else(|| anyhow!("input operand has unsupported shape {:?}", operand.shapes))?;
        for (i, input) in inputs.iter().enumerate() {
            if input.shapes() != [channels, rows, cols] {
                return Err(anyhow!(
                    "input {} has shape {:?}, graph expects ({}, {}, {})",
                    i,
                    input.shapes(),
                    channels,
                    rows,
                    cols
                ));
            }
        }
        Ok(())
    }

    fn run_pass(
        &mut self,
        input_index: usize,
        output_index: usize,
        inputs: &[Tensor],
        mut timer: Option<&mut Timer>,
    ) -> Result<Vec<Tensor>> {
        let record_order = self.execution_order.is_empty();
        let mut order = Vec::new();
        let mut queued = vec![false; self.operators.len()];
        let mut queue = VecDeque::from([input_index]);
        queued[input_index] = true;

        while let Some(index) = queue.pop_front() {
            if index == output_index {
                break;
            }
            if index == input_index {
                self.probe_successors(index, inputs, &mut queue, &mut queued)?;
                continue;
            }
            // only ready operators are ever queued
            debug_assert!(
                self.operators[index].is_ready(),
                "operator {} was queued before all producers fired",
                self.operators[index].name
            );

            let kind = self.operators[index].kind.clone();
            if let Some(timer) = timer.as_deref_mut() {
                timer.start(&kind);
            }
            self.run_operator(index)?;
            if let Some(timer) = timer.as_deref_mut() {
                timer.stop(&kind);
            }
            if record_order {
                order.push(index);
            }

            let outputs = match self.operators[index].output_operand.as_mut() {
                Some(operand) => mem::take(&mut operand.datas),
                None => Vec::new(),
            };
            let probed = self.probe_successors(index, &outputs, &mut queue, &mut queued);
            if let Some(operand) = self.operators[index].output_operand.as_mut() {
                operand.datas = outputs;
            }
            probed?;
        }

        let output = &self.operators[output_index];
        if output.meet_num != output.predecessor_count() || output.meet_num == 0 {
            return Err(anyhow!("output operator {} was never reached", output.name));
        }
        let [operand] = output.input_operands_seq.as_slice() else {
            return Err(anyhow!(
                "output operator {} must have exactly one input, has {}",
                output.name,
                output.input_operands_seq.len()
            ));
        };
        if record_order {
            self.execution_order = order;
        }
        Ok(operand.datas.clone())
    }

    fn run_operator(&mut self, index: usize) -> Result<()> {
        let op = &mut self.operators[index];
        let (name, kind) = (op.name.clone(), op.kind.clone());
        let layer = op
            .layer
            .as_ref()
            .ok_or_else(|| anyhow!("operator {} ({}) has no layer", name, kind))?;
        let operand = op
            .output_operand
            .as_mut()
            .ok_or_else(|| anyhow!("operator {} ({}) has no output operand", name, kind))?;

        let inputs: Vec<&Tensor> = op
            .input_operands_seq
            .iter()
            .flat_map(|operand| operand.datas.iter())
            .collect();
        let mut slots: Vec<Option<Tensor>> = operand.datas.drain(..).map(Some).collect();
        let status = layer.forward(&inputs, &mut slots);
        let filled = slots.iter().all(Option::is_some);
        operand.datas = slots.into_iter().flatten().collect();

        status.with_context(|| format!("operator {} ({}) failed", name, kind))?;
        if !filled {
            return Err(anyhow::Error::new(InferStatus::OutputSizeError)
                .context(format!("operator {} ({}) left an output empty", name, kind)));
        }
        Ok(())
    }

    /// Copy `outputs` into every successor operand fed by `index` and mark the
    /// edge as arrived. Successors are queued once, when they become ready.
    fn probe_successors(
        &mut self,
        index: usize,
        outputs: &[Tensor],
        queue: &mut VecDeque<usize>,
        queued: &mut [bool],
    ) -> Result<()> {
        let producer = self.operators[index].name.clone();
        let successors: Vec<usize> = self.operators[index]
            .output_operators
            .values()
            .copied()
            .collect();
        for next in successors {
            let successor = &mut self.operators[next];
            if successor.input_operand(&producer).is_none() {
                crate::warning!(
                    "{} names {} as consumer but takes no input from it",
                    producer,
                    successor.name
                );
                continue;
            }
            let successor_name = successor.name.clone();
            for operand in successor.input_operands_from_mut(&producer) {
                if operand.datas.len() != outputs.len() {
                    return Err(anyhow!(
                        "operand {} of {} holds {} tensors, producer emitted {}",
                        operand.name,
                        successor_name,
                        operand.datas.len(),
                        outputs.len()
                    ));
                }
                for (dst, src) in operand.datas.iter_mut().zip(outputs) {
                    dst.copy_from(src);
                }
            }
            successor.meet_num += 1;
            if successor.is_ready() && !queued[next] {
                queued[next] = true;
                queue.push_back(next);
            }
        }
        Ok(())
    }
}
