//! Byte-code interpreter of computation cells.

use crate::context::{FunctionContext, FunctionOutcome};
use alien_core::CellId;
use alien_model::{
    Cell, CellFunctionData, CellGraph, ComputationData, ComputationOperation, Operand, OperandType,
    Token,
};

pub fn execute(
    graph: &mut CellGraph,
    host: CellId,
    token: &mut Token,
    ctx: &mut FunctionContext<'_>,
) -> FunctionOutcome {
    let max_instructions = ctx.parameters.computation_max_instructions;
    let cell = match graph.cell_mut(host) {
        Some(cell) => cell,
        None => return FunctionOutcome::Idle,
    };
    let Cell {
        function, memory, ..
    } = cell;
    match function {
        CellFunctionData::Computation(program) => {
            run(program, memory, &mut token.memory, max_instructions);
            FunctionOutcome::Executed
        }
        _ => FunctionOutcome::Idle,
    }
}

/// Addressable memories of one execution. Addresses wrap around the memory
/// size; an empty memory reads as 0 and ignores writes.
struct Memories<'a> {
    token: &'a mut [u8],
    cell: &'a mut [u8],
}

impl Memories<'_> {
    fn token_at(&self, address: u8) -> u8 {
        wrap(self.token.len(), address).map_or(0, |i| self.token[i])
    }

    fn read(&self, operand: Operand) -> u8 {
        match operand.kind {
            OperandType::Mem => self.token_at(operand.value),
            OperandType::MemMem => self.token_at(self.token_at(operand.value)),
            OperandType::Cmem => wrap(self.cell.len(), operand.value).map_or(0, |i| self.cell[i]),
            OperandType::Constant => operand.value,
        }
    }

    /// A constant destination addresses token memory like `[a]`.
    fn write(&mut self, operand: Operand, value: u8) {
        let slot = match operand.kind {
            OperandType::Mem | OperandType::Constant => {
                wrap(self.token.len(), operand.value).map(|i| &mut self.token[i])
            }
            OperandType::MemMem => {
                let address = self.token_at(operand.value);
                wrap(self.token.len(), address).map(|i| &mut self.token[i])
            }
            OperandType::Cmem => wrap(self.cell.len(), operand.value).map(|i| &mut self.cell[i]),
        };
        if let Some(slot) = slot {
            *slot = value;
        }
    }
}

fn wrap(len: usize, address: u8) -> Option<usize> {
    (len > 0).then(|| address as usize % len)
}

/// Execute at most `max_instructions` instructions of `program`.
///
/// Arithmetic wraps on bytes, division by zero yields 0 and comparisons
/// treat bytes as signed. Conditions nest; `else` and `endif` without an
/// open condition are ignored.
pub fn run(program: &ComputationData, cell_memory: &mut [u8], token_memory: &mut [u8], max_instructions: usize) {
    let mut memories = Memories {
        token: token_memory,
        cell: cell_memory,
    };
    let mut conditions: Vec<bool> = Vec::new();

    for instruction in program.instructions.iter().take(max_instructions) {
        let operation = instruction.operation;
        let executing = conditions.iter().all(|c| *c);

        if operation.is_condition() {
            let holds = executing && {
                let a = memories.read(instruction.operand1) as i8;
                let b = memories.read(instruction.operand2) as i8;
                compare(operation, a, b)
            };
            conditions.push(holds);
            continue;
        }
        match operation {
            ComputationOperation::Else => {
                if let Some(last) = conditions.last_mut() {
                    *last = !*last;
                }
                continue;
            }
            ComputationOperation::Endif => {
                conditions.pop();
                continue;
            }
            _ => {}
        }
        if !executing {
            continue;
        }

        let a = memories.read(instruction.operand1);
        let b = memories.read(instruction.operand2);
        let result = match operation {
            ComputationOperation::Mov => b,
            ComputationOperation::Add => a.wrapping_add(b),
            ComputationOperation::Sub => a.wrapping_sub(b),
            ComputationOperation::Mul => a.wrapping_mul(b),
            ComputationOperation::Div => {
                if b == 0 {
                    0
                } else {
                    (a as i8).wrapping_div(b as i8) as u8
                }
            }
            ComputationOperation::Xor => a ^ b,
            ComputationOperation::Or => a | b,
            ComputationOperation::And => a & b,
            _ => continue,
        };
        memories.write(instruction.operand1, result);
    }
}

fn compare(operation: ComputationOperation, a: i8, b: i8) -> bool {
    match operation {
        ComputationOperation::Ifg => a > b,
        ComputationOperation::Ifge => a >= b,
        ComputationOperation::Ife => a == b,
        ComputationOperation::Ifne => a != b,
        ComputationOperation::Ifle => a <= b,
        ComputationOperation::Ifl => a < b,
        _ => false,
    }
}
