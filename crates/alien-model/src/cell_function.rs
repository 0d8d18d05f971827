//! Cell functions and their data.
//!
//! Every cell carries exactly one [`CellFunctionData`]. Data travels through
//! token memory as raw bytes (constructor input, scanner output), so each
//! variant has a lossless byte codec: any byte string decodes to some valid
//! data and encoding that data again reproduces the bytes (up to the length
//! normalization of the variant).

use alien_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes per encoded computation instruction.
pub const INSTRUCTION_SIZE: usize = 3;

/// Inputs and outputs of the neural net function.
pub const NEURON_COUNT: usize = 8;

/// 8x8 weights followed by 8 biases, one byte each.
pub const NEURAL_NET_DATA_SIZE: usize = NEURON_COUNT * NEURON_COUNT + NEURON_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellFunctionType {
    Computation,
    NeuralNet,
    Scanner,
    Digestion,
    Constructor,
    Sensor,
    Muscle,
    None,
}

impl CellFunctionType {
    pub const ALL: [CellFunctionType; 8] = [
        CellFunctionType::Computation,
        CellFunctionType::NeuralNet,
        CellFunctionType::Scanner,
        CellFunctionType::Digestion,
        CellFunctionType::Constructor,
        CellFunctionType::Sensor,
        CellFunctionType::Muscle,
        CellFunctionType::None,
    ];

    /// Token registers hold arbitrary bytes, so every byte maps to a type.
    pub fn from_byte(byte: u8) -> Self {
        Self::ALL[byte as usize % Self::ALL.len()]
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComputationOperation {
    Mov,
    Add,
    Sub,
    Mul,
    Div,
    Xor,
    Or,
    And,
    Ifg,
    Ifge,
    Ife,
    Ifne,
    Ifle,
    Ifl,
    Else,
    Endif,
}

impl ComputationOperation {
    const ALL: [ComputationOperation; 16] = [
        ComputationOperation::Mov,
        ComputationOperation::Add,
        ComputationOperation::Sub,
        ComputationOperation::Mul,
        ComputationOperation::Div,
        ComputationOperation::Xor,
        ComputationOperation::Or,
        ComputationOperation::And,
        ComputationOperation::Ifg,
        ComputationOperation::Ifge,
        ComputationOperation::Ife,
        ComputationOperation::Ifne,
        ComputationOperation::Ifle,
        ComputationOperation::Ifl,
        ComputationOperation::Else,
        ComputationOperation::Endif,
    ];

    fn from_nibble(nibble: u8) -> Self {
        Self::ALL[(nibble & 0x0f) as usize]
    }

    /// Returns true for the six comparisons opening a conditional block
    pub fn is_condition(&self) -> bool {
        matches!(
            self,
            ComputationOperation::Ifg
                | ComputationOperation::Ifge
                | ComputationOperation::Ife
                | ComputationOperation::Ifne
                | ComputationOperation::Ifle
                | ComputationOperation::Ifl
        )
    }

    fn mnemonic(&self) -> &'static str {
        match self {
            ComputationOperation::Mov => "mov",
            ComputationOperation::Add => "add",
            ComputationOperation::Sub => "sub",
            ComputationOperation::Mul => "mul",
            ComputationOperation::Div => "div",
            ComputationOperation::Xor => "xor",
            ComputationOperation::Or => "or",
            ComputationOperation::And => "and",
            ComputationOperation::Ifg => ">",
            ComputationOperation::Ifge => ">=",
            ComputationOperation::Ife => "=",
            ComputationOperation::Ifne => "!=",
            ComputationOperation::Ifle => "<=",
            ComputationOperation::Ifl => "<",
            ComputationOperation::Else => "else",
            ComputationOperation::Endif => "endif",
        }
    }
}

/// How an operand byte is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandType {
    /// `[a]`: token memory at `a`
    Mem,
    /// `[[a]]`: token memory at the address stored in token memory at `a`
    MemMem,
    /// `(a)`: cell memory at `a`
    Cmem,
    /// `a`: the byte itself
    Constant,
}

impl OperandType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => OperandType::Mem,
            1 => OperandType::MemMem,
            2 => OperandType::Cmem,
            _ => OperandType::Constant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operand {
    pub kind: OperandType,
    pub value: u8,
}

impl Operand {
    pub fn mem(value: u8) -> Self {
        Self { kind: OperandType::Mem, value }
    }

    pub fn mem_mem(value: u8) -> Self {
        Self { kind: OperandType::MemMem, value }
    }

    pub fn cmem(value: u8) -> Self {
        Self { kind: OperandType::Cmem, value }
    }

    pub fn constant(value: u8) -> Self {
        Self { kind: OperandType::Constant, value }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OperandType::Mem => write!(f, "[{}]", self.value),
            OperandType::MemMem => write!(f, "[[{}]]", self.value),
            OperandType::Cmem => write!(f, "({})", self.value),
            OperandType::Constant => write!(f, "{}", self.value),
        }
    }
}

/// A single instruction of the computation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComputationInstruction {
    pub operation: ComputationOperation,
    pub operand1: Operand,
    pub operand2: Operand,
}

impl ComputationInstruction {
    pub fn new(operation: ComputationOperation, operand1: Operand, operand2: Operand) -> Self {
        Self {
            operation,
            operand1,
            operand2,
        }
    }

    /// `else` / `endif` carry no operands
    pub fn control(operation: ComputationOperation) -> Self {
        Self::new(operation, Operand::mem(0), Operand::mem(0))
    }

    /// Layout: `op << 4 | type1 << 2 | type2`, then both operand bytes.
    pub fn encode(&self) -> [u8; INSTRUCTION_SIZE] {
        let head = ((self.operation as u8) << 4)
            | ((self.operand1.kind as u8) << 2)
            | (self.operand2.kind as u8);
        [head, self.operand1.value, self.operand2.value]
    }

    pub fn decode(bytes: [u8; INSTRUCTION_SIZE]) -> Self {
        let head = bytes[0];
        Self {
            operation: ComputationOperation::from_nibble(head >> 4),
            operand1: Operand {
                kind: OperandType::from_bits(head >> 2),
                value: bytes[1],
            },
            operand2: Operand {
                kind: OperandType::from_bits(head),
                value: bytes[2],
            },
        }
    }
}

impl fmt::Display for ComputationInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.operation;
        match op {
            ComputationOperation::Else | ComputationOperation::Endif => write!(f, "{}", op.mnemonic()),
            _ if op.is_condition() => {
                write!(f, "if {} {} {}", self.operand1, op.mnemonic(), self.operand2)
            }
            _ => write!(f, "{} {}, {}", op.mnemonic(), self.operand1, self.operand2),
        }
    }
}

/// Program of a computation cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationData {
    pub instructions: Vec<ComputationInstruction>,
}

impl ComputationData {
    pub fn new(instructions: Vec<ComputationInstruction>) -> Self {
        Self { instructions }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.instructions.iter().flat_map(|i| i.encode()).collect()
    }

    /// Trailing bytes that do not form a whole instruction are dropped.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let instructions = bytes
            .chunks_exact(INSTRUCTION_SIZE)
            .map(|chunk| ComputationInstruction::decode([chunk[0], chunk[1], chunk[2]]))
            .collect();
        Self { instructions }
    }

    /// Compile source text, one instruction per line.
    ///
    /// ```text
    /// mov [1], 3
    /// if [1] > (0)
    ///   add [[2]], 0x10
    /// else
    ///   sub [2], [1]
    /// endif
    /// ```
    pub fn compile(source: &str) -> Result<Self> {
        let mut instructions = Vec::new();
        for (idx, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let instruction = compile_line(line)
                .map_err(|msg| Error::Validation(format!("line {}: {}", idx + 1, msg)))?;
            instructions.push(instruction);
        }
        Ok(Self { instructions })
    }

    /// Source text that compiles back to the same program, with nested
    /// blocks indented.
    pub fn decompile(&self) -> String {
        let mut out = String::new();
        let mut depth = 0usize;
        for instruction in &self.instructions {
            let op = instruction.operation;
            if matches!(op, ComputationOperation::Else | ComputationOperation::Endif) {
                depth = depth.saturating_sub(1);
            }
            out.push_str(&"  ".repeat(depth));
            out.push_str(&instruction.to_string());
            out.push('\n');
            if op.is_condition() || op == ComputationOperation::Else {
                depth += 1;
            }
        }
        out
    }
}

fn compile_line(line: &str) -> std::result::Result<ComputationInstruction, String> {
    let lower = line.to_ascii_lowercase();
    let (keyword, rest) = match lower.split_once(char::is_whitespace) {
        Some((k, r)) => (k, r.trim()),
        None => (lower.as_str(), ""),
    };

    match keyword {
        "else" | "endif" if rest.is_empty() => {
            let op = if keyword == "else" {
                ComputationOperation::Else
            } else {
                ComputationOperation::Endif
            };
            Ok(ComputationInstruction::control(op))
        }
        "if" => {
            let (a, comparator, b) = split_comparison(rest)?;
            let operation = match comparator {
                ">" => ComputationOperation::Ifg,
                ">=" => ComputationOperation::Ifge,
                "=" | "==" => ComputationOperation::Ife,
                "!=" => ComputationOperation::Ifne,
                "<=" => ComputationOperation::Ifle,
                "<" => ComputationOperation::Ifl,
                other => return Err(format!("unknown comparator '{}'", other)),
            };
            Ok(ComputationInstruction::new(
                operation,
                parse_operand(a)?,
                parse_operand(b)?,
            ))
        }
        _ => {
            let operation = match keyword {
                "mov" => ComputationOperation::Mov,
                "add" => ComputationOperation::Add,
                "sub" => ComputationOperation::Sub,
                "mul" => ComputationOperation::Mul,
                "div" => ComputationOperation::Div,
                "xor" => ComputationOperation::Xor,
                "or" => ComputationOperation::Or,
                "and" => ComputationOperation::And,
                other => return Err(format!("unknown instruction '{}'", other)),
            };
            let (a, b) = rest
                .split_once(',')
                .ok_or_else(|| "expected two operands separated by ','".to_string())?;
            let operand1 = parse_operand(a.trim())?;
            if operand1.kind == OperandType::Constant {
                return Err("first operand must be a memory reference".to_string());
            }
            Ok(ComputationInstruction::new(
                operation,
                operand1,
                parse_operand(b.trim())?,
            ))
        }
    }
}

fn split_comparison(text: &str) -> std::result::Result<(&str, &str, &str), String> {
    // two-character comparators first so that ">=" is not read as ">"
    for comparator in [">=", "<=", "!=", "==", ">", "<", "="] {
        if let Some(pos) = text.find(comparator) {
            let a = text[..pos].trim();
            let b = text[pos + comparator.len()..].trim();
            return Ok((a, comparator, b));
        }
    }
    Err(format!("expected a comparison in '{}'", text))
}

fn parse_operand(text: &str) -> std::result::Result<Operand, String> {
    if let Some(inner) = text.strip_prefix("[[").and_then(|t| t.strip_suffix("]]")) {
        return Ok(Operand::mem_mem(parse_number(inner)?));
    }
    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        return Ok(Operand::mem(parse_number(inner)?));
    }
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        return Ok(Operand::cmem(parse_number(inner)?));
    }
    Ok(Operand::constant(parse_number(text)?))
}

fn parse_number(text: &str) -> std::result::Result<u8, String> {
    let text = text.trim();
    let parsed = if let Some(hex) = text.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else {
        text.parse::<i64>()
    };
    match parsed {
        Ok(value) if (-128..=255).contains(&value) => Ok(value as u8),
        Ok(value) => Err(format!("value {} does not fit into a byte", value)),
        Err(_) => Err(format!("invalid number '{}'", text)),
    }
}

/// Weights and biases of a neural net cell, one signed byte each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeuralNetData {
    pub data: Vec<u8>,
}

impl Default for NeuralNetData {
    fn default() -> Self {
        Self {
            data: vec![0; NEURAL_NET_DATA_SIZE],
        }
    }
}

impl NeuralNetData {
    /// Weights are stored as signed bytes scaled by 1/32.
    const WEIGHT_SCALE: f64 = 32.0;

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = bytes.to_vec();
        data.resize(NEURAL_NET_DATA_SIZE, 0);
        Self { data }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Weight from input `from` to output `to`.
    pub fn weight(&self, from: usize, to: usize) -> f64 {
        self.signed(to * NEURON_COUNT + from)
    }

    pub fn bias(&self, neuron: usize) -> f64 {
        self.signed(NEURON_COUNT * NEURON_COUNT + neuron)
    }

    fn signed(&self, index: usize) -> f64 {
        self.data.get(index).map_or(0.0, |b| f64::from(*b as i8) / Self::WEIGHT_SCALE)
    }
}

/// Function of a cell together with its function-specific data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellFunctionData {
    Computation(ComputationData),
    NeuralNet(NeuralNetData),
    Scanner,
    Digestion,
    Constructor,
    Sensor,
    Muscle,
    None,
}

impl Default for CellFunctionData {
    fn default() -> Self {
        CellFunctionData::None
    }
}

impl CellFunctionData {
    pub fn function_type(&self) -> CellFunctionType {
        match self {
            CellFunctionData::Computation(_) => CellFunctionType::Computation,
            CellFunctionData::NeuralNet(_) => CellFunctionType::NeuralNet,
            CellFunctionData::Scanner => CellFunctionType::Scanner,
            CellFunctionData::Digestion => CellFunctionType::Digestion,
            CellFunctionData::Constructor => CellFunctionType::Constructor,
            CellFunctionData::Sensor => CellFunctionType::Sensor,
            CellFunctionData::Muscle => CellFunctionType::Muscle,
            CellFunctionData::None => CellFunctionType::None,
        }
    }

    /// Data part as it is written into token memory.
    pub fn data_bytes(&self) -> Vec<u8> {
        match self {
            CellFunctionData::Computation(data) => data.to_bytes(),
            CellFunctionData::NeuralNet(data) => data.to_bytes(),
            _ => Vec::new(),
        }
    }

    pub fn from_type_and_bytes(function_type: CellFunctionType, bytes: &[u8]) -> Self {
        match function_type {
            CellFunctionType::Computation => {
                CellFunctionData::Computation(ComputationData::from_bytes(bytes))
            }
            CellFunctionType::NeuralNet => CellFunctionData::NeuralNet(NeuralNetData::from_bytes(bytes)),
            CellFunctionType::Scanner => CellFunctionData::Scanner,
            CellFunctionType::Digestion => CellFunctionData::Digestion,
            CellFunctionType::Constructor => CellFunctionData::Constructor,
            CellFunctionType::Sensor => CellFunctionData::Sensor,
            CellFunctionType::Muscle => CellFunctionData::Muscle,
            CellFunctionType::None => CellFunctionData::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_encoding() {
        let instruction = ComputationInstruction::new(
            ComputationOperation::Add,
            Operand::mem_mem(2),
            Operand::constant(16),
        );
        let bytes = instruction.encode();
        assert_eq!(bytes, [0x1 << 4 | 1 << 2 | 3, 2, 16]);
        assert_eq!(ComputationInstruction::decode(bytes), instruction);
    }

    #[test]
    fn test_any_bytes_decode_and_reencode() {
        for head in 0..=255u8 {
            let bytes = [head, 7, 9];
            assert_eq!(ComputationInstruction::decode(bytes).encode(), bytes);
        }
    }

    #[test]
    fn test_compile_and_decompile() {
        let source = "mov [1], 3\nif [1] >= (0)\n  add [[2]], 0x10\nelse\n  sub [2], [1]\nendif\n";
        let data = ComputationData::compile(source).unwrap();
        assert_eq!(data.instructions.len(), 6);
        assert_eq!(data.instructions[1].operation, ComputationOperation::Ifge);
        assert_eq!(data.instructions[2].operand2, Operand::constant(16));
        assert_eq!(data.decompile(), source.replace("0x10", "16"));
        assert_eq!(ComputationData::compile(&data.decompile()).unwrap(), data);
    }

    #[test]
    fn test_compile_errors_name_the_line() {
        let err = ComputationData::compile("mov [1], 2\nfoo [1], 2").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        assert!(ComputationData::compile("mov 1, 2").is_err());
        assert!(ComputationData::compile("mov [1], 300").is_err());
        assert!(ComputationData::compile("if [1] ~ 2").is_err());
    }

    #[test]
    fn test_computation_bytes_drop_partial_instruction() {
        let data = ComputationData::from_bytes(&[0x10, 1, 2, 0xff]);
        assert_eq!(data.instructions.len(), 1);
        assert_eq!(data.to_bytes(), vec![0x10, 1, 2]);
    }

    #[test]
    fn test_neural_net_weights() {
        let mut bytes = vec![0u8; NEURAL_NET_DATA_SIZE];
        bytes[NEURON_COUNT + 3] = 32; // input 3 -> output 1
        bytes[NEURON_COUNT * NEURON_COUNT + 2] = (-64i8) as u8;
        let data = NeuralNetData::from_bytes(&bytes);
        assert_eq!(data.weight(3, 1), 1.0);
        assert_eq!(data.bias(2), -2.0);
        assert_eq!(NeuralNetData::from_bytes(&[1, 2]).data.len(), NEURAL_NET_DATA_SIZE);
    }

    #[test]
    fn test_function_type_from_byte_wraps() {
        assert_eq!(CellFunctionType::from_byte(4), CellFunctionType::Constructor);
        assert_eq!(CellFunctionType::from_byte(7), CellFunctionType::None);
        assert_eq!(CellFunctionType::from_byte(8), CellFunctionType::Computation);
        for t in CellFunctionType::ALL {
            assert_eq!(CellFunctionType::from_byte(t.to_byte()), t);
        }
    }

    #[test]
    fn test_function_data_roundtrip_through_bytes() {
        let data = CellFunctionData::Computation(
            ComputationData::compile("mov [3], (1)\nxor [4], 255").unwrap(),
        );
        let restored = CellFunctionData::from_type_and_bytes(data.function_type(), &data.data_bytes());
        assert_eq!(restored, data);
        assert_eq!(
            CellFunctionData::from_type_and_bytes(CellFunctionType::Muscle, &[1, 2, 3]),
            CellFunctionData::Muscle
        );
    }
}
