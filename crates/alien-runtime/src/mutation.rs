//! Mutation of cell function data copied by constructors.

use alien_core::SpotValues;
use alien_model::{
    CellFunctionData, CellFunctionType, ComputationData, ComputationInstruction, NeuralNetData,
    INSTRUCTION_SIZE,
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Probability of replacing each neural net byte
    pub neuron_data_rate: f64,
    /// Probability of replacing one byte of each computation instruction
    pub data_rate: f64,
    /// Probability of switching to another function type
    pub cell_function_rate: f64,
    /// Probability of inserting a random instruction
    pub insertion_rate: f64,
    /// Probability of deleting an instruction
    pub deletion_rate: f64,
    pub max_instructions: usize,
}

impl MutationConfig {
    pub fn from_spot_values(values: &SpotValues, max_instructions: usize) -> Self {
        Self {
            neuron_data_rate: values.mutation_neuron_data_probability,
            data_rate: values.mutation_data_probability,
            cell_function_rate: values.mutation_cell_function_probability,
            insertion_rate: values.mutation_insertion_probability,
            deletion_rate: values.mutation_deletion_probability,
            max_instructions,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.neuron_data_rate <= 0.0
            && self.data_rate <= 0.0
            && self.cell_function_rate <= 0.0
            && self.insertion_rate <= 0.0
            && self.deletion_rate <= 0.0
    }
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self::from_spot_values(&SpotValues::default(), 15)
    }
}

pub struct Mutator {
    config: MutationConfig,
}

impl Mutator {
    pub fn new(config: MutationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MutationConfig {
        &self.config
    }

    /// Mutate function data in place
    pub fn mutate(&self, function: &mut CellFunctionData, rng: &mut ChaCha8Rng) {
        if self.config.is_disabled() {
            return;
        }

        match function {
            CellFunctionData::Computation(data) => self.mutate_computation(data, rng),
            CellFunctionData::NeuralNet(data) => self.mutate_neural_net(data, rng),
            _ => {}
        }

        // Maybe switch the function, keeping the data bytes
        if rng.gen::<f64>() < self.config.cell_function_rate {
            let function_type = CellFunctionType::from_byte(rng.gen());
            *function = CellFunctionData::from_type_and_bytes(function_type, &function.data_bytes());
        }
    }

    fn mutate_neural_net(&self, data: &mut NeuralNetData, rng: &mut ChaCha8Rng) {
        for byte in &mut data.data {
            if rng.gen::<f64>() < self.config.neuron_data_rate {
                *byte = rng.gen();
            }
        }
    }

    fn mutate_computation(&self, data: &mut ComputationData, rng: &mut ChaCha8Rng) {
        for instruction in &mut data.instructions {
            if rng.gen::<f64>() < self.config.data_rate {
                let mut bytes = instruction.encode();
                bytes[rng.gen_range(0..INSTRUCTION_SIZE)] = rng.gen();
                *instruction = ComputationInstruction::decode(bytes);
            }
        }

        if rng.gen::<f64>() < self.config.deletion_rate && !data.instructions.is_empty() {
            let index = rng.gen_range(0..data.instructions.len());
            data.instructions.remove(index);
        }

        if rng.gen::<f64>() < self.config.insertion_rate
            && data.instructions.len() < self.config.max_instructions
        {
            let index = rng.gen_range(0..=data.instructions.len());
            data.instructions.insert(index, self.generate_random_instruction(rng));
        }
    }

    fn generate_random_instruction(&self, rng: &mut ChaCha8Rng) -> ComputationInstruction {
        ComputationInstruction::decode([rng.gen(), rng.gen(), rng.gen()])
    }
}
