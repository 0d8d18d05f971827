//! Tokens: energy packets with memory that travel along bonds.

use alien_core::CellId;
use serde::{Deserialize, Serialize};

/// Register holding the access number of a token.
pub const BRANCH_NUMBER: usize = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub energy: f64,
    pub memory: Vec<u8>,
    /// Cell the token was last forwarded from
    pub origin: Option<CellId>,
}

impl Token {
    pub fn new(energy: f64, memory_size: usize) -> Self {
        Self {
            energy,
            memory: vec![0; memory_size],
            origin: None,
        }
    }

    pub fn with_memory(energy: f64, memory: Vec<u8>) -> Self {
        Self {
            energy,
            memory,
            origin: None,
        }
    }

    /// Access number modulo the number of access numbers in use.
    pub fn access_number(&self, max_access_numbers: u8) -> u8 {
        let raw = self.memory.get(BRANCH_NUMBER).copied().unwrap_or(0);
        raw % max_access_numbers.max(1)
    }

    pub fn set_access_number(&mut self, access_number: u8) {
        if let Some(slot) = self.memory.get_mut(BRANCH_NUMBER) {
            *slot = access_number;
        }
    }

    /// Out-of-range reads yield 0 so that malformed register maps never
    /// fail.
    pub fn read(&self, register: usize) -> u8 {
        self.memory.get(register).copied().unwrap_or(0)
    }

    pub fn write(&mut self, register: usize, value: u8) {
        if let Some(slot) = self.memory.get_mut(register) {
            *slot = value;
        }
    }

    /// Copy `bytes` into memory starting at `register`, truncated at the end
    /// of memory.
    pub fn write_bytes(&mut self, register: usize, bytes: &[u8]) {
        if register >= self.memory.len() {
            return;
        }
        let end = (register + bytes.len()).min(self.memory.len());
        self.memory[register..end].copy_from_slice(&bytes[..end - register]);
    }

    pub fn read_bytes(&self, register: usize, len: usize) -> Vec<u8> {
        (register..register + len).map(|r| self.read(r)).collect()
    }
}
