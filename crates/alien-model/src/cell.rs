//! Cells and their bonds.

use crate::cell_function::CellFunctionData;
use crate::token::Token;
use alien_core::{CellId, Vec2, CELL_MASS, MAX_CELL_BONDS};
use serde::{Deserialize, Serialize};

/// One end of a bond. Both endpoints store an entry for the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub cell_id: CellId,
    /// Rest length captured when the bond was made
    pub distance: f64,
    /// Tokens may flow from the owning cell to `cell_id`
    pub arrow: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellMetadata {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub energy: f64,
    pub color: u8,
    pub max_connections: usize,
    pub connections: Vec<Connection>,
    pub token_access_number: u8,
    /// Set while the cell is under construction
    pub token_blocked: bool,
    pub execution_order_number: u8,
    pub function: CellFunctionData,
    pub memory: Vec<u8>,
    pub tokens: Vec<Token>,
    pub age: u32,
    /// Barrier cells never move
    pub barrier: bool,
    pub metadata: CellMetadata,
}

impl Cell {
    pub fn new(id: CellId, pos: Vec2, energy: f64) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            energy,
            color: 0,
            max_connections: MAX_CELL_BONDS,
            connections: Vec::new(),
            token_access_number: 0,
            token_blocked: false,
            execution_order_number: 0,
            function: CellFunctionData::None,
            memory: Vec::new(),
            tokens: Vec::new(),
            age: 0,
            barrier: false,
            metadata: CellMetadata::default(),
        }
    }

    pub fn with_vel(mut self, vel: Vec2) -> Self {
        self.vel = vel;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_function(mut self, function: CellFunctionData) -> Self {
        self.function = function;
        self
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.tokens.push(token);
        self
    }

    pub fn with_color(mut self, color: u8) -> Self {
        self.color = color;
        self
    }

    pub fn mass(&self) -> f64 {
        CELL_MASS
    }

    pub fn connection_to(&self, other: CellId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.cell_id == other)
    }

    pub fn connection_to_mut(&mut self, other: CellId) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.cell_id == other)
    }

    pub fn is_connected_to(&self, other: CellId) -> bool {
        self.connection_to(other).is_some()
    }

    pub fn has_free_token_slot(&self, max_tokens: usize) -> bool {
        self.tokens.len() < max_tokens
    }

    /// Energy of the cell plus all tokens it holds.
    pub fn energy_including_tokens(&self) -> f64 {
        self.energy + self.tokens.iter().map(|t| t.energy).sum::<f64>()
    }
}
