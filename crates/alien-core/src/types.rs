//! Core type definitions for the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of distinct cell colors.
pub const MAX_COLORS: usize = 7;

/// Hard upper bound for `cell_max_bonds`.
pub const MAX_CELL_BONDS: usize = 6;

/// Mass of a single cell. Cluster mass is the number of member cells.
pub const CELL_MASS: f64 = 1.0;

/// Unique identifier for a cell
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct CellId(pub u64);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an energy particle
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ParticleId(pub u64);

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out cell and particle ids for one engine instance.
///
/// Id 0 is never issued so that descriptions can use it for "not yet
/// assigned".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Make sure future ids are strictly greater than `id`.
    pub fn reserve_up_to(&mut self, id: u64) {
        if id >= self.next {
            self.next = id + 1;
        }
    }

    pub fn next_raw(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn next_cell_id(&mut self) -> CellId {
        CellId(self.next_raw())
    }

    pub fn next_particle_id(&mut self) -> ParticleId {
        ParticleId(self.next_raw())
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
