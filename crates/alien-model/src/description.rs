//! Plain data descriptions of simulation content.
//!
//! Descriptions are what editors, scene generators and transport deal with.
//! They mirror the live records field by field, so converting a well-formed
//! description into a live graph and back reproduces it exactly.

use crate::cell::{Cell, CellMetadata, Connection};
use crate::cell_function::CellFunctionData;
use crate::particle::EnergyParticle;
use crate::token::Token;
use alien_core::{CellId, Error, ParticleId, Result, Vec2, MAX_CELL_BONDS};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDescription {
    pub cell_id: CellId,
    pub distance: f64,
    pub arrow: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDescription {
    pub energy: f64,
    pub memory: Vec<u8>,
    pub origin: Option<CellId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDescription {
    pub id: CellId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub energy: f64,
    pub color: u8,
    pub max_connections: usize,
    pub connections: Vec<ConnectionDescription>,
    pub token_access_number: u8,
    pub token_blocked: bool,
    pub execution_order_number: u8,
    pub function: CellFunctionData,
    pub memory: Vec<u8>,
    pub tokens: Vec<TokenDescription>,
    pub age: u32,
    pub barrier: bool,
    pub metadata: CellMetadata,
}

impl Default for CellDescription {
    fn default() -> Self {
        Self {
            id: CellId(0),
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            energy: 100.0,
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
}

impl CellDescription {
    pub fn new(id: CellId, pos: Vec2) -> Self {
        Self {
            id,
            pos,
            ..Default::default()
        }
    }

    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = energy;
        self
    }

    pub fn with_vel(mut self, vel: Vec2) -> Self {
        self.vel = vel;
        self
    }

    pub fn with_color(mut self, color: u8) -> Self {
        self.color = color;
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

    pub fn with_token(mut self, token: TokenDescription) -> Self {
        self.tokens.push(token);
        self
    }

    pub fn with_barrier(mut self, barrier: bool) -> Self {
        self.barrier = barrier;
        self
    }

    pub fn is_connected_to(&self, other: CellId) -> bool {
        self.connections.iter().any(|c| c.cell_id == other)
    }
}

impl From<&Token> for TokenDescription {
    fn from(token: &Token) -> Self {
        Self {
            energy: token.energy,
            memory: token.memory.clone(),
            origin: token.origin,
        }
    }
}

impl From<&TokenDescription> for Token {
    fn from(desc: &TokenDescription) -> Self {
        Self {
            energy: desc.energy,
            memory: desc.memory.clone(),
            origin: desc.origin,
        }
    }
}

impl From<&Cell> for CellDescription {
    fn from(cell: &Cell) -> Self {
        Self {
            id: cell.id,
            pos: cell.pos,
            vel: cell.vel,
            energy: cell.energy,
            color: cell.color,
            max_connections: cell.max_connections,
            connections: cell
                .connections
                .iter()
                .map(|c| ConnectionDescription {
                    cell_id: c.cell_id,
                    distance: c.distance,
                    arrow: c.arrow,
                })
                .collect(),
            token_access_number: cell.token_access_number,
            token_blocked: cell.token_blocked,
            execution_order_number: cell.execution_order_number,
            function: cell.function.clone(),
            memory: cell.memory.clone(),
            tokens: cell.tokens.iter().map(TokenDescription::from).collect(),
            age: cell.age,
            barrier: cell.barrier,
            metadata: cell.metadata.clone(),
        }
    }
}

impl From<&CellDescription> for Cell {
    fn from(desc: &CellDescription) -> Self {
        Self {
            id: desc.id,
            pos: desc.pos,
            vel: desc.vel,
            energy: desc.energy,
            color: desc.color,
            max_connections: desc.max_connections,
            connections: desc
                .connections
                .iter()
                .map(|c| Connection {
                    cell_id: c.cell_id,
                    distance: c.distance,
                    arrow: c.arrow,
                })
                .collect(),
            token_access_number: desc.token_access_number,
            token_blocked: desc.token_blocked,
            execution_order_number: desc.execution_order_number,
            function: desc.function.clone(),
            memory: desc.memory.clone(),
            tokens: desc.tokens.iter().map(Token::from).collect(),
            age: desc.age,
            barrier: desc.barrier,
            metadata: desc.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleDescription {
    pub id: ParticleId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub energy: f64,
    pub color: u8,
}

impl From<&EnergyParticle> for ParticleDescription {
    fn from(particle: &EnergyParticle) -> Self {
        Self {
            id: particle.id,
            pos: particle.pos,
            vel: particle.vel,
            energy: particle.energy,
            color: particle.color,
        }
    }
}

impl From<&ParticleDescription> for EnergyParticle {
    fn from(desc: &ParticleDescription) -> Self {
        EnergyParticle::new(desc.id, desc.pos, desc.vel, desc.energy, desc.color)
    }
}

/// Flat list of cells and particles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataDescription {
    pub cells: Vec<CellDescription>,
    pub particles: Vec<ParticleDescription>,
}

impl DataDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.particles.is_empty()
    }

    pub fn add(&mut self, other: DataDescription) {
        self.cells.extend(other.cells);
        self.particles.extend(other.particles);
    }

    pub fn cell(&self, id: CellId) -> Option<&CellDescription> {
        self.cells.iter().find(|c| c.id == id)
    }

    /// Mean position of all cells and particles.
    pub fn center(&self) -> Vec2 {
        let count = self.cells.len() + self.particles.len();
        if count == 0 {
            return Vec2::ZERO;
        }
        let sum = self
            .cells
            .iter()
            .map(|c| c.pos)
            .chain(self.particles.iter().map(|p| p.pos))
            .fold(Vec2::ZERO, |acc, p| acc + p);
        sum / count as f64
    }

    /// Move every cell and particle by `delta`.
    pub fn shift(&mut self, delta: Vec2) {
        for cell in self.cells.iter_mut() {
            cell.pos += delta;
        }
        for particle in self.particles.iter_mut() {
            particle.pos += delta;
        }
    }

    /// Serialize the description to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a description from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Cells of one connected component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterDescription {
    pub cells: Vec<CellDescription>,
}

impl ClusterDescription {
    pub fn center(&self) -> Vec2 {
        if self.cells.is_empty() {
            return Vec2::ZERO;
        }
        let sum = self.cells.iter().fold(Vec2::ZERO, |acc, c| acc + c.pos);
        sum / self.cells.len() as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusteredDataDescription {
    pub clusters: Vec<ClusterDescription>,
    pub particles: Vec<ParticleDescription>,
}

impl ClusteredDataDescription {
    /// Concatenate all clusters, keeping the cell order within each.
    pub fn flatten(self) -> DataDescription {
        DataDescription {
            cells: self.clusters.into_iter().flat_map(|c| c.cells).collect(),
            particles: self.particles,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Either kind of simulation object, as returned by selection queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellOrParticleDescription {
    Cell(CellDescription),
    Particle(ParticleDescription),
}

impl CellOrParticleDescription {
    pub fn id(&self) -> u64 {
        match self {
            CellOrParticleDescription::Cell(cell) => cell.id.0,
            CellOrParticleDescription::Particle(particle) => particle.id.0,
        }
    }

    pub fn pos(&self) -> Vec2 {
        match self {
            CellOrParticleDescription::Cell(cell) => cell.pos,
            CellOrParticleDescription::Particle(particle) => particle.pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell_function::ComputationData;

    fn sample() -> DataDescription {
        let mut a = CellDescription::new(CellId(1), Vec2::new(1.0, 1.0))
            .with_function(CellFunctionData::Computation(
                ComputationData::compile("mov [1], 2").unwrap(),
            ))
            .with_token(TokenDescription {
                energy: 30.0,
                memory: vec![0, 1, 2],
                origin: None,
            });
        let mut b = CellDescription::new(CellId(2), Vec2::new(2.0, 1.0));
        a.connections.push(ConnectionDescription {
            cell_id: CellId(2),
            distance: 1.0,
            arrow: true,
        });
        b.connections.push(ConnectionDescription {
            cell_id: CellId(1),
            distance: 1.0,
            arrow: false,
        });
        DataDescription {
            cells: vec![a, b],
            particles: vec![ParticleDescription {
                id: ParticleId(3),
                pos: Vec2::new(5.0, 5.0),
                vel: Vec2::ZERO,
                energy: 12.0,
                color: 1,
            }],
        }
    }

    #[test]
    fn test_bytes_roundtrip() {
        let data = sample();
        let bytes = data.to_bytes().unwrap();
        assert_eq!(DataDescription::from_bytes(&bytes).unwrap(), data);
        assert!(DataDescription::from_bytes(&bytes[..3]).is_err());
    }

    #[test]
    fn test_cell_conversion_is_lossless() {
        let data = sample();
        let cell = Cell::from(&data.cells[0]);
        assert_eq!(CellDescription::from(&cell), data.cells[0]);
    }

    #[test]
    fn test_center_and_shift() {
        let mut data = sample();
        let center = data.center();
        data.shift(Vec2::new(1.0, -1.0));
        let moved = data.center();
        assert!((moved.x - center.x - 1.0).abs() < 1e-12);
        assert!((moved.y - center.y + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_flatten_keeps_order() {
        let data = sample();
        let clustered = ClusteredDataDescription {
            clusters: vec![
                ClusterDescription {
                    cells: vec![data.cells[1].clone()],
                },
                ClusterDescription {
                    cells: vec![data.cells[0].clone()],
                },
            ],
            particles: data.particles.clone(),
        };
        let flat = clustered.flatten();
        assert_eq!(flat.cells[0].id, CellId(2));
        assert_eq!(flat.cells[1].id, CellId(1));
        assert_eq!(flat.particles.len(), 1);
    }
}
