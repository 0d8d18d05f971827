//! Free energy particles.

use alien_core::{ParticleId, Vec2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyParticle {
    pub id: ParticleId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub energy: f64,
    pub color: u8,
}

impl EnergyParticle {
    pub fn new(id: ParticleId, pos: Vec2, vel: Vec2, energy: f64, color: u8) -> Self {
        Self {
            id,
            pos,
            vel,
            energy,
            color,
        }
    }
}
