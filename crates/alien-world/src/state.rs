//! Live simulation content: the cell graph plus free energy particles.

use alien_core::{
    Error, IdGenerator, Result, SpaceMetric, TimestepData, ALIEN_PRECISION, MAX_COLORS,
};
use alien_model::{
    CellGraph, ClusteredDataDescription, DataDescription, EnergyParticle, GraphLimits,
    ParticleDescription,
};

#[derive(Debug, Clone)]
pub struct WorldState {
    pub graph: CellGraph,
    pub particles: Vec<EnergyParticle>,
    pub timestep: u64,
}

impl WorldState {
    pub fn new(space: SpaceMetric, limits: GraphLimits) -> Self {
        Self {
            graph: CellGraph::new(space, limits),
            particles: Vec::new(),
            timestep: 0,
        }
    }

    /// Build a world from a description and reserve its ids in `ids`.
    pub fn from_description(
        space: SpaceMetric,
        limits: GraphLimits,
        description: &DataDescription,
        ids: &mut IdGenerator,
    ) -> Result<Self> {
        let graph = CellGraph::from_description(space, limits, description)?;
        let particles: Vec<EnergyParticle> = description
            .particles
            .iter()
            .map(|p| {
                let mut particle = EnergyParticle::from(p);
                particle.pos = space.correct_position(particle.pos);
                particle
            })
            .collect();
        for cell in &description.cells {
            ids.reserve_up_to(cell.id.0);
        }
        for particle in &description.particles {
            ids.reserve_up_to(particle.id.0);
        }
        Ok(Self {
            graph,
            particles,
            timestep: 0,
        })
    }

    pub fn to_description(&self) -> DataDescription {
        let mut description = self.graph.to_description();
        description.particles = self.particles.iter().map(ParticleDescription::from).collect();
        description
    }

    pub fn to_clustered_description(&self) -> ClusteredDataDescription {
        let mut description = self.graph.to_clustered_description();
        description.particles = self.particles.iter().map(ParticleDescription::from).collect();
        description
    }

    /// Add content to the world. Ids already in use are rejected, use
    /// `description_helper::assign_new_ids` first when inserting copies.
    pub fn insert(&mut self, description: &DataDescription, ids: &mut IdGenerator) -> Result<()> {
        let mut merged = self.to_description();
        merged.add(description.clone());
        let timestep = self.timestep;
        *self = Self::from_description(
            *self.graph.space(),
            *self.graph.limits(),
            &merged,
            ids,
        )?;
        self.timestep = timestep;
        Ok(())
    }

    /// Energy of cells, tokens and particles.
    pub fn total_energy(&self) -> f64 {
        let cells: f64 = self
            .graph
            .cells()
            .iter()
            .map(|c| c.energy_including_tokens())
            .sum();
        cells + self.particles.iter().map(|p| p.energy).sum::<f64>()
    }

    pub fn num_tokens(&self) -> usize {
        self.graph.cells().iter().map(|c| c.tokens.len()).sum()
    }

    pub fn timestep_data(&self) -> TimestepData {
        let mut data = TimestepData::default();
        for cell in self.graph.cells() {
            data.num_cells_by_color[cell.color as usize % MAX_COLORS] += 1;
        }
        data.num_connections = self.graph.num_connections() as u64;
        data.num_particles = self.particles.len() as u64;
        data.num_tokens = self.num_tokens() as u64;
        data.total_energy = self.total_energy();
        data
    }

    /// Graph invariants plus finiteness of every physical quantity.
    pub fn check_invariants(&self) -> Result<()> {
        self.graph.check_invariants()?;
        for cell in self.graph.cells() {
            let finite = cell.energy.is_finite()
                && cell.pos.x.is_finite()
                && cell.pos.y.is_finite()
                && cell.vel.x.is_finite()
                && cell.vel.y.is_finite()
                && cell.tokens.iter().all(|t| t.energy.is_finite());
            if !finite {
                return Err(Error::InvalidState(format!(
                    "cell {} has a non-finite state",
                    cell.id
                )));
            }
            if cell.energy < -ALIEN_PRECISION {
                return Err(Error::InvalidState(format!(
                    "cell {} has negative energy {}",
                    cell.id, cell.energy
                )));
            }
        }
        for particle in &self.particles {
            if !particle.energy.is_finite() || !particle.pos.x.is_finite() || !particle.pos.y.is_finite() {
                return Err(Error::InvalidState(format!(
                    "particle {} has a non-finite state",
                    particle.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alien_core::{CellId, ParticleId, Vec2};
    use alien_model::{CellDescription, ConnectionDescription, TokenDescription};

    fn space() -> SpaceMetric {
        SpaceMetric::new(100.0, 100.0)
    }

    fn pair() -> DataDescription {
        let mut a = CellDescription::new(CellId(1), Vec2::new(10.0, 10.0));
        let mut b = CellDescription::new(CellId(2), Vec2::new(11.0, 10.0)).with_color(3);
        a.connections.push(ConnectionDescription {
            cell_id: CellId(2),
            distance: 1.0,
            arrow: true,
        });
        b.connections.push(ConnectionDescription {
            cell_id: CellId(1),
            distance: 1.0,
            arrow: true,
        });
        a.tokens.push(TokenDescription {
            energy: 20.0,
            memory: vec![0; 256],
            origin: None,
        });
        DataDescription {
            cells: vec![a, b],
            particles: vec![ParticleDescription {
                id: ParticleId(7),
                pos: Vec2::new(50.0, 50.0),
                vel: Vec2::ZERO,
                energy: 5.0,
                color: 0,
            }],
        }
    }

    #[test]
    fn test_description_round_trip_and_ids() {
        let mut ids = IdGenerator::new();
        let state = WorldState::from_description(space(), GraphLimits::default(), &pair(), &mut ids).unwrap();
        assert_eq!(state.to_description(), pair());
        assert_eq!(ids.next_raw(), 8);
    }

    #[test]
    fn test_timestep_data() {
        let mut ids = IdGenerator::new();
        let state = WorldState::from_description(space(), GraphLimits::default(), &pair(), &mut ids).unwrap();
        let data = state.timestep_data();
        assert_eq!(data.num_cells(), 2);
        assert_eq!(data.num_cells_by_color[3], 1);
        assert_eq!(data.num_connections, 1);
        assert_eq!(data.num_particles, 1);
        assert_eq!(data.num_tokens, 1);
        assert!((data.total_energy - 225.0).abs() < 1e-9);
    }

    #[test]
    fn test_insert_rejects_duplicate_ids() {
        let mut ids = IdGenerator::new();
        let mut state = WorldState::from_description(space(), GraphLimits::default(), &pair(), &mut ids).unwrap();
        let copy = pair();
        assert!(state.insert(&copy, &mut ids).is_err());
        assert_eq!(state.graph.len(), 2);

        let extra = DataDescription {
            cells: vec![CellDescription::new(CellId(20), Vec2::new(30.0, 30.0))],
            particles: Vec::new(),
        };
        state.insert(&extra, &mut ids).unwrap();
        assert_eq!(state.graph.len(), 3);
    }

    #[test]
    fn test_invariants_catch_non_finite_energy() {
        let mut ids = IdGenerator::new();
        let mut state = WorldState::from_description(space(), GraphLimits::default(), &pair(), &mut ids).unwrap();
        assert!(state.check_invariants().is_ok());
        state.graph.cell_mut(CellId(1)).unwrap().energy = f64::NAN;
        assert!(matches!(state.check_invariants(), Err(Error::InvalidState(_))));
    }
}
