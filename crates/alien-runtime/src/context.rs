//! Execution context shared by all cell functions during one token phase.

use alien_core::{
    effective_parameters_at, CellId, IdGenerator, SimulationParameters, SimulationParametersSpots,
    SpaceMetric, SpotValues, Vec2,
};
use alien_model::{CellGraph, EnergyParticle, SpatialGrid};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

/// Where a token ended up after it was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Not processed in this step, e.g. it sits on a blocked cell
    Idle,
    Executing,
    /// Moved to exactly one neighbor
    Forwarded,
    /// Energy returned to the host cell
    Consumed,
    /// Split among several neighbors
    Branched,
}

/// What a cell function did with a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionOutcome {
    /// The function was not triggered
    Idle,
    Executed,
    CellCreated(CellId),
    Attack { success: bool },
    MuscleActivity,
}

/// Everything a cell function may read or change besides the cell graph and
/// the token it runs on.
pub struct FunctionContext<'a> {
    pub parameters: &'a SimulationParameters,
    pub spots: &'a SimulationParametersSpots,
    pub rng: &'a mut ChaCha8Rng,
    pub ids: &'a mut IdGenerator,
    pub particles: &'a mut Vec<EnergyParticle>,
    space: SpaceMetric,
    /// Positions of all cells at the start of the phase, indexed like the
    /// graph. Cells built during the phase are not included.
    grid: SpatialGrid,
    /// Cells of clusters that already constructed in this step
    locked: HashSet<CellId>,
    external_energy: f64,
}

impl<'a> FunctionContext<'a> {
    pub fn new(
        parameters: &'a SimulationParameters,
        spots: &'a SimulationParametersSpots,
        rng: &'a mut ChaCha8Rng,
        ids: &'a mut IdGenerator,
        particles: &'a mut Vec<EnergyParticle>,
        graph: &CellGraph,
    ) -> Self {
        let space = *graph.space();
        let grid = SpatialGrid::build(
            space,
            parameters.cell_function_attacker_radius.max(1.0),
            graph.cells().iter().map(|c| c.pos),
        );
        Self {
            parameters,
            spots,
            rng,
            ids,
            particles,
            space,
            grid,
            locked: HashSet::new(),
            external_energy: 0.0,
        }
    }

    pub fn space(&self) -> &SpaceMetric {
        &self.space
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn spot_values_at(&self, pos: Vec2) -> SpotValues {
        effective_parameters_at(self.parameters, self.spots, &self.space, pos)
    }

    pub fn is_locked(&self, cell: CellId) -> bool {
        self.locked.contains(&cell)
    }

    /// Prevent further constructions by the cluster of `cell` in this step.
    pub fn lock_cluster(&mut self, graph: &CellGraph, cell: CellId) {
        self.locked.extend(graph.find_cluster(cell));
    }

    /// Record energy that entered the world from outside.
    pub fn inject_external_energy(&mut self, amount: f64) {
        self.external_energy += amount;
    }

    pub fn external_energy(&self) -> f64 {
        self.external_energy
    }

    pub fn emit_particle(&mut self, pos: Vec2, vel: Vec2, energy: f64, color: u8) {
        if energy <= 0.0 {
            return;
        }
        let id = self.ids.next_particle_id();
        self.particles
            .push(EnergyParticle::new(id, self.space.correct_position(pos), vel, energy, color));
    }
}
