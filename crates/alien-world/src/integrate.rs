//! Integrate phase: forces, damping and motion of cells and particles.
//!
//! Forces are computed from a read-only view of the graph in parallel and
//! applied in a second pass, so the result does not depend on the number
//! of worker threads.

use alien_core::{
    effective_parameters_at, CellId, Settings, SpaceMetric, Vec2, ALIEN_PRECISION,
};
use alien_model::{CellGraph, ClusterIndex, SpatialGrid};
use rayon::prelude::*;
use std::collections::HashMap;

use crate::state::WorldState;

/// Spring constant of bonds, per unit of stretch.
pub const BOND_STIFFNESS: f64 = 0.5;

/// Bonds whose spring force exceeded the local maximum force.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrationReport {
    pub overstressed_bonds: Vec<(CellId, CellId)>,
}

struct CellForce {
    force: Vec2,
    overstressed: Vec<CellId>,
}

pub fn integrate(state: &mut WorldState, settings: &Settings) -> IntegrationReport {
    let space = *state.graph.space();
    let parameters = &settings.parameters;
    let dt = parameters.timestep_size;

    let forces = compute_forces(&state.graph, settings);

    let mut overstressed_bonds = Vec::new();
    let cells = state.graph.cells_mut();
    for (cell, force) in cells.iter_mut().zip(&forces) {
        for other in &force.overstressed {
            if cell.id < *other {
                overstressed_bonds.push((cell.id, *other));
            }
        }
        if cell.barrier {
            cell.vel = Vec2::ZERO;
            continue;
        }
        let values = effective_parameters_at(parameters, &settings.spots, &space, cell.pos);
        let mut vel = (cell.vel + force.force * dt) * (1.0 - values.friction);
        let speed = vel.length();
        if speed > parameters.cell_max_velocity && speed > ALIEN_PRECISION {
            vel = vel * (parameters.cell_max_velocity / speed);
        }
        cell.vel = vel;
    }

    apply_rigidity(&mut state.graph, settings);

    let cells = state.graph.cells_mut();
    cells.par_iter_mut().for_each(|cell| {
        cell.pos = space.correct_position(cell.pos + cell.vel * dt);
    });
    state.particles.par_iter_mut().for_each(|particle| {
        particle.pos = space.correct_position(particle.pos + particle.vel * dt);
    });

    IntegrationReport { overstressed_bonds }
}

/// Bond springs, repulsion between unbonded cells of the same cluster and
/// the flow field.
fn compute_forces(graph: &CellGraph, settings: &Settings) -> Vec<CellForce> {
    let space = *graph.space();
    let parameters = &settings.parameters;
    let repulsion_radius = parameters.cell_max_collision_distance;
    let grid = SpatialGrid::build(space, repulsion_radius.max(1.0), graph.cells().iter().map(|c| c.pos));
    let clusters = graph.cluster_index();
    let cells = graph.cells();

    (0..cells.len())
        .into_par_iter()
        .map(|i| {
            let cell = &cells[i];
            let mut force = settings.flow_field.acceleration_at(&space, cell.pos);
            let mut overstressed = Vec::new();
            let max_force = effective_parameters_at(parameters, &settings.spots, &space, cell.pos).cell_max_force;

            for connection in &cell.connections {
                let other = match graph.cell(connection.cell_id) {
                    Some(other) => other,
                    None => continue,
                };
                let delta = space.displacement(cell.pos, other.pos);
                let length = delta.length();
                if length <= ALIEN_PRECISION {
                    continue;
                }
                let spring = (length - connection.distance) * BOND_STIFFNESS;
                if spring.abs() > max_force {
                    overstressed.push(connection.cell_id);
                }
                force += delta * (spring / length);
            }

            for j in grid.within(cell.pos, repulsion_radius) {
                if j == i || !clusters.same_cluster(i, j) || cell.is_connected_to(cells[j].id) {
                    continue;
                }
                force += repulsion(&space, cell.pos, cells[j].pos, repulsion_radius, parameters.cell_repulsion_strength);
            }

            CellForce { force, overstressed }
        })
        .collect()
}

fn repulsion(space: &SpaceMetric, pos: Vec2, other: Vec2, radius: f64, strength: f64) -> Vec2 {
    let delta = space.displacement(other, pos);
    let distance = delta.length();
    if distance <= ALIEN_PRECISION || radius <= 0.0 {
        return Vec2::ZERO;
    }
    delta * (strength * (1.0 - distance / radius) / distance)
}

/// Blend every cell's velocity towards the rigid motion of its cluster.
fn apply_rigidity(graph: &mut CellGraph, settings: &Settings) {
    let space = *graph.space();
    let parameters = &settings.parameters;
    let rigidity: Vec<f64> = graph
        .cells()
        .iter()
        .map(|c| effective_parameters_at(parameters, &settings.spots, &space, c.pos).rigidity)
        .collect();
    if rigidity.iter().all(|r| *r <= 0.0) {
        return;
    }

    let clusters: ClusterIndex = graph.cluster_index();
    let mut rigid_velocities: HashMap<CellId, Vec2> = HashMap::new();
    for members in clusters.clusters() {
        if members.len() < 2 {
            continue;
        }
        let seed = graph.cells()[members[0]].id;
        if let Some(geometry) = graph.cluster_geometry(seed) {
            for (id, lever) in geometry.cell_ids.iter().zip(&geometry.levers) {
                let rigid = alien_core::physics::tangential_velocity(*lever, geometry.vel, geometry.angular_vel);
                rigid_velocities.insert(*id, rigid);
            }
        }
    }

    for (cell, rigidity) in graph.cells_mut().iter_mut().zip(rigidity) {
        if let Some(rigid) = rigid_velocities.get(&cell.id) {
            if !cell.barrier {
                cell.vel = cell.vel + (*rigid - cell.vel) * rigidity;
            }
        }
    }
}
