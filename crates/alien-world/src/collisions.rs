//! Collision detection and the ResolvePhysics phase.

use alien_core::physics::{self, BodyContact};
use alien_core::{effective_parameters_at, CellId, Settings, Vec2, ALIEN_PRECISION};
use alien_model::{CellGraph, ClusterGeometry, SpatialGrid};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use tracing::trace;

use crate::state::WorldState;

/// Stand-in mass of clusters containing barrier cells.
const BARRIER_MASS: f64 = 1.0e12;

/// Closest pair of cells between two different clusters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactCandidate {
    pub a: CellId,
    pub b: CellId,
    pub distance: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicsReport {
    pub collisions: usize,
    pub fusions: usize,
    pub decayed_bonds: usize,
    pub absorbed_particles: usize,
}

/// One candidate per pair of clusters whose cells come closer than
/// `cell_max_collision_distance`, ordered by the cluster labels.
pub fn detect_collisions(graph: &CellGraph, settings: &Settings) -> Vec<ContactCandidate> {
    let space = *graph.space();
    let radius = settings.parameters.cell_max_collision_distance;
    let cells = graph.cells();
    let grid = SpatialGrid::build(space, radius.max(1.0), cells.iter().map(|c| c.pos));
    let clusters = graph.cluster_index();

    let pairs: Vec<((usize, usize), ContactCandidate)> = (0..cells.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            let clusters = &clusters;
            let grid = &grid;
            grid.within(cells[i].pos, radius)
                .into_iter()
                .filter(move |j| *j > i && !clusters.same_cluster(i, *j))
                .map(move |j| {
                    let (la, lb) = (clusters.label(i), clusters.label(j));
                    let key = (la.min(lb), la.max(lb));
                    let candidate = ContactCandidate {
                        a: cells[i].id,
                        b: cells[j].id,
                        distance: space.distance(cells[i].pos, cells[j].pos),
                    };
                    (key, candidate)
                })
        })
        .collect();

    let mut closest: BTreeMap<(usize, usize), ContactCandidate> = BTreeMap::new();
    for (key, candidate) in pairs {
        closest
            .entry(key)
            .and_modify(|current| {
                if candidate.distance < current.distance {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }
    closest.into_values().collect()
}

/// Collide or fuse the candidate pairs, decay bonds and let cells absorb
/// particles.
pub fn resolve_physics(
    state: &mut WorldState,
    settings: &Settings,
    candidates: &[ContactCandidate],
    overstressed_bonds: &[(CellId, CellId)],
    rng: &mut ChaCha8Rng,
) -> PhysicsReport {
    let mut report = PhysicsReport::default();
    for candidate in candidates {
        match resolve_contact(&mut state.graph, settings, candidate) {
            ContactResult::Fused => report.fusions += 1,
            ContactResult::Collided => report.collisions += 1,
            ContactResult::Ignored => {}
        }
    }
    report.decayed_bonds = decay_bonds(&mut state.graph, settings, overstressed_bonds, rng);
    report.absorbed_particles = absorb_particles(state, settings);
    report
}

enum ContactResult {
    Fused,
    Collided,
    Ignored,
}

fn resolve_contact(graph: &mut CellGraph, settings: &Settings, candidate: &ContactCandidate) -> ContactResult {
    let space = *graph.space();
    let (a, b) = match (graph.cell(candidate.a), graph.cell(candidate.b)) {
        (Some(a), Some(b)) => (a, b),
        _ => return ContactResult::Ignored,
    };
    let values = effective_parameters_at(&settings.parameters, &settings.spots, &space, a.pos);
    let contact = a.pos + space.displacement(a.pos, b.pos) * 0.5;
    let normal = space.displacement(b.pos, a.pos).normalized();
    let bindable = !a.barrier
        && !b.barrier
        && a.energy <= values.cell_max_binding_energy
        && b.energy <= values.cell_max_binding_energy;

    let geometry_a = match graph.cluster_geometry(candidate.a) {
        Some(g) => g,
        None => return ContactResult::Ignored,
    };
    // an earlier contact of this step may already have merged the clusters
    if geometry_a.contains(candidate.b) {
        return ContactResult::Ignored;
    }
    let geometry_b = match graph.cluster_geometry(candidate.b) {
        Some(g) => g,
        None => return ContactResult::Ignored,
    };
    let body_a = body_contact(graph, &geometry_a, contact);
    let body_b = body_contact(graph, &geometry_b, contact);

    let v_ab = physics::tangential_velocity(
        space.displacement(geometry_a.center, contact),
        body_a.vel,
        body_a.angular_vel,
    ) - physics::tangential_velocity(
        space.displacement(geometry_b.center, contact),
        body_b.vel,
        body_b.angular_vel,
    );
    let approach = -v_ab.dot(&normal);
    if approach <= 0.0 {
        return ContactResult::Ignored;
    }

    if bindable && approach > values.cell_fusion_velocity {
        match graph.add_connection(candidate.a, candidate.b) {
            Ok(()) => {
                trace!(event = "clusters_fused", a = %candidate.a, b = %candidate.b);
                return ContactResult::Fused;
            }
            Err(err) => trace!(event = "fusion_refused", a = %candidate.a, b = %candidate.b, %err),
        }
    }

    let outcome = physics::collision(body_a, body_b, normal);
    graph.set_cluster_motion(&geometry_a, outcome.vel_a, outcome.angular_vel_a);
    graph.set_cluster_motion(&geometry_b, outcome.vel_b, outcome.angular_vel_b);
    ContactResult::Collided
}

fn body_contact(graph: &CellGraph, geometry: &ClusterGeometry, contact: Vec2) -> BodyContact {
    let fixed = geometry
        .cell_ids
        .iter()
        .any(|id| graph.cell(*id).map_or(false, |c| c.barrier));
    let mut body = geometry.contact(graph.space(), contact);
    if fixed {
        body.vel = Vec2::ZERO;
        body.angular_vel = 0.0;
        body.angular_mass = 0.0;
        body.mass = BARRIER_MASS;
    }
    body
}

/// Remove bonds that are stretched beyond the binding distance, whose cells
/// carry too much energy, or that were overstressed and lose the draw.
fn decay_bonds(
    graph: &mut CellGraph,
    settings: &Settings,
    overstressed_bonds: &[(CellId, CellId)],
    rng: &mut ChaCha8Rng,
) -> usize {
    let space = *graph.space();
    let parameters = &settings.parameters;
    let mut doomed: Vec<(CellId, CellId)> = Vec::new();
    for cell in graph.cells() {
        let values = effective_parameters_at(parameters, &settings.spots, &space, cell.pos);
        for connection in &cell.connections {
            if cell.id > connection.cell_id {
                continue;
            }
            let other = match graph.cell(connection.cell_id) {
                Some(other) => other,
                None => continue,
            };
            let stretched = space.distance(cell.pos, other.pos) > parameters.cell_max_binding_distance;
            let charged = cell.energy > values.cell_max_binding_energy
                || other.energy > values.cell_max_binding_energy;
            if stretched || charged {
                doomed.push((cell.id, connection.cell_id));
            }
        }
    }
    let already: HashSet<(CellId, CellId)> = doomed.iter().copied().collect();
    for bond in overstressed_bonds {
        if !already.contains(bond) && rng.gen::<f64>() < parameters.cell_max_force_decay_prob {
            doomed.push(*bond);
        }
    }

    let mut removed = 0;
    for (a, b) in doomed {
        if graph.remove_connection(a, b).is_ok() {
            trace!(event = "bond_decayed", a = %a, b = %b);
            removed += 1;
        }
    }
    removed
}

/// Each particle hands energy to the nearest cell in reach, scaled by the
/// absorption factor of the cell's color. Exhausted particles disappear.
fn absorb_particles(state: &mut WorldState, settings: &Settings) -> usize {
    let parameters = &settings.parameters;
    let space = *state.graph.space();
    let radius = parameters.cell_max_collision_distance;
    let grid = SpatialGrid::build(space, radius.max(1.0), state.graph.cells().iter().map(|c| c.pos));

    let mut absorbed = 0;
    let cells = state.graph.cells_mut();
    state.particles.retain_mut(|particle| {
        let index = match grid.nearest(particle.pos, radius, |i| cells[i].barrier) {
            Some(index) => index,
            None => return true,
        };
        let cell = &mut cells[index];
        let factor = parameters.radiation_absorption_by_cell_color[cell.color as usize % alien_core::MAX_COLORS];
        let amount = particle.energy * factor;
        cell.energy += amount;
        particle.energy -= amount;
        if particle.energy <= ALIEN_PRECISION {
            cell.energy += particle.energy;
            absorbed += 1;
            false
        } else {
            true
        }
    });
    absorbed
}
