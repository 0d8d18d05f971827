//! ApplyDecayAndRadiation phase: aging, color transitions, radiation and
//! the death of starving cells.
//!
//! Energy only changes form here. Whatever a cell radiates or still holds
//! when it dies is handed to a new energy particle.

use alien_core::{effective_parameters_at, CellId, IdGenerator, Settings, Vec2, MAX_COLORS};
use alien_model::{CellGraph, EnergyParticle};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeSet, HashSet};
use tracing::trace;

use crate::state::WorldState;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecayReport {
    pub color_transitions: usize,
    pub radiated_particles: usize,
    pub destroyed_cells: usize,
    /// Cells that died together with a starving member of their cluster
    pub decayed_cluster_cells: usize,
}

pub fn apply_decay_and_radiation(
    state: &mut WorldState,
    settings: &Settings,
    rng: &mut ChaCha8Rng,
    ids: &mut IdGenerator,
) -> DecayReport {
    let mut report = DecayReport {
        color_transitions: age_cells(&mut state.graph, settings),
        radiated_particles: radiate(state, settings, rng, ids),
        ..DecayReport::default()
    };

    let starving = starving_cells(&state.graph, settings);
    let mut doomed: BTreeSet<CellId> = starving.iter().copied().collect();
    if settings.parameters.cluster_decay && !starving.is_empty() {
        let mut affected = BTreeSet::new();
        for id in &starving {
            affected.extend(state.graph.find_cluster(*id));
        }
        for id in affected {
            if doomed.contains(&id) || state.graph.cell(id).map_or(true, |c| c.barrier) {
                continue;
            }
            if rng.gen::<f64>() < settings.parameters.cluster_decay_prob {
                doomed.insert(id);
                report.decayed_cluster_cells += 1;
            }
        }
    }
    report.destroyed_cells = destroy_cells(state, &doomed, ids);
    report
}

/// Age every cell by one step and apply due color transitions.
fn age_cells(graph: &mut CellGraph, settings: &Settings) -> usize {
    let space = *graph.space();
    let mut transitions = 0;
    for cell in graph.cells_mut() {
        cell.age = cell.age.saturating_add(1);
        let values = effective_parameters_at(&settings.parameters, &settings.spots, &space, cell.pos);
        let color = cell.color as usize % MAX_COLORS;
        let duration = values.cell_color_transition_duration[color];
        if duration > 0 && cell.age >= duration {
            cell.color = values.cell_color_transition_target_color[color];
            cell.age = 0;
            transitions += 1;
        }
    }
    transitions
}

fn radiate(state: &mut WorldState, settings: &Settings, rng: &mut ChaCha8Rng, ids: &mut IdGenerator) -> usize {
    let parameters = &settings.parameters;
    let space = *state.graph.space();
    let perturbation = parameters.radiation_velocity_perturbation;
    let mut emitted = 0;
    for cell in state.graph.cells_mut() {
        if cell.barrier || cell.age < parameters.radiation_min_cell_age {
            continue;
        }
        if rng.gen::<f64>() >= parameters.radiation_prob {
            continue;
        }
        let factor = effective_parameters_at(parameters, &settings.spots, &space, cell.pos).radiation_factor;
        let mut amount = cell.energy * factor;
        if cell.energy > parameters.radiation_min_cell_energy {
            amount += (cell.energy - parameters.radiation_min_cell_energy) * factor;
        }
        let amount = amount.min(cell.energy.max(0.0));
        if amount <= 0.0 {
            continue;
        }
        let jitter = Vec2::new(
            (rng.gen::<f64>() * 2.0 - 1.0) * perturbation,
            (rng.gen::<f64>() * 2.0 - 1.0) * perturbation,
        );
        let vel = cell.vel * parameters.radiation_velocity_multiplier + jitter;
        cell.energy -= amount;
        state
            .particles
            .push(EnergyParticle::new(ids.next_particle_id(), cell.pos, vel, amount, cell.color));
        emitted += 1;
    }
    emitted
}

/// Non-barrier cells below the local minimum energy, in graph order.
fn starving_cells(graph: &CellGraph, settings: &Settings) -> Vec<CellId> {
    let space = *graph.space();
    graph
        .cells()
        .iter()
        .filter(|cell| {
            !cell.barrier
                && cell.energy
                    < effective_parameters_at(&settings.parameters, &settings.spots, &space, cell.pos).cell_min_energy
        })
        .map(|cell| cell.id)
        .collect()
}

fn destroy_cells(state: &mut WorldState, doomed: &BTreeSet<CellId>, ids: &mut IdGenerator) -> usize {
    if doomed.is_empty() {
        return 0;
    }
    let doomed: HashSet<CellId> = doomed.iter().copied().collect();
    let removed = state.graph.remove_cells(&doomed);
    for cell in &removed {
        let energy = cell.energy_including_tokens();
        trace!(event = "cell_destroyed", cell_id = %cell.id, energy);
        if energy > 0.0 {
            state
                .particles
                .push(EnergyParticle::new(ids.next_particle_id(), cell.pos, cell.vel, energy, cell.color));
        }
    }
    removed.len()
}
