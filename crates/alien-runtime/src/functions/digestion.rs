//! Attacker: drains energy from foreign cells in reach.

use super::{reference_direction, relative_angle};
use crate::context::{FunctionContext, FunctionOutcome};
use crate::registers::{color_filter, digestion, DigestionOutput};
use alien_core::{CellId, MAX_COLORS};
use alien_model::{CellFunctionType, CellGraph, Token};
use std::collections::HashSet;
use tracing::trace;

pub fn execute(
    graph: &mut CellGraph,
    host: CellId,
    token: &mut Token,
    ctx: &mut FunctionContext<'_>,
) -> FunctionOutcome {
    let (pos, vel, color, energy, bonds) = match graph.cell(host) {
        Some(c) => (c.pos, c.vel, c.color, c.energy, c.connections.len()),
        None => return FunctionOutcome::Idle,
    };
    let values = ctx.spot_values_at(pos);
    let parameters = ctx.parameters;

    // every activation costs energy, released as a particle
    let cost = values.cell_function_attacker_energy_cost.clamp(0.0, energy);
    if cost > 0.0 {
        if let Some(cell) = graph.cell_mut(host) {
            cell.energy -= cost;
        }
        ctx.emit_particle(pos, vel, cost, color);
    }

    let own: HashSet<CellId> = graph.find_cluster(host).collect();
    let filter = color_filter(token.read(digestion::IN_COLOR));
    let reference = reference_direction(graph, host, token);
    let targets: Vec<CellId> = ctx
        .grid()
        .within(pos, parameters.cell_function_attacker_radius)
        .into_iter()
        .filter_map(|i| graph.cells().get(i))
        .filter(|c| !own.contains(&c.id) && !c.barrier && c.energy > 0.0)
        .filter(|c| filter.map_or(true, |f| f == c.color))
        .map(|c| c.id)
        .collect();

    let mut gained = 0.0;
    let mut poisoned = false;
    for target_id in targets {
        let target = match graph.cell_mut(target_id) {
            Some(target) => target,
            None => continue,
        };
        let mut factor = values.cell_function_attacker_food_chain_color_matrix
            [color as usize % MAX_COLORS][target.color as usize % MAX_COLORS];
        if factor <= 0.0 {
            poisoned = true;
            continue;
        }
        if target.color != color {
            factor *= parameters.cell_function_attacker_color_inhomogeneity_factor;
        }
        let mismatch = (target.connections.len() as f64 - bonds as f64).abs();
        factor *= (1.0 - values.cell_function_attacker_connections_mismatch_penalty * mismatch).max(0.0);
        if values.cell_function_attacker_geometry_deviation_exponent > 0.0 {
            let direction = ctx.space().displacement(pos, target.pos);
            let deviation = relative_angle(reference, direction).abs() / 180.0;
            factor *= (1.0 - deviation).powf(values.cell_function_attacker_geometry_deviation_exponent);
        }

        let amount = target.energy * parameters.cell_function_attacker_strength * factor;
        target.energy -= amount;
        gained += amount;
    }

    let output = if gained > 0.0 {
        if let Some(cell) = graph.cell_mut(host) {
            cell.energy += gained;
        }
        distribute_energy(graph, host, gained, ctx);
        DigestionOutput::Success
    } else if poisoned {
        DigestionOutput::Poisoned
    } else {
        DigestionOutput::NoTarget
    };
    trace!(event = "attack", cell_id = %host, ?output, gained);
    token.write(digestion::OUTPUT, output.to_byte());
    FunctionOutcome::Attack {
        success: output == DigestionOutput::Success,
    }
}

/// Pass part of the captured energy to constructor cells of the own cluster.
fn distribute_energy(graph: &mut CellGraph, host: CellId, gained: f64, ctx: &FunctionContext<'_>) {
    let parameters = ctx.parameters;
    let amount = gained.min(parameters.cell_function_attacker_energy_distribution_value);
    let (pos, color) = match graph.cell(host) {
        Some(c) => (c.pos, c.color),
        None => return,
    };
    if amount <= 0.0 {
        return;
    }

    let receivers: Vec<CellId> = graph
        .find_cluster(host)
        .filter(|id| *id != host)
        .filter_map(|id| graph.cell(id))
        .filter(|c| c.function.function_type() == CellFunctionType::Constructor)
        .filter(|c| {
            !parameters.cell_function_attacker_energy_distribution_same_color || c.color == color
        })
        .filter(|c| {
            ctx.space().distance(pos, c.pos) <= parameters.cell_function_attacker_energy_distribution_radius
        })
        .map(|c| c.id)
        .collect();
    if receivers.is_empty() {
        return;
    }

    let share = amount / receivers.len() as f64;
    if let Some(cell) = graph.cell_mut(host) {
        cell.energy -= amount;
    }
    for id in receivers {
        if let Some(cell) = graph.cell_mut(id) {
            cell.energy += share;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::Fixture;
    use alien_model::CellFunctionData;

    fn total_energy(fixture: &Fixture) -> f64 {
        fixture.graph.cells().iter().map(|c| c.energy).sum::<f64>()
            + fixture.particles.iter().map(|p| p.energy).sum::<f64>()
    }

    fn attacker_fixture() -> (Fixture, CellId, CellId) {
        let mut parameters = alien_core::SimulationParameters::default();
        parameters.spot_values.cell_function_attacker_energy_cost = 1.0;
        parameters.spot_values.cell_function_attacker_connections_mismatch_penalty = 0.0;
        parameters.cell_function_attacker_strength = 0.1;
        let mut fixture = Fixture::with_parameters(parameters);
        let host = fixture.add_cell(1, 10.0, 10.0);
        let victim = fixture.add_cell(2, 11.0, 10.0);
        fixture.graph.cell_mut(host).unwrap().function = CellFunctionData::Digestion;
        (fixture, host, victim)
    }

    #[test]
    fn test_attack_drains_victim_and_conserves_energy() {
        let (mut fixture, host, victim) = attacker_fixture();
        let before = total_energy(&fixture);
        let mut token = Token::new(20.0, 256);
        token.write(digestion::IN_COLOR, 7);
        let outcome = {
            let (graph, mut ctx) = fixture.split();
            execute(graph, host, &mut token, &mut ctx)
        };
        assert_eq!(outcome, FunctionOutcome::Attack { success: true });
        assert_eq!(token.read(digestion::OUTPUT), DigestionOutput::Success.to_byte());
        assert!((fixture.graph.cell(victim).unwrap().energy - 90.0).abs() < 1e-9);
        assert!((fixture.graph.cell(host).unwrap().energy - 109.0).abs() < 1e-9);
        assert_eq!(fixture.particles.len(), 1);
        assert!((total_energy(&fixture) - before).abs() < 1e-9);
    }

    #[test]
    fn test_no_target_when_color_filtered() {
        let (mut fixture, host, _) = attacker_fixture();
        let mut token = Token::new(20.0, 256);
        token.write(digestion::IN_COLOR, 3);
        let (graph, mut ctx) = fixture.split();
        let outcome = execute(graph, host, &mut token, &mut ctx);
        assert_eq!(outcome, FunctionOutcome::Attack { success: false });
        assert_eq!(token.read(digestion::OUTPUT), DigestionOutput::NoTarget.to_byte());
    }

    #[test]
    fn test_poisoned_by_food_chain() {
        let (mut fixture, host, victim) = attacker_fixture();
        fixture.parameters.spot_values.cell_function_attacker_food_chain_color_matrix[0][0] = 0.0;
        let mut token = Token::new(20.0, 256);
        token.write(digestion::IN_COLOR, 7);
        {
            let (graph, mut ctx) = fixture.split();
            execute(graph, host, &mut token, &mut ctx);
        }
        assert_eq!(token.read(digestion::OUTPUT), DigestionOutput::Poisoned.to_byte());
        assert_eq!(fixture.graph.cell(victim).unwrap().energy, 100.0);
    }

    #[test]
    fn test_own_cluster_is_never_attacked() {
        let (mut fixture, host, victim) = attacker_fixture();
        fixture.graph.add_connection(host, victim).unwrap();
        let mut token = Token::new(20.0, 256);
        token.write(digestion::IN_COLOR, 7);
        {
            let (graph, mut ctx) = fixture.split();
            execute(graph, host, &mut token, &mut ctx);
        }
        assert_eq!(token.read(digestion::OUTPUT), DigestionOutput::NoTarget.to_byte());
        assert_eq!(fixture.graph.cell(victim).unwrap().energy, 100.0);
    }

    #[test]
    fn test_energy_distributed_to_constructors() {
        let (mut fixture, host, _) = attacker_fixture();
        let builder = fixture.add_cell(3, 10.0, 9.0);
        fixture.graph.cell_mut(builder).unwrap().function = CellFunctionData::Constructor;
        fixture.graph.add_connection(host, builder).unwrap();
        let mut token = Token::new(20.0, 256);
        token.write(digestion::IN_COLOR, 7);
        {
            let (graph, mut ctx) = fixture.split();
            execute(graph, host, &mut token, &mut ctx);
        }
        assert!((fixture.graph.cell(builder).unwrap().energy - 110.0).abs() < 1e-9);
        assert!((fixture.graph.cell(host).unwrap().energy - 99.0).abs() < 1e-9);
    }
}
