//! Constructor: builds new cells next to the host.
//!
//! Cells under construction are token-blocked. A constructor continues an
//! existing construction site (a blocked neighbor) if there is one and
//! starts a new one otherwise. Finishing unblocks the site and may separate
//! it from the host.

use super::reference_direction;
use crate::context::{FunctionContext, FunctionOutcome};
use crate::mutation::{MutationConfig, Mutator};
use crate::registers::{
    byte_to_angle, byte_to_distance, constructor, read_function_data, ConstructorInput,
    ConstructorOption, ConstructorOutput, OffspringToken,
};
use alien_core::{CellId, MAX_COLORS};
use alien_model::{Cell, CellFunctionData, CellFunctionType, CellGraph, Token};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

pub fn execute(
    graph: &mut CellGraph,
    host: CellId,
    token: &mut Token,
    ctx: &mut FunctionContext<'_>,
) -> FunctionOutcome {
    if ConstructorInput::from_byte(token.read(constructor::INPUT)) != ConstructorInput::Construct {
        return FunctionOutcome::Idle;
    }
    match construct(graph, host, token, ctx) {
        Ok(id) => {
            token.write(constructor::OUTPUT, ConstructorOutput::Success.to_byte());
            FunctionOutcome::CellCreated(id)
        }
        Err(output) => {
            debug!(event = "construction_failed", cell_id = %host, ?output);
            token.write(constructor::OUTPUT, output.to_byte());
            FunctionOutcome::Executed
        }
    }
}

/// Build one cell. Nothing is changed when an error code is returned.
fn construct(
    graph: &mut CellGraph,
    host: CellId,
    token: &mut Token,
    ctx: &mut FunctionContext<'_>,
) -> Result<CellId, ConstructorOutput> {
    let parameters = ctx.parameters;
    if ctx.is_locked(host) {
        return Err(ConstructorOutput::ErrorLock);
    }

    let option = ConstructorOption::from_byte(token.read(constructor::IN_OPTION));
    let offspring_token = option.offspring_token();
    let offspring_token_energy = if offspring_token.is_some() {
        parameters.cell_function_constructor_offspring_token_energy
    } else {
        0.0
    };
    let required = parameters.cell_normal_energy + offspring_token_energy;
    let unlimited = parameters.cell_function_construction_unlimited_energy;
    if !unlimited && token.energy < required + parameters.token_min_energy {
        return Err(ConstructorOutput::ErrorNoEnergy);
    }

    let host_cell = graph.cell(host).ok_or(ConstructorOutput::ErrorConnection)?;
    let space = *graph.space();
    let site = host_cell
        .connections
        .iter()
        .map(|c| c.cell_id)
        .find(|id| graph.cell(*id).map_or(false, |c| c.token_blocked));
    let anchor_id = site.unwrap_or(host);
    let anchor = graph.cell(anchor_id).ok_or(ConstructorOutput::ErrorConnection)?;

    // placement
    let base_direction = match site {
        Some(_) => space.displacement(host_cell.pos, anchor.pos).normalized(),
        None => reference_direction(graph, host, token),
    };
    let mut angle = byte_to_angle(token.read(constructor::IN_OUT_ANGLE));
    let alignment = token.read(constructor::IN_ANGLE_ALIGNMENT) % 7;
    if alignment >= 2 {
        let step = 360.0 / f64::from(alignment);
        angle = (angle / step).round() * step;
    }
    let uniform = token.read(constructor::IN_UNIFORM_DIST) % 2 == 1;
    let dist_byte = token.read(constructor::IN_DIST);
    let distance = if uniform || dist_byte == 0 {
        parameters.cell_function_constructor_offspring_distance
    } else {
        byte_to_distance(dist_byte)
    };
    let pos = space.correct_position(anchor.pos + base_direction.rotated(angle) * distance);

    let obstructed = graph
        .cells()
        .iter()
        .any(|c| c.id != anchor_id && space.distance(c.pos, pos) < parameters.cell_min_distance);
    if obstructed {
        return Err(ConstructorOutput::ErrorDist);
    }

    // bonds
    let max_bonds = graph.limits().max_bonds;
    let requested = token.read(constructor::IN_CELL_MAX_CONNECTIONS) as usize % (max_bonds + 1);
    let max_connections = if requested == 0 { max_bonds } else { requested };
    let anchor_full = anchor.connections.len() >= anchor.max_connections.min(max_bonds);
    if max_connections == 0 || anchor_full || distance > graph.limits().max_binding_distance {
        return Err(ConstructorOutput::ErrorConnection);
    }

    // offspring
    let values = ctx.spot_values_at(pos);
    let function_type = CellFunctionType::from_byte(token.read(constructor::IN_CELL_FUNCTION));
    let data = read_function_data(token, constructor::IN_CELL_FUNCTION_DATA);
    let mut function = CellFunctionData::from_type_and_bytes(function_type, &data);
    Mutator::new(MutationConfig::from_spot_values(
        &values,
        parameters.computation_max_instructions,
    ))
    .mutate(&mut function, ctx.rng);

    let branch_number = token.read(constructor::IN_CELL_BRANCH_NUMBER);
    let color = if parameters.cell_function_construction_inherit_color {
        host_cell.color
    } else {
        token.read(constructor::IN_CELL_COLOR) % MAX_COLORS as u8
    };
    let id = ctx.ids.next_cell_id();
    let mut cell = Cell::new(id, pos, parameters.cell_normal_energy)
        .with_vel(anchor.vel)
        .with_color(color)
        .with_max_connections(max_connections)
        .with_function(function);
    cell.token_access_number = branch_number % parameters.cell_max_token_access_numbers.max(1);
    cell.execution_order_number = branch_number % parameters.cell_max_execution_order_numbers.max(1);
    cell.memory = vec![0; parameters.cell_memory_size];
    cell.token_blocked = !option.finishes();
    let access_number = cell.token_access_number;

    graph.add_cell(cell).map_err(|_| ConstructorOutput::ErrorConnection)?;
    if graph.add_connection(anchor_id, id).is_err() {
        graph.remove_cell(id);
        return Err(ConstructorOutput::ErrorConnection);
    }
    // tokens flow outwards into the construction only
    let _ = graph.set_arrow(id, anchor_id, false);

    if !option.separates() {
        connect_nearby_cells(graph, anchor_id, id, parameters.cell_function_constructor_connecting_cell_max_distance);
    }

    // pay
    if unlimited {
        ctx.inject_external_energy(required);
        debug!(event = "external_energy_injected", cell_id = %id, amount = required);
    } else {
        token.energy -= required;
    }

    if let Some(kind) = offspring_token {
        let memory = match kind {
            OffspringToken::Empty => vec![0; parameters.token_memory_size],
            OffspringToken::Duplicate => token.memory.clone(),
        };
        let mut offspring = Token::with_memory(offspring_token_energy, memory);
        offspring.set_access_number(access_number);
        offspring.origin = Some(anchor_id);
        if let Some(cell) = graph.cell_mut(id) {
            cell.tokens.push(offspring);
        }
    }

    if option.finishes() {
        unblock_construction(graph, id);
    }
    if option.separates() {
        let _ = graph.remove_connection(host, site.unwrap_or(id));
    }

    ctx.lock_cluster(graph, host);
    ctx.lock_cluster(graph, id);
    debug!(event = "cell_constructed", cell_id = %id, host = %host, ?option);
    Ok(id)
}

/// Bond the new cell to close cells of its own cluster. These bonds carry
/// no tokens.
fn connect_nearby_cells(graph: &mut CellGraph, anchor: CellId, new_cell: CellId, max_distance: f64) {
    let pos = match graph.cell(new_cell) {
        Some(cell) => cell.pos,
        None => return,
    };
    let nearby: Vec<CellId> = graph
        .find_cluster(anchor)
        .filter(|id| *id != anchor && *id != new_cell)
        .filter(|id| {
            graph
                .cell(*id)
                .map_or(false, |c| graph.space().distance(c.pos, pos) <= max_distance)
        })
        .collect();
    for other in nearby {
        if graph.add_connection(new_cell, other).is_ok() {
            let _ = graph.set_arrow(new_cell, other, false);
            let _ = graph.set_arrow(other, new_cell, false);
        }
    }
}

/// Unblock `start` and every blocked cell reachable through blocked cells.
fn unblock_construction(graph: &mut CellGraph, start: CellId) {
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(id) = queue.pop_front() {
        let neighbors: Vec<CellId> = graph.neighbors(id).collect();
        if let Some(cell) = graph.cell_mut(id) {
            cell.token_blocked = false;
        }
        for neighbor in neighbors {
            let blocked = graph.cell(neighbor).map_or(false, |c| c.token_blocked);
            if blocked && visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }
}
