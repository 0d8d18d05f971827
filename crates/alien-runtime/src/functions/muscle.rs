//! Muscle: changes the rest length of the bond the token arrived through.
//! Non-relaxing commands also push the cluster along that bond.
//!
//! The push is an external impulse with no reaction on any other body, so
//! cluster momentum changes by `movement_acceleration` per cell. Kinetic
//! energy is not charged to the token.

use crate::context::{FunctionContext, FunctionOutcome};
use crate::registers::{muscle, MuscleInput, MuscleOutput};
use alien_core::CellId;
use alien_model::{CellGraph, Token};
use tracing::trace;

pub fn execute(
    graph: &mut CellGraph,
    host: CellId,
    token: &mut Token,
    ctx: &mut FunctionContext<'_>,
) -> FunctionOutcome {
    let input = MuscleInput::from_byte(token.read(muscle::INPUT));
    if input == MuscleInput::DoNothing {
        return FunctionOutcome::Idle;
    }
    let output = match actuate(graph, host, token.origin, input, ctx) {
        Ok(()) => MuscleOutput::Success,
        Err(output) => output,
    };
    trace!(event = "muscle_activity", cell_id = %host, ?input, ?output);
    token.write(muscle::OUTPUT, output.to_byte());
    match output {
        MuscleOutput::Success => FunctionOutcome::MuscleActivity,
        MuscleOutput::LimitReached => FunctionOutcome::Executed,
    }
}

fn actuate(
    graph: &mut CellGraph,
    host: CellId,
    origin: Option<CellId>,
    input: MuscleInput,
    ctx: &FunctionContext<'_>,
) -> Result<(), MuscleOutput> {
    let parameters = ctx.parameters;
    let cell = graph.cell(host).ok_or(MuscleOutput::LimitReached)?;
    let (origin, bond) = origin
        .and_then(|id| cell.connection_to(id).map(|c| (id, c.distance)))
        .ok_or(MuscleOutput::LimitReached)?;

    let delta = parameters.cell_function_muscle_contraction_expansion_delta;
    let distance = match input {
        MuscleInput::Contract | MuscleInput::ContractRelax => bond - delta,
        _ => bond + delta,
    };
    if distance < parameters.cell_min_distance || distance > graph.limits().max_binding_distance {
        return Err(MuscleOutput::LimitReached);
    }
    graph
        .set_connection_distance(host, origin, distance)
        .map_err(|_| MuscleOutput::LimitReached)?;

    let push = match input {
        MuscleInput::Contract => 1.0,
        MuscleInput::Expand => -1.0,
        _ => return Ok(()),
    };
    let direction = match (graph.cell(origin), graph.cell(host)) {
        (Some(from), Some(to)) => graph.space().displacement(from.pos, to.pos).normalized(),
        _ => return Ok(()),
    };
    if let Some(geometry) = graph.cluster_geometry(host) {
        let vel = geometry.vel + direction * (push * parameters.cell_function_muscle_movement_acceleration);
        graph.set_cluster_motion(&geometry, vel, geometry.angular_vel);
    }
    Ok(())
}
