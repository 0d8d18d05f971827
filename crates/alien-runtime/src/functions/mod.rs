//! Cell functions. Each one reads its inputs from token memory, acts on the
//! world and writes an output code back. Malformed inputs never fail: every
//! byte pattern selects some valid behavior.

pub mod computation;
pub mod constructor;
pub mod digestion;
pub mod muscle;
pub mod neural_net;
pub mod scanner;
pub mod sensor;

use crate::context::{FunctionContext, FunctionOutcome};
use alien_core::math::{angle_of_vector, normalize_angle, unit_vector_of_angle};
use alien_core::{CellId, Vec2};
use alien_model::{CellFunctionType, CellGraph, Token};

/// Run the function of `host` on `token`.
pub fn execute_function(
    graph: &mut CellGraph,
    host: CellId,
    token: &mut Token,
    ctx: &mut FunctionContext<'_>,
) -> FunctionOutcome {
    let function_type = match graph.cell(host) {
        Some(cell) => cell.function.function_type(),
        None => return FunctionOutcome::Idle,
    };
    match function_type {
        CellFunctionType::Computation => computation::execute(graph, host, token, ctx),
        CellFunctionType::NeuralNet => neural_net::execute(graph, host, token),
        CellFunctionType::Scanner => scanner::execute(graph, host, token),
        CellFunctionType::Digestion => digestion::execute(graph, host, token, ctx),
        CellFunctionType::Constructor => constructor::execute(graph, host, token, ctx),
        CellFunctionType::Sensor => sensor::execute(graph, host, token, ctx),
        CellFunctionType::Muscle => muscle::execute(graph, host, token, ctx),
        CellFunctionType::None => FunctionOutcome::Idle,
    }
}

/// Direction a token faces on its host: from the cell it came from towards
/// the host, else away from the cluster center, else angle 0.
pub(crate) fn reference_direction(graph: &CellGraph, host: CellId, token: &Token) -> Vec2 {
    let space = graph.space();
    let cell = match graph.cell(host) {
        Some(cell) => cell,
        None => return unit_vector_of_angle(0.0),
    };
    if let Some(origin) = token.origin.and_then(|id| graph.cell(id)) {
        let d = space.displacement(origin.pos, cell.pos);
        if !d.is_near_zero() {
            return d.normalized();
        }
    }
    if let Some(geometry) = graph.cluster_geometry(host) {
        let d = space.displacement(geometry.center, cell.pos);
        if !d.is_near_zero() {
            return d.normalized();
        }
    }
    unit_vector_of_angle(0.0)
}

/// Signed angle in degrees from `reference` to `direction`.
pub(crate) fn relative_angle(reference: Vec2, direction: Vec2) -> f64 {
    normalize_angle(angle_of_vector(direction) - angle_of_vector(reference))
}
