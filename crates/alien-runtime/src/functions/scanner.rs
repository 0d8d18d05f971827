//! Scanner: reports one cell of the host cluster per activation, walking the
//! cluster in breadth-first order.

use super::{reference_direction, relative_angle};
use crate::context::FunctionOutcome;
use crate::registers::{
    angle_to_byte, distance_to_byte, saturate, scanner, write_function_data, ScannerOutput,
};
use alien_core::{CellId, Vec2};
use alien_model::{CellGraph, Token};

pub fn execute(graph: &CellGraph, host: CellId, token: &mut Token) -> FunctionOutcome {
    let cluster: Vec<CellId> = graph.find_cluster(host).collect();
    if cluster.is_empty() {
        return FunctionOutcome::Idle;
    }
    let space = graph.space();
    let index = token.read(scanner::IN_OUT_CELL_NUMBER) as usize % cluster.len();
    let scanned = match graph.cell(cluster[index]) {
        Some(cell) => cell,
        None => return FunctionOutcome::Idle,
    };

    let position = |i: usize| graph.cell(cluster[i]).map_or(Vec2::ZERO, |c| c.pos);
    let (angle, distance) = if index == 0 {
        (0.0, 0.0)
    } else {
        let previous = position(index - 1);
        let segment = space.displacement(previous, scanned.pos);
        let reference = if index == 1 {
            reference_direction(graph, host, token)
        } else {
            space.displacement(position(index - 2), previous)
        };
        (relative_angle(reference, segment), segment.length())
    };

    token.write(scanner::OUT_ENERGY, saturate(scanned.energy));
    token.write(scanner::OUT_ANGLE, angle_to_byte(angle));
    token.write(scanner::OUT_DISTANCE, distance_to_byte(distance));
    token.write(scanner::OUT_CELL_MAX_CONNECTIONS, scanned.max_connections as u8);
    token.write(scanner::OUT_CELL_BRANCH_NUMBER, scanned.token_access_number);
    token.write(scanner::OUT_CELL_COLOR, scanned.color);
    token.write(scanner::OUT_CELL_FUNCTION, scanned.function.function_type().to_byte());
    write_function_data(token, scanner::OUT_CELL_FUNCTION_DATA, &scanned.function.data_bytes());

    let output = if index + 1 >= cluster.len() {
        token.write(scanner::IN_OUT_CELL_NUMBER, 0);
        ScannerOutput::Finished
    } else {
        token.write(scanner::IN_OUT_CELL_NUMBER, (index + 1) as u8);
        ScannerOutput::Success
    };
    token.write(scanner::OUTPUT, output.to_byte());
    FunctionOutcome::Executed
}
