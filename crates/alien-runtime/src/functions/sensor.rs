//! Sensor: looks for foreign cell accumulations around the host.
//!
//! Distances are reported in whole units, saturating at 255.

use super::{reference_direction, relative_angle};
use crate::context::{FunctionContext, FunctionOutcome};
use crate::registers::{
    angle_to_byte, byte_to_angle, color_filter, saturate, sensor, SensorInput, SensorOutput,
};
use alien_core::math::normalize_angle;
use alien_core::{CellId, Vec2};
use alien_model::{CellGraph, Token};
use std::collections::HashSet;
use tracing::trace;

/// Radius around a candidate in which matching cells are counted.
pub const DENSITY_RADIUS: f64 = 2.0;
/// Half-width of the cone searched by `SearchByAngle`, in degrees.
pub const ANGLE_TOLERANCE: f64 = 15.0;
const MAX_CANDIDATES: usize = 64;

pub fn execute(
    graph: &mut CellGraph,
    host: CellId,
    token: &mut Token,
    ctx: &mut FunctionContext<'_>,
) -> FunctionOutcome {
    let input = SensorInput::from_byte(token.read(sensor::INPUT));
    if input == SensorInput::DoNothing {
        return FunctionOutcome::Idle;
    }
    let pos = match graph.cell(host) {
        Some(cell) => cell.pos,
        None => return FunctionOutcome::Idle,
    };
    let space = *ctx.space();
    let own: HashSet<CellId> = graph.find_cluster(host).collect();
    let filter = color_filter(token.read(sensor::IN_COLOR));
    let cells = graph.cells();
    let matches = |index: usize| {
        cells
            .get(index)
            .filter(|c| !own.contains(&c.id) && filter.map_or(true, |f| f == c.color))
    };

    let mut candidates: Vec<(f64, Vec2)> = ctx
        .grid()
        .within(pos, ctx.parameters.cell_function_sensor_range)
        .into_iter()
        .filter_map(|i| matches(i))
        .map(|c| (space.distance(pos, c.pos), c.pos))
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
    candidates.truncate(MAX_CANDIDATES);

    let reference = reference_direction(graph, host, token);
    let target_angle = byte_to_angle(token.read(sensor::IN_OUT_ANGLE));
    let min_density = token.read(sensor::IN_MIN_DENSITY) as usize;
    let max_density = token.read(sensor::IN_MAX_DENSITY) as usize;

    let found = candidates.into_iter().find_map(|(distance, candidate)| {
        let angle = relative_angle(reference, space.displacement(pos, candidate));
        if input == SensorInput::SearchByAngle
            && normalize_angle(angle - target_angle).abs() > ANGLE_TOLERANCE
        {
            return None;
        }
        let density = ctx
            .grid()
            .within(candidate, DENSITY_RADIUS)
            .into_iter()
            .filter(|i| matches(*i).is_some())
            .count();
        let accepted = min_density <= density && (max_density == 0 || density <= max_density);
        accepted.then_some((distance, angle, density))
    });

    let output = match found {
        Some((distance, angle, density)) => {
            token.write(sensor::OUT_DENSITY, density.min(u8::MAX as usize) as u8);
            token.write(sensor::OUT_DISTANCE, saturate(distance));
            token.write(sensor::IN_OUT_ANGLE, angle_to_byte(angle));
            SensorOutput::ClusterFound
        }
        None => SensorOutput::NothingFound,
    };
    trace!(event = "sensor_scan", cell_id = %host, ?input, ?output);
    token.write(sensor::OUTPUT, output.to_byte());
    FunctionOutcome::Executed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::Fixture;

    fn scan(fixture: &mut Fixture, host: CellId, token: &mut Token) -> FunctionOutcome {
        let (graph, mut ctx) = fixture.split();
        execute(graph, host, token, &mut ctx)
    }

    fn sensor_token(input: SensorInput) -> Token {
        let mut token = Token::new(20.0, 256);
        token.write(sensor::INPUT, input.to_byte());
        token.write(sensor::IN_COLOR, 7);
        token
    }

    #[test]
    fn test_do_nothing() {
        let mut fixture = Fixture::new();
        let host = fixture.add_cell(1, 50.0, 50.0);
        let mut token = Token::new(20.0, 256);
        assert_eq!(scan(&mut fixture, host, &mut token), FunctionOutcome::Idle);
    }

    #[test]
    fn test_vicinity_finds_nearest_accumulation() {
        let mut fixture = Fixture::new();
        let host = fixture.add_cell(1, 50.0, 50.0);
        fixture.add_cell(2, 60.0, 50.0);
        fixture.add_cell(3, 60.5, 50.0);
        fixture.add_cell(4, 80.0, 50.0);
        let mut token = sensor_token(SensorInput::SearchVicinity);
        token.write(sensor::IN_MIN_DENSITY, 2);

        scan(&mut fixture, host, &mut token);
        assert_eq!(token.read(sensor::OUTPUT), SensorOutput::ClusterFound.to_byte());
        assert_eq!(token.read(sensor::OUT_DENSITY), 2);
        assert_eq!(token.read(sensor::OUT_DISTANCE), 10);
    }

    #[test]
    fn test_distance_covers_sensor_range() {
        let mut distances = Vec::new();
        for (i, offset) in [5.0, 20.0, 45.0].into_iter().enumerate() {
            let mut fixture = Fixture::new();
            let host = fixture.add_cell(1, 50.0, 50.0);
            fixture.add_cell(2 + i as u64, 50.0 + offset, 50.0);
            let mut token = sensor_token(SensorInput::SearchVicinity);
            scan(&mut fixture, host, &mut token);
            assert_eq!(token.read(sensor::OUTPUT), SensorOutput::ClusterFound.to_byte());
            distances.push(token.read(sensor::OUT_DISTANCE));
        }
        assert_eq!(distances, vec![5, 20, 45]);
    }

    #[test]
    fn test_density_window_rejects() {
        let mut fixture = Fixture::new();
        let host = fixture.add_cell(1, 50.0, 50.0);
        fixture.add_cell(2, 51.0, 50.0);
        let mut token = sensor_token(SensorInput::SearchVicinity);
        token.write(sensor::IN_MIN_DENSITY, 3);
        scan(&mut fixture, host, &mut token);
        assert_eq!(token.read(sensor::OUTPUT), SensorOutput::NothingFound.to_byte());
    }

    #[test]
    fn test_search_by_angle() {
        let mut fixture = Fixture::new();
        let host = fixture.add_cell(1, 50.0, 50.0);
        // angle 0 points to negative y
        fixture.add_cell(2, 50.0, 48.0);
        fixture.add_cell(3, 51.0, 50.0);

        let mut token = sensor_token(SensorInput::SearchByAngle);
        token.write(sensor::IN_OUT_ANGLE, angle_to_byte(90.0));
        scan(&mut fixture, host, &mut token);
        assert_eq!(token.read(sensor::OUTPUT), SensorOutput::ClusterFound.to_byte());
        assert_eq!(token.read(sensor::OUT_DISTANCE), 1);

        let mut token = sensor_token(SensorInput::SearchByAngle);
        token.write(sensor::IN_OUT_ANGLE, angle_to_byte(0.0));
        scan(&mut fixture, host, &mut token);
        assert_eq!(token.read(sensor::OUT_DISTANCE), 2);

        let mut token = sensor_token(SensorInput::SearchByAngle);
        token.write(sensor::IN_OUT_ANGLE, angle_to_byte(180.0));
        scan(&mut fixture, host, &mut token);
        assert_eq!(token.read(sensor::OUTPUT), SensorOutput::NothingFound.to_byte());
    }

    #[test]
    fn test_search_by_angle_behind_the_cell() {
        let mut fixture = Fixture::new();
        let host = fixture.add_cell(1, 50.0, 50.0);
        // slightly left of straight behind, about -179 degrees
        fixture.add_cell(2, 49.9, 55.0);

        for angle_byte in [angle_to_byte(180.0), 127] {
            let mut token = sensor_token(SensorInput::SearchByAngle);
            token.write(sensor::IN_OUT_ANGLE, angle_byte);
            scan(&mut fixture, host, &mut token);
            assert_eq!(token.read(sensor::OUTPUT), SensorOutput::ClusterFound.to_byte());
            assert_eq!(token.read(sensor::OUT_DISTANCE), 5);
            assert!(byte_to_angle(token.read(sensor::IN_OUT_ANGLE)) < -175.0);
        }
    }

    #[test]
    fn test_own_cluster_and_color_are_ignored() {
        let mut fixture = Fixture::new();
        let host = fixture.add_cell(1, 50.0, 50.0);
        let friend = fixture.add_cell(2, 51.0, 50.0);
        fixture.graph.add_connection(host, friend).unwrap();
        fixture.add_cell(3, 55.0, 50.0);
        fixture.graph.cell_mut(CellId(3)).unwrap().color = 4;

        let mut token = sensor_token(SensorInput::SearchVicinity);
        token.write(sensor::IN_COLOR, 2);
        scan(&mut fixture, host, &mut token);
        assert_eq!(token.read(sensor::OUTPUT), SensorOutput::NothingFound.to_byte());

        token.write(sensor::IN_COLOR, 4);
        scan(&mut fixture, host, &mut token);
        assert_eq!(token.read(sensor::OUTPUT), SensorOutput::ClusterFound.to_byte());
    }
}
