//! Scene generation and editing operations on descriptions.
//!
//! Everything here works on plain `DataDescription`s outside of a running
//! stepper. New ids are always drawn from the caller's `IdGenerator`, so
//! results can be inserted into the world they were generated for.

use alien_core::physics::tangential_velocity;
use alien_core::{CellId, IdGenerator, SpaceMetric, Vec2, MAX_CELL_BONDS, MAX_COLORS};
use alien_model::{
    CellDescription, CellFunctionType, CellOrParticleDescription, ClusterDescription,
    ClusteredDataDescription, ConnectionDescription, DataDescription, SpatialGrid,
};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Cells closer than this to an existing cell count as overlapping.
const OVERLAP_DISTANCE: f64 = 1.0;

/// Placement attempts per copy before `random_multiply` gives up.
const MAX_PLACEMENT_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRectParameters {
    pub width: usize,
    pub height: usize,
    pub cell_distance: f64,
    pub energy: f64,
    pub center: Vec2,
    /// Cap every cell at the bonds it gets, so it never fuses later
    pub remove_stickiness: bool,
    pub max_connections: usize,
    pub color: u8,
    pub barrier: bool,
}

impl Default for CreateRectParameters {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            cell_distance: 1.0,
            energy: 100.0,
            center: Vec2::ZERO,
            remove_stickiness: false,
            max_connections: MAX_CELL_BONDS,
            color: 0,
            barrier: false,
        }
    }
}

impl CreateRectParameters {
    pub fn with_size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_cell_distance(mut self, cell_distance: f64) -> Self {
        self.cell_distance = cell_distance;
        self
    }

    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = energy;
        self
    }

    pub fn with_center(mut self, center: Vec2) -> Self {
        self.center = center;
        self
    }

    pub fn with_remove_stickiness(mut self, remove_stickiness: bool) -> Self {
        self.remove_stickiness = remove_stickiness;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_color(mut self, color: u8) -> Self {
        self.color = color;
        self
    }

    pub fn with_barrier(mut self, barrier: bool) -> Self {
        self.barrier = barrier;
        self
    }
}

/// A `width` x `height` lattice of cells bonded to their horizontal and
/// vertical neighbors, centered on `center`.
pub fn create_rect(parameters: &CreateRectParameters, ids: &mut IdGenerator) -> DataDescription {
    let (width, height) = (parameters.width, parameters.height);
    let max_connections = parameters.max_connections.min(MAX_CELL_BONDS);
    let offset = Vec2::new(
        (width as f64 - 1.0) * parameters.cell_distance / 2.0,
        (height as f64 - 1.0) * parameters.cell_distance / 2.0,
    );

    let mut cells: Vec<CellDescription> = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let pos = parameters.center - offset
                + Vec2::new(x as f64, y as f64) * parameters.cell_distance;
            cells.push(
                CellDescription::new(ids.next_cell_id(), pos)
                    .with_energy(parameters.energy)
                    .with_color(parameters.color % MAX_COLORS as u8)
                    .with_max_connections(max_connections)
                    .with_barrier(parameters.barrier),
            );
        }
    }

    for y in 0..height {
        for x in 0..width {
            let index = y * width + x;
            if x + 1 < width {
                connect(&mut cells, index, index + 1, parameters.cell_distance);
            }
            if y + 1 < height {
                connect(&mut cells, index, index + width, parameters.cell_distance);
            }
        }
    }

    let mut data = DataDescription {
        cells,
        particles: Vec::new(),
    };
    if parameters.remove_stickiness {
        remove_stickiness(&mut data);
    }
    data
}

/// Bond two cells of `cells` if both have a free slot.
fn connect(cells: &mut [CellDescription], a: usize, b: usize, distance: f64) -> bool {
    let free = |cell: &CellDescription| cell.connections.len() < cell.max_connections;
    if a == b || !free(&cells[a]) || !free(&cells[b]) || cells[a].is_connected_to(cells[b].id) {
        return false;
    }
    let (id_a, id_b) = (cells[a].id, cells[b].id);
    cells[a].connections.push(ConnectionDescription {
        cell_id: id_b,
        distance,
        arrow: true,
    });
    cells[b].connections.push(ConnectionDescription {
        cell_id: id_a,
        distance,
        arrow: true,
    });
    true
}

/// Give every cell and particle a fresh id, rewriting bonds and token
/// origins to match.
pub fn assign_new_ids(data: &mut DataDescription, ids: &mut IdGenerator) {
    let mapping: HashMap<CellId, CellId> = data
        .cells
        .iter()
        .map(|cell| (cell.id, ids.next_cell_id()))
        .collect();
    for cell in data.cells.iter_mut() {
        if let Some(new_id) = mapping.get(&cell.id) {
            cell.id = *new_id;
        }
        cell.connections.retain(|c| mapping.contains_key(&c.cell_id));
        for connection in cell.connections.iter_mut() {
            if let Some(new_id) = mapping.get(&connection.cell_id) {
                connection.cell_id = *new_id;
            }
        }
        for token in cell.tokens.iter_mut() {
            token.origin = token.origin.and_then(|origin| mapping.get(&origin).copied());
        }
    }
    for particle in data.particles.iter_mut() {
        particle.id = ids.next_particle_id();
    }
}

/// Tile the content of a world of `orig_size` across a larger world of
/// `size`. Clusters and particles whose copy would land outside are left
/// out.
pub fn duplicate(
    data: &mut ClusteredDataDescription,
    orig_size: (u32, u32),
    size: (u32, u32),
    ids: &mut IdGenerator,
) {
    if orig_size.0 == 0 || orig_size.1 == 0 {
        return;
    }
    let (width, height) = (f64::from(size.0), f64::from(size.1));
    let repeats_x = size.0.div_ceil(orig_size.0);
    let repeats_y = size.1.div_ceil(orig_size.1);
    let inside = |pos: Vec2| pos.x >= 0.0 && pos.y >= 0.0 && pos.x < width && pos.y < height;

    let original = std::mem::take(data);
    for i in 0..repeats_x {
        for j in 0..repeats_y {
            let delta = Vec2::new(f64::from(i * orig_size.0), f64::from(j * orig_size.1));
            for cluster in &original.clusters {
                if !inside(cluster.center() + delta) {
                    continue;
                }
                let mut copy = DataDescription {
                    cells: cluster.cells.clone(),
                    particles: Vec::new(),
                };
                if i != 0 || j != 0 {
                    assign_new_ids(&mut copy, ids);
                }
                copy.shift(delta);
                data.clusters.push(ClusterDescription { cells: copy.cells });
            }
            for particle in &original.particles {
                if !inside(particle.pos + delta) {
                    continue;
                }
                let mut copy = particle.clone();
                if i != 0 || j != 0 {
                    copy.id = ids.next_particle_id();
                }
                copy.pos += delta;
                data.particles.push(copy);
            }
        }
    }
    debug!(event = "content_duplicated", clusters = data.clusters.len(), particles = data.particles.len());
}

/// Rotate all positions and velocities by `angle` degrees around `center`.
fn rotate(data: &mut DataDescription, center: Vec2, angle: f64) {
    for cell in data.cells.iter_mut() {
        cell.pos = center + (cell.pos - center).rotated(angle);
        cell.vel = cell.vel.rotated(angle);
    }
    for particle in data.particles.iter_mut() {
        particle.pos = center + (particle.pos - center).rotated(angle);
        particle.vel = particle.vel.rotated(angle);
    }
}

/// Add a rigid motion with linear velocity `vel` and angular velocity
/// `angular_vel` (degrees per step) around `center`.
fn add_motion(data: &mut DataDescription, center: Vec2, vel: Vec2, angular_vel: f64) {
    for cell in data.cells.iter_mut() {
        cell.vel += tangential_velocity(cell.pos - center, vel, angular_vel);
    }
    for particle in data.particles.iter_mut() {
        particle.vel += vel;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMultiplyParameters {
    pub horizontal_number: usize,
    pub horizontal_distance: f64,
    pub horizontal_angle_inc: f64,
    pub horizontal_vel_x_inc: f64,
    pub horizontal_vel_y_inc: f64,
    pub horizontal_angular_vel_inc: f64,
    pub vertical_number: usize,
    pub vertical_distance: f64,
    pub vertical_angle_inc: f64,
    pub vertical_vel_x_inc: f64,
    pub vertical_vel_y_inc: f64,
    pub vertical_angular_vel_inc: f64,
}

impl Default for GridMultiplyParameters {
    fn default() -> Self {
        Self {
            horizontal_number: 10,
            horizontal_distance: 50.0,
            horizontal_angle_inc: 0.0,
            horizontal_vel_x_inc: 0.0,
            horizontal_vel_y_inc: 0.0,
            horizontal_angular_vel_inc: 0.0,
            vertical_number: 10,
            vertical_distance: 50.0,
            vertical_angle_inc: 0.0,
            vertical_vel_x_inc: 0.0,
            vertical_vel_y_inc: 0.0,
            vertical_angular_vel_inc: 0.0,
        }
    }
}

/// Copies of `input` on a regular grid. Copy (i, j) is shifted by
/// `(i * horizontal_distance, j * vertical_distance)` and rotated and
/// accelerated by the per-step increments. Copy (0, 0) keeps the ids of
/// `input`.
pub fn grid_multiply(
    input: &DataDescription,
    parameters: &GridMultiplyParameters,
    ids: &mut IdGenerator,
) -> DataDescription {
    let center = input.center();
    let mut result = DataDescription::new();
    for i in 0..parameters.horizontal_number {
        for j in 0..parameters.vertical_number {
            let (fi, fj) = (i as f64, j as f64);
            let mut copy = input.clone();
            if i != 0 || j != 0 {
                assign_new_ids(&mut copy, ids);
            }
            rotate(
                &mut copy,
                center,
                fi * parameters.horizontal_angle_inc + fj * parameters.vertical_angle_inc,
            );
            add_motion(
                &mut copy,
                center,
                Vec2::new(
                    fi * parameters.horizontal_vel_x_inc + fj * parameters.vertical_vel_x_inc,
                    fi * parameters.horizontal_vel_y_inc + fj * parameters.vertical_vel_y_inc,
                ),
                fi * parameters.horizontal_angular_vel_inc + fj * parameters.vertical_angular_vel_inc,
            );
            copy.shift(Vec2::new(
                fi * parameters.horizontal_distance,
                fj * parameters.vertical_distance,
            ));
            result.add(copy);
        }
    }
    result
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomMultiplyParameters {
    pub number: usize,
    pub min_angle: f64,
    pub max_angle: f64,
    pub min_vel_x: f64,
    pub max_vel_x: f64,
    pub min_vel_y: f64,
    pub max_vel_y: f64,
    pub min_angular_vel: f64,
    pub max_angular_vel: f64,
    /// Reject placements that overlap existing or earlier placed cells
    pub overlapping_check: bool,
}

impl Default for RandomMultiplyParameters {
    fn default() -> Self {
        Self {
            number: 100,
            min_angle: 0.0,
            max_angle: 360.0,
            min_vel_x: 0.0,
            max_vel_x: 0.0,
            min_vel_y: 0.0,
            max_vel_y: 0.0,
            min_angular_vel: 0.0,
            max_angular_vel: 0.0,
            overlapping_check: false,
        }
    }
}

fn sample(rng: &mut ChaCha8Rng, min: f64, max: f64) -> f64 {
    if max <= min {
        min
    } else {
        rng.gen_range(min..max)
    }
}

/// `number` copies of `input` at random places of the world with random
/// orientation and motion. The first copy keeps the ids of `input`.
///
/// Returns `None` when the overlap check is on and some copy could not be
/// placed clear of `existing` and the copies before it.
pub fn random_multiply(
    input: &DataDescription,
    parameters: &RandomMultiplyParameters,
    space: &SpaceMetric,
    existing: &DataDescription,
    rng: &mut ChaCha8Rng,
    ids: &mut IdGenerator,
) -> Option<DataDescription> {
    let center = input.center();
    let mut occupied = SpatialGrid::build(*space, OVERLAP_DISTANCE.max(1.0), existing.cells.iter().map(|c| c.pos));
    let mut result = DataDescription::new();

    for n in 0..parameters.number {
        let mut placed = None;
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let mut copy = input.clone();
            rotate(&mut copy, center, sample(rng, parameters.min_angle, parameters.max_angle));
            let target = Vec2::new(rng.gen::<f64>() * space.width, rng.gen::<f64>() * space.height);
            copy.shift(target - center);
            for cell in copy.cells.iter_mut() {
                cell.pos = space.correct_position(cell.pos);
            }
            for particle in copy.particles.iter_mut() {
                particle.pos = space.correct_position(particle.pos);
            }
            let vel = Vec2::new(
                sample(rng, parameters.min_vel_x, parameters.max_vel_x),
                sample(rng, parameters.min_vel_y, parameters.max_vel_y),
            );
            let angular_vel = sample(rng, parameters.min_angular_vel, parameters.max_angular_vel);
            add_motion(&mut copy, target, vel, angular_vel);

            let overlaps = parameters.overlapping_check
                && copy
                    .cells
                    .iter()
                    .any(|cell| !occupied.within(cell.pos, OVERLAP_DISTANCE).is_empty());
            if !overlaps {
                placed = Some(copy);
                break;
            }
        }
        let mut copy = match placed {
            Some(copy) => copy,
            None => {
                debug!(event = "random_multiply_overlap", placed = n, requested = parameters.number);
                return None;
            }
        };
        if n != 0 {
            assign_new_ids(&mut copy, ids);
        }
        for cell in &copy.cells {
            occupied.insert(cell.pos);
        }
        result.add(copy);
    }
    Some(result)
}

/// Drop all bonds and bond every pair of cells closer than `max_distance`,
/// nearest pairs first, as far as the cells' caps allow.
pub fn reconnect_cells(data: &mut DataDescription, space: &SpaceMetric, max_distance: f64) {
    for cell in data.cells.iter_mut() {
        cell.connections.clear();
    }
    let grid = SpatialGrid::build(*space, max_distance.max(1.0), data.cells.iter().map(|c| c.pos));
    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for (i, cell) in data.cells.iter().enumerate() {
        for j in grid.within(cell.pos, max_distance) {
            if j > i {
                pairs.push((space.distance(cell.pos, data.cells[j].pos), i, j));
            }
        }
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
    for (distance, i, j) in pairs {
        connect(&mut data.cells, i, j, distance);
    }
}

/// Cap every cell at its current number of bonds.
pub fn remove_stickiness(data: &mut DataDescription) {
    for cell in data.cells.iter_mut() {
        cell.max_connections = cell.connections.len();
    }
}

/// Wrap positions into the world and drop bonds that point to missing
/// cells, are one-sided, or are longer than `max_distance`.
pub fn correct_connections(data: &mut ClusteredDataDescription, space: &SpaceMetric, max_distance: f64) {
    let mut positions: HashMap<CellId, Vec2> = HashMap::new();
    for cell in data.clusters.iter_mut().flat_map(|c| c.cells.iter_mut()) {
        cell.pos = space.correct_position(cell.pos);
        positions.insert(cell.id, cell.pos);
    }
    for particle in data.particles.iter_mut() {
        particle.pos = space.correct_position(particle.pos);
    }

    let valid = |a: CellId, b: CellId| match (positions.get(&a), positions.get(&b)) {
        (Some(pa), Some(pb)) => space.distance(*pa, *pb) <= max_distance,
        _ => false,
    };
    let mut bonds: HashSet<(CellId, CellId)> = HashSet::new();
    for cell in data.clusters.iter().flat_map(|c| c.cells.iter()) {
        for connection in &cell.connections {
            if valid(cell.id, connection.cell_id) {
                bonds.insert((cell.id, connection.cell_id));
            }
        }
    }
    for cell in data.clusters.iter_mut().flat_map(|c| c.cells.iter_mut()) {
        let id = cell.id;
        cell.connections
            .retain(|c| bonds.contains(&(id, c.cell_id)) && bonds.contains(&(c.cell_id, id)));
    }
}

/// Give each cluster a color drawn from `color_codes`.
pub fn colorize(data: &mut ClusteredDataDescription, color_codes: &[u8], rng: &mut ChaCha8Rng) {
    for cluster in data.clusters.iter_mut() {
        let color = match color_codes.choose(rng) {
            Some(color) => *color % MAX_COLORS as u8,
            None => return,
        };
        for cell in cluster.cells.iter_mut() {
            cell.color = color;
        }
    }
}

/// Number the selected cells so that tokens run away from the first
/// selected cell of each connected group: every step along a bond adds one
/// to the access number, modulo `max_branch_numbers`.
pub fn generate_branch_numbers(data: &mut DataDescription, cell_ids: &HashSet<CellId>, max_branch_numbers: u8) {
    if max_branch_numbers == 0 {
        return;
    }
    let index: HashMap<CellId, usize> = data
        .cells
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id, i))
        .collect();
    let mut visited: HashSet<CellId> = HashSet::new();
    let starts: Vec<CellId> = data
        .cells
        .iter()
        .map(|c| c.id)
        .filter(|id| cell_ids.contains(id))
        .collect();

    for start in starts {
        if !visited.insert(start) {
            continue;
        }
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            let (number, neighbors) = match index.get(&id) {
                Some(i) => {
                    let cell = &data.cells[*i];
                    let neighbors: Vec<CellId> = cell.connections.iter().map(|c| c.cell_id).collect();
                    (cell.token_access_number % max_branch_numbers, neighbors)
                }
                None => continue,
            };
            for neighbor in neighbors {
                if !cell_ids.contains(&neighbor) || !visited.insert(neighbor) {
                    continue;
                }
                if let Some(i) = index.get(&neighbor) {
                    data.cells[*i].token_access_number = (number + 1) % max_branch_numbers;
                    queue.push_back(neighbor);
                }
            }
        }
    }
}

pub fn get_objects(data: &DataDescription) -> Vec<CellOrParticleDescription> {
    data.cells
        .iter()
        .cloned()
        .map(CellOrParticleDescription::Cell)
        .chain(data.particles.iter().cloned().map(CellOrParticleDescription::Particle))
        .collect()
}

pub fn get_constructors(data: &DataDescription) -> Vec<CellOrParticleDescription> {
    data.cells
        .iter()
        .filter(|c| c.function.function_type() == CellFunctionType::Constructor)
        .cloned()
        .map(CellOrParticleDescription::Cell)
        .collect()
}

pub fn remove_metadata(data: &mut DataDescription) {
    for cell in data.cells.iter_mut() {
        cell.metadata = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alien_model::{CellFunctionData, CellGraph, GraphLimits, TokenDescription};
    use rand::SeedableRng;

    fn ids() -> IdGenerator {
        IdGenerator::new()
    }

    fn space() -> SpaceMetric {
        SpaceMetric::new(100.0, 100.0)
    }

    fn is_valid(data: &DataDescription) -> bool {
        CellGraph::from_description(space(), GraphLimits::default(), data).is_ok()
    }

    #[test]
    fn test_create_rect() {
        let parameters = CreateRectParameters::default()
            .with_size(3, 2)
            .with_center(Vec2::new(50.0, 50.0))
            .with_color(2);
        let data = create_rect(&parameters, &mut ids());
        assert_eq!(data.cells.len(), 6);
        assert!((data.center() - Vec2::new(50.0, 50.0)).length() < 1e-9);
        let bonds: usize = data.cells.iter().map(|c| c.connections.len()).sum();
        assert_eq!(bonds / 2, 7);
        assert!(data.cells.iter().all(|c| c.color == 2));
        assert!(is_valid(&data));
    }

    #[test]
    fn test_create_rect_respects_caps_and_stickiness() {
        let capped = create_rect(&CreateRectParameters::default().with_size(3, 3).with_max_connections(2), &mut ids());
        assert!(capped.cells.iter().all(|c| c.connections.len() <= 2));

        let smooth = create_rect(
            &CreateRectParameters::default().with_size(3, 3).with_remove_stickiness(true),
            &mut ids(),
        );
        assert!(smooth.cells.iter().all(|c| c.max_connections == c.connections.len()));
        assert_eq!(smooth.cells[4].max_connections, 4);
    }

    #[test]
    fn test_assign_new_ids_remaps_bonds_and_origins() {
        let mut ids = ids();
        let mut data = create_rect(&CreateRectParameters::default().with_size(2, 1), &mut ids);
        let first = data.cells[0].id;
        data.cells[1].tokens.push(TokenDescription {
            energy: 10.0,
            memory: vec![0; 256],
            origin: Some(first),
        });
        assign_new_ids(&mut data, &mut ids);
        assert_ne!(data.cells[0].id, first);
        assert!(data.cells[1].is_connected_to(data.cells[0].id));
        assert_eq!(data.cells[1].tokens[0].origin, Some(data.cells[0].id));
        assert!(is_valid(&data));
    }

    #[test]
    fn test_grid_multiply() {
        let mut ids = ids();
        let input = create_rect(&CreateRectParameters::default().with_size(2, 2), &mut ids);
        let parameters = GridMultiplyParameters {
            horizontal_number: 3,
            vertical_number: 2,
            horizontal_distance: 10.0,
            vertical_distance: 20.0,
            horizontal_vel_x_inc: 0.1,
            ..GridMultiplyParameters::default()
        };
        let result = grid_multiply(&input, &parameters, &mut ids);
        assert_eq!(result.cells.len(), 24);
        assert_eq!(result.cells[..4], input.cells[..]);
        let last = &result.cells[20..];
        assert!((DataDescription { cells: last.to_vec(), particles: Vec::new() }.center() - Vec2::new(20.0, 20.0)).length() < 1e-9);
        assert!((last[0].vel.x - 0.2).abs() < 1e-9);
        assert!(is_valid(&result));
    }

    #[test]
    fn test_grid_multiply_rotation_keeps_bond_lengths() {
        let mut ids = ids();
        let input = create_rect(&CreateRectParameters::default().with_size(3, 1), &mut ids);
        let parameters = GridMultiplyParameters {
            horizontal_number: 2,
            vertical_number: 1,
            horizontal_angle_inc: 90.0,
            ..GridMultiplyParameters::default()
        };
        let result = grid_multiply(&input, &parameters, &mut ids);
        let rotated = &result.cells[3..];
        assert!((rotated[0].pos.x - rotated[2].pos.x).abs() < 1e-9);
        assert!(((rotated[0].pos - rotated[1].pos).length() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_random_multiply_is_reproducible() {
        let mut ids_a = ids();
        let input = create_rect(&CreateRectParameters::default().with_size(2, 2), &mut ids_a);
        let mut ids_b = ids_a.clone();
        let parameters = RandomMultiplyParameters {
            number: 5,
            max_vel_x: 0.5,
            overlapping_check: true,
            ..RandomMultiplyParameters::default()
        };
        let a = random_multiply(&input, &parameters, &space(), &DataDescription::new(), &mut ChaCha8Rng::seed_from_u64(5), &mut ids_a).unwrap();
        let b = random_multiply(&input, &parameters, &space(), &DataDescription::new(), &mut ChaCha8Rng::seed_from_u64(5), &mut ids_b).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cells.len(), 20);
        assert!(is_valid(&a));
    }

    #[test]
    fn test_random_multiply_overlap_failure() {
        let mut ids = ids();
        let input = create_rect(&CreateRectParameters::default().with_size(2, 2), &mut ids);
        let space = SpaceMetric::new(4.0, 4.0);
        let blocker = create_rect(
            &CreateRectParameters::default().with_size(4, 4).with_center(Vec2::new(2.0, 2.0)),
            &mut ids,
        );
        let parameters = RandomMultiplyParameters {
            number: 1,
            overlapping_check: true,
            ..RandomMultiplyParameters::default()
        };
        let result = random_multiply(&input, &parameters, &space, &blocker, &mut ChaCha8Rng::seed_from_u64(1), &mut ids);
        assert!(result.is_none());
    }

    #[test]
    fn test_reconnect_cells() {
        let mut data = create_rect(&CreateRectParameters::default().with_size(3, 1), &mut ids());
        for cell in data.cells.iter_mut() {
            cell.connections.clear();
        }
        reconnect_cells(&mut data, &space(), 1.5);
        assert_eq!(data.cells[1].connections.len(), 2);
        assert!(!data.cells[0].is_connected_to(data.cells[2].id));
        assert!(is_valid(&data));
    }

    #[test]
    fn test_correct_connections_drops_long_and_one_sided_bonds() {
        let mut data = create_rect(&CreateRectParameters::default().with_size(3, 1).with_center(Vec2::new(1.0, 50.0)), &mut ids());
        let stray = data.cells[2].id;
        data.cells[0].connections.push(ConnectionDescription {
            cell_id: stray,
            distance: 2.0,
            arrow: true,
        });
        data.cells[2].pos = Vec2::new(40.0, 50.0);
        let mut clustered = ClusteredDataDescription {
            clusters: vec![ClusterDescription { cells: data.cells }],
            particles: Vec::new(),
        };
        correct_connections(&mut clustered, &space(), 2.6);
        let flat = clustered.flatten();
        assert_eq!(flat.cells[0].connections.len(), 1);
        assert!(flat.cells[2].connections.is_empty());
        assert!(flat.cells[0].pos.x >= 0.0);
        assert!(is_valid(&flat));
    }

    #[test]
    fn test_duplicate_fills_larger_world() {
        let mut ids = ids();
        let rect = create_rect(&CreateRectParameters::default().with_size(2, 2).with_center(Vec2::new(5.0, 5.0)), &mut ids);
        let original = ClusteredDataDescription {
            clusters: vec![ClusterDescription { cells: rect.cells }],
            particles: Vec::new(),
        };

        let mut data = original.clone();
        duplicate(&mut data, (10, 10), (30, 10), &mut ids);
        assert_eq!(data.clusters.len(), 3);
        assert_eq!(data.clusters[0], original.clusters[0]);
        assert!((data.clusters[2].center() - Vec2::new(25.0, 5.0)).length() < 1e-9);
        assert!(is_valid(&data.flatten()));

        // the third copy would be centered on the border of a 25 wide world
        let mut data = original;
        duplicate(&mut data, (10, 10), (25, 10), &mut ids);
        assert_eq!(data.clusters.len(), 2);
    }

    #[test]
    fn test_colorize_per_cluster() {
        let mut ids = ids();
        let a = create_rect(&CreateRectParameters::default().with_size(2, 1), &mut ids);
        let b = create_rect(&CreateRectParameters::default().with_size(2, 1), &mut ids);
        let mut data = ClusteredDataDescription {
            clusters: vec![ClusterDescription { cells: a.cells }, ClusterDescription { cells: b.cells }],
            particles: Vec::new(),
        };
        colorize(&mut data, &[4], &mut ChaCha8Rng::seed_from_u64(0));
        assert!(data.clusters.iter().flat_map(|c| &c.cells).all(|c| c.color == 4));
    }

    #[test]
    fn test_generate_branch_numbers_along_chain() {
        let mut data = create_rect(&CreateRectParameters::default().with_size(4, 1), &mut ids());
        let selected: HashSet<CellId> = data.cells.iter().map(|c| c.id).collect();
        generate_branch_numbers(&mut data, &selected, 3);
        let numbers: Vec<u8> = data.cells.iter().map(|c| c.token_access_number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_queries_and_metadata() {
        let mut data = create_rect(&CreateRectParameters::default().with_size(2, 1), &mut ids());
        data.cells[1].function = CellFunctionData::Constructor;
        data.cells[0].metadata.name = "head".to_string();
        assert_eq!(get_objects(&data).len(), 2);
        let constructors = get_constructors(&data);
        assert_eq!(constructors.len(), 1);
        assert_eq!(constructors[0].id(), data.cells[1].id.0);
        remove_metadata(&mut data);
        assert!(data.cells[0].metadata.name.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn prop_random_multiply_yields_valid_scenes(seed in 0u64..5_000, number in 1usize..6) {
            let mut ids = ids();
            let input = create_rect(&CreateRectParameters::default().with_size(2, 2), &mut ids);
            let parameters = RandomMultiplyParameters {
                number,
                max_vel_x: 0.5,
                max_angular_vel: 3.0,
                overlapping_check: true,
                ..RandomMultiplyParameters::default()
            };
            let result = random_multiply(&input, &parameters, &space(), &DataDescription::new(), &mut ChaCha8Rng::seed_from_u64(seed), &mut ids);
            if let Some(data) = result {
                proptest::prop_assert_eq!(data.cells.len(), 4 * number);
                proptest::prop_assert!(is_valid(&data));
            }
        }
    }
}
