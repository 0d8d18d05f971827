//! Cell graph: cells as nodes, bonds as undirected edges.
//!
//! Clusters are not stored. They are the connected components of the bond
//! graph and are derived on demand, either for a single seed cell
//! ([`CellGraph::cluster_geometry`]) or for all cells at once
//! ([`CellGraph::cluster_index`]).

use crate::cell::{Cell, Connection};
use crate::description::{ClusterDescription, ClusteredDataDescription, DataDescription};
use crate::validation::validate_description;
use alien_core::physics::{self, BodyContact};
use alien_core::{
    CellId, ConnectionError, Error, Result, SimulationParameters, SpaceMetric, Vec2,
    ALIEN_PRECISION, MAX_CELL_BONDS,
};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::trace;

/// Global limits checked when bonds are made.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphLimits {
    pub max_bonds: usize,
    pub max_binding_distance: f64,
}

impl GraphLimits {
    pub fn from_parameters(parameters: &SimulationParameters) -> Self {
        Self {
            max_bonds: parameters.cell_max_bonds.min(MAX_CELL_BONDS),
            max_binding_distance: parameters.cell_max_binding_distance,
        }
    }
}

impl Default for GraphLimits {
    fn default() -> Self {
        Self::from_parameters(&SimulationParameters::default())
    }
}

/// Motion and mass distribution of one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterGeometry {
    /// Members in BFS order from the seed cell
    pub cell_ids: Vec<CellId>,
    /// Vector from the center of mass to each member, in the same order
    pub levers: Vec<Vec2>,
    pub mass: f64,
    /// Center of mass, wrapped into the world
    pub center: Vec2,
    pub vel: Vec2,
    pub angular_mass: f64,
    /// Degrees per timestep
    pub angular_vel: f64,
}

impl ClusterGeometry {
    pub fn len(&self) -> usize {
        self.cell_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_ids.is_empty()
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.cell_ids.contains(&id)
    }

    pub fn kinetic_energy(&self) -> f64 {
        physics::kinetic_energy(self.mass, self.vel, self.angular_mass, self.angular_vel)
    }

    /// Rigid body state at the point `contact` (world coordinates).
    pub fn contact(&self, space: &SpaceMetric, contact: Vec2) -> BodyContact {
        let r = space.displacement(self.center, contact);
        BodyContact {
            vel: self.vel,
            r_perp: r.rotate_quarter_ccw(),
            angular_vel: self.angular_vel,
            angular_mass: self.angular_mass,
            mass: self.mass,
        }
    }
}

/// Component label of every cell, valid until the bond topology changes.
#[derive(Debug, Clone)]
pub struct ClusterIndex {
    labels: Vec<usize>,
}

impl ClusterIndex {
    /// Label of the cell at insertion index `index`.
    pub fn label(&self, index: usize) -> usize {
        self.labels[index]
    }

    pub fn same_cluster(&self, a: usize, b: usize) -> bool {
        self.labels[a] == self.labels[b]
    }

    /// Cell indices grouped by cluster, clusters ordered by their first
    /// member.
    pub fn clusters(&self) -> Vec<Vec<usize>> {
        let mut order: HashMap<usize, usize> = HashMap::new();
        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for (index, label) in self.labels.iter().enumerate() {
            let slot = *order.entry(*label).or_insert_with(|| {
                clusters.push(Vec::new());
                clusters.len() - 1
            });
            clusters[slot].push(index);
        }
        clusters
    }

    pub fn num_clusters(&self) -> usize {
        self.labels.iter().collect::<HashSet<_>>().len()
    }
}

/// Lazy breadth-first walk over the cluster of a seed cell.
pub struct ClusterIter<'a> {
    graph: &'a CellGraph,
    queue: VecDeque<CellId>,
    visited: HashSet<CellId>,
}

impl Iterator for ClusterIter<'_> {
    type Item = CellId;

    fn next(&mut self) -> Option<CellId> {
        let id = self.queue.pop_front()?;
        if let Some(cell) = self.graph.cell(id) {
            for connection in &cell.connections {
                if self.visited.insert(connection.cell_id) {
                    self.queue.push_back(connection.cell_id);
                }
            }
        }
        Some(id)
    }
}

#[derive(Debug, Clone)]
pub struct CellGraph {
    space: SpaceMetric,
    limits: GraphLimits,
    cells: Vec<Cell>,
    index: HashMap<CellId, usize>,
}

impl CellGraph {
    pub fn new(space: SpaceMetric, limits: GraphLimits) -> Self {
        Self {
            space,
            limits,
            cells: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn space(&self) -> &SpaceMetric {
        &self.space
    }

    pub fn limits(&self) -> &GraphLimits {
        &self.limits
    }

    pub fn set_limits(&mut self, limits: GraphLimits) {
        self.limits = limits;
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn index_of(&self, id: CellId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.index.get(&id).map(|i| &self.cells[*i])
    }

    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.index.get(&id).map(|i| &mut self.cells[*i])
    }

    /// Two distinct cells mutably at once.
    pub fn cell_pair_mut(&mut self, a: CellId, b: CellId) -> Option<(&mut Cell, &mut Cell)> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        if ia == ib {
            return None;
        }
        if ia < ib {
            let (left, right) = self.cells.split_at_mut(ib);
            Some((&mut left[ia], &mut right[0]))
        } else {
            let (left, right) = self.cells.split_at_mut(ia);
            Some((&mut right[0], &mut left[ib]))
        }
    }

    /// All cells in insertion order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Mutable access for per-cell updates. Ids and connections must not be
    /// changed through this slice.
    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    pub fn cell_ids(&self) -> Vec<CellId> {
        self.cells.iter().map(|c| c.id).collect()
    }

    pub fn num_connections(&self) -> usize {
        self.cells.iter().map(|c| c.connections.len()).sum::<usize>() / 2
    }

    /// Insert a cell without bonds. Its position is wrapped into the world.
    pub fn add_cell(&mut self, mut cell: Cell) -> Result<()> {
        if cell.id.0 == 0 {
            return Err(Error::Validation("cell id 0 is reserved".to_string()));
        }
        if self.index.contains_key(&cell.id) {
            return Err(Error::Validation(format!("cell {} already exists", cell.id)));
        }
        if !cell.connections.is_empty() {
            return Err(Error::Validation(format!(
                "cell {} must be added without connections",
                cell.id
            )));
        }
        cell.pos = self.space.correct_position(cell.pos);
        self.index.insert(cell.id, self.cells.len());
        self.cells.push(cell);
        Ok(())
    }

    /// Remove a cell together with all of its bonds.
    pub fn remove_cell(&mut self, id: CellId) -> Option<Cell> {
        let mut ids = HashSet::new();
        ids.insert(id);
        self.remove_cells(&ids).pop()
    }

    /// Remove several cells at once, keeping the order of the survivors.
    pub fn remove_cells(&mut self, ids: &HashSet<CellId>) -> Vec<Cell> {
        // bond removal order changes how split clusters inherit motion
        let mut ordered: Vec<CellId> = ids.iter().copied().collect();
        ordered.sort_unstable();
        for id in &ordered {
            let neighbors: Vec<CellId> = match self.cell(*id) {
                Some(cell) => cell.connections.iter().map(|c| c.cell_id).collect(),
                None => continue,
            };
            for neighbor in neighbors {
                // both endpoints exist, so removal cannot fail
                let _ = self.remove_connection(*id, neighbor);
            }
        }
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.cells.len());
        for cell in self.cells.drain(..) {
            if ids.contains(&cell.id) {
                removed.push(cell);
            } else {
                kept.push(cell);
            }
        }
        self.cells = kept;
        self.rebuild_index();
        removed
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();
    }

    fn connection_limit(&self, cell: &Cell) -> usize {
        cell.max_connections.min(self.limits.max_bonds)
    }

    /// Check whether a bond between `a` and `b` could be made right now.
    pub fn can_connect(&self, a: CellId, b: CellId) -> std::result::Result<f64, ConnectionError> {
        let cell_a = self.cell(a).ok_or(ConnectionError::UnknownCell(a))?;
        let cell_b = self.cell(b).ok_or(ConnectionError::UnknownCell(b))?;
        if a == b {
            return Err(ConnectionError::SelfConnection(a));
        }
        if cell_a.is_connected_to(b) {
            return Err(ConnectionError::AlreadyConnected(a, b));
        }
        for cell in [cell_a, cell_b] {
            let max = self.connection_limit(cell);
            if cell.connections.len() >= max {
                return Err(ConnectionError::ConnectionLimitExceeded {
                    cell_id: cell.id,
                    max,
                });
            }
        }
        let distance = self.space.distance(cell_a.pos, cell_b.pos);
        if distance > self.limits.max_binding_distance {
            return Err(ConnectionError::DistanceExceeded {
                distance,
                max: self.limits.max_binding_distance,
            });
        }
        Ok(distance)
    }

    /// Bond `a` and `b` with tokens allowed in both directions.
    ///
    /// When the cells belonged to different clusters, the merged cluster
    /// moves with the fused motion of both.
    pub fn add_connection(&mut self, a: CellId, b: CellId) -> std::result::Result<(), ConnectionError> {
        let distance = self.can_connect(a, b)?;

        let geometry_a = self.cluster_geometry(a);
        let geometry_b = self.cluster_geometry(b);

        self.push_connection(a, b, distance, true);
        self.push_connection(b, a, distance, true);

        if let (Some(geometry_a), Some(geometry_b)) = (geometry_a, geometry_b) {
            if !geometry_a.contains(b) {
                self.fuse_motion(a, b, &geometry_a, &geometry_b);
            }
        }
        trace!(event = "connection_added", cell_a = %a, cell_b = %b, distance);
        Ok(())
    }

    fn push_connection(&mut self, from: CellId, to: CellId, distance: f64, arrow: bool) {
        if let Some(cell) = self.cell_mut(from) {
            cell.connections.push(Connection {
                cell_id: to,
                distance,
                arrow,
            });
        }
    }

    fn fuse_motion(&mut self, a: CellId, b: CellId, geometry_a: &ClusterGeometry, geometry_b: &ClusterGeometry) {
        let (pos_a, pos_b) = match (self.cell(a), self.cell(b)) {
            (Some(ca), Some(cb)) => (ca.pos, cb.pos),
            _ => return,
        };
        let a_to_b = self.space.displacement(pos_a, pos_b);
        let contact = pos_a + a_to_b / 2.0;
        let normal = (-a_to_b).normalized();

        let merged = match self.cluster_geometry(a) {
            Some(merged) => merged,
            None => return,
        };
        let outcome = physics::fusion(
            geometry_a.contact(&self.space, contact),
            geometry_b.contact(&self.space, contact),
            normal,
            merged.angular_mass,
        );
        self.set_cluster_motion(&merged, outcome.vel, outcome.angular_vel);
    }

    /// Remove the bond between `a` and `b`. If this splits the cluster, each
    /// piece continues with the motion of the old cluster seen from its own
    /// center of mass.
    pub fn remove_connection(&mut self, a: CellId, b: CellId) -> std::result::Result<(), ConnectionError> {
        let connected = self
            .cell(a)
            .ok_or(ConnectionError::UnknownCell(a))?
            .is_connected_to(b);
        if !self.contains(b) {
            return Err(ConnectionError::UnknownCell(b));
        }
        if !connected {
            return Err(ConnectionError::NotConnected(a, b));
        }

        let before = self.cluster_geometry(a);

        if let Some(cell) = self.cell_mut(a) {
            cell.connections.retain(|c| c.cell_id != b);
        }
        if let Some(cell) = self.cell_mut(b) {
            cell.connections.retain(|c| c.cell_id != a);
        }

        if let Some(before) = before {
            if let Some(piece_a) = self.cluster_geometry(a) {
                if !piece_a.contains(b) {
                    self.continue_motion(&before, &piece_a);
                    if let Some(piece_b) = self.cluster_geometry(b) {
                        self.continue_motion(&before, &piece_b);
                    }
                }
            }
        }
        trace!(event = "connection_removed", cell_a = %a, cell_b = %b);
        Ok(())
    }

    fn continue_motion(&mut self, before: &ClusterGeometry, piece: &ClusterGeometry) {
        let center_diff = self.space.displacement(before.center, piece.center);
        let (vel, angular_vel) = physics::change_center_of_mass(
            piece.mass,
            before.vel,
            before.angular_vel,
            before.angular_mass,
            piece.angular_mass,
            center_diff,
        );
        self.set_cluster_motion(piece, vel, angular_vel);
    }

    pub fn set_arrow(&mut self, from: CellId, to: CellId, arrow: bool) -> std::result::Result<(), ConnectionError> {
        let connection = self
            .cell_mut(from)
            .ok_or(ConnectionError::UnknownCell(from))?
            .connection_to_mut(to)
            .ok_or(ConnectionError::NotConnected(from, to))?;
        connection.arrow = arrow;
        Ok(())
    }

    /// Change the rest length of a bond on both ends.
    pub fn set_connection_distance(
        &mut self,
        a: CellId,
        b: CellId,
        distance: f64,
    ) -> std::result::Result<(), ConnectionError> {
        let (cell_a, cell_b) = self
            .cell_pair_mut(a, b)
            .ok_or(ConnectionError::UnknownCell(a))?;
        let ab = cell_a
            .connection_to_mut(b)
            .ok_or(ConnectionError::NotConnected(a, b))?;
        ab.distance = distance;
        if let Some(ba) = cell_b.connection_to_mut(a) {
            ba.distance = distance;
        }
        Ok(())
    }

    pub fn neighbors(&self, id: CellId) -> impl Iterator<Item = CellId> + '_ {
        self.cell(id)
            .into_iter()
            .flat_map(|cell| cell.connections.iter().map(|c| c.cell_id))
    }

    /// Ids of all cells reachable from `id`, breadth first, starting with
    /// `id` itself. Empty for unknown ids.
    pub fn find_cluster(&self, id: CellId) -> ClusterIter<'_> {
        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        if self.contains(id) {
            queue.push_back(id);
            visited.insert(id);
        }
        ClusterIter {
            graph: self,
            queue,
            visited,
        }
    }

    pub fn cluster_geometry(&self, seed: CellId) -> Option<ClusterGeometry> {
        let seed_cell = self.cell(seed)?;

        // unwrap positions along bonds so that clusters spanning the world
        // border stay contiguous
        let mut unwrapped: HashMap<CellId, Vec2> = HashMap::new();
        unwrapped.insert(seed, seed_cell.pos);
        let mut cell_ids = Vec::new();
        let mut positions = Vec::new();
        let mut velocities = Vec::new();
        let mut queue = VecDeque::from([seed]);
        while let Some(id) = queue.pop_front() {
            let cell = match self.cell(id) {
                Some(cell) => cell,
                None => continue,
            };
            let pos = unwrapped[&id];
            cell_ids.push(id);
            positions.push(pos);
            velocities.push(cell.vel);
            for connection in &cell.connections {
                if unwrapped.contains_key(&connection.cell_id) {
                    continue;
                }
                if let Some(neighbor) = self.cell(connection.cell_id) {
                    let neighbor_pos = pos + self.space.displacement(cell.pos, neighbor.pos);
                    unwrapped.insert(connection.cell_id, neighbor_pos);
                    queue.push_back(connection.cell_id);
                }
            }
        }

        let mass = cell_ids.len() as f64 * seed_cell.mass();
        let center = positions.iter().fold(Vec2::ZERO, |acc, p| acc + *p) / cell_ids.len() as f64;
        let vel = velocities.iter().fold(Vec2::ZERO, |acc, v| acc + *v) / cell_ids.len() as f64;
        let levers: Vec<Vec2> = positions.iter().map(|p| *p - center).collect();
        let angular_mass: f64 = levers.iter().map(|r| r.length_squared()).sum();
        let angular_momentum: f64 = levers
            .iter()
            .zip(&velocities)
            .map(|(r, v)| physics::angular_momentum(*r, *v - vel))
            .sum();
        let angular_vel = if angular_mass <= ALIEN_PRECISION {
            0.0
        } else {
            physics::angular_velocity(angular_momentum, angular_mass)
        };

        Some(ClusterGeometry {
            cell_ids,
            levers,
            mass,
            center: self.space.correct_position(center),
            vel,
            angular_mass,
            angular_vel,
        })
    }

    /// Write rigid body motion to every member of a cluster. Barrier cells
    /// stay at rest.
    pub fn set_cluster_motion(&mut self, geometry: &ClusterGeometry, vel: Vec2, angular_vel: f64) {
        for (id, lever) in geometry.cell_ids.iter().zip(&geometry.levers) {
            if let Some(cell) = self.cell_mut(*id) {
                cell.vel = if cell.barrier {
                    Vec2::ZERO
                } else {
                    physics::tangential_velocity(*lever, vel, angular_vel)
                };
            }
        }
    }

    /// Label every cell with its cluster.
    pub fn cluster_index(&self) -> ClusterIndex {
        let mut union_find = UnionFind::<usize>::new(self.cells.len());
        for (i, cell) in self.cells.iter().enumerate() {
            for connection in &cell.connections {
                if let Some(j) = self.index_of(connection.cell_id) {
                    union_find.union(i, j);
                }
            }
        }
        ClusterIndex {
            labels: union_find.into_labeling(),
        }
    }

    /// Verify the bond invariants: symmetric entries with equal rest
    /// lengths, no self loops or duplicates, and per-cell caps.
    pub fn check_invariants(&self) -> Result<()> {
        if self.index.len() != self.cells.len() {
            return Err(Error::InvalidState("cell index out of sync".to_string()));
        }
        for (i, cell) in self.cells.iter().enumerate() {
            if self.index.get(&cell.id) != Some(&i) {
                return Err(Error::InvalidState(format!("cell {} not indexed", cell.id)));
            }
            let cap = cell.max_connections.min(MAX_CELL_BONDS);
            if cell.connections.len() > cap {
                return Err(Error::InvalidState(format!(
                    "cell {} has {} connections, at most {} allowed",
                    cell.id,
                    cell.connections.len(),
                    cap
                )));
            }
            let mut seen = HashSet::new();
            for connection in &cell.connections {
                if connection.cell_id == cell.id {
                    return Err(Error::InvalidState(format!("cell {} is connected to itself", cell.id)));
                }
                if !seen.insert(connection.cell_id) {
                    return Err(Error::InvalidState(format!(
                        "duplicate connection {} -> {}",
                        cell.id, connection.cell_id
                    )));
                }
                let other = self.cell(connection.cell_id).ok_or_else(|| {
                    Error::InvalidState(format!(
                        "cell {} is connected to missing cell {}",
                        cell.id, connection.cell_id
                    ))
                })?;
                let back = other.connection_to(cell.id).ok_or_else(|| {
                    Error::InvalidState(format!(
                        "connection {} -> {} has no reverse entry",
                        cell.id, connection.cell_id
                    ))
                })?;
                if (back.distance - connection.distance).abs() > ALIEN_PRECISION {
                    return Err(Error::InvalidState(format!(
                        "connection {} <-> {} has inconsistent rest lengths",
                        cell.id, connection.cell_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build a graph from the cells of a description. Particles are ignored.
    pub fn from_description(
        space: SpaceMetric,
        limits: GraphLimits,
        description: &DataDescription,
    ) -> Result<Self> {
        validate_description(description, &limits)?;
        let mut graph = Self::new(space, limits);
        for desc in &description.cells {
            let mut cell = Cell::from(desc);
            cell.pos = space.correct_position(cell.pos);
            graph.index.insert(cell.id, graph.cells.len());
            graph.cells.push(cell);
        }
        Ok(graph)
    }

    /// Build a graph from a clustered description. Every described cluster
    /// must be exactly one connected component.
    pub fn from_clustered_description(
        space: SpaceMetric,
        limits: GraphLimits,
        description: &ClusteredDataDescription,
    ) -> Result<Self> {
        let graph = Self::from_description(space, limits, &description.clone().flatten())?;
        let index = graph.cluster_index();
        let mut start = 0;
        let mut seen = HashSet::new();
        for (number, cluster) in description.clusters.iter().enumerate() {
            let end = start + cluster.cells.len();
            let labels: HashSet<usize> = (start..end).map(|i| index.label(i)).collect();
            if labels.len() != 1 || !labels.iter().all(|label| seen.insert(*label)) {
                return Err(Error::Validation(format!(
                    "cluster {} is not a single connected component",
                    number
                )));
            }
            start = end;
        }
        Ok(graph)
    }

    pub fn to_description(&self) -> DataDescription {
        DataDescription {
            cells: self.cells.iter().map(Into::into).collect(),
            particles: Vec::new(),
        }
    }

    pub fn to_clustered_description(&self) -> ClusteredDataDescription {
        let clusters = self
            .cluster_index()
            .clusters()
            .into_iter()
            .map(|members| ClusterDescription {
                cells: members.into_iter().map(|i| (&self.cells[i]).into()).collect(),
            })
            .collect();
        ClusteredDataDescription {
            clusters,
            particles: Vec::new(),
        }
    }
}
