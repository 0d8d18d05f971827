//! Validation for externally supplied world data.

use crate::description::{CellDescription, DataDescription};
use crate::graph::GraphLimits;
use alien_core::{CellId, Error, Result, ALIEN_PRECISION, MAX_CELL_BONDS, MAX_COLORS};
use std::collections::{HashMap, HashSet};

/// Validate that a description is well-formed: ids are non-zero and unique
/// across cells and particles, bonds are symmetric, and no cell exceeds its
/// bond cap.
pub fn validate_description(description: &DataDescription, limits: &GraphLimits) -> Result<()> {
    let mut ids = HashSet::new();
    let mut cells: HashMap<CellId, &CellDescription> = HashMap::new();

    for cell in &description.cells {
        if cell.id.0 == 0 || !ids.insert(cell.id.0) {
            return Err(Error::Validation(format!("invalid or duplicate cell id {}", cell.id)));
        }
        cells.insert(cell.id, cell);
    }
    for particle in &description.particles {
        if particle.id.0 == 0 || !ids.insert(particle.id.0) {
            return Err(Error::Validation(format!(
                "invalid or duplicate particle id {}",
                particle.id
            )));
        }
        if !particle.energy.is_finite() || particle.energy < 0.0 {
            return Err(Error::Validation(format!("particle {} has invalid energy", particle.id)));
        }
    }

    for cell in &description.cells {
        validate_cell(cell, &cells, limits)?;
    }
    Ok(())
}

fn validate_cell(
    cell: &CellDescription,
    cells: &HashMap<CellId, &CellDescription>,
    limits: &GraphLimits,
) -> Result<()> {
    if !cell.energy.is_finite() || cell.energy < 0.0 {
        return Err(Error::Validation(format!("cell {} has invalid energy", cell.id)));
    }
    if !cell.pos.x.is_finite() || !cell.pos.y.is_finite() {
        return Err(Error::Validation(format!("cell {} has invalid position", cell.id)));
    }
    if cell.color as usize >= MAX_COLORS {
        return Err(Error::Validation(format!("cell {} has color {}", cell.id, cell.color)));
    }
    if cell.max_connections > MAX_CELL_BONDS {
        return Err(Error::Validation(format!(
            "cell {} allows {} connections, at most {} supported",
            cell.id, cell.max_connections, MAX_CELL_BONDS
        )));
    }
    let cap = cell.max_connections.min(limits.max_bonds);
    if cell.connections.len() > cap {
        return Err(Error::Validation(format!(
            "cell {} has {} connections, at most {} allowed",
            cell.id,
            cell.connections.len(),
            cap
        )));
    }

    let mut seen = HashSet::new();
    for connection in &cell.connections {
        if connection.cell_id == cell.id {
            return Err(Error::Validation(format!("cell {} is connected to itself", cell.id)));
        }
        if !seen.insert(connection.cell_id) {
            return Err(Error::Validation(format!(
                "duplicate connection {} -> {}",
                cell.id, connection.cell_id
            )));
        }
        let other = cells.get(&connection.cell_id).ok_or_else(|| {
            Error::Validation(format!(
                "cell {} is connected to unknown cell {}",
                cell.id, connection.cell_id
            ))
        })?;
        let back = other
            .connections
            .iter()
            .find(|c| c.cell_id == cell.id)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "connection {} -> {} has no reverse entry",
                    cell.id, connection.cell_id
                ))
            })?;
        if (back.distance - connection.distance).abs() > ALIEN_PRECISION {
            return Err(Error::Validation(format!(
                "connection {} <-> {} has inconsistent rest lengths",
                cell.id, connection.cell_id
            )));
        }
    }
    Ok(())
}
